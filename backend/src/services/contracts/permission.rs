use crate::auth::{require_privileged, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};

/// `PUT /api/contracts/{id}/allow/{user_id}`: shares a contract with another
/// user. Restricted to ADMIN and DIRECTOR.
pub async fn process(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<(i64, i64)>,
) -> impl Responder {
    let (contract_id, user_id) = path.into_inner();
    match give_permission(state, caller, contract_id, user_id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn give_permission(
    state: web::Data<AppState>,
    caller: Caller,
    contract_id: i64,
    user_id: i64,
) -> ServiceResult<()> {
    require_privileged(&caller)?;
    web::block(move || -> ServiceResult<()> {
        state
            .contracts
            .get_by_id(contract_id)?
            .ok_or(ServiceError::ContractNotFound(contract_id))?;
        state.contracts.grant_access(contract_id, user_id)?;
        log::info!(
            "User {} granted user {} access to contract {}",
            caller.user_id,
            user_id,
            contract_id
        );
        Ok(())
    })
    .await?
}
