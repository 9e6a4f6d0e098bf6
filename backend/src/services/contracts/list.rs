//! Contract listings:
//! - `GET /api/contracts/mine`: contracts the caller created.
//! - `GET /api/contracts`: every contract (ADMIN, DIRECTOR).
//! - `GET /api/contracts/client/{passport}`: a client's contracts that the
//!   caller may access.

use crate::auth::{can_access_contract, require_privileged, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::store::ContractRecord;
use actix_web::{web, HttpResponse, Responder};
use common::model::contract::Contract;

fn respond(result: ServiceResult<Vec<ContractRecord>>, caller: Caller) -> HttpResponse {
    match result {
        Ok(records) => HttpResponse::Ok().json(records.iter().map(|c| c.to_model()).collect::<Vec<Contract>>()),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn mine(state: web::Data<AppState>, caller: Caller) -> impl Responder {
    let result = web::block(move || state.contracts.list_by_creator(caller.user_id))
        .await
        .map_err(ServiceError::from)
        .and_then(|r| r);
    respond(result, caller)
}

pub async fn all(state: web::Data<AppState>, caller: Caller) -> impl Responder {
    respond(list_all(state, caller).await, caller)
}

async fn list_all(state: web::Data<AppState>, caller: Caller) -> ServiceResult<Vec<ContractRecord>> {
    require_privileged(&caller)?;
    web::block(move || state.contracts.list()).await?
}

pub async fn by_client(
    state: web::Data<AppState>,
    caller: Caller,
    passport: web::Path<String>,
) -> impl Responder {
    let passport = passport.into_inner();
    let result = web::block(move || state.contracts.list_by_client(passport.trim()))
        .await
        .map_err(ServiceError::from)
        .and_then(|r| r)
        .map(|records| {
            records
                .into_iter()
                .filter(|c| can_access_contract(&caller, c))
                .collect()
        });
    respond(result, caller)
}
