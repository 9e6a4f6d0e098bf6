use crate::auth::{require_admin, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};

/// `DELETE /api/fields/{field_id}`. Stored contract values of the field stop
/// being substituted.
pub async fn process(state: web::Data<AppState>, caller: Caller, field_id: web::Path<i64>) -> impl Responder {
    match delete_field(state, caller, field_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn delete_field(state: web::Data<AppState>, caller: Caller, field_id: i64) -> ServiceResult<()> {
    require_admin(&caller)?;
    web::block(move || -> ServiceResult<()> {
        let field = state
            .fields
            .find_by_id(field_id)?
            .ok_or_else(|| ServiceError::FieldNotFound(field_id.to_string()))?;
        state.fields.tombstone(field.id)?;
        log::info!("Field '{}' deleted by user {}", field.name, caller.user_id);
        Ok(())
    })
    .await?
}
