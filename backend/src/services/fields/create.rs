use super::{parse_field_type, validate_name};
use crate::auth::{require_admin, Caller};
use crate::error::ServiceResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::model::field::Field;
use common::requests::CreateFieldRequest;

pub async fn process(
    state: web::Data<AppState>,
    caller: Caller,
    payload: web::Json<CreateFieldRequest>,
) -> impl Responder {
    match create_field(state, caller, payload.into_inner()).await {
        Ok(field) => HttpResponse::Ok().json(field),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn create_field(
    state: web::Data<AppState>,
    caller: Caller,
    req: CreateFieldRequest,
) -> ServiceResult<Field> {
    require_admin(&caller)?;
    let name = validate_name(&req.name)?;
    let field_type = parse_field_type(&req.field_type)?;
    let field = web::block(move || state.fields.create(&name, field_type)).await??;
    log::info!("Field {} '{}' created", field.id, field.name);
    Ok(field)
}
