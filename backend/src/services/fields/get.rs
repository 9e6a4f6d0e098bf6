use crate::auth::Caller;
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::model::field::Field;

pub async fn process(state: web::Data<AppState>, caller: Caller, field_id: web::Path<i64>) -> impl Responder {
    match get_field(state, field_id.into_inner()).await {
        Ok(field) => HttpResponse::Ok().json(field),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn get_field(state: web::Data<AppState>, field_id: i64) -> ServiceResult<Field> {
    web::block(move || state.fields.find_by_id(field_id))
        .await??
        .ok_or_else(|| ServiceError::FieldNotFound(field_id.to_string()))
}

pub async fn all(state: web::Data<AppState>, caller: Caller) -> impl Responder {
    match web::block(move || state.fields.list()).await {
        Ok(Ok(fields)) => HttpResponse::Ok().json(fields),
        Ok(Err(e)) => e.to_response(caller.locale),
        Err(e) => ServiceError::from(e).to_response(caller.locale),
    }
}
