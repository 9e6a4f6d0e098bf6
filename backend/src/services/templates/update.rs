use crate::auth::{require_admin, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::services::templates::save::store_document;
use crate::services::upload::{read_template_upload, TemplateUpload};
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use common::model::template::Template;
use std::fs;

/// `PUT /api/templates/{id}`: swaps in a new `.docx`. The field list is
/// rebuilt from the new document.
pub async fn process(
    state: web::Data<AppState>,
    caller: Caller,
    template_id: web::Path<i64>,
    payload: Multipart,
) -> impl Responder {
    match update_template(state, caller, template_id.into_inner(), payload).await {
        Ok(template) => HttpResponse::Ok().json(template),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn update_template(
    state: web::Data<AppState>,
    caller: Caller,
    template_id: i64,
    payload: Multipart,
) -> ServiceResult<Template> {
    require_admin(&caller)?;
    let upload = read_template_upload(payload, state.upload_limit_bytes).await?;
    web::block(move || replace_template(&state, template_id, &upload)).await?
}

fn replace_template(state: &AppState, template_id: i64, upload: &TemplateUpload) -> ServiceResult<Template> {
    let old = state
        .templates
        .get_by_id(template_id)?
        .ok_or(ServiceError::TemplateNotFound(template_id))?;

    let (path, field_ids) = store_document(state, &old.name, &upload.bytes)?;
    if let Err(e) = state
        .templates
        .replace(template_id, &path, &upload.checksum, &field_ids)
    {
        let _ = fs::remove_file(&path);
        return Err(e);
    }
    if let Err(e) = fs::remove_file(&old.file_path) {
        log::warn!("Could not remove replaced template file {}: {}", old.file_path.display(), e);
    }
    log::info!("Template {} replaced, now {} fields", template_id, field_ids.len());

    state
        .templates
        .get_by_id(template_id)?
        .map(|t| t.to_model())
        .ok_or(ServiceError::TemplateNotFound(template_id))
}
