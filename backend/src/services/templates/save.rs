//! # Template Upload Service
//!
//! `POST /api/templates` takes a multipart body with a `name` part and a
//! `.docx` `file` part. The document is parsed and scanned once; every
//! `##key##` found becomes a field of the template, reusing fields that
//! already exist under that name. The file is kept in the templates
//! directory as `<name>-<uuid>.docx` and its md5 is stored alongside.

use crate::auth::{require_admin, Caller};
use crate::docx::Document;
use crate::engine::scan_document;
use crate::error::{ServiceError, ServiceResult};
use crate::materializer::write_atomically;
use crate::services::upload::{read_template_upload, TemplateUpload};
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use common::model::field::FieldType;
use common::model::template::Template;
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

pub async fn process(state: web::Data<AppState>, caller: Caller, payload: Multipart) -> impl Responder {
    match save_template(state, caller, payload).await {
        Ok(template) => HttpResponse::Ok().json(template),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn save_template(
    state: web::Data<AppState>,
    caller: Caller,
    payload: Multipart,
) -> ServiceResult<Template> {
    require_admin(&caller)?;
    let upload = read_template_upload(payload, state.upload_limit_bytes).await?;
    web::block(move || store_template(&state, &upload)).await?
}

fn store_template(state: &AppState, upload: &TemplateUpload) -> ServiceResult<Template> {
    let name = upload.display_name();
    let (path, field_ids) = store_document(state, &name, &upload.bytes)?;

    let id = match state.templates.save(&name, &path, &upload.checksum, &field_ids) {
        Ok(id) => id,
        Err(e) => {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
    };
    log::info!(
        "Template {} '{}' saved with {} fields",
        id,
        name,
        field_ids.len()
    );

    state
        .templates
        .get_by_id(id)?
        .map(|t| t.to_model())
        .ok_or(ServiceError::TemplateNotFound(id))
}

/// Validates and scans `bytes`, makes sure a field exists for every key and
/// writes the file under a fresh name. Returns the path and the field ids in
/// document order.
pub(super) fn store_document(
    state: &AppState,
    name: &str,
    bytes: &[u8],
) -> ServiceResult<(PathBuf, Vec<i64>)> {
    let doc = Document::from_bytes(bytes)?;
    let keys = scan_document(&doc);

    let mut field_ids = Vec::with_capacity(keys.len());
    for key in &keys {
        field_ids.push(state.fields.upsert(key, FieldType::String)?.id);
    }

    let path = state.templates_dir.join(template_file_name(name)?);
    write_atomically(&path, bytes)?;
    Ok((path, field_ids))
}

/// `<name with unsafe characters replaced>-<uuid>.docx`
fn template_file_name(name: &str) -> ServiceResult<String> {
    let unsafe_chars =
        Regex::new(r"[^\p{L}\p{N}_-]+").map_err(|e| ServiceError::Internal(format!("Regex error: {}", e)))?;
    let stem = unsafe_chars.replace_all(name.trim(), "_");
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "template" } else { stem };
    Ok(format!("{}-{}.docx", stem, Uuid::new_v4()))
}
