//! # Contract Creation Service
//!
//! `POST /api/contracts/add` takes a list of `CreateContractRequest`s. Every
//! template id is checked before any contract row is written. Each contract
//! then gets its field values (bound by name to the template's fields) and is
//! materialized right away, so its `.docx`, and `.pdf` when conversion
//! works, can be downloaded immediately.

use crate::auth::Caller;
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use crate::store::TemplateRecord;
use actix_web::{web, HttpResponse, Responder};
use common::requests::CreateContractRequest;
use common::responses::ContractIds;
use std::collections::HashMap;

pub async fn process(
    state: web::Data<AppState>,
    caller: Caller,
    payload: web::Json<Vec<CreateContractRequest>>,
) -> impl Responder {
    let requests = payload.into_inner();
    let result = web::block(move || create_contracts(&state, caller, &requests)).await;
    match result {
        Ok(Ok(contract_ids)) => HttpResponse::Ok().json(ContractIds { contract_ids }),
        Ok(Err(e)) => e.to_response(caller.locale),
        Err(e) => ServiceError::from(e).to_response(caller.locale),
    }
}

pub fn create_contracts(
    state: &AppState,
    caller: Caller,
    requests: &[CreateContractRequest],
) -> ServiceResult<Vec<i64>> {
    if requests.is_empty() {
        return Err(ServiceError::Validation("no contracts requested".into()));
    }

    let mut templates: HashMap<i64, TemplateRecord> = HashMap::new();
    for req in requests {
        if !templates.contains_key(&req.template_id) {
            let template = state
                .templates
                .get_by_id(req.template_id)?
                .ok_or(ServiceError::TemplateNotFound(req.template_id))?;
            templates.insert(template.id, template);
        }
    }

    let mut contract_ids = Vec::with_capacity(requests.len());
    for req in requests {
        let template = &templates[&req.template_id];
        let passport = req
            .client_passport
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let contract_id = state.contracts.create(template.id, passport, caller.user_id)?;

        let values = bind_values(template, &req.fields);
        state.contracts.save_field_values(contract_id, &values)?;

        let substitutions = state.contracts.find_field_values(contract_id)?;
        let files = state.materializer.materialize(template.id, &substitutions)?;
        state
            .contracts
            .set_paths(contract_id, &files.docx_path, files.pdf_path.as_deref())?;

        log::info!(
            "Contract {} created from template {} by user {}",
            contract_id,
            template.id,
            caller.user_id
        );
        contract_ids.push(contract_id);
    }

    Ok(contract_ids)
}

/// Pairs each value with the template's field of that name. Values for
/// names the template does not have are dropped.
fn bind_values(template: &TemplateRecord, values: &HashMap<String, String>) -> Vec<(i64, String)> {
    let mut bound = Vec::with_capacity(values.len());
    for (name, value) in values {
        match template.fields.iter().find(|f| &f.name == name) {
            Some(field) => bound.push((field.id, value.clone())),
            None => log::debug!(
                "Dropping value for '{}': not a field of template {}",
                name,
                template.id
            ),
        }
    }
    bound
}
