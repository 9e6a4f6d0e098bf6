//! `PUT /api/fields/{field_id}`
//!
//! Fields are shared between templates, so a field is never edited in place.
//! Instead a new field is created from the request (name and type default to
//! the old field's) and takes the old field's position in the given template.
//! Other templates keep using the old field.

use super::{parse_field_type, validate_name};
use crate::auth::{require_admin, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::model::field::Field;
use common::requests::UpdateFieldRequest;

pub async fn process(
    state: web::Data<AppState>,
    caller: Caller,
    field_id: web::Path<i64>,
    payload: web::Json<UpdateFieldRequest>,
) -> impl Responder {
    match update_field(state, caller, field_id.into_inner(), payload.into_inner()).await {
        Ok(field) => HttpResponse::Ok().json(field),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn update_field(
    state: web::Data<AppState>,
    caller: Caller,
    field_id: i64,
    req: UpdateFieldRequest,
) -> ServiceResult<Field> {
    require_admin(&caller)?;
    web::block(move || replace_field(&state, field_id, &req)).await?
}

fn replace_field(state: &AppState, field_id: i64, req: &UpdateFieldRequest) -> ServiceResult<Field> {
    let old = state
        .fields
        .find_by_id(field_id)?
        .ok_or_else(|| ServiceError::FieldNotFound(field_id.to_string()))?;
    let template = state
        .templates
        .get_by_id(req.template_id)?
        .ok_or(ServiceError::TemplateNotFound(req.template_id))?;
    if !template.has_field(old.id) {
        return Err(ServiceError::FieldNotBelongToTemplate {
            field: old.name,
            template_id: template.id,
        });
    }

    let name = match &req.name {
        Some(name) => validate_name(name)?,
        None => old.name.clone(),
    };
    let field_type = match &req.field_type {
        Some(raw) => parse_field_type(raw)?,
        None => old.field_type,
    };

    let new = state.fields.create(&name, field_type)?;
    state.templates.replace_field(template.id, old.id, new.id)?;
    log::info!(
        "Field '{}' replaced by '{}' in template {}",
        old.name,
        new.name,
        template.id
    );
    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{docx, paragraph};
    use crate::pdf::fakes::FakeConverter;
    use crate::state::testing::TestEnv;
    use common::model::field::FieldType;
    use std::sync::Arc;

    fn request(template_id: i64, name: Option<&str>) -> UpdateFieldRequest {
        UpdateFieldRequest {
            template_id,
            name: name.map(str::to_string),
            field_type: Some("number".into()),
        }
    }

    #[test]
    fn new_field_takes_the_old_position_in_one_template_only() {
        let env = TestEnv::new(Arc::new(FakeConverter::default()));
        let lease = env.add_template("lease", docx(&paragraph("##A## ##B##")), &["A", "B"]);
        let loan = env.add_template("loan", docx(&paragraph("##A##")), &["A"]);
        let a = env.state.fields.find_by_name("A").unwrap().unwrap();

        let new = replace_field(&env.state, a.id, &request(lease, Some("PRICE"))).unwrap();
        assert_eq!(new.field_type, FieldType::Number);

        let lease = env.state.templates.get_by_id(lease).unwrap().unwrap();
        let names: Vec<&str> = lease.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["PRICE", "B"]);
        let loan = env.state.templates.get_by_id(loan).unwrap().unwrap();
        assert_eq!(loan.fields[0].name, "A");
    }

    #[test]
    fn failures_are_reported_in_lookup_order() {
        let env = TestEnv::new(Arc::new(FakeConverter::default()));
        let lease = env.add_template("lease", docx(&paragraph("##A##")), &["A"]);
        let loan = env.add_template("loan", docx(&paragraph("##B##")), &["B"]);
        let a = env.state.fields.find_by_name("A").unwrap().unwrap();

        assert!(matches!(
            replace_field(&env.state, 999, &request(lease, Some("X"))),
            Err(ServiceError::FieldNotFound(_))
        ));
        assert!(matches!(
            replace_field(&env.state, a.id, &request(999, Some("X"))),
            Err(ServiceError::TemplateNotFound(999))
        ));
        assert!(matches!(
            replace_field(&env.state, a.id, &request(loan, Some("X"))),
            Err(ServiceError::FieldNotBelongToTemplate { .. })
        ));
        assert!(matches!(
            replace_field(&env.state, a.id, &request(lease, Some("B"))),
            Err(ServiceError::FieldExists(_))
        ));
        assert!(matches!(
            replace_field(&env.state, a.id, &request(lease, None)),
            Err(ServiceError::FieldExists(_))
        ));
    }
}
