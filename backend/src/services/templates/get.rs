//! # Template Retrieval Service
//!
//! - `GET /api/templates/{id}`: the template and its fields, in document order.
//! - `GET /api/templates/all`: every live template.
//! - `GET /api/templates/show/{id}`: the stored `.docx` itself.
//!
//! Any authenticated caller may read templates.

use crate::auth::Caller;
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use common::model::template::Template;
use std::path::PathBuf;

pub async fn process(state: web::Data<AppState>, caller: Caller, template_id: web::Path<i64>) -> impl Responder {
    match get_template(state, template_id.into_inner()).await {
        Ok(template) => HttpResponse::Ok().json(template),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn get_template(state: web::Data<AppState>, template_id: i64) -> ServiceResult<Template> {
    let record = web::block(move || state.templates.get_by_id(template_id)).await??;
    record
        .map(|t| t.to_model())
        .ok_or(ServiceError::TemplateNotFound(template_id))
}

pub async fn all(state: web::Data<AppState>, caller: Caller) -> impl Responder {
    match web::block(move || state.templates.list()).await {
        Ok(Ok(templates)) => {
            HttpResponse::Ok().json(templates.iter().map(|t| t.to_model()).collect::<Vec<_>>())
        }
        Ok(Err(e)) => e.to_response(caller.locale),
        Err(e) => ServiceError::from(e).to_response(caller.locale),
    }
}

pub async fn show(
    req: HttpRequest,
    state: web::Data<AppState>,
    caller: Caller,
    template_id: web::Path<i64>,
) -> HttpResponse {
    match template_file(state, template_id.into_inner()).await {
        Ok((path, name)) => match NamedFile::open_async(&path).await {
            Ok(file) => file
                .set_content_disposition(ContentDisposition {
                    disposition: DispositionType::Attachment,
                    parameters: vec![DispositionParam::Filename(name)],
                })
                .into_response(&req),
            Err(e) => {
                log::warn!("Template file {} unreadable: {}", path.display(), e);
                ServiceError::FileNotFound(path.display().to_string()).to_response(caller.locale)
            }
        },
        Err(e) => e.to_response(caller.locale),
    }
}

/// Path of the stored file and the name to offer it under.
async fn template_file(state: web::Data<AppState>, template_id: i64) -> ServiceResult<(PathBuf, String)> {
    let record = web::block(move || state.templates.get_by_id(template_id))
        .await??
        .ok_or(ServiceError::TemplateNotFound(template_id))?;
    Ok((record.file_path, format!("{}.docx", record.name)))
}

#[cfg(test)]
mod tests {
    use crate::docx::fixtures::{docx, paragraph};
    use crate::pdf::fakes::FakeConverter;
    use crate::services::templates::configure_routes;
    use crate::services::testing::as_user;
    use crate::state::testing::TestEnv;
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::{web, App};
    use common::model::template::Template;
    use std::sync::Arc;

    #[actix_web::test]
    async fn templates_can_be_listed_read_and_downloaded() {
        let env = TestEnv::new(Arc::new(FakeConverter::default()));
        let bytes = docx(&paragraph("##NAME##"));
        let id = env.add_template("lease", bytes.clone(), &["NAME"]);
        env.add_template("loan", docx(&paragraph("x")), &[]);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .service(configure_routes()),
        )
        .await;

        let req = as_user(TestRequest::get().uri("/api/templates/all"), 5, "OPERATOR").to_request();
        let all: Vec<Template> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.len(), 2);

        let req = as_user(TestRequest::get().uri(&format!("/api/templates/{}", id)), 5, "OPERATOR")
            .to_request();
        let template: Template = test::call_and_read_body_json(&app, req).await;
        assert_eq!(template.fields[0].name, "NAME");

        let req = as_user(TestRequest::get().uri(&format!("/api/templates/show/{}", id)), 5, "OPERATOR")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await.to_vec(), bytes);

        let req = as_user(TestRequest::get().uri("/api/templates/404"), 5, "OPERATOR").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = TestRequest::get().uri("/api/templates/all").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }
}
