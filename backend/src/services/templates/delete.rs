use crate::auth::{require_admin, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};

/// `DELETE /api/templates/{id}`: tombstones the template. Contracts already
/// generated from it keep their files.
pub async fn process(state: web::Data<AppState>, caller: Caller, template_id: web::Path<i64>) -> impl Responder {
    match delete_template(state, caller, template_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => e.to_response(caller.locale),
    }
}

pub async fn delete_template(state: web::Data<AppState>, caller: Caller, template_id: i64) -> ServiceResult<()> {
    require_admin(&caller)?;
    web::block(move || -> ServiceResult<()> {
        state
            .templates
            .get_by_id(template_id)?
            .ok_or(ServiceError::TemplateNotFound(template_id))?;
        state.templates.tombstone(template_id)?;
        log::info!("Template {} deleted by user {}", template_id, caller.user_id);
        Ok(())
    })
    .await?
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
    use std::sync::Arc;

    #[actix_web::test]
    async fn only_admins_delete_and_deleted_templates_disappear() {
        let env = TestEnv::new(Arc::new(FakeConverter::default()));
        let id = env.add_template("lease", docx(&paragraph("##NAME##")), &["NAME"]);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .service(configure_routes()),
        )
        .await;
        let uri = format!("/api/templates/{}", id);

        let req = as_user(TestRequest::delete().uri(&uri), 2, "DIRECTOR").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = as_user(TestRequest::delete().uri(&uri), 1, "ADMIN").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = as_user(TestRequest::get().uri(&uri), 1, "ADMIN").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = as_user(TestRequest::delete().uri(&uri), 1, "ADMIN").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
