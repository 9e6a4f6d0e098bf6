//! Routes under `/api/contracts`.

mod add;
mod get;
mod list;
mod permission;

use actix_web::web::{get, post, put, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/contracts";

/// *   **`POST /add`** (`add::process`): creates and materializes contracts,
///     responds with their ids.
/// *   **`GET /mine`** (`list::mine`).
/// *   **`GET ""`** (`list::all`, ADMIN or DIRECTOR).
/// *   **`GET /client/{passport}`** (`list::by_client`).
/// *   **`GET /{contract_id}`** (`get::process`): the generated file,
///     `?format=pdf|docx`.
/// *   **`PUT /{contract_id}/allow/{user_id}`** (`permission::process`, ADMIN
///     or DIRECTOR).
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/add", post().to(add::process))
        .route("/mine", get().to(list::mine))
        .route("", get().to(list::all))
        .route("/client/{passport}", get().to(list::by_client))
        .route("/{contract_id}", get().to(get::process))
        .route("/{contract_id}/allow/{user_id}", put().to(permission::process))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{docx, paragraph};
    use crate::pdf::fakes::FakeConverter;
    use crate::services::testing::as_user;
    use crate::state::testing::TestEnv;
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::{web, App};
    use common::model::contract::Contract;
    use common::responses::{BaseMessage, ContractIds};
    use serde_json::json;
    use std::sync::Arc;

    fn setup(converter: FakeConverter) -> (TestEnv, i64) {
        let env = TestEnv::new(Arc::new(converter));
        let template = env.add_template("lease", docx(&paragraph("Dear ##NAME##")), &["NAME"]);
        (env, template)
    }

    #[actix_web::test]
    async fn created_contracts_are_listed_downloaded_and_shared() {
        let (env, template) = setup(FakeConverter::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .service(configure_routes()),
        )
        .await;

        let req = as_user(TestRequest::post().uri("/api/contracts/add"), 10, "OPERATOR")
            .set_json(json!([
                { "template_id": template, "client_passport": "AB1234567", "fields": { "NAME": "Alice" } },
                { "template_id": template, "fields": { "NAME": "Bob" } }
            ]))
            .to_request();
        let ids: ContractIds = test::call_and_read_body_json(&app, req).await;
        assert_eq!(ids.contract_ids.len(), 2);
        let first = ids.contract_ids[0];

        let req = as_user(TestRequest::get().uri("/api/contracts/mine"), 10, "OPERATOR").to_request();
        let mine: Vec<Contract> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|c| c.has_docx && c.has_pdf));

        let req = as_user(TestRequest::get().uri("/api/contracts/client/AB1234567"), 10, "OPERATOR")
            .to_request();
        let by_client: Vec<Contract> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(by_client.len(), 1);
        assert_eq!(by_client[0].contract_id, first);

        let file_uri = format!("/api/contracts/{}?format=pdf", first);
        let req = as_user(TestRequest::get().uri(&file_uri), 10, "OPERATOR").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(test::read_body(resp).await.starts_with(b"%PDF"));

        let req = as_user(TestRequest::get().uri(&file_uri), 11, "OPERATOR").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let allow_uri = format!("/api/contracts/{}/allow/11", first);
        let req = as_user(TestRequest::put().uri(&allow_uri), 10, "OPERATOR").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
        let req = as_user(TestRequest::put().uri(&allow_uri), 1, "DIRECTOR").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = as_user(TestRequest::get().uri(&file_uri), 11, "OPERATOR").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn listing_everything_is_privileged_and_missing_pdfs_are_404() {
        let (env, template) = setup(FakeConverter::failing());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.state.clone()))
                .service(configure_routes()),
        )
        .await;

        let req = as_user(TestRequest::post().uri("/api/contracts/add"), 10, "OPERATOR")
            .set_json(json!([{ "template_id": template, "fields": { "NAME": "Alice" } }]))
            .to_request();
        let ids: ContractIds = test::call_and_read_body_json(&app, req).await;
        let id = ids.contract_ids[0];

        let req = as_user(TestRequest::get().uri("/api/contracts"), 10, "OPERATOR").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
        let req = as_user(TestRequest::get().uri("/api/contracts"), 1, "ADMIN").to_request();
        let all: Vec<Contract> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.len(), 1);
        assert!(all[0].has_docx && !all[0].has_pdf);

        let req = as_user(
            TestRequest::get().uri(&format!("/api/contracts/{}?format=pdf", id)),
            10,
            "OPERATOR",
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: BaseMessage = test::read_body_json(resp).await;
        assert_eq!(body.code, 300);

        let req = as_user(
            TestRequest::get().uri(&format!("/api/contracts/{}?format=odt", id)),
            10,
            "OPERATOR",
        )
        .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = as_user(TestRequest::post().uri("/api/contracts/add"), 10, "OPERATOR")
            .set_json(json!([{ "template_id": 999 }]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: BaseMessage = test::read_body_json(resp).await;
        assert_eq!(body.code, 104);
    }
}
