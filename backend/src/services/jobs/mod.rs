//! # Archive Job Routes
//!
//! The HTTP face of `job_controller::pipeline`:
//!
//! - `POST /api/jobs/download`: queues an archive of the given contracts and
//!   returns the `PENDING` job right away.
//! - `GET /api/jobs`: the caller's jobs, newest first. A `FINISHED` job
//!   carries its `hash`; a `FAILED` one carries its `error`.
//! - `GET /api/jobs/retrieve/{hash}`: downloads the archive once.

mod download;
mod list;
mod retrieve;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/jobs";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/download", post().to(download::process))
        .route("", get().to(list::process))
        .route("/retrieve/{hash}", get().to(retrieve::process))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{docx, paragraph};
    use crate::job_controller;
    use crate::job_controller::pipeline::ArchiveBuilder;
    use crate::pdf::fakes::FakeConverter;
    use crate::services::testing::as_user;
    use crate::state::testing::TestEnv;
    use actix_web::http::header::CONTENT_DISPOSITION;
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::{web, App};
    use common::jobs::{JobStatus, JobSummary};
    use common::responses::BaseMessage;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[actix_web::test]
    async fn download_poll_and_retrieve() {
        let env = TestEnv::new(Arc::new(FakeConverter::default()));
        let template = env.add_template("lease", docx(&paragraph("Dear ##NAME##")), &["NAME"]);
        let contract = env.state.contracts.create(template, None, 10).unwrap();
        let builder = ArchiveBuilder::new(
            env.state.templates.clone(),
            env.state.contracts.clone(),
            env.state.materializer.clone(),
        );
        let jobs = job_controller::start(env.store.clone(), Arc::new(builder), env.zips_dir(), 1, 4);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(jobs))
                .service(configure_routes()),
        )
        .await;

        let req = as_user(TestRequest::post().uri("/api/jobs/download"), 10, "OPERATOR")
            .set_json(json!({ "contract_ids": [contract], "file_type": "txt" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: BaseMessage = test::read_body_json(resp).await;
        assert_eq!(body.code, 108);

        let req = as_user(TestRequest::post().uri("/api/jobs/download"), 10, "OPERATOR")
            .set_json(json!({ "contract_ids": [contract], "file_type": "Pdf" }))
            .to_request();
        let job: JobSummary = test::call_and_read_body_json(&app, req).await;
        assert_eq!(job.status, JobStatus::Pending);

        let mut finished = None;
        for _ in 0..200 {
            let req = as_user(TestRequest::get().uri("/api/jobs"), 10, "OPERATOR").to_request();
            let jobs: Vec<JobSummary> = test::call_and_read_body_json(&app, req).await;
            assert_eq!(jobs.len(), 1);
            if jobs[0].status != JobStatus::Pending {
                finished = Some(jobs[0].clone());
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        let job = finished.expect("job never finished");
        assert_eq!(job.status, JobStatus::Finished);
        let uri = format!("/api/jobs/retrieve/{}", job.hash.unwrap());

        let req = as_user(TestRequest::get().uri(&uri), 10, "OPERATOR").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"contracts.zip\""
        );
        assert!(test::read_body(resp).await.starts_with(b"PK"));

        let req = as_user(TestRequest::get().uri(&uri), 10, "OPERATOR").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: BaseMessage = test::read_body_json(resp).await;
        assert_eq!(body.code, 110);
    }
}
