use crate::auth::Caller;
use crate::job_controller::pipeline;
use crate::job_controller::state::JobsState;
use actix_web::{web, HttpResponse, Responder};
use common::requests::DownloadContractsRequest;

/// Responds with the `PENDING` job; the archive is built in the background.
pub async fn process(
    state: web::Data<JobsState>,
    caller: Caller,
    payload: web::Json<DownloadContractsRequest>,
) -> impl Responder {
    let req = payload.into_inner();
    match pipeline::submit(&state, caller, req.contract_ids, &req.file_type).await {
        Ok(job) => HttpResponse::Ok().json(job),
        Err(e) => e.to_response(caller.locale),
    }
}
