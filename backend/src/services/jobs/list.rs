use crate::auth::Caller;
use crate::job_controller::pipeline;
use crate::job_controller::state::JobsState;
use actix_web::{web, HttpResponse, Responder};

pub async fn process(state: web::Data<JobsState>, caller: Caller) -> impl Responder {
    match pipeline::list_jobs(&state, caller).await {
        Ok(jobs) => HttpResponse::Ok().json(jobs),
        Err(e) => e.to_response(caller.locale),
    }
}
