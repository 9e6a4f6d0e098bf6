use crate::auth::Caller;
use crate::job_controller::pipeline;
use crate::job_controller::state::JobsState;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse, Responder};

/// The hash is single-use: a second request for it is `JobNotFound`.
pub async fn process(state: web::Data<JobsState>, caller: Caller, hash: web::Path<String>) -> impl Responder {
    match pipeline::retrieve(&state, hash.into_inner()).await {
        Ok((bytes, file_name)) => HttpResponse::Ok()
            .content_type("application/zip")
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(file_name.to_string())],
            })
            .body(bytes),
        Err(e) => e.to_response(caller.locale),
    }
}
