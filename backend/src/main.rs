mod auth;
mod config;
mod docx;
mod engine;
mod error;
mod job_controller;
mod materializer;
mod pdf;
mod services;
mod state;
mod store;

use crate::config::Config;
use crate::job_controller::pipeline::{self, ArchiveBuilder};
use crate::materializer::Materializer;
use crate::state::AppState;
use crate::store::SqliteStore;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Could not read .env: {}", e);
        }
    }
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    config.ensure_directories()?;

    let store = Arc::new(
        SqliteStore::open(&config.database_path).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
    );
    pipeline::fail_interrupted_jobs(store.as_ref()).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let converter = pdf::from_config(&config);
    let materializer = Arc::new(Materializer::new(store.clone(), converter, config.contracts_dir()));
    let app_state = AppState {
        templates: store.clone(),
        fields: store.clone(),
        contracts: store.clone(),
        materializer: materializer.clone(),
        templates_dir: config.templates_dir(),
        upload_limit_bytes: config.upload_limit_bytes,
    };

    // Job updater and archive workers
    let builder = ArchiveBuilder::new(store.clone(), store.clone(), materializer);
    let jobs_state = job_controller::start(
        store.clone(),
        Arc::new(builder),
        config.zips_dir(),
        config.max_concurrent_jobs,
        config.job_queue_capacity,
    );

    let (host, port) = config.bind_address();
    info!(
        "Server running at http://{}:{} (PDF backend: {:?})",
        host, port, config.pdf_backend
    );

    let json_limit = config.upload_limit_bytes;
    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(json_limit))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(jobs_state.clone()))
            .service(services::templates::configure_routes())
            .service(services::fields::configure_routes())
            .service(services::contracts::configure_routes())
            .service(services::jobs::configure_routes())
    })
    .bind((host, port))?
    .run()
    .await
}
