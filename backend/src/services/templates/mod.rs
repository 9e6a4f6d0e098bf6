//! # Template Service Module
//!
//! Routes under `/api/templates`. Templates are `.docx` files whose
//! `##key##` tokens define their fields.
//!
//! ## Sub-modules:
//! - `save`: upload of a new template.
//! - `update`: replacement of a template's file.
//! - `get`: template metadata, listing and file download.
//! - `delete`: tombstoning.

mod delete;
mod get;
mod save;
mod update;

use actix_web::web::{delete, get, post, put, scope};
use actix_web::Scope;

/// The base path for all template-related API endpoints.
const API_PATH: &str = "/api/templates";

/// Configures and returns the Actix `Scope` for all template-related routes.
///
/// # Registered Routes:
///
/// *   **`POST ""`** (`save::process`, ADMIN): multipart `name` + `file`.
///     Responds with the stored `Template` and its discovered fields.
///
/// *   **`GET /all`** (`get::all`): every live template.
///
/// *   **`GET /show/{template_id}`** (`get::show`): the `.docx` as an attachment.
///
/// *   **`GET /{template_id}`** (`get::process`): one template with its fields.
///
/// *   **`PUT /{template_id}`** (`update::process`, ADMIN): multipart `file`;
///     the fields are rebuilt from the new document.
///
/// *   **`DELETE /{template_id}`** (`delete::process`, ADMIN).
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", post().to(save::process))
        .route("/all", get().to(get::all))
        .route("/show/{template_id}", get().to(get::show))
        .route("/{template_id}", get().to(get::process))
        .route("/{template_id}", put().to(update::process))
        .route("/{template_id}", delete().to(delete::process))
}
