//! Routes under `/api/fields`. Fields are usually created by template
//! uploads; these endpoints let an admin manage them directly.

mod create;
mod delete;
mod get;
mod update;

use crate::error::ServiceError;
use actix_web::web::{delete, get, post, put, scope};
use actix_web::Scope;
use common::model::field::FieldType;

const API_PATH: &str = "/api/fields";

/// *   **`POST ""`** (`create::process`, ADMIN): a new field; 409 if the name is taken.
/// *   **`GET ""`** (`get::all`): every live field.
/// *   **`GET /{field_id}`** (`get::process`).
/// *   **`PUT /{field_id}`** (`update::process`, ADMIN): replaces the field in
///     one template with a new field.
/// *   **`DELETE /{field_id}`** (`delete::process`, ADMIN).
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", post().to(create::process))
        .route("", get().to(get::all))
        .route("/{field_id}", get().to(get::process))
        .route("/{field_id}", put().to(update::process))
        .route("/{field_id}", delete().to(delete::process))
}

fn parse_field_type(raw: &str) -> Result<FieldType, ServiceError> {
    raw.parse().map_err(ServiceError::Validation)
}

fn validate_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("field name must not be empty".into()));
    }
    if name.contains(crate::engine::scanner::MARKER) {
        return Err(ServiceError::Validation(format!(
            "field name must not contain '{}'",
            crate::engine::scanner::MARKER
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_must_not_hold_markers() {
        assert_eq!(validate_name("  NAME ").unwrap(), "NAME");
        assert!(validate_name("   ").is_err());
        assert!(validate_name("A##B").is_err());
        assert_eq!(parse_field_type("date").unwrap(), FieldType::Date);
        assert!(matches!(parse_field_type("money"), Err(ServiceError::Validation(_))));
    }
}
