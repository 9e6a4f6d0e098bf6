//! HTTP surface. Each sub-module owns one `/api/...` scope and exposes it
//! through `configure_routes()`; `main.rs` mounts them all.

pub mod contracts;
pub mod fields;
pub mod jobs;
pub mod templates;
mod upload;
