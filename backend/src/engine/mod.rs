//! Placeholder engine: finding `##key##` tokens and replacing them.

pub mod scanner;
pub mod substitute;

pub use scanner::{scan, scan_document};
pub use substitute::{substitute_document, substitute_text};
