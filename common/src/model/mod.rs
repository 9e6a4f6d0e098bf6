pub mod contract;
pub mod field;
pub mod template;
pub mod user;
