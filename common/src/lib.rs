//! Wire types shared between the contract backend and its clients.

pub mod jobs;
pub mod model;
pub mod requests;
pub mod responses;
