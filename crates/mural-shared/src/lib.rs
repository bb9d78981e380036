//! # mural-shared
//!
//! Types shared by the Mural server and client: the feed domain model,
//! the JSON request/response bodies exchanged over the REST API, content
//! validation rules, and protocol constants.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod validate;

pub use error::ValidationError;
pub use models::*;
