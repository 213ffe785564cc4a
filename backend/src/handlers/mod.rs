//! HTTP handlers

pub mod auth;
pub mod documents;
pub mod health;

pub use auth::{issue_anonymous, login};
pub use documents::{export_document, get_document, put_document, stream_document};
pub use health::health_check;
