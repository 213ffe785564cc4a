//! Shared types and models for Kua AgroApp
//!
//! This crate holds the field-record domain shared between the backend,
//! the browser client (via WASM), and the export tooling: identities, the
//! draft form, committed records, ISO week anchoring and CSV export.

pub mod export;
pub mod models;
pub mod types;
pub mod validation;
pub mod week;

pub use export::*;
pub use models::*;
pub use types::*;
pub use validation::*;
pub use week::*;
