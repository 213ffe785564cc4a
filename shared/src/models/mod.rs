//! Domain models for Kua AgroApp field records

mod draft;
mod field;
mod record;

pub use draft::*;
pub use field::*;
pub use record::*;
