//! Business logic services for Kua AgroApp

pub mod auth;
pub mod ledger;
pub mod session;

pub use auth::{
    spawn_readiness, AnonymousIdentityProvider, AuthService, AuthSession, AuthTokens,
    IdentityProvider,
};
pub use ledger::{Ledger, SnapshotOutcome, SyncChannel};
pub use session::{FieldSession, SessionEvent, View};
