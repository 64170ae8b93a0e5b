//! Session domain module.
//!
//! Lifecycle state machine and aggregate for tenant sessions. The live
//! connection itself is owned by the session orchestrator.

mod aggregate;
mod errors;
mod state;

pub use aggregate::{PairingArtifact, SessionIdentity, TenantSession, MAX_HISTORY};
pub use errors::SessionError;
pub use state::SessionState;
