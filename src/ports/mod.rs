//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Network
//!
//! - `ConnectionProvider` / `ConnectionHandle` - the chat network, per session
//!
//! ## Persistence
//!
//! - `PolicyRepository` - group policies and group records
//! - `LogRepository` - append-only audit history
//! - `TenantDirectory` - tenant roles and linked accounts
//!
//! ## Runtime
//!
//! - `FloodTracker` - per-sender sliding windows
//! - `LiveEventPublisher` - fan-out to operator dashboards

mod connection_provider;
mod event_publisher;
mod flood_tracker;
mod log_repository;
mod policy_repository;
mod tenant_directory;

pub use connection_provider::{
    ConnectionHandle, ConnectionProvider, ConnectionState, GroupDelta, GroupMetadata,
    GroupParticipant, InboundMessage, ParticipantOp, ParticipantRole, ProviderError,
    ProviderEvent, ProviderSession,
};
pub use event_publisher::{LiveEvent, LiveEventKind, LiveEventPublisher};
pub use flood_tracker::{FloodCheck, FloodKey, FloodTracker};
pub use log_repository::LogRepository;
pub use policy_repository::PolicyRepository;
pub use tenant_directory::{TenantDirectory, TenantRole};
