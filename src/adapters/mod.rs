//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `provider` - Chat network connections (scriptable in-memory provider)
//! - `memory` - Policy, audit log and tenant directory stores
//! - `flood` - Sliding-window flood tracking
//! - `websocket` - Operator channel fan-out over WebSockets

pub mod flood;
pub mod memory;
pub mod provider;
pub mod websocket;

pub use flood::InMemoryFloodTracker;
pub use memory::{InMemoryLogRepository, InMemoryPolicyRepository, InMemoryTenantDirectory};
pub use provider::{HandleOp, InMemoryConnectionProvider, OutboundCall};
pub use websocket::{websocket_router, FanoutHub, TokenVerifier, WebSocketState};
