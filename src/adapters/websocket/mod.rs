//! WebSocket adapters for live operator dashboards.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ SessionOrchestrator /        │
//! │ PolicyService                │
//! └──────────────┬───────────────┘
//!                │ LiveEventPublisher::publish
//!                ▼
//! ┌──────────────────────────────┐
//! │ FanoutHub                    │
//! │  user-1 ─► mpsc (try_send)   │
//! │  user-2 ─► mpsc (try_send)   │
//! └──────────────┬───────────────┘
//!                │ forward loop per connection
//!                ▼
//!          GET /ws?token=...
//! ```
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`hub`] - Channel registry and non-blocking fan-out
//! - [`handler`] - Axum upgrade handler with token verification

pub mod handler;
pub mod hub;
pub mod messages;

pub use handler::{websocket_router, ws_handler, AuthError, TokenVerifier, WebSocketState};
pub use hub::{ClientId, FanoutHub, DEFAULT_CHANNEL_CAPACITY};
pub use messages::{ClientMessage, ConnectedMessage, EventFrame, ServerMessage};
