//! Group Sentinel - multi-tenant moderation for group chats.
//!
//! Each tenant connects a chat account as a session. Every group that
//! session sees is moderated against its own policy and can be steered by
//! its admins through prefixed commands. Operator dashboards follow session
//! and policy changes over WebSocket.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
