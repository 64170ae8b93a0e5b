//! Application layer - services that coordinate domain logic and ports.
//!
//! - [`SessionOrchestrator`] owns session lifecycles and routes inbound messages
//! - [`ModerationPipeline`] evaluates ordinary messages against the group policy
//! - [`CommandDispatcher`] runs prefixed commands
//! - [`PolicyService`] reads and writes group policies and records
//! - [`MuteScheduler`] holds cancellable auto-unmute jobs
//! - [`AuditTrail`] writes audit entries without blocking callers

mod audit_trail;
pub mod commands;
mod context;
pub mod moderation;
mod mute_scheduler;
pub mod orchestrator;
mod policy_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use audit_trail::AuditTrail;
pub use commands::{BotProfile, CommandDispatcher, CommandOutcome};
pub use context::MessageContext;
pub use moderation::{ActionExecutor, ModerationOutcome, ModerationPipeline};
pub use mute_scheduler::MuteScheduler;
pub use orchestrator::{OrchestratorParts, OrchestratorSettings, SessionOrchestrator};
pub use policy_service::PolicyService;
