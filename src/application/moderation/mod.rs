//! Moderation of ordinary (non-command) group messages.

mod executor;
mod pipeline;

pub use executor::ActionExecutor;
pub use pipeline::{ModerationOutcome, ModerationPipeline};
