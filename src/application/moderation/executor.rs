//! ActionExecutor - carries out the action a triggered rule asks for.

use crate::application::{AuditTrail, MessageContext};
use crate::domain::audit::{AuditEntry, AuditKind};
use crate::domain::moderation::Violation;
use crate::domain::policy::RuleAction;
use crate::ports::ParticipantOp;

/// Shared executor for moderation actions.
///
/// | action | effect |
/// |--------|--------|
/// | delete | delete the message |
/// | warn   | delete, then post a warning naming the sender |
/// | mute   | delete the message |
/// | ban    | delete, then remove the sender |
///
/// Provider failures are logged; every execution is audited.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    audit: AuditTrail,
}

impl ActionExecutor {
    pub fn new(audit: AuditTrail) -> Self {
        Self { audit }
    }

    pub async fn execute(&self, ctx: &MessageContext, violation: Violation, evidence: &str) {
        self.delete(ctx).await;

        match violation.action {
            RuleAction::Delete | RuleAction::Mute => {}
            RuleAction::Warn => {
                let warning = format!(
                    "⚠️ Warning: {} - {}",
                    ctx.sender().handle(),
                    violation.rule.reason()
                );
                ctx.reply(&warning).await;
            }
            RuleAction::Ban => {
                let target = [ctx.sender().clone()];
                if let Err(err) = ctx
                    .handle
                    .update_participants(ctx.group(), &target, ParticipantOp::Remove)
                    .await
                {
                    tracing::warn!(
                        session_id = %ctx.session_id,
                        group_id = %ctx.group(),
                        sender = %ctx.sender(),
                        error = %err,
                        "Failed to remove participant"
                    );
                }
            }
        }

        tracing::info!(
            session_id = %ctx.session_id,
            group_id = %ctx.group(),
            rule = %violation.rule,
            action = violation.action.as_str(),
            "Moderation action executed"
        );

        let details = if evidence.is_empty() {
            format!("{} executed for {} - {}", violation.action.as_str(), ctx.sender(), violation.rule.reason())
        } else {
            format!(
                "{} executed for {} - {} ({})",
                violation.action.as_str(),
                ctx.sender(),
                violation.rule.reason(),
                evidence
            )
        };
        self.audit.record(
            AuditEntry::new(ctx.tenant_id.clone(), AuditKind::Action(violation.action), details)
                .for_session(ctx.session_id.clone())
                .in_group(ctx.group().clone())
                .with_rule(violation.rule)
                .by(ctx.sender().clone())
                .for_message(ctx.message.message_ref.clone()),
        );
    }

    /// Delete the message in `ctx`, logging on failure.
    pub async fn delete(&self, ctx: &MessageContext) -> bool {
        match ctx
            .handle
            .delete_message(ctx.group(), &ctx.message.message_ref)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    session_id = %ctx.session_id,
                    group_id = %ctx.group(),
                    error = %err,
                    "Failed to delete message"
                );
                false
            }
        }
    }
}
