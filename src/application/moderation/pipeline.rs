//! ModerationPipeline - ordered, short-circuiting policy evaluation.
//!
//! Precedence is fixed: admin-only gate, anti-link, anti-profanity,
//! anti-flood, then auto-response. The first rule that triggers runs its
//! action and stops evaluation; auto-responses only fire for messages no
//! rule acted on.

use std::sync::Arc;

use crate::application::{AuditTrail, MessageContext};
use crate::domain::audit::{AuditEntry, AuditKind};
use crate::domain::moderation::{find_prohibited, first_unwhitelisted, match_auto_response, RuleTag, Violation};
use crate::domain::policy::{GroupPolicy, RuleAction};
use crate::ports::{FloodKey, FloodTracker};

use super::ActionExecutor;

/// What the pipeline did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationOutcome {
    /// A rule triggered and its action ran.
    Actioned(Violation),
    /// No rule triggered; an auto-response was sent.
    AutoReplied,
    /// Nothing to do.
    Passed,
}

pub struct ModerationPipeline {
    flood: Arc<dyn FloodTracker>,
    executor: ActionExecutor,
    audit: AuditTrail,
}

impl ModerationPipeline {
    pub fn new(flood: Arc<dyn FloodTracker>, audit: AuditTrail) -> Self {
        Self {
            flood,
            executor: ActionExecutor::new(audit.clone()),
            audit,
        }
    }

    pub async fn evaluate(&self, ctx: &MessageContext, policy: &GroupPolicy) -> ModerationOutcome {
        if policy.admin_only_mode && self.blocked_by_admin_only(ctx).await {
            self.executor.delete(ctx).await;
            self.audit.record(
                AuditEntry::new(
                    ctx.tenant_id.clone(),
                    AuditKind::MessageDeleted,
                    "Message deleted due to admin-only mode",
                )
                .for_session(ctx.session_id.clone())
                .in_group(ctx.group().clone())
                .with_rule(RuleTag::AdminOnly)
                .by(ctx.sender().clone())
                .for_message(ctx.message.message_ref.clone()),
            );
            return ModerationOutcome::Actioned(Violation {
                rule: RuleTag::AdminOnly,
                action: RuleAction::Delete,
            });
        }

        if let Some((violation, evidence)) = self.check_rules(ctx, policy).await {
            self.executor.execute(ctx, violation, &evidence).await;
            return ModerationOutcome::Actioned(violation);
        }

        if let Some(auto) = match_auto_response(ctx.body(), &policy.auto_responses) {
            tracing::debug!(group_id = %ctx.group(), keyword = %auto.keyword, "Auto-response matched");
            ctx.reply(&auto.response).await;
            return ModerationOutcome::AutoReplied;
        }

        ModerationOutcome::Passed
    }

    /// True when the sender is not a group admin. A failed metadata lookup
    /// lets the message through.
    async fn blocked_by_admin_only(&self, ctx: &MessageContext) -> bool {
        match ctx.handle.fetch_group_metadata(ctx.group()).await {
            Ok(metadata) => !metadata.is_admin(ctx.sender()),
            Err(err) => {
                tracing::warn!(
                    session_id = %ctx.session_id,
                    group_id = %ctx.group(),
                    error = %err,
                    "Group metadata unavailable, skipping admin-only check"
                );
                false
            }
        }
    }

    async fn check_rules(&self, ctx: &MessageContext, policy: &GroupPolicy) -> Option<(Violation, String)> {
        let body = ctx.body();

        if policy.anti_link.active {
            if let Some(link) = first_unwhitelisted(body, &policy.anti_link.whitelist) {
                return Some((
                    Violation {
                        rule: RuleTag::AntiLink,
                        action: policy.anti_link.action,
                    },
                    link.to_string(),
                ));
            }
        }

        if policy.anti_profanity.active {
            if let Some(word) = find_prohibited(body, &policy.anti_profanity.prohibited_words) {
                return Some((
                    Violation {
                        rule: RuleTag::AntiProfanity,
                        action: policy.anti_profanity.action,
                    },
                    word.to_string(),
                ));
            }
        }

        if policy.anti_flood.active {
            let key = FloodKey::new(ctx.group_key(), ctx.sender().clone());
            let check = self
                .flood
                .record(&key, policy.anti_flood.limit, policy.anti_flood.timeframe())
                .await;
            if check.triggered {
                return Some((
                    Violation {
                        rule: RuleTag::AntiFlood,
                        action: policy.anti_flood.action,
                    },
                    format!(
                        "{} messages in {}s",
                        check.count, policy.anti_flood.timeframe_seconds
                    ),
                ));
            }
        }

        None
    }
}

impl std::fmt::Debug for ModerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationPipeline").finish_non_exhaustive()
    }
}
