//! CommandDispatcher - recognizes, authorizes and runs prefixed commands.
//!
//! A recognized command runs at most one bounded side effect and always
//! leaves an audit entry behind:
//!
//! - `command_executed` when it ran (including usage notices)
//! - `command_denied` when the sender lacks the tier
//! - `command_failed` when the provider or policy store failed

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::application::{AuditTrail, MessageContext, PolicyService};
use crate::domain::audit::{AuditEntry, AuditKind};
use crate::domain::commands::{lookup, CommandTier, ParsedCommand};
use crate::domain::policy::GroupPolicy;
use crate::ports::TenantDirectory;

pub(super) const PERMISSION_DENIED: &str = "❌ You don't have permission to use this command.";

/// Identity reported by the `info` command.
#[derive(Debug, Clone)]
pub struct BotProfile {
    pub name: String,
    pub version: String,
    pub started_at: Instant,
}

impl BotProfile {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            started_at: Instant::now(),
        }
    }
}

/// Result of dispatching one prefixed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Unknown, disabled or empty command name; nothing happened.
    Ignored,
    Executed { command: String },
    PermissionDenied { command: String },
    Failed { command: String, reason: String },
}

/// A command whose side effect could not be completed.
///
/// `notice` is what the group sees; the cause only goes to logs and audit.
#[derive(Debug, Error)]
#[error("{cause}")]
pub(super) struct CommandFailure {
    pub notice: &'static str,
    pub cause: String,
}

impl CommandFailure {
    pub fn new(notice: &'static str, cause: impl std::fmt::Display) -> Self {
        Self {
            notice,
            cause: cause.to_string(),
        }
    }
}

pub struct CommandDispatcher {
    pub(super) policies: Arc<PolicyService>,
    tenants: Arc<dyn TenantDirectory>,
    audit: AuditTrail,
    pub(super) bot: BotProfile,
}

impl CommandDispatcher {
    pub fn new(
        policies: Arc<PolicyService>,
        tenants: Arc<dyn TenantDirectory>,
        audit: AuditTrail,
        bot: BotProfile,
    ) -> Self {
        Self {
            policies,
            tenants,
            audit,
            bot,
        }
    }

    pub async fn dispatch(
        &self,
        ctx: &MessageContext,
        policy: &GroupPolicy,
        command: &ParsedCommand,
    ) -> CommandOutcome {
        if command.name.is_empty() || lookup(&command.name).is_none() {
            return CommandOutcome::Ignored;
        }
        let Some(setting) = policy.enabled_command(&command.name) else {
            tracing::debug!(group_id = %ctx.group(), command = %command.name, "Command disabled");
            return CommandOutcome::Ignored;
        };

        let name = command.name.clone();
        if !self.authorize(ctx, setting.tier).await {
            tracing::info!(
                session_id = %ctx.session_id,
                group_id = %ctx.group(),
                sender = %ctx.sender(),
                command = %name,
                tier = %setting.tier,
                "Command denied"
            );
            ctx.reply(PERMISSION_DENIED).await;
            self.record(ctx, AuditKind::CommandDenied, format!("Command: {name}, tier: {}", setting.tier));
            return CommandOutcome::PermissionDenied { command: name };
        }

        match self.execute(ctx, policy, command).await {
            Ok(()) => {
                tracing::debug!(group_id = %ctx.group(), command = %name, "Command executed");
                self.record(
                    ctx,
                    AuditKind::CommandExecuted,
                    format!("Command: {name}, Args: {}", command.args.join(" ")),
                );
                CommandOutcome::Executed { command: name }
            }
            Err(failure) => {
                tracing::warn!(
                    session_id = %ctx.session_id,
                    group_id = %ctx.group(),
                    command = %name,
                    error = %failure,
                    "Command failed"
                );
                ctx.reply(failure.notice).await;
                self.record(ctx, AuditKind::CommandFailed, format!("Command: {name}, error: {failure}"));
                CommandOutcome::Failed {
                    command: name,
                    reason: failure.cause,
                }
            }
        }
    }

    /// Whether the sender may run a command of `tier`.
    ///
    /// Lookup failures deny.
    async fn authorize(&self, ctx: &MessageContext, tier: CommandTier) -> bool {
        match tier {
            CommandTier::Public => true,
            CommandTier::Admin => match ctx.handle.fetch_group_metadata(ctx.group()).await {
                Ok(metadata) => metadata.is_admin(ctx.sender()),
                Err(err) => {
                    tracing::warn!(group_id = %ctx.group(), error = %err, "Admin check failed");
                    false
                }
            },
            CommandTier::Owner => self.is_owner(ctx).await,
        }
    }

    async fn is_owner(&self, ctx: &MessageContext) -> bool {
        let role = match self.tenants.role(&ctx.tenant_id).await {
            Ok(role) => role,
            Err(err) => {
                tracing::warn!(tenant_id = %ctx.tenant_id, error = %err, "Tenant role lookup failed");
                return false;
            }
        };
        if !role.is_elevated() {
            return false;
        }
        if ctx
            .identity
            .as_ref()
            .is_some_and(|identity| &identity.account == ctx.sender())
        {
            return true;
        }
        match self.tenants.linked_accounts(&ctx.tenant_id).await {
            Ok(accounts) => accounts.contains(ctx.sender()),
            Err(err) => {
                tracing::warn!(tenant_id = %ctx.tenant_id, error = %err, "Linked account lookup failed");
                false
            }
        }
    }

    fn record(&self, ctx: &MessageContext, kind: AuditKind, details: String) {
        self.audit.record(
            AuditEntry::new(ctx.tenant_id.clone(), kind, details)
                .for_session(ctx.session_id.clone())
                .in_group(ctx.group().clone())
                .by(ctx.sender().clone())
                .for_message(ctx.message.message_ref.clone()),
        );
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("bot", &self.bot)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryLogRepository, InMemoryPolicyRepository, InMemoryTenantDirectory};
    use crate::adapters::provider::{HandleOp, InMemoryConnectionProvider, OutboundCall};
    use crate::application::test_support::{context, group, key, message, open_handle, participant, session, tenant, RecordingPublisher};
    use crate::application::MuteScheduler;
    use crate::domain::policy::{GroupRecord, PolicyPatch};
    use crate::domain::session::SessionIdentity;
    use crate::ports::{ConnectionHandle, ParticipantOp, ProviderSession, TenantRole};
    use std::time::Duration;

    struct Fixture {
        provider: InMemoryConnectionProvider,
        handle: Arc<dyn ConnectionHandle>,
        dispatcher: CommandDispatcher,
        policies: Arc<PolicyService>,
        tenants: Arc<InMemoryTenantDirectory>,
        audit: AuditTrail,
        log: Arc<InMemoryLogRepository>,
        _session: ProviderSession,
    }

    async fn fixture() -> Fixture {
        let provider = InMemoryConnectionProvider::new();
        let (handle, opened) = open_handle(&provider).await;
        let log = Arc::new(InMemoryLogRepository::new());
        let (audit, _task) = AuditTrail::spawn(log.clone(), 64);
        let policies = Arc::new(PolicyService::new(
            Arc::new(InMemoryPolicyRepository::new()),
            Arc::new(RecordingPublisher::new()),
            Arc::new(MuteScheduler::new()),
        ));
        policies
            .record_group(GroupRecord::discovered(group(), session(), "Test Group"))
            .await
            .unwrap();
        let tenants = Arc::new(InMemoryTenantDirectory::new());
        let dispatcher = CommandDispatcher::new(
            policies.clone(),
            tenants.clone(),
            audit.clone(),
            BotProfile::new("Group Sentinel", "0.1.0"),
        );
        Fixture {
            provider,
            handle,
            dispatcher,
            policies,
            tenants,
            audit,
            log,
            _session: opened,
        }
    }

    impl Fixture {
        async fn run(&self, sender: &str, body: &str) -> CommandOutcome {
            self.run_as(sender, body, None).await
        }

        async fn run_as(&self, sender: &str, body: &str, identity: Option<SessionIdentity>) -> CommandOutcome {
            let policy = self.policies.get_policy(&key()).await.unwrap();
            let command = ParsedCommand::parse(body, &policy.prefix).expect("prefixed");
            let mut ctx = context(Arc::clone(&self.handle), message(sender, body));
            ctx.identity = identity;
            self.dispatcher.dispatch(&ctx, &policy, &command).await
        }

        async fn texts(&self) -> Vec<String> {
            self.provider.sent_texts(&session()).await
        }

        async fn audit_kinds(&self) -> Vec<AuditKind> {
            self.audit.flush().await;
            self.log.entries().await.into_iter().map(|e| e.kind).collect()
        }
    }

    fn executed(name: &str) -> CommandOutcome {
        CommandOutcome::Executed { command: name.to_string() }
    }

    #[tokio::test]
    async fn public_command_runs_for_anyone() {
        let f = fixture().await;
        assert_eq!(f.run("member@s.net", "!rules").await, executed("rules"));
        assert_eq!(
            f.texts().await,
            vec!["📜 *Group Rules*\n\nNo rules have been set for this group.".to_string()]
        );
        assert_eq!(f.audit_kinds().await, vec![AuditKind::CommandExecuted]);
    }

    #[tokio::test]
    async fn admin_command_is_denied_for_members() {
        let f = fixture().await;
        let outcome = f.run("member@s.net", "!ban @someone").await;

        assert_eq!(outcome, CommandOutcome::PermissionDenied { command: "ban".into() });
        assert_eq!(f.texts().await, vec![PERMISSION_DENIED.to_string()]);
        assert!(!f
            .provider
            .calls()
            .await
            .iter()
            .any(|c| matches!(c, OutboundCall::Participants { .. })));
        assert_eq!(f.audit_kinds().await, vec![AuditKind::CommandDenied]);
    }

    #[tokio::test]
    async fn admin_command_runs_for_admins() {
        let f = fixture().await;
        assert_eq!(f.run("admin@s.net", "!kick @15551234").await, executed("kick"));

        let calls = f.provider.calls().await;
        assert!(calls.iter().any(|c| matches!(
            c,
            OutboundCall::Participants { op: ParticipantOp::Remove, participants, .. }
                if participants == &vec![participant("15551234")]
        )));
        assert_eq!(
            f.texts().await.last().map(String::as_str),
            Some("✅ User @15551234 has been removed from the group.")
        );
    }

    #[tokio::test]
    async fn metadata_failure_denies_admin_commands() {
        let f = fixture().await;
        f.provider.fail_operation(HandleOp::GroupMetadata, true).await;
        assert!(matches!(
            f.run("admin@s.net", "!mute").await,
            CommandOutcome::PermissionDenied { .. }
        ));
    }

    #[tokio::test]
    async fn unknown_and_empty_commands_are_ignored() {
        let f = fixture().await;
        assert_eq!(f.run("member@s.net", "!doesnotexist").await, CommandOutcome::Ignored);
        assert_eq!(f.run("member@s.net", "!").await, CommandOutcome::Ignored);
        assert!(f.texts().await.is_empty());
        assert!(f.audit_kinds().await.is_empty());
    }

    #[tokio::test]
    async fn disabled_command_is_ignored() {
        let f = fixture().await;
        let patch: PolicyPatch =
            serde_json::from_str(r#"{"activeCommands": {"rules": {"enabled": false}}}"#).unwrap();
        f.policies.set_policy(&key(), &patch).await.unwrap();

        assert_eq!(f.run("member@s.net", "!rules").await, CommandOutcome::Ignored);
    }

    #[tokio::test]
    async fn retiered_command_follows_group_setting() {
        let f = fixture().await;
        let patch: PolicyPatch =
            serde_json::from_str(r#"{"activeCommands": {"rules": {"tier": "admin"}}}"#).unwrap();
        f.policies.set_policy(&key(), &patch).await.unwrap();

        assert!(matches!(
            f.run("member@s.net", "!rules").await,
            CommandOutcome::PermissionDenied { .. }
        ));
    }

    #[tokio::test]
    async fn missing_argument_sends_usage_and_counts_as_executed() {
        let f = fixture().await;
        assert_eq!(f.run("admin@s.net", "!ban").await, executed("ban"));
        assert_eq!(f.texts().await, vec!["❌ Please mention a user to ban.".to_string()]);
        assert_eq!(f.audit_kinds().await, vec![AuditKind::CommandExecuted]);
    }

    #[tokio::test]
    async fn provider_failure_sends_notice_and_audits_failure() {
        let f = fixture().await;
        f.provider.fail_operation(HandleOp::Participants, true).await;

        let outcome = f.run("admin@s.net", "!promote @15551234").await;
        assert!(matches!(outcome, CommandOutcome::Failed { ref command, .. } if command == "promote"));
        assert_eq!(f.texts().await, vec!["❌ Failed to promote user.".to_string()]);
        assert_eq!(f.audit_kinds().await, vec![AuditKind::CommandFailed]);
    }

    #[tokio::test]
    async fn owner_command_requires_elevated_linked_account() {
        let f = fixture().await;
        assert!(matches!(
            f.run("admin@s.net", "!groups").await,
            CommandOutcome::PermissionDenied { .. }
        ));

        f.tenants.set_role(tenant(), TenantRole::Admin).await;
        assert!(matches!(
            f.run("admin@s.net", "!groups").await,
            CommandOutcome::PermissionDenied { .. }
        ));

        f.tenants.link_account(tenant(), participant("admin@s.net")).await;
        assert_eq!(f.run("admin@s.net", "!groups").await, executed("groups"));
        assert!(f
            .texts()
            .await
            .last()
            .is_some_and(|t| t.starts_with("📋 *All Groups (1)*") && t.contains("Test Group")));
    }

    #[tokio::test]
    async fn session_identity_counts_as_owner() {
        let f = fixture().await;
        f.tenants.set_role(tenant(), TenantRole::Admin).await;
        let identity = SessionIdentity {
            account: participant("bot@s.net"),
            display_name: None,
        };
        assert_eq!(f.run_as("bot@s.net", "!groups", Some(identity)).await, executed("groups"));
    }

    #[tokio::test]
    async fn menu_lists_enabled_commands_by_tier() {
        let f = fixture().await;
        f.run("member@s.net", "!menu").await;
        let menu = f.texts().await.remove(0);
        assert!(menu.contains("*👥 Public Commands:*\n!group - Group information"));
        assert!(menu.contains("!ban - Ban a user from the group"));
        assert!(menu.contains("*🔧 Owner Commands:*\n!groups - List all groups"));
    }

    #[tokio::test]
    async fn setwelcome_updates_policy() {
        let f = fixture().await;
        assert_eq!(f.run("admin@s.net", "!setwelcome Hello   and welcome").await, executed("setwelcome"));
        let policy = f.policies.get_policy(&key()).await.unwrap();
        assert_eq!(policy.welcome_message.as_deref(), Some("Hello and welcome"));
    }

    #[tokio::test]
    async fn antilink_toggles_and_edits_whitelist() {
        let f = fixture().await;
        f.run("admin@s.net", "!antilink on").await;
        f.run("admin@s.net", "!antilink whitelist add youtube.com").await;
        f.run("admin@s.net", "!antilink whitelist add example.org").await;
        f.run("admin@s.net", "!antilink whitelist remove youtube.com").await;

        let policy = f.policies.get_policy(&key()).await.unwrap();
        assert!(policy.anti_link.active);
        let patterns: Vec<_> = policy.anti_link.whitelist.iter().map(|e| e.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["example.org"]);
    }

    #[tokio::test]
    async fn clear_rejects_more_than_one_hundred() {
        let f = fixture().await;
        f.run("admin@s.net", "!clear 101").await;
        f.run("admin@s.net", "!clear 5").await;
        assert_eq!(
            f.texts().await,
            vec![
                "❌ Cannot delete more than 100 messages at once.".to_string(),
                "🗑️ Attempting to clear 5 message(s). Note: Only recent messages can be deleted.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn group_command_reports_metadata() {
        let f = fixture().await;
        f.run("member@s.net", "!group").await;
        let text = f.texts().await.remove(0);
        assert!(text.contains("Name: Test Group"));
        assert!(text.contains("Members: 2"));
        assert!(text.contains("Admins: 1"));
        assert!(text.contains("Created: 2023-11-14"));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_mute_unmutes_automatically() {
        let f = fixture().await;
        assert_eq!(f.run("admin@s.net", "!mute 1").await, executed("mute"));
        assert!(f.policies.get_policy(&key()).await.unwrap().admin_only_mode);
        assert!(f.policies.mutes().is_scheduled(&key()));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(!f.policies.get_policy(&key()).await.unwrap().admin_only_mode);
        assert!(!f.policies.mutes().is_scheduled(&key()));
        assert_eq!(
            f.texts().await.last().map(String::as_str),
            Some("🔊 Group has been automatically unmuted.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unmute_cancels_pending_auto_unmute() {
        let f = fixture().await;
        f.run("admin@s.net", "!mute 10").await;
        f.run("admin@s.net", "!unmute").await;
        assert!(!f.policies.mutes().is_scheduled(&key()));

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(!f
            .texts()
            .await
            .iter()
            .any(|t| t.contains("automatically unmuted")));
    }
}
