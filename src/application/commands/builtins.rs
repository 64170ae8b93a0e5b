//! Bodies of the built-in commands.

use std::sync::Arc;
use std::time::Duration;

use crate::application::MessageContext;
use crate::domain::commands::{lookup, CommandTier, ParsedCommand};
use crate::domain::foundation::ParticipantId;
use crate::domain::policy::{GroupPolicy, MatchMode, PolicyPatch, WhitelistEntryPatch};
use crate::ports::ParticipantOp;

use super::dispatcher::{CommandDispatcher, CommandFailure};

const MAX_CLEAR: u32 = 100;
const AUTO_UNMUTED: &str = "🔊 Group has been automatically unmuted.";

impl CommandDispatcher {
    pub(super) async fn execute(
        &self,
        ctx: &MessageContext,
        policy: &GroupPolicy,
        command: &ParsedCommand,
    ) -> Result<(), CommandFailure> {
        match command.name.as_str() {
            "menu" => self.menu(ctx, policy).await,
            "rules" => self.rules(ctx, policy).await,
            "info" => self.info(ctx).await,
            "group" => self.group_info(ctx).await,
            "ban" | "kick" => self.remove_member(ctx, command).await,
            "add" => self.add_member(ctx, command).await,
            "promote" => self.change_role(ctx, command, ParticipantOp::Promote).await,
            "demote" => self.change_role(ctx, command, ParticipantOp::Demote).await,
            "mute" => self.mute(ctx, command).await,
            "unmute" => self.unmute(ctx).await,
            "clear" => self.clear(ctx, command).await,
            "setwelcome" => self.set_welcome(ctx, command).await,
            "antilink" => self.antilink(ctx, policy, command).await,
            "warn" => self.warn(ctx, command).await,
            "groups" => self.groups(ctx).await,
            _ => Ok(()),
        }
    }

    async fn menu(&self, ctx: &MessageContext, policy: &GroupPolicy) -> Result<(), CommandFailure> {
        let mut text = String::from("📋 *Available Commands*\n");
        let sections = [
            (CommandTier::Public, "👥 Public Commands"),
            (CommandTier::Admin, "👑 Admin Commands"),
            (CommandTier::Owner, "🔧 Owner Commands"),
        ];
        for (tier, title) in sections {
            let lines: Vec<String> = policy
                .active_commands
                .iter()
                .filter(|(_, setting)| setting.enabled && setting.tier == tier)
                .filter_map(|(name, _)| lookup(name))
                .map(|spec| format!("{}{} - {}", policy.prefix, spec.name, spec.description))
                .collect();
            if !lines.is_empty() {
                text.push_str(&format!("\n*{title}:*\n{}\n", lines.join("\n")));
            }
        }
        ctx.reply(text.trim_end()).await;
        Ok(())
    }

    async fn rules(&self, ctx: &MessageContext, policy: &GroupPolicy) -> Result<(), CommandFailure> {
        let rules = policy
            .rules_message
            .as_deref()
            .unwrap_or("No rules have been set for this group.");
        ctx.reply(&format!("📜 *Group Rules*\n\n{rules}")).await;
        Ok(())
    }

    async fn info(&self, ctx: &MessageContext) -> Result<(), CommandFailure> {
        let uptime = format_uptime(self.bot.started_at.elapsed());
        let text = format!(
            "🤖 *Bot Information*\n\nName: {}\nVersion: {}\nUptime: {uptime}\nStatus: Online ✅\nSession: {}",
            self.bot.name, self.bot.version, ctx.session_id
        );
        ctx.reply(&text).await;
        Ok(())
    }

    async fn group_info(&self, ctx: &MessageContext) -> Result<(), CommandFailure> {
        let metadata = ctx
            .handle
            .fetch_group_metadata(ctx.group())
            .await
            .map_err(|err| CommandFailure::new("❌ Failed to get group information.", err))?;

        let created = metadata
            .created_at
            .map(|ts| ts.as_datetime().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let text = format!(
            "👥 *Group Information*\n\nName: {}\nMembers: {}\nAdmins: {}\nCreated: {created}\nDescription: {}",
            metadata.subject,
            metadata.participants.len(),
            metadata.admin_count(),
            metadata.description.as_deref().unwrap_or("No description"),
        );
        ctx.reply(&text).await;
        Ok(())
    }

    async fn remove_member(&self, ctx: &MessageContext, command: &ParsedCommand) -> Result<(), CommandFailure> {
        let Some((raw, target)) = mentioned(command) else {
            ctx.reply(&format!("❌ Please mention a user to {}.", command.name)).await;
            return Ok(());
        };
        update_one(ctx, target, ParticipantOp::Remove)
            .await
            .map_err(|err| CommandFailure::new("❌ Failed to remove user. Make sure the bot is an admin.", err))?;
        ctx.reply(&format!("✅ User {raw} has been removed from the group.")).await;
        Ok(())
    }

    async fn add_member(&self, ctx: &MessageContext, command: &ParsedCommand) -> Result<(), CommandFailure> {
        let Some(target) = command.arg(0).and_then(ParticipantId::from_phone_number) else {
            ctx.reply("❌ Please provide a phone number to add.").await;
            return Ok(());
        };
        let number = target.as_str().to_string();
        update_one(ctx, target, ParticipantOp::Add).await.map_err(|err| {
            CommandFailure::new(
                "❌ Failed to add user. They might have privacy settings preventing this.",
                err,
            )
        })?;
        ctx.reply(&format!("✅ User +{number} has been added to the group.")).await;
        Ok(())
    }

    async fn change_role(
        &self,
        ctx: &MessageContext,
        command: &ParsedCommand,
        op: ParticipantOp,
    ) -> Result<(), CommandFailure> {
        let Some((raw, target)) = mentioned(command) else {
            ctx.reply(&format!("❌ Please mention a user to {op}.")).await;
            return Ok(());
        };
        let (notice, done) = match op {
            ParticipantOp::Promote => ("❌ Failed to promote user.", "promoted to"),
            _ => ("❌ Failed to demote user.", "demoted from"),
        };
        update_one(ctx, target, op)
            .await
            .map_err(|err| CommandFailure::new(notice, err))?;
        ctx.reply(&format!("✅ User {raw} has been {done} admin.")).await;
        Ok(())
    }

    async fn mute(&self, ctx: &MessageContext, command: &ParsedCommand) -> Result<(), CommandFailure> {
        // Cancels any pending auto-unmute before a new one is scheduled.
        self.policies
            .set_policy(&ctx.group_key(), &PolicyPatch::admin_only(true))
            .await
            .map_err(|err| CommandFailure::new("❌ Failed to mute group.", err))?;

        let mut text = String::from("🔇 Group has been muted. Only admins can send messages.");
        let minutes = command
            .arg(0)
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|m| *m > 0);

        if let Some(minutes) = minutes {
            text.push_str(&format!(" Duration: {minutes} minutes."));
            let policies = Arc::clone(&self.policies);
            let handle = Arc::clone(&ctx.handle);
            let key = ctx.group_key();
            let job_key = key.clone();
            self.policies.mutes().schedule(
                key,
                Duration::from_secs(u64::from(minutes) * 60),
                async move {
                    let group = &job_key.group_id;
                    match policies.auto_unmute(&job_key).await {
                        Ok(_) => {
                            if let Err(err) = handle.send_text(group, AUTO_UNMUTED).await {
                                tracing::warn!(group_id = %group, error = %err, "Failed to announce auto-unmute");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(group_id = %group, error = %err, "Auto-unmute failed");
                        }
                    }
                },
            );
        }

        ctx.reply(&text).await;
        Ok(())
    }

    async fn unmute(&self, ctx: &MessageContext) -> Result<(), CommandFailure> {
        self.policies
            .set_policy(&ctx.group_key(), &PolicyPatch::admin_only(false))
            .await
            .map_err(|err| CommandFailure::new("❌ Failed to unmute group.", err))?;
        ctx.reply("🔊 Group has been unmuted. All members can send messages.").await;
        Ok(())
    }

    async fn clear(&self, ctx: &MessageContext, command: &ParsedCommand) -> Result<(), CommandFailure> {
        let count = command
            .arg(0)
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        if count > MAX_CLEAR {
            ctx.reply(&format!("❌ Cannot delete more than {MAX_CLEAR} messages at once.")).await;
            return Ok(());
        }
        ctx.reply(&format!(
            "🗑️ Attempting to clear {count} message(s). Note: Only recent messages can be deleted."
        ))
        .await;
        Ok(())
    }

    async fn set_welcome(&self, ctx: &MessageContext, command: &ParsedCommand) -> Result<(), CommandFailure> {
        let welcome = command.rest_from(0);
        if welcome.is_empty() {
            ctx.reply("❌ Please provide a welcome message.").await;
            return Ok(());
        }
        let patch = PolicyPatch {
            welcome_message: Some(welcome.clone()),
            ..PolicyPatch::default()
        };
        self.policies
            .set_policy(&ctx.group_key(), &patch)
            .await
            .map_err(|err| CommandFailure::new("❌ Failed to set welcome message.", err))?;
        ctx.reply(&format!("✅ Welcome message has been updated:\n\n{welcome}")).await;
        Ok(())
    }

    async fn antilink(
        &self,
        ctx: &MessageContext,
        policy: &GroupPolicy,
        command: &ParsedCommand,
    ) -> Result<(), CommandFailure> {
        let prefix = &policy.prefix;
        let usage = format!("Usage:\n{prefix}antilink on/off\n{prefix}antilink whitelist add/remove <link>");

        let Some(action) = command.arg(0).map(str::to_lowercase) else {
            let status = if policy.anti_link.active { "enabled" } else { "disabled" };
            ctx.reply(&format!("🔗 Anti-link protection is currently {status}.\n\n{usage}")).await;
            return Ok(());
        };

        let (patch, confirmation) = match action.as_str() {
            "on" | "enable" => (
                PolicyPatch {
                    anti_link_active: Some(true),
                    ..PolicyPatch::default()
                },
                "✅ Anti-link protection enabled.".to_string(),
            ),
            "off" | "disable" => (
                PolicyPatch {
                    anti_link_active: Some(false),
                    ..PolicyPatch::default()
                },
                "❌ Anti-link protection disabled.".to_string(),
            ),
            "whitelist" => {
                let (Some(op), Some(link)) = (command.arg(1).map(str::to_lowercase), command.arg(2)) else {
                    ctx.reply(&format!("❌ Usage: {prefix}antilink whitelist add/remove <link>")).await;
                    return Ok(());
                };
                let mut entries: Vec<WhitelistEntryPatch> = policy
                    .anti_link
                    .whitelist
                    .iter()
                    .map(|entry| WhitelistEntryPatch {
                        pattern: entry.pattern.clone(),
                        match_mode: Some(entry.match_mode.as_str().to_string()),
                    })
                    .collect();
                let confirmation = match op.as_str() {
                    "add" => {
                        entries.push(WhitelistEntryPatch {
                            pattern: link.to_string(),
                            match_mode: Some(MatchMode::Substring.as_str().to_string()),
                        });
                        format!("✅ Added {link} to whitelist.")
                    }
                    "remove" => {
                        entries.retain(|entry| entry.pattern != link);
                        format!("✅ Removed {link} from whitelist.")
                    }
                    _ => {
                        ctx.reply(&format!("❌ Usage: {prefix}antilink whitelist add/remove <link>")).await;
                        return Ok(());
                    }
                };
                (
                    PolicyPatch {
                        whitelist: Some(entries),
                        ..PolicyPatch::default()
                    },
                    confirmation,
                )
            }
            _ => {
                ctx.reply(&usage).await;
                return Ok(());
            }
        };

        self.policies
            .set_policy(&ctx.group_key(), &patch)
            .await
            .map_err(|err| CommandFailure::new("❌ Failed to update anti-link settings.", err))?;
        ctx.reply(&confirmation).await;
        Ok(())
    }

    async fn warn(&self, ctx: &MessageContext, command: &ParsedCommand) -> Result<(), CommandFailure> {
        let Some(user) = command.arg(0) else {
            ctx.reply("❌ Please mention a user to warn.").await;
            return Ok(());
        };
        let reason = command.rest_from(1);
        let reason = if reason.is_empty() { "No reason provided" } else { reason.as_str() };
        ctx.reply(&format!(
            "⚠️ *Warning*\n\nUser: {user}\nReason: {reason}\n\nPlease follow the group rules."
        ))
        .await;
        Ok(())
    }

    async fn groups(&self, ctx: &MessageContext) -> Result<(), CommandFailure> {
        let groups = self
            .policies
            .groups_for(&ctx.session_id)
            .await
            .map_err(|err| CommandFailure::new("❌ Failed to get groups list.", err))?;

        let mut text = format!("📋 *All Groups ({})*\n", groups.len());
        for (index, record) in groups.iter().enumerate() {
            text.push_str(&format!("\n{}. {}\n   ID: {}", index + 1, record.subject, record.group_id));
        }
        ctx.reply(&text).await;
        Ok(())
    }
}

fn mentioned(command: &ParsedCommand) -> Option<(&str, ParticipantId)> {
    let raw = command.arg(0)?;
    ParticipantId::from_mention(raw).map(|id| (raw, id))
}

async fn update_one(
    ctx: &MessageContext,
    target: ParticipantId,
    op: ParticipantOp,
) -> Result<(), crate::ports::ProviderError> {
    ctx.handle
        .update_participants(ctx.group(), &[target], op)
        .await
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}d {}h {}m {}s",
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60
    )
}
