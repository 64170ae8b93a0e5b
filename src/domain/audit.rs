//! Audit entries written for every moderation and command decision.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::domain::foundation::{GroupId, MessageRef, ParticipantId, SessionId, TenantId, Timestamp};
use crate::domain::moderation::RuleTag;
use crate::domain::policy::RuleAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditKind {
    SessionCreated,
    SessionDeleted,
    GroupsSynced,
    MessageReceived,
    MessageDeleted,
    Action(RuleAction),
    CommandExecuted,
    CommandDenied,
    CommandFailed,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::SessionCreated => "session_created",
            AuditKind::SessionDeleted => "session_deleted",
            AuditKind::GroupsSynced => "groups_synced",
            AuditKind::MessageReceived => "message_received",
            AuditKind::MessageDeleted => "message_deleted",
            AuditKind::Action(RuleAction::Delete) => "action_delete",
            AuditKind::Action(RuleAction::Warn) => "action_warn",
            AuditKind::Action(RuleAction::Mute) => "action_mute",
            AuditKind::Action(RuleAction::Ban) => "action_ban",
            AuditKind::CommandExecuted => "command_executed",
            AuditKind::CommandDenied => "command_denied",
            AuditKind::CommandFailed => "command_failed",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AuditKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One audit record handed to the log repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub tenant_id: TenantId,
    pub session_id: Option<SessionId>,
    pub group_id: Option<GroupId>,
    pub kind: AuditKind,
    pub rule: Option<RuleTag>,
    pub details: String,
    pub actor: Option<ParticipantId>,
    pub message_ref: Option<MessageRef>,
    pub timestamp: Timestamp,
}

impl AuditEntry {
    pub fn new(tenant_id: TenantId, kind: AuditKind, details: impl Into<String>) -> Self {
        Self {
            tenant_id,
            session_id: None,
            group_id: None,
            kind,
            rule: None,
            details: details.into(),
            actor: None,
            message_ref: None,
            timestamp: Timestamp::now(),
        }
    }

    pub fn for_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_rule(mut self, rule: RuleTag) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn by(mut self, actor: ParticipantId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn for_message(mut self, message_ref: MessageRef) -> Self {
        self.message_ref = Some(message_ref);
        self
    }
}
