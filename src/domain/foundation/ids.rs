//! Strongly-typed identifier value objects.
//!
//! Identifiers handed to us by the messaging network (conversation ids,
//! participant ids, message refs) are opaque strings; we never parse them
//! beyond trimming and emptiness checks.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ValidationError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, returning error if empty or blank.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Platform account that owns sessions, groups and policies.
    TenantId,
    "tenant_id"
);

string_id!(
    /// One authenticated connection to the messaging network.
    SessionId,
    "session_id"
);

string_id!(
    /// Group conversation identifier as reported by the network.
    GroupId,
    "group_id"
);

string_id!(
    /// A participant account inside the network.
    ParticipantId,
    "participant_id"
);

string_id!(
    /// Reference to a single message, used for deletion and auditing.
    MessageRef,
    "message_ref"
);

string_id!(
    /// Operator (dashboard user) identifier for realtime channels.
    UserId,
    "user_id"
);

impl SessionId {
    /// Generates a fresh session id scoped to a tenant.
    pub fn generate(tenant: &TenantId) -> Self {
        Self(format!("session_{}_{}", tenant, Uuid::new_v4().simple()))
    }
}

impl ParticipantId {
    /// Builds a participant id from an in-chat mention such as `@15551234`.
    ///
    /// Returns `None` when nothing remains after stripping the mention marker.
    pub fn from_mention(mention: &str) -> Option<Self> {
        Self::new(mention.trim().trim_start_matches('@')).ok()
    }

    /// Builds a participant id from a phone number, keeping digits only.
    pub fn from_phone_number(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        Self::new(digits).ok()
    }

    /// Short human handle: the part before any `@` or `:` suffix.
    pub fn handle(&self) -> &str {
        self.0
            .split(|c| c == '@' || c == ':')
            .next()
            .unwrap_or(&self.0)
    }
}
