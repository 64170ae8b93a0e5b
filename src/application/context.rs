use std::fmt;
use std::sync::Arc;

use crate::domain::foundation::{GroupId, ParticipantId, SessionId, TenantId};
use crate::domain::policy::GroupKey;
use crate::domain::session::SessionIdentity;
use crate::ports::{ConnectionHandle, InboundMessage};

/// Everything a lane knows about one inbound group message.
#[derive(Clone)]
pub struct MessageContext {
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    /// Account the session is logged in as, once connected.
    pub identity: Option<SessionIdentity>,
    pub handle: Arc<dyn ConnectionHandle>,
    pub message: InboundMessage,
}

impl MessageContext {
    pub fn group(&self) -> &GroupId {
        &self.message.conversation_id
    }

    /// The message's group as seen through this session.
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.session_id.clone(), self.message.conversation_id.clone())
    }

    pub fn sender(&self) -> &ParticipantId {
        &self.message.sender
    }

    pub fn body(&self) -> &str {
        &self.message.body
    }

    /// Send `text` to the message's group, logging instead of failing.
    pub async fn reply(&self, text: &str) -> bool {
        match self.handle.send_text(self.group(), text).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    group_id = %self.group(),
                    error = %err,
                    "Failed to send group message"
                );
                false
            }
        }
    }
}

impl fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("tenant_id", &self.tenant_id)
            .field("session_id", &self.session_id)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
