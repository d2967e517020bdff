//! The messaging-platform boundary.
//!
//! Everything courier needs from the platform goes through [`Messenger`]:
//! one outbound send primitive, the reply used by the auto-responder, the two
//! scan primitives the fingerprint index is built from, and the inbound
//! message stream the reply monitor consumes.

use async_trait::async_trait;

use crate::errors::InvocationError;

// ─── Conversation ─────────────────────────────────────────────────────────────

/// A dialog as listed by [`Messenger::list_conversations`].
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id:            i64,
    /// Platform access hash needed to address the conversation later, if any.
    pub access_hash:   Option<i64>,
    pub name:          String,
    /// `true` for groups, supergroups and channels.
    pub is_group:      bool,
    /// Unix time of the latest activity; `None` if the platform did not say.
    pub last_activity: Option<i64>,
}

impl Conversation {
    /// Address of this conversation for [`Messenger::reply_to`].
    pub fn peer(&self) -> GroupPeer {
        GroupPeer { id: self.id, access_hash: self.access_hash }
    }
}

/// Enough to address a group conversation without listing dialogs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupPeer {
    pub id:          i64,
    pub access_hash: Option<i64>,
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// One message from a conversation's recent history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryMessage {
    pub id:        i32,
    /// Text or caption; `None` for media without caption and service messages.
    pub text:      Option<String>,
    /// Unix time the message was sent.
    pub timestamp: i64,
}

/// A new message pushed by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Conversation the message arrived in.
    pub chat_id:   i64,
    pub id:        i32,
    /// Handle of the sender (`@username` or numeric id as text).
    pub sender:    String,
    pub text:      String,
    pub timestamp: i64,
    /// `true` if the message was posted in a group or channel.
    pub is_group:  bool,
}

impl InboundMessage {
    /// Key under which the monitor remembers having handled this message.
    pub fn key(&self) -> String {
        format!("{}:{}", self.chat_id, self.id)
    }
}

// ─── Messenger ────────────────────────────────────────────────────────────────

/// An authorized session on the messaging platform.
///
/// Implementations must be cheap to share behind an `Arc`; the send pipeline
/// and the reply monitor may hold the same instance concurrently.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Whether the session is logged in.
    async fn is_authorized(&self) -> Result<bool, InvocationError>;

    /// Send `text` to `recipient` (`@username`, phone or numeric id).
    ///
    /// Rate limiting surfaces as [`InvocationError::Rpc`] with a
    /// `FLOOD_WAIT` name; see [`InvocationError::flood_wait_seconds`].
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), InvocationError>;

    /// Reply to message `message_id` in `group`.
    async fn reply_to(
        &self,
        group:      GroupPeer,
        message_id: i32,
        text:       &str,
    ) -> Result<(), InvocationError>;

    /// All dialogs of the account.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, InvocationError>;

    /// Up to `limit` messages of `conversation`, newest first.
    async fn recent_messages(
        &self,
        conversation: &Conversation,
        limit:        usize,
    ) -> Result<Vec<HistoryMessage>, InvocationError>;

    /// Wait for the next inbound message. Returns `None` once the stream ends.
    async fn next_update(&self) -> Option<InboundMessage>;

    /// Release the session. Called once when a send job terminates.
    async fn disconnect(&self);
}
