//! Dry-run messenger: prints outbound traffic, reads inbound traffic from stdin.
//!
//! Conversations and their recent history come from an optional JSON fixture:
//!
//! ```json
//! [
//!   { "id": -1001, "name": "deals", "is_group": true, "last_activity": 1700000000,
//!     "messages": [ { "id": 11, "text": "selling +1 555 010 0199", "timestamp": 1699999990 } ] }
//! ]
//! ```
//!
//! Each stdin line `sender: text` becomes one inbound private message.

use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use courier::client::{Conversation, GroupPeer, HistoryMessage, InboundMessage};
use courier::{InvocationError, Messenger};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

#[derive(Deserialize)]
struct FixtureMessage {
    id:        i32,
    text:      Option<String>,
    timestamp: i64,
}

#[derive(Deserialize)]
struct FixtureConversation {
    id:            i64,
    #[serde(default)]
    access_hash:   Option<i64>,
    name:          String,
    #[serde(default)]
    is_group:      bool,
    #[serde(default)]
    last_activity: Option<i64>,
    #[serde(default)]
    messages:      Vec<FixtureMessage>,
}

pub struct ConsoleMessenger {
    conversations: Vec<FixtureConversation>,
    stdin:         Mutex<Lines<BufReader<Stdin>>>,
    next_id:       AtomicI32,
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self {
            conversations: Vec::new(),
            stdin:         Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            next_id:       AtomicI32::new(1),
        }
    }

    /// Load conversations and history from the JSON fixture at `path`.
    pub fn with_fixture(mut self, path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        self.conversations = serde_json::from_str(&raw)?;
        Ok(self)
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn is_authorized(&self) -> Result<bool, InvocationError> {
        Ok(true)
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), InvocationError> {
        println!("→ {recipient}: {text}");
        Ok(())
    }

    async fn reply_to(&self, group: GroupPeer, message_id: i32, text: &str) -> Result<(), InvocationError> {
        println!("↩ {}#{message_id}: {text}", group.id);
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, InvocationError> {
        Ok(self
            .conversations
            .iter()
            .map(|c| Conversation {
                id:            c.id,
                access_hash:   c.access_hash,
                name:          c.name.clone(),
                is_group:      c.is_group,
                last_activity: c.last_activity,
            })
            .collect())
    }

    async fn recent_messages(
        &self,
        conversation: &Conversation,
        limit:        usize,
    ) -> Result<Vec<HistoryMessage>, InvocationError> {
        let Some(found) = self.conversations.iter().find(|c| c.id == conversation.id) else {
            return Err(InvocationError::PeerNotFound(conversation.name.clone()));
        };
        let mut messages: Vec<HistoryMessage> = found
            .messages
            .iter()
            .map(|m| HistoryMessage { id: m.id, text: m.text.clone(), timestamp: m.timestamp })
            .collect();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn next_update(&self) -> Option<InboundMessage> {
        let mut lines = self.stdin.lock().await;
        loop {
            let line = lines.next_line().await.ok()??;
            let Some((sender, text)) = line.split_once(':') else {
                eprintln!("expected `sender: text`, got {line:?}");
                continue;
            };
            return Some(InboundMessage {
                chat_id:   0,
                id:        self.next_id.fetch_add(1, Ordering::Relaxed),
                sender:    sender.trim().to_owned(),
                text:      text.trim().to_owned(),
                timestamp: chrono::Utc::now().timestamp(),
                is_group:  false,
            });
        }
    }

    async fn disconnect(&self) {
        println!("(session released)");
    }
}
