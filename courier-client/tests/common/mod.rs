//! Scripted in-memory platform shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_client::store::SENDING_KEY;
use courier_client::{
    Conversation, GroupPeer, HistoryMessage, InMemoryBackend, InboundMessage, InvocationError,
    Messenger, SendingState, StateBackend,
};

type SendHook = Box<dyn FnMut(usize) + Send>;

#[derive(Default)]
pub struct ScriptedMessenger {
    pub unauthorized:    bool,
    /// Errors handed out, in order, to sends of a given text; other sends succeed.
    pub failures:        Mutex<HashMap<String, VecDeque<InvocationError>>>,
    pub sent:            Mutex<Vec<(String, String)>>,
    pub attempts:        AtomicUsize,
    pub replies:         Mutex<Vec<(GroupPeer, i32, String)>>,
    pub conversations:   Vec<Conversation>,
    pub history:         HashMap<i64, Vec<HistoryMessage>>,
    pub broken_history:  HashSet<i64>,
    pub updates:         Mutex<VecDeque<InboundMessage>>,
    /// Keep `next_update` pending instead of ending the stream when empty.
    pub hang_when_empty: bool,
    pub disconnects:     AtomicUsize,
    pub on_send:         Mutex<Option<SendHook>>,
}

impl ScriptedMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, text: &str, errors: Vec<InvocationError>) -> Self {
        self.failures.lock().unwrap().insert(text.to_owned(), errors.into());
        self
    }

    /// Run `hook(attempt_number)` inside every `send_message`.
    pub fn on_send(self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        *self.on_send.lock().unwrap() = Some(Box::new(hook));
        self
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for ScriptedMessenger {
    async fn is_authorized(&self) -> Result<bool, InvocationError> {
        Ok(!self.unauthorized)
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), InvocationError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = self.on_send.lock().unwrap().as_mut() {
            hook(n);
        }
        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(text)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(e) => Err(e),
            None => {
                self.sent.lock().unwrap().push((recipient.to_owned(), text.to_owned()));
                Ok(())
            }
        }
    }

    async fn reply_to(&self, group: GroupPeer, message_id: i32, text: &str) -> Result<(), InvocationError> {
        self.replies.lock().unwrap().push((group, message_id, text.to_owned()));
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, InvocationError> {
        Ok(self.conversations.clone())
    }

    async fn recent_messages(
        &self,
        conversation: &Conversation,
        limit:        usize,
    ) -> Result<Vec<HistoryMessage>, InvocationError> {
        if self.broken_history.contains(&conversation.id) {
            return Err(InvocationError::PeerNotFound(conversation.name.clone()));
        }
        let mut messages = self.history.get(&conversation.id).cloned().unwrap_or_default();
        messages.truncate(limit);
        Ok(messages)
    }

    async fn next_update(&self) -> Option<InboundMessage> {
        let next = self.updates.lock().unwrap().pop_front();
        match next {
            Some(m) => Some(m),
            None if self.hang_when_empty => std::future::pending().await,
            None => None,
        }
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory backend that keeps every sending document ever saved.
#[derive(Default)]
pub struct RecordingBackend {
    inner:   InMemoryBackend,
    history: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn sending_history(&self) -> Vec<SendingState> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .map(|doc| serde_json::from_str(doc).unwrap())
            .collect()
    }
}

impl StateBackend for RecordingBackend {
    fn save(&self, key: &str, document: &str) -> io::Result<()> {
        if key == SENDING_KEY {
            self.history.lock().unwrap().push(document.to_owned());
        }
        self.inner.save(key, document)
    }

    fn load(&self, key: &str) -> io::Result<Option<String>> {
        self.inner.load(key)
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        self.inner.delete(key)
    }

    fn name(&self) -> &str { "recording" }
}

pub fn group(id: i64, name: &str, last_activity: i64) -> Conversation {
    Conversation {
        id,
        access_hash:   Some(id * 10),
        name:          name.to_owned(),
        is_group:      true,
        last_activity: Some(last_activity),
    }
}

pub fn history(id: i32, text: &str, timestamp: i64) -> HistoryMessage {
    HistoryMessage { id, text: Some(text.to_owned()), timestamp }
}

pub fn report(id: i32, sender: &str, text: &str, timestamp: i64) -> InboundMessage {
    InboundMessage {
        chat_id: 42,
        id,
        sender: sender.to_owned(),
        text: text.to_owned(),
        timestamp,
        is_group: false,
    }
}

pub fn shared(m: ScriptedMessenger) -> Arc<ScriptedMessenger> {
    Arc::new(m)
}
