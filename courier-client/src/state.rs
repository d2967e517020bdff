//! The two persisted state documents.
//!
//! [`SendingState`] is owned by the send pipeline and [`ReplyState`] by the
//! reply monitor; both are stored as single JSON documents under fixed keys
//! (see [`crate::store`]).

use std::collections::{BTreeMap, BTreeSet};

use courier_ingest::SendMode;
use serde::{Deserialize, Serialize};

use crate::cache::{BucketCache, CacheEntry};

/// Default for [`ReplyState::duplicate_time_window`], in seconds.
pub const DEFAULT_DUPLICATE_WINDOW_SECS: i64 = 1800;

// ─── SendingState ─────────────────────────────────────────────────────────────

/// Live progress of the current (or last) send job.
///
/// `sent_count + failed_count <= current_message <= total_messages` holds at
/// every persist point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendingState {
    pub is_sending:          bool,
    /// Cooperative cancellation request; cleared when the job terminates.
    pub should_stop:         bool,
    pub is_paused:           bool,
    /// Seconds left in the current cooldown pause.
    pub pause_countdown:     u64,
    /// 1-based index of the unit in flight, across the whole job.
    pub current_message:     u64,
    /// Units (messages) the job will attempt.
    pub total_messages:      u64,
    pub sent_count:          u64,
    pub failed_count:        u64,
    /// Unix time the job started.
    pub start_time:          Option<i64>,
    pub estimated_remaining: u64,
    /// Messages per minute since the job started.
    pub sending_speed:       f64,
    pub current_recipient:   String,
    pub send_mode:           Option<SendMode>,
    /// Text of the unit in flight.
    pub current_item:        String,
    pub last_message_sent:   String,
}

impl SendingState {
    /// State at the start of a job: counters reset, sending, not stopping.
    pub fn started(recipient: &str, mode: SendMode, total: u64, now: i64) -> Self {
        Self {
            is_sending:        true,
            total_messages:    total,
            start_time:        Some(now),
            current_recipient: recipient.to_owned(),
            send_mode:         Some(mode),
            ..Default::default()
        }
    }

    /// Units that have reached a terminal outcome.
    pub fn processed(&self) -> u64 {
        self.sent_count + self.failed_count
    }

    /// Fraction of the job attempted so far, `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total_messages == 0 {
            return 0.0;
        }
        self.current_message as f64 / self.total_messages as f64
    }

    /// Recomputes [`Self::sending_speed`] and [`Self::estimated_remaining`]
    /// from `elapsed_secs` since the job started.
    pub fn update_rates(&mut self, elapsed_secs: f64) {
        if elapsed_secs <= 0.0 || self.sent_count == 0 {
            self.sending_speed = 0.0;
            self.estimated_remaining = 0;
            return;
        }
        let sent = self.sent_count as f64;
        self.sending_speed = sent * 60.0 / elapsed_secs;
        let remaining = self.total_messages.saturating_sub(self.current_message);
        self.estimated_remaining = (remaining as f64 * elapsed_secs / sent).ceil() as u64;
    }

    /// Marks the job finished, whatever the exit path.
    pub fn finish(&mut self) {
        self.is_sending = false;
        self.should_stop = false;
        self.is_paused = false;
        self.pause_countdown = 0;
    }
}

// ─── MessageRef ───────────────────────────────────────────────────────────────

/// A cached pointer to a group message that carried a candidate number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRef {
    pub group_id:          i64,
    pub access_hash:       Option<i64>,
    pub message_id:        i32,
    pub fingerprint:       String,
    pub group_name:        String,
    /// All digits of the candidate the fingerprint was derived from.
    pub raw_digits:        String,
    /// Unix time the group message was sent.
    pub message_timestamp: i64,
    /// Unix time the ref entered the index.
    pub cached_at:         i64,
}

impl CacheEntry for MessageRef {
    fn event_time(&self) -> i64 { self.message_timestamp }
    fn cached_at(&self) -> i64 { self.cached_at }

    fn same_event(&self, other: &Self) -> bool {
        self.group_id == other.group_id
            && self.message_id == other.message_id
            && self.raw_digits == other.raw_digits
    }

    fn refresh_from(&mut self, newer: Self) {
        self.cached_at = newer.cached_at;
        self.group_name = newer.group_name;
        self.access_hash = newer.access_hash.or(self.access_hash);
    }
}

/// The fingerprint index: `fingerprint → [MessageRef; ≤ 3]`.
pub type FingerprintIndex = BucketCache<MessageRef>;

// ─── ReplyState ───────────────────────────────────────────────────────────────

/// An auto-reply that was sent for a duplicated number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub number:     String,
    pub group_id:   i64,
    pub group_name: String,
    pub message_id: i32,
    /// What was sent back into the group.
    pub reply:      String,
    pub replied_at: i64,
}

/// Everything the reply monitor persists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyState {
    pub monitoring:            bool,
    /// Only messages from this handle are treated as reports.
    pub target_recipient:      Option<String>,
    /// Groups to scan; empty means the most recently active ones.
    pub target_groups:         BTreeSet<i64>,
    pub group_numbers:         FingerprintIndex,
    /// Message key → unix time it was handled.
    pub processed_messages:    BTreeMap<String, i64>,
    /// Number → how many times it was reported.
    pub replies_received:      BTreeMap<String, u32>,
    /// Number → how many reports counted as duplicates.
    pub duplicate_replies:     BTreeMap<String, u32>,
    /// Number → unix time of the report a duplicate is measured against.
    pub number_timestamps:     BTreeMap<String, i64>,
    /// Number → unix time of the last auto-reply sent for it.
    pub last_auto_reply:       BTreeMap<String, i64>,
    pub found_matches:         BTreeMap<String, MatchRecord>,
    /// Max seconds between two reports of one number for a duplicate.
    pub duplicate_time_window: i64,
}

impl Default for ReplyState {
    fn default() -> Self {
        Self {
            monitoring:            false,
            target_recipient:      None,
            target_groups:         BTreeSet::new(),
            group_numbers:         FingerprintIndex::default(),
            processed_messages:    BTreeMap::new(),
            replies_received:      BTreeMap::new(),
            duplicate_replies:     BTreeMap::new(),
            number_timestamps:     BTreeMap::new(),
            last_auto_reply:       BTreeMap::new(),
            found_matches:         BTreeMap::new(),
            duplicate_time_window: DEFAULT_DUPLICATE_WINDOW_SECS,
        }
    }
}

impl ReplyState {
    /// Total reports across all numbers.
    pub fn total_replies(&self) -> u64 {
        self.replies_received.values().map(|&n| n as u64).sum()
    }

    /// Total duplicate reports across all numbers.
    pub fn total_duplicates(&self) -> u64 {
        self.duplicate_replies.values().map(|&n| n as u64).sum()
    }

    /// Forgets handled-message keys older than `max_age` seconds.
    pub fn prune_processed(&mut self, now: i64, max_age: i64) {
        self.processed_messages.retain(|_, &mut at| now - at <= max_age);
    }
}
