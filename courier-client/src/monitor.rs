//! Reply monitoring: index group messages by fingerprint, watch the reports
//! coming back from the recipient, and answer duplicates in the group the
//! number was posted in.
//!
//! Two pieces:
//! - [`IndexBuilder`] scans recent group history into the persisted
//!   fingerprint index ([`ReplyState::group_numbers`]).
//! - [`ReplyMonitor`] consumes [`Messenger::next_update`], counts reports per
//!   number, and on a duplicate refreshes the index, correlates and replies.
//!
//! [`ReplyState::group_numbers`]: crate::state::ReplyState::group_numbers

use std::io;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::{CachePolicy, Insertion};
use crate::correlate::{self, Match, Window};
use crate::errors::MonitorError;
use crate::messenger::{Conversation, GroupPeer, InboundMessage, Messenger};
use crate::pattern::{digit_candidates, extract_otp, fingerprint_of};
use crate::state::{MatchRecord, MessageRef};
use crate::store::StateStore;
use crate::unix_now;

// ─── Config ───────────────────────────────────────────────────────────────────

/// Tuning knobs shared by [`IndexBuilder`] and [`ReplyMonitor`].
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Groups scanned when no target groups are configured.
    pub group_limit:        usize,
    /// Recent messages scanned per group.
    pub per_group_limit:    usize,
    pub cache:              CachePolicy,
    /// Which group messages count as "around" a report.
    pub window:             Window,
    /// Handled-message keys are forgotten after this many seconds.
    pub processed_ttl_secs: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            group_limit:        20,
            per_group_limit:    200,
            cache:              CachePolicy::default(),
            window:             Window::default(),
            processed_ttl_secs: 86_400,
        }
    }
}

// ─── IndexBuilder ─────────────────────────────────────────────────────────────

/// What one [`IndexBuilder::refresh`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub groups_scanned: usize,
    /// Refs that entered the index (added or replacing an older one).
    pub refs_added:     usize,
    pub target_found:   bool,
}

/// Keeps the fingerprint index in the reply document up to date.
#[derive(Clone)]
pub struct IndexBuilder {
    messenger: Arc<dyn Messenger>,
    store:     StateStore,
    config:    MonitorConfig,
}

impl IndexBuilder {
    pub fn new(messenger: Arc<dyn Messenger>, store: StateStore, config: MonitorConfig) -> Self {
        Self { messenger, store, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// [`Self::refresh_at`] with the current time.
    pub async fn refresh(
        &self,
        target: Option<&str>,
        after:  Option<i64>,
    ) -> Result<RefreshSummary, MonitorError> {
        self.refresh_at(unix_now(), target, after).await
    }

    /// Expire stale refs, then scan group history for digit candidates.
    ///
    /// With `target`, only candidates with that fingerprint are indexed and
    /// scanning stops as soon as one is found. With `after`, only messages
    /// inside the configured window around it are considered.
    pub async fn refresh_at(
        &self,
        now:    i64,
        target: Option<&str>,
        after:  Option<i64>,
    ) -> Result<RefreshSummary, MonitorError> {
        let policy = self.config.cache;
        let (removed, target_groups) = self.store.update_reply(|state| {
            let removed = state.group_numbers.gc(now, &policy);
            (removed, state.target_groups.clone())
        })?;
        if removed > 0 {
            tracing::debug!("[index] expired {removed} fingerprint(s)");
        }

        let mut groups: Vec<Conversation> = self
            .messenger
            .list_conversations()
            .await?
            .into_iter()
            .filter(|c| c.is_group)
            .filter(|c| target_groups.is_empty() || target_groups.contains(&c.id))
            .collect();
        // most recently active first; unknown activity last
        groups.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        if target_groups.is_empty() {
            groups.truncate(self.config.group_limit);
        }

        let mut summary = RefreshSummary::default();
        for group in &groups {
            if summary.target_found {
                break;
            }
            let history = match self.messenger.recent_messages(group, self.config.per_group_limit).await {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!("[index] skipping {} ({}): {e}", group.name, group.id);
                    continue;
                }
            };
            summary.groups_scanned += 1;

            let mut refs = Vec::new();
            for message in &history {
                let Some(text) = message.text.as_deref() else { continue };
                if after.is_some_and(|anchor| !self.config.window.contains(anchor, message.timestamp)) {
                    continue;
                }
                for digits in digit_candidates(text) {
                    let fingerprint = fingerprint_of(&digits);
                    if target.is_some_and(|t| t != fingerprint) {
                        continue;
                    }
                    refs.push(MessageRef {
                        group_id:          group.id,
                        access_hash:       group.access_hash,
                        message_id:        message.id,
                        fingerprint,
                        group_name:        group.name.clone(),
                        raw_digits:        digits,
                        message_timestamp: message.timestamp,
                        cached_at:         now,
                    });
                }
                if target.is_some() && !refs.is_empty() {
                    summary.target_found = true;
                    break;
                }
            }

            if refs.is_empty() {
                continue;
            }
            summary.refs_added += self.store.update_reply(|state| {
                refs.into_iter()
                    .map(|r| {
                        let key = r.fingerprint.clone();
                        state.group_numbers.insert(&key, r, &policy)
                    })
                    .filter(|i| matches!(i, Insertion::Added | Insertion::Replaced))
                    .count()
            })?;
        }

        tracing::info!(
            "[index] scanned {} group(s), {} new ref(s){}",
            summary.groups_scanned,
            summary.refs_added,
            if summary.target_found { ", target found" } else { "" }
        );
        Ok(summary)
    }
}

// ─── ReplyMonitor ─────────────────────────────────────────────────────────────

/// What [`ReplyMonitor::handle_inbound`] made of one message.
#[derive(Clone, Debug, PartialEq)]
pub enum Handled {
    /// Group message, foreign sender, already handled, or no number in it.
    Ignored,
    /// First report of `number` inside the window.
    Recorded { number: String },
    /// Repeated report; `reply` is set when an auto-reply went out.
    Duplicate { number: String, reply: Option<MatchRecord> },
    /// Repeated report, but an auto-reply for it was sent recently.
    Suppressed { number: String },
}

enum Report {
    Ignored,
    First(String),
    Duplicate(String),
    Suppressed(String),
}

/// Watches reports from the recipient and answers duplicates.
pub struct ReplyMonitor {
    messenger: Arc<dyn Messenger>,
    store:     StateStore,
    builder:   IndexBuilder,
}

impl ReplyMonitor {
    pub fn new(messenger: Arc<dyn Messenger>, store: StateStore, config: MonitorConfig) -> Self {
        let builder = IndexBuilder::new(messenger.clone(), store.clone(), config);
        Self { messenger, store, builder }
    }

    pub fn index_builder(&self) -> &IndexBuilder {
        &self.builder
    }

    // ── Configuration ──────────────────────────────────────────────────────

    /// Only reports from `handle` are considered (`None` accepts everyone).
    pub fn set_target_recipient(&self, handle: Option<String>) -> io::Result<()> {
        self.store.update_reply(|s| s.target_recipient = handle)
    }

    /// Restrict index scans to these groups (empty = most recently active).
    pub fn set_target_groups(&self, groups: impl IntoIterator<Item = i64>) -> io::Result<()> {
        let groups = groups.into_iter().collect();
        self.store.update_reply(|s| s.target_groups = groups)
    }

    pub fn set_duplicate_window(&self, secs: i64) -> io::Result<()> {
        self.store.update_reply(|s| s.duplicate_time_window = secs)
    }

    // ── Processing ─────────────────────────────────────────────────────────

    /// [`Self::handle_inbound_at`] with the current time.
    pub async fn handle_inbound(&self, message: &InboundMessage) -> Result<Handled, MonitorError> {
        self.handle_inbound_at(message, unix_now()).await
    }

    pub async fn handle_inbound_at(
        &self,
        message: &InboundMessage,
        now:     i64,
    ) -> Result<Handled, MonitorError> {
        if message.is_group {
            return Ok(Handled::Ignored);
        }
        let ttl = self.builder.config.processed_ttl_secs;

        let report = self.store.update_reply(|state| {
            if let Some(target) = &state.target_recipient {
                if !same_handle(target, &message.sender) {
                    return Report::Ignored;
                }
            }
            let key = message.key();
            if state.processed_messages.contains_key(&key) {
                return Report::Ignored;
            }
            state.prune_processed(now, ttl);
            state.processed_messages.insert(key, now);

            let Some(number) = digit_candidates(&message.text).into_iter().next() else {
                return Report::Ignored;
            };
            *state.replies_received.entry(number.clone()).or_default() += 1;

            let window = state.duplicate_time_window;
            let previous = state.number_timestamps.get(&number).copied();
            if !previous.is_some_and(|at| (message.timestamp - at).abs() <= window) {
                state.number_timestamps.insert(number.clone(), message.timestamp);
                return Report::First(number);
            }
            *state.duplicate_replies.entry(number.clone()).or_default() += 1;

            match state.last_auto_reply.get(&number) {
                Some(&at) if now - at <= window => Report::Suppressed(number),
                _ => Report::Duplicate(number),
            }
        })?;

        let number = match report {
            Report::Ignored => return Ok(Handled::Ignored),
            Report::First(number) => {
                tracing::debug!("[monitor] first report of {number}");
                return Ok(Handled::Recorded { number });
            }
            Report::Suppressed(number) => {
                tracing::debug!("[monitor] {number} already answered recently");
                return Ok(Handled::Suppressed { number });
            }
            Report::Duplicate(number) => number,
        };

        tracing::info!("[monitor] duplicate report of {number}");
        let reply = self.answer_duplicate(&number, message, now).await?;
        Ok(Handled::Duplicate { number, reply })
    }

    async fn answer_duplicate(
        &self,
        number:  &str,
        message: &InboundMessage,
        now:     i64,
    ) -> Result<Option<MatchRecord>, MonitorError> {
        let fingerprint = fingerprint_of(number);
        self.builder.refresh_at(now, Some(&fingerprint), Some(message.timestamp)).await?;

        let found = correlate::find_in_store(
            &self.store,
            &fingerprint,
            number,
            Some(message.timestamp),
            &self.builder.config.window,
        )?;
        let Some(Match { message: origin, .. }) = found else {
            tracing::info!("[monitor] no group message matches {number}");
            return Ok(None);
        };

        let text = extract_otp(&message.text).unwrap_or_else(|| message.text.clone());
        let peer = GroupPeer { id: origin.group_id, access_hash: origin.access_hash };
        self.messenger.reply_to(peer, origin.message_id, &text).await?;

        let record = MatchRecord {
            number:     number.to_owned(),
            group_id:   origin.group_id,
            group_name: origin.group_name.clone(),
            message_id: origin.message_id,
            reply:      text,
            replied_at: now,
        };
        self.store.update_reply(|state| {
            state.last_auto_reply.insert(number.to_owned(), now);
            state.found_matches.insert(number.to_owned(), record.clone());
        })?;
        tracing::info!(
            "[monitor] replied to message {} in {} for {number}",
            origin.message_id, origin.group_name
        );
        Ok(Some(record))
    }

    /// Handle inbound messages until the stream ends or `cancel` fires.
    ///
    /// Errors while handling one message are logged and do not end the loop.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), MonitorError> {
        self.store.update_reply(|s| s.monitoring = true)?;
        tracing::info!("[monitor] monitoring replies");

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                m = self.messenger.next_update() => m,
            };
            let Some(message) = message else {
                tracing::debug!("[monitor] update stream ended");
                break;
            };
            if let Err(e) = self.handle_inbound(&message).await {
                tracing::warn!("[monitor] failed to handle {}: {e}", message.key());
            }
        }

        self.store.update_reply(|s| s.monitoring = false)?;
        tracing::info!("[monitor] stopped");
        Ok(())
    }
}

fn same_handle(a: &str, b: &str) -> bool {
    a.trim_start_matches('@').eq_ignore_ascii_case(b.trim_start_matches('@'))
}
