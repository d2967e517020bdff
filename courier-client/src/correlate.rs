//! Reply correlation: which group message did a reported number come from?

use std::io;

use crate::state::{FingerprintIndex, MessageRef};
use crate::store::StateStore;

// ─── Window ───────────────────────────────────────────────────────────────────

/// Asymmetric time window around an anchor timestamp.
///
/// The defaults admit group messages from five minutes before the anchor up
/// to thirty seconds after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub before_secs: i64,
    pub after_secs:  i64,
}

impl Default for Window {
    fn default() -> Self {
        Self { before_secs: 300, after_secs: 30 }
    }
}

impl Window {
    /// `true` if `timestamp` lies in `[anchor - before, anchor + after]`.
    pub fn contains(&self, anchor: i64, timestamp: i64) -> bool {
        timestamp >= anchor - self.before_secs && timestamp <= anchor + self.after_secs
    }
}

// ─── Match ────────────────────────────────────────────────────────────────────

/// How a [`Match`] was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    /// Same fingerprint, inside the time window.
    Pattern,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    /// The full number as it appeared in the group message.
    pub number:     String,
    pub message:    MessageRef,
    pub confidence: Confidence,
}

/// First ref under `target` (in list order) whose message falls inside the
/// default window around `after`. Without `after`, any ref qualifies.
pub fn find_best_match(
    index:          &FingerprintIndex,
    target:         &str,
    original_value: &str,
    after:          Option<i64>,
) -> Option<Match> {
    find_best_match_within(index, target, original_value, after, &Window::default())
}

pub fn find_best_match_within(
    index:          &FingerprintIndex,
    target:         &str,
    original_value: &str,
    after:          Option<i64>,
    window:         &Window,
) -> Option<Match> {
    let found = index
        .get(target)
        .iter()
        .find(|r| after.is_none_or(|anchor| window.contains(anchor, r.message_timestamp)))?;

    let number = if found.raw_digits.is_empty() {
        original_value.to_owned()
    } else {
        found.raw_digits.clone()
    };
    tracing::debug!(
        "[correlate] {target} → message {} in {} ({})",
        found.message_id, found.group_name, found.group_id
    );
    Some(Match { number, message: found.clone(), confidence: Confidence::Pattern })
}

/// [`find_best_match_within`] against the index currently persisted in `store`.
pub fn find_in_store(
    store:          &StateStore,
    target:         &str,
    original_value: &str,
    after:          Option<i64>,
    window:         &Window,
) -> io::Result<Option<Match>> {
    let state = store.load_reply()?;
    Ok(find_best_match_within(&state.group_numbers, target, original_value, after, window))
}
