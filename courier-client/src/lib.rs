//! # courier-client
//!
//! Bulk send pipeline and reply monitor on top of a messaging platform.
//!
//! ## Features
//! - Send every cell (column mode) or every row (row mode) of a table to one
//!   recipient, with progress persisted after each message
//! - `FLOOD_WAIT` handling through a pluggable [`RetryPolicy`]
//! - Cooldown pause every 100 sends, counted down in persisted ticks
//! - Cooperative stop, in-process ([`CancellationToken`]) or from another
//!   process through the state store
//! - Fingerprint index of numbers posted in groups, with bounded buckets
//!   and TTL expiry
//! - Duplicate-report detection and automatic OTP replies to the group
//!   message a number came from
//! - Pluggable state storage: JSON files, in-memory, or SQLite
//!   (`sqlite-store` feature)
//!
//! The platform itself is behind the [`Messenger`] trait.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

#![deny(unsafe_code)]

mod errors;
mod retry;
mod stop_watch;
pub mod cache;
pub mod correlate;
pub mod messenger;
pub mod monitor;
pub mod pattern;
pub mod pipeline;
pub mod state;
pub mod store;

pub use errors::{InvocationError, JobError, MonitorError, RpcError};
pub use retry::{FloodWaitOnce, NoRetries, RetryContext, RetryPolicy};
pub use stop_watch::StopWatch;
pub use cache::{BucketCache, CacheEntry, CachePolicy, Insertion};
pub use correlate::{Confidence, Match, Window};
pub use messenger::{Conversation, GroupPeer, HistoryMessage, InboundMessage, Messenger};
pub use monitor::{Handled, IndexBuilder, MonitorConfig, RefreshSummary, ReplyMonitor};
pub use pipeline::{JobInput, PipelineConfig, SendPipeline};
pub use state::{FingerprintIndex, MatchRecord, MessageRef, ReplyState, SendingState};
pub use store::{InMemoryBackend, JsonFileBackend, StateBackend, StateStore};

#[cfg(feature = "sqlite-store")]
pub use store::SqliteBackend;

/// Current unix time in seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
