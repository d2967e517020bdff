//! # courier: bulk messaging with reply correlation
//!
//! `courier` sends the contents of spreadsheets, CSV files and plain text
//! lists to a single recipient, and watches what comes back. It is split into
//! two focused sub-crates wired together here for convenience:
//!
//! | Sub-crate        | Role                                                  |
//! |------------------|-------------------------------------------------------|
//! | `courier-ingest` | Read `.xlsx`/`.csv`/`.txt` into tables, plan messages |
//! | `courier-client` | Send pipeline, state store, fingerprint index, reply monitor |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use courier::{JobInput, Messenger, PipelineConfig, SendMode, SendPipeline, StateStore};
//!
//! async fn send_file(messenger: Arc<dyn Messenger>, bytes: Vec<u8>) {
//!     let store = StateStore::in_memory();
//!     let pipeline = SendPipeline::new(messenger, store, PipelineConfig::default());
//!
//!     let input = JobInput::File { filename: "numbers.csv".into(), bytes };
//!     match pipeline.run_job(input, "@lookup_bot", SendMode::Columns).await {
//!         Ok(state) => println!("{} sent, {} failed", state.sent_count, state.failed_count),
//!         Err(e)    => eprintln!("job failed: {e}"),
//!     }
//! }
//! ```
//!
//! The messaging platform is supplied by implementing [`Messenger`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Re-export of [`courier_ingest`]: file readers, tables and message planning.
pub use courier_ingest as ingest;

/// Re-export of [`courier_client`]: pipeline, store, index and monitor.
pub use courier_client as client;

// ─── Convenience re-exports ───────────────────────────────────────────────────

pub use courier_ingest::{Cell, IngestError, SendMode, SourceKind, Table};

pub use courier_client::{
    IndexBuilder,
    InvocationError,
    JobError,
    JobInput,
    Messenger,
    MonitorConfig,
    MonitorError,
    PipelineConfig,
    ReplyMonitor,
    ReplyState,
    SendPipeline,
    SendingState,
    StateStore,
};
pub use courier_client::pattern::{extract_otp, fingerprint_of};

#[cfg(feature = "sqlite")]
pub use courier_client::SqliteBackend;
