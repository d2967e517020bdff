//! The send pipeline: table in, messages out, progress persisted.
//!
//! A job walks the [`Batch`]es of a table (one per column, or one of rows)
//! and sends each message to a single recipient. After every unit the full
//! [`SendingState`] is persisted, so a crash loses at most the accounting of
//! the unit in flight.
//!
//! Flow control:
//! - `FLOOD_WAIT_n` → sleep `n + 1` s and retry once (see [`FloodWaitOnce`]);
//!   a second failure is counted and the job moves on.
//! - Every [`PipelineConfig::cooldown_every`] successes → a cooldown pause,
//!   counted down in ticks and persisted after each tick.
//! - Optional fixed delay after every successful send.
//!
//! Stopping is cooperative. A stop request (in-process token or persisted
//! flag) is honoured before each unit and between batches, and cuts every
//! sleep short. Units not yet attempted are left uncounted. A stop only
//! ever ends one job: the next job starts with a fresh token.

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use courier_ingest::{Batch, IngestError, SendMode, Table};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{InvocationError, JobError};
use crate::messenger::Messenger;
use crate::retry::{FloodWaitOnce, RetryContext, RetryPolicy};
use crate::state::SendingState;
use crate::stop_watch::StopWatch;
use crate::store::StateStore;
use crate::unix_now;

// ─── Config ───────────────────────────────────────────────────────────────────

/// Tuning knobs for [`SendPipeline`].
#[derive(Clone)]
pub struct PipelineConfig {
    /// Pause after every successful send.
    pub delay:          Duration,
    /// A cooldown starts after every this-many cumulative successes (0 = never).
    pub cooldown_every: u64,
    /// Length of the cooldown.
    pub cooldown:       Duration,
    /// The cooldown countdown is persisted after at most this much time.
    pub countdown_tick: Duration,
    /// Decides whether a failed send is retried, and after how long.
    pub retry_policy:   Arc<dyn RetryPolicy>,
    /// How often to poll the store for an external stop request (`None` = never).
    pub stop_poll:      Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delay:          Duration::ZERO,
            cooldown_every: 100,
            cooldown:       Duration::from_secs(120),
            countdown_tick: Duration::from_secs(5),
            retry_policy:   Arc::new(FloodWaitOnce::default()),
            stop_poll:      Some(Duration::from_secs(2)),
        }
    }
}

// ─── JobInput ─────────────────────────────────────────────────────────────────

/// What a send job was asked to send.
#[derive(Clone, Debug)]
pub enum JobInput {
    /// An uploaded file; the extension selects the reader.
    File { filename: String, bytes: Vec<u8> },
    /// A manually entered block, one value per line.
    Text(String),
}

impl JobInput {
    pub fn into_table(self) -> Result<Table, IngestError> {
        match self {
            Self::File { filename, bytes } => courier_ingest::ingest(&filename, &bytes),
            Self::Text(text) => Ok(courier_ingest::ingest_text(&text)),
        }
    }
}

// ─── SendPipeline ─────────────────────────────────────────────────────────────

enum UnitOutcome {
    Sent,
    Failed(InvocationError),
    /// A stop arrived while waiting to retry; the unit is left uncounted.
    Interrupted,
}

/// Sends tables to a recipient, one job at a time.
///
/// Callers must not start a second job while [`SendingState::is_sending`]
/// is set; the store document is the only mutual exclusion.
pub struct SendPipeline {
    messenger: Arc<dyn Messenger>,
    store:     StateStore,
    config:    PipelineConfig,
    /// Token of the running job, or of the next one while idle.
    stop:      Mutex<CancellationToken>,
}

impl SendPipeline {
    pub fn new(messenger: Arc<dyn Messenger>, store: StateStore, config: PipelineConfig) -> Self {
        Self { messenger, store, config, stop: Mutex::new(CancellationToken::new()) }
    }

    /// Run the next job under `token` instead of a private one, e.g. to share
    /// it with a signal handler. Later jobs get fresh tokens.
    pub fn with_stop_token(self, token: CancellationToken) -> Self {
        *lock(&self.stop) = token;
        self
    }

    /// Token that stops the running job when cancelled; while idle, the next
    /// job to start. It is retired when that job ends.
    pub fn stop_token(&self) -> CancellationToken {
        lock(&self.stop).clone()
    }

    /// Ingest `input`, then send it. Ingestion errors leave the state untouched.
    pub async fn run_job(
        &self,
        input:     JobInput,
        recipient: &str,
        mode:      SendMode,
    ) -> Result<SendingState, JobError> {
        let table = input.into_table().inspect_err(|e| {
            tracing::error!("[pipeline] ingestion failed, nothing sent: {e}");
        })?;
        self.run(&table, recipient, mode).await
    }

    /// Send every unit of `table` to `recipient`.
    ///
    /// Returns the final state. Whatever the outcome, the persisted state ends
    /// with `is_sending == false` and `should_stop == false`, and the
    /// messenger session is released.
    pub async fn run(
        &self,
        table:     &Table,
        recipient: &str,
        mode:      SendMode,
    ) -> Result<SendingState, JobError> {
        let batches = table.plan(mode);
        let total = Batch::total(&batches) as u64;
        let token = self.stop_token();
        let _retire = RetireToken(&self.stop);

        let mut state = SendingState::started(recipient, mode, total, unix_now());
        let mut guard = CleanupGuard::arm(self.store.clone(), self.messenger.clone());
        let _watch = self
            .config
            .stop_poll
            .map(|every| StopWatch::start(self.store.clone(), token.clone(), every));

        tracing::info!("[pipeline] sending {total} message(s) to {recipient} by {mode}");
        let result = match self.store.save_sending(&state) {
            Ok(()) => self.drive(&batches, recipient, &mut state, &token).await,
            Err(e) => Err(JobError::Store(e)),
        };

        // ── Terminal cleanup ───────────────────────────────────────────────
        state.finish();
        let saved = self.store.save_sending(&state);
        self.messenger.disconnect().await;
        guard.disarm();

        match &result {
            Ok(()) => tracing::info!(
                "[pipeline] done: {} sent, {} failed, {}/{} attempted",
                state.sent_count, state.failed_count, state.current_message, state.total_messages
            ),
            Err(e) => tracing::error!("[pipeline] job aborted: {e}"),
        }
        result?;
        saved?;
        Ok(state)
    }

    async fn drive(
        &self,
        batches:   &[Batch],
        recipient: &str,
        state:     &mut SendingState,
        token:     &CancellationToken,
    ) -> Result<(), JobError> {
        if !self.messenger.is_authorized().await? {
            tracing::error!("[pipeline] session is not authorized");
            return Err(JobError::Unauthorized);
        }
        let started = Instant::now();

        for batch in batches {
            if stop_requested(state, token) {
                tracing::info!("[pipeline] stop requested, not starting `{}`", batch.label);
                return Ok(());
            }
            tracing::debug!("[pipeline] batch `{}`: {} message(s)", batch.label, batch.messages.len());

            for message in &batch.messages {
                if stop_requested(state, token) {
                    tracing::info!("[pipeline] stop requested, halting");
                    return Ok(());
                }
                state.current_message += 1;
                state.current_item = message.clone();

                let sent = match self.send_unit(recipient, message, token).await {
                    UnitOutcome::Sent => {
                        state.sent_count += 1;
                        state.last_message_sent = message.clone();
                        true
                    }
                    UnitOutcome::Failed(e) => {
                        state.failed_count += 1;
                        tracing::error!(
                            "[pipeline] failed to send #{} '{message}': {e}",
                            state.current_message
                        );
                        false
                    }
                    UnitOutcome::Interrupted => {
                        state.should_stop = true;
                        self.persist(state, token)?;
                        return Ok(());
                    }
                };
                state.update_rates(started.elapsed().as_secs_f64());
                self.persist(state, token)?;

                if !sent {
                    continue;
                }
                let every = self.config.cooldown_every;
                if every > 0 && state.sent_count % every == 0 {
                    self.cooldown(state, token).await?;
                }
                if !self.config.delay.is_zero() {
                    sleep_or_stop(self.config.delay, token).await;
                }
            }
        }
        Ok(())
    }

    async fn send_unit(
        &self,
        recipient: &str,
        text:      &str,
        token:     &CancellationToken,
    ) -> UnitOutcome {
        let mut fail_count = NonZeroU32::MIN;
        let mut slept_so_far = Duration::ZERO;
        loop {
            let error = match self.messenger.send_message(recipient, text).await {
                Ok(()) => return UnitOutcome::Sent,
                Err(e) => e,
            };
            let ctx = RetryContext { fail_count, slept_so_far, error: &error };
            match self.config.retry_policy.should_retry(&ctx) {
                ControlFlow::Continue(wait) => {
                    tracing::warn!("[pipeline] {error}; waiting {wait:?} before retrying '{text}'");
                    if !sleep_or_stop(wait, token).await {
                        return UnitOutcome::Interrupted;
                    }
                    slept_so_far += wait;
                    fail_count = fail_count.saturating_add(1);
                }
                ControlFlow::Break(()) if fail_count.get() > 1 => {
                    tracing::warn!("[pipeline] retry after rate limit wait failed too");
                    return UnitOutcome::Failed(error);
                }
                ControlFlow::Break(()) => return UnitOutcome::Failed(error),
            }
        }
    }

    /// Cooldown pause: counted down in ticks, persisted after each one, cut
    /// short (countdown forced to 0) by a stop request.
    async fn cooldown(&self, state: &mut SendingState, token: &CancellationToken) -> Result<(), JobError> {
        let tick = self.config.countdown_tick.as_secs().max(1);
        state.is_paused = true;
        state.pause_countdown = self.config.cooldown.as_secs();
        tracing::info!(
            "[pipeline] {} sent, cooling down for {}s",
            state.sent_count, state.pause_countdown
        );
        self.persist(state, token)?;

        while state.pause_countdown > 0 && !stop_requested(state, token) {
            let step = tick.min(state.pause_countdown);
            if !sleep_or_stop(Duration::from_secs(step), token).await {
                break;
            }
            state.pause_countdown -= step;
            self.persist(state, token)?;
        }

        state.is_paused = false;
        state.pause_countdown = 0;
        self.persist(state, token)?;
        Ok(())
    }

    /// Save progress; picks up a stop requested through the store.
    fn persist(&self, state: &mut SendingState, token: &CancellationToken) -> Result<(), JobError> {
        if self.store.save_progress(state)? && !state.should_stop {
            tracing::info!("[pipeline] stop requested through the store");
            state.should_stop = true;
            token.cancel();
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn stop_requested(state: &mut SendingState, token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        state.should_stop = true;
    }
    state.should_stop
}

/// Sleep for `d` unless `token` fires first. Returns `true` if the full
/// duration elapsed.
async fn sleep_or_stop(d: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(d) => !token.is_cancelled(),
        _ = token.cancelled() => false,
    }
}

/// Swaps in a fresh stop token when a job ends, however it ends.
struct RetireToken<'a>(&'a Mutex<CancellationToken>);

impl Drop for RetireToken<'_> {
    fn drop(&mut self) {
        *lock(self.0) = CancellationToken::new();
    }
}

// ─── CleanupGuard ─────────────────────────────────────────────────────────────

/// Finishes the persisted job if the pipeline future is dropped or panics
/// before its own cleanup ran.
struct CleanupGuard {
    store:     StateStore,
    messenger: Option<Arc<dyn Messenger>>,
}

impl CleanupGuard {
    fn arm(store: StateStore, messenger: Arc<dyn Messenger>) -> Self {
        Self { store, messenger: Some(messenger) }
    }

    fn disarm(&mut self) {
        self.messenger = None;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let Some(messenger) = self.messenger.take() else { return };
        tracing::warn!("[pipeline] job interrupted, finishing persisted state");
        match self.store.load_sending() {
            Ok(mut state) => {
                state.finish();
                if let Err(e) = self.store.save_sending(&state) {
                    tracing::error!("[pipeline] failed to finish sending state: {e}");
                }
            }
            Err(e) => tracing::error!("[pipeline] failed to load sending state: {e}"),
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { messenger.disconnect().await });
        }
    }
}
