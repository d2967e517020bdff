//! Retry policies for handling `FLOOD_WAIT` on outbound sends.

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::time::Duration;

use crate::errors::InvocationError;

/// Controls how the pipeline reacts when a send fails.
pub trait RetryPolicy: Send + Sync + 'static {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration>;
}

/// Context passed to [`RetryPolicy::should_retry`] on each failure.
pub struct RetryContext<'a> {
    pub fail_count:   NonZeroU32,
    pub slept_so_far: Duration,
    pub error:        &'a InvocationError,
}

/// Never retry.
pub struct NoRetries;
impl RetryPolicy for NoRetries {
    fn should_retry(&self, _: &RetryContext) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}

/// Sleep for the platform-specified wait plus `padding`, then retry once.
///
/// Only the first failure of a message is retried, and only when it is a
/// FLOOD_WAIT; any other error, or a second failure, gives up.
pub struct FloodWaitOnce {
    pub padding:  Duration,
    /// Waits longer than this are not worth sleeping through (`None` = no cap).
    pub max_wait: Option<Duration>,
}

impl Default for FloodWaitOnce {
    fn default() -> Self {
        Self {
            padding:  Duration::from_secs(1),
            max_wait: None,
        }
    }
}

impl RetryPolicy for FloodWaitOnce {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration> {
        if ctx.fail_count.get() != 1 {
            return ControlFlow::Break(());
        }
        let Some(secs) = ctx.error.flood_wait_seconds() else {
            return ControlFlow::Break(());
        };
        let wait = Duration::from_secs(secs);
        if self.max_wait.is_some_and(|max| wait > max) {
            tracing::warn!("[retry] FLOOD_WAIT_{secs} exceeds the configured cap, giving up");
            return ControlFlow::Break(());
        }
        tracing::info!("[retry] FLOOD_WAIT_{secs}: sleeping before retry");
        ControlFlow::Continue(wait + self.padding)
    }
}
