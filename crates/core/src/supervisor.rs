//! Open/reopen policy around a [`CaptureOpener`].
//!
//! The upstream is assumed to come back eventually (a camera rebooting, a
//! flaky link), so [`ReconnectSupervisor::acquire`] retries forever with a
//! fixed delay between attempts. There is no backoff and no attempt cap;
//! the delay is the only throttle. Open failures and read failures go
//! through the same wait-and-retry cycle.
//!
//! ```text
//! acquire:  Opening --fail--> wait(delay) --> Opening --ok--> Open
//! recover:  release(broken) --> wait(delay) --> acquire
//! ```
//!
//! The only way out of the loop other than success is the [`StopSignal`],
//! which cuts any pending wait short.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::signal::StopSignal;
use crate::source::{CaptureOpener, CaptureOptions, SourceDescriptor, SourceHandle};

/// Default wait between connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct ReconnectSupervisor {
    opener: Arc<dyn CaptureOpener>,
    options: CaptureOptions,
    retry_delay: Duration,
    stop: StopSignal,
}

impl ReconnectSupervisor {
    pub fn new(
        opener: Arc<dyn CaptureOpener>,
        options: CaptureOptions,
        retry_delay: Duration,
        stop: StopSignal,
    ) -> Self {
        Self {
            opener,
            options,
            retry_delay,
            stop,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Open `descriptor`, retrying until it succeeds.
    ///
    /// Only returns an error ([`RelayError::Cancelled`]) when the stop
    /// signal fires.
    pub fn acquire(&self, descriptor: &SourceDescriptor) -> Result<SourceHandle> {
        let mut attempt: u64 = 0;
        loop {
            if self.stop.is_triggered() {
                return Err(RelayError::Cancelled);
            }
            attempt += 1;

            match self.opener.open(descriptor, &self.options) {
                Ok(capture) => {
                    tracing::info!(source = %descriptor, attempt, "capture opened");
                    return Ok(SourceHandle::new(descriptor.clone(), capture));
                }
                Err(err) => {
                    tracing::warn!(
                        source = %descriptor,
                        attempt,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        error = %err,
                        "unable to open source, retrying"
                    );
                    if self.stop.wait(self.retry_delay) {
                        return Err(RelayError::Cancelled);
                    }
                }
            }
        }
    }

    /// Replace a handle whose read failed.
    ///
    /// Releases `broken`, waits the retry delay, then [`acquire`](Self::acquire)s
    /// a fresh handle.
    pub fn recover(
        &self,
        descriptor: &SourceDescriptor,
        mut broken: SourceHandle,
        cause: &RelayError,
    ) -> Result<SourceHandle> {
        broken.release();
        drop(broken);
        tracing::warn!(
            source = %descriptor,
            error = %cause,
            delay_ms = self.retry_delay.as_millis() as u64,
            "frame read failed, reopening"
        );
        if self.stop.wait(self.retry_delay) {
            return Err(RelayError::Cancelled);
        }
        self.acquire(descriptor)
    }
}
