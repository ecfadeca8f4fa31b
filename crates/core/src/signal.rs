use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Latch-once stop signal shared by the server and its sessions.
///
/// Clones observe the same latch. [`wait`](Self::wait) doubles as the
/// supervisor's retry sleep so that a stopping server never has to wait
/// out a full retry delay.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal and wake every waiter. Idempotent.
    pub fn trigger(&self) {
        let mut stopped = self.inner.stopped.lock();
        if !*stopped {
            *stopped = true;
            self.inner.cond.notify_all();
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Sleep for up to `timeout`. Returns `true` if the signal fired.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.inner.stopped.lock();
        // A timeout too large for `Instant` means wait until triggered.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while !*stopped {
                self.inner.cond.wait(&mut stopped);
            }
            return true;
        };
        while !*stopped {
            if self.inner.cond.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_times_out_when_not_triggered() {
        let signal = StopSignal::new();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn trigger_wakes_waiter_early() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });

        let start = Instant::now();
        assert!(signal.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        waker.join().unwrap();
    }

    #[test]
    fn unbounded_timeout_waits_for_trigger() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });

        assert!(signal.wait(Duration::MAX));
        assert!(signal.wait(Duration::from_millis(u64::MAX)));
        waker.join().unwrap();
    }

    #[test]
    fn triggered_signal_returns_immediately() {
        let signal = StopSignal::new();
        signal.trigger();
        signal.trigger();
        assert!(signal.is_triggered());
        assert!(signal.wait(Duration::from_secs(10)));
    }
}
