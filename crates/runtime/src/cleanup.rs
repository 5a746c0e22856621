//! Disconnect cleanup timer.
//!
//! Bounds how long a session may sit disconnected before the backend is
//! declared unreachable. At most one timer is armed at a time; arming while
//! armed replaces the previous timer, and any successful reconnection
//! cancels it before it fires.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Default deadline: five minutes.
pub const DEFAULT_CLEANUP_AFTER: Duration = Duration::from_millis(300_000);

/// One-shot replaceable timer owned by the connection manager.
///
/// Not a general-purpose timer: `on_fire` runs on the runtime after the
/// deadline passes, and the owner is expected to re-check session state
/// there rather than trust that nothing changed while sleeping.
#[derive(Default)]
pub struct CleanupTimer {
    handle: Option<JoinHandle<()>>,
}

impl CleanupTimer {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Arm the timer, replacing any timer already armed.
    pub fn arm<F>(&mut self, after: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_fire();
        }));
    }

    /// Cancel the armed timer. No-op when not armed.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a timer is armed and has not yet fired.
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CleanupTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fires_after_deadline() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = CleanupTimer::new();
        let counter = Arc::clone(&fired);
        timer.arm(Duration::from_secs(300), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = CleanupTimer::new();
        let counter = Arc::clone(&fired);
        timer.arm(Duration::from_secs(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_timer() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = CleanupTimer::new();

        let first = Arc::clone(&fired);
        timer.arm(Duration::from_secs(10), move || {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = Arc::clone(&fired);
        timer.arm(Duration::from_secs(30), move || {
            second.fetch_add(10, Ordering::SeqCst);
        });

        // Past the first deadline: the replaced timer must stay silent.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let mut timer = CleanupTimer::new();
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_armed());
    }
}
