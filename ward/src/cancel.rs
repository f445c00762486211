//! Cancellation for blocked admissions.
//!
//! A [`CancelToken`] is shared between the thread that waits and whoever
//! wants to stop it. While a thread holding the token is blocked in
//! `enter`, the area's monitor is parked on the token; `cancel()` wakes
//! every parked monitor under that monitor's own lock, so a waiter can never
//! miss the wakeup between checking the flag and going to sleep.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::area::Monitor;

/// Returned by [`CancelToken::sleep`] when the token fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

#[derive(Default)]
struct TokenState {
    cancelled: bool,
    parked: Vec<Arc<Monitor>>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<TokenState>,
    wakeup: Condvar,
}

/// Sticky, cloneable cancellation flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the token. Idempotent.
    pub fn cancel(&self) {
        let parked = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            self.inner.wakeup.notify_all();
            state.parked.clone()
        };

        // Registry lock is released before any area lock is taken.
        for monitor in parked {
            monitor.wake_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Sleep for `duration`, returning early with `Err(Cancelled)` if the
    /// token is cancelled first.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let Some(deadline) = Instant::now().checked_add(duration) else {
            let state = self.lock();
            let state = self
                .inner
                .wakeup
                .wait_while(state, |s| !s.cancelled)
                .unwrap_or_else(PoisonError::into_inner);
            debug_assert!(state.cancelled);
            return Err(Cancelled);
        };

        let mut state = self.lock();
        loop {
            if state.cancelled {
                return Err(Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            state = self
                .inner
                .wakeup
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Park `monitor` on this token until the returned guard drops.
    ///
    /// Must be called with the monitor's lock held.
    pub(crate) fn park<'a>(&'a self, monitor: &Arc<Monitor>) -> Parked<'a> {
        self.lock().parked.push(Arc::clone(monitor));
        Parked {
            token: self,
            monitor: Arc::clone(monitor),
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Removes one parked monitor from its token on drop.
pub(crate) struct Parked<'a> {
    token: &'a CancelToken,
    monitor: Arc<Monitor>,
}

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        let mut state = self.token.lock();
        if let Some(pos) = state
            .parked
            .iter()
            .position(|m| Arc::ptr_eq(m, &self.monitor))
        {
            state.parked.swap_remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn new_token_is_not_cancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        clone.cancel();
        assert!(token.is_cancelled());

        // Idempotent.
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn sleep_runs_to_completion_when_not_cancelled() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_millis(20)), Ok(()));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn sleep_returns_early_on_cancel() {
        let token = CancelToken::new();
        let sleeper = token.clone();
        let start = Instant::now();

        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        token.cancel();

        assert_eq!(handle.join().unwrap(), Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn sleep_on_cancelled_token_fails_immediately() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(token.sleep(Duration::from_secs(30)), Err(Cancelled));
    }

    #[test]
    fn debug_shows_flag() {
        let token = CancelToken::new();
        assert_eq!(format!("{token:?}"), "CancelToken { cancelled: false }");
    }
}
