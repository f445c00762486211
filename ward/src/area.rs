//! Capacity-bounded area: a monitor guarding occupancy and the waiting count.
//!
//! Admission follows the usual loop-then-wait shape. A caller that finds the
//! area full is counted as waiting exactly once, blocks on the vacancy
//! condvar (releasing the lock), and re-checks capacity on every wakeup.
//! It stops being counted exactly once too: when admitted, cancelled, or
//! timed out. `exit` broadcasts, so any waiter may win a freed slot.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, LockResult, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::display::{Color, Position};
use crate::error::EnterError;
use crate::observer::{AreaObserver, TracingObserver};

/// Whether an area can admit someone right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaState {
    NotFull,
    Full,
}

/// Consistent snapshot of an area's counters, read in one critical section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaStatus {
    pub name: String,
    pub capacity: usize,
    pub patients: usize,
    pub waiting: usize,
    pub state: AreaState,
}

#[derive(Debug, Clone, Copy)]
struct Ledger {
    capacity: usize,
    patients: usize,
    waiting: usize,
}

impl Ledger {
    fn has_vacancy(&self) -> bool {
        self.patients < self.capacity
    }
}

/// Lock and condvar shared between an area and any [`CancelToken`] that
/// needs to wake its waiters.
pub(crate) struct Monitor {
    ledger: Mutex<Ledger>,
    vacancy: Condvar,
}

impl Monitor {
    fn new(capacity: usize) -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                capacity,
                patients: 0,
                waiting: 0,
            }),
            vacancy: Condvar::new(),
        }
    }

    /// Every ledger mutation is a single statement, so the counters are
    /// still consistent after a panic elsewhere under the lock.
    fn recover<'a>(&self, result: LockResult<MutexGuard<'a, Ledger>>) -> MutexGuard<'a, Ledger> {
        match result {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Area mutex poisoned - recovering ledger");
                self.ledger.clear_poison();
                poisoned.into_inner()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.recover(self.ledger.lock())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Ledger>) -> MutexGuard<'a, Ledger> {
        self.recover(self.vacancy.wait(guard))
    }

    fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, Ledger>,
        timeout: Duration,
    ) -> MutexGuard<'a, Ledger> {
        match self.vacancy.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => self.recover(Err(PoisonError::new(poisoned.into_inner().0))),
        }
    }

    /// Wake every waiter so it re-checks its exit conditions.
    pub(crate) fn wake_all(&self) {
        let _ledger = self.lock();
        self.vacancy.notify_all();
    }
}

/// A named area with a fixed number of treatment slots.
///
/// Identity is the name: equality, hashing and ordering ignore every other
/// field, so areas can key sets and maps.
pub struct BoundedArea {
    name: String,
    time: Duration,
    position: Position,
    color: Mutex<Color>,
    monitor: Arc<Monitor>,
    observer: Arc<dyn AreaObserver>,
}

impl BoundedArea {
    /// Create an empty area colored [`Color::GRAY`].
    ///
    /// `time` is how long a patient must stay to be treated. The area never
    /// enforces it; callers `exit` when they are done.
    pub fn new(name: impl Into<String>, time: Duration, capacity: usize, position: Position) -> Self {
        Self {
            name: name.into(),
            time,
            position,
            color: Mutex::new(Color::default()),
            monitor: Arc::new(Monitor::new(capacity)),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AreaObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn color(&self) -> Color {
        *self.color.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_color(&self, color: Color) {
        *self.color.lock().unwrap_or_else(PoisonError::into_inner) = color;
    }

    pub fn capacity(&self) -> usize {
        self.monitor.lock().capacity
    }

    /// Number of patients currently admitted.
    pub fn patients(&self) -> usize {
        self.monitor.lock().patients
    }

    /// Number of callers currently blocked in `enter`.
    pub fn waiting(&self) -> usize {
        self.monitor.lock().waiting
    }

    pub fn is_full(&self) -> bool {
        !self.monitor.lock().has_vacancy()
    }

    pub fn status(&self) -> AreaStatus {
        self.status_of(&self.monitor.lock())
    }

    /// Run one observer hook. A panicking hook is logged and contained so
    /// it can neither unwind past a half-finished transition nor poison the
    /// area lock.
    fn notify(&self, ledger: &Ledger, hook: impl FnOnce(&dyn AreaObserver, &AreaStatus)) {
        let status = self.status_of(ledger);
        let observer = &*self.observer;
        if panic::catch_unwind(AssertUnwindSafe(|| hook(observer, &status))).is_err() {
            tracing::error!(area = %self.name, "Area observer panicked - event dropped");
        }
    }

    fn status_of(&self, ledger: &Ledger) -> AreaStatus {
        AreaStatus {
            name: self.name.clone(),
            capacity: ledger.capacity,
            patients: ledger.patients,
            waiting: ledger.waiting,
            state: if ledger.has_vacancy() {
                AreaState::NotFull
            } else {
                AreaState::Full
            },
        }
    }

    /// Block until a slot is free, then take it.
    ///
    /// On a capacity-0 area this never returns.
    pub fn enter(&self, who: impl fmt::Display) {
        // Without a token or deadline the only way out of the loop is admission.
        let _ = self.admit(&who, None, None);
    }

    /// Like [`enter`](Self::enter), but gives up if `token` is cancelled
    /// while waiting. A token that is already cancelled does not stop
    /// admission into an area with a free slot.
    pub fn enter_cancellable(
        &self,
        who: impl fmt::Display,
        token: &CancelToken,
    ) -> Result<(), EnterError> {
        self.admit(&who, Some(token), None)
    }

    /// Like [`enter`](Self::enter), but gives up after `timeout`.
    pub fn enter_timeout(&self, who: impl fmt::Display, timeout: Duration) -> Result<(), EnterError> {
        self.admit(&who, None, Some(timeout))
    }

    /// Take a slot only if one is free right now. Never counted as waiting.
    pub fn try_enter(&self, who: impl fmt::Display) -> bool {
        let mut ledger = self.monitor.lock();
        if !ledger.has_vacancy() {
            return false;
        }
        ledger.patients += 1;
        self.notify(&ledger, |o, status| o.on_admitted(status, &who));
        true
    }

    /// Cancellable entry returning a guard that exits on drop.
    pub fn occupy(
        &self,
        who: impl fmt::Display,
        token: &CancelToken,
    ) -> Result<Occupancy<'_>, EnterError> {
        let who = who.to_string();
        self.admit(&who, Some(token), None)?;
        Ok(Occupancy { area: self, who })
    }

    fn admit(
        &self,
        who: &dyn fmt::Display,
        token: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<(), EnterError> {
        let mut ledger = self.monitor.lock();
        if ledger.has_vacancy() {
            ledger.patients += 1;
            self.notify(&ledger, |o, status| o.on_admitted(status, who));
            return Ok(());
        }

        // An unrepresentable deadline is treated as no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let _parked = token.map(|t| t.park(&self.monitor));

        ledger.waiting += 1;
        self.notify(&ledger, |o, status| o.on_waiting(status, who));

        while !ledger.has_vacancy() {
            if token.is_some_and(CancelToken::is_cancelled) {
                ledger.waiting -= 1;
                self.notify(&ledger, |o, status| o.on_cancelled(status, who));
                return Err(EnterError::Cancelled {
                    area: self.name.clone(),
                });
            }

            ledger = match deadline {
                None => self.monitor.wait(ledger),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        ledger.waiting -= 1;
                        self.notify(&ledger, |o, status| o.on_timed_out(status, who));
                        return Err(EnterError::TimedOut {
                            area: self.name.clone(),
                            after: timeout.unwrap_or_default(),
                        });
                    }
                    self.monitor.wait_timeout(ledger, deadline - now)
                }
            };
        }

        ledger.waiting -= 1;
        ledger.patients += 1;
        self.notify(&ledger, |o, status| o.on_admitted(status, who));
        Ok(())
    }

    /// Release a slot and wake every waiter.
    ///
    /// Calling this without a matching `enter` is a caller bug. On an empty
    /// area it is logged and ignored.
    pub fn exit(&self, who: impl fmt::Display) {
        let mut ledger = self.monitor.lock();
        if ledger.patients == 0 {
            tracing::warn!(
                area = %self.name,
                patient = %who,
                "Exit without matching enter - occupancy stays at zero"
            );
            self.notify(&ledger, |o, status| o.on_misuse(status, &who));
            return;
        }

        ledger.patients -= 1;
        self.monitor.vacancy.notify_all();
        self.notify(&ledger, |o, status| o.on_exited(status, &who));
    }
}

impl fmt::Debug for BoundedArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedArea")
            .field("name", &self.name)
            .field("time", &self.time)
            .field("position", &self.position)
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for BoundedArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for BoundedArea {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BoundedArea {}

impl Hash for BoundedArea {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for BoundedArea {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BoundedArea {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Borrow<str> for BoundedArea {
    fn borrow(&self) -> &str {
        &self.name
    }
}

/// A held slot. Dropping it calls [`BoundedArea::exit`].
#[must_use = "dropping an Occupancy immediately releases the slot"]
pub struct Occupancy<'a> {
    area: &'a BoundedArea,
    who: String,
}

impl Occupancy<'_> {
    pub fn area(&self) -> &BoundedArea {
        self.area
    }

    /// Release the slot now.
    pub fn release(self) {}
}

impl Drop for Occupancy<'_> {
    fn drop(&mut self) {
        self.area.exit(&self.who);
    }
}
