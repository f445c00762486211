//! Narration hooks for area transitions.
//!
//! Every hook runs while the area lock is held, so the status it receives is
//! exactly the state right after the transition. Hooks must not call back
//! into the same area.

use std::fmt;

use crate::area::AreaStatus;

/// Observer of admission events on a [`BoundedArea`](crate::BoundedArea).
///
/// All hooks default to no-ops.
pub trait AreaObserver: Send + Sync {
    /// The area was full and `who` started waiting.
    fn on_waiting(&self, _status: &AreaStatus, _who: &dyn fmt::Display) {}

    /// `who` took a slot.
    fn on_admitted(&self, _status: &AreaStatus, _who: &dyn fmt::Display) {}

    /// `who` stopped waiting because its token was cancelled.
    fn on_cancelled(&self, _status: &AreaStatus, _who: &dyn fmt::Display) {}

    /// `who` stopped waiting because its deadline passed.
    fn on_timed_out(&self, _status: &AreaStatus, _who: &dyn fmt::Display) {}

    /// `who` released its slot.
    fn on_exited(&self, _status: &AreaStatus, _who: &dyn fmt::Display) {}

    /// `who` called `exit` on an area with no occupants.
    fn on_misuse(&self, _status: &AreaStatus, _who: &dyn fmt::Display) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AreaObserver for NoopObserver {}

/// Default observer: emits a structured `tracing` event per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AreaObserver for TracingObserver {
    fn on_waiting(&self, status: &AreaStatus, who: &dyn fmt::Display) {
        tracing::info!(
            area = %status.name,
            patient = %who,
            patients = status.patients,
            waiting = status.waiting,
            capacity = status.capacity,
            "Area full, patient waiting"
        );
    }

    fn on_admitted(&self, status: &AreaStatus, who: &dyn fmt::Display) {
        tracing::info!(
            area = %status.name,
            patient = %who,
            patients = status.patients,
            waiting = status.waiting,
            capacity = status.capacity,
            "Patient admitted"
        );
    }

    fn on_cancelled(&self, status: &AreaStatus, who: &dyn fmt::Display) {
        tracing::warn!(
            area = %status.name,
            patient = %who,
            waiting = status.waiting,
            "Wait cancelled before admission"
        );
    }

    fn on_timed_out(&self, status: &AreaStatus, who: &dyn fmt::Display) {
        tracing::warn!(
            area = %status.name,
            patient = %who,
            waiting = status.waiting,
            "Wait timed out before admission"
        );
    }

    fn on_exited(&self, status: &AreaStatus, who: &dyn fmt::Display) {
        tracing::info!(
            area = %status.name,
            patient = %who,
            patients = status.patients,
            waiting = status.waiting,
            "Patient left area"
        );
    }

    // Misuse is already logged by `BoundedArea::exit` itself.
}
