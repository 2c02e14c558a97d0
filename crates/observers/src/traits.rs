//! Capability traits for generic observers.
//!
//! These traits abstract over adapter event and action types, so an observer
//! can be written once and used with any adapter.
//!
//! # Event traits
//!
//! - [`HasIndex`]: events that carry an evaluation index
//! - [`HasObjective`]: events that carry an objective value
//! - [`HasViolation`]: events that carry a constraint violation
//!
//! # Action traits
//!
//! - [`CanStopEarly`]: actions that can signal early termination
//!
//! # Example
//!
//! ```rust
//! use skein_core::Observer;
//! use skein_observers::traits::{CanStopEarly, HasObjective};
//!
//! struct Plateau {
//!     best: f64,
//!     stale: usize,
//!     patience: usize,
//! }
//!
//! impl<E: HasObjective, A: CanStopEarly> Observer<E, A> for Plateau {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         let f = event.objective();
//!         if f < self.best {
//!             self.best = f;
//!             self.stale = 0;
//!         } else {
//!             self.stale += 1;
//!         }
//!         (self.stale >= self.patience).then(A::stop_early)
//!     }
//! }
//! ```

use skein_solvers::{Action, Event};

/// An event that carries the index of its evaluation.
pub trait HasIndex {
    fn index(&self) -> u64;
}

/// An event that carries an objective value.
pub trait HasObjective {
    /// Returns the first objective for this event, in its declared sense.
    ///
    /// Returns `f64::NAN` when the event represents an error and no objective
    /// is available.
    fn objective(&self) -> f64;
}

/// An event that carries a constraint violation.
pub trait HasViolation {
    /// Returns the largest constraint bound violation for this event.
    ///
    /// Returns `f64::NAN` when the event represents an error.
    fn max_violation(&self) -> f64;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    /// Returns the action that stops the solve early.
    fn stop_early() -> Self;
}

impl HasIndex for Event<'_> {
    fn index(&self) -> u64 {
        Event::index(self)
    }
}

impl HasObjective for Event<'_> {
    fn objective(&self) -> f64 {
        Event::objective(self).unwrap_or(f64::NAN)
    }
}

impl HasViolation for Event<'_> {
    fn max_violation(&self) -> f64 {
        match self {
            Event::Evaluated { max_violation, .. } => *max_violation,
            Event::Failed { .. } => f64::NAN,
        }
    }
}

impl CanStopEarly for Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}
