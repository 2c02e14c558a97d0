//! Optimizer adapters.
//!
//! An adapter drives one backend calling convention. It freezes the problem,
//! resolves the start point (cold, restart, or hot start), translates the
//! problem into the backend's [`Capabilities`], and runs the backend with a
//! callback that for every requested point:
//!
//! 1. unscales the point and writes it into the problem's current values,
//! 2. evaluates user functions (or replays a history record),
//! 3. computes derivatives when requested,
//! 4. appends a history record and notifies the observer,
//! 5. converts the values back into the backend's scaled layout.
//!
//! [`DenseAdapter`] hands backends zero-padded `ndarray` Jacobians;
//! [`SparseAdapter`] hands them triplets in Jacobian map order.
//!
//! A user failure aborts the solve with [`Error::Evaluation`](crate::Error);
//! an observer returning [`Action::StopEarly`] or a cancelled
//! [`CancelToken`] stops it at the next evaluation boundary.

mod backend;
mod capabilities;
mod dense;
mod evaluator;
mod event;
mod layout;
mod request;
mod scaling;
mod session;
mod sparse;

use skein_core::{Functions, Observer, Problem};

use crate::{Error, Solution};

pub use backend::{
    BackendProblem, BackendResult, DenseBackend, DenseCallback, DenseDerivatives, DenseValues, EvalRequest,
    Interrupt, LinearRows, SparseBackend, SparseCallback, SparseDerivatives, SparseMatrix, SparseStructure,
    SparseValues,
};
pub use capabilities::{BoundEncoding, Capabilities, DEFAULT_INFINITY, LinearHandling, ObjectiveConvention, RowClass};
pub use dense::DenseAdapter;
pub use event::{Action, Event};
pub use request::{CancelToken, SolveRequest};
pub use sparse::SparseAdapter;

/// Largest bound violation at which a point counts as feasible.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Solves a [`Problem`] with one backend.
pub trait OptimizerAdapter {
    /// Name of the backend.
    fn name(&self) -> &str;

    /// Calling convention of the backend.
    fn capabilities(&self) -> Capabilities;

    /// Runs the backend on `problem`, freezing it first.
    ///
    /// On return the problem's current values hold the final point.
    ///
    /// # Errors
    ///
    /// Returns an error if the problem does not fit the backend, the
    /// configuration is invalid, a user function fails, the history cannot
    /// be written, or the backend reports a failure.
    fn solve<F, Obs>(
        &mut self,
        problem: &mut Problem,
        functions: &F,
        request: SolveRequest<'_, Obs>,
    ) -> Result<Solution, Error>
    where
        F: Functions + Sync + ?Sized,
        Obs: for<'e> Observer<Event<'e>, Action>;
}

#[cfg(test)]
mod tests;
