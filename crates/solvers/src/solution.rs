use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

/// Backend exit codes mapped to a common taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Converged to a point satisfying the backend's optimality test.
    Optimal,

    /// Stopped at a feasible point without proving optimality.
    Feasible,

    /// Reached the iteration limit.
    IterationLimit,

    /// Could not find a point satisfying the constraints.
    Infeasible,

    /// Made no further progress, for example a failed line search.
    Stalled,

    /// Stopped by an observer or a cancel token.
    StoppedByObserver,

    /// The backend reported an error.
    Failure,
}

impl ExitStatus {
    /// Whether this status claims an optimal point.
    #[must_use]
    pub fn is_optimal(self) -> bool {
        self == Self::Optimal
    }
}

/// The result of a solve, in unscaled user space.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Name of the backend that produced this solution.
    pub backend: String,

    pub status: ExitStatus,

    /// Native exit code as reported by the backend.
    pub code: i32,

    /// Native message as reported by the backend.
    pub message: String,

    /// Final variable vector.
    pub x: Vec<f64>,

    /// Final variable values keyed by group name.
    pub design: BTreeMap<String, Vec<f64>>,

    /// Objective values in declared order and sense.
    pub objectives: Vec<f64>,

    /// Constraint values in declared row order.
    pub constraints: Vec<f64>,

    pub optimal: bool,
    pub feasible: bool,

    /// Largest constraint bound violation at the final point.
    pub max_violation: f64,

    /// Iterations as counted by the backend.
    pub iterations: usize,

    /// History records produced, including replayed ones.
    pub evaluations: u64,

    pub elapsed: Duration,
}

impl Solution {
    /// The first (or only) objective value.
    #[must_use]
    pub fn objective(&self) -> f64 {
        self.objectives.first().copied().unwrap_or(f64::NAN)
    }
}
