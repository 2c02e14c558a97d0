use std::error::Error as StdError;

use skein_history::Iteration;

/// Events emitted by an adapter, one per evaluation.
#[derive(Debug)]
pub enum Event<'a> {
    /// An evaluation completed and was recorded.
    Evaluated {
        /// History index of the evaluation.
        index: u64,

        /// The point, in unscaled user space.
        x: &'a [f64],

        /// Objective values in declared order and sense.
        objectives: &'a [f64],

        /// Constraint values in declared row order.
        constraints: &'a [f64],

        /// Largest constraint bound violation.
        max_violation: f64,

        /// Whether derivatives were computed.
        gradient: bool,

        /// Whether the values came from a replayed history record.
        replayed: bool,

        /// Iteration counters reported by the backend, if any.
        iteration: Option<Iteration>,
    },

    /// A user function failed; the solve is being aborted.
    Failed {
        index: u64,
        x: &'a [f64],
        error: &'a (dyn StdError + Send + Sync),
    },
}

impl Event<'_> {
    /// History index of the evaluation.
    #[must_use]
    pub fn index(&self) -> u64 {
        match self {
            Self::Evaluated { index, .. } | Self::Failed { index, .. } => *index,
        }
    }

    /// The point evaluated (or attempted), in unscaled user space.
    #[must_use]
    pub fn x(&self) -> &[f64] {
        match self {
            Self::Evaluated { x, .. } | Self::Failed { x, .. } => x,
        }
    }

    /// First objective value, if the evaluation succeeded.
    #[must_use]
    pub fn objective(&self) -> Option<f64> {
        match self {
            Self::Evaluated { objectives, .. } => objectives.first().copied(),
            Self::Failed { .. } => None,
        }
    }
}

/// Actions an observer can request from an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop at the next evaluation boundary and report the last point.
    StopEarly,
}
