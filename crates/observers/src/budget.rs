use skein_core::Observer;

use crate::traits::CanStopEarly;

/// Stops a solve once it has seen `max` evaluations.
///
/// Failed evaluations count against the budget too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationBudget {
    max: u64,
    seen: u64,
}

impl EvaluationBudget {
    #[must_use]
    pub fn new(max: u64) -> Self {
        Self { max, seen: 0 }
    }

    /// Evaluations observed so far.
    #[must_use]
    pub fn seen(&self) -> u64 {
        self.seen
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.max.saturating_sub(self.seen)
    }
}

impl<E, A: CanStopEarly> Observer<E, A> for EvaluationBudget {
    fn observe(&mut self, _event: &E) -> Option<A> {
        self.seen += 1;
        (self.seen >= self.max).then(A::stop_early)
    }
}
