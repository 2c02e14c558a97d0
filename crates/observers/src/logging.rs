use skein_core::Observer;
use tracing::{debug, info, warn};

use crate::traits::{HasIndex, HasObjective, HasViolation};

/// Logs evaluations through `tracing`.
///
/// Every `every`-th evaluation index is logged at `info`, the others at
/// `debug`. Failed evaluations, which carry no objective, are logged at
/// `warn`. Never requests an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingObserver {
    every: u64,
    reported: u64,
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::every(1)
    }
}

impl TracingObserver {
    /// Logs every evaluation at `info`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs every `n`-th evaluation at `info`; zero is treated as one.
    #[must_use]
    pub fn every(n: u64) -> Self {
        Self {
            every: n.max(1),
            reported: 0,
        }
    }

    /// Number of evaluations logged at `info` so far.
    #[must_use]
    pub fn reported(&self) -> u64 {
        self.reported
    }
}

impl<E, A> Observer<E, A> for TracingObserver
where
    E: HasIndex + HasObjective + HasViolation,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        let index = event.index();
        let objective = event.objective();
        let max_violation = event.max_violation();

        if objective.is_nan() {
            warn!(index, "evaluation failed");
        } else if index % self.every == 0 {
            self.reported += 1;
            info!(index, objective, max_violation, "evaluation");
        } else {
            debug!(index, objective, max_violation, "evaluation");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use skein_solvers::{Action, Event};

    use super::*;

    fn evaluated(index: u64) -> Event<'static> {
        Event::Evaluated {
            index,
            x: &[1.0],
            objectives: &[2.0],
            constraints: &[],
            max_violation: 0.0,
            gradient: false,
            replayed: false,
            iteration: None,
        }
    }

    #[test]
    fn reports_every_nth_index() {
        let mut observer = TracingObserver::every(2);

        for index in 0..5 {
            let action: Option<Action> = observer.observe(&evaluated(index));
            assert!(action.is_none());
        }

        assert_eq!(observer.reported(), 3);
    }
}
