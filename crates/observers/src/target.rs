use skein_core::{Observer, Sense};

use crate::traits::{CanStopEarly, HasObjective, HasViolation};

/// Stops a solve once a feasible evaluation reaches a target objective.
///
/// Objectives are compared in their declared sense: a minimized objective
/// must fall to the target, a maximized one must rise to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetObjective {
    target: f64,
    sense: Sense,
    tolerance: f64,
}

impl TargetObjective {
    /// Default largest violation of a feasible evaluation.
    pub const DEFAULT_TOLERANCE: f64 = 1e-6;

    /// Stops once the objective is at most `target`.
    #[must_use]
    pub fn below(target: f64) -> Self {
        Self {
            target,
            sense: Sense::Minimize,
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }

    /// Stops once the objective is at least `target`.
    #[must_use]
    pub fn above(target: f64) -> Self {
        Self {
            sense: Sense::Maximize,
            ..Self::below(target)
        }
    }

    /// Counts evaluations violating their bounds by at most `tolerance` as feasible.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn reached(&self, objective: f64) -> bool {
        match self.sense {
            Sense::Minimize => objective <= self.target,
            Sense::Maximize => objective >= self.target,
        }
    }
}

impl<E, A> Observer<E, A> for TargetObjective
where
    E: HasObjective + HasViolation,
    A: CanStopEarly,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        let feasible = event.max_violation() <= self.tolerance;
        (feasible && self.reached(event.objective())).then(A::stop_early)
    }
}

#[cfg(test)]
mod tests {
    use skein_solvers::{Action, Event};

    use super::*;

    fn evaluated(objective: &[f64], max_violation: f64) -> Event<'_> {
        Event::Evaluated {
            index: 0,
            x: &[],
            objectives: objective,
            constraints: &[],
            max_violation,
            gradient: false,
            replayed: false,
            iteration: None,
        }
    }

    fn observe(target: &mut TargetObjective, objective: f64, max_violation: f64) -> Option<Action> {
        target.observe(&evaluated(&[objective], max_violation))
    }

    #[test]
    fn minimized_target_needs_a_feasible_point_below_it() {
        let mut target = TargetObjective::below(1.0);

        assert_eq!(observe(&mut target, 1.5, 0.0), None);
        assert_eq!(observe(&mut target, 0.5, 0.1), None);
        assert_eq!(observe(&mut target, 0.5, 0.0), Some(Action::StopEarly));
    }

    #[test]
    fn maximized_target_needs_a_point_above_it() {
        let mut target = TargetObjective::above(3.0).with_tolerance(0.2);

        assert_eq!(observe(&mut target, 2.9, 0.0), None);
        assert_eq!(observe(&mut target, 3.2, 0.1), Some(Action::StopEarly));
    }

    #[test]
    fn failed_evaluations_never_reach_the_target() {
        let mut target = TargetObjective::below(f64::INFINITY);
        let error = std::fmt::Error;
        let failed = Event::Failed {
            index: 4,
            x: &[],
            error: &error,
        };

        let action: Option<Action> = target.observe(&failed);

        assert_eq!(action, None);
    }
}
