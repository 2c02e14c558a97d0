use std::{collections::VecDeque, error::Error as StdError};

use jiff::Timestamp;
use skein_core::{Functions, Observer, Problem};
use skein_history::{GradientRecord, HistoryWriter, Record};
use tracing::{debug, error, info, warn};

use crate::{
    Error,
    adapter::{Action, CancelToken, EvalRequest, Event, FEASIBILITY_TOLERANCE, Interrupt},
    evaluate::{Evaluation, evaluate},
    gradient::{Derivatives, GradientProvider},
};

/// One recorded evaluation, in unscaled user space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Evaluated {
    pub(crate) index: u64,
    pub(crate) x: Vec<f64>,
    pub(crate) objectives: Vec<f64>,
    pub(crate) constraints: Vec<f64>,
    pub(crate) max_violation: f64,
    pub(crate) derivatives: Option<Derivatives>,
}

/// Per-evaluation pipeline shared by all adapters.
///
/// Writes the point into the problem, evaluates (or replays) values and
/// derivatives, appends a history record, and notifies the observer. A user
/// failure is stored and every later request is refused.
pub(crate) struct Evaluator<'s, F: ?Sized, Obs> {
    problem: &'s mut Problem,
    functions: &'s F,
    provider: GradientProvider,
    nnz: usize,
    observer: Obs,
    history: Option<&'s mut HistoryWriter>,
    replay: VecDeque<Record>,
    cancel: CancelToken,
    next_index: u64,
    count: u64,
    stopped: bool,
    failure: Option<Error>,

    /// Attached to the next record.
    warnings: Vec<String>,

    last: Option<Evaluated>,
}

/// Everything an [`Evaluator`] needs besides the problem and functions.
pub(crate) struct Parts<'s, Obs> {
    pub(crate) provider: GradientProvider,
    pub(crate) nnz: usize,
    pub(crate) observer: Obs,
    pub(crate) history: Option<&'s mut HistoryWriter>,
    pub(crate) replay: Vec<Record>,
    pub(crate) cancel: CancelToken,
    pub(crate) warnings: Vec<String>,
}

impl<'s, F, Obs> Evaluator<'s, F, Obs>
where
    F: Functions + Sync + ?Sized,
    Obs: for<'e> Observer<Event<'e>, Action>,
{
    pub(crate) fn new(problem: &'s mut Problem, functions: &'s F, parts: Parts<'s, Obs>) -> Self {
        let next_index = parts
            .history
            .as_ref()
            .and_then(|h| h.last_index())
            .map_or(0, |last| last + 1);
        Self {
            problem,
            functions,
            provider: parts.provider,
            nnz: parts.nnz,
            observer: parts.observer,
            history: parts.history,
            replay: parts.replay.into(),
            cancel: parts.cancel,
            next_index,
            count: 0,
            stopped: false,
            failure: None,
            warnings: parts.warnings,
            last: None,
        }
    }

    pub(crate) fn problem(&self) -> &Problem {
        &*self.problem
    }

    /// Evaluates at the user-space point `x` on behalf of the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupt`] once the solve is stopped or has failed.
    pub(crate) fn evaluate(&mut self, x: Vec<f64>, request: EvalRequest) -> Result<Evaluated, Interrupt> {
        if self.failure.is_some() {
            return Err(Interrupt::Failed);
        }
        if !self.stopped && self.cancel.is_cancelled() {
            info!(index = self.next_index, "solve cancelled");
            self.stopped = true;
        }
        if self.stopped {
            return Err(Interrupt::Stopped);
        }

        self.run(x, request).map_err(|error| {
            self.failure = Some(error);
            Interrupt::Failed
        })
    }

    /// Values at the final point, evaluating it if it was not the last one.
    ///
    /// Ignores stop requests.
    pub(crate) fn conclude(&mut self, x: Vec<f64>) -> Result<Evaluated, Error> {
        self.replay.clear();
        self.run(x, EvalRequest::values())
    }

    pub(crate) fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }

    pub(crate) fn stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn last(&self) -> Option<&Evaluated> {
        self.last.as_ref()
    }

    /// Records produced so far.
    pub(crate) fn evaluations(&self) -> u64 {
        self.count
    }

    fn run(&mut self, x: Vec<f64>, request: EvalRequest) -> Result<Evaluated, Error> {
        let same_point = self.last.as_ref().is_some_and(|last| last.x == x);
        if let Some(last) = &self.last
            && same_point
            && (!request.gradient || last.derivatives.is_some())
        {
            return Ok(last.clone());
        }

        let index = self.next_index;
        self.problem.set_current_values(&x);

        let (evaluation, derivatives, replayed) = match self.replayed(&x, request) {
            Some((evaluation, derivatives)) => (evaluation, derivatives, true),
            None => {
                let reused = self.last.as_ref().filter(|_| same_point).map(|last| Evaluation {
                    objectives: last.objectives.clone(),
                    constraints: last.constraints.clone(),
                });
                let evaluation = match reused {
                    Some(evaluation) => evaluation,
                    None => match evaluate(&*self.problem, self.functions, &x) {
                        Ok(evaluation) => evaluation,
                        Err(e) => return Err(self.fail(index, &x, Box::new(e))),
                    },
                };
                let derivatives = if request.gradient {
                    match self.provider.compute(&*self.problem, self.functions, &x, &evaluation) {
                        Ok(derivatives) => Some(derivatives),
                        Err(e) => return Err(self.fail(index, &x, Box::new(e))),
                    }
                } else {
                    None
                };
                (evaluation, derivatives, false)
            }
        };

        let max_violation = self.problem.max_violation(&evaluation.constraints);
        let mut warnings = std::mem::take(&mut self.warnings);
        if let Some(derivatives) = &derivatives {
            warnings.extend(derivatives.warnings.iter().cloned());
        }
        for warning in &warnings {
            warn!(index, %warning, "evaluation warning");
        }

        if let Some(history) = self.history.as_deref_mut() {
            let record = Record {
                index,
                timestamp: Timestamp::now(),
                x: x.clone(),
                objectives: evaluation.objectives.clone(),
                constraints: evaluation.constraints.clone(),
                gradient: derivatives.as_ref().map(|d| GradientRecord {
                    objectives: d.objectives.clone(),
                    jacobian: d.jacobian.clone(),
                }),
                iteration: request.iteration,
                feasible: max_violation <= FEASIBILITY_TOLERANCE,
                warnings,
            };
            history
                .append(&record)
                .inspect_err(|e| error!(index, error = %e, "history append failed"))?;
        }
        self.next_index += 1;
        self.count += 1;

        let event = Event::Evaluated {
            index,
            x: &x,
            objectives: &evaluation.objectives,
            constraints: &evaluation.constraints,
            max_violation,
            gradient: derivatives.is_some(),
            replayed,
            iteration: request.iteration,
        };
        if let Some(Action::StopEarly) = self.observer.observe(&event) {
            info!(index, "observer requested stop");
            self.stopped = true;
        }

        debug!(
            index,
            objectives = ?evaluation.objectives,
            max_violation,
            gradient = derivatives.is_some(),
            replayed,
            "evaluation complete"
        );

        let evaluated = Evaluated {
            index,
            x,
            objectives: evaluation.objectives,
            constraints: evaluation.constraints,
            max_violation,
            derivatives,
        };
        self.last = Some(evaluated.clone());
        Ok(evaluated)
    }

    /// Takes the next replay record if it was made at exactly `x`.
    ///
    /// The first mismatch drops the remaining records.
    fn replayed(&mut self, x: &[f64], request: EvalRequest) -> Option<(Evaluation, Option<Derivatives>)> {
        let front = self.replay.front()?;
        let same_bits = front.x.len() == x.len()
            && front.x.iter().zip(x).all(|(a, b)| a.to_bits() == b.to_bits());
        let has_gradient = front
            .gradient
            .as_ref()
            .is_some_and(|g| g.jacobian.len() == self.nnz);
        if !same_bits || (request.gradient && !has_gradient) {
            info!(
                index = self.next_index,
                dropped = self.replay.len(),
                "hot start diverged, evaluating live"
            );
            self.replay.clear();
            return None;
        }

        let record = self.replay.pop_front()?;
        let derivatives = record.gradient.filter(|_| request.gradient).map(|g| Derivatives {
            objectives: g.objectives,
            jacobian: g.jacobian,
            warnings: Vec::new(),
        });
        Some((
            Evaluation {
                objectives: record.objectives,
                constraints: record.constraints,
            },
            derivatives,
        ))
    }

    fn fail(&mut self, index: u64, x: &[f64], source: Box<dyn StdError + Send + Sync>) -> Error {
        error!(index, error = %source, "user function failed, aborting solve");
        // A failed evaluation cannot be steered, so any action is ignored.
        let _ = self.observer.observe(&Event::Failed {
            index,
            x,
            error: source.as_ref(),
        });
        Error::Evaluation { index, source }
    }
}
