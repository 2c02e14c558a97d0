use std::time::Instant;

use ndarray::Array2;
use skein_core::{Functions, Observer, Problem, Sense};
use skein_history::{RestartMode, RestartUnavailable};
use tracing::{error, info, warn};

use crate::{
    Error, ExitStatus, GradientConfig, Solution,
    adapter::{
        Action, BackendProblem, BackendResult, Capabilities, EvalRequest, Event, FEASIBILITY_TOLERANCE,
        Interrupt, LinearRows, ObjectiveConvention, SolveRequest,
        evaluator::{Evaluated, Evaluator, Parts},
        layout::RowLayout,
        scaling::Scaling,
    },
    gradient::GradientProvider,
};

/// Values of one callback in scaled backend space.
pub(crate) struct Scaled {
    pub(crate) objectives: Vec<f64>,

    /// Callback rows in backend order and encoding.
    pub(crate) constraints: Vec<f64>,

    /// Objective gradients and Jacobian values in map order.
    pub(crate) derivatives: Option<(Array2<f64>, Vec<f64>)>,
}

/// State of one solve, shared by the dense and sparse adapters.
pub(crate) struct Session<'s, F: ?Sized, Obs> {
    evaluator: Evaluator<'s, F, Obs>,
    pub(crate) scaling: Scaling,
    pub(crate) layout: RowLayout,
    capabilities: Capabilities,
    backend: String,

    /// Unscaled start, after restart and clipping.
    x0: Vec<f64>,

    /// Scaled constant values of linear Jacobian entries, in map order.
    linear_jacobian: Vec<f64>,

    /// Set when the backend requests a point of the wrong length.
    invalid_point: Option<String>,

    started: Instant,
}

impl<'s, F, Obs> Session<'s, F, Obs>
where
    F: Functions + Sync + ?Sized,
    Obs: for<'e> Observer<Event<'e>, Action>,
{
    /// Freezes and checks the problem, then resolves the start point.
    pub(crate) fn start(
        problem: &'s mut Problem,
        functions: &'s F,
        capabilities: Capabilities,
        gradients: &GradientConfig,
        backend: &str,
        request: SolveRequest<'s, Obs>,
    ) -> Result<Self, Error> {
        let started = Instant::now();
        capabilities.validate()?;
        let map = problem.freeze()?.clone();

        let count = problem.objectives().len();
        if count > 1 && !capabilities.multi_objective {
            return Err(Error::CombinationPolicy {
                backend: backend.to_owned(),
                count,
            });
        }
        if problem.n_constraints() > 0 && !capabilities.constraints {
            return Err(Error::Unsupported {
                backend: backend.to_owned(),
                feature: "constraints",
            });
        }
        let provider = GradientProvider::new(problem, &map, gradients)?;

        let SolveRequest {
            observer,
            history,
            restart,
            hot_start,
            cancel,
        } = request;

        let initial = problem.variables().initial();
        let (start, replay) = match restart {
            None => (initial, Vec::new()),
            Some(restart) if restart.mode() == RestartMode::Exact => {
                let signature = problem.signature();
                if !restart.signature().same_variables(&signature) {
                    return Err(RestartUnavailable::SignatureMismatch.into());
                }
                if hot_start && restart.signature().matches(&signature) {
                    // Replay requires retracing the original run from its start.
                    (initial, restart.records().to_vec())
                } else {
                    if hot_start {
                        warn!("constraints or objectives changed since the history was written, replay disabled");
                    }
                    (restart.record().x.clone(), Vec::new())
                }
            }
            Some(restart) => {
                if hot_start {
                    warn!("hot start needs an exact restart, replay disabled");
                }
                (restart.starting_point(&problem.signature(), &initial), Vec::new())
            }
        };

        let (x0, warnings) = clip(start, &problem.variables().lower(), &problem.variables().upper());

        let scaling = Scaling::new(problem, &map, &capabilities);
        let layout = RowLayout::new(problem, &map, &scaling, &capabilities);

        let mut linear = vec![0.0; map.nnz()];
        for (index, block) in problem.constraints().iter().enumerate() {
            if let Some(coefficients) = block.coefficients() {
                for (global, &a) in map.block_range(index).zip(coefficients) {
                    linear[global] = a;
                }
            }
        }
        let linear_jacobian = scaling.jacobian(&linear);

        info!(
            backend,
            problem = problem.name(),
            variables = problem.n_variables(),
            constraints = problem.n_constraints(),
            backend_rows = layout.callback_len(),
            nonzeros = map.nnz(),
            restart = restart.is_some(),
            replay = replay.len(),
            "solve started"
        );

        let parts = Parts {
            provider,
            nnz: map.nnz(),
            observer,
            history,
            replay,
            cancel,
            warnings,
        };
        Ok(Self {
            evaluator: Evaluator::new(problem, functions, parts),
            scaling,
            layout,
            capabilities,
            backend: backend.to_owned(),
            x0,
            linear_jacobian,
            invalid_point: None,
            started,
        })
    }

    pub(crate) fn linear_jacobian(&self) -> &[f64] {
        &self.linear_jacobian
    }

    /// The problem in the backend's conventions.
    pub(crate) fn backend_problem<M>(&self, linear: Option<LinearRows<M>>) -> BackendProblem<M> {
        let problem = self.evaluator.problem();
        let variables = problem.variables();
        let (lower, upper) = self.scaling.bounds(&variables.lower(), &variables.upper());
        let encode = |values: Vec<f64>| -> Vec<f64> {
            values
                .into_iter()
                .map(|v| self.capabilities.encode_bound(v))
                .collect()
        };
        let senses = problem
            .objectives()
            .iter()
            .map(|o| match self.capabilities.objective {
                ObjectiveConvention::MinimizeOnly => Sense::Minimize,
                ObjectiveConvention::Native => o.sense(),
            })
            .collect();

        BackendProblem {
            name: problem.name().to_owned(),
            x0: self.scaling.to_backend(&self.x0),
            lower: encode(lower),
            upper: encode(upper),
            kinds: variables.kinds(),
            senses,
            constraint_lower: self.layout.callback_lower().to_vec(),
            constraint_upper: self.layout.callback_upper().to_vec(),
            linear,
        }
    }

    /// Evaluates at the scaled point `x` and converts to backend space.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupt`] once the solve is stopped or has failed.
    pub(crate) fn evaluate(&mut self, x: &[f64], request: EvalRequest) -> Result<Scaled, Interrupt> {
        if self.invalid_point.is_some() {
            return Err(Interrupt::Failed);
        }
        if x.len() != self.x0.len() {
            let message = format!(
                "backend requested a point with {} variables, expected {}",
                x.len(),
                self.x0.len()
            );
            error!(backend = %self.backend, %message, "invalid evaluation request");
            self.invalid_point = Some(message);
            return Err(Interrupt::Failed);
        }
        let evaluated = self.evaluator.evaluate(self.scaling.to_user(x), request)?;
        let derivatives = evaluated.derivatives.filter(|_| request.gradient).map(|d| {
            (
                self.scaling.objective_gradients(&d.objectives),
                self.scaling.jacobian(&d.jacobian),
            )
        });
        Ok(Scaled {
            objectives: self.scaling.objectives(&evaluated.objectives),
            constraints: self.layout.callback_values(&self.scaling.constraints(&evaluated.constraints)),
            derivatives,
        })
    }

    /// Builds the solution once the backend has returned.
    pub(crate) fn finish(mut self, result: BackendResult, status: ExitStatus) -> Result<Solution, Error> {
        if let Some(error) = self.evaluator.take_failure() {
            return Err(error);
        }
        if let Some(message) = self.invalid_point.take() {
            return Err(Error::Backend {
                code: result.code,
                message,
            });
        }

        let stopped = self.evaluator.stopped();
        let status = if stopped {
            ExitStatus::StoppedByObserver
        } else {
            status
        };
        if status == ExitStatus::Failure {
            error!(
                backend = %self.backend,
                code = result.code,
                message = %result.message,
                "backend failed"
            );
            return Err(Error::Backend {
                code: result.code,
                message: result.message,
            });
        }

        let x = if stopped {
            self.evaluator
                .last()
                .map_or_else(|| self.x0.clone(), |last| last.x.clone())
        } else if result.x.len() == self.x0.len() {
            self.scaling.to_user(&result.x)
        } else {
            return Err(Error::Backend {
                code: result.code,
                message: format!(
                    "backend returned {} variables, expected {}",
                    result.x.len(),
                    self.x0.len()
                ),
            });
        };

        let Evaluated {
            x,
            objectives,
            constraints,
            max_violation,
            ..
        } = self.evaluator.conclude(x)?;
        let feasible = max_violation <= FEASIBILITY_TOLERANCE;

        let solution = Solution {
            backend: self.backend,
            status,
            code: result.code,
            message: result.message,
            design: self.evaluator.problem().design_values(),
            x,
            objectives,
            constraints,
            optimal: status.is_optimal() && feasible,
            feasible,
            max_violation,
            iterations: result.iterations,
            evaluations: self.evaluator.evaluations(),
            elapsed: self.started.elapsed(),
        };

        info!(
            backend = %solution.backend,
            status = ?solution.status,
            code = solution.code,
            objectives = ?solution.objectives,
            max_violation = solution.max_violation,
            iterations = solution.iterations,
            evaluations = solution.evaluations,
            elapsed = ?solution.elapsed,
            "solve finished"
        );
        Ok(solution)
    }
}

/// Clips `x` into `[lower, upper]`, returning a warning per moved column.
fn clip(mut x: Vec<f64>, lower: &[f64], upper: &[f64]) -> (Vec<f64>, Vec<String>) {
    let mut warnings = Vec::new();
    for (column, ((value, &lo), &hi)) in x.iter_mut().zip(lower).zip(upper).enumerate() {
        let clipped = value.clamp(lo, hi);
        if clipped != *value {
            warn!(column, from = *value, to = clipped, "start point clipped into bounds");
            warnings.push(format!(
                "start of column {column} clipped from {value} to {clipped}"
            ));
            *value = clipped;
        }
    }
    (x, warnings)
}
