//! Projected gradient descent with a quadratic penalty.
//!
//! Minimizes the merit function
//!
//! ```text
//! φ(x) = f(x) + μ Σ vᵢ(x)²
//! ```
//!
//! where `vᵢ` is the signed amount by which row `i` leaves its bounds, over
//! the box of variable bounds. Each iteration backtracks from
//! `initial_step` along the projected steepest descent path until the
//! Armijo condition holds. The penalty is inexact: a constrained optimum is
//! approached from outside, and the gap shrinks as `μ` grows.

mod config;


use ndarray::Array2;
use tracing::{debug, trace};

use crate::{
    ExitStatus,
    adapter::{
        BackendProblem, BackendResult, BoundEncoding, Capabilities, DEFAULT_INFINITY, DenseBackend, DenseCallback,
        DenseValues, EvalRequest, Interrupt, ObjectiveConvention,
    },
};

pub use config::ProjectedGradientConfig;

/// Armijo sufficient decrease constant.
const SUFFICIENT_DECREASE: f64 = 1e-4;

/// Projected gradient descent as a [`DenseBackend`].
#[derive(Debug, Clone, Default)]
pub struct ProjectedGradient {
    config: ProjectedGradientConfig,
}

/// Merit value at a point, with its gradient when derivatives were requested.
struct Merit {
    value: f64,
    gradient: Vec<f64>,
}

impl ProjectedGradient {
    /// The projected gradient fell below `gradient_tol`.
    pub const CONVERGED: i32 = 0;

    /// `max_iters` was reached first.
    pub const MAX_ITERS: i32 = 1;

    /// No trial step decreased the merit function.
    pub const LINE_SEARCH: i32 = 2;

    /// The callback refused to evaluate.
    pub const INTERRUPTED: i32 = -1;

    #[must_use]
    pub fn new(config: ProjectedGradientConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ProjectedGradientConfig {
        &self.config
    }

    fn merit(
        &self,
        problem: &BackendProblem<Array2<f64>>,
        callback: &mut dyn DenseCallback,
        x: &[f64],
        request: EvalRequest,
    ) -> Result<Merit, Interrupt> {
        let DenseValues {
            objectives,
            constraints,
            derivatives,
        } = callback.evaluate(x, request)?;

        let mu = self.config.penalty();
        let mut value = objectives.first().copied().unwrap_or(0.0);
        let mut excess = Vec::with_capacity(constraints.len());
        for ((&c, &lower), &upper) in constraints
            .iter()
            .zip(&problem.constraint_lower)
            .zip(&problem.constraint_upper)
        {
            let v = if c > upper {
                c - upper
            } else if c < lower {
                c - lower
            } else {
                0.0
            };
            value += mu * v * v;
            excess.push(v);
        }

        let gradient = match derivatives {
            Some(d) => {
                let mut gradient = if d.objectives.nrows() > 0 {
                    d.objectives.row(0).to_vec()
                } else {
                    vec![0.0; x.len()]
                };
                for (row, &v) in d.jacobian.rows().into_iter().zip(&excess) {
                    if v != 0.0 {
                        for (g, &a) in gradient.iter_mut().zip(row) {
                            *g += 2.0 * mu * v * a;
                        }
                    }
                }
                gradient
            }
            None => Vec::new(),
        };

        Ok(Merit { value, gradient })
    }

    fn descend(
        &self,
        problem: &BackendProblem<Array2<f64>>,
        callback: &mut dyn DenseCallback,
    ) -> Result<BackendResult, (Vec<f64>, usize)> {
        let (lower, upper) = (&problem.lower, &problem.upper);
        let mut x = project(&problem.x0, 0.0, &problem.x0, lower, upper);
        let mut current = self
            .merit(problem, callback, &x, EvalRequest::with_gradient().at(0, 0))
            .map_err(|_| (x.clone(), 0))?;

        for iteration in 1..=self.config.max_iters() {
            let stationarity = project(&x, 1.0, &current.gradient, lower, upper)
                .iter()
                .zip(&x)
                .map(|(p, xi)| (p - xi).abs())
                .fold(0.0, f64::max);
            trace!(iteration, merit = current.value, stationarity, "projected gradient step");
            if stationarity <= self.config.gradient_tol() {
                debug!(iteration, merit = current.value, "projected gradient converged");
                return Ok(BackendResult {
                    code: Self::CONVERGED,
                    x,
                    iterations: iteration - 1,
                    message: format!("projected gradient {stationarity:e} within tolerance"),
                });
            }

            let mut step = self.config.initial_step();
            let mut accepted = None;
            for trial in 1..=self.config.max_backtracks() {
                let candidate = project(&x, step, &current.gradient, lower, upper);
                let decrease: f64 = current
                    .gradient
                    .iter()
                    .zip(candidate.iter().zip(&x))
                    .map(|(g, (c, xi))| g * (c - xi))
                    .sum();
                let request = EvalRequest::values().at(iteration as u64, trial as u64);
                let trial_merit = self
                    .merit(problem, callback, &candidate, request)
                    .map_err(|_| (x.clone(), iteration))?;
                if trial_merit.value <= current.value + SUFFICIENT_DECREASE * decrease {
                    accepted = Some((candidate, request));
                    break;
                }
                step *= self.config.shrink();
            }

            let Some((next, request)) = accepted else {
                return Ok(BackendResult {
                    code: Self::LINE_SEARCH,
                    x,
                    iterations: iteration,
                    message: format!(
                        "no decrease after {} backtracks",
                        self.config.max_backtracks()
                    ),
                });
            };
            let gradient_request = EvalRequest {
                gradient: true,
                ..request
            };
            current = self
                .merit(problem, callback, &next, gradient_request)
                .map_err(|_| (next.clone(), iteration))?;
            x = next;
        }

        Ok(BackendResult {
            code: Self::MAX_ITERS,
            x,
            iterations: self.config.max_iters(),
            message: "iteration limit reached".into(),
        })
    }
}

impl DenseBackend for ProjectedGradient {
    fn name(&self) -> &str {
        "projected_gradient"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            objective: ObjectiveConvention::MinimizeOnly,
            multi_objective: false,
            constraints: true,
            encoding: BoundEncoding::OneSided,
            split_equalities: false,
            infinity: Some(DEFAULT_INFINITY),
            ..Capabilities::default()
        }
    }

    fn run(&mut self, problem: &BackendProblem<Array2<f64>>, callback: &mut dyn DenseCallback) -> BackendResult {
        self.descend(problem, callback)
            .unwrap_or_else(|(x, iterations)| BackendResult {
                code: Self::INTERRUPTED,
                x,
                iterations,
                message: "evaluation interrupted".into(),
            })
    }

    fn classify(&self, code: i32) -> ExitStatus {
        match code {
            Self::CONVERGED => ExitStatus::Optimal,
            Self::MAX_ITERS => ExitStatus::IterationLimit,
            Self::LINE_SEARCH => ExitStatus::Stalled,
            Self::INTERRUPTED => ExitStatus::StoppedByObserver,
            _ => ExitStatus::Failure,
        }
    }
}

/// `x - step · direction`, clamped into `[lower, upper]`.
///
/// A zero step only clamps `x`.
fn project(x: &[f64], step: f64, direction: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(direction)
        .zip(lower.iter().zip(upper))
        .map(|((&xi, &d), (&lo, &hi))| (xi - step * d).max(lo).min(hi))
        .collect()
}
