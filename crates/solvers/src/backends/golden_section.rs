//! Golden section search over a single bounded variable.
//!
//! The variable bounds form the initial bracket. Each iteration discards the
//! end beyond the worse interior probe and evaluates one new point, so the
//! bracket shrinks by φ⁻¹ per evaluation. Unimodality is assumed; on other
//! functions the search finds a local minimum.

mod bracket;
mod config;


use ndarray::Array2;
use tracing::debug;

use crate::{
    ExitStatus,
    adapter::{
        BackendProblem, BackendResult, Capabilities, DenseBackend, DenseCallback, EvalRequest, Interrupt,
        ObjectiveConvention,
    },
};

use bracket::{Bracket, Probe};

pub use config::GoldenSectionConfig;

/// Golden section search as a [`DenseBackend`].
///
/// Takes no constraints, and its single variable must have finite bounds.
#[derive(Debug, Clone, Default)]
pub struct GoldenSection {
    config: GoldenSectionConfig,
}

impl GoldenSection {
    /// The bracket converged.
    pub const CONVERGED: i32 = 0;

    /// `max_iters` was reached first.
    pub const MAX_ITERS: i32 = 1;

    /// The variable bounds are not finite.
    pub const UNBOUNDED: i32 = 3;

    /// The problem does not have exactly one variable.
    pub const DIMENSION: i32 = 4;

    /// The callback refused to evaluate.
    pub const INTERRUPTED: i32 = -1;

    #[must_use]
    pub fn new(config: GoldenSectionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GoldenSectionConfig {
        &self.config
    }

    fn search(&self, left: f64, right: f64, callback: &mut dyn DenseCallback) -> BackendResult {
        let [a, b] = Bracket::interior(left, right);
        let first = match probe(callback, a, 0, 0) {
            Ok(p) => p,
            Err(_) => return interrupted(vec![a], 0),
        };
        let second = match probe(callback, b, 0, 1) {
            Ok(p) => p,
            Err(_) => return interrupted(vec![first.x], 0),
        };
        let mut bracket = Bracket::new(left, right, [first, second]);

        for iteration in 1..=self.config.max_iters() {
            if bracket.is_converged(self.config.x_abs_tol(), self.config.x_rel_tol()) {
                let best = bracket.best();
                debug!(iteration, x = best.x, f = best.f, "golden section converged");
                return BackendResult {
                    code: Self::CONVERGED,
                    x: vec![best.x],
                    iterations: iteration - 1,
                    message: format!("bracket width {:e} within tolerance", bracket.width()),
                };
            }

            let step = bracket.next();
            match probe(callback, step.x(), iteration, 0) {
                Ok(p) => bracket.apply(step, p),
                Err(_) => return interrupted(vec![bracket.best().x], iteration),
            }
        }

        BackendResult {
            code: Self::MAX_ITERS,
            x: vec![bracket.best().x],
            iterations: self.config.max_iters(),
            message: format!("bracket width {:e} after max_iters", bracket.width()),
        }
    }
}

impl DenseBackend for GoldenSection {
    fn name(&self) -> &str {
        "golden_section"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            objective: ObjectiveConvention::MinimizeOnly,
            multi_objective: false,
            constraints: false,
            infinity: None,
            ..Capabilities::default()
        }
    }

    fn run(&mut self, problem: &BackendProblem<Array2<f64>>, callback: &mut dyn DenseCallback) -> BackendResult {
        if problem.n_variables() != 1 {
            return BackendResult {
                code: Self::DIMENSION,
                x: problem.x0.clone(),
                iterations: 0,
                message: format!("golden section searches one variable, got {}", problem.n_variables()),
            };
        }

        let (a, b) = (problem.lower[0], problem.upper[0]);
        let (left, right) = if a <= b { (a, b) } else { (b, a) };
        if !(left.is_finite() && right.is_finite()) {
            return BackendResult {
                code: Self::UNBOUNDED,
                x: problem.x0.clone(),
                iterations: 0,
                message: format!("bounds [{left}, {right}] do not form a finite bracket"),
            };
        }

        self.search(left, right, callback)
    }

    fn classify(&self, code: i32) -> ExitStatus {
        match code {
            Self::CONVERGED => ExitStatus::Optimal,
            Self::MAX_ITERS => ExitStatus::IterationLimit,
            Self::INTERRUPTED => ExitStatus::StoppedByObserver,
            _ => ExitStatus::Failure,
        }
    }
}

fn probe(callback: &mut dyn DenseCallback, x: f64, major: usize, minor: u64) -> Result<Probe, Interrupt> {
    let values = callback.evaluate(&[x], EvalRequest::values().at(major as u64, minor))?;
    let f = values.objectives.first().copied().unwrap_or(f64::NAN);
    Ok(Probe { x, f })
}

fn interrupted(x: Vec<f64>, iterations: usize) -> BackendResult {
    BackendResult {
        code: GoldenSection::INTERRUPTED,
        x,
        iterations,
        message: "evaluation interrupted".into(),
    }
}
