//! Objective gradients and constraint Jacobians at a design point.
//!
//! Each variable column gets a [`Strategy`]: analytic values from the user,
//! forward or central finite differences, or a complex step. Every strategy
//! writes into the same flat Jacobian buffer indexed by the problem's
//! [`JacobianMap`]; linear blocks contribute their constant coefficients.
//!
//! Perturbed columns are independent, so [`GradientProvider::compute`] can
//! deal them out to worker threads. Workers receive column indices over a
//! channel each and reply over a shared one; `compute` returns only after
//! every column has replied.

mod complex_step;
mod config;
mod finite_difference;
mod workers;


use std::error::Error as StdError;

use skein_core::{Functions, JacobianMap, Problem, ValuesError};
use thiserror::Error;

use crate::{
    ConfigError,
    evaluate::{EvalError, Evaluation},
};

pub use config::{DEFAULT_COMPLEX_STEP, GradientConfig, Scheme, Strategy};

/// Derivatives at one point, in unscaled user space.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives {
    /// One dense gradient per objective, in declared order.
    pub objectives: Vec<Vec<f64>>,

    /// Jacobian values indexed by the problem's [`JacobianMap`].
    pub jacobian: Vec<f64>,

    /// Non-fatal conditions met while differencing, such as reflected steps.
    pub warnings: Vec<String>,
}

/// Errors raised while computing derivatives.
#[derive(Debug, Error)]
pub enum GradientError {
    #[error("user function failed")]
    Function(#[source] Box<dyn StdError + Send + Sync>),

    #[error("user function returned unusable values")]
    Values(#[from] ValuesError),

    #[error("analytic derivatives were requested but `gradients` returned none")]
    MissingAnalytic,

    #[error("complex step was requested but `evaluate_complex` returned none")]
    MissingComplex,

    #[error("derivative with respect to column {column} is not finite")]
    NonFinite { column: usize },
}

impl<E> From<EvalError<E>> for GradientError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: EvalError<E>) -> Self {
        match error {
            EvalError::Function(source) => Self::Function(Box::new(source)),
            EvalError::Values(values) => Self::Values(values),
        }
    }
}

/// Derivatives with respect to one perturbed column.
struct Column {
    index: usize,

    /// One partial derivative per objective.
    objectives: Vec<f64>,

    /// Aligned with the column's nonlinear Jacobian entries.
    entries: Vec<f64>,

    warning: Option<String>,
}

/// Computes derivatives for a frozen problem.
///
/// Built once per solve; the per-column strategies and Jacobian entry lists
/// are resolved up front.
#[derive(Debug, Clone)]
pub struct GradientProvider {
    map: JacobianMap,
    strategies: Vec<Strategy>,
    analytic: Vec<bool>,

    /// Flat indices of nonlinear Jacobian entries, per column.
    entries: Vec<Vec<usize>>,

    /// Constant values of linear Jacobian entries.
    linear: Vec<(usize, f64)>,

    lower: Vec<f64>,
    upper: Vec<f64>,
    workers: usize,
}

impl GradientProvider {
    /// Resolves `config` against `problem` and its Jacobian map.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid for `problem`.
    pub fn new(problem: &Problem, map: &JacobianMap, config: &GradientConfig) -> Result<Self, ConfigError> {
        let strategies = config.resolve(problem)?;
        let analytic = strategies
            .iter()
            .map(|s| matches!(s, Strategy::Analytic))
            .collect();

        let mut entries = vec![Vec::new(); problem.n_variables()];
        let mut linear = Vec::new();
        for (block_index, block) in problem.constraints().iter().enumerate() {
            let range = map.block_range(block_index);
            match block.coefficients() {
                Some(coefficients) => {
                    linear.extend(range.zip(coefficients.iter().copied()));
                }
                None => {
                    for global in range {
                        entries[map.cols()[global]].push(global);
                    }
                }
            }
        }

        Ok(Self {
            map: map.clone(),
            strategies,
            analytic,
            entries,
            linear,
            lower: problem.variables().lower(),
            upper: problem.variables().upper(),
            workers: config.workers(),
        })
    }

    /// Strategy used for each column.
    #[must_use]
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Derivatives at `x`, where `base` holds the values at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if a user function fails, returns unusable values,
    /// or does not provide the analytic or complex evaluation a column
    /// needs.
    pub fn compute<F>(
        &self,
        problem: &Problem,
        functions: &F,
        x: &[f64],
        base: &Evaluation,
    ) -> Result<Derivatives, GradientError>
    where
        F: Functions + Sync + ?Sized,
    {
        let n = x.len();
        let mut objectives = vec![vec![0.0; n]; base.objectives.len()];
        let mut jacobian = vec![0.0; self.map.nnz()];
        for &(global, value) in &self.linear {
            jacobian[global] = value;
        }

        if self.analytic.contains(&true) {
            let gradients = functions
                .gradients(&problem.point(x))
                .map_err(|e| GradientError::Function(Box::new(e)))?
                .ok_or(GradientError::MissingAnalytic)?;
            gradients.scatter(problem, &self.map, &self.analytic, &mut objectives, &mut jacobian)?;
        }

        let jobs: Vec<usize> = (0..n).filter(|&c| !self.analytic[c]).collect();
        let columns = workers::run(jobs, self.workers, |column| {
            self.column(problem, functions, x, base, column)
        })?;

        let mut warnings = Vec::new();
        for column in columns {
            for (gradient, value) in objectives.iter_mut().zip(&column.objectives) {
                gradient[column.index] = *value;
            }
            for (&global, &value) in self.entries[column.index].iter().zip(&column.entries) {
                jacobian[global] = value;
            }
            warnings.extend(column.warning);
        }

        Ok(Derivatives {
            objectives,
            jacobian,
            warnings,
        })
    }

    fn column<F>(
        &self,
        problem: &Problem,
        functions: &F,
        x: &[f64],
        base: &Evaluation,
        index: usize,
    ) -> Result<Column, GradientError>
    where
        F: Functions + ?Sized,
    {
        let column = match self.strategies[index] {
            Strategy::FiniteDifference { scheme, epsilon } => {
                self.difference(problem, functions, x, base, index, scheme, epsilon)?
            }
            Strategy::ComplexStep { step } => self.complex_step(problem, functions, x, index, step)?,
            // Written by `Gradients::scatter`.
            Strategy::Analytic => Column {
                index,
                objectives: Vec::new(),
                entries: Vec::new(),
                warning: None,
            },
        };

        let finite = column.objectives.iter().chain(&column.entries).all(|v| v.is_finite());
        if !finite {
            return Err(GradientError::NonFinite { column: index });
        }
        Ok(column)
    }
}
