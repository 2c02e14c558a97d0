use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skein_core::Problem;

use crate::ConfigError;

/// Default complex step, small enough that `x + ih` never loses `x`.
pub const DEFAULT_COMPLEX_STEP: f64 = 1e-40;

/// Finite-difference stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// One extra evaluation per column, error O(h).
    #[default]
    Forward,

    /// Two extra evaluations per column, error O(h²).
    Central,
}

impl Scheme {
    /// Relative step that balances truncation and round-off error.
    #[must_use]
    pub fn default_epsilon(self) -> f64 {
        match self {
            Scheme::Forward => f64::EPSILON.sqrt(),
            Scheme::Central => f64::EPSILON.cbrt(),
        }
    }
}

/// How derivatives with respect to a group of columns are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Values from [`Functions::gradients`](skein_core::Functions::gradients).
    Analytic,

    /// Perturb each column by `max(|x|, 1) · epsilon`.
    FiniteDifference { scheme: Scheme, epsilon: f64 },

    /// Perturb each column along the imaginary axis by `step`.
    ComplexStep { step: f64 },
}

impl Default for Strategy {
    fn default() -> Self {
        Self::forward()
    }
}

impl Strategy {
    /// Forward differences with the default epsilon.
    #[must_use]
    pub fn forward() -> Self {
        Self::FiniteDifference {
            scheme: Scheme::Forward,
            epsilon: Scheme::Forward.default_epsilon(),
        }
    }

    /// Central differences with the default epsilon.
    #[must_use]
    pub fn central() -> Self {
        Self::FiniteDifference {
            scheme: Scheme::Central,
            epsilon: Scheme::Central.default_epsilon(),
        }
    }

    /// Finite differences with a chosen relative step.
    ///
    /// # Errors
    ///
    /// Returns an error if `epsilon` is not finite and positive.
    pub fn finite_difference(scheme: Scheme, epsilon: f64) -> Result<Self, ConfigError> {
        let strategy = Self::FiniteDifference { scheme, epsilon };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Complex step with a chosen step.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is not finite and positive.
    pub fn complex_step(step: f64) -> Result<Self, ConfigError> {
        let strategy = Self::ComplexStep { step };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Checks step sizes, which deserialized strategies have not yet seen.
    ///
    /// # Errors
    ///
    /// Returns an error if a step size is not finite and positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Analytic => Ok(()),
            Self::FiniteDifference { epsilon, .. } if !(epsilon.is_finite() && epsilon > 0.0) => {
                Err(ConfigError::Epsilon(epsilon))
            }
            Self::ComplexStep { step } if !(step.is_finite() && step > 0.0) => {
                Err(ConfigError::ComplexStep(step))
            }
            _ => Ok(()),
        }
    }
}

/// Derivative strategy selection for a solve.
///
/// A default strategy applies to every column; overrides are keyed by
/// variable group or variable set name. Perturbed evaluations are spread
/// over `workers` threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    default: Strategy,
    groups: BTreeMap<String, Strategy>,
    workers: usize,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}

impl GradientConfig {
    /// Uses `default` for every column, on one worker.
    #[must_use]
    pub fn new(default: Strategy) -> Self {
        Self {
            default,
            groups: BTreeMap::new(),
            workers: 1,
        }
    }

    /// Overrides the strategy of a variable group or set.
    #[must_use]
    pub fn with_group(mut self, name: impl Into<String>, strategy: Strategy) -> Self {
        self.groups.insert(name.into(), strategy);
        self
    }

    /// Spreads perturbed evaluations over `workers` threads.
    ///
    /// # Errors
    ///
    /// Returns an error if `workers` is zero.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::Workers);
        }
        self.workers = workers;
        Ok(self)
    }

    #[must_use]
    pub fn default_strategy(&self) -> Strategy {
        self.default
    }

    #[must_use]
    pub fn groups(&self) -> &BTreeMap<String, Strategy> {
        &self.groups
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Resolves one strategy per column of `problem`.
    ///
    /// Overrides are applied in name order, so where a group and a set
    /// overlap the later name wins.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid step sizes, zero workers, or an override
    /// naming no group or set of `problem`.
    pub fn resolve(&self, problem: &Problem) -> Result<Vec<Strategy>, ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Workers);
        }
        self.default.validate()?;

        let variables = problem.variables();
        let mut strategies = vec![self.default; variables.len()];
        for (name, strategy) in &self.groups {
            strategy.validate()?;
            let columns = variables
                .columns_of(name)
                .ok_or_else(|| ConfigError::UnknownGroup(name.clone()))?;
            for column in columns {
                strategies[column] = *strategy;
            }
        }
        Ok(strategies)
    }
}
