use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Configuration for the projected gradient backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Raw")]
pub struct ProjectedGradientConfig {
    max_iters: usize,
    initial_step: f64,
    penalty: f64,
    gradient_tol: f64,
    shrink: f64,
    max_backtracks: usize,
}

impl Default for ProjectedGradientConfig {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(500, 1.0, 10.0, 1e-6, 0.5, 30).unwrap()
    }
}

impl ProjectedGradientConfig {
    /// Creates a new config with validated parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a step, penalty, or tolerance is out of range,
    /// or `max_backtracks` is zero.
    pub fn new(
        max_iters: usize,
        initial_step: f64,
        penalty: f64,
        gradient_tol: f64,
        shrink: f64,
        max_backtracks: usize,
    ) -> Result<Self, ConfigError> {
        if !(initial_step.is_finite() && initial_step > 0.0) {
            return Err(ConfigError::Positive {
                field: "initial_step",
                value: initial_step,
            });
        }
        if !penalty.is_finite() || penalty < 0.0 {
            return Err(ConfigError::Tolerance {
                field: "penalty",
                value: penalty,
            });
        }
        if !gradient_tol.is_finite() || gradient_tol < 0.0 {
            return Err(ConfigError::Tolerance {
                field: "gradient_tol",
                value: gradient_tol,
            });
        }
        if !(shrink > 0.0 && shrink < 1.0) {
            return Err(ConfigError::Fraction {
                field: "shrink",
                value: shrink,
            });
        }
        if max_backtracks == 0 {
            return Err(ConfigError::Count {
                field: "max_backtracks",
            });
        }

        Ok(Self {
            max_iters,
            initial_step,
            penalty,
            gradient_tol,
            shrink,
            max_backtracks,
        })
    }

    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// First trial step of every line search.
    #[must_use]
    pub fn initial_step(&self) -> f64 {
        self.initial_step
    }

    /// Weight of the squared constraint violation in the merit function.
    #[must_use]
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Largest projected gradient component accepted as stationary.
    #[must_use]
    pub fn gradient_tol(&self) -> f64 {
        self.gradient_tol
    }

    /// Factor applied to the step after each rejected trial.
    #[must_use]
    pub fn shrink(&self) -> f64 {
        self.shrink
    }

    #[must_use]
    pub fn max_backtracks(&self) -> usize {
        self.max_backtracks
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Raw {
    max_iters: usize,
    initial_step: f64,
    penalty: f64,
    gradient_tol: f64,
    shrink: f64,
    max_backtracks: usize,
}

impl Default for Raw {
    fn default() -> Self {
        let config = ProjectedGradientConfig::default();
        Self {
            max_iters: config.max_iters,
            initial_step: config.initial_step,
            penalty: config.penalty,
            gradient_tol: config.gradient_tol,
            shrink: config.shrink,
            max_backtracks: config.max_backtracks,
        }
    }
}

impl TryFrom<Raw> for ProjectedGradientConfig {
    type Error = ConfigError;

    fn try_from(raw: Raw) -> Result<Self, ConfigError> {
        Self::new(
            raw.max_iters,
            raw.initial_step,
            raw.penalty,
            raw.gradient_tol,
            raw.shrink,
            raw.max_backtracks,
        )
    }
}
