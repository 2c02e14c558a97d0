use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Configuration for the golden section backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Raw")]
pub struct GoldenSectionConfig {
    max_iters: usize,
    x_abs_tol: f64,
    x_rel_tol: f64,
}

impl Default for GoldenSectionConfig {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(100, 1e-12, 1e-12).unwrap()
    }
}

impl GoldenSectionConfig {
    /// Creates a new config with validated tolerances.
    ///
    /// # Errors
    ///
    /// Returns an error if any tolerance is negative or non-finite.
    pub fn new(max_iters: usize, x_abs_tol: f64, x_rel_tol: f64) -> Result<Self, ConfigError> {
        for (field, value) in [("x_abs_tol", x_abs_tol), ("x_rel_tol", x_rel_tol)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Tolerance { field, value });
            }
        }

        Ok(Self {
            max_iters,
            x_abs_tol,
            x_rel_tol,
        })
    }

    /// Returns the maximum number of shrink iterations.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns the absolute tolerance on the bracket width.
    #[must_use]
    pub fn x_abs_tol(&self) -> f64 {
        self.x_abs_tol
    }

    /// Returns the tolerance on the bracket width relative to its midpoint.
    #[must_use]
    pub fn x_rel_tol(&self) -> f64 {
        self.x_rel_tol
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Raw {
    max_iters: usize,
    x_abs_tol: f64,
    x_rel_tol: f64,
}

impl Default for Raw {
    fn default() -> Self {
        let config = GoldenSectionConfig::default();
        Self {
            max_iters: config.max_iters,
            x_abs_tol: config.x_abs_tol,
            x_rel_tol: config.x_rel_tol,
        }
    }
}

impl TryFrom<Raw> for GoldenSectionConfig {
    type Error = ConfigError;

    fn try_from(raw: Raw) -> Result<Self, ConfigError> {
        Self::new(raw.max_iters, raw.x_abs_tol, raw.x_rel_tol)
    }
}
