use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Sentinel for infinite bounds used when a backend has no infinity token.
pub const DEFAULT_INFINITY: f64 = 1e20;

/// Constraint row classes, used to order rows for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowClass {
    NonlinearInequality,
    LinearInequality,
    NonlinearEquality,
    LinearEquality,
}

impl RowClass {
    #[must_use]
    pub fn is_linear(self) -> bool {
        matches!(self, Self::LinearInequality | Self::LinearEquality)
    }

    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, Self::NonlinearEquality | Self::LinearEquality)
    }
}

/// Whether the backend honors the declared objective sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveConvention {
    /// Maximized objectives are negated before the backend sees them.
    #[default]
    MinimizeOnly,

    /// Objectives are passed in their declared sense.
    Native,
}

/// How constraint bounds are expressed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundEncoding {
    /// `lower ≤ c ≤ upper` per row; equalities have `lower = upper`.
    #[default]
    TwoSided,

    /// Rows `±c - offset ≤ 0`, one per finite bound; equalities `c - b = 0`.
    OneSided,
}

/// Where linear constraint rows go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearHandling {
    /// Evaluated through the callback with the nonlinear rows.
    #[default]
    Merged,

    /// Passed once as a constant matrix and left out of the callback.
    Separate,
}

/// The calling convention of a backend.
///
/// Adapters translate the problem to these conventions and back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub objective: ObjectiveConvention,

    /// Accepts more than one objective.
    pub multi_objective: bool,

    /// Accepts constraint rows at all.
    pub constraints: bool,

    pub encoding: BoundEncoding,

    /// Splits each equality row into two inequalities.
    pub split_equalities: bool,

    /// Order of row classes in the backend's constraint vector.
    pub order: [RowClass; 4],

    /// Value standing in for infinite bounds, or `None` to pass `±∞`.
    pub infinity: Option<f64>,

    pub linear: LinearHandling,

    /// Needs at least one constraint row; a dummy row is added if none.
    pub requires_constraint: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            objective: ObjectiveConvention::MinimizeOnly,
            multi_objective: false,
            constraints: true,
            encoding: BoundEncoding::TwoSided,
            split_equalities: false,
            order: [
                RowClass::NonlinearInequality,
                RowClass::LinearInequality,
                RowClass::NonlinearEquality,
                RowClass::LinearEquality,
            ],
            infinity: Some(DEFAULT_INFINITY),
            linear: LinearHandling::Merged,
            requires_constraint: false,
        }
    }
}

impl Capabilities {
    /// Checks the sentinel and the row class ordering.
    ///
    /// # Errors
    ///
    /// Returns an error if the sentinel is not finite and positive, or the
    /// ordering does not list each row class once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(infinity) = self.infinity
            && !(infinity.is_finite() && infinity > 0.0)
        {
            return Err(ConfigError::Infinity(infinity));
        }
        for (i, class) in self.order.iter().enumerate() {
            if self.order[..i].contains(class) {
                return Err(ConfigError::Ordering);
            }
        }
        Ok(())
    }

    /// Replaces infinite values with the sentinel, if one is configured.
    #[must_use]
    pub fn encode_bound(&self, value: f64) -> f64 {
        match self.infinity {
            Some(sentinel) if value == f64::INFINITY => sentinel,
            Some(sentinel) if value == f64::NEG_INFINITY => -sentinel,
            _ => value,
        }
    }
}
