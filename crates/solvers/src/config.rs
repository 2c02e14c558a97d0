use thiserror::Error;

/// Errors raised while validating adapter, gradient, or backend configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("finite-difference epsilon must be finite and positive, got {0}")]
    Epsilon(f64),

    #[error("complex step must be finite and positive, got {0}")]
    ComplexStep(f64),

    #[error("worker count must be at least one")]
    Workers,

    #[error("gradient strategy names unknown variable group or set `{0}`")]
    UnknownGroup(String),

    #[error("infinity sentinel must be finite and positive, got {0}")]
    Infinity(f64),

    #[error("constraint ordering must list each row class exactly once")]
    Ordering,

    #[error("`{field}` must be finite and non-negative, got {value}")]
    Tolerance { field: &'static str, value: f64 },

    #[error("`{field}` must be finite and positive, got {value}")]
    Positive { field: &'static str, value: f64 },

    #[error("`{field}` must lie strictly between 0 and 1, got {value}")]
    Fraction { field: &'static str, value: f64 },

    #[error("`{field}` must be at least one")]
    Count { field: &'static str },
}
