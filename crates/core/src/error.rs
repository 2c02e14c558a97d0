use thiserror::Error;

/// Errors raised while declaring or freezing a [`Problem`](crate::Problem).
///
/// Every declaration error is fatal: the offending declaration is rejected
/// and the problem is left exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeclareError {
    /// A variable group, variable set, constraint, or objective name is taken.
    #[error("{kind} name `{name}` is already declared")]
    DuplicateName { kind: &'static str, name: String },

    /// A lower bound exceeds its upper bound, or a bound is NaN.
    #[error("`{name}` element {index}: lower bound {lower} exceeds upper bound {upper}")]
    Bounds {
        name: String,
        index: usize,
        lower: f64,
        upper: f64,
    },

    /// A sparsity pattern references a variable column that does not exist.
    #[error(
        "constraint `{constraint}` references variable column {column}, but only {available} are declared"
    )]
    UnknownVariableIndex {
        constraint: String,
        column: usize,
        available: usize,
    },

    /// A sparsity pattern references a local row outside the block.
    #[error("constraint `{constraint}` references row {row}, but the block has {rows} rows")]
    RowOutOfRange {
        constraint: String,
        row: usize,
        rows: usize,
    },

    /// The same (row, column) pair appears twice in one block.
    #[error("constraint `{constraint}` declares entry ({row}, {column}) more than once")]
    DuplicateSparsityEntry {
        constraint: String,
        row: usize,
        column: usize,
    },

    /// The problem is frozen and no longer accepts declarations.
    #[error("problem `{problem}` is frozen")]
    ProblemFrozen { problem: String },

    /// A second objective was declared outside multi-objective mode.
    #[error("problem `{problem}` already has objective `{existing}`; enable multi-objective mode")]
    MultipleObjectives { problem: String, existing: String },

    /// A per-element array has the wrong length.
    #[error("`{name}`: {field} has {found} elements, expected {expected}")]
    LengthMismatch {
        name: String,
        field: &'static str,
        expected: usize,
        found: usize,
    },

    /// A scale factor is zero or non-finite.
    #[error("`{name}`: scale factor {scale} must be finite and nonzero")]
    InvalidScale { name: String, scale: f64 },

    /// A linear block lacks one coefficient per pattern entry.
    #[error("linear constraint `{constraint}` has {found} coefficients for {expected} pattern entries")]
    MissingCoefficients {
        constraint: String,
        expected: usize,
        found: usize,
    },

    /// A variable group cannot be removed once constraints reference columns.
    #[error("variable `{name}` cannot be removed after constraints are declared")]
    VariableInUse { name: String },

    /// A variable group or variable set name is not declared.
    #[error("unknown variable group or set `{name}`")]
    UnknownVariable { name: String },

    /// The problem cannot be frozen without at least one variable.
    #[error("problem `{problem}` declares no variables")]
    NoVariables { problem: String },

    /// The problem cannot be frozen without at least one objective.
    #[error("problem `{problem}` declares no objective")]
    NoObjective { problem: String },
}

/// Errors describing malformed user callback output.
///
/// These are produced when gathering [`FunctionValues`](crate::FunctionValues)
/// or [`Gradients`](crate::Gradients) into declared order, and are reported
/// as evaluation faults by the solver layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValuesError {
    #[error("objective `{name}` was not returned")]
    MissingObjective { name: String },

    #[error("constraint `{name}` was not returned")]
    MissingConstraint { name: String },

    #[error("`{name}` is not a declared objective or nonlinear constraint")]
    Unexpected { name: String },

    #[error("`{name}` returned {found} values, expected {expected}")]
    WrongLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("`{name}` element {index} is not finite")]
    NonFinite { name: String, index: usize },

    #[error("gradient of `{name}` has entry ({row}, {column}) outside its sparsity pattern")]
    OutsidePattern {
        name: String,
        row: usize,
        column: usize,
    },

    #[error("gradient of `{name}` is missing entry ({row}, {column})")]
    MissingEntry {
        name: String,
        row: usize,
        column: usize,
    },

    #[error("gradient of `{name}` repeats entry ({row}, {column})")]
    RepeatedEntry {
        name: String,
        row: usize,
        column: usize,
    },
}
