use ndarray::Array2;
use skein_core::{Sense, VarKind};
use skein_history::Iteration;
use sprs::{CsMat, TriMat};

use crate::{Capabilities, ExitStatus};

/// The problem as a backend sees it: scaled, encoded, and ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendProblem<M> {
    pub name: String,

    /// Scaled starting point.
    pub x0: Vec<f64>,

    /// Scaled variable bounds, with the infinity sentinel applied.
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,

    pub kinds: Vec<VarKind>,

    /// Sense of each objective as passed to the backend.
    pub senses: Vec<Sense>,

    /// Bounds of the rows returned by the callback.
    pub constraint_lower: Vec<f64>,
    pub constraint_upper: Vec<f64>,

    /// Linear rows passed separately, for backends that take them natively.
    pub linear: Option<LinearRows<M>>,
}

impl<M> BackendProblem<M> {
    #[must_use]
    pub fn n_variables(&self) -> usize {
        self.x0.len()
    }

    #[must_use]
    pub fn n_constraints(&self) -> usize {
        self.constraint_lower.len()
    }
}

/// Constant linear rows `lower ≤ A x ≤ upper` in scaled space.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRows<M> {
    pub matrix: M,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Row and column indices of the nonzeros of a sparse matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseStructure {
    pub shape: (usize, usize),
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

impl SparseStructure {
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Compressed sparse rows from values aligned with this structure.
    ///
    /// # Panics
    ///
    /// Panics if `values` is not aligned with the structure.
    #[must_use]
    pub fn to_csr(&self, values: &[f64]) -> CsMat<f64> {
        assert_eq!(values.len(), self.nnz(), "values do not match the structure");
        let mut triplets = TriMat::new(self.shape);
        for ((&row, &col), &value) in self.rows.iter().zip(&self.cols).zip(values) {
            triplets.add_triplet(row, col, value);
        }
        triplets.to_csr()
    }

    /// Dense matrix from values aligned with this structure.
    #[must_use]
    pub fn to_dense(&self, values: &[f64]) -> Array2<f64> {
        let mut dense = Array2::zeros(self.shape);
        for ((&row, &col), &value) in self.rows.iter().zip(&self.cols).zip(values) {
            dense[[row, col]] = value;
        }
        dense
    }
}

/// A constant sparse matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    pub structure: SparseStructure,
    pub values: Vec<f64>,
}

/// What the backend asks of one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalRequest {
    /// Whether derivatives are needed.
    pub gradient: bool,

    /// Iteration counters to record with the evaluation.
    pub iteration: Option<Iteration>,
}

impl EvalRequest {
    /// Values only.
    #[must_use]
    pub fn values() -> Self {
        Self::default()
    }

    /// Values and derivatives.
    #[must_use]
    pub fn with_gradient() -> Self {
        Self {
            gradient: true,
            iteration: None,
        }
    }

    /// Tags the evaluation with backend iteration counters.
    #[must_use]
    pub fn at(mut self, major: u64, minor: u64) -> Self {
        self.iteration = Some(Iteration { major, minor });
        self
    }
}

/// Why a callback refused to evaluate.
///
/// Backends should return promptly when they receive one; the adapter
/// decides the final status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// An observer or cancel token stopped the solve.
    Stopped,

    /// A user function failed.
    Failed,
}

/// Callback values for a dense backend, in scaled backend space.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseValues {
    pub objectives: Vec<f64>,
    pub constraints: Vec<f64>,
    pub derivatives: Option<DenseDerivatives>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenseDerivatives {
    /// One row per objective.
    pub objectives: Array2<f64>,

    /// One row per callback constraint row, zero-padded.
    pub jacobian: Array2<f64>,
}

/// Callback values for a sparse backend, in scaled backend space.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseValues {
    pub objectives: Vec<f64>,
    pub constraints: Vec<f64>,
    pub derivatives: Option<SparseDerivatives>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SparseDerivatives {
    /// One row per objective.
    pub objectives: Array2<f64>,

    /// Jacobian values aligned with the backend's [`SparseStructure`].
    pub jacobian: Vec<f64>,
}

/// Evaluation callback handed to a [`DenseBackend`].
pub trait DenseCallback {
    /// Evaluates at the scaled point `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupt`] when the solve must end.
    fn evaluate(&mut self, x: &[f64], request: EvalRequest) -> Result<DenseValues, Interrupt>;
}

/// Evaluation callback handed to a [`SparseBackend`].
pub trait SparseCallback {
    /// Evaluates at the scaled point `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupt`] when the solve must end.
    fn evaluate(&mut self, x: &[f64], request: EvalRequest) -> Result<SparseValues, Interrupt>;
}

/// What a backend reports when it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResult {
    /// Native exit code.
    pub code: i32,

    /// Final scaled point.
    pub x: Vec<f64>,

    pub iterations: usize,
    pub message: String,
}

/// An optimizer that takes dense Jacobians.
pub trait DenseBackend {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Runs the optimizer, evaluating through `callback`.
    fn run(&mut self, problem: &BackendProblem<Array2<f64>>, callback: &mut dyn DenseCallback) -> BackendResult;

    /// Maps a native exit code to the common taxonomy.
    fn classify(&self, code: i32) -> ExitStatus;
}

/// An optimizer that takes sparse Jacobians as triplets.
pub trait SparseBackend {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Runs the optimizer, evaluating through `callback`.
    ///
    /// `structure` gives the nonzeros of the callback Jacobian.
    fn run(
        &mut self,
        problem: &BackendProblem<SparseMatrix>,
        structure: &SparseStructure,
        callback: &mut dyn SparseCallback,
    ) -> BackendResult;

    /// Maps a native exit code to the common taxonomy.
    fn classify(&self, code: i32) -> ExitStatus;
}
