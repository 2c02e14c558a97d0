use skein_core::{Functions, Problem, ValuesError};
use thiserror::Error;

/// Objective and constraint values of one evaluation, in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub objectives: Vec<f64>,

    /// Every constraint row, linear rows included.
    pub constraints: Vec<f64>,
}

/// Errors that can occur when evaluating user functions.
#[derive(Debug, Error)]
pub enum EvalError<E> {
    /// The user function failed.
    #[error("user function failed")]
    Function(#[source] E),

    /// The user function returned values that do not fit the problem.
    #[error("user function returned unusable values")]
    Values(#[from] ValuesError),
}

/// Evaluates user functions at the user-space point `x`.
///
/// Callback values are checked for finiteness, ordered into declared
/// objective and row order, and completed with linear block values.
///
/// # Errors
///
/// Returns an error if the user function fails or its values are missing,
/// misshapen, or non-finite.
pub fn evaluate<F>(problem: &Problem, functions: &F, x: &[f64]) -> Result<Evaluation, EvalError<F::Error>>
where
    F: Functions + ?Sized,
{
    let values = functions
        .evaluate(&problem.point(x))
        .map_err(EvalError::Function)?;
    values.check_finite()?;

    let gathered = problem.gather(&values)?;
    let mut constraints = gathered.constraints;
    problem.linear_values(x, &mut constraints);

    Ok(Evaluation {
        objectives: gathered.objectives,
        constraints,
    })
}
