//! User callbacks and the values they return.

use std::{collections::BTreeMap, error::Error as StdError};

use ndarray::Array2;
use num_complex::Complex64;

use crate::{JacobianMap, Point, Problem, ValuesError};

/// The user-side functions of an optimization problem.
///
/// `evaluate` returns every objective and every nonlinear constraint block by
/// name. Linear blocks are evaluated from their coefficients and must not be
/// returned. Implementations must be pure functions of the point.
///
/// `gradients` is required only for variable groups configured with analytic
/// derivatives, and `evaluate_complex` only for groups using the complex
/// step. Complex-step users must keep their arithmetic holomorphic (no
/// `abs`, no branching on the real part, no conjugation); this is not
/// checked.
///
/// Closures of the form `|x: &Point| -> Result<FunctionValues, E>` implement
/// this trait directly.
pub trait Functions {
    type Error: StdError + Send + Sync + 'static;

    /// Evaluates objectives and nonlinear constraints at `x`.
    ///
    /// # Errors
    ///
    /// Any error aborts the solve that requested the evaluation.
    fn evaluate(&self, x: &Point<'_>) -> Result<FunctionValues, Self::Error>;

    /// Analytic derivatives at `x`, or `None` when not provided.
    ///
    /// # Errors
    ///
    /// Any error aborts the solve that requested the evaluation.
    fn gradients(&self, x: &Point<'_>) -> Result<Option<Gradients>, Self::Error> {
        let _ = x;
        Ok(None)
    }

    /// Complex-valued evaluation at `x`, or `None` when not provided.
    ///
    /// # Errors
    ///
    /// Any error aborts the solve that requested the evaluation.
    fn evaluate_complex(
        &self,
        x: &Point<'_, Complex64>,
    ) -> Result<Option<FunctionValues<Complex64>>, Self::Error> {
        let _ = x;
        Ok(None)
    }
}

impl<F, E> Functions for F
where
    F: Fn(&Point<'_>) -> Result<FunctionValues, E>,
    E: StdError + Send + Sync + 'static,
{
    type Error = E;

    fn evaluate(&self, x: &Point<'_>) -> Result<FunctionValues, E> {
        self(x)
    }
}

/// Objective and constraint values keyed by declared name.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionValues<T = f64> {
    objectives: BTreeMap<String, T>,
    constraints: BTreeMap<String, Vec<T>>,
}

impl<T> Default for FunctionValues<T> {
    fn default() -> Self {
        Self {
            objectives: BTreeMap::new(),
            constraints: BTreeMap::new(),
        }
    }
}

impl<T> FunctionValues<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn objective(mut self, name: impl Into<String>, value: T) -> Self {
        self.set_objective(name, value);
        self
    }

    #[must_use]
    pub fn constraint(mut self, name: impl Into<String>, values: impl Into<Vec<T>>) -> Self {
        self.set_constraint(name, values);
        self
    }

    pub fn set_objective(&mut self, name: impl Into<String>, value: T) {
        self.objectives.insert(name.into(), value);
    }

    pub fn set_constraint(&mut self, name: impl Into<String>, values: impl Into<Vec<T>>) {
        self.constraints.insert(name.into(), values.into());
    }

    #[must_use]
    pub fn get_objective(&self, name: &str) -> Option<&T> {
        self.objectives.get(name)
    }

    #[must_use]
    pub fn get_constraint(&self, name: &str) -> Option<&[T]> {
        self.constraints.get(name).map(Vec::as_slice)
    }
}

impl FunctionValues<f64> {
    /// Rejects NaN or infinite values.
    ///
    /// # Errors
    ///
    /// Returns [`ValuesError::NonFinite`] naming the first offending entry.
    pub fn check_finite(&self) -> Result<(), ValuesError> {
        let scalars = self
            .objectives
            .iter()
            .map(|(name, value)| (name, std::slice::from_ref(value)));
        let arrays = self
            .constraints
            .iter()
            .map(|(name, values)| (name, values.as_slice()));
        for (name, values) in scalars.chain(arrays) {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(ValuesError::NonFinite {
                    name: name.clone(),
                    index,
                });
            }
        }
        Ok(())
    }
}

/// Objective values and the full constraint vector in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct Gathered<T = f64> {
    pub objectives: Vec<T>,

    /// One entry per constraint row. Rows of linear blocks are left at zero.
    pub constraints: Vec<T>,
}

impl Problem {
    /// Orders named callback values into declared objective and row order.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared objective or nonlinear block is
    /// missing, a block has the wrong length, or a name is returned that is
    /// not a declared objective or nonlinear block.
    pub fn gather<T: Copy + Default>(&self, values: &FunctionValues<T>) -> Result<Gathered<T>, ValuesError> {
        if let Some(name) = values
            .objectives
            .keys()
            .find(|name| !self.objectives().iter().any(|o| o.name() == name.as_str()))
        {
            return Err(ValuesError::Unexpected { name: name.clone() });
        }
        if let Some(name) = values.constraints.keys().find(|name| {
            !self
                .constraints()
                .iter()
                .any(|b| !b.is_linear() && b.name() == name.as_str())
        }) {
            return Err(ValuesError::Unexpected { name: name.clone() });
        }

        let objectives = self
            .objectives()
            .iter()
            .map(|o| {
                values
                    .objectives
                    .get(o.name())
                    .copied()
                    .ok_or_else(|| ValuesError::MissingObjective {
                        name: o.name().to_owned(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut constraints = vec![T::default(); self.n_constraints()];
        for block in self.constraints().iter().filter(|b| !b.is_linear()) {
            let rows = values
                .constraints
                .get(block.name())
                .ok_or_else(|| ValuesError::MissingConstraint {
                    name: block.name().to_owned(),
                })?;
            if rows.len() != block.len() {
                return Err(ValuesError::WrongLength {
                    name: block.name().to_owned(),
                    expected: block.len(),
                    found: rows.len(),
                });
            }
            constraints[block.rows()].copy_from_slice(rows);
        }

        Ok(Gathered {
            objectives,
            constraints,
        })
    }
}

/// Jacobian values of one constraint block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockJacobian {
    /// `(local row, global column, value)` for each pattern entry.
    Entries(Vec<(usize, usize, f64)>),

    /// Block rows by all variable columns. Off-pattern values must be zero.
    Dense(Array2<f64>),
}

/// Analytic derivatives returned by [`Functions::gradients`].
///
/// Objective gradients are dense over all variable columns; constraint
/// derivatives are given per nonlinear block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gradients {
    objectives: BTreeMap<String, Vec<f64>>,
    constraints: BTreeMap<String, BlockJacobian>,
}

impl Gradients {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn objective(mut self, name: impl Into<String>, gradient: impl Into<Vec<f64>>) -> Self {
        self.objectives.insert(name.into(), gradient.into());
        self
    }

    #[must_use]
    pub fn constraint(mut self, name: impl Into<String>, jacobian: BlockJacobian) -> Self {
        self.constraints.insert(name.into(), jacobian);
        self
    }

    /// Copies the analytic columns into the objective and Jacobian buffers.
    ///
    /// Only columns flagged in `analytic` are written. Entries in other
    /// columns are accepted when they lie in the pattern and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error for missing or unexpected names, wrong lengths,
    /// non-finite values, entries outside a block's pattern, repeated
    /// entries, and pattern entries in analytic columns that are missing.
    pub fn scatter(
        &self,
        problem: &Problem,
        map: &JacobianMap,
        analytic: &[bool],
        objectives: &mut [Vec<f64>],
        jacobian: &mut [f64],
    ) -> Result<(), ValuesError> {
        let n = problem.n_variables();

        if let Some(name) = self
            .objectives
            .keys()
            .find(|name| !problem.objectives().iter().any(|o| o.name() == name.as_str()))
        {
            return Err(ValuesError::Unexpected { name: name.clone() });
        }
        for (objective, target) in problem.objectives().iter().zip(objectives.iter_mut()) {
            let name = objective.name();
            let gradient = self
                .objectives
                .get(name)
                .ok_or_else(|| ValuesError::MissingObjective { name: name.to_owned() })?;
            if gradient.len() != n {
                return Err(ValuesError::WrongLength {
                    name: name.to_owned(),
                    expected: n,
                    found: gradient.len(),
                });
            }
            check_finite(name, gradient.iter().copied())?;
            for (column, _) in analytic.iter().enumerate().filter(|(_, a)| **a) {
                target[column] = gradient[column];
            }
        }

        for name in self.constraints.keys() {
            if !problem
                .constraints()
                .iter()
                .any(|b| !b.is_linear() && b.name() == name.as_str())
            {
                return Err(ValuesError::Unexpected { name: name.clone() });
            }
        }

        for (index, block) in problem.constraints().iter().enumerate() {
            if block.is_linear() {
                continue;
            }
            let range = map.block_range(index);
            let needed = range.clone().any(|g| analytic[map.cols()[g]]);
            let Some(values) = self.constraints.get(block.name()) else {
                if needed {
                    return Err(ValuesError::MissingConstraint {
                        name: block.name().to_owned(),
                    });
                }
                continue;
            };

            let first_row = block.rows().start;
            let outside = |row: usize, column: usize| ValuesError::OutsidePattern {
                name: block.name().to_owned(),
                row,
                column,
            };

            match values {
                BlockJacobian::Entries(entries) => {
                    let mut seen = vec![false; range.len()];
                    for &(row, column, value) in entries {
                        let global = (row < block.len())
                            .then(|| map.position(first_row + row, column))
                            .flatten()
                            .ok_or_else(|| outside(row, column))?;
                        let slot = &mut seen[global - range.start];
                        if *slot {
                            return Err(ValuesError::RepeatedEntry {
                                name: block.name().to_owned(),
                                row,
                                column,
                            });
                        }
                        *slot = true;
                        if !value.is_finite() {
                            return Err(ValuesError::NonFinite {
                                name: block.name().to_owned(),
                                index: global - range.start,
                            });
                        }
                        if analytic[column] {
                            jacobian[global] = value;
                        }
                    }
                    if let Some(global) = range
                        .clone()
                        .find(|&g| analytic[map.cols()[g]] && !seen[g - range.start])
                    {
                        return Err(ValuesError::MissingEntry {
                            name: block.name().to_owned(),
                            row: map.rows()[global] - first_row,
                            column: map.cols()[global],
                        });
                    }
                }
                BlockJacobian::Dense(dense) => {
                    if dense.dim() != (block.len(), n) {
                        return Err(ValuesError::WrongLength {
                            name: block.name().to_owned(),
                            expected: block.len() * n,
                            found: dense.len(),
                        });
                    }
                    check_finite(block.name(), dense.iter().copied())?;
                    for ((row, column), &value) in dense.indexed_iter() {
                        match map.position(first_row + row, column) {
                            Some(global) if analytic[column] => jacobian[global] = value,
                            Some(_) => {}
                            None if value != 0.0 => return Err(outside(row, column)),
                            None => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_finite(name: &str, values: impl Iterator<Item = f64>) -> Result<(), ValuesError> {
    for (index, value) in values.enumerate() {
        if !value.is_finite() {
            return Err(ValuesError::NonFinite {
                name: name.to_owned(),
                index,
            });
        }
    }
    Ok(())
}
