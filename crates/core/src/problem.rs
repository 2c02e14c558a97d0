//! The problem model and its declaration API.

mod report;


use std::{collections::BTreeMap, ops::Range};

use tracing::debug;

use crate::{
    ConstraintBlock, ConstraintSpec, DeclareError, JacobianMap, Objective, Point, Shape,
    Signature, VariableGroup, VariableSpec, Variables,
};

/// An optimization problem: variables, constraints, and objectives.
///
/// Declarations are accepted until [`Problem::freeze`] assembles the global
/// Jacobian map. After that the structure is immutable and only the current
/// design values change.
#[derive(Debug, Clone)]
pub struct Problem {
    name: String,
    multi_objective: bool,
    variables: Variables,
    constraints: Vec<ConstraintBlock>,
    objectives: Vec<Objective>,
    jacobian: Option<JacobianMap>,
}

impl Problem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multi_objective: false,
            variables: Variables::default(),
            constraints: Vec::new(),
            objectives: Vec::new(),
            jacobian: None,
        }
    }

    /// Allows more than one objective to be declared.
    #[must_use]
    pub fn multi_objective(mut self) -> Self {
        self.multi_objective = true;
        self
    }

    /// Declares a variable group and returns its global column range.
    ///
    /// # Errors
    ///
    /// Fails if the problem is frozen, the name is taken, or the spec has
    /// invalid bounds, lengths, or scale factors.
    pub fn declare_variable(&mut self, spec: VariableSpec) -> Result<Range<usize>, DeclareError> {
        self.ensure_open()?;
        if self.variables.group(spec.name()).is_some() {
            return Err(DeclareError::DuplicateName {
                kind: "variable",
                name: spec.name().to_owned(),
            });
        }
        let group = spec.resolve(self.variables.len())?;
        let columns = group.columns();
        self.variables.push(group);
        Ok(columns)
    }

    /// Declares a constraint block and returns its global row range.
    ///
    /// # Errors
    ///
    /// Fails if the problem is frozen, the name is taken, or the pattern,
    /// bounds, scale, or coefficients are invalid.
    pub fn declare_constraint(&mut self, spec: ConstraintSpec) -> Result<Range<usize>, DeclareError> {
        self.ensure_open()?;
        if self.constraint(spec.name()).is_some() {
            return Err(DeclareError::DuplicateName {
                kind: "constraint",
                name: spec.name().to_owned(),
            });
        }
        let block = spec.resolve(self.n_constraints(), &self.variables)?;
        let rows = block.rows();
        self.constraints.push(block);
        Ok(rows)
    }

    /// Declares an objective.
    ///
    /// # Errors
    ///
    /// Fails if the problem is frozen, the name is taken, the scale is zero
    /// or non-finite, or a second objective is declared outside
    /// multi-objective mode.
    pub fn declare_objective(&mut self, objective: Objective) -> Result<(), DeclareError> {
        self.ensure_open()?;
        if self.objectives.iter().any(|o| o.name() == objective.name()) {
            return Err(DeclareError::DuplicateName {
                kind: "objective",
                name: objective.name().to_owned(),
            });
        }
        if let Some(existing) = self.objectives.first()
            && !self.multi_objective
        {
            return Err(DeclareError::MultipleObjectives {
                problem: self.name.clone(),
                existing: existing.name().to_owned(),
            });
        }
        let scale = objective.scale_factor();
        if !scale.is_finite() || scale == 0.0 {
            return Err(DeclareError::InvalidScale {
                name: objective.name().to_owned(),
                scale,
            });
        }
        self.objectives.push(objective);
        Ok(())
    }

    /// Removes a variable group, shifting the columns of later groups.
    ///
    /// # Errors
    ///
    /// Fails if the problem is frozen, the group is unknown, or any
    /// constraint has been declared.
    pub fn remove_variable(&mut self, name: &str) -> Result<VariableGroup, DeclareError> {
        self.ensure_open()?;
        let group = self
            .variables
            .group(name)
            .ok_or_else(|| DeclareError::UnknownVariable {
                name: name.to_owned(),
            })?;
        if !self.constraints.is_empty() {
            return Err(DeclareError::VariableInUse {
                name: group.name().to_owned(),
            });
        }
        self.variables
            .remove(name)
            .ok_or_else(|| DeclareError::UnknownVariable {
                name: name.to_owned(),
            })
    }

    /// Freezes the structure and assembles the global Jacobian map.
    ///
    /// Freezing twice returns the existing map.
    ///
    /// # Errors
    ///
    /// Fails if the problem has no variables or no objective, or if a dense
    /// linear block has the wrong number of coefficients.
    pub fn freeze(&mut self) -> Result<&JacobianMap, DeclareError> {
        let slot = match &mut self.jacobian {
            Some(map) => return Ok(map),
            slot @ None => slot,
        };
        if self.variables.is_empty() {
            return Err(DeclareError::NoVariables {
                problem: self.name.clone(),
            });
        }
        if self.objectives.is_empty() {
            return Err(DeclareError::NoObjective {
                problem: self.name.clone(),
            });
        }

        let n = self.variables.len();
        let mut blocks = self.constraints.clone();
        for block in &mut blocks {
            block.expand(&self.variables)?;
        }
        let map = JacobianMap::assemble(&blocks, n)?;
        debug!(
            problem = %self.name,
            variables = n,
            constraints = map.n_rows(),
            nonzeros = map.nnz(),
            "problem frozen"
        );
        self.constraints = blocks;
        Ok(slot.insert(map))
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.jacobian.is_some()
    }

    /// The global Jacobian map, once frozen.
    #[must_use]
    pub fn jacobian(&self) -> Option<&JacobianMap> {
        self.jacobian.as_ref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_multi_objective(&self) -> bool {
        self.multi_objective
    }

    #[must_use]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    #[must_use]
    pub fn constraints(&self) -> &[ConstraintBlock] {
        &self.constraints
    }

    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<&ConstraintBlock> {
        self.constraints.iter().find(|b| b.name() == name)
    }

    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    #[must_use]
    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// Total number of constraint rows.
    #[must_use]
    pub fn n_constraints(&self) -> usize {
        self.constraints.last().map_or(0, |b| b.rows().end)
    }

    /// Wraps a flat user-space vector for handing to user functions.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not hold one element per variable.
    #[must_use]
    pub fn point<'a, T>(&'a self, values: &'a [T]) -> Point<'a, T> {
        Point::new(&self.variables, values)
    }

    /// Lower bounds of every constraint row.
    #[must_use]
    pub fn constraint_lower(&self) -> Vec<f64> {
        self.constraints.iter().flat_map(|b| b.lower().iter().copied()).collect()
    }

    /// Upper bounds of every constraint row.
    #[must_use]
    pub fn constraint_upper(&self) -> Vec<f64> {
        self.constraints.iter().flat_map(|b| b.upper().iter().copied()).collect()
    }

    /// Writes `A x` into the rows of every linear block.
    pub fn linear_values(&self, x: &[f64], constraints: &mut [f64]) {
        for block in &self.constraints {
            let Some(coefficients) = block.coefficients() else {
                continue;
            };
            let rows = &mut constraints[block.rows()];
            rows.fill(0.0);
            for (&(row, column), &a) in block.entries().iter().zip(coefficients) {
                rows[row] += a * x[column];
            }
        }
    }

    /// Largest bound violation over all rows, zero when feasible.
    #[must_use]
    pub fn max_violation(&self, constraints: &[f64]) -> f64 {
        self.constraint_lower()
            .into_iter()
            .zip(self.constraint_upper())
            .zip(constraints)
            .map(|((lo, hi), &c)| (lo - c).max(c - hi).max(0.0))
            .fold(0.0, f64::max)
    }

    /// Writes a new current point.
    ///
    /// # Panics
    ///
    /// Panics if `x` does not hold one element per variable.
    pub fn set_current_values(&mut self, x: &[f64]) {
        assert_eq!(x.len(), self.n_variables(), "design vector length mismatch");
        self.variables.set_current(x);
    }

    /// Current design values keyed by variable group name.
    #[must_use]
    pub fn design_values(&self) -> BTreeMap<String, Vec<f64>> {
        self.variables
            .groups()
            .iter()
            .map(|g| (g.name().to_owned(), g.current().to_vec()))
            .collect()
    }

    /// Replaces the starting values of the named groups.
    ///
    /// Groups not mentioned keep their values.
    ///
    /// # Errors
    ///
    /// Fails if the problem is frozen, a group is unknown, or a length is
    /// wrong. Nothing is changed on error.
    pub fn set_design_values<'a, I>(&mut self, values: I) -> Result<(), DeclareError>
    where
        I: IntoIterator<Item = (&'a str, &'a [f64])>,
    {
        self.ensure_open()?;
        let mut staged = self.variables.clone();
        for (name, group_values) in values {
            staged.set_values(name, group_values)?;
        }
        self.variables = staged;
        Ok(())
    }

    /// Structural fingerprint used by history files.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature {
            problem: self.name.clone(),
            variables: self
                .variables
                .groups()
                .iter()
                .map(|g| Shape {
                    name: g.name().to_owned(),
                    len: g.len(),
                })
                .collect(),
            constraints: self
                .constraints
                .iter()
                .map(|b| Shape {
                    name: b.name().to_owned(),
                    len: b.len(),
                })
                .collect(),
            objectives: self.objectives.iter().map(|o| o.name().to_owned()).collect(),
        }
    }

    fn ensure_open(&self) -> Result<(), DeclareError> {
        if self.is_frozen() {
            Err(DeclareError::ProblemFrozen {
                problem: self.name.clone(),
            })
        } else {
            Ok(())
        }
    }
}
