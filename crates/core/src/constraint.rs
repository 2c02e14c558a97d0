//! Constraint block declarations.

use std::{collections::HashSet, ops::Range};

use crate::{DeclareError, Fill, Variables};

/// Which (row, column) pairs of a constraint block may be nonzero.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Every row depends on every variable column of the frozen problem.
    Dense,

    /// Explicit `(local row, global column)` pairs, in declaration order.
    Entries(Vec<(usize, usize)>),

    /// Every row depends on every column of the named variable sets or groups.
    Wrt(Vec<String>),
}

/// Declaration of a named block of constraint rows.
///
/// Rows default to unbounded with a dense pattern. A linear block also
/// carries one coefficient per pattern entry; its values are computed from
/// the coefficients and never supplied by user functions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSpec {
    name: String,
    len: usize,
    lower: Fill,
    upper: Fill,
    scale: f64,
    pattern: Pattern,
    coefficients: Option<Vec<f64>>,
}

impl ConstraintSpec {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
            lower: Fill::Uniform(f64::NEG_INFINITY),
            upper: Fill::Uniform(f64::INFINITY),
            scale: 1.0,
            pattern: Pattern::Dense,
            coefficients: None,
        }
    }

    #[must_use]
    pub fn lower(mut self, lower: impl Into<Fill>) -> Self {
        self.lower = lower.into();
        self
    }

    #[must_use]
    pub fn upper(mut self, upper: impl Into<Fill>) -> Self {
        self.upper = upper.into();
        self
    }

    #[must_use]
    pub fn bounds(self, lower: impl Into<Fill>, upper: impl Into<Fill>) -> Self {
        self.lower(lower).upper(upper)
    }

    /// Makes every row an equality `c(x) = value`.
    #[must_use]
    pub fn equals(self, value: impl Into<Fill>) -> Self {
        let value = value.into();
        self.lower(value.clone()).upper(value)
    }

    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }

    #[must_use]
    pub fn entries(self, entries: impl IntoIterator<Item = (usize, usize)>) -> Self {
        self.pattern(Pattern::Entries(entries.into_iter().collect()))
    }

    #[must_use]
    pub fn wrt<S: Into<String>>(self, sets: impl IntoIterator<Item = S>) -> Self {
        self.pattern(Pattern::Wrt(sets.into_iter().map(Into::into).collect()))
    }

    /// Declares the block linear with one coefficient per pattern entry.
    ///
    /// For a dense pattern the coefficients are row-major over all columns.
    #[must_use]
    pub fn linear(mut self, coefficients: impl Into<Vec<f64>>) -> Self {
        self.coefficients = Some(coefficients.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates the spec against the variables declared so far.
    pub(crate) fn resolve(self, row_offset: usize, variables: &Variables) -> Result<ConstraintBlock, DeclareError> {
        let Self {
            name,
            len,
            lower,
            upper,
            scale,
            pattern,
            coefficients,
        } = self;

        let lower = lower.expand(len, &name, "lower")?;
        let upper = upper.expand(len, &name, "upper")?;
        for (index, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            if !(lo <= hi) {
                return Err(DeclareError::Bounds {
                    name,
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        if !scale.is_finite() || scale == 0.0 {
            return Err(DeclareError::InvalidScale { name, scale });
        }

        let available = variables.len();
        let (entries, dense, wrt) = match pattern {
            Pattern::Dense => (Vec::new(), true, Vec::new()),
            Pattern::Wrt(sets) => {
                if let Some(set) = sets.iter().find(|set| variables.columns_of(set).is_none()) {
                    return Err(DeclareError::UnknownVariable { name: set.clone() });
                }
                (Vec::new(), false, sets)
            }
            Pattern::Entries(entries) => {
                let mut seen = HashSet::with_capacity(entries.len());
                for &(row, column) in &entries {
                    if row >= len {
                        return Err(DeclareError::RowOutOfRange {
                            constraint: name,
                            row,
                            rows: len,
                        });
                    }
                    if column >= available {
                        return Err(DeclareError::UnknownVariableIndex {
                            constraint: name,
                            column,
                            available,
                        });
                    }
                    if !seen.insert((row, column)) {
                        return Err(DeclareError::DuplicateSparsityEntry {
                            constraint: name,
                            row,
                            column,
                        });
                    }
                }
                (entries, false, Vec::new())
            }
        };

        if let Some(coefficients) = &coefficients {
            // Dense and `wrt` blocks are resolved at freeze, so only explicit
            // patterns can be checked here.
            if !dense && wrt.is_empty() && coefficients.len() != entries.len() {
                return Err(DeclareError::MissingCoefficients {
                    constraint: name,
                    expected: entries.len(),
                    found: coefficients.len(),
                });
            }
        }

        Ok(ConstraintBlock {
            name,
            rows: row_offset..row_offset + len,
            lower,
            upper,
            scale,
            entries,
            dense,
            wrt,
            coefficients,
        })
    }
}

/// A declared constraint block occupying a contiguous row range.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintBlock {
    name: String,
    rows: Range<usize>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    scale: f64,
    entries: Vec<(usize, usize)>,
    dense: bool,

    /// Variable sets or groups of a `wrt` pattern, expanded at freeze.
    wrt: Vec<String>,

    coefficients: Option<Vec<f64>>,
}

impl ConstraintBlock {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Global row range of this block.
    #[must_use]
    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn is_linear(&self) -> bool {
        self.coefficients.is_some()
    }

    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.dense
    }

    /// Whether local row `row` is an equality.
    #[must_use]
    pub fn is_equality(&self, row: usize) -> bool {
        self.lower[row] == self.upper[row]
    }

    /// Variable sets or groups named by a `wrt` pattern.
    #[must_use]
    pub fn wrt(&self) -> &[String] {
        &self.wrt
    }

    /// Sparsity entries as `(local row, global column)` pairs.
    ///
    /// Dense and `wrt` blocks report their entries only once the problem is
    /// frozen.
    #[must_use]
    pub fn entries(&self) -> &[(usize, usize)] {
        &self.entries
    }

    /// Constant coefficients of a linear block, in entry order.
    #[must_use]
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    /// Expands a dense or `wrt` pattern over the final variable columns.
    pub(crate) fn expand(&mut self, variables: &Variables) -> Result<(), DeclareError> {
        let columns = if self.dense {
            (0..variables.len()).collect()
        } else if !self.wrt.is_empty() {
            let mut columns = Vec::new();
            for set in &self.wrt {
                let cols = variables
                    .columns_of(set)
                    .ok_or_else(|| DeclareError::UnknownVariable { name: set.clone() })?;
                columns.extend(cols);
            }
            columns.sort_unstable();
            columns.dedup();
            columns
        } else {
            return Ok(());
        };
        self.entries = (0..self.len())
            .flat_map(|row| columns.iter().map(move |&col| (row, col)))
            .collect();
        match &self.coefficients {
            Some(coefficients) if coefficients.len() != self.entries.len() => {
                Err(DeclareError::MissingCoefficients {
                    constraint: self.name.clone(),
                    expected: self.entries.len(),
                    found: coefficients.len(),
                })
            }
            _ => Ok(()),
        }
    }
}
