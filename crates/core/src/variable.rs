//! Design variable declarations.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::DeclareError;

/// Whether a variable takes continuous or integer values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    #[default]
    Continuous,
    Integer,
}

/// A per-element quantity that is either broadcast or given element by element.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Uniform(f64),
    Each(Vec<f64>),
}

impl Fill {
    /// Expands the fill to exactly `len` elements.
    ///
    /// # Errors
    ///
    /// Returns [`DeclareError::LengthMismatch`] if an element-wise fill has
    /// the wrong number of elements.
    pub fn expand(&self, len: usize, name: &str, field: &'static str) -> Result<Vec<f64>, DeclareError> {
        match self {
            Fill::Uniform(value) => Ok(vec![*value; len]),
            Fill::Each(values) if values.len() == len => Ok(values.clone()),
            Fill::Each(values) => Err(DeclareError::LengthMismatch {
                name: name.to_owned(),
                field,
                expected: len,
                found: values.len(),
            }),
        }
    }
}

impl From<f64> for Fill {
    fn from(value: f64) -> Self {
        Fill::Uniform(value)
    }
}

impl From<Vec<f64>> for Fill {
    fn from(values: Vec<f64>) -> Self {
        Fill::Each(values)
    }
}

impl From<&[f64]> for Fill {
    fn from(values: &[f64]) -> Self {
        Fill::Each(values.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Fill {
    fn from(values: [f64; N]) -> Self {
        Fill::Each(values.to_vec())
    }
}

/// Declaration of a named group of design variables.
///
/// Unset fields default to an unbounded, unscaled, continuous group whose
/// initial value is zero. Scalars broadcast over the group length.
///
/// ```
/// use skein_core::VariableSpec;
///
/// let spec = VariableSpec::group("wing", 3)
///     .value(1.0)
///     .bounds(0.0, [2.0, 3.0, 4.0])
///     .scale(0.1)
///     .in_set("geometry");
/// assert_eq!(spec.name(), "wing");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    name: String,
    len: usize,
    scalar: bool,
    set: Option<String>,
    kind: VarKind,
    value: Fill,
    lower: Fill,
    upper: Fill,
    scale: Fill,
}

impl VariableSpec {
    /// A single scalar variable.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name.into(), 1, true)
    }

    /// An array-valued variable group of `len` elements.
    pub fn group(name: impl Into<String>, len: usize) -> Self {
        Self::new(name.into(), len, false)
    }

    fn new(name: String, len: usize, scalar: bool) -> Self {
        Self {
            name,
            len,
            scalar,
            set: None,
            kind: VarKind::Continuous,
            value: Fill::Uniform(0.0),
            lower: Fill::Uniform(f64::NEG_INFINITY),
            upper: Fill::Uniform(f64::INFINITY),
            scale: Fill::Uniform(1.0),
        }
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Fill>) -> Self {
        self.value = value.into();
        self
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

    #[must_use]
    pub fn scale(mut self, scale: impl Into<Fill>) -> Self {
        self.scale = scale.into();
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: VarKind) -> Self {
        self.kind = kind;
        self
    }

    /// Places the group into the named variable set.
    ///
    /// Without this, the group forms a set of its own name.
    #[must_use]
    pub fn in_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates the spec and resolves it into a group starting at `offset`.
    pub(crate) fn resolve(self, offset: usize) -> Result<VariableGroup, DeclareError> {
        let Self {
            name,
            len,
            scalar,
            set,
            kind,
            value,
            lower,
            upper,
            scale,
        } = self;

        let initial = value.expand(len, &name, "value")?;
        let lower = lower.expand(len, &name, "lower")?;
        let upper = upper.expand(len, &name, "upper")?;
        let scale = scale.expand(len, &name, "scale")?;

        for (index, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            // `!(lo <= hi)` also rejects NaN bounds.
            if !(lo <= hi) {
                return Err(DeclareError::Bounds {
                    name,
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        if let Some(&bad) = scale.iter().find(|s| !s.is_finite() || **s == 0.0) {
            return Err(DeclareError::InvalidScale { name, scale: bad });
        }

        let set = set.unwrap_or_else(|| name.clone());
        Ok(VariableGroup {
            current: initial.clone(),
            name,
            set,
            offset,
            scalar,
            kind,
            initial,
            lower,
            upper,
            scale,
        })
    }
}

/// A declared group of design variables occupying a contiguous column range.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableGroup {
    name: String,
    set: String,
    offset: usize,
    scalar: bool,
    kind: VarKind,
    initial: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    scale: Vec<f64>,
    current: Vec<f64>,
}

impl VariableGroup {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn set(&self) -> &str {
        &self.set
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.initial.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.initial.is_empty()
    }

    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    #[must_use]
    pub fn kind(&self) -> VarKind {
        self.kind
    }

    /// Global column range of this group.
    #[must_use]
    pub fn columns(&self) -> Range<usize> {
        self.offset..self.offset + self.len()
    }

    #[must_use]
    pub fn initial(&self) -> &[f64] {
        &self.initial
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
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Most recent values written by a solve, or the initial values.
    #[must_use]
    pub fn current(&self) -> &[f64] {
        &self.current
    }
}

/// All declared variable groups in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    groups: Vec<VariableGroup>,
}

impl Variables {
    /// Total number of scalar variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.last().map_or(0, |g| g.columns().end)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn groups(&self) -> &[VariableGroup] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&VariableGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Names of the variable sets in order of first declaration.
    pub fn sets(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::new();
        self.groups.iter().filter_map(move |g| {
            if seen.contains(&g.set.as_str()) {
                None
            } else {
                seen.push(&g.set);
                Some(g.set.as_str())
            }
        })
    }

    /// Columns covered by a variable set, or by a single group of that name.
    #[must_use]
    pub fn columns_of(&self, name: &str) -> Option<Vec<usize>> {
        let columns: Vec<usize> = self
            .groups
            .iter()
            .filter(|g| g.set == name)
            .flat_map(VariableGroup::columns)
            .collect();
        if !columns.is_empty() {
            return Some(columns);
        }
        self.group(name).map(|g| g.columns().collect())
    }

    /// Name of the set owning global column `column`.
    #[must_use]
    pub fn set_of_column(&self, column: usize) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.columns().contains(&column))
            .map(|g| g.set.as_str())
    }

    #[must_use]
    pub fn lower(&self) -> Vec<f64> {
        self.flatten(|g| &g.lower)
    }

    #[must_use]
    pub fn upper(&self) -> Vec<f64> {
        self.flatten(|g| &g.upper)
    }

    #[must_use]
    pub fn initial(&self) -> Vec<f64> {
        self.flatten(|g| &g.initial)
    }

    #[must_use]
    pub fn scale(&self) -> Vec<f64> {
        self.flatten(|g| &g.scale)
    }

    #[must_use]
    pub fn current(&self) -> Vec<f64> {
        self.flatten(|g| &g.current)
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<VarKind> {
        self.groups
            .iter()
            .flat_map(|g| std::iter::repeat_n(g.kind, g.len()))
            .collect()
    }

    fn flatten(&self, field: impl Fn(&VariableGroup) -> &Vec<f64>) -> Vec<f64> {
        self.groups.iter().flat_map(|g| field(g).iter().copied()).collect()
    }

    pub(crate) fn push(&mut self, group: VariableGroup) {
        self.groups.push(group);
    }

    /// Removes a group and shifts later groups down.
    pub(crate) fn remove(&mut self, name: &str) -> Option<VariableGroup> {
        let index = self.groups.iter().position(|g| g.name == name)?;
        let removed = self.groups.remove(index);
        for group in &mut self.groups[index..] {
            group.offset -= removed.len();
        }
        Some(removed)
    }

    pub(crate) fn set_current(&mut self, x: &[f64]) {
        for group in &mut self.groups {
            let columns = group.columns();
            group.current.copy_from_slice(&x[columns]);
        }
    }

    /// Overwrites the initial and current values of one group.
    pub(crate) fn set_values(&mut self, name: &str, values: &[f64]) -> Result<(), DeclareError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| DeclareError::UnknownVariable {
                name: name.to_owned(),
            })?;
        if values.len() != group.len() {
            return Err(DeclareError::LengthMismatch {
                name: name.to_owned(),
                field: "value",
                expected: group.len(),
                found: values.len(),
            });
        }
        group.initial.copy_from_slice(values);
        group.current.copy_from_slice(values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_broadcast_over_the_group() {
        let group = VariableSpec::group("x", 3)
            .value(2.0)
            .bounds(-1.0, [3.0, 4.0, 5.0])
            .resolve(4)
            .unwrap();

        assert_eq!(group.initial(), &[2.0, 2.0, 2.0]);
        assert_eq!(group.lower(), &[-1.0, -1.0, -1.0]);
        assert_eq!(group.upper(), &[3.0, 4.0, 5.0]);
        assert_eq!(group.scale(), &[1.0, 1.0, 1.0]);
        assert_eq!(group.columns(), 4..7);
        assert_eq!(group.set(), "x");
    }

    #[test]
    fn crossed_or_nan_bounds_are_rejected() {
        let crossed = VariableSpec::group("x", 2).bounds([0.0, 5.0], [1.0, 4.0]).resolve(0);
        assert!(matches!(
            crossed,
            Err(DeclareError::Bounds { index: 1, .. })
        ));

        let nan = VariableSpec::scalar("y").lower(f64::NAN).resolve(0);
        assert!(matches!(nan, Err(DeclareError::Bounds { index: 0, .. })));
    }

    #[test]
    fn wrong_length_arrays_are_rejected() {
        let result = VariableSpec::group("x", 3).value([1.0, 2.0]).resolve(0);
        assert_eq!(
            result,
            Err(DeclareError::LengthMismatch {
                name: "x".into(),
                field: "value",
                expected: 3,
                found: 2,
            })
        );
    }

    #[test]
    fn zero_scale_is_rejected() {
        let result = VariableSpec::scalar("x").scale(0.0).resolve(0);
        assert!(matches!(result, Err(DeclareError::InvalidScale { .. })));
    }

    #[test]
    fn removing_a_group_shifts_later_columns() {
        let mut vars = Variables::default();
        vars.push(VariableSpec::group("a", 2).resolve(0).unwrap());
        vars.push(VariableSpec::group("b", 3).resolve(2).unwrap());
        vars.push(VariableSpec::scalar("c").resolve(5).unwrap());

        vars.remove("b").unwrap();

        assert_eq!(vars.len(), 3);
        assert_eq!(vars.group("c").unwrap().columns(), 2..3);
    }

    #[test]
    fn sets_collect_columns_of_every_member() {
        let mut vars = Variables::default();
        vars.push(VariableSpec::group("a", 2).in_set("s").resolve(0).unwrap());
        vars.push(VariableSpec::scalar("b").resolve(2).unwrap());
        vars.push(VariableSpec::scalar("c").in_set("s").resolve(3).unwrap());

        assert_eq!(vars.columns_of("s"), Some(vec![0, 1, 3]));
        assert_eq!(vars.columns_of("b"), Some(vec![2]));
        assert_eq!(vars.columns_of("missing"), None);
        assert_eq!(vars.sets().collect::<Vec<_>>(), vec!["s", "b"]);
        assert_eq!(vars.set_of_column(3), Some("s"));
    }
}
