use std::ops::Index;

use crate::Variables;

/// A design point handed to user functions, addressable by group name.
///
/// Values are in user (unscaled) space. The element type is `f64` for
/// ordinary evaluations and `Complex64` for complex-step evaluations.
#[derive(Debug, Clone, Copy)]
pub struct Point<'a, T = f64> {
    variables: &'a Variables,
    values: &'a [T],
}

impl<'a, T> Point<'a, T> {
    /// Wraps a flat vector laid out in global column order.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not hold one element per declared variable.
    pub fn new(variables: &'a Variables, values: &'a [T]) -> Self {
        assert_eq!(
            values.len(),
            variables.len(),
            "point length must match the variable count"
        );
        Self { variables, values }
    }

    #[must_use]
    pub fn as_slice(&self) -> &'a [T] {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values of the named variable group.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&'a [T]> {
        self.variables
            .group(name)
            .map(|group| &self.values[group.columns()])
    }
}

impl<T: Copy> Point<'_, T> {
    /// First value of the named group, typically a scalar variable.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<T> {
        self.group(name).and_then(|values| values.first().copied())
    }
}

impl<T> Index<usize> for Point<'_, T> {
    type Output = T;

    fn index(&self, column: usize) -> &T {
        &self.values[column]
    }
}

/// Looks up a group by name.
///
/// Panics if no group of that name is declared.
impl<T> Index<&str> for Point<'_, T> {
    type Output = [T];

    fn index(&self, name: &str) -> &[T] {
        match self.group(name) {
            Some(values) => values,
            None => panic!("no variable group named `{name}`"),
        }
    }
}
