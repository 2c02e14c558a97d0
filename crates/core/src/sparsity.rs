//! Global Jacobian map assembled from per-block sparsity patterns.
//!
//! Constraint blocks are visited in declaration order and, within a block,
//! entries in declared order; each entry receives the next flat index. All
//! Jacobian values for a problem live in one buffer indexed this way, and
//! each block owns the contiguous slice `offsets[b]..offsets[b + 1]`.

use std::{collections::HashMap, ops::Range};

use ndarray::{Array2, ArrayView2};
use sprs::{CsMat, TriMat};

use crate::{ConstraintBlock, DeclareError};

/// Immutable assignment of every declared nonzero to a flat index.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianMap {
    n_rows: usize,
    n_cols: usize,
    offsets: Vec<usize>,
    rows: Vec<usize>,
    cols: Vec<usize>,
    lookup: HashMap<(usize, usize), usize>,
}

impl JacobianMap {
    /// Assembles the map from resolved blocks.
    ///
    /// # Errors
    ///
    /// Returns [`DeclareError::DuplicateSparsityEntry`] if a (row, column)
    /// pair repeats, and [`DeclareError::UnknownVariableIndex`] if a column is
    /// outside `n_cols`.
    pub fn assemble(blocks: &[ConstraintBlock], n_cols: usize) -> Result<Self, DeclareError> {
        let nnz = blocks.iter().map(|b| b.entries().len()).sum();
        let mut offsets = Vec::with_capacity(blocks.len() + 1);
        let mut rows = Vec::with_capacity(nnz);
        let mut cols = Vec::with_capacity(nnz);
        let mut lookup = HashMap::with_capacity(nnz);

        offsets.push(0);
        for block in blocks {
            let first_row = block.rows().start;
            for &(local_row, column) in block.entries() {
                if column >= n_cols {
                    return Err(DeclareError::UnknownVariableIndex {
                        constraint: block.name().to_owned(),
                        column,
                        available: n_cols,
                    });
                }
                let row = first_row + local_row;
                if lookup.insert((row, column), rows.len()).is_some() {
                    return Err(DeclareError::DuplicateSparsityEntry {
                        constraint: block.name().to_owned(),
                        row: local_row,
                        column,
                    });
                }
                rows.push(row);
                cols.push(column);
            }
            offsets.push(rows.len());
        }

        Ok(Self {
            n_rows: blocks.last().map_or(0, |b| b.rows().end),
            n_cols,
            offsets,
            rows,
            cols,
            lookup,
        })
    }

    /// Number of declared nonzeros.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Flat index range owned by block `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block` is not a block index of this map.
    #[must_use]
    pub fn block_range(&self, block: usize) -> Range<usize> {
        self.offsets[block]..self.offsets[block + 1]
    }

    /// Flat index of the `local`-th entry of `block`.
    #[must_use]
    pub fn global(&self, block: usize, local: usize) -> Option<usize> {
        let range = *self.offsets.get(block)?..*self.offsets.get(block + 1)?;
        let index = range.start + local;
        range.contains(&index).then_some(index)
    }

    /// Block and local entry index of flat index `global`.
    #[must_use]
    pub fn local(&self, global: usize) -> Option<(usize, usize)> {
        if global >= self.nnz() {
            return None;
        }
        let block = self.offsets.partition_point(|&start| start <= global) - 1;
        Some((block, global - self.offsets[block]))
    }

    /// Flat index of the entry at global `(row, column)`.
    #[must_use]
    pub fn position(&self, row: usize, column: usize) -> Option<usize> {
        self.lookup.get(&(row, column)).copied()
    }

    /// Global row of each flat index.
    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Global column of each flat index.
    #[must_use]
    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    /// `(row, column, value)` triplets in flat order.
    pub fn triplets<'a>(&'a self, values: &'a [f64]) -> impl Iterator<Item = (usize, usize, f64)> + 'a {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(values)
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// Zero-padded dense matrix holding `values` at their positions.
    #[must_use]
    pub fn to_dense(&self, values: &[f64]) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n_rows, self.n_cols));
        for (row, col, value) in self.triplets(values) {
            dense[[row, col]] = value;
        }
        dense
    }

    /// Reads the declared positions of a dense matrix into a flat buffer.
    #[must_use]
    pub fn gather_dense(&self, dense: ArrayView2<'_, f64>) -> Vec<f64> {
        self.rows
            .iter()
            .zip(&self.cols)
            .map(|(&r, &c)| dense[[r, c]])
            .collect()
    }

    /// Compressed sparse row matrix holding `values` at their positions.
    #[must_use]
    pub fn to_csr(&self, values: &[f64]) -> CsMat<f64> {
        let mut tri = TriMat::new((self.n_rows, self.n_cols));
        for (row, col, value) in self.triplets(values) {
            tri.add_triplet(row, col, value);
        }
        tri.to_csr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::array;

    use crate::{ConstraintSpec, Problem, VariableSpec};

    fn problem() -> Problem {
        let mut problem = Problem::new("map");
        problem.declare_variable(VariableSpec::group("x", 3)).unwrap();
        problem
            .declare_constraint(ConstraintSpec::new("a", 2).entries([(1, 2), (0, 0)]))
            .unwrap();
        problem
            .declare_constraint(ConstraintSpec::new("empty", 0).entries([]))
            .unwrap();
        problem
            .declare_constraint(ConstraintSpec::new("b", 1).entries([(0, 1), (0, 2)]))
            .unwrap();
        problem
    }

    fn assemble(problem: &Problem) -> JacobianMap {
        JacobianMap::assemble(problem.constraints(), problem.n_variables()).unwrap()
    }

    #[test]
    fn indices_follow_declaration_order() {
        let map = assemble(&problem());

        assert_eq!(map.nnz(), 4);
        assert_eq!(map.rows(), &[1, 0, 2, 2]);
        assert_eq!(map.cols(), &[2, 0, 1, 2]);
        assert_eq!(map.block_range(0), 0..2);
        assert_eq!(map.block_range(1), 2..2);
        assert_eq!(map.block_range(2), 2..4);
    }

    #[test]
    fn forward_and_reverse_lookups_are_inverse() {
        let map = assemble(&problem());

        for global in 0..map.nnz() {
            let (block, local) = map.local(global).unwrap();
            assert_eq!(map.global(block, local), Some(global));
            assert_eq!(map.position(map.rows()[global], map.cols()[global]), Some(global));
        }
        assert_eq!(map.local(4), None);
        assert_eq!(map.global(1, 0), None);
        assert_eq!(map.global(7, 0), None);
    }

    #[test]
    fn assembly_is_deterministic() {
        assert_eq!(assemble(&problem()), assemble(&problem()));
    }

    #[test]
    fn dense_and_sparse_views_agree() {
        let map = assemble(&problem());
        let values = [1.5, -2.0, 3.25, 4.0];

        let dense = map.to_dense(&values);
        assert_eq!(
            dense,
            array![[-2.0, 0.0, 0.0], [0.0, 0.0, 1.5], [0.0, 3.25, 4.0]]
        );
        assert_eq!(map.gather_dense(dense.view()), values.to_vec());

        let csr = map.to_csr(&values);
        assert_eq!(csr.nnz(), 4);
        for (row, col, value) in map.triplets(&values) {
            assert_relative_eq!(*csr.get(row, col).unwrap(), value);
        }
    }
}
