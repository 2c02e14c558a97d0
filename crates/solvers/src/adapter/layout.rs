//! Constraint rows as a backend expects them.
//!
//! Each backend row is `factor · c[source] - offset` for a natural (scaled)
//! row `source`, or a dummy row with value zero. Rows are grouped by class
//! in the backend's order and encoded one- or two-sided.

use ndarray::Array2;
use skein_core::{JacobianMap, Problem};

use crate::{
    Capabilities,
    adapter::{
        BoundEncoding, LinearHandling, LinearRows, RowClass, SparseMatrix, SparseStructure,
        scaling::{Scaling, ordered},
    },
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Row {
    source: Option<usize>,
    factor: f64,
    offset: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct RowSet {
    rows: Vec<Row>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl RowSet {
    fn push(&mut self, source: Option<usize>, factor: f64, offset: f64, bounds: (f64, f64)) {
        self.rows.push(Row {
            source,
            factor,
            offset,
        });
        self.lower.push(bounds.0);
        self.upper.push(bounds.1);
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Mapping from natural constraint rows to backend rows.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RowLayout {
    /// Rows returned by the evaluation callback.
    callback: RowSet,

    /// Linear rows passed as a constant matrix, when the backend takes them.
    linear: Option<RowSet>,

    /// Flat Jacobian indices of each natural row.
    row_entries: Vec<Vec<usize>>,

    cols: Vec<usize>,
    n_cols: usize,
}

impl RowLayout {
    pub(crate) fn new(problem: &Problem, map: &JacobianMap, scaling: &Scaling, capabilities: &Capabilities) -> Self {
        let separate = capabilities.linear == LinearHandling::Separate;
        let mut callback = RowSet::default();
        let mut linear = RowSet::default();

        for class in capabilities.order {
            for block in problem.constraints() {
                if block.is_linear() != class.is_linear() {
                    continue;
                }
                for local in 0..block.len() {
                    if block.is_equality(local) != class.is_equality() {
                        continue;
                    }
                    let row = block.rows().start + local;
                    let scale = scaling.row(row);
                    let bounds = ordered(block.lower()[local] * scale, block.upper()[local] * scale);
                    if separate && class.is_linear() {
                        linear.push(Some(row), 1.0, 0.0, encoded(capabilities, bounds));
                    } else {
                        encode(&mut callback, row, bounds, class, capabilities);
                    }
                }
            }
        }

        if capabilities.requires_constraint && callback.is_empty() && linear.is_empty() {
            let upper = match capabilities.encoding {
                BoundEncoding::TwoSided => f64::INFINITY,
                BoundEncoding::OneSided => 0.0,
            };
            callback.push(None, 0.0, 0.0, encoded(capabilities, (f64::NEG_INFINITY, upper)));
        }

        let mut row_entries = vec![Vec::new(); map.n_rows()];
        for (global, &row) in map.rows().iter().enumerate() {
            row_entries[row].push(global);
        }

        Self {
            callback,
            linear: separate.then_some(linear),
            row_entries,
            cols: map.cols().to_vec(),
            n_cols: map.n_cols(),
        }
    }

    pub(crate) fn callback_len(&self) -> usize {
        self.callback.rows.len()
    }

    pub(crate) fn callback_lower(&self) -> &[f64] {
        &self.callback.lower
    }

    pub(crate) fn callback_upper(&self) -> &[f64] {
        &self.callback.upper
    }

    /// Backend row values from scaled natural rows.
    pub(crate) fn callback_values(&self, constraints: &[f64]) -> Vec<f64> {
        self.callback
            .rows
            .iter()
            .map(|row| match row.source {
                Some(source) => row.factor * constraints[source] - row.offset,
                None => 0.0,
            })
            .collect()
    }

    /// Zero-padded callback Jacobian from scaled values in map order.
    pub(crate) fn callback_dense(&self, jacobian: &[f64]) -> Array2<f64> {
        self.dense(&self.callback, jacobian)
    }

    pub(crate) fn callback_structure(&self) -> SparseStructure {
        self.structure(&self.callback)
    }

    /// Callback Jacobian values aligned with [`Self::callback_structure`].
    pub(crate) fn callback_triplets(&self, jacobian: &[f64]) -> Vec<f64> {
        self.triplets(&self.callback, jacobian)
    }

    pub(crate) fn linear_dense(&self, jacobian: &[f64]) -> Option<LinearRows<Array2<f64>>> {
        self.linear.as_ref().map(|set| LinearRows {
            matrix: self.dense(set, jacobian),
            lower: set.lower.clone(),
            upper: set.upper.clone(),
        })
    }

    pub(crate) fn linear_sparse(&self, jacobian: &[f64]) -> Option<LinearRows<SparseMatrix>> {
        self.linear.as_ref().map(|set| LinearRows {
            matrix: SparseMatrix {
                structure: self.structure(set),
                values: self.triplets(set, jacobian),
            },
            lower: set.lower.clone(),
            upper: set.upper.clone(),
        })
    }

    fn dense(&self, set: &RowSet, jacobian: &[f64]) -> Array2<f64> {
        let mut dense = Array2::zeros((set.rows.len(), self.n_cols));
        for (i, row) in set.rows.iter().enumerate() {
            let Some(source) = row.source else { continue };
            for &global in &self.row_entries[source] {
                dense[[i, self.cols[global]]] = row.factor * jacobian[global];
            }
        }
        dense
    }

    fn structure(&self, set: &RowSet) -> SparseStructure {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        for (i, row) in set.rows.iter().enumerate() {
            let Some(source) = row.source else { continue };
            for &global in &self.row_entries[source] {
                rows.push(i);
                cols.push(self.cols[global]);
            }
        }
        SparseStructure {
            shape: (set.rows.len(), self.n_cols),
            rows,
            cols,
        }
    }

    fn triplets(&self, set: &RowSet, jacobian: &[f64]) -> Vec<f64> {
        set.rows
            .iter()
            .filter_map(|row| row.source.map(|source| (row.factor, source)))
            .flat_map(|(factor, source)| {
                self.row_entries[source]
                    .iter()
                    .map(move |&global| factor * jacobian[global])
            })
            .collect()
    }
}

/// Appends the backend rows for natural row `row` with scaled `bounds`.
fn encode(set: &mut RowSet, row: usize, bounds: (f64, f64), class: RowClass, capabilities: &Capabilities) {
    let (lo, hi) = bounds;
    let split = class.is_equality() && capabilities.split_equalities;
    let free = f64::NEG_INFINITY;

    match capabilities.encoding {
        BoundEncoding::TwoSided if split => {
            set.push(Some(row), 1.0, 0.0, encoded(capabilities, (free, hi)));
            set.push(Some(row), -1.0, 0.0, encoded(capabilities, (free, -lo)));
        }
        BoundEncoding::TwoSided => set.push(Some(row), 1.0, 0.0, encoded(capabilities, bounds)),
        BoundEncoding::OneSided if class.is_equality() && !split => {
            set.push(Some(row), 1.0, hi, (0.0, 0.0));
        }
        BoundEncoding::OneSided => {
            if hi.is_finite() {
                set.push(Some(row), 1.0, hi, encoded(capabilities, (free, 0.0)));
            }
            if lo.is_finite() {
                set.push(Some(row), -1.0, -lo, encoded(capabilities, (free, 0.0)));
            }
        }
    }
}

fn encoded(capabilities: &Capabilities, (lo, hi): (f64, f64)) -> (f64, f64) {
    (capabilities.encode_bound(lo), capabilities.encode_bound(hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    use skein_core::{ConstraintSpec, Objective, VariableSpec};

    /// Rows: `n_ineq` in [-1, 2], `n_eq` = 3, `l_ineq` ≥ 0 (linear).
    fn problem() -> (Problem, JacobianMap) {
        let mut problem = Problem::new("layout");
        problem.declare_variable(VariableSpec::group("x", 2)).unwrap();
        problem.declare_objective(Objective::minimize("f")).unwrap();
        problem
            .declare_constraint(ConstraintSpec::new("n_ineq", 1).bounds(-1.0, 2.0).entries([(0, 0)]))
            .unwrap();
        problem
            .declare_constraint(ConstraintSpec::new("n_eq", 1).equals(3.0).entries([(0, 1)]))
            .unwrap();
        problem
            .declare_constraint(
                ConstraintSpec::new("l_ineq", 1)
                    .lower(0.0)
                    .entries([(0, 0), (0, 1)])
                    .linear([1.0, 1.0]),
            )
            .unwrap();
        let map = problem.freeze().unwrap().clone();
        (problem, map)
    }

    fn layout(capabilities: &Capabilities) -> RowLayout {
        let (problem, map) = problem();
        let scaling = Scaling::new(&problem, &map, capabilities);
        RowLayout::new(&problem, &map, &scaling, capabilities)
    }

    #[test]
    fn two_sided_rows_follow_class_order() {
        let layout = layout(&Capabilities::default());

        // Natural rows: [n_ineq, n_eq, l_ineq]; order NI, LI, NE, LE.
        assert_eq!(layout.callback_values(&[10.0, 20.0, 30.0]), vec![10.0, 30.0, 20.0]);
        assert_eq!(layout.callback_lower(), &[-1.0, 0.0, 3.0]);
        assert_eq!(layout.callback_upper(), &[2.0, 1e20, 3.0]);

        let dense = layout.callback_dense(&[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(dense.row(0).to_vec(), vec![5.0, 0.0]);
        assert_eq!(dense.row(1).to_vec(), vec![7.0, 8.0]);
        assert_eq!(dense.row(2).to_vec(), vec![0.0, 6.0]);
    }

    #[test]
    fn one_sided_rows_carry_factors_and_offsets() {
        let capabilities = Capabilities {
            encoding: BoundEncoding::OneSided,
            ..Capabilities::default()
        };
        let layout = layout(&capabilities);

        // n_ineq: c - 2 ≤ 0 and -c - 1 ≤ 0; l_ineq: -c ≤ 0; n_eq: c - 3 = 0.
        assert_eq!(layout.callback_values(&[0.5, 3.0, 4.0]), vec![-1.5, -1.5, -4.0, 0.0]);
        assert_eq!(layout.callback_upper(), &[0.0; 4]);
        assert_eq!(layout.callback_lower(), &[-1e20, -1e20, -1e20, 0.0]);

        let structure = layout.callback_structure();
        assert_eq!(structure.rows, vec![0, 1, 2, 2, 3]);
        assert_eq!(structure.cols, vec![0, 0, 0, 1, 1]);
        assert_eq!(
            layout.callback_triplets(&[5.0, 6.0, 7.0, 8.0]),
            vec![5.0, -5.0, -7.0, -8.0, 6.0]
        );
    }

    #[test]
    fn split_equalities_become_two_inequalities() {
        let capabilities = Capabilities {
            split_equalities: true,
            infinity: None,
            ..Capabilities::default()
        };
        let layout = layout(&capabilities);

        assert_eq!(layout.callback_values(&[0.0, 3.5, 1.0]), vec![0.0, 1.0, 3.5, -3.5]);
        assert_eq!(layout.callback_upper(), &[2.0, f64::INFINITY, 3.0, -3.0]);
    }

    #[test]
    fn separate_linear_rows_leave_the_callback() {
        let capabilities = Capabilities {
            linear: LinearHandling::Separate,
            ..Capabilities::default()
        };
        let layout = layout(&capabilities);

        assert_eq!(layout.callback_len(), 2);
        let linear = layout.linear_dense(&[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(linear.matrix.row(0).to_vec(), vec![1.0, 1.0]);
        assert_eq!(linear.lower, vec![0.0]);
        assert_eq!(linear.upper, vec![1e20]);

        let sparse = layout.linear_sparse(&[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(sparse.matrix.values, vec![1.0, 1.0]);
        assert_eq!(sparse.matrix.structure.to_dense(&sparse.matrix.values), linear.matrix);
    }

    #[test]
    fn dummy_row_when_a_constraint_is_required() {
        let mut problem = Problem::new("bare");
        problem.declare_variable(VariableSpec::scalar("x")).unwrap();
        problem.declare_objective(Objective::minimize("f")).unwrap();
        let map = problem.freeze().unwrap().clone();
        let capabilities = Capabilities {
            requires_constraint: true,
            ..Capabilities::default()
        };
        let scaling = Scaling::new(&problem, &map, &capabilities);

        let layout = RowLayout::new(&problem, &map, &scaling, &capabilities);

        assert_eq!(layout.callback_values(&[]), vec![0.0]);
        assert_eq!(layout.callback_lower(), &[-1e20]);
        assert_eq!(layout.callback_dense(&[]).dim(), (1, 1));
    }
}
