use ndarray::Array2;
use skein_core::{JacobianMap, Problem};

use crate::{Capabilities, adapter::ObjectiveConvention};

/// Conversion between user space and the backend's scaled space.
///
/// `x_backend = x_user · s`, objectives are multiplied by their scale (and
/// negated when a minimize-only backend sees a maximized objective), and
/// constraint rows by their block scale. Derivatives pick up the matching
/// `scale / s` factors.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Scaling {
    variables: Vec<f64>,
    objectives: Vec<f64>,
    rows: Vec<f64>,

    /// `row scale / variable scale` for each Jacobian map entry.
    entries: Vec<f64>,
}

impl Scaling {
    pub(crate) fn new(problem: &Problem, map: &JacobianMap, capabilities: &Capabilities) -> Self {
        let variables = problem.variables().scale();
        let objectives = problem
            .objectives()
            .iter()
            .map(|o| match capabilities.objective {
                ObjectiveConvention::MinimizeOnly => o.scale_factor() * o.sense().sign(),
                ObjectiveConvention::Native => o.scale_factor(),
            })
            .collect();
        let rows: Vec<f64> = problem
            .constraints()
            .iter()
            .flat_map(|b| std::iter::repeat_n(b.scale(), b.len()))
            .collect();
        let entries = map
            .rows()
            .iter()
            .zip(map.cols())
            .map(|(&row, &col)| rows[row] / variables[col])
            .collect();

        Self {
            variables,
            objectives,
            rows,
            entries,
        }
    }

    pub(crate) fn to_backend(&self, x: &[f64]) -> Vec<f64> {
        x.iter().zip(&self.variables).map(|(x, s)| x * s).collect()
    }

    pub(crate) fn to_user(&self, x: &[f64]) -> Vec<f64> {
        x.iter().zip(&self.variables).map(|(x, s)| x / s).collect()
    }

    /// Scaled variable bounds, swapped where a scale is negative.
    pub(crate) fn bounds(&self, lower: &[f64], upper: &[f64]) -> (Vec<f64>, Vec<f64>) {
        lower
            .iter()
            .zip(upper)
            .zip(&self.variables)
            .map(|((&lo, &hi), &s)| ordered(lo * s, hi * s))
            .unzip()
    }

    /// Scale of natural constraint row `row`.
    pub(crate) fn row(&self, row: usize) -> f64 {
        self.rows[row]
    }

    pub(crate) fn objectives(&self, values: &[f64]) -> Vec<f64> {
        values.iter().zip(&self.objectives).map(|(f, k)| f * k).collect()
    }

    pub(crate) fn constraints(&self, values: &[f64]) -> Vec<f64> {
        values.iter().zip(&self.rows).map(|(c, r)| c * r).collect()
    }

    /// Scaled objective gradients, one row per objective.
    pub(crate) fn objective_gradients(&self, gradients: &[Vec<f64>]) -> Array2<f64> {
        let n = self.variables.len();
        let mut scaled = Array2::zeros((gradients.len(), n));
        for (k, (gradient, factor)) in gradients.iter().zip(&self.objectives).enumerate() {
            for (i, (g, s)) in gradient.iter().zip(&self.variables).enumerate() {
                scaled[[k, i]] = g * factor / s;
            }
        }
        scaled
    }

    /// Scaled Jacobian values in map order.
    pub(crate) fn jacobian(&self, values: &[f64]) -> Vec<f64> {
        values.iter().zip(&self.entries).map(|(v, f)| v * f).collect()
    }
}

/// Bounds `(lo, hi)` after scaling, swapped if the scale flipped them.
pub(crate) fn ordered(lo: f64, hi: f64) -> (f64, f64) {
    if lo <= hi { (lo, hi) } else { (hi, lo) }
}

#[cfg(test)]
mod tests {
    use super::*;

    use skein_core::{ConstraintSpec, Objective, VariableSpec};

    #[test]
    fn scales_values_and_derivatives() {
        let mut problem = Problem::new("scaled");
        problem
            .declare_variable(VariableSpec::group("x", 2).bounds(0.0, 10.0).scale([0.1, -2.0]))
            .unwrap();
        problem.declare_objective(Objective::maximize("f").scale(3.0)).unwrap();
        problem
            .declare_constraint(ConstraintSpec::new("g", 1).scale(5.0))
            .unwrap();
        let map = problem.freeze().unwrap().clone();

        let scaling = Scaling::new(&problem, &map, &Capabilities::default());

        assert_eq!(scaling.to_backend(&[5.0, 1.0]), vec![0.5, -2.0]);
        assert_eq!(scaling.to_user(&[0.5, -2.0]), vec![5.0, 1.0]);
        assert_eq!(
            scaling.bounds(&[0.0, 0.0], &[10.0, 10.0]),
            (vec![0.0, -20.0], vec![1.0, 0.0])
        );
        assert_eq!(scaling.objectives(&[2.0]), vec![-6.0]);
        assert_eq!(scaling.constraints(&[2.0]), vec![10.0]);
        assert_eq!(
            scaling
                .objective_gradients(&[vec![1.0, 4.0]])
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            vec![-30.0, 6.0]
        );
        assert_eq!(scaling.jacobian(&[1.0, 4.0]), vec![50.0, -10.0]);
    }
}
