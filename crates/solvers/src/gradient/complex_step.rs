use skein_core::{Complex64, Functions, Problem};

use super::{Column, GradientError, GradientProvider};

impl GradientProvider {
    /// Derivatives of column `index` as `Im f(x + ih) / h`.
    ///
    /// No difference is taken, so `step` can be far below round-off.
    pub(super) fn complex_step<F>(
        &self,
        problem: &Problem,
        functions: &F,
        x: &[f64],
        index: usize,
        step: f64,
    ) -> Result<Column, GradientError>
    where
        F: Functions + ?Sized,
    {
        let mut z: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        z[index].im = step;

        let values = functions
            .evaluate_complex(&problem.point(&z))
            .map_err(|e| GradientError::Function(Box::new(e)))?
            .ok_or(GradientError::MissingComplex)?;
        let gathered = problem.gather(&values)?;

        let rows = self.map.rows();
        Ok(Column {
            index,
            objectives: gathered.objectives.iter().map(|f| f.im / step).collect(),
            entries: self.entries[index]
                .iter()
                .map(|&global| gathered.constraints[rows[global]].im / step)
                .collect(),
            warning: None,
        })
    }
}
