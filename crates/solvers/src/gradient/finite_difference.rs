use skein_core::{Functions, Problem};

use crate::evaluate::{Evaluation, evaluate};

use super::{Column, GradientError, GradientProvider, Scheme};

impl GradientProvider {
    /// Differences column `index` with step `max(|x|, 1) · epsilon`.
    ///
    /// A step that would leave the variable bounds is taken on the other
    /// side instead; central differences fall back to one side.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn difference<F>(
        &self,
        problem: &Problem,
        functions: &F,
        x: &[f64],
        base: &Evaluation,
        index: usize,
        scheme: Scheme,
        epsilon: f64,
    ) -> Result<Column, GradientError>
    where
        F: Functions + ?Sized,
    {
        let value = x[index];
        let h = value.abs().max(1.0) * epsilon;
        let (lower, upper) = (self.lower[index], self.upper[index]);
        let fits_above = value + h <= upper;
        let fits_below = value - h >= lower;

        let (step, central) = match scheme {
            Scheme::Central if fits_above && fits_below => (h, true),
            _ if fits_above || !fits_below => (h, false),
            _ => (-h, false),
        };

        let warning = if !fits_above && !fits_below {
            Some(format!(
                "column {index}: bounds [{lower}, {upper}] are narrower than step {h}, stepping outside"
            ))
        } else if step < 0.0 {
            Some(format!(
                "column {index}: step reflected below upper bound {upper}"
            ))
        } else if scheme == Scheme::Central && !central {
            Some(format!(
                "column {index}: central step crosses lower bound {lower}, using a forward difference"
            ))
        } else {
            None
        };

        let (plus, x_plus) = shifted(problem, functions, x, index, value + step)?;
        let (objectives, entries) = if central {
            let (minus, x_minus) = shifted(problem, functions, x, index, value - step)?;
            self.quotients(index, &plus, &minus, x_plus - x_minus)
        } else {
            self.quotients(index, &plus, base, x_plus - value)
        };

        Ok(Column {
            index,
            objectives,
            entries,
            warning,
        })
    }

    /// Difference quotients `(a - b) / delta` for objectives and entries.
    fn quotients(&self, index: usize, a: &Evaluation, b: &Evaluation, delta: f64) -> (Vec<f64>, Vec<f64>) {
        let objectives = a
            .objectives
            .iter()
            .zip(&b.objectives)
            .map(|(fa, fb)| (fa - fb) / delta)
            .collect();
        let rows = self.map.rows();
        let entries = self.entries[index]
            .iter()
            .map(|&global| {
                let row = rows[global];
                (a.constraints[row] - b.constraints[row]) / delta
            })
            .collect();
        (objectives, entries)
    }
}

/// Evaluates with column `index` moved to `target`.
///
/// Returns the values and the column value actually evaluated, so that
/// quotients use the representable step.
fn shifted<F>(
    problem: &Problem,
    functions: &F,
    x: &[f64],
    index: usize,
    target: f64,
) -> Result<(Evaluation, f64), GradientError>
where
    F: Functions + ?Sized,
{
    let mut perturbed = x.to_vec();
    perturbed[index] = target;
    let evaluation = evaluate(problem, functions, &perturbed)?;
    Ok((evaluation, perturbed[index]))
}
