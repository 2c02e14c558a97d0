use std::fmt;

use super::Problem;
use crate::{ConstraintBlock, Sense, VarKind};

impl Problem {
    /// ASCII overview of which variable sets each constraint block touches.
    ///
    /// Nonlinear blocks are listed first, then linear blocks.
    #[must_use]
    pub fn sparsity_report(&self) -> String {
        SparsityReport(self).to_string()
    }
}

struct SparsityReport<'a>(&'a Problem);

impl fmt::Display for SparsityReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let problem = self.0;
        let variables = &problem.variables;
        let sets: Vec<(&str, Vec<usize>)> = variables
            .sets()
            .map(|set| (set, variables.columns_of(set).unwrap_or_default()))
            .collect();
        let headers: Vec<String> = sets
            .iter()
            .map(|(set, columns)| format!("{set} ({})", columns.len()))
            .collect();

        let ordered: Vec<&ConstraintBlock> = problem
            .constraints
            .iter()
            .filter(|b| !b.is_linear())
            .chain(problem.constraints.iter().filter(|b| b.is_linear()))
            .collect();
        let labels: Vec<String> = ordered
            .iter()
            .map(|b| {
                let tag = if b.is_linear() { " [linear]" } else { "" };
                format!("{}{tag} ({})", b.name(), b.len())
            })
            .collect();

        let first = labels.iter().map(String::len).max().unwrap_or(0).max(11);
        let widths: Vec<usize> = headers.iter().map(|h| h.len() + 2).collect();

        writeln!(
            f,
            "Sparsity of `{}`: {} rows x {} columns",
            problem.name,
            problem.n_constraints(),
            problem.n_variables()
        )?;
        write!(f, "{:first$} |", "constraint")?;
        for (header, &width) in headers.iter().zip(&widths) {
            write!(f, "{header:^width$}|")?;
        }
        writeln!(f)?;
        write!(f, "{}+", "-".repeat(first + 1))?;
        for &width in &widths {
            write!(f, "{}+", "-".repeat(width))?;
        }
        writeln!(f)?;

        for (block, label) in ordered.iter().zip(&labels) {
            // Before freeze a `wrt` block has no entries yet.
            let wrt: Vec<usize> = block
                .wrt()
                .iter()
                .filter_map(|set| variables.columns_of(set))
                .flatten()
                .collect();
            write!(f, "{label:first$} |")?;
            for ((_, columns), &width) in sets.iter().zip(&widths) {
                let touched = block.is_dense()
                    || wrt.iter().any(|c| columns.contains(c))
                    || block.entries().iter().any(|(_, c)| columns.contains(c));
                let mark = if touched { "X" } else { "" };
                write!(f, "{mark:^width$}|")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization problem `{}`", self.name)?;

        writeln!(f, "\nObjectives")?;
        for (index, objective) in self.objectives.iter().enumerate() {
            let sense = match objective.sense() {
                Sense::Minimize => "minimize",
                Sense::Maximize => "maximize",
            };
            writeln!(
                f,
                "  {index:>4}  {:<16} {sense:<10} scale {:e}",
                objective.name(),
                objective.scale_factor()
            )?;
        }

        writeln!(f, "\nVariables ({})", self.n_variables())?;
        for group in self.variables.groups() {
            let kind = match group.kind() {
                VarKind::Continuous => 'c',
                VarKind::Integer => 'i',
            };
            for (offset, column) in group.columns().enumerate() {
                writeln!(
                    f,
                    "  {column:>4}  {:<16} {kind}  {:>12.5e} <= {:>12.5e} <= {:>12.5e}  scale {:e}",
                    group.name(),
                    group.lower()[offset],
                    group.current()[offset],
                    group.upper()[offset],
                    group.scale()[offset]
                )?;
            }
        }

        if !self.constraints.is_empty() {
            writeln!(f, "\nConstraints ({})", self.n_constraints())?;
            for block in &self.constraints {
                let kind = if block.is_linear() { 'l' } else { 'n' };
                for (offset, row) in block.rows().enumerate() {
                    let relation = if block.is_equality(offset) { "==" } else { "<=" };
                    writeln!(
                        f,
                        "  {row:>4}  {:<16} {kind}  {:>12.5e} {relation} c {relation} {:>12.5e}  scale {:e}",
                        block.name(),
                        block.lower()[offset],
                        block.upper()[offset],
                        block.scale()
                    )?;
                }
            }
        }
        Ok(())
    }
}
