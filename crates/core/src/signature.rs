use serde::{Deserialize, Serialize};

/// Name and length of a declared variable group or constraint block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    pub len: usize,
}

/// Structural fingerprint of a problem, stored in history file headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub problem: String,
    pub variables: Vec<Shape>,
    pub constraints: Vec<Shape>,
    pub objectives: Vec<String>,
}

impl Signature {
    /// Whether two signatures describe the same structure.
    ///
    /// The problem name is informational and not compared.
    #[must_use]
    pub fn matches(&self, other: &Signature) -> bool {
        self.variables == other.variables
            && self.constraints == other.constraints
            && self.objectives == other.objectives
    }

    /// Whether two signatures declare the same variable groups in order.
    ///
    /// This is enough to resume from a recorded point; constraints and
    /// objectives may differ.
    #[must_use]
    pub fn same_variables(&self, other: &Signature) -> bool {
        self.variables == other.variables
    }

    /// Total number of scalar variables.
    #[must_use]
    pub fn n_variables(&self) -> usize {
        self.variables.iter().map(|s| s.len).sum()
    }
}
