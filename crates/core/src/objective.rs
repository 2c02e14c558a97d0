use serde::{Deserialize, Serialize};

/// Direction of optimization for an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

impl Sense {
    /// Factor that turns this sense into minimization.
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        }
    }
}

/// A named scalar objective with its sense and scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    name: String,
    sense: Sense,
    scale: f64,
}

impl Objective {
    pub fn minimize(name: impl Into<String>) -> Self {
        Self::new(name, Sense::Minimize)
    }

    pub fn maximize(name: impl Into<String>) -> Self {
        Self::new(name, Sense::Maximize)
    }

    pub fn new(name: impl Into<String>, sense: Sense) -> Self {
        Self {
            name: name.into(),
            sense,
            scale: 1.0,
        }
    }

    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn sense(&self) -> Sense {
        self.sense
    }

    #[must_use]
    pub fn scale_factor(&self) -> f64 {
        self.scale
    }
}
