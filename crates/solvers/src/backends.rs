//! Reference backends.
//!
//! Small optimizers that exercise the adapter end to end. Both take dense
//! Jacobians and speak [`DenseBackend`](crate::adapter::DenseBackend).

pub mod golden_section;
pub mod projected_gradient;

pub use golden_section::{GoldenSection, GoldenSectionConfig};
pub use projected_gradient::{ProjectedGradient, ProjectedGradientConfig};
