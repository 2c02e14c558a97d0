//! Problem model for the Skein optimizer-adapter layer.
//!
//! A [`Problem`] is declared once, independent of any optimizer:
//!
//! - [`VariableSpec`]: named groups of design variables with bounds, initial
//!   values, scale factors, and kind
//! - [`ConstraintSpec`]: named constraint blocks with bounds, a sparsity
//!   [`Pattern`], a scale, and optional linear coefficients
//! - [`Objective`]: named objectives with a [`Sense`] and scale
//!
//! Freezing the problem assembles the [`JacobianMap`], which assigns every
//! declared Jacobian nonzero a flat index shared by all derivative sources
//! and all adapters.
//!
//! User code supplies values through the [`Functions`] trait and receives
//! design points as [`Point`] views. Adapters report progress to an
//! [`Observer`].

mod constraint;
mod error;
mod functions;
mod objective;
mod observer;
mod point;
mod problem;
mod signature;
mod sparsity;
mod variable;

pub use constraint::{ConstraintBlock, ConstraintSpec, Pattern};
pub use error::{DeclareError, ValuesError};
pub use functions::{BlockJacobian, FunctionValues, Functions, Gathered, Gradients};
pub use objective::{Objective, Sense};
pub use observer::Observer;
pub use point::Point;
pub use problem::Problem;
pub use signature::{Shape, Signature};
pub use sparsity::JacobianMap;
pub use variable::{Fill, VarKind, VariableGroup, VariableSpec, Variables};

pub use num_complex::Complex64;
