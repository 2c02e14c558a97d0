//! Gradients, optimizer adapters, and reference backends for Skein problems.
//!
//! A frozen [`Problem`](skein_core::Problem) is solved by an
//! [`OptimizerAdapter`], which translates it into the conventions of one
//! backend and evaluates user [`Functions`](skein_core::Functions) on the
//! backend's behalf.
//!
//! # Modules
//!
//! - [`gradient`]: analytic, finite-difference, and complex-step derivatives
//!   placed in Jacobian map order
//! - [`adapter`]: [`DenseAdapter`] and [`SparseAdapter`], with scaling,
//!   bound encoding, row ordering, history, and hot start
//! - [`backends`]: [`GoldenSection`] and [`ProjectedGradient`]
//!
//! Every solve ends in a [`Solution`] carrying an [`ExitStatus`], or in an
//! [`Error`].

pub mod adapter;
pub mod backends;
mod config;
mod error;
mod evaluate;
pub mod gradient;
mod solution;

pub use adapter::{
    Action, CancelToken, Capabilities, DenseAdapter, DenseBackend, Event, OptimizerAdapter, SolveRequest,
    SparseAdapter, SparseBackend,
};
pub use backends::{GoldenSection, GoldenSectionConfig, ProjectedGradient, ProjectedGradientConfig};
pub use config::ConfigError;
pub use error::Error;
pub use evaluate::{EvalError, Evaluation, evaluate};
pub use gradient::{Derivatives, GradientConfig, GradientError, GradientProvider, Scheme, Strategy};
pub use solution::{ExitStatus, Solution};
