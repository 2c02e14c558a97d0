//! Reusable observers for Skein optimizer adapters.
//!
//! This crate provides [`Observer`] implementations and capability traits that
//! work with any adapter event and action types implementing them.
//!
//! # Modules
//!
//! - [`traits`]: capability traits for generic observers
//!   ([`HasIndex`], [`HasObjective`], [`HasViolation`], [`CanStopEarly`])
//!
//! # Observers
//!
//! - [`TracingObserver`] logs evaluations through `tracing`
//! - [`EvaluationBudget`] stops a solve after a number of evaluations
//! - [`TargetObjective`] stops a solve once a feasible objective is good enough
//! - [`Trace`] records objective and violation per evaluation
//!
//! [`Both`] runs two observers on every event.
//!
//! [`Observer`]: skein_core::Observer
//! [`HasIndex`]: traits::HasIndex
//! [`HasObjective`]: traits::HasObjective
//! [`HasViolation`]: traits::HasViolation
//! [`CanStopEarly`]: traits::CanStopEarly

mod both;
mod budget;
mod logging;
mod target;
mod trace;
pub mod traits;

pub use both::Both;
pub use budget::EvaluationBudget;
pub use logging::TracingObserver;
pub use target::TargetObjective;
pub use trace::{Sample, Trace};
