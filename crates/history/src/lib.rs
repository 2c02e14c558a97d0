//! Append-only evaluation history and restart for Skein solves.
//!
//! A history file is JSON Lines: one [`Header`] line carrying the problem
//! [`Signature`](skein_core::Signature), then one [`Record`] per evaluation.
//! [`HistoryWriter`] appends records during a solve; [`restart`] recovers a
//! starting point from a file written by an earlier solve.
//!
//! Readers tolerate an interrupted final write: an incomplete last line is
//! dropped and the last complete record is used.

mod error;
mod reader;
mod record;
mod restart;
mod writer;

#[cfg(test)]
mod tests;

pub use error::{HistoryError, RestartUnavailable};
pub use reader::{Log, read};
pub use record::{FORMAT_VERSION, GradientRecord, Header, Iteration, Record};
pub use restart::{Restart, RestartMode, restart};
pub use writer::HistoryWriter;
