use std::error::Error as StdError;

use skein_core::DeclareError;
use skein_history::{HistoryError, RestartUnavailable};
use thiserror::Error;

use crate::ConfigError;

/// Errors that end a solve.
#[derive(Debug, Error)]
pub enum Error {
    /// The problem declaration is invalid.
    #[error(transparent)]
    Declare(#[from] DeclareError),

    /// The backend accepts a single objective but the problem declares more.
    #[error("backend `{backend}` optimizes one objective, the problem declares {count}")]
    CombinationPolicy { backend: String, count: usize },

    /// The problem uses a feature the backend cannot express.
    #[error("backend `{backend}` does not support {feature}")]
    Unsupported {
        backend: String,
        feature: &'static str,
    },

    /// Adapter or gradient configuration is invalid for this problem.
    #[error("invalid configuration")]
    InvalidConfig(#[from] ConfigError),

    /// A user function failed or returned unusable values.
    ///
    /// The solve was aborted at evaluation `index`. Records before it are
    /// complete in the history, if one was attached.
    #[error("evaluation {index} failed")]
    Evaluation {
        index: u64,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The backend reported a failure.
    #[error("backend failed with code {code}: {message}")]
    Backend { code: i32, message: String },

    /// Appending to the history file failed.
    #[error("history write failed")]
    History(#[from] HistoryError),

    /// The supplied restart cannot seed this problem.
    #[error("restart rejected")]
    Restart(#[from] RestartUnavailable),
}
