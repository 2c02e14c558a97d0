use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while writing a history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to write history file `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode history entry")]
    Encode(#[from] serde_json::Error),

    #[error("record index {index} does not follow index {last}")]
    OutOfOrder { index: u64, last: u64 },

    #[error("history file cannot be reopened")]
    Unreadable(#[from] RestartUnavailable),

    #[error("history file `{}` was written for a different problem structure", path.display())]
    SignatureMismatch { path: PathBuf },
}

/// Reasons a history file cannot seed a restart.
///
/// Every variant means the caller should cold-start.
#[derive(Debug, Error)]
pub enum RestartUnavailable {
    #[error("cannot read history file `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("history file is empty")]
    Empty,

    #[error("history header is missing or misplaced")]
    MissingHeader,

    #[error("history line {line} is corrupt")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("history line {line} has index {index}, which does not follow {previous}")]
    NonMonotonic {
        line: usize,
        index: u64,
        previous: u64,
    },

    #[error("history was written for different variable groups")]
    SignatureMismatch,

    #[error("history holds no complete record")]
    NoRecords,

    #[error("history holds no feasible record")]
    NoFeasibleRecord,
}
