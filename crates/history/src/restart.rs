use std::path::Path;

use serde::{Deserialize, Serialize};
use skein_core::Signature;
use tracing::{info, warn};

use crate::{RestartUnavailable, reader::read, record::Record};

/// How a history file seeds a new solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartMode {
    /// Same variable groups required; resume from the last complete record.
    #[default]
    Exact,

    /// Any structure; start from the last feasible record, mapped by group.
    Warm,
}

/// A restart point recovered from a history file.
#[derive(Debug, Clone, PartialEq)]
pub struct Restart {
    mode: RestartMode,
    signature: Signature,
    record: Record,
    records: Vec<Record>,
}

impl Restart {
    #[must_use]
    pub fn mode(&self) -> RestartMode {
        self.mode
    }

    /// Signature of the problem that wrote the file.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The record to resume from.
    #[must_use]
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Every complete record in file order, for replaying a hot start.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Builds a starting point for a problem with signature `current`.
    ///
    /// Variable groups present in both problems with the same length take
    /// their values from the restart record; the rest keep `fallback`.
    ///
    /// # Panics
    ///
    /// Panics if `fallback` does not match the variable count of `current`.
    #[must_use]
    pub fn starting_point(&self, current: &Signature, fallback: &[f64]) -> Vec<f64> {
        assert_eq!(fallback.len(), current.n_variables(), "fallback length mismatch");
        let mut x = fallback.to_vec();

        let mut source_offset = 0;
        let mut sources = Vec::with_capacity(self.signature.variables.len());
        for shape in &self.signature.variables {
            sources.push((shape, source_offset));
            source_offset += shape.len;
        }

        let mut offset = 0;
        for shape in &current.variables {
            let found = sources
                .iter()
                .find(|(s, _)| s.name == shape.name && s.len == shape.len);
            match found {
                Some(&(_, from)) if from + shape.len <= self.record.x.len() => {
                    x[offset..offset + shape.len]
                        .copy_from_slice(&self.record.x[from..from + shape.len]);
                }
                _ => warn!(
                    group = %shape.name,
                    "variable group not found in restart record, keeping its start"
                ),
            }
            offset += shape.len;
        }
        x
    }
}

/// Recovers a restart point from the history file at `path`.
///
/// # Errors
///
/// Returns [`RestartUnavailable`] if the file is unusable, the variable
/// groups differ in [`RestartMode::Exact`], or no suitable record exists.
pub fn restart(
    path: impl AsRef<Path>,
    mode: RestartMode,
    signature: &Signature,
) -> Result<Restart, RestartUnavailable> {
    let log = read(path.as_ref())?;

    let record = match mode {
        RestartMode::Exact => {
            if !log.header.signature.same_variables(signature) {
                return Err(RestartUnavailable::SignatureMismatch);
            }
            log.records.last().ok_or(RestartUnavailable::NoRecords)?
        }
        RestartMode::Warm => {
            if log.records.is_empty() {
                return Err(RestartUnavailable::NoRecords);
            }
            log.records
                .iter()
                .rev()
                .find(|r| r.feasible)
                .ok_or(RestartUnavailable::NoFeasibleRecord)?
        }
    }
    .clone();

    info!(
        path = %path.as_ref().display(),
        ?mode,
        index = record.index,
        records = log.records.len(),
        truncated = log.truncated,
        "restart point recovered"
    );

    Ok(Restart {
        mode,
        signature: log.header.signature,
        record,
        records: log.records,
    })
}
