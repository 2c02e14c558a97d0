use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use skein_core::Signature;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// First line of every history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub format: u32,
    pub created: Timestamp,
    pub signature: Signature,
}

impl Header {
    #[must_use]
    pub fn new(signature: Signature) -> Self {
        Self {
            format: FORMAT_VERSION,
            created: Timestamp::now(),
            signature,
        }
    }
}

/// Iteration counters reported by the backend at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    pub major: u64,
    pub minor: u64,
}

/// Derivatives stored with a record, in user space.
///
/// `jacobian` holds one value per Jacobian map entry, in map order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientRecord {
    pub objectives: Vec<Vec<f64>>,
    pub jacobian: Vec<f64>,
}

/// One evaluation, in user (unscaled) space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub index: u64,
    pub timestamp: Timestamp,
    pub x: Vec<f64>,
    pub objectives: Vec<f64>,
    pub constraints: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<GradientRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<Iteration>,

    pub feasible: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// A line of a history file, as read back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Entry {
    Header(Header),
    Record(Record),
}

/// A line of a history file, as written.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum EntryRef<'a> {
    Header(&'a Header),
    Record(&'a Record),
}
