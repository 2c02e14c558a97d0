use std::{fs, path::Path};

use tracing::warn;

use crate::{
    RestartUnavailable,
    record::{Entry, Header, Record},
};

/// The complete records of a history file.
#[derive(Debug, Clone, PartialEq)]
pub struct Log {
    pub header: Header,
    pub records: Vec<Record>,

    /// Whether an incomplete final line was dropped.
    pub truncated: bool,
}

/// Reads every complete record of a history file.
///
/// An unparsable final line is treated as an interrupted write and dropped.
/// An unparsable line followed by more data is corruption.
///
/// # Errors
///
/// Returns [`RestartUnavailable`] if the file cannot be read, has no valid
/// header, is corrupt before its last line, or has non-increasing indices.
pub fn read(path: impl AsRef<Path>) -> Result<Log, RestartUnavailable> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| RestartUnavailable::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(RestartUnavailable::Empty);
    }

    let mut lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
    if bytes.ends_with(b"\n") {
        // `split` yields an empty slice after the final newline.
        lines.pop();
    }
    let last = lines.len() - 1;

    let mut header = None;
    let mut records: Vec<Record> = Vec::new();
    let mut truncated = false;

    for (number, line) in lines.iter().enumerate() {
        let entry = match serde_json::from_slice::<Entry>(line) {
            Ok(entry) => entry,
            Err(_) if number == last => {
                warn!(
                    path = %path.display(),
                    line = number + 1,
                    "ignoring incomplete final history line"
                );
                truncated = true;
                break;
            }
            Err(source) => {
                return Err(RestartUnavailable::Corrupt {
                    line: number + 1,
                    source,
                });
            }
        };

        match (entry, header.is_some()) {
            (Entry::Header(h), false) if number == 0 => header = Some(h),
            (Entry::Record(record), true) => {
                if let Some(previous) = records.last()
                    && record.index <= previous.index
                {
                    return Err(RestartUnavailable::NonMonotonic {
                        line: number + 1,
                        index: record.index,
                        previous: previous.index,
                    });
                }
                records.push(record);
            }
            _ => return Err(RestartUnavailable::MissingHeader),
        }
    }

    let header = header.ok_or(RestartUnavailable::MissingHeader)?;
    Ok(Log {
        header,
        records,
        truncated,
    })
}
