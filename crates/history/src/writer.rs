use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use skein_core::Signature;
use tracing::debug;

use crate::{
    HistoryError,
    reader::read,
    record::{EntryRef, Header, Record},
};

/// Append-only writer for a JSON Lines history file.
///
/// Each entry is encoded into one buffer and handed to the OS in a single
/// `write_all`, so an interrupted write leaves at most one partial final
/// line, which readers ignore.
#[derive(Debug)]
pub struct HistoryWriter {
    file: File,
    path: PathBuf,
    last_index: Option<u64>,
}

impl HistoryWriter {
    /// Creates (or truncates) `path` and writes the header line.
    ///
    /// Use [`HistoryWriter::append_to`] to keep recording into a file that a
    /// restart was read from.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create(path: impl AsRef<Path>, signature: &Signature) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| HistoryError::Io {
            path: path.clone(),
            source,
        })?;
        let mut writer = Self {
            file,
            path,
            last_index: None,
        };
        writer.write_line(&EntryRef::Header(&Header::new(signature.clone())))?;
        debug!(path = %writer.path.display(), "history file created");
        Ok(writer)
    }

    /// Reopens an existing history file to record a resumed solve.
    ///
    /// The file must have been written for a problem whose signature
    /// matches `signature`. An incomplete final line is cut off first, and
    /// new records continue after the last complete index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read back, its signature does
    /// not match, or it cannot be reopened for writing.
    pub fn append_to(path: impl AsRef<Path>, signature: &Signature) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        let log = read(&path)?;
        if !log.header.signature.matches(signature) {
            return Err(HistoryError::SignatureMismatch { path });
        }

        let io = |source| HistoryError::Io {
            path: path.clone(),
            source,
        };
        let bytes = fs::read(&path).map_err(io)?;
        let end = if log.truncated {
            bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1)
        } else {
            bytes.len()
        };
        let mut file = OpenOptions::new().append(true).open(&path).map_err(io)?;
        file.set_len(end as u64).map_err(io)?;
        if !bytes[..end].ends_with(b"\n") {
            file.write_all(b"\n").map_err(io)?;
        }

        let last_index = log.records.last().map(|r| r.index);
        debug!(
            path = %path.display(),
            records = log.records.len(),
            truncated = log.truncated,
            "history file reopened"
        );
        Ok(Self {
            file,
            path,
            last_index,
        })
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record index does not increase or the write
    /// fails.
    pub fn append(&mut self, record: &Record) -> Result<(), HistoryError> {
        if let Some(last) = self.last_index
            && record.index <= last
        {
            return Err(HistoryError::OutOfOrder {
                index: record.index,
                last,
            });
        }
        self.write_line(&EntryRef::Record(record))?;
        self.last_index = Some(record.index);
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index of the most recently appended record.
    #[must_use]
    pub fn last_index(&self) -> Option<u64> {
        self.last_index
    }

    fn write_line(&mut self, entry: &EntryRef<'_>) -> Result<(), HistoryError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .and_then(|()| self.file.flush())
            .map_err(|source| HistoryError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
