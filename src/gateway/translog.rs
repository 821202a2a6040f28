//! JSON-lines translog
//!
//! One operation per line. Sequence numbers strictly increase; blank lines
//! are ignored. A line that does not parse, or goes backwards, is corrupt.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TRANSLOG_FILE: &str = "translog.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslogOperationKind {
    Index,
    Delete,
}

/// A single write recorded after the last index commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslogOperation {
    pub seq: u64,
    pub op: TranslogOperationKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<serde_json::Value>,
}

impl TranslogOperation {
    pub fn index(seq: u64, id: impl Into<String>, source: serde_json::Value) -> Self {
        Self {
            seq,
            op: TranslogOperationKind::Index,
            id: id.into(),
            source: Some(source),
        }
    }

    pub fn delete(seq: u64, id: impl Into<String>) -> Self {
        Self {
            seq,
            op: TranslogOperationKind::Delete,
            id: id.into(),
            source: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslogReadError {
    #[error("translog read failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed translog operation at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// Streams operations out of a translog file.
pub struct TranslogReader {
    reader: BufReader<File>,
    buf: Vec<u8>,
    line: usize,
    last_seq: Option<u64>,
}

impl TranslogReader {
    /// Opens `path`. `None` when no translog exists.
    pub fn open(path: &Path) -> io::Result<Option<Self>> {
        match File::open(path) {
            Ok(file) => Ok(Some(Self {
                reader: BufReader::new(file),
                buf: Vec::new(),
                line: 0,
                last_seq: None,
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Iterator for TranslogReader {
    type Item = Result<TranslogOperation, TranslogReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line += 1;

            let raw = match std::str::from_utf8(&self.buf) {
                Ok(raw) => raw.trim(),
                Err(e) => {
                    return Some(Err(TranslogReadError::Malformed {
                        line: self.line,
                        message: format!("invalid utf-8: {}", e),
                    }))
                }
            };
            if raw.is_empty() {
                continue;
            }

            let operation: TranslogOperation = match serde_json::from_str(raw) {
                Ok(op) => op,
                Err(e) => {
                    return Some(Err(TranslogReadError::Malformed {
                        line: self.line,
                        message: e.to_string(),
                    }))
                }
            };
            if let Some(last) = self.last_seq {
                if operation.seq <= last {
                    return Some(Err(TranslogReadError::Malformed {
                        line: self.line,
                        message: format!("sequence {} after {}", operation.seq, last),
                    }));
                }
            }
            self.last_seq = Some(operation.seq);
            return Some(Ok(operation));
        }
    }
}

/// Writes operations to a translog file.
pub struct TranslogWriter {
    file: BufWriter<File>,
}

impl TranslogWriter {
    /// Creates (or truncates) the translog at `path`, creating parent dirs.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, operation: &TranslogOperation) -> io::Result<()> {
        serde_json::to_writer(&mut self.file, operation)?;
        self.file.write_all(b"\n")
    }

    /// Flushes buffered lines and fsyncs the file.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_all()
    }
}
