//! Append-only JSONL artifacts.
//!
//! One `serde_json`-encoded line per event, opened in append mode, written
//! through blocking `std::fs`/`std::io::Write` rather than an async writer:
//! the bus's synchronous subscribers run inline during `publish` and cannot
//! `.await`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use crate::error::WriterError;

pub struct JsonlAppender {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAppender {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WriterError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| WriterError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| WriterError::OpenAppend {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes `value` to one JSON line and appends it, flushing
    /// immediately so a crash mid-run never loses a fully-written line.
    pub fn append<T: Serialize>(&self, value: &T) -> Result<(), WriterError> {
        let mut line = serde_json::to_string(value).map_err(|source| WriterError::Serialize {
            artifact: self.path.display().to_string(),
            source,
        })?;
        line.push('\n');

        let mut file = self.file.lock().expect("jsonl appender mutex poisoned");
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|source| WriterError::OpenAppend {
                path: self.path.display().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appended_lines_are_readable_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("log.jsonl");
        let appender = JsonlAppender::open(&path).unwrap();
        appender.append(&json!({"n": 1})).unwrap();
        appender.append(&json!({"n": 2})).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(serde_json::from_str::<serde_json::Value>(lines[0]).unwrap()["n"], 1);
        assert_eq!(serde_json::from_str::<serde_json::Value>(lines[1]).unwrap()["n"], 2);
    }

    #[test]
    fn reopening_an_existing_file_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        JsonlAppender::open(&path).unwrap().append(&json!({"n": 1})).unwrap();
        JsonlAppender::open(&path).unwrap().append(&json!({"n": 2})).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }
}
