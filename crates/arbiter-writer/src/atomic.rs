//! Atomic JSON artifact writes.
//!
//! `tempfile::NamedTempFile::new_in` the target directory, write, flush,
//! then `persist` (rename) over the destination, so a reader never observes
//! a partially written file.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::WriterError;

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), WriterError> {
    let artifact = path.display().to_string();
    let body = serde_json::to_vec_pretty(value).map_err(|source| WriterError::Serialize {
        artifact: artifact.clone(),
        source,
    })?;
    write_bytes_atomic(path, &body)
}

pub fn write_bytes_atomic(path: &Path, body: &[u8]) -> Result<(), WriterError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|source| WriterError::CreateDir {
        path: parent.display().to_string(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|source| WriterError::AtomicWrite {
        path: path.display().to_string(),
        source,
    })?;
    tmp.write_all(body)
        .and_then(|_| tmp.flush())
        .map_err(|source| WriterError::AtomicWrite {
            path: path.display().to_string(),
            source,
        })?;
    tmp.persist(path)
        .map_err(|e| WriterError::AtomicWrite {
            path: path.display().to_string(),
            source: e.error,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn atomic_write_creates_parent_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("manifest.json");
        write_json_atomic(&path, &json!({"ok": true})).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["ok"], true);
    }

    #[test]
    fn atomic_write_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_json_atomic(&path, &json!({"v": 1})).unwrap();
        write_json_atomic(&path, &json!({"v": 2})).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["v"], 2);
    }
}
