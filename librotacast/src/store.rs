//! Durable JSON documents with atomic replace-on-write
//!
//! Both persisted state documents (dedup history and media usage) go through
//! here. Writes land in a sibling temp file which is synced and then renamed
//! over the target, so a reader never observes a truncated document.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Read a JSON document, returning `Ok(None)` when the file does not exist.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    // An empty file is what an interrupted non-atomic writer leaves behind
    if content.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StorageError::Parse {
            path: path.display().to_string(),
            source,
        })
}

/// Serialize `value` and atomically replace the document at `path`.
///
/// Creates parent directories if needed. Returns only after the data has been
/// flushed to disk and the rename has completed.
pub fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let write_err = |source: std::io::Error| StorageError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let json = serde_json::to_vec_pretty(value)?;
    let temp_path = temp_path_for(path);

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }

    sync_parent_dir(path);
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Make the rename itself durable. Best effort.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_document_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.json");

        let doc: Option<Vec<String>> = read_document(&path).unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("doc.json");

        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1u32);
        write_document(&path, &value).unwrap();

        let loaded: BTreeMap<String, u32> = read_document(&path).unwrap().unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");

        write_document(&path, &vec!["x"]).unwrap();
        write_document(&path, &vec!["y"]).unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["doc.json".to_string()]);

        let loaded: Vec<String> = read_document(&path).unwrap().unwrap();
        assert_eq!(loaded, vec!["y".to_string()]);
    }

    #[test]
    fn test_corrupt_document_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<Option<Vec<String>>, _> = read_document(&path);
        assert!(matches!(result, Err(StorageError::Parse { .. })));
    }

    #[test]
    fn test_empty_document_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");
        fs::write(&path, "  \n").unwrap();

        let doc: Option<Vec<String>> = read_document(&path).unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let path = Path::new("/var/lib/rotacast/history.json");
        assert_eq!(
            temp_path_for(path),
            PathBuf::from("/var/lib/rotacast/history.json.tmp")
        );
    }
}
