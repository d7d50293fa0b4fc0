//! Descriptor file store.
//!
//! Each descriptor file is an ordered JSON array of records. The store
//! parses on first access and caches by path; the cache is append-only for
//! the lifetime of a run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ParseError, Result};

#[derive(Debug, Default)]
pub struct FileStore {
    cache: HashMap<PathBuf, Arc<Vec<Value>>>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or fetch from cache) the full record array of a file.
    pub fn load(&mut self, path: &Path) -> Result<Arc<Vec<Value>>> {
        if let Some(records) = self.cache.get(path) {
            return Ok(Arc::clone(records));
        }

        let raw = fs::read_to_string(path).map_err(|source| ParseError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|e| ParseError::MalformedJson {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let records = match parsed {
            Value::Array(records) => records,
            other => {
                return Err(ParseError::MalformedJson {
                    path: path.to_path_buf(),
                    message: format!(
                        "expected a top-level record array, found {}",
                        crate::error::value_type_name(&other)
                    ),
                })
            }
        };

        let records = Arc::new(records);
        self.cache.insert(path.to_path_buf(), Arc::clone(&records));
        Ok(records)
    }

    /// Fetch a single record by (file, index).
    pub fn record(&mut self, path: &Path, index: usize) -> Result<Value> {
        let records = self.load(path)?;
        records
            .get(index)
            .cloned()
            .ok_or_else(|| ParseError::MalformedJson {
                path: path.to_path_buf(),
                message: format!("record index {index} out of range ({} records)", records.len()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_and_caches_record_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.json", r#"[{"Type":"X"},{"Type":"Y"}]"#);

        let mut store = FileStore::new();
        let first = store.load(&path).unwrap();
        assert_eq!(first.len(), 2);

        // Rewrite on disk; the cache must win.
        write_file(dir.path(), "a.json", "[]");
        let second = store.load(&path).unwrap();
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn record_index_out_of_range_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.json", r#"[{"Type":"X"}]"#);

        let mut store = FileStore::new();
        assert!(store.record(&path, 0).is_ok());
        assert!(matches!(
            store.record(&path, 5),
            Err(ParseError::MalformedJson { .. })
        ));
    }

    #[test]
    fn missing_file_and_bad_json_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new();

        assert!(matches!(
            store.load(&dir.path().join("missing.json")),
            Err(ParseError::FileNotFound { .. })
        ));

        let bad = write_file(dir.path(), "bad.json", "{not json");
        assert!(matches!(store.load(&bad), Err(ParseError::MalformedJson { .. })));

        let object = write_file(dir.path(), "obj.json", r#"{"Type":"X"}"#);
        assert!(matches!(
            store.load(&object),
            Err(ParseError::MalformedJson { .. })
        ));
    }
}
