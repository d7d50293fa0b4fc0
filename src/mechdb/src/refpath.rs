//! Asset reference decoding.
//!
//! The export tree uses two path conventions interchangeably: bare virtual
//! paths (`/Root/A/B/Name.Suffix`) and wrapped class references
//! (`Kind'/Root/A/B/Name.Suffix'`). Some properties arrive pre-decoded as
//! `{ObjectPath: ...}` or `{AssetPathName: ...}` mappings. This module
//! collapses all of them into a uniform (file, index) view so downstream
//! parsers treat every cross-reference identically.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{ParseError, Result};

/// Maps opaque asset references onto the dumped JSON tree.
#[derive(Debug, Clone)]
pub struct PathResolver {
    export_root: PathBuf,
    game_name: String,
}

impl PathResolver {
    pub fn new(export_root: impl Into<PathBuf>, game_name: impl Into<String>) -> Self {
        Self {
            export_root: export_root.into(),
            game_name: game_name.into(),
        }
    }

    /// Pull the reference string out of a raw property value.
    ///
    /// Accepts plain strings and the pre-decoded `{ObjectPath}` /
    /// `{AssetPathName}` mapping shapes. Returns `None` for nulls and for
    /// `"None"`, which the engine emits for empty references.
    pub fn reference_string(value: &Value) -> Option<&str> {
        let raw = match value {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map
                .get("ObjectPath")
                .or_else(|| map.get("AssetPathName"))
                .and_then(Value::as_str)?,
            _ => return None,
        };
        if raw.is_empty() || raw == "None" {
            None
        } else {
            Some(raw)
        }
    }

    /// A reference without path separators names an entity directly
    /// rather than a record in a file. Bare tokens such as `C1` carry no
    /// index and have no descriptor to resolve; the token is the id.
    pub fn is_opaque(reference: &str) -> bool {
        let inner = unwrap_reference(reference);
        !inner.contains('/') && !inner.contains('\\')
    }

    /// Resolve a reference to the JSON file that holds its records.
    pub fn to_file_path(&self, reference: &str) -> PathBuf {
        let inner = unwrap_reference(reference);
        let normalized = inner.replace('\\', "/");
        let trimmed = normalized.trim_start_matches('/');

        // Drop the virtual root segment; the physical tree replaces it
        // with <export-root>/<game>/Content/.
        let mut segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() > 1 {
            segments.remove(0);
        }

        let mut path = self.export_root.join(&self.game_name).join("Content");
        if let Some((last, dirs)) = segments.split_last() {
            for dir in dirs {
                path.push(dir);
            }
            let stem = match last.rsplit_once('.') {
                Some((stem, _suffix)) => stem,
                None => last,
            };
            path.push(format!("{stem}.json"));
        }
        path
    }

    /// Resolve a reference to its file plus the numeric sub-index of the
    /// record inside that file's array.
    ///
    /// A digit suffix is the index; a name suffix means index 0; an empty
    /// suffix is malformed.
    pub fn to_file_path_and_index(&self, reference: &str) -> Result<(PathBuf, usize)> {
        let index = reference_index(reference)?;
        Ok((self.to_file_path(reference), index))
    }

    /// Derive the stable entity id `<filename-stem>.<index>`.
    pub fn to_id(&self, reference: &str) -> Result<String> {
        let (path, index) = self.to_file_path_and_index(reference)?;
        let stem = file_stem(&path).ok_or_else(|| ParseError::MalformedReference {
            reference: reference.to_string(),
            message: "reference has no filename".to_string(),
        })?;
        Ok(format!("{stem}.{index}"))
    }
}

/// Strip the `Kind'...'` wrapper. Anything other than exactly two single
/// quotes is passed through untouched.
fn unwrap_reference(reference: &str) -> &str {
    if reference.matches('\'').count() == 2 {
        let open = reference.find('\'').unwrap_or(0);
        let close = reference.rfind('\'').unwrap_or(reference.len());
        if close > open + 1 {
            return &reference[open + 1..close];
        }
    }
    reference
}

fn reference_index(reference: &str) -> Result<usize> {
    let inner = unwrap_reference(reference);
    let normalized = inner.replace('\\', "/");
    let last = normalized
        .rsplit('/')
        .next()
        .unwrap_or(normalized.as_str());

    let (_, suffix) = last.rsplit_once('.').ok_or_else(|| ParseError::MalformedReference {
        reference: reference.to_string(),
        message: "missing `.suffix` segment".to_string(),
    })?;
    if suffix.is_empty() {
        return Err(ParseError::MalformedReference {
            reference: reference.to_string(),
            message: "empty suffix".to_string(),
        });
    }
    if suffix.chars().all(|c| c.is_ascii_digit()) {
        suffix.parse().map_err(|_| ParseError::MalformedReference {
            reference: reference.to_string(),
            message: "index out of range".to_string(),
        })
    } else {
        Ok(0)
    }
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> PathResolver {
        PathResolver::new("/export", "Root")
    }

    #[test]
    fn wrapped_reference_resolves_to_file_and_index() {
        let r = resolver();
        let (path, index) = r.to_file_path_and_index("Thing'/Root/A/B/X.X'").unwrap();
        assert_eq!(path, PathBuf::from("/export/Root/Content/A/B/X.json"));
        assert_eq!(index, 0);
        assert_eq!(r.to_id("Thing'/Root/A/B/X.X'").unwrap(), "X.0");
    }

    #[test]
    fn digit_suffix_becomes_index() {
        let r = resolver();
        let (path, index) = r.to_file_path_and_index("/Root/Items/Item.3").unwrap();
        assert_eq!(path, PathBuf::from("/export/Root/Content/Items/Item.json"));
        assert_eq!(index, 3);
        assert_eq!(r.to_id("/Root/Items/Item.3").unwrap(), "Item.3");
    }

    #[test]
    fn empty_suffix_is_malformed() {
        let err = resolver().to_file_path_and_index("/Root/Items/Item.").unwrap_err();
        assert!(matches!(err, ParseError::MalformedReference { .. }));
    }

    #[test]
    fn missing_suffix_is_malformed() {
        let err = resolver().to_file_path_and_index("/Root/Items/Item").unwrap_err();
        assert!(matches!(err, ParseError::MalformedReference { .. }));
    }

    #[test]
    fn bare_tokens_are_opaque() {
        assert!(PathResolver::is_opaque("C1"));
        assert!(PathResolver::is_opaque("Epic"));
        assert!(!PathResolver::is_opaque("/Root/Currency/C1.0"));
        assert!(!PathResolver::is_opaque("Thing'/Root/A/B/X.X'"));
        assert!(!PathResolver::is_opaque(r"\Root\A\X.2"));
    }

    #[test]
    fn unbalanced_quotes_use_raw_input() {
        // Three quotes: not the wrapped form, taken verbatim.
        let path = resolver().to_file_path("Od'd'/Root/A/B.B'");
        assert!(path.to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn backslash_separators_are_normalized() {
        let r = resolver();
        let (path, _) = r.to_file_path_and_index(r"\Root\A\X.2").unwrap();
        assert_eq!(path, PathBuf::from("/export/Root/Content/A/X.json"));
    }

    #[test]
    fn object_path_mapping_is_unwrapped() {
        let v = json!({"ObjectPath": "/Root/A/B/X.0"});
        assert_eq!(PathResolver::reference_string(&v), Some("/Root/A/B/X.0"));
        let v = json!({"AssetPathName": "/Root/A/B/X.X"});
        assert_eq!(PathResolver::reference_string(&v), Some("/Root/A/B/X.X"));
        assert_eq!(PathResolver::reference_string(&json!("None")), None);
        assert_eq!(PathResolver::reference_string(&Value::Null), None);
    }

    #[test]
    fn re_resolving_an_id_is_stable() {
        let r = resolver();
        let id = r.to_id("/Root/Items/Item.3").unwrap();
        let back = r.to_file_path_and_index(&format!("/Root/Items/{id}")).unwrap();
        assert_eq!(back.1, 3);
        assert!(back.0.ends_with("Items/Item.json"));
    }
}
