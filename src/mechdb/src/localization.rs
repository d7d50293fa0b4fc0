//! String-table loading and text resolution.
//!
//! Localization files are descriptor files whose records carry a
//! `StringTable` payload instead of `Properties`. Each language loads once
//! into namespace → key → string maps and is read-only afterwards.
//!
//! Text-valued properties arrive in a few shapes: plain strings, inline
//! `{Namespace, Key, SourceString}` structures, culture-invariant
//! wrappers, and `{TableId, Key}` references into a loaded table.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::Result;
use crate::extract::ExtractCtx;
use crate::ingest::Ingest;
use crate::store::FileStore;

type NamespaceTables = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Default)]
pub struct Localization {
    /// language code → namespace → key → string
    languages: HashMap<String, NamespaceTables>,
    default_language: String,
}

impl Localization {
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            languages: HashMap::new(),
            default_language: default_language.into(),
        }
    }

    /// Walk a language directory and ingest every string-table record.
    pub fn load_language(
        &mut self,
        store: &mut FileStore,
        language: &str,
        dir: &Path,
    ) -> Result<()> {
        let tables = self.languages.entry(language.to_string()).or_default();
        if !dir.is_dir() {
            return Ok(());
        }

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| crate::error::ParseError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let records = store.load(entry.path())?;
            for record in records.iter() {
                ingest_record(tables, record);
            }
        }
        Ok(())
    }

    /// Look a key up in the default language.
    pub fn lookup(&self, namespace: &str, key: &str) -> Option<&str> {
        self.languages
            .get(&self.default_language)?
            .get(namespace)?
            .get(key)
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.languages.values().all(HashMap::is_empty)
    }
}

fn ingest_record(tables: &mut NamespaceTables, record: &Value) {
    let Some(table) = record.get("StringTable").and_then(Value::as_object) else {
        return;
    };
    let namespace = table
        .get("TableNamespace")
        .and_then(Value::as_str)
        .or_else(|| record.get("Name").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let entries = tables.entry(namespace).or_default();
    if let Some(strings) = table.get("KeysToEntries").and_then(Value::as_object) {
        for (key, value) in strings {
            if let Some(text) = value.as_str() {
                entries.insert(key.clone(), text.to_string());
            }
        }
    }
}

/// Key-map parser for text-valued properties.
pub fn text(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    Ok(resolve_text(ing, ctx, value).map(Value::String))
}

fn resolve_text(ing: &Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => {
            if let Some(invariant) = map.get("CultureInvariantString").and_then(Value::as_str) {
                return Some(invariant.to_string());
            }

            let key = map.get("Key").and_then(Value::as_str)?;

            if let Some(table_id) = map.get("TableId").and_then(Value::as_str) {
                let namespace = table_namespace(table_id);
                if let Some(found) = ing.localization.lookup(namespace, key) {
                    return Some(found.to_string());
                }
                warn!(
                    entity = %ctx.entity,
                    key = %key,
                    value = %table_id,
                    "string-table key not found"
                );
            }

            let namespace = map.get("Namespace").and_then(Value::as_str).unwrap_or("");
            if let Some(found) = ing.localization.lookup(namespace, key) {
                return Some(found.to_string());
            }
            map.get("SourceString")
                .or_else(|| map.get("LocalizedString"))
                .and_then(Value::as_str)
                .map(str::to_string)
        }
        _ => None,
    }
}

/// `/Root/.../ST_Modules.ST_Modules` → `ST_Modules`.
fn table_namespace(table_id: &str) -> &str {
    table_id
        .rsplit(['.', '/'])
        .next()
        .unwrap_or(table_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ingests_string_table_records() {
        let mut tables = NamespaceTables::new();
        ingest_record(
            &mut tables,
            &json!({
                "Type": "StringTable",
                "Name": "ST_Modules",
                "StringTable": {
                    "TableNamespace": "ST_Modules",
                    "KeysToEntries": {"mod.name": "Pulse Cannon"}
                }
            }),
        );
        assert_eq!(tables["ST_Modules"]["mod.name"], "Pulse Cannon");
    }

    #[test]
    fn text_resolution_prefers_tables_then_source_string() {
        let mut ing = Ingest::for_tests();
        let ctx = ExtractCtx::new("M.0");

        let inline = json!({"Namespace": "", "Key": "k", "SourceString": "fallback"});
        assert_eq!(
            text(&mut ing, &ctx, &inline).unwrap(),
            Some(Value::String("fallback".into()))
        );

        let plain = json!("already text");
        assert_eq!(
            text(&mut ing, &ctx, &plain).unwrap(),
            Some(Value::String("already text".into()))
        );

        assert_eq!(text(&mut ing, &ctx, &json!(null)).unwrap(), None);
    }

    #[test]
    fn table_id_reference_resolves_through_loaded_table() {
        let mut ing = Ingest::for_tests();
        let tables = ing
            .localization
            .languages
            .entry("en".to_string())
            .or_default();
        tables
            .entry("ST_Modules".to_string())
            .or_default()
            .insert("mod.name".to_string(), "Pulse Cannon".to_string());

        let ctx = ExtractCtx::new("M.0");
        let reference = json!({"TableId": "/Root/Loc/ST_Modules.ST_Modules", "Key": "mod.name"});
        assert_eq!(
            text(&mut ing, &ctx, &reference).unwrap(),
            Some(Value::String("Pulse Cannon".into()))
        );
    }

    #[test]
    fn namespace_from_table_id() {
        assert_eq!(table_namespace("/Root/Loc/ST_X.ST_X"), "ST_X");
        assert_eq!(table_namespace("ST_Y"), "ST_Y");
    }
}
