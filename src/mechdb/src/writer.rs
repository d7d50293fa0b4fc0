//! Table serialization.
//!
//! One JSON document per registry plus the `Analysis.json` and
//! `Image.json` sidecars. Output is deterministic: top-level keys arrive
//! sorted from the registries, nested order is insertion order, indent is
//! four spaces, and non-ASCII text is written as UTF-8 rather than
//! escaped. Each file goes to a temp path first and is renamed into
//! place, so an interrupted run leaves the old file or a complete new
//! one, never a torn write.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use tracing::info;

use crate::analysis::Analysis;
use crate::error::{ParseError, Result};
use crate::ingest::Ingest;

/// Flush every table of a completed ingest.
pub fn write_all(ing: &Ingest, analysis: &Analysis) -> Result<()> {
    let out = &ing.options().output_dir;
    fs::create_dir_all(out).map_err(|source| ParseError::Io {
        path: out.clone(),
        source,
    })?;

    for registry in ing.registries.iter() {
        let name = format!("{}.json", registry.kind().table_name());
        write_json(&out.join(name), &Value::Object(registry.to_table()))?;
    }

    write_json(&out.join("Analysis.json"), &analysis.to_value())?;

    let images: Vec<Value> = ing
        .images
        .iter()
        .map(|path| Value::String(path.clone()))
        .collect();
    write_json(&out.join("Image.json"), &Value::Array(images))?;

    info!(dir = %out.display(), "tables written");
    Ok(())
}

/// Pretty-print with a four-space indent and write through a temp file.
pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    let io_err = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| io_err(e.into()))?;
    buf.push(b'\n');

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &buf).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
