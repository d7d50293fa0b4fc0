//! Curve-value normalization.
//!
//! Engine exports carry full rich-curve structures (tangents, weight
//! modes, extrapolation). The tables only need the key points, so every
//! curve collapses to `{Time, Value, InterpMode}` per key. Fields are
//! still validated against the expected set; an unexpected field means the
//! upstream shape shifted and is logged as drift rather than silently
//! accepted.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::{ParseError, Result};
use crate::extract::ExtractCtx;
use crate::ingest::Ingest;

/// Every field a rich-curve key is allowed to carry.
const CURVE_KEY_FIELDS: &[&str] = &[
    "InterpMode",
    "TangentMode",
    "TangentWeightMode",
    "Time",
    "Value",
    "ArriveTangent",
    "ArriveTangentWeight",
    "LeaveTangent",
    "LeaveTangentWeight",
];

/// Key-map parser for rich-curve properties: collapses the key list to
/// `[{Time, Value, InterpMode}]`.
pub fn rich_curve(
    _ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let keys = curve_keys(ctx.entity, value)?;
    if keys.is_empty() {
        return Ok(None);
    }
    let collapsed: Vec<Value> = keys
        .iter()
        .map(|key| collapse_key(ctx.entity, key))
        .collect::<Result<_>>()?;
    Ok(Some(Value::Array(collapsed)))
}

/// Key-map parser for distance-settings curves (`DistToDamage` and
/// friends): `{InterpMode, CurveData: [{Time, Value}]}` with a single
/// interpolation mode enforced across all points.
pub fn distance_curve(
    _ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let keys = curve_keys(ctx.entity, value)?;
    if keys.is_empty() {
        return Ok(None);
    }

    let mut mode: Option<String> = None;
    let mut points = Vec::with_capacity(keys.len());
    for key in &keys {
        let collapsed = collapse_key(ctx.entity, key)?;
        let point_mode = collapsed
            .get("InterpMode")
            .and_then(Value::as_str)
            .unwrap_or("RCIM_Linear")
            .to_string();
        match &mode {
            None => mode = Some(point_mode),
            Some(existing) if *existing != point_mode => {
                return Err(ParseError::schema(
                    ctx.entity,
                    format!("mixed curve interpolation modes: {existing} vs {point_mode}"),
                ));
            }
            Some(_) => {}
        }
        points.push(json!({
            "Time": collapsed.get("Time").cloned().unwrap_or(json!(0.0)),
            "Value": collapsed.get("Value").cloned().unwrap_or(json!(0.0)),
        }));
    }

    Ok(Some(json!({
        "InterpMode": mode,
        "CurveData": points,
    })))
}

/// Locate the key list inside either `{EditorCurveData: {Keys}}` or a bare
/// `{Keys}` structure. A non-curve value on a curve key is a schema error.
fn curve_keys(entity: &str, value: &Value) -> Result<Vec<Map<String, Value>>> {
    let container = match value.get("EditorCurveData") {
        Some(inner) if !inner.is_null() => inner,
        _ => value,
    };
    let Some(object) = container.as_object() else {
        return Err(ParseError::schema(
            entity,
            format!("expected a curve structure, found {}", crate::error::value_type_name(value)),
        ));
    };

    let keys = match object.get("Keys") {
        Some(Value::Array(keys)) => keys,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            return Err(ParseError::schema(
                entity,
                format!("curve Keys is {}", crate::error::value_type_name(other)),
            ))
        }
    };

    keys.iter()
        .map(|key| {
            key.as_object().cloned().ok_or_else(|| {
                ParseError::schema(entity, "curve key point is not an object".to_string())
            })
        })
        .collect()
}

fn collapse_key(entity: &str, key: &Map<String, Value>) -> Result<Value> {
    for field in key.keys() {
        if !CURVE_KEY_FIELDS.contains(&field.as_str()) {
            warn!(
                entity = %entity,
                key = %field,
                value = %key[field],
                "unexpected curve key field"
            );
        }
    }

    let mut out = Map::new();
    out.insert(
        "Time".to_string(),
        key.get("Time").cloned().unwrap_or(json!(0.0)),
    );
    out.insert(
        "Value".to_string(),
        key.get("Value").cloned().unwrap_or(json!(0.0)),
    );
    if let Some(mode) = key.get("InterpMode") {
        out.insert("InterpMode".to_string(), mode.clone());
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Ingest;

    fn ctx() -> ExtractCtx<'static> {
        ExtractCtx::new("Curve.0")
    }

    #[test]
    fn collapses_rich_curve_keys() {
        let mut ing = Ingest::for_tests();
        let value = json!({
            "EditorCurveData": {
                "Keys": [
                    {"InterpMode": "RCIM_Linear", "TangentMode": "RCTM_Auto",
                     "Time": 0.0, "Value": 1.0, "ArriveTangent": 0.0,
                     "LeaveTangent": 0.0},
                    {"InterpMode": "RCIM_Cubic", "Time": 1.0, "Value": 2.0}
                ]
            }
        });
        let out = rich_curve(&mut ing, &ctx(), &value).unwrap().unwrap();
        assert_eq!(
            out,
            json!([
                {"Time": 0.0, "Value": 1.0, "InterpMode": "RCIM_Linear"},
                {"Time": 1.0, "Value": 2.0, "InterpMode": "RCIM_Cubic"}
            ])
        );
    }

    #[test]
    fn scalar_on_curve_key_is_schema_error() {
        let mut ing = Ingest::for_tests();
        let err = rich_curve(&mut ing, &ctx(), &json!(3.5)).unwrap_err();
        assert!(matches!(err, ParseError::Schema { .. }));
    }

    #[test]
    fn empty_curve_drops_the_entry() {
        let mut ing = Ingest::for_tests();
        let value = json!({"EditorCurveData": {"Keys": []}});
        assert!(rich_curve(&mut ing, &ctx(), &value).unwrap().is_none());
    }

    #[test]
    fn distance_curve_hoists_consistent_mode() {
        let mut ing = Ingest::for_tests();
        let value = json!({
            "Keys": [
                {"InterpMode": "RCIM_Linear", "Time": 0.0, "Value": 100.0},
                {"InterpMode": "RCIM_Linear", "Time": 50.0, "Value": 40.0}
            ]
        });
        let out = distance_curve(&mut ing, &ctx(), &value).unwrap().unwrap();
        assert_eq!(out["InterpMode"], json!("RCIM_Linear"));
        assert_eq!(out["CurveData"][1], json!({"Time": 50.0, "Value": 40.0}));
    }

    #[test]
    fn mixed_modes_are_schema_errors() {
        let mut ing = Ingest::for_tests();
        let value = json!({
            "Keys": [
                {"InterpMode": "RCIM_Linear", "Time": 0.0, "Value": 1.0},
                {"InterpMode": "RCIM_Cubic", "Time": 1.0, "Value": 2.0}
            ]
        });
        assert!(matches!(
            distance_curve(&mut ing, &ctx(), &value),
            Err(ParseError::Schema { .. })
        ));
    }
}
