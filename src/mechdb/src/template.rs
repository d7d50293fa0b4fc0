//! Template resolution and overlay merging.
//!
//! A record may name a `Template`: another record whose extracted
//! properties form the base layer under the instance's own. Templates
//! compose transitively and must form a DAG; the in-progress chain is
//! tracked on a stack so a cycle fails fast instead of recursing forever.
//!
//! Merging is a pure function over extracted dictionaries. Neither the
//! instance nor the template record is mutated, and the `Template` link is
//! distinct from `ClassDefaultObject` (which is a pointer to where a
//! record's properties live, not a merge base).

use serde_json::{Map, Value};

use crate::error::{value_type_name, ParseError, Result};
use crate::extract::{extract, is_empty_value, ExtractCtx, KeyMap};
use crate::ingest::Ingest;
use crate::refpath::PathResolver;

/// Extract a record's properties with template inheritance applied.
///
/// The template chain is resolved bottom-up: a template's own template is
/// merged first, then the same key-map extraction runs on the result, and
/// the instance extraction overlays on top. Null and empty values are
/// stripped from the final dictionary.
pub fn merged_properties(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    record: &Value,
    map: &KeyMap,
) -> Result<Map<String, Value>> {
    let empty = Map::new();
    let props = record
        .get("Properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let instance = extract(ing, ctx, props, map)?;

    let template_ref = record
        .get("Template")
        .and_then(PathResolver::reference_string)
        .map(str::to_string);

    let merged = match template_ref {
        Some(reference) => {
            let template = resolve_template(ing, ctx, &reference, map)?;
            merge(&template, &instance)?
        }
        None => instance,
    };

    Ok(strip_empties(merged))
}

fn resolve_template(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    reference: &str,
    map: &KeyMap,
) -> Result<Map<String, Value>> {
    let (path, index) = ing.resolver.to_file_path_and_index(reference)?;
    let template_id = ing.resolver.to_id(reference)?;

    if ing.template_stack.contains(&template_id) {
        return Err(ParseError::TemplateCycle(template_id));
    }

    let record = ing.store.record(&path, index)?;
    ing.template_stack.push(template_id);
    let result = merged_properties(ing, ctx, &record, map);
    ing.template_stack.pop();
    result
}

/// Recursive overlay merge.
///
/// Dict-on-dict recurses; diverging types fail unless one side is null;
/// a null or empty overlay value keeps the base; otherwise the overlay
/// wins. The output is a fresh dictionary.
pub fn merge(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut out = base.clone();

    for (key, over) in overlay {
        let Some(under) = out.get(key) else {
            out.insert(key.clone(), over.clone());
            continue;
        };

        if let (Some(under_map), Some(over_map)) = (under.as_object(), over.as_object()) {
            let merged = merge(under_map, over_map)?;
            out.insert(key.clone(), Value::Object(merged));
            continue;
        }

        if !under.is_null()
            && !over.is_null()
            && std::mem::discriminant(under) != std::mem::discriminant(over)
        {
            return Err(ParseError::TemplateTypeMismatch {
                key: key.clone(),
                base: value_type_name(under),
                overlay: value_type_name(over),
            });
        }

        if !is_empty_value(over) {
            out.insert(key.clone(), over.clone());
        }
    }

    Ok(out)
}

/// Remove null/empty values, cascading: a dict emptied by stripping is
/// itself dropped.
pub fn strip_empties(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        let value = match value {
            Value::Object(inner) => Value::Object(strip_empties(inner)),
            other => other,
        };
        if !is_empty_value(&value) {
            out.insert(key, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn overlay_wins_and_dicts_recurse() {
        let base = obj(json!({"x": {"a": 1, "b": 2}, "y": null}));
        let overlay = obj(json!({"x": {"b": 3, "c": 4}, "z": 5}));
        let merged = strip_empties(merge(&base, &overlay).unwrap());
        assert_eq!(
            Value::Object(merged),
            json!({"x": {"a": 1, "b": 3, "c": 4}, "z": 5})
        );
    }

    #[test]
    fn null_and_empty_overlay_keep_base() {
        let base = obj(json!({"a": 1, "b": [1, 2], "c": "kept"}));
        let overlay = obj(json!({"a": null, "b": [], "c": ""}));
        let merged = merge(&base, &overlay).unwrap();
        assert_eq!(Value::Object(merged), json!({"a": 1, "b": [1, 2], "c": "kept"}));
    }

    #[test]
    fn diverging_types_fail() {
        let base = obj(json!({"a": {"k": 1}}));
        let overlay = obj(json!({"a": [1]}));
        assert!(matches!(
            merge(&base, &overlay),
            Err(ParseError::TemplateTypeMismatch { .. })
        ));
    }

    #[test]
    fn merge_is_associative_over_chains() {
        let a = obj(json!({"x": {"a": 1}, "v": 1}));
        let b = obj(json!({"x": {"b": 2}, "v": 2}));
        let c = obj(json!({"x": {"a": 3}, "w": 9}));

        let left = merge(&merge(&a, &b).unwrap(), &c).unwrap();
        let right = merge(&a, &merge(&b, &c).unwrap()).unwrap();
        assert_eq!(Value::Object(left), Value::Object(right));
    }

    #[test]
    fn reciprocal_templates_fail_with_a_cycle() {
        use crate::extract::Rule;
        use crate::ingest::tests::write_tree;
        use crate::ingest::{Ingest, Options};

        static CYCLE_KEYS: crate::extract::KeyMap =
            crate::extract::KeyMap::with_default(&[], Rule::value().match_key());

        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                (
                    "Root/Content/Items/Base.json",
                    json!([{
                        "Type": "X",
                        "Template": "/Root/Items/Derived.0",
                        "Properties": {"A": 1}
                    }]),
                ),
                (
                    "Root/Content/Items/Derived.json",
                    json!([{
                        "Type": "X",
                        "Template": "/Root/Items/Base.0",
                        "Properties": {"B": 2}
                    }]),
                ),
            ],
        );

        let mut ing = Ingest::new(Options::new(dir.path(), "Root", dir.path().join("out")));
        let ctx = ExtractCtx::new("Derived.0");
        let record = ing
            .store
            .record(&dir.path().join("Root/Content/Items/Derived.json"), 0)
            .unwrap();
        let err = merged_properties(&mut ing, &ctx, &record, &CYCLE_KEYS).unwrap_err();
        assert!(matches!(err, ParseError::TemplateCycle(_)));
    }

    #[test]
    fn strip_cascades_through_emptied_dicts() {
        let map = obj(json!({"keep": 1, "hollow": {"inner": {"gone": null}}, "blank": ""}));
        let stripped = strip_empties(map);
        assert_eq!(Value::Object(stripped), json!({"keep": 1}));
    }
}
