//! Level-data normalization.
//!
//! Per-level records mostly repeat themselves: a handful of keys change
//! with level, the rest are fixed. Downstream consumers care about "does
//! this change with level?" far more than "what is it at level 1?", so the
//! shape encodes the answer directly: keys identical across all levels
//! collapse into a single `constants` record and the remainder form the
//! per-level `variables` sequence.

use serde_json::{Map, Value};

/// Split per-level records into `{constants, variables}`.
///
/// A key is constant iff every level either omits it or holds the same
/// value as the first level. Either side is omitted from the result when
/// empty.
pub fn normalize_levels(levels: &[Map<String, Value>]) -> Map<String, Value> {
    let mut out = Map::new();
    let Some(first) = levels.first() else {
        return out;
    };

    let mut constant_keys: Vec<&str> = Vec::new();
    for (key, value) in first {
        let constant = levels[1..]
            .iter()
            .all(|level| level.get(key).is_none_or(|v| v == value));
        if constant {
            constant_keys.push(key);
        }
    }

    let mut constants = Map::new();
    for key in &constant_keys {
        constants.insert((*key).to_string(), first[*key].clone());
    }

    let variables: Vec<Value> = levels
        .iter()
        .map(|level| {
            let vars: Map<String, Value> = level
                .iter()
                .filter(|(key, _)| !constant_keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(vars)
        })
        .collect();

    if !constants.is_empty() {
        out.insert("constants".to_string(), Value::Object(constants));
    }
    if variables.iter().any(|v| !v.as_object().is_some_and(Map::is_empty)) {
        out.insert("variables".to_string(), Value::Array(variables));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn levels(values: Value) -> Vec<Map<String, Value>> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn splits_constants_from_variables() {
        let input = levels(json!([
            {"L": 1, "A": 5, "B": 1},
            {"L": 2, "A": 5, "B": 2},
            {"L": 3, "A": 5, "B": 3}
        ]));
        let out = normalize_levels(&input);
        assert_eq!(out["constants"], json!({"A": 5}));
        assert_eq!(
            out["variables"],
            json!([{"L": 1, "B": 1}, {"L": 2, "B": 2}, {"L": 3, "B": 3}])
        );
    }

    #[test]
    fn omitted_keys_count_as_constant() {
        let input = levels(json!([
            {"A": 5, "B": 1},
            {"B": 2},
            {"A": 5, "B": 3}
        ]));
        let out = normalize_levels(&input);
        assert_eq!(out["constants"], json!({"A": 5}));
    }

    #[test]
    fn all_constant_omits_variables() {
        let input = levels(json!([{"A": 1}, {"A": 1}]));
        let out = normalize_levels(&input);
        assert_eq!(out["constants"], json!({"A": 1}));
        assert!(!out.contains_key("variables"));
    }

    #[test]
    fn reconstruction_covers_original_key_set() {
        let input = levels(json!([
            {"L": 1, "A": 5, "B": 1, "C": "x"},
            {"L": 2, "A": 5, "B": 2, "C": "x"}
        ]));
        let out = normalize_levels(&input);
        let constants = out["constants"].as_object().unwrap();
        for (i, level) in input.iter().enumerate() {
            let vars = out["variables"][i].as_object().unwrap();
            for (key, value) in level {
                let reconstructed = vars.get(key).or_else(|| constants.get(key)).unwrap();
                assert_eq!(reconstructed, value);
            }
        }
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(normalize_levels(&[]).is_empty());
    }
}
