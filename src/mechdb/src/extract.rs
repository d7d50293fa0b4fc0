//! Declarative field-extraction engine.
//!
//! Every entity parser is, at its core, a key-map: a routing table from
//! property name to parsing action. The engine walks a record's property
//! bag, runs each recognized key through its action, and routes the result
//! either to a top-level attribute or into a nested dictionary path.
//! Properties with no key-map entry emit a warning and are skipped; the
//! warnings are the primary schema-drift detector.
//!
//! Extraction is side-effect free with respect to the entity: it returns a
//! fresh dictionary, which lets the template merger run the same key-map
//! against templated records before overlaying.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ParseError, Result};
use crate::ingest::Ingest;

/// Context threaded through parser callbacks, mostly for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ExtractCtx<'a> {
    /// Id of the entity being populated.
    pub entity: &'a str,
}

impl<'a> ExtractCtx<'a> {
    pub fn new(entity: &'a str) -> Self {
        Self { entity }
    }
}

/// Parser callback: raw property value in, extracted value out.
///
/// Returning `Ok(None)` (or a null/empty value) drops the entry.
pub type ParserFn = fn(&mut Ingest, &ExtractCtx<'_>, &Value) -> Result<Option<Value>>;

/// How a rule obtains its value.
#[derive(Clone, Copy)]
pub enum Parse {
    /// Adopt the raw value verbatim.
    Verbatim,
    /// Invoke the callback and use its return.
    With(ParserFn),
}

/// Where the extracted value lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Top-level attribute on the entity.
    Attribute,
    /// Slot inside a nested dictionary named by `Rule::dict_path`.
    DictEntry,
}

/// How the output key is named.
#[derive(Debug, Clone, Copy)]
pub enum Target {
    /// Keep the original property name.
    MatchKey,
    /// snake_case the property name (underscores and `[n]` stripped first).
    MatchKeySnake,
    /// Explicit output name.
    Named(&'static str),
}

/// Canonical key-map entry configuration.
#[derive(Clone, Copy)]
pub struct Rule {
    pub parse: Parse,
    pub route: Route,
    pub dict_path: Option<&'static str>,
    pub target: Target,
}

impl Rule {
    /// Verbatim value into a snake_cased attribute.
    pub const fn value() -> Self {
        Self {
            parse: Parse::Verbatim,
            route: Route::Attribute,
            dict_path: None,
            target: Target::MatchKeySnake,
        }
    }

    /// Parsed value into a snake_cased attribute.
    pub const fn with(parser: ParserFn) -> Self {
        Self {
            parse: Parse::With(parser),
            ..Self::value()
        }
    }

    /// Route into a nested dictionary (dot-separated path).
    pub const fn dict(self, path: &'static str) -> Self {
        Self {
            route: Route::DictEntry,
            dict_path: Some(path),
            ..self
        }
    }

    /// Name the output key explicitly.
    pub const fn named(self, name: &'static str) -> Self {
        Self {
            target: Target::Named(name),
            ..self
        }
    }

    /// Keep the source property name untouched.
    pub const fn match_key(self) -> Self {
        Self {
            target: Target::MatchKey,
            ..self
        }
    }
}

/// One key-map entry; the shortcut forms normalize against the map's
/// default rule.
#[derive(Clone, Copy)]
pub enum KeyAction {
    /// Recognized but deliberately discarded.
    Drop,
    /// Shortcut: verbatim value, default routing.
    Value,
    /// Shortcut: parsed value, default routing.
    With(ParserFn),
    /// Full configuration.
    Rule(Rule),
}

/// Declarative routing table for one record shape.
pub struct KeyMap {
    entries: &'static [(&'static str, KeyAction)],
    default_rule: Rule,
}

impl KeyMap {
    pub const fn new(entries: &'static [(&'static str, KeyAction)]) -> Self {
        Self {
            entries,
            default_rule: Rule::value(),
        }
    }

    /// Supply the default configuration applied to shortcut entries.
    pub const fn with_default(
        entries: &'static [(&'static str, KeyAction)],
        default_rule: Rule,
    ) -> Self {
        Self {
            entries,
            default_rule,
        }
    }

    fn lookup(&self, key: &str) -> Option<&KeyAction> {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, action)| action)
    }

    fn resolve(&self, action: &KeyAction) -> Option<Rule> {
        match action {
            KeyAction::Drop => None,
            KeyAction::Value => Some(self.default_rule),
            KeyAction::With(parser) => Some(Rule {
                parse: Parse::With(*parser),
                ..self.default_rule
            }),
            KeyAction::Rule(rule) => Some(*rule),
        }
    }
}

/// Run a key-map over a property bag, returning the extracted dictionary.
pub fn extract(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    props: &Map<String, Value>,
    map: &KeyMap,
) -> Result<Map<String, Value>> {
    let mut out = Map::new();

    for (key, raw) in props {
        let base = strip_array_suffix(key);
        let action = map.lookup(key).or_else(|| map.lookup(base));
        let Some(action) = action else {
            warn!(
                entity = %ctx.entity,
                key = %key,
                value = %raw,
                "unhandled property key"
            );
            continue;
        };
        let Some(rule) = map.resolve(action) else {
            continue; // Drop
        };

        let value = match rule.parse {
            Parse::Verbatim => Some(raw.clone()),
            Parse::With(parser) => parser(ing, ctx, raw)?,
        };
        let Some(value) = value else { continue };
        if is_empty_value(&value) {
            continue;
        }

        let name = match rule.target {
            Target::MatchKey => key.clone(),
            Target::MatchKeySnake => snake_case(base),
            Target::Named(name) => name.to_string(),
        };

        match rule.route {
            Route::Attribute => {
                out.insert(name, value);
            }
            Route::DictEntry => {
                let path = rule.dict_path.ok_or_else(|| {
                    ParseError::schema(ctx.entity, format!("DICT_ENTRY for {key} has no target_dict_path"))
                })?;
                insert_at_path(&mut out, path, name, value)
                    .map_err(|msg| ParseError::schema(ctx.entity, msg))?;
            }
        }
    }

    Ok(out)
}

/// Walk a dot-separated path, creating intermediate maps, and insert the
/// value under the final key.
fn insert_at_path(
    out: &mut Map<String, Value>,
    path: &str,
    key: String,
    value: Value,
) -> std::result::Result<(), String> {
    let mut cursor = out;
    for segment in path.split('.') {
        let slot = cursor
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        cursor = slot
            .as_object_mut()
            .ok_or_else(|| format!("dict path {path} collides with a non-dict value at {segment}"))?;
    }
    cursor.insert(key, value);
    Ok(())
}

/// Null, empty string, empty list, or empty dict.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Strip a trailing `[n]` array-index suffix.
pub fn strip_array_suffix(key: &str) -> &str {
    if let Some(open) = key.rfind('[') {
        if key.ends_with(']') && key[open + 1..key.len() - 1].chars().all(|c| c.is_ascii_digit()) {
            return &key[..open];
        }
    }
    key
}

/// Property-name snake_casing: existing underscores are stripped before
/// conversion so `b_Flag` and `bFlag` land on the same attribute.
pub fn snake_case(key: &str) -> String {
    let cleaned: Vec<char> = strip_array_suffix(key)
        .chars()
        .filter(|c| *c != '_')
        .collect();

    let mut out = String::with_capacity(cleaned.len() + 4);
    for (i, &c) in cleaned.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|j| cleaned[j]);
            let next = cleaned.get(i + 1);
            let after_lower = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            let acronym_end =
                prev.is_some_and(char::is_uppercase) && next.is_some_and(|n| n.is_lowercase());
            if i > 0 && (after_lower || acronym_end) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Ingest;
    use serde_json::json;

    fn parse_double(_: &mut Ingest, _: &ExtractCtx<'_>, v: &Value) -> Result<Option<Value>> {
        Ok(v.as_f64().map(|n| json!(n * 2.0)))
    }

    fn parse_none(_: &mut Ingest, _: &ExtractCtx<'_>, _: &Value) -> Result<Option<Value>> {
        Ok(None)
    }

    static MAP: KeyMap = KeyMap::new(&[
        ("Title", KeyAction::Rule(Rule::value().named("name"))),
        ("MaxSpeed", KeyAction::Value),
        ("Doubled", KeyAction::With(parse_double)),
        ("Gone", KeyAction::With(parse_none)),
        ("Internal", KeyAction::Drop),
        (
            "Flavor",
            KeyAction::Rule(Rule::value().dict("misc").match_key()),
        ),
        (
            "Deep",
            KeyAction::Rule(Rule::value().dict("a.b").named("leaf")),
        ),
    ]);

    fn run(props: Value) -> Map<String, Value> {
        let mut ing = Ingest::for_tests();
        let ctx = ExtractCtx::new("T.0");
        extract(
            &mut ing,
            &ctx,
            props.as_object().unwrap(),
            &MAP,
        )
        .unwrap()
    }

    #[test]
    fn routes_attributes_and_dict_entries() {
        let out = run(json!({
            "Title": "hi",
            "MaxSpeed": 40,
            "Doubled": 2.5,
            "Gone": 1,
            "Internal": "x",
            "Flavor": "text",
            "Deep": true,
            "Mystery": 9
        }));

        assert_eq!(out["name"], json!("hi"));
        assert_eq!(out["max_speed"], json!(40));
        assert_eq!(out["doubled"], json!(5.0));
        assert!(!out.contains_key("gone"));
        assert!(!out.contains_key("internal"));
        assert_eq!(out["misc"]["Flavor"], json!("text"));
        assert_eq!(out["a"]["b"]["leaf"], json!(true));
        assert!(!out.contains_key("mystery"));
    }

    #[test]
    fn empty_results_are_dropped() {
        let out = run(json!({"Title": "", "MaxSpeed": null}));
        assert!(out.is_empty());
    }

    #[test]
    fn array_index_suffix_matches_base_key() {
        let out = run(json!({"MaxSpeed[2]": 7}));
        assert_eq!(out["max_speed"], json!(7));
    }

    #[test]
    fn snake_case_conversion() {
        assert_eq!(snake_case("PrimaryParameter"), "primary_parameter");
        assert_eq!(snake_case("bIsPerk"), "b_is_perk");
        assert_eq!(snake_case("UIName"), "ui_name");
        assert_eq!(snake_case("Max_HP"), "max_hp");
        assert_eq!(snake_case("Damage[3]"), "damage");
        assert_eq!(snake_case("already"), "already");
    }

    #[test]
    fn strip_array_suffix_only_for_digits() {
        assert_eq!(strip_array_suffix("Key[12]"), "Key");
        assert_eq!(strip_array_suffix("Key[ab]"), "Key[ab]");
        assert_eq!(strip_array_suffix("Key"), "Key");
    }
}
