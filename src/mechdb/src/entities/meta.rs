//! Parsers for the small lookup kinds: rarity, tags, classes, stats,
//! types, sockets, factions, movement types, and currencies.
//!
//! These differ only in their key-maps; the shapes are flat enough that
//! none of them needs a post-pass. The module-stat parser is the one with
//! a wrinkle: its back-link to module types is stored shallow (id only,
//! no interning) because the type parser is what reaches stats in the
//! first place.

use serde_json::Value;
use tracing::warn;

use crate::entities::{
    self, module_class_ref, module_stat_ref_list, socket_type_ref_list, store_attrs,
};
use crate::error::Result;
use crate::extract::{ExtractCtx, KeyAction, KeyMap, Rule};
use crate::ingest::Ingest;
use crate::localization::text;
use crate::registry::EntityKind;
use crate::template::merged_properties;

static RARITY_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("RarityLevel", KeyAction::Value),
    ("Color", KeyAction::Value),
    ("SortOrder", KeyAction::Value),
]);

static MODULE_STAT_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("Units", KeyAction::Value),
    ("UnitExponent", KeyAction::Value),
    ("bMoreIsBetter", KeyAction::Rule(Rule::value().named("more_is_better"))),
    ("Icon", KeyAction::With(entities::image)),
    // Back-reference into module types; interning here would recurse
    // into the parser that is pulling this stat.
    ("RelatedModuleTypes", KeyAction::With(related_types_shallow)),
]);

static MODULE_TYPE_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("Category", KeyAction::With(module_class_ref)),
    ("SortOrder", KeyAction::Value),
    ("Icon", KeyAction::With(entities::image)),
]);

static MODULE_CLASS_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("Stats", KeyAction::With(module_stat_ref_list)),
    ("SortOrder", KeyAction::Value),
]);

static SOCKET_TYPE_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Size", KeyAction::Value),
    ("bIsUniversal", KeyAction::Value),
    ("CompatibleSockets", KeyAction::With(socket_type_ref_list)),
]);

static FACTION_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("Icon", KeyAction::With(entities::image)),
    ("SortOrder", KeyAction::Value),
]);

static TAG_KEYS: KeyMap = KeyMap::new(&[
    ("TagName", KeyAction::Rule(Rule::value().named("name"))),
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("SortOrder", KeyAction::Value),
    ("bHidden", KeyAction::Value),
]);

static MOVEMENT_TYPE_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("MaxSpeed", KeyAction::Value),
    ("Acceleration", KeyAction::Value),
    ("TurnRate", KeyAction::Value),
    ("StrafeSpeedFactor", KeyAction::Value),
    ("bCanDash", KeyAction::Value),
    ("DashDistance", KeyAction::Value),
    ("DashCooldown", KeyAction::Value),
]);

static CURRENCY_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Icon", KeyAction::With(entities::image)),
    ("bPremium", KeyAction::Value),
    ("SortOrder", KeyAction::Value),
]);

fn key_map_for(kind: EntityKind) -> Option<&'static KeyMap> {
    match kind {
        EntityKind::Rarity => Some(&RARITY_KEYS),
        EntityKind::ModuleStat => Some(&MODULE_STAT_KEYS),
        EntityKind::ModuleType => Some(&MODULE_TYPE_KEYS),
        EntityKind::ModuleClass => Some(&MODULE_CLASS_KEYS),
        EntityKind::SocketType => Some(&SOCKET_TYPE_KEYS),
        EntityKind::Faction => Some(&FACTION_KEYS),
        EntityKind::Tag => Some(&TAG_KEYS),
        EntityKind::MovementType => Some(&MOVEMENT_TYPE_KEYS),
        EntityKind::Currency => Some(&CURRENCY_KEYS),
        _ => None,
    }
}

pub fn parse(ing: &mut Ingest, kind: EntityKind, id: &str, record: &Value) -> Result<()> {
    let Some(map) = key_map_for(kind) else {
        warn!(kind = kind.table_name(), id = %id, "no key-map for kind");
        return Ok(());
    };
    let ctx = ExtractCtx::new(id);
    let attrs = merged_properties(ing, &ctx, record, map)?;
    store_attrs(ing, kind, id, attrs);
    Ok(())
}

fn related_types_shallow(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(entity = %ctx.entity, key = "RelatedModuleTypes", value = %value, "expected a list");
        return Ok(None);
    };
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        if let Some(id) = entities::shallow_ref(ing, item)? {
            ids.push(id);
        }
    }
    Ok(Some(Value::Array(ids)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::write_tree;
    use crate::ingest::Options;
    use crate::registry::EntityKind;
    use serde_json::json;

    #[test]
    fn stat_parser_stores_type_backlinks_shallow() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[(
                "Root/Content/Stats/D_Damage.json",
                json!([{
                    "Type": "ModuleStat",
                    "Properties": {
                        "Title": "Damage",
                        "UnitExponent": 0,
                        "bMoreIsBetter": true,
                        "RelatedModuleTypes": ["/Root/Types/MT_Heavy.0"]
                    }
                }]),
            )],
        );
        let mut ing = Ingest::new(Options::new(dir.path(), "Root", dir.path().join("out")));
        let id = ing
            .create_from_reference(EntityKind::ModuleStat, "/Root/Stats/D_Damage.0")
            .unwrap();

        let stat = ing.registries.get(EntityKind::ModuleStat).get(&id).unwrap();
        assert_eq!(stat.attrs["name"], json!("Damage"));
        assert_eq!(stat.attrs["more_is_better"], json!(true));
        assert_eq!(stat.attrs["related_module_types"], json!(["MT_Heavy.0"]));

        // Shallow: no ModuleType entity was pulled in.
        assert!(ing.registries.get(EntityKind::ModuleType).is_empty());
    }

    #[test]
    fn template_overlays_apply_to_lookup_kinds() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                (
                    "Root/Content/Rarity/R_Base.json",
                    json!([{
                        "Type": "Rarity",
                        "Properties": {"Color": "#FFFFFF", "SortOrder": 0}
                    }]),
                ),
                (
                    "Root/Content/Rarity/R_Epic.json",
                    json!([{
                        "Type": "Rarity",
                        "Template": "/Root/Rarity/R_Base.0",
                        "Properties": {"Title": "Epic", "Color": "#A020F0"}
                    }]),
                ),
            ],
        );
        let mut ing = Ingest::new(Options::new(dir.path(), "Root", dir.path().join("out")));
        let id = ing
            .create_from_reference(EntityKind::Rarity, "/Root/Rarity/R_Epic.0")
            .unwrap();
        let rarity = ing.registries.get(EntityKind::Rarity).get(&id).unwrap();
        assert_eq!(rarity.attrs["color"], json!("#A020F0"));
        assert_eq!(rarity.attrs["sort_order"], json!(0));
        assert_eq!(rarity.attrs["name"], json!("Epic"));
    }
}
