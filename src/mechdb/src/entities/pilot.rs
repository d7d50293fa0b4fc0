//! Pilot parser.

use serde_json::Value;
use tracing::warn;

use crate::entities::{
    self, ability_ref_list, faction_ref, movement_type_ref, rarity_ref, store_attrs, tag_ref_list,
};
use crate::error::Result;
use crate::extract::{extract, ExtractCtx, KeyAction, KeyMap, Rule};
use crate::ingest::Ingest;
use crate::localization::text;
use crate::registry::EntityKind;
use crate::template::merged_properties;

static PILOT_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Callsign", KeyAction::With(text)),
    ("Description", KeyAction::With(text)),
    ("Bio", KeyAction::With(text)),
    ("Portrait", KeyAction::With(entities::image)),
    ("Icon", KeyAction::With(entities::image)),
    ("Faction", KeyAction::With(faction_ref)),
    ("Rarity", KeyAction::With(rarity_ref)),
    ("Abilities", KeyAction::With(ability_ref_list)),
    ("PassiveAbility", KeyAction::With(pilot_ability_ref)),
    ("Tags", KeyAction::With(tag_ref_list)),
    ("MovementType", KeyAction::With(movement_type_ref)),
    ("StartingModules", KeyAction::Rule(Rule::with(starting_modules).named("starting_modules"))),
    ("UnlockLevel", KeyAction::Value),
    ("bStarterPilot", KeyAction::Value),
    ("HealthModifier", KeyAction::Value),
    ("SpeedModifier", KeyAction::Value),
    ("EnergyModifier", KeyAction::Value),
    ("VoiceSet", KeyAction::Drop),
    ("Mesh", KeyAction::Drop),
    ("AnimBlueprint", KeyAction::Drop),
    ("Cosmetics", KeyAction::Drop),
]);

static STARTING_MODULE_KEYS: KeyMap = KeyMap::new(&[
    ("Module", KeyAction::With(module_ref)),
    ("Slot", KeyAction::Value),
    ("Level", KeyAction::Value),
]);

pub fn parse(ing: &mut Ingest, id: &str, record: &Value) -> Result<()> {
    let ctx = ExtractCtx::new(id);
    let attrs = merged_properties(ing, &ctx, record, &PILOT_KEYS)?;
    store_attrs(ing, EntityKind::Pilot, id, attrs);
    Ok(())
}

fn pilot_ability_ref(
    ing: &mut Ingest,
    _ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    entities::parse_ref(ing, EntityKind::Ability, value)
}

fn module_ref(ing: &mut Ingest, _ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    entities::parse_ref(ing, EntityKind::Module, value)
}

fn starting_modules(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(entity = %ctx.entity, key = "StartingModules", value = %value, "expected a loadout list");
        return Ok(None);
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(props) = item.as_object() else {
            warn!(entity = %ctx.entity, key = "StartingModules", value = %item, "loadout entry is not an object");
            continue;
        };
        let entry = extract(ing, ctx, props, &STARTING_MODULE_KEYS)?;
        if !entry.is_empty() {
            out.push(Value::Object(entry));
        }
    }
    Ok(Some(Value::Array(out)))
}
