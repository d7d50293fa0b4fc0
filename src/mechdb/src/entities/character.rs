//! Character-module and fire-mode parser.
//!
//! A character module carries a `ModuleScaler` of baseline combat values
//! and a `FireModes` list; the firing behavior inside a fire mode
//! overrides the scaler defaults field by field. Exactly one fire mode is
//! supported; the export format allows more, and a second one appearing
//! means the assumptions here need revisiting, so it fails loudly.

use serde_json::{Map, Value};
use tracing::warn;

use crate::curves::distance_curve;
use crate::entities::ability::{burst_behavior, charging_behavior};
use crate::entities::{self, movement_type_ref, store_attrs};
use crate::error::{ParseError, Result};
use crate::extract::{extract, ExtractCtx, KeyAction, KeyMap, Rule};
use crate::ingest::Ingest;
use crate::localization::text;
use crate::registry::EntityKind;
use crate::template::{merge, merged_properties};

static CHARACTER_MODULE_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("Icon", KeyAction::With(entities::image)),
    ("ModuleScaler", KeyAction::Rule(Rule::with(module_scaler).named("module_scaler"))),
    ("FireModes", KeyAction::Rule(Rule::with(fire_modes).named("fire_mode"))),
    ("MovementType", KeyAction::With(movement_type_ref)),
    ("DistToDamage", KeyAction::With(distance_curve)),
    ("DistToSpread", KeyAction::With(distance_curve)),
    ("Health", KeyAction::Value),
    ("Armor", KeyAction::Value),
    ("Mass", KeyAction::Value),
    ("Mesh", KeyAction::Drop),
    ("AnimBlueprint", KeyAction::Drop),
    ("Cosmetics", KeyAction::Drop),
]);

static SCALER_KEYS: KeyMap = KeyMap::new(&[
    ("Damage", KeyAction::Value),
    ("ClipSize", KeyAction::Value),
    ("ReloadTime", KeyAction::Value),
    ("RateOfFire", KeyAction::Value),
    ("ProjectileSpeed", KeyAction::Value),
    ("ProjectileCount", KeyAction::Value),
    ("Spread", KeyAction::Value),
    ("Range", KeyAction::Value),
    ("Recoil", KeyAction::Value),
]);

static FIRE_MODE_KEYS: KeyMap = KeyMap::new(&[
    ("ModeName", KeyAction::Rule(Rule::value().named("name"))),
    ("FiringBehavior", KeyAction::With(firing_behavior)),
    ("BurstBehavior", KeyAction::With(burst_behavior)),
    ("ChargingBehavior", KeyAction::With(charging_behavior)),
    ("TriggerType", KeyAction::Value),
    ("bAimAssist", KeyAction::Value),
]);

pub fn parse(ing: &mut Ingest, id: &str, record: &Value) -> Result<()> {
    let ctx = ExtractCtx::new(id);
    let mut attrs = merged_properties(ing, &ctx, record, &CHARACTER_MODULE_KEYS)?;
    compose_fire_mode(id, &mut attrs)?;
    store_attrs(ing, EntityKind::CharacterModule, id, attrs);
    Ok(())
}

/// Fold the scaler defaults under the fire mode's firing behavior. When a
/// fire mode exists the scaler has no life of its own and is removed.
fn compose_fire_mode(id: &str, attrs: &mut Map<String, Value>) -> Result<()> {
    let Some(Value::Object(mut fire)) = attrs.remove("fire_mode") else {
        return Ok(());
    };

    let scaler = match attrs.remove("module_scaler") {
        Some(Value::Object(scaler)) => scaler,
        _ => Map::new(),
    };
    let firing = match fire.remove("firing_behavior") {
        Some(Value::Object(firing)) => firing,
        _ => Map::new(),
    };

    let composed = merge(&scaler, &firing).map_err(|_| {
        ParseError::schema(id, "firing behavior does not line up with the module scaler")
    })?;
    if !composed.is_empty() {
        fire.insert("firing".to_string(), Value::Object(composed));
    }
    attrs.insert("fire_mode".to_string(), Value::Object(fire));
    Ok(())
}

fn module_scaler(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(props) = value.as_object() else {
        warn!(entity = %ctx.entity, key = "ModuleScaler", value = %value, "expected a scaler object");
        return Ok(None);
    };
    let extracted = extract(ing, ctx, props, &SCALER_KEYS)?;
    if extracted.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Object(extracted)))
}

fn firing_behavior(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(props) = value.as_object() else {
        warn!(entity = %ctx.entity, key = "FiringBehavior", value = %value, "expected a firing object");
        return Ok(None);
    };
    let extracted = extract(ing, ctx, props, &SCALER_KEYS)?;
    if extracted.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Object(extracted)))
}

/// The export carries a list for forward compatibility; only a single
/// fire mode is understood.
fn fire_modes(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(entity = %ctx.entity, key = "FireModes", value = %value, "expected a fire-mode list");
        return Ok(None);
    };
    if items.len() > 1 {
        return Err(ParseError::schema(
            ctx.entity,
            format!("{} fire modes, only one is supported", items.len()),
        ));
    }
    let Some(first) = items.first().and_then(Value::as_object) else {
        return Ok(None);
    };
    let extracted = extract(ing, ctx, first, &FIRE_MODE_KEYS)?;
    if extracted.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Object(extracted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tests::write_tree;
    use crate::ingest::{Ingest, Options};
    use serde_json::json;

    fn write_character(dir: &std::path::Path, fire_modes: Value) {
        write_tree(
            dir,
            &[(
                "Root/Content/Characters/CM_Arm.json",
                json!([{
                    "Type": "CharacterModule",
                    "Properties": {
                        "Title": "Left Arm Cannon",
                        "ModuleScaler": {"Damage": 50, "ClipSize": 6, "ReloadTime": 2.0},
                        "FireModes": fire_modes
                    }
                }]),
            )],
        );
    }

    #[test]
    fn firing_behavior_overrides_scaler_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_character(
            dir.path(),
            json!([{
                "ModeName": "Primary",
                "FiringBehavior": {"Damage": 65, "ProjectileSpeed": 1200},
                "BurstBehavior": {"BurstLength": 2, "TimeBetweenBursts": 0.4}
            }]),
        );

        let mut ing = Ingest::new(Options::new(dir.path(), "Root", dir.path().join("out")));
        let id = ing
            .create_from_reference(EntityKind::CharacterModule, "/Root/Characters/CM_Arm.0")
            .unwrap();

        let entity = ing
            .registries
            .get(EntityKind::CharacterModule)
            .get(&id)
            .unwrap();
        let fire = entity.attrs["fire_mode"].as_object().unwrap();
        assert_eq!(fire["name"], json!("Primary"));
        assert_eq!(
            fire["firing"],
            json!({
                "damage": 65,
                "clip_size": 6,
                "reload_time": 2.0,
                "projectile_speed": 1200
            })
        );
        assert_eq!(fire["burst_behavior"]["burst_length"], json!(2));
        assert!(!entity.attrs.contains_key("module_scaler"));
    }

    #[test]
    fn second_fire_mode_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        write_character(
            dir.path(),
            json!([{"ModeName": "Primary"}, {"ModeName": "Alt"}]),
        );

        let mut ing = Ingest::new(Options::new(dir.path(), "Root", dir.path().join("out")));
        let err = ing
            .create_from_reference(EntityKind::CharacterModule, "/Root/Characters/CM_Arm.0")
            .unwrap_err();
        assert!(matches!(err, ParseError::Schema { .. }));
    }

    #[test]
    fn scaler_without_fire_modes_is_kept_as_is() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[(
                "Root/Content/Characters/CM_Leg.json",
                json!([{
                    "Type": "CharacterModule",
                    "Properties": {
                        "Title": "Leg Servo",
                        "ModuleScaler": {"Damage": 0, "ReloadTime": 1.0}
                    }
                }]),
            )],
        );
        let mut ing = Ingest::new(Options::new(dir.path(), "Root", dir.path().join("out")));
        let id = ing
            .create_from_reference(EntityKind::CharacterModule, "/Root/Characters/CM_Leg.0")
            .unwrap();
        let entity = ing
            .registries
            .get(EntityKind::CharacterModule)
            .get(&id)
            .unwrap();
        assert_eq!(entity.attrs["module_scaler"]["reload_time"], json!(1.0));
    }
}
