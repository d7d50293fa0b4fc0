//! Module parser.
//!
//! Modules are the richest entity kind: they expand references to nearly
//! every lookup kind, own one "module scalars" section plus any number of
//! "ability scalars" sections, and drive upgrade-cost interning. Scalar
//! sections are parsed uniformly; the post-pass then applies unit
//! inversion, interns per-level costs, and splits the level list into
//! constants and variables.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::entities::upgrade::{intern_cost, CostSlot};
use crate::entities::{
    self, ability_ref_list, currency_ref, faction_ref_list, module_class_ref_list,
    module_stat_ref, module_stat_ref_list, module_type_ref, rarity_ref, socket_type_ref_list,
    store_attrs, tag_ref_list,
};
use crate::error::{ParseError, Result};
use crate::extract::{extract, ExtractCtx, KeyAction, KeyMap, Rule};
use crate::ingest::Ingest;
use crate::levels::normalize_levels;
use crate::localization::text;
use crate::registry::EntityKind;
use crate::template::merged_properties;

/// Character-module mount points, as exported. Unrecognized mount keys
/// are upstream drift: logged, then carried through best-effort.
const MOUNT_SLOTS: &[&str] = &["Left", "Right", "LeftShoulder", "RightShoulder", "Torso", "Legs"];

static MODULE_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("ShortDescription", KeyAction::With(text)),
    ("Icon", KeyAction::With(entities::image)),
    ("Image", KeyAction::With(entities::image)),
    ("Rarity", KeyAction::With(rarity_ref)),
    ("ModuleType", KeyAction::With(module_type_ref)),
    ("ModuleClasses", KeyAction::With(module_class_ref_list)),
    ("StatsTable", KeyAction::Rule(Rule::with(module_stat_ref_list).named("stats"))),
    ("Tags", KeyAction::With(tag_ref_list)),
    ("SocketTypes", KeyAction::With(socket_type_ref_list)),
    ("Factions", KeyAction::With(faction_ref_list)),
    ("Abilities", KeyAction::With(ability_ref_list)),
    ("CharacterModules", KeyAction::With(mounts)),
    ("ModuleScalars", KeyAction::Rule(Rule::with(scalars_section).named("module_scalars"))),
    ("AbilityScalars", KeyAction::Rule(Rule::with(ability_scalars).named("ability_scalars"))),
    ("Price", KeyAction::With(price)),
    ("ProductionStatus", KeyAction::Value),
    ("bIsPerk", KeyAction::Value),
    ("UnlockLevel", KeyAction::Value),
    // Presentation-only payloads.
    ("Mesh", KeyAction::Drop),
    ("Animations", KeyAction::Drop),
    ("VFX", KeyAction::Drop),
    ("SFX", KeyAction::Drop),
    ("PreviewTransform", KeyAction::Drop),
    ("GameplayTags", KeyAction::Drop),
]);

/// One scalar section: stat defaults bucket into `default_scalars`, the
/// level list and the two displayed-parameter pointers are attributes.
static SCALAR_SECTION_KEYS: KeyMap = KeyMap::with_default(
    &[
        ("SectionName", KeyAction::Rule(Rule::value().named("name"))),
        ("LevelsData", KeyAction::Rule(Rule::with(levels_data).named("levels_raw"))),
        (
            "PrimaryParameterStat",
            KeyAction::Rule(Rule::with(module_stat_ref).named("primary_parameter_stat")),
        ),
        (
            "SecondaryParameterStat",
            KeyAction::Rule(Rule::with(module_stat_ref).named("secondary_parameter_stat")),
        ),
        ("Damage", KeyAction::Value),
        ("DamagePerSecond", KeyAction::Value),
        ("ClipSize", KeyAction::Value),
        ("ReloadTime", KeyAction::Value),
        ("ProjectileSpeed", KeyAction::Value),
        ("Spread", KeyAction::Value),
        ("Range", KeyAction::Value),
        ("PowerCost", KeyAction::Value),
        ("Health", KeyAction::Value),
        ("MaxDurability", KeyAction::Value),
        ("DefensePoints", KeyAction::Value),
        ("CooldownReduction", KeyAction::Value),
        ("EnergyRegen", KeyAction::Value),
        ("CritChance", KeyAction::Value),
        ("CritMultiplier", KeyAction::Value),
    ],
    Rule::value().dict("default_scalars").match_key(),
);

/// Per-level record keys keep their source names: the analysis stage and
/// the constants/variables split operate on them directly.
static LEVEL_KEYS: KeyMap = KeyMap::with_default(
    &[
        ("Level", KeyAction::Value),
        ("UpgradeCost", KeyAction::Value),
        ("UpgradeCurrency", KeyAction::With(currency_ref)),
        ("FirstScrapReward", KeyAction::With(scrap_reward)),
        ("SecondScrapReward", KeyAction::With(scrap_reward)),
        ("PrimaryParameter", KeyAction::Value),
        ("SecondaryParameter", KeyAction::Value),
        ("Damage", KeyAction::Value),
        ("DamagePerSecond", KeyAction::Value),
        ("ClipSize", KeyAction::Value),
        ("ReloadTime", KeyAction::Value),
        ("ProjectileSpeed", KeyAction::Value),
        ("Spread", KeyAction::Value),
        ("Range", KeyAction::Value),
        ("PowerCost", KeyAction::Value),
        ("Health", KeyAction::Value),
        ("MaxDurability", KeyAction::Value),
        ("DefensePoints", KeyAction::Value),
        ("CooldownReduction", KeyAction::Value),
        ("EnergyRegen", KeyAction::Value),
        ("CritChance", KeyAction::Value),
        ("CritMultiplier", KeyAction::Value),
        ("ModuleFaction", KeyAction::Value),
        ("ModuleClass_Primary", KeyAction::Value),
        ("ModuleClass_Secondary", KeyAction::Value),
        ("bIsPerk", KeyAction::Value),
        ("ScrapRewards", KeyAction::Value),
    ],
    Rule::value().match_key(),
);

static PRICE_KEYS: KeyMap = KeyMap::with_default(
    &[
        ("UpgradeCurrency", KeyAction::With(currency_ref)),
        ("UpgradeCost", KeyAction::Value),
    ],
    Rule::value().match_key(),
);

static SCRAP_KEYS: KeyMap = KeyMap::with_default(
    &[
        ("Currency", KeyAction::With(currency_ref)),
        ("Amount", KeyAction::Value),
    ],
    Rule::value().match_key(),
);

pub fn parse(ing: &mut Ingest, id: &str, record: &Value) -> Result<()> {
    let ctx = ExtractCtx::new(id);
    let mut attrs = merged_properties(ing, &ctx, record, &MODULE_KEYS)?;
    let rarity = attrs
        .get("rarity")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(Value::Object(section)) = attrs.get_mut("module_scalars") {
        finalize_section(ing, id, rarity.as_deref(), section)?;
    }
    if let Some(Value::Array(sections)) = attrs.get_mut("ability_scalars") {
        for section in sections {
            if let Value::Object(section) = section {
                finalize_section(ing, id, rarity.as_deref(), section)?;
            }
        }
    }
    if let Some(Value::Object(price)) = attrs.get_mut("price") {
        intern_price(ing, id, rarity.as_deref(), price)?;
    }

    store_attrs(ing, EntityKind::Module, id, attrs);
    Ok(())
}

// ---- key-map callbacks ----

fn scalars_section(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(props) = value.as_object() else {
        warn!(entity = %ctx.entity, key = "ModuleScalars", value = %value, "expected a scalar section");
        return Ok(None);
    };
    let section = extract(ing, ctx, props, &SCALAR_SECTION_KEYS)?;
    Ok(Some(Value::Object(section)))
}

fn ability_scalars(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(entity = %ctx.entity, key = "AbilityScalars", value = %value, "expected a section list");
        return Ok(None);
    };
    let mut sections = Vec::with_capacity(items.len());
    for item in items {
        if let Some(section) = scalars_section(ing, ctx, item)? {
            sections.push(section);
        }
    }
    Ok(Some(Value::Array(sections)))
}

fn levels_data(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(entity = %ctx.entity, key = "LevelsData", value = %value, "expected a level list");
        return Ok(None);
    };
    let mut levels = Vec::with_capacity(items.len());
    for item in items {
        let Some(props) = item.as_object() else {
            warn!(entity = %ctx.entity, key = "LevelsData", value = %item, "level record is not an object");
            continue;
        };
        levels.push(Value::Object(extract(ing, ctx, props, &LEVEL_KEYS)?));
    }
    Ok(Some(Value::Array(levels)))
}

fn mounts(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(slots) = value.as_object() else {
        warn!(entity = %ctx.entity, key = "CharacterModules", value = %value, "expected a mount map");
        return Ok(None);
    };
    let mut out = Map::new();
    for (slot, reference) in slots {
        if !MOUNT_SLOTS.contains(&slot.as_str()) {
            warn!(entity = %ctx.entity, key = %slot, value = %reference, "unrecognized mount slot");
        }
        if let Some(id) = ing.reference_entity(EntityKind::CharacterModule, reference)? {
            out.insert(slot.clone(), Value::String(id));
        }
    }
    Ok(Some(Value::Object(out)))
}

fn price(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(props) = value.as_object() else {
        warn!(entity = %ctx.entity, key = "Price", value = %value, "expected a price record");
        return Ok(None);
    };
    Ok(Some(Value::Object(extract(ing, ctx, props, &PRICE_KEYS)?)))
}

fn scrap_reward(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(props) = value.as_object() else {
        warn!(entity = %ctx.entity, key = "ScrapReward", value = %value, "expected a reward record");
        return Ok(None);
    };
    Ok(Some(Value::Object(extract(ing, ctx, props, &SCRAP_KEYS)?)))
}

// ---- post-passes ----

/// Unit inversion, cost interning, then the constants/variables split.
fn finalize_section(
    ing: &mut Ingest,
    module_id: &str,
    rarity: Option<&str>,
    section: &mut Map<String, Value>,
) -> Result<()> {
    let Some(Value::Array(raw)) = section.remove("levels_raw") else {
        return Ok(());
    };
    let mut levels: Vec<Map<String, Value>> = raw
        .into_iter()
        .filter_map(|level| match level {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

    invert_units(ing, section, &mut levels);
    for (index, level) in levels.iter_mut().enumerate() {
        intern_level_costs(ing, module_id, rarity, index, level)?;
        // The level index is encoded in the cost ids and in list position;
        // keeping it would force every section into `variables`.
        level.remove("Level");
    }

    for (key, value) in normalize_levels(&levels) {
        section.insert(key, value);
    }
    Ok(())
}

/// A displayed parameter whose stat has `unit_exponent = -1` is shown as
/// its reciprocal at every level.
fn invert_units(
    ing: &Ingest,
    section: &Map<String, Value>,
    levels: &mut [Map<String, Value>],
) {
    const PARAMS: &[(&str, &str)] = &[
        ("primary_parameter_stat", "PrimaryParameter"),
        ("secondary_parameter_stat", "SecondaryParameter"),
    ];

    for (stat_attr, param_key) in PARAMS {
        let Some(stat_id) = section.get(*stat_attr).and_then(Value::as_str) else {
            continue;
        };
        let exponent = ing
            .registries
            .get(EntityKind::ModuleStat)
            .get(stat_id)
            .and_then(|stat| stat.attrs.get("unit_exponent"))
            .and_then(Value::as_i64);
        if exponent != Some(-1) {
            continue;
        }
        for level in levels.iter_mut() {
            if let Some(n) = level.get(*param_key).and_then(Value::as_f64) {
                if n != 0.0 {
                    level.insert((*param_key).to_string(), json!(1.0 / n));
                }
            }
        }
    }
}

fn intern_level_costs(
    ing: &mut Ingest,
    module_id: &str,
    rarity: Option<&str>,
    index: usize,
    level: &mut Map<String, Value>,
) -> Result<()> {
    let level_num = level
        .get("Level")
        .and_then(Value::as_i64)
        .unwrap_or(index as i64);

    let currency = level
        .get("UpgradeCurrency")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let (Some(currency), Some(raw)) = (currency, level.get("UpgradeCost")) {
        let amount = amount_of(module_id, "UpgradeCost", raw)?;
        let id = intern_cost(
            ing,
            module_id,
            rarity,
            level_num,
            CostSlot::Upgrade,
            &currency,
            amount,
        );
        level.insert("UpgradeCost".to_string(), Value::String(id));
    }

    for (key, slot) in [
        ("FirstScrapReward", CostSlot::Scrap(1)),
        ("SecondScrapReward", CostSlot::Scrap(2)),
    ] {
        let Some(reward) = level.get(key).and_then(Value::as_object) else {
            continue;
        };
        let Some(currency) = reward.get("Currency").and_then(Value::as_str).map(str::to_string)
        else {
            continue;
        };
        let amount = reward
            .get("Amount")
            .map(|raw| amount_of(module_id, key, raw))
            .transpose()?
            .unwrap_or(0);
        let id = intern_cost(ing, module_id, rarity, level_num, slot, &currency, amount);
        level.insert(key.to_string(), Value::String(id));
    }
    Ok(())
}

/// Pre-interned cost ids survive re-finalization; raw amounts must be
/// numeric.
fn amount_of(entity: &str, key: &str, raw: &Value) -> Result<i64> {
    raw.as_i64()
        .or_else(|| raw.as_f64().map(|f| f.round() as i64))
        .ok_or_else(|| {
            ParseError::schema(entity, format!("{key} amount is not numeric: {raw}"))
        })
}

fn intern_price(
    ing: &mut Ingest,
    module_id: &str,
    rarity: Option<&str>,
    price: &mut Map<String, Value>,
) -> Result<()> {
    let Some(currency) = price
        .get("UpgradeCurrency")
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        return Ok(());
    };
    let Some(raw) = price.get("UpgradeCost") else {
        return Ok(());
    };
    let amount = amount_of(module_id, "UpgradeCost", raw)?;
    let id = intern_cost(
        ing,
        module_id,
        rarity,
        0,
        CostSlot::Upgrade,
        &currency,
        amount,
    );
    price.insert("UpgradeCost".to_string(), Value::String(id));
    Ok(())
}
