//! Per-kind entity parsers.
//!
//! Each parser declares a key-map and (where needed) imperative
//! post-passes. They all funnel through [`parse`], which
//! `Ingest::create_from_record_at` calls exactly once per entity id.

pub mod ability;
pub mod actor;
pub mod character;
pub mod gamemode;
pub mod meta;
pub mod module;
pub mod pilot;
pub mod powerup;
pub mod upgrade;

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::extract::ExtractCtx;
use crate::ingest::Ingest;
use crate::refpath::PathResolver;
use crate::registry::EntityKind;

/// Dispatch a freshly interned record to its kind's parser.
pub fn parse(ing: &mut Ingest, kind: EntityKind, id: &str, record: &Value) -> Result<()> {
    match kind {
        EntityKind::Module => module::parse(ing, id, record),
        EntityKind::Ability => ability::parse(ing, id, record),
        EntityKind::CharacterModule => character::parse(ing, id, record),
        EntityKind::Pilot => pilot::parse(ing, id, record),
        EntityKind::GameMode => gamemode::parse(ing, id, record),
        EntityKind::Powerup => powerup::parse(ing, id, record),
        // Upgrade costs are interned by the module parser, never read
        // from a record of their own.
        EntityKind::UpgradeCost => Ok(()),
        other => meta::parse(ing, other, id, record),
    }
}

/// Intern the referenced entity and store its id string.
pub(crate) fn parse_ref(
    ing: &mut Ingest,
    kind: EntityKind,
    value: &Value,
) -> Result<Option<Value>> {
    Ok(ing.reference_entity(kind, value)?.map(Value::String))
}

/// Intern every referenced entity in a list and store the id strings.
pub(crate) fn parse_ref_list(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    kind: EntityKind,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(
            entity = %ctx.entity,
            key = kind.table_name(),
            value = %value,
            "expected a reference list"
        );
        return Ok(None);
    };
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        if let Some(id) = ing.reference_entity(kind, item)? {
            ids.push(Value::String(id));
        }
    }
    Ok(Some(Value::Array(ids)))
}

/// Derive the referenced id without interning: the lookup-only escape
/// hatch for parsers that would otherwise recurse into their own callers.
pub(crate) fn shallow_ref(ing: &Ingest, value: &Value) -> Result<Option<Value>> {
    match PathResolver::reference_string(value) {
        Some(reference) => ing.resolver.to_id(reference).map(Value::String).map(Some),
        None => Ok(None),
    }
}

macro_rules! ref_parsers {
    ($($fn_name:ident => $kind:expr;)*) => {
        $(
            pub(crate) fn $fn_name(
                ing: &mut Ingest,
                _ctx: &ExtractCtx<'_>,
                value: &Value,
            ) -> Result<Option<Value>> {
                parse_ref(ing, $kind, value)
            }
        )*
    };
}

macro_rules! ref_list_parsers {
    ($($fn_name:ident => $kind:expr;)*) => {
        $(
            pub(crate) fn $fn_name(
                ing: &mut Ingest,
                ctx: &ExtractCtx<'_>,
                value: &Value,
            ) -> Result<Option<Value>> {
                parse_ref_list(ing, ctx, $kind, value)
            }
        )*
    };
}

ref_parsers! {
    rarity_ref => EntityKind::Rarity;
    module_type_ref => EntityKind::ModuleType;
    module_class_ref => EntityKind::ModuleClass;
    module_stat_ref => EntityKind::ModuleStat;
    movement_type_ref => EntityKind::MovementType;
    currency_ref => EntityKind::Currency;
    faction_ref => EntityKind::Faction;
}

ref_list_parsers! {
    ability_ref_list => EntityKind::Ability;
    tag_ref_list => EntityKind::Tag;
    module_class_ref_list => EntityKind::ModuleClass;
    module_stat_ref_list => EntityKind::ModuleStat;
    socket_type_ref_list => EntityKind::SocketType;
    faction_ref_list => EntityKind::Faction;
    powerup_ref_list => EntityKind::Powerup;
}

/// Move extracted attributes onto the interned entity.
pub(crate) fn store_attrs(
    ing: &mut Ingest,
    kind: EntityKind,
    id: &str,
    attrs: serde_json::Map<String, Value>,
) {
    let entity = ing.entity_mut(kind, id);
    for (key, value) in attrs {
        entity.attrs.insert(key, value);
    }
}

/// Record an image asset path for the sidecar and keep the virtual path
/// as the attribute value.
pub(crate) fn image(
    ing: &mut Ingest,
    _ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(reference) = PathResolver::reference_string(value) else {
        return Ok(None);
    };
    let reference = reference.to_string();
    ing.record_image(&reference);
    Ok(Some(Value::String(reference)))
}
