//! Derived analysis over finalized registries.
//!
//! Consumes the module, module-stat, and upgrade-cost tables and produces
//! three views: per-module base-to-max growth across levels, per-stat
//! module rankings, and upgrade-cost totals. Growth is expressed as a
//! ratio when the base value is non-zero; a base of zero with a non-zero
//! max is additive growth, reported as the literal string `"+<max>"` so it
//! cannot be mistaken for a multiplier.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::registry::{Entity, EntityKind, Registries};

/// Stat keys with fixed polarity; these never consult the stat entity.
const POLARITY_OVERRIDES: &[(&str, bool)] = &[
    ("ReloadTime", false),
    ("Spread", false),
    ("Cooldown", false),
    ("CooldownTime", false),
    ("TimeBetweenShots", false),
    ("TimeBetweenBursts", false),
    ("PowerCost", false),
    ("EnergyCost", false),
    ("Damage", true),
    ("DamagePerSecond", true),
    ("Health", true),
    ("Range", true),
];

/// Flavor keys that never participate in growth computation.
const SKIP_KEYS: &[&str] = &[
    "ModuleFaction",
    "bIsPerk",
    "ScrapRewards",
    "UpgradeCurrency",
    "UpgradeCost",
    "FirstScrapReward",
    "SecondScrapReward",
];

#[derive(Debug, Default)]
pub struct Analysis {
    pub level_diffs_by_module: Map<String, Value>,
    pub level_diffs_by_stat: Map<String, Value>,
    pub total_upgrade_cost: Map<String, Value>,
}

impl Analysis {
    /// The `Analysis.json` document.
    pub fn to_value(&self) -> Value {
        json!({
            "level_diffs_by_module": self.level_diffs_by_module,
            "level_diffs_by_stat": self.level_diffs_by_stat,
            "total_upgrade_cost_for_all_modules": self.total_upgrade_cost,
        })
    }
}

struct ModuleRow {
    id: String,
    /// stat key → reported delta (`Number` ratio or `"+<max>"`).
    deltas: Map<String, Value>,
    /// stat key → delta as an orderable float (additive growth is +inf).
    ordered: HashMap<String, f64>,
    /// currency id → summed amount.
    costs: HashMap<String, i64>,
}

pub fn run(registries: &Registries) -> Analysis {
    let mut rows: Vec<ModuleRow> = Vec::new();
    // First resolution of a display key to a stat entity wins.
    let mut stat_sources: HashMap<String, String> = HashMap::new();

    let mut module_ids: Vec<&str> = registries.get(EntityKind::Module).ids().collect();
    module_ids.sort_unstable();

    for id in module_ids {
        let module = registries
            .get(EntityKind::Module)
            .get(id)
            .expect("id taken from the registry");
        if !production_ready(module) {
            continue;
        }
        rows.push(module_row(registries, module, &mut stat_sources));
    }

    build(registries, rows, &stat_sources)
}

/// Only shipped modules participate; anything explicitly staged out of
/// production is skipped.
fn production_ready(module: &Entity) -> bool {
    match module.attrs.get("production_status").and_then(Value::as_str) {
        Some(status) => {
            let status = status.rsplit(':').next().unwrap_or(status);
            matches!(status, "Production" | "Ready" | "Released")
        }
        None => true,
    }
}

fn module_row(
    registries: &Registries,
    module: &Entity,
    stat_sources: &mut HashMap<String, String>,
) -> ModuleRow {
    let mut row = ModuleRow {
        id: module.id.clone(),
        deltas: Map::new(),
        ordered: HashMap::new(),
        costs: HashMap::new(),
    };

    for section in sections(module) {
        analyze_section(registries, section, &mut row, stat_sources);
    }
    row
}

/// The module-scalars section plus every ability-scalars section.
fn sections(module: &Entity) -> Vec<&Map<String, Value>> {
    let mut out = Vec::new();
    if let Some(section) = module.attrs.get("module_scalars").and_then(Value::as_object) {
        out.push(section);
    }
    if let Some(list) = module.attrs.get("ability_scalars").and_then(Value::as_array) {
        out.extend(list.iter().filter_map(Value::as_object));
    }
    out
}

fn analyze_section(
    registries: &Registries,
    section: &Map<String, Value>,
    row: &mut ModuleRow,
    stat_sources: &mut HashMap<String, String>,
) {
    let variables = section.get("variables").and_then(Value::as_array);
    let levels = variables.map_or(0, Vec::len);

    if let Some(variables) = variables {
        let (Some(base), Some(max)) = (
            variables.first().and_then(Value::as_object),
            variables.last().and_then(Value::as_object),
        ) else {
            return;
        };

        for (key, base_value) in base {
            if skipped(key) {
                continue;
            }
            let (Some(base_n), Some(max_n)) = (
                base_value.as_f64(),
                max.get(key).and_then(Value::as_f64),
            ) else {
                continue;
            };

            let stat_key = display_key(registries, section, key, stat_sources);
            let (reported, ordered) = delta(base_n, max_n);
            row.ordered.insert(stat_key.clone(), ordered);
            row.deltas.insert(stat_key, reported);
        }

        for level in variables {
            add_cost(registries, level.get("UpgradeCost"), 1, &mut row.costs);
        }
    }

    // A cost id that landed in `constants` repeats at every level.
    if let Some(constants) = section.get("constants").and_then(Value::as_object) {
        add_cost(
            registries,
            constants.get("UpgradeCost"),
            levels.max(1),
            &mut row.costs,
        );
    }
}

fn skipped(key: &str) -> bool {
    key.starts_with("ModuleClass_") || SKIP_KEYS.contains(&key)
}

/// `PrimaryParameter`/`SecondaryParameter` are display slots; the stat
/// they show is named by the section's stat pointer, and the analysis is
/// keyed by that stat's name so rankings line up across modules.
fn display_key(
    registries: &Registries,
    section: &Map<String, Value>,
    key: &str,
    stat_sources: &mut HashMap<String, String>,
) -> String {
    let pointer = match key {
        "PrimaryParameter" => section.get("primary_parameter_stat"),
        "SecondaryParameter" => section.get("secondary_parameter_stat"),
        _ => None,
    };

    let stats = registries.get(EntityKind::ModuleStat);
    if let Some(stat_id) = pointer.and_then(Value::as_str) {
        let display = stats
            .get(stat_id)
            .and_then(|stat| stat.attrs.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(stat_id)
            .to_string();
        stat_sources
            .entry(display.clone())
            .or_insert_with(|| stat_id.to_string());
        return display;
    }

    // Plain level keys may still correspond to a named stat entity.
    if !stat_sources.contains_key(key) {
        if let Some(stat) = stats
            .iter()
            .find(|stat| stat.attrs.get("name").and_then(Value::as_str) == Some(key))
        {
            stat_sources.insert(key.to_string(), stat.id.clone());
        }
    }
    key.to_string()
}

/// `(reported, orderable)` growth from base to max.
fn delta(base: f64, max: f64) -> (Value, f64) {
    if base != 0.0 {
        let ratio = (max - base) / base;
        (json!(ratio), ratio)
    } else if max == 0.0 {
        (json!(0), 0.0)
    } else {
        (json!(format!("+{max}")), f64::INFINITY)
    }
}

fn add_cost(
    registries: &Registries,
    value: Option<&Value>,
    times: usize,
    costs: &mut HashMap<String, i64>,
) {
    let Some(cost_id) = value.and_then(Value::as_str) else {
        return;
    };
    let Some(cost) = registries.get(EntityKind::UpgradeCost).get(cost_id) else {
        return;
    };
    let (Some(currency), Some(amount)) = (
        cost.attrs.get("currency").and_then(Value::as_str),
        cost.attrs.get("amount").and_then(Value::as_i64),
    ) else {
        return;
    };
    *costs.entry(currency.to_string()).or_insert(0) += amount * times as i64;
}

fn build(
    registries: &Registries,
    rows: Vec<ModuleRow>,
    stat_sources: &HashMap<String, String>,
) -> Analysis {
    // stat key → [(module id, orderable delta)], modules in sorted order.
    let mut per_stat: HashMap<&str, Vec<(&str, f64)>> = HashMap::new();
    for row in &rows {
        for (stat, value) in &row.ordered {
            per_stat
                .entry(stat.as_str())
                .or_default()
                .push((&row.id, *value));
        }
    }

    let mut percentiles: HashMap<&str, Map<String, Value>> = HashMap::new();
    let mut by_stat_keys: Vec<&str> = per_stat.keys().copied().collect();
    by_stat_keys.sort_unstable();

    let mut level_diffs_by_stat = Map::new();
    for stat in by_stat_keys {
        let entries = &per_stat[stat];
        let more_is_better = polarity(registries, stat, stat_sources.get(stat));

        let mut ranked = entries.clone();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        let n = ranked.len();
        for (position, (module, _)) in ranked.iter().enumerate() {
            let rank = if more_is_better { position + 1 } else { n - position };
            percentiles
                .entry(*module)
                .or_default()
                .insert(stat.to_string(), json!(rank as f64 / n as f64));
        }

        let mut table = Map::new();
        for row in &rows {
            if let Some(reported) = row.deltas.get(stat) {
                table.insert(row.id.clone(), reported.clone());
            }
        }
        level_diffs_by_stat.insert(stat.to_string(), Value::Object(table));
    }

    let mut level_diffs_by_module = Map::new();
    let mut total = HashMap::new();
    for row in &rows {
        let stat_percentiles =
            sorted(&percentiles.remove(row.id.as_str()).unwrap_or_default());

        let mut cost_keys: Vec<&String> = row.costs.keys().collect();
        cost_keys.sort_unstable();
        let mut costs = Map::new();
        for currency in cost_keys {
            costs.insert(currency.clone(), json!(row.costs[currency]));
            *total.entry(currency.clone()).or_insert(0) += row.costs[currency];
        }

        level_diffs_by_module.insert(
            row.id.clone(),
            json!({
                "stats_percent_increase": sorted(&row.deltas),
                "stats_percentile": stat_percentiles,
                "total_upgrade_cost": costs,
            }),
        );
    }

    let mut total_upgrade_cost = Map::new();
    let mut currencies: Vec<&String> = total.keys().collect();
    currencies.sort_unstable();
    for currency in currencies {
        total_upgrade_cost.insert(currency.clone(), json!(total[currency]));
    }

    Analysis {
        level_diffs_by_module,
        level_diffs_by_stat,
        total_upgrade_cost,
    }
}

/// A copy with keys in ascending order.
fn sorted(map: &Map<String, Value>) -> Map<String, Value> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_unstable();
    keys.into_iter()
        .map(|key| (key.clone(), map[key].clone()))
        .collect()
}

/// Override map first, then the stat entity, then a warned default.
fn polarity(registries: &Registries, stat: &str, source: Option<&String>) -> bool {
    if let Some((_, fixed)) = POLARITY_OVERRIDES.iter().find(|(name, _)| *name == stat) {
        return *fixed;
    }
    if let Some(stat_id) = source {
        if let Some(more) = registries
            .get(EntityKind::ModuleStat)
            .get(stat_id)
            .and_then(|entity| entity.attrs.get("more_is_better"))
            .and_then(Value::as_bool)
        {
            return more;
        }
    }
    warn!(stat = %stat, "no polarity known, assuming more is better");
    true
}
