//! Upgrade-cost and scrap-reward interning.
//!
//! Costs are value objects, (currency, amount) pairs, interned into the
//! shared UpgradeCost registry. A run-wide index deduplicates across
//! modules: the first module to intern a (level, rarity, currency, amount)
//! combination names the shared id, and an id collision with a different
//! amount falls back to a longer suffix. Zero amounts are interned like
//! any other; they still matter for constants-vs-variables classification.

use serde_json::{json, Value};

use crate::ingest::Ingest;
use crate::registry::EntityKind;

/// Which slot of a level record a cost came from; decides the id shape.
#[derive(Debug, Clone, Copy)]
pub enum CostSlot {
    /// `<module>_lvl<N>`
    Upgrade,
    /// `<module>_lvl<N>_scrap<K>`
    Scrap(u8),
}

/// Run-wide dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CostKey {
    pub level: i64,
    pub rarity: Option<String>,
    pub currency: String,
    pub amount: i64,
}

/// Intern a cost, returning the id to store in place of the raw value.
pub fn intern_cost(
    ing: &mut Ingest,
    module_id: &str,
    rarity: Option<&str>,
    level: i64,
    slot: CostSlot,
    currency: &str,
    amount: i64,
) -> String {
    let key = CostKey {
        level,
        rarity: rarity.map(str::to_string),
        currency: currency.to_string(),
        amount,
    };
    if let Some(existing) = ing.cost_index.get(&key) {
        return existing.clone();
    }

    let base = match slot {
        CostSlot::Upgrade => format!("{module_id}_lvl{level}"),
        CostSlot::Scrap(k) => format!("{module_id}_lvl{level}_scrap{k}"),
    };

    let registry = ing.registries.get_mut(EntityKind::UpgradeCost);
    let id = match registry.get(&base) {
        Some(taken) if taken.attrs.get("amount") != Some(&json!(amount)) => {
            format!("{base}_{amount}")
        }
        _ => base,
    };

    let entity = registry.create_or_get_by_id(&id);
    entity.attrs.insert("currency".to_string(), Value::String(currency.to_string()));
    entity.attrs.insert("amount".to_string(), json!(amount));

    ing.cost_index.insert(key, id.clone());
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_costs_share_an_id_across_modules() {
        let mut ing = Ingest::for_tests();
        let a = intern_cost(&mut ing, "M_A.0", Some("R_Epic.0"), 2, CostSlot::Upgrade, "C_Gold.0", 100);
        let b = intern_cost(&mut ing, "M_B.0", Some("R_Epic.0"), 2, CostSlot::Upgrade, "C_Gold.0", 100);
        assert_eq!(a, "M_A.0_lvl2");
        assert_eq!(b, a);
        assert_eq!(ing.registries.get(EntityKind::UpgradeCost).len(), 1);
    }

    #[test]
    fn amount_conflicts_lengthen_the_id() {
        let mut ing = Ingest::for_tests();
        let first = intern_cost(&mut ing, "M.0", None, 1, CostSlot::Upgrade, "C.0", 50);
        // Same base id would collide; different amount forces a suffix.
        let second = intern_cost(&mut ing, "M.0", None, 1, CostSlot::Upgrade, "C.0", 75);
        assert_eq!(first, "M.0_lvl1");
        assert_eq!(second, "M.0_lvl1_75");
    }

    #[test]
    fn zero_amounts_are_interned() {
        let mut ing = Ingest::for_tests();
        let id = intern_cost(&mut ing, "M.0", None, 1, CostSlot::Scrap(1), "C.0", 0);
        assert_eq!(id, "M.0_lvl1_scrap1");
        let entity = ing.registries.get(EntityKind::UpgradeCost).get(&id).unwrap();
        assert_eq!(entity.attrs["amount"], json!(0));
    }
}
