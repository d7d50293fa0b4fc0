//! Per-kind entity registries.
//!
//! Every entity is interned exactly once per stable id. Creation and
//! parsing are split so that dependency cycles can be broken with the
//! "create empty, populate later" sequence: `create_or_get_by_id` interns
//! without parsing, and `begin_parse` hands out the right to parse at most
//! once per id.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Entity type tags; one registry (and one output table) per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Module,
    Ability,
    CharacterModule,
    Pilot,
    GameMode,
    Powerup,
    Rarity,
    ModuleStat,
    ModuleType,
    ModuleClass,
    SocketType,
    Faction,
    Tag,
    MovementType,
    Currency,
    UpgradeCost,
}

impl EntityKind {
    /// All kinds, in output order.
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Module,
        EntityKind::Ability,
        EntityKind::CharacterModule,
        EntityKind::Pilot,
        EntityKind::GameMode,
        EntityKind::Powerup,
        EntityKind::Rarity,
        EntityKind::ModuleStat,
        EntityKind::ModuleType,
        EntityKind::ModuleClass,
        EntityKind::SocketType,
        EntityKind::Faction,
        EntityKind::Tag,
        EntityKind::MovementType,
        EntityKind::Currency,
        EntityKind::UpgradeCost,
    ];

    /// Name of the output table (`<TypeName>.json`).
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Module => "Module",
            EntityKind::Ability => "Ability",
            EntityKind::CharacterModule => "CharacterModule",
            EntityKind::Pilot => "Pilot",
            EntityKind::GameMode => "GameMode",
            EntityKind::Powerup => "Powerup",
            EntityKind::Rarity => "Rarity",
            EntityKind::ModuleStat => "ModuleStat",
            EntityKind::ModuleType => "ModuleType",
            EntityKind::ModuleClass => "ModuleClass",
            EntityKind::SocketType => "SocketType",
            EntityKind::Faction => "Faction",
            EntityKind::Tag => "Tag",
            EntityKind::MovementType => "MovementType",
            EntityKind::Currency => "Currency",
            EntityKind::UpgradeCost => "UpgradeCost",
        }
    }
}

/// One interned entity. Cross-entity relations are stored as id strings
/// inside `attrs`, never as direct embeddings.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub attrs: Map<String, Value>,
    parsed: bool,
}

impl Entity {
    fn new(id: String, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            attrs: Map::new(),
            parsed: false,
        }
    }

    /// Attributes as written to the output table (`source_data` removed).
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut out = self.attrs.clone();
        out.remove("source_data");
        out
    }
}

/// Interning table for one entity kind.
#[derive(Debug)]
pub struct Registry {
    kind: EntityKind,
    entries: IndexMap<String, Entity>,
}

impl Registry {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Intern an id without triggering a parse; idempotent.
    pub fn create_or_get_by_id(&mut self, id: &str) -> &mut Entity {
        let kind = self.kind;
        self.entries
            .entry(id.to_string())
            .or_insert_with(|| Entity::new(id.to_string(), kind))
    }

    /// Intern and claim the parse for an id. Returns true exactly once per
    /// id; the caller that sees true must run the parser.
    pub fn begin_parse(&mut self, id: &str) -> bool {
        let entity = self.create_or_get_by_id(id);
        if entity.parsed {
            false
        } else {
            entity.parsed = true;
            true
        }
    }

    /// Lookup without creation (`create_if_missing = false` in the design
    /// notes); parsers that risk recursion use this.
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entries.get_mut(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `{id → attributes}` with ids sorted at the top level only; nested
    /// dictionaries keep their insertion order.
    pub fn to_table(&self) -> Map<String, Value> {
        let mut ids: Vec<&String> = self.entries.keys().collect();
        ids.sort();

        let mut table = Map::new();
        for id in ids {
            let entity = &self.entries[id.as_str()];
            table.insert(id.clone(), Value::Object(entity.to_dict()));
        }
        table
    }
}

/// Every registry of a run, created together and freed together.
#[derive(Debug)]
pub struct Registries {
    by_kind: BTreeMap<EntityKind, Registry>,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    pub fn new() -> Self {
        let by_kind = EntityKind::ALL
            .iter()
            .map(|&kind| (kind, Registry::new(kind)))
            .collect();
        Self { by_kind }
    }

    pub fn get(&self, kind: EntityKind) -> &Registry {
        &self.by_kind[&kind]
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut Registry {
        self.by_kind.get_mut(&kind).expect("all kinds pre-created")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registry> {
        self.by_kind.values()
    }
}
