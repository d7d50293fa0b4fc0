//! Run context and top-level driver.
//!
//! One `Ingest` owns everything a run mutates: the path resolver, the file
//! store, every entity registry, the localization tables, the discovered
//! image set, and the in-progress template and class stacks. Parsing an
//! entity
//! synchronously drives parsing of everything it references; the whole run
//! is single-threaded and either completes or fails fast.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::entities;
use crate::error::{ParseError, Result};
use crate::localization::Localization;
use crate::refpath::PathResolver;
use crate::registry::{Entity, EntityKind, Registries};
use crate::store::FileStore;

/// Options the core reads; everything else on the CLI surface is opaque.
#[derive(Debug, Clone)]
pub struct Options {
    pub export_root: PathBuf,
    pub game_name: String,
    pub output_dir: PathBuf,
    pub language: String,
}

impl Options {
    pub fn new(
        export_root: impl Into<PathBuf>,
        game_name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            export_root: export_root.into(),
            game_name: game_name.into(),
            output_dir: output_dir.into(),
            language: "en".to_string(),
        }
    }
}

/// Content subtrees walked by the entry parsers. The descriptor graph
/// reaches everything else through references.
const MODULES_DIR: &str = "Modules";
const PILOTS_DIR: &str = "Pilots";
const GAME_MODES_DIR: &str = "GameModes";
const FACTORY_PRESET_DIR: &str = "FactoryPreset";
const LOCALIZATION_DIR: &str = "Localization";

/// Subdirectories of the newer FactoryPreset layout.
const PRESET_SCOPES: &[&str] = &["Personal", "Teams"];

pub struct Ingest {
    pub resolver: PathResolver,
    pub store: FileStore,
    pub registries: Registries,
    pub localization: Localization,
    pub images: BTreeSet<String>,
    pub(crate) template_stack: Vec<String>,
    pub(crate) class_stack: Vec<String>,
    pub(crate) cost_index: HashMap<crate::entities::upgrade::CostKey, String>,
    options: Options,
}

impl Ingest {
    pub fn new(options: Options) -> Self {
        Self {
            resolver: PathResolver::new(&options.export_root, &options.game_name),
            store: FileStore::new(),
            registries: Registries::new(),
            localization: Localization::new(&options.language),
            images: BTreeSet::new(),
            template_stack: Vec::new(),
            class_stack: Vec::new(),
            cost_index: HashMap::new(),
            options,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(Options::new("/export", "Root", "/out"))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn content_root(&self) -> PathBuf {
        self.options
            .export_root
            .join(&self.options.game_name)
            .join("Content")
    }

    /// Intern-or-create through a reference; parses on first creation.
    pub fn create_from_reference(&mut self, kind: EntityKind, reference: &str) -> Result<String> {
        let (path, index) = self.resolver.to_file_path_and_index(reference)?;
        self.create_from_record_at(kind, &path, index)
    }

    /// Same contract as `create_from_reference`, keyed directly by
    /// (file, index) for the entry-point walks.
    pub fn create_from_record_at(
        &mut self,
        kind: EntityKind,
        path: &Path,
        index: usize,
    ) -> Result<String> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ParseError::MalformedReference {
                reference: path.display().to_string(),
                message: "path has no filename".to_string(),
            })?;
        let id = format!("{stem}.{index}");

        // Claim-before-parse keeps re-entry for the same id idempotent and
        // breaks reference cycles.
        if self.registries.get_mut(kind).begin_parse(&id) {
            let record = self.store.record(path, index)?;
            debug!(kind = kind.table_name(), id = %id, "parsing entity");
            self.entity_mut(kind, &id)
                .attrs
                .insert("source_data".to_string(), record.clone());
            entities::parse(self, kind, &id, &record)?;
        }
        Ok(id)
    }

    /// Decode a raw property value as a reference and intern the entity it
    /// points at. Nulls and `"None"` yield `Ok(None)`. Bare tokens with no
    /// path component intern by id alone; there is no descriptor to parse.
    pub fn reference_entity(&mut self, kind: EntityKind, value: &Value) -> Result<Option<String>> {
        match PathResolver::reference_string(value) {
            Some(reference) => {
                if PathResolver::is_opaque(reference) {
                    let id = reference.to_string();
                    self.registries.get_mut(kind).create_or_get_by_id(&id);
                    return Ok(Some(id));
                }
                let reference = reference.to_string();
                self.create_from_reference(kind, &reference).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Registry access for an entity that must already be interned.
    pub fn entity_mut(&mut self, kind: EntityKind, id: &str) -> &mut Entity {
        self.registries
            .get_mut(kind)
            .get_mut(id)
            .expect("entity interned before mutation")
    }

    /// Remember an image asset path for the `Image.json` sidecar.
    pub fn record_image(&mut self, virtual_path: &str) {
        self.images.insert(virtual_path.to_string());
    }

    /// Execute the whole ingest: localization, entry walks per entity
    /// kind, transitively pulling every referenced entity.
    pub fn run(&mut self) -> Result<()> {
        let content = self.content_root();

        let loc_dir = content.join(LOCALIZATION_DIR).join(&self.options.language);
        let language = self.options.language.clone();
        let mut localization = std::mem::take(&mut self.localization);
        localization.load_language(&mut self.store, &language, &loc_dir)?;
        self.localization = localization;
        if self.localization.is_empty() {
            warn!(language = %language, "no localization tables loaded");
        }

        self.walk_entry(EntityKind::Module, &content.join(MODULES_DIR))?;
        self.walk_entry(EntityKind::Pilot, &content.join(PILOTS_DIR))?;
        self.walk_entry(EntityKind::GameMode, &content.join(GAME_MODES_DIR))?;
        self.walk_factory_presets(&content.join(FACTORY_PRESET_DIR))?;

        info!(
            modules = self.registries.get(EntityKind::Module).len(),
            abilities = self.registries.get(EntityKind::Ability).len(),
            pilots = self.registries.get(EntityKind::Pilot).len(),
            images = self.images.len(),
            "ingest complete"
        );
        Ok(())
    }

    /// Walk one entry directory; records are parsed in array order here,
    /// everything else is reached lazily through references.
    fn walk_entry(&mut self, kind: EntityKind, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            warn!(kind = kind.table_name(), dir = %dir.display(), "entry directory missing");
            return Ok(());
        }

        for path in descriptor_files(dir)? {
            let records = self.store.load(&path)?;
            for (index, record) in records.iter().enumerate() {
                if record.get("Properties").is_none() {
                    continue;
                }
                self.create_from_record_at(kind, &path, index)?;
            }
        }
        Ok(())
    }

    /// FactoryPreset ships two layouts across export versions: a flat
    /// directory, and `Personal/` + `Teams/` subdirectories. Presence of
    /// the subdirectories picks the layout.
    fn walk_factory_presets(&mut self, dir: &Path) -> Result<()> {
        let scoped: Vec<&str> = PRESET_SCOPES
            .iter()
            .copied()
            .filter(|scope| dir.join(scope).is_dir())
            .collect();

        if scoped.is_empty() {
            return self.walk_entry(EntityKind::Powerup, dir);
        }

        for scope in scoped {
            let scope_dir = dir.join(scope);
            let before: Vec<String> = self
                .registries
                .get(EntityKind::Powerup)
                .ids()
                .map(str::to_string)
                .collect();
            self.walk_entry(EntityKind::Powerup, &scope_dir)?;
            let registry = self.registries.get_mut(EntityKind::Powerup);
            let new_ids: Vec<String> = registry
                .ids()
                .filter(|id| !before.iter().any(|b| b == id))
                .map(str::to_string)
                .collect();
            for id in new_ids {
                registry
                    .get_mut(&id)
                    .expect("freshly interned")
                    .attrs
                    .insert("preset_scope".to_string(), Value::String(scope.to_string()));
            }
        }
        Ok(())
    }
}

/// All descriptor files under a directory, sorted for deterministic order.
fn descriptor_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ParseError::Io {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::io::Write;

    pub(crate) fn write_tree(root: &Path, files: &[(&str, Value)]) {
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            let mut f = fs::File::create(&path).unwrap();
            f.write_all(serde_json::to_string(content).unwrap().as_bytes())
                .unwrap();
        }
    }

    fn ingest_in(root: &Path) -> Ingest {
        Ingest::new(Options::new(root, "Root", root.join("out")))
    }

    #[test]
    fn create_from_reference_parses_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[(
                "Root/Content/Tags/T_Fast.json",
                json!([{"Type": "Tag", "Name": "T_Fast", "Properties": {"SortOrder": 3}}]),
            )],
        );

        let mut ing = ingest_in(dir.path());
        let id = ing
            .create_from_reference(EntityKind::Tag, "/Root/Tags/T_Fast.0")
            .unwrap();
        assert_eq!(id, "T_Fast.0");

        // Wipe the file; a second resolution must hit registry + cache.
        fs::remove_file(dir.path().join("Root/Content/Tags/T_Fast.json")).unwrap();
        let again = ing
            .create_from_reference(EntityKind::Tag, "/Root/Tags/T_Fast.0")
            .unwrap();
        assert_eq!(again, id);
        assert_eq!(ing.registries.get(EntityKind::Tag).len(), 1);
    }

    #[test]
    fn entry_walk_parses_records_in_array_order() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[(
                "Root/Content/GameModes/GM_Arena.json",
                json!([
                    {"Type": "GameMode", "Properties": {"MaxPlayers": 12}},
                    {"Type": "GameMode", "Properties": {"MaxPlayers": 6}}
                ]),
            )],
        );

        let mut ing = ingest_in(dir.path());
        ing.walk_entry(EntityKind::GameMode, &dir.path().join("Root/Content/GameModes"))
            .unwrap();

        let registry = ing.registries.get(EntityKind::GameMode);
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, ["GM_Arena.0", "GM_Arena.1"]);
    }

    #[test]
    fn factory_preset_layouts_are_probed_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                (
                    "Root/Content/FactoryPreset/Personal/P_Shield.json",
                    json!([{"Type": "Powerup", "Properties": {"Duration": 8}}]),
                ),
                (
                    "Root/Content/FactoryPreset/Teams/P_Beacon.json",
                    json!([{"Type": "Powerup", "Properties": {"Duration": 4}}]),
                ),
            ],
        );

        let mut ing = ingest_in(dir.path());
        ing.walk_factory_presets(&dir.path().join("Root/Content/FactoryPreset"))
            .unwrap();

        let registry = ing.registries.get(EntityKind::Powerup);
        assert_eq!(
            registry.get("P_Shield.0").unwrap().attrs["preset_scope"],
            json!("Personal")
        );
        assert_eq!(
            registry.get("P_Beacon.0").unwrap().attrs["preset_scope"],
            json!("Teams")
        );
    }

    #[test]
    fn flat_factory_preset_layout_still_works() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[(
                "Root/Content/FactoryPreset/P_Heal.json",
                json!([{"Type": "Powerup", "Properties": {"Duration": 2}}]),
            )],
        );

        let mut ing = ingest_in(dir.path());
        ing.walk_factory_presets(&dir.path().join("Root/Content/FactoryPreset"))
            .unwrap();
        let registry = ing.registries.get(EntityKind::Powerup);
        assert!(registry.get("P_Heal.0").is_some());
        assert!(!registry.get("P_Heal.0").unwrap().attrs.contains_key("preset_scope"));
    }
}
