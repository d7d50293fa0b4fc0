//! Powerup parser.

use serde_json::Value;

use crate::entities::actor::actor_class;
use crate::entities::{self, rarity_ref, store_attrs, tag_ref_list};
use crate::error::Result;
use crate::extract::{ExtractCtx, KeyAction, KeyMap, Rule};
use crate::ingest::Ingest;
use crate::localization::text;
use crate::registry::EntityKind;
use crate::template::merged_properties;

static POWERUP_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("Icon", KeyAction::With(entities::image)),
    ("Rarity", KeyAction::With(rarity_ref)),
    ("ActorClass", KeyAction::With(actor_class)),
    ("EffectClass", KeyAction::With(actor_class)),
    ("Duration", KeyAction::Value),
    ("RespawnTime", KeyAction::Value),
    ("PickupRadius", KeyAction::Value),
    ("bTeamWide", KeyAction::Value),
    ("bStacksWithSelf", KeyAction::Value),
    ("Tags", KeyAction::With(tag_ref_list)),
    ("PickupVFX", KeyAction::Drop),
    ("PickupSound", KeyAction::Drop),
    ("WorldMesh", KeyAction::Drop),
]);

pub fn parse(ing: &mut Ingest, id: &str, record: &Value) -> Result<()> {
    let ctx = ExtractCtx::new(id);
    let attrs = merged_properties(ing, &ctx, record, &POWERUP_KEYS)?;
    store_attrs(ing, EntityKind::Powerup, id, attrs);
    Ok(())
}
