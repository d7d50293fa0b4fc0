//! Game-mode parser.

use serde_json::Value;

use crate::entities::{self, powerup_ref_list, store_attrs, tag_ref_list};
use crate::error::Result;
use crate::extract::{ExtractCtx, KeyAction, KeyMap, Rule};
use crate::ingest::Ingest;
use crate::localization::text;
use crate::registry::EntityKind;
use crate::template::merged_properties;

static GAME_MODE_KEYS: KeyMap = KeyMap::new(&[
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("Icon", KeyAction::With(entities::image)),
    ("MaxPlayers", KeyAction::Value),
    ("TeamCount", KeyAction::Value),
    ("TeamSize", KeyAction::Value),
    ("MatchDuration", KeyAction::Value),
    ("ScoreLimit", KeyAction::Value),
    ("RespawnTime", KeyAction::Value),
    ("bRanked", KeyAction::Value),
    ("bAllowBots", KeyAction::Value),
    ("MinimumLevel", KeyAction::Value),
    ("Powerups", KeyAction::With(powerup_ref_list)),
    ("Tags", KeyAction::With(tag_ref_list)),
    ("MapPool", KeyAction::Drop),
    ("LoadingScreen", KeyAction::Drop),
    ("MusicSet", KeyAction::Drop),
]);

pub fn parse(ing: &mut Ingest, id: &str, record: &Value) -> Result<()> {
    let ctx = ExtractCtx::new(id);
    let attrs = merged_properties(ing, &ctx, record, &GAME_MODE_KEYS)?;
    store_attrs(ing, EntityKind::GameMode, id, attrs);
    Ok(())
}
