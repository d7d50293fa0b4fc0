//! Ability parser.
//!
//! The most heterogeneous record shape in the tree: targeting, projectile
//! spawning, charge/burst/fire behavior, buff application, movement
//! modification and AI hints all hang off one property bag, and almost
//! every key is optional. The map below is the contract with the export:
//! keys the pipeline consumes route to parsers, keys known to exist but
//! deliberately skipped are `Drop` entries so drift warnings stay quiet,
//! and anything else is drift worth a warning.

use serde_json::Value;
use tracing::warn;

use crate::curves::rich_curve;
use crate::entities::actor::{actor_class, projectile_types};
use crate::entities::{self, store_attrs, tag_ref_list};
use crate::error::Result;
use crate::extract::{extract, ExtractCtx, KeyAction, KeyMap, Rule};
use crate::ingest::Ingest;
use crate::localization::text;
use crate::refpath::PathResolver;
use crate::registry::EntityKind;
use crate::template::merged_properties;

static ABILITY_KEYS: KeyMap = KeyMap::new(&[
    // Identity and presentation.
    ("Title", KeyAction::Rule(Rule::with(text).named("name"))),
    ("AbilityName", KeyAction::Rule(Rule::with(text).named("name"))),
    ("Description", KeyAction::With(text)),
    ("ShortDescription", KeyAction::With(text)),
    ("TooltipText", KeyAction::With(text)),
    ("Icon", KeyAction::With(entities::image)),
    ("AbilityIcon", KeyAction::With(entities::image)),
    ("Tags", KeyAction::With(tag_ref_list)),
    // Core numbers.
    ("Cooldown", KeyAction::Value),
    ("CooldownTime", KeyAction::Value),
    ("EnergyCost", KeyAction::Value),
    ("HeatCost", KeyAction::Value),
    ("CastTime", KeyAction::Value),
    ("CastRange", KeyAction::Value),
    ("Range", KeyAction::Value),
    ("MinRange", KeyAction::Value),
    ("Duration", KeyAction::Value),
    ("TickInterval", KeyAction::Value),
    ("MaxCharges", KeyAction::Value),
    ("ChargeRestoreTime", KeyAction::Value),
    ("ActivationDelay", KeyAction::Value),
    ("bCanMoveWhileCasting", KeyAction::Value),
    ("bCanUseWhileAirborne", KeyAction::Value),
    ("bCanUseWhileStunned", KeyAction::Value),
    ("bInterruptible", KeyAction::Value),
    ("bPassive", KeyAction::Value),
    ("bToggleable", KeyAction::Value),
    ("ToggleDrainPerSecond", KeyAction::Value),
    ("AbilityLevelCap", KeyAction::Value),
    ("RequiredPilotLevel", KeyAction::Value),
    ("GlobalCooldownGroup", KeyAction::Value),
    ("SharedCooldownTags", KeyAction::Value),
    ("InterruptRefundFraction", KeyAction::Value),
    // Targeting.
    ("TargetingType", KeyAction::Value),
    ("TargetFilter", KeyAction::Value),
    ("TargetTeam", KeyAction::Value),
    ("AimAssistAngle", KeyAction::Value),
    ("AimAssistRange", KeyAction::Value),
    ("TargetingRadius", KeyAction::Value),
    ("TargetingAngle", KeyAction::Value),
    ("TargetingConeHalfAngle", KeyAction::Value),
    ("MaxTargets", KeyAction::Value),
    ("TargetPriority", KeyAction::Value),
    ("bRequiresLineOfSight", KeyAction::Value),
    ("bTargetGround", KeyAction::Value),
    ("bTargetSelf", KeyAction::Value),
    ("bAutoTargetNearest", KeyAction::Value),
    ("bLockOnRequired", KeyAction::Value),
    ("LockOnTime", KeyAction::Value),
    ("LockOnBreakAngle", KeyAction::Value),
    ("GroundPlacementRadius", KeyAction::Value),
    ("TargetingDecalSize", KeyAction::Drop),
    ("TargetingReticleClass", KeyAction::Drop),
    // Damage and direct effects.
    ("Damage", KeyAction::Value),
    ("DamageType", KeyAction::Value),
    ("DamageRadius", KeyAction::Value),
    ("SelfDamage", KeyAction::Value),
    ("HealAmount", KeyAction::Value),
    ("ShieldAmount", KeyAction::Value),
    ("ArmorPenetration", KeyAction::Value),
    ("ShieldPenetration", KeyAction::Value),
    ("CritChanceBonus", KeyAction::Value),
    ("CritDamageBonus", KeyAction::Value),
    ("KnockbackForce", KeyAction::Value),
    ("KnockupForce", KeyAction::Value),
    ("PullStrength", KeyAction::Value),
    ("StunDuration", KeyAction::Value),
    ("SlowAmount", KeyAction::Value),
    ("SlowDuration", KeyAction::Value),
    ("BurnDamagePerSecond", KeyAction::Value),
    ("BurnDuration", KeyAction::Value),
    ("EMPDuration", KeyAction::Value),
    ("HeatTransferred", KeyAction::Value),
    ("EnergyDrained", KeyAction::Value),
    ("LifeStealFraction", KeyAction::Value),
    ("DamageOverDistance", KeyAction::With(rich_curve)),
    ("DamageOverTime", KeyAction::With(rich_curve)),
    ("EffectOverTime", KeyAction::With(rich_curve)),
    // Projectiles and spawned actors.
    ("ActorClass", KeyAction::With(actor_class)),
    ("ProjectileTypes", KeyAction::With(projectile_types)),
    ("SpawnActorClass", KeyAction::With(actor_class)),
    ("AreaEffectClass", KeyAction::With(actor_class)),
    ("ProjectileSpawnCount", KeyAction::Value),
    ("ProjectileSpreadAngle", KeyAction::Value),
    ("bSequentialSpawn", KeyAction::Value),
    ("TurretClass", KeyAction::With(actor_class)),
    ("DeployableClass", KeyAction::With(actor_class)),
    ("BeamClass", KeyAction::With(actor_class)),
    ("BeamTickInterval", KeyAction::Value),
    ("BeamWidth", KeyAction::Value),
    ("MaxDeployedCount", KeyAction::Value),
    ("DeployableLifetime", KeyAction::Value),
    // Buff application.
    ("BuffOnSelf", KeyAction::With(actor_class)),
    ("BuffOnEnemy", KeyAction::With(actor_class)),
    ("BuffOnAlly", KeyAction::With(actor_class)),
    ("BuffOnArea", KeyAction::With(actor_class)),
    ("BuffOnHit", KeyAction::With(actor_class)),
    ("BuffOnKill", KeyAction::With(actor_class)),
    ("StackingBuffClass", KeyAction::With(actor_class)),
    ("DebuffCleanseTags", KeyAction::Value),
    ("BuffDuration", KeyAction::Value),
    ("BuffStackLimit", KeyAction::Value),
    ("BuffRadius", KeyAction::Value),
    ("bBuffPersistsThroughDeath", KeyAction::Value),
    // Charge behavior.
    ("ChargingBehavior", KeyAction::With(charging_behavior)),
    ("ChargeTime", KeyAction::Value),
    ("MaxChargeMultiplier", KeyAction::Value),
    ("MinChargeFraction", KeyAction::Value),
    ("ChargeDecayRate", KeyAction::Value),
    ("bReleaseOnFullCharge", KeyAction::Value),
    ("bChargeCarriesBetweenCasts", KeyAction::Value),
    // Burst and fire behavior.
    ("BurstBehavior", KeyAction::With(burst_behavior)),
    ("ShotsPerBurst", KeyAction::Value),
    ("TimeBetweenShots", KeyAction::Value),
    ("TimeBetweenBursts", KeyAction::Value),
    ("FireRate", KeyAction::Value),
    ("AmmoPerShot", KeyAction::Value),
    ("MagazineSize", KeyAction::Value),
    ("ReloadTime", KeyAction::Value),
    ("SpinUpTime", KeyAction::Value),
    ("SpinDownTime", KeyAction::Value),
    ("OverheatThreshold", KeyAction::Value),
    ("OverheatLockoutTime", KeyAction::Value),
    ("RecoilPerShot", KeyAction::Value),
    ("RecoilRecoveryRate", KeyAction::Value),
    ("SpreadPerShot", KeyAction::Value),
    ("SpreadRecoveryRate", KeyAction::Value),
    ("MaxSpread", KeyAction::Value),
    ("AccuracyOverDistance", KeyAction::With(rich_curve)),
    // Movement modification.
    ("MovementModifier", KeyAction::With(movement_modifier)),
    ("DashDistance", KeyAction::Value),
    ("DashSpeed", KeyAction::Value),
    ("DashInvulnerabilityWindow", KeyAction::Value),
    ("JumpHeight", KeyAction::Value),
    ("HoverDuration", KeyAction::Value),
    ("TeleportRange", KeyAction::Value),
    ("bStopsMovement", KeyAction::Value),
    ("bBreaksRoots", KeyAction::Value),
    // AI.
    ("AIConditions", KeyAction::With(ai_conditions)),
    ("AIPriority", KeyAction::Value),
    ("AIMinimumRange", KeyAction::Value),
    ("AIMaximumRange", KeyAction::Value),
    ("AIScoreCurve", KeyAction::With(rich_curve)),
    ("bAIUsableOnlyWhenLosing", KeyAction::Value),
    // Recognized but unconsumed; usage in the source data is unknown.
    ("LegacyChannel", KeyAction::Drop),
    ("AbilityGroupMask", KeyAction::Drop),
    ("InternalOrdering", KeyAction::Drop),
    ("DeprecatedScale", KeyAction::Drop),
    ("PrototypeFlags", KeyAction::Drop),
    ("EditorOnlyNotes", KeyAction::Drop),
    ("BalanceRevision", KeyAction::Drop),
    ("TuningGroup", KeyAction::Drop),
    // Presentation payloads.
    ("Montage", KeyAction::Drop),
    ("CastMontage", KeyAction::Drop),
    ("AnimationSet", KeyAction::Drop),
    ("CastVFX", KeyAction::Drop),
    ("ImpactVFX", KeyAction::Drop),
    ("TrailVFX", KeyAction::Drop),
    ("MuzzleVFX", KeyAction::Drop),
    ("CastSound", KeyAction::Drop),
    ("ImpactSound", KeyAction::Drop),
    ("LoopingSound", KeyAction::Drop),
    ("VoiceLine", KeyAction::Drop),
    ("CameraShake", KeyAction::Drop),
    ("ScreenEffect", KeyAction::Drop),
    ("CrosshairOverride", KeyAction::Drop),
    ("HUDWidgetClass", KeyAction::Drop),
    ("ChargeUpSound", KeyAction::Drop),
    ("ChargeLoopSound", KeyAction::Drop),
    ("ReloadSound", KeyAction::Drop),
    ("OverheatSound", KeyAction::Drop),
    ("MuzzleFlash", KeyAction::Drop),
    ("TracerEffect", KeyAction::Drop),
    ("ShellEjectEffect", KeyAction::Drop),
    ("KillFeedIcon", KeyAction::Drop),
    ("CooldownWidgetStyle", KeyAction::Drop),
    ("InputActionOverride", KeyAction::Drop),
    ("GamepadRumblePattern", KeyAction::Drop),
]);

static CHARGING_KEYS: KeyMap = KeyMap::new(&[
    ("TimeToCharge", KeyAction::Value),
    ("MaxChargeTime", KeyAction::Value),
    ("bAutoRelease", KeyAction::Value),
    ("ChargeModifiers", KeyAction::With(charge_modifiers)),
    ("ChargeVFX", KeyAction::Drop),
    ("ChargeSound", KeyAction::Drop),
]);

static CHARGE_MODIFIER_KEYS: KeyMap = KeyMap::new(&[
    ("ModifiedQuantity", KeyAction::Rule(Rule::value().named("quantity"))),
    ("Curve", KeyAction::With(rich_curve)),
    ("ModifierCurve", KeyAction::With(rich_curve)),
    ("Multiplier", KeyAction::Value),
]);

static BURST_KEYS: KeyMap = KeyMap::new(&[
    ("BurstLength", KeyAction::Value),
    ("ShotsPerBurst", KeyAction::Value),
    ("TimeBetweenBursts", KeyAction::Value),
    ("TimeBetweenShots", KeyAction::Value),
]);

static MOVEMENT_MODIFIER_KEYS: KeyMap = KeyMap::new(&[
    ("SpeedMultiplier", KeyAction::Value),
    ("AccelerationMultiplier", KeyAction::Value),
    ("TurnRateMultiplier", KeyAction::Value),
    ("Duration", KeyAction::Value),
    ("bAffectsAllies", KeyAction::Value),
    ("ModifierCurve", KeyAction::With(rich_curve)),
]);

static CONDITION_KEYS: KeyMap = KeyMap::new(&[
    ("ConditionType", KeyAction::Value),
    ("Comparison", KeyAction::Value),
    ("Threshold", KeyAction::Value),
    ("TargetFilter", KeyAction::Value),
    ("Range", KeyAction::Value),
    ("bInvert", KeyAction::Value),
    ("Weight", KeyAction::Value),
]);

pub fn parse(ing: &mut Ingest, id: &str, record: &Value) -> Result<()> {
    let ctx = ExtractCtx::new(id);
    let attrs = merged_properties(ing, &ctx, record, &ABILITY_KEYS)?;
    store_attrs(ing, EntityKind::Ability, id, attrs);
    Ok(())
}

pub(crate) fn charging_behavior(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    sub_object(ing, ctx, "ChargingBehavior", value, &CHARGING_KEYS)
}

pub(crate) fn burst_behavior(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    sub_object(ing, ctx, "BurstBehavior", value, &BURST_KEYS)
}

fn movement_modifier(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    sub_object(ing, ctx, "MovementModifier", value, &MOVEMENT_MODIFIER_KEYS)
}

/// `ChargeModifiers` is a list of `{ModifiedQuantity, Curve}` entries.
pub(crate) fn charge_modifiers(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(entity = %ctx.entity, key = "ChargeModifiers", value = %value, "expected a modifier list");
        return Ok(None);
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if let Some(modifier) = sub_object(ing, ctx, "ChargeModifiers", item, &CHARGE_MODIFIER_KEYS)? {
            out.push(modifier);
        }
    }
    if out.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Array(out)))
}

/// AI conditions are references to records of their own, each resolved
/// with full template inheritance. An empty list is dropped.
fn ai_conditions(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(entity = %ctx.entity, key = "AIConditions", value = %value, "expected a condition list");
        return Ok(None);
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let condition = match PathResolver::reference_string(item) {
            Some(reference) => {
                let reference = reference.to_string();
                let (path, index) = ing.resolver.to_file_path_and_index(&reference)?;
                let record = ing.store.record(&path, index)?;
                merged_properties(ing, ctx, &record, &CONDITION_KEYS)?
            }
            None => match item.as_object() {
                Some(props) => extract(ing, ctx, props, &CONDITION_KEYS)?,
                None => continue,
            },
        };
        if !condition.is_empty() {
            out.push(Value::Object(condition));
        }
    }
    if out.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Array(out)))
}

fn sub_object(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    key: &str,
    value: &Value,
    map: &KeyMap,
) -> Result<Option<Value>> {
    let Some(props) = value.as_object() else {
        warn!(entity = %ctx.entity, key = %key, value = %value, "expected an object");
        return Ok(None);
    };
    let extracted = extract(ing, ctx, props, map)?;
    if extracted.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Object(extracted)))
}
