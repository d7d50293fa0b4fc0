//! Shared actor-class extraction.
//!
//! Ability and powerup properties frequently point at a blueprint class
//! rather than carrying data inline. The class record's real property bag
//! lives behind a `ClassDefaultObject` pointer, sometimes several hops
//! deep, so the parser follows the chain first and then extracts with one
//! large shared key-map. Buff and spawn fields recurse back into the same
//! parser; projectile entries get their own map layered on top.

use serde_json::Value;
use tracing::warn;

use crate::curves::rich_curve;
use crate::error::{ParseError, Result};
use crate::extract::{extract, ExtractCtx, KeyAction, KeyMap};
use crate::ingest::Ingest;
use crate::refpath::PathResolver;
use crate::template::merged_properties;

static ACTOR_KEYS: KeyMap = KeyMap::new(&[
    ("Damage", KeyAction::Value),
    ("DamageType", KeyAction::Value),
    ("DamageRadius", KeyAction::Value),
    ("ExplosionRadius", KeyAction::Value),
    ("Radius", KeyAction::Value),
    ("Duration", KeyAction::Value),
    ("TickInterval", KeyAction::Value),
    ("TickDamage", KeyAction::Value),
    ("Health", KeyAction::Value),
    ("MaxHealth", KeyAction::Value),
    ("LifeSpan", KeyAction::Value),
    ("InitialLifeSpan", KeyAction::Value),
    ("Speed", KeyAction::Value),
    ("InitialSpeed", KeyAction::Value),
    ("MaxSpeed", KeyAction::Value),
    ("Acceleration", KeyAction::Value),
    ("GravityScale", KeyAction::Value),
    ("bShouldBounce", KeyAction::Value),
    ("Bounciness", KeyAction::Value),
    ("bPiercing", KeyAction::Value),
    ("MaxPierceCount", KeyAction::Value),
    ("HomingAccelerationMagnitude", KeyAction::Value),
    ("bIsHomingProjectile", KeyAction::Value),
    ("bRotationFollowsVelocity", KeyAction::Value),
    ("bInitialVelocityInLocalSpace", KeyAction::Value),
    ("ProjectileGravityScale", KeyAction::Value),
    ("MinSpeed", KeyAction::Value),
    ("Friction", KeyAction::Value),
    ("BounceVelocityStopSimulatingThreshold", KeyAction::Value),
    ("MaxBounces", KeyAction::Value),
    ("ArmingDelay", KeyAction::Value),
    ("FuseTime", KeyAction::Value),
    ("ProximityRadius", KeyAction::Value),
    ("bDetonateOnImpact", KeyAction::Value),
    ("bDetonateOnExpiry", KeyAction::Value),
    ("bPenetratesShields", KeyAction::Value),
    ("ShieldDamageMultiplier", KeyAction::Value),
    ("ArmorDamageMultiplier", KeyAction::Value),
    ("StructureDamageMultiplier", KeyAction::Value),
    ("CritMultiplier", KeyAction::Value),
    ("SelfDamageScale", KeyAction::Value),
    ("FalloffStartDistance", KeyAction::Value),
    ("FalloffEndDistance", KeyAction::Value),
    ("MinDamageFraction", KeyAction::Value),
    ("ImpulseStrength", KeyAction::Value),
    ("RadialImpulseStrength", KeyAction::Value),
    ("bIgnoreOwner", KeyAction::Value),
    ("bFriendlyFire", KeyAction::Value),
    ("TeamFilter", KeyAction::Value),
    ("CollisionChannel", KeyAction::Value),
    ("CollisionRadius", KeyAction::Value),
    ("StackLimit", KeyAction::Value),
    ("bRefreshDurationOnStack", KeyAction::Value),
    ("HealAmount", KeyAction::Value),
    ("HealPerSecond", KeyAction::Value),
    ("ShieldAmount", KeyAction::Value),
    ("ShieldRegenDelay", KeyAction::Value),
    ("ShieldRegenRate", KeyAction::Value),
    ("EnergyRestored", KeyAction::Value),
    ("HeatGenerated", KeyAction::Value),
    ("HeatDissipated", KeyAction::Value),
    ("SpeedMultiplier", KeyAction::Value),
    ("DamageMultiplier", KeyAction::Value),
    ("DefenseMultiplier", KeyAction::Value),
    ("CooldownMultiplier", KeyAction::Value),
    ("EnergyRegenMultiplier", KeyAction::Value),
    ("ReloadSpeedMultiplier", KeyAction::Value),
    ("FireRateMultiplier", KeyAction::Value),
    ("AccuracyMultiplier", KeyAction::Value),
    ("RangeMultiplier", KeyAction::Value),
    ("HealingReceivedMultiplier", KeyAction::Value),
    ("IncomingDamageMultiplier", KeyAction::Value),
    ("bSlowsTarget", KeyAction::Value),
    ("bRootsTarget", KeyAction::Value),
    ("bSilencesTarget", KeyAction::Value),
    ("bRevealsTarget", KeyAction::Value),
    ("bBlocksHealing", KeyAction::Value),
    ("DispelType", KeyAction::Value),
    ("BuffCategory", KeyAction::Value),
    ("DamageOverTime", KeyAction::With(rich_curve)),
    ("DamageFalloff", KeyAction::With(rich_curve)),
    ("RadiusOverTime", KeyAction::With(rich_curve)),
    ("BuffOnSelf", KeyAction::With(actor_class)),
    ("BuffOnEnemy", KeyAction::With(actor_class)),
    ("BuffOnAlly", KeyAction::With(actor_class)),
    ("BuffOnArea", KeyAction::With(actor_class)),
    ("StackingBuffClass", KeyAction::With(actor_class)),
    ("ExplosionClass", KeyAction::With(actor_class)),
    ("SpawnActorAction", KeyAction::With(spawn_action)),
    ("ChildActorClass", KeyAction::With(actor_class)),
    ("OnExpireClass", KeyAction::With(actor_class)),
    // Presentation payloads carried on every blueprint.
    ("Mesh", KeyAction::Drop),
    ("StaticMesh", KeyAction::Drop),
    ("SkeletalMesh", KeyAction::Drop),
    ("RootComponent", KeyAction::Drop),
    ("ParticleSystem", KeyAction::Drop),
    ("NiagaraSystem", KeyAction::Drop),
    ("ImpactVFX", KeyAction::Drop),
    ("TrailVFX", KeyAction::Drop),
    ("SpawnSound", KeyAction::Drop),
    ("ImpactSound", KeyAction::Drop),
    ("LoopingSound", KeyAction::Drop),
    ("DecalMaterial", KeyAction::Drop),
    ("CameraShake", KeyAction::Drop),
    ("UberGraphFrame", KeyAction::Drop),
    ("DefaultSceneRoot", KeyAction::Drop),
    ("Sprite", KeyAction::Drop),
    ("PointLight", KeyAction::Drop),
    ("AudioComponent", KeyAction::Drop),
    ("CollisionComponent", KeyAction::Drop),
    ("ProjectileMovement", KeyAction::Drop),
    ("SphereComponent", KeyAction::Drop),
    ("OverrideMaterials", KeyAction::Drop),
    ("MaterialParameterCollection", KeyAction::Drop),
    ("bReplicates", KeyAction::Drop),
    ("bNetLoadOnClient", KeyAction::Drop),
    ("NetUpdateFrequency", KeyAction::Drop),
    ("NetCullDistanceSquared", KeyAction::Drop),
    ("SpawnCollisionHandlingMethod", KeyAction::Drop),
    ("PrimaryActorTick", KeyAction::Drop),
]);

static PROJECTILE_KEYS: KeyMap = KeyMap::new(&[
    ("ProjectileClass", KeyAction::With(actor_class)),
    ("ProjectileSpeed", KeyAction::Value),
    ("ProjectileCount", KeyAction::Value),
    ("SpreadAngle", KeyAction::Value),
    ("SpreadPattern", KeyAction::Value),
    ("SpawnDelay", KeyAction::Value),
    ("SalvoSize", KeyAction::Value),
    ("SalvoInterval", KeyAction::Value),
    ("ArcHeight", KeyAction::Value),
    ("bStaggeredSpawn", KeyAction::Value),
    ("bInheritOwnerVelocity", KeyAction::Value),
    ("SpawnOffset", KeyAction::Drop),
    ("SpawnSocket", KeyAction::Drop),
    ("MuzzleSocket", KeyAction::Drop),
]);

static SPAWN_KEYS: KeyMap = KeyMap::new(&[
    ("ActorClass", KeyAction::With(actor_class)),
    ("SpawnCount", KeyAction::Value),
    ("SpawnInterval", KeyAction::Value),
    ("SpawnRadius", KeyAction::Value),
    ("bAttachToOwner", KeyAction::Value),
    ("SpawnTransform", KeyAction::Drop),
]);

/// Resolve a class reference, follow its `ClassDefaultObject` chain, and
/// extract the default object's properties.
pub(crate) fn actor_class(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(reference) = PathResolver::reference_string(value) else {
        return Ok(None);
    };
    let reference = reference.to_string();
    let class_id = ing.resolver.to_id(&reference)?;

    // Reciprocal blueprints do occur in the tree. The inner occurrence
    // collapses to its id instead of re-entering the extraction.
    if ing.class_stack.contains(&class_id) {
        return Ok(Some(Value::String(class_id)));
    }

    let (path, index) = ing.resolver.to_file_path_and_index(&reference)?;
    let record = ing.store.record(&path, index)?;
    let record = follow_default_object(ing, &reference, record)?;

    ing.class_stack.push(class_id);
    let attrs = merged_properties(ing, ctx, &record, &ACTOR_KEYS);
    ing.class_stack.pop();

    let attrs = attrs?;
    if attrs.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Object(attrs)))
}

/// `ClassDefaultObject` is a pointer to the record holding the actual
/// property bag, and the target may itself be another class record. A
/// pointer seen twice means the chain loops and has no property bag.
fn follow_default_object(ing: &mut Ingest, reference: &str, mut record: Value) -> Result<Value> {
    let mut seen: Vec<String> = Vec::new();
    loop {
        let Some(pointer) = record
            .get("ClassDefaultObject")
            .and_then(PathResolver::reference_string)
            .map(str::to_string)
        else {
            return Ok(record);
        };
        if seen.contains(&pointer) {
            return Err(ParseError::MalformedReference {
                reference: reference.to_string(),
                message: format!("ClassDefaultObject chain loops through {pointer}"),
            });
        }
        let (path, index) = ing.resolver.to_file_path_and_index(&pointer)?;
        record = ing.store.record(&path, index)?;
        seen.push(pointer);
    }
}

/// `ProjectileTypes` list elements.
pub(crate) fn projectile_types(
    ing: &mut Ingest,
    ctx: &ExtractCtx<'_>,
    value: &Value,
) -> Result<Option<Value>> {
    let Some(items) = value.as_array() else {
        warn!(entity = %ctx.entity, key = "ProjectileTypes", value = %value, "expected a projectile list");
        return Ok(None);
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(props) = item.as_object() else {
            warn!(entity = %ctx.entity, key = "ProjectileTypes", value = %item, "projectile entry is not an object");
            continue;
        };
        let extracted = extract(ing, ctx, props, &PROJECTILE_KEYS)?;
        if !extracted.is_empty() {
            out.push(Value::Object(extracted));
        }
    }
    if out.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Array(out)))
}

fn spawn_action(ing: &mut Ingest, ctx: &ExtractCtx<'_>, value: &Value) -> Result<Option<Value>> {
    let Some(props) = value.as_object() else {
        warn!(entity = %ctx.entity, key = "SpawnActorAction", value = %value, "expected a spawn action");
        return Ok(None);
    };
    let extracted = extract(ing, ctx, props, &SPAWN_KEYS)?;
    if extracted.is_empty() {
        return Ok(None);
    }
    Ok(Some(Value::Object(extracted)))
}
