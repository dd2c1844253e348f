//! Attack resolution
//!
//! `CombatModule` owns one [`AttackProfile`] and the bookkeeping that goes
//! with it: cooldown, fire-mode cadence, dynamic spread and in-flight
//! projectiles. Everything it touches in the world comes in through an
//! [`AttackContext`] built by the caller for the current tick.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use void_math::{move_towards, ray_sphere_at, segment_sphere, LineOfSight, Pose, Ray, Vec3};

use crate::damage::{DamageInfo, DamageType};
use crate::damageable::{Damageable, Targetable};
use crate::effects::{EffectEvent, EffectKind, EffectSpawner};
use crate::entity::{EntityId, Faction};
use crate::target::{SharedTarget, TargetHandle, TargetPool};

/// Timer values at or below this count as elapsed
const TIMER_EPSILON: f32 = 1e-4;

/// Ranged cadence pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    /// One shot per request, then the cooldown
    #[default]
    Single,
    /// `burst_count` shots, then `burst_delay`
    Burst,
    /// Continuous until stopped
    FullAuto,
}

/// How an attack reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Arc scan in front of the attacker
    #[default]
    Melee,
    /// Instantaneous trace
    Hitscan,
    /// Travelling projectile
    Projectile,
}

/// Attack parameters. Angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackProfile {
    pub damage: f32,
    /// Effective range
    pub range: f32,
    /// Delay after a melee strike or a single shot
    pub cooldown: f32,
    pub delivery: Delivery,
    pub fire_mode: FireMode,
    pub burst_count: u32,
    /// Time between shots
    pub fire_interval: f32,
    /// Pause between bursts
    pub burst_delay: f32,
    pub base_spread: f32,
    pub spread_increment: f32,
    /// Degrees per second recovered while not firing
    pub spread_recovery: f32,
    pub max_spread: f32,
    /// 1.0 is perfect aim
    pub aim_accuracy: f32,
    /// Degrees of extra spread at zero accuracy
    pub accuracy_scale: f32,
    /// Full melee arc
    pub melee_angle: f32,
    pub projectile_speed: f32,
    pub projectile_lifetime: f32,
    /// Impulse applied along the hit direction
    pub knockback: f32,
}

impl Default for AttackProfile {
    fn default() -> Self {
        Self {
            damage: 10.0,
            range: 2.0,
            cooldown: 1.0,
            delivery: Delivery::Melee,
            fire_mode: FireMode::Single,
            burst_count: 3,
            fire_interval: 0.1,
            burst_delay: 0.6,
            base_spread: 1.0,
            spread_increment: 0.5,
            spread_recovery: 4.0,
            max_spread: 6.0,
            aim_accuracy: 0.9,
            accuracy_scale: 5.0,
            melee_angle: 90.0,
            projectile_speed: 30.0,
            projectile_lifetime: 3.0,
            knockback: 0.0,
        }
    }
}

impl AttackProfile {
    /// Melee profile
    pub fn melee(damage: f32, range: f32, cooldown: f32) -> Self {
        Self {
            damage,
            range,
            cooldown,
            ..Default::default()
        }
    }

    /// Hitscan profile
    pub fn ranged(damage: f32, range: f32, fire_mode: FireMode) -> Self {
        Self {
            damage,
            range,
            delivery: Delivery::Hitscan,
            fire_mode,
            ..Default::default()
        }
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_fire_interval(mut self, interval: f32) -> Self {
        self.fire_interval = interval;
        self
    }

    pub fn with_burst(mut self, count: u32, delay: f32) -> Self {
        self.burst_count = count;
        self.burst_delay = delay;
        self
    }

    pub fn with_spread(mut self, base: f32, increment: f32, recovery: f32, max: f32) -> Self {
        self.base_spread = base;
        self.spread_increment = increment;
        self.spread_recovery = recovery;
        self.max_spread = max;
        self
    }

    pub fn with_accuracy(mut self, accuracy: f32, scale: f32) -> Self {
        self.aim_accuracy = accuracy;
        self.accuracy_scale = scale;
        self
    }

    pub fn with_knockback(mut self, force: f32) -> Self {
        self.knockback = force;
        self
    }

    pub fn is_ranged(&self) -> bool {
        self.delivery != Delivery::Melee
    }

    /// Upper spread bound; never below the base
    pub fn spread_ceiling(&self) -> f32 {
        self.max_spread.max(self.base_spread)
    }

    fn damage_type(&self) -> DamageType {
        match self.delivery {
            Delivery::Melee => DamageType::Melee,
            Delivery::Hitscan | Delivery::Projectile => DamageType::Ranged,
        }
    }
}

/// World access for one tick of combat
pub struct AttackContext<'a> {
    pub attacker: EntityId,
    pub faction: Faction,
    /// Attacker feet pose
    pub pose: Pose,
    /// Where shots originate
    pub muzzle: Vec3,
    pub targets: &'a TargetPool,
    pub sight: &'a dyn LineOfSight,
    pub effects: &'a dyn EffectSpawner,
}

impl<'a> AttackContext<'a> {
    fn effect(&self, kind: EffectKind, position: Vec3) {
        self.effects.spawn(EffectEvent::new(kind, self.attacker, position));
    }
}

/// A shot in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub owner: EntityId,
    pub faction: Faction,
    pub position: Vec3,
    pub velocity: Vec3,
    pub damage: f32,
    pub knockback: f32,
    pub remaining: f32,
}

/// Running totals for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    pub shots_fired: u32,
    pub strikes: u32,
    pub hits: u32,
    pub kills: u32,
    pub damage_dealt: f32,
}

/// Melee and ranged attack driver
#[derive(Debug)]
pub struct CombatModule {
    profile: AttackProfile,
    current_spread: f32,
    firing: bool,
    shot_timer: f32,
    burst_shots: u32,
    cooldown: f32,
    aim: Option<TargetHandle>,
    damage_multiplier: f32,
    projectiles: Vec<Projectile>,
    stats: CombatStats,
    rng: ChaCha8Rng,
}

impl CombatModule {
    pub fn new(profile: AttackProfile, seed: u64) -> Self {
        Self {
            current_spread: profile.base_spread,
            profile,
            firing: false,
            shot_timer: 0.0,
            burst_shots: 0,
            cooldown: 0.0,
            aim: None,
            damage_multiplier: 1.0,
            projectiles: Vec::new(),
            stats: CombatStats::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn profile(&self) -> &AttackProfile {
        &self.profile
    }

    /// Replace the profile and clear all bookkeeping
    pub fn set_profile(&mut self, profile: AttackProfile) {
        self.profile = profile;
        self.reset();
    }

    /// Clear cadence, spread, cooldown, projectiles and modifiers
    pub fn reset(&mut self) {
        self.current_spread = self.profile.base_spread;
        self.firing = false;
        self.shot_timer = 0.0;
        self.burst_shots = 0;
        self.cooldown = 0.0;
        self.aim = None;
        self.damage_multiplier = 1.0;
        self.projectiles.clear();
    }

    pub fn current_spread(&self) -> f32 {
        self.current_spread
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown <= TIMER_EPSILON
    }

    /// Outgoing damage modifier (rage)
    pub fn set_damage_multiplier(&mut self, multiplier: f32) {
        self.damage_multiplier = multiplier.max(0.0);
    }

    pub fn damage_multiplier(&self) -> f32 {
        self.damage_multiplier
    }

    pub fn stats(&self) -> CombatStats {
        self.stats
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Start cooldown without attacking (e.g. after a scripted move)
    pub fn trigger_cooldown(&mut self, duration: f32) {
        self.cooldown = self.cooldown.max(duration);
    }

    /// Attack `target`.
    ///
    /// Melee resolves immediately when the cooldown allows it; ranged
    /// profiles start (or keep) firing and shots are resolved by
    /// [`update`](Self::update). Returns true if anything was started or struck.
    pub fn attack(&mut self, target: &TargetHandle, ctx: &AttackContext) -> bool {
        if self.profile.is_ranged() {
            self.request_fire(target)
        } else {
            if !self.is_ready() {
                return false;
            }
            self.melee_strike(ctx);
            true
        }
    }

    /// Begin firing at `target`, or retarget an active sequence
    pub fn request_fire(&mut self, target: &TargetHandle) -> bool {
        if self.firing {
            self.aim = Some(target.clone());
            return true;
        }
        if !self.is_ready() {
            return false;
        }
        self.aim = Some(target.clone());
        self.firing = true;
        self.shot_timer = 0.0;
        self.burst_shots = 0;
        true
    }

    /// Cancel any burst or automatic sequence. Idempotent.
    pub fn stop_firing(&mut self) {
        if self.firing {
            log::trace!("stop firing");
        }
        self.firing = false;
        self.shot_timer = 0.0;
        self.burst_shots = 0;
        self.aim = None;
    }

    /// Advance spread, cooldown, fire cadence and projectiles by `delta`
    pub fn update(&mut self, delta: f32, ctx: &AttackContext) {
        let delta = delta.max(0.0);

        if !self.firing {
            self.current_spread = move_towards(
                self.current_spread,
                self.profile.base_spread,
                self.profile.spread_recovery * delta,
            );
        }
        self.cooldown = (self.cooldown - delta).max(0.0);

        if self.firing {
            self.run_cadence(delta, ctx);
        }

        self.advance_projectiles(delta, ctx);
    }

    fn run_cadence(&mut self, delta: f32, ctx: &AttackContext) {
        let Some(target) = self.aim.as_ref().and_then(TargetHandle::resolve) else {
            self.stop_firing();
            return;
        };

        let interval = self.profile.fire_interval.max(TIMER_EPSILON * 10.0);
        while self.firing && self.shot_timer <= TIMER_EPSILON {
            self.fire_shot(&target, ctx);
            match self.profile.fire_mode {
                FireMode::Single => {
                    self.firing = false;
                    self.aim = None;
                    self.shot_timer = 0.0;
                    self.cooldown = self.profile.cooldown;
                }
                FireMode::Burst => {
                    self.burst_shots += 1;
                    if self.burst_shots >= self.profile.burst_count.max(1) {
                        self.burst_shots = 0;
                        self.shot_timer += self.profile.burst_delay.max(interval);
                    } else {
                        self.shot_timer += interval;
                    }
                }
                FireMode::FullAuto => self.shot_timer += interval,
            }
        }
        if self.firing {
            self.shot_timer -= delta;
        }
    }

    fn fire_shot(&mut self, target: &SharedTarget, ctx: &AttackContext) {
        let aim_point = target.read().aim_point();
        let direction = (aim_point - ctx.muzzle).normalize_or(ctx.pose.forward);
        let direction = self.perturb(direction);

        self.stats.shots_fired += 1;
        self.current_spread = (self.current_spread + self.profile.spread_increment)
            .clamp(self.profile.base_spread, self.profile.spread_ceiling());
        ctx.effect(EffectKind::Shot, ctx.muzzle);

        match self.profile.delivery {
            Delivery::Projectile => self.projectiles.push(Projectile {
                owner: ctx.attacker,
                faction: ctx.faction,
                position: ctx.muzzle,
                velocity: direction * self.profile.projectile_speed,
                damage: self.profile.damage * self.damage_multiplier,
                knockback: self.profile.knockback,
                remaining: self.profile.projectile_lifetime,
            }),
            _ => self.trace_shot(direction, ctx),
        }
    }

    /// Rotate `direction` by a random angle inside the current cone
    fn perturb(&mut self, direction: Vec3) -> Vec3 {
        let accuracy = self.profile.aim_accuracy.clamp(0.0, 1.0);
        let cone = self.current_spread + (1.0 - accuracy) * self.profile.accuracy_scale;
        if cone <= 0.0 {
            return direction;
        }
        let spin: f32 = self.rng.gen_range(0.0..360.0);
        let tilt = cone * self.rng.gen::<f32>().sqrt();
        let axis = direction.any_orthogonal().rotate_around(direction, spin);
        direction.rotate_around(axis, tilt).normalize_or(direction)
    }

    fn trace_shot(&mut self, direction: Vec3, ctx: &AttackContext) {
        let range = self.profile.range;
        let end = ctx.muzzle + direction * range;
        let wall = ctx.sight.trace(ctx.muzzle, end);
        let limit = wall.map(|w| w.distance).unwrap_or(range);
        let ray = Ray::new(ctx.muzzle, direction);

        let hit = ctx
            .targets
            .candidates(ctx.faction.opponent(), ctx.attacker)
            .into_iter()
            .filter_map(|c| ray_sphere_at(&ray, c.aim_point, c.hit_radius).map(|t| (t, c)))
            .filter(|(t, _)| *t <= limit)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match hit {
            Some((t, candidate)) => {
                let point = ray.at(t);
                let normal = (point - candidate.aim_point).normalize_or(-direction);
                let damage = self.profile.damage * self.damage_multiplier;
                self.deliver(&candidate.target, damage, point, normal, direction * self.profile.knockback, ctx);
            }
            None => {
                if let Some(w) = wall {
                    ctx.effect(EffectKind::Impact, w.point);
                }
            }
        }
    }

    fn advance_projectiles(&mut self, delta: f32, ctx: &AttackContext) {
        if self.projectiles.is_empty() {
            return;
        }
        let mut in_flight = std::mem::take(&mut self.projectiles);
        in_flight.retain_mut(|p| {
            let from = p.position;
            let to = from + p.velocity * delta;
            let wall = ctx.sight.trace(from, to);
            let limit = wall.map(|w| w.distance).unwrap_or(f32::INFINITY);

            let hit = ctx
                .targets
                .candidates(p.faction.opponent(), p.owner)
                .into_iter()
                .filter_map(|c| segment_sphere(from, to, c.aim_point, c.hit_radius).map(|t| (t, c)))
                .filter(|(t, _)| *t <= limit)
                .min_by(|a, b| a.0.total_cmp(&b.0));

            if let Some((t, candidate)) = hit {
                let direction = p.velocity.normalize_or(ctx.pose.forward);
                let point = from + direction * t;
                let normal = (point - candidate.aim_point).normalize_or(-direction);
                self.deliver(&candidate.target, p.damage, point, normal, direction * p.knockback, ctx);
                return false;
            }
            if let Some(w) = wall {
                ctx.effect(EffectKind::Impact, w.point);
                return false;
            }

            p.position = to;
            p.remaining -= delta;
            p.remaining > 0.0
        });
        self.projectiles = in_flight;
    }

    /// Strike every opponent inside the melee arc. Returns the number hit.
    pub fn melee_strike(&mut self, ctx: &AttackContext) -> usize {
        let half_angle = self.profile.melee_angle * 0.5;
        let origin = ctx.pose.position;
        let damage = self.profile.damage * self.damage_multiplier;

        self.cooldown = self.profile.cooldown;
        self.stats.strikes += 1;
        ctx.effect(EffectKind::MeleeSwing, origin);

        let mut struck = 0;
        for candidate in ctx.targets.candidates(ctx.faction.opponent(), ctx.attacker) {
            let offset = candidate.position - origin;
            if offset.length() > self.profile.range + candidate.hit_radius {
                continue;
            }
            let bearing = offset.horizontal();
            if bearing.length_squared() > f32::EPSILON && ctx.pose.forward.angle_between(bearing) > half_angle {
                continue;
            }
            let normal = (-offset).normalize_or(-ctx.pose.forward);
            let push = bearing.normalize_or(ctx.pose.forward) * self.profile.knockback;
            self.deliver(&candidate.target, damage, candidate.aim_point, normal, push, ctx);
            struck += 1;
        }
        struck
    }

    /// Area damage with radial knockback around `center`. Returns the number hit.
    pub fn area_strike(&mut self, ctx: &AttackContext, center: Vec3, radius: f32, damage: f32, knockback: f32) -> usize {
        let damage = damage * self.damage_multiplier;
        let mut struck = 0;
        for candidate in ctx.targets.candidates(ctx.faction.opponent(), ctx.attacker) {
            if candidate.position.distance(center) > radius {
                continue;
            }
            let outward = (candidate.position - center).horizontal().normalize_or(ctx.pose.forward);
            let push = (outward + Vec3::Y * 0.25) * knockback;
            self.deliver(&candidate.target, damage, candidate.aim_point, outward, push, ctx);
            struck += 1;
        }
        struck
    }

    /// Direct hit on one entity (charge contact)
    pub fn contact_strike(&mut self, ctx: &AttackContext, target: &SharedTarget, damage: f32, knockback: Vec3) {
        let aim_point = target.read().aim_point();
        let normal = (ctx.pose.position - aim_point).horizontal().normalize_or(-ctx.pose.forward);
        let damage = damage * self.damage_multiplier;
        self.deliver(target, damage, aim_point, normal, knockback, ctx);
    }

    fn deliver(
        &mut self,
        target: &SharedTarget,
        amount: f32,
        point: Vec3,
        normal: Vec3,
        knockback: Vec3,
        ctx: &AttackContext,
    ) {
        let info = DamageInfo::new(amount, self.profile.damage_type())
            .with_source(ctx.attacker)
            .with_hit(point, normal)
            .with_knockback(knockback);

        let (dealt, killed) = {
            let mut t = target.write();
            let was_alive = t.is_alive();
            let dealt = t.take_damage(&info);
            (dealt, was_alive && !t.is_alive())
        };
        if dealt > 0.0 {
            self.stats.hits += 1;
            self.stats.damage_dealt += dealt;
            ctx.effect(EffectKind::Hit, point);
        }
        if killed {
            self.stats.kills += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::effects::{EffectLog, NoEffects};
    use approx::assert_abs_diff_eq;
    use parking_lot::RwLock;
    use std::sync::Arc;
    use void_math::{ObstacleField, OpenField, AABB};

    struct Range {
        pool: TargetPool,
        target: Arc<RwLock<Actor>>,
    }

    fn range_with_target(position: Vec3, health: f32) -> Range {
        let pool = TargetPool::new();
        let target = Arc::new(RwLock::new(Actor::new(EntityId(2), Faction::Ally, health).at(position)));
        let shared: SharedTarget = target.clone();
        pool.register(&shared);
        Range { pool, target }
    }

    fn ctx<'a>(pool: &'a TargetPool, sight: &'a dyn LineOfSight, effects: &'a dyn EffectSpawner) -> AttackContext<'a> {
        AttackContext {
            attacker: EntityId(1),
            faction: Faction::Hostile,
            pose: Pose::default(),
            muzzle: Vec3::new(0.0, 1.0, 0.0),
            targets: pool,
            sight,
            effects,
        }
    }

    fn handle(range: &Range) -> TargetHandle {
        range.pool.get(EntityId(2)).unwrap()
    }

    fn precise(mode: FireMode) -> AttackProfile {
        AttackProfile::ranged(5.0, 30.0, mode)
            .with_spread(0.0, 0.0, 0.0, 0.0)
            .with_accuracy(1.0, 0.0)
    }

    #[test]
    fn test_full_auto_cadence_and_spread_plateau() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 10_000.0);
        let profile = AttackProfile::ranged(1.0, 30.0, FireMode::FullAuto)
            .with_fire_interval(0.1)
            .with_spread(1.0, 1.0, 4.0, 5.0);
        let mut combat = CombatModule::new(profile, 7);
        let c = ctx(&range.pool, &OpenField, &NoEffects);

        assert!(combat.request_fire(&handle(&range)));
        let mut spreads = Vec::new();
        for _ in 0..10 {
            combat.update(0.1, &c);
            spreads.push(combat.current_spread());
        }

        assert_eq!(combat.stats().shots_fired, 10);
        assert!(combat.is_firing());
        assert!(spreads.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*spreads.last().unwrap(), 5.0);
        assert_eq!(spreads[3], 5.0);
    }

    #[test]
    fn test_spread_stays_within_bounds() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 1e9);
        let profile = AttackProfile::ranged(1.0, 30.0, FireMode::FullAuto)
            .with_fire_interval(0.05)
            .with_spread(2.0, 1.5, 6.0, 7.0);
        let mut combat = CombatModule::new(profile, 3);
        let c = ctx(&range.pool, &OpenField, &NoEffects);
        let mut rng = ChaCha8Rng::seed_from_u64(99);

        for _ in 0..500 {
            if rng.gen_bool(0.5) {
                combat.request_fire(&handle(&range));
            } else {
                combat.stop_firing();
            }
            combat.update(rng.gen_range(0.0..0.3), &c);
            let spread = combat.current_spread();
            assert!((2.0..=7.0).contains(&spread), "spread {spread} escaped bounds");
        }
    }

    #[test]
    fn test_spread_recovers_only_when_idle() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 1e9);
        let profile = AttackProfile::ranged(1.0, 30.0, FireMode::FullAuto)
            .with_fire_interval(0.1)
            .with_spread(1.0, 1.0, 2.0, 4.0);
        let mut combat = CombatModule::new(profile, 1);
        let c = ctx(&range.pool, &OpenField, &NoEffects);

        combat.request_fire(&handle(&range));
        for _ in 0..5 {
            combat.update(0.1, &c);
        }
        assert_eq!(combat.current_spread(), 4.0);

        combat.stop_firing();
        combat.update(0.5, &c);
        assert_abs_diff_eq!(combat.current_spread(), 3.0, epsilon = 1e-5);
        combat.update(10.0, &c);
        assert_eq!(combat.current_spread(), 1.0);
    }

    #[test]
    fn test_burst_cadence() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 1e9);
        let profile = precise(FireMode::Burst).with_fire_interval(0.1).with_burst(3, 0.5);
        let mut combat = CombatModule::new(profile, 1);
        let c = ctx(&range.pool, &OpenField, &NoEffects);

        combat.request_fire(&handle(&range));
        // Shots at 0.0, 0.1, 0.2, then 0.7, 0.8, 0.9
        let mut fired = Vec::new();
        for _ in 0..10 {
            combat.update(0.1, &c);
            fired.push(combat.stats().shots_fired);
        }
        assert_eq!(fired[2], 3);
        assert_eq!(fired[6], 3);
        assert_eq!(fired[9], 6);
    }

    #[test]
    fn test_single_shot_then_cooldown() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 100.0);
        let mut profile = precise(FireMode::Single);
        profile.cooldown = 1.0;
        let mut combat = CombatModule::new(profile, 1);
        let c = ctx(&range.pool, &OpenField, &NoEffects);

        assert!(combat.attack(&handle(&range), &c));
        combat.update(0.1, &c);
        assert_eq!(combat.stats().shots_fired, 1);
        assert_eq!(combat.stats().hits, 1);
        assert!(!combat.is_firing());
        assert!(!combat.is_ready());
        assert!(!combat.request_fire(&handle(&range)));

        combat.update(1.0, &c);
        assert!(combat.request_fire(&handle(&range)));
        assert_eq!(range.target.read().current_health(), 95.0);
    }

    #[test]
    fn test_stop_firing_is_idempotent() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 100.0);
        let mut combat = CombatModule::new(precise(FireMode::FullAuto), 1);
        let c = ctx(&range.pool, &OpenField, &NoEffects);

        combat.stop_firing();
        assert!(!combat.is_firing());
        combat.request_fire(&handle(&range));
        combat.stop_firing();
        combat.stop_firing();
        assert!(!combat.is_firing());
        combat.update(1.0, &c);
        assert_eq!(combat.stats().shots_fired, 0);
    }

    #[test]
    fn test_firing_stops_when_target_dies() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 12.0);
        let mut combat = CombatModule::new(precise(FireMode::FullAuto), 1);
        let c = ctx(&range.pool, &OpenField, &NoEffects);

        combat.request_fire(&handle(&range));
        for _ in 0..10 {
            combat.update(0.1, &c);
        }
        assert_eq!(combat.stats().shots_fired, 3);
        assert_eq!(combat.stats().kills, 1);
        assert!(!combat.is_firing());
    }

    #[test]
    fn test_hitscan_blocked_by_wall() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 100.0);
        let wall = ObstacleField::new().with_obstacle(AABB::pillar(Vec3::new(0.0, 0.0, 5.0), 4.0, 1.0, 3.0));
        let effects = EffectLog::new();
        let mut combat = CombatModule::new(precise(FireMode::Single), 1);
        let c = ctx(&range.pool, &wall, &effects);

        combat.attack(&handle(&range), &c);
        combat.update(0.1, &c);
        assert_eq!(combat.stats().shots_fired, 1);
        assert_eq!(combat.stats().hits, 0);
        assert_eq!(effects.count(EffectKind::Impact), 1);
        assert_eq!(range.target.read().current_health(), 100.0);
    }

    #[test]
    fn test_projectile_travels_then_hits() {
        let range = range_with_target(Vec3::new(0.0, 0.0, 10.0), 100.0);
        let mut profile = precise(FireMode::Single).with_delivery(Delivery::Projectile);
        profile.projectile_speed = 20.0;
        let mut combat = CombatModule::new(profile, 1);
        let c = ctx(&range.pool, &OpenField, &NoEffects);

        combat.attack(&handle(&range), &c);
        combat.update(0.1, &c);
        assert_eq!(combat.projectiles().len(), 1);
        assert_eq!(range.target.read().current_health(), 100.0);

        for _ in 0..6 {
            combat.update(0.1, &c);
        }
        assert!(combat.projectiles().is_empty());
        assert_eq!(range.target.read().current_health(), 95.0);
    }

    #[test]
    fn test_projectile_expires() {
        let range = range_with_target(Vec3::new(50.0, 0.0, 0.0), 100.0);
        let mut profile = precise(FireMode::Single).with_delivery(Delivery::Projectile);
        profile.projectile_lifetime = 0.5;
        let mut combat = CombatModule::new(profile, 1);
        let c = ctx(&range.pool, &OpenField, &NoEffects);

        combat.attack(&handle(&range), &c);
        combat.update(0.1, &c);
        range.target.write().pose.position = Vec3::new(-50.0, 0.0, 0.0);
        for _ in 0..10 {
            combat.update(0.1, &c);
        }
        assert!(combat.projectiles().is_empty());
        assert_eq!(combat.stats().hits, 0);
    }

    #[test]
    fn test_melee_arc() {
        let pool = TargetPool::new();
        let front = Arc::new(RwLock::new(Actor::new(EntityId(2), Faction::Ally, 100.0).at(Vec3::new(0.3, 0.0, 1.5))));
        let behind = Arc::new(RwLock::new(Actor::new(EntityId(3), Faction::Ally, 100.0).at(Vec3::new(0.0, 0.0, -1.5))));
        let friend = Arc::new(RwLock::new(Actor::new(EntityId(4), Faction::Hostile, 100.0).at(Vec3::new(0.0, 0.0, 1.0))));
        for body in [&front, &behind] {
            let shared: SharedTarget = body.clone();
            pool.register(&shared);
        }
        let shared: SharedTarget = friend.clone();
        pool.register(&shared);

        let mut combat = CombatModule::new(AttackProfile::melee(20.0, 2.0, 1.0).with_knockback(3.0), 1);
        let c = ctx(&pool, &OpenField, &NoEffects);
        let handle = pool.get(EntityId(2)).unwrap();

        assert!(combat.attack(&handle, &c));
        assert_eq!(front.read().current_health(), 80.0);
        assert_eq!(behind.read().current_health(), 100.0);
        assert_eq!(friend.read().current_health(), 100.0);
        assert!(front.write().take_knockback().z > 0.0);

        // Cooldown gates the next swing
        assert!(!combat.attack(&handle, &c));
        combat.update(1.0, &c);
        assert!(combat.attack(&handle, &c));
    }

    #[test]
    fn test_area_strike_radial_knockback() {
        let pool = TargetPool::new();
        let east = Arc::new(RwLock::new(Actor::new(EntityId(2), Faction::Ally, 100.0).at(Vec3::new(2.0, 0.0, 0.0))));
        let far = Arc::new(RwLock::new(Actor::new(EntityId(3), Faction::Ally, 100.0).at(Vec3::new(9.0, 0.0, 0.0))));
        for body in [&east, &far] {
            let shared: SharedTarget = body.clone();
            pool.register(&shared);
        }
        let mut combat = CombatModule::new(AttackProfile::default(), 1);
        combat.set_damage_multiplier(1.5);
        let c = ctx(&pool, &OpenField, &NoEffects);

        assert_eq!(combat.area_strike(&c, Vec3::ZERO, 4.0, 20.0, 10.0), 1);
        assert_eq!(east.read().current_health(), 70.0);
        assert!(east.write().take_knockback().x > 9.0);
        assert_eq!(far.read().current_health(), 100.0);
    }
}
