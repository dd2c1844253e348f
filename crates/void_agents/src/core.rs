//! State shared by every agent family

use parking_lot::RwLock;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use void_ai::{detect, NavigationPort, Observed, Observer, PerceptionModule, PerceptionResult, TimerSet};
use void_combat::{
    Actor, AttackContext, Candidate, CombatModule, Damageable, EffectEvent, EffectKind, EffectSpawner, EntityId,
    Faction, HealthEvent, SharedTarget, TargetHandle, TargetPool, Targetable,
};
use void_event::{EventChannel, SubscriberId};
use void_math::{LineOfSight, OpenField, Pose, Vec3};

use crate::config::AgentStats;

/// Named countdowns used by the controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    LoseTarget,
    PatrolWait,
    Stun,
    Repath,
    /// Current step of a scripted sequence
    Sequence,
    Decision,
    ChargeCooldown,
    StompCooldown,
    RageBoost,
    /// Back-off after a navigation failure
    Retry,
}

/// Scene services injected at construction
#[derive(Clone)]
pub struct AgentEnvironment {
    pub targets: TargetPool,
    pub sight: Arc<dyn LineOfSight>,
    pub effects: Arc<dyn EffectSpawner>,
}

impl AgentEnvironment {
    pub fn new(targets: TargetPool) -> Self {
        Self {
            targets,
            sight: Arc::new(OpenField),
            effects: Arc::new(void_combat::NoEffects),
        }
    }

    pub fn with_sight(mut self, sight: Arc<dyn LineOfSight>) -> Self {
        self.sight = sight;
        self
    }

    pub fn with_effects(mut self, effects: Arc<dyn EffectSpawner>) -> Self {
        self.effects = effects;
        self
    }

    fn attack_context(&self, attacker: EntityId, faction: Faction, pose: Pose, muzzle: Vec3) -> AttackContext<'_> {
        AttackContext {
            attacker,
            faction,
            pose,
            muzzle,
            targets: &self.targets,
            sight: self.sight.as_ref(),
            effects: self.effects.as_ref(),
        }
    }
}

impl std::fmt::Debug for AgentEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentEnvironment").field("targets", &self.targets.len()).finish()
    }
}

/// Health notifications collected since the last tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthSignals {
    pub damaged: bool,
    pub died: bool,
    pub damage: f32,
    /// Most recent damage source
    pub attacker: Option<EntityId>,
}

/// Stats that `initialize` derives from a stat block
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedStats {
    pub max_health: f32,
    pub health: f32,
    pub nav_speed: f32,
    pub detection_range: f32,
    pub attack_range: f32,
    pub spread: f32,
    pub cooldown: f32,
}

/// Identity, body, services and subsystems of one agent.
///
/// Controllers wrap this with their own state machine. The agent owns its
/// body; the target pool and every target handle are weak.
pub struct AgentCore {
    id: EntityId,
    faction: Faction,
    body: Arc<RwLock<Actor>>,
    pub nav: Box<dyn NavigationPort>,
    pub env: AgentEnvironment,
    pub pose: Pose,
    pub spawn: Vec3,
    pub stats: AgentStats,
    initialized: bool,
    pub perception: PerceptionModule,
    pub target: Option<TargetHandle>,
    pub timers: TimerSet<Timer>,
    pub combat: CombatModule,
    /// Outgoing movement modifier (rage)
    pub speed_multiplier: f32,
    inbox: Arc<EventChannel<HealthEvent>>,
    subscription: Option<SubscriberId>,
    pub rng: ChaCha8Rng,
    /// Last destination handed to navigation
    last_destination: Option<Vec3>,
}

impl AgentCore {
    /// Create an inert agent standing where `nav` is and register its body
    pub fn new(id: EntityId, faction: Faction, nav: Box<dyn NavigationPort>, env: AgentEnvironment) -> Self {
        let spawn = nav.position();
        let body = Arc::new(RwLock::new(Actor::new(id, faction, AgentStats::default().max_health).at(spawn)));
        let shared: SharedTarget = body.clone();
        env.targets.register(&shared);

        let stats = AgentStats::default();
        Self {
            id,
            faction,
            body,
            nav,
            env,
            pose: Pose::at(spawn),
            spawn,
            perception: PerceptionModule::new(stats.perception.clone()),
            combat: CombatModule::new(stats.attack.clone(), id.0 ^ 0x5eed),
            stats,
            initialized: false,
            target: None,
            timers: TimerSet::new(),
            speed_multiplier: 1.0,
            inbox: EventChannel::shared(),
            subscription: None,
            rng: ChaCha8Rng::seed_from_u64(id.0),
            last_destination: None,
        }
    }

    /// Face `forward` at spawn
    pub fn with_facing(mut self, forward: Vec3) -> Self {
        self.pose = Pose::new(self.pose.position, forward);
        self.body.write().pose = self.pose;
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    pub fn body(&self) -> &Arc<RwLock<Actor>> {
        &self.body
    }

    pub fn shared_body(&self) -> SharedTarget {
        self.body.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn health_fraction(&self) -> f32 {
        self.body.read().health_fraction()
    }

    pub fn is_alive(&self) -> bool {
        self.body.read().is_alive()
    }

    /// Populate stats and prime every subsystem from `stats`
    pub fn initialize(&mut self, stats: AgentStats) {
        {
            let mut body = self.body.write();
            body.health.set_max(stats.max_health);
            body.hit_radius = stats.hit_radius;
            body.aim_height = stats.body_height;
            body.set_active(true);
        }
        self.nav.set_speed(stats.walk_speed);
        self.perception.set_config(stats.perception.clone());
        self.perception.clear();
        self.combat.set_profile(stats.attack.clone());
        self.timers.reset();
        self.speed_multiplier = 1.0;
        self.stats = stats;

        if self.subscription.is_none() {
            let id = self.body.write().subscribe(&self.inbox);
            self.subscription = Some(id);
        }
        self.initialized = true;
    }

    /// Snapshot of everything `initialize` derives
    pub fn derived(&self) -> DerivedStats {
        let body = self.body.read();
        DerivedStats {
            max_health: body.max_health(),
            health: body.current_health(),
            nav_speed: self.nav.speed(),
            detection_range: self.perception.config().detection_range,
            attack_range: self.combat.profile().range,
            spread: self.combat.current_spread(),
            cooldown: self.combat.cooldown_remaining(),
        }
    }

    /// Return to the inert constructed state at spawn
    pub fn reset(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.body.write().unsubscribe(id);
        }
        self.inbox.clear();
        self.body.write().revive();

        self.stats = AgentStats::default();
        self.initialized = false;
        self.target = None;
        self.timers.reset();
        self.perception.clear();
        self.combat.reset();
        self.speed_multiplier = 1.0;
        self.last_destination = None;

        self.nav.set_enabled(true);
        self.nav.reset_path();
        self.nav.resume();
        if let Err(err) = self.nav.warp(self.spawn) {
            log::warn!("{}: reset warp to spawn failed: {err}", self.id);
        }
        self.pose = Pose::new(self.nav.position(), self.pose.forward);
        self.sync_body();
    }

    /// Collect damage and death notifications published since the last call
    pub fn drain_health_events(&mut self) -> HealthSignals {
        let mut signals = HealthSignals::default();
        for event in self.inbox.drain() {
            match event {
                HealthEvent::Damaged { amount, source, .. } => {
                    signals.damaged = true;
                    signals.damage += amount;
                    if source.is_some() {
                        signals.attacker = source;
                    }
                }
                HealthEvent::Died { killer, .. } => {
                    signals.died = true;
                    if killer.is_some() {
                        signals.attacker = killer;
                    }
                }
                HealthEvent::Healed { .. } => {}
            }
        }
        signals
    }

    /// Advance countdowns and body timers
    pub fn tick_timers(&mut self, delta: f32) {
        self.timers.tick(delta);
        self.body.write().health.update(delta);
    }

    /// Adopt the damage source as target when nothing else is tracked
    pub fn notice_attacker(&mut self, attacker: Option<EntityId>) {
        if self.target.is_some() {
            return;
        }
        let Some(handle) = attacker.and_then(|id| self.env.targets.get(id)) else {
            return;
        };
        if handle.faction() == self.faction || !handle.is_valid() {
            return;
        }
        log::debug!("{}: noticed attacker {}", self.id, handle.id());
        self.target = Some(handle);
        self.perception.force_next();
    }

    /// Clear the target handle if it no longer validates
    pub fn validate_target(&mut self) -> bool {
        if let Some(handle) = &self.target {
            if handle.resolve().is_none() {
                log::debug!("{}: target {} no longer valid", self.id, handle.id());
                self.target = None;
            }
        }
        self.target.is_some()
    }

    /// Live feet position of the target
    pub fn target_position(&self) -> Option<Vec3> {
        let target = self.target.as_ref()?.resolve()?;
        let position = target.read().pose().position;
        Some(position)
    }

    pub fn distance_to_target(&self) -> Option<f32> {
        self.target_position().map(|p| self.pose.position.distance(p))
    }

    pub fn height_gap_to_target(&self) -> Option<f32> {
        self.target_position().map(|p| (p.y - self.pose.position.y).abs())
    }

    pub fn perception_result(&self) -> &PerceptionResult {
        self.perception.result()
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some() && self.perception.result().has_target()
    }

    pub fn sees_target(&self) -> bool {
        self.target.is_some() && self.perception.result().can_see_target()
    }

    /// Run a perception cycle if one is due.
    ///
    /// Keeps the current target while it is perceived; otherwise picks the
    /// nearest opponent in range before looking.
    pub fn update_perception(&mut self, delta: f32, acquire: bool) {
        if !self.perception.tick(delta) {
            return;
        }
        self.validate_target();

        let perceived = self.perception.result().has_target();
        if acquire && (self.target.is_none() || !perceived) {
            if let Some(pick) = self.pick_target() {
                self.target = Some(pick);
            }
        }

        let observed = self.target.as_ref().and_then(TargetHandle::resolve).map(|t| {
            let t = t.read();
            Observed {
                position: t.pose().position,
                aim_point: t.aim_point(),
            }
        });
        let observer = Observer {
            pose: self.pose,
            eye_height: self.perception.config().eye_height,
            nav: self.nav.as_ref(),
            sight: self.env.sight.as_ref(),
        };
        let seen = self.perception.perceive(&observer, observed.as_ref()).can_see_target();
        if seen {
            self.timers.set(Timer::LoseTarget, self.stats.lose_target_time);
        }
    }

    /// Nearest opponent in range that is seen, else one that is sensed,
    /// else the plain nearest
    fn pick_target(&self) -> Option<TargetHandle> {
        let config = self.perception.config();
        let origin = self.pose.position;
        let mut in_range: Vec<(f32, Candidate)> = self
            .env
            .targets
            .candidates(self.faction.opponent(), self.id)
            .into_iter()
            .map(|c| (origin.distance(c.position), c))
            .filter(|(d, _)| *d <= config.detection_range)
            .collect();
        in_range.sort_by(|a, b| a.0.total_cmp(&b.0));

        let observer = Observer {
            pose: self.pose,
            eye_height: config.eye_height,
            nav: self.nav.as_ref(),
            sight: self.env.sight.as_ref(),
        };
        let mut sensed = None;
        for (_, candidate) in &in_range {
            let observed = Observed {
                position: candidate.position,
                aim_point: candidate.aim_point,
            };
            let result = detect(&observer, &observed, config);
            if result.can_see_target() {
                log::debug!("{}: acquired {} in sight", self.id, candidate.handle.id());
                return Some(candidate.handle.clone());
            }
            if sensed.is_none() && result.has_target() {
                sensed = Some(candidate.handle.clone());
            }
        }
        sensed.or_else(|| in_range.into_iter().next().map(|(_, c)| c.handle))
    }

    /// Forget the target and everything perceived about it
    pub fn forget_target(&mut self) {
        self.target = None;
        self.perception.clear();
    }

    /// Head for `destination`. Failures are logged and reported as false.
    pub fn move_to(&mut self, destination: Vec3) -> bool {
        self.nav.resume();
        match self.nav.set_destination(destination) {
            Ok(()) => {
                self.last_destination = Some(destination);
                true
            }
            Err(err) => {
                log::warn!("{}: cannot move to {:?}: {err}", self.id, destination);
                self.last_destination = None;
                false
            }
        }
    }

    /// Re-path toward a moving point at most once per `repath_interval`,
    /// and only when it has drifted more than `threshold` or no path is held
    pub fn follow_point(&mut self, point: Vec3, threshold: f32) -> bool {
        let moved = self
            .last_destination
            .map_or(true, |last| last.distance(point) > threshold);
        if self.timers.expired(Timer::Repath) && (moved || !self.nav.has_path()) {
            self.timers.set(Timer::Repath, self.stats.repath_interval);
            return self.move_to(point);
        }
        true
    }

    pub fn halt(&mut self) {
        self.nav.stop();
        self.last_destination = None;
    }

    /// Make the next `follow_point` re-path right away
    pub fn refresh_route(&mut self) {
        self.last_destination = None;
        self.timers.clear(Timer::Repath);
    }

    pub fn set_move_speed(&mut self, speed: f32) {
        self.nav.set_speed(speed * self.speed_multiplier);
    }

    /// Turn toward `point` at the configured turn rate
    pub fn face(&mut self, point: Vec3, delta: f32) {
        self.pose.turn_towards(point, self.stats.turn_speed * delta);
    }

    /// Degrees between facing and the target
    pub fn angle_to_target(&self) -> Option<f32> {
        self.target_position().map(|p| self.pose.angle_to(p))
    }

    pub fn emit(&self, kind: EffectKind) {
        self.env.effects.spawn(EffectEvent::new(kind, self.id, self.pose.position));
    }

    fn muzzle(&self) -> Vec3 {
        self.pose.eye(self.perception.config().eye_height)
    }

    /// Attack the current target. Returns true if anything was started or struck.
    pub fn attack_target(&mut self) -> bool {
        let Some(handle) = self.target.clone() else {
            return false;
        };
        let ctx = self.env.attack_context(self.id, self.faction, self.pose, self.muzzle());
        self.combat.attack(&handle, &ctx)
    }

    pub fn stop_firing(&mut self) {
        self.combat.stop_firing();
    }

    /// Spread, cooldown, cadence and projectiles
    pub fn update_combat(&mut self, delta: f32) {
        let ctx = self.env.attack_context(self.id, self.faction, self.pose, self.muzzle());
        self.combat.update(delta, &ctx);
    }

    /// Damage every opponent within `radius`. Returns the number hit.
    pub fn area_strike(&mut self, radius: f32, damage: f32, knockback: f32) -> usize {
        let ctx = self.env.attack_context(self.id, self.faction, self.pose, self.muzzle());
        self.combat.area_strike(&ctx, self.pose.position, radius, damage, knockback)
    }

    /// First valid opponent within `radius` of the agent
    pub fn opponent_within(&self, radius: f32) -> Option<SharedTarget> {
        self.env
            .targets
            .candidates(self.faction.opponent(), self.id)
            .into_iter()
            .find(|c| c.position.horizontal_distance(self.pose.position) <= radius + c.hit_radius)
            .map(|c| c.target)
    }

    pub fn contact_strike(&mut self, target: &SharedTarget, damage: f32, knockback: Vec3) {
        let ctx = self.env.attack_context(self.id, self.faction, self.pose, self.muzzle());
        self.combat.contact_strike(&ctx, target, damage, knockback);
    }

    /// Apply knockback accumulated on the body as a displacement
    pub fn apply_knockback(&mut self) {
        let impulse = self.body.write().take_knockback().horizontal();
        if impulse.length_squared() <= 1e-6 || !self.nav.is_enabled() {
            return;
        }
        let landing = self.nav.position() + impulse;
        match self.nav.warp(landing) {
            Ok(()) => self.pose.position = self.nav.position(),
            Err(err) => log::debug!("{}: knockback blocked: {err}", self.id),
        }
    }

    /// Drop any knockback received while it cannot be applied
    pub fn discard_knockback(&mut self) {
        self.body.write().take_knockback();
    }

    /// Integrate navigation and face the direction of travel
    pub fn advance_movement(&mut self, delta: f32) {
        self.nav.tick(delta);
        self.pose.position = self.nav.position();
        let velocity = self.nav.velocity().horizontal();
        if velocity.length_squared() > 1e-4 {
            let ahead = self.pose.position + velocity;
            self.face(ahead, delta);
        }
    }

    /// Publish the pose to the body
    pub fn sync_body(&self) {
        self.body.write().pose = self.pose;
    }

    /// Shut everything down on death
    pub fn on_death(&mut self) {
        self.combat.stop_firing();
        self.nav.stop();
        self.nav.reset_path();
        self.nav.set_enabled(false);
        self.target = None;
        self.perception.clear();
        self.emit(EffectKind::Death);
        log::info!("{} died at {:?}", self.id, self.pose.position);
    }
}

impl Drop for AgentCore {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.body.write().unsubscribe(id);
        }
        self.env.targets.unregister(self.id);
    }
}

/// What the scene runner needs from any agent family
pub trait AgentController {
    fn id(&self) -> EntityId;

    /// First target acquisition and entry into the initial state
    fn start(&mut self);

    /// Advance one simulation step
    fn tick(&mut self, delta: f32);

    /// Return to the inert constructed state
    fn reset(&mut self);

    fn is_dead(&self) -> bool;

    fn state_name(&self) -> &'static str;

    fn core(&self) -> &AgentCore;

    fn body(&self) -> SharedTarget {
        self.core().shared_body()
    }
}

impl std::fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCore")
            .field("id", &self.id)
            .field("faction", &self.faction)
            .field("pose", &self.pose)
            .field("target", &self.target)
            .field("initialized", &self.initialized)
            .finish()
    }
}
