//! Elite hostile controller
//!
//! Adds to the baseline hostile:
//! - Alert: a one-time announce on first detection
//! - Charge: windup, then a straight rush along the cached direction
//! - Stomp: a telegraphed area strike with radial knockback
//! - Rage: a one-time boost below a health threshold, followed by Recover
//!
//! Every multi-step sequence is a step index plus the `Sequence` timer, both
//! cleared on state exit so a sequence interrupted by death never resolves.

use rand::Rng;
use void_ai::{NavigationPort, StateMachine};
use void_combat::{Damageable, EffectKind, EntityId, Faction};
use void_math::Vec3;

use crate::config::EliteStats;
use crate::core::{AgentController, AgentCore, AgentEnvironment, Timer};
use crate::hostile::{update_attack, update_chase, Extension, HostileAgent, HostileBrain, HostileState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Step {
    #[default]
    None,
    Windup,
    Rush,
    Recovery,
}

/// Elite-only state carried by the hostile brain
#[derive(Debug, Clone, Default)]
pub struct EliteKit {
    stats: EliteStats,
    alerted: bool,
    /// Rage fires once per life
    rage_spent: bool,
    rage_active: bool,
    step: Step,
    charge_direction: Vec3,
}

impl EliteKit {
    pub fn stats(&self) -> &EliteStats {
        &self.stats
    }

    pub fn has_alerted(&self) -> bool {
        self.alerted
    }

    pub fn rage_spent(&self) -> bool {
        self.rage_spent
    }

    pub fn is_enraged(&self) -> bool {
        self.rage_active
    }
}

type Brain = HostileBrain<EliteKit>;

fn is_sequence(state: HostileState) -> bool {
    matches!(
        state,
        HostileState::Jump | HostileState::Charge | HostileState::Stomp | HostileState::Rage | HostileState::Recover
    )
}

impl Extension for EliteKit {
    fn holds_through_hits(&self, state: HostileState) -> bool {
        is_sequence(state)
    }

    fn resume_override(&self, previous: HostileState) -> Option<HostileState> {
        matches!(
            previous,
            HostileState::Alert | HostileState::Charge | HostileState::Stomp | HostileState::Rage | HostileState::Recover
        )
        .then_some(HostileState::Chase)
    }

    fn react(b: &mut Brain, state: HostileState) -> Option<HostileState> {
        if b.ext.rage_active && b.core.timers.expired(Timer::RageBoost) {
            end_boost(b, state);
        }

        let rage = &b.ext.stats.rage;
        if !rage.enabled || b.ext.rage_spent || is_sequence(state) || state == HostileState::Dead {
            return None;
        }
        let threshold = rage.health_threshold;
        if b.core.health_fraction() < threshold {
            b.ext.rage_spent = true;
            return Some(HostileState::Rage);
        }
        None
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

fn end_boost(b: &mut Brain, state: HostileState) {
    b.ext.rage_active = false;
    b.core.combat.set_damage_multiplier(1.0);
    b.core.speed_multiplier = 1.0;
    if state == HostileState::Chase {
        let speed = b.core.stats.run_speed;
        b.core.set_move_speed(speed);
    }
    log::debug!("{}: rage boost wore off", b.core.id());
}

/// Roll for a special attack when the decision timer allows
fn decide(b: &mut Brain) -> Option<HostileState> {
    if b.core.timers.running(Timer::Decision) {
        return None;
    }
    let interval = b.ext.stats.decision_interval;
    b.core.timers.set(Timer::Decision, interval);
    let distance = b.core.distance_to_target()?;

    let stomp = &b.ext.stats.stomp;
    if stomp.enabled && b.core.timers.expired(Timer::StompCooldown) && distance <= stomp.trigger_distance {
        let chance = stomp.chance;
        if b.core.rng.gen::<f32>() < chance {
            return Some(HostileState::Stomp);
        }
    }

    let charge = &b.ext.stats.charge;
    if charge.enabled
        && b.core.timers.expired(Timer::ChargeCooldown)
        && (charge.min_distance..=charge.max_distance).contains(&distance)
        && b.core.sees_target()
    {
        let chance = charge.chance;
        if b.core.rng.gen::<f32>() < chance {
            return Some(HostileState::Charge);
        }
    }
    None
}

fn update_elite_chase(b: &mut Brain, delta: f32) -> Option<HostileState> {
    decide(b).or_else(|| update_chase(b, delta))
}

fn update_elite_attack(b: &mut Brain, delta: f32) -> Option<HostileState> {
    decide(b).or_else(|| update_attack(b, delta))
}

fn should_alert(b: &Brain) -> bool {
    b.ext.stats.alert.enabled && !b.ext.alerted && b.core.has_target()
}

fn enter_alert(b: &mut Brain) {
    b.ext.alerted = true;
    b.core.halt();
    let duration = b.ext.stats.alert.duration;
    b.core.timers.set(Timer::Sequence, duration);
    b.core.emit(EffectKind::Alert);
    log::debug!("{}: alerted", b.core.id());
}

fn update_alert(b: &mut Brain, delta: f32) -> Option<HostileState> {
    if let Some(goal) = b.core.target_position() {
        b.core.face(goal, delta);
    }
    b.core.timers.expired(Timer::Sequence).then_some(HostileState::Chase)
}

fn enter_charge(b: &mut Brain) {
    b.core.halt();
    b.core.nav.reset_path();
    b.core.stop_firing();

    let forward = b.core.pose.forward;
    let direction = b
        .core
        .target_position()
        .map(|goal| (goal - b.core.position()).horizontal())
        .unwrap_or(forward)
        .normalize_or(forward);
    b.ext.charge_direction = direction;
    b.core.pose.forward = direction;

    b.ext.step = Step::Windup;
    let windup = b.ext.stats.charge.windup;
    b.core.timers.set(Timer::Sequence, windup);
    b.core.emit(EffectKind::ChargeWindup);
}

fn update_charge(b: &mut Brain, delta: f32) -> Option<HostileState> {
    match b.ext.step {
        Step::Windup => {
            if b.core.timers.expired(Timer::Sequence) {
                b.ext.step = Step::Rush;
                let limit = b.ext.stats.charge.max_duration;
                b.core.timers.set(Timer::Sequence, limit);
                log::debug!("{}: charging along {:?}", b.core.id(), b.ext.charge_direction);
            }
            None
        }
        Step::Rush => rush(b, delta),
        _ => Some(HostileState::Chase),
    }
}

/// One tick of the charge: move, then check walls, contact and the time limit
fn rush(b: &mut Brain, delta: f32) -> Option<HostileState> {
    let charge = b.ext.stats.charge.clone();
    let direction = b.ext.charge_direction;
    let from = b.core.position();
    let to = from + direction * (charge.speed * b.core.speed_multiplier * delta);

    let lift = Vec3::Y * 0.5;
    let reach = direction * b.core.stats.hit_radius;
    if let Some(hit) = b.core.env.sight.trace(from + lift, to + reach + lift) {
        log::debug!("{}: charge stopped by a wall at {:?}", b.core.id(), hit.point);
        return Some(HostileState::Chase);
    }
    if let Err(err) = b.core.nav.warp(to) {
        log::debug!("{}: charge left the navigable surface: {err}", b.core.id());
        return Some(HostileState::Chase);
    }
    b.core.pose.position = b.core.nav.position();

    if let Some(victim) = b.core.opponent_within(charge.contact_radius) {
        b.core.contact_strike(&victim, charge.damage, direction * charge.knockback);
        log::debug!("{}: charge connected", b.core.id());
        return Some(HostileState::Chase);
    }
    b.core.timers.expired(Timer::Sequence).then_some(HostileState::Chase)
}

fn exit_charge(b: &mut Brain) {
    b.ext.step = Step::None;
    let cooldown = b.ext.stats.charge.cooldown;
    b.core.timers.set(Timer::ChargeCooldown, cooldown);
    b.core.combat.trigger_cooldown(b.core.stats.attack.cooldown * 0.5);
}

fn enter_stomp(b: &mut Brain) {
    b.core.halt();
    b.core.stop_firing();
    b.ext.step = Step::Windup;
    let windup = b.ext.stats.stomp.windup;
    b.core.timers.set(Timer::Sequence, windup);
    b.core.emit(EffectKind::StompWarning);
}

fn update_stomp(b: &mut Brain, delta: f32) -> Option<HostileState> {
    match b.ext.step {
        Step::Windup => {
            if let Some(goal) = b.core.target_position() {
                b.core.face(goal, delta);
            }
            if b.core.timers.expired(Timer::Sequence) {
                let stomp = b.ext.stats.stomp.clone();
                let struck = b.core.area_strike(stomp.radius, stomp.damage, stomp.knockback);
                b.core.emit(EffectKind::Stomp);
                log::debug!("{}: stomp struck {struck}", b.core.id());
                b.ext.step = Step::Recovery;
                b.core.timers.set(Timer::Sequence, stomp.recovery);
            }
            None
        }
        Step::Recovery => b.core.timers.expired(Timer::Sequence).then_some(HostileState::Chase),
        _ => Some(HostileState::Chase),
    }
}

fn exit_stomp(b: &mut Brain) {
    b.ext.step = Step::None;
    let cooldown = b.ext.stats.stomp.cooldown;
    b.core.timers.set(Timer::StompCooldown, cooldown);
}

fn enter_rage(b: &mut Brain) {
    b.core.halt();
    b.core.stop_firing();
    let rage = b.ext.stats.rage.clone();
    b.core.combat.set_damage_multiplier(rage.damage_multiplier);
    b.core.speed_multiplier = rage.speed_multiplier;
    b.ext.rage_active = true;
    b.core.timers.set(Timer::RageBoost, rage.boost_duration);
    b.core.timers.set(Timer::Sequence, rage.duration);
    b.core.emit(EffectKind::Rage);
    log::info!(
        "{} enraged at {:.0}% health",
        b.core.id(),
        b.core.health_fraction() * 100.0
    );
}

fn update_rage(b: &mut Brain, delta: f32) -> Option<HostileState> {
    if let Some(goal) = b.core.target_position() {
        b.core.face(goal, delta);
    }
    b.core.timers.expired(Timer::Sequence).then_some(HostileState::Recover)
}

fn enter_recover(b: &mut Brain) {
    b.core.halt();
    let duration = b.ext.stats.rage.recover_duration;
    b.core.timers.set(Timer::Sequence, duration);
    b.core.emit(EffectKind::Recover);
}

fn update_recover(b: &mut Brain, _delta: f32) -> Option<HostileState> {
    if b.core.timers.running(Timer::Sequence) {
        return None;
    }
    let healed = {
        let mut body = b.core.body().write();
        let amount = body.max_health() * b.ext.stats.rage.heal_fraction;
        body.heal(amount)
    };
    log::debug!("{}: recovered {healed:.1} health", b.core.id());
    Some(HostileState::Chase)
}

fn install_elite(fsm: &mut StateMachine<HostileState, Brain>) {
    use HostileState::*;

    fsm.add_transition_priority(Idle, Alert, should_alert, 10);
    fsm.add_transition_priority(Patrol, Alert, should_alert, 10);

    fsm.on_enter(Alert, enter_alert);
    fsm.on_update(Alert, update_alert);
    fsm.on_update(Chase, update_elite_chase);
    fsm.on_update(Attack, update_elite_attack);
    fsm.on_enter(Charge, enter_charge);
    fsm.on_update(Charge, update_charge);
    fsm.on_exit(Charge, exit_charge);
    fsm.on_enter(Stomp, enter_stomp);
    fsm.on_update(Stomp, update_stomp);
    fsm.on_exit(Stomp, exit_stomp);
    fsm.on_enter(Rage, enter_rage);
    fsm.on_update(Rage, update_rage);
    fsm.on_enter(Recover, enter_recover);
    fsm.on_update(Recover, update_recover);
}

/// Boss-grade hostile
pub struct EliteHostileAgent {
    inner: HostileAgent<EliteKit>,
}

impl EliteHostileAgent {
    /// Create an inert elite standing where `nav` is
    pub fn new(id: EntityId, nav: Box<dyn NavigationPort>, env: AgentEnvironment) -> Self {
        let core = AgentCore::new(id, Faction::Hostile, nav, env);
        let mut inner = HostileAgent::assemble(core, EliteKit::default());
        inner.fsm.set_label(format!("elite {id}"));
        install_elite(&mut inner.fsm);
        Self { inner }
    }

    pub fn with_patrol(mut self, points: Vec<Vec3>) -> Self {
        self.inner.set_patrol(points);
        self
    }

    pub fn initialize(&mut self, stats: EliteStats) {
        self.inner.brain.core.initialize(stats.base.clone());
        self.inner.brain.ext.stats = stats;
    }

    pub fn start(&mut self) {
        if !self.inner.core().is_initialized() {
            log::warn!("{}: started before initialize, using default stats", self.inner.core().id());
            self.initialize(EliteStats::default());
        }
        self.inner.start();
    }

    pub fn tick(&mut self, delta: f32) {
        self.inner.tick(delta);
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn change_state(&mut self, to: HostileState) -> bool {
        self.inner.change_state(to)
    }

    pub fn state(&self) -> HostileState {
        self.inner.state()
    }

    pub fn previous_state(&self) -> Option<HostileState> {
        self.inner.previous_state()
    }

    pub fn kit(&self) -> &EliteKit {
        &self.inner.brain().ext
    }

    pub fn core(&self) -> &AgentCore {
        self.inner.core()
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        self.inner.core_mut()
    }
}

impl AgentController for EliteHostileAgent {
    fn id(&self) -> EntityId {
        self.inner.core().id()
    }

    fn start(&mut self) {
        EliteHostileAgent::start(self);
    }

    fn tick(&mut self, delta: f32) {
        self.inner.tick(delta);
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn is_dead(&self) -> bool {
        self.state() == HostileState::Dead
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn core(&self) -> &AgentCore {
        self.inner.core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentStats, AlertConfig, ChargeConfig, RageConfig, StompConfig};
    use parking_lot::RwLock;
    use std::sync::Arc;
    use void_ai::{MeshNavigator, NavMesh};
    use void_combat::{Actor, AttackProfile, DamageInfo, DamageType, EffectLog, SharedTarget, TargetPool};
    use void_math::{ObstacleField, AABB};

    const DT: f32 = 0.1;

    fn player(pool: &TargetPool, position: Vec3) -> Arc<RwLock<Actor>> {
        let actor = Arc::new(RwLock::new(Actor::new(EntityId(100), Faction::Ally, 100.0).at(position)));
        let shared: SharedTarget = actor.clone();
        pool.register(&shared);
        actor
    }

    fn elite(env: AgentEnvironment, position: Vec3, stats: EliteStats) -> EliteHostileAgent {
        let mesh = Arc::new(NavMesh::create_grid(40.0, 40.0, 2.0));
        let nav = MeshNavigator::new(mesh, position);
        let mut agent = EliteHostileAgent::new(EntityId(7), Box::new(nav), env);
        agent.initialize(stats);
        agent.start();
        agent
    }

    fn quiet_stats() -> EliteStats {
        EliteStats {
            base: AgentStats {
                max_health: 100.0,
                attack: AttackProfile::melee(20.0, 2.5, 1.5),
                ..AgentStats::default()
            },
            alert: AlertConfig {
                enabled: false,
                ..AlertConfig::default()
            },
            charge: ChargeConfig {
                enabled: false,
                ..ChargeConfig::default()
            },
            stomp: StompConfig {
                enabled: false,
                ..StompConfig::default()
            },
            ..EliteStats::default()
        }
    }

    fn hurt(agent: &EliteHostileAgent, amount: f32) {
        agent
            .core()
            .body()
            .write()
            .take_damage(&DamageInfo::new(amount, DamageType::Ranged));
    }

    #[test]
    fn test_rage_triggers_once() {
        let pool = TargetPool::new();
        let effects = Arc::new(EffectLog::new());
        let env = AgentEnvironment::new(pool.clone()).with_effects(effects.clone());
        let mut agent = elite(env, Vec3::new(10.0, 0.0, 10.0), quiet_stats());

        hurt(&agent, 65.0);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Hit);
        assert!(!agent.kit().rage_spent());

        hurt(&agent, 10.0);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Rage);
        assert!(agent.kit().is_enraged());
        assert_eq!(agent.core().combat.damage_multiplier(), 1.5);

        for _ in 0..10 {
            hurt(&agent, 1.0);
            agent.tick(DT);
        }
        for _ in 0..50 {
            agent.tick(DT);
        }
        assert_eq!(effects.count(EffectKind::Rage), 1);
        assert_eq!(effects.count(EffectKind::Recover), 1);
        assert!(agent.kit().rage_spent());
        assert_ne!(agent.state(), HostileState::Rage);
        // 15 dealt during rage, 15 healed back by Recover
        assert!((agent.core().health_fraction() - 0.30).abs() < 1e-4);
    }

    #[test]
    fn test_rage_boost_wears_off() {
        let pool = TargetPool::new();
        let mut stats = quiet_stats();
        stats.rage = RageConfig {
            boost_duration: 1.0,
            duration: 0.5,
            recover_duration: 0.2,
            ..RageConfig::default()
        };
        let mut agent = elite(AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0), stats);
        hurt(&agent, 80.0);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Rage);
        assert_eq!(agent.core().speed_multiplier, 1.3);

        for _ in 0..15 {
            agent.tick(DT);
        }
        assert!(!agent.kit().is_enraged());
        assert_eq!(agent.core().combat.damage_multiplier(), 1.0);
        assert_eq!(agent.core().speed_multiplier, 1.0);
    }

    #[test]
    fn test_alert_announces_once() {
        let pool = TargetPool::new();
        let effects = Arc::new(EffectLog::new());
        let env = AgentEnvironment::new(pool.clone()).with_effects(effects.clone());
        let _player = player(&pool, Vec3::new(10.0, 0.0, 20.0));
        let mut stats = quiet_stats();
        stats.alert = AlertConfig {
            enabled: true,
            duration: 0.5,
        };
        let mut agent = elite(env, Vec3::new(10.0, 0.0, 10.0), stats);

        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Alert);
        for _ in 0..6 {
            agent.tick(DT);
        }
        assert_eq!(agent.state(), HostileState::Chase);

        agent.change_state(HostileState::Idle);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Chase);
        assert_eq!(effects.count(EffectKind::Alert), 1);
    }

    #[test]
    fn test_stomp_damages_and_pushes_nearby_target() {
        let pool = TargetPool::new();
        let player = player(&pool, Vec3::new(10.0, 0.0, 13.0));
        let mut stats = quiet_stats();
        stats.stomp = StompConfig {
            enabled: true,
            chance: 1.0,
            ..StompConfig::default()
        };
        let mut agent = elite(AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0), stats);

        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Chase);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Stomp);

        // Telegraph: nothing lands before the windup ends
        for _ in 0..5 {
            agent.tick(DT);
        }
        assert_eq!(player.read().current_health(), 100.0);

        for _ in 0..6 {
            agent.tick(DT);
        }
        assert_eq!(player.read().current_health(), 70.0);
        assert!(player.write().take_knockback().length() > 1.0);

        for _ in 0..6 {
            agent.tick(DT);
        }
        assert_ne!(agent.state(), HostileState::Stomp);
        assert!(agent.core().timers.running(Timer::StompCooldown));
    }

    #[test]
    fn test_stomp_cancelled_by_death() {
        let pool = TargetPool::new();
        let player = player(&pool, Vec3::new(10.0, 0.0, 13.0));
        let mut stats = quiet_stats();
        stats.rage.enabled = false;
        stats.stomp = StompConfig {
            enabled: true,
            chance: 1.0,
            ..StompConfig::default()
        };
        let mut agent = elite(AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0), stats);
        agent.tick(DT);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Stomp);

        hurt(&agent, 1000.0);
        for _ in 0..20 {
            agent.tick(DT);
        }
        assert_eq!(agent.state(), HostileState::Dead);
        assert_eq!(player.read().current_health(), 100.0);
    }

    #[test]
    fn test_charge_rushes_into_target() {
        let pool = TargetPool::new();
        let player = player(&pool, Vec3::new(10.0, 0.0, 18.0));
        let mut stats = quiet_stats();
        stats.charge = ChargeConfig {
            enabled: true,
            chance: 1.0,
            ..ChargeConfig::default()
        };
        let mut agent = elite(AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0), stats);

        agent.tick(DT);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Charge);

        let mut ticks = 0;
        while agent.state() == HostileState::Charge && ticks < 30 {
            agent.tick(DT);
            ticks += 1;
        }
        assert_eq!(agent.state(), HostileState::Chase);
        assert_eq!(player.read().current_health(), 75.0);
        assert!(player.write().take_knockback().z > 0.0);
        assert!(agent.core().position().z > 15.0);
        assert!(agent.core().timers.running(Timer::ChargeCooldown));
    }

    #[test]
    fn test_charge_stops_short_of_low_wall() {
        let pool = TargetPool::new();
        let player = player(&pool, Vec3::new(10.0, 0.0, 18.0));
        // Low enough to see over, high enough to block the rush
        let wall = Arc::new(ObstacleField::new().with_obstacle(AABB::pillar(Vec3::new(10.0, 0.0, 14.0), 4.0, 1.0, 1.0)));
        let mut stats = quiet_stats();
        stats.charge = ChargeConfig {
            enabled: true,
            chance: 1.0,
            ..ChargeConfig::default()
        };
        let env = AgentEnvironment::new(pool.clone()).with_sight(wall);
        let mut agent = elite(env, Vec3::new(10.0, 0.0, 10.0), stats);

        agent.tick(DT);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Charge);

        let mut ticks = 0;
        while agent.state() == HostileState::Charge && ticks < 30 {
            agent.tick(DT);
            ticks += 1;
        }
        assert_ne!(agent.state(), HostileState::Charge);
        assert!(agent.core().position().z < 13.5);
        assert_eq!(player.read().current_health(), 100.0);
        assert_eq!(player.write().take_knockback(), Vec3::ZERO);
        assert!(agent.core().timers.running(Timer::ChargeCooldown));
    }

    #[test]
    fn test_hit_during_alert_resumes_chase() {
        let pool = TargetPool::new();
        let _player = player(&pool, Vec3::new(10.0, 0.0, 20.0));
        let mut stats = quiet_stats();
        stats.base.hit_stun_duration = 0.3;
        stats.alert = AlertConfig {
            enabled: true,
            duration: 2.0,
        };
        let mut agent = elite(AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0), stats);

        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Alert);

        hurt(&agent, 5.0);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Hit);

        for _ in 0..4 {
            agent.tick(DT);
        }
        assert_eq!(agent.state(), HostileState::Chase);
    }
}
