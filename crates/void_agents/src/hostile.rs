//! Baseline hostile controller
//!
//! Idle/Patrol until something is noticed, then Chase and Attack, Return to
//! spawn when the target is lost or the leash runs out. Damage stuns (Hit),
//! traversal links are crossed with a scripted arc (Jump).
//!
//! The controller is generic over an [`Extension`] so richer families reuse
//! the same brain, hook table and tick order.

use rand::Rng;
use serde::{Deserialize, Serialize};
use void_ai::{has_arrived, NavigationPort, State, StateMachine};
use void_combat::{EffectKind, EntityId, Faction};
use void_math::{parabolic_arc, Vec3};

use crate::config::AgentStats;
use crate::core::{AgentController, AgentCore, AgentEnvironment, Timer};

/// Every state a hostile can be in. The last five are only entered by elites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostileState {
    Idle,
    Patrol,
    Chase,
    Attack,
    Return,
    Hit,
    Jump,
    Dead,
    Alert,
    Charge,
    Stomp,
    Rage,
    Recover,
}

impl State for HostileState {
    fn is_terminal(&self) -> bool {
        matches!(self, HostileState::Dead)
    }
}

impl HostileState {
    pub fn name(self) -> &'static str {
        match self {
            HostileState::Idle => "idle",
            HostileState::Patrol => "patrol",
            HostileState::Chase => "chase",
            HostileState::Attack => "attack",
            HostileState::Return => "return",
            HostileState::Hit => "hit",
            HostileState::Jump => "jump",
            HostileState::Dead => "dead",
            HostileState::Alert => "alert",
            HostileState::Charge => "charge",
            HostileState::Stomp => "stomp",
            HostileState::Rage => "rage",
            HostileState::Recover => "recover",
        }
    }
}

/// Family-specific behavior layered over the baseline hostile
pub trait Extension: Sized + Send + Sync + 'static {
    /// States that damage cannot interrupt and knockback cannot move
    fn holds_through_hits(&self, state: HostileState) -> bool {
        state == HostileState::Jump
    }

    /// State to resume after a stun or a jump instead of `previous`
    fn resume_override(&self, _previous: HostileState) -> Option<HostileState> {
        None
    }

    /// Runs every tick after health events are drained; may force a state
    fn react(_brain: &mut HostileBrain<Self>, _state: HostileState) -> Option<HostileState> {
        None
    }

    /// Forget per-life progress (pooling)
    fn reset(&mut self) {}
}

impl Extension for () {}

/// Scripted arc across a traversal link
#[derive(Debug, Clone, Copy)]
struct JumpArc {
    start: Vec3,
    end: Vec3,
    elapsed: f32,
    duration: f32,
    height: f32,
}

/// Context the hostile state machine drives
pub struct HostileBrain<X = ()> {
    pub core: AgentCore,
    patrol: Vec<Vec3>,
    patrol_index: usize,
    waiting: bool,
    /// State to go back to after Hit or Jump
    resume: HostileState,
    jump: Option<JumpArc>,
    pub ext: X,
}

impl<X: Extension> HostileBrain<X> {
    fn new(core: AgentCore, ext: X) -> Self {
        Self {
            core,
            patrol: Vec::new(),
            patrol_index: 0,
            waiting: false,
            resume: HostileState::Idle,
            jump: None,
            ext,
        }
    }

    pub fn patrol_points(&self) -> &[Vec3] {
        &self.patrol
    }

    pub fn has_patrol(&self) -> bool {
        !self.patrol.is_empty()
    }

    fn noticed_target(&self) -> bool {
        self.core.has_target()
    }

    fn lost_target(&self) -> bool {
        self.core.target.is_none()
    }

    /// Close enough, level enough and (for ranged) in sight
    fn in_attack_range(&self) -> bool {
        let stats = &self.core.stats;
        let (Some(distance), Some(gap)) = (self.core.distance_to_target(), self.core.height_gap_to_target()) else {
            return false;
        };
        distance <= stats.attack.range
            && gap <= stats.attack_height_tolerance
            && (!stats.attack.is_ranged() || self.core.sees_target())
    }

    fn out_of_attack_range(&self) -> bool {
        let stats = &self.core.stats;
        let (Some(distance), Some(gap)) = (self.core.distance_to_target(), self.core.height_gap_to_target()) else {
            return false;
        };
        distance > stats.attack.range * stats.attack_hysteresis
            || gap > stats.attack_height_tolerance
            || (stats.attack.is_ranged() && !self.core.sees_target())
    }

    fn should_give_up(&self) -> bool {
        let core = &self.core;
        core.target.is_none()
            || core.position().horizontal_distance(core.spawn) > core.stats.max_chase_distance
            || (!core.sees_target() && core.timers.expired(Timer::LoseTarget))
    }

    fn home_with_patrol(&self) -> bool {
        self.has_patrol() && has_arrived(self.core.nav.as_ref())
    }

    fn home_without_patrol(&self) -> bool {
        !self.has_patrol() && has_arrived(self.core.nav.as_ref())
    }

    /// Where to go after Hit or Jump
    pub(crate) fn resume_state(&self) -> HostileState {
        if let Some(state) = self.ext.resume_override(self.resume) {
            return state;
        }
        match self.resume {
            HostileState::Hit | HostileState::Dead | HostileState::Jump => HostileState::Idle,
            other => other,
        }
    }

    fn head_to_waypoint(&mut self) {
        let Some(point) = self.patrol.get(self.patrol_index).copied() else {
            return;
        };
        if !self.core.move_to(point) {
            self.advance_waypoint();
        }
    }

    fn advance_waypoint(&mut self) {
        let count = self.patrol.len();
        if count < 2 {
            self.patrol_index = 0;
            return;
        }
        self.patrol_index = if self.core.stats.random_patrol {
            let pick = self.core.rng.gen_range(0..count - 1);
            if pick >= self.patrol_index {
                pick + 1
            } else {
                pick
            }
        } else {
            (self.patrol_index + 1) % count
        };
    }

    fn reset_progress(&mut self) {
        self.patrol_index = 0;
        self.waiting = false;
        self.resume = HostileState::Idle;
        self.jump = None;
        self.ext.reset();
    }
}

fn enter_idle<X: Extension>(b: &mut HostileBrain<X>) {
    b.core.halt();
}

fn enter_patrol<X: Extension>(b: &mut HostileBrain<X>) {
    let speed = b.core.stats.walk_speed;
    b.core.set_move_speed(speed);
    b.waiting = false;
    b.head_to_waypoint();
}

fn update_patrol<X: Extension>(b: &mut HostileBrain<X>, _delta: f32) -> Option<HostileState> {
    if b.patrol.is_empty() {
        return Some(HostileState::Idle);
    }
    if b.waiting {
        if b.core.timers.expired(Timer::PatrolWait) {
            b.waiting = false;
            b.advance_waypoint();
            b.head_to_waypoint();
        }
    } else if has_arrived(b.core.nav.as_ref()) {
        b.waiting = true;
        let wait = b.core.stats.patrol_wait_time;
        b.core.timers.set(Timer::PatrolWait, wait);
    }
    None
}

fn enter_chase<X: Extension>(b: &mut HostileBrain<X>) {
    let speed = b.core.stats.run_speed;
    b.core.set_move_speed(speed);
    b.core.nav.resume();
    b.core.refresh_route();
    if b.core.timers.expired(Timer::LoseTarget) {
        let grace = b.core.stats.lose_target_time;
        b.core.timers.set(Timer::LoseTarget, grace);
    }
}

pub(crate) fn update_chase<X: Extension>(b: &mut HostileBrain<X>, _delta: f32) -> Option<HostileState> {
    let goal = b.core.target_position()?;
    if !b.core.follow_point(goal, 0.5) {
        return Some(HostileState::Return);
    }
    None
}

fn enter_attack<X: Extension>(b: &mut HostileBrain<X>) {
    b.core.halt();
}

pub(crate) fn update_attack<X: Extension>(b: &mut HostileBrain<X>, delta: f32) -> Option<HostileState> {
    let goal = b.core.target_position()?;
    b.core.face(goal, delta);
    let tolerance = (b.core.stats.attack.melee_angle * 0.5).max(10.0);
    if b.core.angle_to_target().is_some_and(|angle| angle <= tolerance) {
        b.core.attack_target();
    }
    None
}

fn exit_attack<X: Extension>(b: &mut HostileBrain<X>) {
    b.core.stop_firing();
    b.core.nav.resume();
}

fn enter_return<X: Extension>(b: &mut HostileBrain<X>) {
    b.core.forget_target();
    b.core.stop_firing();
    let speed = b.core.stats.walk_speed;
    b.core.set_move_speed(speed);
    let spawn = b.core.spawn;
    // A failed request leaves no path, which reads as arrived
    b.core.move_to(spawn);
}

fn enter_hit<X: Extension>(b: &mut HostileBrain<X>) {
    b.core.halt();
    b.core.stop_firing();
    let stun = b.core.stats.hit_stun_duration;
    b.core.timers.set(Timer::Stun, stun);
    b.core.emit(EffectKind::Hit);
}

fn update_hit<X: Extension>(b: &mut HostileBrain<X>, _delta: f32) -> Option<HostileState> {
    if b.core.timers.running(Timer::Stun) {
        return None;
    }
    Some(if b.core.sees_target() {
        HostileState::Chase
    } else {
        b.resume_state()
    })
}

fn exit_hit<X: Extension>(b: &mut HostileBrain<X>) {
    b.core.nav.resume();
}

fn enter_jump<X: Extension>(b: &mut HostileBrain<X>) {
    b.core.stop_firing();
    let Some(link) = b.core.nav.current_link() else {
        return;
    };
    b.jump = Some(JumpArc {
        start: link.start,
        end: link.end,
        elapsed: 0.0,
        duration: b.core.stats.jump_duration.max(0.05),
        height: b.core.stats.jump_height,
    });
    b.core.pose.look_at(link.end);
    b.core.emit(EffectKind::Jump);
    log::debug!("{}: jumping {:?} -> {:?}", b.core.id(), link.start, link.end);
}

fn update_jump<X: Extension>(b: &mut HostileBrain<X>, delta: f32) -> Option<HostileState> {
    let landing = match b.jump.as_mut() {
        Some(arc) => {
            arc.elapsed += delta;
            let t = (arc.elapsed / arc.duration).min(1.0);
            b.core.pose.position = arc.start.lerp(arc.end, t) + Vec3::Y * parabolic_arc(arc.height, t);
            (t >= 1.0).then_some(arc.end)
        }
        None => Some(b.core.nav.position()),
    };
    let end = landing?;

    b.jump = None;
    b.core.nav.complete_link();
    if b.core.nav.position().distance(end) > 0.1 {
        if let Err(err) = b.core.nav.warp(end) {
            log::warn!("{}: landing warp failed: {err}", b.core.id());
        }
    }
    b.core.pose.position = b.core.nav.position();
    Some(if b.core.sees_target() {
        HostileState::Chase
    } else {
        b.resume_state()
    })
}

fn exit_jump<X: Extension>(b: &mut HostileBrain<X>) {
    b.jump = None;
}

fn enter_dead<X: Extension>(b: &mut HostileBrain<X>) {
    b.core.on_death();
}

fn install_baseline<X: Extension>(fsm: &mut StateMachine<HostileState, HostileBrain<X>>) {
    use HostileState::*;

    fsm.on_enter(Idle, enter_idle::<X>);
    fsm.on_enter(Patrol, enter_patrol::<X>);
    fsm.on_update(Patrol, update_patrol::<X>);
    fsm.on_enter(Chase, enter_chase::<X>);
    fsm.on_update(Chase, update_chase::<X>);
    fsm.on_enter(Attack, enter_attack::<X>);
    fsm.on_update(Attack, update_attack::<X>);
    fsm.on_exit(Attack, exit_attack::<X>);
    fsm.on_enter(Return, enter_return::<X>);
    fsm.on_enter(Hit, enter_hit::<X>);
    fsm.on_update(Hit, update_hit::<X>);
    fsm.on_exit(Hit, exit_hit::<X>);
    fsm.on_enter(Jump, enter_jump::<X>);
    fsm.on_update(Jump, update_jump::<X>);
    fsm.on_exit(Jump, exit_jump::<X>);
    fsm.on_enter(Dead, enter_dead::<X>);

    fsm.add_transition(Idle, Chase, HostileBrain::<X>::noticed_target);
    fsm.add_transition(Patrol, Chase, HostileBrain::<X>::noticed_target);
    fsm.add_transition_priority(Chase, Return, HostileBrain::<X>::should_give_up, 1);
    fsm.add_transition(Chase, Attack, HostileBrain::<X>::in_attack_range);
    fsm.add_transition_priority(Attack, Return, HostileBrain::<X>::lost_target, 1);
    fsm.add_transition(Attack, Chase, HostileBrain::<X>::out_of_attack_range);
    fsm.add_transition(Return, Patrol, HostileBrain::<X>::home_with_patrol);
    fsm.add_transition(Return, Idle, HostileBrain::<X>::home_without_patrol);
}

/// Hostile agent: a brain plus the state machine that drives it
pub struct HostileAgent<X: Extension = ()> {
    pub(crate) brain: HostileBrain<X>,
    pub(crate) fsm: StateMachine<HostileState, HostileBrain<X>>,
    started: bool,
}

impl HostileAgent {
    /// Create an inert baseline hostile standing where `nav` is
    pub fn new(id: EntityId, nav: Box<dyn NavigationPort>, env: AgentEnvironment) -> Self {
        Self::assemble(AgentCore::new(id, Faction::Hostile, nav, env), ())
    }
}

impl<X: Extension> HostileAgent<X> {
    pub(crate) fn assemble(core: AgentCore, ext: X) -> Self {
        let mut fsm = StateMachine::new(HostileState::Idle).with_label(format!("hostile {}", core.id()));
        install_baseline(&mut fsm);
        Self {
            brain: HostileBrain::new(core, ext),
            fsm,
            started: false,
        }
    }

    pub fn with_patrol(mut self, points: Vec<Vec3>) -> Self {
        self.set_patrol(points);
        self
    }

    pub fn set_patrol(&mut self, points: Vec<Vec3>) {
        self.brain.patrol = points;
        self.brain.patrol_index = 0;
    }

    /// Apply a stat block. Must precede `start`.
    pub fn initialize(&mut self, stats: AgentStats) {
        self.brain.core.initialize(stats);
    }

    /// First target acquisition, then Patrol (with waypoints) or Idle
    pub fn start(&mut self) {
        if !self.brain.core.is_initialized() {
            log::warn!("{}: started before initialize, using default stats", self.brain.core.id());
            self.brain.core.initialize(AgentStats::default());
        }
        self.started = true;
        self.brain.core.perception.force_next();
        self.brain.core.update_perception(0.0, true);

        if self.brain.has_patrol() {
            self.fsm.change_state(HostileState::Patrol, &mut self.brain);
        } else {
            enter_idle(&mut self.brain);
        }
    }

    /// Advance one simulation step
    pub fn tick(&mut self, delta: f32) {
        if !self.started || self.fsm.current() == HostileState::Dead {
            return;
        }
        let delta = delta.max(0.0);
        let brain = &mut self.brain;
        brain.core.tick_timers(delta);

        let signals = brain.core.drain_health_events();
        if signals.died || !brain.core.is_alive() {
            self.fsm.change_state(HostileState::Dead, brain);
            return;
        }
        if signals.damaged {
            brain.core.notice_attacker(signals.attacker);
        }

        let state = self.fsm.current();
        if let Some(forced) = X::react(brain, state) {
            self.fsm.change_state(forced, brain);
        } else if signals.damaged && brain.core.stats.stunnable && !brain.ext.holds_through_hits(state) {
            if state == HostileState::Hit {
                let stun = brain.core.stats.hit_stun_duration;
                brain.core.timers.set(Timer::Stun, stun);
            } else {
                brain.resume = state;
                self.fsm.change_state(HostileState::Hit, brain);
            }
        }

        let state = self.fsm.current();
        if brain.ext.holds_through_hits(state) {
            brain.core.discard_knockback();
        } else {
            brain.core.apply_knockback();
        }

        brain.core.validate_target();
        brain.core.update_perception(delta, state != HostileState::Return);

        if state != HostileState::Jump && brain.core.nav.is_on_traversal_link() {
            brain.resume = state;
            self.fsm.change_state(HostileState::Jump, brain);
        }

        self.fsm.update(brain, delta);
        brain.core.update_combat(delta);
        if self.fsm.current() != HostileState::Jump {
            brain.core.advance_movement(delta);
        }
        brain.core.sync_body();
    }

    /// Back to the inert constructed state; `initialize` and `start` must follow
    pub fn reset(&mut self) {
        self.brain.core.reset();
        self.brain.reset_progress();
        self.fsm.reset(HostileState::Idle);
        self.started = false;
    }

    /// Force a state change, running exit and enter hooks
    pub fn change_state(&mut self, to: HostileState) -> bool {
        self.fsm.change_state(to, &mut self.brain)
    }

    pub fn state(&self) -> HostileState {
        self.fsm.current()
    }

    pub fn previous_state(&self) -> Option<HostileState> {
        self.fsm.previous()
    }

    pub fn time_in_state(&self) -> f32 {
        self.fsm.time_in_state()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn brain(&self) -> &HostileBrain<X> {
        &self.brain
    }

    pub fn core(&self) -> &AgentCore {
        &self.brain.core
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.brain.core
    }
}

impl<X: Extension> AgentController for HostileAgent<X> {
    fn id(&self) -> EntityId {
        self.brain.core.id()
    }

    fn start(&mut self) {
        HostileAgent::start(self);
    }

    fn tick(&mut self, delta: f32) {
        HostileAgent::tick(self, delta);
    }

    fn reset(&mut self) {
        HostileAgent::reset(self);
    }

    fn is_dead(&self) -> bool {
        self.state() == HostileState::Dead
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn core(&self) -> &AgentCore {
        &self.brain.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use std::sync::Arc;
    use void_ai::{MeshNavigator, NavMesh};
    use void_combat::{Actor, AttackProfile, DamageInfo, DamageType, Damageable, EffectLog, SharedTarget, TargetPool};

    const DT: f32 = 0.1;

    fn flat() -> Arc<NavMesh> {
        Arc::new(NavMesh::create_grid(40.0, 40.0, 2.0))
    }

    fn player(pool: &TargetPool, position: Vec3) -> Arc<RwLock<Actor>> {
        let actor = Arc::new(RwLock::new(Actor::new(EntityId(100), Faction::Ally, 100.0).at(position)));
        let shared: SharedTarget = actor.clone();
        pool.register(&shared);
        actor
    }

    fn hostile(mesh: Arc<NavMesh>, env: AgentEnvironment, position: Vec3) -> HostileAgent {
        let nav = MeshNavigator::new(mesh, position);
        HostileAgent::new(EntityId(1), Box::new(nav), env)
    }

    fn melee_stats() -> AgentStats {
        AgentStats {
            attack: AttackProfile::melee(10.0, 2.0, 1.0),
            ..AgentStats::default()
        }
    }

    fn run(agent: &mut HostileAgent, seconds: f32) {
        for _ in 0..(seconds / DT).round() as usize {
            agent.tick(DT);
        }
    }

    #[test]
    fn test_starts_idle_and_chases_visible_target() {
        let pool = TargetPool::new();
        let _player = player(&pool, Vec3::new(10.0, 0.0, 18.0));
        let mut agent = hostile(flat(), AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0));
        agent.initialize(melee_stats());
        agent.start();
        assert_eq!(agent.state(), HostileState::Idle);
        assert!(agent.core().sees_target());

        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Chase);
    }

    #[test]
    fn test_attack_falls_back_to_chase_past_hysteresis() {
        let pool = TargetPool::new();
        let player = player(&pool, Vec3::new(10.0, 0.0, 11.5));
        let mut agent = hostile(flat(), AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0));
        agent.initialize(melee_stats());
        agent.start();

        run(&mut agent, 0.3);
        assert_eq!(agent.state(), HostileState::Attack);

        let pose = agent.core().pose;
        player.write().pose.position = pose.position + pose.forward * 2.6;
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Chase);
    }

    #[test]
    fn test_stun_resumes_chase_when_target_visible() {
        let pool = TargetPool::new();
        let _player = player(&pool, Vec3::new(10.0, 0.0, 16.0));
        let mut agent = hostile(flat(), AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0));
        agent.initialize(melee_stats());
        agent.start();
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Chase);

        agent
            .core()
            .body()
            .write()
            .take_damage(&DamageInfo::new(5.0, DamageType::Melee).with_source(EntityId(100)));
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Hit);

        agent.tick(DT);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Hit);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Chase);
    }

    #[test]
    fn test_stun_resumes_previous_state_without_target() {
        let pool = TargetPool::new();
        let mut agent = hostile(flat(), AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0))
            .with_patrol(vec![Vec3::new(10.0, 0.0, 10.0), Vec3::new(20.0, 0.0, 10.0)]);
        agent.initialize(melee_stats());
        agent.start();
        assert_eq!(agent.state(), HostileState::Patrol);

        agent.core().body().write().take_damage(&DamageInfo::new(5.0, DamageType::Melee));
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Hit);
        run(&mut agent, 0.4);
        assert_eq!(agent.state(), HostileState::Patrol);
    }

    #[test]
    fn test_patrol_walks_between_waypoints() {
        let pool = TargetPool::new();
        let mut agent = hostile(flat(), AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0))
            .with_patrol(vec![Vec3::new(10.0, 0.0, 10.0), Vec3::new(14.0, 0.0, 10.0)]);
        agent.initialize(AgentStats {
            patrol_wait_time: 0.5,
            ..melee_stats()
        });
        agent.start();

        let mut furthest: f32 = 0.0;
        for _ in 0..40 {
            agent.tick(DT);
            furthest = furthest.max(agent.core().position().x);
        }
        assert!(furthest > 13.4, "reached x = {furthest}");
        assert_eq!(agent.state(), HostileState::Patrol);
    }

    #[test]
    fn test_returns_home_when_target_disappears() {
        let pool = TargetPool::new();
        let player = player(&pool, Vec3::new(10.0, 0.0, 18.0));
        let mut agent = hostile(flat(), AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0));
        agent.initialize(melee_stats());
        agent.start();
        run(&mut agent, 1.0);
        assert_eq!(agent.state(), HostileState::Chase);

        pool.unregister(EntityId(100));
        drop(player);
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Return);
        assert!(agent.core().target.is_none());

        run(&mut agent, 5.0);
        assert_eq!(agent.state(), HostileState::Idle);
        assert!(agent.core().position().horizontal_distance(Vec3::new(10.0, 0.0, 10.0)) < 0.6);
    }

    #[test]
    fn test_jump_crosses_traversal_link() {
        let mut mesh = NavMesh::create_grid(20.0, 20.0, 5.0);
        mesh.add_grid(Vec3::new(30.0, 4.0, 0.0), 10.0, 10.0, 5.0);
        mesh.add_link(Vec3::new(19.5, 0.0, 2.5), Vec3::new(30.5, 4.0, 2.5), true);
        let pool = TargetPool::new();
        let mut agent = hostile(Arc::new(mesh), AgentEnvironment::new(pool.clone()), Vec3::new(12.5, 0.0, 2.5))
            .with_patrol(vec![Vec3::new(35.0, 4.0, 2.5)]);
        agent.initialize(melee_stats());
        agent.start();

        let mut jumped = false;
        for _ in 0..100 {
            agent.tick(DT);
            jumped |= agent.state() == HostileState::Jump;
        }
        assert!(jumped);
        assert_eq!(agent.state(), HostileState::Patrol);
        assert!((agent.core().position().y - 4.0).abs() < 1e-3);
        assert!(agent.core().position().x > 30.0);
        assert!(!agent.core().nav.is_on_traversal_link());
    }

    #[test]
    fn test_lethal_damage_enters_dead() {
        let pool = TargetPool::new();
        let effects = Arc::new(EffectLog::new());
        let env = AgentEnvironment::new(pool.clone()).with_effects(effects.clone());
        let mut agent = hostile(flat(), env, Vec3::new(10.0, 0.0, 10.0));
        agent.initialize(melee_stats());
        agent.start();

        agent.core().body().write().take_damage(&DamageInfo::new(500.0, DamageType::Melee));
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Dead);
        assert!(!agent.core().nav.is_enabled());

        run(&mut agent, 1.0);
        assert_eq!(agent.state(), HostileState::Dead);
        assert_eq!(effects.count(EffectKind::Death), 1);
        assert!(AgentController::is_dead(&agent));
    }

    #[test]
    fn test_reset_returns_to_inert_state() {
        let pool = TargetPool::new();
        let _player = player(&pool, Vec3::new(10.0, 0.0, 16.0));
        let mut agent = hostile(flat(), AgentEnvironment::new(pool.clone()), Vec3::new(10.0, 0.0, 10.0));
        agent.initialize(melee_stats());
        agent.start();
        run(&mut agent, 1.0);
        assert_ne!(agent.core().position(), Vec3::new(10.0, 0.0, 10.0));

        agent.reset();
        assert_eq!(agent.state(), HostileState::Idle);
        assert!(!agent.is_started());
        assert!(!agent.core().is_initialized());
        assert!(agent.core().target.is_none());
        assert_eq!(agent.core().position(), Vec3::new(10.0, 0.0, 10.0));

        // Ticks before start are ignored
        agent.tick(DT);
        assert_eq!(agent.state(), HostileState::Idle);
    }
}
