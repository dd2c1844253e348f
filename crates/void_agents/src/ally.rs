//! Squad-mate controller
//!
//! Allies follow a formation slot around the squad anchor, engage what they
//! see, and drop everything to regroup when they stray too far. Squad
//! commands override the state machine.

use serde::{Deserialize, Serialize};
use void_ai::{NavigationPort, State, StateMachine};
use void_combat::{EntityId, Faction};
use void_math::{Pose, Vec3};

use crate::config::AllyStats;
use crate::core::{AgentController, AgentCore, AgentEnvironment, Timer};
use crate::squad::SquadCommand;

/// Back-off after a navigation failure before following again
const RETRY_DELAY: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllyState {
    Idle,
    Follow,
    Combat,
    Regroup,
    Dead,
}

impl State for AllyState {
    fn is_terminal(&self) -> bool {
        matches!(self, AllyState::Dead)
    }
}

impl AllyState {
    pub fn name(self) -> &'static str {
        match self {
            AllyState::Idle => "idle",
            AllyState::Follow => "follow",
            AllyState::Combat => "combat",
            AllyState::Regroup => "regroup",
            AllyState::Dead => "dead",
        }
    }
}

/// Standing order from the squad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Follow,
    Attack,
    Hold,
}

/// Context the ally state machine drives
pub struct AllyBrain {
    pub core: AgentCore,
    stats: AllyStats,
    order: Order,
    /// Position ordered by an Attack command without a target
    attack_point: Option<Vec3>,
    slot: usize,
    slot_position: Vec3,
    anchor: Pose,
}

impl AllyBrain {
    fn new(core: AgentCore) -> Self {
        let home = Pose::new(core.spawn, core.pose.forward);
        Self {
            slot_position: core.spawn,
            anchor: home,
            core,
            stats: AllyStats::default(),
            order: Order::Follow,
            attack_point: None,
            slot: 0,
        }
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn slot_position(&self) -> Vec3 {
        self.slot_position
    }

    pub fn anchor(&self) -> Pose {
        self.anchor
    }

    pub fn attack_point(&self) -> Option<Vec3> {
        self.attack_point
    }

    fn anchor_distance(&self) -> f32 {
        self.core.position().horizontal_distance(self.anchor.position)
    }

    fn arrival_tolerance(&self) -> f32 {
        self.stats.formation_tolerance.max(self.core.nav.stopping_distance())
    }

    fn may_follow(&self) -> bool {
        self.order != Order::Hold && self.core.timers.expired(Timer::Retry)
    }

    fn should_engage(&self) -> bool {
        self.order != Order::Hold && self.core.sees_target()
    }

    fn beyond_leash(&self) -> bool {
        self.anchor_distance() > self.stats.leash_distance
    }

    fn beyond_combat_leash(&self) -> bool {
        self.anchor_distance() > self.stats.leash_distance * self.stats.combat_leash_fraction
    }

    fn lost_target(&self) -> bool {
        self.core.target.is_none() || (!self.core.sees_target() && self.core.timers.expired(Timer::LoseTarget))
    }

    fn at_slot(&self) -> bool {
        self.core.position().horizontal_distance(self.slot_position) <= self.arrival_tolerance()
    }

    /// Target in weapon range and, for ranged weapons, in sight
    fn can_fire(&self, stretch: f32) -> bool {
        let attack = &self.core.stats.attack;
        let (Some(distance), Some(gap)) = (self.core.distance_to_target(), self.core.height_gap_to_target()) else {
            return false;
        };
        distance <= attack.range * stretch
            && gap <= self.core.stats.attack_height_tolerance
            && (!attack.is_ranged() || self.core.sees_target())
    }

    /// Face the target and attack once lined up
    fn engage(&mut self, delta: f32) {
        let Some(goal) = self.core.target_position() else {
            return;
        };
        self.core.face(goal, delta);
        let tolerance = (self.core.stats.attack.melee_angle * 0.5).max(10.0);
        if self.core.angle_to_target().is_some_and(|angle| angle <= tolerance) {
            self.core.attack_target();
        }
    }

    /// Navigation gave up: wait in Idle before trying again
    fn back_off(&mut self) -> Option<AllyState> {
        self.core.timers.set(Timer::Retry, RETRY_DELAY);
        Some(AllyState::Idle)
    }
}

fn enter_idle(b: &mut AllyBrain) {
    b.core.halt();
    b.core.stop_firing();
}

/// Hold-position fire: engage without moving
fn update_idle(b: &mut AllyBrain, delta: f32) -> Option<AllyState> {
    if b.order == Order::Hold && b.can_fire(1.0) {
        b.engage(delta);
    } else {
        b.core.stop_firing();
    }
    None
}

fn enter_follow(b: &mut AllyBrain) {
    let speed = b.stats.follow_speed;
    b.core.set_move_speed(speed);
    b.core.stop_firing();
    b.core.nav.resume();
    b.core.refresh_route();
}

fn update_follow(b: &mut AllyBrain, delta: f32) -> Option<AllyState> {
    let tolerance = b.arrival_tolerance();
    if let Some(point) = b.attack_point {
        if b.core.position().horizontal_distance(point) <= tolerance {
            log::debug!("{}: reached ordered position {:?}", b.core.id(), point);
            b.attack_point = None;
            b.core.refresh_route();
        }
    }
    let goal = b.attack_point.unwrap_or(b.slot_position);
    if !b.core.follow_point(goal, tolerance * 0.5) {
        return b.back_off();
    }

    if b.attack_point.is_none() && b.at_slot() {
        let ahead = b.core.position() + b.anchor.forward;
        b.core.face(ahead, delta);
    }
    None
}

fn enter_combat(b: &mut AllyBrain) {
    let speed = b.core.stats.run_speed;
    b.core.set_move_speed(speed);
    b.core.refresh_route();
    if b.core.timers.expired(Timer::LoseTarget) {
        let grace = b.core.stats.lose_target_time;
        b.core.timers.set(Timer::LoseTarget, grace);
    }
}

fn update_combat(b: &mut AllyBrain, delta: f32) -> Option<AllyState> {
    let goal = b.core.target_position()?;
    let stretch = if b.core.combat.is_firing() {
        b.core.stats.attack_hysteresis
    } else {
        1.0
    };
    if b.can_fire(stretch) {
        b.core.halt();
        b.engage(delta);
        return None;
    }
    b.core.stop_firing();
    if !b.core.follow_point(goal, 0.5) {
        return b.back_off();
    }
    None
}

fn exit_combat(b: &mut AllyBrain) {
    b.core.stop_firing();
    b.core.nav.resume();
}

fn enter_regroup(b: &mut AllyBrain) {
    b.core.forget_target();
    b.core.stop_firing();
    let speed = b.stats.regroup_speed;
    b.core.set_move_speed(speed);
    b.core.refresh_route();
    log::debug!("{}: regrouping, {:.1} from anchor", b.core.id(), b.anchor_distance());
}

fn update_regroup(b: &mut AllyBrain, _delta: f32) -> Option<AllyState> {
    let slot = b.slot_position;
    let tolerance = b.arrival_tolerance();
    if !b.core.follow_point(slot, tolerance * 0.5) {
        return b.back_off();
    }
    None
}

fn enter_dead(b: &mut AllyBrain) {
    b.core.on_death();
}

fn install(fsm: &mut StateMachine<AllyState, AllyBrain>) {
    use AllyState::*;

    fsm.on_enter(Idle, enter_idle);
    fsm.on_update(Idle, update_idle);
    fsm.on_enter(Follow, enter_follow);
    fsm.on_update(Follow, update_follow);
    fsm.on_enter(Combat, enter_combat);
    fsm.on_update(Combat, update_combat);
    fsm.on_exit(Combat, exit_combat);
    fsm.on_enter(Regroup, enter_regroup);
    fsm.on_update(Regroup, update_regroup);
    fsm.on_enter(Dead, enter_dead);

    fsm.add_transition(Idle, Follow, AllyBrain::may_follow);
    fsm.add_transition_priority(Follow, Regroup, AllyBrain::beyond_leash, 1);
    fsm.add_transition(Follow, Combat, AllyBrain::should_engage);
    fsm.add_transition_priority(Combat, Regroup, AllyBrain::beyond_combat_leash, 1);
    fsm.add_transition(Combat, Follow, AllyBrain::lost_target);
    fsm.add_transition(Regroup, Follow, AllyBrain::at_slot);
}

/// AI-controlled squad member
pub struct AllyAgent {
    brain: AllyBrain,
    fsm: StateMachine<AllyState, AllyBrain>,
    started: bool,
}

impl AllyAgent {
    /// Create an inert ally standing where `nav` is
    pub fn new(id: EntityId, nav: Box<dyn NavigationPort>, env: AgentEnvironment) -> Self {
        let core = AgentCore::new(id, Faction::Ally, nav, env);
        let mut fsm = StateMachine::new(AllyState::Idle).with_label(format!("ally {id}"));
        install(&mut fsm);
        Self {
            brain: AllyBrain::new(core),
            fsm,
            started: false,
        }
    }

    /// Apply a stat block. Must precede `start`.
    pub fn initialize(&mut self, stats: AllyStats) {
        self.brain.core.initialize(stats.base.clone());
        self.brain.stats = stats;
    }

    /// First target acquisition, then Follow (or Idle under a Hold order)
    pub fn start(&mut self) {
        if !self.brain.core.is_initialized() {
            log::warn!("{}: started before initialize, using default stats", self.brain.core.id());
            self.initialize(AllyStats::default());
        }
        self.started = true;
        self.brain.core.perception.force_next();
        self.brain.core.update_perception(0.0, true);

        if self.brain.order == Order::Hold {
            enter_idle(&mut self.brain);
        } else {
            self.fsm.change_state(AllyState::Follow, &mut self.brain);
        }
    }

    /// Apply a squad command, overriding the current state
    pub fn command(&mut self, command: &SquadCommand) {
        if self.fsm.current() == AllyState::Dead {
            return;
        }
        let b = &mut self.brain;
        log::debug!("{}: command {}", b.core.id(), command.name());
        match command {
            SquadCommand::Follow => {
                b.order = Order::Follow;
                b.attack_point = None;
                b.core.forget_target();
                b.core.stop_firing();
                if self.started {
                    self.fsm.change_state(AllyState::Follow, b);
                }
            }
            SquadCommand::Attack {
                target: Some(handle), ..
            } if handle.is_valid() && b.core.faction().is_hostile_to(handle.faction()) => {
                b.order = Order::Attack;
                b.attack_point = None;
                b.core.target = Some(handle.clone());
                b.core.perception.force_next();
                let grace = b.core.stats.lose_target_time;
                b.core.timers.set(Timer::LoseTarget, grace);
                if self.started {
                    self.fsm.change_state(AllyState::Combat, b);
                }
            }
            SquadCommand::Attack { position, .. } => {
                b.order = Order::Attack;
                b.attack_point = Some(*position);
                b.core.refresh_route();
                if self.started {
                    self.fsm.change_state(AllyState::Follow, b);
                }
            }
            SquadCommand::Hold => {
                b.order = Order::Hold;
                b.attack_point = None;
                b.core.nav.reset_path();
                b.core.halt();
                if self.started {
                    self.fsm.change_state(AllyState::Idle, b);
                }
            }
        }
    }

    /// Formation slot assigned by the squad, resolved against `anchor`
    pub fn assign_slot(&mut self, slot: usize, position: Vec3, anchor: Pose) {
        self.brain.slot = slot;
        self.brain.slot_position = position;
        self.brain.anchor = anchor;
    }

    /// Advance one simulation step
    pub fn tick(&mut self, delta: f32) {
        if !self.started || self.fsm.current() == AllyState::Dead {
            return;
        }
        let delta = delta.max(0.0);
        let brain = &mut self.brain;
        brain.core.tick_timers(delta);

        let signals = brain.core.drain_health_events();
        if signals.died || !brain.core.is_alive() {
            self.fsm.change_state(AllyState::Dead, brain);
            return;
        }
        if signals.damaged {
            brain.core.notice_attacker(signals.attacker);
        }
        brain.core.apply_knockback();

        // Allies cross links by snapping to the far end
        if brain.core.nav.is_on_traversal_link() {
            brain.core.nav.complete_link();
            brain.core.pose.position = brain.core.nav.position();
        }

        let state = self.fsm.current();
        brain.core.validate_target();
        brain.core.update_perception(delta, state != AllyState::Regroup);

        self.fsm.update(brain, delta);
        brain.core.update_combat(delta);
        brain.core.advance_movement(delta);
        brain.core.sync_body();
    }

    /// Back to the inert constructed state; `initialize` and `start` must follow
    pub fn reset(&mut self) {
        self.brain.core.reset();
        let spawn = self.brain.core.spawn;
        let b = &mut self.brain;
        b.stats = AllyStats::default();
        b.order = Order::Follow;
        b.attack_point = None;
        b.slot = 0;
        b.slot_position = spawn;
        b.anchor = Pose::new(spawn, b.core.pose.forward);
        self.fsm.reset(AllyState::Idle);
        self.started = false;
    }

    pub fn change_state(&mut self, to: AllyState) -> bool {
        self.fsm.change_state(to, &mut self.brain)
    }

    pub fn state(&self) -> AllyState {
        self.fsm.current()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_alive(&self) -> bool {
        self.fsm.current() != AllyState::Dead && self.brain.core.is_alive()
    }

    pub fn brain(&self) -> &AllyBrain {
        &self.brain
    }

    pub fn stats(&self) -> &AllyStats {
        &self.brain.stats
    }

    pub fn core(&self) -> &AgentCore {
        &self.brain.core
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.brain.core
    }
}

impl AgentController for AllyAgent {
    fn id(&self) -> EntityId {
        self.brain.core.id()
    }

    fn start(&mut self) {
        AllyAgent::start(self);
    }

    fn tick(&mut self, delta: f32) {
        AllyAgent::tick(self, delta);
    }

    fn reset(&mut self) {
        AllyAgent::reset(self);
    }

    fn is_dead(&self) -> bool {
        self.state() == AllyState::Dead
    }

    fn state_name(&self) -> &'static str {
        self.state().name()
    }

    fn core(&self) -> &AgentCore {
        &self.brain.core
    }
}
