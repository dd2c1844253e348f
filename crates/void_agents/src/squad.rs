//! Squad roster, formation layout and command broadcast

use serde::{Deserialize, Serialize};
use void_combat::{EntityId, TargetHandle};
use void_math::{consts::GOLDEN_ANGLE, degrees, Pose, Vec3};

use crate::ally::{AllyAgent, AllyState};
use crate::config::SquadConfig;

/// Closed-form slot layouts around the squad anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationType {
    /// Evenly spaced on a circle
    #[default]
    Ring,
    /// Abreast, behind the anchor
    Line,
    /// V-shaped rows trailing the anchor
    Wedge,
    /// Loosely scattered on a sunflower spiral
    Spread,
}

/// World position of slot `index` in a roster of `count`.
///
/// An index past the end is clamped to the last slot; an empty roster
/// resolves to the anchor itself.
pub fn formation_position(
    index: usize,
    count: usize,
    anchor: &Pose,
    formation: FormationType,
    radius: f32,
    spacing: f32,
) -> Vec3 {
    if count == 0 {
        return anchor.position;
    }
    let index = index.min(count - 1);
    let i = index as f32;
    let back = -anchor.forward;
    let right = anchor.right();

    let offset = match formation {
        FormationType::Ring => back.rotate_y(360.0 * i / count as f32) * radius,
        FormationType::Line => {
            let centered = i - (count as f32 - 1.0) * 0.5;
            back * radius + right * (centered * spacing)
        }
        FormationType::Wedge => {
            let row = (index / 2 + 1) as f32;
            let side = if index % 2 == 0 { -1.0 } else { 1.0 };
            back * (radius * 0.5 + row * spacing) + right * (side * row * spacing)
        }
        FormationType::Spread => back.rotate_y(degrees(i * GOLDEN_ANGLE)) * (radius + spacing * i.sqrt()),
    };
    (anchor.position + offset).with_y(anchor.position.y)
}

/// Order broadcast to the squad
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SquadCommand {
    #[default]
    Follow,
    /// Engage `target` if given, otherwise move to `position`
    Attack {
        position: Vec3,
        target: Option<TargetHandle>,
    },
    Hold,
}

impl SquadCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SquadCommand::Follow => "follow",
            SquadCommand::Attack { .. } => "attack",
            SquadCommand::Hold => "hold",
        }
    }
}

/// Owns the allies of one squad
pub struct SquadCoordinator {
    members: Vec<AllyAgent>,
    config: SquadConfig,
    /// Body the formation is anchored to; the anchor stays put without one
    leader: Option<TargetHandle>,
    anchor: Pose,
    command: SquadCommand,
}

impl SquadCoordinator {
    pub fn new(config: SquadConfig, anchor: Pose) -> Self {
        Self {
            members: Vec::new(),
            config,
            leader: None,
            anchor,
            command: SquadCommand::Follow,
        }
    }

    pub fn with_leader(mut self, leader: TargetHandle) -> Self {
        self.set_leader(leader);
        self
    }

    pub fn set_leader(&mut self, leader: TargetHandle) {
        self.leader = Some(leader);
        self.follow_leader();
    }

    pub fn leader(&self) -> Option<&TargetHandle> {
        self.leader.as_ref()
    }

    pub fn set_anchor(&mut self, anchor: Pose) {
        self.anchor = anchor;
    }

    pub fn anchor(&self) -> Pose {
        self.anchor
    }

    pub fn config(&self) -> &SquadConfig {
        &self.config
    }

    pub fn set_formation(&mut self, formation: FormationType) {
        self.config.formation = formation;
        self.assign_slots();
    }

    /// Enlist an ally. It is started if needed, given the next slot and the
    /// active command. Returns its slot index.
    pub fn add_member(&mut self, mut ally: AllyAgent) -> usize {
        if !ally.is_started() {
            ally.start();
        }
        let slot = self.members.len();
        log::info!("squad: {} joined at slot {slot} ({})", ally.core().id(), self.command.name());
        self.members.push(ally);
        self.assign_slots();
        if let Some(member) = self.members.get_mut(slot) {
            member.command(&self.command);
        }
        slot
    }

    /// Remove a member; the rest close ranks
    pub fn remove_member(&mut self, id: EntityId) -> Option<AllyAgent> {
        let index = self.index_of(id)?;
        let ally = self.members.remove(index);
        self.assign_slots();
        log::info!("squad: {id} left, {} remaining", self.members.len());
        Some(ally)
    }

    pub fn members(&self) -> &[AllyAgent] {
        &self.members
    }

    pub fn member(&self, id: EntityId) -> Option<&AllyAgent> {
        self.members.iter().find(|m| m.core().id() == id)
    }

    pub fn member_mut(&mut self, id: EntityId) -> Option<&mut AllyAgent> {
        self.members.iter_mut().find(|m| m.core().id() == id)
    }

    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.members.iter().position(|m| m.core().id() == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn command(&self) -> &SquadCommand {
        &self.command
    }

    pub fn issue_follow(&mut self) {
        self.broadcast(SquadCommand::Follow);
    }

    pub fn issue_attack(&mut self, position: Vec3, target: Option<TargetHandle>) {
        self.broadcast(SquadCommand::Attack { position, target });
    }

    pub fn issue_hold(&mut self) {
        self.broadcast(SquadCommand::Hold);
    }

    fn broadcast(&mut self, command: SquadCommand) {
        log::info!("squad: {} to {} members", command.name(), self.members.len());
        for member in self.members.iter_mut().filter(|m| m.is_alive()) {
            member.command(&command);
        }
        self.command = command;
    }

    /// Slot position for `index` in the current roster
    pub fn get_formation_position(&self, index: usize) -> Vec3 {
        formation_position(
            index,
            self.members.len(),
            &self.anchor,
            self.config.formation,
            self.config.radius,
            self.config.spacing,
        )
    }

    pub fn formation_positions(&self) -> Vec<Vec3> {
        (0..self.members.len()).map(|i| self.get_formation_position(i)).collect()
    }

    fn follow_leader(&mut self) {
        if let Some(leader) = self.leader.as_ref().and_then(TargetHandle::resolve) {
            self.anchor = leader.read().pose();
        }
    }

    fn assign_slots(&mut self) {
        let positions = self.formation_positions();
        let anchor = self.anchor;
        for (index, (member, position)) in self.members.iter_mut().zip(positions).enumerate() {
            member.assign_slot(index, position, anchor);
        }
    }

    /// Advance every member one step. Members that died this tick are
    /// removed and handed back.
    pub fn tick(&mut self, delta: f32) -> Vec<AllyAgent> {
        self.follow_leader();

        let stale = match &self.command {
            SquadCommand::Attack {
                target: Some(target), ..
            } if !target.is_valid() => Some(target.id()),
            _ => None,
        };
        if let Some(id) = stale {
            log::info!("squad: attack target {id} gone, falling back to follow");
            self.issue_follow();
        }

        self.assign_slots();
        for member in &mut self.members {
            member.tick(delta);
        }

        let fallen: Vec<EntityId> = self
            .members
            .iter()
            .filter(|m| m.state() == AllyState::Dead)
            .map(|m| m.core().id())
            .collect();
        fallen.into_iter().filter_map(|id| self.remove_member(id)).collect()
    }
}

impl std::fmt::Debug for SquadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SquadCoordinator")
            .field("members", &self.members.len())
            .field("config", &self.config)
            .field("anchor", &self.anchor)
            .field("command", &self.command.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ally::Order;
    use crate::config::AllyStats;
    use crate::core::AgentEnvironment;
    use approx::assert_relative_eq;
    use parking_lot::RwLock;
    use std::sync::Arc;
    use void_ai::{MeshNavigator, NavMesh};
    use void_combat::{Actor, DamageInfo, DamageType, Damageable, Faction, SharedTarget, TargetPool};

    fn ring(radius: f32) -> SquadConfig {
        SquadConfig {
            formation: FormationType::Ring,
            radius,
            spacing: 2.0,
        }
    }

    fn recruit(pool: &TargetPool, mesh: &Arc<NavMesh>, id: u64, position: Vec3) -> AllyAgent {
        let nav = MeshNavigator::new(mesh.clone(), position);
        let mut ally = AllyAgent::new(EntityId(id), Box::new(nav), AgentEnvironment::new(pool.clone()));
        ally.initialize(AllyStats::default());
        ally
    }

    fn squad_of(pool: &TargetPool, count: u64, anchor: Pose) -> SquadCoordinator {
        let mesh = Arc::new(NavMesh::create_grid(60.0, 60.0, 2.0));
        let mut squad = SquadCoordinator::new(ring(3.0), anchor);
        for id in 1..=count {
            squad.add_member(recruit(pool, &mesh, id, anchor.position + Vec3::new(id as f32, 0.0, -2.0)));
        }
        squad
    }

    #[test]
    fn test_ring_slots_reflow_after_removal() {
        let pool = TargetPool::new();
        let anchor = Pose::at(Vec3::new(20.0, 0.0, 20.0));
        let mut squad = squad_of(&pool, 3, anchor);

        let offsets: Vec<Vec3> = squad.formation_positions().iter().map(|p| *p - anchor.position).collect();
        assert_eq!(offsets.len(), 3);
        for (i, offset) in offsets.iter().enumerate() {
            assert_relative_eq!(offset.length(), 3.0, epsilon = 1e-4);
            let next = offsets[(i + 1) % 3];
            assert_relative_eq!(offset.angle_between(next), 120.0, epsilon = 1e-2);
        }

        assert!(squad.remove_member(EntityId(2)).is_some());
        assert_eq!(squad.index_of(EntityId(1)), Some(0));
        assert_eq!(squad.index_of(EntityId(3)), Some(1));
        assert_eq!(squad.members()[1].brain().slot(), 1);

        let a = squad.get_formation_position(0) - anchor.position;
        let b = squad.get_formation_position(1) - anchor.position;
        assert_relative_eq!(a.angle_between(b), 180.0, epsilon = 1e-2);
        assert_eq!(squad.members()[1].brain().slot_position(), squad.get_formation_position(1));
    }

    #[test]
    fn test_out_of_range_index_is_clamped() {
        let anchor = Pose::at(Vec3::new(5.0, 1.0, 5.0));
        let last = formation_position(2, 3, &anchor, FormationType::Line, 3.0, 2.0);
        let past = formation_position(9, 3, &anchor, FormationType::Line, 3.0, 2.0);
        assert_eq!(last, past);
        assert_eq!(formation_position(0, 0, &anchor, FormationType::Ring, 3.0, 2.0), anchor.position);
    }

    #[test]
    fn test_line_is_abreast_behind_anchor() {
        let anchor = Pose::at(Vec3::ZERO);
        let slots: Vec<Vec3> = (0..3)
            .map(|i| formation_position(i, 3, &anchor, FormationType::Line, 3.0, 2.0))
            .collect();
        for slot in &slots {
            assert_relative_eq!(slot.z, -3.0, epsilon = 1e-5);
        }
        assert_relative_eq!(slots[1].x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(slots[0].x.abs(), 2.0, epsilon = 1e-5);
        assert_relative_eq!(slots[0].x, -slots[2].x, epsilon = 1e-5);
    }

    #[test]
    fn test_wedge_rows_alternate_sides() {
        let anchor = Pose::at(Vec3::ZERO);
        let slots: Vec<Vec3> = (0..4)
            .map(|i| formation_position(i, 4, &anchor, FormationType::Wedge, 2.0, 1.5))
            .collect();
        assert_relative_eq!(slots[0].x, -slots[1].x, epsilon = 1e-5);
        assert_relative_eq!(slots[0].z, slots[1].z, epsilon = 1e-5);
        assert!(slots[2].z < slots[0].z);
        assert!(slots[2].x.abs() > slots[0].x.abs());
    }

    #[test]
    fn test_spread_slots_are_distinct() {
        let anchor = Pose::at(Vec3::ZERO);
        let slots: Vec<Vec3> = (0..6)
            .map(|i| formation_position(i, 6, &anchor, FormationType::Spread, 2.0, 1.0))
            .collect();
        for (i, a) in slots.iter().enumerate() {
            assert!(a.length() >= 2.0 - 1e-4);
            for b in &slots[i + 1..] {
                assert!(a.distance(*b) > 0.5);
            }
        }
    }

    #[test]
    fn test_new_member_receives_active_command() {
        let pool = TargetPool::new();
        let anchor = Pose::at(Vec3::new(20.0, 0.0, 20.0));
        let mut squad = squad_of(&pool, 2, anchor);
        squad.issue_hold();
        assert!(squad.members().iter().all(|m| m.state() == AllyState::Idle));

        let mesh = Arc::new(NavMesh::create_grid(60.0, 60.0, 2.0));
        let slot = squad.add_member(recruit(&pool, &mesh, 7, Vec3::new(25.0, 0.0, 25.0)));
        assert_eq!(slot, 2);
        let newcomer = squad.member(EntityId(7)).unwrap();
        assert_eq!(newcomer.brain().order(), Order::Hold);
        assert_eq!(newcomer.state(), AllyState::Idle);
    }

    #[test]
    fn test_dead_member_is_removed() {
        let pool = TargetPool::new();
        let anchor = Pose::at(Vec3::new(20.0, 0.0, 20.0));
        let mut squad = squad_of(&pool, 3, anchor);

        let victim = squad.member(EntityId(2)).unwrap().core().shared_body();
        victim.write().take_damage(&DamageInfo::new(500.0, DamageType::Melee));

        let fallen: Vec<EntityId> = squad.tick(0.1).iter().map(|m| m.core().id()).collect();
        assert_eq!(fallen, vec![EntityId(2)]);
        assert_eq!(squad.len(), 2);
        assert_eq!(squad.index_of(EntityId(3)), Some(1));
    }

    #[test]
    fn test_attack_falls_back_when_target_is_gone() {
        let pool = TargetPool::new();
        let anchor = Pose::at(Vec3::new(20.0, 0.0, 20.0));
        let mut squad = squad_of(&pool, 2, anchor);

        let foe = Arc::new(RwLock::new(Actor::new(EntityId(90), Faction::Hostile, 50.0).at(Vec3::new(20.0, 0.0, 40.0))));
        let shared: SharedTarget = foe.clone();
        let handle = pool.register(&shared);
        squad.issue_attack(Vec3::new(20.0, 0.0, 40.0), Some(handle));
        assert!(squad.members().iter().all(|m| m.state() == AllyState::Combat));

        pool.unregister(EntityId(90));
        drop(shared);
        drop(foe);
        squad.tick(0.1);
        assert_eq!(squad.command(), &SquadCommand::Follow);
        assert!(squad.members().iter().all(|m| m.brain().order() == Order::Follow));
    }

    #[test]
    fn test_members_track_moving_leader() {
        let pool = TargetPool::new();
        let start = Vec3::new(20.0, 0.0, 20.0);
        let leader = Arc::new(RwLock::new(Actor::new(EntityId(100), Faction::Ally, 100.0).at(start)));
        let shared: SharedTarget = leader.clone();
        let handle = pool.register(&shared);

        let mut squad = squad_of(&pool, 3, Pose::at(start)).with_leader(handle);
        for step in 1..=20 {
            leader.write().pose.position = start + Vec3::new(step as f32 * 0.1, 0.0, 0.0);
            squad.tick(0.1);
        }
        for _ in 0..30 {
            squad.tick(0.1);
        }

        assert_relative_eq!(squad.anchor().position.x, 22.0, epsilon = 1e-4);
        for (i, member) in squad.members().iter().enumerate() {
            assert_eq!(member.state(), AllyState::Follow);
            let slot = squad.get_formation_position(i);
            assert!(member.core().position().horizontal_distance(slot) < 1.0);
        }
    }
}
