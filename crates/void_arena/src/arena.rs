//! Arena world: nav mesh, obstacles, target pool and every agent in it

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use void_agents::{
    AgentController, AgentEnvironment, AllyAgent, EliteHostileAgent, HostileAgent, SquadCoordinator, StatProvider,
};
use void_ai::{MeshNavigator, NavMesh};
use void_combat::{Actor, EffectKind, EffectLog, EntityId, Faction, SharedTarget, TargetPool};
use void_math::{ObstacleField, Pose, Vec3, AABB};

use crate::config::{ArenaConfig, ArenaError, Result, SpawnKind};

const PLAYER_ID: EntityId = EntityId(1);
const FIRST_AGENT_ID: u64 = 100;

/// Final report for one agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub id: u64,
    pub kind: &'static str,
    pub state: &'static str,
    pub health: f32,
    pub position: [f32; 3],
    pub shots_fired: u32,
    pub hits: u32,
    pub kills: u32,
    pub damage_dealt: f32,
}

/// Final report for a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ticks: usize,
    pub elapsed: f32,
    pub player_health: f32,
    pub deaths: usize,
    pub agents: Vec<AgentSummary>,
}

struct Roster {
    kind: &'static str,
    agent: Box<dyn AgentController>,
}

pub struct Arena {
    pool: TargetPool,
    effects: Arc<EffectLog>,
    player: Arc<RwLock<Actor>>,
    route: Vec<Vec3>,
    route_index: usize,
    player_speed: f32,
    hostiles: Vec<Roster>,
    squad: SquadCoordinator,
    /// Squad members removed after dying, kept for the report
    fallen: Vec<AllyAgent>,
    elapsed: f32,
    ticks: usize,
}

fn vec3(v: [f32; 3]) -> Vec3 {
    Vec3::from(v)
}

fn check_on_mesh(mesh: &NavMesh, what: impl Into<String>, position: [f32; 3]) -> Result<()> {
    if mesh.find_polygon(vec3(position)).is_none() {
        return Err(ArenaError::OffMesh {
            what: what.into(),
            position,
        });
    }
    Ok(())
}

impl Arena {
    /// Build the level and spawn everyone, initialized and started
    pub fn build(config: &ArenaConfig) -> Result<Self> {
        let settings = &config.arena;
        let mut mesh = NavMesh::create_grid(settings.width, settings.depth, settings.cell_size);
        let mut sight = ObstacleField::new();
        for wall in &config.walls {
            let solid = AABB::pillar(vec3(wall.center), wall.width, wall.depth, wall.height);
            let carved = mesh.block_region(&solid);
            log::debug!("wall at {:?} blocks {carved} polygons", wall.center);
            sight.add(solid);
        }
        for platform in &config.platforms {
            mesh.add_grid(vec3(platform.origin), platform.width, platform.depth, settings.cell_size);
        }
        for link in &config.links {
            if mesh.add_link(vec3(link.start), vec3(link.end), link.bidirectional).is_none() {
                log::warn!("link {:?} -> {:?} does not join two polygons, skipped", link.start, link.end);
            }
        }
        mesh.rebuild_spatial_hash();
        let mesh = Arc::new(mesh);
        let sight = Arc::new(sight);

        let pool = TargetPool::new();
        let effects = Arc::new(EffectLog::new());

        check_on_mesh(&mesh, "player", settings.player)?;
        let player = Arc::new(RwLock::new(
            Actor::new(PLAYER_ID, Faction::Ally, settings.player_health).at(vec3(settings.player)),
        ));
        let shared: SharedTarget = player.clone();
        let leader = pool.register(&shared);

        let catalog = &config.catalog;
        let mut next_id = FIRST_AGENT_ID;
        let mut hostiles = Vec::new();
        for spawn in &config.spawns {
            check_on_mesh(&mesh, format!("{} spawn", spawn.profile), spawn.position)?;
            let id = EntityId(next_id);
            next_id += 1;

            let env = AgentEnvironment::new(pool.clone())
                .with_sight(sight.clone())
                .with_effects(effects.clone());
            let nav = Box::new(MeshNavigator::new(mesh.clone(), vec3(spawn.position)));
            let patrol: Vec<Vec3> = spawn.patrol.iter().copied().map(vec3).collect();

            let (kind, mut agent): (&'static str, Box<dyn AgentController>) = match spawn.kind {
                SpawnKind::Hostile => {
                    let mut agent = HostileAgent::new(id, nav, env).with_patrol(patrol);
                    agent.initialize(catalog.hostile_stats(&spawn.profile)?);
                    ("hostile", Box::new(agent))
                }
                SpawnKind::Elite => {
                    let mut agent = EliteHostileAgent::new(id, nav, env).with_patrol(patrol);
                    agent.initialize(catalog.elite_stats(&spawn.profile)?);
                    ("elite", Box::new(agent))
                }
            };
            agent.start();
            log::info!("spawned {kind} {id} ({}) at {:?}", spawn.profile, spawn.position);
            hostiles.push(Roster { kind, agent });
        }

        let mut squad =
            SquadCoordinator::new(catalog.squad_config(), Pose::at(vec3(settings.player))).with_leader(leader);
        for spec in &config.allies {
            check_on_mesh(&mesh, format!("{} ally", spec.profile), spec.position)?;
            let id = EntityId(next_id);
            next_id += 1;

            let env = AgentEnvironment::new(pool.clone())
                .with_sight(sight.clone())
                .with_effects(effects.clone());
            let nav = Box::new(MeshNavigator::new(mesh.clone(), vec3(spec.position)));
            let mut ally = AllyAgent::new(id, nav, env);
            ally.initialize(catalog.ally_stats(&spec.profile)?);
            squad.add_member(ally);
        }

        let mut route: Vec<Vec3> = settings.player_route.iter().copied().map(vec3).collect();
        if route.is_empty() {
            route.push(vec3(settings.player));
        }

        Ok(Self {
            pool,
            effects,
            player,
            route,
            route_index: 0,
            player_speed: settings.player_speed,
            hostiles,
            squad,
            fallen: Vec::new(),
            elapsed: 0.0,
            ticks: 0,
        })
    }

    pub fn player_alive(&self) -> bool {
        self.player.read().health.is_alive()
    }

    pub fn hostiles_remaining(&self) -> usize {
        self.hostiles.iter().filter(|r| !r.agent.is_dead()).count()
    }

    pub fn squad(&self) -> &SquadCoordinator {
        &self.squad
    }

    /// Walk the player dummy along its route
    fn move_player(&mut self, delta: f32) {
        let mut player = self.player.write();
        if !player.health.is_alive() {
            return;
        }
        let goal = self.route[self.route_index];
        let position = player.pose.position;
        let gap = position.horizontal_distance(goal);
        if gap <= 0.05 {
            self.route_index = (self.route_index + 1) % self.route.len();
            return;
        }
        let travelled = (self.player_speed * delta).min(gap);
        let next = position + (goal - position).horizontal().normalize_or_zero() * travelled;
        player.pose = Pose::new(next, goal - position);
    }

    /// One simulation step
    pub fn step(&mut self, delta: f32) {
        self.move_player(delta);

        let fallen = self.squad.tick(delta);
        self.fallen.extend(fallen);
        for roster in &mut self.hostiles {
            roster.agent.tick(delta);
        }
        self.pool.prune();

        self.elapsed += delta;
        self.ticks += 1;
    }

    /// Run until `ticks` have passed, the player dies or every hostile is dead
    pub fn run(&mut self, ticks: usize, delta: f32) {
        for _ in 0..ticks {
            self.step(delta);
            if !self.player_alive() {
                log::info!("player down after {:.1}s", self.elapsed);
                break;
            }
            if self.hostiles_remaining() == 0 {
                log::info!("arena cleared after {:.1}s", self.elapsed);
                break;
            }
        }
    }

    fn summarize(kind: &'static str, agent: &dyn AgentController) -> AgentSummary {
        let core = agent.core();
        let combat = core.combat.stats();
        AgentSummary {
            id: core.id().0,
            kind,
            state: agent.state_name(),
            health: core.health_fraction(),
            position: core.position().to_array(),
            shots_fired: combat.shots_fired,
            hits: combat.hits,
            kills: combat.kills,
            damage_dealt: combat.damage_dealt,
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut agents: Vec<AgentSummary> = self
            .hostiles
            .iter()
            .map(|r| Self::summarize(r.kind, r.agent.as_ref()))
            .collect();
        agents.extend(self.squad.members().iter().map(|m| Self::summarize("ally", m)));
        agents.extend(self.fallen.iter().map(|m| Self::summarize("ally", m)));
        agents.sort_by_key(|a| a.id);

        RunSummary {
            ticks: self.ticks,
            elapsed: self.elapsed,
            player_health: self.player.read().health.fraction(),
            deaths: self.effects.count(EffectKind::Death),
            agents,
        }
    }
}
