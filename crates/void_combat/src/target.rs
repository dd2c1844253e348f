//! Weak target handles and the injected target pool
//!
//! Agents never own what they fight. A [`TargetHandle`] holds a weak
//! reference plus the id and faction copied at registration, so candidates
//! can be filtered without taking any lock. [`TargetHandle::resolve`]
//! re-validates the entity on every use.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use void_math::Vec3;

use crate::damageable::{Damageable, Targetable};
use crate::entity::{EntityId, Faction};

/// Shared ownership of a targetable entity
pub type SharedTarget = Arc<RwLock<dyn Targetable>>;

/// Non-owning reference to a targetable entity
#[derive(Clone)]
pub struct TargetHandle {
    id: EntityId,
    faction: Faction,
    target: Weak<RwLock<dyn Targetable>>,
}

impl TargetHandle {
    pub fn new(target: &SharedTarget) -> Self {
        let (id, faction) = {
            let t = target.read();
            (t.id(), t.faction())
        };
        Self {
            id,
            faction,
            target: Arc::downgrade(target),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    /// The entity, if it still exists, is active and is alive
    pub fn resolve(&self) -> Option<SharedTarget> {
        let target = self.target.upgrade()?;
        let valid = {
            let t = target.read();
            t.is_active() && t.is_alive()
        };
        valid.then_some(target)
    }

    pub fn is_valid(&self) -> bool {
        self.resolve().is_some()
    }

    /// The entity still exists (regardless of state)
    pub fn is_live_reference(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl std::fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetHandle")
            .field("id", &self.id)
            .field("faction", &self.faction)
            .field("alive_ref", &self.is_live_reference())
            .finish()
    }
}

impl PartialEq for TargetHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Snapshot of a validated candidate
#[derive(Clone)]
pub struct Candidate {
    pub handle: TargetHandle,
    pub target: SharedTarget,
    pub position: Vec3,
    pub aim_point: Vec3,
    pub hit_radius: f32,
}

/// Registry of every targetable entity in a scene.
///
/// Cloning shares the registry. Iteration always works on a snapshot, so
/// registering or removing entities mid-tick never disturbs a scan.
#[derive(Clone, Default)]
pub struct TargetPool {
    entries: Arc<RwLock<Vec<TargetHandle>>>,
}

impl TargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, replacing any previous entry with the same id
    pub fn register(&self, target: &SharedTarget) -> TargetHandle {
        let handle = TargetHandle::new(target);
        let mut entries = self.entries.write();
        entries.retain(|h| h.id != handle.id);
        entries.push(handle.clone());
        handle
    }

    pub fn unregister(&self, id: EntityId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|h| h.id != id);
        before != entries.len()
    }

    /// Drop entries whose entity no longer exists. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(TargetHandle::is_live_reference);
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("target pool pruned {removed} expired entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of all handles
    pub fn snapshot(&self) -> Vec<TargetHandle> {
        self.entries.read().clone()
    }

    pub fn get(&self, id: EntityId) -> Option<TargetHandle> {
        self.entries.read().iter().find(|h| h.id == id).cloned()
    }

    /// Valid entities of `faction`, excluding `exclude`
    pub fn candidates(&self, faction: Faction, exclude: EntityId) -> Vec<Candidate> {
        self.snapshot()
            .into_iter()
            .filter(|h| h.faction == faction && h.id != exclude)
            .filter_map(|handle| {
                let target = handle.resolve()?;
                let (position, aim_point, hit_radius) = {
                    let t = target.read();
                    (t.pose().position, t.aim_point(), t.hit_radius())
                };
                Some(Candidate {
                    handle,
                    target,
                    position,
                    aim_point,
                    hit_radius,
                })
            })
            .collect()
    }

    /// Closest valid entity of `faction` within `max_distance` of `from`
    pub fn nearest(&self, from: Vec3, faction: Faction, exclude: EntityId, max_distance: f32) -> Option<TargetHandle> {
        self.candidates(faction, exclude)
            .into_iter()
            .map(|c| (from.distance(c.position), c.handle))
            .filter(|(d, _)| *d <= max_distance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, h)| h)
    }
}

impl std::fmt::Debug for TargetPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetPool").field("len", &self.len()).finish()
    }
}
