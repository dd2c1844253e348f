//! Fire-and-forget feedback port (visuals, audio)

use parking_lot::Mutex;
use void_math::Vec3;

use crate::entity::EntityId;

/// What kind of feedback to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    MeleeSwing,
    Shot,
    Impact,
    Hit,
    Death,
    Alert,
    ChargeWindup,
    StompWarning,
    Stomp,
    Rage,
    Recover,
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectEvent {
    pub kind: EffectKind,
    pub source: EntityId,
    pub position: Vec3,
}

impl EffectEvent {
    pub fn new(kind: EffectKind, source: EntityId, position: Vec3) -> Self {
        Self { kind, source, position }
    }
}

/// Receives effect triggers. Never blocks the caller; the default drops everything.
pub trait EffectSpawner: Send + Sync {
    fn spawn(&self, _event: EffectEvent) {}
}

/// Spawner that plays nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

impl EffectSpawner for NoEffects {}

/// Spawner that records every trigger
#[derive(Debug, Default)]
pub struct EffectLog {
    events: Mutex<Vec<EffectEvent>>,
}

impl EffectLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EffectEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: EffectKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EffectSpawner for EffectLog {
    fn spawn(&self, event: EffectEvent) {
        log::trace!("effect {:?} from {} at {:?}", event.kind, event.source, event.position);
        self.events.lock().push(event);
    }
}
