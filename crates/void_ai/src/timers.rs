//! Named countdown timers

use std::collections::HashMap;
use std::hash::Hash;

/// Remaining time at or below this counts as expired (fixed-step float drift)
const EXPIRY_EPSILON: f32 = 1e-4;

/// A set of countdowns keyed by name.
///
/// Values never go negative: `tick` clamps at zero and `set` clamps its
/// input. An unset timer reads as expired.
#[derive(Debug, Clone)]
pub struct TimerSet<K> {
    timers: HashMap<K, f32>,
}

impl<K: Copy + Eq + Hash> TimerSet<K> {
    pub fn new() -> Self {
        Self {
            timers: HashMap::new(),
        }
    }

    /// Start (or restart) `key` at `seconds`
    pub fn set(&mut self, key: K, seconds: f32) {
        self.timers.insert(key, seconds.max(0.0));
    }

    /// Seconds left on `key` (0 when unset)
    pub fn remaining(&self, key: K) -> f32 {
        self.timers.get(&key).copied().unwrap_or(0.0)
    }

    /// True when `key` is unset or has run out
    pub fn expired(&self, key: K) -> bool {
        self.remaining(key) <= EXPIRY_EPSILON
    }

    /// True while `key` is still counting
    pub fn running(&self, key: K) -> bool {
        !self.expired(key)
    }

    /// Set `key` to zero
    pub fn clear(&mut self, key: K) {
        self.timers.insert(key, 0.0);
    }

    /// Decrement every timer by `delta`, clamping at zero
    pub fn tick(&mut self, delta: f32) {
        let delta = delta.max(0.0);
        for value in self.timers.values_mut() {
            *value = (*value - delta).max(0.0);
        }
    }

    /// Forget all timers
    pub fn reset(&mut self) {
        self.timers.clear();
    }
}

impl<K: Copy + Eq + Hash> Default for TimerSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        Cooldown,
        Wait,
    }

    #[test]
    fn test_countdown_clamps_at_zero() {
        let mut timers = TimerSet::new();
        timers.set(Key::Cooldown, 0.25);
        timers.tick(0.1);
        assert!(timers.running(Key::Cooldown));
        timers.tick(1.0);
        assert_eq!(timers.remaining(Key::Cooldown), 0.0);
        assert!(timers.expired(Key::Cooldown));
    }

    #[test]
    fn test_unset_is_expired() {
        let timers: TimerSet<Key> = TimerSet::new();
        assert!(timers.expired(Key::Wait));
    }

    #[test]
    fn test_negative_inputs_are_clamped() {
        let mut timers = TimerSet::new();
        timers.set(Key::Wait, -3.0);
        assert_eq!(timers.remaining(Key::Wait), 0.0);
        timers.set(Key::Cooldown, 1.0);
        timers.tick(-5.0);
        assert_eq!(timers.remaining(Key::Cooldown), 1.0);
    }

    #[test]
    fn test_fixed_steps_expire_on_time() {
        let mut timers = TimerSet::new();
        timers.set(Key::Wait, 0.3);
        timers.tick(0.1);
        timers.tick(0.1);
        assert!(timers.running(Key::Wait));
        timers.tick(0.1);
        assert!(timers.expired(Key::Wait));
    }
}
