//! Finite State Machine (FSM) implementation
//!
//! States are plain enums. Behavior lives in per-state hook tables owned by
//! the machine and run against an external context `C`, so the machine can
//! drive a context it does not own:
//!
//! - enter/exit hooks run on every real state change
//! - an update hook runs once per tick and may request a change
//! - conditional transitions are checked after the update hook

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// A state in the state machine
pub trait State: Copy + Eq + Hash + Debug {
    /// Terminal states are never left through `change_state`
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Transition condition
pub type TransitionCondition<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;

/// Enter/exit action
pub type StateHook<C> = Box<dyn Fn(&mut C) + Send + Sync>;

/// Per-tick action; returns the state to switch to, if any
pub type UpdateHook<S, C> = Box<dyn Fn(&mut C, f32) -> Option<S> + Send + Sync>;

/// A state transition
pub struct Transition<S, C> {
    /// Target state
    pub to: S,
    /// Condition function
    pub condition: TransitionCondition<C>,
    /// Priority (higher = checked first)
    pub priority: i32,
}

impl<S, C> Transition<S, C> {
    /// Create a new transition
    pub fn new<F>(to: S, condition: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self {
            to,
            condition: Box::new(condition),
            priority: 0,
        }
    }

    /// Set priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Check if transition should occur
    pub fn should_transition(&self, context: &C) -> bool {
        (self.condition)(context)
    }
}

/// Finite State Machine
pub struct StateMachine<S, C>
where
    S: State,
{
    /// Current state
    current: S,
    /// Previous state
    previous: Option<S>,
    /// Seconds spent in the current state
    time_in_state: f32,
    /// Transitions from each state, kept sorted by priority
    transitions: HashMap<S, Vec<Transition<S, C>>>,
    /// Global transitions (checked from any state)
    global_transitions: Vec<Transition<S, C>>,
    enter_hooks: HashMap<S, Vec<StateHook<C>>>,
    exit_hooks: HashMap<S, Vec<StateHook<C>>>,
    update_hooks: HashMap<S, UpdateHook<S, C>>,
    /// Name used in trace logs
    label: String,
}

impl<S, C> StateMachine<S, C>
where
    S: State,
{
    /// Create a new state machine. No enter hook runs for `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            current: initial,
            previous: None,
            time_in_state: 0.0,
            transitions: HashMap::new(),
            global_transitions: Vec::new(),
            enter_hooks: HashMap::new(),
            exit_hooks: HashMap::new(),
            update_hooks: HashMap::new(),
            label: String::from("fsm"),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Add a transition
    pub fn add_transition<F>(&mut self, from: S, to: S, condition: F)
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.add_transition_priority(from, to, condition, 0);
    }

    /// Add a transition with priority
    pub fn add_transition_priority<F>(&mut self, from: S, to: S, condition: F, priority: i32)
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        let list = self.transitions.entry(from).or_default();
        list.push(Transition::new(to, condition).with_priority(priority));
        // Stable: equal priorities keep insertion order
        list.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Add a global transition (can occur from any non-terminal state)
    pub fn add_global_transition<F>(&mut self, to: S, condition: F)
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.global_transitions.push(Transition::new(to, condition));
    }

    /// Register an action run when `state` is entered
    pub fn on_enter<F>(&mut self, state: S, hook: F)
    where
        F: Fn(&mut C) + Send + Sync + 'static,
    {
        self.enter_hooks.entry(state).or_default().push(Box::new(hook));
    }

    /// Register an action run when `state` is left
    pub fn on_exit<F>(&mut self, state: S, hook: F)
    where
        F: Fn(&mut C) + Send + Sync + 'static,
    {
        self.exit_hooks.entry(state).or_default().push(Box::new(hook));
    }

    /// Set the per-tick action of `state`, replacing any previous one
    pub fn on_update<F>(&mut self, state: S, hook: F)
    where
        F: Fn(&mut C, f32) -> Option<S> + Send + Sync + 'static,
    {
        self.update_hooks.insert(state, Box::new(hook));
    }

    /// Get current state
    pub fn current(&self) -> S {
        self.current
    }

    /// Get previous state
    pub fn previous(&self) -> Option<S> {
        self.previous
    }

    pub fn time_in_state(&self) -> f32 {
        self.time_in_state
    }

    /// Check if in a specific state
    pub fn is_in(&self, state: S) -> bool {
        self.current == state
    }

    /// Switch to `to`, running exit hooks of the current state then enter
    /// hooks of the new one.
    ///
    /// Returns false (and does nothing) when `to` is already current or the
    /// current state is terminal.
    pub fn change_state(&mut self, to: S, context: &mut C) -> bool {
        if to == self.current || self.current.is_terminal() {
            return false;
        }
        let from = self.current;
        if let Some(hooks) = self.exit_hooks.get(&from) {
            for hook in hooks {
                hook(context);
            }
        }
        self.previous = Some(from);
        self.current = to;
        self.time_in_state = 0.0;
        log::trace!("{}: {:?} -> {:?}", self.label, from, to);
        if let Some(hooks) = self.enter_hooks.get(&to) {
            for hook in hooks {
                hook(context);
            }
        }
        true
    }

    /// First transition whose condition holds: globals, then the current state's table
    pub fn pending_transition(&self, context: &C) -> Option<S> {
        if self.current.is_terminal() {
            return None;
        }
        self.global_transitions
            .iter()
            .filter(|t| t.to != self.current)
            .chain(self.transitions.get(&self.current).into_iter().flatten())
            .find(|t| t.should_transition(context))
            .map(|t| t.to)
    }

    /// Check the transition table and switch if a condition holds
    pub fn evaluate(&mut self, context: &mut C) -> Option<S> {
        let to = self.pending_transition(context)?;
        self.change_state(to, context).then_some(to)
    }

    /// Advance time, run the current state's update hook, then the transition table.
    ///
    /// Returns the state entered this tick, if any.
    pub fn update(&mut self, context: &mut C, delta_time: f32) -> Option<S> {
        self.time_in_state += delta_time.max(0.0);

        let requested = self
            .update_hooks
            .get(&self.current)
            .and_then(|hook| hook(context, delta_time));
        if let Some(to) = requested {
            if self.change_state(to, context) {
                return Some(to);
            }
        }
        self.evaluate(context)
    }

    /// Jump to `state` without running any hooks (pooling reset)
    pub fn reset(&mut self, state: S) {
        self.current = state;
        self.previous = None;
        self.time_in_state = 0.0;
    }
}

impl<S: State, C> Debug for StateMachine<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("label", &self.label)
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("time_in_state", &self.time_in_state)
            .finish()
    }
}
