//! Void AI - Agent Decision Layer
//!
//! Building blocks shared by every agent controller.
//!
//! # Features
//!
//! - Navigation service port, plus a nav-mesh implementation with traversal links
//! - Throttled target perception (range, height, field of view, sight, reachability)
//! - Finite State Machines driven by enter/exit/update hook tables
//! - Named countdown timers
//!
//! # Example
//!
//! ```ignore
//! use void_ai::prelude::*;
//!
//! let mut fsm = StateMachine::<EnemyState, Brain>::new(EnemyState::Idle);
//! fsm.add_transition(EnemyState::Idle, EnemyState::Chase, |b| b.sees_player);
//! fsm.on_enter(EnemyState::Chase, |b| b.nav.resume());
//! ```

pub mod navigation;
pub mod navigator;
pub mod navmesh;
pub mod perception;
pub mod state_machine;
pub mod timers;

pub mod prelude {
    pub use crate::navigation::{
        has_arrived, is_reachable, NavError, NavigationPort, PathQuery, PathStatus, TraversalLink,
    };
    pub use crate::navigator::MeshNavigator;
    pub use crate::navmesh::{NavMesh, NavPath};
    pub use crate::perception::{detect, Observed, Observer, PerceptionConfig, PerceptionModule, PerceptionResult};
    pub use crate::state_machine::{State, StateMachine, Transition};
    pub use crate::timers::TimerSet;
}

pub use prelude::*;
