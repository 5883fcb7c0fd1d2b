//! Core state chart types and logic.
//!
//! This module contains the pure functional core of the interpreter:
//! - The compiled chart arena and its lookups
//! - Configurations and their nested state values
//! - Guard predicates and events
//! - The transition engine
//! - Immutable history tracking
//!
//! All logic in this module is pure (no side effects), following
//! the "pure core, imperative shell" philosophy.

mod chart;
mod configuration;
mod engine;
mod event;
mod guard;
mod history;

pub use chart::{
    ActionId, BoundAction, BoundGuard, GuardId, StateChart, StateId, StateKind, StateNode,
    StatePath, Transition,
};
pub use configuration::{Configuration, StateValue};
pub use engine::{exit_step, initial_step, step, ActionOrigin, ScheduledAction, Step};
pub use event::{Event, INIT_EVENT, STOP_EVENT};
pub use guard::Guard;
pub use history::{ConfigurationTransition, StateHistory};
