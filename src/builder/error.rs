//! Build errors for chart construction.

use crate::core::StateKind;
use std::fmt;
use thiserror::Error;

/// A malformed chart structure, detected before any reference is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("compound state '{state}' has no initial child")]
    MissingInitial { state: String },

    #[error("initial '{initial}' of state '{state}' is not one of its children")]
    InitialNotChild { state: String, initial: String },

    #[error("parallel state '{state}' must not declare an initial child")]
    ParallelWithInitial { state: String },

    #[error("{kind} state '{state}' must not declare an initial child")]
    InitialOnLeaf { state: String, kind: StateKind },

    #[error("{kind} state '{state}' must not have child states")]
    LeafWithChildren { state: String, kind: StateKind },

    #[error("{kind} state '{state}' has no child states")]
    NoChildren { state: String, kind: StateKind },

    #[error("final state '{state}' must not declare transitions")]
    FinalWithTransitions { state: String },

    #[error("parallel state '{state}' cannot take an internal transition on '{event}'")]
    InternalFromParallel { state: String, event: String },

    #[error("state '{parent}' declares child '{key}' more than once")]
    DuplicateKey { parent: String, key: String },

    #[error("state '{state}' declares a handler for '{event}' more than once")]
    DuplicateEvent { state: String, event: String },

    #[error("invalid state key '{key}' (keys must be non-empty and contain no '.' or leading '#')")]
    InvalidKey { key: String },

    #[error("transition on '{event}' from '{state}' targets unknown state '{target}'")]
    UnknownTarget {
        state: String,
        event: String,
        target: String,
    },
}

/// Which implementation table a reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Action,
    Guard,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => f.write_str("action"),
            Self::Guard => f.write_str("guard"),
        }
    }
}

/// An action or guard name with no matching implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{name}' used by state '{state}' has no implementation")]
pub struct UnresolvedReference {
    pub kind: ReferenceKind,
    pub name: String,
    pub state: String,
}

/// Errors that can occur when building a chart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    /// Every structural violation found in the definition
    #[error("Chart structure is invalid: {}", join_all(.0))]
    Structural(Vec<StructuralError>),

    /// Every action and guard name that could not be resolved
    #[error("Chart references missing implementations: {}", join_all(.0))]
    Unresolved(Vec<UnresolvedReference>),

    /// The definition text could not be decoded
    #[error("Failed to parse chart definition: {0}")]
    Parse(String),
}

fn join_all<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
