//! Builder for state definitions.

use crate::core::StateKind;
use crate::definition::{StateDefinition, TransitionDefinition};

/// Builder for one state and its subtree.
///
/// # Example
///
/// ```rust
/// use statechart::StateBuilder;
/// use statechart::core::StateKind;
///
/// let lit = StateBuilder::compound("steady")
///     .entry("logLit")
///     .on("TURN_OFF", "unlit")
///     .state("steady", StateBuilder::atomic())
///     .state("pulsing", StateBuilder::atomic())
///     .build();
///
/// assert_eq!(lit.resolved_kind(), StateKind::Compound);
/// assert_eq!(lit.states.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct StateBuilder {
    definition: StateDefinition,
}

impl StateBuilder {
    fn of_kind(kind: StateKind) -> Self {
        Self {
            definition: StateDefinition {
                kind: Some(kind),
                ..StateDefinition::default()
            },
        }
    }

    /// A leaf state.
    pub fn atomic() -> Self {
        Self::of_kind(StateKind::Atomic)
    }

    /// A state with one active child, entered through `initial`.
    pub fn compound(initial: impl Into<String>) -> Self {
        let mut builder = Self::of_kind(StateKind::Compound);
        builder.definition.initial = Some(initial.into());
        builder
    }

    /// A state whose children are all active at once.
    pub fn parallel() -> Self {
        Self::of_kind(StateKind::Parallel)
    }

    /// A terminal leaf.
    pub fn final_state() -> Self {
        Self::of_kind(StateKind::Final)
    }

    /// Add a child state. Children keep declaration order.
    pub fn state(mut self, key: impl Into<String>, child: impl Into<StateDefinition>) -> Self {
        self.definition.states.push((key.into(), child.into()));
        self
    }

    /// Handle an event. Accepts a target string or a [`TransitionBuilder`].
    ///
    /// [`TransitionBuilder`]: crate::builder::TransitionBuilder
    pub fn on(
        mut self,
        event: impl Into<String>,
        transition: impl Into<TransitionDefinition>,
    ) -> Self {
        self.definition.on.push((event.into(), transition.into()));
        self
    }

    pub fn entry(mut self, action: impl Into<String>) -> Self {
        self.definition.entry.push(action.into());
        self
    }

    pub fn exit(mut self, action: impl Into<String>) -> Self {
        self.definition.exit.push(action.into());
        self
    }

    pub fn build(self) -> StateDefinition {
        self.definition
    }
}

impl From<StateBuilder> for StateDefinition {
    fn from(builder: StateBuilder) -> Self {
        builder.build()
    }
}
