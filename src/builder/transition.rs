//! Builder for transition definitions.

use crate::definition::TransitionDefinition;

/// Builder for constructing transitions with a fluent API.
///
/// A bare target string converts into a transition directly, so the builder
/// is only needed for actions, guards or internal transitions.
///
/// # Example
///
/// ```rust
/// use statechart::TransitionBuilder;
///
/// let transition = TransitionBuilder::new()
///     .to("broken")
///     .guard("isFragile")
///     .action("logBreak")
///     .build();
///
/// assert_eq!(transition.target.as_deref(), Some("broken"));
/// assert_eq!(transition.actions, vec!["logBreak"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct TransitionBuilder {
    definition: TransitionDefinition,
}

impl TransitionBuilder {
    /// Create a new targetless transition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target state.
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.definition.target = Some(target.into());
        self
    }

    /// Append an action run when the transition is taken.
    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.definition.actions.push(name.into());
        self
    }

    /// Guard the transition with a named predicate.
    pub fn guard(mut self, name: impl Into<String>) -> Self {
        self.definition.guard = Some(name.into());
        self
    }

    /// Do not exit and re-enter the source when targeting a descendant.
    ///
    /// Only compound sources can take internal transitions; a chart that
    /// marks one on a parallel state is rejected with
    /// [`StructuralError::InternalFromParallel`](crate::builder::StructuralError::InternalFromParallel).
    /// On an atomic source the flag has no effect.
    pub fn internal(mut self) -> Self {
        self.definition.internal = true;
        self
    }

    pub fn build(self) -> TransitionDefinition {
        self.definition
    }
}

impl From<TransitionBuilder> for TransitionDefinition {
    fn from(builder: TransitionBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transition_is_targetless() {
        let transition = TransitionBuilder::new().action("log").build();

        assert!(transition.target.is_none());
        assert_eq!(transition.actions, vec!["log"]);
        assert!(!transition.internal);
    }

    #[test]
    fn actions_keep_declaration_order() {
        let transition = TransitionBuilder::new()
            .to("next")
            .action("first")
            .action("second")
            .internal()
            .build();

        assert_eq!(transition.actions, vec!["first", "second"]);
        assert!(transition.internal);
    }

    #[test]
    fn fluent_api_matches_shorthand() {
        let built: TransitionDefinition = TransitionBuilder::new().to("lit").into();
        assert_eq!(built, TransitionDefinition::from("lit"));
    }
}
