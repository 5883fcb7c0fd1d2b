//! Builder for whole charts.

use crate::actions::Implementations;
use crate::builder::error::ChartError;
use crate::core::{StateChart, StateKind};
use crate::definition::{ChartDefinition, StateDefinition, TransitionDefinition};
use serde_json::Value;

/// Builder for constructing charts with a fluent API.
///
/// The builder describes the root state; its id is the root key.
///
/// # Example
///
/// ```rust
/// use statechart::{ChartBuilder, Implementations, StateBuilder};
/// use serde_json::json;
///
/// let chart = ChartBuilder::new("light")
///     .context(json!({ "color": "#fff" }))
///     .initial("unlit")
///     .state("unlit", StateBuilder::atomic().on("TURN_ON", "lit"))
///     .state("lit", StateBuilder::atomic().on("TURN_OFF", "unlit"))
///     .build(Implementations::new())
///     .unwrap();
///
/// assert_eq!(chart.id(), "light");
/// assert_eq!(chart.initial_context()["color"], "#fff");
/// ```
#[derive(Clone, Debug)]
pub struct ChartBuilder {
    definition: ChartDefinition,
}

impl ChartBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            definition: ChartDefinition::new(id, StateDefinition::default()),
        }
    }

    /// Set the root's initial child.
    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.definition.root.initial = Some(key.into());
        self
    }

    /// Make the root a parallel state.
    pub fn parallel(mut self) -> Self {
        self.definition.root.kind = Some(StateKind::Parallel);
        self
    }

    /// Set the initial extended-state context.
    pub fn context(mut self, context: Value) -> Self {
        self.definition.context = context;
        self
    }

    pub fn state(mut self, key: impl Into<String>, child: impl Into<StateDefinition>) -> Self {
        self.definition.root.states.push((key.into(), child.into()));
        self
    }

    /// Handle an event at the root, for every configuration.
    pub fn on(
        mut self,
        event: impl Into<String>,
        transition: impl Into<TransitionDefinition>,
    ) -> Self {
        self.definition.root.on.push((event.into(), transition.into()));
        self
    }

    pub fn entry(mut self, action: impl Into<String>) -> Self {
        self.definition.root.entry.push(action.into());
        self
    }

    pub fn exit(mut self, action: impl Into<String>) -> Self {
        self.definition.root.exit.push(action.into());
        self
    }

    /// The definition built so far, without validating it.
    pub fn definition(self) -> ChartDefinition {
        self.definition
    }

    /// Validate the chart and bind it to its implementations.
    pub fn build(self, implementations: Implementations) -> Result<StateChart, ChartError> {
        StateChart::new(self.definition, implementations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use serde_json::json;

    #[test]
    fn builder_requires_initial_for_compound_root() {
        let result = ChartBuilder::new("m")
            .state("a", StateBuilder::atomic())
            .build(Implementations::new());

        assert!(matches!(result, Err(ChartError::Structural(_))));
    }

    #[test]
    fn single_state_chart_is_atomic_root() {
        let chart = ChartBuilder::new("solo").build(Implementations::new()).unwrap();

        assert_eq!(chart.root().kind(), StateKind::Atomic);
        assert_eq!(chart.initial_context(), &json!({}));
    }

    #[test]
    fn parallel_root_activates_every_region() {
        let chart = ChartBuilder::new("p")
            .parallel()
            .state("left", StateBuilder::atomic())
            .state("right", StateBuilder::atomic())
            .build(Implementations::new())
            .unwrap();

        assert_eq!(chart.initial_configuration().len(), 3);
    }

    #[test]
    fn definition_matches_parsed_json() {
        let built = ChartBuilder::new("light")
            .initial("unlit")
            .state("unlit", StateBuilder::atomic().on("TURN_ON", "lit"))
            .state("lit", StateBuilder::atomic())
            .definition();

        let parsed = ChartDefinition::from_value(json!({
            "id": "light",
            "initial": "unlit",
            "states": {
                "unlit": { "type": "atomic", "on": { "TURN_ON": "lit" } },
                "lit": { "type": "atomic" }
            }
        }))
        .unwrap();

        assert_eq!(built, parsed);
    }
}
