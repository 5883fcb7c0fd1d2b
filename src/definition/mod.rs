//! Serializable chart definitions.
//!
//! A [`ChartDefinition`] is the declarative input to chart construction, in
//! the conventional nested config shape:
//!
//! ```json
//! {
//!   "id": "light",
//!   "initial": "unlit",
//!   "context": { "color": "#fff" },
//!   "states": {
//!     "unlit": { "on": { "TURN_ON": "lit" } },
//!     "lit": {
//!       "entry": "logLit",
//!       "on": {
//!         "TURN_OFF": "unlit",
//!         "CHANGE_COLOR": { "actions": ["updateColor"] },
//!         "BREAK": { "target": "broken", "guard": "isFragile" }
//!       }
//!     },
//!     "broken": { "type": "final" }
//!   }
//! }
//! ```
//!
//! Child states and event handlers keep their declaration order, which fixes
//! document order, region order and therefore action order.

mod serde_ext;

use crate::builder::ChartError;
use crate::core::StateKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Description of one state and its subtree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    /// Explicit kind; inferred from `states` when omitted
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StateKind>,

    /// Key of the child entered by default (compound states only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,

    /// Child states in declaration order
    #[serde(
        default,
        with = "serde_ext::ordered_map",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub states: Vec<(String, StateDefinition)>,

    /// Event handlers in declaration order
    #[serde(
        default,
        with = "serde_ext::ordered_map",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub on: Vec<(String, TransitionDefinition)>,

    #[serde(
        default,
        with = "serde_ext::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub entry: Vec<String>,

    #[serde(
        default,
        with = "serde_ext::one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub exit: Vec<String>,
}

impl StateDefinition {
    /// The declared kind, or `compound` when children exist and `atomic`
    /// otherwise.
    pub fn resolved_kind(&self) -> StateKind {
        self.kind.unwrap_or(if self.states.is_empty() {
            StateKind::Atomic
        } else {
            StateKind::Compound
        })
    }
}

/// Description of the transition taken for one event.
///
/// Deserializes from either a bare target string or the full object form;
/// `cond` is accepted as an alias for `guard`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_ext::TransitionRepr")]
pub struct TransitionDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub internal: bool,
}

impl From<&str> for TransitionDefinition {
    fn from(target: &str) -> Self {
        Self {
            target: Some(target.to_string()),
            ..Self::default()
        }
    }
}

impl From<String> for TransitionDefinition {
    fn from(target: String) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }
}

/// A whole chart: the root state plus the chart id and initial context.
///
/// The id doubles as the root state's key, so absolute targets read
/// `#<id>.child.grandchild`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartDefinition {
    pub id: String,

    #[serde(default = "empty_context")]
    pub context: Value,

    #[serde(flatten)]
    pub root: StateDefinition,
}

fn empty_context() -> Value {
    Value::Object(Map::new())
}

impl ChartDefinition {
    pub fn new(id: impl Into<String>, root: StateDefinition) -> Self {
        Self {
            id: id.into(),
            context: empty_context(),
            root,
        }
    }

    /// Parse a definition from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ChartError> {
        serde_json::from_str(json).map_err(|e| ChartError::Parse(e.to_string()))
    }

    /// Parse a definition from an already-decoded JSON value.
    ///
    /// Declaration order is kept, but a [`Value`] object cannot hold the
    /// same key twice, so duplicate sibling keys are only reported when
    /// parsing text with [`from_json`](Self::from_json).
    pub fn from_value(value: Value) -> Result<Self, ChartError> {
        serde_json::from_value(value).map_err(|e| ChartError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ChartError> {
        serde_json::to_string_pretty(self).map_err(|e| ChartError::Parse(e.to_string()))
    }
}
