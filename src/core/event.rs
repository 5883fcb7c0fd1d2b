//! Events that drive a state chart.
//!
//! An event is a discriminated value: a `type` tag plus any number of
//! additional payload fields. Events are transient; the engine never keeps
//! one beyond the step it triggers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type of the synthetic event passed to entry actions when a service starts.
pub const INIT_EVENT: &str = "statechart.init";

/// Type of the synthetic event passed to exit actions when a service stops.
pub const STOP_EVENT: &str = "statechart.stop";

/// A typed event with an arbitrary JSON payload.
///
/// Serializes flat, with the tag under `type`:
///
/// ```rust
/// use statechart::core::Event;
/// use serde_json::json;
///
/// let event = Event::new("CHANGE_COLOR").with("color", "#f00");
///
/// assert_eq!(event.event_type(), "CHANGE_COLOR");
/// assert_eq!(event.get("color"), Some(&json!("#f00")));
/// assert_eq!(
///     serde_json::to_value(&event).unwrap(),
///     json!({ "type": "CHANGE_COLOR", "color": "#f00" })
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The discriminating tag used to look up handlers
    #[serde(rename = "type")]
    pub event_type: String,
    /// Every other field of the event
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Create an event with an empty payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Map::new(),
        }
    }

    /// Add a payload field, returning the event.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// The event's type tag.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub(crate) fn init() -> Self {
        Self::new(INIT_EVENT)
    }

    pub(crate) fn stop() -> Self {
        Self::new(STOP_EVENT)
    }
}

impl From<&str> for Event {
    fn from(event_type: &str) -> Self {
        Self::new(event_type)
    }
}

impl From<String> for Event {
    fn from(event_type: String) -> Self {
        Self::new(event_type)
    }
}
