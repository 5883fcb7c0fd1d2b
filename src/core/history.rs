//! Configuration transition history.
//!
//! Provides immutable tracking of the configurations a service has moved
//! through, following functional programming principles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single processed event that changed the configuration.
///
/// Configurations are stored as active leaf paths so the record stays
/// meaningful outside the chart that produced it.
///
/// # Example
///
/// ```rust
/// use statechart::core::ConfigurationTransition;
/// use chrono::Utc;
///
/// let transition = ConfigurationTransition {
///     from: vec!["unlit".to_string()],
///     to: vec!["lit".to_string()],
///     event: "TURN_ON".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.event, "TURN_ON");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationTransition {
    /// Active leaf paths before the event
    pub from: Vec<String>,
    /// Active leaf paths after the event
    pub to: Vec<String>,
    /// Type of the event that caused the transition
    pub event: String,
    /// When the transition was committed
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of configuration transitions.
///
/// History is immutable - the `record` method returns a new history
/// with the transition added.
///
/// # Example
///
/// ```rust
/// use statechart::core::{ConfigurationTransition, StateHistory};
/// use chrono::Utc;
///
/// let history = StateHistory::new();
///
/// let history = history.record(ConfigurationTransition {
///     from: vec!["unlit".to_string()],
///     to: vec!["lit".to_string()],
///     event: "TURN_ON".to_string(),
///     timestamp: Utc::now(),
/// });
///
/// let history = history.record(ConfigurationTransition {
///     from: vec!["lit".to_string()],
///     to: vec!["unlit".to_string()],
///     event: "TURN_OFF".to_string(),
///     timestamp: Utc::now(),
/// });
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 3); // unlit -> lit -> unlit
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: Vec<ConfigurationTransition>,
}

impl StateHistory {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Append a transition. The receiver is left untouched.
    pub fn record(&self, transition: ConfigurationTransition) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Keep only the most recent `limit` transitions.
    pub fn retain_last(&self, limit: usize) -> Self {
        let skip = self.transitions.len().saturating_sub(limit);
        Self {
            transitions: self.transitions[skip..].to_vec(),
        }
    }

    /// Get the sequence of configurations traversed.
    ///
    /// Returns the `from` of the first transition, then the `to` of each
    /// transition.
    pub fn get_path(&self) -> Vec<&[String]> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(first.from.as_slice());
        }
        for transition in &self.transitions {
            path.push(transition.to.as_slice());
        }
        path
    }

    /// Calculate total duration from first to last transition.
    ///
    /// Returns `None` if there are no transitions.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Get all transitions in order.
    pub fn transitions(&self) -> &[ConfigurationTransition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
