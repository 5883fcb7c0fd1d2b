//! Service configuration.

use serde::{Deserialize, Serialize};

/// Knobs for a [`Service`](crate::service::Service).
///
/// Deserializes with defaults for every missing field:
///
/// ```rust
/// use statechart::service::ServiceOptions;
///
/// let options: ServiceOptions = serde_json::from_str(r#"{ "history_limit": 100 }"#).unwrap();
/// assert!(options.record_history);
/// assert_eq!(options.history_limit, Some(100));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// Record every configuration change in the service history
    pub record_history: bool,

    /// Keep at most this many history entries, dropping the oldest
    pub history_limit: Option<usize>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            record_history: true,
            history_limit: None,
        }
    }
}
