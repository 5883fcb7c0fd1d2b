//! Checkpoint and resume functionality for services.
//!
//! A [`Checkpoint`] captures everything a running service owns except the
//! chart and its implementations (which are not serializable): the active
//! leaf paths, the context, the history and the metadata. Long-running
//! services can persist it as JSON or bincode and resume after a restart
//! with [`Service::restore`](crate::service::Service::restore).

use crate::core::{Configuration, StateChart, StateHistory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Metadata tracked by a service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineMetadata {
    /// When the service was created
    pub created_at: DateTime<Utc>,

    /// Last update time
    pub updated_at: DateTime<Utc>,

    /// Events processed while running, including unhandled ones
    pub events_processed: u64,

    /// Taken transitions per event type
    pub transitions_by_event: BTreeMap<String, u64>,
}

impl Default for MachineMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            events_processed: 0,
            transitions_by_event: BTreeMap::new(),
        }
    }
}

impl MachineMetadata {
    pub(crate) fn record(&mut self, event_type: &str, changed: bool) {
        self.updated_at = Utc::now();
        self.events_processed += 1;
        if changed {
            *self
                .transitions_by_event
                .entry(event_type.to_string())
                .or_insert(0) += 1;
        }
    }
}

/// Serializable checkpoint of a service.
/// Does NOT include the chart or its implementations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: Uuid,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// Id of the service the checkpoint was taken from
    pub service_id: Uuid,

    /// Id of the chart the service was running
    pub chart_id: String,

    /// Active leaf paths, relative to the root
    pub configuration: Vec<String>,

    /// Extended state at checkpoint time
    #[serde(with = "json_value")]
    pub context: Value,

    /// Complete transition history
    pub history: StateHistory,

    /// Service metadata
    pub metadata: MachineMetadata,
}

impl Checkpoint {
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    pub fn to_binary(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: Self = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    fn check_version(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(())
    }

    /// Rebuild the active configuration against `chart`.
    ///
    /// Fails when the checkpoint was taken from another chart, uses a newer
    /// format, or names leaves that do not form a legal configuration.
    pub fn configuration_for(&self, chart: &StateChart) -> Result<Configuration, CheckpointError> {
        self.check_version()?;

        if self.chart_id != chart.id() {
            return Err(CheckpointError::ChartMismatch {
                expected: chart.id().to_string(),
                found: self.chart_id.clone(),
            });
        }

        let configuration = Configuration::from_leaf_paths(chart, &self.configuration)
            .ok_or_else(|| {
                CheckpointError::ValidationFailed(format!(
                    "unknown state in [{}]",
                    self.configuration.join(", ")
                ))
            })?;

        if !configuration.is_valid_cut(chart) {
            return Err(CheckpointError::ValidationFailed(format!(
                "[{}] is not a legal configuration",
                self.configuration.join(", ")
            )));
        }

        Ok(configuration)
    }
}

/// Context as a native value for self-describing formats and as JSON text
/// otherwise, since bincode cannot decode an untyped `Value`.
mod json_value {
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Value, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            value.serialize(serializer)
        } else {
            serde_json::to_string(value)
                .map_err(S::Error::custom)?
                .serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        if deserializer.is_human_readable() {
            Value::deserialize(deserializer)
        } else {
            let text = String::deserialize(deserializer)?;
            serde_json::from_str(&text).map_err(D::Error::custom)
        }
    }
}
