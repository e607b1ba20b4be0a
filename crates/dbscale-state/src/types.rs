//! Persisted records for the dbscale state store.

use serde::{Deserialize, Serialize};

use dbscale_core::{ScalingMethod, SizeUnit};

/// The autoscaler's memory of one instance.
///
/// A zero `last_scaling_timestamp` means the instance has never been
/// scaled; that is also what a lookup returns for an unknown instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerState {
    pub instance_key: String,
    /// Epoch milliseconds of the last successful scaling action.
    pub last_scaling_timestamp: u64,
    /// Size requested by the last successful action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_size: Option<u32>,
}

impl AutoscalerState {
    /// State of an instance that has never been scaled.
    pub fn empty(instance_key: &str) -> Self {
        Self {
            instance_key: instance_key.to_string(),
            ..Default::default()
        }
    }

    pub fn has_scaled(&self) -> bool {
        self.last_scaling_timestamp != 0
    }
}

/// One successful scaling action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingRecord {
    pub instance_key: String,
    /// Epoch milliseconds at which the resize was accepted.
    pub timestamp: u64,
    pub from_size: u32,
    pub to_size: u32,
    pub units: SizeUnit,
    pub method: ScalingMethod,
}

impl ScalingRecord {
    /// Composite key for the history table; sorts by instance, then time.
    pub fn history_key(&self) -> (&str, u64) {
        (self.instance_key.as_str(), self.timestamp)
    }

    /// The state record this action leaves behind.
    pub fn to_state(&self) -> AutoscalerState {
        AutoscalerState {
            instance_key: self.instance_key.clone(),
            last_scaling_timestamp: self.timestamp,
            current_size: Some(self.to_size),
        }
    }
}
