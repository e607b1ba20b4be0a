//! Capacity units, instance identity, and scaling method identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RequestError, RequestResult};

/// Processing units that make up one node.
pub const PROCESSING_UNITS_PER_NODE: u64 = 1000;

/// Granularity of processing-unit sizes below one node.
pub const PROCESSING_UNITS_SMALL_STEP: u64 = 100;

/// Name of the storage utilization metric. Storage never drives a scale-in.
pub const STORAGE_METRIC: &str = "storage";

/// Dead band applied around a metric threshold when none is given.
pub const DEFAULT_MARGIN: f64 = 5.0;

/// Largest instance the platform provisions, in nodes.
pub const PLATFORM_MAX_NODES: u32 = 1000;

/// Recommended maximum utilization (percent) for well-known metric names.
pub fn default_threshold(metric_name: &str) -> Option<f64> {
    match metric_name {
        "high_priority_cpu" => Some(65.0),
        "rolling_24_hr" => Some(90.0),
        STORAGE_METRIC => Some(75.0),
        _ => None,
    }
}

// ── Units ──────────────────────────────────────────────────────────

/// Unit in which an instance's compute capacity is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizeUnit {
    /// Coarse-grained nodes.
    Nodes,
    /// Fine-grained processing units (1000 per node).
    ProcessingUnits,
}

impl SizeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeUnit::Nodes => "NODES",
            SizeUnit::ProcessingUnits => "PROCESSING_UNITS",
        }
    }

    /// Smallest size the platform accepts in this unit.
    pub fn platform_min(self) -> u32 {
        match self {
            SizeUnit::Nodes => 1,
            SizeUnit::ProcessingUnits => PROCESSING_UNITS_SMALL_STEP as u32,
        }
    }

    /// Largest size the platform accepts in this unit.
    pub fn platform_max(self) -> u32 {
        match self {
            SizeUnit::Nodes => PLATFORM_MAX_NODES,
            SizeUnit::ProcessingUnits => PLATFORM_MAX_NODES * PROCESSING_UNITS_PER_NODE as u32,
        }
    }

    pub fn default_step_size(self) -> u32 {
        match self {
            SizeUnit::Nodes => 2,
            SizeUnit::ProcessingUnits => 200,
        }
    }

    pub fn default_overload_step_size(self) -> u32 {
        match self {
            SizeUnit::Nodes => 5,
            SizeUnit::ProcessingUnits => 500,
        }
    }

    /// Whether `size` can be provisioned as-is.
    pub fn is_valid_size(self, size: u64) -> bool {
        match self {
            SizeUnit::Nodes => size >= 1,
            SizeUnit::ProcessingUnits => {
                if size >= PROCESSING_UNITS_PER_NODE {
                    size % PROCESSING_UNITS_PER_NODE == 0
                } else {
                    size >= PROCESSING_UNITS_SMALL_STEP && size % PROCESSING_UNITS_SMALL_STEP == 0
                }
            }
        }
    }

    /// Smallest valid size that is `>= size`.
    ///
    /// Processing units below one node move in steps of 100; from one
    /// node upward they move in whole nodes.
    pub fn round_up(self, size: u64) -> u64 {
        match self {
            SizeUnit::Nodes => size.max(1),
            SizeUnit::ProcessingUnits => {
                if size <= PROCESSING_UNITS_SMALL_STEP {
                    PROCESSING_UNITS_SMALL_STEP
                } else if size < PROCESSING_UNITS_PER_NODE {
                    size.div_ceil(PROCESSING_UNITS_SMALL_STEP) * PROCESSING_UNITS_SMALL_STEP
                } else {
                    size.div_ceil(PROCESSING_UNITS_PER_NODE)
                        .saturating_mul(PROCESSING_UNITS_PER_NODE)
                }
            }
        }
    }

    /// Largest valid size that is `<= size`, never below the platform minimum.
    pub fn round_down(self, size: u64) -> u64 {
        match self {
            SizeUnit::Nodes => size.max(1),
            SizeUnit::ProcessingUnits => {
                if size >= PROCESSING_UNITS_PER_NODE {
                    size / PROCESSING_UNITS_PER_NODE * PROCESSING_UNITS_PER_NODE
                } else if size >= PROCESSING_UNITS_SMALL_STEP {
                    size / PROCESSING_UNITS_SMALL_STEP * PROCESSING_UNITS_SMALL_STEP
                } else {
                    PROCESSING_UNITS_SMALL_STEP
                }
            }
        }
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provisioned size tagged with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "unit", content = "size", rename_all = "snake_case")]
pub enum Capacity {
    NodeCount(u32),
    ProcessingUnits(u32),
}

impl Capacity {
    pub fn new(unit: SizeUnit, size: u32) -> Self {
        match unit {
            SizeUnit::Nodes => Capacity::NodeCount(size),
            SizeUnit::ProcessingUnits => Capacity::ProcessingUnits(size),
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            Capacity::NodeCount(n) | Capacity::ProcessingUnits(n) => *n,
        }
    }

    pub fn unit(&self) -> SizeUnit {
        match self {
            Capacity::NodeCount(_) => SizeUnit::Nodes,
            Capacity::ProcessingUnits(_) => SizeUnit::ProcessingUnits,
        }
    }

    /// Same unit, different size.
    pub fn with_size(&self, size: u32) -> Self {
        Capacity::new(self.unit(), size)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::NodeCount(n) => write!(f, "{n} nodes"),
            Capacity::ProcessingUnits(n) => write!(f, "{n} processing units"),
        }
    }
}

// ── Instance identity ──────────────────────────────────────────────

/// Identity of one managed database instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    pub project_id: String,
    pub instance_id: String,
}

impl InstanceKey {
    pub fn new(project_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Storage key: `projects/{project}/instances/{instance}`.
    pub fn table_key(&self) -> String {
        format!("projects/{}/instances/{}", self.project_id, self.instance_id)
    }

    /// Build a key from untrusted ids, rejecting empty or unsafe ones.
    pub fn try_new(project_id: &str, instance_id: &str) -> RequestResult<Self> {
        for (field, id) in [("projectId", project_id), ("instanceId", instance_id)] {
            if id.trim().is_empty() {
                return Err(RequestError::MissingField(field));
            }
            if !Self::is_valid_id(id) {
                return Err(RequestError::invalid(
                    field,
                    format!("{id:?} may only contain ASCII letters, digits, '-', '_' and '.'"),
                ));
            }
        }
        Ok(Self::new(project_id, instance_id))
    }

    /// Whether `id` can be a project or instance id: ASCII letters, digits,
    /// `-`, `_` and `.` only. Keeps keys and request paths unambiguous.
    pub fn is_valid_id(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/instances/{}", self.project_id, self.instance_id)
    }
}

// ── Scaling methods ────────────────────────────────────────────────

/// The closed set of scaling methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScalingMethod {
    /// Jump straight to the size that keeps every metric under its threshold.
    Direct,
    /// Scale proportionally to observed / target utilization.
    Linear,
    /// Fixed-size steps toward the thresholds.
    #[default]
    Stepwise,
}

impl ScalingMethod {
    /// Method used when the requested name is not recognized.
    pub const DEFAULT: ScalingMethod = ScalingMethod::Stepwise;

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingMethod::Direct => "DIRECT",
            ScalingMethod::Linear => "LINEAR",
            ScalingMethod::Stepwise => "STEPWISE",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "DIRECT" => Some(ScalingMethod::Direct),
            "LINEAR" => Some(ScalingMethod::Linear),
            "STEPWISE" => Some(ScalingMethod::Stepwise),
            _ => None,
        }
    }
}

impl fmt::Display for ScalingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
