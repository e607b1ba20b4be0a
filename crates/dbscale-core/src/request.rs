//! Inbound scaling requests.
//!
//! [`ScalingRequestBody`] is the JSON shape a collector delivers.
//! [`ScalingRequest`] is the validated form one decision runs on: ids are
//! present and free of separators, thresholds are resolved, cooldowns are [`Duration`]s, size
//! limits are snapped to valid sizes, and the scaling method name has been
//! resolved to a [`ScalingMethod`] (falling back with a recorded warning).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RequestError, RequestResult};
use crate::types::*;

/// One utilization sample as delivered on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    /// Recommended maximum utilization. Defaults by metric name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Dead band around the threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            threshold: None,
            margin: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = Some(margin);
        self
    }
}

/// Wire form of a per-instance scaling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingRequestBody {
    pub project_id: String,
    pub instance_id: String,
    pub current_size: u32,
    pub units: SizeUnit,
    pub metrics: Vec<MetricSample>,
    pub scaling_method: String,
    pub scale_out_cooling_minutes: f64,
    pub scale_in_cooling_minutes: f64,
    #[serde(default)]
    pub overload_cooling_minutes: Option<f64>,
    #[serde(default)]
    pub is_overloaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overload_step_size: Option<u32>,
    /// Linear only: maximum percentage of capacity removed by one scale-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_in_limit: Option<f64>,
}

/// A utilization metric with its threshold resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub threshold: f64,
    pub margin: f64,
}

impl Metric {
    /// `threshold - margin <= value <= threshold + margin`.
    pub fn in_range(&self) -> bool {
        self.value >= self.threshold - self.margin && self.value <= self.threshold + self.margin
    }

    pub fn is_storage(&self) -> bool {
        self.name == STORAGE_METRIC
    }
}

/// Non-fatal conditions found while validating a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestWarning {
    UnknownScalingMethod {
        requested: String,
        fallback: ScalingMethod,
    },
}

/// Valid size range for one request, already snapped to the unit's granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub min: u32,
    pub max: u32,
}

/// A validated scaling request. Immutable for the duration of one decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingRequest {
    pub instance: InstanceKey,
    pub current: Capacity,
    pub metrics: Vec<Metric>,
    pub method: ScalingMethod,
    pub scale_out_cooldown: Duration,
    pub scale_in_cooldown: Duration,
    pub overload_cooldown: Option<Duration>,
    pub is_overloaded: bool,
    pub limits: SizeLimits,
    pub step_size: u32,
    pub overload_step_size: u32,
    pub scale_in_limit: Option<f64>,
    pub warnings: Vec<RequestWarning>,
}

impl ScalingRequest {
    /// Parse and validate a JSON request body.
    pub fn from_json(bytes: &[u8]) -> RequestResult<Self> {
        let body: ScalingRequestBody = serde_json::from_slice(bytes)?;
        Self::try_from(body)
    }

    pub fn current_size(&self) -> u32 {
        self.current.size()
    }

    pub fn unit(&self) -> SizeUnit {
        self.current.unit()
    }

    /// Snap a raw computed size to a valid size inside the request's limits.
    pub fn fit_size(&self, raw: u64) -> u32 {
        let rounded = self.unit().round_up(raw);
        rounded.clamp(self.limits.min as u64, self.limits.max as u64) as u32
    }
}

impl TryFrom<ScalingRequestBody> for ScalingRequest {
    type Error = RequestError;

    fn try_from(body: ScalingRequestBody) -> RequestResult<Self> {
        let instance = InstanceKey::try_new(&body.project_id, &body.instance_id)?;

        let unit = body.units;
        if !unit.is_valid_size(body.current_size as u64) {
            return Err(RequestError::invalid(
                "currentSize",
                format!("{} is not a valid size in {unit}", body.current_size),
            ));
        }
        let scale_out_cooldown = minutes("scaleOutCoolingMinutes", body.scale_out_cooling_minutes)?;
        let scale_in_cooldown = minutes("scaleInCoolingMinutes", body.scale_in_cooling_minutes)?;
        let overload_cooldown = body
            .overload_cooling_minutes
            .map(|m| minutes("overloadCoolingMinutes", m))
            .transpose()?;

        let metrics = body
            .metrics
            .into_iter()
            .map(resolve_metric)
            .collect::<RequestResult<Vec<_>>>()?;

        let platform_max = unit.platform_max();
        let min = unit.round_up(body.min_size.unwrap_or(unit.platform_min()) as u64);
        let max = unit.round_down(body.max_size.unwrap_or(platform_max).min(platform_max) as u64);
        if min > max {
            return Err(RequestError::invalid(
                "minSize",
                format!("{min} exceeds maxSize {max}"),
            ));
        }

        let step_size = body.step_size.unwrap_or(unit.default_step_size());
        if step_size == 0 {
            return Err(RequestError::invalid("stepSize", "must be positive"));
        }
        let overload_step_size = body
            .overload_step_size
            .unwrap_or(unit.default_overload_step_size());
        if overload_step_size == 0 {
            return Err(RequestError::invalid("overloadStepSize", "must be positive"));
        }

        if let Some(limit) = body.scale_in_limit
            && !(limit.is_finite() && (0.0..=100.0).contains(&limit))
        {
            return Err(RequestError::invalid("scaleInLimit", "must be a percentage in 0..=100"));
        }

        let mut warnings = Vec::new();
        let method = match ScalingMethod::from_name(&body.scaling_method) {
            Some(method) => method,
            None => {
                warnings.push(RequestWarning::UnknownScalingMethod {
                    requested: body.scaling_method.clone(),
                    fallback: ScalingMethod::DEFAULT,
                });
                ScalingMethod::DEFAULT
            }
        };

        Ok(Self {
            instance,
            current: Capacity::new(unit, body.current_size),
            metrics,
            method,
            scale_out_cooldown,
            scale_in_cooldown,
            overload_cooldown,
            is_overloaded: body.is_overloaded,
            limits: SizeLimits {
                min: min as u32,
                max: max as u32,
            },
            step_size,
            overload_step_size,
            scale_in_limit: body.scale_in_limit,
            warnings,
        })
    }
}

fn minutes(field: &'static str, value: f64) -> RequestResult<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(RequestError::invalid(field, "must be a non-negative number of minutes"));
    }
    Duration::try_from_secs_f64(value * 60.0).map_err(|e| RequestError::invalid(field, e.to_string()))
}

fn resolve_metric(sample: MetricSample) -> RequestResult<Metric> {
    if sample.name.trim().is_empty() {
        return Err(RequestError::MissingField("metrics[].name"));
    }
    if !sample.value.is_finite() || sample.value < 0.0 {
        return Err(RequestError::invalid(
            "metrics[].value",
            format!("{}: must be a non-negative number", sample.name),
        ));
    }
    let threshold = match sample.threshold.or_else(|| default_threshold(&sample.name)) {
        Some(t) if t.is_finite() && t > 0.0 => t,
        Some(t) => {
            return Err(RequestError::invalid(
                "metrics[].threshold",
                format!("{}: {t} is not a positive number", sample.name),
            ));
        }
        None => {
            return Err(RequestError::invalid(
                "metrics[].threshold",
                format!("{}: no threshold given and no default for this metric", sample.name),
            ));
        }
    };
    let margin = sample.margin.unwrap_or(DEFAULT_MARGIN);
    if !margin.is_finite() || margin < 0.0 {
        return Err(RequestError::invalid(
            "metrics[].margin",
            format!("{}: must be a non-negative number", sample.name),
        ));
    }
    Ok(Metric {
        name: sample.name,
        value: sample.value,
        threshold,
        margin,
    })
}
