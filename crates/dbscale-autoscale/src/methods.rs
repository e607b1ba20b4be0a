//! Scaling methods — metrics to suggested size.
//!
//! Each [`ScalingMethod`] variant maps to one stateless [`SizeCalculator`].
//! Method names were already resolved (with fallback) when the request was
//! validated, so lookup here cannot fail.

use dbscale_core::{Metric, ScalingMethod, ScalingRequest};

/// Converts a request's metrics into a suggested size in the request's unit.
pub trait SizeCalculator: Send + Sync {
    fn calculate_size(&self, request: &ScalingRequest) -> u32;
}

/// Smallest size keeping every metric at or below its threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

/// Proportional resize for metrics outside their dead band.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

/// Fixed-size steps for metrics outside their dead band.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stepwise;

/// The calculator implementing `method`.
pub fn calculator(method: ScalingMethod) -> &'static dyn SizeCalculator {
    match method {
        ScalingMethod::Direct => &Direct,
        ScalingMethod::Linear => &Linear,
        ScalingMethod::Stepwise => &Stepwise,
    }
}

/// Suggested size for a request using its resolved method.
pub fn suggest_size(request: &ScalingRequest) -> u32 {
    calculator(request.method).calculate_size(request)
}

/// Float noise guard so an exact ratio like `3 * 65 / 65` does not ceil to 4.
const EPSILON: f64 = 1e-9;

/// Size at which `metric` would sit exactly at its threshold, assuming
/// utilization scales inversely with capacity.
fn proportional_size(current: u32, metric: &Metric) -> u64 {
    let raw = current as f64 * metric.value / metric.threshold;
    (raw - EPSILON).ceil().max(0.0) as u64
}

impl SizeCalculator for Direct {
    fn calculate_size(&self, request: &ScalingRequest) -> u32 {
        let current = request.current_size();
        let suggested = request
            .metrics
            .iter()
            .map(|m| proportional_size(current, m))
            .max()
            .unwrap_or(current as u64);
        request.fit_size(suggested)
    }
}

impl SizeCalculator for Linear {
    fn calculate_size(&self, request: &ScalingRequest) -> u32 {
        let current = request.current_size() as u64;
        let mut suggested = request
            .metrics
            .iter()
            .map(|m| {
                if m.in_range() {
                    return current;
                }
                let size = proportional_size(request.current_size(), m);
                if m.is_storage() { size.max(current) } else { size }
            })
            .max()
            .unwrap_or(current);

        if suggested < current
            && let Some(limit) = request.scale_in_limit
        {
            let max_reduction = (current as f64 * limit / 100.0).floor() as u64;
            suggested = suggested.max(current.saturating_sub(max_reduction));
        }
        request.fit_size(suggested)
    }
}

impl SizeCalculator for Stepwise {
    fn calculate_size(&self, request: &ScalingRequest) -> u32 {
        let current = request.current_size() as u64;
        let step = if request.is_overloaded {
            request.overload_step_size
        } else {
            request.step_size
        } as u64;

        let suggested = request
            .metrics
            .iter()
            .map(|m| {
                if m.in_range() {
                    current
                } else if m.value > m.threshold {
                    current.saturating_add(step)
                } else if m.is_storage() {
                    current
                } else {
                    current.saturating_sub(step)
                }
            })
            .max()
            .unwrap_or(current);
        request.fit_size(suggested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbscale_core::{MetricSample, ScalingRequestBody, SizeUnit};

    fn request(
        method: &str,
        units: SizeUnit,
        current: u32,
        metrics: Vec<MetricSample>,
    ) -> ScalingRequestBody {
        ScalingRequestBody {
            project_id: "proj".to_string(),
            instance_id: "db-1".to_string(),
            current_size: current,
            units,
            metrics,
            scaling_method: method.to_string(),
            scale_out_cooling_minutes: 5.0,
            scale_in_cooling_minutes: 30.0,
            overload_cooling_minutes: None,
            is_overloaded: false,
            min_size: None,
            max_size: Some(match units {
                SizeUnit::Nodes => 20,
                SizeUnit::ProcessingUnits => 10_000,
            }),
            step_size: None,
            overload_step_size: None,
            scale_in_limit: None,
        }
    }

    fn suggest(body: ScalingRequestBody) -> u32 {
        suggest_size(&ScalingRequest::try_from(body).unwrap())
    }

    fn cpu(value: f64) -> MetricSample {
        MetricSample::new("high_priority_cpu", value)
    }

    // ── Direct ─────────────────────────────────────────────────────

    #[test]
    fn direct_scales_out_proportionally() {
        // 1000 * 80 / 65 = 1231 → next valid size is 2000.
        let body = request("DIRECT", SizeUnit::ProcessingUnits, 1000, vec![cpu(80.0)]);
        assert_eq!(suggest(body), 2000);
    }

    #[test]
    fn direct_takes_max_across_metrics() {
        let body = request(
            "DIRECT",
            SizeUnit::Nodes,
            4,
            vec![cpu(65.0), MetricSample::new("storage", 150.0)],
        );
        // cpu needs 4, storage needs 4 * 150 / 75 = 8.
        assert_eq!(suggest(body), 8);
    }

    #[test]
    fn direct_scales_in_when_all_metrics_low() {
        let body = request("DIRECT", SizeUnit::Nodes, 10, vec![cpu(13.0)]);
        // 10 * 13 / 65 = 2.
        assert_eq!(suggest(body), 2);
    }

    #[test]
    fn direct_exact_ratio_does_not_round_up() {
        let body = request("DIRECT", SizeUnit::Nodes, 3, vec![cpu(65.0)]);
        assert_eq!(suggest(body), 3);
    }

    #[test]
    fn direct_without_max_size_scales_out_large_instances() {
        // Wire schema without maxSize: only the platform bounds apply.
        let unbounded = |units, current| {
            let mut body = request("DIRECT", units, current, vec![cpu(80.0)]);
            body.max_size = None;
            body.is_overloaded = true;
            body
        };
        // 10 * 80 / 65 = 12.3 → 13.
        assert_eq!(suggest(unbounded(SizeUnit::Nodes, 10)), 13);
        // 5000 * 80 / 65 = 6154 → 7000.
        assert_eq!(suggest(unbounded(SizeUnit::ProcessingUnits, 5000)), 7000);
        // 2000 * 80 / 65 = 2462 → 3000.
        assert_eq!(suggest(unbounded(SizeUnit::ProcessingUnits, 2000)), 3000);
    }

    #[test]
    fn direct_respects_max_size() {
        // Unclamped this would be 2 * 200 / 65 = 7.
        let mut body = request("DIRECT", SizeUnit::Nodes, 2, vec![cpu(200.0)]);
        body.max_size = Some(3);
        assert_eq!(suggest(body), 3);
    }

    #[test]
    fn no_metrics_keeps_current_size() {
        for method in ["DIRECT", "LINEAR", "STEPWISE"] {
            let body = request(method, SizeUnit::Nodes, 5, vec![]);
            assert_eq!(suggest(body), 5, "{method}");
        }
    }

    // ── Linear ─────────────────────────────────────────────────────

    #[test]
    fn linear_ignores_metrics_in_range() {
        let body = request("LINEAR", SizeUnit::Nodes, 5, vec![cpu(68.0)]);
        assert_eq!(suggest(body), 5);
    }

    #[test]
    fn linear_scales_out_by_ratio() {
        let body = request("LINEAR", SizeUnit::Nodes, 5, vec![cpu(91.0)]);
        // 5 * 91 / 65 = 7.
        assert_eq!(suggest(body), 7);
    }

    #[test]
    fn linear_in_range_metric_vetoes_scale_in() {
        let body = request(
            "LINEAR",
            SizeUnit::Nodes,
            10,
            vec![cpu(13.0), MetricSample::new("rolling_24_hr", 90.0)],
        );
        assert_eq!(suggest(body), 10);
    }

    #[test]
    fn linear_storage_never_scales_in() {
        let body = request(
            "LINEAR",
            SizeUnit::Nodes,
            6,
            vec![MetricSample::new("storage", 10.0)],
        );
        assert_eq!(suggest(body), 6);
    }

    #[test]
    fn linear_scale_in_limit_caps_reduction() {
        let mut body = request("LINEAR", SizeUnit::Nodes, 10, vec![cpu(13.0)]);
        body.scale_in_limit = Some(30.0);
        // Unlimited would be 2; at most 30% (3 nodes) may go.
        assert_eq!(suggest(body), 7);
    }

    #[test]
    fn linear_rounds_processing_units() {
        let body = request("LINEAR", SizeUnit::ProcessingUnits, 300, vec![cpu(90.0)]);
        // 300 * 90 / 65 = 416 → 500.
        assert_eq!(suggest(body), 500);
    }

    // ── Stepwise ───────────────────────────────────────────────────

    #[test]
    fn stepwise_steps_up_when_above_range() {
        let body = request("STEPWISE", SizeUnit::Nodes, 3, vec![cpu(80.0)]);
        assert_eq!(suggest(body), 5);
    }

    #[test]
    fn stepwise_uses_overload_step_when_overloaded() {
        let mut body = request("STEPWISE", SizeUnit::Nodes, 3, vec![cpu(95.0)]);
        body.is_overloaded = true;
        assert_eq!(suggest(body), 8);
    }

    #[test]
    fn stepwise_steps_down_when_below_range() {
        let body = request("STEPWISE", SizeUnit::Nodes, 6, vec![cpu(20.0)]);
        assert_eq!(suggest(body), 4);
    }

    #[test]
    fn stepwise_storage_holds_size() {
        let body = request(
            "STEPWISE",
            SizeUnit::Nodes,
            6,
            vec![MetricSample::new("storage", 5.0)],
        );
        assert_eq!(suggest(body), 6);
    }

    #[test]
    fn stepwise_never_below_min() {
        let body = request("STEPWISE", SizeUnit::Nodes, 2, vec![cpu(5.0)]);
        assert_eq!(suggest(body), 1);
    }

    #[test]
    fn stepwise_processing_units_cross_node_boundary() {
        // 900 + 200 = 1100 → whole nodes from 1000 up → 2000.
        let body = request("STEPWISE", SizeUnit::ProcessingUnits, 900, vec![cpu(80.0)]);
        assert_eq!(suggest(body), 2000);
    }

    #[test]
    fn stepwise_processing_units_below_one_node() {
        let body = request("STEPWISE", SizeUnit::ProcessingUnits, 500, vec![cpu(80.0)]);
        assert_eq!(suggest(body), 700);
    }

    // ── Registry ───────────────────────────────────────────────────

    #[test]
    fn unknown_method_uses_stepwise() {
        let body = request("QUANTUM", SizeUnit::Nodes, 3, vec![cpu(80.0)]);
        let req = ScalingRequest::try_from(body).unwrap();
        assert_eq!(req.method, ScalingMethod::Stepwise);
        assert_eq!(suggest_size(&req), Stepwise.calculate_size(&req));
        assert_eq!(suggest_size(&req), 5);
    }
}
