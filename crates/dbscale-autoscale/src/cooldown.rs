//! Cooldown windows — rate-limits resize actions per direction.
//!
//! Pure functions over a request, the last recorded action time and the
//! current time. `blocked == true` means the action must not happen yet.

use std::time::Duration;

use serde::{Serialize, Serializer};

use dbscale_core::ScalingRequest;

/// Which window applies to a prospective action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownKind {
    ScaleOut,
    ScaleIn,
    Overload,
}

/// Result of a cooldown check, kept for logging and audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CooldownDecision {
    pub blocked: bool,
    pub kind: CooldownKind,
    /// Time since the last action; `None` if the instance was never scaled.
    #[serde(rename = "elapsed_ms", serialize_with = "opt_millis")]
    pub elapsed: Option<Duration>,
    #[serde(rename = "required_ms", serialize_with = "millis")]
    pub required: Duration,
    /// Overloaded with no overload window configured; scale-out window used.
    pub overload_defaulted: bool,
}

impl CooldownDecision {
    /// Time left until the window is over.
    pub fn remaining(&self) -> Duration {
        match self.elapsed {
            Some(elapsed) if self.blocked => self.required.saturating_sub(elapsed),
            _ => Duration::ZERO,
        }
    }
}

/// Evaluate the cooldown window for moving `request` to `suggested_size`.
///
/// `last_scaling_timestamp` and `now_millis` are epoch milliseconds; a zero
/// timestamp means the instance has never been scaled and is never blocked.
/// A clock that runs behind the stored timestamp counts as zero elapsed.
pub fn evaluate(
    request: &ScalingRequest,
    last_scaling_timestamp: u64,
    suggested_size: u32,
    now_millis: u64,
) -> CooldownDecision {
    let scale_out = suggested_size > request.current_size();

    let (kind, required, overload_defaulted) = if request.is_overloaded {
        match request.overload_cooldown {
            Some(window) => (CooldownKind::Overload, window, false),
            None => (CooldownKind::Overload, request.scale_out_cooldown, true),
        }
    } else if scale_out {
        (CooldownKind::ScaleOut, request.scale_out_cooldown, false)
    } else {
        (CooldownKind::ScaleIn, request.scale_in_cooldown, false)
    };

    if last_scaling_timestamp == 0 {
        return CooldownDecision {
            blocked: false,
            kind,
            elapsed: None,
            required,
            overload_defaulted,
        };
    }

    let elapsed = Duration::from_millis(now_millis.saturating_sub(last_scaling_timestamp));
    CooldownDecision {
        blocked: elapsed < required,
        kind,
        elapsed: Some(elapsed),
        required,
        overload_defaulted,
    }
}

/// `true` when the action toward `suggested_size` is still blocked.
pub fn is_within_cooldown(
    request: &ScalingRequest,
    last_scaling_timestamp: u64,
    suggested_size: u32,
    now_millis: u64,
) -> bool {
    evaluate(request, last_scaling_timestamp, suggested_size, now_millis).blocked
}

fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn opt_millis<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => millis(d, s),
        None => s.serialize_none(),
    }
}
