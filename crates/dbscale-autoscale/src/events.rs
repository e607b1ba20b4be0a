//! Structured decision events.
//!
//! The orchestrator emits one event per state transition instead of logging
//! inline. Events go to an [`EventSink`] as they happen and are also
//! returned in the decision report.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use dbscale_core::{Capacity, ScalingMethod};

use crate::cooldown::CooldownDecision;

/// States of one scaling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    Received,
    SizeComputed,
    NoOp,
    CooldownBlocked,
    Acting,
    Done,
    Failed,
}

/// Step at which an action failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    StateRead,
    Resize,
    StateWrite,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecisionEvent {
    Received {
        instance: String,
        current: Capacity,
        method: ScalingMethod,
    },
    /// The requested method name was unknown; the default was used.
    MethodFallback {
        instance: String,
        requested: String,
        fallback: ScalingMethod,
    },
    SizeComputed {
        instance: String,
        method: ScalingMethod,
        current_size: u32,
        suggested_size: u32,
    },
    NoOp {
        instance: String,
        size: u32,
    },
    CooldownBlocked {
        instance: String,
        suggested_size: u32,
        cooldown: CooldownDecision,
    },
    Acting {
        instance: String,
        from: Capacity,
        to: Capacity,
        cooldown: CooldownDecision,
    },
    Done {
        instance: String,
        from: Capacity,
        to: Capacity,
        timestamp: u64,
    },
    Failed {
        instance: String,
        attempted: Capacity,
        stage: FailureStage,
        error: String,
    },
}

impl DecisionEvent {
    /// The state this event moves the decision into. Warnings carry none.
    pub fn state(&self) -> Option<DecisionState> {
        match self {
            DecisionEvent::Received { .. } => Some(DecisionState::Received),
            DecisionEvent::MethodFallback { .. } => None,
            DecisionEvent::SizeComputed { .. } => Some(DecisionState::SizeComputed),
            DecisionEvent::NoOp { .. } => Some(DecisionState::NoOp),
            DecisionEvent::CooldownBlocked { .. } => Some(DecisionState::CooldownBlocked),
            DecisionEvent::Acting { .. } => Some(DecisionState::Acting),
            DecisionEvent::Done { .. } => Some(DecisionState::Done),
            DecisionEvent::Failed { .. } => Some(DecisionState::Failed),
        }
    }
}

/// Receives decision events as they are emitted.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DecisionEvent);
}

/// Writes decision events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DecisionEvent) {
        match event {
            DecisionEvent::Received {
                instance,
                current,
                method,
            } => debug!(%instance, %current, %method, "scaling request received"),
            DecisionEvent::MethodFallback {
                instance,
                requested,
                fallback,
            } => warn!(
                %instance,
                %requested,
                %fallback,
                "unknown scaling method, using default"
            ),
            DecisionEvent::SizeComputed {
                instance,
                method,
                current_size,
                suggested_size,
            } => debug!(
                %instance,
                %method,
                current_size,
                suggested_size,
                "suggested size computed"
            ),
            DecisionEvent::NoOp { instance, size } => {
                debug!(%instance, size, "size unchanged, nothing to do")
            }
            DecisionEvent::CooldownBlocked {
                instance,
                suggested_size,
                cooldown,
            } => {
                if cooldown.overload_defaulted {
                    warn!(%instance, "overloaded with no overload cooldown, using scale-out cooldown");
                }
                info!(
                    %instance,
                    suggested_size,
                    kind = ?cooldown.kind,
                    remaining_secs = cooldown.remaining().as_secs(),
                    "within cooldown, not scaling yet"
                )
            }
            DecisionEvent::Acting {
                instance,
                from,
                to,
                cooldown,
            } => {
                if cooldown.overload_defaulted {
                    warn!(%instance, "overloaded with no overload cooldown, using scale-out cooldown");
                }
                info!(%instance, %from, %to, kind = ?cooldown.kind, "scaling")
            }
            DecisionEvent::Done {
                instance,
                from,
                to,
                timestamp,
            } => info!(%instance, %from, %to, timestamp, "scaling request accepted"),
            DecisionEvent::Failed {
                instance,
                attempted,
                stage,
                error,
            } => error!(%instance, %attempted, ?stage, %error, "scaling failed"),
        }
    }
}
