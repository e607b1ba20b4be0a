//! Autoscaler — drives one scaling decision from request to outcome.
//!
//! Computes the suggested size, short-circuits when nothing changes, checks
//! the cooldown window against the stored state, and for an allowed action
//! asks the control plane for the new capacity before recording it. The
//! state read through the state write run under a per-instance lock.

use std::sync::Arc;

use serde::Serialize;

use dbscale_core::{Capacity, RequestWarning, ScalingMethod, ScalingRequest};
use dbscale_state::{ScalingRecord, StateBackend};

use crate::clock::{Clock, SystemClock};
use crate::cooldown::{self, CooldownDecision};
use crate::error::{ScaleError, ScaleResult};
use crate::events::{DecisionEvent, DecisionState, EventSink, FailureStage, TracingSink};
use crate::locks::InstanceLocks;
use crate::methods;
use crate::requester::CapacityRequester;

/// What happened to one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionReport {
    pub instance: String,
    /// Terminal state: `NO_OP`, `COOLDOWN_BLOCKED` or `DONE`.
    pub state: DecisionState,
    pub method: ScalingMethod,
    pub current: Capacity,
    pub suggested: Capacity,
    /// Present whenever the cooldown window was consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<CooldownDecision>,
    pub events: Vec<DecisionEvent>,
}

/// Emits events to the sink and keeps them for the report.
struct Recorder<'a> {
    sink: &'a dyn EventSink,
    events: Vec<DecisionEvent>,
}

impl Recorder<'_> {
    fn emit(&mut self, event: DecisionEvent) {
        self.sink.emit(&event);
        self.events.push(event);
    }
}

/// The scaling decision engine.
#[derive(Clone)]
pub struct Autoscaler {
    state: Arc<dyn StateBackend>,
    requester: Arc<dyn CapacityRequester>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    locks: InstanceLocks,
}

impl Autoscaler {
    /// Create an autoscaler using the system clock and logging events via `tracing`.
    pub fn new(state: Arc<dyn StateBackend>, requester: Arc<dyn CapacityRequester>) -> Self {
        Self {
            state,
            requester,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            locks: InstanceLocks::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run one decision to a terminal state.
    ///
    /// Returns the report for `NO_OP`, `COOLDOWN_BLOCKED` and `DONE`. A
    /// failure to read state, resize, or write state ends in `FAILED` and is
    /// returned as an error. State is only written after the control plane
    /// accepted the resize.
    pub async fn process(&self, request: &ScalingRequest) -> ScaleResult<DecisionReport> {
        let instance = request.instance.table_key();
        let mut rec = Recorder {
            sink: self.sink.as_ref(),
            events: Vec::new(),
        };

        rec.emit(DecisionEvent::Received {
            instance: instance.clone(),
            current: request.current,
            method: request.method,
        });
        for warning in &request.warnings {
            match warning {
                RequestWarning::UnknownScalingMethod {
                    requested,
                    fallback,
                } => rec.emit(DecisionEvent::MethodFallback {
                    instance: instance.clone(),
                    requested: requested.clone(),
                    fallback: *fallback,
                }),
            }
        }

        let current_size = request.current_size();
        let suggested_size = methods::suggest_size(request);
        let suggested = request.current.with_size(suggested_size);
        rec.emit(DecisionEvent::SizeComputed {
            instance: instance.clone(),
            method: request.method,
            current_size,
            suggested_size,
        });

        if suggested_size == current_size {
            rec.emit(DecisionEvent::NoOp {
                instance: instance.clone(),
                size: current_size,
            });
            return Ok(report(request, suggested, DecisionState::NoOp, None, rec.events));
        }

        let _guard = self.locks.acquire(&instance).await;

        let stored = match self.state.get_state(&instance) {
            Ok(stored) => stored,
            Err(source) => {
                rec.emit(DecisionEvent::Failed {
                    instance: instance.clone(),
                    attempted: suggested,
                    stage: FailureStage::StateRead,
                    error: source.to_string(),
                });
                return Err(ScaleError::StateRead { instance, source });
            }
        };

        let now = self.clock.now_millis();
        let cooldown = cooldown::evaluate(
            request,
            stored.last_scaling_timestamp,
            suggested_size,
            now,
        );
        if cooldown.blocked {
            rec.emit(DecisionEvent::CooldownBlocked {
                instance: instance.clone(),
                suggested_size,
                cooldown,
            });
            return Ok(report(
                request,
                suggested,
                DecisionState::CooldownBlocked,
                Some(cooldown),
                rec.events,
            ));
        }

        rec.emit(DecisionEvent::Acting {
            instance: instance.clone(),
            from: request.current,
            to: suggested,
            cooldown,
        });

        if let Err(source) = self.requester.resize(&request.instance, suggested).await {
            rec.emit(DecisionEvent::Failed {
                instance: instance.clone(),
                attempted: suggested,
                stage: FailureStage::Resize,
                error: source.to_string(),
            });
            return Err(ScaleError::Resize {
                instance,
                attempted: suggested,
                source,
            });
        }

        let record = ScalingRecord {
            instance_key: instance.clone(),
            timestamp: self.clock.now_millis(),
            from_size: current_size,
            to_size: suggested_size,
            units: request.unit(),
            method: request.method,
        };
        if let Err(source) = self.state.set_state(&record) {
            rec.emit(DecisionEvent::Failed {
                instance: instance.clone(),
                attempted: suggested,
                stage: FailureStage::StateWrite,
                error: source.to_string(),
            });
            return Err(ScaleError::StateWrite {
                instance,
                attempted: suggested,
                source,
            });
        }

        rec.emit(DecisionEvent::Done {
            instance: instance.clone(),
            from: request.current,
            to: suggested,
            timestamp: record.timestamp,
        });
        Ok(report(
            request,
            suggested,
            DecisionState::Done,
            Some(cooldown),
            rec.events,
        ))
    }
}

fn report(
    request: &ScalingRequest,
    suggested: Capacity,
    state: DecisionState,
    cooldown: Option<CooldownDecision>,
    events: Vec<DecisionEvent>,
) -> DecisionReport {
    DecisionReport {
        instance: request.instance.table_key(),
        state,
        method: request.method,
        current: request.current,
        suggested,
        cooldown,
        events,
    }
}
