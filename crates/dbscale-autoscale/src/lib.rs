//! dbscale-autoscale — the scaling decision engine.
//!
//! Takes one validated [`ScalingRequest`](dbscale_core::ScalingRequest),
//! computes a suggested size, checks the cooldown window against the
//! instance's stored state, and when the action is allowed asks the control
//! plane for the new capacity and records it.
//!
//! # Decision flow
//!
//! ```text
//! RECEIVED ─► SIZE_COMPUTED ─┬─► NO_OP             suggested == current
//!                            ├─► COOLDOWN_BLOCKED  elapsed < cooldown
//!                            └─► ACTING ─┬─► DONE    resize accepted, state written
//!                                        └─► FAILED  resize or state write failed
//! ```
//!
//! # Scaling methods
//!
//! ```text
//! DIRECT    max over metrics of ceil(current * value / threshold)
//! LINEAR    same ratio, but only for metrics outside threshold ± margin;
//!           storage never scales in; scale-in capped by scaleInLimit
//! STEPWISE  current ± step for metrics outside threshold ± margin
//! ```
//!
//! Every result is rounded up to a valid size for the unit and clamped to
//! the request's min/max.
//!
//! # Cooldown
//!
//! The window is the scale-out or scale-in duration depending on direction,
//! or the overload duration (falling back to scale-out) when the instance is
//! overloaded. An instance that has never been scaled is never blocked, and
//! the window is over at exactly `last + cooldown`.

pub mod clock;
pub mod cooldown;
pub mod error;
pub mod events;
pub mod locks;
pub mod methods;
pub mod requester;
pub mod scaler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::{CooldownDecision, CooldownKind};
pub use error::{ScaleError, ScaleResult};
pub use events::{DecisionEvent, DecisionState, EventSink, FailureStage, TracingSink};
pub use locks::InstanceLocks;
pub use methods::SizeCalculator;
pub use requester::{CapacityRequester, RequesterError, ResizeFuture};
pub use scaler::{Autoscaler, DecisionReport};
