//! The storage seam used by the decision engine.

use crate::error::StateResult;
use crate::types::{AutoscalerState, ScalingRecord};

/// Durable per-instance scaling memory.
///
/// `get_state` never fails for an unknown instance; it returns
/// [`AutoscalerState::empty`]. `set_state` must surface every storage
/// failure to the caller.
pub trait StateBackend: Send + Sync {
    fn get_state(&self, instance_key: &str) -> StateResult<AutoscalerState>;

    /// Record a successful scaling action as the instance's new state.
    fn set_state(&self, record: &ScalingRecord) -> StateResult<()>;
}
