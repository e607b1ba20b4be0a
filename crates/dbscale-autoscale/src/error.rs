//! Errors that end a decision in the FAILED state.

use thiserror::Error;

use dbscale_core::Capacity;
use dbscale_state::StateError;

use crate::requester::RequesterError;

/// A decision that could not be completed. Carries enough context to audit
/// which instance and size were involved.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("reading autoscaler state for {instance} failed: {source}")]
    StateRead { instance: String, source: StateError },

    #[error("resizing {instance} to {attempted} failed: {source}")]
    Resize {
        instance: String,
        attempted: Capacity,
        source: RequesterError,
    },

    #[error("resize of {instance} to {attempted} was accepted but storing state failed: {source}")]
    StateWrite {
        instance: String,
        attempted: Capacity,
        source: StateError,
    },
}

pub type ScaleResult<T> = Result<T, ScaleError>;
