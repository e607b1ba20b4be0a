//! The capacity-change seam to the database control plane.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use dbscale_core::{Capacity, InstanceKey};

/// Boxed future returned by [`CapacityRequester::resize`].
pub type ResizeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RequesterError>> + Send + 'a>>;

/// Why the control plane did not accept a resize.
#[derive(Debug, Error)]
pub enum RequesterError {
    #[error("control plane rejected resize (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("control plane unreachable: {0}")]
    Transport(String),

    #[error("resize request timed out after {0:?}")]
    Timeout(Duration),
}

/// Issues capacity changes against the control plane.
///
/// `resize` resolves once the request has been accepted, not when the
/// change has finished. Implementations must not retry.
pub trait CapacityRequester: Send + Sync {
    fn resize<'a>(&'a self, instance: &'a InstanceKey, target: Capacity) -> ResizeFuture<'a>;
}
