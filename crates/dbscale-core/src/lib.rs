//! dbscale-core — shared types for the database capacity autoscaler.
//!
//! Holds the inbound scaling request (wire form and validated form), the
//! capacity units a database can be provisioned in, the closed set of
//! scaling methods, and the `dbscale.toml` daemon configuration.

pub mod config;
pub mod error;
pub mod request;
pub mod types;

pub use config::DaemonConfig;
pub use error::{RequestError, RequestResult};
pub use request::{Metric, MetricSample, RequestWarning, ScalingRequest, ScalingRequestBody, SizeLimits};
pub use types::*;
