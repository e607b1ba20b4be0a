//! dbscale-control — capacity requesters for the decision engine.
//!
//! [`HttpCapacityRequester`] sends one `PATCH` per resize to the instance
//! admin endpoint and treats any 2xx as accepted. [`DryRunRequester`] only
//! logs what would have been sent.

pub mod client;

pub use client::{DryRunRequester, HttpCapacityRequester, resize_body};
