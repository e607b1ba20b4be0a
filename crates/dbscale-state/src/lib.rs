//! dbscale-state — durable scaling memory for the autoscaler.
//!
//! Backed by [redb](https://docs.rs/redb). One [`AutoscalerState`] record per
//! instance remembers when it was last resized; an append-only history table
//! keeps every successful action for audit.
//!
//! # Architecture
//!
//! Values are JSON-serialized into redb's `&[u8]` columns. State is keyed by
//! `projects/{project}/instances/{instance}`; history by
//! `{instance_key}:{timestamp}` so a range scan returns one instance's
//! actions in time order.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. The decision engine talks to it
//! through the [`StateBackend`] trait.

pub mod backend;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use backend::StateBackend;
pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
