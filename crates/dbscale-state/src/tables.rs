//! redb table definitions for the dbscale state store.
//!
//! Values are `&[u8]` (JSON-serialized records).

use redb::TableDefinition;

/// Last scaling action per instance, keyed by `projects/{p}/instances/{i}`.
pub const AUTOSCALER_STATE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("autoscaler_state");

/// Scaling history keyed by `(instance_key, timestamp)`.
pub const SCALING_HISTORY: TableDefinition<(&str, u64), &[u8]> =
    TableDefinition::new("scaling_history");
