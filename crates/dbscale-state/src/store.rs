//! StateStore — redb-backed scaling memory.
//!
//! Provides the per-instance `AutoscalerState` record and the scaling
//! history. All values are JSON-serialized into redb's `&[u8]` value
//! columns. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::backend::StateBackend;
use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(AUTOSCALER_STATE).map_err(map_err!(Table))?;
        txn.open_table(SCALING_HISTORY).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Autoscaler state ───────────────────────────────────────────

    /// Get the state for an instance, or an empty state if it was never scaled.
    pub fn get_state(&self, instance_key: &str) -> StateResult<AutoscalerState> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(AUTOSCALER_STATE).map_err(map_err!(Table))?;
        match table.get(instance_key).map_err(map_err!(Read))? {
            Some(guard) => {
                let state: AutoscalerState =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(state)
            }
            None => Ok(AutoscalerState::empty(instance_key)),
        }
    }

    /// Store a scaling action: the new state and its history entry commit
    /// together or not at all.
    pub fn set_state(&self, record: &ScalingRecord) -> StateResult<()> {
        let state = record.to_state();
        let state_value = serde_json::to_vec(&state).map_err(map_err!(Serialize))?;
        let history_value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(AUTOSCALER_STATE).map_err(map_err!(Table))?;
            table
                .insert(record.instance_key.as_str(), state_value.as_slice())
                .map_err(map_err!(Write))?;

            let mut history = txn.open_table(SCALING_HISTORY).map_err(map_err!(Table))?;
            history
                .insert(record.history_key(), history_value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            instance = %record.instance_key,
            timestamp = record.timestamp,
            size = record.to_size,
            "autoscaler state stored"
        );
        Ok(())
    }

    /// List the state of every instance that has been scaled.
    pub fn list_states(&self) -> StateResult<Vec<AutoscalerState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(AUTOSCALER_STATE).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let state: AutoscalerState =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(state);
        }
        Ok(results)
    }

    /// Forget an instance's state. History is kept. Returns true if it existed.
    pub fn delete_state(&self, instance_key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(AUTOSCALER_STATE).map_err(map_err!(Table))?;
            existed = table.remove(instance_key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance = %instance_key, existed, "autoscaler state deleted");
        Ok(existed)
    }

    // ── History ────────────────────────────────────────────────────

    /// Most recent scaling actions for an instance, newest first.
    pub fn list_history(&self, instance_key: &str, limit: usize) -> StateResult<Vec<ScalingRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCALING_HISTORY).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range((instance_key, 0u64)..=(instance_key, u64::MAX))
            .map_err(map_err!(Read))?
            .rev()
        {
            if results.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ScalingRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }
}

impl StateBackend for StateStore {
    fn get_state(&self, instance_key: &str) -> StateResult<AutoscalerState> {
        StateStore::get_state(self, instance_key)
    }

    fn set_state(&self, record: &ScalingRecord) -> StateResult<()> {
        StateStore::set_state(self, record)
    }
}
