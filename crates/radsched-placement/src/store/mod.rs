//! Data sources consulted by the placement engine.
//!
//! Every collaborator sits behind a small synchronous trait so the engine can
//! run against JSON files on disk, in-memory maps, or test doubles that fail
//! on demand. Implementations report read failures as
//! [`PlacementError::DataUnavailable`](crate::PlacementError::DataUnavailable).

pub mod file;
pub mod memory;

use std::sync::Arc;

use crate::error::Result;
use crate::latency::LatencyTable;
use crate::types::{ConsistencyRecord, FunctionDescriptor};

/// Source of client→node and node→datacenter round-trip times.
pub trait LatencyProvider: Send + Sync {
    /// Returns the current latency snapshot.
    fn latency_table(&self) -> Result<Arc<LatencyTable>>;
}

/// Registered function descriptors, keyed by lowercase name.
pub trait FunctionRegistry: Send + Sync {
    /// Looks up a function. Unknown names are `FunctionNotFound`.
    fn get(&self, name: &str) -> Result<FunctionDescriptor>;

    /// Lists every registered function, ordered by name.
    fn list(&self) -> Result<Vec<FunctionDescriptor>>;

    /// Inserts or replaces a function. Returns true if an entry was replaced.
    fn upsert(&self, descriptor: FunctionDescriptor) -> Result<bool>;

    /// Replaces the whole registry.
    fn replace_all(&self, descriptors: Vec<FunctionDescriptor>) -> Result<()>;
}

/// Persisted per-function exploration rates.
pub trait EpsilonStore: Send + Sync {
    /// Returns the stored rate, registering `initial` for unseen functions.
    fn load(&self, function: &str, initial: f64) -> Result<f64>;

    /// Stores a new rate.
    fn save(&self, function: &str, epsilon: f64) -> Result<()>;
}

/// Attempt/success/failure counters.
///
/// `Ok(None)` means no record exists; it is not an error.
pub trait ConsistencyStore: Send + Sync {
    /// Counters for a function across all sites.
    fn function_record(&self, function: &str) -> Result<Option<ConsistencyRecord>>;

    /// Counters for a function on one edge node.
    fn edge_record(&self, edge: &str, function: &str) -> Result<Option<ConsistencyRecord>>;
}

impl<T: LatencyProvider + ?Sized> LatencyProvider for Arc<T> {
    fn latency_table(&self) -> Result<Arc<LatencyTable>> {
        (**self).latency_table()
    }
}
