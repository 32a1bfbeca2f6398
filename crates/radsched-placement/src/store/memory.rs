//! In-memory data sources, used for tests and embedding.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use super::{ConsistencyStore, EpsilonStore, FunctionRegistry, LatencyProvider};
use crate::error::{PlacementError, Result};
use crate::latency::LatencyTable;
use crate::types::{normalise_key, ConsistencyRecord, FunctionDescriptor};

/// In-memory function registry.
#[derive(Debug, Default)]
pub struct MemoryFunctionRegistry {
    functions: DashMap<String, FunctionDescriptor>,
}

impl MemoryFunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function.
    #[must_use]
    pub fn with_function(self, descriptor: FunctionDescriptor) -> Self {
        self.functions.insert(descriptor.name().to_owned(), descriptor);
        self
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionRegistry for MemoryFunctionRegistry {
    fn get(&self, name: &str) -> Result<FunctionDescriptor> {
        let key = normalise_key(name);
        self.functions
            .get(&key)
            .map(|entry| entry.clone())
            .ok_or(PlacementError::FunctionNotFound(key))
    }

    fn list(&self) -> Result<Vec<FunctionDescriptor>> {
        let mut functions: Vec<_> = self.functions.iter().map(|e| e.value().clone()).collect();
        functions.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(functions)
    }

    fn upsert(&self, descriptor: FunctionDescriptor) -> Result<bool> {
        Ok(self
            .functions
            .insert(descriptor.name().to_owned(), descriptor)
            .is_some())
    }

    fn replace_all(&self, descriptors: Vec<FunctionDescriptor>) -> Result<()> {
        self.functions.clear();
        for descriptor in descriptors {
            self.functions.insert(descriptor.name().to_owned(), descriptor);
        }
        Ok(())
    }
}

/// Latency provider serving a fixed, replaceable snapshot.
#[derive(Debug)]
pub struct StaticLatencyProvider {
    table: RwLock<Arc<LatencyTable>>,
}

impl StaticLatencyProvider {
    /// Creates a provider serving `table`.
    #[must_use]
    pub fn new(table: LatencyTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    /// Replaces the served snapshot.
    pub fn replace(&self, table: LatencyTable) {
        *self.table.write() = Arc::new(table);
    }
}

impl LatencyProvider for StaticLatencyProvider {
    fn latency_table(&self) -> Result<Arc<LatencyTable>> {
        Ok(self.table.read().clone())
    }
}

/// In-memory exploration rates.
#[derive(Debug, Default)]
pub struct MemoryEpsilonStore {
    values: DashMap<String, f64>,
}

impl MemoryEpsilonStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a rate.
    #[must_use]
    pub fn with_epsilon(self, function: &str, epsilon: f64) -> Self {
        self.values.insert(normalise_key(function), epsilon);
        self
    }

    /// Returns the stored rate without registering the function.
    #[must_use]
    pub fn get(&self, function: &str) -> Option<f64> {
        self.values.get(&normalise_key(function)).map(|v| *v)
    }
}

impl EpsilonStore for MemoryEpsilonStore {
    fn load(&self, function: &str, initial: f64) -> Result<f64> {
        Ok(*self
            .values
            .entry(normalise_key(function))
            .or_insert(initial))
    }

    fn save(&self, function: &str, epsilon: f64) -> Result<()> {
        self.values.insert(normalise_key(function), epsilon);
        Ok(())
    }
}

/// In-memory consistency counters.
#[derive(Debug, Default)]
pub struct MemoryConsistencyStore {
    functions: DashMap<String, ConsistencyRecord>,
    edges: DashMap<(String, String), ConsistencyRecord>,
}

impl MemoryConsistencyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the counters of a function.
    #[must_use]
    pub fn with_function_record(self, function: &str, record: ConsistencyRecord) -> Self {
        self.set_function_record(function, record);
        self
    }

    /// Sets the counters of a function on an edge.
    #[must_use]
    pub fn with_edge_record(self, edge: &str, function: &str, record: ConsistencyRecord) -> Self {
        self.set_edge_record(edge, function, record);
        self
    }

    /// Sets the counters of a function.
    pub fn set_function_record(&self, function: &str, record: ConsistencyRecord) {
        self.functions.insert(normalise_key(function), record);
    }

    /// Sets the counters of a function on an edge.
    pub fn set_edge_record(&self, edge: &str, function: &str, record: ConsistencyRecord) {
        self.edges
            .insert((normalise_key(edge), normalise_key(function)), record);
    }
}

impl ConsistencyStore for MemoryConsistencyStore {
    fn function_record(&self, function: &str) -> Result<Option<ConsistencyRecord>> {
        Ok(self.functions.get(&normalise_key(function)).map(|r| *r))
    }

    fn edge_record(&self, edge: &str, function: &str) -> Result<Option<ConsistencyRecord>> {
        let key = (normalise_key(edge), normalise_key(function));
        Ok(self.edges.get(&key).map(|r| *r))
    }
}
