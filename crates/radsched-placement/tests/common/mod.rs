//! Common test utilities for placement integration tests.

#![allow(dead_code)]

pub mod fixtures;

use radsched_placement::store::memory::{
    MemoryConsistencyStore, MemoryEpsilonStore, StaticLatencyProvider,
};
use radsched_placement::store::{ConsistencyStore, EpsilonStore};
use radsched_placement::{
    ConsistencyRecord, DataSource, LatencyTable, PlacementEngine, PlacementError, RandomSource,
    Result, SchedulerConfig,
};
use std::sync::Arc;

/// Complete test engine with in-memory stores wired together.
pub struct TestEngine {
    pub latency: Arc<StaticLatencyProvider>,
    pub epsilons: Arc<MemoryEpsilonStore>,
    pub consistency: Arc<MemoryConsistencyStore>,
    pub engine: PlacementEngine,
}

impl TestEngine {
    /// Creates a test engine with default configuration.
    pub fn new(table: LatencyTable) -> Self {
        Self::with_config(table, &SchedulerConfig::default())
    }

    /// Creates a test engine with custom configuration.
    pub fn with_config(table: LatencyTable, config: &SchedulerConfig) -> Self {
        let latency = Arc::new(StaticLatencyProvider::new(table));
        let epsilons = Arc::new(MemoryEpsilonStore::new());
        let consistency = Arc::new(MemoryConsistencyStore::new());

        let engine = PlacementEngine::new(
            config,
            latency.clone(),
            epsilons.clone(),
            consistency.clone(),
        )
        .unwrap();

        Self {
            latency,
            epsilons,
            consistency,
            engine,
        }
    }

    /// Creates a test engine whose experiment nodes are `nodes`.
    pub fn with_experiment_nodes(table: LatencyTable, nodes: &[&str]) -> Self {
        let mut config = SchedulerConfig::default();
        config.experiment.nodes = nodes.iter().map(|n| (*n).to_owned()).collect();
        Self::with_config(table, &config)
    }

    /// Replaces the exploration random source.
    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.engine = self.engine.with_random(random);
        self
    }
}

/// Epsilon store that is always unreachable.
pub struct UnreachableEpsilonStore;

impl EpsilonStore for UnreachableEpsilonStore {
    fn load(&self, _function: &str, _initial: f64) -> Result<f64> {
        Err(PlacementError::unavailable(DataSource::EpsilonStore, "connection refused"))
    }

    fn save(&self, _function: &str, _epsilon: f64) -> Result<()> {
        Err(PlacementError::unavailable(DataSource::EpsilonStore, "connection refused"))
    }
}

/// Consistency store that is always unreachable.
pub struct UnreachableConsistencyStore;

impl ConsistencyStore for UnreachableConsistencyStore {
    fn function_record(&self, _function: &str) -> Result<Option<ConsistencyRecord>> {
        Err(PlacementError::unavailable(DataSource::ConsistencyStore, "timed out"))
    }

    fn edge_record(&self, _edge: &str, _function: &str) -> Result<Option<ConsistencyRecord>> {
        Err(PlacementError::unavailable(DataSource::ConsistencyStore, "timed out"))
    }
}
