//! Placement engine: loads data, dispatches to an algorithm, reports the decision.

use std::sync::Arc;
use tracing::info;

use crate::cache::CachedLatencyProvider;
use crate::config::SchedulerConfig;
use crate::epsilon::EpsilonController;
use crate::error::Result;
use crate::latency::LatencyTable;
use crate::placement::{EpsilonGreedy, MinLatency, PlacementAlgorithm};
use crate::random::{RandomSource, SeededRandom};
use crate::store::file::DataDir;
use crate::store::{ConsistencyStore, EpsilonStore, FunctionRegistry, LatencyProvider};
use crate::types::{FunctionDescriptor, PlacementMode, PlacementResult};

/// Entry point for placement decisions.
pub struct PlacementEngine {
    latency: Arc<dyn LatencyProvider>,
    unweighted: MinLatency,
    weighted: EpsilonGreedy,
}

impl PlacementEngine {
    /// Creates an engine over the given data sources.
    ///
    /// Fails on an unknown strategy, a malformed experiment node list or
    /// incoherent epsilon bounds.
    pub fn new(
        config: &SchedulerConfig,
        latency: Arc<dyn LatencyProvider>,
        epsilons: Arc<dyn EpsilonStore>,
        consistency: Arc<dyn ConsistencyStore>,
    ) -> Result<Self> {
        let strategy = config.exploration.strategy()?;
        let experiment = config.experiment.nodes()?;
        let controller =
            EpsilonController::new(config.exploration.params(), epsilons, consistency.clone())?;
        let random = SeededRandom::from_optional_seed(config.exploration.seed);

        info!(
            strategy = %strategy,
            experiment_nodes = experiment.len(),
            seeded = config.exploration.seed.is_some(),
            "Placement engine configured"
        );

        Ok(Self {
            latency,
            unweighted: MinLatency,
            weighted: EpsilonGreedy::new(
                controller,
                consistency,
                experiment,
                strategy,
                Box::new(random),
            ),
        })
    }

    /// Creates an engine over the JSON files in the configured data directory.
    ///
    /// Latency and consistency snapshots are cached for `store.cache_ttl`.
    pub fn from_data_dir(config: &SchedulerConfig) -> Result<Self> {
        let data = DataDir::new(&config.store.data_dir);
        let ttl = config.store.cache_ttl;

        Self::new(
            config,
            Arc::new(CachedLatencyProvider::new(data.latency_provider(), ttl)),
            Arc::new(data.epsilon_store()),
            Arc::new(data.consistency_store(ttl)),
        )
    }

    /// Replaces the exploration random source.
    #[must_use]
    pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
        self.weighted = self.weighted.with_random(Box::new(random));
        self
    }

    /// The weighted placement algorithm.
    #[must_use]
    pub const fn weighted(&self) -> &EpsilonGreedy {
        &self.weighted
    }

    /// Deterministic minimum-latency placement.
    ///
    /// Fails if the latency table cannot be loaded.
    pub fn place_unweighted(&self, descriptor: &FunctionDescriptor) -> Result<PlacementResult> {
        self.decide(&self.unweighted, descriptor)
    }

    /// Epsilon-greedy placement with consistency weighting.
    ///
    /// Fails if the latency table cannot be loaded. Epsilon and consistency
    /// failures degrade to defaults. Advances the function's exploration rate.
    pub fn place_weighted(&self, descriptor: &FunctionDescriptor) -> Result<PlacementResult> {
        self.decide(&self.weighted, descriptor)
    }

    /// Places a function in the requested mode.
    pub fn place(
        &self,
        descriptor: &FunctionDescriptor,
        mode: PlacementMode,
    ) -> Result<PlacementResult> {
        match mode {
            PlacementMode::Unweighted => self.place_unweighted(descriptor),
            PlacementMode::Weighted => self.place_weighted(descriptor),
        }
    }

    /// Looks a function up by name and places it.
    ///
    /// An unregistered name is `FunctionNotFound`.
    pub fn place_by_name(
        &self,
        registry: &dyn FunctionRegistry,
        name: &str,
        mode: PlacementMode,
    ) -> Result<PlacementResult> {
        let descriptor = registry.get(name)?;
        self.place(&descriptor, mode)
    }

    fn latency_table(&self, function: &str) -> Result<Arc<LatencyTable>> {
        self.latency
            .latency_table()
            .map_err(|e| e.for_function(function))
    }

    fn decide(
        &self,
        algorithm: &dyn PlacementAlgorithm,
        descriptor: &FunctionDescriptor,
    ) -> Result<PlacementResult> {
        let table = self.latency_table(descriptor.name())?;
        let result = algorithm.place(descriptor, &table)?;

        info!(
            function = %descriptor.name(),
            algorithm = algorithm.name(),
            site = %result.chosen_site,
            predicted_ms = result.predicted_execution_time_ms,
            decision = result.decision.as_str(),
            "Placement decided"
        );

        Ok(result)
    }
}

impl std::fmt::Debug for PlacementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementEngine")
            .field("weighted", &self.weighted)
            .finish_non_exhaustive()
    }
}
