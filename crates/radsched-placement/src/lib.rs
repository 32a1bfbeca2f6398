//! Radsched placement - edge or datacenter placement for serverless functions.
//!
//! The engine decides, per invocation, whether a function should run in its
//! home datacenter or on a network-proximate edge node:
//!
//! - **Unweighted placement**: deterministic minimum predicted latency
//! - **Weighted placement**: epsilon-greedy exploration over a configured set
//!   of experiment nodes, exploiting by latency penalised with each edge's
//!   observed failure rate
//! - **Epsilon control**: per-function exploration rate adapted from success
//!   rates with one of four strategies
//!
//! # Data sources
//!
//! Latency tables, function descriptors, exploration rates and consistency
//! counters sit behind the traits in [`store`]. [`store::file`] keeps them as
//! JSON files; [`store::memory`] keeps them in memory.
//!
//! # Example
//!
//! ```ignore
//! use radsched_placement::{PlacementEngine, PlacementMode, SchedulerConfig};
//! use radsched_placement::store::FunctionRegistry;
//! use radsched_placement::store::file::DataDir;
//!
//! let config = SchedulerConfig::load_from("radsched.toml")?;
//! let engine = PlacementEngine::from_data_dir(&config)?;
//! let registry = DataDir::new(&config.store.data_dir).function_registry();
//! let result = engine.place_by_name(&registry, "resize", PlacementMode::Weighted)?;
//! ```

pub mod cache;
pub mod config;
pub mod consistency;
pub mod engine;
pub mod epsilon;
pub mod error;
pub mod latency;
pub mod placement;
pub mod random;
pub mod store;
pub mod types;

pub use config::SchedulerConfig;
pub use consistency::{consistency_weight, NEUTRAL_WEIGHT};
pub use engine::PlacementEngine;
pub use epsilon::{EpsilonController, EpsilonParams, EpsilonStrategy};
pub use error::{DataSource, PlacementError, Result};
pub use latency::{ExperimentNodes, LatencyTable};
pub use placement::{EpsilonGreedy, LatencyEstimate, MinLatency, PlacementAlgorithm, SiteEstimate};
pub use random::{FixedSequence, RandomSource, SeededRandom};
pub use types::{
    ConsistencyRecord, Decision, FunctionDescriptor, PlacementMode, PlacementResult,
    RegisteredFunction,
};
