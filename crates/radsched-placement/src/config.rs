//! Configuration types for the placement engine and its collaborators.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::epsilon::{EpsilonParams, EpsilonStrategy};
use crate::error::{PlacementError, Result};
use crate::latency::ExperimentNodes;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "RADSCHED_";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "radsched.toml";

/// Scheduler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Exploration-rate configuration.
    pub exploration: ExplorationConfig,
    /// Candidate nodes for weighted placement.
    pub experiment: ExperimentConfig,
    /// Local persistence configuration.
    pub store: StoreConfig,
    /// Registration service configuration.
    pub registry: RegistryConfig,
    /// Remote consistency data configuration.
    pub consistency: ConsistencyConfig,
    /// Latency probe configuration.
    pub probe: ProbeConfig,
}

impl SchedulerConfig {
    /// Loads configuration from a TOML file (optional) and `RADSCHED_` environment variables.
    ///
    /// Nested keys use `__` in environment variables, e.g.
    /// `RADSCHED_EXPLORATION__STRATEGY=adaptive`.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| PlacementError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::string(content))
            .extract()
            .map_err(|e| PlacementError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the strategy name, the experiment nodes and the epsilon bounds.
    pub fn validate(&self) -> Result<()> {
        self.exploration.strategy()?;
        self.exploration.params().validate()?;
        self.experiment.nodes()?;
        Ok(())
    }
}

/// Exploration-rate configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Update strategy: `adaptive`, `smooth`, `eds` or `asa`.
    pub strategy: String,
    /// Rate assigned to functions seen for the first time.
    pub epsilon_init: f64,
    /// Lower bound of the rate.
    pub epsilon_min: f64,
    /// Upper bound of the rate.
    pub epsilon_max: f64,
    /// Learning rate of the smooth strategy.
    pub alpha: f64,
    /// Decay rate (lambda) of the EDS and ASA strategies.
    pub decay_rate: f64,
    /// Failure-rate smoothing factor (gamma) of the EDS strategy.
    pub smoothing: f64,
    /// Seed for the exploration random source. Entropy-seeded when unset.
    pub seed: Option<u64>,
}

impl ExplorationConfig {
    /// Parses the configured strategy name.
    pub fn strategy(&self) -> Result<EpsilonStrategy> {
        self.strategy.parse()
    }

    /// Returns the numeric strategy parameters.
    #[must_use]
    pub const fn params(&self) -> EpsilonParams {
        EpsilonParams {
            init: self.epsilon_init,
            min: self.epsilon_min,
            max: self.epsilon_max,
            alpha: self.alpha,
            decay_rate: self.decay_rate,
            smoothing: self.smoothing,
        }
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        let params = EpsilonParams::default();
        Self {
            strategy: EpsilonStrategy::Smooth.as_str().to_owned(),
            epsilon_init: params.init,
            epsilon_min: params.min,
            epsilon_max: params.max,
            alpha: params.alpha,
            decay_rate: params.decay_rate,
            smoothing: params.smoothing,
            seed: None,
        }
    }
}

/// Experiment-node configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Nodes eligible for weighted placement.
    pub nodes: Vec<String>,
}

impl ExperimentConfig {
    /// Validates the node list.
    pub fn nodes(&self) -> Result<ExperimentNodes> {
        ExperimentNodes::new(&self.nodes)
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            nodes: vec![
                "us-west-1".to_owned(),
                "us-east-1".to_owned(),
                "us-east-2".to_owned(),
            ],
        }
    }
}

/// Local persistence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the JSON registries and caches.
    pub data_dir: PathBuf,
    /// Maximum age of a cached latency or consistency snapshot.
    #[serde(rename = "cache_ttl_secs", deserialize_with = "serde_duration_secs::deserialize")]
    pub cache_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

/// Registration service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the registration service.
    pub url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_owned(),
            timeout_secs: 10,
        }
    }
}

/// Remote consistency data configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Endpoint returning `function -> counters`.
    pub function_url: String,
    /// Endpoint returning `edge -> function -> counters`.
    pub edge_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            function_url: "http://localhost:8000/hit_ratio/functions".to_owned(),
            edge_url: "http://localhost:8000/hit_ratio/edges".to_owned(),
            timeout_secs: 10,
        }
    }
}

/// Latency probe configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Datacenters to probe from the client and to query for edge round trips.
    pub datacenters: Vec<String>,
    /// Host probed for client round trips; `{region}` is substituted.
    pub client_host: String,
    /// TCP port probed for client round trips.
    pub client_port: u16,
    /// Endpoint returning a datacenter's node round trips; `{region}` is substituted.
    pub datacenter_url: String,
    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            datacenters: [
                "us-west-1",
                "us-east-1",
                "us-west-2",
                "us-east-2",
                "ap-east-1",
                "ap-south-1",
                "ap-northeast-1",
                "ap-northeast-2",
                "ap-northeast-3",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            client_host: "ec2.{region}.amazonaws.com".to_owned(),
            client_port: 443,
            datacenter_url: "http://localhost:8000/ping/{region}".to_owned(),
            timeout_ms: 2000,
        }
    }
}

/// Serde helper for Duration as seconds.
mod serde_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
