//! Placement algorithms: should a function run at its home datacenter or on an edge node?
//!
//! Predicted times:
//!
//! - datacenter: `client_rtt(home) + base_execution_time`
//! - edge `e`: `client_rtt(e) + max(base_execution_time, rtt(home, e))`
//!
//! The `max` reflects that an edge invocation cannot finish before either its
//! own compute or the hop back to the datacenter for state.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::consistency::{consistency_weight, NEUTRAL_WEIGHT};
use crate::epsilon::{EpsilonController, EpsilonStrategy};
use crate::error::{PlacementError, Result};
use crate::latency::{ExperimentNodes, LatencyTable};
use crate::random::RandomSource;
use crate::store::ConsistencyStore;
use crate::types::{Decision, FunctionDescriptor, PlacementResult};

/// Trait for placement algorithms.
pub trait PlacementAlgorithm: Send + Sync {
    /// Chooses a site for `descriptor` given a latency snapshot.
    fn place(&self, descriptor: &FunctionDescriptor, table: &LatencyTable) -> Result<PlacementResult>;

    /// Returns the algorithm name.
    fn name(&self) -> &'static str;
}

/// Predicted end-to-end time at one site.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteEstimate {
    pub site: String,
    pub time_ms: f64,
}

impl SiteEstimate {
    fn into_result(self, decision: Decision) -> PlacementResult {
        PlacementResult {
            chosen_site: self.site,
            predicted_execution_time_ms: self.time_ms,
            decision,
        }
    }

    /// Lower time first, then lexicographic site name.
    fn cmp_time(&self, other: &Self) -> Ordering {
        self.time_ms
            .total_cmp(&other.time_ms)
            .then_with(|| self.site.cmp(&other.site))
    }
}

/// Predicted times for the home datacenter and every reachable edge node.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyEstimate {
    pub datacenter: SiteEstimate,
    /// Ordered by site name.
    pub edges: Vec<SiteEstimate>,
}

impl LatencyEstimate {
    /// Computes predicted times from a latency snapshot.
    ///
    /// Edge candidates are nodes with both a client round trip and a round
    /// trip to the home datacenter; the home datacenter itself is never an
    /// edge. Fails if the home datacenter has no client round trip or the
    /// execution time is negative or not finite.
    pub fn compute(descriptor: &FunctionDescriptor, table: &LatencyTable) -> Result<Self> {
        let home = descriptor.home_datacenter();
        let base = descriptor.base_execution_time_ms();

        if !base.is_finite() || base < 0.0 {
            return Err(PlacementError::InvalidFunction {
                name: descriptor.name().to_owned(),
                reason: format!("execution time {base} ms must be a non-negative number"),
            });
        }

        let home_rtt = table
            .client_rtt(home)
            .ok_or_else(|| PlacementError::MissingDatacenterLatency {
                function: descriptor.name().to_owned(),
                datacenter: home.to_owned(),
            })?;

        let edges = table
            .datacenter_row(home)
            .map(|row| {
                row.iter()
                    .filter(|(node, _)| node.as_str() != home)
                    .filter_map(|(node, hop)| {
                        table.client_rtt(node).map(|client| SiteEstimate {
                            site: node.clone(),
                            time_ms: client + base.max(*hop),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            datacenter: SiteEstimate {
                site: home.to_owned(),
                time_ms: home_rtt + base,
            },
            edges,
        })
    }

    /// Minimum-latency site. Ties with the datacenter go to the datacenter.
    #[must_use]
    pub fn fastest(&self) -> PlacementResult {
        match self.edges.iter().min_by(|a, b| a.cmp_time(b)) {
            Some(edge) if edge.time_ms < self.datacenter.time_ms => {
                edge.clone().into_result(Decision::Fastest)
            }
            _ => self.stay_in_datacenter(),
        }
    }

    /// Edges strictly faster than the datacenter, ordered by site name.
    #[must_use]
    pub fn eligible(&self) -> Vec<&SiteEstimate> {
        self.edges
            .iter()
            .filter(|edge| edge.time_ms < self.datacenter.time_ms)
            .collect()
    }

    /// The home datacenter as a result.
    #[must_use]
    pub fn stay_in_datacenter(&self) -> PlacementResult {
        self.datacenter.clone().into_result(Decision::Datacenter)
    }
}

/// Picks the candidate minimising `time_ms * weight`.
///
/// Equal scores go to the lower raw time, then to the lexicographically
/// smaller site name.
pub fn select_exploit<'a, I>(candidates: I) -> Option<&'a SiteEstimate>
where
    I: IntoIterator<Item = (&'a SiteEstimate, f64)>,
{
    candidates
        .into_iter()
        .map(|(site, weight)| (site, site.time_ms * weight))
        .min_by(|(a, a_score), (b, b_score)| a_score.total_cmp(b_score).then_with(|| a.cmp_time(b)))
        .map(|(site, _)| site)
}

/// Deterministic minimum-latency placement.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinLatency;

impl PlacementAlgorithm for MinLatency {
    fn place(&self, descriptor: &FunctionDescriptor, table: &LatencyTable) -> Result<PlacementResult> {
        Ok(LatencyEstimate::compute(descriptor, table)?.fastest())
    }

    fn name(&self) -> &'static str {
        "min_latency"
    }
}

/// Epsilon-greedy placement over experiment nodes, weighted by consistency.
///
/// Each call advances the function's exploration rate, so repeated calls with
/// the same inputs are not idempotent.
pub struct EpsilonGreedy {
    controller: EpsilonController,
    consistency: Arc<dyn ConsistencyStore>,
    experiment: ExperimentNodes,
    strategy: EpsilonStrategy,
    random: Mutex<Box<dyn RandomSource>>,
}

impl EpsilonGreedy {
    /// Creates an epsilon-greedy placer.
    pub fn new(
        controller: EpsilonController,
        consistency: Arc<dyn ConsistencyStore>,
        experiment: ExperimentNodes,
        strategy: EpsilonStrategy,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            controller,
            consistency,
            experiment,
            strategy,
            random: Mutex::new(random),
        }
    }

    /// Replaces the random source.
    #[must_use]
    pub fn with_random(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = Mutex::new(random);
        self
    }

    /// The exploration-rate controller.
    #[must_use]
    pub const fn controller(&self) -> &EpsilonController {
        &self.controller
    }

    /// The epsilon update strategy.
    #[must_use]
    pub const fn strategy(&self) -> EpsilonStrategy {
        self.strategy
    }

    /// The candidate nodes.
    #[must_use]
    pub const fn experiment(&self) -> &ExperimentNodes {
        &self.experiment
    }

    /// Advances and returns the exploration rate, falling back to the initial rate.
    fn exploration_rate(&self, function: &str) -> f64 {
        match self.controller.advance(function, self.strategy) {
            Ok(epsilon) => epsilon,
            Err(e) => {
                let fallback = self.controller.params().init;
                warn!(
                    function = %function,
                    error = %e,
                    epsilon = fallback,
                    "Epsilon unavailable, using initial rate"
                );
                fallback
            }
        }
    }

    fn edge_weight(&self, edge: &str, function: &str) -> f64 {
        match self.consistency.edge_record(edge, function) {
            Ok(record) => consistency_weight(record.as_ref()),
            Err(e) => {
                warn!(
                    function = %function,
                    edge = %edge,
                    error = %e.for_function(function),
                    "Consistency unavailable, using neutral weight"
                );
                NEUTRAL_WEIGHT
            }
        }
    }
}

impl std::fmt::Debug for EpsilonGreedy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpsilonGreedy")
            .field("strategy", &self.strategy)
            .field("experiment", &self.experiment)
            .finish_non_exhaustive()
    }
}

impl PlacementAlgorithm for EpsilonGreedy {
    fn place(&self, descriptor: &FunctionDescriptor, table: &LatencyTable) -> Result<PlacementResult> {
        let function = descriptor.name();
        let restricted = table.restricted_to(&self.experiment, descriptor.home_datacenter());
        let estimate = LatencyEstimate::compute(descriptor, &restricted)?;

        let eligible = estimate.eligible();
        if eligible.is_empty() {
            debug!(function = %function, "No experiment node beats the datacenter");
            return Ok(estimate.stay_in_datacenter());
        }

        let epsilon = self.exploration_rate(function);

        let (draw, explore_index) = {
            let mut random = self.random.lock();
            let draw = random.next_unit();
            let index = (draw < epsilon).then(|| random.next_index(eligible.len()) % eligible.len());
            (draw, index)
        };

        let (chosen, decision) = match explore_index {
            Some(index) => (eligible[index], Decision::Explore),
            None => {
                let weighted = eligible
                    .iter()
                    .map(|edge| (*edge, self.edge_weight(&edge.site, function)));
                let Some(best) = select_exploit(weighted) else {
                    return Ok(estimate.stay_in_datacenter());
                };
                (best, Decision::Exploit)
            }
        };

        debug!(
            function = %function,
            epsilon,
            draw,
            eligible = eligible.len(),
            decision = decision.as_str(),
            site = %chosen.site,
            "Weighted placement"
        );

        Ok(chosen.clone().into_result(decision))
    }

    fn name(&self) -> &'static str {
        "epsilon_greedy"
    }
}
