//! Adaptive exploration rate (epsilon) per function.
//!
//! Every update is a pure function of the previous rate, the function's
//! success rate and (for some strategies) its attempt count, clamped to
//! `[epsilon_min, epsilon_max]`. [`EpsilonController`] wraps the update in a
//! per-function critical section so concurrent placements of the same
//! function never lose an update.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{PlacementError, Result};
use crate::store::{ConsistencyStore, EpsilonStore};

/// Epsilon update strategies.
///
/// `Eds` and `Asa` come from an earlier generation of the controller and are
/// kept as experimental options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpsilonStrategy {
    /// `1 - success_rate`, ignoring the previous rate.
    Adaptive,
    /// Exponential moving average towards `1 - success_rate`.
    Smooth,
    /// Exponential decay scaling over attempts, modulated by failure rate.
    Eds,
    /// Adaptive simulated annealing; never increases the rate.
    Asa,
}

impl EpsilonStrategy {
    /// All strategies.
    pub const ALL: [Self; 4] = [Self::Adaptive, Self::Smooth, Self::Eds, Self::Asa];

    /// Returns the strategy name as used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Adaptive => "adaptive",
            Self::Smooth => "smooth",
            Self::Eds => "eds",
            Self::Asa => "asa",
        }
    }

    /// Computes the next rate, clamped to the configured bounds.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn next(self, params: &EpsilonParams, previous: f64, success_rate: f64, attempts: u64) -> f64 {
        let success_rate = success_rate.clamp(0.0, 1.0);
        let failure_rate = 1.0 - success_rate;
        let attempts = attempts as f64;

        let raw = match self {
            Self::Adaptive => failure_rate,
            Self::Smooth => previous + params.alpha * (failure_rate - previous),
            Self::Eds => {
                let decay = (-params.decay_rate * (attempts + params.smoothing * failure_rate)).exp();
                params.min + (params.max - params.min) * decay
            }
            Self::Asa => previous * (-params.decay_rate * attempts * success_rate).exp(),
        };

        params.clamp(raw)
    }
}

impl fmt::Display for EpsilonStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpsilonStrategy {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adaptive" => Ok(Self::Adaptive),
            "smooth" => Ok(Self::Smooth),
            "eds" => Ok(Self::Eds),
            "asa" => Ok(Self::Asa),
            other => Err(PlacementError::Config(format!(
                "invalid epsilon adjustment method: {other}"
            ))),
        }
    }
}

/// Numeric parameters shared by all strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonParams {
    /// Rate assigned to functions seen for the first time.
    pub init: f64,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Smooth learning rate.
    pub alpha: f64,
    /// EDS/ASA decay rate (lambda).
    pub decay_rate: f64,
    /// EDS failure-rate smoothing factor (gamma).
    pub smoothing: f64,
}

impl Default for EpsilonParams {
    fn default() -> Self {
        Self {
            init: 0.5,
            min: 0.1,
            max: 0.9,
            alpha: 0.3,
            decay_rate: 0.005,
            smoothing: 5.0,
        }
    }
}

impl EpsilonParams {
    /// Checks `0 <= min <= init <= max <= 1`, `0 < alpha <= 1` and non-negative decay terms.
    pub fn validate(&self) -> Result<()> {
        let all_finite = [
            self.init,
            self.min,
            self.max,
            self.alpha,
            self.decay_rate,
            self.smoothing,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !all_finite {
            return Err(PlacementError::Config(
                "epsilon parameters must be finite".to_owned(),
            ));
        }
        if !(0.0 <= self.min && self.min <= self.init && self.init <= self.max && self.max <= 1.0) {
            return Err(PlacementError::Config(format!(
                "epsilon bounds must satisfy 0 <= min ({}) <= init ({}) <= max ({}) <= 1",
                self.min, self.init, self.max
            )));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(PlacementError::Config(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if self.decay_rate < 0.0 || self.smoothing < 0.0 {
            return Err(PlacementError::Config(
                "decay_rate and smoothing must be non-negative".to_owned(),
            ));
        }
        Ok(())
    }

    /// Clamps a rate to `[min, max]`. NaN maps to the clamped initial rate.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.init.clamp(self.min, self.max)
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Reads, advances and persists per-function exploration rates.
pub struct EpsilonController {
    params: EpsilonParams,
    epsilons: Arc<dyn EpsilonStore>,
    consistency: Arc<dyn ConsistencyStore>,
    /// One update lock per function ever advanced. Entries are never
    /// removed, so the map grows with the number of distinct functions.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EpsilonController {
    /// Creates a controller. Fails if the parameters are incoherent.
    pub fn new(
        params: EpsilonParams,
        epsilons: Arc<dyn EpsilonStore>,
        consistency: Arc<dyn ConsistencyStore>,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            epsilons,
            consistency,
            locks: DashMap::new(),
        })
    }

    /// Returns the parameters.
    #[must_use]
    pub const fn params(&self) -> &EpsilonParams {
        &self.params
    }

    /// Returns the stored rate, registering the initial rate for unseen functions.
    pub fn current(&self, function: &str) -> Result<f64> {
        self.epsilons
            .load(function, self.params.init)
            .map_err(|e| e.for_function(function))
    }

    /// Advances the rate for `function` with `strategy` and persists it.
    ///
    /// Returns the stored rate unchanged when the function has no recorded
    /// attempts, or when the consistency store cannot be read.
    pub fn advance(&self, function: &str, strategy: EpsilonStrategy) -> Result<f64> {
        let lock = self.lock_for(function);
        let _guard = lock.lock();

        let current = self.current(function)?;

        let record = match self.consistency.function_record(function) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    function = %function,
                    error = %e,
                    "Consistency data unavailable, keeping epsilon"
                );
                return Ok(current);
            }
        };

        let Some((success_rate, attempts)) =
            record.and_then(|r| r.success_rate().map(|rate| (rate, r.num_attempts)))
        else {
            debug!(function = %function, epsilon = current, "No attempts recorded, keeping epsilon");
            return Ok(current);
        };

        let next = strategy.next(&self.params, current, success_rate, attempts);
        self.epsilons
            .save(function, next)
            .map_err(|e| e.for_function(function))?;

        debug!(
            function = %function,
            strategy = %strategy,
            previous = current,
            epsilon = next,
            success_rate,
            attempts,
            "Epsilon advanced"
        );

        Ok(next)
    }

    fn lock_for(&self, function: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(function.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl fmt::Debug for EpsilonController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpsilonController")
            .field("params", &self.params)
            .field("tracked_functions", &self.locks.len())
            .finish_non_exhaustive()
    }
}
