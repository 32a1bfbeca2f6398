//! Shared data contracts: function descriptors, consistency counters and results.

use serde::{Deserialize, Serialize};

use crate::error::{PlacementError, Result};

/// A function as seen by the placement engine.
///
/// Names and datacenters are lowercased on construction; the lowercase name is
/// the function's identity everywhere else in the crate.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    name: String,
    base_execution_time_ms: f64,
    home_datacenter: String,
    url: Option<String>,
}

impl FunctionDescriptor {
    /// Creates a descriptor.
    ///
    /// `base_execution_time_ms` should be finite and non-negative; placement
    /// rejects anything else with `InvalidFunction`.
    pub fn new(
        name: impl AsRef<str>,
        base_execution_time_ms: f64,
        home_datacenter: impl AsRef<str>,
    ) -> Self {
        Self {
            name: normalise_key(name.as_ref()),
            base_execution_time_ms,
            home_datacenter: normalise_key(home_datacenter.as_ref()),
            url: None,
        }
    }

    /// Sets the function's invocation URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Lowercase function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Estimated compute time of one invocation, in milliseconds.
    #[must_use]
    pub const fn base_execution_time_ms(&self) -> f64 {
        self.base_execution_time_ms
    }

    /// Lowercase home datacenter identifier.
    #[must_use]
    pub fn home_datacenter(&self) -> &str {
        &self.home_datacenter
    }

    /// Invocation URL, if known.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Function entry in the on-disk and remote registry format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredFunction {
    pub function_name: String,
    /// Execution time as written by users, e.g. `"125ms"`.
    pub execution_time: String,
    #[serde(default)]
    pub function_url: String,
    pub datacenter: String,
}

impl TryFrom<RegisteredFunction> for FunctionDescriptor {
    type Error = PlacementError;

    fn try_from(entry: RegisteredFunction) -> Result<Self> {
        let time = parse_execution_time(&entry.execution_time).map_err(|reason| {
            PlacementError::InvalidFunction {
                name: entry.function_name.clone(),
                reason,
            }
        })?;

        let descriptor = Self::new(&entry.function_name, time, &entry.datacenter);
        if entry.function_url.is_empty() {
            Ok(descriptor)
        } else {
            Ok(descriptor.with_url(entry.function_url))
        }
    }
}

impl From<&FunctionDescriptor> for RegisteredFunction {
    fn from(descriptor: &FunctionDescriptor) -> Self {
        Self {
            function_name: descriptor.name.clone(),
            execution_time: format!("{}ms", descriptor.base_execution_time_ms),
            function_url: descriptor.url.clone().unwrap_or_default(),
            datacenter: descriptor.home_datacenter.clone(),
        }
    }
}

/// Parses an execution time such as `"125ms"`, `"125 ms"` or `"125"` into milliseconds.
pub fn parse_execution_time(raw: &str) -> std::result::Result<f64, String> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("ms").unwrap_or(trimmed).trim();

    let value: f64 = number
        .parse()
        .map_err(|_| format!("execution time {raw:?} is not a number of milliseconds"))?;

    if !value.is_finite() || value < 0.0 {
        return Err(format!("execution time {raw:?} must be a non-negative number"));
    }

    Ok(value)
}

/// Lowercases and trims an identifier used as a map key.
pub(crate) fn normalise_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Attempt/success/failure counters, per function or per (edge, function).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyRecord {
    #[serde(default)]
    pub num_attempts: u64,
    #[serde(default)]
    pub num_success: u64,
    #[serde(default)]
    pub num_failure: u64,
}

impl ConsistencyRecord {
    /// Creates a record.
    #[must_use]
    pub const fn new(num_attempts: u64, num_success: u64, num_failure: u64) -> Self {
        Self {
            num_attempts,
            num_success,
            num_failure,
        }
    }

    /// Fraction of attempts that succeeded, clamped to `[0, 1]`.
    ///
    /// `None` when no attempts are recorded.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn success_rate(&self) -> Option<f64> {
        (self.num_attempts > 0)
            .then(|| (self.num_success as f64 / self.num_attempts as f64).clamp(0.0, 1.0))
    }

    /// Fraction of attempts that failed, clamped to `[0, 1]`.
    ///
    /// `None` when no attempts are recorded.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn failure_rate(&self) -> Option<f64> {
        (self.num_attempts > 0)
            .then(|| (self.num_failure as f64 / self.num_attempts as f64).clamp(0.0, 1.0))
    }
}

/// How the engine arrived at a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// No edge beat the home datacenter.
    Datacenter,
    /// Deterministic minimum-latency edge.
    Fastest,
    /// Uniform random pick among eligible edges.
    Explore,
    /// Consistency-weighted pick among eligible edges.
    Exploit,
}

impl Decision {
    /// Returns the decision name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Datacenter => "datacenter",
            Self::Fastest => "fastest",
            Self::Explore => "explore",
            Self::Exploit => "exploit",
        }
    }
}

/// Outcome of one placement call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementResult {
    /// Edge node or datacenter identifier.
    pub chosen_site: String,
    /// Predicted end-to-end time at the chosen site, in milliseconds.
    pub predicted_execution_time_ms: f64,
    /// How the site was chosen.
    pub decision: Decision,
}

impl PlacementResult {
    /// Returns true if the function stays in its home datacenter.
    #[must_use]
    pub fn is_datacenter(&self) -> bool {
        self.decision == Decision::Datacenter
    }
}

/// Placement mode requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// Deterministic minimum latency.
    Unweighted,
    /// Epsilon-greedy with consistency weighting.
    Weighted,
}
