//! Error types for placement decisions and their data sources.

use std::fmt;

use thiserror::Error;

/// External collaborator that supplied (or failed to supply) data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Client→node and node→datacenter round-trip times.
    LatencyTable,
    /// Registered function descriptors.
    FunctionRegistry,
    /// Persisted per-function exploration rates.
    EpsilonStore,
    /// Attempt/success/failure counters.
    ConsistencyStore,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LatencyTable => "latency table",
            Self::FunctionRegistry => "function registry",
            Self::EpsilonStore => "epsilon store",
            Self::ConsistencyStore => "consistency store",
        };
        f.write_str(name)
    }
}

/// Placement errors.
#[derive(Error, Debug)]
pub enum PlacementError {
    /// Configuration error (unknown strategy, malformed experiment nodes, bad bounds).
    #[error("configuration error: {0}")]
    Config(String),

    /// Function was never registered.
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// Home datacenter has no client round-trip time, so there is no baseline.
    #[error("no client latency for datacenter {datacenter} (function {function})")]
    MissingDatacenterLatency { function: String, datacenter: String },

    /// Registry entry could not be turned into a descriptor.
    #[error("invalid function {name}: {reason}")]
    InvalidFunction { name: String, reason: String },

    /// A data source could not be reached or read.
    #[error("{data} unavailable{}: {reason}", function_suffix(.function))]
    DataUnavailable {
        data: DataSource,
        function: Option<String>,
        reason: String,
    },

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn function_suffix(function: &Option<String>) -> String {
    function
        .as_ref()
        .map(|name| format!(" for function {name}"))
        .unwrap_or_default()
}

impl PlacementError {
    /// Creates a `DataUnavailable` error without function context.
    pub fn unavailable(data: DataSource, reason: impl fmt::Display) -> Self {
        Self::DataUnavailable {
            data,
            function: None,
            reason: reason.to_string(),
        }
    }

    /// Attaches the function name to a `DataUnavailable` error that lacks one.
    #[must_use]
    pub fn for_function(self, name: &str) -> Self {
        match self {
            Self::DataUnavailable {
                data,
                function: None,
                reason,
            } => Self::DataUnavailable {
                data,
                function: Some(name.to_owned()),
                reason,
            },
            other => other,
        }
    }

    /// Returns the failed data source, if this is a `DataUnavailable` error.
    #[must_use]
    pub const fn data_source(&self) -> Option<DataSource> {
        match self {
            Self::DataUnavailable { data, .. } => Some(*data),
            _ => None,
        }
    }
}

/// Result type for placement operations.
pub type Result<T> = std::result::Result<T, PlacementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_names_source_and_function() {
        let err = PlacementError::unavailable(DataSource::ConsistencyStore, "connection refused")
            .for_function("f1");
        assert_eq!(
            err.to_string(),
            "consistency store unavailable for function f1: connection refused"
        );
        assert_eq!(err.data_source(), Some(DataSource::ConsistencyStore));
    }

    #[test]
    fn for_function_keeps_existing_context() {
        let err = PlacementError::unavailable(DataSource::LatencyTable, "missing file")
            .for_function("first")
            .for_function("second");
        assert!(err.to_string().contains("first"));
        assert!(!err.to_string().contains("second"));
    }

    #[test]
    fn for_function_ignores_other_variants() {
        let err = PlacementError::FunctionNotFound("f1".to_owned()).for_function("f2");
        assert!(matches!(err, PlacementError::FunctionNotFound(name) if name == "f1"));
    }
}
