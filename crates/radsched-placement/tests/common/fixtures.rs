//! Test fixtures for placement integration tests.

use radsched_placement::{ConsistencyRecord, FunctionDescriptor, LatencyTable};

/// Builder for creating test FunctionDescriptor instances.
pub struct FunctionBuilder {
    name: String,
    base_execution_time_ms: f64,
    home_datacenter: String,
}

impl FunctionBuilder {
    /// Creates a new function builder with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            base_execution_time_ms: 100.0,
            home_datacenter: "us-east-1".to_owned(),
        }
    }

    /// Sets the base execution time.
    pub fn with_execution_time(mut self, ms: f64) -> Self {
        self.base_execution_time_ms = ms;
        self
    }

    /// Sets the home datacenter.
    pub fn in_datacenter(mut self, datacenter: &str) -> Self {
        self.home_datacenter = datacenter.to_owned();
        self
    }

    /// Builds the FunctionDescriptor.
    pub fn build(self) -> FunctionDescriptor {
        FunctionDescriptor::new(self.name, self.base_execution_time_ms, self.home_datacenter)
    }
}

/// Builder for latency tables centred on one home datacenter.
pub struct LatencyBuilder {
    home: String,
    table: LatencyTable,
}

impl LatencyBuilder {
    /// Starts a table whose home datacenter has the given client round trip.
    pub fn home(datacenter: &str, client_rtt_ms: f64) -> Self {
        Self {
            home: datacenter.to_owned(),
            table: LatencyTable::new().with_client_rtt(datacenter, client_rtt_ms),
        }
    }

    /// Adds an edge with its client round trip and its round trip to the home datacenter.
    pub fn edge(mut self, node: &str, client_rtt_ms: f64, datacenter_rtt_ms: f64) -> Self {
        self.table = self
            .table
            .with_client_rtt(node, client_rtt_ms)
            .with_datacenter_rtt(&self.home, node, datacenter_rtt_ms);
        self
    }

    /// Builds the LatencyTable.
    pub fn build(self) -> LatencyTable {
        self.table
    }
}

/// Counters with the given attempts and failures.
pub fn record(attempts: u64, failures: u64) -> ConsistencyRecord {
    ConsistencyRecord::new(attempts, attempts.saturating_sub(failures), failures)
}

/// The `f1` function from the reference scenarios: 100ms in us-east-1.
pub fn f1() -> FunctionDescriptor {
    FunctionBuilder::new("f1").build()
}
