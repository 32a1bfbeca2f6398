//! Bootstrap command - refresh the local data directory.
//!
//! Fetches registered functions, probes client round trips, collects each
//! datacenter's node round trips and downloads consistency counters.

use std::collections::BTreeMap;
use std::time::Duration;

use radsched_placement::store::file::{
    DataDir, CLIENT_RTT_FILE, DATACENTER_RTT_FILE, EDGE_CONSISTENCY_FILE,
    FUNCTION_CONSISTENCY_FILE, FUNCTION_REGISTRY_FILE,
};
use radsched_placement::store::FunctionRegistry;
use radsched_placement::{FunctionDescriptor, PlacementError, RegisteredFunction, SchedulerConfig};
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{ClientError, ConsistencyClient, DatacenterClient, RegistryClient};
use crate::probe;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Failed to fetch registered functions: {0}")]
    Functions(#[source] ClientError),

    #[error("No datacenter answered the client probe")]
    NoClientLatency,

    #[error("No datacenter returned node round trips; keeping the previous matrix")]
    NoDatacenterLatency,

    #[error("Failed to fetch consistency data: {0}")]
    Consistency(#[source] ClientError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Placement(#[from] PlacementError),
}

pub async fn run(config: &SchedulerConfig) -> Result<(), BootstrapError> {
    let data = DataDir::new(&config.store.data_dir);
    data.ensure_exists()?;

    let functions = refresh_functions(config, &data).await?;
    println!("Saved {functions} functions to {FUNCTION_REGISTRY_FILE}");

    let regions = refresh_client_latency(config, &data).await?;
    println!("Saved client round trips for {regions} regions to {CLIENT_RTT_FILE}");

    let datacenters = refresh_datacenter_latency(config, &data).await?;
    println!("Saved node round trips for {datacenters} datacenters to {DATACENTER_RTT_FILE}");

    refresh_consistency(config, &data).await?;
    println!("Saved consistency data to {FUNCTION_CONSISTENCY_FILE} and {EDGE_CONSISTENCY_FILE}");

    Ok(())
}

async fn refresh_functions(config: &SchedulerConfig, data: &DataDir) -> Result<usize, BootstrapError> {
    let client = RegistryClient::new(&config.registry)?;
    let entries = client.bootstrap().await.map_err(BootstrapError::Functions)?;

    let descriptors = valid_descriptors(entries);
    let count = descriptors.len();
    data.function_registry().replace_all(descriptors)?;

    info!(functions = count, "Function registry refreshed");
    Ok(count)
}

/// Converts registry entries, skipping ones with an unusable execution time.
fn valid_descriptors(entries: Vec<RegisteredFunction>) -> Vec<FunctionDescriptor> {
    entries
        .into_iter()
        .filter_map(|entry| match FunctionDescriptor::try_from(entry) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!(error = %e, "Skipping registered function");
                None
            }
        })
        .collect()
}

async fn refresh_client_latency(
    config: &SchedulerConfig,
    data: &DataDir,
) -> Result<usize, BootstrapError> {
    let rtts = probe::client_rtts(&config.probe).await;
    if rtts.is_empty() {
        return Err(BootstrapError::NoClientLatency);
    }

    data.latency_provider().store_client_rtts(&rtts)?;
    info!(regions = rtts.len(), "Client round trips refreshed");
    Ok(rtts.len())
}

async fn refresh_datacenter_latency(
    config: &SchedulerConfig,
    data: &DataDir,
) -> Result<usize, BootstrapError> {
    let client = DatacenterClient::new(
        config.probe.datacenter_url.clone(),
        Duration::from_millis(config.probe.timeout_ms),
    )?;

    let mut rows = BTreeMap::new();
    for region in &config.probe.datacenters {
        match client.node_rtts(region).await {
            Ok(row) => {
                rows.insert(region.clone(), row);
            }
            Err(e) => warn!(region = %region, error = %e, "Skipping datacenter"),
        }
    }

    if rows.is_empty() {
        return Err(BootstrapError::NoDatacenterLatency);
    }

    data.latency_provider().store_datacenter_rtts(&rows)?;
    info!(datacenters = rows.len(), "Datacenter round trips refreshed");
    Ok(rows.len())
}

async fn refresh_consistency(config: &SchedulerConfig, data: &DataDir) -> Result<(), BootstrapError> {
    let client = ConsistencyClient::new(&config.consistency)?;
    let store = data.consistency_store(Duration::ZERO);

    let functions = client
        .function_stats()
        .await
        .map_err(BootstrapError::Consistency)?;
    store.store_function_stats(&functions)?;

    let edges = client.edge_stats().await.map_err(BootstrapError::Consistency)?;
    store.store_edge_stats(&edges)?;

    info!(
        functions = functions.len(),
        edges = edges.len(),
        "Consistency data refreshed"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;

    fn entry(name: &str, time: &str) -> RegisteredFunction {
        RegisteredFunction {
            function_name: name.to_owned(),
            execution_time: time.to_owned(),
            function_url: String::new(),
            datacenter: "us-east-1".to_owned(),
        }
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let descriptors = valid_descriptors(vec![
            entry("Function1", "125ms"),
            entry("broken", "soon"),
            entry("function2", "3125"),
        ]);

        let names: Vec<_> = descriptors.iter().map(FunctionDescriptor::name).collect();
        assert_eq!(names, vec!["function1", "function2"]);
    }

    #[tokio::test]
    async fn unreachable_datacenters_keep_previous_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDir::new(dir.path());
        let previous = BTreeMap::from([(
            "us-east-1".to_owned(),
            BTreeMap::from([("us-east-2".to_owned(), 12.0)]),
        )]);
        data.latency_provider().store_datacenter_rtts(&previous).unwrap();
        let before = fs::read_to_string(data.path(DATACENTER_RTT_FILE)).unwrap();

        let mut config = SchedulerConfig::default();
        config.store.data_dir = dir.path().to_path_buf();
        config.probe.datacenters = vec!["us-east-1".to_owned(), "us-west-1".to_owned()];
        config.probe.datacenter_url = "http://127.0.0.1:1/ping/{region}".to_owned();
        config.probe.timeout_ms = 500;

        let err = refresh_datacenter_latency(&config, &data).await.unwrap_err();

        assert!(matches!(err, BootstrapError::NoDatacenterLatency));
        assert_eq!(fs::read_to_string(data.path(DATACENTER_RTT_FILE)).unwrap(), before);
    }
}
