//! JSON files in a data directory.
//!
//! | File | Shape |
//! |------|-------|
//! | `function_registry.json` | `[{function_name, execution_time, function_url, datacenter}]` |
//! | `client_edge_rtts.json` | `[{location_name, round_trip_time: "12.34 ms"}]` |
//! | `edge_datacenter_rtts.json` | `{datacenter: {node: ms}}` |
//! | `epsilon.json` | `{function: epsilon}` |
//! | `function_consistency.json` | `{function: counters}` |
//! | `edge_function_consistency.json` | `{edge: {function: counters}}` |
//!
//! Writes go to a sibling temporary file that is then renamed over the
//! target, so readers never observe a half-written file.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ConsistencyStore, EpsilonStore, FunctionRegistry, LatencyProvider};
use crate::cache::SnapshotCache;
use crate::consistency::{self, EdgeFunctionStats, FunctionStats};
use crate::error::{DataSource, PlacementError, Result};
use crate::latency::LatencyTable;
use crate::types::{normalise_key, ConsistencyRecord, FunctionDescriptor, RegisteredFunction};

pub const FUNCTION_REGISTRY_FILE: &str = "function_registry.json";
pub const CLIENT_RTT_FILE: &str = "client_edge_rtts.json";
pub const DATACENTER_RTT_FILE: &str = "edge_datacenter_rtts.json";
pub const EPSILON_FILE: &str = "epsilon.json";
pub const FUNCTION_CONSISTENCY_FILE: &str = "function_consistency.json";
pub const EDGE_CONSISTENCY_FILE: &str = "edge_function_consistency.json";

/// Directory holding the JSON data files.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Uses `root` as the data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory if it does not exist.
    pub fn ensure_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Path of a file inside the directory.
    #[must_use]
    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// Function registry backed by this directory.
    #[must_use]
    pub fn function_registry(&self) -> FileFunctionRegistry {
        FileFunctionRegistry::new(self.path(FUNCTION_REGISTRY_FILE))
    }

    /// Latency provider backed by this directory.
    #[must_use]
    pub fn latency_provider(&self) -> FileLatencyProvider {
        FileLatencyProvider::new(self.path(CLIENT_RTT_FILE), self.path(DATACENTER_RTT_FILE))
    }

    /// Epsilon store backed by this directory.
    #[must_use]
    pub fn epsilon_store(&self) -> FileEpsilonStore {
        FileEpsilonStore::new(self.path(EPSILON_FILE))
    }

    /// Consistency store backed by this directory, caching snapshots up to `ttl`.
    #[must_use]
    pub fn consistency_store(&self, ttl: Duration) -> FileConsistencyStore {
        FileConsistencyStore::new(
            self.path(FUNCTION_CONSISTENCY_FILE),
            self.path(EDGE_CONSISTENCY_FILE),
            ttl,
        )
    }
}

/// Reads a JSON file. A missing file is `Ok(None)`.
fn read_json<T: DeserializeOwned>(path: &Path, data: DataSource) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PlacementError::unavailable(
                data,
                format!("failed to read {}: {e}", path.display()),
            ))
        }
    };

    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        PlacementError::unavailable(data, format!("malformed {}: {e}", path.display()))
    })
}

/// Reads a JSON file that must exist.
fn read_required_json<T: DeserializeOwned>(path: &Path, data: DataSource) -> Result<T> {
    read_json(path, data)?.ok_or_else(|| {
        PlacementError::unavailable(data, format!("{} does not exist", path.display()))
    })
}

/// Writes a JSON file via a temporary sibling and a rename.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| PlacementError::Serialisation(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "Wrote data file");
    Ok(())
}

/// Re-keys a map by normalised key. Later duplicates win.
fn normalise_keys<V>(map: BTreeMap<String, V>) -> BTreeMap<String, V> {
    map.into_iter().map(|(k, v)| (normalise_key(&k), v)).collect()
}

/// Function registry stored as a JSON array.
#[derive(Debug)]
pub struct FileFunctionRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileFunctionRegistry {
    /// Uses the registry file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn entries(&self) -> Result<Vec<RegisteredFunction>> {
        Ok(read_json(&self.path, DataSource::FunctionRegistry)?.unwrap_or_default())
    }

    fn write_entries(&self, mut entries: Vec<RegisteredFunction>) -> Result<()> {
        entries.sort_by(|a, b| a.function_name.cmp(&b.function_name));
        write_json_atomic(&self.path, &entries)
    }
}

impl FunctionRegistry for FileFunctionRegistry {
    fn get(&self, name: &str) -> Result<FunctionDescriptor> {
        let key = normalise_key(name);
        self.entries()?
            .into_iter()
            .rev()
            .find(|entry| normalise_key(&entry.function_name) == key)
            .ok_or(PlacementError::FunctionNotFound(key))?
            .try_into()
    }

    fn list(&self) -> Result<Vec<FunctionDescriptor>> {
        let mut functions: BTreeMap<String, FunctionDescriptor> = BTreeMap::new();
        for entry in self.entries()? {
            match FunctionDescriptor::try_from(entry) {
                Ok(descriptor) => {
                    functions.insert(descriptor.name().to_owned(), descriptor);
                }
                Err(e) => warn!(error = %e, "Skipping invalid registry entry"),
            }
        }
        Ok(functions.into_values().collect())
    }

    fn upsert(&self, descriptor: FunctionDescriptor) -> Result<bool> {
        let _guard = self.write_lock.lock();

        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|entry| normalise_key(&entry.function_name) != descriptor.name());
        let replaced = entries.len() != before;

        entries.push(RegisteredFunction::from(&descriptor));
        self.write_entries(entries)?;
        Ok(replaced)
    }

    fn replace_all(&self, descriptors: Vec<FunctionDescriptor>) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.write_entries(descriptors.iter().map(RegisteredFunction::from).collect())
    }
}

/// Client round-trip entry as written by the probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocationRtt {
    location_name: String,
    /// Milliseconds with a unit suffix, e.g. `"12.34 ms"`.
    round_trip_time: String,
}

fn parse_rtt(raw: &str) -> Option<f64> {
    raw.split_whitespace()
        .next()
        .map(|n| n.trim_end_matches("ms"))
        .and_then(|n| n.parse().ok())
}

/// Latency table stored as two JSON files.
#[derive(Debug)]
pub struct FileLatencyProvider {
    client_path: PathBuf,
    datacenter_path: PathBuf,
}

impl FileLatencyProvider {
    /// Uses the given client and datacenter round-trip files.
    pub fn new(client_path: impl Into<PathBuf>, datacenter_path: impl Into<PathBuf>) -> Self {
        Self {
            client_path: client_path.into(),
            datacenter_path: datacenter_path.into(),
        }
    }

    /// Writes client→node round trips. Invalid times are skipped.
    pub fn store_client_rtts(&self, rtts: &BTreeMap<String, f64>) -> Result<()> {
        let entries: Vec<_> = rtts
            .iter()
            .filter(|(_, rtt)| rtt.is_finite() && **rtt >= 0.0)
            .map(|(node, rtt)| LocationRtt {
                location_name: normalise_key(node),
                round_trip_time: format!("{rtt:.3} ms"),
            })
            .collect();
        write_json_atomic(&self.client_path, &entries)
    }

    /// Writes datacenter→node round trips.
    pub fn store_datacenter_rtts(&self, rtts: &BTreeMap<String, BTreeMap<String, f64>>) -> Result<()> {
        write_json_atomic(&self.datacenter_path, rtts)
    }
}

impl LatencyProvider for FileLatencyProvider {
    fn latency_table(&self) -> Result<Arc<LatencyTable>> {
        let clients: Vec<LocationRtt> =
            read_required_json(&self.client_path, DataSource::LatencyTable)?;
        let datacenters: BTreeMap<String, BTreeMap<String, f64>> =
            read_required_json(&self.datacenter_path, DataSource::LatencyTable)?;

        let client_rtts = clients.into_iter().filter_map(|entry| {
            let rtt = parse_rtt(&entry.round_trip_time);
            if rtt.is_none() {
                warn!(
                    node = %entry.location_name,
                    value = %entry.round_trip_time,
                    "Ignoring unparseable client round trip"
                );
            }
            rtt.map(|rtt| (entry.location_name, rtt))
        });

        Ok(Arc::new(LatencyTable::from_maps(client_rtts, datacenters)))
    }
}

/// Exploration rates stored as a JSON object.
#[derive(Debug)]
pub struct FileEpsilonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileEpsilonStore {
    /// Uses the epsilon file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn values(&self) -> Result<BTreeMap<String, f64>> {
        Ok(normalise_keys(
            read_json(&self.path, DataSource::EpsilonStore)?.unwrap_or_default(),
        ))
    }

    fn write(&self, values: &BTreeMap<String, f64>) -> Result<()> {
        write_json_atomic(&self.path, values).map_err(|e| match e {
            PlacementError::Io(io) => PlacementError::unavailable(DataSource::EpsilonStore, io),
            other => other,
        })
    }
}

impl EpsilonStore for FileEpsilonStore {
    fn load(&self, function: &str, initial: f64) -> Result<f64> {
        let _guard = self.lock.lock();
        let key = normalise_key(function);

        let mut values = self.values()?;
        if let Some(epsilon) = values.get(&key) {
            return Ok(*epsilon);
        }

        values.insert(key, initial);
        self.write(&values)?;
        Ok(initial)
    }

    fn save(&self, function: &str, epsilon: f64) -> Result<()> {
        let _guard = self.lock.lock();
        let mut values = self.values()?;
        values.insert(normalise_key(function), epsilon);
        self.write(&values)
    }
}

/// Consistency counters stored as two JSON files, cached up to a TTL.
#[derive(Debug)]
pub struct FileConsistencyStore {
    function_path: PathBuf,
    edge_path: PathBuf,
    functions: SnapshotCache<FunctionStats>,
    edges: SnapshotCache<EdgeFunctionStats>,
}

impl FileConsistencyStore {
    /// Uses the given function and edge counter files.
    pub fn new(
        function_path: impl Into<PathBuf>,
        edge_path: impl Into<PathBuf>,
        ttl: Duration,
    ) -> Self {
        Self {
            function_path: function_path.into(),
            edge_path: edge_path.into(),
            functions: SnapshotCache::new(ttl),
            edges: SnapshotCache::new(ttl),
        }
    }

    /// Writes per-function counters.
    pub fn store_function_stats(&self, stats: &FunctionStats) -> Result<()> {
        write_json_atomic(&self.function_path, stats)?;
        self.functions.invalidate();
        Ok(())
    }

    /// Writes per-(edge, function) counters.
    pub fn store_edge_stats(&self, stats: &EdgeFunctionStats) -> Result<()> {
        write_json_atomic(&self.edge_path, stats)?;
        self.edges.invalidate();
        Ok(())
    }

    fn function_stats(&self) -> Result<Arc<FunctionStats>> {
        self.functions.get_or_load(|| {
            let stats: FunctionStats =
                read_required_json(&self.function_path, DataSource::ConsistencyStore)?;
            Ok(Arc::new(normalise_keys(stats)))
        })
    }

    fn edge_stats(&self) -> Result<Arc<EdgeFunctionStats>> {
        self.edges.get_or_load(|| {
            let stats: EdgeFunctionStats =
                read_required_json(&self.edge_path, DataSource::ConsistencyStore)?;
            let stats: EdgeFunctionStats = stats
                .into_iter()
                .map(|(edge, functions)| (normalise_key(&edge), normalise_keys(functions)))
                .collect();
            Ok(Arc::new(stats))
        })
    }
}

impl ConsistencyStore for FileConsistencyStore {
    fn function_record(&self, function: &str) -> Result<Option<ConsistencyRecord>> {
        Ok(self.function_stats()?.get(&normalise_key(function)).copied())
    }

    fn edge_record(&self, edge: &str, function: &str) -> Result<Option<ConsistencyRecord>> {
        let stats = self.edge_stats()?;
        Ok(consistency::edge_record(
            &stats,
            &normalise_key(edge),
            &normalise_key(function),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data_dir() -> (TempDir, DataDir) {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDir::new(dir.path());
        (dir, data)
    }

    #[test]
    fn registry_missing_file_is_empty() {
        let (_dir, data) = data_dir();
        let registry = data.function_registry();

        assert!(registry.list().unwrap().is_empty());
        assert!(matches!(
            registry.get("f1").unwrap_err(),
            PlacementError::FunctionNotFound(_)
        ));
    }

    #[test]
    fn registry_reads_wire_format() {
        let (_dir, data) = data_dir();
        fs::write(
            data.path(FUNCTION_REGISTRY_FILE),
            r#"[
                {"function_name": "Function3", "execution_time": "125ms",
                 "function_url": "http", "datacenter": "us-west-1", "date": "0000-00-00"},
                {"function_name": "broken", "execution_time": "later", "datacenter": "us-east-1"}
            ]"#,
        )
        .unwrap();
        let registry = data.function_registry();

        let descriptor = registry.get("function3").unwrap();
        assert_eq!(descriptor.home_datacenter(), "us-west-1");
        assert!((descriptor.base_execution_time_ms() - 125.0).abs() < f64::EPSILON);

        assert!(matches!(
            registry.get("broken").unwrap_err(),
            PlacementError::InvalidFunction { .. }
        ));
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn registry_upsert_persists() {
        let (_dir, data) = data_dir();
        let registry = data.function_registry();

        assert!(!registry
            .upsert(FunctionDescriptor::new("f1", 100.0, "us-east-1"))
            .unwrap());
        assert!(registry
            .upsert(FunctionDescriptor::new("F1", 200.0, "us-east-2"))
            .unwrap());

        let reopened = data.function_registry();
        let all = reopened.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].home_datacenter(), "us-east-2");
        assert!((all[0].base_execution_time_ms() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn latency_round_trip_through_files() {
        let (_dir, data) = data_dir();
        let provider = data.latency_provider();

        let clients: BTreeMap<String, f64> = [
            ("US-East-1".to_owned(), 20.5),
            ("us-west-1".to_owned(), -1.0),
        ]
        .into_iter()
        .collect();
        let mut datacenters: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        datacenters
            .entry("us-east-1".to_owned())
            .or_default()
            .insert("us-west-1".to_owned(), 61.0);

        provider.store_client_rtts(&clients).unwrap();
        provider.store_datacenter_rtts(&datacenters).unwrap();

        let table = provider.latency_table().unwrap();
        assert_eq!(table.client_rtt("us-east-1"), Some(20.5));
        assert_eq!(table.client_rtt("us-west-1"), None);
        assert_eq!(
            table.datacenter_row("us-east-1").unwrap().get("us-west-1"),
            Some(&61.0)
        );
    }

    #[test]
    fn latency_parses_probe_output() {
        let (_dir, data) = data_dir();
        fs::write(
            data.path(CLIENT_RTT_FILE),
            r#"[{"location_name": "us-east-1", "round_trip_time": "12.34 ms"},
                {"location_name": "us-east-2", "round_trip_time": "-1 ms"},
                {"location_name": "us-west-1", "round_trip_time": "timeout"}]"#,
        )
        .unwrap();
        fs::write(data.path(DATACENTER_RTT_FILE), "{}").unwrap();

        let table = data.latency_provider().latency_table().unwrap();
        assert_eq!(table.client_rtt("us-east-1"), Some(12.34));
        assert_eq!(table.client_rtt("us-east-2"), None);
        assert_eq!(table.client_rtt("us-west-1"), None);
    }

    #[test]
    fn latency_missing_files_are_unavailable() {
        let (_dir, data) = data_dir();
        let err = data.latency_provider().latency_table().unwrap_err();
        assert_eq!(err.data_source(), Some(DataSource::LatencyTable));
    }

    #[test]
    fn latency_malformed_file_is_unavailable() {
        let (_dir, data) = data_dir();
        fs::write(data.path(CLIENT_RTT_FILE), "not json").unwrap();
        fs::write(data.path(DATACENTER_RTT_FILE), "{}").unwrap();

        let err = data.latency_provider().latency_table().unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn epsilon_registers_and_persists() {
        let (_dir, data) = data_dir();
        let store = data.epsilon_store();

        assert!((store.load("F1", 0.5).unwrap() - 0.5).abs() < f64::EPSILON);
        store.save("f1", 0.25).unwrap();

        let reopened = data.epsilon_store();
        assert!((reopened.load("f1", 0.5).unwrap() - 0.25).abs() < f64::EPSILON);

        let raw = fs::read_to_string(data.path(EPSILON_FILE)).unwrap();
        let parsed: BTreeMap<String, f64> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.get("f1"), Some(&0.25));
        assert!(!data.path("epsilon.json.tmp").exists());
    }

    #[test]
    fn consistency_reads_nested_counters() {
        let (_dir, data) = data_dir();
        fs::write(
            data.path(FUNCTION_CONSISTENCY_FILE),
            r#"{"F1": {"num_attempts": 10, "num_success": 9, "num_failure": 1}}"#,
        )
        .unwrap();
        fs::write(
            data.path(EDGE_CONSISTENCY_FILE),
            r#"{"Edge-A": {"f1": {"num_attempts": 4, "num_success": 3, "num_failure": 1}}}"#,
        )
        .unwrap();
        let store = data.consistency_store(Duration::from_secs(60));

        assert_eq!(
            store.function_record("f1").unwrap(),
            Some(ConsistencyRecord::new(10, 9, 1))
        );
        assert_eq!(
            store.edge_record("edge-a", "f1").unwrap(),
            Some(ConsistencyRecord::new(4, 3, 1))
        );
        assert_eq!(store.edge_record("EDGE-A", "F1").unwrap(), Some(ConsistencyRecord::new(4, 3, 1)));
        assert_eq!(store.edge_record("edge-a", "f2").unwrap(), None);
        assert_eq!(store.edge_record("edge-b", "f1").unwrap(), None);
    }

    #[test]
    fn consistency_cache_serves_until_rewritten() {
        let (_dir, data) = data_dir();
        let store = data.consistency_store(Duration::from_secs(60));

        let mut stats = FunctionStats::new();
        stats.insert("f1".to_owned(), ConsistencyRecord::new(1, 1, 0));
        store.store_function_stats(&stats).unwrap();
        assert_eq!(
            store.function_record("f1").unwrap(),
            Some(ConsistencyRecord::new(1, 1, 0))
        );

        // An external rewrite is not seen while the snapshot is fresh.
        fs::write(
            data.path(FUNCTION_CONSISTENCY_FILE),
            r#"{"f1": {"num_attempts": 2, "num_success": 1, "num_failure": 1}}"#,
        )
        .unwrap();
        assert_eq!(
            store.function_record("f1").unwrap(),
            Some(ConsistencyRecord::new(1, 1, 0))
        );

        // Writing through the store invalidates it.
        stats.insert("f1".to_owned(), ConsistencyRecord::new(3, 1, 2));
        store.store_function_stats(&stats).unwrap();
        assert_eq!(
            store.function_record("f1").unwrap(),
            Some(ConsistencyRecord::new(3, 1, 2))
        );
    }

    #[test]
    fn consistency_missing_file_is_unavailable() {
        let (_dir, data) = data_dir();
        let store = data.consistency_store(Duration::ZERO);
        let err = store.edge_record("edge-a", "f1").unwrap_err();
        assert_eq!(err.data_source(), Some(DataSource::ConsistencyStore));
    }
}
