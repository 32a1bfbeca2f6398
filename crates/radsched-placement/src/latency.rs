//! Round-trip time tables and the experiment-node allow-list.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PlacementError, Result};
use crate::types::normalise_key;

/// Round-trip times, keyed by lowercase node identifier.
///
/// Negative or non-finite times are never stored: an unreachable probe is a
/// missing entry, not a zero-latency one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyTable {
    client_to_node: BTreeMap<String, f64>,
    node_to_datacenter: BTreeMap<String, BTreeMap<String, f64>>,
}

impl LatencyTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from raw maps, normalising keys and dropping invalid times.
    pub fn from_maps<C, D, R>(client_to_node: C, node_to_datacenter: D) -> Self
    where
        C: IntoIterator<Item = (String, f64)>,
        D: IntoIterator<Item = (String, R)>,
        R: IntoIterator<Item = (String, f64)>,
    {
        let mut table = Self::new();
        for (node, rtt) in client_to_node {
            table.insert_client_rtt(&node, rtt);
        }
        for (datacenter, row) in node_to_datacenter {
            for (node, rtt) in row {
                table.insert_datacenter_rtt(&datacenter, &node, rtt);
            }
        }
        table
    }

    /// Adds a client→node round trip.
    #[must_use]
    pub fn with_client_rtt(mut self, node: &str, rtt_ms: f64) -> Self {
        self.insert_client_rtt(node, rtt_ms);
        self
    }

    /// Adds a datacenter→node round trip.
    #[must_use]
    pub fn with_datacenter_rtt(mut self, datacenter: &str, node: &str, rtt_ms: f64) -> Self {
        self.insert_datacenter_rtt(datacenter, node, rtt_ms);
        self
    }

    /// Records a client→node round trip. Invalid times are ignored.
    pub fn insert_client_rtt(&mut self, node: &str, rtt_ms: f64) {
        if is_valid_rtt(rtt_ms) {
            self.client_to_node.insert(normalise_key(node), rtt_ms);
        }
    }

    /// Records a datacenter→node round trip. Invalid times are ignored.
    pub fn insert_datacenter_rtt(&mut self, datacenter: &str, node: &str, rtt_ms: f64) {
        if is_valid_rtt(rtt_ms) {
            self.node_to_datacenter
                .entry(normalise_key(datacenter))
                .or_default()
                .insert(normalise_key(node), rtt_ms);
        }
    }

    /// Client→node round trip, if measured.
    #[must_use]
    pub fn client_rtt(&self, node: &str) -> Option<f64> {
        self.client_to_node.get(node).copied()
    }

    /// All client→node round trips.
    #[must_use]
    pub const fn client_to_node(&self) -> &BTreeMap<String, f64> {
        &self.client_to_node
    }

    /// Datacenter→node round trips for one datacenter.
    #[must_use]
    pub fn datacenter_row(&self, datacenter: &str) -> Option<&BTreeMap<String, f64>> {
        self.node_to_datacenter.get(datacenter)
    }

    /// All datacenter→node rows.
    #[must_use]
    pub const fn node_to_datacenter(&self) -> &BTreeMap<String, BTreeMap<String, f64>> {
        &self.node_to_datacenter
    }

    /// Returns true if no round trips are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.client_to_node.is_empty() && self.node_to_datacenter.is_empty()
    }

    /// Returns a copy restricted to the experiment nodes.
    ///
    /// The home datacenter's client round trip is kept so the datacenter
    /// baseline survives the restriction. `self` is left untouched.
    #[must_use]
    pub fn restricted_to(&self, nodes: &ExperimentNodes, home_datacenter: &str) -> Self {
        let client_to_node = self
            .client_to_node
            .iter()
            .filter(|(node, _)| nodes.contains(node) || node.as_str() == home_datacenter)
            .map(|(node, rtt)| (node.clone(), *rtt))
            .collect();

        let node_to_datacenter = self
            .node_to_datacenter
            .iter()
            .map(|(datacenter, row)| {
                let row = row
                    .iter()
                    .filter(|(node, _)| nodes.contains(node))
                    .map(|(node, rtt)| (node.clone(), *rtt))
                    .collect();
                (datacenter.clone(), row)
            })
            .collect();

        Self {
            client_to_node,
            node_to_datacenter,
        }
    }
}

fn is_valid_rtt(rtt_ms: f64) -> bool {
    rtt_ms.is_finite() && rtt_ms >= 0.0
}

/// Allow-list of candidate nodes for weighted placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentNodes(BTreeSet<String>);

impl ExperimentNodes {
    /// Validates and normalises a node list.
    ///
    /// Rejects an empty list, blank entries and duplicates (after lowercasing).
    pub fn new<I, S>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for raw in nodes {
            let node = normalise_key(raw.as_ref());
            if node.is_empty() {
                return Err(PlacementError::Config(
                    "experiment node list contains a blank entry".to_owned(),
                ));
            }
            if !set.insert(node.clone()) {
                return Err(PlacementError::Config(format!(
                    "experiment node {node} is listed more than once"
                )));
            }
        }

        if set.is_empty() {
            return Err(PlacementError::Config(
                "experiment node list is empty".to_owned(),
            ));
        }

        Ok(Self(set))
    }

    /// Returns true if the node is a candidate.
    #[must_use]
    pub fn contains(&self, node: &str) -> bool {
        self.0.contains(node)
    }

    /// Iterates over the nodes in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of candidate nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; an empty list is rejected on construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
