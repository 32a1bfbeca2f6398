//! Client round-trip probes.
//!
//! A probe is the time to complete a TCP handshake with a region's public
//! endpoint. Unreachable regions are left out of the result rather than
//! recorded with a sentinel.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use radsched_placement::config::ProbeConfig;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::client::for_region;

/// Times one TCP connect. `None` on failure or timeout.
pub async fn connect_time(host: &str, port: u16, timeout: Duration) -> Option<Duration> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => Some(started.elapsed()),
        Ok(Err(e)) => {
            warn!(host = %host, port, error = %e, "Probe failed");
            None
        }
        Err(_) => {
            warn!(host = %host, port, timeout = ?timeout, "Probe timed out");
            None
        }
    }
}

/// Probes every configured datacenter concurrently.
///
/// Returns milliseconds keyed by region; failed regions are omitted.
pub async fn client_rtts(config: &ProbeConfig) -> BTreeMap<String, f64> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut probes = JoinSet::new();

    for region in &config.datacenters {
        let region = region.clone();
        let host = for_region(&config.client_host, &region);
        let port = config.client_port;
        probes.spawn(async move {
            let rtt = connect_time(&host, port, timeout).await;
            (region, rtt)
        });
    }

    let mut rtts = BTreeMap::new();
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((region, Some(rtt))) => {
                let ms = rtt.as_secs_f64() * 1000.0;
                debug!(region = %region, rtt_ms = ms, "Probed region");
                rtts.insert(region, ms);
            }
            Ok((region, None)) => debug!(region = %region, "Region unreachable"),
            Err(e) => warn!(error = %e, "Probe task failed"),
        }
    }
    rtts
}
