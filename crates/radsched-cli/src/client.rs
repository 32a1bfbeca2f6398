//! HTTP clients for the registration service and remote measurement endpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use radsched_placement::config::{ConsistencyConfig, RegistryConfig};
use radsched_placement::consistency::{EdgeFunctionStats, FunctionStats};
use radsched_placement::RegisteredFunction;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected payload from {url}: {reason}")]
    Payload { url: String, reason: String },
}

/// Placeholder registration date expected by the registration service.
const UNDATED: &str = "0000-00-00";

/// Invocation URL registered for functions that do not carry one.
pub const DEFAULT_FUNCTION_URL: &str = "http";

/// Registration request body.
#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    function_name: &'a str,
    execution_time: &'a str,
    function_url: &'a str,
    datacenter: &'a str,
    date: &'a str,
}

impl<'a> RegisterRequest<'a> {
    fn new(function: &'a RegisteredFunction) -> Self {
        let function_url = if function.function_url.is_empty() {
            DEFAULT_FUNCTION_URL
        } else {
            &function.function_url
        };

        Self {
            function_name: &function.function_name,
            execution_time: &function.execution_time,
            function_url,
            datacenter: &function.datacenter,
            date: UNDATED,
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client, ClientError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, ClientError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(ClientError::Status {
            url: url.to_owned(),
            status: response.status().as_u16(),
        });
    }

    Ok(response.json().await?)
}

/// Client for the function registration service.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    /// Create a new registry client from configuration.
    pub fn new(config: &RegistryConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.timeout_secs))?,
            base_url: config.url.trim_end_matches('/').to_owned(),
        })
    }

    /// Fetch every registered function.
    pub async fn bootstrap(&self) -> Result<Vec<RegisteredFunction>, ClientError> {
        let url = format!("{}/bootstrap", self.base_url);
        get_json(&self.client, &url).await
    }

    /// Register or update a function.
    pub async fn register(&self, function: &RegisteredFunction) -> Result<(), ClientError> {
        let url = format!("{}/register", self.base_url);
        let request = RegisterRequest::new(function);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

/// Client for the attempt/success/failure counters.
#[derive(Debug, Clone)]
pub struct ConsistencyClient {
    client: Client,
    function_url: String,
    edge_url: String,
}

impl ConsistencyClient {
    /// Create a new consistency client from configuration.
    pub fn new(config: &ConsistencyConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.timeout_secs))?,
            function_url: config.function_url.clone(),
            edge_url: config.edge_url.clone(),
        })
    }

    /// Fetch per-function counters.
    pub async fn function_stats(&self) -> Result<FunctionStats, ClientError> {
        get_json(&self.client, &self.function_url).await
    }

    /// Fetch per-(edge, function) counters.
    pub async fn edge_stats(&self) -> Result<EdgeFunctionStats, ClientError> {
        get_json(&self.client, &self.edge_url).await
    }
}

/// A datacenter's node round trips, either bare or wrapped in a
/// `{statusCode, body}` envelope whose body may be JSON-encoded.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RttPayload {
    Envelope { body: EnvelopeBody },
    Bare(BTreeMap<String, f64>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvelopeBody {
    Encoded(String),
    Inline(BTreeMap<String, f64>),
}

/// Decodes a datacenter round-trip payload.
pub fn parse_rtt_payload(url: &str, raw: &[u8]) -> Result<BTreeMap<String, f64>, ClientError> {
    let payload_error = |reason: String| ClientError::Payload {
        url: url.to_owned(),
        reason,
    };

    let payload: RttPayload =
        serde_json::from_slice(raw).map_err(|e| payload_error(e.to_string()))?;

    match payload {
        RttPayload::Bare(rtts) | RttPayload::Envelope { body: EnvelopeBody::Inline(rtts) } => Ok(rtts),
        RttPayload::Envelope { body: EnvelopeBody::Encoded(body) } => {
            serde_json::from_str(&body).map_err(|e| payload_error(format!("body: {e}")))
        }
    }
}

/// Substitutes `{region}` in a URL or host template.
pub fn for_region(template: &str, region: &str) -> String {
    template.replace("{region}", region)
}

/// Client for per-datacenter round-trip endpoints.
#[derive(Debug, Clone)]
pub struct DatacenterClient {
    client: Client,
    url_template: String,
}

impl DatacenterClient {
    /// Create a client querying `url_template` with `{region}` substituted.
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            url_template: url_template.into(),
        })
    }

    /// Fetch the node round trips measured from one datacenter.
    pub async fn node_rtts(&self, region: &str) -> Result<BTreeMap<String, f64>, ClientError> {
        let url = for_region(&self.url_template, region);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        parse_rtt_payload(&url, &bytes)
    }
}
