//! HTTP client for the discovery directory.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::machine::Machine;
use crate::{DiscoveryError, DiscoveryResult};

/// Per-request timeout for every directory call.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// A decoded directory response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// The node the request addressed.
    pub node: Node,
}

/// One node of the directory tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Node {
    /// The node's key (a machine ID for directory children).
    pub key: Option<String>,

    /// The node's value; absent for directories and expired entries.
    pub value: Option<String>,

    /// Child entries, for directory listings.
    pub nodes: Vec<Node>,
}

/// Thin client over the discovery directory.
///
/// The base URL is stored with any trailing slash trimmed; every request is
/// bounded by [`DISCOVERY_TIMEOUT`].
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    base: String,
    client_port: u16,
    http: reqwest::Client,
}

impl DiscoveryClient {
    /// Creates a client for the given directory base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str, client_port: u16) -> DiscoveryResult<Self> {
        let http = reqwest::Client::builder().timeout(DISCOVERY_TIMEOUT).build()?;

        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            client_port,
            http,
        })
    }

    /// Returns the directory base URL (trailing slash trimmed).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Reads a single key from the directory.
    ///
    /// # Errors
    ///
    /// Any non-200 status is an error; so is an undecodable body.
    pub async fn get(&self, key: &str) -> DiscoveryResult<Event> {
        let url = format!("{}{}", self.base, key);
        debug!(url = %url, "Reading discovery key");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(DiscoveryError::Http { status: status.as_u16(), url, body });
        }

        serde_json::from_str(&body).map_err(|source| DiscoveryError::Parse { url, source })
    }

    /// Lists all machines registered in the directory.
    ///
    /// Entries without a value are skipped; entries whose value does not
    /// parse are skipped with a warning. Neither aborts the listing.
    ///
    /// # Errors
    ///
    /// Fails only if the listing itself cannot be fetched or decoded.
    pub async fn list(&self) -> DiscoveryResult<Vec<Machine>> {
        let event = self.get("/").await?;

        let mut machines = Vec::with_capacity(event.node.nodes.len());
        for entry in &event.node.nodes {
            let Some(value) = &entry.value else {
                debug!(
                    key = entry.key.as_deref().unwrap_or_default(),
                    "Skipping discovery entry without value"
                );
                continue;
            };
            match Machine::parse(value, self.client_port) {
                Ok(machine) => machines.push(machine),
                Err(err) => {
                    warn!(value = %value, error = %err, "Invalid peer url in discovery directory");
                }
            }
        }

        Ok(machines)
    }

    /// Reads the target cluster size from the directory's `/_config/size`
    /// key.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be read or its value is not a decimal
    /// integer.
    pub async fn cluster_size(&self) -> DiscoveryResult<usize> {
        let event = self.get("/_config/size").await?;
        let value = event.node.value.unwrap_or_default();
        value
            .parse::<usize>()
            .map_err(|_| DiscoveryError::InvalidSize(value))
    }

    /// Registers a machine under the given ID.
    ///
    /// Returns `true` when the entry was created and `false` on a 409
    /// Conflict (another joiner registered the same ID first; the directory
    /// already holds the entry).
    ///
    /// # Errors
    ///
    /// Any other non-200 status is an error.
    pub async fn add(&self, id: &str, machine: &Machine) -> DiscoveryResult<bool> {
        let url = format!("{}/{}", self.base, id);
        let value = machine.named_peer_urls().join(",");
        debug!(url = %url, value = %value, "Registering machine in discovery directory");

        let resp = self.http.put(&url).form(&[("value", value.as_str())]).send().await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::CONFLICT => Ok(false),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(DiscoveryError::Http { status: status.as_u16(), url, body })
            }
        }
    }

    /// Deletes the machine entry with the given ID.
    ///
    /// Returns `true` when the entry was deleted and `false` when it was
    /// not present (404).
    ///
    /// # Errors
    ///
    /// Any other non-200 status is an error.
    pub async fn delete(&self, id: &str) -> DiscoveryResult<bool> {
        let url = format!("{}/{}", self.base, id.trim_start_matches('/'));
        debug!(url = %url, "Deleting machine from discovery directory");

        let resp = self.http.delete(&url).send().await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(DiscoveryError::Http { status: status.as_u16(), url, body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DiscoveryClient::new("http://example.com/registry/abc/", 2379).unwrap();
        assert_eq!(client.base_url(), "http://example.com/registry/abc");
    }

    #[test]
    fn test_envelope_decoding() {
        let body = r#"{
            "action": "get",
            "node": {
                "key": "/_etcd/registry/abc",
                "dir": true,
                "nodes": [
                    {"key": "/_etcd/registry/abc/1", "value": "n0=http://h0:2380"},
                    {"key": "/_etcd/registry/abc/2"}
                ]
            }
        }"#;

        let event: Event = serde_json::from_str(body).unwrap();
        assert_eq!(event.node.nodes.len(), 2);
        assert_eq!(event.node.nodes[0].value.as_deref(), Some("n0=http://h0:2380"));
        assert!(event.node.nodes[1].value.is_none());
    }
}
