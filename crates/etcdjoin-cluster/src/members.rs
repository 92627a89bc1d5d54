//! Client for the cluster's members API.
//!
//! The join core needs exactly four membership operations: list, add one
//! peer URL, remove by ID, and ask for the current leader. They are served
//! by the etcd v2 members endpoint on any reachable client URL.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{JoinError, JoinResult};

/// Per-request timeout for every members API call.
pub const ETCD_TIMEOUT: Duration = Duration::from_secs(5);

/// A cluster member as reported by the members API.
///
/// A member with an empty `name` is unstarted: a reservation made by an
/// earlier add whose joiner has not come up yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    /// The cluster-assigned member ID. Non-empty for any member the
    /// cluster returns.
    pub id: String,

    /// The member name; empty if unstarted.
    pub name: String,

    /// The member's advertised peer URLs.
    #[serde(rename = "peerURLs")]
    pub peer_urls: Vec<String>,

    /// The member's client URLs.
    #[serde(rename = "clientURLs")]
    pub client_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MemberList {
    #[serde(default)]
    members: Vec<Member>,
}

/// Members API client over a set of candidate endpoints.
///
/// Endpoints are tried in order; the first HTTP response wins and only
/// transport failures move on to the next endpoint.
#[derive(Debug, Clone)]
pub struct MembersClient {
    endpoints: Vec<String>,
    http: reqwest::Client,
}

impl MembersClient {
    /// Creates a members client for the given client URLs.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(endpoints: Vec<String>) -> JoinResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(ETCD_TIMEOUT)
            .build()
            .map_err(|err| JoinError::MemberApi(format!("cannot build client: {err}")))?;

        Ok(Self { endpoints, http })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> JoinResult<(StatusCode, String)> {
        let mut last_err = None;
        for endpoint in &self.endpoints {
            let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
            let mut req = self.http.request(method.clone(), &url);
            if let Some(body) = &body {
                req = req.json(body);
            }
            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Ok((status, body));
                }
                Err(err) => {
                    debug!(url = %url, error = %err, "Members endpoint unreachable, trying next");
                    last_err = Some(err);
                }
            }
        }

        Err(match last_err {
            Some(err) => JoinError::MemberApi(format!("no members endpoint reachable: {err}")),
            None => JoinError::MemberApi("no members endpoints configured".to_string()),
        })
    }

    /// Lists the current cluster members.
    ///
    /// # Errors
    ///
    /// Fails on any non-2xx response or an undecodable body.
    pub async fn list(&self) -> JoinResult<Vec<Member>> {
        let (status, body) = self.send(Method::GET, "/v2/members", None).await?;
        if !status.is_success() {
            return Err(JoinError::MemberApi(format!("list returned {status}: {body}")));
        }
        let list: MemberList = serde_json::from_str(&body)
            .map_err(|err| JoinError::MemberApi(format!("invalid member list: {err}")))?;
        Ok(list.members)
    }

    /// Adds a member with a single peer URL, returning the created member
    /// with its cluster-assigned ID.
    ///
    /// # Errors
    ///
    /// Fails on any response other than 200/201 or an undecodable body.
    pub async fn add(&self, peer_url: &str) -> JoinResult<Member> {
        let body = json!({ "peerURLs": [peer_url] });
        let (status, body) = self.send(Method::POST, "/v2/members", Some(body)).await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(JoinError::MemberApi(format!("add returned {status}: {body}")));
        }
        serde_json::from_str(&body)
            .map_err(|err| JoinError::MemberApi(format!("invalid added member: {err}")))
    }

    /// Removes the member with the given ID.
    ///
    /// # Errors
    ///
    /// Fails on any response other than 200/204.
    pub async fn remove(&self, id: &str) -> JoinResult<()> {
        let path = format!("/v2/members/{id}");
        let (status, body) = self.send(Method::DELETE, &path, None).await?;
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            return Err(JoinError::MemberApi(format!("remove returned {status}: {body}")));
        }
        Ok(())
    }

    /// Asks the cluster for its current leader.
    ///
    /// Returns `None` when the endpoint answers but knows no leader.
    ///
    /// # Errors
    ///
    /// Fails on any non-2xx response or an undecodable body.
    pub async fn leader(&self) -> JoinResult<Option<Member>> {
        let (status, body) = self.send(Method::GET, "/v2/members/leader", None).await?;
        if !status.is_success() {
            return Err(JoinError::MemberApi(format!("leader returned {status}: {body}")));
        }
        serde_json::from_str(&body)
            .map_err(|err| JoinError::MemberApi(format!("invalid leader answer: {err}")))
    }
}
