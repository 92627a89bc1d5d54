//! Peer liveness probes.
//!
//! Two read-only, idempotent tests back every health decision in this
//! crate: `alive` asks whether a peer's raft transport answers at all,
//! `active` asks whether the peer sits in a functioning cluster (it knows
//! a leader). A peer counts as healthy only when both hold.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use crate::members::MembersClient;
use crate::JoinResult;

/// Well-known raft transport probing path served by every etcd peer.
pub const PROBING_PREFIX: &str = "/raft/probing";

/// Per-request timeout for the reachability probe.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Tests whether a peer's raft transport is reachable.
///
/// Each peer URL is probed in order; the first 200 wins. All failures and
/// transport errors make the peer not alive.
pub async fn alive(name: &str, peer_urls: &[String]) -> bool {
    debug!(name = %name, urls = ?peer_urls, "Testing liveness");

    let Ok(http) = reqwest::Client::builder().timeout(LIVENESS_TIMEOUT).build() else {
        return false;
    };

    for url in peer_urls {
        let probe_url = format!("{url}{PROBING_PREFIX}");
        match http.get(&probe_url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => return true,
            Ok(resp) => debug!(url = %probe_url, status = %resp.status(), "Probe refused"),
            Err(err) => debug!(url = %probe_url, error = %err, "Probe failed"),
        }
    }

    false
}

/// Tests whether a peer participates in a functioning cluster.
///
/// Returns `Ok(true)` when the peer's client API reports a leader,
/// `Ok(false)` when it answers but knows none.
///
/// # Errors
///
/// Transport failures and non-2xx answers surface as errors; callers decide
/// whether an error counts against the peer.
pub async fn active(name: &str, client_urls: &[String]) -> JoinResult<bool> {
    debug!(name = %name, urls = ?client_urls, "Testing whether the peer knows the leader");

    let client = MembersClient::new(client_urls.to_vec())?;
    let leader = client.leader().await?;
    Ok(leader.is_some())
}
