//! The top-level join procedure.
//!
//! Loads the discovery roster, resolves the target cluster size, classifies
//! the cluster, and produces the configuration the etcd daemon consumes:
//! seed a new cluster, restart into an existing one with persisted state,
//! or add this node as a fresh member.

use etcdjoin_discovery::DiscoveryClient;
use tracing::{debug, info};

use crate::adder::{MemberAdder, Strategy};
use crate::classify::{classify, ClusterVerdict, UNBOUNDED_SIZE};
use crate::{JoinError, JoinResult};

/// Everything the join procedure needs to know about the local node.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    /// Discovery directory base URL (http/https, trailing slash trimmed).
    pub discovery_url: String,

    /// The cluster-unique node name.
    pub name: String,

    /// Comma-separated advertised peer URLs of this node.
    pub initial_advertise_peer_urls: String,

    /// Whether the local data directory is missing or empty.
    pub fresh: bool,

    /// The client port shared by all peers.
    pub client_port: u16,

    /// Target cluster size: negative fetches it from the directory, zero
    /// means unbounded, positive is used as-is.
    pub cluster_size: i64,

    /// The member-add strategy.
    pub strategy: Strategy,
}

/// The configuration the join decision produces for the etcd daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtcdConfig {
    /// `name=peerURL` entries for the initial cluster, local node first.
    /// Empty when etcd should bootstrap via discovery or restart from its
    /// data directory.
    pub initial_cluster: Vec<String>,

    /// `"new"`, `"existing"`, or empty.
    pub initial_cluster_state: String,

    /// The advertised peer URLs, passed through from the request.
    pub advertise_peer_urls: String,

    /// The discovery URL; only set when etcd should bootstrap via
    /// discovery.
    pub discovery: String,

    /// The node name, passed through from the request.
    pub name: String,
}

/// Decides how this node should start and returns the matching etcd
/// configuration.
///
/// One invocation makes one decision; nothing is retried.
///
/// # Errors
///
/// Fails when the discovery directory cannot be read, when the cluster is
/// down and this node has no persisted state, or when the member add is
/// refused (see [`JoinError`]).
pub async fn join(req: &JoinRequest) -> JoinResult<EtcdConfig> {
    let discovery = DiscoveryClient::new(&req.discovery_url, req.client_port)?;
    let machines = discovery.list().await?;

    let target_size = match req.cluster_size {
        size if size < 0 => {
            let size = discovery.cluster_size().await?;
            debug!(size, "Got target cluster size from the discovery directory");
            size
        }
        0 => UNBOUNDED_SIZE,
        size => size as usize,
    };

    match classify(target_size, &machines).await {
        ClusterVerdict::NoCluster => Ok(EtcdConfig {
            initial_cluster: Vec::new(),
            initial_cluster_state: "new".to_string(),
            advertise_peer_urls: req.initial_advertise_peer_urls.clone(),
            discovery: discovery.base_url().to_string(),
            name: req.name.clone(),
        }),

        ClusterVerdict::ClusterUp { active } if active.is_empty() => {
            if req.fresh {
                return Err(JoinError::ClusterDown);
            }
            info!("Cluster believed down, restarting with persisted state");
            Ok(EtcdConfig {
                initial_cluster: Vec::new(),
                initial_cluster_state: "existing".to_string(),
                advertise_peer_urls: req.initial_advertise_peer_urls.clone(),
                discovery: String::new(),
                name: req.name.clone(),
            })
        }

        ClusterVerdict::ClusterUp { active } => {
            let active_named: Vec<String> =
                active.iter().flat_map(|m| m.named_peer_urls()).collect();

            let advertised_urls: Vec<String> =
                req.initial_advertise_peer_urls.split(',').map(str::to_string).collect();

            let local_named: Vec<String> = if req.strategy == Strategy::Prepared || !req.fresh {
                // A prepared slot or a restart: nothing to mutate, pin the
                // first advertised URL.
                vec![format!("{}={}", req.name, advertised_urls[0])]
            } else {
                let adder = MemberAdder::new(
                    &active,
                    req.strategy,
                    req.client_port,
                    target_size,
                    discovery,
                )?;
                let initial_urls = adder.add(&req.name, &advertised_urls).await?;
                initial_urls.into_iter().map(|u| format!("{}={}", req.name, u)).collect()
            };

            let mut initial_cluster = local_named;
            initial_cluster.extend(active_named);

            Ok(EtcdConfig {
                initial_cluster,
                initial_cluster_state: "existing".to_string(),
                advertise_peer_urls: req.initial_advertise_peer_urls.clone(),
                discovery: String::new(),
                name: req.name.clone(),
            })
        }
    }
}
