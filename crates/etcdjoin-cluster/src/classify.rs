//! Cluster-state classification.
//!
//! Given the machines registered in the discovery directory and the target
//! cluster size, decide whether a cluster exists at all, and if so which of
//! its peers are still active. The heuristic: a registered-but-silent full
//! directory means the cluster exists and is merely down, while
//! below-quorum registration means bootstrapping is still in progress.

use etcdjoin_discovery::Machine;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::probe;

/// Sentinel target size for an unbounded cluster.
///
/// With no bound there is no meaningful quorum: any active peer proves an
/// existing cluster, and the directory can never be full.
pub const UNBOUNDED_SIZE: usize = usize::MAX;

/// The classifier's view of the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterVerdict {
    /// No cluster has formed yet; this node should seed or bootstrap one.
    NoCluster,

    /// A cluster exists. An empty `active` set means it is believed down:
    /// the directory says it formed, but no peer answered.
    ClusterUp {
        /// The peers that are alive and report a leader, in directory
        /// order.
        active: Vec<Machine>,
    },
}

/// Classifies the cluster by probing all registered machines concurrently.
///
/// One probe task is spawned per machine; results are collected over a
/// channel and classification only starts once every probe has reported.
/// Given a fixed probe outcome the verdict is deterministic.
pub async fn classify(target_size: usize, machines: &[Machine]) -> ClusterVerdict {
    if machines.is_empty() {
        debug!("No machines found in discovery directory, assuming new cluster");
        return ClusterVerdict::NoCluster;
    }

    let quorum = target_size / 2 + 1;

    let (tx, mut rx) = mpsc::channel(machines.len());
    for (idx, machine) in machines.iter().cloned().enumerate() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let healthy = probe_machine(&machine).await;
            let _ = tx.send((idx, healthy)).await;
        });
    }
    drop(tx);

    let mut active_idx = Vec::new();
    while let Some((idx, healthy)) = rx.recv().await {
        if healthy {
            active_idx.push(idx);
        }
    }
    active_idx.sort_unstable();
    let active: Vec<Machine> = active_idx.into_iter().map(|i| machines[i].clone()).collect();

    if target_size != UNBOUNDED_SIZE && machines.len() < quorum {
        info!(
            found = machines.len(),
            quorum,
            "Fewer machines in discovery directory than a quorum, assuming new cluster"
        );
        return ClusterVerdict::NoCluster;
    }

    if machines.len() == target_size {
        debug!("Discovery directory is full, assuming existing cluster");
        return ClusterVerdict::ClusterUp { active };
    }

    if !active.is_empty() {
        return ClusterVerdict::ClusterUp { active };
    }

    ClusterVerdict::NoCluster
}

async fn probe_machine(machine: &Machine) -> bool {
    let named = machine.named_peer_urls().join(",");

    if !probe::alive(&machine.name, &machine.peer_urls).await {
        info!(machine = %named, "Machine looks dead");
        return false;
    }

    match probe::active(&machine.name, &machine.client_urls).await {
        Ok(true) => {
            info!(machine = %named, "Machine looks alive and active in a cluster");
            true
        }
        Ok(false) => {
            info!(machine = %named, "Machine is not in a healthy cluster");
            false
        }
        Err(err) => {
            warn!(machine = %named, error = %err, "Machine health check failed");
            false
        }
    }
}
