//! Error types for the join core.

use etcdjoin_discovery::DiscoveryError;
use thiserror::Error;

/// Errors that can abort a join invocation.
#[derive(Debug, Error)]
pub enum JoinError {
    /// Talking to the discovery directory failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The directory indicates an existing cluster, no peer answered, and
    /// this node has no persisted state to restart from.
    #[error("cluster is down, a new node cannot join now")]
    ClusterDown,

    /// The cluster already has `size` started members.
    #[error("cluster is already full with {size} members")]
    ClusterFull {
        /// The target cluster size.
        size: usize,
    },

    /// `replace` on a full cluster found no dead member to evict.
    #[error("full cluster and no dead member")]
    FullNoDead,

    /// Adding another member would leave the post-add quorum unsatisfiable.
    #[error(
        "cannot add another member to the {started} member cluster (with {healthy} members up) \
         because it puts the future quorum {quorum} at risk"
    )]
    QuorumAtRisk {
        /// Members with a non-empty name before the add.
        started: usize,
        /// Members that are alive and know a leader.
        healthy: usize,
        /// Quorum of the projected post-add cluster.
        quorum: usize,
    },

    /// The cluster's membership API reported a failure.
    #[error("members api: {0}")]
    MemberApi(String),

    /// `prepared` strategy found no unstarted member matching this node's
    /// peer URLs.
    #[error("no unstarted member slot prepared for this node")]
    NoUnstartedSlot,

    /// The caller supplied no advertised peer URLs.
    #[error("no advertised peer urls to add")]
    NoAdvertisedUrls,
}

/// Result type alias for join operations.
pub type JoinResult<T> = Result<T, JoinError>;
