//! The join core: decide how a node enters a discovery-coordinated etcd
//! cluster, and carry out the membership change.
//!
//! Given the machines registered in the discovery directory and a target
//! cluster size, the classifier probes every peer concurrently and sorts the
//! cluster into one of three states: not formed yet, believed down, or up
//! with a known active set. For an up cluster the [`MemberAdder`] executes
//! one of four join strategies (`prepared`, `add`, `replace`, `prune`)
//! behind a quorum-safety gate, keeping the running cluster's membership and
//! the discovery directory consistent. The [`coordinator::join`] entry point
//! ties it together and produces the configuration the etcd daemon consumes.
//!
//! One invocation makes one decision. Nothing is persisted and nothing is
//! retried; callers rerun the whole procedure if it fails.

mod adder;
mod classify;
mod coordinator;
mod error;
mod members;
mod probe;

pub use adder::{MemberAdder, Strategy, UnknownStrategy};
pub use classify::{classify, ClusterVerdict, UNBOUNDED_SIZE};
pub use coordinator::{join, EtcdConfig, JoinRequest};
pub use error::{JoinError, JoinResult};
pub use members::{Member, MembersClient, ETCD_TIMEOUT};
pub use probe::{alive, active, LIVENESS_TIMEOUT, PROBING_PREFIX};
