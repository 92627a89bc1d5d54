//! Member addition under a quorum-safety gate.
//!
//! The [`MemberAdder`] mutates two pieces of shared state, the running
//! cluster's membership and the discovery directory, and keeps them
//! consistent: every member it removes from the cluster is also removed
//! from the directory, and every member it adds is registered there.
//! `protect_cluster` is the only gate between strategy execution and
//! cluster mutation; it re-lists the membership so the decision is based on
//! the cluster as it is now, not as it was when the classifier probed.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use etcdjoin_discovery::{DiscoveryClient, Machine};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::members::{Member, MembersClient};
use crate::{probe, JoinError, JoinResult};

/// How aggressively to make room for the new member.
///
/// Ordered from least to most aggressive: `prepared` never mutates the
/// cluster, `add` only adds, `replace` evicts one dead member when the
/// cluster is full, `prune` evicts dead members before adding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Only join a slot an operator prepared; never mutate membership.
    Prepared,
    /// Add a member while the cluster has room; never remove anything.
    Add,
    /// Evict exactly one dead member when the cluster is full.
    Replace,
    /// Evict dead members even when the cluster has room.
    Prune,
}

impl Strategy {
    /// All strategies, in increasing aggressiveness.
    pub const ALL: [Strategy; 4] =
        [Strategy::Prepared, Strategy::Add, Strategy::Replace, Strategy::Prune];

    /// The wire/CLI name of the strategy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Prepared => "prepared",
            Strategy::Add => "add",
            Strategy::Replace => "replace",
            Strategy::Prune => "prune",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown strategy name.
#[derive(Debug, Clone, Error)]
#[error("unknown join strategy {0:?}")]
pub struct UnknownStrategy(String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepared" => Ok(Strategy::Prepared),
            "add" => Ok(Strategy::Add),
            "replace" => Ok(Strategy::Replace),
            "prune" => Ok(Strategy::Prune),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Adds this node to a running cluster according to a [`Strategy`].
pub struct MemberAdder {
    members: MembersClient,
    strategy: Strategy,
    client_port: u16,
    target_size: usize,
    discovery: DiscoveryClient,
}

impl MemberAdder {
    /// Creates an adder speaking to the cluster through the union of the
    /// active machines' client URLs.
    ///
    /// # Errors
    ///
    /// Returns an error if the members client cannot be built.
    pub fn new(
        active: &[Machine],
        strategy: Strategy,
        client_port: u16,
        target_size: usize,
        discovery: DiscoveryClient,
    ) -> JoinResult<Self> {
        let endpoints: Vec<String> =
            active.iter().flat_map(|m| m.client_urls.iter().cloned()).collect();

        Ok(Self {
            members: MembersClient::new(endpoints)?,
            strategy,
            client_port,
            target_size,
            discovery,
        })
    }

    /// Makes the cluster accept this node and returns the peer URLs to put
    /// first in the initial-cluster list.
    ///
    /// If an operator prepared an unstarted member matching `urls`, that
    /// slot is used and nothing is mutated. Otherwise the strategy decides
    /// which dead members to evict first, the quorum gate runs, exactly one
    /// of `urls` is added to the cluster, and the full list is registered
    /// in the discovery directory.
    ///
    /// # Errors
    ///
    /// See [`JoinError`]; any error aborts the invocation with the cluster
    /// left in a consistent state.
    pub async fn add(&self, name: &str, urls: &[String]) -> JoinResult<Vec<String>> {
        let Some(first_url) = urls.first() else {
            return Err(JoinError::NoAdvertisedUrls);
        };

        debug!("Getting cluster members");
        let members = self.members.list().await?;

        if let Some(unstarted) = find_unstarted_member(&members, urls) {
            info!(
                id = %unstarted.id,
                urls = ?unstarted.peer_urls,
                "Found matching unstarted member, no need to add"
            );
            self.protect_cluster().await?;
            return Ok(unstarted.peer_urls);
        }

        match self.strategy {
            Strategy::Prepared => return Err(JoinError::NoUnstartedSlot),
            Strategy::Add => {}
            Strategy::Replace => {
                if members.len() >= self.target_size {
                    let removed = self.remove_dead_members_n(&members, 1).await?;
                    if removed.is_empty() {
                        return Err(JoinError::FullNoDead);
                    }
                } else {
                    info!(
                        members = members.len(),
                        target = self.target_size,
                        "Cluster not full, going ahead with adding"
                    );
                }
            }
            Strategy::Prune => {
                self.remove_dead_members_n(&members, members.len()).await?;
            }
        }

        self.protect_cluster().await?;

        // Only one URL is added: the caller pins it in the initial-cluster
        // string, and the cluster derives the new member's ID from it.
        debug!(url = %first_url, "Trying to add member");
        let member = self.members.add(first_url).await?;
        info!(url = %first_url, id = %member.id, "Added member to cluster");

        let machine = Machine::from_urls(name, urls, self.client_port)?;
        if self.discovery.add(&member.id, &machine).await? {
            info!(id = %member.id, urls = ?urls, "Registered member in discovery directory");
        } else {
            debug!(id = %member.id, "Member already registered in discovery directory");
        }

        Ok(vec![first_url.clone()])
    }

    /// Removes up to `max_num` dead members from the cluster and the
    /// discovery directory.
    ///
    /// Members are considered in API order. The loop stops after the first
    /// successful removal, so at most one member is removed per call.
    async fn remove_dead_members_n(
        &self,
        members: &[Member],
        max_num: usize,
    ) -> JoinResult<Vec<Member>> {
        let mut deleted = Vec::new();

        for member in members {
            if deleted.len() >= max_num {
                break;
            }
            if !self.member_is_dead(member).await {
                continue;
            }

            debug!(name = %member.name, urls = ?member.peer_urls, "Trying to remove dead member");
            self.members.remove(&member.id).await?;
            info!(name = %member.name, urls = ?member.peer_urls, "Removed dead member");

            if self.discovery.delete(&member.id).await? {
                info!(name = %member.name, "Dead member removed from discovery directory");
            } else {
                debug!(name = %member.name, "Dead member not found in discovery directory");
            }

            deleted.push(member.clone());
            break;
        }

        Ok(deleted)
    }

    /// A member is dead iff every one of its peer URLs is unreachable, or
    /// reachable but answering that it knows no leader. A health check that
    /// errors (as opposed to answering negatively) keeps the member alive.
    async fn member_is_dead(&self, member: &Member) -> bool {
        for url in &member.peer_urls {
            let named = format!("{}={}", member.name, url);
            let machine = match Machine::parse(&named, self.client_port) {
                Ok(machine) => machine,
                Err(err) => {
                    warn!(name = %member.name, url = %url, error = %err, "Invalid peer url in member");
                    return false;
                }
            };

            if probe::alive(&machine.name, &machine.peer_urls).await {
                match probe::active(&machine.name, &machine.client_urls).await {
                    Ok(true) => {
                        debug!(machine = %machine.named_peer_urls().join(","), "Member is alive and active");
                        return false;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(name = %member.name, error = %err, "Error checking member health");
                        return false;
                    }
                }
            }
        }

        true
    }

    /// The quorum gate: re-lists the membership and refuses any add that
    /// could leave the projected post-add cluster without a healthy
    /// quorum.
    async fn protect_cluster(&self) -> JoinResult<()> {
        let members = self.members.list().await?;

        let mut started = 0usize;
        let mut healthy = 0usize;
        for member in &members {
            if !member.name.is_empty() {
                started += 1;
            }
            if probe::alive(&member.name, &member.peer_urls).await
                && matches!(probe::active(&member.name, &member.client_urls).await, Ok(true))
            {
                healthy += 1;
            }
        }

        if started >= self.target_size {
            return Err(JoinError::ClusterFull { size: self.target_size });
        }

        if started == 1 {
            info!("One node cluster found, joining is always unsafe, continuing");
            return Ok(());
        }

        let future_quorum = (started + 1) / 2 + 1;
        if healthy < future_quorum {
            return Err(JoinError::QuorumAtRisk { started, healthy, quorum: future_quorum });
        }

        info!(
            future_quorum,
            "Future quorum is not at risk even if this member fails to start, continuing"
        );
        Ok(())
    }
}

/// Finds an unstarted member whose peer URLs are a subset of `urls`.
fn find_unstarted_member(members: &[Member], urls: &[String]) -> Option<Member> {
    let new_urls: HashSet<&str> = urls.iter().map(String::as_str).collect();

    members
        .iter()
        .find(|m| m.name.is_empty() && m.peer_urls.iter().all(|u| new_urls.contains(u.as_str())))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, name: &str, peer_urls: &[&str]) -> Member {
        Member {
            id: id.to_string(),
            name: name.to_string(),
            peer_urls: peer_urls.iter().map(|u| u.to_string()).collect(),
            client_urls: Vec::new(),
        }
    }

    #[test]
    fn test_strategy_round_trip() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_strategy_unknown() {
        assert!("dumb".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_find_unstarted_member_matches_subset() {
        let members = vec![
            member("m0", "n0", &["http://h0:2380"]),
            member("m3", "", &["http://h3:2380"]),
        ];
        let urls = vec!["http://h3:2380".to_string(), "http://h3b:2380".to_string()];

        let found = find_unstarted_member(&members, &urls).unwrap();
        assert_eq!(found.id, "m3");
    }

    #[test]
    fn test_find_unstarted_member_ignores_started() {
        let members = vec![member("m0", "n0", &["http://h0:2380"])];
        let urls = vec!["http://h0:2380".to_string()];

        assert!(find_unstarted_member(&members, &urls).is_none());
    }

    #[test]
    fn test_find_unstarted_member_requires_subset() {
        let members = vec![member("m3", "", &["http://h3:2380", "http://other:2380"])];
        let urls = vec!["http://h3:2380".to_string()];

        assert!(find_unstarted_member(&members, &urls).is_none());
    }
}
