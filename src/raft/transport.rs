use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use async_trait::async_trait;
// Use external log crate, not our own log module
use ::log::debug;

use super::{NodeId, RaftError, RaftNode, Term};

/// Delivers the two election RPCs between cluster members.
///
/// Calls fail fast: an `Err` means the target did not answer, which callers
/// treat exactly like a negative response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request_vote(
        &self,
        target: NodeId,
        term: Term,
        candidate_id: NodeId,
    ) -> Result<bool, RaftError>;

    async fn append_entries(
        &self,
        target: NodeId,
        term: Term,
        leader_id: NodeId,
    ) -> Result<bool, RaftError>;
}

/// In-process transport that invokes the target node's handlers directly.
///
/// The member set is installed once by [`LocalTransport::register`] and is
/// read-only afterwards. Isolating a node makes every call to or from it
/// fail with [`RaftError::PeerUnreachable`].
#[derive(Default)]
pub struct LocalTransport {
    members: OnceLock<HashMap<NodeId, Weak<RaftNode>>>,
    isolated: Mutex<HashSet<NodeId>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, nodes: &[Arc<RaftNode>]) -> Result<(), RaftError> {
        let members = nodes
            .iter()
            .map(|node| (node.id(), Arc::downgrade(node)))
            .collect();
        self.members
            .set(members)
            .map_err(|_| RaftError::AlreadyRegistered)
    }

    pub fn isolate(&self, node: NodeId) {
        self.isolated_set().insert(node);
    }

    pub fn heal(&self, node: NodeId) {
        self.isolated_set().remove(&node);
    }

    pub fn heal_all(&self) {
        self.isolated_set().clear();
    }

    pub fn is_isolated(&self, node: NodeId) -> bool {
        self.isolated_set().contains(&node)
    }

    fn isolated_set(&self) -> std::sync::MutexGuard<'_, HashSet<NodeId>> {
        self.isolated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, from: NodeId, to: NodeId) -> Result<Arc<RaftNode>, RaftError> {
        {
            let isolated = self.isolated_set();
            if isolated.contains(&from) || isolated.contains(&to) {
                return Err(RaftError::PeerUnreachable(to));
            }
        }

        let weak = self
            .members
            .get()
            .and_then(|members| members.get(&to))
            .ok_or(RaftError::UnknownPeer(to))?;
        weak.upgrade().ok_or(RaftError::PeerUnreachable(to))
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn request_vote(
        &self,
        target: NodeId,
        term: Term,
        candidate_id: NodeId,
    ) -> Result<bool, RaftError> {
        let node = self.route(candidate_id, target)?;
        let granted = node.handle_request_vote(term, candidate_id);
        debug!("RequestVote {candidate_id} -> {target} (term {term}): {granted}");
        Ok(granted)
    }

    async fn append_entries(
        &self,
        target: NodeId,
        term: Term,
        leader_id: NodeId,
    ) -> Result<bool, RaftError> {
        let node = self.route(leader_id, target)?;
        Ok(node.handle_append_entries(term, leader_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raft::RaftConfig;

    fn wired_pair() -> (Arc<LocalTransport>, Arc<RaftNode>, Arc<RaftNode>) {
        let transport = Arc::new(LocalTransport::new());
        let a = Arc::new(RaftNode::new(
            RaftConfig::new(1).with_peers([2]),
            transport.clone(),
        ));
        let b = Arc::new(RaftNode::new(
            RaftConfig::new(2).with_peers([1]),
            transport.clone(),
        ));
        transport
            .register(&[a.clone(), b.clone()])
            .expect("register");
        (transport, a, b)
    }

    #[tokio::test]
    async fn delivers_to_registered_member() {
        let (transport, _a, b) = wired_pair();

        let granted = transport.request_vote(2, 1, 1).await.expect("delivered");
        assert!(granted);
        assert_eq!(b.status().voted_for, Some(1));
    }

    #[tokio::test]
    async fn isolated_nodes_are_unreachable_both_ways() {
        let (transport, _a, b) = wired_pair();
        transport.isolate(1);

        let err = transport.request_vote(2, 1, 1).await.unwrap_err();
        assert!(matches!(err, RaftError::PeerUnreachable(2)));
        let err = transport.append_entries(1, 1, 2).await.unwrap_err();
        assert!(matches!(err, RaftError::PeerUnreachable(1)));
        assert_eq!(b.current_term(), 0);

        transport.heal(1);
        assert!(transport.append_entries(1, 1, 2).await.expect("healed"));
    }

    #[tokio::test]
    async fn unknown_target_is_an_error() {
        let (transport, _a, _b) = wired_pair();
        let err = transport.append_entries(9, 1, 1).await.unwrap_err();
        assert!(matches!(err, RaftError::UnknownPeer(9)));
    }

    #[test]
    fn member_set_is_installed_once() {
        let (transport, a, b) = wired_pair();
        assert!(matches!(
            transport.register(&[a, b]),
            Err(RaftError::AlreadyRegistered)
        ));
    }
}
