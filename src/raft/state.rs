use serde::{Deserialize, Serialize};

pub type NodeId = u64;
pub type Term = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Follower,
    Candidate,
    Leader,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Follower => write!(f, "Follower"),
            NodeRole::Candidate => write!(f, "Candidate"),
            NodeRole::Leader => write!(f, "Leader"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub current_term: Term,
    pub voted_for: Option<NodeId>,
    pub role: NodeRole,
    pub leader_id: Option<NodeId>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            current_term: 0,
            voted_for: None,
            role: NodeRole::Follower,
            leader_id: None,
        }
    }
}

impl NodeState {
    /// Adopt a newer term observed in an RPC: clears the vote and demotes
    /// to Follower. Returns the role held before the change.
    pub fn adopt_term(&mut self, term: Term) -> NodeRole {
        debug_assert!(term > self.current_term, "terms never move backwards");
        let previous = self.role;
        self.current_term = term;
        self.voted_for = None;
        self.leader_id = None;
        self.role = NodeRole::Follower;
        previous
    }
}

/// Point-in-time view of a node, as exposed to operators and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: NodeId,
    pub role: NodeRole,
    pub current_term: Term,
    pub voted_for: Option<NodeId>,
    pub leader_id: Option<NodeId>,
    pub stopped: bool,
}

/// Role and vote transitions, published in the order they were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaftEvent {
    BecameCandidate { node: NodeId, term: Term },
    BecameLeader { node: NodeId, term: Term, votes: usize },
    SteppedDown { node: NodeId, term: Term, from: NodeRole },
    VoteGranted { voter: NodeId, candidate: NodeId, term: Term },
    Stopped { node: NodeId, term: Term },
}

/// Votes needed to win an election in a cluster of `cluster_size` members.
pub fn quorum(cluster_size: usize) -> usize {
    cluster_size / 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_is_strict_majority() {
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(2), 2);
        assert_eq!(quorum(3), 2);
        assert_eq!(quorum(4), 3);
        assert_eq!(quorum(5), 3);
    }

    #[test]
    fn adopt_term_clears_vote_and_demotes() {
        let mut state = NodeState {
            current_term: 4,
            voted_for: Some(2),
            role: NodeRole::Leader,
            leader_id: Some(1),
        };

        let previous = state.adopt_term(7);

        assert_eq!(previous, NodeRole::Leader);
        assert_eq!(state.current_term, 7);
        assert_eq!(state.voted_for, None);
        assert_eq!(state.leader_id, None);
        assert_eq!(state.role, NodeRole::Follower);
    }

    #[test]
    fn node_status_serializes_role_by_name() {
        let status = NodeStatus {
            id: 1,
            role: NodeRole::Candidate,
            current_term: 3,
            voted_for: Some(1),
            leader_id: None,
            stopped: false,
        };
        let json = serde_json::to_string(&status).expect("serialize");
        assert!(json.contains("\"role\":\"Candidate\""));
    }
}
