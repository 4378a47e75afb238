use std::collections::HashSet;
use std::time::Duration;

use super::{NodeId, RaftError};

/// Follower polls for an expired election timeout this many times per
/// minimum timeout.
const POLLS_PER_TIMEOUT: u64 = 7;

#[derive(Debug, Clone)]
pub struct RaftConfig {
    pub node_id: NodeId,
    pub peers: Vec<NodeId>,
    pub election_timeout_min: u64, // in milliseconds
    pub election_timeout_max: u64, // in milliseconds
    pub heartbeat_interval: u64,   // in milliseconds
}

impl RaftConfig {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            peers: Vec::new(),
            election_timeout_min: 150,
            election_timeout_max: 300,
            heartbeat_interval: 50,
        }
    }

    pub fn add_peer(&mut self, peer_id: NodeId) {
        self.peers.push(peer_id);
    }

    pub fn with_peers(mut self, peers: impl IntoIterator<Item = NodeId>) -> Self {
        self.peers.extend(peers);
        self
    }

    /// Number of voting members, self included.
    pub fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis((self.election_timeout_min / POLLS_PER_TIMEOUT).max(1))
    }

    pub fn validate(&self) -> Result<(), RaftError> {
        if self.election_timeout_min == 0 {
            return Err(RaftError::InvalidConfig(
                "election_timeout_min must be positive".to_string(),
            ));
        }
        if self.election_timeout_min > self.election_timeout_max {
            return Err(RaftError::InvalidConfig(format!(
                "election_timeout_min ({}) exceeds election_timeout_max ({})",
                self.election_timeout_min, self.election_timeout_max
            )));
        }
        if self.heartbeat_interval == 0 || self.heartbeat_interval >= self.election_timeout_min {
            return Err(RaftError::InvalidConfig(format!(
                "heartbeat_interval ({}) must be positive and below election_timeout_min ({})",
                self.heartbeat_interval, self.election_timeout_min
            )));
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if *peer == self.node_id {
                return Err(RaftError::InvalidConfig(format!(
                    "node {} lists itself as a peer",
                    self.node_id
                )));
            }
            if !seen.insert(*peer) {
                return Err(RaftError::InvalidConfig(format!("duplicate peer {peer}")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RaftConfig::new(0).with_peers([1, 2]);
        cfg.validate().expect("default config validates");
        assert_eq!(cfg.cluster_size(), 3);
        assert_eq!(cfg.heartbeat(), Duration::from_millis(50));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(21));
    }

    #[test]
    fn rejects_heartbeat_not_below_min_timeout() {
        let mut cfg = RaftConfig::new(0);
        cfg.heartbeat_interval = 150;
        assert!(matches!(cfg.validate(), Err(RaftError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_inverted_timeout_range() {
        let mut cfg = RaftConfig::new(0);
        cfg.election_timeout_min = 400;
        assert!(matches!(cfg.validate(), Err(RaftError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_self_and_duplicate_peers() {
        let cfg = RaftConfig::new(1).with_peers([1]);
        assert!(cfg.validate().is_err());

        let cfg = RaftConfig::new(1).with_peers([2, 2]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn poll_interval_never_zero() {
        let mut cfg = RaftConfig::new(0);
        cfg.election_timeout_min = 3;
        cfg.election_timeout_max = 3;
        cfg.heartbeat_interval = 1;
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
    }
}
