use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::raft::{NodeId, RaftConfig, RaftError};

/// Description of a whole in-process cluster, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeId>,
    pub election_timeout_min_ms: u64,
    pub election_timeout_max_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Seed for election timeout draws; `None` uses the thread RNG.
    pub seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::with_nodes(3)
    }
}

impl ClusterConfig {
    /// Cluster of `count` nodes with ids `0..count` and default timings.
    pub fn with_nodes(count: usize) -> Self {
        Self {
            nodes: (0..count as NodeId).collect(),
            election_timeout_min_ms: 150,
            election_timeout_max_ms: 300,
            heartbeat_interval_ms: 50,
            seed: None,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RaftError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ClusterConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RaftError> {
        let encoded = serde_json::to_string_pretty(self)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RaftError> {
        if self.nodes.is_empty() {
            return Err(RaftError::InvalidConfig(
                "cluster needs at least one node".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for id in &self.nodes {
            if !seen.insert(*id) {
                return Err(RaftError::InvalidConfig(format!("duplicate node id {id}")));
            }
        }

        // Timing rules are shared by every member
        self.node_config(self.nodes[0])?.validate()
    }

    /// Per-node configuration: every other member becomes a peer.
    pub fn node_config(&self, id: NodeId) -> Result<RaftConfig, RaftError> {
        if !self.nodes.contains(&id) {
            return Err(RaftError::UnknownPeer(id));
        }

        let mut config = RaftConfig::new(id);
        config.election_timeout_min = self.election_timeout_min_ms;
        config.election_timeout_max = self.election_timeout_max_ms;
        config.heartbeat_interval = self.heartbeat_interval_ms;
        for peer in self.nodes.iter().copied().filter(|peer| *peer != id) {
            config.add_peer(peer);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_values_are_sensible() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.nodes, vec![0, 1, 2]);
        assert_eq!(cfg.election_timeout_min_ms, 150);
        assert_eq!(cfg.election_timeout_max_ms, 300);
        assert_eq!(cfg.heartbeat_interval_ms, 50);
        assert!(cfg.seed.is_none());
        cfg.validate().expect("default validates");
    }

    #[test]
    fn node_config_excludes_self_from_peers() {
        let cfg = ClusterConfig::with_nodes(5);
        let node = cfg.node_config(3).expect("member");
        assert_eq!(node.node_id, 3);
        assert_eq!(node.peers, vec![0, 1, 2, 4]);
        assert_eq!(node.cluster_size(), 5);

        assert!(matches!(cfg.node_config(7), Err(RaftError::UnknownPeer(7))));
    }

    #[test]
    fn rejects_empty_and_duplicate_members() {
        let mut cfg = ClusterConfig::with_nodes(0);
        assert!(cfg.validate().is_err());

        cfg.nodes = vec![1, 2, 1];
        assert!(matches!(cfg.validate(), Err(RaftError::InvalidConfig(_))));
    }

    #[test]
    fn save_and_load_from_file() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("cluster.json");

        let mut cfg = ClusterConfig::with_nodes(5);
        cfg.seed = Some(7);
        cfg.save(&path).expect("save");

        let loaded = ClusterConfig::from_file(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("cluster.json");
        std::fs::write(&path, r#"{ "nodes": [10, 20, 30], "heartbeat_interval_ms": 20 }"#)
            .expect("write");

        let cfg = ClusterConfig::from_file(&path).expect("load");
        assert_eq!(cfg.nodes, vec![10, 20, 30]);
        assert_eq!(cfg.heartbeat_interval_ms, 20);
        assert_eq!(cfg.election_timeout_min_ms, 150);
    }

    #[test]
    fn invalid_timing_in_file_is_rejected() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("cluster.json");
        std::fs::write(&path, r#"{ "heartbeat_interval_ms": 500 }"#).expect("write");

        assert!(matches!(
            ClusterConfig::from_file(&path),
            Err(RaftError::InvalidConfig(_))
        ));
    }
}
