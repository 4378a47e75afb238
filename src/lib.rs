pub mod config;
pub mod raft;

// Public exports
pub use config::ClusterConfig;
pub use raft::{Cluster, NodeId, NodeRole, NodeStatus, RaftError, RaftEvent, RaftNode, Term};
