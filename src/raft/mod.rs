mod cluster;
mod config;
mod error;
mod log;
mod metrics;
mod node;
mod roles;
mod state;
mod timer;
mod transport;

pub use self::cluster::Cluster;
pub use self::config::RaftConfig;
pub use self::error::RaftError;
pub use self::log::{Log, LogEntry};
pub use self::metrics::{MetricsSnapshot, RaftMetrics};
pub use self::node::RaftNode;
pub use self::state::{quorum, NodeId, NodeRole, NodeState, NodeStatus, RaftEvent, Term};
pub use self::timer::{RandomTimeouts, SeededTimeouts, TimeoutSource};
pub use self::transport::{LocalTransport, Transport};
