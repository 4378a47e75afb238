use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
// Use external log crate, not our own log module
use ::log::{info, warn};

use super::{
    LocalTransport, NodeId, NodeRole, NodeStatus, RaftError, RaftEvent, RaftNode,
    RandomTimeouts, SeededTimeouts, TimeoutSource, Transport,
};
use crate::config::ClusterConfig;

const EVENT_CAPACITY: usize = 4096;
const LEADER_POLL: Duration = Duration::from_millis(10);

/// Owns every node of an in-process cluster and the transport wiring them
/// together. Stopping a node is the failure-injection primitive.
pub struct Cluster {
    nodes: Vec<Arc<RaftNode>>,
    transport: Arc<LocalTransport>,
    events: broadcast::Sender<RaftEvent>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Cluster {
    pub fn new(config: &ClusterConfig) -> Result<Self, RaftError> {
        let timeouts: Arc<dyn TimeoutSource> = match config.seed {
            Some(seed) => Arc::new(SeededTimeouts::new(
                config.election_timeout_min_ms,
                config.election_timeout_max_ms,
                seed,
            )),
            None => Arc::new(RandomTimeouts::new(
                config.election_timeout_min_ms,
                config.election_timeout_max_ms,
            )),
        };
        Self::with_timeouts(config, timeouts)
    }

    pub fn with_timeouts(
        config: &ClusterConfig,
        timeouts: Arc<dyn TimeoutSource>,
    ) -> Result<Self, RaftError> {
        config.validate()?;

        let transport = Arc::new(LocalTransport::new());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let mut nodes = Vec::with_capacity(config.nodes.len());
        for &id in &config.nodes {
            let node_config = config.node_config(id)?;
            node_config.validate()?;
            let shared: Arc<dyn Transport> = transport.clone();
            let node = RaftNode::new(node_config, shared)
                .with_timeouts(Arc::clone(&timeouts))
                .with_events(events.clone());
            nodes.push(Arc::new(node));
        }
        transport.register(&nodes)?;

        Ok(Self {
            nodes,
            transport,
            events,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Start every node that has not been started yet.
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for node in &self.nodes {
            if let Some(handle) = node.start() {
                handles.push(handle);
            }
        }
        info!("Cluster of {} nodes started", self.nodes.len());
    }

    pub fn nodes(&self) -> &[Arc<RaftNode>] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Arc<RaftNode>> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub fn stop_node(&self, id: NodeId) -> Result<(), RaftError> {
        let node = self.node(id).ok_or(RaftError::UnknownPeer(id))?;
        warn!("Stopping node {id}");
        node.stop();
        Ok(())
    }

    /// Cut a node off from every peer without stopping it.
    pub fn isolate(&self, id: NodeId) {
        warn!("Isolating node {id}");
        self.transport.isolate(id);
    }

    pub fn heal(&self, id: NodeId) {
        info!("Healing node {id}");
        self.transport.heal(id);
    }

    pub fn heal_all(&self) {
        info!("Healing all partitions");
        self.transport.heal_all();
    }

    pub fn is_isolated(&self, id: NodeId) -> bool {
        self.transport.is_isolated(id)
    }

    pub fn status(&self) -> Vec<NodeStatus> {
        self.nodes.iter().map(|node| node.status()).collect()
    }

    /// Running nodes that currently believe they are Leader.
    pub fn leaders(&self) -> Vec<NodeStatus> {
        self.status()
            .into_iter()
            .filter(|s| !s.stopped && s.role == NodeRole::Leader)
            .collect()
    }

    /// The running leader with the newest term, if any.
    pub fn leader(&self) -> Option<NodeStatus> {
        self.leaders().into_iter().max_by_key(|s| s.current_term)
    }

    /// Poll until some running node is Leader or `timeout` elapses.
    pub async fn wait_for_leader(&self, timeout: Duration) -> Option<NodeStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(leader) = self.leader() {
                return Some(leader);
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(LEADER_POLL).await;
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaftEvent> {
        self.events.subscribe()
    }

    /// Stop every node and wait for their run loops to exit.
    pub async fn shutdown(&self) {
        for node in &self.nodes {
            node.stop();
        }

        let handles = {
            let mut guard = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Node task ended abnormally: {e}");
            }
        }
        info!("Cluster shut down");
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for node in &self.nodes {
            node.stop();
        }
    }
}
