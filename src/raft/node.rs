use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
// Use external log crate, not our own log module
use ::log::{debug, info};

use super::metrics::{MetricsSnapshot, RaftMetrics};
use super::{
    Log, NodeId, NodeRole, NodeState, NodeStatus, RaftConfig, RaftEvent, RandomTimeouts, Term,
    TimeoutSource, Transport,
};

const EVENT_CAPACITY: usize = 1024;

/// Everything guarded by the node lock.
pub(super) struct Inner {
    pub(super) state: NodeState,
    pub(super) election_timeout: Duration,
    pub(super) last_heartbeat: Instant,
    pub(super) stopped: bool,
    pub(super) log: Log,
}

pub struct RaftNode {
    id: NodeId,
    config: RaftConfig,

    pub(super) transport: Arc<dyn Transport>,

    inner: Mutex<Inner>,
    started: AtomicBool,

    events: broadcast::Sender<RaftEvent>,
    pub(super) metrics: RaftMetrics,
}

impl RaftNode {
    pub fn new(config: RaftConfig, transport: Arc<dyn Transport>) -> Self {
        let election_timeout =
            RandomTimeouts::new(config.election_timeout_min, config.election_timeout_max)
                .election_timeout(config.node_id);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            id: config.node_id,
            config,
            transport,
            inner: Mutex::new(Inner {
                state: NodeState::default(),
                election_timeout,
                last_heartbeat: Instant::now(),
                stopped: false,
                log: Log::new(),
            }),
            started: AtomicBool::new(false),
            events,
            metrics: RaftMetrics::default(),
        }
    }

    /// Draw this node's election timeout from `timeouts` instead. The value
    /// is fixed for the node's lifetime.
    pub fn with_timeouts(mut self, timeouts: Arc<dyn TimeoutSource>) -> Self {
        let election_timeout = timeouts.election_timeout(self.id);
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .election_timeout = election_timeout;
        self
    }

    /// Publish events on a channel shared with other nodes.
    pub fn with_events(mut self, events: broadcast::Sender<RaftEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    pub fn role(&self) -> NodeRole {
        self.lock().state.role
    }

    pub fn current_term(&self) -> Term {
        self.lock().state.current_term
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role(), NodeRole::Leader)
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub fn election_timeout(&self) -> Duration {
        self.lock().election_timeout
    }

    pub fn last_log_index(&self) -> u64 {
        self.lock().log.last_index()
    }

    pub fn status(&self) -> NodeStatus {
        let inner = self.lock();
        NodeStatus {
            id: self.id,
            role: inner.state.role,
            current_term: inner.state.current_term,
            voted_for: inner.state.voted_for,
            leader_id: inner.state.leader_id,
            stopped: inner.stopped,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaftEvent> {
        self.events.subscribe()
    }

    /// Spawn the role-dispatch loop. Only the first call on a node that has
    /// not been stopped spawns anything.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }

        {
            let mut inner = self.lock();
            if inner.stopped {
                return None;
            }
            // The timeout window starts when the node does, not when it was built
            inner.last_heartbeat = Instant::now();
        }

        info!(
            "Node {} starting as Follower (election timeout {:?}, {} peers)",
            self.id,
            self.election_timeout(),
            self.config.peers.len()
        );
        Some(tokio::spawn(Arc::clone(self).run()))
    }

    /// Terminal and idempotent. Runners and handlers observe the flag at
    /// their next lock acquisition and stop mutating state.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.stopped {
            return;
        }
        inner.stopped = true;
        info!(
            "Node {} stopped as {} at term {}",
            self.id, inner.state.role, inner.state.current_term
        );
        self.emit(RaftEvent::Stopped {
            node: self.id,
            term: inner.state.current_term,
        });
    }

    /// RequestVote RPC handler.
    pub fn handle_request_vote(&self, term: Term, candidate_id: NodeId) -> bool {
        let mut inner = self.lock();
        if inner.stopped {
            return false;
        }

        if term < inner.state.current_term {
            debug!(
                "Node {} rejecting stale RequestVote from {} (term {} < {})",
                self.id, candidate_id, term, inner.state.current_term
            );
            self.metrics.record_stale_rejected();
            self.metrics.record_vote(false);
            return false;
        }

        if term > inner.state.current_term {
            let previous = inner.state.adopt_term(term);
            self.note_step_down(previous, term);
        }

        let can_vote = match inner.state.voted_for {
            None => true,
            Some(voted) => voted == candidate_id,
        };
        self.metrics.record_vote(can_vote);

        if !can_vote {
            debug!(
                "Node {} denying vote to {} for term {} (already voted for {:?})",
                self.id, candidate_id, term, inner.state.voted_for
            );
            return false;
        }

        debug_assert!(
            inner.state.voted_for.map_or(true, |v| v == candidate_id),
            "node {} voting twice in term {}",
            self.id,
            term
        );
        // A repeated request from the same candidate is granted again but
        // only the first grant is published.
        if inner.state.voted_for.is_none() {
            inner.state.voted_for = Some(candidate_id);
            self.emit(RaftEvent::VoteGranted {
                voter: self.id,
                candidate: candidate_id,
                term,
            });
        }
        inner.last_heartbeat = Instant::now();
        debug!(
            "Node {} granted vote to {} for term {}",
            self.id, candidate_id, term
        );
        true
    }

    /// AppendEntries RPC handler; entries are carried by the replication
    /// layer, the election core only sees the heartbeat.
    pub fn handle_append_entries(&self, term: Term, leader_id: NodeId) -> bool {
        let mut inner = self.lock();
        if inner.stopped {
            return false;
        }

        if term < inner.state.current_term {
            debug!(
                "Node {} rejecting stale AppendEntries from {} (term {} < {})",
                self.id, leader_id, term, inner.state.current_term
            );
            self.metrics.record_stale_rejected();
            return false;
        }

        if term > inner.state.current_term {
            let previous = inner.state.adopt_term(term);
            self.note_step_down(previous, term);
        } else if inner.state.role != NodeRole::Follower {
            debug_assert_ne!(
                inner.state.role,
                NodeRole::Leader,
                "two leaders ({} and {}) in term {}",
                self.id,
                leader_id,
                term
            );
            let previous = inner.state.role;
            inner.state.role = NodeRole::Follower;
            self.note_step_down(previous, term);
        }

        inner.state.leader_id = Some(leader_id);
        inner.last_heartbeat = Instant::now();
        self.metrics.record_heartbeat_accepted();
        true
    }

    async fn run(self: Arc<Self>) {
        loop {
            let role = {
                let inner = self.lock();
                if inner.stopped {
                    break;
                }
                inner.state.role
            };

            match role {
                NodeRole::Follower => self.run_follower().await,
                NodeRole::Candidate => self.run_candidate().await,
                NodeRole::Leader => self.run_leader().await,
            }
        }
        debug!("Node {} run loop exited", self.id);
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn emit(&self, event: RaftEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    pub(super) fn note_step_down(&self, from: NodeRole, term: Term) {
        if from == NodeRole::Follower {
            return;
        }
        info!("Node {} stepping down from {} at term {}", self.id, from, term);
        self.emit(RaftEvent::SteppedDown {
            node: self.id,
            term,
            from,
        });
    }
}
