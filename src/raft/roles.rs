//! Role runners dispatched by the node's run loop. Each returns once the
//! node leaves the role it was invoked for (or is stopped).

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
// Use external log crate, not our own log module
use ::log::{debug, info};

use super::{quorum, NodeRole, RaftEvent, RaftNode, Term};

impl RaftNode {
    pub(super) async fn run_follower(&self) {
        let mut ticker = interval(self.config().poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let done = {
                let mut inner = self.lock();
                if inner.stopped || inner.state.role != NodeRole::Follower {
                    true
                } else if inner.last_heartbeat.elapsed() >= inner.election_timeout {
                    info!(
                        "Node {} election timeout elapsed, becoming Candidate (term {})",
                        self.id(),
                        inner.state.current_term + 1
                    );
                    inner.state.role = NodeRole::Candidate;
                    true
                } else {
                    false
                }
            };

            if done {
                return;
            }
        }
    }

    pub(super) async fn run_candidate(&self) {
        let (term, window) = {
            let mut inner = self.lock();
            if inner.stopped || inner.state.role != NodeRole::Candidate {
                return;
            }
            inner.state.current_term += 1;
            inner.state.voted_for = Some(self.id());
            inner.state.leader_id = None;
            inner.last_heartbeat = Instant::now();
            self.emit(RaftEvent::BecameCandidate {
                node: self.id(),
                term: inner.state.current_term,
            });
            (inner.state.current_term, inner.election_timeout)
        };
        self.metrics.record_election_started();
        info!("Node {} starting election for term {}", self.id(), term);

        let needed = quorum(self.config().cluster_size());
        let mut votes = 1usize; // Vote for self

        let mut pending = JoinSet::new();
        for &peer in &self.config().peers {
            let transport = Arc::clone(&self.transport);
            let candidate = self.id();
            pending.spawn(async move {
                match transport.request_vote(peer, term, candidate).await {
                    Ok(granted) => granted,
                    Err(e) => {
                        debug!("RequestVote {candidate} -> {peer} failed: {e}");
                        false
                    }
                }
            });
        }

        let deadline = sleep(window);
        tokio::pin!(deadline);

        while votes < needed {
            tokio::select! {
                joined = pending.join_next() => match joined {
                    Some(Ok(true)) => votes += 1,
                    Some(_) => {}
                    // Every peer answered
                    None => break,
                },
                _ = &mut deadline => {
                    // Requests already issued still complete
                    pending.detach_all();
                    self.abandon_candidacy(term, votes);
                    return;
                }
            }
        }

        pending.detach_all();
        self.conclude_election(term, votes, needed);
    }

    pub(super) async fn run_leader(&self) {
        let mut ticker = interval(self.config().heartbeat());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick is immediate, asserting leadership right away
            ticker.tick().await;

            let term = {
                let inner = self.lock();
                if inner.stopped || inner.state.role != NodeRole::Leader {
                    return;
                }
                inner.state.current_term
            };

            for &peer in &self.config().peers {
                let transport = Arc::clone(&self.transport);
                let leader = self.id();
                tokio::spawn(async move {
                    if let Err(e) = transport.append_entries(peer, term, leader).await {
                        debug!("Heartbeat {leader} -> {peer} failed: {e}");
                    }
                });
            }
            self.metrics
                .record_heartbeats_sent(self.config().peers.len() as u64);
            debug!("Leader {} sent heartbeats for term {}", self.id(), term);
        }
    }

    fn conclude_election(&self, term: Term, votes: usize, needed: usize) {
        let mut inner = self.lock();
        if inner.stopped
            || inner.state.role != NodeRole::Candidate
            || inner.state.current_term != term
        {
            debug!(
                "Node {} discarding election result for term {} (now term {}, {})",
                self.id(),
                term,
                inner.state.current_term,
                inner.state.role
            );
            return;
        }

        if votes >= needed {
            debug_assert!(
                votes <= self.config().cluster_size(),
                "{} votes counted in a cluster of {}",
                votes,
                self.config().cluster_size()
            );
            inner.state.role = NodeRole::Leader;
            inner.state.leader_id = Some(self.id());
            self.metrics.record_election_won();
            info!(
                "Node {} won election for term {} ({}/{} votes)",
                self.id(),
                term,
                votes,
                self.config().cluster_size()
            );
            self.emit(RaftEvent::BecameLeader {
                node: self.id(),
                term,
                votes,
            });
        } else {
            inner.state.role = NodeRole::Follower;
            inner.state.voted_for = None;
            info!(
                "Node {} lost election for term {} ({}/{} votes), returning to Follower",
                self.id(),
                term,
                votes,
                self.config().cluster_size()
            );
            self.emit(RaftEvent::SteppedDown {
                node: self.id(),
                term,
                from: NodeRole::Candidate,
            });
        }
    }

    /// The window closed before a quorum answered. The node stays Candidate
    /// so the run loop starts a fresh term.
    fn abandon_candidacy(&self, term: Term, votes: usize) {
        let inner = self.lock();
        if inner.stopped
            || inner.state.role != NodeRole::Candidate
            || inner.state.current_term != term
        {
            return;
        }
        debug!(
            "Node {} election for term {} timed out with {} votes",
            self.id(),
            term,
            votes
        );
    }
}
