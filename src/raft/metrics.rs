use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RaftMetrics {
    elections_started: AtomicU64,
    elections_won: AtomicU64,
    votes_granted: AtomicU64,
    votes_denied: AtomicU64,
    heartbeats_sent: AtomicU64,
    heartbeats_accepted: AtomicU64,
    stale_rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub elections_started: u64,
    pub elections_won: u64,
    pub votes_granted: u64,
    pub votes_denied: u64,
    pub heartbeats_sent: u64,
    pub heartbeats_accepted: u64,
    pub stale_rejected: u64,
}

impl RaftMetrics {
    pub fn record_election_started(&self) {
        self.elections_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_election_won(&self) {
        self.elections_won.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vote(&self, granted: bool) {
        if granted {
            self.votes_granted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.votes_denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_heartbeats_sent(&self, count: u64) {
        self.heartbeats_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_heartbeat_accepted(&self) {
        self.heartbeats_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_rejected(&self) {
        self.stale_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elections_started: self.elections_started.load(Ordering::Relaxed),
            elections_won: self.elections_won.load(Ordering::Relaxed),
            votes_granted: self.votes_granted.load(Ordering::Relaxed),
            votes_denied: self.votes_denied.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            heartbeats_accepted: self.heartbeats_accepted.load(Ordering::Relaxed),
            stale_rejected: self.stale_rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = RaftMetrics::default();
        metrics.record_vote(true);
        metrics.record_vote(false);
        metrics.record_vote(false);
        metrics.record_heartbeats_sent(2);
        metrics.record_heartbeats_sent(2);

        let snap = metrics.snapshot();
        assert_eq!(snap.votes_granted, 1);
        assert_eq!(snap.votes_denied, 2);
        assert_eq!(snap.heartbeats_sent, 4);
        assert_eq!(snap.elections_started, 0);
    }
}
