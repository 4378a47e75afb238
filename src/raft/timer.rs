use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::NodeId;

/// Supplies election timeouts to nodes.
///
/// Each call is an independent draw. A node draws once, at construction,
/// and keeps that timeout for its lifetime.
pub trait TimeoutSource: Send + Sync {
    fn election_timeout(&self, node: NodeId) -> Duration;
}

/// Uniform draws from `[min_ms, max_ms]` using the thread-local RNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomTimeouts {
    min_ms: u64,
    max_ms: u64,
}

impl RandomTimeouts {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

impl TimeoutSource for RandomTimeouts {
    fn election_timeout(&self, _node: NodeId) -> Duration {
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(self.min_ms..=self.max_ms))
    }
}

/// Same distribution as [`RandomTimeouts`], drawn from a seeded generator so
/// that a run can be reproduced.
pub struct SeededTimeouts {
    min_ms: u64,
    max_ms: u64,
    rng: Mutex<StdRng>,
}

impl SeededTimeouts {
    pub fn new(min_ms: u64, max_ms: u64, seed: u64) -> Self {
        Self {
            min_ms,
            max_ms,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl TimeoutSource for SeededTimeouts {
    fn election_timeout(&self, _node: NodeId) -> Duration {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Duration::from_millis(rng.random_range(self.min_ms..=self.max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_timeouts_stay_in_range() {
        let source = RandomTimeouts::new(150, 300);
        for node in 0..200 {
            let t = source.election_timeout(node);
            assert!(t >= Duration::from_millis(150) && t <= Duration::from_millis(300));
        }
    }

    #[test]
    fn degenerate_range_is_fixed() {
        let source = RandomTimeouts::new(200, 200);
        assert_eq!(source.election_timeout(0), Duration::from_millis(200));
    }

    #[test]
    fn seeded_timeouts_are_reproducible() {
        let a = SeededTimeouts::new(150, 300, 42);
        let b = SeededTimeouts::new(150, 300, 42);
        let draws_a: Vec<_> = (0..10).map(|n| a.election_timeout(n)).collect();
        let draws_b: Vec<_> = (0..10).map(|n| b.election_timeout(n)).collect();
        assert_eq!(draws_a, draws_b);
    }
}
