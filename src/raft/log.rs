use serde::{Deserialize, Serialize};

use super::Term;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: Term,
    pub command: Vec<u8>,
}

/// In-memory, 1-indexed replicated log.
///
/// The election core only reads `last_index`/`last_term`; appends belong to
/// a replication layer built on top of it.
#[derive(Debug)]
pub struct Log {
    entries: Vec<LogEntry>,
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl Log {
    pub fn new() -> Self {
        // Dummy entry at index 0 so real entries start at 1
        Self {
            entries: vec![LogEntry {
                term: 0,
                command: Vec::new(),
            }],
        }
    }

    pub fn last_index(&self) -> u64 {
        self.entries.len() as u64 - 1
    }

    pub fn last_term(&self) -> Term {
        self.entries.last().map(|e| e.term).unwrap_or(0)
    }

    pub fn term_at(&self, index: u64) -> Option<Term> {
        if index == 0 {
            return Some(0);
        }

        self.entries.get(index as usize).map(|e| e.term)
    }

    /// Append an entry and return its index.
    pub fn append(&mut self, entry: LogEntry) -> u64 {
        self.entries.push(entry);
        self.last_index()
    }

    pub fn get_entry(&self, index: u64) -> Option<&LogEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_initializes_dummy_entry() {
        let log = Log::new();

        assert!(log.is_empty());
        assert_eq!(log.last_index(), 0);
        assert_eq!(log.last_term(), 0);
        assert_eq!(log.term_at(0), Some(0));
        assert!(log.get_entry(0).is_none());
    }

    #[test]
    fn append_assigns_consecutive_indices() {
        let mut log = Log::new();
        let idx1 = log.append(LogEntry {
            term: 1,
            command: b"set x 1".to_vec(),
        });
        let idx2 = log.append(LogEntry {
            term: 3,
            command: b"set x 2".to_vec(),
        });

        assert_eq!(idx1, 1);
        assert_eq!(idx2, 2);
        assert_eq!(log.last_term(), 3);
        assert_eq!(log.term_at(1), Some(1));
        assert_eq!(log.term_at(5), None);
        assert_eq!(
            log.get_entry(2).map(|e| e.command.as_slice()),
            Some(&b"set x 2"[..])
        );
    }
}
