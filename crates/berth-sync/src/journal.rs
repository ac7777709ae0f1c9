//! Commit journal
//!
//! Every confirmed table mutation becomes a [`BindCommit`] in an append-only
//! hash chain. Each commit id covers the previous id, the sequence number,
//! the stamp and the event payload, so a mirror that replays the chain can
//! detect both tampering and gaps. The journal is bounded; once it exceeds
//! [`MAX_COMMITS`] the oldest commits are dropped while sequence numbers
//! keep counting, and late mirrors fall back to a full snapshot.

use berth_pool::{PitCatalog, PitTable, TableEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commits retained in memory before the oldest are dropped
pub const MAX_COMMITS: usize = 4096;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv_feed(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// One confirmed table mutation in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindCommit {
    /// Chain hash of this commit
    pub id: u64,
    /// Chain hash of the previous commit, 0 for the first
    pub prev: u64,
    /// Position in the chain, starting at 1
    pub seq: u64,
    /// Coordinator clock at commit time, epoch milliseconds
    pub stamp: u64,
    /// The table mutation this commit records
    pub event: TableEvent,
}

/// Chain hash for a commit at the given position
pub fn commit_hash(prev: u64, seq: u64, stamp: u64, event: &TableEvent) -> u64 {
    let mut hash = FNV_OFFSET;
    hash = fnv_feed(hash, &prev.to_le_bytes());
    hash = fnv_feed(hash, &seq.to_le_bytes());
    hash = fnv_feed(hash, &stamp.to_le_bytes());
    let payload = serde_json::to_vec(event).unwrap_or_default();
    fnv_feed(hash, &payload)
}

/// Append-only chain of bind commits
#[derive(Debug, Default)]
pub struct BindJournal {
    commits: Vec<BindCommit>,
    head_seq: u64,
    head_id: u64,
}

impl BindJournal {
    /// An empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, returning the commit that now heads the chain
    pub fn append(&mut self, event: TableEvent, stamp: u64) -> BindCommit {
        let seq = self.head_seq + 1;
        let prev = self.head_id;
        let id = commit_hash(prev, seq, stamp, &event);
        let commit = BindCommit {
            id,
            prev,
            seq,
            stamp,
            event,
        };
        self.commits.push(commit.clone());
        self.head_seq = seq;
        self.head_id = id;
        if self.commits.len() > MAX_COMMITS {
            let excess = self.commits.len() - MAX_COMMITS;
            self.commits.drain(..excess);
        }
        commit
    }

    /// All retained commits, oldest first
    pub fn commits(&self) -> &[BindCommit] {
        &self.commits
    }

    /// Retained commits with a sequence number greater than `seq`
    pub fn commits_after(&self, seq: u64) -> &[BindCommit] {
        let start = self.commits.partition_point(|c| c.seq <= seq);
        &self.commits[start..]
    }

    /// Sequence number of the newest commit, 0 when empty
    pub fn head_seq(&self) -> u64 {
        self.head_seq
    }

    /// Chain hash of the newest commit, 0 when empty
    pub fn head_id(&self) -> u64 {
        self.head_id
    }

    /// Number of retained commits
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Whether any commits are retained
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Recompute every retained id and check the chain links up
    pub fn verify_integrity(&self) -> bool {
        for commit in &self.commits {
            if commit.id != commit_hash(commit.prev, commit.seq, commit.stamp, &commit.event) {
                return false;
            }
        }
        self.commits
            .windows(2)
            .all(|pair| pair[1].prev == pair[0].id && pair[1].seq == pair[0].seq + 1)
    }
}

/// Replay failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    /// A commit does not link to its predecessor
    #[error("broken chain at seq {seq}: expected prev {expected:#x}, found {found:#x}")]
    BrokenChain { seq: u64, expected: u64, found: u64 },
    /// A commit id does not match its own content
    #[error("forged commit at seq {seq}")]
    ForgedCommit { seq: u64 },
    /// Sequence numbers are not consecutive
    #[error("sequence gap between {prev} and {next}")]
    SequenceGap { prev: u64, next: u64 },
}

/// Rebuild a table by applying commits in order, without verification
pub fn replay(catalog: &PitCatalog, commits: &[BindCommit]) -> PitTable {
    let mut table = PitTable::new(catalog);
    for commit in commits {
        table.apply_event(&commit.event);
    }
    table
}

/// Rebuild a table by applying commits in order, verifying the chain first
pub fn replay_verified(
    catalog: &PitCatalog,
    commits: &[BindCommit],
) -> Result<PitTable, ReplayError> {
    for pair in commits.windows(2) {
        if pair[1].seq != pair[0].seq + 1 {
            return Err(ReplayError::SequenceGap {
                prev: pair[0].seq,
                next: pair[1].seq,
            });
        }
        if pair[1].prev != pair[0].id {
            return Err(ReplayError::BrokenChain {
                seq: pair[1].seq,
                expected: pair[0].id,
                found: pair[1].prev,
            });
        }
    }
    for commit in commits {
        if commit.id != commit_hash(commit.prev, commit.seq, commit.stamp, &commit.event) {
            return Err(ReplayError::ForgedCommit { seq: commit.seq });
        }
    }
    Ok(replay(catalog, commits))
}
