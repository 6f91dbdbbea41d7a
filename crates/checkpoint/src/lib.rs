//! Durable scanning progress.
//!
//! A [`Checkpoint`] records the last fully processed block and every deposit
//! id that has been handed to the transaction builder. The engine owns the
//! live copy; a [`CheckpointStore`] owns the persisted one.

pub mod ledger;
pub mod store;

pub use ledger::DedupLedger;
pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};

use deposit::DepositId;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, path::PathBuf};
use thiserror::Error;

/// Scanning progress as persisted between runs.
///
/// Serialized as
/// `{"last_processed_block": n, "processed_transactions": ["0x..", ..]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Highest block whose events have all been handled
    pub last_processed_block: u64,

    /// Deposits already handed to the builder
    #[serde(rename = "processed_transactions")]
    pub processed_ids: BTreeSet<DepositId>,
}

impl Checkpoint {
    pub const fn new(last_processed_block: u64, processed_ids: BTreeSet<DepositId>) -> Self {
        Self {
            last_processed_block,
            processed_ids,
        }
    }

    /// Checkpoint for a relayer that has not scanned anything yet.
    ///
    /// The first window will start at `start_block`.
    pub const fn initial(start_block: u64) -> Self {
        Self {
            last_processed_block: start_block.saturating_sub(1),
            processed_ids: BTreeSet::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("checkpoint would move backwards from block {current} to {attempted}")]
    Regression { current: u64, attempted: u64 },

    #[error("checkpoint store unavailable: {0}")]
    Unavailable(String),
}
