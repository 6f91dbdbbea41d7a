use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive block range, `from_block <= to_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl ScanWindow {
    /// Number of blocks covered by the window.
    pub const fn len(&self) -> u64 {
        self.to_block - self.from_block + 1
    }

    pub const fn contains(&self, block: u64) -> bool {
        block >= self.from_block && block <= self.to_block
    }
}

impl fmt::Display for ScanWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from_block, self.to_block)
    }
}

/// Highest block considered final for a given head.
pub const fn safe_head(chain_head: u64, confirmations: u64) -> u64 {
    chain_head.saturating_sub(confirmations)
}

/// Compute the next window to scan.
///
/// Returns `None` when no block above `last_processed` has reached
/// `confirmations` depth yet. That is the steady state between blocks, not
/// an error.
///
/// The returned window never extends past `chain_head - confirmations`.
/// A `max_batch` of zero is treated as one.
pub fn plan(
    chain_head: u64,
    last_processed: u64,
    confirmations: u64,
    max_batch: u64,
) -> Option<ScanWindow> {
    let safe = safe_head(chain_head, confirmations);
    if safe <= last_processed {
        return None;
    }

    let from_block = last_processed + 1;
    let width = max_batch.max(1);
    let to_block = from_block.saturating_add(width - 1).min(safe);

    Some(ScanWindow {
        from_block,
        to_block,
    })
}
