use crate::Checkpoint;
use deposit::DepositId;
use std::collections::BTreeSet;

/// Tracks which deposits have already been handed to the builder.
///
/// Check [`DedupLedger::is_new`] before building and call
/// [`DedupLedger::mark_processed`] only after the build succeeded, so a failed
/// build stays eligible for the next cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupLedger {
    processed: BTreeSet<DepositId>,
}

impl DedupLedger {
    pub const fn new(processed: BTreeSet<DepositId>) -> Self {
        Self { processed }
    }

    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self::new(checkpoint.processed_ids.clone())
    }

    pub fn is_new(&self, id: &DepositId) -> bool {
        !self.processed.contains(id)
    }

    /// Returns false if the id was already marked.
    pub fn mark_processed(&mut self, id: DepositId) -> bool {
        self.processed.insert(id)
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// Checkpoint covering everything up to `last_processed_block`.
    pub fn snapshot(&self, last_processed_block: u64) -> Checkpoint {
        Checkpoint::new(last_processed_block, self.processed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn test_mark_then_skip() {
        let mut ledger = DedupLedger::default();
        let id = B256::repeat_byte(0x01);

        assert!(ledger.is_new(&id));
        assert!(ledger.mark_processed(id));
        assert!(!ledger.is_new(&id));
        assert!(!ledger.mark_processed(id));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_seeded_from_checkpoint() {
        let ids = BTreeSet::from([B256::repeat_byte(0x01), B256::repeat_byte(0x02)]);
        let ledger = DedupLedger::from_checkpoint(&Checkpoint::new(10, ids.clone()));

        assert!(!ledger.is_new(&B256::repeat_byte(0x02)));
        assert!(ledger.is_new(&B256::repeat_byte(0x03)));
        assert_eq!(ledger.snapshot(20), Checkpoint::new(20, ids));
    }
}
