use crate::hash::compute_deposit_id;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Identifier of a deposit, unique per source chain log.
pub type DepositId = B256;

/// A confirmed-or-pending lock on the source chain.
///
/// Built only by a decoder, after every field has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    /// Derived from `(tx_hash, log_index)`
    pub deposit_id: DepositId,
    /// Source chain block that contains the lock
    pub block_number: u64,
    /// Position of the log within its block
    pub log_index: u64,
    /// Source chain transaction hash
    pub tx_hash: B256,
    /// Account that locked the tokens
    pub sender: Address,
    /// Account credited on the destination chain
    pub recipient: Address,
    /// Locked token on the source chain
    pub token: Address,
    /// Locked amount
    pub amount: U256,
}

impl DepositEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        block_number: u64,
        log_index: u64,
        tx_hash: B256,
        sender: Address,
        recipient: Address,
        token: Address,
        amount: U256,
    ) -> Self {
        Self {
            deposit_id: compute_deposit_id(tx_hash, log_index),
            block_number,
            log_index,
            tx_hash,
            sender,
            recipient,
            token,
            amount,
        }
    }

    /// Chain position, used to process a window in order.
    pub const fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}
