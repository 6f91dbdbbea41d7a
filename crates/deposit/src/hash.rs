use crate::event::DepositId;
use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::SolValue;

/// Derive the identifier of a deposit from the log that announced it.
///
/// `keccak256(abi.encode(txHash, uint256(logIndex)))`. A transaction can lock
/// several times, so the log index is part of the identity.
pub fn compute_deposit_id(tx_hash: B256, log_index: u64) -> DepositId {
    let encoded = (tx_hash, U256::from(log_index)).abi_encode_sequence();
    keccak256(encoded)
}
