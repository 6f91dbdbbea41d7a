//! Mint instructions for the destination chain.
//!
//! Given a confirmed deposit, a signing key and a nonce, builds and signs the
//! `mintTokens` transaction for the destination bridge. Nothing here touches
//! the network: the instruction is returned to the caller, which decides what
//! to do with it.

pub mod builder;

pub use builder::{build_mint_instruction, BuildError, InstructionBuilder, MintBuilder};

use alloy_primitives::{Address, Bytes, B256};
use serde::Serialize;

/// A signed, ready-to-broadcast mint transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintInstruction {
    /// Destination bridge contract
    pub to: Address,
    /// Relayer account that signed the transaction
    pub from: Address,
    /// Destination account nonce the transaction was built with
    pub nonce: u64,
    /// ABI-encoded `mintTokens` call
    pub data: Bytes,
    /// 65 byte `r || s || v` signature over the transaction
    pub signature: Bytes,
    /// EIP-2718 encoded signed transaction
    pub raw_transaction: Bytes,
    /// Hash of the signed transaction
    pub tx_hash: B256,
}
