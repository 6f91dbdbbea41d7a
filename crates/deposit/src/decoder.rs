use crate::event::DepositEvent;
use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types_eth::Log;
use alloy_sol_types::SolEvent;
use binding::ISourceBridge::TokensLocked;
use thiserror::Error;

/// A log that could not be turned into a [`DepositEvent`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log was removed by a reorg")]
    Removed,

    #[error("log emitted by {actual}, expected {expected}")]
    UnexpectedContract { expected: Address, actual: Address },

    #[error("log has no topics")]
    MissingSignature,

    #[error("unexpected event signature {0}")]
    UnexpectedSignature(B256),

    #[error("abi decoding failed: {0}")]
    Abi(String),

    #[error("log is missing {0}")]
    MissingField(&'static str),

    #[error("recipient is the zero address")]
    ZeroRecipient,

    #[error("amount is zero")]
    ZeroAmount,
}

/// Turns raw logs into typed deposit events.
pub trait EventDecoder: Send + Sync {
    /// Contract whose logs this decoder accepts.
    fn contract(&self) -> Address;

    /// Topic0 of the logs this decoder understands.
    fn event_signature(&self) -> B256;

    fn decode(&self, log: &Log) -> Result<DepositEvent, DecodeError>;
}

/// Decoder for `ISourceBridge.TokensLocked` logs from one contract.
///
/// `TokensLocked` carries no token, so every decoded deposit is tagged with
/// the token the bridge was configured with.
#[derive(Debug, Clone)]
pub struct TokensLockedDecoder {
    contract: Address,
    token: Address,
}

impl TokensLockedDecoder {
    pub const fn new(contract: Address, token: Address) -> Self {
        Self { contract, token }
    }
}

impl EventDecoder for TokensLockedDecoder {
    fn contract(&self) -> Address {
        self.contract
    }

    fn event_signature(&self) -> B256 {
        TokensLocked::SIGNATURE_HASH
    }

    fn decode(&self, log: &Log) -> Result<DepositEvent, DecodeError> {
        if log.removed {
            return Err(DecodeError::Removed);
        }

        if log.inner.address != self.contract {
            return Err(DecodeError::UnexpectedContract {
                expected: self.contract,
                actual: log.inner.address,
            });
        }

        let topic0 = log
            .inner
            .data
            .topics()
            .first()
            .copied()
            .ok_or(DecodeError::MissingSignature)?;
        if topic0 != TokensLocked::SIGNATURE_HASH {
            return Err(DecodeError::UnexpectedSignature(topic0));
        }

        let event = TokensLocked::decode_log_data(&log.inner.data)
            .map_err(|e| DecodeError::Abi(e.to_string()))?;

        let tx_hash = log
            .transaction_hash
            .ok_or(DecodeError::MissingField("transaction hash"))?;
        let block_number = log
            .block_number
            .ok_or(DecodeError::MissingField("block number"))?;
        let log_index = log
            .log_index
            .ok_or(DecodeError::MissingField("log index"))?;

        if event.recipient == Address::ZERO {
            return Err(DecodeError::ZeroRecipient);
        }
        if event.amount == U256::ZERO {
            return Err(DecodeError::ZeroAmount);
        }

        Ok(DepositEvent::new(
            block_number,
            log_index,
            tx_hash,
            event.sender,
            event.recipient,
            self.token,
            event.amount,
        ))
    }
}
