//! Relay tuning parameters.
//!
//! These are immutable inputs for the lifetime of a relay engine. Defaults
//! mirror the listener's environment defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default number of blocks required on top of a block before it is final.
pub const DEFAULT_CONFIRMATIONS: u64 = 12;
/// Default width of one scan window.
pub const DEFAULT_SCAN_BATCH_SIZE: u64 = 500;
/// Default sleep between cycles.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
/// Default gas limit for a mint transaction.
pub const DEFAULT_MINT_GAS_LIMIT: u64 = 200_000;

/// Invalid configuration, detected at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("block_confirmations_required must be at least 1")]
    ZeroConfirmations,

    #[error("scan_batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("poll_interval_secs must be at least 1")]
    ZeroPollInterval,

    #[error("rpc_timeout_secs must be at least 1")]
    ZeroRpcTimeout,

    #[error("start_block must be at least 1, got 0")]
    ZeroStartBlock,

    #[error("max_fee_per_gas ({max_fee}) is below max_priority_fee_per_gas ({priority_fee})")]
    FeeInversion { max_fee: u128, priority_fee: u128 },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Scanning, polling and retry parameters for the relay engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayParams {
    /// Blocks that must exist on top of a block before it is scanned
    pub block_confirmations_required: u64,

    /// Maximum number of blocks in one scan window
    pub scan_batch_size: u64,

    /// Sleep between cycles when there is nothing new to scan
    pub poll_interval_secs: u64,

    /// Upper bound for a single RPC call
    pub rpc_timeout_secs: u64,

    /// Retries of a failed RPC call before the cycle gives up
    pub max_retries: usize,

    /// Base of the exponential backoff between retries, in milliseconds
    pub retry_base_delay_ms: u64,

    /// Cap on a single backoff wait
    pub max_backoff_secs: u64,
}

impl Default for RelayParams {
    fn default() -> Self {
        Self {
            block_confirmations_required: DEFAULT_CONFIRMATIONS,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            rpc_timeout_secs: 30,
            max_retries: 5,
            retry_base_delay_ms: 100,
            max_backoff_secs: 30,
        }
    }
}

impl RelayParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_confirmations_required == 0 {
            return Err(ConfigError::ZeroConfirmations);
        }
        if self.scan_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.rpc_timeout_secs == 0 {
            return Err(ConfigError::ZeroRpcTimeout);
        }
        Ok(())
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

/// Destination transaction parameters used when building mint instructions.
///
/// Fees are fixed inputs so that the same deposit and nonce always produce
/// the same signed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    /// Destination chain id (EIP-155 replay protection)
    pub chain_id: u64,
    /// Gas limit for `mintTokens`
    pub gas_limit: u64,
    /// EIP-1559 max fee per gas, in wei
    pub max_fee_per_gas: u128,
    /// EIP-1559 priority fee per gas, in wei
    pub max_priority_fee_per_gas: u128,
}

impl MintParams {
    pub const fn new(chain_id: u64, max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Self {
        Self {
            chain_id,
            gas_limit: DEFAULT_MINT_GAS_LIMIT,
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }
    }

    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fee_per_gas < self.max_priority_fee_per_gas {
            return Err(ConfigError::FeeInversion {
                max_fee: self.max_fee_per_gas,
                priority_fee: self.max_priority_fee_per_gas,
            });
        }
        Ok(())
    }
}
