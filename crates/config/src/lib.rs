//! Configuration types for the relayer.
//!
//! This crate provides:
//! - Relay parameters (confirmation depth, batch size, polling, retries)
//! - Mint transaction parameters
//! - Validation producing [`ConfigError`]

pub mod params;

pub use params::{
    ConfigError, MintParams, RelayParams, DEFAULT_CONFIRMATIONS, DEFAULT_MINT_GAS_LIMIT,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SCAN_BATCH_SIZE,
};
