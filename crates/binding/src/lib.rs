//! Contract bindings for the bridge contracts.
//!
//! This crate holds the Solidity interfaces the relayer touches:
//! - the source chain lock contract (`TokensLocked` event)
//! - the destination chain mint contract (`mintTokens` call)
//!
//! All bindings are generated using alloy's `sol!` macro.

pub mod bridge;

pub use bridge::{IDestinationBridge, ISourceBridge};
