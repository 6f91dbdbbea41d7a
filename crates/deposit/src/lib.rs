//! Deposit events observed on the source chain.
//!
//! This crate turns raw `TokensLocked` logs into typed [`DepositEvent`]s.
//! Every field is validated at decode time; a log that does not fully match
//! the schema is rejected with a [`DecodeError`] instead of producing a
//! partial event.

pub mod decoder;
pub mod event;
pub mod hash;

pub use decoder::{DecodeError, EventDecoder, TokensLockedDecoder};
pub use event::{DepositEvent, DepositId};
pub use hash::compute_deposit_id;
