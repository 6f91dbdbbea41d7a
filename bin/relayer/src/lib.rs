//! Confirmed-deposit relayer.
//!
//! Watches the source bridge for `TokensLocked` events, waits for them to be
//! final, and turns each deposit exactly once into a signed `mintTokens`
//! transaction for the destination bridge. Progress survives restarts via
//! the checkpoint store.

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod state;

pub use engine::{CycleOutcome, CycleReport, IntegrityFailure, RelayEngine};
pub use error::RelayError;
pub use state::EngineState;
