//! Scan window planning.
//!
//! Decides which block range is safe to scan next. Everything here is pure:
//! no I/O, no clock, so the reorg-safety rule can be tested without a chain.

pub mod window;

pub use window::{plan, safe_head, ScanWindow};
