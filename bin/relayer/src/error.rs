use checkpoint::CheckpointError;
use client::ReaderError;
use config::ConfigError;
use deposit::DepositId;
use mint::BuildError;
use scanner::ScanWindow;
use thiserror::Error;

/// Errors surfaced at the relay engine's cycle boundary.
///
/// Only [`RelayError::Config`] and [`RelayError::CheckpointLoad`] are fatal;
/// everything else leaves the checkpoint where it was and the next cycle
/// repeats the window.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{operation} failed after {attempts} attempts{}: {source}", window_suffix(.window))]
    Transient {
        operation: &'static str,
        window: Option<ScanWindow>,
        attempts: usize,
        source: ReaderError,
    },

    #[error("{operation} failed{}: {source}", window_suffix(.window))]
    Reader {
        operation: &'static str,
        window: Option<ScanWindow>,
        source: ReaderError,
    },

    #[error("failed to build mint for deposit {deposit_id} (block {block}, window {window}): {source}")]
    Build {
        deposit_id: DepositId,
        block: u64,
        window: ScanWindow,
        source: BuildError,
    },

    #[error("failed to load checkpoint: {0}")]
    CheckpointLoad(#[source] CheckpointError),

    #[error("failed to commit window {window}: {source}")]
    CheckpointSave {
        window: ScanWindow,
        source: CheckpointError,
    },

    #[error("cancelled")]
    Cancelled,
}

impl RelayError {
    /// The engine must stop; retrying cannot help.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::CheckpointLoad(_))
    }
}

fn window_suffix(window: &Option<ScanWindow>) -> String {
    window
        .map(|w| format!(" for window {w}"))
        .unwrap_or_default()
}
