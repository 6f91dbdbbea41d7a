use std::fmt;

/// Where the relay engine is within a cycle.
///
/// A successful cycle walks `Idle -> Fetching -> Decoding -> Filtering ->
/// Building -> Committing -> Idle`. An idle cycle (nothing final yet) goes
/// `Idle -> Fetching -> Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EngineState {
    #[default]
    Idle,
    Fetching,
    Decoding,
    Filtering,
    Building,
    Committing,
    /// Last cycle aborted; the window will be retried.
    FailedRetryable,
    /// The engine cannot continue.
    FailedFatal,
}

impl EngineState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Decoding => "decoding",
            Self::Filtering => "filtering",
            Self::Building => "building",
            Self::Committing => "committing",
            Self::FailedRetryable => "failed_retryable",
            Self::FailedFatal => "failed_fatal",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
