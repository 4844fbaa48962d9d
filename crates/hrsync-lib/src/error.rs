use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which side of an alignment a track came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    Reference,
    Suspect,
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackRole::Reference => f.write_str("reference"),
            TrackRole::Suspect => f.write_str("suspect"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0} track has no heart-rate samples")]
    EmptyTrack(TrackRole),
    #[error("{role} track covers {found} heart-rate seconds, at least {needed} are required")]
    TooFewSeconds {
        role: TrackRole,
        found: usize,
        needed: usize,
    },
    #[error("heart-rate samples span {seconds}s, more than the {limit}s a single recording may cover")]
    SpanTooLong { seconds: i64, limit: i64 },
    #[error("offset {0}s moves timestamps outside the representable date range")]
    OffsetOutOfRange(i64),
    #[error("correlation peak {peak:.3} is not distinguishable from runner-up {runner_up:.3}")]
    AmbiguousCorrelation { peak: f64, runner_up: f64 },
    #[error("fft failed: {0}")]
    Fft(String),
}

impl SyncError {
    /// Input could not produce a lag at all (as opposed to a low-confidence one).
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            SyncError::EmptyTrack(_)
                | SyncError::TooFewSeconds { .. }
                | SyncError::SpanTooLong { .. }
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
