use crate::{
    activity::Series,
    config::SyncConfig,
    correlate::{cross_correlate, mean_center},
    error::{SyncError, SyncResult, TrackRole},
    regularize::{regularize, HrTrack},
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Fewest seconds with real heart-rate samples a track needs to be aligned.
pub const MIN_HEART_RATE_SECONDS: usize = 5;

/// Below this centered energy per sample (bpm^2) a track is treated as flat.
const FLAT_ENERGY_PER_SAMPLE: f64 = 1e-6;

/// Result of aligning a suspect heart-rate track to a reference track.
///
/// `offset_s` follows `suspect_time + offset_s = reference_time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetEstimate {
    pub offset_s: i64,
    /// Wall-clock offset before clamping to the admissible range
    pub raw_offset_s: i64,
    /// Peak lag between the two tracks' own sample indices
    pub index_lag: i64,
    pub clamped: bool,
    pub peak: f64,
    /// Peak normalised by both centered signal norms, in [-1, 1]
    pub score: f64,
    pub runner_up: Option<f64>,
    pub ambiguous: bool,
    pub reference_start: DateTime<Utc>,
    pub suspect_start: DateTime<Utc>,
    pub reference_len: usize,
    pub suspect_len: usize,
}

// Interpolation can stretch two samples over any span, so only real
// heart-rate seconds count towards the minimum.
fn check_track(track: &HrTrack, role: TrackRole) -> SyncResult<()> {
    if track.heart_rate_seconds == 0 {
        return Err(SyncError::EmptyTrack(role));
    }
    if track.heart_rate_seconds < MIN_HEART_RATE_SECONDS || track.is_empty() {
        return Err(SyncError::TooFewSeconds {
            role,
            found: track.heart_rate_seconds,
            needed: MIN_HEART_RATE_SECONDS,
        });
    }
    Ok(())
}

fn energy(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// Estimate the clock offset of `suspect` relative to `reference`.
pub fn estimate_offset(
    reference: &HrTrack,
    suspect: &HrTrack,
    cfg: &SyncConfig,
) -> SyncResult<OffsetEstimate> {
    check_track(reference, TrackRole::Reference)?;
    check_track(suspect, TrackRole::Suspect)?;

    let ref_centered = mean_center(&reference.values);
    let sus_centered = mean_center(&suspect.values);
    let corr = cross_correlate(&ref_centered, &sus_centered)?;
    let Some(peak_idx) = corr.peak_index() else {
        return Err(SyncError::EmptyTrack(TrackRole::Suspect));
    };
    let index_lag = corr.lag_at(peak_idx);
    let peak = corr.values[peak_idx];
    debug!(
        "correlated {} reference and {} suspect seconds, peak {:.3} at index lag {}",
        reference.len(),
        suspect.len(),
        peak,
        index_lag
    );

    // Each track's index 0 sits at its own first bin.
    let raw_offset_s = index_lag + (reference.start_s - suspect.start_s);
    let max = cfg.max_shift_s as i64;
    let offset_s = raw_offset_s.clamp(-max, max);
    let clamped = offset_s != raw_offset_s;
    if clamped {
        warn!(
            "offset {}s exceeds max shift {}s, clamped to {}s",
            raw_offset_s, max, offset_s
        );
    }

    let ref_energy = energy(&ref_centered);
    let sus_energy = energy(&sus_centered);
    let flat = ref_energy < FLAT_ENERGY_PER_SAMPLE * reference.len() as f64
        || sus_energy < FLAT_ENERGY_PER_SAMPLE * suspect.len() as f64;
    let score = if flat {
        0.0
    } else {
        peak / (ref_energy * sus_energy).sqrt()
    };
    let runner_up = corr.runner_up(peak_idx);
    let ambiguous = flat
        || peak <= 0.0
        || runner_up.is_some_and(|r| r >= peak * (1.0 - cfg.ambiguity_margin));
    if ambiguous {
        if cfg.strict {
            return Err(SyncError::AmbiguousCorrelation {
                peak,
                runner_up: runner_up.unwrap_or(peak),
            });
        }
        warn!(
            "correlation peak {:.3} is weak (runner-up {:?}, score {:.3}); offset {}s may be wrong",
            peak, runner_up, score, offset_s
        );
    }

    info!("heart-rate offset = {}s (score {:.3})", offset_s, score);
    Ok(OffsetEstimate {
        offset_s,
        raw_offset_s,
        index_lag,
        clamped,
        peak,
        score,
        runner_up,
        ambiguous,
        reference_start: reference.start_time().unwrap_or_default(),
        suspect_start: suspect.start_time().unwrap_or_default(),
        reference_len: reference.len(),
        suspect_len: suspect.len(),
    })
}

/// Regularize two recordings and estimate the suspect's clock offset.
pub fn sync_series(
    reference: &Series,
    suspect: &Series,
    cfg: &SyncConfig,
) -> SyncResult<OffsetEstimate> {
    let reference = regularize(reference)?;
    let suspect = regularize(suspect)?;
    estimate_offset(&reference, &suspect, cfg)
}
