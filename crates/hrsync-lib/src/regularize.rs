use crate::activity::Series;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// Centered moving-average length applied after gap filling.
pub const SMOOTHING_WINDOW: usize = 5;

/// Longest span of heart-rate samples one recording may cover (one week).
pub const MAX_SPAN_S: i64 = 7 * 86_400;

/// Heart rate on a contiguous 1 Hz grid aligned to whole clock seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrTrack {
    /// Unix seconds of `values[0]`
    pub start_s: i64,
    /// Smoothed bpm, one value per second
    pub values: Vec<f64>,
    /// Seconds spanned by the gap-filled bins before smoothing trimmed the edges
    pub covered_seconds: usize,
    /// Seconds that held at least one real heart-rate sample
    pub heart_rate_seconds: usize,
}

impl HrTrack {
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        if self.is_empty() {
            return None;
        }
        Utc.timestamp_opt(self.start_s, 0).single()
    }

    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.values.iter().enumerate().filter_map(move |(i, &v)| {
            Utc.timestamp_opt(self.start_s + i as i64, 0)
                .single()
                .map(|t| (t, v))
        })
    }
}

/// Average heart rate per whole clock second.
///
/// Returns the Unix second of the first bin and one slot per second up to the
/// last bin; seconds without any sample are `None`. `Ok(None)` when there are
/// no points; samples spread over more than [`MAX_SPAN_S`] are an error.
pub fn bin_per_second<I>(points: I) -> SyncResult<Option<(i64, Vec<Option<f64>>)>>
where
    I: IntoIterator<Item = (DateTime<Utc>, u16)>,
{
    let points: Vec<(i64, f64)> = points
        .into_iter()
        .map(|(t, hr)| (t.timestamp(), hr as f64))
        .collect();
    let (Some(first), Some(last)) = (
        points.iter().map(|p| p.0).min(),
        points.iter().map(|p| p.0).max(),
    ) else {
        return Ok(None);
    };
    if last - first > MAX_SPAN_S {
        return Err(SyncError::SpanTooLong {
            seconds: last - first,
            limit: MAX_SPAN_S,
        });
    }
    let span = (last - first) as usize + 1;
    let mut sums = vec![0.0; span];
    let mut counts = vec![0usize; span];
    for (sec, hr) in points {
        let idx = (sec - first) as usize;
        sums[idx] += hr;
        counts[idx] += 1;
    }
    let bins = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, n)| if n > 0 { Some(sum / n as f64) } else { None })
        .collect();
    Ok(Some((first, bins)))
}

/// Linear interpolation across interior holes. Edges without a valued
/// neighbour on both sides stay `None`.
pub fn interpolate_gaps(bins: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = bins.to_vec();
    let mut prev: Option<(usize, f64)> = None;
    for (i, bin) in bins.iter().enumerate() {
        let Some(value) = *bin else { continue };
        if let Some((p, pv)) = prev {
            let width = (i - p) as f64;
            for (k, slot) in out.iter_mut().enumerate().take(i).skip(p + 1) {
                let frac = (k - p) as f64 / width;
                *slot = Some(pv + (value - pv) * frac);
            }
        }
        prev = Some((i, value));
    }
    out
}

/// Centered moving average. A slot is `None` unless its whole window lies
/// inside the sequence and every value in it is present.
pub fn centered_moving_average(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let half = window / 2;
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for (i, slot) in out.iter_mut().enumerate() {
        if i < half || i + (window - half) > values.len() {
            continue;
        }
        let lo = i - half;
        let span = &values[lo..lo + window];
        let mut acc = 0.0;
        let mut complete = true;
        for v in span {
            match v {
                Some(v) => acc += v,
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            *slot = Some(acc / window as f64);
        }
    }
    out
}

/// Build the 1 Hz smoothed heart-rate track of a recording.
///
/// Order: drop samples without time or HR, bin per second, fill gaps,
/// smooth, drop empty slots.
pub fn regularize(series: &Series) -> SyncResult<HrTrack> {
    let Some((first, bins)) = bin_per_second(series.heart_rate_points())? else {
        return Ok(HrTrack {
            start_s: 0,
            values: Vec::new(),
            covered_seconds: 0,
            heart_rate_seconds: 0,
        });
    };
    let heart_rate_seconds = bins.iter().flatten().count();
    let filled = interpolate_gaps(&bins);
    let covered_seconds = filled.iter().filter(|v| v.is_some()).count();
    let smoothed = centered_moving_average(&filled, SMOOTHING_WINDOW);

    // Interpolation leaves no interior holes, so the present slots are contiguous.
    let offset = smoothed.iter().position(Option::is_some).unwrap_or(0);
    let values: Vec<f64> = smoothed.into_iter().flatten().collect();
    debug!(
        "regularized {} samples into {} bins ({} with heart rate), {} smoothed seconds",
        series.len(),
        bins.len(),
        heart_rate_seconds,
        values.len()
    );
    Ok(HrTrack {
        start_s: first + offset as i64,
        values,
        covered_seconds,
        heart_rate_seconds,
    })
}
