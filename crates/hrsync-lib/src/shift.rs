use crate::activity::{Sample, Series};
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, TimeDelta, Utc};

/// Move every timestamp of a recording by `offset_s` seconds.
///
/// Samples without a timestamp pass through; nothing is dropped or reordered.
/// Fails with `OffsetOutOfRange` if any shifted timestamp would leave chrono's
/// date range.
pub fn shift_series(series: &Series, offset_s: i64) -> SyncResult<Series> {
    let delta = TimeDelta::try_seconds(offset_s).ok_or(SyncError::OffsetOutOfRange(offset_s))?;
    series
        .samples
        .iter()
        .map(|sample| -> SyncResult<Sample> {
            let time = match sample.time {
                Some(t) => Some(
                    t.checked_add_signed(delta)
                        .ok_or(SyncError::OffsetOutOfRange(offset_s))?,
                ),
                None => None,
            };
            Ok(Sample {
                time,
                ..sample.clone()
            })
        })
        .collect()
}

/// Offset that moves the recording's first timestamp to `new_start`.
pub fn offset_for_new_start(series: &Series, new_start: DateTime<Utc>) -> Option<i64> {
    series
        .start_time()
        .map(|start| (new_start - start).num_seconds())
}
