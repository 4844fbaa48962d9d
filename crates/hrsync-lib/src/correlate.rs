use crate::error::{SyncError, SyncResult};
use realfft::num_complex::Complex;
use realfft::RealFftPlanner;

/// Full cross-correlation of two sequences, one value per integer lag.
///
/// `values[k]` belongs to lag `min_lag + k`. A lag `L` pairs `suspect[j]`
/// with `reference[j + L]`.
#[derive(Debug, Clone)]
pub struct Correlation {
    pub min_lag: i64,
    pub values: Vec<f64>,
}

impl Correlation {
    pub fn lag_at(&self, index: usize) -> i64 {
        self.min_lag + index as i64
    }

    pub fn at_lag(&self, lag: i64) -> Option<f64> {
        let idx = lag.checked_sub(self.min_lag)?;
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.values.get(i).copied())
    }

    /// Index of the first maximum, scanning lags in ascending order.
    pub fn peak_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in self.values.iter().enumerate() {
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Largest local maximum other than the one at `peak`.
    pub fn runner_up(&self, peak: usize) -> Option<f64> {
        let v = &self.values;
        let n = v.len();
        (0..n)
            .filter(|&i| i != peak)
            .filter(|&i| {
                let left = i == 0 || v[i] > v[i - 1];
                let right = i + 1 == n || v[i] >= v[i + 1];
                left && right
            })
            .map(|i| v[i])
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
    }
}

pub fn mean_center(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| v - mean).collect()
}

/// Cross-correlate through a zero-padded real FFT.
///
/// The padded length `len(reference) + len(suspect) - 1` keeps the circular
/// product free of wrap-around, so the result equals the direct sum.
pub fn cross_correlate(reference: &[f64], suspect: &[f64]) -> SyncResult<Correlation> {
    if reference.is_empty() || suspect.is_empty() {
        return Ok(Correlation {
            min_lag: 0,
            values: Vec::new(),
        });
    }
    let n = reference.len() + suspect.len() - 1;
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let c2r = planner.plan_fft_inverse(n);

    let mut ref_buf = vec![0.0; n];
    ref_buf[..reference.len()].copy_from_slice(reference);
    let mut sus_buf = vec![0.0; n];
    sus_buf[..suspect.len()].copy_from_slice(suspect);

    let mut ref_spec = r2c.make_output_vec();
    let mut sus_spec = r2c.make_output_vec();
    r2c.process(&mut ref_buf, &mut ref_spec)
        .map_err(|e| SyncError::Fft(e.to_string()))?;
    r2c.process(&mut sus_buf, &mut sus_spec)
        .map_err(|e| SyncError::Fft(e.to_string()))?;

    let mut product: Vec<Complex<f64>> = ref_spec
        .iter()
        .zip(sus_spec.iter())
        .map(|(r, s)| r * s.conj())
        .collect();
    // c2r requires purely real DC and Nyquist bins
    product[0].im = 0.0;
    if n % 2 == 0 {
        if let Some(last) = product.last_mut() {
            last.im = 0.0;
        }
    }

    let mut circular = c2r.make_output_vec();
    c2r.process(&mut product, &mut circular)
        .map_err(|e| SyncError::Fft(e.to_string()))?;

    let scale = 1.0 / n as f64;
    let min_lag = -(suspect.len() as i64 - 1);
    let values = (min_lag..reference.len() as i64)
        .map(|lag| {
            let idx = if lag < 0 { n as i64 + lag } else { lag };
            circular[idx as usize] * scale
        })
        .collect();
    Ok(Correlation { min_lag, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(reference: &[f64], suspect: &[f64]) -> Vec<f64> {
        let min_lag = -(suspect.len() as i64 - 1);
        (min_lag..reference.len() as i64)
            .map(|lag| {
                suspect
                    .iter()
                    .enumerate()
                    .filter_map(|(j, b)| {
                        let i = j as i64 + lag;
                        if i >= 0 && (i as usize) < reference.len() {
                            Some(b * reference[i as usize])
                        } else {
                            None
                        }
                    })
                    .sum()
            })
            .collect()
    }

    #[test]
    fn fft_matches_direct_sum() {
        let reference = [1.0, -2.0, 3.5, 0.25, -1.0, 4.0, 2.0];
        let suspect = [0.5, 3.0, -1.5, 2.0];
        let corr = cross_correlate(&reference, &suspect).unwrap();
        let expected = direct(&reference, &suspect);
        assert_eq!(corr.min_lag, -3);
        assert_eq!(corr.values.len(), expected.len());
        for (a, b) in corr.values.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn even_padded_length_matches_direct_sum() {
        let reference = [2.0, 1.0, -1.0, 0.0, 3.0];
        let suspect = [1.0, 1.0];
        let corr = cross_correlate(&reference, &suspect).unwrap();
        let expected = direct(&reference, &suspect);
        for (a, b) in corr.values.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn delayed_copy_peaks_at_delay() {
        let reference = [0.0, 0.0, 0.0, 1.0, 5.0, 2.0, 0.0];
        let suspect = [1.0, 5.0, 2.0];
        let corr = cross_correlate(&reference, &suspect).unwrap();
        let peak = corr.peak_index().unwrap();
        assert_eq!(corr.lag_at(peak), 3);
        assert!((corr.at_lag(3).unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn first_maximum_wins_ties() {
        let corr = Correlation {
            min_lag: -2,
            values: vec![1.0, 3.0, 2.0, 3.0, 0.0],
        };
        assert_eq!(corr.peak_index(), Some(1));
        assert_eq!(corr.runner_up(1), Some(3.0));
    }

    #[test]
    fn runner_up_ignores_peak_shoulders() {
        let corr = Correlation {
            min_lag: 0,
            values: vec![0.0, 2.0, 1.0, 5.0, 4.5, 1.0],
        };
        assert_eq!(corr.peak_index(), Some(3));
        assert_eq!(corr.runner_up(3), Some(2.0));
    }

    #[test]
    fn mean_center_removes_baseline() {
        let centered = mean_center(&[150.0, 152.0, 148.0]);
        assert_eq!(centered, vec![0.0, 2.0, -2.0]);
    }
}
