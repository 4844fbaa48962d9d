use crate::activity::{Sample, Series};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters for a synthetic reference/suspect recording pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    pub start: DateTime<Utc>,
    pub duration_s: u32,
    /// How far the suspect device's clock runs ahead of true time (seconds).
    pub clock_error_s: i64,
    /// Fraction of suspect samples lost to sensor dropouts.
    pub dropout_rate: f64,
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            start: Utc
                .with_ymd_and_hms(2025, 3, 9, 5, 30, 0)
                .single()
                .unwrap_or_default(),
            duration_s: 3600,
            clock_error_s: 125,
            dropout_rate: 0.02,
            seed: 7,
        }
    }
}

pub struct SynthPair {
    pub reference: Series,
    pub suspect: Series,
}

/// True heart rate per second: effort blocks with exponential response.
fn heart_rate_profile(duration_s: u32, rng: &mut StdRng) -> Vec<f64> {
    let mut hr = Vec::with_capacity(duration_s as usize);
    let mut current = 75.0;
    while hr.len() < duration_s as usize {
        let target: f64 = rng.gen_range(100.0..175.0);
        let block: usize = rng.gen_range(60..300);
        let tau: f64 = rng.gen_range(15.0..45.0);
        for _ in 0..block {
            current += (target - current) / tau;
            hr.push(current);
        }
    }
    hr.truncate(duration_s as usize);
    hr
}

/// A chest-strap-like reference at 1 Hz and a watch-like suspect that records
/// every 1-3 s, drops samples and runs `clock_error_s` ahead.
pub fn synthetic_pair(cfg: &SynthConfig) -> SynthPair {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let profile = heart_rate_profile(cfg.duration_s, &mut rng);

    let position = |s: usize| {
        let lat = 21.0285 + s as f64 * 2.5e-5;
        let lon = 105.8542 + (s as f64 / 200.0).sin() * 1e-3;
        (lat, lon)
    };

    let reference: Series = profile
        .iter()
        .enumerate()
        .map(|(s, &true_hr)| {
            let noise: f64 = rng.gen_range(-1.0..1.0);
            Sample {
                time: Some(cfg.start + Duration::seconds(s as i64)),
                hr: Some((true_hr + noise).round() as u16),
                ..Sample::default()
            }
        })
        .collect();

    let mut suspect = Vec::new();
    let mut s = 0;
    while s < profile.len() {
        let true_hr = profile[s];
        if !rng.gen_bool(cfg.dropout_rate.clamp(0.0, 1.0)) {
            let (lat, lon) = position(s);
            let noise: f64 = rng.gen_range(-2.0..2.0);
            suspect.push(Sample {
                time: Some(cfg.start + Duration::seconds(s as i64 + cfg.clock_error_s)),
                lat: Some(lat),
                lon: Some(lon),
                ele: Some(12.0 + (s as f64 / 300.0).cos() * 4.0),
                hr: Some((true_hr + noise).round() as u16),
                cad: Some(rng.gen_range(84..92)),
                speed: Some(rng.gen_range(2.6..3.1)),
            });
        }
        s += rng.gen_range(1..=3);
    }

    SynthPair {
        reference,
        suspect: Series::new(suspect),
    }
}
