use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sensor reading from an activity recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: Option<DateTime<Utc>>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Elevation in metres
    pub ele: Option<f64>,
    /// Heart rate in beats per minute
    pub hr: Option<u16>,
    pub cad: Option<u16>,
    /// Speed in m/s
    pub speed: Option<f64>,
}

impl Sample {
    pub fn heart_rate_at(time: DateTime<Utc>, hr: u16) -> Self {
        Self {
            time: Some(time),
            hr: Some(hr),
            ..Self::default()
        }
    }
}

/// Samples of one recording, in recording order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamp of the first sample that has one.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.samples.iter().find_map(|s| s.time)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.samples.iter().rev().find_map(|s| s.time)
    }

    /// (timestamp, bpm) for every sample carrying both.
    pub fn heart_rate_points(&self) -> impl Iterator<Item = (DateTime<Utc>, u16)> + '_ {
        self.samples
            .iter()
            .filter_map(|s| Some((s.time?, s.hr?)))
    }

    /// Append recordings one after another, keeping each one's sample order.
    pub fn concat<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Series>,
    {
        let samples = parts.into_iter().flat_map(|s| s.samples).collect();
        Self { samples }
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<T: IntoIterator<Item = Sample>>(iter: T) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}
