use crate::activity::{Sample, Series};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// One row of the sample CSV. Every column except `time` may be missing.
#[derive(Debug, Deserialize)]
struct SampleRow {
    time: Option<DateTime<Utc>>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    ele: Option<f64>,
    #[serde(default)]
    hr: Option<u16>,
    #[serde(default)]
    cad: Option<u16>,
    #[serde(default)]
    speed: Option<f64>,
}

impl From<SampleRow> for Sample {
    fn from(row: SampleRow) -> Self {
        Self {
            time: row.time,
            lat: row.lat,
            lon: row.lon,
            ele: row.ele,
            hr: row.hr,
            cad: row.cad,
            speed: row.speed,
        }
    }
}

#[derive(Debug, Serialize)]
struct OutRow {
    time: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    ele: Option<f64>,
    hr: Option<u16>,
    cad: Option<u16>,
    speed: Option<f64>,
}

impl From<&Sample> for OutRow {
    fn from(s: &Sample) -> Self {
        Self {
            time: s
                .time
                .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            lat: s.lat,
            lon: s.lon,
            ele: s.ele,
            hr: s.hr,
            cad: s.cad,
            speed: s.speed,
        }
    }
}

/// Parse a sample CSV (`time,lat,lon,ele,hr,cad,speed`; RFC 3339 times).
pub fn parse_series<R: Read>(reader: R) -> Result<Series> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);
    let headers = reader.headers().context("reading header")?.clone();
    if !headers.iter().any(|h| h.eq_ignore_ascii_case("time")) {
        anyhow::bail!("missing time column");
    }
    let mut samples = Vec::new();
    for (idx, row) in reader.deserialize::<SampleRow>().enumerate() {
        let row = row.with_context(|| format!("parsing sample row {}", idx + 1))?;
        samples.push(Sample::from(row));
    }
    Ok(Series::new(samples))
}

pub fn read_series(path: &Path) -> Result<Series> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_series(file).with_context(|| format!("in {}", path.display()))
}

pub fn write_series<W: Write>(series: &Series, writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for sample in &series.samples {
        writer.serialize(OutRow::from(sample))?;
    }
    if series.is_empty() {
        writer.write_record(["time", "lat", "lon", "ele", "hr", "cad", "speed"])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_series(series: &Series, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_series(series, file).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE_CSV: &str = "\
time, lat, lon, ele, hr, cad, speed
2025-03-09T05:30:00Z, 21.0285, 105.8542, 12.5, 118, 86, 2.9
2025-03-09T12:30:01+07:00, , , , 119, ,
, 21.0286, 105.8543, , , ,
";

    #[test]
    fn parses_rows_with_gaps_and_offsets() {
        let series = parse_series(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(series.len(), 3);
        let t0 = Utc.with_ymd_and_hms(2025, 3, 9, 5, 30, 0).unwrap();
        assert_eq!(series.samples[0].time, Some(t0));
        assert_eq!(series.samples[0].cad, Some(86));
        // +07:00 wall time is normalised to UTC
        assert_eq!(
            series.samples[1].time,
            Some(t0 + chrono::Duration::seconds(1))
        );
        assert_eq!(series.samples[1].lat, None);
        assert_eq!(series.samples[2].time, None);
        assert_eq!(series.samples[2].lon, Some(105.8543));
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let text = "time,hr\n2025-03-09T05:30:00Z,120\n2025-03-09T05:30:01Z,\n";
        let series = parse_series(text.as_bytes()).unwrap();
        assert_eq!(series.samples[0].hr, Some(120));
        assert_eq!(series.samples[1].hr, None);
        assert_eq!(series.samples[0].lat, None);
    }

    #[test]
    fn reports_bad_rows() {
        let text = "time,hr\n2025-03-09T05:30:00Z,fast\n";
        let err = parse_series(text.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("row 1"));
        assert!(parse_series("hr\n120\n".as_bytes()).is_err());
    }

    #[test]
    fn written_file_reads_back() {
        let series = parse_series(SAMPLE_CSV.as_bytes()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save_series(&series, &path).unwrap();
        assert_eq!(read_series(&path).unwrap(), series);
    }
}
