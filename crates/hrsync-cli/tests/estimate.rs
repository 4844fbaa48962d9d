use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::Path};
use tempfile::tempdir;

#[derive(Deserialize)]
struct EstimateOutput {
    offset_s: i64,
    raw_offset_s: i64,
    clamped: bool,
    score: f64,
}

#[derive(Deserialize)]
struct FixOutput {
    source: String,
    offset_s: i64,
    estimate: Option<EstimateOutput>,
}

fn synth(dir: &Path, shift: i64, seed: u64) -> (String, String) {
    let mut cmd = cargo_bin_cmd!("hrsync");
    cmd.args([
        "synth",
        "--out-dir",
        dir.to_str().expect("utf8 path"),
        "--shift",
        &shift.to_string(),
        "--duration",
        "1200",
        "--seed",
        &seed.to_string(),
    ]);
    cmd.assert().success();
    let reference = dir.join("reference.csv").to_string_lossy().to_string();
    let suspect = dir.join("suspect.csv").to_string_lossy().to_string();
    (reference, suspect)
}

#[test]
fn estimate_recovers_synthetic_shift() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let (reference, suspect) = synth(temp.path(), 300, 3);

    let mut cmd = cargo_bin_cmd!("hrsync");
    cmd.args(["estimate", "--reference", &reference, "--suspect", &suspect]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let est: EstimateOutput = serde_json::from_slice(&output)?;
    assert!(
        (est.offset_s + 300).abs() <= 5,
        "expected about -300, got {}",
        est.offset_s
    );
    assert!(!est.clamped);
    assert!(est.score > 0.5);
    Ok(())
}

#[test]
fn config_file_max_shift_clamps() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let (reference, suspect) = synth(temp.path(), -400, 5);
    let config = temp.path().join("sync.toml");
    fs::write(&config, "max_shift_s = 120\n")?;

    let mut cmd = cargo_bin_cmd!("hrsync");
    cmd.args([
        "estimate",
        "--reference",
        &reference,
        "--suspect",
        &suspect,
        "--config",
        config.to_str().expect("utf8 path"),
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let est: EstimateOutput = serde_json::from_slice(&output)?;
    assert_eq!(est.offset_s, 120);
    assert!(est.clamped);
    assert!(est.raw_offset_s > 120);

    // the command line wins over the file
    let mut cmd = cargo_bin_cmd!("hrsync");
    cmd.args([
        "estimate",
        "--reference",
        &reference,
        "--suspect",
        &suspect,
        "--config",
        config.to_str().expect("utf8 path"),
        "--max-shift",
        "3600",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let est: EstimateOutput = serde_json::from_slice(&output)?;
    assert!(!est.clamped);
    Ok(())
}

#[test]
fn fix_by_heart_rate_writes_corrected_track() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let (reference, suspect) = synth(temp.path(), 125, 11);
    let out = temp.path().join("fixed.csv");

    let mut cmd = cargo_bin_cmd!("hrsync");
    cmd.args([
        "fix",
        "--reference",
        &reference,
        "--suspect",
        &suspect,
        "--out",
        out.to_str().expect("utf8 path"),
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let fixed: FixOutput = serde_json::from_slice(&output)?;
    assert_eq!(fixed.source, "heart-rate");
    assert!((fixed.offset_s + 125).abs() <= 5);
    assert_eq!(fixed.estimate.expect("estimate").offset_s, fixed.offset_s);

    let before = fs::read_to_string(&suspect)?.lines().count();
    let after = fs::read_to_string(&out)?.lines().count();
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn estimate_rejects_recording_without_heart_rate() -> Result<(), Box<dyn Error>> {
    let temp = tempdir()?;
    let (reference, _) = synth(temp.path(), 0, 1);
    let empty = temp.path().join("no_hr.csv");
    fs::write(
        &empty,
        "time,lat,lon\n2025-03-09T05:30:00Z,21.0,105.8\n2025-03-09T05:30:01Z,21.0,105.8\n",
    )?;

    let mut cmd = cargo_bin_cmd!("hrsync");
    cmd.args([
        "estimate",
        "--reference",
        &reference,
        "--suspect",
        empty.to_str().expect("utf8 path"),
    ]);
    let stderr = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8(stderr)?.contains("suspect track has no heart-rate samples"));
    Ok(())
}
