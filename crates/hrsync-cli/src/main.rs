use anyhow::{anyhow, bail, ensure, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use hrsync_lib::{
    config::{read_config, SyncConfig},
    estimate::{sync_series, OffsetEstimate},
    io::{gpx, samples},
    shift::{offset_for_new_start, shift_series},
    synth::{synthetic_pair, SynthConfig},
    Series,
};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Synthetic clock errors are kept within a year either way.
const MAX_SYNTH_SHIFT_S: i64 = 366 * 86_400;

#[derive(Parser)]
#[command(
    name = "hrsync",
    version,
    about = "Fix activity recording clocks by aligning heart-rate curves"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Gpx,
    Csv,
}

impl OutputFormat {
    fn for_path(path: &Path, explicit: Option<OutputFormat>) -> Self {
        if let Some(format) = explicit {
            return format;
        }
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => OutputFormat::Csv,
            _ => OutputFormat::Gpx,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the clock offset of a suspect recording against a reference
    Estimate {
        /// Sample CSV with a trusted clock
        #[arg(long)]
        reference: PathBuf,
        /// Sample CSV whose clock is off
        #[arg(long)]
        suspect: PathBuf,
        /// Largest admissible offset magnitude (seconds)
        #[arg(long)]
        max_shift: Option<u32>,
        /// Fail instead of warning when the correlation peak is ambiguous
        #[arg(long)]
        strict: bool,
        /// TOML file with estimator settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Shift a recording's timestamps and export it
    Fix {
        #[arg(long)]
        suspect: PathBuf,
        /// Reference recording for automatic heart-rate sync
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Manual shift in seconds (+/-)
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<i64>,
        /// Force the start time (RFC 3339 or "YYYY-MM-DD HH:MM:SS")
        #[arg(long)]
        new_start: Option<String>,
        /// Read a --new-start without offset as local time instead of UTC
        #[arg(long)]
        local: bool,
        #[arg(long, default_value = "fixed.gpx")]
        out: PathBuf,
        /// Output format; defaults to the --out extension
        #[arg(long)]
        format: Option<OutputFormat>,
        #[arg(long)]
        max_shift: Option<u32>,
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Concatenate recordings into one file
    Merge {
        #[arg(long = "input", required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        format: Option<OutputFormat>,
    },
    /// Write a synthetic reference/suspect pair with a known clock error
    Synth {
        #[arg(long)]
        out_dir: PathBuf,
        /// Suspect clock error in seconds
        #[arg(
            long,
            default_value_t = 125,
            allow_hyphen_values = true,
            value_parser = clap::value_parser!(i64).range(-MAX_SYNTH_SHIFT_S..=MAX_SYNTH_SHIFT_S)
        )]
        shift: i64,
        #[arg(long, default_value_t = 3600)]
        duration: u32,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        #[arg(long, default_value_t = 0.02)]
        dropout: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    match cli.command {
        Commands::Estimate {
            reference,
            suspect,
            max_shift,
            strict,
            config,
        } => cmd_estimate(&reference, &suspect, max_shift, strict, config.as_deref())?,
        Commands::Fix {
            suspect,
            reference,
            offset,
            new_start,
            local,
            out,
            format,
            max_shift,
            strict,
            config,
        } => {
            let source = offset_source(reference, offset, new_start.as_deref(), local)?;
            let cfg = load_config(config.as_deref(), max_shift, strict)?;
            cmd_fix(&suspect, source, &cfg, &out, format)?
        }
        Commands::Merge {
            inputs,
            out,
            format,
        } => cmd_merge(&inputs, &out, format)?,
        Commands::Synth {
            out_dir,
            shift,
            duration,
            seed,
            dropout,
        } => cmd_synth(&out_dir, shift, duration, seed, dropout)?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>, max_shift: Option<u32>, strict: bool) -> Result<SyncConfig> {
    let base = match path {
        Some(path) => read_config(path)?,
        None => SyncConfig::default(),
    };
    Ok(base.with_overrides(max_shift, strict))
}

fn cmd_estimate(
    reference: &Path,
    suspect: &Path,
    max_shift: Option<u32>,
    strict: bool,
    config: Option<&Path>,
) -> Result<()> {
    let cfg = load_config(config, max_shift, strict)?;
    let reference = samples::read_series(reference)?;
    let suspect = samples::read_series(suspect)?;
    let estimate = sync_series(&reference, &suspect, &cfg)?;
    println!("{}", serde_json::to_string(&estimate)?);
    Ok(())
}

/// Where the applied offset comes from, in the order they are honoured.
enum OffsetSource {
    NewStart(DateTime<Utc>),
    Manual(i64),
    HeartRate(PathBuf),
}

fn offset_source(
    reference: Option<PathBuf>,
    offset: Option<i64>,
    new_start: Option<&str>,
    local: bool,
) -> Result<OffsetSource> {
    if let Some(text) = new_start {
        return Ok(OffsetSource::NewStart(parse_start_time(text, local)?));
    }
    if let Some(offset) = offset {
        ensure!(
            TimeDelta::try_seconds(offset).is_some(),
            "--offset {offset} is outside the representable time range"
        );
        return Ok(OffsetSource::Manual(offset));
    }
    match reference {
        Some(path) => Ok(OffsetSource::HeartRate(path)),
        None => bail!("automatic heart-rate sync needs --reference (or pass --offset / --new-start)"),
    }
}

fn parse_start_time(text: &str, local: bool) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| format!("unrecognised start time {text:?}"))?;
    if local {
        Local
            .from_local_datetime(&naive)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| anyhow!("local time {text:?} is ambiguous or does not exist"))
    } else {
        Ok(Utc.from_utc_datetime(&naive))
    }
}

#[derive(Serialize)]
struct FixSummary {
    source: &'static str,
    offset_s: i64,
    samples: usize,
    exported_points: usize,
    out: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimate: Option<OffsetEstimate>,
}

fn cmd_fix(
    suspect_path: &Path,
    source: OffsetSource,
    cfg: &SyncConfig,
    out: &Path,
    format: Option<OutputFormat>,
) -> Result<()> {
    let suspect = samples::read_series(suspect_path)?;
    let (label, offset_s, estimate) = match source {
        OffsetSource::NewStart(new_start) => {
            let offset = offset_for_new_start(&suspect, new_start)
                .ok_or_else(|| anyhow!("{} has no timestamps", suspect_path.display()))?;
            info!("using new-start offset = {}s", offset);
            ("new-start", offset, None)
        }
        OffsetSource::Manual(offset) => {
            info!("using manual offset = {}s", offset);
            ("manual", offset, None)
        }
        OffsetSource::HeartRate(reference_path) => {
            info!("auto syncing by heart-rate overlap");
            let reference = samples::read_series(&reference_path)?;
            let estimate = sync_series(&reference, &suspect, cfg)?;
            ("heart-rate", estimate.offset_s, Some(estimate))
        }
    };

    let fixed = shift_series(&suspect, offset_s)?;
    let exported_points = export(&fixed, out, format, suspect_path)?;
    info!("saved {}", out.display());
    let summary = FixSummary {
        source: label,
        offset_s,
        samples: fixed.len(),
        exported_points,
        out: out.to_path_buf(),
        estimate,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn export(
    series: &Series,
    out: &Path,
    format: Option<OutputFormat>,
    origin: &Path,
) -> Result<usize> {
    match OutputFormat::for_path(out, format) {
        OutputFormat::Csv => {
            samples::save_series(series, out)?;
            Ok(series.len())
        }
        OutputFormat::Gpx => {
            let name = origin
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("activity");
            gpx::save_gpx(series, out, name)
        }
    }
}

fn cmd_merge(inputs: &[PathBuf], out: &Path, format: Option<OutputFormat>) -> Result<()> {
    let parts = inputs
        .iter()
        .map(|path| samples::read_series(path))
        .collect::<Result<Vec<_>>>()?;
    let merged = Series::concat(parts);
    let exported = export(&merged, out, format, Path::new("merged"))?;
    info!(
        "merged {} recordings into {} ({} samples)",
        inputs.len(),
        out.display(),
        merged.len()
    );
    println!(
        "{}",
        serde_json::json!({ "inputs": inputs.len(), "samples": merged.len(), "exported_points": exported })
    );
    Ok(())
}

fn cmd_synth(out_dir: &Path, shift: i64, duration: u32, seed: u64, dropout: f64) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let cfg = SynthConfig {
        duration_s: duration,
        clock_error_s: shift,
        dropout_rate: dropout,
        seed,
        ..SynthConfig::default()
    };
    let pair = synthetic_pair(&cfg);
    let reference = out_dir.join("reference.csv");
    let suspect = out_dir.join("suspect.csv");
    samples::save_series(&pair.reference, &reference)?;
    samples::save_series(&pair.suspect, &suspect)?;
    println!(
        "{}",
        serde_json::json!({
            "reference": reference,
            "suspect": suspect,
            "clock_error_s": shift,
            "expected_offset_s": -shift,
        })
    );
    Ok(())
}
