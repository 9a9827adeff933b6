use std::{
    path::{self, PathBuf},
    time::Duration,
};

use clap::Parser;
use thiserror::Error;

use crate::{model::agg::RankKey, trace::parse::SampleFilter};

/// Kafka log segments live here on the hosts this was written for.
pub const DEFAULT_ROOT: &str = "/mnt/kafka-disks";
pub const DEFAULT_SAMPLER: &str = "filetop";
const WINDOWED_SAMPLER_ARGS: &[&str] = &["-C", "-r", "50", "-d", "1"];
const LIVE_SAMPLER_ARGS: &[&str] = &["-C"];

#[derive(Parser, Debug)]
#[command(
    name = "peak-scope",
    about = "Correlate block-device read peaks with the files behind them",
    long_about = "Reads device samples (e.g. `iostat -x 1`) on stdin. When the read rate \
                  climbs from zero past THRESHOLD, a per-file sampler runs until the rate \
                  returns to zero and the busiest files are reported.",
    after_help = "Usage: iostat -x 1 | peak-scope <DEVICE> <THRESHOLD>"
)]
pub struct Cli {
    /// Device to watch (first column of the device lines)
    #[arg(required_unless_present = "live")]
    pub device: Option<String>,

    /// Read rate (reads/sec) that opens a peak
    #[arg(required_unless_present = "live")]
    pub threshold: Option<f64>,

    /// Continuously rank files instead of waiting for peaks
    #[arg(long)]
    pub live: bool,

    /// In live mode, redraw plain text instead of the TUI
    #[arg(long, requires = "live")]
    pub plain: bool,

    /// 0-based column holding the read rate in device lines (column 0 is the
    /// device name)
    #[arg(long, default_value_t = 2)]
    pub rate_column: usize,

    /// Directory searched for reported filenames (repeatable)
    #[arg(long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Ranking key for reported files
    #[arg(long, value_enum, default_value_t = RankKey::Combined)]
    pub rank: RankKey,

    /// Accept file samples whose filename ends with this suffix
    #[arg(long, default_value = ".log", conflicts_with_all = ["match_type", "match_any"])]
    pub match_suffix: String,

    /// Accept file samples whose type column equals this marker (e.g. R)
    #[arg(long, conflicts_with = "match_any")]
    pub match_type: Option<String>,

    /// Accept every well-formed file sample
    #[arg(long)]
    pub match_any: bool,

    /// Per-file sampler program
    #[arg(long, default_value = DEFAULT_SAMPLER)]
    pub sampler: String,

    /// Argument passed to the sampler (repeatable)
    #[arg(long = "sampler-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub sampler_args: Vec<String>,

    /// Max sampler lines consumed per device line
    #[arg(long, default_value_t = 64)]
    pub drain_limit: usize,

    /// Grace period before a sampler is force-killed
    #[arg(long, default_value_t = 1000)]
    pub kill_grace_ms: u64,

    /// Logging filter (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RunMode {
    /// One report per peak.
    Windowed,
    /// Continuous ranking.
    Live { plain: bool },
}

#[derive(Debug, Clone)]
pub struct SamplerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl SamplerCommand {
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    /// Empty in live mode.
    pub device: String,
    pub threshold: f64,
    pub rate_column: usize,
    pub roots: Vec<PathBuf>,
    pub rank: RankKey,
    pub filter: SampleFilter,
    pub sampler: SamplerCommand,
    pub drain_limit: usize,
    pub kill_grace: Duration,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("device name is required")]
    MissingDevice,

    #[error("threshold is required")]
    MissingThreshold,

    #[error("threshold must be a positive number, got {0}")]
    InvalidThreshold(f64),

    #[error("--rate-column must be at least 1, column 0 is the device name")]
    InvalidRateColumn,

    #[error("--drain-limit must be at least 1")]
    ZeroDrainLimit,

    #[error("search root `{}` cannot be made absolute", .0.display())]
    InvalidRoot(PathBuf),

    #[error("sampler program must not be empty")]
    EmptySampler,
}

impl RunConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let mode = if cli.live {
            RunMode::Live { plain: cli.plain }
        } else {
            RunMode::Windowed
        };

        let (device, threshold) = match mode {
            RunMode::Windowed => {
                let device = cli
                    .device
                    .filter(|d| !d.trim().is_empty())
                    .ok_or(ConfigError::MissingDevice)?;
                let threshold = cli.threshold.ok_or(ConfigError::MissingThreshold)?;
                if !threshold.is_finite() || threshold <= 0.0 {
                    return Err(ConfigError::InvalidThreshold(threshold));
                }
                (device, threshold)
            }
            RunMode::Live { .. } => (String::new(), 0.0),
        };

        if cli.rate_column == 0 {
            return Err(ConfigError::InvalidRateColumn);
        }
        if cli.drain_limit == 0 {
            return Err(ConfigError::ZeroDrainLimit);
        }
        if cli.sampler.trim().is_empty() {
            return Err(ConfigError::EmptySampler);
        }

        let filter = if cli.match_any {
            SampleFilter::Any
        } else if let Some(marker) = cli.match_type {
            SampleFilter::FileType(marker)
        } else {
            SampleFilter::Suffix(cli.match_suffix)
        };

        let args = if cli.sampler_args.is_empty() {
            let defaults = match mode {
                RunMode::Windowed => WINDOWED_SAMPLER_ARGS,
                RunMode::Live { .. } => LIVE_SAMPLER_ARGS,
            };
            defaults.iter().map(|a| a.to_string()).collect()
        } else {
            cli.sampler_args
        };

        let roots = if cli.roots.is_empty() {
            vec![PathBuf::from(DEFAULT_ROOT)]
        } else {
            cli.roots
                .into_iter()
                .map(|root| path::absolute(&root).map_err(|_| ConfigError::InvalidRoot(root)))
                .collect::<Result<_, _>>()?
        };

        Ok(RunConfig {
            mode,
            device,
            threshold,
            rate_column: cli.rate_column,
            roots,
            rank: cli.rank,
            filter,
            sampler: SamplerCommand {
                program: cli.sampler,
                args,
            },
            drain_limit: cli.drain_limit,
            kill_grace: Duration::from_millis(cli.kill_grace_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RunConfig, ConfigError> {
        let cli = Cli::try_parse_from(std::iter::once("peak-scope").chain(args.iter().copied()))
            .expect("arguments should parse");
        RunConfig::from_cli(cli)
    }

    #[test]
    fn windowed_defaults() {
        let cfg = parse(&["sda", "10"]).unwrap();
        assert_eq!(cfg.mode, RunMode::Windowed);
        assert_eq!(cfg.device, "sda");
        assert_eq!(cfg.threshold, 10.0);
        assert_eq!(cfg.rate_column, 2);
        assert_eq!(cfg.roots, vec![PathBuf::from(DEFAULT_ROOT)]);
        assert_eq!(cfg.rank, RankKey::Combined);
        assert_eq!(cfg.filter, SampleFilter::Suffix(".log".to_string()));
        assert_eq!(cfg.sampler.display(), "filetop -C -r 50 -d 1");
        assert_eq!(cfg.kill_grace, Duration::from_secs(1));
    }

    #[test]
    fn live_mode_needs_no_positionals() {
        let cfg = parse(&["--live", "--plain"]).unwrap();
        assert_eq!(cfg.mode, RunMode::Live { plain: true });
        assert_eq!(cfg.sampler.display(), "filetop -C");
    }

    #[test]
    fn windowed_mode_requires_positionals() {
        let res = Cli::try_parse_from(["peak-scope", "sda"]);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_non_positive_threshold() {
        assert_eq!(
            parse(&["sda", "0"]).unwrap_err(),
            ConfigError::InvalidThreshold(0.0)
        );
        assert_eq!(
            parse(&["sda", "--", "-3"]).unwrap_err(),
            ConfigError::InvalidThreshold(-3.0)
        );
    }

    #[test]
    fn rejects_zero_drain_limit() {
        assert_eq!(
            parse(&["sda", "5", "--drain-limit", "0"]).unwrap_err(),
            ConfigError::ZeroDrainLimit
        );
    }

    #[test]
    fn rejects_rate_column_zero() {
        assert_eq!(
            parse(&["sda", "10", "--rate-column", "0"]).unwrap_err(),
            ConfigError::InvalidRateColumn
        );
        assert_eq!(parse(&["sda", "10", "--rate-column", "1"]).unwrap().rate_column, 1);
    }

    #[test]
    fn relative_roots_become_absolute() {
        let cfg = parse(&["sda", "1", "--root", "data/kafka"]).unwrap();
        assert!(cfg.roots[0].is_absolute());
        assert!(cfg.roots[0].ends_with("data/kafka"));
    }

    #[test]
    fn type_marker_and_custom_sampler() {
        let cfg = parse(&[
            "nvme0n1",
            "2.5",
            "--match-type",
            "R",
            "--rank",
            "read",
            "--root",
            "/data/a",
            "--root",
            "/data/b",
            "--sampler",
            "/usr/sbin/filetop-bpfcc",
            "--sampler-arg",
            "-C",
        ])
        .unwrap();
        assert_eq!(cfg.filter, SampleFilter::FileType("R".to_string()));
        assert_eq!(cfg.rank, RankKey::Read);
        assert_eq!(cfg.roots.len(), 2);
        assert_eq!(cfg.sampler.display(), "/usr/sbin/filetop-bpfcc -C");
    }

    #[test]
    fn match_any_wins() {
        let cfg = parse(&["sda", "1", "--match-any"]).unwrap();
        assert_eq!(cfg.filter, SampleFilter::Any);
    }
}
