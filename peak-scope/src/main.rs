mod agg;
mod model;
mod monitor;
mod resolve;
mod trace;
mod ui;

use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, error::ErrorKind};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    agg::{
        Aggregator,
        correlate::{Correlator, CorrelatorConfig, REPORT_SIZE},
        detector::PeakDetector,
        live::LiveAggregator,
    },
    model::cli::{Cli, RunConfig, RunMode},
    monitor::{Exit, LocalClock, Monitor},
    resolve::{CachedResolver, WalkResolver},
    trace::{
        SampleSource, SamplerLauncher,
        device::{DeviceInput, spawn_device_reader},
        parse::DeviceLineParser,
        sampler::ProcessLauncher,
    },
    ui::{live, report},
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = cli.log_level.clone();
    let log_file = cli.log_file.clone();

    let config = match RunConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    init_logging(&log_level, log_file, config.mode)?;

    match config.mode {
        RunMode::Windowed => run_windowed(config),
        RunMode::Live { plain } => run_live(config, plain),
    }
}

fn init_logging(level: &str, log_file: Option<PathBuf>, mode: RunMode) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level: {level}"))?;

    match (log_file, mode) {
        (Some(path), _) => {
            let file = File::create(&path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        (None, RunMode::Windowed) => {
            fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
        // stderr shares the terminal with the live view
        (None, RunMode::Live { .. }) => {}
    }
    Ok(())
}

fn run_windowed(config: RunConfig) -> Result<()> {
    // before any thread is spawned
    let mut clock = LocalClock::detect();

    let (tx, rx) = mpsc::channel();
    let interrupt_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(DeviceInput::Interrupted);
    })
    .context("installing signal handler")?;
    spawn_device_reader(BufReader::new(io::stdin()), tx).context("starting stdin reader")?;

    let correlator = Correlator::new(
        ProcessLauncher::new(config.sampler.clone(), config.kill_grace),
        CorrelatorConfig {
            filter: config.filter.clone(),
            drain_limit: config.drain_limit,
            rank: config.rank,
        },
    );
    let mut monitor = Monitor::new(
        DeviceLineParser::new(config.device.clone(), config.rate_column),
        PeakDetector::new(config.threshold),
        correlator,
        WalkResolver::new(config.roots.clone()),
    );

    info!(
        device = %config.device,
        threshold = config.threshold,
        sampler = %config.sampler.display(),
        "waiting for a zero baseline"
    );

    let rank = config.rank;
    let exit = monitor.run(&rx, &mut clock, |event| report::print_event(event, rank));

    if exit == Exit::Interrupted {
        println!("\nAnalysis terminated by user");
    }
    Ok(())
}

fn run_live(config: RunConfig, plain: bool) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("installing signal handler")?;

    let mut launcher = ProcessLauncher::new(config.sampler.clone(), config.kill_grace);
    let mut sampler = launcher
        .launch()
        .with_context(|| format!("starting `{}`", config.sampler.display()))?;
    info!(pid = sampler.pid(), "live sampling started");

    let resolver = CachedResolver::new(WalkResolver::new(config.roots.clone()));
    let mut agg = LiveAggregator::new(resolver, config.rank, REPORT_SIZE);
    agg.on_start();

    let result = if plain {
        live::run_live_plain(&mut sampler, &mut agg, &config.filter, config.drain_limit, &stop)
    } else {
        live::run_live_tui(&mut sampler, &mut agg, &config.filter, config.drain_limit, &stop)
    };

    if let Err(e) = sampler.terminate() {
        warn!(error = %e, "failed to stop sampler");
    }
    result
}
