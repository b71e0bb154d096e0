//! ---
//! cosim_section: "00-meta"
//! cosim_subsection: "binary"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Binary entrypoint for the R-COSIM bridge daemon."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use r_cosim_channel::{FileChannel, HtbEmulator};
use r_cosim_common::config::{BridgeConfig, LoadedBridgeConfig};
use r_cosim_common::logging::init_tracing;
use r_cosim_common::shutdown::ShutdownFlag;
use r_cosim_core::CosimLoop;
use r_cosim_sim::SyntheticGrid;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "R-COSIM bridge daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Force handshake test mode regardless of configuration")]
    test_mode: bool,

    #[arg(long, value_name = "SEED", help = "Override the synthetic backend seed")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the bridge loop against the configured channel")]
    Run,
    #[command(about = "Emulate the hardware side of the handshake channel")]
    EmulateHtb {
        #[arg(long, default_value_t = 50, help = "Frame period in milliseconds")]
        period_ms: u64,
        #[arg(long, help = "Stop after this many frames; run until ctrl-c when unset")]
        cycles: Option<u64>,
    },
    #[command(about = "Load and validate the configuration, then exit")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // An explicit --config wins over R_COSIM_CONFIG and the defaults.
    let loaded = match &cli.config {
        Some(path) => LoadedBridgeConfig {
            config: BridgeConfig::from_path(path.clone())?,
            source: path.clone(),
        },
        None => BridgeConfig::load_with_source(&[PathBuf::from("configs/example.toml")])?,
    };
    let mut config = loaded.config;
    let config_path = loaded.source;

    if cli.test_mode {
        config.run.test_mode = true;
    }
    if let Some(seed) = cli.seed {
        config.synthetic.seed = seed;
    }
    init_tracing("r-cosimd", &config.logging)?;
    info!(source = %config_path.display(), "configuration loaded");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let code = run_bridge(config).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::EmulateHtb { period_ms, cycles } => {
            run_emulator(config, period_ms, cycles).await?;
        }
        Commands::CheckConfig => {
            render_config(&config, &config_path);
        }
    }

    Ok(())
}

/// Drive one bridge run to completion, racing it against ctrl-c.
///
/// The loop itself is synchronous and blocking; it runs on the blocking
/// pool while this task waits for either completion or a termination
/// signal. A signal only raises the shutdown flag, so the run still ends
/// at a step boundary and exports whatever it recorded.
async fn run_bridge(config: BridgeConfig) -> Result<i32> {
    let shutdown = ShutdownFlag::new();
    let channel = FileChannel::new(&config.channel)?;
    let grid = SyntheticGrid::from_config(&config);
    let run = CosimLoop::new(config, channel, grid, shutdown.clone());

    let mut worker = tokio::task::spawn_blocking(move || run.run());
    let report = loop {
        tokio::select! {
            joined = &mut worker => break joined??,
            _ = signal::ctrl_c() => {
                info!("ctrl-c received; requesting shutdown");
                shutdown.request();
            }
        }
    };

    println!("status table: {}", report.csv_path.display());
    println!("run summary:  {}", report.summary_path.display());
    if !report.outcome.is_completed() {
        warn!(outcome = ?report.outcome, "run did not complete its planned horizon");
    }
    Ok(report.outcome.exit_code())
}

async fn run_emulator(config: BridgeConfig, period_ms: u64, cycles: Option<u64>) -> Result<()> {
    let shutdown = ShutdownFlag::new();
    let mut emulator = HtbEmulator::new(
        &config.channel,
        Duration::from_millis(period_ms),
        shutdown.clone(),
    );
    if let Some(cycles) = cycles {
        emulator = emulator.with_cycles(cycles);
    }

    let mut worker = tokio::task::spawn_blocking(move || emulator.run());
    let frames = loop {
        tokio::select! {
            joined = &mut worker => break joined??,
            _ = signal::ctrl_c() => {
                info!("ctrl-c received; stopping emulator");
                shutdown.request();
            }
        }
    };
    println!("frames written: {frames}");
    Ok(())
}

fn render_config(config: &BridgeConfig, source: &std::path::Path) {
    println!("configuration ok: {}", source.display());
    println!("case:          {}", config.run.case_label);
    println!(
        "horizon:       tf={}s ti={}s t_step={}s ({} steps)",
        config.run.tf,
        config.run.ti,
        config.run.t_step,
        config.run.steps_total()
    );
    println!("read channel:  {}", config.channel.read_path().display());
    println!("write channel: {}", config.channel.write_path().display());
    println!(
        "agc:           enabled={} interval={}s kp={} ki={}",
        config.agc.enabled, config.agc.interval, config.agc.kp, config.agc.ki
    );
    println!("output:        {}", config.output.directory.display());
}
