//! CLI entry and run loop setup.

use std::io::{self, Write};

use anyhow::{Context, Result};
use aptop_core::config::{self, Config};
use aptop_core::interrupt;
use aptop_core::monitor::{Monitor, MonitorOptions, RunSummary, StopReason};
use aptop_core::supervisor::Supervisor;
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "aptop")]
#[command(version)]
#[command(about = "Live terminal monitor for powermetrics telemetry")]
#[command(after_help = "CONFIG:
    ${APTOP_HOME:-~/.config/aptop}/config.toml

    interval_ms = 1000        # default sampling interval
    grace_period_ms = 2000    # wait after SIGTERM before killing the probe
    bar_width = 20

    [probe]
    program = \"powermetrics\"
    args = []                 # placed before `-i <ms>`

Logs go to ${APTOP_HOME}/logs/aptop.log (filter with APTOP_LOG).")]
pub struct Cli {
    /// Sampling interval in milliseconds [default: 1000, or interval_ms from config]
    #[arg(short, long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,
}

/// Parses the command line. `--help`, `--version` and usage errors exit here.
pub fn parse() -> Cli {
    Cli::parse()
}

pub fn run(cli: Cli) -> Result<()> {
    interrupt::init()?;

    let config = Config::load().context("load config")?;
    if let Some(path) = config::paths::config_path() {
        tracing::debug!(path = %path.display(), ?config, "config loaded");
    }

    // The monitor is a single cooperative task; one thread is enough.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("create tokio runtime")?;

    rt.block_on(async move { monitor(cli, config).await })
}

async fn monitor(cli: Cli, config: Config) -> Result<()> {
    let options = MonitorOptions::from_config(&config, cli.interval);
    let cancel = CancellationToken::new();
    let bridge = interrupt::cancel_on_interrupt(cancel.clone());

    let mut monitor = Monitor::new(Supervisor::new(config.probe.clone()), options);
    let mut stdout = io::stdout();
    let result = monitor.run(&mut stdout, &cancel).await;

    // Release the signal bridge; it only matters while the loop runs.
    cancel.cancel();
    if let Err(err) = bridge.await {
        tracing::error!(error = %err, "interrupt bridge failed");
    }

    let summary = result?;
    report(&summary, &config);

    writeln!(stdout, "Monitoring stopped.").context("write stop message")?;
    stdout.flush().context("write stop message")?;
    Ok(())
}

fn report(summary: &RunSummary, config: &Config) {
    tracing::info!(
        frames = summary.frames,
        reason = ?summary.reason,
        shutdown = ?summary.shutdown,
        "monitor stopped"
    );

    // A probe that dies on its own before any sample usually lacks
    // privileges; its stderr already explains why.
    if summary.reason == StopReason::SourceEnded
        && summary.frames == 0
        && let Some(outcome) = summary.shutdown
        && !outcome.status().success()
    {
        eprintln!(
            "{} exited ({}) before producing any samples",
            config.probe.program,
            outcome.status()
        );
    }
}
