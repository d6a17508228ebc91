use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use procsnap::config::{self, Config, LogFormat, load_config, load_config_from_path};
use procsnap::monitor::{self, Monitor, RunSettings};
use procsnap::output::snapshot_log::SnapshotLog;
use procsnap::output::summary_csv::SummaryCsv;
use procsnap::system::collector::Collector;
use procsnap::system::platform;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "procsnap",
    about = "Periodic process-tree resource snapshots in a Task-Manager-style log"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds between snapshots
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Only print trees containing a process with this name (case-insensitive)
    #[arg(long)]
    filter: Option<String>,

    /// Stop after this many cycles (0 runs until interrupted)
    #[arg(long)]
    cycles: Option<u64>,

    /// Snapshot log file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Also write the system summary CSV
    #[arg(long, default_value_t = false)]
    summary: bool,

    /// System summary CSV file
    #[arg(long)]
    summary_path: Option<PathBuf>,

    /// Operational log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,

    /// Log format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Print the effective configuration as JSON and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    config.validate()?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    procsnap::logging::init_logging(&config.logging, config.log_level()?)?;
    info!(
        interval_secs = config.general.interval_secs,
        filter = config.filter().unwrap_or(""),
        snapshot = %config.output.snapshot_path.display(),
        "monitoring started"
    );
    if config.is_short_interval() {
        warn!(
            interval_secs = config.general.interval_secs,
            "intervals under {} seconds may add noticeable load",
            config::SHORT_INTERVAL_SECS
        );
    }
    if platform::is_elevated() == Some(false) {
        warn!("not running with elevated privileges; some processes will report access-denied");
    }

    let log = SnapshotLog::open(&config.output.snapshot_path).wrap_err_with(|| {
        format!(
            "Failed to open snapshot log: {}",
            config.output.snapshot_path.display()
        )
    })?;
    let summary = if config.output.summary_enabled {
        Some(SummaryCsv::open(&config.output.summary_path)?)
    } else {
        None
    };

    let snapshot_path = log.path().to_path_buf();
    let collector = Collector::new();
    info!(logical_cores = collector.logical_cores(), "collector ready");

    let mut monitor = Monitor::new(
        collector,
        log,
        summary,
        config.filter().map(str::to_string),
    );
    let settings = RunSettings {
        interval: Duration::from_secs(config.general.interval_secs),
        max_cycles: config.general.max_cycles,
    };
    let completed = monitor::run(&mut monitor, &settings).await?;
    info!(cycles = completed, "monitoring stopped");

    println!(
        "Monitoring stopped after {completed} cycle(s). Snapshots in {}",
        snapshot_path.display()
    );
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(interval) = cli.interval {
        config.general.interval_secs = interval;
    }
    if let Some(ref filter) = cli.filter {
        config.general.filter = filter.clone();
    }
    if let Some(cycles) = cli.cycles {
        config.general.max_cycles = cycles;
    }
    if let Some(ref path) = cli.snapshot {
        config.output.snapshot_path = path.clone();
    }
    if cli.summary {
        config.output.summary_enabled = true;
    }
    if let Some(ref path) = cli.summary_path {
        config.output.summary_path = path.clone();
    }
    if let Some(ref path) = cli.log_file {
        config.logging.path = path.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    config
}
