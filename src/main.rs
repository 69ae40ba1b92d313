use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use ota_agent::config;
use ota_agent::logging;
use ota_agent::platform::filebank::FileBank;
use ota_agent::platform::http::ReqwestTransport;
use ota_agent::platform::{AssumeOnline, HostReboot, ImageBank, SystemClock};
use ota_agent::scheduler::{self, Scheduler};
use ota_agent::status::LogStatusSink;
use ota_agent::{Orchestrator, VersionSource, VersionToken};

#[derive(Parser)]
#[command(name = "ota-agent")]
#[command(about = "Firmware self-update agent", version)]
struct Cli {
    /// Agent configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "ota-agent.json")]
    config: PathBuf,

    /// Directory holding the firmware slots and boot pointer
    #[arg(short, long, default_value = "fw-slots")]
    slots: PathBuf,

    /// Version token of the firmware currently running
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    running_version: String,

    /// Run a single update cycle, then exit
    #[arg(long)]
    once: bool,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    log_level: String,

    /// HTTP timeout per request, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logger()?;
    if !logging::set_max_level_from_str(&cli.log_level) {
        log::warn!("Unknown log level '{}', staying at info", cli.log_level);
    }

    info!("ota-agent {} starting", env!("CARGO_PKG_VERSION"));

    let config = config::load_or_default(&cli.config)?;
    info!(
        "Version source: {} ({:?}), poll every {}s",
        config.version_url, config.source_shape, config.poll_interval_secs
    );

    let bank = FileBank::new(&cli.slots, VersionToken::new(cli.running_version))?;
    info!(
        "Running firmware {} | boot slot {}",
        bank.running_version(),
        bank.boot_slot()
    );

    let source = VersionSource::new(config.version_url.clone(), config.source_shape);
    let transport = ReqwestTransport::new(Duration::from_secs(cli.timeout_secs));

    let mut orchestrator = Orchestrator::new(
        source,
        config.firmware_url.clone(),
        config.trust.clone(),
        config.retry_policy(),
        config.success_window(),
        Box::new(transport),
        Box::new(bank),
        Box::new(SystemClock),
        Box::new(HostReboot),
        Box::new(LogStatusSink),
    );

    let mut scheduler = Scheduler::new(config.poll_interval());
    let max_cycles = if cli.once { Some(1) } else { None };

    scheduler::run_loop(
        &mut orchestrator,
        &mut scheduler,
        &AssumeOnline,
        &SystemClock,
        max_cycles,
    );

    Ok(())
}
