use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pixelstats::config::LoggingConfig;
use pixelstats::report::diff_suffix;
use pixelstats::source::build_client;
use pixelstats::{Config, DeviceManifest, RunOptions, SnapshotStore, StatsJob};

#[derive(Parser)]
#[command(name = "pixelstats")]
#[command(about = "Daily download statistics for PixelBuilds releases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Count downloads, save the snapshot and send the report (default)
    Run {
        /// Print the report without saving the snapshot or sending it
        #[arg(long)]
        dry_run: bool,

        /// Save the snapshot but do not send the report
        #[arg(long)]
        no_notify: bool,
    },

    /// List devices from the manifest
    Devices,

    /// Show totals stored in the snapshot
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run {
        dry_run: false,
        no_notify: false,
    });

    match command {
        Commands::Init { force } => {
            init_logging(&LoggingConfig::default(), cli.verbose);
            cmd_init(cli.config, force)
        }
        Commands::Run { dry_run, no_notify } => {
            let config = setup(cli.config, cli.verbose)?;
            cmd_run(dry_run, no_notify, config).await
        }
        Commands::Devices => cmd_devices(&setup(cli.config, cli.verbose)?).await,
        Commands::Show => cmd_show(&setup(cli.config, cli.verbose)?),
    }
}

/// Load configuration, then start logging as it describes
fn setup(config_path: Option<std::path::PathBuf>, verbose: bool) -> Result<Config> {
    let config = load_config(config_path)?;
    init_logging(&config.logging, verbose);
    info!("Starting pixelstats v{}", env!("CARGO_PKG_VERSION"));
    Ok(config)
}

/// Initialize logging; RUST_LOG wins, then --verbose, then the config level.
/// Logs go to stderr so stdout only carries the report.
fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(logging.color);

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "full" {
        registry.with(layer).init();
    } else {
        registry.with(layer.compact()).init();
    }
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

/// Write a default configuration file
fn cmd_init(config_path: Option<std::path::PathBuf>, force: bool) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    if path.exists() && !force {
        bail!(
            "Configuration already exists at {:?} (use --force to overwrite)",
            path
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Config::default().save(&path)?;

    println!("✅ Configuration written to {:?}", path);
    println!("   Set TG_BOT_TOKEN and TG_CHAT_ID to enable Telegram reports");
    Ok(())
}

/// Count downloads and publish the report
async fn cmd_run(dry_run: bool, no_notify: bool, config: Config) -> Result<()> {
    let job = StatsJob::new(config)?;

    let summary = job
        .run(RunOptions {
            dry_run,
            skip_notify: no_notify,
        })
        .await?;

    println!("{}", summary.report);

    info!(
        "Run finished in {:.2}s: {} devices, {} skipped, snapshot {}, report {}",
        summary.duration.as_secs_f64(),
        summary.devices,
        summary.skipped_devices,
        if summary.persisted { "saved" } else { "not saved" },
        if summary.notified { "sent" } else { "not sent" }
    );

    Ok(())
}

/// List devices from the manifest
async fn cmd_devices(config: &Config) -> Result<()> {
    let client = build_client(&config.fetch.user_agent, config.fetch_timeout())?;
    let manifest = DeviceManifest::new(client, config.devices_url.clone());

    let devices = manifest.fetch().await?;

    println!("Devices ({}):", devices.len());
    for device in devices {
        println!("  📱 {}", device.display_name());
    }

    Ok(())
}

/// Show totals stored in the snapshot
fn cmd_show(config: &Config) -> Result<()> {
    let store = SnapshotStore::new(config.snapshot_path());
    let snapshot = store.load()?;

    if snapshot.is_empty() {
        println!("No snapshot recorded at {:?}", store.path());
        return Ok(());
    }

    println!(
        "📊 Snapshot from {}",
        snapshot.date().unwrap_or("an unknown date")
    );
    for entry in snapshot.devices() {
        println!("   {}: {}{}", entry.codename, entry.count, diff_suffix(entry.diff));
    }
    println!();
    println!(
        "   Total: {}{}",
        snapshot.total(),
        diff_suffix(snapshot.total_diff())
    );

    Ok(())
}
