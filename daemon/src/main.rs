use anyhow::Result;
use clap::Parser;
use cpuwatch_daemon::{
    config::{Config, Overrides},
    watchdog::Watchdog,
};
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Kill watched processes whose CPU usage exceeds a threshold, and keep an
/// append-only record of every kill.
#[derive(Parser, Debug)]
#[command(name = "cpuwatch", version, about)]
struct Cli {
    /// Config file path (default: per-user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CPU percentage above which a watched process is killed
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Seconds between scans
    #[arg(short, long)]
    interval: Option<f64>,

    /// Process name to watch; repeat for several (replaces the configured list)
    #[arg(short, long = "watch", value_name = "NAME")]
    watch: Vec<String>,

    /// Directory holding the <hostname>.txt audit log
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Print the resolved policy and exit
    #[arg(long)]
    dry_run: bool,
}

fn load_config(path: Option<PathBuf>) -> Config {
    let explicit = path.is_some();
    let config_path = path.unwrap_or_else(Config::config_path);
    if config_path.exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        })
    } else {
        if explicit {
            warn!("Config file {:?} not found, using defaults", config_path);
        } else {
            info!("No config file found, using defaults");
        }
        Config::default()
    }
}

async fn shutdown_signal() {
    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = term.recv() => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("cpuwatch v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config);
    config.apply(Overrides {
        threshold_percent: cli.threshold,
        poll_interval_seconds: cli.interval,
        watched_processes: cli.watch,
        log_dir: cli.log_dir,
    });
    let policy = config.policy()?;

    info!(
        watched = ?policy.watched_names,
        threshold = policy.threshold_percent,
        interval = ?policy.poll_interval,
        log = %policy.log_path.display(),
        "Policy loaded"
    );

    if cli.dry_run {
        println!("{:#?}", policy);
        return Ok(());
    }

    let mut watchdog = Watchdog::from_policy(&policy);
    if cli.once {
        watchdog.tick();
        return Ok(());
    }

    watchdog.run(shutdown_signal()).await;
    Ok(())
}
