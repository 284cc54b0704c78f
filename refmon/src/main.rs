use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use refmon_core::{HttpComputeService, MonitorConfig};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "refmon")]
#[command(about = "Continuous regression monitor for goal documents")]
struct Args {
    /// Directory holding the .bb goal files
    goal_dir: PathBuf,

    /// Compare rendered graphs as well as documents
    #[arg(short, long)]
    graph: bool,

    /// Regenerate all reference artifacts on the first sweep
    #[arg(short, long)]
    force: bool,

    /// Seconds between periodic sweeps; only used when no source
    /// directories are watched
    #[arg(short, long, value_name = "SECS", conflicts_with = "watch")]
    delay: Option<u64>,

    /// Source directory to watch for changes (repeatable); replaces the
    /// periodic sweep timer
    #[arg(short, long, value_name = "DIR")]
    watch: Vec<PathBuf>,

    /// Computation service endpoint
    #[arg(long, default_value = "http://localhost:8777/")]
    service_url: String,

    /// Sound file played when a regression is detected
    #[arg(long, value_name = "FILE")]
    alert_sound: Option<PathBuf>,

    /// Sound file played when a sweep finishes clean
    #[arg(long, value_name = "FILE")]
    clear_sound: Option<PathBuf>,
}

fn config_from_args(args: &Args) -> anyhow::Result<MonitorConfig> {
    if !args.goal_dir.is_dir() {
        anyhow::bail!("goal directory {:?} does not exist", args.goal_dir);
    }
    for dir in &args.watch {
        if !dir.is_dir() {
            anyhow::bail!("watch directory {:?} does not exist", dir);
        }
    }

    let mut config = MonitorConfig::new(&args.goal_dir);
    config.watch_dirs = args.watch.clone();
    // Without watched sources the timer is the only recheck trigger
    config.sweep_delay = if args.watch.is_empty() {
        Some(std::time::Duration::from_secs(args.delay.unwrap_or(10)))
    } else {
        None
    };
    config.graph = args.graph;
    config.force_references = args.force;
    config.service_url = args.service_url.clone();
    config.regression_sound = args.alert_sound.clone();
    config.all_clear_sound = args.clear_sound.clone();
    Ok(config)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("refmon=info".parse().unwrap()),
        )
        .init();

    let config = match config_from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(2);
        }
    };

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");

    let result = rt.block_on(async {
        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, finishing current job");
                ctrl_c.cancel();
            }
        });

        let commands_rx = commands::spawn_stdin_reader();
        let service = Arc::new(HttpComputeService::new(config.service_url.clone()));

        refmon_core::run_monitor(config, service, commands_rx, cancel).await
    });

    if let Err(e) = result {
        tracing::error!("monitor failed: {e:#}");
        std::process::exit(1);
    }
}
