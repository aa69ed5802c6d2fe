//! sizingd — the cluster sizing daemon.
//!
//! Single binary that assembles the sizing subsystems:
//! - State store (redb)
//! - Sizing controller (debounce + fleet transition limiter)
//! - Configuration and node count file watchers
//! - REST status API
//!
//! # Usage
//!
//! ```text
//! sizingd run --config sizing.toml --nodes nodes.toml --data-dir /var/lib/sizing
//! sizingd validate --config sizing.toml
//! sizingd classify --config sizing.toml --nodes 42
//! ```

mod node_counts;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use clap::{Parser, Subcommand};
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use sizing_controller::{ConfigUpdate, LogOnlyEffectsApplier, SizingController};
use sizing_core::{ClusterSizingConfiguration, Condition, ConfigResult, SizeClass, epoch_millis};
use sizing_state::StateStore;

use crate::node_counts::FileNodeCountSource;

const DEFAULT_LOG_FILTER: &str = "info,sizingd=debug,sizing_controller=debug";

#[derive(Parser)]
#[command(name = "sizingd", about = "Cluster sizing daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sizing controller and the status API.
    Run {
        /// Sizing configuration file (TOML, or JSON if it ends in `.json`).
        #[arg(long)]
        config: PathBuf,

        /// Node count file mapping cluster ids to node counts.
        #[arg(long)]
        nodes: PathBuf,

        /// Port to serve the status API on.
        #[arg(long, default_value = "8480")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/sizing")]
        data_dir: PathBuf,

        /// Evaluation interval in seconds.
        #[arg(long, default_value = "30")]
        interval: u64,

        /// How often to re-read the configuration and node count files, in
        /// seconds.
        #[arg(long, default_value = "5")]
        reload_interval: u64,
    },

    /// Validate a configuration file and print its status condition.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },

    /// Print the size class and effects for a node count.
    Classify {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        nodes: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run {
            config,
            nodes,
            port,
            data_dir,
            interval,
            reload_interval,
        } => {
            run_daemon(
                config,
                nodes,
                port,
                data_dir,
                Duration::from_secs(interval.max(1)),
                Duration::from_secs(reload_interval.max(1)),
            )
            .await
        }
        Command::Validate { config } => {
            let condition = validate_condition(&config, epoch_millis());
            println!("{}", serde_json::to_string_pretty(&condition)?);
            if !condition.is_true() {
                anyhow::bail!("configuration {} is invalid", config.display());
            }
            Ok(())
        }
        Command::Classify { config, nodes } => {
            let class = classify(&config, nodes)?;
            println!("{}", serde_json::to_string_pretty(&class)?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// The `ClusterSizingConfigurationValid` condition for a configuration file.
fn validate_condition(path: &Path, now: u64) -> Condition {
    let result = ClusterSizingConfiguration::from_file(path).and_then(|c| c.validate());
    Condition::configuration_valid(result.as_ref().map(|_| ()), 1, now)
}

fn classify(path: &Path, node_count: u32) -> anyhow::Result<SizeClass> {
    let policy = ClusterSizingConfiguration::from_file(path)?.validate()?;
    Ok(policy.partition.classify(node_count).clone())
}

async fn run_daemon(
    config_path: PathBuf,
    nodes_path: PathBuf,
    port: u16,
    data_dir: PathBuf,
    interval: Duration,
    reload_interval: Duration,
) -> anyhow::Result<()> {
    info!("sizing daemon starting");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("sizing.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let source = Arc::new(FileNodeCountSource::new(nodes_path.clone()));
    let mut controller =
        SizingController::new(store.clone(), source, Arc::new(LogOnlyEffectsApplier));
    controller.restore()?;

    // ── Channels ───────────────────────────────────────────────

    let initial: ConfigUpdate = Arc::new(ClusterSizingConfiguration::from_file(&config_path));
    let (config_tx, config_rx) = watch::channel(initial);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let trigger = Arc::new(Notify::new());

    // ── Background tasks ───────────────────────────────────────

    let watcher_handle = tokio::spawn(watch_files(
        config_path,
        nodes_path,
        reload_interval,
        config_tx,
        Arc::clone(&trigger),
        shutdown_rx.clone(),
    ));

    let controller_shutdown = shutdown_rx.clone();
    let controller_handle = tokio::spawn(async move {
        controller
            .run(interval, config_rx, trigger, controller_shutdown)
            .await;
    });

    // ── Status API ─────────────────────────────────────────────

    let router = sizing_api::build_router(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "status API starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = watcher_handle.await;
    let _ = controller_handle.await;

    info!("sizing daemon stopped");
    Ok(())
}

/// Re-read the configuration file and watch the node count file.
///
/// A changed configuration is pushed to the controller; a modified node
/// count file triggers an evaluation without waiting for the next tick.
async fn watch_files(
    config_path: PathBuf,
    nodes_path: PathBuf,
    reload_interval: Duration,
    config_tx: watch::Sender<ConfigUpdate>,
    trigger: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(reload_interval);
    let mut nodes_modified = modified_at(&nodes_path);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let loaded = ClusterSizingConfiguration::from_file(&config_path);
                let changed = config_tx.send_if_modified(|current| {
                    if same_input(current, &loaded) {
                        return false;
                    }
                    *current = Arc::new(loaded);
                    true
                });
                if changed {
                    info!(path = ?config_path, "configuration file changed");
                }

                let modified = modified_at(&nodes_path);
                if modified != nodes_modified {
                    debug!(path = ?nodes_path, "node count file changed");
                    nodes_modified = modified;
                    trigger.notify_one();
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => Some(modified),
        Err(e) => {
            warn!(path = ?path, error = %e, "cannot stat node count file");
            None
        }
    }
}

/// Whether two load results describe the same input. Errors compare by
/// message.
fn same_input(
    a: &ConfigResult<ClusterSizingConfiguration>,
    b: &ConfigResult<ClusterSizingConfiguration>,
) -> bool {
    match (a, b) {
        (Ok(a), Ok(b)) => a == b,
        (Err(a), Err(b)) => a.to_string() == b.to_string(),
        _ => false,
    }
}
