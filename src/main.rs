//! # sentinel
//!
//! Telemetry relay binary: `serve` runs the WebSocket relay, `watch`
//! subscribes to one and logs what arrives.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use sentinel_client::{ClientConfig, ClientEvent, EventKind, LiveView, TelemetryClient};
use sentinel_server::ServerConfig;
use sentinel_settings::{SentinelSettings, StoreBackend};
use sentinel_store::{Database, MemorySessionStore, SessionStore, SqliteSessionStore};
use sentinel_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "sentinel", about = "Real-time telemetry relay")]
struct Cli {
    /// Settings file (defaults to `~/.sentinel/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server.
    Serve {
        /// Port to bind (overrides settings, 0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Connect as a subscriber and log live frames.
    Watch {
        /// Relay URL (overrides settings).
        #[arg(long)]
        url: Option<String>,
    },
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn open_store(settings: &SentinelSettings) -> Result<Arc<dyn SessionStore>> {
    match settings.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemorySessionStore::new())),
        StoreBackend::Sqlite => {
            let path = PathBuf::from(&settings.store.sqlite_path);
            ensure_parent_dir(&path)?;
            let db = Database::open(&path)
                .with_context(|| format!("Failed to open database: {}", path.display()))?;
            tracing::info!(path = %path.display(), "sqlite session store opened");
            Ok(Arc::new(SqliteSessionStore::new(db)))
        }
    }
}

async fn serve(settings: SentinelSettings, port: Option<u16>) -> Result<()> {
    let mut config = ServerConfig::from(&settings.server);
    if let Some(port) = port {
        config.port = port;
    }

    let store = open_store(&settings)?;
    let metrics = match sentinel_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let handle = sentinel_server::start(config, store, metrics)
        .await
        .context("Failed to start relay server")?;
    tracing::info!(url = %handle.ws_url(), "relay listening");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("ctrl-c received, shutting down");

    if !handle.shutdown().await {
        tracing::warn!("some connection tasks did not finish before the shutdown timeout");
    }
    Ok(())
}

async fn watch(settings: SentinelSettings, url: Option<String>) -> Result<()> {
    let mut config = ClientConfig::from(&settings.client);
    if let Some(url) = url {
        config.url = url;
    }

    let client = TelemetryClient::connect(config);
    let view = Arc::new(Mutex::new(LiveView::new(settings.client.history_capacity)));

    for kind in [
        EventKind::LiveSensorData,
        EventKind::SessionStarted,
        EventKind::SessionEnded,
    ] {
        let view = Arc::clone(&view);
        let _ = client.on(kind, move |event| {
            let mut view = view.lock();
            view.apply(event);
            match event {
                ClientEvent::LiveSensorData(payload) => tracing::debug!(
                    flex = ?payload.flex_values(),
                    accel = payload.imu.acceleration.magnitude(),
                    history = view.history().len(),
                    elapsed = %view.elapsed_display().unwrap_or_default(),
                    "live sample"
                ),
                ClientEvent::SessionStarted(id) => {
                    tracing::info!(session_id = %id, "session started")
                }
                ClientEvent::SessionEnded => tracing::info!("session ended"),
                _ => {}
            }
        });
    }
    let _ = client.on(EventKind::Connected, |_| tracing::info!("connected to relay"));
    let _ = client.on(EventKind::ReconnectExhausted, |event| {
        if let ClientEvent::ReconnectExhausted { attempts } = event {
            tracing::error!(attempts, "relay unreachable, giving up (restart to retry)");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    client.disconnect().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(sentinel_settings::settings_path);
    let settings = sentinel_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings: {}", settings_path.display()))?;

    let _telemetry = init_telemetry(TelemetryConfig::from_level_str(
        &settings.logging.level,
        settings.logging.json,
    ));

    match cli.command {
        Command::Serve { port } => serve(settings, port).await,
        Command::Watch { url } => watch(settings, url).await,
    }
}
