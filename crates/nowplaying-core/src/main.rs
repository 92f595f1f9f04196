use std::sync::Arc;

use nowplaying_core::bridge::SyncBridge;
use nowplaying_core::console::{self, ConsoleInput};
use nowplaying_core::core::{self, CoreEvent, PlayerCore};
use nowplaying_core::mpv::MpvResource;
use nowplaying_core::playback::PlaybackController;
use nowplaying_core::{http, BroadcastMessage};
use nowplaying_proto::catalog::CachedCatalog;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = nowplaying_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("nowplaying.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; otherwise debug for our code with the HTTP internals quiet
    let log_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "debug,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("nowplaying log: {}", log_path.display());
    tracing::info!("nowplaying starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match nowplaying_proto::config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config: {:#}, using defaults", e);
            Default::default()
        }
    };

    // ── Channels ─────────────────────────────────────────────────────────────
    let (broadcast_tx, _) = broadcast::channel::<BroadcastMessage>(1024);
    let (event_tx, event_rx) = mpsc::channel::<CoreEvent>(1024);
    let (resource_tx, resource_rx) = mpsc::channel(256);

    // ── Catalog, resource, core ──────────────────────────────────────────────
    let catalog = Arc::new(CachedCatalog::new(config.catalog.source.clone()));
    let resource = MpvResource::start(config.player.default_volume, resource_tx).await?;
    let controller = PlaybackController::new(resource, config.player.default_volume);
    let player_core = PlayerCore::new(
        controller,
        Arc::clone(&catalog),
        &config,
        broadcast_tx.clone(),
        event_tx.clone(),
    );
    let bridge = SyncBridge::new(player_core.store(), event_tx.clone(), broadcast_tx);

    core::forward_resource_events(resource_rx, event_tx);
    let core_task = tokio::spawn(async move {
        if let Err(e) = player_core.run(event_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            bridge.clone(),
            catalog,
        );
    }

    // ── Console ──────────────────────────────────────────────────────────────
    println!("nowplaying ready, type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match console::parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleInput::Command(cmd))) => {
                bridge.send(cmd).await;
            }
            Ok(Some(ConsoleInput::State)) => {
                println!("{}", console::render_status(&bridge.snapshot().await));
            }
            Ok(Some(ConsoleInput::Help)) => println!("{}", console::HELP),
            Ok(Some(ConsoleInput::Quit)) => break,
            Err(e) => println!("{}", e),
        }
    }

    bridge.shutdown().await;
    core_task.await?;
    tracing::info!("nowplaying stopped");
    Ok(())
}
