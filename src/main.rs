use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wave_survival::config::SimConfig;
use wave_survival::metrics::{self, SimMetrics};
use wave_survival::net::game_session::{GameSession, PeerIdentity};
use wave_survival::net::guest::GuestPrediction;
use wave_survival::net::host::HostSimulation;
use wave_survival::net::protocol::RelayMessage;
use wave_survival::relay::RelayHandle;
use wave_survival::util::vec2::Vec2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Wave Survival v{}", env!("CARGO_PKG_VERSION"));

    let config = SimConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: seed={}, {} Hz, snapshots every {} ms, arena {}x{}, room {}",
        config.seed,
        config.tick_rate,
        config.snapshot_interval_ms,
        config.arena_width,
        config.arena_height,
        config.room_code
    );

    let metrics = Arc::new(SimMetrics::new());
    if config.metrics_port != 0 {
        let metrics_clone = metrics.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let hub = RelayHandle::spawn();
    let host_link = hub.connect(&config.room_code).await?;
    let guest_link = hub.connect(&config.room_code).await?;

    let host = GameSession::new(
        Box::new(HostSimulation::new(&config, true, metrics.clone())),
        host_link,
        PeerIdentity::new("Host", "host.png"),
        metrics.clone(),
    );
    let guest_identity = PeerIdentity::new("Guest", "guest.png");
    let guest = GameSession::new(
        Box::new(GuestPrediction::new(
            guest_identity.id.clone(),
            &config,
            metrics.clone(),
        )),
        guest_link,
        guest_identity,
        metrics.clone(),
    );

    // Host joins first so the relay makes it host
    host.join()?;
    guest.join()?;
    host.send(&RelayMessage::StartGame {
        arena: Vec2::new(config.arena_width, config.arena_height),
    })?;

    let limit = Duration::from_secs(config.demo_seconds);
    let host_task = tokio::spawn(host.run(limit));
    // Guest outlives the host slightly so it can receive the final game-over
    let guest_task = tokio::spawn(guest.run(limit + Duration::from_secs(2)));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = async { (host_task.await, guest_task.await) } => {
            match result {
                (Ok(Some(summary)), guest) => {
                    info!(
                        "Match over: score {}, wave {}, {} kills, {} bosses, {:.1} kills/min",
                        summary.score,
                        summary.wave,
                        summary.kills,
                        summary.bosses_defeated,
                        summary.kills_per_minute
                    );
                    for p in &summary.players {
                        info!(
                            "  slot {}: level {}, {} kills, {:.0} damage taken{}",
                            p.slot,
                            p.level,
                            p.kills,
                            p.damage_taken,
                            if p.survived { "" } else { " (down)" }
                        );
                    }
                    match guest {
                        Ok(Some(seen)) if seen == summary => info!("Guest agrees on the result"),
                        Ok(Some(_)) => warn!("Guest received a different result"),
                        Ok(None) => warn!("Guest never received the result"),
                        Err(e) => error!("Guest task failed: {}", e),
                    }
                }
                (Ok(None), _) => warn!("Host ended without a result"),
                (Err(e), _) => error!("Host task failed: {}", e),
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    hub.shutdown();
    info!(
        "Stopped after {} ticks, {} snapshots ({} bytes)",
        metrics.ticks.load(std::sync::atomic::Ordering::Relaxed),
        metrics.snapshots_sent.load(std::sync::atomic::Ordering::Relaxed),
        metrics.snapshot_bytes.load(std::sync::atomic::Ordering::Relaxed)
    );

    Ok(())
}
