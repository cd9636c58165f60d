//! Prometheus-compatible metrics endpoint
//!
//! Counters are plain atomics written by the session tasks; the endpoint
//! renders them on demand. Default endpoint: http://localhost:<port>/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::state::GameState;

/// Samples kept for tick-time percentiles
const TICK_HISTORY: usize = 1000;

/// Metrics registry for one process
#[derive(Debug)]
pub struct SimMetrics {
    // Simulation
    pub ticks: AtomicU64,
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub wave: AtomicU64,
    pub score: AtomicU64,
    pub enemies_alive: AtomicU64,
    pub projectiles_active: AtomicU64,
    pub bosses_defeated: AtomicU64,

    // Replication
    pub snapshots_sent: AtomicU64,
    pub snapshot_bytes: AtomicU64,
    pub snapshots_applied: AtomicU64,
    pub frames_received: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub encode_failures: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            wave: AtomicU64::new(0),
            score: AtomicU64::new(0),
            enemies_alive: AtomicU64::new(0),
            projectiles_active: AtomicU64::new(0),
            bosses_defeated: AtomicU64::new(0),
            snapshots_sent: AtomicU64::new(0),
            snapshot_bytes: AtomicU64::new(0),
            snapshots_applied: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.ticks.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Copy match gauges from the authoritative state
    pub fn observe_state(&self, state: &GameState) {
        self.wave.store(state.wave.number as u64, Ordering::Relaxed);
        self.score.store(state.score.score, Ordering::Relaxed);
        self.enemies_alive.store(state.enemies.len() as u64, Ordering::Relaxed);
        self.projectiles_active
            .store(state.projectiles.active_count() as u64, Ordering::Relaxed);
        self.bosses_defeated
            .store(state.bosses_defeated as u64, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self, bytes: usize) {
        self.snapshots_sent.fetch_add(1, Ordering::Relaxed);
        self.snapshot_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("wave_survival_ticks_total", "Simulation ticks processed", "counter",
            self.ticks.load(Ordering::Relaxed));
        metric!("wave_survival_tick_time_microseconds", "Last tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("wave_survival_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("wave_survival_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("wave_survival_tick_time_max_microseconds", "Maximum recent tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));

        metric!("wave_survival_wave", "Current wave number", "gauge",
            self.wave.load(Ordering::Relaxed));
        metric!("wave_survival_score", "Current score", "gauge",
            self.score.load(Ordering::Relaxed));
        metric!("wave_survival_enemies_alive", "Living enemies", "gauge",
            self.enemies_alive.load(Ordering::Relaxed));
        metric!("wave_survival_projectiles_active", "Active projectiles", "gauge",
            self.projectiles_active.load(Ordering::Relaxed));
        metric!("wave_survival_bosses_defeated", "Bosses defeated this run", "gauge",
            self.bosses_defeated.load(Ordering::Relaxed));

        metric!("wave_survival_snapshots_sent_total", "Snapshots broadcast by the host", "counter",
            self.snapshots_sent.load(Ordering::Relaxed));
        metric!("wave_survival_snapshot_bytes_total", "Encoded snapshot bytes", "counter",
            self.snapshot_bytes.load(Ordering::Relaxed));
        metric!("wave_survival_snapshots_applied_total", "Snapshots applied by the guest", "counter",
            self.snapshots_applied.load(Ordering::Relaxed));
        metric!("wave_survival_frames_received_total", "Relay frames received", "counter",
            self.frames_received.load(Ordering::Relaxed));
        metric!("wave_survival_frames_dropped_total", "Malformed or rejected relay frames", "counter",
            self.frames_dropped.load(Ordering::Relaxed));
        metric!("wave_survival_encode_failures_total", "Outbound frames that failed to encode", "counter",
            self.encode_failures.load(Ordering::Relaxed));
        metric!("wave_survival_uptime_seconds", "Process uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `/metrics` over plain HTTP until the listener fails
pub async fn start_metrics_server(metrics: Arc<SimMetrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = if request.starts_with("GET /metrics") {
                        let body = metrics.render_prometheus();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else if request.starts_with("GET /health") {
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK"
                            .to_string()
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tick_time() {
        let metrics = SimMetrics::new();
        for i in 0..100 {
            metrics.record_tick_time(Duration::from_micros(100 + i * 10));
        }
        assert_eq!(metrics.ticks.load(Ordering::Relaxed), 100);
        assert!(metrics.tick_time_p95_us.load(Ordering::Relaxed) >= 1040);
        assert_eq!(metrics.tick_time_max_us.load(Ordering::Relaxed), 1090);
    }

    #[test]
    fn test_history_is_bounded() {
        let metrics = SimMetrics::new();
        for _ in 0..(TICK_HISTORY + 50) {
            metrics.record_tick_time(Duration::from_micros(5));
        }
        assert_eq!(metrics.tick_history.read().len(), TICK_HISTORY);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = SimMetrics::new();
        metrics.record_snapshot(400);
        metrics.record_snapshot(600);
        let mut state = GameState::with_defaults(false);
        state.wave.number = 7;
        metrics.observe_state(&state);

        let output = metrics.render_prometheus();
        assert!(output.contains("wave_survival_snapshots_sent_total 2"));
        assert!(output.contains("wave_survival_snapshot_bytes_total 1000"));
        assert!(output.contains("wave_survival_wave 7"));
        assert!(output.contains("# TYPE wave_survival_ticks_total counter"));
    }
}
