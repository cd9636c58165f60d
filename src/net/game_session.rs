//! Session driver - runs one peer against the relay
//!
//! The replication strategy (host or guest) is picked once when the session
//! is built. The session owns the relay link and the display clock: each
//! frame it drains incoming frames, lets the autopilot act, runs the role's
//! frame and ships whatever the role produced.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::autopilot::Autopilot;
use crate::game::match_result::MatchSummary;
use crate::game::state::{GameState, PlayerSlot};
use crate::game::systems::upgrade::Upgrade;
use crate::metrics::SimMetrics;
use crate::net::protocol::{self, PlayerInput, RelayMessage};
use crate::relay::{RelayError, RelayLink};

/// Display refresh rate driving [`GameSession::run`]
pub const FRAME_RATE: u32 = 60;

/// Replication strategy of one peer
pub trait PeerRole: Send {
    fn name(&self) -> &'static str;

    fn local_slot(&self) -> PlayerSlot;

    /// Handle one decoded relay message
    fn on_message(&mut self, message: RelayMessage);

    /// Run one display frame at `now_ms`; returns messages to send
    fn frame(&mut self, now_ms: f64, input: PlayerInput) -> Vec<RelayMessage>;

    /// Options offered to the local player while a choice is outstanding
    fn pending_offer(&self) -> Option<&[Upgrade]>;

    fn choose_upgrade(&mut self, choice: usize);

    /// The match as this peer sees it
    fn world(&self) -> &GameState;

    /// Final result, once the host has declared the match over
    fn summary(&self) -> Option<&MatchSummary>;

    /// Wind down; returns any last messages
    fn stop(&mut self) -> Vec<RelayMessage>;
}

/// How this peer presents itself in the room roster
#[derive(Debug, Clone, PartialEq)]
pub struct PeerIdentity {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

impl PeerIdentity {
    pub fn new(name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            avatar: avatar.into(),
        }
    }
}

/// One peer's connection to a match
pub struct GameSession {
    role: Box<dyn PeerRole>,
    link: RelayLink,
    identity: PeerIdentity,
    pilot: Autopilot,
    metrics: Arc<SimMetrics>,
    frames: u64,
}

impl GameSession {
    pub fn new(
        role: Box<dyn PeerRole>,
        link: RelayLink,
        identity: PeerIdentity,
        metrics: Arc<SimMetrics>,
    ) -> Self {
        let pilot = Autopilot::new(role.local_slot());
        info!(
            "{} session for {} ({}) on connection {}",
            role.name(),
            identity.name,
            identity.id,
            link.id()
        );
        Self {
            role,
            link,
            identity,
            pilot,
            metrics,
            frames: 0,
        }
    }

    pub fn role(&self) -> &dyn PeerRole {
        self.role.as_ref()
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// Announce this peer to the room
    pub fn join(&self) -> Result<(), RelayError> {
        let message = RelayMessage::PlayerJoin {
            id: self.identity.id.clone(),
            name: self.identity.name.clone(),
            avatar: self.identity.avatar.clone(),
        };
        self.send(&message)
    }

    /// Encode and send one message; encode failures are logged and skipped
    pub fn send(&self, message: &RelayMessage) -> Result<(), RelayError> {
        let text = match protocol::encode(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {}: {}", message.kind(), e);
                self.metrics.encode_failures.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };
        if let RelayMessage::GameState { .. } = message {
            self.metrics.record_snapshot(text.len());
        }
        self.link.send(text)
    }

    /// Decode and dispatch every frame waiting on the link
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(text) = self.link.try_recv() {
            self.metrics.frames_received.fetch_add(1, Ordering::Relaxed);
            match protocol::decode(&text) {
                Ok(message) => {
                    self.role.on_message(message);
                    handled += 1;
                }
                Err(e) => {
                    warn!("Dropping malformed relay frame: {}", e);
                    self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        handled
    }

    /// One display frame at `now_ms`
    pub fn step(&mut self, now_ms: f64) -> Result<(), RelayError> {
        self.pump();
        self.frames += 1;

        if self.role.pending_offer().is_some() {
            if let Some(choice) = self.pilot.choose_upgrade(self.role.world()) {
                self.role.choose_upgrade(choice);
            }
        }

        let input = self.pilot.input(self.role.world());
        for message in self.role.frame(now_ms, input) {
            self.send(&message)?;
        }
        Ok(())
    }

    /// Drive frames at [`FRAME_RATE`] until the match ends or `limit` passes
    pub async fn run(mut self, limit: Duration) -> Option<MatchSummary> {
        let mut ticker = interval(Duration::from_secs(1) / FRAME_RATE);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("{} loop started at {} Hz", self.role.name(), FRAME_RATE);
        let start = Instant::now();

        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();
            if let Err(e) = self.step(elapsed.as_secs_f64() * 1000.0) {
                warn!("{} lost the relay: {}", self.role.name(), e);
                break;
            }

            if self.role.summary().is_some() {
                // Let the final frames reach the relay before the link drops
                self.pump();
                break;
            }

            if elapsed >= limit {
                info!("{} reached its time limit", self.role.name());
                for message in self.role.stop() {
                    if let Err(e) = self.send(&message) {
                        debug!("Final message not sent: {}", e);
                    }
                }
                break;
            }

            // Log stats periodically (every 30 seconds)
            if self.frames % (FRAME_RATE as u64 * 30) == 0 {
                let world = self.role.world();
                info!(
                    "{} stats: wave {}, score {}, {} enemies, {} projectiles, frames dropped {}",
                    self.role.name(),
                    world.wave.number,
                    world.score.score,
                    world.enemies.len(),
                    world.projectiles.active_count(),
                    self.metrics.frames_dropped.load(Ordering::Relaxed)
                );
            }
        }

        let summary = self.role.summary().cloned();
        info!(
            "{} session ended after {} frames{}",
            self.role.name(),
            self.frames,
            if summary.is_some() { "" } else { " without a result" }
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::net::guest::GuestPrediction;
    use crate::net::host::HostSimulation;
    use crate::relay::RelayHandle;

    #[tokio::test]
    async fn test_host_frames_reach_guest() {
        let hub = RelayHandle::spawn();
        let config = SimConfig::default();
        let metrics = Arc::new(SimMetrics::new());

        let host_link = hub.connect("T").await.unwrap();
        let guest_link = hub.connect("T").await.unwrap();
        let mut host = GameSession::new(
            Box::new(HostSimulation::new(&config, true, metrics.clone())),
            host_link,
            PeerIdentity::new("Host", "a.png"),
            metrics.clone(),
        );
        let mut guest = GameSession::new(
            Box::new(GuestPrediction::new("g", &config, metrics.clone())),
            guest_link,
            PeerIdentity::new("Guest", "b.png"),
            metrics.clone(),
        );
        host.join().unwrap();
        guest.join().unwrap();

        for i in 0..10 {
            let now = i as f64 * 60.0;
            host.step(now).unwrap();
            guest.step(now).unwrap();
            tokio::task::yield_now().await;
        }
        // Give the hub a chance to flush
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        guest.pump();

        assert!(metrics.snapshots_sent.load(Ordering::Relaxed) > 0);
        assert!(metrics.snapshots_applied.load(Ordering::Relaxed) > 0);
        assert_eq!(metrics.frames_dropped.load(Ordering::Relaxed), 0);
        hub.shutdown();
    }

    #[test]
    fn test_identity_ids_are_unique() {
        let a = PeerIdentity::new("Ada", "a.png");
        let b = PeerIdentity::new("Ada", "a.png");
        assert_ne!(a.id, b.id);
    }
}
