//! Authoritative peer
//!
//! Runs the canonical [`GameLoop`] from display frames, takes the partner's
//! input from the relay, and broadcasts a snapshot on its own wall-clock
//! timer, independent of how many ticks a frame ran.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::game::constants::sim;
use crate::game::game_loop::{GameLoop, GameLoopConfig, GameLoopEvent};
use crate::game::input_buffer::{InputBuffer, InputSender};
use crate::game::match_result::{summarize, MatchSummary};
use crate::game::state::{GameState, PlayerSlot, HOST_SLOT, PARTNER_SLOT};
use crate::game::systems::upgrade::Upgrade;
use crate::game::timestep::{FixedTimestep, HitStop};
use crate::metrics::SimMetrics;
use crate::net::codec::Snapshot;
use crate::net::game_session::PeerRole;
use crate::net::protocol::{OfferMessage, PlayerInput, RelayMessage};
use crate::util::vec2::Vec2;

/// Host-side replication strategy
pub struct HostSimulation {
    game: GameLoop,
    clock: FixedTimestep,
    hit_stop: HitStop,
    remote: InputBuffer,
    remote_tx: InputSender,
    snapshot_interval_ms: f64,
    last_snapshot_ms: Option<f64>,
    summary: Option<MatchSummary>,
    outbox: Vec<RelayMessage>,
    metrics: Arc<SimMetrics>,
}

impl HostSimulation {
    pub fn new(config: &SimConfig, coop: bool, metrics: Arc<SimMetrics>) -> Self {
        info!(
            "Host simulation created (seed {}, {} player(s))",
            config.seed,
            if coop { 2 } else { 1 }
        );
        let remote = InputBuffer::default();
        Self {
            game: GameLoop::new(GameLoopConfig::from_sim(config, coop)),
            clock: FixedTimestep::new(config.tick_rate, config.max_catchup_ticks),
            hit_stop: HitStop::new(),
            remote_tx: remote.sender(),
            remote,
            snapshot_interval_ms: config.snapshot_interval_ms,
            last_snapshot_ms: None,
            summary: None,
            outbox: Vec::new(),
            metrics,
        }
    }

    pub fn game(&self) -> &GameLoop {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameLoop {
        &mut self.game
    }

    fn run_ticks(&mut self, ticks: u32) {
        for _ in 0..ticks {
            let started = Instant::now();
            let events = self.game.tick();
            self.metrics.record_tick_time(started.elapsed());
            self.handle_events(events);
            if self.game.state().game_over {
                break;
            }
        }
        self.metrics.observe_state(self.game.state());
    }

    fn handle_events(&mut self, events: Vec<GameLoopEvent>) {
        for event in events {
            if let Some((factor, ms)) = event.hit_stop() {
                self.hit_stop.trigger(factor, ms);
            }
            match event {
                GameLoopEvent::UpgradeRoundStarted => self.offer_round(),
                GameLoopEvent::UpgradeRoundFinished => {
                    self.outbox.push(RelayMessage::UpgradesComplete);
                }
                GameLoopEvent::GameOver => self.end_match(),
                GameLoopEvent::PlayerDied { slot } => {
                    debug!("Slot {} down at tick {}", slot, self.game.tick_count());
                }
                _ => {}
            }
        }
    }

    /// Queue the open round's offers, plus the host's pick if already made
    fn offer_round(&mut self) {
        let Some(round) = self.game.state().upgrade_round.as_ref() else {
            return;
        };
        let offers = round
            .offers
            .iter()
            .map(|o| OfferMessage {
                slot: o.slot,
                options: o.options.clone(),
            })
            .collect();
        let host_choice = round.offer(HOST_SLOT).and_then(|o| o.choice);
        self.outbox.push(RelayMessage::LevelUp { offers });
        if let Some(choice) = host_choice {
            self.outbox.push(RelayMessage::UpgradeSelected {
                slot: HOST_SLOT,
                choice,
            });
        }
    }

    /// True while the partner still owes a choice in the open round
    fn partner_undecided(&self) -> bool {
        self.game
            .state()
            .upgrade_round
            .as_ref()
            .and_then(|r| r.offer(PARTNER_SLOT))
            .is_some_and(|o| o.choice.is_none())
    }

    fn end_match(&mut self) {
        if self.summary.is_some() {
            return;
        }
        let summary = summarize(self.game.state());
        info!(
            "Match summary: score {} wave {} kills {} in {} ms",
            summary.score, summary.wave, summary.kills, summary.run_time_ms
        );
        self.outbox.push(RelayMessage::GameOver {
            summary: summary.clone(),
        });
        self.summary = Some(summary);
    }

    fn apply_choice(&mut self, slot: PlayerSlot, choice: usize) -> bool {
        match self.game.select_upgrade(slot, choice) {
            Ok(_) => {
                let events = self.game.drain_events();
                self.handle_events(events);
                true
            }
            Err(e) => {
                warn!("Upgrade choice {} from slot {} rejected: {}", choice, slot, e);
                false
            }
        }
    }

    /// Capture and queue a snapshot if the broadcast timer is due
    fn maybe_snapshot(&mut self, now_ms: f64) {
        let due = self
            .last_snapshot_ms
            .map(|last| now_ms - last >= self.snapshot_interval_ms)
            .unwrap_or(true);
        if !due {
            return;
        }
        self.last_snapshot_ms = Some(now_ms);

        let repaired = sanitize_state(self.game.state_mut());
        if repaired > 0 {
            warn!("Repaired {} non-finite value(s) before snapshot", repaired);
        }
        if let Some(snapshot) = Snapshot::capture(self.game.state(), self.game.tick_count()) {
            self.outbox.push(RelayMessage::GameState {
                snapshot: snapshot.to_wire(),
            });
        }
    }
}

impl PeerRole for HostSimulation {
    fn name(&self) -> &'static str {
        "host"
    }

    fn local_slot(&self) -> PlayerSlot {
        HOST_SLOT
    }

    fn on_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::PlayerInput { input, .. } => {
                if let Err(e) = self.remote_tx.try_send(PARTNER_SLOT, input) {
                    warn!("Dropping remote input: {}", e);
                }
            }
            RelayMessage::UpgradeSelected { slot, choice } if slot != HOST_SLOT => {
                self.apply_choice(slot, choice);
            }
            RelayMessage::RoomInfo { players, .. } => {
                debug!("Roster now has {} player(s)", players.len());
                // A partner that (re)joined mid-round never saw the offers
                let partner_online = players.iter().any(|p| !p.host && p.connected);
                if partner_online && self.partner_undecided() {
                    info!("Re-sending upgrade offers to returning partner");
                    self.offer_round();
                }
            }
            other => debug!("Host ignoring {}", other.kind()),
        }
    }

    fn frame(&mut self, now_ms: f64, input: PlayerInput) -> Vec<RelayMessage> {
        self.game.set_input(HOST_SLOT, input);
        if let Some(remote) = self.remote.drain_latest()[PARTNER_SLOT as usize].take() {
            self.game.set_input(PARTNER_SLOT, remote);
        }

        if self.summary.is_none() {
            let slow_mo = self.hit_stop.update(now_ms);
            let ticks = self.clock.advance(now_ms, slow_mo);
            self.run_ticks(ticks);
            self.maybe_snapshot(now_ms);
        }
        std::mem::take(&mut self.outbox)
    }

    fn pending_offer(&self) -> Option<&[Upgrade]> {
        let offer = self.game.state().upgrade_round.as_ref()?.offer(HOST_SLOT)?;
        match offer.choice {
            Some(_) => None,
            None => Some(&offer.options),
        }
    }

    fn choose_upgrade(&mut self, choice: usize) {
        if self.apply_choice(HOST_SLOT, choice) {
            self.outbox.push(RelayMessage::UpgradeSelected {
                slot: HOST_SLOT,
                choice,
            });
        }
    }

    fn world(&self) -> &GameState {
        self.game.state()
    }

    fn summary(&self) -> Option<&MatchSummary> {
        self.summary.as_ref()
    }

    fn stop(&mut self) -> Vec<RelayMessage> {
        if let Some(snapshot) = Snapshot::capture(self.game.state(), self.game.tick_count()) {
            self.outbox.push(RelayMessage::GameState {
                snapshot: snapshot.to_wire(),
            });
        }
        self.end_match();
        std::mem::take(&mut self.outbox)
    }
}

/// Replace non-finite positions, velocities and health; returns repairs made
pub fn sanitize_state(state: &mut GameState) -> usize {
    let center = state.arena * 0.5;
    let mut repaired = 0;

    for p in state.players.iter_mut() {
        if !p.position.is_finite() {
            warn!("Fixed non-finite position for slot {}", p.slot);
            p.position = center;
            repaired += 1;
        }
        if !p.velocity.is_finite() {
            warn!("Fixed non-finite velocity for slot {}", p.slot);
            p.velocity = Vec2::ZERO;
            repaired += 1;
        }
        if !p.health.is_finite() {
            warn!("Fixed non-finite health for slot {}", p.slot);
            p.health = if p.alive { p.max_health } else { 0.0 };
            repaired += 1;
        }
    }

    for e in state.enemies.iter_mut() {
        if !e.position.is_finite() {
            warn!("Fixed non-finite position for enemy {}", e.id);
            e.position = Vec2::new(center.x, -sim::SPAWN_MARGIN);
            repaired += 1;
        }
        if !e.velocity.is_finite() {
            e.velocity = Vec2::ZERO;
            repaired += 1;
        }
        if !e.health.is_finite() {
            warn!("Fixed non-finite health for enemy {}", e.id);
            e.health = e.max_health;
            repaired += 1;
        }
    }

    for o in state.orbs.iter_mut() {
        if !o.position.is_finite() {
            o.position = center;
            repaired += 1;
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::ticks_to_ms;
    use crate::game::state::EnemyKind;
    use crate::game::systems::enemy::create_enemy;
    use crate::net::protocol::RosterEntry;

    fn roster(partner_connected: bool) -> RelayMessage {
        let entry = |id: &str, host: bool, connected: bool| RosterEntry {
            id: id.into(),
            name: id.into(),
            avatar: format!("{}.png", id),
            host,
            connected,
        };
        RelayMessage::RoomInfo {
            room: "ROOM".into(),
            host_id: Some("host".into()),
            players: vec![entry("host", true, true), entry("guest", false, partner_connected)],
        }
    }

    fn host() -> HostSimulation {
        HostSimulation::new(&SimConfig::default(), true, Arc::new(SimMetrics::new()))
    }

    fn snapshots(out: &[RelayMessage]) -> usize {
        out.iter()
            .filter(|m| matches!(m, RelayMessage::GameState { .. }))
            .count()
    }

    #[test]
    fn test_snapshot_cadence_is_wall_clock() {
        let mut host = host();
        let mut sent = 0;
        // One second of 60 Hz frames
        for i in 0..=60 {
            sent += snapshots(&host.frame(i as f64 * 1000.0 / 60.0, PlayerInput::default()));
        }
        // First frame plus every 50 ms
        assert!((15..=22).contains(&sent), "sent {}", sent);
        assert!(host.game().tick_count() >= 55);
    }

    #[test]
    fn test_snapshots_not_every_tick() {
        let mut host = host();
        host.frame(0.0, PlayerInput::default());
        // A long frame runs several ticks but yields one snapshot
        let out = host.frame(80.0, PlayerInput::default());
        assert!(host.game().tick_count() >= 4);
        assert_eq!(snapshots(&out), 1);
    }

    #[test]
    fn test_sim_time_tracks_wall_time() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        let mut host = HostSimulation::new(&config, true, Arc::new(SimMetrics::new()));
        for i in 0..=60 {
            host.frame(i as f64 * 1000.0 / 60.0, PlayerInput::default());
        }
        let ms = ticks_to_ms(host.world().run_ticks);
        assert!((950..=1000).contains(&ms), "{} ticks = {} ms", host.world().run_ticks, ms);
    }

    #[test]
    fn test_remote_input_drives_partner() {
        let mut host = host();
        let start = host.world().players[1].position;
        host.on_message(RelayMessage::PlayerInput {
            id: "guest".into(),
            input: PlayerInput {
                axis: Some(Vec2::new(1.0, 0.0)),
                ..Default::default()
            },
        });
        for i in 0..=30 {
            host.frame(i as f64 * 16.7, PlayerInput::default());
        }
        assert!(host.world().players[1].position.x > start.x + 20.0);
    }

    #[test]
    fn test_sanitize_repairs_nan() {
        let mut state = GameState::with_defaults(true);
        state.players[0].position = Vec2::new(f32::NAN, 3.0);
        state.players[1].velocity = Vec2::new(f32::INFINITY, 0.0);
        let mut e = create_enemy(EnemyKind::Basic, Vec2::ZERO, 1, 0, 1.0, false);
        e.health = f32::NAN;
        state.enemies.push(e);

        assert_eq!(sanitize_state(&mut state), 3);
        assert!(state.players[0].position.is_finite());
        assert_eq!(state.players[1].velocity, Vec2::ZERO);
        assert_eq!(state.enemies[0].health, state.enemies[0].max_health);
        assert_eq!(sanitize_state(&mut state), 0);
    }

    #[test]
    fn test_stop_emits_single_game_over() {
        let mut host = host();
        host.frame(0.0, PlayerInput::default());
        let out = host.stop();
        assert_eq!(
            out.iter()
                .filter(|m| matches!(m, RelayMessage::GameOver { .. }))
                .count(),
            1
        );
        assert!(host.summary().is_some());
        assert!(!host
            .stop()
            .iter()
            .any(|m| matches!(m, RelayMessage::GameOver { .. })));
    }

    #[test]
    fn test_upgrade_round_round_trip() {
        let mut host = host();
        for p in host.game_mut().state_mut().players.iter_mut() {
            p.pending_level_ups = 1;
        }
        host.frame(0.0, PlayerInput::default());
        let out = host.frame(20.0, PlayerInput::default());
        let offers = out.iter().find_map(|m| match m {
            RelayMessage::LevelUp { offers } => Some(offers.clone()),
            _ => None,
        });
        assert_eq!(offers.map(|o| o.len()), Some(2));
        assert!(host.world().paused);
        assert!(host.pending_offer().is_some());

        host.choose_upgrade(0);
        assert!(host.pending_offer().is_none());
        host.on_message(RelayMessage::UpgradeSelected {
            slot: PARTNER_SLOT,
            choice: 1,
        });
        let out = host.frame(40.0, PlayerInput::default());
        assert!(out.contains(&RelayMessage::UpgradeSelected { slot: HOST_SLOT, choice: 0 }));
        assert!(out.contains(&RelayMessage::UpgradesComplete));
        assert!(!host.world().paused);
    }

    #[test]
    fn test_returning_partner_gets_open_offers() {
        let mut host = host();
        for p in host.game_mut().state_mut().players.iter_mut() {
            p.pending_level_ups = 1;
        }
        host.frame(0.0, PlayerInput::default());
        host.frame(20.0, PlayerInput::default());
        host.choose_upgrade(0);
        host.frame(40.0, PlayerInput::default());
        assert!(host.world().paused);

        // Partner dropped: nothing to send
        host.on_message(roster(false));
        assert!(!host
            .frame(60.0, PlayerInput::default())
            .iter()
            .any(|m| matches!(m, RelayMessage::LevelUp { .. })));

        // Partner back: offers again, with the host's pick
        host.on_message(roster(true));
        let out = host.frame(80.0, PlayerInput::default());
        let offers = out.iter().find_map(|m| match m {
            RelayMessage::LevelUp { offers } => Some(offers.clone()),
            _ => None,
        });
        assert_eq!(offers.map(|o| o.len()), Some(2));
        assert!(out.contains(&RelayMessage::UpgradeSelected { slot: HOST_SLOT, choice: 0 }));

        // A fresh guest can now finish the round
        host.on_message(RelayMessage::UpgradeSelected {
            slot: PARTNER_SLOT,
            choice: 0,
        });
        let out = host.frame(100.0, PlayerInput::default());
        assert!(out.contains(&RelayMessage::UpgradesComplete));
        assert!(!host.world().paused);

        // Round closed: a later roster change sends nothing
        host.on_message(roster(true));
        assert!(!host
            .frame(120.0, PlayerInput::default())
            .iter()
            .any(|m| matches!(m, RelayMessage::LevelUp { .. })));
    }
}
