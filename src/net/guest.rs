//! Predicting peer
//!
//! The guest never writes authoritative enemy, score or wave state. It
//! keeps a render-only mirror of the match built from host snapshots, moves
//! its own avatar locally every tick with the same movement and firing
//! rules the host uses, and pulls that avatar toward the host's view with a
//! capped proportional correction. Enemies and the partner are interpolated
//! toward dead-reckoned snapshot positions instead of simulated.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::game::constants::{hitstop, net};
use crate::game::game_loop::IdGen;
use crate::game::match_result::MatchSummary;
use crate::game::pool::{Pool, SlotAction};
use crate::game::state::{
    clamp_to_arena, BossPhase, Buff, EnemyExt, EnemyId, ExperienceOrb, FormationRole, FormationSlot,
    GameState, Motion, Owner, Player, PlayerSlot, PowerUp, Projectile, Tick, WaveEvent,
    PARTNER_SLOT,
};
use crate::game::systems::enemy::create_enemy;
use crate::game::systems::player::step_player;
use crate::game::systems::projectile::step_projectiles;
use crate::game::systems::upgrade::{apply_upgrade, weapon_at_level, Upgrade, UpgradeOffer, UpgradeRound};
use crate::game::systems::weapons::fire_weapons;
use crate::game::timestep::{FixedTimestep, HitStop};
use crate::metrics::SimMetrics;
use crate::net::codec::{PlayerSnapshot, Snapshot, WireSnapshot};
use crate::net::game_session::PeerRole;
use crate::net::protocol::{PlayerInput, RelayMessage};
use crate::util::vec2::Vec2;

/// Per-frame nudge from a predicted position toward its authoritative target
///
/// Errors under `SOFT_ERROR` close at `SOFT_GAIN`, larger ones at
/// `FIRM_GAIN`, and the step never exceeds `MAX_CORRECTION`. Beyond
/// `SNAP_ERROR` the prediction is considered lost and jumps to the target.
pub fn correction_step(predicted: Vec2, target: Vec2) -> Vec2 {
    let error = target - predicted;
    let distance = error.length();
    if !distance.is_finite() {
        return Vec2::ZERO;
    }
    if distance > net::SNAP_ERROR {
        return error;
    }
    let gain = if distance < net::SOFT_ERROR {
        net::SOFT_GAIN
    } else {
        net::FIRM_GAIN
    };
    (error * gain).clamp_length(net::MAX_CORRECTION)
}

/// Shortest distance from `p` to the segment `a`..`b`
fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return p.distance_to(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_to(a + ab * t)
}

#[derive(Debug, Clone, Copy)]
struct ShotMeta {
    origin: Vec2,
    fired_at: Tick,
}

/// Latest authoritative position and velocity of a remote entity
type Target = (Vec2, Vec2);

/// Guest-side replication strategy
pub struct GuestPrediction {
    id: String,
    slot: PlayerSlot,
    clock: FixedTimestep,
    /// Mirrors the host's slow motion so prediction runs at the host's pace
    hit_stop: HitStop,
    /// Local prediction clock; unrelated to host ticks
    tick: Tick,
    world: GameState,
    latest: Option<Snapshot>,
    ticks_since_snapshot: u32,
    own_target: Option<Target>,
    partner_target: Option<Target>,
    enemy_targets: FxHashMap<EnemyId, Target>,
    shots: Pool<Projectile>,
    shot_ids: IdGen,
    shot_meta: FxHashMap<u32, ShotMeta>,
    /// Authoritative projectile ids already seen by reconciliation
    claimed: FxHashSet<u32>,
    chosen: Option<Upgrade>,
    summary: Option<MatchSummary>,
    seq: u32,
    outbox: Vec<RelayMessage>,
    metrics: Arc<SimMetrics>,
}

impl GuestPrediction {
    pub fn new(id: impl Into<String>, config: &SimConfig, metrics: Arc<SimMetrics>) -> Self {
        let id = id.into();
        info!("Guest prediction created for {}", id);
        Self {
            id,
            slot: PARTNER_SLOT,
            clock: FixedTimestep::new(config.tick_rate, config.max_catchup_ticks),
            hit_stop: HitStop::new(),
            tick: 0,
            world: GameState::new(
                Vec2::new(config.arena_width, config.arena_height),
                &config.meta,
                true,
            ),
            latest: None,
            ticks_since_snapshot: 0,
            own_target: None,
            partner_target: None,
            enemy_targets: FxHashMap::default(),
            shots: Pool::with_capacity(64),
            shot_ids: IdGen::default(),
            shot_meta: FxHashMap::default(),
            claimed: FxHashSet::default(),
            chosen: None,
            summary: None,
            seq: 0,
            outbox: Vec::new(),
            metrics,
        }
    }

    /// Most recent applied snapshot
    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    /// Locally predicted shots not yet matched to host projectiles
    pub fn predicted_shots(&self) -> impl Iterator<Item = &Projectile> {
        self.shots.iter()
    }

    fn me_mut(&mut self) -> Option<&mut Player> {
        let slot = self.slot;
        self.world.players.iter_mut().find(|p| p.slot == slot)
    }

    // ========================================================================
    // Local prediction
    // ========================================================================

    fn predict_tick(&mut self, input: &PlayerInput) {
        self.tick += 1;
        let tick = self.tick;
        let arena = self.world.arena;
        let slot = self.slot;

        if let Some(me) = self.world.players.iter_mut().find(|p| p.slot == slot) {
            step_player(me, input, arena, tick);
            if fire_weapons(me, tick, &mut self.shots, &mut self.shot_ids) > 0 {
                for shot in self.shots.iter() {
                    self.shot_meta.entry(shot.id).or_insert(ShotMeta {
                        origin: shot.position,
                        fired_at: tick,
                    });
                }
            }
        }
        step_projectiles(&mut self.shots, &self.world.players, arena);
        step_projectiles(&mut self.world.projectiles, &self.world.players, arena);
        self.expire_shots();

        self.ticks_since_snapshot = self.ticks_since_snapshot.saturating_add(1);
        self.interpolate_remote();
    }

    /// Drop predictions that never matched and forget released ones
    fn expire_shots(&mut self) {
        let tick = self.tick;
        let meta = &mut self.shot_meta;
        self.shots.sweep(|shot| {
            let expired = meta
                .get(&shot.id)
                .map(|m| tick.saturating_sub(m.fired_at) > net::PREDICTION_MAX_AGE as Tick)
                .unwrap_or(true);
            if expired {
                meta.remove(&shot.id);
                SlotAction::Release
            } else {
                SlotAction::Keep
            }
        });
        let shots = &self.shots;
        self.shot_meta
            .retain(|id, _| shots.iter().any(|s| s.id == *id));
    }

    fn extrapolate(&self, (position, velocity): Target) -> Vec2 {
        let ticks = (self.ticks_since_snapshot as f32).min(net::MAX_EXTRAPOLATION_TICKS);
        position + velocity * ticks
    }

    fn interpolate_remote(&mut self) {
        let ticks = (self.ticks_since_snapshot as f32).min(net::MAX_EXTRAPOLATION_TICKS);

        for e in self.world.enemies.iter_mut() {
            if let Some(&(position, velocity)) = self.enemy_targets.get(&e.id) {
                let target = position + velocity * ticks;
                e.position = e.position.lerp(target, net::INTERPOLATION_GAIN);
                e.velocity = velocity;
            }
        }

        if let Some((position, velocity)) = self.partner_target {
            let slot = self.slot;
            if let Some(partner) = self.world.players.iter_mut().find(|p| p.slot != slot) {
                let target = position + velocity * ticks;
                partner.position = partner.position.lerp(target, net::INTERPOLATION_GAIN);
                partner.velocity = velocity;
            }
        }
    }

    /// Pull the predicted avatar toward the extrapolated host position
    fn correct_own(&mut self) {
        let Some(target) = self.own_target.map(|t| self.extrapolate(t)) else {
            return;
        };
        let arena = self.world.arena;
        if let Some(me) = self.me_mut() {
            let step = correction_step(me.position, target);
            me.position = clamp_to_arena(me.position + step, me.radius, arena);
        }
    }

    // ========================================================================
    // Snapshot application
    // ========================================================================

    fn on_snapshot(&mut self, wire: WireSnapshot) {
        match wire.to_snapshot() {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(e) => {
                warn!("Dropping undecodable snapshot: {}", e);
                self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Fold an authoritative snapshot into the mirror
    ///
    /// Snapshots older than the last applied one are ignored.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        if let Some(last) = &self.latest {
            if snapshot.tick <= last.tick {
                debug!("Ignoring stale snapshot {} (have {})", snapshot.tick, last.tick);
                return;
            }
        }
        if let Some(last) = &self.latest {
            for (factor, ms) in hit_stops_between(last, &snapshot) {
                self.hit_stop.trigger(factor, ms);
            }
        }
        let tick = self.tick;

        self.world.wave.number = snapshot.wave;
        self.world.wave.kills_this_wave = snapshot.kills_this_wave;
        self.world.wave.required_kills = snapshot.required_kills;
        self.world.score.score = snapshot.score;
        self.world.score.multiplier = snapshot.multiplier;
        self.world.score.streak = snapshot.streak;
        self.world.wave_event = snapshot.event.map(|(kind, remaining)| WaveEvent {
            kind,
            ends_at: tick + remaining,
        });
        self.world.paused = snapshot.paused || self.world.upgrade_round.is_some();
        self.world.game_over = snapshot.game_over;

        for ps in std::iter::once(&snapshot.p1).chain(snapshot.p2.as_ref()) {
            if ps.slot == self.slot {
                if let Some(me) = self.me_mut() {
                    adopt_stats(me, ps, tick);
                }
                self.own_target = Some((ps.position, ps.velocity));
            } else {
                if let Some(partner) = self.world.players.iter_mut().find(|p| p.slot == ps.slot) {
                    adopt_stats(partner, ps, tick);
                    partner.aim = ps.aim;
                }
                self.partner_target = Some((ps.position, ps.velocity));
            }
        }

        self.mirror_enemies(&snapshot);
        self.mirror_pickups(&snapshot);
        self.reconcile_shots(&snapshot);

        self.ticks_since_snapshot = 0;
        self.metrics.snapshots_applied.fetch_add(1, Ordering::Relaxed);
        self.latest = Some(snapshot);
    }

    fn mirror_enemies(&mut self, snapshot: &Snapshot) {
        let mut previous: FxHashMap<EnemyId, Vec2> = self
            .world
            .enemies
            .drain(..)
            .map(|e| (e.id, e.position))
            .collect();
        self.enemy_targets.clear();

        for es in snapshot.enemies.iter() {
            // Known enemies keep their interpolated position, new ones appear in place
            let position = previous.remove(&es.id).unwrap_or(es.position);
            let mut e = create_enemy(es.kind, position, es.id, self.tick, 1.0, es.elite);
            e.velocity = es.velocity;
            e.health = es.health;
            e.max_health = es.max_health;
            e.radius = es.radius;
            e.formation = es.formation.map(|id| FormationSlot {
                id,
                role: FormationRole::Wing,
                heading: es.velocity.normalize(),
                broken: false,
            });
            match &mut e.ext {
                EnemyExt::Ghost { alpha } => *alpha = es.alpha,
                EnemyExt::Boss(brain) => {
                    if let Some(phase) = es.phase.and_then(BossPhase::from_tag) {
                        brain.phase = phase;
                    }
                }
                _ => {}
            }
            self.enemy_targets.insert(es.id, (es.position, es.velocity));
            self.world.enemies.push(e);
        }

        self.world.projectiles.clear();
        for ps in snapshot.projectiles.iter() {
            let p = self.world.projectiles.acquire();
            *p = Projectile {
                id: ps.id,
                position: ps.position,
                motion: Motion::Linear {
                    velocity: ps.velocity,
                },
                radius: ps.radius,
                owner: ps.owner.map(Owner::Player).unwrap_or(Owner::Enemy),
                weapon: ps.weapon,
                ..Default::default()
            };
        }
    }

    fn mirror_pickups(&mut self, snapshot: &Snapshot) {
        self.world.orbs.clear();
        for os in snapshot.orbs.iter() {
            let o = self.world.orbs.acquire();
            *o = ExperienceOrb {
                id: os.id,
                position: os.position,
                value: os.value,
                ..Default::default()
            };
        }
        self.world.powerups.clear();
        for ps in snapshot.powerups.iter() {
            let p = self.world.powerups.acquire();
            *p = PowerUp {
                id: ps.id,
                kind: ps.kind,
                position: ps.position,
                spawned_at: self.tick,
            };
        }
    }

    /// Retire predicted shots whose authoritative twin just appeared
    ///
    /// Each host projectile of this slot is considered once, on the first
    /// snapshot that carries it, and can absorb at most one prediction.
    fn reconcile_shots(&mut self, snapshot: &Snapshot) {
        let slot = self.slot;
        let own: Vec<_> = snapshot
            .projectiles
            .iter()
            .filter(|p| p.owner == Some(slot))
            .collect();
        self.claimed.retain(|id| own.iter().any(|p| p.id == *id));

        let reach = net::MAX_EXTRAPOLATION_TICKS;
        let mut matched: Vec<u32> = Vec::new();
        for ap in own {
            if !self.claimed.insert(ap.id) {
                continue;
            }
            let hit = self.shots.iter().find(|s| {
                if matched.contains(&s.id) || s.weapon != ap.weapon {
                    return false;
                }
                let origin = self
                    .shot_meta
                    .get(&s.id)
                    .map(|m| m.origin)
                    .unwrap_or(s.position);
                let ahead = s.position + s.velocity() * reach;
                distance_to_segment(ap.position, origin, ahead) <= net::PREDICTION_TOLERANCE
            });
            if let Some(shot) = hit {
                matched.push(shot.id);
            }
        }
        if matched.is_empty() {
            return;
        }

        let meta = &mut self.shot_meta;
        self.shots.sweep(|shot| {
            if matched.contains(&shot.id) {
                meta.remove(&shot.id);
                SlotAction::Release
            } else {
                SlotAction::Keep
            }
        });
    }

    // ========================================================================
    // Upgrade round
    // ========================================================================

    fn open_round(&mut self, offers: Vec<UpgradeOffer>) {
        self.chosen = None;
        self.world.upgrade_round = Some(UpgradeRound { offers });
        self.world.paused = true;
    }

    fn close_round(&mut self) {
        self.world.upgrade_round = None;
        self.world.paused = false;
        if let Some(upgrade) = self.chosen.take() {
            // Weapons arrive with the next snapshot; stat bonuses never do
            if let Some(me) = self.me_mut() {
                match apply_upgrade(me, upgrade) {
                    Ok(next) => *me = next,
                    Err(e) => debug!("Local upgrade not applied: {}", e),
                }
            }
        }
    }
}

/// Slow-motion requests implied by the change between two snapshots
///
/// The host triggers hit-stop from events the guest never sees directly;
/// each has a visible trace in consecutive snapshots.
fn hit_stops_between(prev: &Snapshot, next: &Snapshot) -> Vec<(f64, f64)> {
    let mut stops = Vec::new();
    let before = std::iter::once(&prev.p1).chain(prev.p2.as_ref());
    for old in before {
        let Some(new) = std::iter::once(&next.p1)
            .chain(next.p2.as_ref())
            .find(|p| p.slot == old.slot)
        else {
            continue;
        };
        if new.health < old.health {
            stops.push(hitstop::DAMAGE_TAKEN);
        }
        if new.level > old.level {
            stops.push(hitstop::LEVEL_UP);
        }
    }

    if !next.game_over {
        let gone = |id: EnemyId| !next.enemies.iter().any(|e| e.id == id);
        for e in prev.enemies.iter().filter(|e| gone(e.id)) {
            if e.phase.is_some() {
                stops.push(hitstop::BOSS_KILL);
            } else if e.elite {
                stops.push(hitstop::ELITE_KILL);
            }
        }
    }
    stops
}

/// Copy host-owned stats onto a mirrored player, keeping local timers
fn adopt_stats(p: &mut Player, s: &PlayerSnapshot, tick: Tick) {
    p.health = s.health;
    p.max_health = s.max_health;
    p.alive = s.alive;
    p.level = s.level;
    p.experience = s.experience;
    p.experience_to_next = s.experience_to_next;
    p.invulnerable_until = tick + s.invulnerable_ticks;
    p.kills = s.kills;

    let weapons = s
        .weapons
        .iter()
        .map(|&(kind, level)| {
            let existing = p.weapons.iter().find(|w| w.kind == kind);
            match existing {
                Some(w) if w.level == level => w.clone(),
                Some(w) => {
                    let mut next = weapon_at_level(kind, level);
                    next.ready_at = w.ready_at;
                    next
                }
                None => weapon_at_level(kind, level),
            }
        })
        .collect();
    p.weapons = weapons;

    p.buffs = s
        .buffs
        .iter()
        .map(|b| Buff {
            kind: b.kind,
            expires_at: tick + b.remaining_ticks,
            multiplier: b.multiplier,
        })
        .collect();
}

impl PeerRole for GuestPrediction {
    fn name(&self) -> &'static str {
        "guest"
    }

    fn local_slot(&self) -> PlayerSlot {
        self.slot
    }

    fn on_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::GameState { snapshot } => self.on_snapshot(snapshot),
            RelayMessage::LevelUp { offers } => {
                let offers = offers
                    .into_iter()
                    .map(|o| UpgradeOffer {
                        slot: o.slot,
                        options: o.options,
                        choice: None,
                    })
                    .collect();
                self.open_round(offers);
            }
            RelayMessage::UpgradeSelected { slot, choice } => {
                if let Some(offer) = self
                    .world
                    .upgrade_round
                    .as_mut()
                    .and_then(|r| r.offers.iter_mut().find(|o| o.slot == slot))
                {
                    offer.choice = Some(choice);
                }
            }
            RelayMessage::UpgradesComplete => self.close_round(),
            RelayMessage::GameOver { summary } => {
                info!(
                    "Host ended the match: score {} wave {}",
                    summary.score, summary.wave
                );
                self.world.game_over = true;
                self.summary = Some(summary);
            }
            RelayMessage::StartGame { arena } => {
                if arena.is_finite() && arena.x > 0.0 && arena.y > 0.0 {
                    self.world.arena = arena;
                } else {
                    warn!("Ignoring invalid arena {:?}", arena);
                }
            }
            other => debug!("Guest ignoring {}", other.kind()),
        }
    }

    fn frame(&mut self, now_ms: f64, input: PlayerInput) -> Vec<RelayMessage> {
        self.seq = self.seq.wrapping_add(1);
        let input = PlayerInput {
            seq: self.seq,
            ..input
        };

        let slow_mo = self.hit_stop.update(now_ms);
        let ticks = self.clock.advance(now_ms, slow_mo);
        if self.summary.is_none() && !self.world.paused {
            for _ in 0..ticks {
                self.predict_tick(&input);
            }
        }
        self.correct_own();

        self.outbox.push(RelayMessage::PlayerInput {
            id: self.id.clone(),
            input,
        });
        std::mem::take(&mut self.outbox)
    }

    fn pending_offer(&self) -> Option<&[Upgrade]> {
        let offer = self.world.upgrade_round.as_ref()?.offer(self.slot)?;
        match offer.choice {
            Some(_) => None,
            None => Some(&offer.options),
        }
    }

    fn choose_upgrade(&mut self, choice: usize) {
        let slot = self.slot;
        let Some(offer) = self
            .world
            .upgrade_round
            .as_mut()
            .and_then(|r| r.offers.iter_mut().find(|o| o.slot == slot))
        else {
            warn!("No upgrade offer to choose from");
            return;
        };
        if offer.choice.is_some() {
            return;
        }
        let Some(&upgrade) = offer.options.get(choice) else {
            warn!("Upgrade choice {} out of range", choice);
            return;
        };
        offer.choice = Some(choice);
        self.chosen = Some(upgrade);
        self.outbox.push(RelayMessage::UpgradeSelected { slot, choice });
    }

    fn world(&self) -> &GameState {
        &self.world
    }

    fn summary(&self) -> Option<&MatchSummary> {
        self.summary.as_ref()
    }

    fn stop(&mut self) -> Vec<RelayMessage> {
        std::mem::take(&mut self.outbox)
    }
}
