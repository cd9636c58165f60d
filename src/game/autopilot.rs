//! Deterministic input generator
//!
//! Drives an avatar without a human: kite away from nearby threats, drift
//! toward loose orbs and the arena center, and aim at the nearest enemy.
//! Uses no randomness, so a seeded match driven by autopilots replays
//! exactly.

use crate::game::state::{GameState, Player, PlayerSlot};
use crate::net::protocol::PlayerInput;
use crate::util::vec2::Vec2;

/// Threats inside this distance push the avatar away
const DANGER_RADIUS: f32 = 180.0;
/// Orbs inside this distance pull the avatar in
const GREED_RADIUS: f32 = 260.0;
/// Distance from a wall where it starts to repel
const WALL_MARGIN: f32 = 120.0;
const CENTER_PULL: f32 = 0.15;
const ORB_PULL: f32 = 0.6;

/// Current high-level intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutopilotMode {
    /// Something is close, back off
    Kite,
    /// Nothing threatening, go pick up orbs
    Collect,
    /// Idle drift toward the center
    Hold,
}

/// Input source for one avatar
#[derive(Debug, Clone)]
pub struct Autopilot {
    slot: PlayerSlot,
}

impl Autopilot {
    pub fn new(slot: PlayerSlot) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> PlayerSlot {
        self.slot
    }

    /// Input for this frame; neutral when the avatar is gone
    pub fn input(&self, state: &GameState) -> PlayerInput {
        let Some(me) = state.player(self.slot).filter(|p| p.alive) else {
            return PlayerInput::default();
        };
        let (_, heading) = steer(me, state);
        PlayerInput {
            axis: Some(heading),
            aim: nearest_enemy(me.position, state),
            ..Default::default()
        }
    }

    /// Mode the pilot would pick right now
    pub fn mode(&self, state: &GameState) -> Option<AutopilotMode> {
        state
            .player(self.slot)
            .filter(|p| p.alive)
            .map(|me| steer(me, state).0)
    }

    /// First offer of an open upgrade round, if this slot still has to choose
    pub fn choose_upgrade(&self, state: &GameState) -> Option<usize> {
        let offer = state.upgrade_round.as_ref()?.offer(self.slot)?;
        if offer.choice.is_some() || offer.options.is_empty() {
            return None;
        }
        Some(0)
    }
}

fn steer(me: &Player, state: &GameState) -> (AutopilotMode, Vec2) {
    let mut away = Vec2::ZERO;
    let danger_sq = DANGER_RADIUS * DANGER_RADIUS;

    for e in state.enemies.iter().filter(|e| e.is_alive()) {
        let offset = me.position - e.position;
        let d2 = offset.length_sq();
        if d2 < danger_sq {
            let (dir, dist) = offset.normalize_with_length();
            away += dir * ((DANGER_RADIUS - dist + e.radius) / DANGER_RADIUS);
        }
    }
    for p in state.projectiles.iter().filter(|p| p.is_hostile()) {
        let offset = me.position - p.position;
        if offset.length_sq() < danger_sq * 0.25 {
            let (dir, dist) = offset.normalize_with_length();
            away += dir * ((DANGER_RADIUS * 0.5 - dist) / DANGER_RADIUS);
        }
    }

    let walls = wall_push(me.position, state.arena);
    let center = (state.arena * 0.5 - me.position).normalize() * CENTER_PULL;

    if away != Vec2::ZERO {
        return (AutopilotMode::Kite, (away + walls * 1.5 + center).normalize());
    }

    let greed_sq = GREED_RADIUS * GREED_RADIUS;
    let orb = state
        .orbs
        .iter()
        .map(|o| (o.position, o.position.distance_sq_to(me.position)))
        .filter(|&(_, d2)| d2 < greed_sq)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((pos, _)) = orb {
        let pull = (pos - me.position).normalize() * ORB_PULL;
        return (AutopilotMode::Collect, (pull + walls + center).normalize());
    }

    // Small dead zone around the center so the avatar settles
    let to_center = state.arena * 0.5 - me.position;
    if to_center.length_sq() < 40.0 * 40.0 && walls == Vec2::ZERO {
        return (AutopilotMode::Hold, Vec2::ZERO);
    }
    (AutopilotMode::Hold, (walls + center).normalize())
}

fn wall_push(position: Vec2, arena: Vec2) -> Vec2 {
    let mut push = Vec2::ZERO;
    if position.x < WALL_MARGIN {
        push.x += 1.0 - position.x / WALL_MARGIN;
    }
    if position.x > arena.x - WALL_MARGIN {
        push.x -= 1.0 - (arena.x - position.x) / WALL_MARGIN;
    }
    if position.y < WALL_MARGIN {
        push.y += 1.0 - position.y / WALL_MARGIN;
    }
    if position.y > arena.y - WALL_MARGIN {
        push.y -= 1.0 - (arena.y - position.y) / WALL_MARGIN;
    }
    push
}

fn nearest_enemy(from: Vec2, state: &GameState) -> Option<Vec2> {
    state
        .enemies
        .iter()
        .filter(|e| e.is_alive())
        .min_by(|a, b| {
            a.position
                .distance_sq_to(from)
                .total_cmp(&b.position.distance_sq_to(from))
        })
        .map(|e| e.position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{EnemyKind, HOST_SLOT, PARTNER_SLOT};
    use crate::game::systems::enemy::create_enemy;

    #[test]
    fn test_kites_away_from_enemy() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(800.0, 500.0);
        state
            .enemies
            .push(create_enemy(EnemyKind::Basic, Vec2::new(860.0, 500.0), 1, 0, 1.0, false));

        let pilot = Autopilot::new(HOST_SLOT);
        assert_eq!(pilot.mode(&state), Some(AutopilotMode::Kite));
        let input = pilot.input(&state);
        assert!(input.axis.map(|a| a.x < 0.0).unwrap_or(false));
        assert_eq!(input.aim, Some(Vec2::new(860.0, 500.0)));
    }

    #[test]
    fn test_collects_nearby_orb() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(800.0, 500.0);
        let orb = state.orbs.acquire();
        orb.position = Vec2::new(800.0, 700.0);

        let pilot = Autopilot::new(HOST_SLOT);
        assert_eq!(pilot.mode(&state), Some(AutopilotMode::Collect));
        assert!(pilot.input(&state).axis.map(|a| a.y > 0.0).unwrap_or(false));
    }

    #[test]
    fn test_pushes_off_walls() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(10.0, 500.0);
        let input = Autopilot::new(HOST_SLOT).input(&state);
        assert!(input.axis.map(|a| a.x > 0.0).unwrap_or(false));
    }

    #[test]
    fn test_dead_avatar_is_neutral() {
        let mut state = GameState::with_defaults(true);
        state.players[1].alive = false;
        assert_eq!(Autopilot::new(PARTNER_SLOT).input(&state), PlayerInput::default());
        assert_eq!(Autopilot::new(PARTNER_SLOT).mode(&state), None);
    }
}
