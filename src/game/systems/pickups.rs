//! Experience orbs and power-ups

use rand::Rng;

use crate::game::constants::pickup;
use crate::game::game_loop::{GameLoopEvent, SimContext};
use crate::game::pool::SlotAction;
use crate::game::state::{BuffKind, Enemy, GameState, PowerUpKind, WaveEventKind};
use crate::util::vec2::Vec2;

/// Orbs a boss scatters on death
const BOSS_ORB_COUNT: u32 = 8;

/// Drop experience and maybe a power-up where `enemy` died
pub fn drop_loot(state: &mut GameState, enemy: &Enemy, ctx: &mut SimContext) {
    let value = GameState::orb_value(enemy.points);
    if enemy.is_boss() {
        for i in 0..BOSS_ORB_COUNT {
            let offset = Vec2::from_angle(std::f32::consts::TAU * i as f32 / BOSS_ORB_COUNT as f32) * 30.0;
            spawn_orb(state, enemy.position + offset, value / BOSS_ORB_COUNT as f32, ctx);
        }
    } else {
        spawn_orb(state, enemy.position, value, ctx);
    }

    let chance = if enemy.elite || enemy.is_boss() {
        pickup::ELITE_POWERUP_CHANCE
    } else {
        pickup::POWERUP_CHANCE
    };
    if ctx.rng.gen_bool(chance) {
        let kind = PowerUpKind::ALL[ctx.rng.gen_range(0..PowerUpKind::ALL.len())];
        let p = state.powerups.acquire();
        p.id = ctx.ids.next_id();
        p.kind = kind;
        p.position = enemy.position;
        p.spawned_at = ctx.tick;
    }
}

fn spawn_orb(state: &mut GameState, position: Vec2, value: f32, ctx: &mut SimContext) {
    let orb = state.orbs.acquire();
    orb.id = ctx.ids.next_id();
    orb.position = position;
    orb.value = value;
    orb.spawned_at = ctx.tick;
}

/// Home, collect and expire experience orbs
pub fn update_orbs(state: &mut GameState, ctx: &mut SimContext) {
    let storm = state.event_active(WaveEventKind::MagnetStorm);
    let tick = ctx.tick;
    let GameState { orbs, players, .. } = state;
    let events = &mut ctx.events;

    orbs.sweep(|orb| {
        if orb.vacuum_to.is_none() && GameState::expired(orb.spawned_at, tick, pickup::ORB_MAX_AGE) {
            return SlotAction::Release;
        }

        let target = match orb.vacuum_to {
            Some(slot) => players.iter().position(|p| p.slot == slot && p.alive),
            None => None,
        };
        let (target, speed) = match target {
            Some(i) => (Some(i), pickup::ORB_SPEED * 2.0),
            None => {
                orb.vacuum_to = None;
                let nearest = players
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.alive)
                    .map(|(i, p)| (i, p.position.distance_sq_to(orb.position), p.magnet_range(storm)))
                    .filter(|&(_, d2, range)| d2 < range * range)
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(i, _, _)| i);
                (nearest, pickup::ORB_SPEED)
            }
        };

        let Some(i) = target else {
            return SlotAction::Keep;
        };
        let p = &mut players[i];
        let (dir, dist) = (p.position - orb.position).normalize_with_length();
        if dist <= p.radius + pickup::ORB_RADIUS + speed {
            let before = p.level;
            if p.gain_experience(orb.value) > 0 {
                for level in before + 1..=p.level {
                    events.push(GameLoopEvent::LevelUp { slot: p.slot, level });
                }
            }
            return SlotAction::Release;
        }
        orb.position += dir * speed;
        SlotAction::Keep
    });
}

/// Expire and collect power-ups
pub fn update_powerups(state: &mut GameState, ctx: &mut SimContext) {
    let tick = ctx.tick;
    let GameState {
        powerups,
        players,
        orbs,
        ..
    } = state;
    let events = &mut ctx.events;

    powerups.sweep(|pu| {
        if GameState::expired(pu.spawned_at, tick, pickup::POWERUP_MAX_AGE) {
            return SlotAction::Release;
        }
        let Some(p) = players.iter_mut().find(|p| {
            p.alive && p.position.distance_sq_to(pu.position) < (p.radius + pickup::POWERUP_RADIUS).powi(2)
        }) else {
            return SlotAction::Keep;
        };

        match pu.kind {
            PowerUpKind::Heal => p.heal(pickup::HEAL_AMOUNT),
            PowerUpKind::Speed => p.add_buff(BuffKind::Speed, tick + pickup::BUFF_TICKS, pickup::BUFF_MULTIPLIER),
            PowerUpKind::Damage => p.add_buff(BuffKind::Damage, tick + pickup::BUFF_TICKS, pickup::BUFF_MULTIPLIER),
            PowerUpKind::Vacuum => {
                for orb in orbs.iter_mut() {
                    orb.vacuum_to = Some(p.slot);
                }
            }
        }
        events.push(GameLoopEvent::PickupCollected {
            slot: p.slot,
            kind: pu.kind,
        });
        SlotAction::Release
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::player;
    use crate::game::state::{EnemyKind, HOST_SLOT};
    use crate::game::systems::enemy::create_enemy;

    fn ctx() -> SimContext {
        SimContext::new(17, Vec2::new(1600.0, 1000.0))
    }

    #[test]
    fn test_orb_homes_and_levels_up() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(500.0, 500.0);
        let mut ctx = ctx();
        let e = create_enemy(EnemyKind::Tank, Vec2::new(540.0, 500.0), 1, 0, 1.0, false);
        spawn_orb(&mut state, e.position, 12.0, &mut ctx);

        for t in 1..20 {
            ctx.tick = t;
            update_orbs(&mut state, &mut ctx);
        }
        assert!(state.orbs.is_empty());
        assert_eq!(state.players[0].level, 2);
        assert!(ctx
            .events
            .contains(&GameLoopEvent::LevelUp { slot: HOST_SLOT, level: 2 }));
    }

    #[test]
    fn test_orb_outside_magnet_stays_and_expires() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(100.0, 100.0);
        let mut ctx = ctx();
        spawn_orb(&mut state, Vec2::new(1000.0, 900.0), 1.0, &mut ctx);
        ctx.tick = 10;
        update_orbs(&mut state, &mut ctx);
        assert_eq!(state.orbs.get(0).map(|o| o.position), Some(Vec2::new(1000.0, 900.0)));

        ctx.tick = pickup::ORB_MAX_AGE;
        update_orbs(&mut state, &mut ctx);
        assert!(state.orbs.is_empty());
    }

    #[test]
    fn test_magnet_storm_extends_range() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(100.0, 100.0);
        let mut ctx = ctx();
        let start = Vec2::new(100.0 + player::BASE_MAGNET * 2.0, 100.0);
        spawn_orb(&mut state, start, 1.0, &mut ctx);
        state.wave_event = Some(crate::game::state::WaveEvent {
            kind: WaveEventKind::MagnetStorm,
            ends_at: 1000,
        });
        ctx.tick = 1;
        update_orbs(&mut state, &mut ctx);
        assert!(state.orbs.get(0).map(|o| o.position.x < start.x).unwrap_or(false));
    }

    #[test]
    fn test_speed_powerup_applies_buff() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(300.0, 300.0);
        let mut ctx = ctx();
        let pu = state.powerups.acquire();
        pu.kind = PowerUpKind::Speed;
        pu.position = Vec2::new(305.0, 300.0);
        ctx.tick = 5;
        update_powerups(&mut state, &mut ctx);
        assert!(state.powerups.is_empty());
        assert_eq!(state.players[0].buff_multiplier(BuffKind::Speed), pickup::BUFF_MULTIPLIER);
        assert_eq!(state.players[0].buffs[0].expires_at, 5 + pickup::BUFF_TICKS);
    }

    #[test]
    fn test_vacuum_marks_every_orb() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(300.0, 300.0);
        let mut ctx = ctx();
        for x in [900.0, 1200.0, 1500.0] {
            spawn_orb(&mut state, Vec2::new(x, 900.0), 1.0, &mut ctx);
        }
        let pu = state.powerups.acquire();
        pu.kind = PowerUpKind::Vacuum;
        pu.position = Vec2::new(300.0, 300.0);
        update_powerups(&mut state, &mut ctx);
        assert!(state.orbs.iter().all(|o| o.vacuum_to == Some(HOST_SLOT)));
    }

    #[test]
    fn test_boss_scatters_orbs() {
        let mut state = GameState::with_defaults(false);
        let mut ctx = ctx();
        let boss = create_enemy(EnemyKind::Boss, Vec2::new(800.0, 300.0), 1, 0, 1.0, false);
        drop_loot(&mut state, &boss, &mut ctx);
        assert_eq!(state.orbs.active_count(), BOSS_ORB_COUNT as usize);
    }
}
