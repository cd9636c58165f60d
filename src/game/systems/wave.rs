//! Wave director
//!
//! Decides when and what to spawn, tracks the kill quota, and schedules
//! bosses and timed wave events on wave completion.

use std::f32::consts::TAU;

use rand::Rng;

use crate::game::constants::{sim, wave};
use crate::game::game_loop::{GameLoopEvent, SimContext};
use crate::game::state::{
    EnemyKind, FormationRole, FormationSlot, GameState, Tick, WaveEvent, WaveEventKind,
};
use crate::game::systems::boss::spawn_boss;
use crate::game::systems::enemy::create_enemy;
use crate::util::vec2::Vec2;

/// Ticks between spawn batches for `wave_number`
pub fn spawn_interval(wave_number: u32, surge: bool) -> Tick {
    let mut interval = wave::BASE_INTERVAL / (1.0 + wave_number as f32 * wave::INTERVAL_SCALE);
    if surge {
        interval *= wave::SURGE_INTERVAL_FACTOR;
    }
    (interval.round() as Tick).max(wave::MIN_INTERVAL)
}

/// Kill quota of the wave after one requiring `current`
pub fn next_quota(current: u32) -> u32 {
    (current as f32 * wave::QUOTA_GROWTH).ceil() as u32
}

/// Individually rolled enemies per spawn batch
pub fn batch_size(wave_number: u32) -> u32 {
    (1 + wave_number / 7).min(wave::BATCH_CAP)
}

pub fn formation_chance(wave_number: u32) -> f64 {
    if wave_number < wave::FORMATION_MIN_WAVE {
        return 0.0;
    }
    (wave_number as f64 * wave::FORMATION_CHANCE_PER_WAVE).min(wave::FORMATION_CHANCE_CAP)
}

/// (kind, first wave, base weight, weight gained per wave after unlock)
static SPAWN_TABLE: [(EnemyKind, u32, f32, f32); 8] = [
    (EnemyKind::Basic, 1, 10.0, -0.4),
    (EnemyKind::Fast, 2, 5.0, 0.2),
    (EnemyKind::Zigzag, 3, 4.0, 0.2),
    (EnemyKind::Tank, 4, 3.0, 0.25),
    (EnemyKind::Ghost, 5, 3.0, 0.2),
    (EnemyKind::Shooter, 6, 2.0, 0.25),
    (EnemyKind::Splitter, 7, 2.0, 0.2),
    (EnemyKind::Magnet, 9, 1.5, 0.15),
];

/// Weight of each unlocked kind at `wave_number`
pub fn spawn_weights(wave_number: u32) -> impl Iterator<Item = (EnemyKind, f32)> {
    SPAWN_TABLE.iter().filter_map(move |&(kind, min_wave, base, growth)| {
        if wave_number < min_wave {
            return None;
        }
        let weight = (base + growth * (wave_number - min_wave) as f32).max(1.0);
        Some((kind, weight))
    })
}

/// Weighted, wave-gated enemy kind
pub fn roll_enemy_kind<R: Rng>(wave_number: u32, rng: &mut R) -> EnemyKind {
    let total: f32 = spawn_weights(wave_number).map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0.0..total);
    for (kind, weight) in spawn_weights(wave_number) {
        if roll < weight {
            return kind;
        }
        roll -= weight;
    }
    EnemyKind::Basic
}

/// Random point just outside one of the four arena edges
pub fn edge_spawn_position<R: Rng>(arena: Vec2, rng: &mut R) -> Vec2 {
    let m = sim::SPAWN_MARGIN;
    match rng.gen_range(0..4) {
        0 => Vec2::new(rng.gen_range(0.0..arena.x), -m),
        1 => Vec2::new(arena.x + m, rng.gen_range(0.0..arena.y)),
        2 => Vec2::new(rng.gen_range(0.0..arena.x), arena.y + m),
        _ => Vec2::new(-m, rng.gen_range(0.0..arena.y)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormationShape {
    V,
    Ring,
    Line,
}

/// Member offsets relative to the leader for a formation travelling along `heading`
pub fn formation_offsets(shape: FormationShape, heading: Vec2, size: usize) -> Vec<Vec2> {
    let back = -heading;
    let side = heading.perp();
    let mut offsets = Vec::with_capacity(size);
    offsets.push(Vec2::ZERO);
    for i in 1..size {
        let offset = match shape {
            FormationShape::V => {
                let rank = ((i + 1) / 2) as f32;
                let sign = if i % 2 == 1 { 1.0 } else { -1.0 };
                back * (rank * 30.0) + side * (rank * 30.0 * sign)
            }
            FormationShape::Ring => {
                Vec2::from_angle(TAU * (i - 1) as f32 / (size - 1) as f32) * 45.0
            }
            FormationShape::Line => {
                let rank = ((i + 1) / 2) as f32;
                let sign = if i % 2 == 1 { 1.0 } else { -1.0 };
                side * (rank * 32.0 * sign)
            }
        };
        offsets.push(offset);
    }
    offsets
}

fn spawn_formation(state: &mut GameState, ctx: &mut SimContext) {
    let shape = match ctx.rng.gen_range(0..3) {
        0 => FormationShape::V,
        1 => FormationShape::Ring,
        _ => FormationShape::Line,
    };
    let kind = roll_enemy_kind(state.wave.number, &mut ctx.rng);
    let origin = edge_spawn_position(state.arena, &mut ctx.rng);
    let heading = (state.arena * 0.5 - origin).normalize();
    let id = state.wave.next_formation_id;
    state.wave.next_formation_id += 1;
    let difficulty = state.difficulty();

    for (i, offset) in formation_offsets(shape, heading, wave::FORMATION_SIZE)
        .into_iter()
        .enumerate()
    {
        let mut e = create_enemy(kind, origin + offset, ctx.ids.next_id(), ctx.tick, difficulty, false);
        e.formation = Some(FormationSlot {
            id,
            role: if i == 0 {
                FormationRole::Leader
            } else {
                FormationRole::Wing
            },
            heading,
            broken: false,
        });
        state.enemies.push(e);
    }
    tracing::debug!("Formation {} ({:?} of {:?}) spawned", id, shape, kind);
}

fn spawn_batch(state: &mut GameState, ctx: &mut SimContext) {
    let n = batch_size(state.wave.number);
    let difficulty = state.difficulty();
    for _ in 0..n {
        let kind = roll_enemy_kind(state.wave.number, &mut ctx.rng);
        let elite =
            state.wave.number >= wave::ELITE_MIN_WAVE && ctx.rng.gen_bool(wave::ELITE_CHANCE);
        let pos = edge_spawn_position(state.arena, &mut ctx.rng);
        state
            .enemies
            .push(create_enemy(kind, pos, ctx.ids.next_id(), ctx.tick, difficulty, elite));
    }
}

/// Per-tick director step: expire events and spawn when due
pub fn update_wave(state: &mut GameState, ctx: &mut SimContext) {
    if let Some(event) = state.wave_event {
        if ctx.tick >= event.ends_at {
            state.wave_event = None;
            tracing::info!("Wave event {:?} ended", event.kind);
            ctx.events.push(GameLoopEvent::WaveEventEnded { kind: event.kind });
        }
    }

    if ctx.tick < state.wave.next_spawn_at {
        return;
    }
    let surge = state.event_active(WaveEventKind::Surge);
    state.wave.next_spawn_at = ctx.tick + spawn_interval(state.wave.number, surge);

    if ctx.rng.gen_bool(formation_chance(state.wave.number)) {
        spawn_formation(state, ctx);
    } else {
        spawn_batch(state, ctx);
    }
}

/// Count one kill toward the quota, completing the wave when it is met
pub fn record_kill(state: &mut GameState, ctx: &mut SimContext) {
    state.wave.kills_this_wave += 1;
    if state.wave.kills_this_wave >= state.wave.required_kills {
        complete_wave(state, ctx);
    }
}

/// Advance to the next wave, spawning a boss or starting an event when due
pub fn complete_wave(state: &mut GameState, ctx: &mut SimContext) {
    let completed = state.wave.number;
    state.wave.number += 1;
    state.wave.kills_this_wave = 0;
    state.wave.required_kills = next_quota(state.wave.required_kills);
    tracing::info!(
        "Wave {} complete, next quota {}",
        completed,
        state.wave.required_kills
    );
    ctx.events.push(GameLoopEvent::WaveCompleted { wave: completed });

    if completed % wave::BOSS_EVERY == 0 {
        let level = completed / wave::BOSS_EVERY;
        let id = ctx.ids.next_id();
        let boss = spawn_boss(level, id, ctx.tick, state.arena, state.difficulty());
        tracing::info!("Boss level {} spawned ({} hp)", level, boss.max_health);
        state.enemies.push(boss);
        ctx.events.push(GameLoopEvent::BossSpawned { id, level });
    }

    let next = state.wave.number;
    if state.wave_event.is_none()
        && next > wave::EVENT_MIN_WAVE
        && next % wave::EVENT_EVERY == 0
        && ctx.rng.gen_bool(wave::EVENT_CHANCE)
    {
        let kind = if ctx.rng.gen_bool(0.5) {
            WaveEventKind::Surge
        } else {
            WaveEventKind::MagnetStorm
        };
        state.wave_event = Some(WaveEvent {
            kind,
            ends_at: ctx.tick + wave::EVENT_TICKS,
        });
        tracing::info!("Wave event {:?} started", kind);
        ctx.events.push(GameLoopEvent::WaveEventStarted { kind });
    }
}
