//! Boss phase state machine
//!
//! The boss enters from the top edge, then loops chase → attack → chase →
//! summon, where the attack rotates through the patterns unlocked at its
//! level. Once health drops below the rage threshold it switches to `Rage`
//! and never leaves it.

use std::f32::consts::{PI, TAU};

use smallvec::SmallVec;

use crate::game::constants::boss;
use crate::game::game_loop::{GameLoopEvent, SimContext};
use crate::game::pool::Pool;
use crate::game::state::{
    clamp_to_arena, target_among, BossBrain, BossPhase, Enemy, EnemyExt, EnemyKind, Particle,
    Player, Projectile, Tick,
};
use crate::game::systems::enemy::create_enemy;
use crate::game::systems::projectile::spawn_burst;
use crate::game::systems::weapons::{spawn_hostile_bullet, spawn_hostile_ring};
use crate::util::vec2::Vec2;

/// Phase identity without phase-local data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Entering,
    Chasing,
    RingShot,
    SpiralShot,
    Dash,
    Summon,
    Shield,
    Rage,
}

impl BossPhase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            BossPhase::Entering => PhaseKind::Entering,
            BossPhase::Chasing => PhaseKind::Chasing,
            BossPhase::RingShot { .. } => PhaseKind::RingShot,
            BossPhase::SpiralShot { .. } => PhaseKind::SpiralShot,
            BossPhase::Dash { .. } => PhaseKind::Dash,
            BossPhase::Summon { .. } => PhaseKind::Summon,
            BossPhase::Shield { .. } => PhaseKind::Shield,
            BossPhase::Rage { .. } => PhaseKind::Rage,
        }
    }
}

impl BossBrain {
    pub fn new(level: u32, tick: Tick) -> Self {
        Self {
            level: level.max(1),
            phase: BossPhase::Entering,
            phase_started: tick,
            cycle_step: 0,
            attack_index: 0,
        }
    }

    /// Route damage through an active shield; returns what reaches health
    pub fn absorb(&mut self, amount: f32) -> f32 {
        if let BossPhase::Shield { hp } = &mut self.phase {
            if *hp > 0.0 {
                let soaked = (amount * boss::SHIELD_ABSORB).min(*hp);
                *hp -= soaked;
                return amount - soaked;
            }
        }
        amount
    }

    pub fn is_raging(&self) -> bool {
        matches!(self.phase, BossPhase::Rage { .. })
    }
}

/// Attack patterns available at `level`, in rotation order
pub fn attacks_for_level(level: u32) -> SmallVec<[PhaseKind; 4]> {
    let mut attacks = SmallVec::new();
    attacks.push(PhaseKind::RingShot);
    if level >= boss::SPIRAL_LEVEL {
        attacks.push(PhaseKind::SpiralShot);
    }
    if level >= boss::DASH_LEVEL {
        attacks.push(PhaseKind::Dash);
    }
    if level >= boss::SHIELD_LEVEL {
        attacks.push(PhaseKind::Shield);
    }
    attacks
}

/// Outcome of a phase advance before any phase-local data is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePlan {
    pub kind: PhaseKind,
    pub cycle_step: u32,
    pub attack_index: u32,
}

/// Decide the phase that follows the current one
pub fn plan_next_phase(brain: &BossBrain, health_fraction: f32) -> PhasePlan {
    let keep = |kind| PhasePlan {
        kind,
        cycle_step: brain.cycle_step,
        attack_index: brain.attack_index,
    };
    if brain.is_raging() || health_fraction < boss::RAGE_THRESHOLD {
        return keep(PhaseKind::Rage);
    }
    if brain.phase.kind() == PhaseKind::Entering {
        return PhasePlan {
            kind: PhaseKind::Chasing,
            cycle_step: 0,
            attack_index: brain.attack_index,
        };
    }

    let step = (brain.cycle_step + 1) % 4;
    match step {
        1 => {
            let attacks = attacks_for_level(brain.level);
            let kind = attacks[brain.attack_index as usize % attacks.len()];
            PhasePlan {
                kind,
                cycle_step: step,
                attack_index: brain.attack_index.wrapping_add(1),
            }
        }
        3 => PhasePlan {
            kind: PhaseKind::Summon,
            cycle_step: step,
            attack_index: brain.attack_index,
        },
        _ => PhasePlan {
            kind: PhaseKind::Chasing,
            cycle_step: step,
            attack_index: brain.attack_index,
        },
    }
}

/// Convenience wrapper over [`plan_next_phase`]
pub fn next_phase_kind(brain: &BossBrain, health_fraction: f32) -> PhaseKind {
    plan_next_phase(brain, health_fraction).kind
}

/// Fixed duration of a timed phase; `None` for entering and rage
pub fn phase_duration(kind: PhaseKind) -> Option<Tick> {
    match kind {
        PhaseKind::Entering | PhaseKind::Rage => None,
        PhaseKind::Chasing => Some(boss::CHASE_TICKS),
        PhaseKind::RingShot => Some(boss::RING_TICKS),
        PhaseKind::SpiralShot => Some(boss::SPIRAL_TICKS),
        PhaseKind::Dash => Some(boss::DASH_TICKS),
        PhaseKind::Summon => Some(boss::SUMMON_TICKS),
        PhaseKind::Shield => Some(boss::SHIELD_TICKS),
    }
}

fn build_phase(kind: PhaseKind, level: u32, tick: Tick, toward: Vec2) -> BossPhase {
    match kind {
        PhaseKind::Entering => BossPhase::Entering,
        PhaseKind::Chasing => BossPhase::Chasing,
        PhaseKind::RingShot => BossPhase::RingShot { next_volley: tick },
        PhaseKind::SpiralShot => BossPhase::SpiralShot {
            angle: 0.0,
            next_shot: tick,
        },
        PhaseKind::Dash => BossPhase::Dash {
            heading: if toward == Vec2::ZERO {
                Vec2::new(0.0, 1.0)
            } else {
                toward
            },
        },
        PhaseKind::Summon => BossPhase::Summon { spawned: false },
        PhaseKind::Shield => BossPhase::Shield {
            hp: boss::SHIELD_PER_LEVEL * level as f32,
        },
        PhaseKind::Rage => BossPhase::Rage {
            angle: 0.0,
            next_volley: tick,
        },
    }
}

fn phase_over(brain: &BossBrain, position: Vec2, tick: Tick) -> bool {
    let elapsed = tick.saturating_sub(brain.phase_started);
    match brain.phase {
        BossPhase::Rage { .. } => false,
        BossPhase::Entering => position.y >= boss::ENTER_Y || elapsed >= boss::ENTER_MAX_TICKS,
        BossPhase::Shield { hp } => hp <= 0.0 || elapsed >= boss::SHIELD_TICKS,
        phase => phase_duration(phase.kind()).map_or(false, |d| elapsed >= d),
    }
}

/// Bullets per ring volley at `level`
pub fn ring_bullets(level: u32) -> u32 {
    boss::RING_BULLETS + boss::RING_BULLETS_PER_LEVEL * level.saturating_sub(1)
}

/// One boss tick: advance the phase if due, then run its behaviour
#[allow(clippy::too_many_arguments)]
pub fn update_boss(
    e: &mut Enemy,
    players: &[Player],
    projectiles: &mut Pool<Projectile>,
    particles: &mut Pool<Particle>,
    ctx: &mut SimContext,
    arena: Vec2,
    speed_mult: f32,
    difficulty: f32,
    minions: &mut Vec<Enemy>,
) {
    let EnemyExt::Boss(mut brain) = e.ext else {
        return;
    };
    let tick = ctx.tick;
    let toward = target_among(players, e.position)
        .map(|p| (p.position - e.position).normalize())
        .unwrap_or(Vec2::ZERO);

    let enraging = !brain.is_raging() && e.health_fraction() < boss::RAGE_THRESHOLD;
    if enraging || phase_over(&brain, e.position, tick) {
        let plan = plan_next_phase(&brain, e.health_fraction());
        brain.phase = build_phase(plan.kind, brain.level, tick, toward);
        brain.phase_started = tick;
        brain.cycle_step = plan.cycle_step;
        brain.attack_index = plan.attack_index;
        tracing::debug!("Boss {} entered {:?}", e.id, plan.kind);
        ctx.events.push(GameLoopEvent::BossPhaseChanged {
            id: e.id,
            phase: brain.phase.tag(),
        });
    }

    let speed = e.speed * speed_mult;
    let level = brain.level;
    match &mut brain.phase {
        BossPhase::Entering => {
            e.velocity = Vec2::new(0.0, boss::ENTER_SPEED);
        }
        BossPhase::Chasing => {
            e.velocity = toward * speed;
        }
        BossPhase::RingShot { next_volley } => {
            e.velocity = toward * (speed * 0.5);
            if tick >= *next_volley {
                *next_volley = tick + boss::RING_INTERVAL;
                let phase = (tick % 60) as f32 / 60.0 * TAU;
                spawn_hostile_ring(
                    projectiles,
                    &mut ctx.ids,
                    e.position,
                    ring_bullets(level),
                    phase,
                    boss::BULLET_SPEED,
                    boss::BULLET_DAMAGE,
                );
            }
        }
        BossPhase::SpiralShot { angle, next_shot } => {
            e.velocity = Vec2::ZERO;
            if tick >= *next_shot {
                *next_shot = tick + boss::SPIRAL_INTERVAL;
                let arms = 2 + level.saturating_sub(1).min(2);
                for arm in 0..arms {
                    let dir = Vec2::from_angle(*angle + TAU * arm as f32 / arms as f32);
                    spawn_hostile_bullet(
                        projectiles,
                        &mut ctx.ids,
                        e.position,
                        dir,
                        boss::BULLET_SPEED,
                        boss::BULLET_DAMAGE,
                    );
                }
                *angle = (*angle + boss::SPIRAL_STEP) % TAU;
            }
        }
        BossPhase::Dash { heading } => {
            e.velocity = *heading * (speed * boss::DASH_MULTIPLIER);
            spawn_burst(particles, &mut ctx.rng, e.position, 1, 4);
        }
        BossPhase::Summon { spawned } => {
            e.velocity = Vec2::ZERO;
            if !*spawned {
                *spawned = true;
                let count = boss::SUMMON_BASE + level;
                for i in 0..count {
                    let angle = TAU * i as f32 / count as f32;
                    let kind = if i % 2 == 0 {
                        EnemyKind::Basic
                    } else {
                        EnemyKind::Fast
                    };
                    let pos = e.position + Vec2::from_angle(angle) * boss::SUMMON_RING;
                    minions.push(create_enemy(kind, pos, ctx.ids.next_id(), tick, difficulty, false));
                }
            }
        }
        BossPhase::Shield { .. } => {
            e.velocity = toward * (speed * 0.6);
        }
        BossPhase::Rage { angle, next_volley } => {
            e.velocity = toward * (speed * boss::RAGE_SPEED);
            if tick >= *next_volley {
                *next_volley = tick + boss::RAGE_INTERVAL;
                spawn_hostile_ring(
                    projectiles,
                    &mut ctx.ids,
                    e.position,
                    ring_bullets(level + 1),
                    *angle,
                    boss::BULLET_SPEED * 1.2,
                    boss::BULLET_DAMAGE,
                );
                *angle = (*angle + PI / 7.0) % TAU;
            }
        }
    }

    e.position += e.velocity;
    if !matches!(brain.phase, BossPhase::Entering) {
        e.position = clamp_to_arena(e.position, e.radius, arena);
    }
    e.ext = EnemyExt::Boss(brain);
}

/// Fresh boss scaled to `level`, placed above the top edge
pub fn spawn_boss(level: u32, id: u32, tick: Tick, arena: Vec2, difficulty: f32) -> Enemy {
    let mut e = create_enemy(
        EnemyKind::Boss,
        Vec2::new(arena.x * 0.5, -boss::RADIUS),
        id,
        tick,
        difficulty,
        false,
    );
    let level = level.max(1);
    e.max_health = boss::BASE_HEALTH * level as f32 * difficulty.max(1.0);
    e.health = e.max_health;
    e.points = boss::POINTS * level;
    e.ext = EnemyExt::Boss(BossBrain::new(level, tick));
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::GameState;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brain_in(phase: BossPhase, level: u32) -> BossBrain {
        BossBrain {
            phase,
            ..BossBrain::new(level, 0)
        }
    }

    fn boss_state(level: u32) -> (GameState, SimContext) {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(800.0, 800.0);
        state.enemies.push(spawn_boss(level, 1, 0, state.arena, 1.0));
        (state, SimContext::new(3, Vec2::new(1600.0, 1000.0)))
    }

    fn run(state: &mut GameState, ctx: &mut SimContext, ticks: u64) {
        let mut minions = Vec::new();
        for _ in 0..ticks {
            ctx.tick += 1;
            let GameState {
                enemies,
                players,
                projectiles,
                particles,
                arena,
                ..
            } = state;
            update_boss(
                &mut enemies[0],
                players,
                projectiles,
                particles,
                ctx,
                *arena,
                1.0,
                1.0,
                &mut minions,
            );
        }
        state.enemies.extend(minions);
    }

    #[test]
    fn test_attack_unlocks_by_level() {
        assert_eq!(attacks_for_level(1).as_slice(), &[PhaseKind::RingShot]);
        assert_eq!(
            attacks_for_level(4).as_slice(),
            &[
                PhaseKind::RingShot,
                PhaseKind::SpiralShot,
                PhaseKind::Dash,
                PhaseKind::Shield
            ]
        );
    }

    #[test]
    fn test_base_cycle() {
        let mut brain = BossBrain::new(2, 0);
        let mut seen = Vec::new();
        for _ in 0..9 {
            let plan = plan_next_phase(&brain, 1.0);
            seen.push(plan.kind);
            brain.phase = build_phase(plan.kind, brain.level, 0, Vec2::ZERO);
            brain.cycle_step = plan.cycle_step;
            brain.attack_index = plan.attack_index;
        }
        assert_eq!(
            seen,
            vec![
                PhaseKind::Chasing,
                PhaseKind::RingShot,
                PhaseKind::Chasing,
                PhaseKind::Summon,
                PhaseKind::Chasing,
                PhaseKind::SpiralShot,
                PhaseKind::Chasing,
                PhaseKind::Summon,
                PhaseKind::Chasing,
            ]
        );
    }

    #[test]
    fn test_rage_is_terminal() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let level = rng.gen_range(1..6);
            let phases = [
                BossPhase::Entering,
                BossPhase::Chasing,
                BossPhase::RingShot { next_volley: 0 },
                BossPhase::Dash {
                    heading: Vec2::new(1.0, 0.0),
                },
                BossPhase::Shield { hp: 10.0 },
            ];
            let brain = brain_in(phases[rng.gen_range(0..phases.len())], level);
            let frac = rng.gen_range(0.0..boss::RAGE_THRESHOLD);
            assert_eq!(next_phase_kind(&brain, frac), PhaseKind::Rage);

            let raging = brain_in(
                BossPhase::Rage {
                    angle: 0.0,
                    next_volley: 0,
                },
                level,
            );
            assert_eq!(next_phase_kind(&raging, rng.gen_range(0.0..1.0)), PhaseKind::Rage);
        }
    }

    #[test]
    fn test_shield_absorbs_ninety_percent() {
        let mut brain = brain_in(BossPhase::Shield { hp: 50.0 }, 4);
        assert!((brain.absorb(10.0) - 1.0).abs() < 1e-5);
        assert_eq!(brain.phase, BossPhase::Shield { hp: 41.0 });

        // overflow spills into health once the pool runs dry
        let to_health = brain.absorb(100.0);
        assert!((to_health - 59.0).abs() < 1e-4);
        assert_eq!(brain.absorb(10.0), 10.0);
    }

    #[test]
    fn test_entering_descends_then_chases() {
        let (mut state, mut ctx) = boss_state(1);
        run(&mut state, &mut ctx, 200);
        let brain = state.enemies[0].boss().copied().unwrap_or(BossBrain::new(1, 0));
        assert_ne!(brain.phase.kind(), PhaseKind::Entering);
        assert!(state.enemies[0].position.y >= boss::ENTER_Y - 1.0);
    }

    #[test]
    fn test_low_health_enters_rage_and_fires() {
        let (mut state, mut ctx) = boss_state(1);
        run(&mut state, &mut ctx, 5);
        state.enemies[0].health = state.enemies[0].max_health * 0.2;
        run(&mut state, &mut ctx, 1);
        assert!(state.enemies[0].boss().map(|b| b.is_raging()).unwrap_or(false));
        assert_eq!(state.projectiles.active_count() as u32, ring_bullets(2));
        assert!(ctx
            .events
            .iter()
            .any(|ev| matches!(ev, GameLoopEvent::BossPhaseChanged { phase: 7, .. })));
    }

    #[test]
    fn test_summon_spawns_once_per_entry() {
        let (mut state, mut ctx) = boss_state(2);
        if let EnemyExt::Boss(brain) = &mut state.enemies[0].ext {
            brain.phase = BossPhase::Summon { spawned: false };
            brain.phase_started = 0;
            brain.cycle_step = 3;
        }
        state.enemies[0].position = Vec2::new(800.0, 300.0);
        run(&mut state, &mut ctx, 30);
        let minions = state.enemies.iter().filter(|e| !e.is_boss()).count() as u32;
        assert_eq!(minions, boss::SUMMON_BASE + 2);
    }

    #[test]
    fn test_spawn_scales_with_level() {
        let b1 = spawn_boss(1, 1, 0, Vec2::new(1600.0, 1000.0), 1.0);
        let b2 = spawn_boss(2, 2, 0, Vec2::new(1600.0, 1000.0), 1.0);
        assert_eq!(b2.max_health, b1.max_health * 2.0);
        assert_eq!(b2.boss().map(|b| b.level), Some(2));
    }
}
