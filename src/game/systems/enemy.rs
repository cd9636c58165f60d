//! Enemy construction, steering and separation

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::game::constants::{enemy, grid, wave};
use crate::game::game_loop::SimContext;
use crate::game::spatial::SpatialGrid;
use crate::game::state::{
    target_among, BossBrain, Enemy, EnemyExt, EnemyId, EnemyKind, FormationRole, GameState, Tick,
    WaveEventKind,
};
use crate::game::systems::boss;
use crate::game::systems::weapons::spawn_hostile_bullet;
use crate::util::vec2::Vec2;

/// Build an enemy of `kind` with health scaled by `difficulty`
pub fn create_enemy(
    kind: EnemyKind,
    position: Vec2,
    id: EnemyId,
    tick: Tick,
    difficulty: f32,
    elite: bool,
) -> Enemy {
    let stats = kind.stats();
    let mut health = stats.health * difficulty.max(0.1);
    let mut radius = stats.radius;
    let mut points = stats.points;
    if elite {
        health *= enemy::ELITE_HEALTH;
        radius *= enemy::ELITE_RADIUS;
        points *= enemy::ELITE_POINTS;
    }

    let ext = match kind {
        EnemyKind::Basic | EnemyKind::Fast | EnemyKind::Tank => EnemyExt::Plain,
        EnemyKind::Zigzag => EnemyExt::Zigzag { phase: 0.0 },
        EnemyKind::Ghost => EnemyExt::Ghost { alpha: 1.0 },
        EnemyKind::Shooter => EnemyExt::Shooter {
            next_shot: tick + enemy::SHOOTER_COOLDOWN,
        },
        EnemyKind::Splitter => EnemyExt::Splitter { child: false },
        EnemyKind::Magnet => EnemyExt::Magnet,
        EnemyKind::Boss => EnemyExt::Boss(BossBrain::new(1, tick)),
    };

    Enemy {
        id,
        kind,
        position,
        velocity: Vec2::ZERO,
        radius,
        health,
        max_health: health,
        speed: stats.speed,
        damage: stats.damage,
        points,
        spawned_at: tick,
        elite,
        formation: None,
        ext,
    }
}

/// Two weakened splitter halves, offset sideways from the parent
pub fn split_children(parent: &Enemy, ctx: &mut SimContext) -> SmallVec<[Enemy; 2]> {
    let mut children = SmallVec::new();
    let side = parent.velocity.normalize().perp();
    let side = if side == Vec2::ZERO { Vec2::new(1.0, 0.0) } else { side };
    for i in 0..enemy::SPLIT_CHILDREN {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        let mut child = create_enemy(
            EnemyKind::Splitter,
            parent.position + side * (parent.radius * 0.6 * sign),
            ctx.ids.next_id(),
            ctx.tick,
            1.0,
            false,
        );
        child.radius = parent.radius * 0.6;
        child.health = parent.max_health * 0.35;
        child.max_health = child.health;
        child.speed = parent.speed * 1.25;
        child.points = (parent.points / 2).max(1);
        child.ext = EnemyExt::Splitter { child: true };
        children.push(child);
    }
    children
}

/// Advance every living enemy one tick
pub fn update_enemies(state: &mut GameState, ctx: &mut SimContext) {
    let surge = state.event_active(WaveEventKind::Surge);
    let speed_mult = if surge { wave::SURGE_SPEED_FACTOR } else { 1.0 };
    let difficulty = state.difficulty();
    let arena = state.arena;
    let tick = ctx.tick;

    let GameState {
        enemies,
        players,
        projectiles,
        particles,
        orbs,
        ..
    } = state;

    let leaders: FxHashSet<u32> = enemies
        .iter()
        .filter(|e| e.is_alive())
        .filter_map(|e| e.formation)
        .filter(|f| f.role == FormationRole::Leader)
        .map(|f| f.id)
        .collect();

    let mut minions: Vec<Enemy> = Vec::new();

    for e in enemies.iter_mut() {
        if !e.is_alive() {
            continue;
        }
        if e.is_boss() {
            boss::update_boss(
                e,
                players,
                projectiles,
                particles,
                ctx,
                arena,
                speed_mult,
                difficulty,
                &mut minions,
            );
            continue;
        }

        let Some(target) = target_among(players, e.position).map(|p| p.position) else {
            continue;
        };
        let to_target = target - e.position;
        let (dir, dist) = to_target.normalize_with_length();
        let speed = e.speed * speed_mult;

        if let Some(slot) = e.formation.as_mut() {
            if !slot.broken {
                let leader_gone = slot.role == FormationRole::Wing && !leaders.contains(&slot.id);
                let strayed = e.position.x < -grid::MARGIN
                    || e.position.y < -grid::MARGIN
                    || e.position.x > arena.x + grid::MARGIN
                    || e.position.y > arena.y + grid::MARGIN;
                if leader_gone || strayed || dist < enemy::FORMATION_BREAK_DISTANCE {
                    slot.broken = true;
                } else {
                    e.velocity = slot.heading * speed;
                    e.position += e.velocity;
                    continue;
                }
            }
        }

        match &mut e.ext {
            EnemyExt::Plain if e.kind == EnemyKind::Tank => {
                e.velocity = e.velocity.lerp(dir * speed, enemy::TANK_DAMPING);
            }
            EnemyExt::Plain | EnemyExt::Splitter { .. } => {
                e.velocity = dir * speed;
            }
            EnemyExt::Zigzag { phase } => {
                *phase += enemy::ZIGZAG_FREQUENCY;
                e.velocity = dir * speed + dir.perp() * (phase.sin() * enemy::ZIGZAG_AMPLITUDE);
            }
            EnemyExt::Ghost { alpha } => {
                let age = tick.saturating_sub(e.spawned_at) as f32;
                *alpha = 0.35 + 0.65 * (0.5 + 0.5 * (age * enemy::GHOST_PULSE).sin());
                e.velocity = dir * speed;
            }
            EnemyExt::Shooter { next_shot } => {
                if dist > enemy::SHOOTER_RANGE {
                    e.velocity = dir * speed;
                } else {
                    e.velocity = dir.perp() * (speed * 0.6);
                    if tick >= *next_shot {
                        *next_shot = tick + enemy::SHOOTER_COOLDOWN;
                        spawn_hostile_bullet(
                            projectiles,
                            &mut ctx.ids,
                            e.position,
                            dir,
                            enemy::SHOOTER_BULLET_SPEED,
                            enemy::SHOOTER_BULLET_DAMAGE,
                        );
                    }
                }
            }
            EnemyExt::Magnet => {
                e.velocity = dir * speed;
                for orb in orbs.iter_mut() {
                    if orb.vacuum_to.is_some() {
                        continue;
                    }
                    let (pull_dir, d) = (e.position - orb.position).normalize_with_length();
                    if d < enemy::MAGNET_RANGE && d > e.radius {
                        orb.position += pull_dir * enemy::MAGNET_PULL;
                    }
                }
            }
            EnemyExt::Boss(_) => {}
        }

        e.position += e.velocity;
    }

    enemies.extend(minions);
}

/// Push overlapping non-boss enemies apart by their overlap depth
///
/// `grid` must index `enemies` by position.
pub fn separate_enemies(enemies: &mut [Enemy], grid: &SpatialGrid) {
    let mut neighbours: SmallVec<[usize; 32]> = SmallVec::new();
    for i in 0..enemies.len() {
        if enemies[i].is_boss() || !enemies[i].is_alive() {
            continue;
        }
        neighbours.clear();
        grid.query(enemies[i].position, |id| {
            if id as usize > i {
                neighbours.push(id as usize)
            }
        });

        for &j in &neighbours {
            let (a, b) = match enemies.get(j) {
                Some(other) if !other.is_boss() && other.is_alive() => {
                    (enemies[i].position, other.position)
                }
                _ => continue,
            };
            let reach = enemies[i].radius + enemies[j].radius;
            let (dir, d) = (b - a).normalize_with_length();
            let overlap = reach - d;
            if overlap <= 0.0 {
                continue;
            }
            let dir = if d < 1e-4 { Vec2::new(1.0, 0.0) } else { dir };
            let push = dir * (overlap * enemy::SEPARATION_STRENGTH * 0.5);
            enemies[i].position -= push;
            enemies[j].position += push;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::game_loop::SimContext;
    use crate::game::state::FormationSlot;

    fn ctx() -> SimContext {
        SimContext::new(7, Vec2::new(1600.0, 1000.0))
    }

    #[test]
    fn test_elite_modifiers() {
        let plain = create_enemy(EnemyKind::Tank, Vec2::ZERO, 1, 0, 1.0, false);
        let elite = create_enemy(EnemyKind::Tank, Vec2::ZERO, 2, 0, 1.0, true);
        assert!((elite.max_health - plain.max_health * enemy::ELITE_HEALTH).abs() < 1e-3);
        assert!((elite.radius - plain.radius * enemy::ELITE_RADIUS).abs() < 1e-4);
        assert_eq!(elite.points, plain.points * enemy::ELITE_POINTS);
        assert!(elite.radius <= enemy::MAX_RADIUS);
    }

    #[test]
    fn test_enemies_steer_toward_nearest_player() {
        let mut state = GameState::with_defaults(true);
        state.players[0].position = Vec2::new(100.0, 500.0);
        state.players[1].position = Vec2::new(1500.0, 500.0);
        state
            .enemies
            .push(create_enemy(EnemyKind::Basic, Vec2::new(1300.0, 500.0), 1, 0, 1.0, false));
        let mut ctx = ctx();
        update_enemies(&mut state, &mut ctx);
        assert!(state.enemies[0].velocity.x > 0.0);
        assert!(state.enemies[0].position.x > 1300.0);
    }

    #[test]
    fn test_shooter_fires_in_range() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(500.0, 500.0);
        let mut shooter = create_enemy(EnemyKind::Shooter, Vec2::new(700.0, 500.0), 1, 0, 1.0, false);
        shooter.ext = EnemyExt::Shooter { next_shot: 0 };
        state.enemies.push(shooter);
        let mut ctx = ctx();
        update_enemies(&mut state, &mut ctx);
        assert_eq!(state.projectiles.active_count(), 1);
        assert!(state.projectiles.iter().all(|p| p.is_hostile()));
    }

    #[test]
    fn test_wing_breaks_when_leader_dies() {
        let mut state = GameState::with_defaults(false);
        state.players[0].position = Vec2::new(800.0, 900.0);
        let heading = Vec2::new(1.0, 0.0);
        for (id, role) in [(1, FormationRole::Leader), (2, FormationRole::Wing)] {
            let mut e = create_enemy(EnemyKind::Basic, Vec2::new(100.0, 100.0 + id as f32 * 30.0), id, 0, 1.0, false);
            e.formation = Some(FormationSlot {
                id: 1,
                role,
                heading,
                broken: false,
            });
            state.enemies.push(e);
        }
        let mut ctx = ctx();
        update_enemies(&mut state, &mut ctx);
        assert_eq!(state.enemies[1].velocity.normalize(), heading);

        state.enemies[0].health = 0.0;
        update_enemies(&mut state, &mut ctx);
        let wing = &state.enemies[1];
        assert!(wing.formation.map(|f| f.broken).unwrap_or(false));
        assert!(wing.velocity.y > 0.0);
    }

    #[test]
    fn test_separation_pushes_apart() {
        let mut enemies = vec![
            create_enemy(EnemyKind::Basic, Vec2::new(400.0, 400.0), 1, 0, 1.0, false),
            create_enemy(EnemyKind::Basic, Vec2::new(410.0, 400.0), 2, 0, 1.0, false),
            create_enemy(EnemyKind::Boss, Vec2::new(420.0, 400.0), 3, 0, 1.0, false),
        ];
        let mut grid = SpatialGrid::for_arena(1600.0, 1000.0);
        grid.rebuild(enemies.iter().enumerate().map(|(i, e)| (i as u32, e.position)));
        let before = enemies[1].position.distance_to(enemies[0].position);
        separate_enemies(&mut enemies, &grid);
        assert!(enemies[1].position.distance_to(enemies[0].position) > before);
        assert_eq!(enemies[2].position, Vec2::new(420.0, 400.0));
    }

    #[test]
    fn test_split_children_do_not_split_again() {
        let parent = create_enemy(EnemyKind::Splitter, Vec2::new(300.0, 300.0), 1, 0, 1.0, false);
        let mut ctx = ctx();
        let children = split_children(&parent, &mut ctx);
        assert_eq!(children.len(), enemy::SPLIT_CHILDREN);
        assert!(children
            .iter()
            .all(|c| matches!(c.ext, EnemyExt::Splitter { child: true })));
        assert_ne!(children[0].id, children[1].id);
    }
}
