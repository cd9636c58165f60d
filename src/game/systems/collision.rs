//! Grid-assisted hit detection
//!
//! Every pair test goes through [`circles_overlap`]. Enemy ids stored in the
//! grid are indices into `GameState::enemies`, which must not be reordered
//! between the rebuild and these passes.

use smallvec::SmallVec;

use crate::game::constants::{boss, enemy, player, score, weapon};
use crate::game::pool::Pool;
use crate::game::spatial::SpatialGrid;
use crate::game::state::{Enemy, Owner, Player, PlayerSlot, Projectile, Tick};
use crate::util::vec2::Vec2;

/// Strict circle overlap: `distance² < (ra + rb)²`
#[inline]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let reach = ra + rb;
    a.distance_sq_to(b) < reach * reach
}

/// An enemy whose health reached zero this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kill {
    /// Index into `GameState::enemies`
    pub index: usize,
    /// Slot credited with the kill
    pub by: PlayerSlot,
}

/// Player-side collision outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionEvent {
    PlayerDamaged { slot: PlayerSlot, amount: f32, died: bool },
    NearMiss { slot: PlayerSlot },
}

type Candidates = SmallVec<[usize; 32]>;

/// Resolve player projectiles against enemies
///
/// Projectiles are processed in pool order and candidates in grid order;
/// the first damage application that empties an enemy's health records the
/// kill. Returns the number of direct hits.
pub fn resolve_player_projectiles(
    projectiles: &mut Pool<Projectile>,
    enemies: &mut [Enemy],
    grid: &SpatialGrid,
    kills: &mut Vec<Kill>,
) -> usize {
    let mut consumed: Vec<usize> = Vec::new();
    let mut hits = 0;
    let mut candidates = Candidates::new();
    let mut splash = Candidates::new();

    for (pi, p) in projectiles.iter_mut().enumerate() {
        let Owner::Player(slot) = p.owner else {
            continue;
        };
        if p.pierce == 0 {
            continue;
        }

        candidates.clear();
        grid.query(p.position, |id| candidates.push(id as usize));

        for &ei in &candidates {
            let Some(e) = enemies.get_mut(ei) else {
                continue;
            };
            if !e.is_alive() || p.hits.contains(&e.id) {
                continue;
            }
            if !circles_overlap(p.position, p.radius, e.position, e.radius) {
                continue;
            }

            hits += 1;
            p.hits.push(e.id);
            if e.take_damage(p.damage).killed {
                kills.push(Kill { index: ei, by: slot });
            }

            if p.explosion_radius > 0.0 {
                let blast = p.explosion_radius;
                splash.clear();
                grid.query_radius(p.position, blast + boss::RADIUS.max(enemy::MAX_RADIUS), |id| {
                    splash.push(id as usize)
                });
                for &si in &splash {
                    if si == ei {
                        continue;
                    }
                    let Some(other) = enemies.get_mut(si) else {
                        continue;
                    };
                    if !other.is_alive() {
                        continue;
                    }
                    let reach = blast + other.radius;
                    let d = other.position.distance_to(p.position);
                    if d >= reach {
                        continue;
                    }
                    let amount = p.damage * weapon::SPLASH_FACTOR * (1.0 - d / reach);
                    if other.take_damage(amount).killed {
                        kills.push(Kill { index: si, by: slot });
                    }
                }
            }

            p.pierce -= 1;
            if p.pierce == 0 {
                consumed.push(pi);
                break;
            }
        }
    }

    projectiles.release_many(&mut consumed);
    hits
}

/// Apply `amount` to a player unless dead or invulnerable
///
/// Returns the damage actually taken.
pub fn damage_player(p: &mut Player, amount: f32, tick: Tick) -> Option<f32> {
    if !p.alive || p.is_invulnerable(tick) || amount <= 0.0 {
        return None;
    }
    let taken = amount * p.armor;
    p.health -= taken;
    p.damage_taken += taken;
    p.invulnerable_until = tick + player::INVULN_TICKS;
    if p.health <= 0.0 {
        p.health = 0.0;
        p.alive = false;
    }
    Some(taken)
}

/// Resolve enemy bullets against players, including graze detection
pub fn resolve_hostile_projectiles(
    projectiles: &mut Pool<Projectile>,
    players: &mut [Player],
    tick: Tick,
    out: &mut Vec<CollisionEvent>,
) {
    let mut consumed: Vec<usize> = Vec::new();

    for (pi, p) in projectiles.iter().enumerate() {
        if !p.is_hostile() {
            continue;
        }
        for pl in players.iter_mut() {
            if !pl.alive {
                continue;
            }
            if circles_overlap(p.position, p.radius, pl.position, pl.radius) {
                consumed.push(pi);
                if let Some(amount) = damage_player(pl, p.damage, tick) {
                    out.push(CollisionEvent::PlayerDamaged {
                        slot: pl.slot,
                        amount,
                        died: !pl.alive,
                    });
                }
                break;
            }
            if tick >= pl.near_miss_ready_at
                && !pl.is_invulnerable(tick)
                && circles_overlap(
                    p.position,
                    p.radius + score::NEAR_MISS_BAND,
                    pl.position,
                    pl.radius,
                )
            {
                pl.near_miss_ready_at = tick + score::NEAR_MISS_COOLDOWN;
                out.push(CollisionEvent::NearMiss { slot: pl.slot });
            }
        }
    }

    projectiles.release_many(&mut consumed);
}

/// Resolve body contact between enemies and players
///
/// At most one contact per player per tick deals damage; invulnerability
/// covers the rest.
pub fn resolve_enemy_contacts(
    enemies: &[Enemy],
    players: &mut [Player],
    grid: &SpatialGrid,
    tick: Tick,
    out: &mut Vec<CollisionEvent>,
) {
    let mut candidates = Candidates::new();
    for pl in players.iter_mut() {
        if !pl.alive || pl.is_invulnerable(tick) {
            continue;
        }
        candidates.clear();
        grid.query(pl.position, |id| candidates.push(id as usize));

        let hit = candidates.iter().filter_map(|&i| enemies.get(i)).find(|e| {
            e.is_alive() && circles_overlap(e.position, e.radius, pl.position, pl.radius)
        });
        if let Some(e) = hit {
            if let Some(amount) = damage_player(pl, e.damage, tick) {
                out.push(CollisionEvent::PlayerDamaged {
                    slot: pl.slot,
                    amount,
                    died: !pl.alive,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetaBonuses;
    use crate::game::state::{EnemyExt, EnemyKind, Motion, HOST_SLOT};
    use crate::game::systems::enemy::create_enemy;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn grid_for(enemies: &[Enemy]) -> SpatialGrid {
        let mut grid = SpatialGrid::for_arena(1600.0, 1000.0);
        grid.rebuild(enemies.iter().enumerate().map(|(i, e)| (i as u32, e.position)));
        grid
    }

    fn basic_at(id: u32, x: f32, y: f32) -> Enemy {
        create_enemy(EnemyKind::Basic, Vec2::new(x, y), id, 0, 1.0, false)
    }

    fn shot(pool: &mut Pool<Projectile>, at: Vec2, damage: f32, pierce: u8) {
        let p = pool.acquire();
        p.position = at;
        p.motion = Motion::Linear {
            velocity: Vec2::new(1.0, 0.0),
        };
        p.radius = 5.0;
        p.damage = damage;
        p.owner = Owner::Player(HOST_SLOT);
        p.pierce = pierce;
    }

    #[test]
    fn test_overlap_is_symmetric_and_strict() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let a = Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0));
            let b = Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0));
            let ra = rng.gen_range(1.0..30.0);
            let rb = rng.gen_range(1.0..30.0);
            let expected = a.distance_sq_to(b) < (ra + rb) * (ra + rb);
            assert_eq!(circles_overlap(a, ra, b, rb), expected);
            assert_eq!(circles_overlap(b, rb, a, ra), expected);
        }
        assert!(!circles_overlap(Vec2::ZERO, 5.0, Vec2::new(10.0, 0.0), 5.0));
    }

    #[test]
    fn test_pierce_three_hits_first_three_in_grid_order() {
        let mut enemies: Vec<Enemy> = (0..4).map(|i| basic_at(i + 1, 400.0, 400.0)).collect();
        let grid = grid_for(&enemies);
        let mut pool = Pool::with_capacity(4);
        shot(&mut pool, Vec2::new(400.0, 400.0), 5.0, 3);

        let mut kills = Vec::new();
        let hits = resolve_player_projectiles(&mut pool, &mut enemies, &grid, &mut kills);
        assert_eq!(hits, 3);
        assert!(pool.is_empty());
        let damaged: Vec<bool> = enemies.iter().map(|e| e.health < e.max_health).collect();
        assert_eq!(damaged, vec![true, true, true, false]);
    }

    #[test]
    fn test_projectile_never_rehits_same_enemy() {
        let mut enemies = vec![basic_at(1, 400.0, 400.0)];
        enemies[0].health = 1000.0;
        enemies[0].max_health = 1000.0;
        let grid = grid_for(&enemies);
        let mut pool = Pool::with_capacity(4);
        shot(&mut pool, Vec2::new(400.0, 400.0), 5.0, 3);

        let mut kills = Vec::new();
        for _ in 0..3 {
            resolve_player_projectiles(&mut pool, &mut enemies, &grid, &mut kills);
        }
        assert_eq!(enemies[0].health, 995.0);
        assert_eq!(pool.get(0).map(|p| p.pierce), Some(2));
    }

    #[test]
    fn test_splash_falloff_and_single_kill_credit() {
        let mut enemies = vec![basic_at(1, 400.0, 400.0), basic_at(2, 430.0, 400.0), basic_at(3, 700.0, 400.0)];
        enemies[0].health = 5.0;
        let grid = grid_for(&enemies);
        let mut pool = Pool::with_capacity(4);
        shot(&mut pool, Vec2::new(400.0, 400.0), 10.0, 1);
        if let Some(p) = pool.get_mut(0) {
            p.explosion_radius = 70.0;
        }

        let mut kills = Vec::new();
        resolve_player_projectiles(&mut pool, &mut enemies, &grid, &mut kills);
        assert_eq!(kills, vec![Kill { index: 0, by: HOST_SLOT }]);

        let reach = 70.0 + enemies[1].radius;
        let expected = 10.0 * weapon::SPLASH_FACTOR * (1.0 - 30.0 / reach);
        assert!((enemies[1].max_health - enemies[1].health - expected).abs() < 1e-4);
        assert_eq!(enemies[2].health, enemies[2].max_health);
    }

    #[test]
    fn test_hostile_projectiles_skip_enemies() {
        let mut enemies = vec![basic_at(1, 400.0, 400.0)];
        let grid = grid_for(&enemies);
        let mut pool = Pool::with_capacity(4);
        shot(&mut pool, Vec2::new(400.0, 400.0), 5.0, 1);
        if let Some(p) = pool.get_mut(0) {
            p.owner = Owner::Enemy;
        }
        let mut kills = Vec::new();
        assert_eq!(resolve_player_projectiles(&mut pool, &mut enemies, &grid, &mut kills), 0);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn test_invulnerability_gates_damage() {
        let mut pl = Player::new(HOST_SLOT, Vec2::ZERO, &MetaBonuses::default());
        assert_eq!(damage_player(&mut pl, 10.0, 100), Some(10.0));
        assert_eq!(damage_player(&mut pl, 10.0, 101), None);
        assert_eq!(
            damage_player(&mut pl, 10.0, 100 + player::INVULN_TICKS),
            Some(10.0)
        );
        assert_eq!(pl.health, pl.max_health - 20.0);
    }

    #[test]
    fn test_enemy_contact_damages_once() {
        let enemies = vec![basic_at(1, 400.0, 400.0), basic_at(2, 405.0, 400.0)];
        let grid = grid_for(&enemies);
        let mut players = vec![Player::new(HOST_SLOT, Vec2::new(410.0, 400.0), &MetaBonuses::default())];
        let mut out = Vec::new();
        resolve_enemy_contacts(&enemies, &mut players, &grid, 10, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(players[0].health, players[0].max_health - enemies[0].damage);
    }

    #[test]
    fn test_bullet_hit_and_near_miss() {
        let mut players = vec![Player::new(HOST_SLOT, Vec2::new(100.0, 100.0), &MetaBonuses::default())];
        let mut pool = Pool::with_capacity(4);
        shot(&mut pool, Vec2::new(100.0 + 15.0 + 5.0 + 6.0, 100.0), 8.0, 1);
        if let Some(p) = pool.get_mut(0) {
            p.owner = Owner::Enemy;
        }
        let mut out = Vec::new();
        resolve_hostile_projectiles(&mut pool, &mut players, 1, &mut out);
        assert_eq!(out, vec![CollisionEvent::NearMiss { slot: HOST_SLOT }]);
        assert_eq!(pool.active_count(), 1);

        // cooldown suppresses a second graze
        out.clear();
        resolve_hostile_projectiles(&mut pool, &mut players, 2, &mut out);
        assert!(out.is_empty());

        if let Some(p) = pool.get_mut(0) {
            p.position = Vec2::new(100.0, 100.0);
        }
        resolve_hostile_projectiles(&mut pool, &mut players, 3, &mut out);
        assert!(matches!(out[0], CollisionEvent::PlayerDamaged { amount, died: false, .. } if amount == 8.0));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_boss_shield_routes_splash() {
        let mut enemies = vec![create_enemy(EnemyKind::Boss, Vec2::new(400.0, 400.0), 9, 0, 1.0, false)];
        if let EnemyExt::Boss(brain) = &mut enemies[0].ext {
            brain.phase = crate::game::state::BossPhase::Shield { hp: 100.0 };
        }
        let grid = grid_for(&enemies);
        let mut pool = Pool::with_capacity(4);
        shot(&mut pool, Vec2::new(400.0, 400.0), 20.0, 1);
        let mut kills = Vec::new();
        resolve_player_projectiles(&mut pool, &mut enemies, &grid, &mut kills);
        assert!((enemies[0].max_health - enemies[0].health - 2.0).abs() < 1e-4);
    }
}
