//! Weapon firing patterns
//!
//! Each weapon is rate-limited by its own `ready_at` tick. Firing only
//! acquires projectiles from the pool; movement happens in the projectile
//! step.

use std::f32::consts::TAU;

use crate::game::constants::{enemy, weapon};
use crate::game::game_loop::IdGen;
use crate::game::pool::Pool;
use crate::game::state::{Motion, Owner, Player, Projectile, Tick, Weapon, WeaponType};
use crate::util::vec2::Vec2;

/// Fire every ready weapon of `player`; returns the number of projectiles spawned
pub fn fire_weapons(
    player: &mut Player,
    tick: Tick,
    projectiles: &mut Pool<Projectile>,
    ids: &mut IdGen,
) -> u32 {
    if !player.alive {
        return 0;
    }
    let origin = player.position;
    let aim = aim_direction(origin, player.aim);
    let damage_mult = player.damage_multiplier();
    let owner = Owner::Player(player.slot);

    let mut spawned = 0;
    for w in player.weapons.iter_mut() {
        if tick < w.ready_at {
            continue;
        }
        w.ready_at = tick + w.cooldown.max(1) as Tick;
        spawned += spawn_pattern(w, origin, aim, w.damage * damage_mult, owner, projectiles, ids);
    }
    spawned
}

/// Unit vector from `origin` toward `aim`, straight up if degenerate
pub fn aim_direction(origin: Vec2, aim: Vec2) -> Vec2 {
    let dir = (aim - origin).normalize();
    if dir == Vec2::ZERO {
        Vec2::new(0.0, -1.0)
    } else {
        dir
    }
}

fn spawn_pattern(
    w: &Weapon,
    origin: Vec2,
    aim: Vec2,
    damage: f32,
    owner: Owner,
    projectiles: &mut Pool<Projectile>,
    ids: &mut IdGen,
) -> u32 {
    let count = w.count.max(1) as u32;
    match w.kind {
        WeaponType::Blaster => {
            let side = aim.perp();
            for i in 0..count {
                let offset = (i as f32 - (count - 1) as f32 * 0.5) * weapon::BLASTER_SPACING;
                let p = projectiles.acquire();
                *p = linear(ids.next_id(), origin + side * offset, aim * w.speed, damage, owner);
                p.radius = weapon::BLASTER_RADIUS;
                p.pierce = w.pierce;
                p.weapon = Some(w.kind);
            }
            count
        }
        WeaponType::Spread => {
            let base = aim.angle();
            for i in 0..count {
                let t = if count > 1 {
                    i as f32 / (count - 1) as f32 - 0.5
                } else {
                    0.0
                };
                let dir = Vec2::from_angle(base + t * weapon::SPREAD_ARC);
                let p = projectiles.acquire();
                *p = linear(ids.next_id(), origin, dir * w.speed, damage, owner);
                p.radius = weapon::SPREAD_RADIUS;
                p.pierce = w.pierce;
                p.weapon = Some(w.kind);
            }
            count
        }
        WeaponType::Beam => {
            let p = projectiles.acquire();
            *p = linear(ids.next_id(), origin, aim * w.speed, damage, owner);
            p.radius = weapon::BEAM_RADIUS;
            p.pierce = w.pierce;
            p.weapon = Some(w.kind);
            1
        }
        WeaponType::Orbit => {
            let start = aim.angle();
            for i in 0..count {
                let angle = start + TAU * i as f32 / count as f32;
                let p = projectiles.acquire();
                p.id = ids.next_id();
                p.position = origin + Vec2::from_angle(angle) * weapon::ORBIT_DISTANCE;
                p.motion = Motion::Orbit {
                    angle,
                    radius: weapon::ORBIT_DISTANCE,
                    angular_speed: w.speed,
                };
                p.radius = weapon::ORBIT_RADIUS;
                p.damage = damage;
                p.owner = owner;
                p.pierce = w.pierce;
                p.lifetime = Some(weapon::ORBIT_LIFETIME);
                p.weapon = Some(w.kind);
            }
            count
        }
        WeaponType::Launcher => {
            let p = projectiles.acquire();
            *p = linear(ids.next_id(), origin, aim * w.speed, damage, owner);
            p.radius = weapon::LAUNCHER_RADIUS;
            p.pierce = w.pierce;
            p.explosion_radius = w.explosion_radius;
            p.weapon = Some(w.kind);
            1
        }
    }
}

fn linear(id: u32, position: Vec2, velocity: Vec2, damage: f32, owner: Owner) -> Projectile {
    Projectile {
        id,
        position,
        motion: Motion::Linear { velocity },
        damage,
        owner,
        pierce: 1,
        ..Default::default()
    }
}

/// Enemy-fired bullet travelling along `direction`
pub fn spawn_hostile_bullet(
    projectiles: &mut Pool<Projectile>,
    ids: &mut IdGen,
    position: Vec2,
    direction: Vec2,
    speed: f32,
    damage: f32,
) {
    let p = projectiles.acquire();
    *p = linear(ids.next_id(), position, direction.normalize() * speed, damage, Owner::Enemy);
    p.radius = enemy::ENEMY_BULLET_RADIUS;
}

/// Evenly spaced ring of hostile bullets starting at `phase`
pub fn spawn_hostile_ring(
    projectiles: &mut Pool<Projectile>,
    ids: &mut IdGen,
    center: Vec2,
    count: u32,
    phase: f32,
    speed: f32,
    damage: f32,
) {
    for i in 0..count.max(1) {
        let dir = Vec2::from_angle(phase + TAU * i as f32 / count.max(1) as f32);
        spawn_hostile_bullet(projectiles, ids, center, dir, speed, damage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetaBonuses;
    use crate::game::state::HOST_SLOT;

    fn player_with(kind: WeaponType) -> Player {
        let meta = MetaBonuses {
            starting_weapon: kind,
            ..Default::default()
        };
        let mut p = Player::new(HOST_SLOT, Vec2::new(100.0, 100.0), &meta);
        p.aim = Vec2::new(200.0, 100.0);
        p
    }

    #[test]
    fn test_cooldown_limits_fire_rate() {
        let mut p = player_with(WeaponType::Blaster);
        let mut pool = Pool::with_capacity(8);
        let mut ids = IdGen::default();
        assert_eq!(fire_weapons(&mut p, 0, &mut pool, &mut ids), 1);
        assert_eq!(fire_weapons(&mut p, 1, &mut pool, &mut ids), 0);
        assert_eq!(
            fire_weapons(&mut p, weapon::BLASTER_COOLDOWN as Tick, &mut pool, &mut ids),
            1
        );
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_spread_fans_pellets() {
        let mut p = player_with(WeaponType::Spread);
        let mut pool = Pool::with_capacity(8);
        let mut ids = IdGen::default();
        fire_weapons(&mut p, 0, &mut pool, &mut ids);
        assert_eq!(pool.active_count(), weapon::SPREAD_PELLETS as usize);
        let ys: Vec<f32> = pool.iter().map(|pr| pr.velocity().y).collect();
        assert!(ys[0] < 0.0 && ys[2] > 0.0);
        assert!(ys[1].abs() < 1e-5);
    }

    #[test]
    fn test_beam_carries_pierce() {
        let mut p = player_with(WeaponType::Beam);
        let mut pool = Pool::with_capacity(8);
        let mut ids = IdGen::default();
        fire_weapons(&mut p, 0, &mut pool, &mut ids);
        assert_eq!(pool.get(0).map(|pr| pr.pierce), Some(weapon::BEAM_PIERCE));
    }

    #[test]
    fn test_orbit_spawns_ring_with_lifetime() {
        let mut p = player_with(WeaponType::Orbit);
        let mut pool = Pool::with_capacity(8);
        let mut ids = IdGen::default();
        fire_weapons(&mut p, 0, &mut pool, &mut ids);
        assert_eq!(pool.active_count(), weapon::ORBIT_COUNT as usize);
        for pr in pool.iter() {
            assert!(matches!(pr.motion, Motion::Orbit { .. }));
            assert_eq!(pr.lifetime, Some(weapon::ORBIT_LIFETIME));
            assert!((pr.position.distance_to(p.position) - weapon::ORBIT_DISTANCE).abs() < 1e-3);
        }
    }

    #[test]
    fn test_damage_buff_scales_projectiles() {
        let mut p = player_with(WeaponType::Launcher);
        p.add_buff(crate::game::state::BuffKind::Damage, 100, 1.5);
        let mut pool = Pool::with_capacity(8);
        let mut ids = IdGen::default();
        fire_weapons(&mut p, 0, &mut pool, &mut ids);
        let shell = pool.get(0).cloned().unwrap_or_default();
        assert!((shell.damage - weapon::LAUNCHER_DAMAGE * 1.5).abs() < 1e-4);
        assert_eq!(shell.explosion_radius, weapon::LAUNCHER_EXPLOSION);
    }

    #[test]
    fn test_hostile_ring_count() {
        let mut pool = Pool::with_capacity(4);
        let mut ids = IdGen::default();
        spawn_hostile_ring(&mut pool, &mut ids, Vec2::ZERO, 12, 0.0, 3.0, 5.0);
        assert_eq!(pool.active_count(), 12);
        assert!(pool.iter().all(|pr| pr.is_hostile()));
    }
}
