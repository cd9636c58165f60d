//! Projectile and particle stepping
//!
//! Linear projectiles travel by velocity and are culled off-arena; orbiters
//! follow their owner's current position. Lifetimes count down per tick.

use rand::Rng;

use crate::game::constants::sim;
use crate::game::pool::{Pool, SlotAction};
use crate::game::state::{Motion, Owner, Particle, Player, Projectile};
use crate::util::vec2::Vec2;

/// Move every projectile one tick; returns how many were released
pub fn step_projectiles(projectiles: &mut Pool<Projectile>, players: &[Player], arena: Vec2) -> usize {
    projectiles.sweep(|p| {
        if let Some(life) = p.lifetime.as_mut() {
            if *life == 0 {
                return SlotAction::Release;
            }
            *life -= 1;
        }

        match &mut p.motion {
            Motion::Linear { velocity } => {
                p.position += *velocity;
                let m = sim::CULL_MARGIN;
                if p.position.x < -m
                    || p.position.y < -m
                    || p.position.x > arena.x + m
                    || p.position.y > arena.y + m
                    || !p.position.is_finite()
                {
                    return SlotAction::Release;
                }
            }
            Motion::Orbit {
                angle,
                radius,
                angular_speed,
            } => {
                let center = match p.owner {
                    Owner::Player(slot) => players.iter().find(|pl| pl.slot == slot && pl.alive),
                    Owner::Enemy => None,
                };
                let Some(center) = center else {
                    return SlotAction::Release;
                };
                *angle += *angular_speed;
                p.position = center.position + Vec2::from_angle(*angle) * *radius;
            }
        }

        if p.lifetime == Some(0) {
            SlotAction::Release
        } else {
            SlotAction::Keep
        }
    })
}

/// Move and fade particles
pub fn step_particles(particles: &mut Pool<Particle>) {
    particles.sweep(|p| {
        if p.life == 0 {
            return SlotAction::Release;
        }
        p.life -= 1;
        p.position += p.velocity;
        p.velocity *= 0.92;
        SlotAction::Keep
    });
}

/// Emit a burst of `count` cosmetic particles
pub fn spawn_burst<R: Rng>(
    particles: &mut Pool<Particle>,
    rng: &mut R,
    position: Vec2,
    count: u32,
    color: u8,
) {
    for _ in 0..count {
        let p = particles.acquire();
        p.position = position;
        p.velocity = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU)) * rng.gen_range(1.0..4.0);
        p.life = rng.gen_range(15..35);
        p.color = color;
    }
}
