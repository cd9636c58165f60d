//! Player movement
//!
//! Shared by the host simulation and the guest's local prediction, so both
//! sides move an avatar identically for the same input.

use crate::game::constants::player;
use crate::game::state::{clamp_to_arena, Player, Tick};
use crate::net::protocol::{Key, PlayerInput};
use crate::util::vec2::Vec2;

/// Analog input below this magnitude is treated as released
const AXIS_DEADZONE: f32 = 0.15;

/// Unit movement direction from keys or an analog axis (zero when idle)
pub fn input_direction(input: &PlayerInput) -> Vec2 {
    if let Some(axis) = input.axis {
        if axis.is_finite() && axis.length_sq() > AXIS_DEADZONE * AXIS_DEADZONE {
            return axis.normalize();
        }
    }

    let mut dir = Vec2::ZERO;
    for key in &input.keys {
        match key {
            Key::Up => dir.y -= 1.0,
            Key::Down => dir.y += 1.0,
            Key::Left => dir.x -= 1.0,
            Key::Right => dir.x += 1.0,
        }
    }
    dir.normalize()
}

/// Advance one avatar by one tick
pub fn step_player(p: &mut Player, input: &PlayerInput, arena: Vec2, tick: Tick) {
    p.expire_buffs(tick);
    if !p.alive {
        p.velocity = Vec2::ZERO;
        return;
    }

    if let Some(aim) = input.aim {
        if aim.is_finite() {
            p.aim = aim;
        }
    }

    let target = input_direction(input) * p.effective_speed();
    p.velocity = p.velocity.lerp(target, player::VELOCITY_SMOOTHING);
    if target == Vec2::ZERO && p.velocity.length_sq() < 1e-4 {
        p.velocity = Vec2::ZERO;
    }
    p.position = clamp_to_arena(p.position + p.velocity, p.radius, arena);
}
