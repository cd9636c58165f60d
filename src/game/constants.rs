//! Gameplay tuning constants
//!
//! All speeds are pixels per tick, all durations are tick counts at
//! `sim::TICK_RATE`. Conversion to milliseconds happens only at the
//! snapshot boundary.

/// Simulation clock and arena
pub mod sim {
    /// Fixed simulation rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Duration of one tick in milliseconds
    pub const TICK_MS: f64 = 1000.0 / TICK_RATE as f64;
    /// Frame elapsed time is clamped to this many ticks
    pub const MAX_CATCHUP_TICKS: u32 = 5;
    /// Arena size in pixels
    pub const ARENA_WIDTH: f32 = 1600.0;
    pub const ARENA_HEIGHT: f32 = 1000.0;
    /// Enemies spawn this far outside the visible arena
    pub const SPAWN_MARGIN: f32 = 40.0;
    /// Linear projectiles are released once this far outside the arena
    pub const CULL_MARGIN: f32 = 120.0;
}

/// Broad-phase grid
pub mod grid {
    /// Cell edge; covers boss radius + player radius so a 3x3 query is exhaustive
    pub const CELL_SIZE: f32 = 80.0;
    /// Entities beyond this count in one cell are dropped from the index
    pub const CELL_CAPACITY: usize = 32;
    /// Extra border around the arena covered by real cells
    pub const MARGIN: f32 = 200.0;
}

/// Player avatar
pub mod player {
    pub const RADIUS: f32 = 15.0;
    pub const MAX_HEALTH: f32 = 100.0;
    pub const BASE_SPEED: f32 = 4.0;
    /// Hard cap on effective speed after bonuses and buffs
    pub const SPEED_CAP: f32 = 8.0;
    /// Exponential smoothing factor toward the target velocity
    pub const VELOCITY_SMOOTHING: f32 = 0.25;
    /// Invulnerability window after a hit
    pub const INVULN_TICKS: u64 = 60;
    pub const BASE_MAGNET: f32 = 80.0;
    pub const ARMOR: f32 = 1.0;
    /// Experience curve: `XP_BASE * XP_GROWTH^(level-1)`
    pub const XP_BASE: f32 = 10.0;
    pub const XP_GROWTH: f32 = 1.3;
    /// Partner spawn offset from the arena center
    pub const PARTNER_OFFSET: f32 = 40.0;
}

/// Weapon stats at level 1
pub mod weapon {
    pub const MAX_LEVEL: u8 = 5;

    pub const BLASTER_COOLDOWN: u32 = 20;
    pub const BLASTER_DAMAGE: f32 = 10.0;
    pub const BLASTER_SPEED: f32 = 10.0;
    pub const BLASTER_RADIUS: f32 = 5.0;
    /// Blaster gains one extra projectile at each of these levels
    pub const BLASTER_COUNT_LEVELS: [u8; 2] = [3, 5];
    pub const BLASTER_SPACING: f32 = 10.0;

    pub const SPREAD_COOLDOWN: u32 = 40;
    pub const SPREAD_DAMAGE: f32 = 7.0;
    pub const SPREAD_SPEED: f32 = 9.0;
    pub const SPREAD_RADIUS: f32 = 4.0;
    pub const SPREAD_PELLETS: u8 = 3;
    /// Total fan angle in radians
    pub const SPREAD_ARC: f32 = 0.5;

    pub const BEAM_COOLDOWN: u32 = 60;
    pub const BEAM_DAMAGE: f32 = 15.0;
    pub const BEAM_SPEED: f32 = 16.0;
    pub const BEAM_RADIUS: f32 = 4.0;
    pub const BEAM_PIERCE: u8 = 3;

    pub const ORBIT_COOLDOWN: u32 = 180;
    pub const ORBIT_DAMAGE: f32 = 8.0;
    pub const ORBIT_RADIUS: f32 = 6.0;
    pub const ORBIT_COUNT: u8 = 2;
    pub const ORBIT_DISTANCE: f32 = 60.0;
    pub const ORBIT_ANGULAR_SPEED: f32 = 0.08;
    pub const ORBIT_LIFETIME: u32 = 170;
    pub const ORBIT_PIERCE: u8 = 12;

    pub const LAUNCHER_COOLDOWN: u32 = 90;
    pub const LAUNCHER_DAMAGE: f32 = 30.0;
    pub const LAUNCHER_SPEED: f32 = 5.0;
    pub const LAUNCHER_RADIUS: f32 = 7.0;
    pub const LAUNCHER_EXPLOSION: f32 = 70.0;
    pub const LAUNCHER_EXPLOSION_STEP: f32 = 15.0;

    /// Per-level multipliers applied by weapon upgrades
    pub const DAMAGE_GROWTH: f32 = 1.2;
    pub const COOLDOWN_GROWTH: f32 = 0.9;
    /// Splash damage fraction at the blast center (falls off to zero at the edge)
    pub const SPLASH_FACTOR: f32 = 0.6;
}

/// Enemy base stats
pub mod enemy {
    /// Largest non-boss radius (elite tank); used to pad radius queries
    pub const MAX_RADIUS: f32 = 36.0;
    /// Health scaling per wave
    pub const HEALTH_PER_WAVE: f32 = 0.08;
    pub const ELITE_HEALTH: f32 = 2.5;
    pub const ELITE_RADIUS: f32 = 1.3;
    pub const ELITE_POINTS: u32 = 3;
    /// Zigzag lateral oscillation
    pub const ZIGZAG_FREQUENCY: f32 = 0.12;
    pub const ZIGZAG_AMPLITUDE: f32 = 2.2;
    /// Ghost alpha pulse
    pub const GHOST_PULSE: f32 = 0.06;
    /// Tank velocity damping toward the desired velocity
    pub const TANK_DAMPING: f32 = 0.08;
    /// Shooter keeps this distance and strafes
    pub const SHOOTER_RANGE: f32 = 260.0;
    pub const SHOOTER_COOLDOWN: u64 = 90;
    pub const SHOOTER_BULLET_SPEED: f32 = 4.0;
    pub const SHOOTER_BULLET_DAMAGE: f32 = 8.0;
    pub const ENEMY_BULLET_RADIUS: f32 = 5.0;
    /// Splitter spawns this many children on death
    pub const SPLIT_CHILDREN: usize = 2;
    /// Magnet enemies pull experience orbs within this range
    pub const MAGNET_RANGE: f32 = 150.0;
    pub const MAGNET_PULL: f32 = 1.5;
    /// Formation wings hold heading until a player is this close
    pub const FORMATION_BREAK_DISTANCE: f32 = 220.0;
    /// Separation push strength (fraction of overlap per tick)
    pub const SEPARATION_STRENGTH: f32 = 0.5;
}

/// Boss tuning
pub mod boss {
    pub const RADIUS: f32 = 48.0;
    pub const BASE_HEALTH: f32 = 1500.0;
    pub const SPEED: f32 = 1.2;
    pub const CONTACT_DAMAGE: f32 = 25.0;
    pub const POINTS: u32 = 500;
    /// Entering phase stops at this y coordinate
    pub const ENTER_Y: f32 = 140.0;
    pub const ENTER_SPEED: f32 = 2.0;
    pub const ENTER_MAX_TICKS: u64 = 240;
    /// Phase durations
    pub const CHASE_TICKS: u64 = 180;
    pub const RING_TICKS: u64 = 150;
    pub const SPIRAL_TICKS: u64 = 240;
    pub const DASH_TICKS: u64 = 90;
    pub const SUMMON_TICKS: u64 = 60;
    pub const SHIELD_TICKS: u64 = 240;
    /// Attack unlock levels
    pub const SPIRAL_LEVEL: u32 = 2;
    pub const DASH_LEVEL: u32 = 3;
    pub const SHIELD_LEVEL: u32 = 4;
    /// Health fraction under which rage starts
    pub const RAGE_THRESHOLD: f32 = 0.25;
    pub const RAGE_SPEED: f32 = 1.5;
    pub const DASH_MULTIPLIER: f32 = 4.0;
    /// Ring volley cadence and size
    pub const RING_INTERVAL: u64 = 40;
    pub const RING_BULLETS: u32 = 8;
    pub const RING_BULLETS_PER_LEVEL: u32 = 4;
    pub const SPIRAL_INTERVAL: u64 = 6;
    pub const SPIRAL_STEP: f32 = 0.3;
    pub const RAGE_INTERVAL: u64 = 50;
    pub const BULLET_SPEED: f32 = 3.5;
    pub const BULLET_DAMAGE: f32 = 12.0;
    /// Minions spawned once per summon phase
    pub const SUMMON_BASE: u32 = 4;
    pub const SUMMON_RING: f32 = 90.0;
    /// Shield pool per boss level
    pub const SHIELD_PER_LEVEL: f32 = 120.0;
    /// Fraction of incoming damage absorbed by an active shield
    pub const SHIELD_ABSORB: f32 = 0.9;
}

/// Wave director
pub mod wave {
    pub const BASE_INTERVAL: f32 = 90.0;
    pub const INTERVAL_SCALE: f32 = 0.15;
    pub const SURGE_INTERVAL_FACTOR: f32 = 0.5;
    pub const SURGE_SPEED_FACTOR: f32 = 1.3;
    pub const MIN_INTERVAL: u64 = 8;
    /// Max enemies in one individual spawn batch
    pub const BATCH_CAP: u32 = 6;
    pub const FIRST_QUOTA: u32 = 15;
    pub const QUOTA_GROWTH: f32 = 1.25;
    pub const BOSS_EVERY: u32 = 5;
    /// Formation chance per spawn tick, per wave, from `FORMATION_MIN_WAVE`
    pub const FORMATION_MIN_WAVE: u32 = 3;
    pub const FORMATION_CHANCE_PER_WAVE: f64 = 0.02;
    pub const FORMATION_CHANCE_CAP: f64 = 0.25;
    pub const FORMATION_SIZE: usize = 5;
    pub const ELITE_MIN_WAVE: u32 = 8;
    pub const ELITE_CHANCE: f64 = 0.05;
    /// Wave events on every `EVENT_EVERY`th wave past `EVENT_MIN_WAVE`
    pub const EVENT_EVERY: u32 = 4;
    pub const EVENT_MIN_WAVE: u32 = 4;
    pub const EVENT_CHANCE: f64 = 0.5;
    pub const EVENT_TICKS: u64 = 1200;
    /// Magnet range multiplier during a magnet storm
    pub const STORM_MAGNET_FACTOR: f32 = 2.5;
}

/// Pickups and experience
pub mod pickup {
    pub const ORB_RADIUS: f32 = 6.0;
    pub const ORB_SPEED: f32 = 6.0;
    pub const ORB_MAX_AGE: u64 = 1800;
    pub const POWERUP_RADIUS: f32 = 12.0;
    pub const POWERUP_MAX_AGE: u64 = 600;
    pub const POWERUP_CHANCE: f64 = 0.03;
    pub const ELITE_POWERUP_CHANCE: f64 = 0.25;
    pub const HEAL_AMOUNT: f32 = 30.0;
    pub const BUFF_TICKS: u64 = 300;
    pub const BUFF_MULTIPLIER: f32 = 1.5;
}

/// Scoring
pub mod score {
    pub const MULTIPLIER_STEP: f32 = 0.1;
    pub const MULTIPLIER_CAP: f32 = 5.0;
    pub const MULTIPLIER_DECAY: f32 = 0.002;
    /// Kills closer together than this extend the streak
    pub const STREAK_WINDOW: u64 = 90;
    /// Graze band beyond the collision radius for near misses
    pub const NEAR_MISS_BAND: f32 = 12.0;
    pub const NEAR_MISS_BONUS: u64 = 5;
    pub const NEAR_MISS_COOLDOWN: u64 = 30;
}

/// Hit-stop slow motion
pub mod hitstop {
    pub const BOSS_KILL: (f64, f64) = (0.2, 400.0);
    pub const ELITE_KILL: (f64, f64) = (0.5, 120.0);
    pub const DAMAGE_TAKEN: (f64, f64) = (0.6, 90.0);
    pub const LEVEL_UP: (f64, f64) = (0.4, 200.0);
}

/// Upgrade offers
pub mod upgrade {
    pub const OFFER_COUNT: usize = 3;
    pub const HEALTH_BONUS: f32 = 20.0;
    pub const SPEED_BONUS: f32 = 0.4;
    pub const MAGNET_BONUS: f32 = 30.0;
}

/// Replication
pub mod net {
    /// Wire schema version (`__v`)
    pub const SNAPSHOT_VERSION: u32 = 1;
    /// Host broadcast cadence in wall-clock milliseconds
    pub const SNAPSHOT_INTERVAL_MS: f64 = 50.0;
    /// Guest avatar reconciliation
    pub const SOFT_ERROR: f32 = 24.0;
    pub const SOFT_GAIN: f32 = 0.15;
    pub const FIRM_GAIN: f32 = 0.35;
    pub const SNAP_ERROR: f32 = 240.0;
    pub const MAX_CORRECTION: f32 = 6.0;
    /// Remote entity interpolation gain per frame
    pub const INTERPOLATION_GAIN: f32 = 0.25;
    /// Dead reckoning is capped at this many ticks of extrapolation
    pub const MAX_EXTRAPOLATION_TICKS: f32 = 6.0;
    /// Predicted projectile matching
    pub const PREDICTION_TOLERANCE: f32 = 28.0;
    pub const PREDICTION_MAX_AGE: u32 = 45;
}

/// Convert a tick count to integer milliseconds
#[inline]
pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * 1000 / sim::TICK_RATE as u64
}

/// Convert integer milliseconds back to the nearest tick
#[inline]
pub fn ms_to_ticks(ms: u64) -> u64 {
    (ms * sim::TICK_RATE as u64 + 500) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_ms_conversion() {
        assert_eq!(ticks_to_ms(60), 1000);
        assert_eq!(ticks_to_ms(3), 50);
        for t in [0u64, 1, 7, 59, 60, 1234, 99_999] {
            assert_eq!(ms_to_ticks(ticks_to_ms(t)), t);
        }
    }

    #[test]
    fn test_grid_cell_covers_largest_contact() {
        assert!(grid::CELL_SIZE >= boss::RADIUS + player::RADIUS);
        assert!(grid::CELL_SIZE >= enemy::MAX_RADIUS + player::RADIUS);
    }
}
