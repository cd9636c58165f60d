//! Simulation configuration
//!
//! Values come from environment variables (optionally via `.env`) with
//! defaults from `game::constants`. Invalid values are warned about and
//! replaced by the default; `validate()` catches anything left inconsistent.

use crate::game::constants::{net, sim};
use crate::game::state::WeaponType;

/// Simulation and session configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// RNG seed; identical seeds and inputs replay identically
    pub seed: u64,
    pub tick_rate: u32,
    /// Frame elapsed time is clamped to this many ticks
    pub max_catchup_ticks: u32,
    /// Host snapshot broadcast cadence (wall clock)
    pub snapshot_interval_ms: f64,
    pub arena_width: f32,
    pub arena_height: f32,
    /// Length of the headless co-op run
    pub demo_seconds: u64,
    /// Prometheus endpoint port, 0 disables it
    pub metrics_port: u16,
    pub room_code: String,
    pub meta: MetaBonuses,
}

/// Meta-progression bonuses applied once at match start
#[derive(Debug, Clone, PartialEq)]
pub struct MetaBonuses {
    pub max_health_mult: f32,
    pub speed_bonus: f32,
    pub magnet_bonus: f32,
    pub damage_mult: f32,
    pub starting_weapon: WeaponType,
}

impl Default for MetaBonuses {
    fn default() -> Self {
        Self {
            max_health_mult: 1.0,
            speed_bonus: 0.0,
            magnet_bonus: 0.0,
            damage_mult: 1.0,
            starting_weapon: WeaponType::Blaster,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_CAFE,
            tick_rate: sim::TICK_RATE,
            max_catchup_ticks: sim::MAX_CATCHUP_TICKS,
            snapshot_interval_ms: net::SNAPSHOT_INTERVAL_MS,
            arena_width: sim::ARENA_WIDTH,
            arena_height: sim::ARENA_HEIGHT,
            demo_seconds: 120,
            metrics_port: 0,
            room_code: "LOCAL".to_string(),
            meta: MetaBonuses::default(),
        }
    }
}

/// Read and parse an env var, warning and returning None on bad input
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(seed) = env_parse::<u64>("SIM_SEED") {
            config.seed = seed;
        }

        if let Some(rate) = env_parse::<u32>("TICK_RATE") {
            if rate == sim::TICK_RATE {
                config.tick_rate = rate;
            } else {
                tracing::warn!(
                    "TICK_RATE {} unsupported, tuning is per tick at {} Hz; using default",
                    rate,
                    sim::TICK_RATE
                );
            }
        }

        if let Some(ticks) = env_parse::<u32>("MAX_CATCHUP_TICKS") {
            if ticks > 0 {
                config.max_catchup_ticks = ticks;
            } else {
                tracing::warn!("MAX_CATCHUP_TICKS must be > 0, using default");
            }
        }

        if let Some(ms) = env_parse::<f64>("SNAPSHOT_INTERVAL_MS") {
            if ms >= 10.0 && ms.is_finite() {
                config.snapshot_interval_ms = ms;
            } else {
                tracing::warn!("SNAPSHOT_INTERVAL_MS must be >= 10, using default");
            }
        }

        if let Some(w) = env_parse::<f32>("ARENA_WIDTH") {
            config.arena_width = w;
        }
        if let Some(h) = env_parse::<f32>("ARENA_HEIGHT") {
            config.arena_height = h;
        }

        if let Some(secs) = env_parse::<u64>("DEMO_SECONDS") {
            config.demo_seconds = secs;
        }

        if let Some(port) = env_parse::<u16>("METRICS_PORT") {
            config.metrics_port = port;
        }

        if let Ok(code) = std::env::var("ROOM_CODE") {
            if !code.trim().is_empty() {
                config.room_code = code.trim().to_uppercase();
            }
        }

        if let Some(mult) = env_parse::<f32>("META_HEALTH_MULT") {
            config.meta.max_health_mult = mult;
        }
        if let Some(bonus) = env_parse::<f32>("META_SPEED_BONUS") {
            config.meta.speed_bonus = bonus;
        }
        if let Some(bonus) = env_parse::<f32>("META_MAGNET_BONUS") {
            config.meta.magnet_bonus = bonus;
        }
        if let Some(mult) = env_parse::<f32>("META_DAMAGE_MULT") {
            config.meta.damage_mult = mult;
        }
        if let Some(id) = env_parse::<u8>("META_STARTING_WEAPON") {
            match WeaponType::from_id(id) {
                Some(kind) => config.meta.starting_weapon = kind,
                None => tracing::warn!("Unknown META_STARTING_WEAPON {}, using default", id),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Speeds, cooldowns and tick/ms conversions are all fixed to this rate
        if self.tick_rate != sim::TICK_RATE {
            return Err(ConfigError::Invalid("tick_rate must be 60"));
        }
        if self.max_catchup_ticks == 0 {
            return Err(ConfigError::Invalid("max_catchup_ticks must be at least 1"));
        }
        if !(self.arena_width > 0.0 && self.arena_height > 0.0) {
            return Err(ConfigError::Invalid("arena dimensions must be positive"));
        }
        if self.snapshot_interval_ms < 1000.0 / self.tick_rate as f64 {
            return Err(ConfigError::Invalid(
                "snapshot_interval_ms cannot be shorter than one tick",
            ));
        }
        let m = &self.meta;
        if !(m.max_health_mult > 0.0 && m.damage_mult > 0.0) {
            return Err(ConfigError::Invalid("meta multipliers must be positive"));
        }
        if m.speed_bonus < 0.0 || m.magnet_bonus < 0.0 {
            return Err(ConfigError::Invalid("meta bonuses cannot be negative"));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.snapshot_interval_ms, 50.0);
        assert_eq!(config.metrics_port, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = SimConfig::load_or_default();
        assert!(config.tick_rate > 0);
    }

    #[test]
    fn test_validate_rejects_other_tick_rates() {
        for rate in [0, 30, 59, 61, 120, 240] {
            let mut config = SimConfig::default();
            config.tick_rate = rate;
            assert!(config.validate().is_err(), "rate {}", rate);
        }
        let config = SimConfig::default();
        assert_eq!(config.tick_rate, sim::TICK_RATE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_meta() {
        let mut config = SimConfig::default();
        config.meta.damage_mult = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = SimConfig::default();
        config.snapshot_interval_ms = 1.0;
        assert!(config.validate().is_err());
    }
}
