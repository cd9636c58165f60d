//! Game state definitions and structures
//!
//! Contains every simulated entity (players, enemies, pooled projectiles and
//! pickups) and the match-level bookkeeping the wave director and scoring
//! systems mutate.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::MetaBonuses;
use crate::game::constants::{enemy, pickup, player, sim, weapon};
use crate::game::pool::Pool;
use crate::game::systems::upgrade::UpgradeRound;
use crate::util::vec2::Vec2;

/// Monotonic simulation tick
pub type Tick = u64;

/// Stable enemy identifier (unique per match)
pub type EnemyId = u32;

/// Player slot: 0 is the host avatar, 1 the co-op partner
pub type PlayerSlot = u8;

pub const HOST_SLOT: PlayerSlot = 0;
pub const PARTNER_SLOT: PlayerSlot = 1;

// ============================================================================
// Weapons & buffs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    /// Single forward shot
    Blaster,
    /// Fan of pellets
    Spread,
    /// Fast multi-pierce bolt
    Beam,
    /// Ring of projectiles circling the owner
    Orbit,
    /// Slow shell with splash damage
    Launcher,
}

impl WeaponType {
    pub const ALL: [WeaponType; 5] = [
        WeaponType::Blaster,
        WeaponType::Spread,
        WeaponType::Beam,
        WeaponType::Orbit,
        WeaponType::Launcher,
    ];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

/// An owned weapon instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub kind: WeaponType,
    pub level: u8,
    /// Earliest tick this weapon may fire again
    pub ready_at: Tick,
    pub cooldown: u32,
    pub damage: f32,
    /// Pixels per tick, or radians per tick for orbiters
    pub speed: f32,
    pub count: u8,
    /// Number of enemies one projectile may hit
    pub pierce: u8,
    pub explosion_radius: f32,
}

impl Weapon {
    pub fn new(kind: WeaponType) -> Self {
        let (cooldown, damage, speed, count, pierce, explosion_radius) = match kind {
            WeaponType::Blaster => (
                weapon::BLASTER_COOLDOWN,
                weapon::BLASTER_DAMAGE,
                weapon::BLASTER_SPEED,
                1,
                1,
                0.0,
            ),
            WeaponType::Spread => (
                weapon::SPREAD_COOLDOWN,
                weapon::SPREAD_DAMAGE,
                weapon::SPREAD_SPEED,
                weapon::SPREAD_PELLETS,
                1,
                0.0,
            ),
            WeaponType::Beam => (
                weapon::BEAM_COOLDOWN,
                weapon::BEAM_DAMAGE,
                weapon::BEAM_SPEED,
                1,
                weapon::BEAM_PIERCE,
                0.0,
            ),
            WeaponType::Orbit => (
                weapon::ORBIT_COOLDOWN,
                weapon::ORBIT_DAMAGE,
                weapon::ORBIT_ANGULAR_SPEED,
                weapon::ORBIT_COUNT,
                weapon::ORBIT_PIERCE,
                0.0,
            ),
            WeaponType::Launcher => (
                weapon::LAUNCHER_COOLDOWN,
                weapon::LAUNCHER_DAMAGE,
                weapon::LAUNCHER_SPEED,
                1,
                1,
                weapon::LAUNCHER_EXPLOSION,
            ),
        };
        Self {
            kind,
            level: 1,
            ready_at: 0,
            cooldown,
            damage,
            speed,
            count,
            pierce,
            explosion_radius,
        }
    }

    #[inline]
    pub fn is_max_level(&self) -> bool {
        self.level >= weapon::MAX_LEVEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffKind {
    Speed,
    Damage,
}

/// Timed multiplier on a player stat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    pub kind: BuffKind,
    pub expires_at: Tick,
    pub multiplier: f32,
}

// ============================================================================
// Player
// ============================================================================

/// Player avatar state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub slot: PlayerSlot,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub base_speed: f32,
    /// Permanent additive bonus from upgrades and meta progression
    pub speed_bonus: f32,
    pub magnet_bonus: f32,
    pub damage_mult: f32,
    pub armor: f32,
    pub invulnerable_until: Tick,
    pub weapons: Vec<Weapon>,
    pub level: u32,
    pub experience: f32,
    pub experience_to_next: f32,
    /// Level-ups earned but not yet resolved by an upgrade round
    pub pending_level_ups: u32,
    pub kills: u32,
    pub damage_taken: f32,
    pub buffs: Vec<Buff>,
    /// Last aim point in arena coordinates
    pub aim: Vec2,
    /// Earliest tick another near-miss bonus may be awarded
    pub near_miss_ready_at: Tick,
}

impl Player {
    pub fn new(slot: PlayerSlot, position: Vec2, meta: &MetaBonuses) -> Self {
        let max_health = player::MAX_HEALTH * meta.max_health_mult;
        Self {
            slot,
            position,
            velocity: Vec2::ZERO,
            radius: player::RADIUS,
            health: max_health,
            max_health,
            alive: true,
            base_speed: player::BASE_SPEED,
            speed_bonus: meta.speed_bonus,
            magnet_bonus: meta.magnet_bonus,
            damage_mult: meta.damage_mult,
            armor: player::ARMOR,
            invulnerable_until: 0,
            weapons: vec![Weapon::new(meta.starting_weapon)],
            level: 1,
            experience: 0.0,
            experience_to_next: player::XP_BASE,
            pending_level_ups: 0,
            kills: 0,
            damage_taken: 0.0,
            buffs: Vec::new(),
            aim: position + Vec2::new(0.0, -1.0),
            near_miss_ready_at: 0,
        }
    }

    /// Strongest active multiplier of `kind`, or 1.0
    pub fn buff_multiplier(&self, kind: BuffKind) -> f32 {
        self.buffs
            .iter()
            .filter(|b| b.kind == kind)
            .map(|b| b.multiplier)
            .fold(1.0, f32::max)
    }

    /// `(base + bonus) * speed buff`, hard-capped
    pub fn effective_speed(&self) -> f32 {
        ((self.base_speed + self.speed_bonus) * self.buff_multiplier(BuffKind::Speed))
            .min(player::SPEED_CAP)
    }

    pub fn damage_multiplier(&self) -> f32 {
        self.damage_mult * self.buff_multiplier(BuffKind::Damage)
    }

    pub fn magnet_range(&self, storm: bool) -> f32 {
        let range = player::BASE_MAGNET + self.magnet_bonus;
        if storm {
            range * crate::game::constants::wave::STORM_MAGNET_FACTOR
        } else {
            range
        }
    }

    #[inline]
    pub fn is_invulnerable(&self, tick: Tick) -> bool {
        tick < self.invulnerable_until
    }

    /// Add or refresh a buff of the same kind
    pub fn add_buff(&mut self, kind: BuffKind, expires_at: Tick, multiplier: f32) {
        if let Some(existing) = self.buffs.iter_mut().find(|b| b.kind == kind) {
            existing.expires_at = existing.expires_at.max(expires_at);
            existing.multiplier = existing.multiplier.max(multiplier);
        } else {
            self.buffs.push(Buff {
                kind,
                expires_at,
                multiplier,
            });
        }
    }

    pub fn expire_buffs(&mut self, tick: Tick) {
        self.buffs.retain(|b| b.expires_at > tick);
    }

    pub fn heal(&mut self, amount: f32) {
        self.health = (self.health + amount).min(self.max_health);
    }

    /// Add experience; returns the number of levels gained
    pub fn gain_experience(&mut self, amount: f32) -> u32 {
        self.experience += amount;
        let mut gained = 0;
        while self.experience >= self.experience_to_next {
            self.experience -= self.experience_to_next;
            self.level += 1;
            self.experience_to_next = player::XP_BASE * player::XP_GROWTH.powi(self.level as i32 - 1);
            gained += 1;
        }
        self.pending_level_ups += gained;
        gained
    }

    pub fn weapon(&self, kind: WeaponType) -> Option<&Weapon> {
        self.weapons.iter().find(|w| w.kind == kind)
    }

    pub fn weapon_mut(&mut self, kind: WeaponType) -> Option<&mut Weapon> {
        self.weapons.iter_mut().find(|w| w.kind == kind)
    }
}

// ============================================================================
// Enemies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    Basic,
    Fast,
    Tank,
    Zigzag,
    Ghost,
    Shooter,
    Splitter,
    Magnet,
    Boss,
}

/// Base stats for one enemy kind at wave 1
#[derive(Debug, Clone, Copy)]
pub struct EnemyStats {
    pub radius: f32,
    pub health: f32,
    pub speed: f32,
    pub damage: f32,
    pub points: u32,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 9] = [
        EnemyKind::Basic,
        EnemyKind::Fast,
        EnemyKind::Tank,
        EnemyKind::Zigzag,
        EnemyKind::Ghost,
        EnemyKind::Shooter,
        EnemyKind::Splitter,
        EnemyKind::Magnet,
        EnemyKind::Boss,
    ];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn stats(self) -> EnemyStats {
        use crate::game::constants::boss;
        let (radius, health, speed, damage, points) = match self {
            EnemyKind::Basic => (12.0, 20.0, 1.6, 10.0, 10),
            EnemyKind::Fast => (10.0, 12.0, 2.8, 8.0, 15),
            EnemyKind::Tank => (24.0, 90.0, 0.9, 20.0, 40),
            EnemyKind::Zigzag => (11.0, 18.0, 2.0, 10.0, 20),
            EnemyKind::Ghost => (13.0, 25.0, 1.8, 12.0, 25),
            EnemyKind::Shooter => (14.0, 30.0, 1.4, 10.0, 30),
            EnemyKind::Splitter => (18.0, 40.0, 1.3, 12.0, 30),
            EnemyKind::Magnet => (16.0, 45.0, 1.1, 10.0, 35),
            EnemyKind::Boss => (
                boss::RADIUS,
                boss::BASE_HEALTH,
                boss::SPEED,
                boss::CONTACT_DAMAGE,
                boss::POINTS,
            ),
        };
        EnemyStats {
            radius,
            health,
            speed,
            damage,
            points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormationRole {
    Leader,
    Wing,
}

/// Membership in a spawned formation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormationSlot {
    pub id: u32,
    pub role: FormationRole,
    /// Shared travel direction held until the formation breaks
    pub heading: Vec2,
    pub broken: bool,
}

/// Boss behaviour phase with phase-local data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BossPhase {
    Entering,
    Chasing,
    RingShot { next_volley: Tick },
    SpiralShot { angle: f32, next_shot: Tick },
    Dash { heading: Vec2 },
    Summon { spawned: bool },
    Shield { hp: f32 },
    Rage { angle: f32, next_volley: Tick },
}

impl BossPhase {
    /// Compact wire tag
    pub fn tag(&self) -> u8 {
        match self {
            BossPhase::Entering => 0,
            BossPhase::Chasing => 1,
            BossPhase::RingShot { .. } => 2,
            BossPhase::SpiralShot { .. } => 3,
            BossPhase::Dash { .. } => 4,
            BossPhase::Summon { .. } => 5,
            BossPhase::Shield { .. } => 6,
            BossPhase::Rage { .. } => 7,
        }
    }

    /// Phase for a wire tag, with empty phase-local data
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => BossPhase::Entering,
            1 => BossPhase::Chasing,
            2 => BossPhase::RingShot { next_volley: 0 },
            3 => BossPhase::SpiralShot {
                angle: 0.0,
                next_shot: 0,
            },
            4 => BossPhase::Dash { heading: Vec2::ZERO },
            5 => BossPhase::Summon { spawned: true },
            6 => BossPhase::Shield { hp: 0.0 },
            7 => BossPhase::Rage {
                angle: 0.0,
                next_volley: 0,
            },
            _ => return None,
        })
    }
}

/// Boss controller state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BossBrain {
    pub level: u32,
    pub phase: BossPhase,
    pub phase_started: Tick,
    /// Position in the chase/attack/chase/summon cycle
    pub cycle_step: u32,
    /// Rotates through the unlocked attacks
    pub attack_index: u32,
}

/// Per-kind enemy data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnemyExt {
    Plain,
    Zigzag { phase: f32 },
    Ghost { alpha: f32 },
    Shooter { next_shot: Tick },
    /// `child` splitters do not split again
    Splitter { child: bool },
    Magnet,
    Boss(BossBrain),
}

/// A hostile entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    pub damage: f32,
    pub points: u32,
    pub spawned_at: Tick,
    pub elite: bool,
    pub formation: Option<FormationSlot>,
    pub ext: EnemyExt,
}

/// Result of applying damage to an enemy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    /// Health actually removed
    pub dealt: f32,
    /// True only for the hit that took health to zero or below
    pub killed: bool,
}

impl Enemy {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    #[inline]
    pub fn is_boss(&self) -> bool {
        matches!(self.ext, EnemyExt::Boss(_))
    }

    pub fn boss(&self) -> Option<&BossBrain> {
        match &self.ext {
            EnemyExt::Boss(brain) => Some(brain),
            _ => None,
        }
    }

    #[inline]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health > 0.0 {
            (self.health / self.max_health).max(0.0)
        } else {
            0.0
        }
    }

    /// Apply damage, routing through an active boss shield
    ///
    /// Dead enemies absorb nothing, so a kill is reported exactly once.
    pub fn take_damage(&mut self, amount: f32) -> DamageOutcome {
        if !self.is_alive() || amount <= 0.0 {
            return DamageOutcome {
                dealt: 0.0,
                killed: false,
            };
        }
        let to_health = match &mut self.ext {
            EnemyExt::Boss(brain) => brain.absorb(amount),
            _ => amount,
        };
        self.health -= to_health;
        DamageOutcome {
            dealt: to_health,
            killed: self.health <= 0.0,
        }
    }

    /// Cosmetic opacity (ghosts pulse, everything else is opaque)
    pub fn alpha(&self) -> f32 {
        match self.ext {
            EnemyExt::Ghost { alpha } => alpha,
            _ => 1.0,
        }
    }
}

// ============================================================================
// Pooled entities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    Player(PlayerSlot),
    Enemy,
}

impl Default for Owner {
    fn default() -> Self {
        Owner::Enemy
    }
}

/// How a projectile moves each tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Motion {
    Linear { velocity: Vec2 },
    /// Circles the owner at `radius`
    Orbit {
        angle: f32,
        radius: f32,
        angular_speed: f32,
    },
}

impl Default for Motion {
    fn default() -> Self {
        Motion::Linear {
            velocity: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projectile {
    pub id: u32,
    pub position: Vec2,
    pub motion: Motion,
    pub radius: f32,
    pub damage: f32,
    pub owner: Owner,
    pub weapon: Option<WeaponType>,
    /// Hits left before the projectile is consumed
    pub pierce: u8,
    pub hits: SmallVec<[EnemyId; 8]>,
    /// Zero for non-splash projectiles
    pub explosion_radius: f32,
    /// Remaining ticks, if limited
    pub lifetime: Option<u32>,
}

impl Projectile {
    /// Velocity for linear shots; tangential velocity for orbiters
    pub fn velocity(&self) -> Vec2 {
        match self.motion {
            Motion::Linear { velocity } => velocity,
            Motion::Orbit {
                angle,
                radius,
                angular_speed,
            } => Vec2::from_angle(angle).perp() * (radius * angular_speed),
        }
    }

    #[inline]
    pub fn is_hostile(&self) -> bool {
        self.owner == Owner::Enemy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    #[default]
    Heal,
    Speed,
    Damage,
    /// Pulls every orb on the field to the collector
    Vacuum,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::Heal,
        PowerUpKind::Speed,
        PowerUpKind::Damage,
        PowerUpKind::Vacuum,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub position: Vec2,
    pub spawned_at: Tick,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperienceOrb {
    pub id: u32,
    pub position: Vec2,
    pub value: f32,
    pub spawned_at: Tick,
    /// Forced homing toward this slot (vacuum pickup)
    pub vacuum_to: Option<PlayerSlot>,
}

/// Cosmetic particle; only its creation matters to the simulation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub life: u16,
    pub color: u8,
}

// ============================================================================
// Match bookkeeping
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WaveState {
    pub number: u32,
    pub kills_this_wave: u32,
    pub required_kills: u32,
    pub next_spawn_at: Tick,
    pub next_formation_id: u32,
}

impl Default for WaveState {
    fn default() -> Self {
        Self {
            number: 1,
            kills_this_wave: 0,
            required_kills: crate::game::constants::wave::FIRST_QUOTA,
            next_spawn_at: 0,
            next_formation_id: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreState {
    pub score: u64,
    pub multiplier: f32,
    pub streak: u32,
    pub max_streak: u32,
    pub last_kill_at: Option<Tick>,
    pub total_kills: u32,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self {
            score: 0,
            multiplier: 1.0,
            streak: 0,
            max_streak: 0,
            last_kill_at: None,
            total_kills: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveEventKind {
    /// Faster spawns and movement
    Surge,
    /// Amplified pickup range
    MagnetStorm,
}

impl WaveEventKind {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(WaveEventKind::Surge),
            1 => Some(WaveEventKind::MagnetStorm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveEvent {
    pub kind: WaveEventKind,
    pub ends_at: Tick,
}

/// Nearest player to `from`, preferring living players
pub fn target_among(players: &[Player], from: Vec2) -> Option<&Player> {
    players.iter().min_by(|a, b| {
        b.alive.cmp(&a.alive).then_with(|| {
            a.position
                .distance_sq_to(from)
                .total_cmp(&b.position.distance_sq_to(from))
        })
    })
}

/// Clamp a circle of `radius` inside an arena of size `arena`
pub fn clamp_to_arena(position: Vec2, radius: f32, arena: Vec2) -> Vec2 {
    Vec2::new(
        position.x.clamp(radius, (arena.x - radius).max(radius)),
        position.y.clamp(radius, (arena.y - radius).max(radius)),
    )
}

/// Complete simulation state of one match
#[derive(Debug, Clone)]
pub struct GameState {
    pub arena: Vec2,
    pub players: Vec<Player>,
    pub enemies: Vec<Enemy>,
    pub projectiles: Pool<Projectile>,
    pub orbs: Pool<ExperienceOrb>,
    pub powerups: Pool<PowerUp>,
    pub particles: Pool<Particle>,
    pub wave: WaveState,
    pub score: ScoreState,
    pub wave_event: Option<WaveEvent>,
    pub upgrade_round: Option<UpgradeRound>,
    pub run_ticks: Tick,
    pub bosses_defeated: u32,
    pub paused: bool,
    pub game_over: bool,
}

impl GameState {
    /// Fresh match; `coop` adds the partner avatar in slot 1
    pub fn new(arena: Vec2, meta: &MetaBonuses, coop: bool) -> Self {
        let center = arena * 0.5;
        let mut players = Vec::with_capacity(2);
        if coop {
            players.push(Player::new(
                HOST_SLOT,
                center - Vec2::new(player::PARTNER_OFFSET, 0.0),
                meta,
            ));
            players.push(Player::new(
                PARTNER_SLOT,
                center + Vec2::new(player::PARTNER_OFFSET, 0.0),
                meta,
            ));
        } else {
            players.push(Player::new(HOST_SLOT, center, meta));
        }

        Self {
            arena,
            players,
            enemies: Vec::with_capacity(256),
            projectiles: Pool::with_capacity(256),
            orbs: Pool::with_capacity(128),
            powerups: Pool::with_capacity(8),
            particles: Pool::with_capacity(256),
            wave: WaveState::default(),
            score: ScoreState::default(),
            wave_event: None,
            upgrade_round: None,
            run_ticks: 0,
            bosses_defeated: 0,
            paused: false,
            game_over: false,
        }
    }

    /// Default-sized arena
    pub fn with_defaults(coop: bool) -> Self {
        Self::new(
            Vec2::new(sim::ARENA_WIDTH, sim::ARENA_HEIGHT),
            &MetaBonuses::default(),
            coop,
        )
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&Player> {
        self.players.iter().find(|p| p.slot == slot)
    }

    pub fn player_mut(&mut self, slot: PlayerSlot) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.slot == slot)
    }

    pub fn any_player_alive(&self) -> bool {
        self.players.iter().any(|p| p.alive)
    }

    /// Steering target for an entity at `from`
    ///
    /// Living players are always preferred; among them the nearest wins.
    pub fn target_player(&self, from: Vec2) -> Option<&Player> {
        target_among(&self.players, from)
    }

    pub fn enemy_by_id(&self, id: EnemyId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }

    pub fn boss_alive(&self) -> bool {
        self.enemies.iter().any(|e| e.is_boss() && e.is_alive())
    }

    pub fn event_active(&self, kind: WaveEventKind) -> bool {
        self.wave_event.map(|e| e.kind == kind).unwrap_or(false)
    }

    /// Is `position` inside the arena expanded by `margin`
    pub fn in_bounds(&self, position: Vec2, margin: f32) -> bool {
        position.x >= -margin
            && position.y >= -margin
            && position.x <= self.arena.x + margin
            && position.y <= self.arena.y + margin
    }

    /// Health multiplier applied to enemies spawned this wave
    pub fn difficulty(&self) -> f32 {
        1.0 + self.wave.number.saturating_sub(1) as f32 * enemy::HEALTH_PER_WAVE
    }

    /// Experience dropped for an enemy worth `points`
    pub fn orb_value(points: u32) -> f32 {
        1.0 + (points / 10) as f32
    }

    /// Age check shared by pooled pickups
    pub fn expired(spawned_at: Tick, now: Tick, max_age: Tick) -> bool {
        now.saturating_sub(spawned_at) >= max_age
    }

    pub fn powerup_expired(&self, powerup: &PowerUp, now: Tick) -> bool {
        Self::expired(powerup.spawned_at, now, pickup::POWERUP_MAX_AGE)
    }
}
