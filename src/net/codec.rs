//! Snapshot replication codec
//!
//! [`Snapshot`] is the typed, render-facing projection of a [`GameState`]
//! the host captures. [`WireSnapshot`] is its transport form: versioned
//! under `__v`, floats rounded to fixed precision (2 decimals for positions
//! and velocities, 1 for health, radius and experience), timers carried as
//! remaining milliseconds, and entity arrays flattened into positional
//! tuples with no field names.

use serde::{Deserialize, Serialize};

use crate::game::constants::{ms_to_ticks, net, ticks_to_ms};
use crate::game::state::{
    BuffKind, EnemyId, EnemyKind, GameState, Owner, Player, PlayerSlot, PowerUpKind, Tick,
    WaveEventKind, WeaponType,
};
use crate::util::vec2::Vec2;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("unknown {what} id {id}")]
    UnknownId { what: &'static str, id: u8 },
}

// ============================================================================
// Typed snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BuffSnapshot {
    pub kind: BuffKind,
    pub remaining_ticks: Tick,
    pub multiplier: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub slot: PlayerSlot,
    pub position: Vec2,
    pub velocity: Vec2,
    pub aim: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub level: u32,
    pub experience: f32,
    pub experience_to_next: f32,
    pub invulnerable_ticks: Tick,
    pub weapons: Vec<(WeaponType, u8)>,
    pub buffs: Vec<BuffSnapshot>,
    pub kills: u32,
}

impl PlayerSnapshot {
    pub fn from_player(p: &Player, tick: Tick) -> Self {
        Self {
            slot: p.slot,
            position: p.position,
            velocity: p.velocity,
            aim: p.aim,
            health: p.health,
            max_health: p.max_health,
            alive: p.alive,
            level: p.level,
            experience: p.experience,
            experience_to_next: p.experience_to_next,
            invulnerable_ticks: p.invulnerable_until.saturating_sub(tick),
            weapons: p.weapons.iter().map(|w| (w.kind, w.level)).collect(),
            buffs: p
                .buffs
                .iter()
                .map(|b| BuffSnapshot {
                    kind: b.kind,
                    remaining_ticks: b.expires_at.saturating_sub(tick),
                    multiplier: b.multiplier,
                })
                .collect(),
            kills: p.kills,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemySnapshot {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub radius: f32,
    pub elite: bool,
    pub formation: Option<u32>,
    /// Boss phase tag
    pub phase: Option<u8>,
    pub alpha: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSnapshot {
    pub id: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    /// None for enemy fire
    pub owner: Option<PlayerSlot>,
    pub weapon: Option<WeaponType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbSnapshot {
    pub id: u32,
    pub position: Vec2,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerUpSnapshot {
    pub id: u32,
    pub kind: PowerUpKind,
    pub position: Vec2,
}

/// Authoritative state at one host tick
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tick: Tick,
    pub wave: u32,
    pub kills_this_wave: u32,
    pub required_kills: u32,
    pub score: u64,
    pub multiplier: f32,
    pub streak: u32,
    /// Active wave event and ticks until it ends
    pub event: Option<(WaveEventKind, Tick)>,
    pub paused: bool,
    pub game_over: bool,
    pub p1: PlayerSnapshot,
    /// Absent in solo runs
    pub p2: Option<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub orbs: Vec<OrbSnapshot>,
    pub powerups: Vec<PowerUpSnapshot>,
}

impl Snapshot {
    /// Project `state` at `tick`
    ///
    /// Returns None only if the state has no players at all.
    pub fn capture(state: &GameState, tick: Tick) -> Option<Self> {
        let mut players = state.players.iter().map(|p| PlayerSnapshot::from_player(p, tick));
        let p1 = players.next()?;
        let p2 = players.next();

        Some(Self {
            tick,
            wave: state.wave.number,
            kills_this_wave: state.wave.kills_this_wave,
            required_kills: state.wave.required_kills,
            score: state.score.score,
            multiplier: state.score.multiplier,
            streak: state.score.streak,
            event: state
                .wave_event
                .map(|e| (e.kind, e.ends_at.saturating_sub(tick))),
            paused: state.paused,
            game_over: state.game_over,
            p1,
            p2,
            enemies: state
                .enemies
                .iter()
                .filter(|e| e.is_alive())
                .map(|e| EnemySnapshot {
                    id: e.id,
                    kind: e.kind,
                    position: e.position,
                    velocity: e.velocity,
                    health: e.health,
                    max_health: e.max_health,
                    radius: e.radius,
                    elite: e.elite,
                    formation: e.formation.filter(|f| !f.broken).map(|f| f.id),
                    phase: e.boss().map(|b| b.phase.tag()),
                    alpha: e.alpha(),
                })
                .collect(),
            projectiles: state
                .projectiles
                .iter()
                .map(|p| ProjectileSnapshot {
                    id: p.id,
                    position: p.position,
                    velocity: p.velocity(),
                    radius: p.radius,
                    owner: match p.owner {
                        Owner::Player(slot) => Some(slot),
                        Owner::Enemy => None,
                    },
                    weapon: p.weapon,
                })
                .collect(),
            orbs: state
                .orbs
                .iter()
                .map(|o| OrbSnapshot {
                    id: o.id,
                    position: o.position,
                    value: o.value,
                })
                .collect(),
            powerups: state
                .powerups
                .iter()
                .map(|p| PowerUpSnapshot {
                    id: p.id,
                    kind: p.kind,
                    position: p.position,
                })
                .collect(),
        })
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&PlayerSnapshot> {
        std::iter::once(&self.p1)
            .chain(self.p2.as_ref())
            .find(|p| p.slot == slot)
    }

    pub fn to_wire(&self) -> WireSnapshot {
        WireSnapshot::from_snapshot(self)
    }
}

// ============================================================================
// Wire form
// ============================================================================

/// Round to 2 decimals; non-finite values become 0
#[inline]
pub fn q2(v: f32) -> f32 {
    if v.is_finite() {
        (v * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Round to 1 decimal; non-finite values become 0
#[inline]
pub fn q1(v: f32) -> f32 {
    if v.is_finite() {
        (v * 10.0).round() / 10.0
    } else {
        0.0
    }
}

/// `(kind, remaining_ms, multiplier)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBuff(pub u8, pub u64, pub f32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePlayer {
    #[serde(rename = "s")]
    pub slot: u8,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub ax: f32,
    pub ay: f32,
    #[serde(rename = "h")]
    pub health: f32,
    #[serde(rename = "mh")]
    pub max_health: f32,
    #[serde(rename = "a")]
    pub alive: bool,
    #[serde(rename = "l")]
    pub level: u32,
    #[serde(rename = "xp")]
    pub experience: f32,
    #[serde(rename = "xn")]
    pub experience_to_next: f32,
    /// Remaining invulnerability, ms
    #[serde(rename = "iv")]
    pub invulnerable_ms: u64,
    /// `(weapon id, level)`
    #[serde(rename = "wp")]
    pub weapons: Vec<(u8, u8)>,
    #[serde(rename = "b", default)]
    pub buffs: Vec<WireBuff>,
    #[serde(rename = "kl")]
    pub kills: u32,
}

/// `(id, kind, x, y, vx, vy, health, max_health, radius, elite, formation, phase, alpha)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnemy(
    pub u32,
    pub u8,
    pub f32,
    pub f32,
    pub f32,
    pub f32,
    pub f32,
    pub f32,
    pub f32,
    pub bool,
    pub Option<u32>,
    pub Option<u8>,
    pub f32,
);

/// `(id, x, y, vx, vy, radius, owner slot, weapon id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProjectile(
    pub u32,
    pub f32,
    pub f32,
    pub f32,
    pub f32,
    pub f32,
    pub Option<u8>,
    pub Option<u8>,
);

/// `(id, x, y, value)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOrb(pub u32, pub f32, pub f32, pub f32);

/// `(id, kind, x, y)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePowerUp(pub u32, pub u8, pub f32, pub f32);

/// Transport form of [`Snapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSnapshot {
    #[serde(rename = "__v")]
    pub version: u32,
    #[serde(rename = "k")]
    pub tick: u64,
    /// Host simulation time, ms
    pub t: u64,
    pub w: u32,
    pub wk: u32,
    pub wr: u32,
    pub s: u64,
    pub m: f32,
    pub st: u32,
    /// `(event id, remaining ms)`
    #[serde(default)]
    pub ev: Option<(u8, u64)>,
    #[serde(default)]
    pub ps: bool,
    #[serde(default)]
    pub go: bool,
    pub p1: WirePlayer,
    #[serde(default)]
    pub p2: Option<WirePlayer>,
    #[serde(default)]
    pub e: Vec<WireEnemy>,
    #[serde(default)]
    pub pr: Vec<WireProjectile>,
    #[serde(default)]
    pub o: Vec<WireOrb>,
    #[serde(default)]
    pub pu: Vec<WirePowerUp>,
}

fn wire_player(p: &PlayerSnapshot) -> WirePlayer {
    WirePlayer {
        slot: p.slot,
        x: q2(p.position.x),
        y: q2(p.position.y),
        vx: q2(p.velocity.x),
        vy: q2(p.velocity.y),
        ax: q2(p.aim.x),
        ay: q2(p.aim.y),
        health: q1(p.health),
        max_health: q1(p.max_health),
        alive: p.alive,
        level: p.level,
        experience: q1(p.experience),
        experience_to_next: q1(p.experience_to_next),
        invulnerable_ms: ticks_to_ms(p.invulnerable_ticks),
        weapons: p.weapons.iter().map(|(k, l)| (k.id(), *l)).collect(),
        buffs: p
            .buffs
            .iter()
            .map(|b| WireBuff(buff_id(b.kind), ticks_to_ms(b.remaining_ticks), q2(b.multiplier)))
            .collect(),
        kills: p.kills,
    }
}

fn buff_id(kind: BuffKind) -> u8 {
    match kind {
        BuffKind::Speed => 0,
        BuffKind::Damage => 1,
    }
}

fn buff_from_id(id: u8) -> Result<BuffKind, CodecError> {
    match id {
        0 => Ok(BuffKind::Speed),
        1 => Ok(BuffKind::Damage),
        _ => Err(CodecError::UnknownId { what: "buff", id }),
    }
}

fn weapon_from_id(id: u8) -> Result<WeaponType, CodecError> {
    WeaponType::from_id(id).ok_or(CodecError::UnknownId { what: "weapon", id })
}

fn player_from_wire(w: &WirePlayer) -> Result<PlayerSnapshot, CodecError> {
    Ok(PlayerSnapshot {
        slot: w.slot,
        position: Vec2::new(w.x, w.y),
        velocity: Vec2::new(w.vx, w.vy),
        aim: Vec2::new(w.ax, w.ay),
        health: w.health,
        max_health: w.max_health,
        alive: w.alive,
        level: w.level,
        experience: w.experience,
        experience_to_next: w.experience_to_next,
        invulnerable_ticks: ms_to_ticks(w.invulnerable_ms),
        weapons: w
            .weapons
            .iter()
            .map(|&(id, level)| weapon_from_id(id).map(|k| (k, level)))
            .collect::<Result<_, _>>()?,
        buffs: w
            .buffs
            .iter()
            .map(|b| {
                Ok(BuffSnapshot {
                    kind: buff_from_id(b.0)?,
                    remaining_ticks: ms_to_ticks(b.1),
                    multiplier: b.2,
                })
            })
            .collect::<Result<_, CodecError>>()?,
        kills: w.kills,
    })
}

impl WireSnapshot {
    pub fn from_snapshot(s: &Snapshot) -> Self {
        Self {
            version: net::SNAPSHOT_VERSION,
            tick: s.tick,
            t: ticks_to_ms(s.tick),
            w: s.wave,
            wk: s.kills_this_wave,
            wr: s.required_kills,
            s: s.score,
            m: q2(s.multiplier),
            st: s.streak,
            ev: s.event.map(|(kind, left)| (kind.id(), ticks_to_ms(left))),
            ps: s.paused,
            go: s.game_over,
            p1: wire_player(&s.p1),
            p2: s.p2.as_ref().map(wire_player),
            e: s
                .enemies
                .iter()
                .map(|e| {
                    WireEnemy(
                        e.id,
                        e.kind.id(),
                        q2(e.position.x),
                        q2(e.position.y),
                        q2(e.velocity.x),
                        q2(e.velocity.y),
                        q1(e.health),
                        q1(e.max_health),
                        q1(e.radius),
                        e.elite,
                        e.formation,
                        e.phase,
                        q2(e.alpha),
                    )
                })
                .collect(),
            pr: s
                .projectiles
                .iter()
                .map(|p| {
                    WireProjectile(
                        p.id,
                        q2(p.position.x),
                        q2(p.position.y),
                        q2(p.velocity.x),
                        q2(p.velocity.y),
                        q1(p.radius),
                        p.owner,
                        p.weapon.map(WeaponType::id),
                    )
                })
                .collect(),
            o: s
                .orbs
                .iter()
                .map(|o| WireOrb(o.id, q2(o.position.x), q2(o.position.y), q1(o.value)))
                .collect(),
            pu: s
                .powerups
                .iter()
                .map(|p| WirePowerUp(p.id, p.kind.id(), q2(p.position.x), q2(p.position.y)))
                .collect(),
        }
    }

    /// Structural inverse of [`WireSnapshot::from_snapshot`]
    pub fn to_snapshot(&self) -> Result<Snapshot, CodecError> {
        if self.version != net::SNAPSHOT_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: self.version,
                expected: net::SNAPSHOT_VERSION,
            });
        }

        let event = match self.ev {
            Some((id, ms)) => Some((
                WaveEventKind::from_id(id).ok_or(CodecError::UnknownId { what: "wave event", id })?,
                ms_to_ticks(ms),
            )),
            None => None,
        };

        let enemies = self
            .e
            .iter()
            .map(|e| {
                Ok(EnemySnapshot {
                    id: e.0,
                    kind: EnemyKind::from_id(e.1).ok_or(CodecError::UnknownId { what: "enemy", id: e.1 })?,
                    position: Vec2::new(e.2, e.3),
                    velocity: Vec2::new(e.4, e.5),
                    health: e.6,
                    max_health: e.7,
                    radius: e.8,
                    elite: e.9,
                    formation: e.10,
                    phase: e.11,
                    alpha: e.12,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let projectiles = self
            .pr
            .iter()
            .map(|p| {
                Ok(ProjectileSnapshot {
                    id: p.0,
                    position: Vec2::new(p.1, p.2),
                    velocity: Vec2::new(p.3, p.4),
                    radius: p.5,
                    owner: p.6,
                    weapon: p.7.map(weapon_from_id).transpose()?,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let powerups = self
            .pu
            .iter()
            .map(|p| {
                Ok(PowerUpSnapshot {
                    id: p.0,
                    kind: PowerUpKind::from_id(p.1).ok_or(CodecError::UnknownId { what: "power-up", id: p.1 })?,
                    position: Vec2::new(p.2, p.3),
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(Snapshot {
            tick: self.tick,
            wave: self.w,
            kills_this_wave: self.wk,
            required_kills: self.wr,
            score: self.s,
            multiplier: self.m,
            streak: self.st,
            event,
            paused: self.ps,
            game_over: self.go,
            p1: player_from_wire(&self.p1)?,
            p2: self.p2.as_ref().map(player_from_wire).transpose()?,
            enemies,
            projectiles,
            orbs: self
                .o
                .iter()
                .map(|o| OrbSnapshot {
                    id: o.0,
                    position: Vec2::new(o.1, o.2),
                    value: o.3,
                })
                .collect(),
            powerups,
        })
    }
}

/// Serialize a snapshot to its JSON wire form
pub fn encode(snapshot: &Snapshot) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&snapshot.to_wire())?)
}

/// Parse and validate a JSON wire snapshot
pub fn decode(text: &str) -> Result<Snapshot, CodecError> {
    let wire: WireSnapshot = serde_json::from_str(text)?;
    wire.to_snapshot()
}
