//! Fixed-tick simulation pipeline
//!
//! One [`GameLoop::tick`] runs: input, player movement, weapon fire,
//! projectile and particle steps, collision, enemy and boss steering, the
//! wave director, pickups, and finally the upgrade trigger. Everything the
//! systems share (tick counter, RNG, grid, id source, event queue) lives in
//! [`SimContext`], so two loops built from the same seed and fed the same
//! inputs stay in lockstep.

use rand::rngs::StdRng;
use rand::SeedableRng;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::config::{MetaBonuses, SimConfig};
use crate::game::constants::{hitstop, sim};
use crate::game::spatial::SpatialGrid;
use crate::game::state::{
    Enemy, EnemyExt, EnemyId, EnemyKind, GameState, PlayerSlot, PowerUpKind, Tick, WaveEventKind,
};
use crate::game::systems::collision::{self, CollisionEvent, Kill};
use crate::game::systems::upgrade::{self, UpgradeError};
use crate::game::systems::{enemy, pickups, player, projectile, score, wave, weapons};
use crate::net::protocol::PlayerInput;
use crate::util::vec2::Vec2;

/// Particle palette index for kill bursts
const KILL_BURST_COLOR: u8 = 1;
const BOSS_BURST_COLOR: u8 = 3;

/// Wrapping id source shared by enemies, projectiles and pickups
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    last: u32,
}

impl IdGen {
    pub fn next_id(&mut self) -> u32 {
        self.last = self.last.wrapping_add(1);
        self.last
    }
}

/// Mutable context threaded through every system
pub struct SimContext {
    pub tick: Tick,
    pub rng: StdRng,
    pub grid: SpatialGrid,
    pub ids: IdGen,
    pub events: Vec<GameLoopEvent>,
}

impl SimContext {
    pub fn new(seed: u64, arena: Vec2) -> Self {
        Self {
            tick: 0,
            rng: StdRng::seed_from_u64(seed),
            grid: SpatialGrid::for_arena(arena.x, arena.y),
            ids: IdGen::default(),
            events: Vec::with_capacity(32),
        }
    }
}

/// Discrete things that happened during a tick
///
/// Consumed by the session layer for logging, hit-stop, audio cues and
/// relay messages.
#[derive(Debug, Clone, PartialEq)]
pub enum GameLoopEvent {
    EnemyKilled {
        id: EnemyId,
        kind: EnemyKind,
        by: PlayerSlot,
        points: u64,
        elite: bool,
    },
    PlayerDamaged { slot: PlayerSlot, amount: f32 },
    PlayerDied { slot: PlayerSlot },
    LevelUp { slot: PlayerSlot, level: u32 },
    WaveCompleted { wave: u32 },
    BossSpawned { id: EnemyId, level: u32 },
    BossPhaseChanged { id: EnemyId, phase: u8 },
    BossDefeated { id: EnemyId, level: u32 },
    WaveEventStarted { kind: WaveEventKind },
    WaveEventEnded { kind: WaveEventKind },
    PickupCollected { slot: PlayerSlot, kind: PowerUpKind },
    NearMiss { slot: PlayerSlot, points: u64 },
    UpgradeRoundStarted,
    UpgradeRoundFinished,
    GameOver,
}

impl GameLoopEvent {
    /// Slow-motion request `(factor, duration_ms)` this event triggers
    pub fn hit_stop(&self) -> Option<(f64, f64)> {
        match self {
            GameLoopEvent::BossDefeated { .. } => Some(hitstop::BOSS_KILL),
            GameLoopEvent::EnemyKilled { elite: true, .. } => Some(hitstop::ELITE_KILL),
            GameLoopEvent::PlayerDamaged { .. } => Some(hitstop::DAMAGE_TAKEN),
            GameLoopEvent::LevelUp { .. } => Some(hitstop::LEVEL_UP),
            _ => None,
        }
    }
}

/// Match construction parameters
#[derive(Debug, Clone)]
pub struct GameLoopConfig {
    pub seed: u64,
    pub arena: Vec2,
    pub coop: bool,
    pub meta: MetaBonuses,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            arena: Vec2::new(sim::ARENA_WIDTH, sim::ARENA_HEIGHT),
            coop: false,
            meta: MetaBonuses::default(),
        }
    }
}

impl GameLoopConfig {
    pub fn from_sim(config: &SimConfig, coop: bool) -> Self {
        Self {
            seed: config.seed,
            arena: Vec2::new(config.arena_width, config.arena_height),
            coop,
            meta: config.meta.clone(),
        }
    }
}

/// Authoritative simulation of one match
pub struct GameLoop {
    state: GameState,
    ctx: SimContext,
    inputs: [PlayerInput; 2],
}

impl GameLoop {
    pub fn new(config: GameLoopConfig) -> Self {
        let state = GameState::new(config.arena, &config.meta, config.coop);
        Self {
            state,
            ctx: SimContext::new(config.seed, config.arena),
            inputs: Default::default(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn tick_count(&self) -> Tick {
        self.ctx.tick
    }

    /// Latest input for `slot`; held until replaced
    pub fn set_input(&mut self, slot: PlayerSlot, input: PlayerInput) {
        if let Some(held) = self.inputs.get_mut(slot as usize) {
            *held = input;
        }
    }

    pub fn input(&self, slot: PlayerSlot) -> Option<&PlayerInput> {
        self.inputs.get(slot as usize)
    }

    /// Apply an upgrade choice; returns true once the round closed
    ///
    /// Closing a round immediately opens the next one if either player still
    /// has queued level-ups.
    pub fn select_upgrade(&mut self, slot: PlayerSlot, choice: usize) -> Result<bool, UpgradeError> {
        let closed = upgrade::select_upgrade(&mut self.state, slot, choice)?;
        if closed {
            self.ctx.events.push(GameLoopEvent::UpgradeRoundFinished);
            self.open_upgrade_round();
        }
        Ok(closed)
    }

    /// Events queued outside of a tick (upgrade selection)
    pub fn drain_events(&mut self) -> Vec<GameLoopEvent> {
        std::mem::take(&mut self.ctx.events)
    }

    /// Advance the simulation one tick and return what happened
    ///
    /// Does nothing while paused for an upgrade round or after game over.
    pub fn tick(&mut self) -> Vec<GameLoopEvent> {
        if self.state.game_over || self.state.paused {
            return self.drain_events();
        }

        self.ctx.tick += 1;
        let tick = self.ctx.tick;

        // ====================================================================
        // Players and weapons
        // ====================================================================

        {
            let GameState {
                players,
                projectiles,
                arena,
                ..
            } = &mut self.state;
            for p in players.iter_mut() {
                let input = &self.inputs[(p.slot as usize).min(1)];
                player::step_player(p, input, *arena, tick);
            }
            for p in players.iter_mut() {
                weapons::fire_weapons(p, tick, projectiles, &mut self.ctx.ids);
            }
            projectile::step_projectiles(projectiles, players, *arena);
        }
        projectile::step_particles(&mut self.state.particles);

        // ====================================================================
        // Collision
        // ====================================================================

        let mut kills: Vec<Kill> = Vec::new();
        let mut hits: Vec<CollisionEvent> = Vec::new();
        {
            let GameState {
                players,
                enemies,
                projectiles,
                ..
            } = &mut self.state;
            rebuild_grid(&mut self.ctx.grid, enemies);
            collision::resolve_player_projectiles(projectiles, enemies, &self.ctx.grid, &mut kills);
            collision::resolve_hostile_projectiles(projectiles, players, tick, &mut hits);
            collision::resolve_enemy_contacts(enemies, players, &self.ctx.grid, tick, &mut hits);
        }
        self.apply_player_hits(&hits);
        self.process_kills(&kills);

        // ====================================================================
        // Enemies, waves, pickups
        // ====================================================================

        rebuild_grid(&mut self.ctx.grid, &self.state.enemies);
        enemy::update_enemies(&mut self.state, &mut self.ctx);
        rebuild_grid(&mut self.ctx.grid, &self.state.enemies);
        enemy::separate_enemies(&mut self.state.enemies, &self.ctx.grid);

        wave::update_wave(&mut self.state, &mut self.ctx);

        pickups::update_orbs(&mut self.state, &mut self.ctx);
        pickups::update_powerups(&mut self.state, &mut self.ctx);

        self.open_upgrade_round();

        score::decay_multiplier(&mut self.state.score);
        self.state.run_ticks += 1;

        if !self.state.any_player_alive() {
            self.state.game_over = true;
            info!(
                "Game over at wave {} with score {} after {} ticks",
                self.state.wave.number, self.state.score.score, self.state.run_ticks
            );
            self.ctx.events.push(GameLoopEvent::GameOver);
        }

        self.drain_events()
    }

    fn open_upgrade_round(&mut self) {
        if upgrade::start_round_if_pending(&mut self.state, &mut self.ctx.rng) {
            debug!("Upgrade round opened at tick {}", self.ctx.tick);
            self.ctx.events.push(GameLoopEvent::UpgradeRoundStarted);
        }
    }

    fn apply_player_hits(&mut self, hits: &[CollisionEvent]) {
        for hit in hits {
            match *hit {
                CollisionEvent::PlayerDamaged { slot, amount, died } => {
                    self.ctx.events.push(GameLoopEvent::PlayerDamaged { slot, amount });
                    if died {
                        info!("Player {} died at wave {}", slot, self.state.wave.number);
                        self.ctx.events.push(GameLoopEvent::PlayerDied { slot });
                    }
                }
                CollisionEvent::NearMiss { slot } => {
                    let points = score::award_near_miss(&mut self.state.score);
                    self.ctx.events.push(GameLoopEvent::NearMiss { slot, points });
                }
            }
        }
    }

    /// Credit kills in resolution order, then drop the dead
    fn process_kills(&mut self, kills: &[Kill]) {
        if kills.is_empty() {
            return;
        }
        let tick = self.ctx.tick;
        let mut children: SmallVec<[Enemy; 4]> = SmallVec::new();

        for kill in kills {
            let Some(dead) = self.state.enemies.get(kill.index).cloned() else {
                continue;
            };
            let points = score::register_kill(&mut self.state.score, dead.points, tick);
            pickups::drop_loot(&mut self.state, &dead, &mut self.ctx);

            if matches!(dead.ext, EnemyExt::Splitter { child: false }) {
                children.extend(enemy::split_children(&dead, &mut self.ctx));
            }

            let (count, color) = match dead.boss() {
                Some(brain) => {
                    self.state.bosses_defeated += 1;
                    info!("Boss level {} defeated at tick {}", brain.level, tick);
                    self.ctx.events.push(GameLoopEvent::BossDefeated {
                        id: dead.id,
                        level: brain.level,
                    });
                    (40, BOSS_BURST_COLOR)
                }
                None => (8, KILL_BURST_COLOR),
            };
            projectile::spawn_burst(&mut self.state.particles, &mut self.ctx.rng, dead.position, count, color);

            if let Some(p) = self.state.player_mut(kill.by) {
                p.kills += 1;
            }
            self.ctx.events.push(GameLoopEvent::EnemyKilled {
                id: dead.id,
                kind: dead.kind,
                by: kill.by,
                points,
                elite: dead.elite,
            });
            wave::record_kill(&mut self.state, &mut self.ctx);
        }

        self.state.enemies.retain(Enemy::is_alive);
        self.state.enemies.extend(children);
    }
}

/// Index living enemies by their position in `enemies`
fn rebuild_grid(grid: &mut SpatialGrid, enemies: &[Enemy]) {
    grid.rebuild(
        enemies
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_alive())
            .map(|(i, e)| (i as u32, e.position)),
    );
}
