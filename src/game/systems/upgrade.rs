//! Level-up offers and upgrade application
//!
//! Candidates are built from the player's loadout, shuffled, and the first
//! three become the offer. Applying a choice is a pure function of the
//! player and the upgrade.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::constants::{upgrade, weapon};
use crate::game::state::{GameState, Player, PlayerSlot, Weapon, WeaponType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatUpgrade {
    Health,
    Speed,
    Magnet,
}

impl StatUpgrade {
    pub const ALL: [StatUpgrade; 3] = [StatUpgrade::Health, StatUpgrade::Speed, StatUpgrade::Magnet];
}

/// One selectable upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Upgrade {
    /// Raise an owned weapon one level
    WeaponLevel(WeaponType),
    /// Add an unowned weapon at level 1
    NewWeapon(WeaponType),
    Stat(StatUpgrade),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpgradeError {
    #[error("No upgrade round in progress")]
    NoRound,
    #[error("No offer for player slot {0}")]
    NoOffer(PlayerSlot),
    #[error("Player slot {0} has already chosen")]
    AlreadyChosen(PlayerSlot),
    #[error("Choice {0} is out of range")]
    InvalidChoice(usize),
    #[error("Weapon {0:?} is not owned")]
    NotOwned(WeaponType),
    #[error("Weapon {0:?} is already at max level")]
    MaxLevel(WeaponType),
    #[error("Weapon {0:?} is already owned")]
    AlreadyOwned(WeaponType),
}

/// Every upgrade currently valid for `player`
pub fn upgrade_candidates(player: &Player) -> Vec<Upgrade> {
    let mut candidates = Vec::with_capacity(WeaponType::ALL.len() + StatUpgrade::ALL.len());
    for w in &player.weapons {
        if !w.is_max_level() {
            candidates.push(Upgrade::WeaponLevel(w.kind));
        }
    }
    for kind in WeaponType::ALL {
        if player.weapon(kind).is_none() {
            candidates.push(Upgrade::NewWeapon(kind));
        }
    }
    candidates.extend(StatUpgrade::ALL.iter().map(|&s| Upgrade::Stat(s)));
    candidates
}

/// Shuffle the candidates and take up to three
pub fn generate_upgrades<R: Rng>(player: &Player, rng: &mut R) -> Vec<Upgrade> {
    let mut candidates = upgrade_candidates(player);
    candidates.shuffle(rng);
    candidates.truncate(upgrade::OFFER_COUNT);
    candidates
}

/// Advance a weapon by one level with its type-specific bonus
pub fn level_weapon(w: &mut Weapon) {
    if w.is_max_level() {
        return;
    }
    w.level += 1;
    w.damage *= weapon::DAMAGE_GROWTH;
    w.cooldown = ((w.cooldown as f32 * weapon::COOLDOWN_GROWTH).round() as u32).max(1);
    match w.kind {
        WeaponType::Blaster => {
            if weapon::BLASTER_COUNT_LEVELS.contains(&w.level) {
                w.count += 1;
            }
        }
        WeaponType::Spread => w.count += 1,
        WeaponType::Beam => w.pierce += 1,
        WeaponType::Orbit => w.count += 1,
        WeaponType::Launcher => w.explosion_radius += weapon::LAUNCHER_EXPLOSION_STEP,
    }
}

/// A fresh weapon of `kind` raised to `level`
pub fn weapon_at_level(kind: WeaponType, level: u8) -> Weapon {
    let mut w = Weapon::new(kind);
    while w.level < level.min(weapon::MAX_LEVEL) {
        level_weapon(&mut w);
    }
    w
}

/// Return a copy of `player` with `choice` applied
pub fn apply_upgrade(player: &Player, choice: Upgrade) -> Result<Player, UpgradeError> {
    let mut next = player.clone();
    match choice {
        Upgrade::WeaponLevel(kind) => {
            let w = next.weapon_mut(kind).ok_or(UpgradeError::NotOwned(kind))?;
            if w.is_max_level() {
                return Err(UpgradeError::MaxLevel(kind));
            }
            level_weapon(w);
        }
        Upgrade::NewWeapon(kind) => {
            if next.weapon(kind).is_some() {
                return Err(UpgradeError::AlreadyOwned(kind));
            }
            next.weapons.push(Weapon::new(kind));
        }
        Upgrade::Stat(StatUpgrade::Health) => {
            next.max_health += upgrade::HEALTH_BONUS;
            next.heal(upgrade::HEALTH_BONUS);
        }
        Upgrade::Stat(StatUpgrade::Speed) => next.speed_bonus += upgrade::SPEED_BONUS,
        Upgrade::Stat(StatUpgrade::Magnet) => next.magnet_bonus += upgrade::MAGNET_BONUS,
    }
    Ok(next)
}

/// Offer presented to one player slot
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeOffer {
    pub slot: PlayerSlot,
    pub options: Vec<Upgrade>,
    pub choice: Option<usize>,
}

/// A simultaneous-choice round; the simulation is paused while it is open
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpgradeRound {
    pub offers: Vec<UpgradeOffer>,
}

impl UpgradeRound {
    pub fn offer(&self, slot: PlayerSlot) -> Option<&UpgradeOffer> {
        self.offers.iter().find(|o| o.slot == slot)
    }

    pub fn is_complete(&self) -> bool {
        self.offers.iter().all(|o| o.choice.is_some())
    }
}

/// Open a round if any living player has queued level-ups
///
/// Returns true when a new round was opened.
pub fn start_round_if_pending<R: Rng>(state: &mut GameState, rng: &mut R) -> bool {
    if state.upgrade_round.is_some() || state.game_over {
        return false;
    }
    let mut offers = Vec::new();
    for p in state.players.iter_mut() {
        if !p.alive {
            p.pending_level_ups = 0;
            continue;
        }
        if p.pending_level_ups > 0 {
            let options = generate_upgrades(p, rng);
            if options.is_empty() {
                p.pending_level_ups = 0;
                continue;
            }
            offers.push(UpgradeOffer {
                slot: p.slot,
                options,
                choice: None,
            });
        }
    }
    if offers.is_empty() {
        return false;
    }
    tracing::debug!("Upgrade round opened for {} player(s)", offers.len());
    state.upgrade_round = Some(UpgradeRound { offers });
    state.paused = true;
    true
}

/// Record a choice; returns true when this closed the round
pub fn select_upgrade(state: &mut GameState, slot: PlayerSlot, choice: usize) -> Result<bool, UpgradeError> {
    let round = state.upgrade_round.as_mut().ok_or(UpgradeError::NoRound)?;
    let offer = round
        .offers
        .iter_mut()
        .find(|o| o.slot == slot)
        .ok_or(UpgradeError::NoOffer(slot))?;
    if offer.choice.is_some() {
        return Err(UpgradeError::AlreadyChosen(slot));
    }
    if choice >= offer.options.len() {
        return Err(UpgradeError::InvalidChoice(choice));
    }
    offer.choice = Some(choice);

    if round.is_complete() {
        finish_round(state);
        return Ok(true);
    }
    Ok(false)
}

/// Apply every choice of the open round and resume the simulation
pub fn finish_round(state: &mut GameState) {
    let Some(round) = state.upgrade_round.take() else {
        return;
    };
    for offer in round.offers {
        let Some(upgrade) = offer.choice.and_then(|i| offer.options.get(i).copied()) else {
            continue;
        };
        let Some(player) = state.player_mut(offer.slot) else {
            continue;
        };
        match apply_upgrade(player, upgrade) {
            Ok(next) => *player = next,
            Err(e) => tracing::warn!("Upgrade for slot {} rejected: {}", offer.slot, e),
        }
        player.pending_level_ups = player.pending_level_ups.saturating_sub(1);
    }
    state.paused = false;
}
