//! End-of-run summary
//!
//! Computed once by the host when the run ends and carried by the
//! `game-over` relay message, so both peers show the same numbers.

use serde::{Deserialize, Serialize};

use crate::game::constants::ticks_to_ms;
use crate::game::state::{GameState, PlayerSlot};

/// Final per-player line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub slot: PlayerSlot,
    pub level: u32,
    pub kills: u32,
    pub damage_taken: f32,
    pub survived: bool,
}

/// Final run result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub score: u64,
    /// Wave the run ended on
    pub wave: u32,
    pub kills: u32,
    pub run_time_ms: u64,
    pub max_streak: u32,
    pub bosses_defeated: u32,
    pub kills_per_minute: f32,
    pub players: Vec<PlayerSummary>,
}

/// Build the summary from the final state
pub fn summarize(state: &GameState) -> MatchSummary {
    let run_time_ms = ticks_to_ms(state.run_ticks);
    let minutes = run_time_ms as f32 / 60_000.0;
    let kills = state.score.total_kills;

    MatchSummary {
        score: state.score.score,
        wave: state.wave.number,
        kills,
        run_time_ms,
        max_streak: state.score.max_streak,
        bosses_defeated: state.bosses_defeated,
        kills_per_minute: if minutes > 0.0 { kills as f32 / minutes } else { 0.0 },
        players: state
            .players
            .iter()
            .map(|p| PlayerSummary {
                slot: p.slot,
                level: p.level,
                kills: p.kills,
                damage_taken: p.damage_taken,
                survived: p.alive,
            })
            .collect(),
    }
}

/// Reason why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEndReason {
    /// Every avatar is down
    AllPlayersDown,
    /// The session was stopped before anyone died
    Stopped,
}

/// Check if the run should end
pub fn check_match_end(state: &GameState) -> Option<MatchEndReason> {
    if state.game_over || !state.any_player_alive() {
        return Some(MatchEndReason::AllPlayersDown);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::sim;
    use crate::game::state::{HOST_SLOT, PARTNER_SLOT};

    #[test]
    fn test_summary_totals() {
        let mut state = GameState::with_defaults(true);
        state.score.score = 1234;
        state.score.total_kills = 30;
        state.score.max_streak = 7;
        state.wave.number = 4;
        state.run_ticks = sim::TICK_RATE as u64 * 60;
        state.players[0].kills = 20;
        state.players[1].kills = 10;
        state.players[1].alive = false;

        let summary = summarize(&state);
        assert_eq!(summary.score, 1234);
        assert_eq!(summary.wave, 4);
        assert_eq!(summary.run_time_ms, 60_000);
        assert!((summary.kills_per_minute - 30.0).abs() < 1e-3);
        assert_eq!(summary.players.len(), 2);
        assert_eq!(summary.players[0].slot, HOST_SLOT);
        assert!(!summary.players[1].survived);
        assert_eq!(summary.players[1].slot, PARTNER_SLOT);
    }

    #[test]
    fn test_zero_length_run() {
        let state = GameState::with_defaults(false);
        let summary = summarize(&state);
        assert_eq!(summary.kills_per_minute, 0.0);
        assert_eq!(summary.players.len(), 1);
    }

    #[test]
    fn test_check_match_end() {
        let mut state = GameState::with_defaults(true);
        assert_eq!(check_match_end(&state), None);

        state.players[0].alive = false;
        assert_eq!(check_match_end(&state), None);

        state.players[1].alive = false;
        assert_eq!(check_match_end(&state), Some(MatchEndReason::AllPlayersDown));
    }

    #[test]
    fn test_summary_serializes() {
        let summary = summarize(&GameState::with_defaults(false));
        let json = serde_json::to_string(&summary).unwrap();
        let back: MatchSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
