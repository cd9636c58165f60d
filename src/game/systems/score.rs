//! Score, multiplier and kill-streak bookkeeping

use crate::game::constants::score;
use crate::game::state::{ScoreState, Tick};

/// Credit a kill worth `points`; returns the score gained
///
/// The gain uses the multiplier in effect before this kill bumps it.
pub fn register_kill(state: &mut ScoreState, points: u32, tick: Tick) -> u64 {
    let gained = (points as f32 * state.multiplier).round() as u64;
    state.score += gained;
    state.total_kills += 1;

    let in_window = state
        .last_kill_at
        .map(|last| tick.saturating_sub(last) <= score::STREAK_WINDOW)
        .unwrap_or(false);
    state.streak = if in_window { state.streak + 1 } else { 1 };
    state.max_streak = state.max_streak.max(state.streak);
    state.last_kill_at = Some(tick);

    state.multiplier = (state.multiplier + score::MULTIPLIER_STEP).min(score::MULTIPLIER_CAP);
    gained
}

/// Per-tick decay of the multiplier toward 1.0
pub fn decay_multiplier(state: &mut ScoreState) {
    state.multiplier = (state.multiplier - score::MULTIPLIER_DECAY).max(1.0);
}

/// Flat near-miss bonus, scaled by the current multiplier
pub fn award_near_miss(state: &mut ScoreState) -> u64 {
    let gained = (score::NEAR_MISS_BONUS as f32 * state.multiplier).round() as u64;
    state.score += gained;
    gained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_grows_and_caps() {
        let mut s = ScoreState::default();
        for i in 0..100 {
            register_kill(&mut s, 10, i);
        }
        assert_eq!(s.multiplier, score::MULTIPLIER_CAP);
        assert_eq!(s.total_kills, 100);
    }

    #[test]
    fn test_gain_uses_previous_multiplier() {
        let mut s = ScoreState::default();
        assert_eq!(register_kill(&mut s, 10, 0), 10);
        assert!((s.multiplier - 1.1).abs() < 1e-6);
        assert_eq!(register_kill(&mut s, 10, 1), 11);
    }

    #[test]
    fn test_streak_window() {
        let mut s = ScoreState::default();
        register_kill(&mut s, 1, 0);
        register_kill(&mut s, 1, score::STREAK_WINDOW);
        assert_eq!(s.streak, 2);
        register_kill(&mut s, 1, score::STREAK_WINDOW * 3);
        assert_eq!(s.streak, 1);
        assert_eq!(s.max_streak, 2);
    }

    #[test]
    fn test_decay_floors_at_one() {
        let mut s = ScoreState::default();
        s.multiplier = 1.001;
        decay_multiplier(&mut s);
        assert_eq!(s.multiplier, 1.0);
        decay_multiplier(&mut s);
        assert_eq!(s.multiplier, 1.0);
    }
}
