//! Pure point/set arithmetic for a single match.
//!
//! Nothing in here touches storage or the network: the services layer loads a
//! [`Scoreboard`] from the persisted match and score state, applies one of the
//! operations below, and writes the result back under the court lock.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dao::models::{MatchEntity, ScoreStateEntity},
    state::set_history::SetScore,
};

/// Target score for the regular sets.
pub const REGULAR_SET_TARGET: u16 = 25;
/// Target score for the third (decisive) set.
pub const DECIDING_SET_TARGET: u16 = 15;
/// Lead required to close out a set.
pub const WINNING_MARGIN: u16 = 2;
/// Set number played to [`DECIDING_SET_TARGET`].
pub const DECIDING_SET_NUMBER: u8 = 3;

/// One side of the net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Team {
    /// Team listed first on the scoreboard.
    A,
    /// Team listed second on the scoreboard.
    B,
}

/// Points needed to take the given set.
pub fn target_score(set_number: u8) -> u16 {
    if set_number == DECIDING_SET_NUMBER {
        DECIDING_SET_TARGET
    } else {
        REGULAR_SET_TARGET
    }
}

/// Number of set wins that decide a match.
pub fn sets_to_win(is_crossover: bool) -> u8 {
    if is_crossover { 1 } else { 2 }
}

/// Decide whether the current score closes out the set.
///
/// A set is won once either side reaches the target score while leading by
/// at least [`WINNING_MARGIN`] points.
pub fn evaluate_set_win(score_a: u16, score_b: u16, set_number: u8) -> Option<Team> {
    let target = target_score(set_number);
    if score_a.max(score_b) >= target && score_a.abs_diff(score_b) >= WINNING_MARGIN {
        Some(if score_a > score_b { Team::A } else { Team::B })
    } else {
        None
    }
}

/// Result of a set-win confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// No side currently holds a set-deciding score.
    NothingToConfirm,
    /// The set was closed and the scoreboard moved on to the next set.
    Confirmed {
        /// Side credited with the set.
        winner: Team,
        /// Scores at the moment the set was closed.
        final_score: SetScore,
        /// Whether this set decided the match.
        match_completed: bool,
    },
}

/// Combined view of a match and its live score state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    /// Name of the team listed first.
    pub team_a: String,
    /// Name of the team listed second.
    pub team_b: String,
    /// Sets won by team A.
    pub sets_a: u8,
    /// Sets won by team B.
    pub sets_b: u8,
    /// Crossover matches are a single set to 15.
    pub is_crossover: bool,
    /// Match decided; points are frozen.
    pub completed: bool,
    /// Set in play, starting at 1.
    pub set_number: u8,
    /// Points of team A in the current set.
    pub score_a: u16,
    /// Points of team B in the current set.
    pub score_b: u16,
}

impl Scoreboard {
    /// Build a scoreboard from persisted entities.
    pub fn from_entities(match_entity: &MatchEntity, score: &ScoreStateEntity) -> Self {
        Self {
            team_a: match_entity.team_a.clone(),
            team_b: match_entity.team_b.clone(),
            sets_a: match_entity.sets_a,
            sets_b: match_entity.sets_b,
            is_crossover: match_entity.is_crossover,
            completed: match_entity.is_completed,
            set_number: score.set_number,
            score_a: score.team_a_score,
            score_b: score.team_b_score,
        }
    }

    /// Copy the scoreboard back onto the persisted entities.
    pub fn write_back(&self, match_entity: &mut MatchEntity, score: &mut ScoreStateEntity) {
        match_entity.team_a = self.team_a.clone();
        match_entity.team_b = self.team_b.clone();
        match_entity.sets_a = self.sets_a;
        match_entity.sets_b = self.sets_b;
        match_entity.is_completed = self.completed;
        score.set_number = self.set_number;
        score.team_a_score = self.score_a;
        score.team_b_score = self.score_b;
    }

    /// Side holding a set-deciding score that has not been confirmed yet.
    pub fn pending_set_win(&self) -> Option<Team> {
        evaluate_set_win(self.score_a, self.score_b, self.set_number)
    }

    /// Add a point. A set-deciding score stays provisional until confirmed.
    pub fn increment(&mut self, team: Team) -> Option<Team> {
        match team {
            Team::A => self.score_a = self.score_a.saturating_add(1),
            Team::B => self.score_b = self.score_b.saturating_add(1),
        }
        self.pending_set_win()
    }

    /// Remove a point, never going below zero.
    pub fn decrement(&mut self, team: Team) -> Option<Team> {
        match team {
            Team::A => self.score_a = self.score_a.saturating_sub(1),
            Team::B => self.score_b = self.score_b.saturating_sub(1),
        }
        self.pending_set_win()
    }

    /// Zero both scores of the current set.
    pub fn reset_set(&mut self) {
        self.score_a = 0;
        self.score_b = 0;
    }

    /// Exchange names, sets won and current points in one step.
    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.team_a, &mut self.team_b);
        std::mem::swap(&mut self.sets_a, &mut self.sets_b);
        std::mem::swap(&mut self.score_a, &mut self.score_b);
    }

    /// Close the current set if, and only if, a winner is established right now.
    pub fn confirm_set_win(&mut self) -> SetOutcome {
        let Some(winner) = self.pending_set_win() else {
            return SetOutcome::NothingToConfirm;
        };

        let final_score = SetScore {
            team_a_score: self.score_a,
            team_b_score: self.score_b,
        };

        match winner {
            Team::A => self.sets_a += 1,
            Team::B => self.sets_b += 1,
        }

        let needed = sets_to_win(self.is_crossover);
        let match_completed = self.sets_a >= needed || self.sets_b >= needed;
        if match_completed {
            self.completed = true;
        }

        self.reset_set();
        self.set_number = self.set_number.saturating_add(1);

        SetOutcome::Confirmed {
            winner,
            final_score,
            match_completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(is_crossover: bool) -> Scoreboard {
        Scoreboard {
            team_a: "Spikers".into(),
            team_b: "Diggers".into(),
            sets_a: 0,
            sets_b: 0,
            is_crossover,
            completed: false,
            set_number: 1,
            score_a: 0,
            score_b: 0,
        }
    }

    fn play_to(board: &mut Scoreboard, a: u16, b: u16) {
        board.reset_set();
        for _ in 0..a {
            board.increment(Team::A);
        }
        for _ in 0..b {
            board.increment(Team::B);
        }
    }

    #[test]
    fn set_win_thresholds() {
        assert_eq!(evaluate_set_win(25, 23, 1), Some(Team::A));
        assert_eq!(evaluate_set_win(25, 24, 1), None);
        assert_eq!(evaluate_set_win(26, 24, 1), Some(Team::A));
        assert_eq!(evaluate_set_win(15, 13, 3), Some(Team::A));
        assert_eq!(evaluate_set_win(24, 24, 1), None);
        assert_eq!(evaluate_set_win(13, 15, 3), Some(Team::B));
        assert_eq!(evaluate_set_win(15, 13, 2), None);
        assert_eq!(evaluate_set_win(23, 25, 2), Some(Team::B));
    }

    #[test]
    fn decrement_never_goes_negative() {
        let mut board = board(false);
        board.increment(Team::A);
        for _ in 0..5 {
            board.decrement(Team::A);
            board.decrement(Team::B);
        }
        assert_eq!((board.score_a, board.score_b), (0, 0));
    }

    #[test]
    fn decrement_clears_pending_win() {
        let mut board = board(false);
        play_to(&mut board, 25, 20);
        assert_eq!(board.pending_set_win(), Some(Team::A));
        assert_eq!(board.decrement(Team::A), None);
        assert_eq!(board.increment(Team::A), Some(Team::A));
    }

    #[test]
    fn increment_does_not_advance_the_set() {
        let mut board = board(false);
        play_to(&mut board, 30, 20);
        assert_eq!(board.set_number, 1);
        assert_eq!(board.sets_a, 0);
    }

    #[test]
    fn confirm_without_winner_mutates_nothing() {
        let mut board = board(false);
        play_to(&mut board, 24, 23);
        let before = board.clone();
        assert_eq!(board.confirm_set_win(), SetOutcome::NothingToConfirm);
        assert_eq!(board, before);
    }

    #[test]
    fn confirm_moves_to_next_set() {
        let mut board = board(false);
        play_to(&mut board, 25, 20);
        let outcome = board.confirm_set_win();
        assert_eq!(
            outcome,
            SetOutcome::Confirmed {
                winner: Team::A,
                final_score: SetScore {
                    team_a_score: 25,
                    team_b_score: 20
                },
                match_completed: false,
            }
        );
        assert_eq!((board.score_a, board.score_b), (0, 0));
        assert_eq!(board.set_number, 2);
        assert_eq!(board.sets_a, 1);
        assert_eq!(board.confirm_set_win(), SetOutcome::NothingToConfirm);
    }

    #[test]
    fn crossover_completes_after_one_set() {
        let mut board = board(true);
        play_to(&mut board, 25, 10);
        assert!(matches!(
            board.confirm_set_win(),
            SetOutcome::Confirmed {
                match_completed: true,
                ..
            }
        ));
        assert!(board.completed);
    }

    #[test]
    fn standard_match_completes_after_two_sets() {
        let mut board = board(false);
        play_to(&mut board, 25, 10);
        board.confirm_set_win();
        assert!(!board.completed);
        play_to(&mut board, 10, 25);
        board.confirm_set_win();
        assert!(!board.completed);
        assert_eq!(board.set_number, 3);

        play_to(&mut board, 15, 13);
        assert!(matches!(
            board.confirm_set_win(),
            SetOutcome::Confirmed {
                winner: Team::A,
                match_completed: true,
                ..
            }
        ));
        assert!(board.completed);
        assert_eq!((board.sets_a, board.sets_b), (2, 1));
    }

    #[test]
    fn swap_exchanges_everything() {
        let mut board = board(false);
        board.sets_a = 1;
        play_to(&mut board, 7, 3);
        board.swap_sides();
        assert_eq!(board.team_a, "Diggers");
        assert_eq!(board.team_b, "Spikers");
        assert_eq!((board.sets_a, board.sets_b), (0, 1));
        assert_eq!((board.score_a, board.score_b), (3, 7));
    }
}
