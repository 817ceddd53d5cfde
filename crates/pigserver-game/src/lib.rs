//! Pure Pig dice rules (component C4).
//!
//! Every operation here is a synchronous mutation of [`GameState`] with no
//! I/O and no shared state — the game coordinator (`pigserver-session`)
//! owns one `GameState` per match and is the sole caller. Randomness is
//! seeded per match, not drawn from a process-global generator, so replaying
//! a seed reproduces a match deterministically.

use pigserver_protocol::WINNING_SCORE;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Which of the two seats is acting. Pig is strictly two-player, so a plain
/// `bool`-backed index is simpler than a newtype here and matches how the
/// reference engine indexes `scores[2]`/`player_fds[2]`.
pub type Seat = usize;

/// State of one in-progress (or just-finished) match.
#[derive(Debug, Clone)]
pub struct GameState {
    rng: StdRng,
    pub scores: [u32; 2],
    pub current_player: Seat,
    pub turn_score: u32,
    pub last_roll: u32,
    pub game_over: bool,
    pub winner: Option<Seat>,
}

/// Outcome of a single `roll`, for the caller to decide what to broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollOutcome {
    /// Rolled 1: the turn busts, turn_score resets, and the turn passes.
    Bust,
    /// Rolled 2-6: turn_score accumulates: the turn continues.
    Accumulated,
}

/// Outcome of a single `hold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    /// Banked points were not enough to win; turn passes to the opponent.
    TurnPassed,
    /// Banked points reached `WINNING_SCORE`; the game is over.
    Won,
}

impl GameState {
    /// Seed the PRNG and pick a uniformly random starting player. `seed`
    /// should be derived from wall-clock time XOR the room's identity, so
    /// concurrent rooms spawned in the same instant don't share a seed.
    pub fn init(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let current_player = rng.random_range(0..2);
        GameState {
            rng,
            scores: [0, 0],
            current_player,
            turn_score: 0,
            last_roll: 0,
            game_over: false,
            winner: None,
        }
    }

    pub fn opponent(&self) -> Seat {
        1 - self.current_player
    }

    /// Roll the die. Rolling a 1 busts the turn and passes it; otherwise
    /// the roll accumulates into `turn_score`, and if the accumulated
    /// (unbanked) total would already reach `WINNING_SCORE`, the game ends
    /// immediately in the roller's favor — banking with `hold` is not
    /// required to win.
    pub fn roll(&mut self) -> RollOutcome {
        debug_assert!(!self.game_over, "roll called after game_over");
        let r = self.rng.random_range(1..=6);
        self.last_roll = r;
        if r == 1 {
            self.turn_score = 0;
            self.switch();
            RollOutcome::Bust
        } else {
            self.turn_score += r;
            if self.scores[self.current_player] + self.turn_score >= WINNING_SCORE {
                self.game_over = true;
                self.winner = Some(self.current_player);
            }
            RollOutcome::Accumulated
        }
    }

    /// Bank the turn's accumulated score. May end the game.
    pub fn hold(&mut self) -> HoldOutcome {
        debug_assert!(!self.game_over, "hold called after game_over");
        self.scores[self.current_player] += self.turn_score;
        self.turn_score = 0;
        self.last_roll = 0;
        if self.scores[self.current_player] >= WINNING_SCORE {
            self.game_over = true;
            self.winner = Some(self.current_player);
            HoldOutcome::Won
        } else {
            self.switch();
            HoldOutcome::TurnPassed
        }
    }

    /// Force an immediate end with an explicit winner — used for `QUIT` and
    /// for the reconnect-timeout / idle-timeout forfeits, none of which go
    /// through `roll`/`hold`.
    pub fn force_end(&mut self, winner: Seat) {
        self.game_over = true;
        self.winner = Some(winner);
    }

    fn switch(&mut self) {
        self.current_player = 1 - self.current_player;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_starts_at_zero_scores() {
        let g = GameState::init(42);
        assert_eq!(g.scores, [0, 0]);
        assert_eq!(g.turn_score, 0);
        assert!(!g.game_over);
        assert!(g.winner.is_none());
    }

    #[test]
    fn init_picks_one_of_two_starting_players() {
        let g = GameState::init(1);
        assert!(g.current_player == 0 || g.current_player == 1);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let a = GameState::init(7);
        let b = GameState::init(7);
        assert_eq!(a.current_player, b.current_player);
    }

    #[test]
    fn rolling_a_one_busts_and_switches() {
        // Find a seed that rolls a 1 on the first roll.
        let mut g = (0u64..200)
            .map(GameState::init)
            .find(|g| {
                let mut probe = g.clone();
                probe.roll() == RollOutcome::Bust
            })
            .expect("some seed in range rolls a 1 first");
        let starting_player = g.current_player;
        let outcome = g.roll();
        assert_eq!(outcome, RollOutcome::Bust);
        assert_eq!(g.turn_score, 0);
        assert_eq!(g.last_roll, 1);
        assert_ne!(g.current_player, starting_player);
    }

    #[test]
    fn rolling_above_one_accumulates_without_switching() {
        let mut g = (0u64..200)
            .map(GameState::init)
            .find(|g| {
                let mut probe = g.clone();
                probe.roll() == RollOutcome::Accumulated
            })
            .expect("some seed in range rolls above 1 first");
        let starting_player = g.current_player;
        let before = g.turn_score;
        let outcome = g.roll();
        assert_eq!(outcome, RollOutcome::Accumulated);
        assert_eq!(g.current_player, starting_player);
        assert_eq!(g.turn_score, before + g.last_roll);
    }

    #[test]
    fn rolling_past_winning_score_wins_without_a_hold() {
        let mut g = GameState::init(9);
        g.scores[g.current_player] = 28;
        g.turn_score = 0;
        let roller = g.current_player;
        let outcome = g.roll();
        if outcome == RollOutcome::Accumulated {
            assert!(g.game_over, "28 + any roll 2..=6 reaches 30");
            assert_eq!(g.winner, Some(roller));
            // turn does NOT switch once the game is won mid-turn.
            assert_eq!(g.current_player, roller);
        }
    }

    #[test]
    fn hold_banks_turn_score_and_switches_when_not_winning() {
        let mut g = GameState::init(3);
        g.turn_score = 10;
        let starting_player = g.current_player;
        let outcome = g.hold();
        assert_eq!(outcome, HoldOutcome::TurnPassed);
        assert_eq!(g.scores[starting_player], 10);
        assert_eq!(g.turn_score, 0);
        assert_ne!(g.current_player, starting_player);
        assert!(!g.game_over);
    }

    #[test]
    fn hold_reaching_winning_score_ends_the_game() {
        let mut g = GameState::init(3);
        g.scores[g.current_player] = 25;
        g.turn_score = 5;
        let starting_player = g.current_player;
        let outcome = g.hold();
        assert_eq!(outcome, HoldOutcome::Won);
        assert_eq!(g.scores[starting_player], 30);
        assert!(g.game_over);
        assert_eq!(g.winner, Some(starting_player));
        // turn does NOT switch once the game is over.
        assert_eq!(g.current_player, starting_player);
    }

    #[test]
    fn accumulating_past_winning_score_without_holding_does_not_win() {
        let mut g = GameState::init(9);
        g.scores[g.current_player] = 28;
        g.turn_score = 10; // would be 38 if ever banked
        assert!(!g.game_over);
        assert_eq!(g.winner, None);
    }

    #[test]
    fn force_end_sets_winner_directly() {
        let mut g = GameState::init(1);
        g.force_end(1);
        assert!(g.game_over);
        assert_eq!(g.winner, Some(1));
    }

    #[test]
    fn opponent_is_the_other_seat() {
        let mut g = GameState::init(1);
        g.current_player = 0;
        assert_eq!(g.opponent(), 1);
        g.current_player = 1;
        assert_eq!(g.opponent(), 0);
    }
}
