use std::fmt;

use crate::config::ScoringConfig;
use crate::solver::OptimalMoves;

/// Star grade between 0 and 3. Zero means the level could not be rated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stars(u8);

impl Stars {
    pub const UNRATED: Stars = Stars(0);
    pub const MAX: Stars = Stars(3);

    pub fn count(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Stars {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..Self::MAX.0 {
            f.write_str(if i < self.0 { "*" } else { "." })?;
        }
        Ok(())
    }
}

impl ScoringConfig {
    pub fn stars(&self, player_moves: u32, optimal: OptimalMoves) -> Stars {
        let optimal = match optimal {
            OptimalMoves::Known(moves) if moves > 0 => moves,
            _ => return Stars::UNRATED,
        };
        let extra = player_moves.saturating_sub(optimal);
        if extra <= allowance(optimal, self.three_star_percent, self.three_star_slack) {
            Stars(3)
        } else if extra <= allowance(optimal, self.two_star_percent, self.two_star_slack) {
            Stars(2)
        } else {
            Stars(1)
        }
    }
}

/// `ceil(percent% of optimal) + slack`
fn allowance(optimal: u32, percent: u32, slack: u32) -> u32 {
    let extra = (u64::from(optimal) * u64::from(percent)).div_ceil(100) + u64::from(slack);
    u32::try_from(extra).unwrap_or(u32::MAX)
}

/// Stars for finishing in `player_moves` with the default thresholds.
pub fn stars_from_moves(player_moves: u32, optimal: OptimalMoves) -> Stars {
    ScoringConfig::default().stars(player_moves, optimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        let optimal = OptimalMoves::Known(10);
        assert_eq!(stars_from_moves(10, optimal), Stars(3));
        assert_eq!(stars_from_moves(11, optimal), Stars(3));
        assert_eq!(stars_from_moves(13, optimal), Stars(3));
        assert_eq!(stars_from_moves(14, optimal), Stars(2));
        assert_eq!(stars_from_moves(16, optimal), Stars(2));
        assert_eq!(stars_from_moves(18, optimal), Stars(2));
        assert_eq!(stars_from_moves(19, optimal), Stars(1));
        assert_eq!(stars_from_moves(25, optimal), Stars(1));
    }

    #[test]
    fn test_fewer_moves_than_optimal_counts_as_optimal() {
        assert_eq!(stars_from_moves(3, OptimalMoves::Known(7)), Stars::MAX);
    }

    #[test]
    fn test_unrated_without_baseline() {
        assert_eq!(stars_from_moves(12, OptimalMoves::Unknown), Stars::UNRATED);
        assert_eq!(stars_from_moves(12, OptimalMoves::Known(0)), Stars::UNRATED);
    }

    #[test]
    fn test_ceil_rounding() {
        // ceil(0.1 * 11) + 2 = 4, ceil(0.25 * 11) + 5 = 8
        let optimal = OptimalMoves::Known(11);
        assert_eq!(stars_from_moves(15, optimal), Stars(3));
        assert_eq!(stars_from_moves(16, optimal), Stars(2));
        assert_eq!(stars_from_moves(19, optimal), Stars(2));
        assert_eq!(stars_from_moves(20, optimal), Stars(1));
    }

    #[test]
    fn test_large_thresholds_do_not_overflow() {
        let config = ScoringConfig {
            three_star_percent: u32::MAX,
            three_star_slack: u32::MAX,
            ..ScoringConfig::default()
        };
        assert_eq!(config.stars(u32::MAX, OptimalMoves::Known(u32::MAX / 2)), Stars::MAX);
        assert_eq!(allowance(u32::MAX, 100, 0), u32::MAX);
        assert_eq!(allowance(1000, 10, 2), 102);
    }

    #[test]
    fn test_display() {
        assert_eq!(Stars(2).to_string(), "**.");
        assert_eq!(Stars::UNRATED.to_string(), "...");
    }
}
