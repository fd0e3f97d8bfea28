//! Procedural level generation.
//!
//! A level is built in stages: the color count, empty bottle count and hidden segment count are
//! derived from the level index and [`Difficulty`]; `CAPACITY` copies of each color are shuffled
//! and dealt into full bottles until no bottle is already complete; empty bottles are appended.
//! When segments are hidden, the filled bottles are then repaired so that no hidden segment
//! shares its color with the lowest visible segment of its bottle, since the player could
//! otherwise infer it.
//!
//! Randomness comes from an injected [`Rng`], so a seeded [`LevelGenerator`] always produces the
//! same levels.

use std::fmt;

use log::{debug, warn};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::config::GeneratorConfig;
use crate::model::{Board, Bottle, CAPACITY, Color, GameState, RevealMask};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Normal => write!(f, "normal"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// Parameters a level was generated with. Fixed for the lifetime of the level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LevelDescriptor {
    pub level: u32,
    pub difficulty: Difficulty,
    pub num_colors: usize,
    pub num_empty_bottles: usize,
    pub hidden_count: usize,
}

/// How the hidden-conflict repair went.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RepairOutcome {
    /// Nothing is hidden on this level.
    NotNeeded,
    /// Every conflict was resolved.
    Resolved { swaps: u32, reshuffles: u32 },
    /// The attempt bound ran out. The board is still playable but some hidden segments can be
    /// inferred from the visible ones.
    Exhausted { attempts: u32, conflicts: usize },
}

impl RepairOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RepairOutcome::Exhausted { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Level {
    pub descriptor: LevelDescriptor,
    pub state: GameState,
    pub repair: RepairOutcome,
}

/// Number of colors for a level: one more every two levels early on, then one more every five.
pub fn num_colors_for_level(level: u32, config: &GeneratorConfig) -> usize {
    assert!(level >= 1, "levels start at 1");
    let level = level as usize;
    let colors = if level <= 19 {
        (3 + (level - 1) / 2).min(12)
    } else {
        12 + (level - 20) / 5 + 1
    };
    colors.min(config.max_colors)
}

/// Empty bottles for a color count. Harder tiers get fewer of them.
pub fn num_empty_bottles(num_colors: usize, difficulty: Difficulty, config: &GeneratorConfig) -> usize {
    let band = config.band_for(num_colors);
    match difficulty {
        Difficulty::Hard => band.fewest,
        Difficulty::Easy => band.most,
        Difficulty::Normal => (band.fewest + band.most).div_ceil(2),
    }
}

/// Hidden segments at the bottom of each bottle. At least one segment always stays visible.
pub fn hidden_segments_for_level(level: u32, config: &GeneratorConfig) -> usize {
    if level < config.hidden_from_level {
        return 0;
    }
    let steps = (level.saturating_sub(config.hidden_from_level) / 5 + 1) as usize;
    steps.min(CAPACITY - 1)
}

pub struct LevelGenerator<R: Rng = StdRng> {
    rng: R,
    config: GeneratorConfig,
}

impl LevelGenerator<StdRng> {
    pub fn from_seed(seed: u64, config: GeneratorConfig) -> Self {
        Self::new(StdRng::seed_from_u64(seed), config)
    }

    pub fn from_entropy(config: GeneratorConfig) -> Self {
        Self::new(StdRng::from_os_rng(), config)
    }
}

impl<R: Rng> LevelGenerator<R> {
    pub fn new(rng: R, config: GeneratorConfig) -> Self {
        Self { rng, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn descriptor(&self, level: u32, difficulty: Difficulty) -> LevelDescriptor {
        let num_colors = num_colors_for_level(level, &self.config);
        LevelDescriptor {
            level,
            difficulty,
            num_colors,
            num_empty_bottles: num_empty_bottles(num_colors, difficulty, &self.config),
            hidden_count: hidden_segments_for_level(level, &self.config),
        }
    }

    pub fn generate(&mut self, level: u32, difficulty: Difficulty) -> Level {
        let descriptor = self.descriptor(level, difficulty);
        debug!("Generating level {level} ({difficulty}): {descriptor:?}");

        let mut segments: Vec<Color> = (0..descriptor.num_colors)
            .flat_map(|c| std::iter::repeat_n(Color::new(c as u8), CAPACITY))
            .collect();
        let mut filled = self.deal(&mut segments);

        let repair = if descriptor.hidden_count > 0 {
            self.repair_hidden_conflicts(&mut filled, descriptor.hidden_count)
        } else {
            RepairOutcome::NotNeeded
        };
        if let RepairOutcome::Exhausted { attempts, conflicts } = repair {
            warn!(
                "Level {level} ({difficulty}): {conflicts} hidden conflicts left after {attempts} repair attempts"
            );
        }

        let mut bottles: Vec<Bottle> = filled.into_iter().map(Bottle::from_segments).collect();
        bottles.extend((0..descriptor.num_empty_bottles).map(|_| Bottle::new()));
        let board = Board::new(bottles);
        let mask = RevealMask::with_hidden_bottom(&board, descriptor.hidden_count);

        Level {
            descriptor,
            state: GameState::new(board, mask),
            repair,
        }
    }

    /// Shuffle the segments into full bottles, reshuffling until none is already complete.
    fn deal(&mut self, segments: &mut [Color]) -> Vec<Vec<Color>> {
        assert!(
            segments.len() >= 2 * CAPACITY,
            "a single color cannot be dealt into unsolved bottles"
        );
        let mut shuffles = 0;
        loop {
            segments.shuffle(&mut self.rng);
            shuffles += 1;
            let bottles: Vec<Vec<Color>> = segments.chunks(CAPACITY).map(<[Color]>::to_vec).collect();
            if !bottles.iter().any(|b| is_presolved(b)) {
                if shuffles > 1 {
                    debug!("Dealt bottles after {shuffles} shuffles");
                }
                return bottles;
            }
        }
    }

    fn repair_hidden_conflicts(&mut self, filled: &mut Vec<Vec<Color>>, hidden: usize) -> RepairOutcome {
        let mut swaps = 0;
        let mut reshuffles = 0;
        for _ in 0..self.config.repair_attempts {
            let Some((bi, hi)) = first_conflict(filled, hidden) else {
                return RepairOutcome::Resolved { swaps, reshuffles };
            };
            match self.find_swap(filled, bi, hi, hidden) {
                Some((bj, vi)) => {
                    debug!("Swapping hidden segment {bi}:{hi} with visible segment {bj}:{vi}");
                    let (a, b) = (filled[bi][hi], filled[bj][vi]);
                    filled[bi][hi] = b;
                    filled[bj][vi] = a;
                    swaps += 1;
                }
                None => {
                    debug!("No swap resolves the conflict at {bi}:{hi}, redealing");
                    let mut segments: Vec<Color> = filled.iter().flatten().copied().collect();
                    *filled = self.deal(&mut segments);
                    reshuffles += 1;
                }
            }
        }

        let conflicts: usize = filled.iter().map(|b| conflict_count(b, hidden)).sum();
        if conflicts == 0 {
            RepairOutcome::Resolved { swaps, reshuffles }
        } else {
            RepairOutcome::Exhausted {
                attempts: self.config.repair_attempts,
                conflicts,
            }
        }
    }

    /// Look for a visible segment in another bottle that can trade places with hidden segment
    /// `hi` of bottle `bi`. The trade must clear that conflict, must not add conflicts to the
    /// other bottle and must not leave either bottle complete.
    fn find_swap(&mut self, filled: &[Vec<Color>], bi: usize, hi: usize, hidden: usize) -> Option<(usize, usize)> {
        let mut candidates: Vec<usize> = (0..filled.len()).filter(|&j| j != bi).collect();
        candidates.shuffle(&mut self.rng);

        let before_i = conflict_count(&filled[bi], hidden);
        for bj in candidates {
            if filled[bj].len() <= hidden {
                continue;
            }
            let before_j = conflict_count(&filled[bj], hidden);
            for vi in hidden..filled[bj].len() {
                let mut after_i = filled[bi].clone();
                let mut after_j = filled[bj].clone();
                std::mem::swap(&mut after_i[hi], &mut after_j[vi]);

                let cleared = after_i[hi] != after_i[hidden] && conflict_count(&after_i, hidden) < before_i;
                if cleared
                    && conflict_count(&after_j, hidden) <= before_j
                    && !is_presolved(&after_i)
                    && !is_presolved(&after_j)
                {
                    return Some((bj, vi));
                }
            }
        }
        None
    }
}

fn is_presolved(bottle: &[Color]) -> bool {
    bottle.len() == CAPACITY && bottle.iter().all(|&c| c == bottle[0])
}

/// Hidden segments sharing a color with the lowest visible segment.
fn conflict_count(bottle: &[Color], hidden: usize) -> usize {
    if bottle.len() <= hidden {
        return 0;
    }
    let first_visible = bottle[hidden];
    bottle[..hidden].iter().filter(|&&c| c == first_visible).count()
}

fn first_conflict(filled: &[Vec<Color>], hidden: usize) -> Option<(usize, usize)> {
    filled.iter().enumerate().find_map(|(bi, bottle)| {
        if bottle.len() <= hidden {
            return None;
        }
        let first_visible = bottle[hidden];
        bottle[..hidden]
            .iter()
            .position(|&c| c == first_visible)
            .map(|hi| (bi, hi))
    })
}

/// Count hidden conflicts on a generated board. Used to check generator quality.
pub fn hidden_conflicts(board: &Board, hidden: usize) -> usize {
    board
        .bottles()
        .iter()
        .map(|b| conflict_count(b.segments(), hidden))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(seed: u64) -> LevelGenerator {
        LevelGenerator::from_seed(seed, GeneratorConfig::default())
    }

    #[test]
    fn test_color_curve_is_monotonic_and_bounded() {
        let config = GeneratorConfig::default();
        assert_eq!(num_colors_for_level(1, &config), 3);
        assert_eq!(num_colors_for_level(2, &config), 3);
        assert_eq!(num_colors_for_level(3, &config), 4);
        assert_eq!(num_colors_for_level(19, &config), 12);
        assert_eq!(num_colors_for_level(20, &config), 13);
        assert_eq!(num_colors_for_level(25, &config), 14);

        let mut previous = 0;
        for level in 1..500 {
            let colors = num_colors_for_level(level, &config);
            assert!(colors >= previous);
            assert!(colors <= config.max_colors);
            previous = colors;
        }
    }

    #[test]
    fn test_empty_bottles_follow_difficulty() {
        let config = GeneratorConfig::default();
        for colors in [3, 8, 9, 20, 24] {
            let easy = num_empty_bottles(colors, Difficulty::Easy, &config);
            let normal = num_empty_bottles(colors, Difficulty::Normal, &config);
            let hard = num_empty_bottles(colors, Difficulty::Hard, &config);
            assert!(hard >= 1);
            assert!(easy >= normal && normal >= hard);
        }
        assert_eq!(num_empty_bottles(3, Difficulty::Normal, &config), 3);
    }

    #[test]
    fn test_hidden_curve() {
        let config = GeneratorConfig::default();
        assert_eq!(hidden_segments_for_level(29, &config), 0);
        assert_eq!(hidden_segments_for_level(30, &config), 1);
        assert_eq!(hidden_segments_for_level(35, &config), 2);
        assert_eq!(hidden_segments_for_level(40, &config), 3);
        assert_eq!(hidden_segments_for_level(400, &config), CAPACITY - 1);
    }

    #[test]
    fn test_generated_level_shape() {
        let level = generator(7).generate(4, Difficulty::Easy);
        let d = level.descriptor;
        let board = level.state.board();
        assert_eq!(board.len(), d.num_colors + d.num_empty_bottles);
        assert_eq!(board.segment_count(), d.num_colors * CAPACITY);
        assert!(board.color_counts().values().all(|&n| n == CAPACITY));
        assert!(board.bottles()[..d.num_colors].iter().all(Bottle::is_full));
        assert!(board.bottles()[d.num_colors..].iter().all(Bottle::is_empty));
        assert!(!board.bottles().iter().any(|b| b.is_complete(None)));
        assert_eq!(level.repair, RepairOutcome::NotNeeded);
        assert_eq!(level.state.mask().hidden_count(), 0);
    }

    #[test]
    fn test_descriptor_json() {
        let descriptor = generator(1).descriptor(31, Difficulty::Hard);
        let json = serde_json::to_value(descriptor).unwrap();
        assert_eq!(json["difficulty"], "hard");
        assert_eq!(json["num_colors"], 15);
        assert_eq!(json["hidden_count"], 1);

        let repair = RepairOutcome::Exhausted { attempts: 200, conflicts: 2 };
        assert_eq!(
            serde_json::to_string(&repair).unwrap(),
            r#"{"Exhausted":{"attempts":200,"conflicts":2}}"#
        );
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = generator(42).generate(33, Difficulty::Hard);
        let b = generator(42).generate(33, Difficulty::Hard);
        assert_eq!(a, b);
    }

    #[test]
    fn test_hidden_levels_are_repaired() {
        let mut generator = generator(3);
        for level in 30..60 {
            let generated = generator.generate(level, Difficulty::Normal);
            let hidden = generated.descriptor.hidden_count;
            assert!(hidden > 0);
            assert_eq!(generated.state.mask().hidden_count(), hidden * generated.descriptor.num_colors);
            if let RepairOutcome::Resolved { .. } = generated.repair {
                assert_eq!(hidden_conflicts(generated.state.board(), hidden), 0);
            }
        }
    }

    #[test]
    fn test_find_swap_clears_conflict() {
        let mut generator = generator(1);
        let mut filled = vec![
            vec![Color::new(0), Color::new(1), Color::new(0), Color::new(2)],
            vec![Color::new(1), Color::new(2), Color::new(1), Color::new(2)],
            vec![Color::new(2), Color::new(0), Color::new(1), Color::new(0)],
        ];
        assert_eq!(first_conflict(&filled, 2), Some((0, 0)));
        let outcome = generator.repair_hidden_conflicts(&mut filled, 2);
        assert!(matches!(outcome, RepairOutcome::Resolved { .. }));
        assert_eq!(first_conflict(&filled, 2), None);
        let total: usize = filled.iter().map(Vec::len).sum();
        assert_eq!(total, 12);
    }

    fn sorted_segments(filled: &[Vec<Color>]) -> Vec<Color> {
        let mut segments: Vec<Color> = filled.iter().flatten().copied().collect();
        segments.sort();
        segments
    }

    #[test]
    fn test_redeal_when_no_swap_helps() {
        let (a, b) = (Color::new(0), Color::new(1));
        // The only trade for the hidden A adds a conflict to the second bottle.
        let mut filled = vec![vec![a, b, b, a], vec![b, a, a, b]];
        let colors = sorted_segments(&filled);

        let config = GeneratorConfig {
            repair_attempts: 5000,
            ..GeneratorConfig::default()
        };
        let mut generator = LevelGenerator::from_seed(11, config);
        assert_eq!(first_conflict(&filled, 3), Some((0, 0)));
        assert_eq!(generator.find_swap(&filled, 0, 0, 3), None);

        let outcome = generator.repair_hidden_conflicts(&mut filled, 3);
        match outcome {
            RepairOutcome::Resolved { reshuffles, .. } => assert!(reshuffles > 0),
            other => panic!("unexpected repair outcome {other:?}"),
        }
        assert_eq!(sorted_segments(&filled), colors);
        assert!(!filled.iter().any(|bottle| is_presolved(bottle)));
        assert_eq!(first_conflict(&filled, 3), None);
    }

    #[test]
    fn test_exhausted_repair_is_reported() {
        let config = GeneratorConfig {
            repair_attempts: 0,
            ..GeneratorConfig::default()
        };
        let mut generator = LevelGenerator::from_seed(1, config);
        let mut exhausted = 0;
        for level in 40..60 {
            let generated = generator.generate(level, Difficulty::Hard);
            let hidden = generated.descriptor.hidden_count;
            let left = hidden_conflicts(generated.state.board(), hidden);
            match generated.repair {
                RepairOutcome::Exhausted { attempts, conflicts } => {
                    assert_eq!(attempts, 0);
                    assert!(conflicts > 0);
                    assert_eq!(conflicts, left);
                    exhausted += 1;
                }
                RepairOutcome::Resolved { swaps, reshuffles } => {
                    assert_eq!((swaps, reshuffles), (0, 0));
                    assert_eq!(left, 0);
                }
                RepairOutcome::NotNeeded => panic!("level {level} has hidden segments"),
            }
        }
        assert!(exhausted > 0);
    }
}
