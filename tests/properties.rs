use rand::prelude::*;
use rand::rngs::StdRng;

use water_sort_engine::config::GeneratorConfig;
use water_sort_engine::engine::legal_moves;
use water_sort_engine::generator::hidden_conflicts;
use water_sort_engine::{
    Board, CAPACITY, Config, Difficulty, GameState, LevelGenerator, OptimalMoves, RepairOutcome,
    apply_pour, can_pour, is_win, solve,
};

const TIERS: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

#[test]
fn generated_levels_are_valid() {
    for (t, difficulty) in TIERS.into_iter().enumerate() {
        let mut generator = LevelGenerator::from_seed(t as u64, GeneratorConfig::default());
        for i in 0..1000u32 {
            let level = generator.generate(i % 60 + 1, difficulty);
            let d = level.descriptor;
            let board = level.state.board();
            assert!(
                !board.bottles().iter().any(|b| b.is_complete(None)),
                "level {} starts with a complete bottle: {board}",
                d.level
            );
            assert!(board.bottles().iter().all(|b| b.len() <= CAPACITY));
            assert_eq!(board.len(), d.num_colors + d.num_empty_bottles);
            assert!(d.num_empty_bottles >= 1);
            assert!(d.hidden_count < CAPACITY);
            if let RepairOutcome::Resolved { .. } = level.repair {
                assert_eq!(hidden_conflicts(board, d.hidden_count), 0);
            }
        }
    }
}

#[test]
fn random_play_conserves_segments_and_only_reveals() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut generator = LevelGenerator::from_seed(5, GeneratorConfig::default());
    for level in [1, 12, 30, 36, 45] {
        let mut state = generator.generate(level, Difficulty::Hard).state;
        let colors = state.board().color_counts();
        for _ in 0..200 {
            let moves: Vec<_> = legal_moves(state.board()).collect();
            let Some(&mv) = moves.choose(&mut rng) else {
                break;
            };
            let next = apply_pour(&state, mv.from, mv.to).expect("legal move applies");
            assert_eq!(next.board().color_counts(), colors);
            for (i, bottle) in next.board().bottles().iter().enumerate() {
                let mask = next.mask().bottle(i);
                assert_eq!(mask.len(), bottle.len());
                // Segments below the touched tops keep their visibility or become revealed
                let untouched = state.board()[i].len().min(bottle.len());
                for s in 0..untouched {
                    if state.mask().is_revealed(i, s) {
                        assert!(mask[s], "segment {i}:{s} was hidden again");
                    }
                }
            }
            assert!(next.mask().hidden_count() <= state.mask().hidden_count());
            state = next;
        }
    }
}

#[test]
fn self_pour_is_never_legal() {
    let mut generator = LevelGenerator::from_seed(8, GeneratorConfig::default());
    for level in 1..40 {
        let board = generator.generate(level, Difficulty::Normal).state.board().clone();
        for i in 0..board.len() {
            assert!(!can_pour(&board, i, i));
        }
    }
}

#[test]
fn solver_is_deterministic_and_replayable() {
    let config = Config::default();
    let mut generator = LevelGenerator::from_seed(21, config.generator.clone());
    for level in 1..6 {
        let board = generator.generate(level, Difficulty::Easy).state.board().clone();
        let first = solve(&board, CAPACITY, &config.solver);
        assert_eq!(solve(&board, CAPACITY, &config.solver), first);
        if let OptimalMoves::Known(moves) = first {
            assert!(moves > 0);
        }
    }
}

#[test]
fn solved_board_needs_no_moves() {
    let board: Board = "AAAA BBBB . .".parse().unwrap();
    assert!(is_win(&GameState::revealed(board.clone())));
    assert_eq!(solve(&board, CAPACITY, &Config::default().solver), OptimalMoves::Known(0));
}
