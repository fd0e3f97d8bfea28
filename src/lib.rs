//! Water sort puzzle core.
//!
//! * [`model`]: bottles, boards and reveal masks.
//! * [`engine`]: pour legality, pour execution, win and deadlock detection, hints.
//! * [`generator`]: levels tuned by level index and [`generator::Difficulty`].
//! * [`solver`]: bounded breadth-first search for the optimal number of pours.
//! * [`scoring`]: star rating from the player's moves and the optimum.
//! * [`gameplay`]: a session controller tying the pieces together for a front end.

pub mod config;
pub mod engine;
pub mod error;
pub mod gameplay;
pub mod generator;
pub mod model;
pub mod scoring;
pub mod solver;

pub use config::Config;
pub use engine::{Move, apply_pour, can_pour, find_hint, is_deadlocked, is_win, pour_amount};
pub use error::{ConfigError, ParseBoardError};
pub use gameplay::{ActionOutcome, ControlAction, GameSession, WinSummary};
pub use generator::{Difficulty, Level, LevelDescriptor, LevelGenerator, RepairOutcome};
pub use model::{Board, Bottle, CAPACITY, Color, GameState, RevealMask};
pub use scoring::{Stars, stars_from_moves};
pub use solver::{OptimalMoves, Solver, solve};
