//! Session controller: one level at a time, driven by player actions.
//!
//! The session owns the current [`GameState`], the undo history and the selection. Each level
//! start dispatches a [`SolverJob`] tagged with a fresh ticket; results carrying an older ticket
//! are discarded, so a slow solve for an abandoned level never rates the current one.

use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, info};

use crate::config::Config;
use crate::engine::{self, Move};
use crate::generator::{Difficulty, Level, LevelDescriptor, LevelGenerator, RepairOutcome};
use crate::model::{CAPACITY, Color, GameState};
use crate::scoring::Stars;
use crate::solver::{OptimalMoves, SolverJob, SolverReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    None,
    Bottle(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControlAction {
    /// Tap a bottle: select it, clear the selection, or pour the selection into it.
    Tap(usize),
    Deselect,
    Pour(usize, usize),
    Undo,
    Hint,
    /// Replay the level from a fresh board. Breaks the streak.
    Restart,
    NextLevel,
    /// Jump to an arbitrary level. Breaks the streak.
    JumpTo(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Ignored,
    Selected(usize),
    Deselected,
    Poured {
        mv: Move,
        amount: usize,
        /// The destination became complete.
        completed: bool,
    },
    /// The pour was illegal. The bottle is the one that was tapped.
    Rejected { bottle: usize },
    Undone,
    Hint(Move),
    NoHint,
    Won(WinSummary),
    LevelStarted(LevelDescriptor),
}

/// Snapshot taken before each pour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub state: GameState,
    pub moves: u32,
}

/// Everything the persistence layer needs to record a finished level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WinSummary {
    pub level: u32,
    pub difficulty: Difficulty,
    pub moves: u32,
    pub optimal: OptimalMoves,
    pub stars: Stars,
    pub streak: u32,
}

pub struct GameSession {
    config: Config,
    generator: LevelGenerator,
    difficulty: Difficulty,
    level: Level,
    state: GameState,
    moves: u32,
    history: Vec<HistoryEntry>,
    selected: Selection,
    hints_left: u32,
    streak: u32,
    won: Option<WinSummary>,
    ticket: u64,
    optimal: Option<OptimalMoves>,
    solver_job: Option<SolverJob>,
    report_sender: Sender<SolverReport>,
    reports: Receiver<SolverReport>,
}

impl GameSession {
    pub fn new(config: Config, mut generator: LevelGenerator, difficulty: Difficulty, level: u32) -> Self {
        let (report_sender, reports) = mpsc::channel();
        let generated = generator.generate(level.max(1), difficulty);
        let mut session = Self {
            state: generated.state.clone(),
            level: generated,
            hints_left: config.hints_per_level,
            config,
            generator,
            difficulty,
            moves: 0,
            history: Vec::new(),
            selected: Selection::None,
            streak: 0,
            won: None,
            ticket: 0,
            optimal: None,
            solver_job: None,
            report_sender,
            reports,
        };
        session.dispatch_solver();
        session
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn descriptor(&self) -> LevelDescriptor {
        self.level.descriptor
    }

    pub fn repair_outcome(&self) -> RepairOutcome {
        self.level.repair
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn selected(&self) -> Selection {
        self.selected
    }

    pub fn hints_left(&self) -> u32 {
        self.hints_left
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn won(&self) -> Option<&WinSummary> {
        self.won.as_ref()
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// No pour is possible and the level is not won.
    pub fn is_deadlocked(&self) -> bool {
        self.won.is_none() && !engine::is_win(&self.state) && engine::is_deadlocked(self.state.board())
    }

    /// Completed bottles out of the number of colors.
    pub fn progress(&self) -> (usize, usize) {
        (engine::completed_count(&self.state), self.level.descriptor.num_colors)
    }

    /// Amount and color that pouring the selected bottle into `to` would move.
    pub fn pour_preview(&self, to: usize) -> Option<(usize, Color)> {
        let Selection::Bottle(from) = self.selected else {
            return None;
        };
        let amount = engine::pour_amount(self.state.board(), from, to);
        if amount == 0 {
            return None;
        }
        self.state.board()[from].top_color().map(|c| (amount, c))
    }

    /// Optimal moves for the current level, if the background solve has reported.
    pub fn optimal_moves(&mut self) -> Option<OptimalMoves> {
        self.poll_solver();
        self.optimal
    }

    pub fn handle_game_action(&mut self, action: ControlAction) -> ActionOutcome {
        if self.won.is_some()
            && !matches!(
                action,
                ControlAction::Restart | ControlAction::NextLevel | ControlAction::JumpTo(_)
            )
        {
            return ActionOutcome::Ignored;
        }
        match action {
            ControlAction::Tap(index) => self.tap(index),
            ControlAction::Deselect => {
                self.selected = Selection::None;
                ActionOutcome::Deselected
            }
            ControlAction::Pour(from, to) => self.pour(from, to),
            ControlAction::Undo => self.undo(),
            ControlAction::Hint => self.hint(),
            ControlAction::Restart => {
                self.streak = 0;
                self.start_level(self.level.descriptor.level)
            }
            ControlAction::NextLevel => self.start_level(self.level.descriptor.level + 1),
            ControlAction::JumpTo(level) => {
                self.streak = 0;
                self.start_level(level.max(1))
            }
        }
    }

    fn tap(&mut self, index: usize) -> ActionOutcome {
        match self.selected {
            Selection::None => {
                if self.state.board()[index].is_empty() || self.state.is_bottle_complete(index) {
                    ActionOutcome::Ignored
                } else {
                    self.selected = Selection::Bottle(index);
                    ActionOutcome::Selected(index)
                }
            }
            Selection::Bottle(from) if from == index => {
                self.selected = Selection::None;
                ActionOutcome::Deselected
            }
            Selection::Bottle(from) => self.pour(from, index),
        }
    }

    fn pour(&mut self, from: usize, to: usize) -> ActionOutcome {
        self.selected = Selection::None;
        let amount = engine::pour_amount(self.state.board(), from, to);
        let Some(next) = engine::apply_pour(&self.state, from, to) else {
            return ActionOutcome::Rejected { bottle: to };
        };

        self.push_undo_state();
        self.state = next;
        self.moves += 1;

        if engine::is_win(&self.state) {
            return ActionOutcome::Won(self.win());
        }
        ActionOutcome::Poured {
            mv: Move::new(from, to),
            amount,
            completed: self.state.is_bottle_complete(to),
        }
    }

    fn push_undo_state(&mut self) {
        self.history.push(HistoryEntry {
            state: self.state.clone(),
            moves: self.moves,
        });
    }

    fn undo(&mut self) -> ActionOutcome {
        let Some(previous) = self.history.pop() else {
            return ActionOutcome::Ignored;
        };
        self.state = previous.state;
        self.moves = previous.moves;
        self.selected = Selection::None;
        ActionOutcome::Undone
    }

    fn hint(&mut self) -> ActionOutcome {
        if self.hints_left == 0 {
            return ActionOutcome::NoHint;
        }
        match engine::find_hint(self.state.board()) {
            Some(mv) => {
                self.hints_left -= 1;
                ActionOutcome::Hint(mv)
            }
            None => ActionOutcome::NoHint,
        }
    }

    fn win(&mut self) -> WinSummary {
        self.streak += 1;
        let optimal = self.wait_for_optimal();
        let descriptor = self.level.descriptor;
        let summary = WinSummary {
            level: descriptor.level,
            difficulty: descriptor.difficulty,
            moves: self.moves,
            optimal,
            stars: self.config.scoring.stars(self.moves, optimal),
            streak: self.streak,
        };
        info!(
            "Level {} won in {} moves (optimal {}), {}",
            summary.level, summary.moves, summary.optimal, summary.stars
        );
        self.won = Some(summary);
        summary
    }

    fn start_level(&mut self, level: u32) -> ActionOutcome {
        self.level = self.generator.generate(level, self.difficulty);
        self.state = self.level.state.clone();
        self.moves = 0;
        self.history.clear();
        self.selected = Selection::None;
        self.hints_left = self.config.hints_per_level;
        self.won = None;
        self.dispatch_solver();
        info!("Started level {level} ({})", self.difficulty);
        ActionOutcome::LevelStarted(self.level.descriptor)
    }

    fn dispatch_solver(&mut self) {
        if let Some(job) = self.solver_job.take() {
            job.cancel();
        }
        self.ticket += 1;
        self.optimal = None;
        self.solver_job = Some(SolverJob::spawn(
            self.ticket,
            self.level.state.board().clone(),
            CAPACITY,
            self.config.solver.clone(),
            self.report_sender.clone(),
        ));
    }

    fn accept(&mut self, report: SolverReport) -> bool {
        if report.ticket != self.ticket {
            debug!(
                "Discarding solver result for ticket {} (current is {})",
                report.ticket, self.ticket
            );
            return false;
        }
        self.optimal = Some(report.optimal);
        self.solver_job = None;
        true
    }

    /// Drain finished solver reports without blocking.
    pub fn poll_solver(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            self.accept(report);
        }
    }

    /// Block until the current level's solve reports. The solve is bounded by its state budget.
    fn wait_for_optimal(&mut self) -> OptimalMoves {
        self.poll_solver();
        while self.optimal.is_none() {
            match self.reports.recv() {
                Ok(report) => {
                    self.accept(report);
                }
                Err(_) => return OptimalMoves::Unknown,
            }
        }
        self.optimal.unwrap_or(OptimalMoves::Unknown)
    }
}
