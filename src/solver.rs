//! Bounded breadth-first search for the fewest pours that solve a board.
//!
//! States are deduplicated on a canonical key that ignores bottle order, so two boards that
//! only differ by a permutation of their bottles are visited once. The search gives up once
//! the visited set reaches a budget picked from the number of non-empty bottles, and answers
//! [`OptimalMoves::Unknown`] in that case.
//!
//! [`Solver`] can be driven in slices with [`Solver::step`], which lets [`SolverJob`] run it on
//! the rayon pool and stop early when the level it was started for is abandoned.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
};

use log::debug;
use serde::Serialize;

use crate::config::SolverConfig;
use crate::model::Board;

/// Largest bottle capacity the solver can represent.
pub const MAX_SOLVER_CAPACITY: usize = 8;

/// States expanded between two checks of the cancellation flag.
const SLICE: usize = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OptimalMoves {
    Known(u32),
    /// The budget ran out, the board was too large to try, or it has no solution.
    Unknown,
}

impl OptimalMoves {
    pub fn known(self) -> Option<u32> {
        match self {
            OptimalMoves::Known(moves) => Some(moves),
            OptimalMoves::Unknown => None,
        }
    }
}

impl fmt::Display for OptimalMoves {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptimalMoves::Known(moves) => write!(f, "{moves}"),
            OptimalMoves::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Done(OptimalMoves),
}

/// Fixed-size bottle. Slots above `len` are always zero so derived equality and ordering only
/// depend on the contents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Tube {
    len: u8,
    slots: [u8; MAX_SOLVER_CAPACITY],
}

impl Tube {
    fn from_segments(colors: impl Iterator<Item = u8>) -> Self {
        let mut tube = Tube {
            len: 0,
            slots: [0; MAX_SOLVER_CAPACITY],
        };
        for color in colors {
            tube.push(color);
        }
        tube
    }

    fn len(&self) -> usize {
        self.len as usize
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn top(&self) -> u8 {
        self.slots[self.len() - 1]
    }

    fn top_run(&self) -> usize {
        let top = self.top();
        self.slots[..self.len()]
            .iter()
            .rev()
            .take_while(|&&c| c == top)
            .count()
    }

    fn is_single_color(&self) -> bool {
        !self.is_empty() && self.slots[..self.len()].iter().all(|&c| c == self.slots[0])
    }

    fn is_complete(&self, capacity: usize) -> bool {
        self.len() == capacity && self.is_single_color()
    }

    fn push(&mut self, color: u8) {
        self.slots[self.len()] = color;
        self.len += 1;
    }

    fn pop(&mut self) -> u8 {
        self.len -= 1;
        std::mem::take(&mut self.slots[self.len()])
    }
}

type State = Vec<Tube>;

fn canonical_key(state: &State) -> Box<[Tube]> {
    let mut key = state.clone().into_boxed_slice();
    key.sort_unstable();
    key
}

fn is_solved(state: &State, capacity: usize) -> bool {
    state.iter().all(|t| t.is_empty() || t.is_complete(capacity))
}

pub struct Solver {
    capacity: usize,
    budget: usize,
    queue: VecDeque<(State, u32)>,
    visited: HashSet<Box<[Tube]>>,
    outcome: Option<OptimalMoves>,
}

impl Solver {
    /// Panics if `capacity` exceeds [`MAX_SOLVER_CAPACITY`] or a bottle holds more than
    /// `capacity` segments.
    pub fn new(board: &Board, capacity: usize, config: &SolverConfig) -> Self {
        assert!(capacity <= MAX_SOLVER_CAPACITY, "capacity {capacity} is too large for the solver");
        assert!(
            board.bottles().iter().all(|b| b.len() <= capacity),
            "bottle holds more than {capacity} segments"
        );

        let budget = config.budget_for(board.filled_count());
        let initial: State = board
            .bottles()
            .iter()
            .map(|b| Tube::from_segments(b.segments().iter().map(|c| c.id())))
            .collect();

        let mut solver = Solver {
            capacity,
            budget,
            queue: VecDeque::new(),
            visited: HashSet::new(),
            outcome: None,
        };
        if budget == 0 {
            debug!("Board with {} filled bottles is too large to solve", board.filled_count());
            solver.outcome = Some(OptimalMoves::Unknown);
        } else if is_solved(&initial, capacity) {
            solver.outcome = Some(OptimalMoves::Known(0));
        } else {
            solver.visited.insert(canonical_key(&initial));
            solver.queue.push_back((initial, 0));
        }
        solver
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    /// Expand at most `limit` states. Slicing the search does not change its answer.
    pub fn step(&mut self, limit: usize) -> Progress {
        for _ in 0..limit {
            if let Some(outcome) = self.outcome {
                return Progress::Done(outcome);
            }
            self.expand_next();
        }
        match self.outcome {
            Some(outcome) => Progress::Done(outcome),
            None => Progress::Pending,
        }
    }

    pub fn run(mut self) -> OptimalMoves {
        loop {
            if let Progress::Done(outcome) = self.step(usize::MAX) {
                return outcome;
            }
        }
    }

    fn finish(&mut self, outcome: OptimalMoves) {
        debug!("Solver finished: {outcome} after visiting {} states", self.visited.len());
        self.outcome = Some(outcome);
        self.queue.clear();
    }

    fn expand_next(&mut self) {
        if self.visited.len() >= self.budget {
            self.finish(OptimalMoves::Unknown);
            return;
        }
        let Some((state, depth)) = self.queue.pop_front() else {
            self.finish(OptimalMoves::Unknown);
            return;
        };

        let capacity = self.capacity;
        for i in 0..state.len() {
            let src = state[i];
            if src.is_empty() || src.is_complete(capacity) {
                continue;
            }
            let top = src.top();
            let run = src.top_run();
            for j in 0..state.len() {
                if i == j {
                    continue;
                }
                let dst = state[j];
                if dst.len() >= capacity {
                    continue;
                }
                if !dst.is_empty() && dst.top() != top {
                    continue;
                }
                // Moving a single-colored bottle into an empty one only permutes the board
                if dst.is_empty() && src.is_single_color() {
                    continue;
                }

                let mut next = state.clone();
                for _ in 0..run.min(capacity - dst.len()) {
                    let color = next[i].pop();
                    next[j].push(color);
                }
                if !self.visited.insert(canonical_key(&next)) {
                    continue;
                }
                if is_solved(&next, capacity) {
                    self.finish(OptimalMoves::Known(depth + 1));
                    return;
                }
                self.queue.push_back((next, depth + 1));
            }
        }
    }
}

/// Fewest pours solving `board`, or [`OptimalMoves::Unknown`] when the search gives up.
pub fn solve(board: &Board, capacity: usize, config: &SolverConfig) -> OptimalMoves {
    Solver::new(board, capacity, config).run()
}

/// Result of a background solve, tagged with the ticket of the level it was started for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SolverReport {
    pub ticket: u64,
    pub optimal: OptimalMoves,
}

/// A solve running on the rayon pool. Dropping the job cancels it.
pub struct SolverJob {
    ticket: u64,
    cancelled: Arc<AtomicBool>,
}

impl SolverJob {
    pub fn spawn(
        ticket: u64,
        board: Board,
        capacity: usize,
        config: SolverConfig,
        reports: Sender<SolverReport>,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        rayon::spawn(move || {
            let mut solver = Solver::new(&board, capacity, &config);
            let optimal = loop {
                if flag.load(Ordering::Relaxed) {
                    debug!("Solver job {ticket} cancelled after {} states", solver.visited());
                    return;
                }
                if let Progress::Done(optimal) = solver.step(SLICE) {
                    break optimal;
                }
            };
            // The receiver is gone when the session was dropped; nothing to report to
            let _ = reports.send(SolverReport { ticket, optimal });
        });
        Self { ticket, cancelled }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Drop for SolverJob {
    fn drop(&mut self) {
        self.cancel();
    }
}
