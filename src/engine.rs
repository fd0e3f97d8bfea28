//! Pour legality and state transitions.
//!
//! Every function here is pure: [`apply_pour`] returns a new [`GameState`] and leaves its input
//! untouched, so earlier states can be kept around as undo history.

use std::fmt;

use crate::model::{Board, CAPACITY, GameState};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

impl Move {
    pub const fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Whether the top run of bottle `from` may be poured into bottle `to`.
pub fn can_pour(board: &Board, from: usize, to: usize) -> bool {
    if from == to {
        return false;
    }
    let src = &board[from];
    let dst = &board[to];
    if src.is_empty() || dst.is_full() {
        return false;
    }
    // Moving a finished bottle into an empty one achieves nothing
    if dst.is_empty() && src.is_complete(None) {
        return false;
    }
    dst.is_empty() || src.top_color() == dst.top_color()
}

/// Number of segments a pour from `from` into `to` would move, 0 when illegal.
pub fn pour_amount(board: &Board, from: usize, to: usize) -> usize {
    if !can_pour(board, from, to) {
        return 0;
    }
    board[from].top_run_length().min(CAPACITY - board[to].len())
}

/// Pour from `from` into `to`, returning the resulting state or `None` if the pour is illegal.
///
/// Arriving segments are visible. Whatever segment ends up on top of the source bottle is
/// revealed, which is the only way hidden segments ever become visible.
pub fn apply_pour(state: &GameState, from: usize, to: usize) -> Option<GameState> {
    let amount = pour_amount(state.board(), from, to);
    if amount == 0 {
        return None;
    }

    let mut next = state.clone();
    let (board, mask) = next.parts_mut();
    for _ in 0..amount {
        let color = board.bottle_mut(from).pop()?;
        mask.bottle_mut(from).pop();
        board.bottle_mut(to).push(color);
        mask.bottle_mut(to).push(true);
    }
    if let Some(top) = mask.bottle_mut(from).last_mut() {
        *top = true;
    }
    Some(next)
}

/// Every bottle is either empty or complete with all of its segments revealed.
pub fn is_win(state: &GameState) -> bool {
    (0..state.board().len()).all(|i| state.board()[i].is_empty() || state.is_bottle_complete(i))
}

/// All legal moves in index order, sources first.
pub fn legal_moves(board: &Board) -> impl Iterator<Item = Move> + '_ {
    let n = board.len();
    (0..n)
        .flat_map(move |from| (0..n).map(move |to| Move::new(from, to)))
        .filter(move |m| can_pour(board, m.from, m.to))
}

/// No pour is possible in any direction. Hidden segments play no part in this.
pub fn is_deadlocked(board: &Board) -> bool {
    legal_moves(board).next().is_none()
}

/// First legal move from a bottle that is neither empty nor complete.
///
/// This is a greedy suggestion; it does not look ahead.
pub fn find_hint(board: &Board) -> Option<Move> {
    legal_moves(board).find(|m| !board[m.from].is_complete(None))
}

/// Number of complete bottles, counting only those whose segments are all revealed.
pub fn completed_count(state: &GameState) -> usize {
    (0..state.board().len())
        .filter(|&i| state.is_bottle_complete(i))
        .count()
}
