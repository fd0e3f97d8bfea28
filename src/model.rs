//! Bottles, boards and reveal masks.
//!
//! A [`Bottle`] is a stack of [`Color`] segments read bottom to top and never holds more than
//! [`CAPACITY`] of them. A [`Board`] is the ordered list of bottles of one level, and a
//! [`RevealMask`] records which segments the player can currently see.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use crate::error::ParseBoardError;

/// Number of segments a bottle can hold.
pub const CAPACITY: usize = 4;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Color(u8);

impl Color {
    pub const fn new(id: u8) -> Self {
        Color(id)
    }

    pub const fn id(self) -> u8 {
        self.0
    }

    /// Convert a letter sequence like "A", "Z", "AA" into a color.
    /// Uses Excel-style base-26 numbering: A=0, B=1, ..., Z=25, AA=26, AB=27, ...
    pub fn from_letters(s: &str) -> Option<Self> {
        let mut acc: usize = 0;
        let mut saw_any = false;

        for ch in s.chars() {
            if !ch.is_ascii_alphabetic() {
                return None;
            }
            let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize;
            acc = acc.checked_mul(26)?.checked_add(digit + 1)?;
            saw_any = true;
        }

        if !saw_any {
            return None;
        }
        u8::try_from(acc - 1).ok().map(Color)
    }

    pub fn letters(self) -> String {
        let mut chars = Vec::new();
        let mut id = self.0 as usize + 1;
        while id > 0 {
            let rem = (id - 1) % 26;
            chars.push((b'A' + rem as u8) as char);
            id = (id - 1) / 26;
        }
        chars.iter().rev().collect()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bottle {
    segments: Vec<Color>,
}

impl Bottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bottle from segments listed bottom to top.
    ///
    /// Panics when more than [`CAPACITY`] segments are given.
    pub fn from_segments(segments: Vec<Color>) -> Self {
        assert!(
            segments.len() <= CAPACITY,
            "bottle holds {} segments, capacity is {CAPACITY}",
            segments.len()
        );
        Self { segments }
    }

    pub fn segments(&self) -> &[Color] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.segments.len() == CAPACITY
    }

    pub fn empty_space(&self) -> usize {
        CAPACITY - self.segments.len()
    }

    /// Color of the topmost segment, `None` for an empty bottle.
    pub fn top_color(&self) -> Option<Color> {
        self.segments.last().copied()
    }

    /// Number of consecutive segments at the top sharing the top color.
    pub fn top_run_length(&self) -> usize {
        let Some(top) = self.top_color() else {
            return 0;
        };
        self.segments
            .iter()
            .rev()
            .take_while(|&&c| c == top)
            .count()
    }

    pub fn is_single_color(&self) -> bool {
        match self.segments.first() {
            Some(first) => self.segments.iter().all(|c| c == first),
            None => false,
        }
    }

    /// A full single-colored bottle whose segments, if a mask is given, are all revealed.
    pub fn is_complete(&self, mask: Option<&[bool]>) -> bool {
        self.is_full() && self.is_single_color() && mask.is_none_or(|m| m.iter().all(|&r| r))
    }

    pub(crate) fn push(&mut self, color: Color) {
        assert!(!self.is_full(), "pouring into a full bottle");
        self.segments.push(color);
    }

    pub(crate) fn pop(&mut self) -> Option<Color> {
        self.segments.pop()
    }

    fn write_letters(&self, f: &mut fmt::Formatter, mask: Option<&[bool]>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(".");
        }
        let labels: Vec<String> = self
            .segments
            .iter()
            .enumerate()
            .map(|(i, c)| match mask {
                Some(m) if !m[i] => "?".to_string(),
                _ => c.letters(),
            })
            .collect();
        if labels.iter().any(|s| s.len() > 1) {
            // A trailing comma keeps a lone multi-letter segment from reading as several colors.
            write!(f, "{},", labels.join(","))
        } else {
            f.write_str(&labels.concat())
        }
    }
}

impl fmt::Display for Bottle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write_letters(f, None)
    }
}

/// The bottles of a level. Indices stay stable for the whole level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Board {
    bottles: Vec<Bottle>,
}

impl Board {
    pub fn new(bottles: Vec<Bottle>) -> Self {
        Self { bottles }
    }

    /// Build a board from raw color ids, one vector per bottle.
    pub fn from_ids(bottles: &[&[u8]]) -> Self {
        Self::new(
            bottles
                .iter()
                .map(|ids| Bottle::from_segments(ids.iter().map(|&id| Color::new(id)).collect()))
                .collect(),
        )
    }

    pub fn bottles(&self) -> &[Bottle] {
        &self.bottles
    }

    pub fn len(&self) -> usize {
        self.bottles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bottles.is_empty()
    }

    pub fn filled_count(&self) -> usize {
        self.bottles.iter().filter(|b| !b.is_empty()).count()
    }

    pub fn segment_count(&self) -> usize {
        self.bottles.iter().map(Bottle::len).sum()
    }

    /// Number of segments of each color on the board.
    pub fn color_counts(&self) -> BTreeMap<Color, usize> {
        let mut counts = BTreeMap::new();
        for color in self.bottles.iter().flat_map(|b| b.segments()) {
            *counts.entry(*color).or_insert(0) += 1;
        }
        counts
    }

    pub(crate) fn bottle_mut(&mut self, index: usize) -> &mut Bottle {
        &mut self.bottles[index]
    }

    fn write_bottles(&self, f: &mut fmt::Formatter, mask: Option<&RevealMask>) -> fmt::Result {
        for (i, bottle) in self.bottles.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            bottle.write_letters(f, mask.map(|m| m.bottle(i)))?;
        }
        Ok(())
    }
}

impl Index<usize> for Board {
    type Output = Bottle;

    fn index(&self, index: usize) -> &Bottle {
        &self.bottles[index]
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write_bottles(f, None)
    }
}

impl FromStr for Board {
    type Err = ParseBoardError;

    /// Bottles are separated by whitespace and listed bottom to top, `.` is an empty bottle.
    /// Colors are single letters, or comma separated when a bottle uses multi-letter colors.
    fn from_str(repr: &str) -> Result<Self, Self::Err> {
        let mut bottles = Vec::new();
        for (index, token) in repr.split_whitespace().enumerate() {
            let labels: Vec<String> = if token == "." {
                Vec::new()
            } else if token.contains(',') {
                let labels: Vec<String> = token
                    .strip_suffix(',')
                    .unwrap_or(token)
                    .split(',')
                    .map(str::to_string)
                    .collect();
                if labels.iter().any(String::is_empty) {
                    return Err(ParseBoardError::UnknownColor(String::new()));
                }
                labels
            } else {
                token.chars().map(|c| c.to_string()).collect()
            };
            if labels.len() > CAPACITY {
                return Err(ParseBoardError::Overfull {
                    index,
                    len: labels.len(),
                    capacity: CAPACITY,
                });
            }
            let segments = labels
                .iter()
                .map(|l| Color::from_letters(l).ok_or_else(|| ParseBoardError::UnknownColor(l.clone())))
                .collect::<Result<Vec<_>, _>>()?;
            bottles.push(Bottle::from_segments(segments));
        }
        if bottles.is_empty() {
            return Err(ParseBoardError::Empty);
        }
        Ok(Board::new(bottles))
    }
}

/// Per-segment visibility, shaped exactly like the board it belongs to.
///
/// Entries only ever go from hidden to revealed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RevealMask {
    bottles: Vec<Vec<bool>>,
}

impl RevealMask {
    pub fn all_revealed(board: &Board) -> Self {
        Self {
            bottles: board.bottles().iter().map(|b| vec![true; b.len()]).collect(),
        }
    }

    /// Hide the bottom `hidden` segments of every non-empty bottle.
    pub fn with_hidden_bottom(board: &Board, hidden: usize) -> Self {
        Self {
            bottles: board
                .bottles()
                .iter()
                .map(|b| (0..b.len()).map(|i| i >= hidden).collect())
                .collect(),
        }
    }

    pub fn bottle(&self, index: usize) -> &[bool] {
        &self.bottles[index]
    }

    pub fn is_revealed(&self, bottle: usize, segment: usize) -> bool {
        self.bottles[bottle][segment]
    }

    pub fn hidden_count(&self) -> usize {
        self.bottles.iter().flatten().filter(|&&r| !r).count()
    }

    pub(crate) fn bottle_mut(&mut self, index: usize) -> &mut Vec<bool> {
        &mut self.bottles[index]
    }

    fn fits(&self, board: &Board) -> bool {
        self.bottles.len() == board.len()
            && self
                .bottles
                .iter()
                .zip(board.bottles())
                .all(|(m, b)| m.len() == b.len())
    }
}

/// A board together with what the player knows about it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GameState {
    board: Board,
    mask: RevealMask,
}

impl GameState {
    /// Panics when the mask is not shaped like the board.
    pub fn new(board: Board, mask: RevealMask) -> Self {
        assert!(mask.fits(&board), "reveal mask does not match the board");
        Self { board, mask }
    }

    pub fn revealed(board: Board) -> Self {
        let mask = RevealMask::all_revealed(&board);
        Self { board, mask }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn mask(&self) -> &RevealMask {
        &self.mask
    }

    pub fn is_bottle_complete(&self, index: usize) -> bool {
        self.board[index].is_complete(Some(self.mask.bottle(index)))
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Board, &mut RevealMask) {
        (&mut self.board, &mut self.mask)
    }

    /// Text form of the board as the player sees it, hidden segments shown as `?`.
    pub fn masked(&self) -> Masked<'_> {
        Masked(self)
    }
}

pub struct Masked<'a>(&'a GameState);

impl fmt::Display for Masked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.board.write_bottles(f, Some(&self.0.mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bottle(ids: &[u8]) -> Bottle {
        Bottle::from_segments(ids.iter().map(|&i| Color::new(i)).collect())
    }

    #[test]
    fn test_color_letters() {
        assert_eq!(Color::new(0).letters(), "A");
        assert_eq!(Color::new(25).letters(), "Z");
        assert_eq!(Color::new(26).letters(), "AA");
        assert_eq!(Color::from_letters("ab"), Some(Color::new(27)));
        assert_eq!(Color::from_letters("?"), None);
        assert_eq!(Color::from_letters("ZZZ"), None);
    }

    #[test]
    fn test_top_queries() {
        let b = bottle(&[0, 1, 1]);
        assert_eq!(b.top_color(), Some(Color::new(1)));
        assert_eq!(b.top_run_length(), 2);
        assert!(!b.is_single_color());

        let empty = Bottle::new();
        assert_eq!(empty.top_color(), None);
        assert_eq!(empty.top_run_length(), 0);
        assert!(!empty.is_single_color());
    }

    #[test]
    fn test_completion_respects_mask() {
        let b = bottle(&[2, 2, 2, 2]);
        assert!(b.is_complete(None));
        assert!(b.is_complete(Some(&[true; 4])));
        assert!(!b.is_complete(Some(&[false, true, true, true])));
        assert!(!bottle(&[2, 2, 2]).is_complete(None));
        assert!(!bottle(&[2, 2, 2, 1]).is_complete(None));
    }

    #[test]
    #[should_panic]
    fn test_overfull_bottle_panics() {
        bottle(&[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_board_text_representation() {
        let board: Board = "AABB BA . B".parse().unwrap();
        assert_eq!(board.len(), 4);
        assert_eq!(board[0].segments(), bottle(&[0, 0, 1, 1]).segments());
        assert!(board[2].is_empty());
        assert_eq!(board.to_string(), "AABB BA . B");

        let wide = Board::from_ids(&[&[26], &[0, 27]]);
        let text = wide.to_string();
        assert_eq!(text, "AA, A,AB,");
        assert_eq!(text.parse::<Board>().unwrap(), wide);
    }

    #[test]
    fn test_board_parse_errors() {
        assert_eq!("".parse::<Board>(), Err(ParseBoardError::Empty));
        assert_eq!(
            "AAAAA".parse::<Board>(),
            Err(ParseBoardError::Overfull { index: 0, len: 5, capacity: CAPACITY })
        );
        assert_eq!(
            "A1".parse::<Board>(),
            Err(ParseBoardError::UnknownColor("1".to_string()))
        );
        for repr in [",", "A,,B", ",A", "AA,,"] {
            assert_eq!(
                repr.parse::<Board>(),
                Err(ParseBoardError::UnknownColor(String::new())),
                "{repr}"
            );
        }
        assert_eq!("A,B".parse::<Board>().unwrap(), Board::from_ids(&[&[0, 1]]));
    }

    #[test]
    fn test_masked_output() {
        let board = Board::from_ids(&[&[0, 1, 2, 2], &[]]);
        let state = GameState::new(board.clone(), RevealMask::with_hidden_bottom(&board, 2));
        assert_eq!(state.masked().to_string(), "??CC .");
        assert_eq!(state.mask().hidden_count(), 2);
    }

    #[test]
    #[should_panic]
    fn test_mismatched_mask_panics() {
        let board = Board::from_ids(&[&[0, 1]]);
        let other = Board::from_ids(&[&[0]]);
        GameState::new(board, RevealMask::all_revealed(&other));
    }
}
