//! A1-style cell references.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static CELL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]+)([0-9]+)$").expect("cell reference pattern is valid")
});

/// Inclusive rectangle of 1-based column/row numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub min_col: u32,
    pub min_row: u32,
    pub max_col: u32,
    pub max_row: u32,
}

impl CellRange {
    /// Parses `"A1:C10"` (or a single cell `"B7"`). Whitespace is ignored,
    /// letters are case-insensitive and reversed corners are normalized.
    pub fn parse(spec: &str) -> Result<Self> {
        let cleaned: String = spec
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        let (start, end) = match cleaned.split_once(':') {
            Some((start, end)) => (start, end),
            None => (cleaned.as_str(), cleaned.as_str()),
        };
        let (c1, r1) = parse_cell(start).ok_or_else(|| Error::InvalidRange(spec.to_string()))?;
        let (c2, r2) = parse_cell(end).ok_or_else(|| Error::InvalidRange(spec.to_string()))?;

        Ok(Self {
            min_col: c1.min(c2),
            min_row: r1.min(r2),
            max_col: c1.max(c2),
            max_row: r1.max(r2),
        })
    }

    pub fn width(&self) -> u32 {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> u32 {
        self.max_row - self.min_row + 1
    }

    pub fn cell_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Cuts the range back to `max_col`/`max_row`, keeping at least its
    /// top-left cell.
    pub fn clamp_to(&self, max_col: u32, max_row: u32) -> CellRange {
        CellRange {
            max_col: self.max_col.min(max_col.max(self.min_col)),
            max_row: self.max_row.min(max_row.max(self.min_row)),
            ..*self
        }
    }

    pub fn contains(&self, other: &CellRange) -> bool {
        other.min_col >= self.min_col
            && other.max_col <= self.max_col
            && other.min_row >= self.min_row
            && other.max_row <= self.max_row
    }

    /// Shifts the range so that `origin`'s top-left corner becomes `A1`.
    pub fn rebase(&self, origin: &CellRange) -> CellRange {
        CellRange {
            min_col: self.min_col - origin.min_col + 1,
            min_row: self.min_row - origin.min_row + 1,
            max_col: self.max_col - origin.min_col + 1,
            max_row: self.max_row - origin.min_row + 1,
        }
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CellRange::parse(s)
    }
}

impl Display for CellRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_letters(self.min_col),
            self.min_row,
            column_letters(self.max_col),
            self.max_row
        )
    }
}

fn parse_cell(cell: &str) -> Option<(u32, u32)> {
    let caps = CELL_REF.captures(cell)?;
    let col = column_number(caps.get(1)?.as_str())?;
    let row: u32 = caps.get(2)?.as_str().parse().ok()?;
    if col == 0 || row == 0 {
        return None;
    }
    Some((col, row))
}

/// `"A"` -> 1, `"Z"` -> 26, `"AA"` -> 27. `None` on non-letters or overflow.
pub fn column_number(letters: &str) -> Option<u32> {
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// 1 -> `"A"`, 28 -> `"AB"`.
pub fn column_letters(mut number: u32) -> String {
    let mut letters = Vec::new();
    while number > 0 {
        let rem = (number - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        number = (number - 1) / 26;
    }
    letters.iter().rev().collect()
}
