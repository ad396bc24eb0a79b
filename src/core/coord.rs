//! Board coordinates and dense grids.
//!
//! `Coord` orders lexicographically by `(x, y)`; every tie-break that needs a
//! "first cell" uses that order so replays agree across hosts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell position on a board.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Coord {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl Coord {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate shifted by a delta.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Orthogonal neighbours in fixed order.
    pub fn neighbors4(self) -> [Coord; 4] {
        [
            self.offset(0, -1),
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(-1, 0),
        ]
    }

    /// Chebyshev (king-move) distance.
    pub fn chebyshev(self, other: Coord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Unit step from `self` toward `to` when both lie on one rank, file or
    /// diagonal.
    pub fn straight_step(self, to: Coord) -> Option<(i32, i32)> {
        let dx = to.x - self.x;
        let dy = to.y - self.y;
        if (dx, dy) == (0, 0) {
            return None;
        }
        if dx == 0 || dy == 0 || dx.abs() == dy.abs() {
            Some((dx.signum(), dy.signum()))
        } else {
            None
        }
    }

    /// Cells strictly after `self` up to and including `to` along a straight
    /// line. Empty when the two are not aligned.
    pub fn line_to(self, to: Coord) -> Vec<Coord> {
        let Some((sx, sy)) = self.straight_step(to) else {
            return Vec::new();
        };
        let mut cells = Vec::new();
        let mut at = self;
        while at != to {
            at = at.offset(sx, sy);
            cells.push(at);
        }
        cells
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Dense rectangular board, row-major storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: i32,
    height: i32,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Grid filled with one value.
    pub fn filled(width: i32, height: i32, value: T) -> Self {
        let len = (width.max(0) * height.max(0)) as usize;
        Self {
            width: width.max(0),
            height: height.max(0),
            cells: vec![value; len],
        }
    }
}

impl<T> Grid<T> {
    /// Board width.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Board height.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Whether `at` is on the board.
    #[inline]
    pub fn contains(&self, at: Coord) -> bool {
        at.x >= 0 && at.y >= 0 && at.x < self.width && at.y < self.height
    }

    fn index(&self, at: Coord) -> Option<usize> {
        self.contains(at).then(|| (at.y * self.width + at.x) as usize)
    }

    /// Cell at `at`.
    pub fn get(&self, at: Coord) -> Option<&T> {
        self.index(at).and_then(|i| self.cells.get(i))
    }

    /// Mutable cell at `at`.
    pub fn get_mut(&mut self, at: Coord) -> Option<&mut T> {
        self.index(at).and_then(move |i| self.cells.get_mut(i))
    }

    /// Replace a cell; returns false when off the board.
    pub fn set(&mut self, at: Coord, value: T) -> bool {
        match self.get_mut(at) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// All coordinates in `(x, y)` order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        let height = self.height;
        (0..self.width).flat_map(move |x| (0..height).map(move |y| Coord::new(x, y)))
    }

    /// Cells paired with their coordinates in `(x, y)` order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &T)> + '_ {
        self.coords().filter_map(move |at| self.get(at).map(|cell| (at, cell)))
    }

    /// Transform every cell.
    pub fn map<U>(&self, mut f: impl FnMut(Coord, &T) -> U) -> Grid<U> {
        let mut cells = Vec::with_capacity(self.cells.len());
        for y in 0..self.height {
            for x in 0..self.width {
                let at = Coord::new(x, y);
                let idx = (y * self.width + x) as usize;
                cells.push(f(at, &self.cells[idx]));
            }
        }
        Grid {
            width: self.width,
            height: self.height,
            cells,
        }
    }
}

/// Serde adapter for `BTreeMap<Coord, T>` as a list of `[coord, value]`
/// pairs. JSON objects only take string keys.
pub mod entries {
    use super::Coord;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    /// Serialize as a sequence of pairs in key order.
    pub fn serialize<T, S>(map: &BTreeMap<Coord, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    /// Deserialize from a sequence of pairs. Later duplicates win.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<BTreeMap<Coord, T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(Coord, T)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
