//! How far one placed piece can slide before it hits another one.
//!
//! The answer only depends on the two oriented shapes and the offset between
//! them, so it is computed once per combination and kept.

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::geometry::GridType;
use crate::problem::PuzzleView;
use crate::shape::{add, sub, Coord};
use crate::symmetry::Transform;

/// The moving piece never touches the other one.
pub const UNBOUNDED: u32 = u32::MAX;

type Oriented = (usize, Transform);

#[derive(Debug)]
pub struct MovementCache<'a> {
    view: PuzzleView<'a>,
    cells: FxHashMap<Oriented, Vec<Coord>>,
    slides: FxHashMap<(Oriented, Oriented, Coord), Box<[u32]>>,
}

impl<'a> MovementCache<'a> {
    pub fn new(view: PuzzleView<'a>) -> Self {
        Self {
            view,
            cells: FxHashMap::default(),
            slides: FxHashMap::default(),
        }
    }

    pub fn grid(&self) -> GridType {
        self.view.grid
    }

    fn oriented_cells(&mut self, (shape, transform): Oriented) -> Result<&[Coord], Error> {
        if !self.cells.contains_key(&(shape, transform)) {
            let cells = self
                .view
                .shape(shape)?
                .transformed_cells(self.view.grid, transform)
                .into_iter()
                .map(|(coord, _)| coord)
                .collect();
            self.cells.insert((shape, transform), cells);
        }
        Ok(self.cells.get(&(shape, transform)).map(Vec::as_slice).unwrap_or_default())
    }

    /// For every direction of the grid, the number of unit steps piece `a`
    /// can make while piece `b`, shifted by `offset` relative to `a`, stays.
    pub fn slides(&mut self, a: Oriented, b: Oriented, offset: Coord) -> Result<&[u32], Error> {
        let key = (a, b, offset);
        if !self.slides.contains_key(&key) {
            let grid = self.view.grid;
            let moving = self.oriented_cells(a)?.to_vec();
            let blocking: Vec<Coord> = self
                .oriented_cells(b)?
                .iter()
                .map(|&c| add(c, offset))
                .collect();
            let slides = grid
                .directions()
                .iter()
                .map(|&direction| slide(grid, &moving, &blocking, direction))
                .collect();
            self.slides.insert(key, slides);
        }
        Ok(self.slides.get(&key).map(|s| &**s).unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// `k` with `delta == k * direction`, if there is one.
fn steps_to(delta: Coord, direction: Coord) -> Option<i32> {
    let (d, s) = ([delta.0, delta.1, delta.2], [direction.0, direction.1, direction.2]);
    let mut k = None;
    for i in 0..3 {
        if s[i] == 0 {
            if d[i] != 0 {
                return None;
            }
            continue;
        }
        if d[i] % s[i] != 0 {
            return None;
        }
        match k {
            None => k = Some(d[i] / s[i]),
            Some(k) if k != d[i] / s[i] => return None,
            Some(_) => {}
        }
    }
    k
}

/// Free unit steps of the cells `moving` along `direction` before one of
/// them lands on or sweeps over a cell of `blocking`.
fn slide(grid: GridType, moving: &[Coord], blocking: &[Coord], direction: Coord) -> u32 {
    let mut free = UNBOUNDED;
    for &a in moving {
        let swept = grid.sweep_cell(a, direction);
        for &b in blocking {
            // landing on b after k steps leaves k - 1 free ones
            if let Some(k) = steps_to(sub(b, a), direction) {
                if k >= 1 {
                    free = free.min(k as u32 - 1);
                }
            }
            // sweeping over b during step m + 1 leaves m free ones
            if let Some(w) = swept {
                if let Some(m) = steps_to(sub(b, w), direction) {
                    if m >= 0 {
                        free = free.min(m as u32);
                    }
                }
            }
        }
    }
    free
}
