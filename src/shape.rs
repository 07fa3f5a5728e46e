//! Voxel shapes.
//!
//! A shape is a dense box of cells. Box-local coordinates are grid
//! coordinates, so for the non-cubic families only some positions of the box
//! can hold a non-empty cell.

use serde::{Deserialize, Serialize};

use crate::error::Fault;
use crate::geometry::GridType;
use crate::grid::{coord_to_idx, idx_to_coord};
use crate::symmetry::{SymmetryId, Transform};

/// A grid coordinate.
pub type Coord = (i32, i32, i32);

#[inline]
pub fn add(a: Coord, b: Coord) -> Coord {
    (a.0 + b.0, a.1 + b.1, a.2 + b.2)
}

#[inline]
pub fn sub(a: Coord, b: Coord) -> Coord {
    (a.0 - b.0, a.1 - b.1, a.2 - b.2)
}

#[inline]
pub fn scale(a: Coord, k: i32) -> Coord {
    (a.0 * k, a.1 * k, a.2 * k)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    #[default]
    Empty,
    /// Must be covered exactly once in a result shape.
    Filled,
    /// May be covered at most once in a result shape.
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cell {
    pub state: CellState,
    /// Color id, 0 is neutral.
    pub color: u16,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        state: CellState::Empty,
        color: 0,
    };
    pub const FILLED: Cell = Cell {
        state: CellState::Filled,
        color: 0,
    };
    pub const VARIABLE: Cell = Cell {
        state: CellState::Variable,
        color: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.state == CellState::Empty
    }
}

/// A named 3D cell pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ShapeDoc", try_from = "ShapeDoc")]
pub struct Shape {
    pub name: String,
    pub weight: i32,
    size: Coord,
    cells: Vec<Cell>,
}

impl Shape {
    /// An empty shape with the given box size.
    pub fn new(name: impl Into<String>, size: Coord) -> Self {
        let size = (size.0.max(0), size.1.max(0), size.2.max(0));
        Self {
            name: name.into(),
            weight: 1,
            size,
            cells: vec![Cell::EMPTY; (size.0 * size.1 * size.2) as usize],
        }
    }

    /// A shape whose listed cells are filled. Coordinates must not be negative.
    pub fn from_cells(name: impl Into<String>, cells: &[Coord]) -> Self {
        Self::with_cells(name, cells.iter().map(|&c| (c, Cell::FILLED)))
    }

    pub fn with_cells(name: impl Into<String>, cells: impl IntoIterator<Item = (Coord, Cell)>) -> Self {
        let cells: Vec<(Coord, Cell)> = cells.into_iter().collect();
        let size = cells.iter().fold((0, 0, 0), |(sx, sy, sz), &((x, y, z), _)| {
            (sx.max(x + 1), sy.max(y + 1), sz.max(z + 1))
        });
        let mut shape = Self::new(name, size);
        for (coord, cell) in cells {
            shape.set(coord, cell);
        }
        shape
    }

    /// A filled cuboid, the usual result shape.
    pub fn cuboid(name: impl Into<String>, size: Coord) -> Self {
        let mut shape = Self::new(name, size);
        shape.cells.fill(Cell::FILLED);
        shape
    }

    pub fn size(&self) -> Coord {
        self.size
    }

    fn index(&self, (x, y, z): Coord) -> Option<usize> {
        let (sx, sy, sz) = self.size;
        if x < 0 || y < 0 || z < 0 || x >= sx || y >= sy || z >= sz {
            return None;
        }
        Some(coord_to_idx(self.size, (x, y, z)))
    }

    /// The cell at `coord`; empty outside the box.
    pub fn get(&self, coord: Coord) -> Cell {
        self.index(coord).map_or(Cell::EMPTY, |i| self.cells[i])
    }

    pub fn state(&self, coord: Coord) -> CellState {
        self.get(coord).state
    }

    /// Sets a cell, growing the box when needed. Negative coordinates are ignored.
    pub fn set(&mut self, coord: Coord, cell: Cell) {
        if coord.0 < 0 || coord.1 < 0 || coord.2 < 0 {
            return;
        }
        if self.index(coord).is_none() {
            if cell.is_empty() {
                return;
            }
            self.grow((
                self.size.0.max(coord.0 + 1),
                self.size.1.max(coord.1 + 1),
                self.size.2.max(coord.2 + 1),
            ));
        }
        if let Some(i) = self.index(coord) {
            self.cells[i] = cell;
        }
    }

    fn grow(&mut self, size: Coord) {
        let mut grown = Shape::new(std::mem::take(&mut self.name), size);
        grown.weight = self.weight;
        for (coord, cell) in self.iter() {
            let i = coord_to_idx(size, coord);
            grown.cells[i] = cell;
        }
        *self = grown;
    }

    /// Non-empty cells in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(i, &cell)| (idx_to_coord(self.size, i), cell))
    }

    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|c| c.state == state).count()
    }

    /// Number of non-empty cells.
    pub fn unit_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }

    /// First non-empty cell in index order, the anchor for placements.
    pub fn hotspot(&self) -> Option<Coord> {
        self.iter().next().map(|(coord, _)| coord)
    }

    /// Inclusive bounds of the non-empty cells.
    pub fn bounding_box(&self) -> Option<(Coord, Coord)> {
        let mut cells = self.iter().map(|(c, _)| c);
        let first = cells.next()?;
        Some(cells.fold((first, first), |(lo, hi), c| {
            (
                (lo.0.min(c.0), lo.1.min(c.1), lo.2.min(c.2)),
                (hi.0.max(c.0), hi.1.max(c.1), hi.2.max(c.2)),
            )
        }))
    }

    /// The first non-empty cell that is not a cell of `grid`.
    pub fn first_invalid_cell(&self, grid: GridType) -> Option<Coord> {
        self.iter()
            .map(|(coord, _)| coord)
            .find(|&coord| !grid.is_valid_cell(coord))
    }

    /// The non-empty cells moved by the legal translation that brings the
    /// bounding box as close to the origin as possible, sorted.
    pub fn normalized_cells(&self, grid: GridType) -> Vec<(Coord, Cell)> {
        normalize(grid, self.iter().collect())
    }

    /// Non-empty cells after applying transformation `t` and normalizing.
    pub fn transformed_cells(&self, grid: GridType, t: Transform) -> Vec<(Coord, Cell)> {
        let group = grid.symmetries();
        normalize(
            grid,
            self.iter()
                .map(|(coord, cell)| (group.transform(coord, t), cell))
                .collect(),
        )
    }

    /// This shape rotated or mirrored by `t` and normalized.
    pub fn transformed(&self, grid: GridType, t: Transform) -> Shape {
        let mut shape = Shape::with_cells(self.name.clone(), self.transformed_cells(grid, t));
        shape.weight = self.weight;
        shape
    }

    /// Whether both shapes are equal up to a legal translation.
    pub fn identical(&self, other: &Shape, grid: GridType, include_colors: bool) -> bool {
        same_cells(
            &self.normalized_cells(grid),
            &other.normalized_cells(grid),
            include_colors,
        )
    }

    /// The group of transformations that leave this shape unchanged.
    pub fn symmetry(&self, grid: GridType, include_colors: bool) -> Result<SymmetryId, Fault> {
        let reference = self.normalized_cells(grid);
        grid.symmetries().invariant_subgroup(|t| {
            same_cells(&self.transformed_cells(grid, t), &reference, include_colors)
        })
    }
}

fn normalize(grid: GridType, mut cells: Vec<(Coord, Cell)>) -> Vec<(Coord, Cell)> {
    let Some(min) = cells.iter().map(|&(c, _)| c).reduce(|lo, c| {
        (lo.0.min(c.0), lo.1.min(c.1), lo.2.min(c.2))
    }) else {
        return cells;
    };
    let shift = grid.align_translation(min);
    for (coord, _) in &mut cells {
        *coord = sub(*coord, shift);
    }
    cells.sort_unstable();
    cells
}

fn same_cells(a: &[(Coord, Cell)], b: &[(Coord, Cell)], include_colors: bool) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|((ca, xa), (cb, xb))| {
            ca == cb && xa.state == xb.state && (!include_colors || xa.color == xb.color)
        })
}

/// Text form of a shape in puzzle documents.
///
/// `cells` lists the box in index order: `_` empty, `#` filled, `+`
/// variable, each optionally followed by a decimal color id.
#[derive(Serialize, Deserialize)]
struct ShapeDoc {
    name: String,
    #[serde(default = "default_weight")]
    weight: i32,
    size: [i32; 3],
    cells: String,
}

fn default_weight() -> i32 {
    1
}

impl From<Shape> for ShapeDoc {
    fn from(shape: Shape) -> Self {
        let mut cells = String::with_capacity(shape.cells.len());
        for cell in &shape.cells {
            cells.push(match cell.state {
                CellState::Empty => '_',
                CellState::Filled => '#',
                CellState::Variable => '+',
            });
            if cell.color != 0 {
                cells.push_str(&cell.color.to_string());
            }
        }
        ShapeDoc {
            name: shape.name,
            weight: shape.weight,
            size: [shape.size.0, shape.size.1, shape.size.2],
            cells,
        }
    }
}

impl TryFrom<ShapeDoc> for Shape {
    type Error = String;

    fn try_from(doc: ShapeDoc) -> Result<Self, Self::Error> {
        let [x, y, z] = doc.size;
        let mut shape = Shape::new(doc.name, (x, y, z));
        shape.weight = doc.weight;
        let mut chars = doc.cells.chars().peekable();
        let mut index = 0;
        while let Some(symbol) = chars.next() {
            let state = match symbol {
                '_' => CellState::Empty,
                '#' => CellState::Filled,
                '+' => CellState::Variable,
                other => return Err(format!("unexpected cell symbol {other:?}")),
            };
            let mut color = 0u16;
            while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                color = color
                    .checked_mul(10)
                    .and_then(|c| c.checked_add(digit as u16))
                    .ok_or_else(|| "cell color out of range".to_string())?;
                chars.next();
            }
            let cell = shape
                .cells
                .get_mut(index)
                .ok_or_else(|| format!("more cells than the {x}x{y}x{z} box holds"))?;
            *cell = Cell { state, color };
            index += 1;
        }
        if index != shape.cells.len() {
            return Err(format!("expected {} cells, found {index}", shape.cells.len()));
        }
        Ok(shape)
    }
}
