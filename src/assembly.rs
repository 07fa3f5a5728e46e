//! Placements of all piece instances of a problem.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::geometry::GridType;
use crate::shape::{add, Coord, Shape};
use crate::symmetry::Transform;

/// Orientation and position of one placed piece.
///
/// The piece's cells are the shape transformed by `transform`, normalized,
/// then moved by `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Placement {
    pub transform: Transform,
    pub position: Coord,
}

/// One placement per piece instance, in part order. Within a part the placed
/// instances come first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assembly {
    placements: Vec<Option<Placement>>,
}

impl Assembly {
    pub fn new(placements: Vec<Option<Placement>>) -> Self {
        Self { placements }
    }

    pub fn placements(&self) -> &[Option<Placement>] {
        &self.placements
    }

    pub fn piece_count(&self) -> usize {
        self.placements.len()
    }

    pub fn placed_count(&self) -> usize {
        self.placements.iter().flatten().count()
    }

    pub fn placement(&self, piece: usize) -> Option<Placement> {
        self.placements.get(piece).copied().flatten()
    }

    pub fn is_placed(&self, piece: usize) -> bool {
        self.placement(piece).is_some()
    }

    /// Drops `count` instances starting at `from`.
    pub fn remove_pieces(&mut self, from: usize, count: usize) {
        let end = (from + count).min(self.placements.len());
        if from < end {
            self.placements.drain(from..end);
        }
    }

    /// Inserts `count` unplaced instances before `from`.
    pub fn add_non_placed_pieces(&mut self, from: usize, count: usize) {
        let from = from.min(self.placements.len());
        self.placements
            .splice(from..from, std::iter::repeat(None).take(count));
    }

    /// Orders assemblies by the number of placed pieces.
    pub fn compare_pieces(&self, other: &Assembly) -> Ordering {
        self.placed_count().cmp(&other.placed_count())
    }

    /// Cells covered by one placed instance of `shape`.
    pub fn piece_cells(&self, grid: GridType, shape: &Shape, piece: usize) -> Option<Vec<Coord>> {
        let placement = self.placement(piece)?;
        Some(
            shape
                .transformed_cells(grid, placement.transform)
                .into_iter()
                .map(|(coord, _)| add(coord, placement.position))
                .collect(),
        )
    }
}
