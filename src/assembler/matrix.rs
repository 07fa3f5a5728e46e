//! The placement matrix shared by all assembler strategies.
//!
//! Columns are result cells: the filled cells come first and must be covered
//! exactly once, the variable cells follow and may be covered at most once.
//! Every row is one placement of one part: an orientation and a position
//! that put all of the part's cells onto result cells with allowed colors.

use rustc_hash::FxHashMap;

use super::pruning::{PrunedPart, SymmetryFilter};
use super::MatrixOptions;
use crate::assembly::{Assembly, Placement};
use crate::error::{AssemblerError, Error};
use crate::geometry::GridType;
use crate::problem::{Problem, PuzzleView};
use crate::shape::{add, sub, CellState, Coord};
use crate::solve::CancelToken;
use crate::symmetry::Transform;

#[derive(Debug, Clone)]
pub(crate) struct PartInfo {
    pub min: u32,
    pub max: u32,
    /// Instance number of the part's first piece.
    pub first_piece: usize,
    pub units: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub part: usize,
    pub transform: Transform,
    pub position: Coord,
    /// Covered columns, ascending.
    pub columns: Vec<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct PlacementMatrix {
    grid: GridType,
    cells: Vec<Coord>,
    required: usize,
    pub parts: Vec<PartInfo>,
    pub rows: Vec<Row>,
    alive: Vec<bool>,
    piece_count: usize,
    pub max_holes: Option<u32>,
    symmetry: Option<SymmetryFilter>,
}

impl PlacementMatrix {
    pub fn new(
        view: PuzzleView<'_>,
        problem: &Problem,
        options: MatrixOptions,
    ) -> Result<Self, Error> {
        let grid = view.grid;
        let result = view.shape(problem.result().ok_or(Error::NoResult)?)?;

        let mut cells: Vec<(Coord, u16)> = result
            .iter()
            .filter(|(_, cell)| cell.state == CellState::Filled)
            .map(|(coord, cell)| (coord, cell.color))
            .collect();
        let required = cells.len();
        cells.extend(
            result
                .iter()
                .filter(|(_, cell)| cell.state == CellState::Variable)
                .map(|(coord, cell)| (coord, cell.color)),
        );
        let column_of: FxHashMap<Coord, u32> = cells
            .iter()
            .enumerate()
            .map(|(column, &(coord, _))| (coord, column as u32))
            .collect();

        let mut parts = Vec::with_capacity(problem.parts().len());
        let mut pruned = Vec::with_capacity(problem.parts().len());
        for (index, part) in problem.parts().iter().enumerate() {
            let shape = view.shape(part.shape)?;
            parts.push(PartInfo {
                min: part.min,
                max: part.max,
                first_piece: problem.part_start(index),
                units: shape.unit_count() as u32,
            });
            pruned.push(PrunedPart {
                shape,
                min: part.min,
                max: part.max,
            });
        }

        check_units(&parts, required as u32, (cells.len() - required) as u32, problem.max_holes())?;

        let mut symmetry = if options.keep_rotations {
            None
        } else {
            SymmetryFilter::new(
                grid,
                result,
                &column_of,
                &pruned,
                options.keep_mirror,
                options.complete_rotations,
            )?
        };

        let group = grid.symmetries();
        let mut rows = Vec::new();
        for (index, part) in problem.parts().iter().enumerate() {
            let shape = view.shape(part.shape)?;
            let own = shape.symmetry(grid, true)?;
            let first_row = rows.len();
            for t in group.rotations() {
                if group.canonical_rep(own, t) != t {
                    continue;
                }
                let oriented = shape.transformed_cells(grid, t);
                let Some(&(hotspot, _)) = oriented.first() else {
                    continue;
                };
                for &(anchor, _) in &cells {
                    let position = sub(anchor, hotspot);
                    if !grid.is_legal_translation(position) {
                        continue;
                    }
                    let mut columns = Vec::with_capacity(oriented.len());
                    let fits = oriented.iter().all(|&(coord, cell)| {
                        match column_of.get(&add(coord, position)) {
                            Some(&column) => {
                                let color = cells[column as usize].1;
                                columns.push(column);
                                problem.placement_allowed(cell.color, color, view.color_count)
                            }
                            None => false,
                        }
                    });
                    if !fits {
                        continue;
                    }
                    columns.sort_unstable();
                    if let Some(filter) = &mut symmetry {
                        if !filter.keep_row(index, &columns) {
                            continue;
                        }
                    }
                    rows.push(Row {
                        part: index,
                        transform: t,
                        position,
                        columns,
                    });
                }
            }
            if part.min > 0 && rows.len() == first_row {
                return Err(AssemblerError::CanNotPlace(parts[index].first_piece).into());
            }
        }

        log::debug!(
            "placement matrix: {} columns ({} required), {} rows",
            cells.len(),
            required,
            rows.len()
        );
        Ok(Self {
            grid,
            cells: cells.into_iter().map(|(coord, _)| coord).collect(),
            required,
            alive: vec![true; rows.len()],
            piece_count: problem.piece_count(),
            max_holes: problem.max_holes(),
            parts,
            rows,
            symmetry,
        })
    }

    pub fn grid(&self) -> GridType {
        self.grid
    }

    pub fn columns(&self) -> usize {
        self.cells.len()
    }

    /// Number of columns that must be covered.
    pub fn required(&self) -> usize {
        self.required
    }

    pub fn is_alive(&self, row: usize) -> bool {
        self.alive[row]
    }

    pub fn alive_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.rows.len()).filter(|&row| self.alive[row])
    }

    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&alive| alive).count()
    }

    pub fn dropped_rows(&self) -> Vec<u32> {
        (0..self.rows.len())
            .filter(|&row| !self.alive[row])
            .map(|row| row as u32)
            .collect()
    }

    /// Makes exactly `dropped` dead. Returns `false`, changing nothing, when
    /// a row does not exist.
    pub fn set_dropped_rows(&mut self, dropped: &[u32]) -> bool {
        if dropped.iter().any(|&row| row as usize >= self.rows.len()) {
            return false;
        }
        self.alive.fill(true);
        for &row in dropped {
            self.alive[row as usize] = false;
        }
        true
    }

    /// Alive rows covering each column, ascending.
    pub fn rows_by_column(&self) -> Vec<Vec<usize>> {
        let mut by_column = vec![Vec::new(); self.cells.len()];
        for row in self.alive_rows() {
            for &column in &self.rows[row].columns {
                by_column[column as usize].push(row);
            }
        }
        by_column
    }

    /// Drops rows after which some required cell can no longer be covered.
    /// Returns the number of dropped rows.
    pub fn reduce(&mut self, cancel: &CancelToken, progress: &mut dyn FnMut(usize)) -> usize {
        let by_column = self.rows_by_column();
        let mut removed = 0;
        for part in 0..self.parts.len() {
            progress(part);
            for row in 0..self.rows.len() {
                if self.rows[row].part != part || !self.alive[row] {
                    continue;
                }
                if cancel.is_cancelled() {
                    return removed;
                }
                if !self.row_possible(row, &by_column) {
                    self.alive[row] = false;
                    removed += 1;
                }
            }
        }
        log::debug!("reduction dropped {removed} of {} placements", self.rows.len());
        removed
    }

    fn row_possible(&self, row: usize, by_column: &[Vec<usize>]) -> bool {
        let placed = &self.rows[row];
        let single = self.parts[placed.part].max < 2;
        (0..self.required as u32)
            .filter(|column| placed.columns.binary_search(column).is_err())
            .all(|column| {
                by_column[column as usize].iter().any(|&other| {
                    self.alive[other]
                        && !(single && self.rows[other].part == placed.part)
                        && disjoint(&self.rows[other].columns, &placed.columns)
                })
            })
    }

    /// Whether the chosen rows form the representative of their symmetry
    /// class.
    pub fn is_canonical(&self, chosen: &[usize]) -> bool {
        let Some(filter) = &self.symmetry else {
            return true;
        };
        let pieces: Vec<(usize, &[u32])> = chosen
            .iter()
            .map(|&row| (self.rows[row].part, self.rows[row].columns.as_slice()))
            .collect();
        filter.is_canonical(&pieces)
    }

    /// Converts chosen rows into an assembly. Instances of one part are
    /// filled in row order.
    pub fn assembly(&self, chosen: &[usize]) -> Assembly {
        let mut sorted = chosen.to_vec();
        sorted.sort_unstable();
        let mut placements = vec![None; self.piece_count];
        let mut next: Vec<usize> = self.parts.iter().map(|part| part.first_piece).collect();
        for row in sorted {
            let row = &self.rows[row];
            if let Some(slot) = placements.get_mut(next[row.part]) {
                *slot = Some(Placement {
                    transform: row.transform,
                    position: row.position,
                });
            }
            next[row.part] += 1;
        }
        Assembly::new(placements)
    }
}

fn check_units(
    parts: &[PartInfo],
    required: u32,
    variable: u32,
    max_holes: Option<u32>,
) -> Result<(), AssemblerError> {
    let min_units: u32 = parts.iter().map(|part| part.min * part.units).sum();
    let max_units: u32 = parts.iter().map(|part| part.max * part.units).sum();
    let capacity = required + variable;
    if min_units > capacity {
        return Err(AssemblerError::TooManyUnits(min_units - capacity));
    }
    let needed = match max_holes {
        Some(holes) => required.max(capacity.saturating_sub(holes)),
        None => required,
    };
    if max_units < needed {
        return Err(AssemblerError::TooFewUnits(needed - max_units));
    }
    Ok(())
}

/// Whether two ascending lists share no element.
fn disjoint(a: &[u32], b: &[u32]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Puzzle;
    use crate::shape::{Cell, Shape};

    fn options() -> MatrixOptions {
        MatrixOptions {
            keep_mirror: false,
            keep_rotations: true,
            complete_rotations: false,
        }
    }

    fn bar_puzzle(result: Shape, pieces: &[(Shape, u32)]) -> Puzzle {
        let mut puzzle = Puzzle::new(GridType::Cubic);
        let result = puzzle.add_shape(result);
        let mut problem = Problem::new("test");
        problem.set_result(result);
        for (shape, count) in pieces {
            let id = puzzle.add_shape(shape.clone());
            problem.set_shape_count(id, *count, *count);
        }
        puzzle.add_problem(problem);
        puzzle
    }

    #[test]
    fn test_rows_of_a_domino_in_a_bar() {
        let domino = Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]);
        let puzzle = bar_puzzle(Shape::cuboid("bar", (3, 1, 1)), &[(domino, 1)]);
        let matrix = PlacementMatrix::new(puzzle.view(), &puzzle.problems()[0], options());
        // too few units: 3 required cells, 2 piece cells
        assert!(matches!(
            matrix,
            Err(Error::Assembler(AssemblerError::TooFewUnits(1)))
        ));

        let domino = Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]);
        let unit = Shape::from_cells("unit", &[(0, 0, 0)]);
        let puzzle = bar_puzzle(Shape::cuboid("bar", (3, 1, 1)), &[(domino, 1), (unit, 1)]);
        let matrix = PlacementMatrix::new(puzzle.view(), &puzzle.problems()[0], options()).unwrap();
        assert_eq!(matrix.columns(), 3);
        // one orientation of the domino fits at two positions, the cube at three
        let domino_rows: Vec<&[u32]> = matrix
            .rows
            .iter()
            .filter(|row| row.part == 0)
            .map(|row| row.columns.as_slice())
            .collect();
        assert_eq!(domino_rows, vec![&[0, 1][..], &[1, 2][..]]);
        assert_eq!(matrix.rows.len(), 5);
    }

    #[test]
    fn test_too_many_units() {
        let unit = Shape::from_cells("unit", &[(0, 0, 0)]);
        let puzzle = bar_puzzle(Shape::cuboid("bar", (2, 1, 1)), &[(unit, 5)]);
        let matrix = PlacementMatrix::new(puzzle.view(), &puzzle.problems()[0], options());
        assert!(matches!(
            matrix,
            Err(Error::Assembler(AssemblerError::TooManyUnits(3)))
        ));
    }

    #[test]
    fn test_unplaceable_piece() {
        let unit = Shape::from_cells("unit", &[(0, 0, 0)]);
        let long = Shape::from_cells("long", &[(0, 0, 0), (1, 0, 0), (2, 0, 0)]);
        let result = Shape::cuboid("square", (2, 2, 1));
        let puzzle = bar_puzzle(result, &[(unit, 1), (long, 1)]);
        let matrix = PlacementMatrix::new(puzzle.view(), &puzzle.problems()[0], options());
        assert!(matches!(
            matrix,
            Err(Error::Assembler(AssemblerError::CanNotPlace(1)))
        ));
    }

    #[test]
    fn test_variable_cells_come_last() {
        let mut result = Shape::cuboid("bar", (3, 1, 1));
        result.set((0, 0, 0), Cell::VARIABLE);
        let unit = Shape::from_cells("unit", &[(0, 0, 0)]);
        let puzzle = bar_puzzle(result, &[(unit, 2)]);
        let matrix = PlacementMatrix::new(puzzle.view(), &puzzle.problems()[0], options()).unwrap();
        assert_eq!(matrix.required(), 2);
        assert_eq!(matrix.cells, vec![(1, 0, 0), (2, 0, 0), (0, 0, 0)]);
    }

    #[test]
    fn test_reduce_drops_blocking_rows() {
        // a domino in the middle of a 4-bar isolates both end cells
        let domino = Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]);
        let puzzle = bar_puzzle(Shape::cuboid("bar", (4, 1, 1)), &[(domino, 2)]);
        let mut matrix = PlacementMatrix::new(puzzle.view(), &puzzle.problems()[0], options()).unwrap();
        assert_eq!(matrix.alive_count(), 3);
        let removed = matrix.reduce(&CancelToken::new(), &mut |_| {});
        assert_eq!(removed, 1);
        assert!(!matrix.is_alive(1));
        assert_eq!(matrix.dropped_rows(), vec![1]);

        // a fresh matrix takes over the reduction
        let mut fresh = PlacementMatrix::new(puzzle.view(), &puzzle.problems()[0], options()).unwrap();
        assert!(fresh.set_dropped_rows(&matrix.dropped_rows()));
        assert_eq!(fresh.alive_count(), 2);
        assert!(!fresh.set_dropped_rows(&[3]));
        assert_eq!(fresh.alive_count(), 2);
        assert!(fresh.set_dropped_rows(&[]));
        assert_eq!(fresh.alive_count(), 3);
    }

    #[test]
    fn test_assembly_fills_instances_in_order() {
        let domino = Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]);
        let puzzle = bar_puzzle(Shape::cuboid("bar", (4, 1, 1)), &[(domino, 2)]);
        let matrix = PlacementMatrix::new(puzzle.view(), &puzzle.problems()[0], options()).unwrap();
        let assembly = matrix.assembly(&[2, 0]);
        assert_eq!(assembly.placement(0).map(|p| p.position), Some((0, 0, 0)));
        assert_eq!(assembly.placement(1).map(|p| p.position), Some((2, 0, 0)));
    }

    #[test]
    fn test_disjoint() {
        assert!(disjoint(&[0, 2, 4], &[1, 3]));
        assert!(!disjoint(&[0, 2, 4], &[4]));
    }
}
