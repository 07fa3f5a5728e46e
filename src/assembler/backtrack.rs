//! Iterative backtracking assembler.
//!
//! Fills the first empty required cell with every fitting placement, then,
//! once all required cells are covered, adds placements on variable cells
//! in ascending row order until piece minima and the hole limit are met.
//! Handles instance count ranges and hole limits, which the exact cover
//! search can not.
//!
//! Occupancy is a bitmask over the matrix columns, so collision checks are a
//! few word-wise ANDs.

use std::ops::ControlFlow;

use super::matrix::PlacementMatrix;
use super::{
    drive, drive_steps, progress, Assembler, Checkpoint, MatrixOptions, Search, SearchPosition, Step,
    Stop,
};
use crate::assembly::Assembly;
use crate::error::{AssemblerError, Error, Fault};
use crate::fault;
use crate::problem::{Problem, PuzzleView};
use crate::solve::CancelToken;

const VERSION: &str = "backtrack-1";

/// One level of the search stack: the placements that fit there and how
/// many of them were tried.
#[derive(Debug, Clone)]
struct Level {
    candidates: Vec<usize>,
    next: u32,
    /// Placed on variable cells after all required cells were covered.
    extension: bool,
}

impl Level {
    fn current(&self) -> Option<usize> {
        (self.next > 0).then(|| self.candidates[self.next as usize - 1])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Descend,
    Extend,
    Advance,
}

#[derive(Debug, Clone)]
struct BacktrackSearch {
    words: usize,
    /// `words` mask words per matrix row.
    masks: Vec<u64>,
    by_column: Vec<Vec<usize>>,
    /// Rows that cover variable cells only, ascending.
    variable_rows: Vec<usize>,
    occupied: Vec<u64>,
    placed: Vec<u32>,
    holes: u32,
    stack: Vec<Level>,
    phase: Phase,
    iterations: u64,
}

impl BacktrackSearch {
    fn new(matrix: &PlacementMatrix) -> Self {
        let words = matrix.columns().div_ceil(64).max(1);
        let mut masks = vec![0u64; words * matrix.rows.len()];
        for (row, placed) in matrix.rows.iter().enumerate() {
            for &column in &placed.columns {
                let column = column as usize;
                masks[row * words + column / 64] |= 1 << (column % 64);
            }
        }
        let required = matrix.required() as u32;
        let variable_rows = matrix
            .alive_rows()
            .filter(|&row| matrix.rows[row].columns.first().is_some_and(|&c| c >= required))
            .collect();
        Self {
            words,
            masks,
            by_column: matrix.rows_by_column(),
            variable_rows,
            occupied: vec![0; words],
            placed: vec![0; matrix.parts.len()],
            holes: (matrix.columns() - matrix.required()) as u32,
            stack: Vec::new(),
            phase: Phase::Descend,
            iterations: 0,
        }
    }

    fn mask(&self, row: usize) -> &[u64] {
        &self.masks[row * self.words..(row + 1) * self.words]
    }

    /// Finds the first uncovered required column.
    ///
    /// The number of trailing ones of a word is the index of its first
    /// free column.
    fn first_empty_column(&self, required: usize) -> Option<usize> {
        let (word, free) = self
            .occupied
            .iter()
            .enumerate()
            .map(|(word, bits)| (word, bits.trailing_ones() as usize))
            .find(|&(_, free)| free < 64)?;
        let column = word * 64 + free;
        (column < required).then_some(column)
    }

    fn fits(&self, matrix: &PlacementMatrix, row: usize) -> bool {
        let part = matrix.rows[row].part;
        self.placed[part] < matrix.parts[part].max
            && self
                .mask(row)
                .iter()
                .zip(&self.occupied)
                .all(|(mask, occupied)| mask & occupied == 0)
    }

    fn variable_cells(matrix: &PlacementMatrix, row: usize) -> u32 {
        let required = matrix.required() as u32;
        matrix.rows[row].columns.iter().filter(|&&c| c >= required).count() as u32
    }

    fn place(&mut self, matrix: &PlacementMatrix, row: usize) {
        for word in 0..self.words {
            self.occupied[word] |= self.masks[row * self.words + word];
        }
        self.placed[matrix.rows[row].part] += 1;
        self.holes -= Self::variable_cells(matrix, row);
        self.iterations += 1;
    }

    fn unplace(&mut self, matrix: &PlacementMatrix, row: usize) {
        for word in 0..self.words {
            self.occupied[word] &= !self.masks[row * self.words + word];
        }
        self.placed[matrix.rows[row].part] -= 1;
        self.holes += Self::variable_cells(matrix, row);
    }

    fn is_complete(&self, matrix: &PlacementMatrix) -> bool {
        matrix
            .parts
            .iter()
            .zip(&self.placed)
            .all(|(part, &placed)| placed >= part.min)
            && matrix.max_holes.map_or(true, |limit| self.holes <= limit)
    }

    /// Pushes the placements fitting at the current position: those that
    /// cover the first empty required cell, or, with all required cells
    /// covered, the variable-only placements after the last one added.
    fn push_level(&mut self, matrix: &PlacementMatrix) -> bool {
        let (candidates, extension): (Vec<usize>, bool) =
            match self.first_empty_column(matrix.required()) {
                Some(column) => (
                    self.by_column[column]
                        .iter()
                        .copied()
                        .filter(|&row| self.fits(matrix, row))
                        .collect(),
                    false,
                ),
                None => {
                    let after = self
                        .stack
                        .last()
                        .filter(|level| level.extension)
                        .and_then(Level::current);
                    (
                        self.variable_rows
                            .iter()
                            .copied()
                            .filter(|&row| after.map_or(true, |last| row > last))
                            .filter(|&row| self.fits(matrix, row))
                            .collect(),
                        true,
                    )
                }
            };
        if candidates.is_empty() {
            return false;
        }
        self.stack.push(Level {
            candidates,
            next: 0,
            extension,
        });
        true
    }

    /// Moves the top level to its next placement. Returns `false` when the
    /// level ran out of placements and was removed.
    fn advance(&mut self, matrix: &PlacementMatrix) -> bool {
        let Some(level) = self.stack.last_mut() else {
            return false;
        };
        let previous = level.current();
        let next = level.candidates.get(level.next as usize).copied();
        level.next += 1;
        if let Some(row) = previous {
            self.unplace(matrix, row);
        }
        match next {
            Some(row) => {
                self.place(matrix, row);
                true
            }
            None => {
                self.stack.pop();
                false
            }
        }
    }
}

impl Search for BacktrackSearch {
    fn step(&mut self, matrix: &PlacementMatrix) -> Result<Step, Fault> {
        match self.phase {
            Phase::Descend => {
                if self.first_empty_column(matrix.required()).is_some() {
                    self.phase = Phase::Advance;
                    self.push_level(matrix);
                    return Ok(Step::Searching);
                }
                // all required cells are covered
                self.phase = Phase::Extend;
                if self.is_complete(matrix) {
                    Ok(Step::Found)
                } else {
                    Ok(Step::Searching)
                }
            }
            Phase::Extend => {
                self.phase = Phase::Advance;
                self.push_level(matrix);
                Ok(Step::Searching)
            }
            Phase::Advance => {
                if self.stack.is_empty() {
                    return Ok(Step::Exhausted);
                }
                if self.advance(matrix) {
                    self.phase = Phase::Descend;
                }
                Ok(Step::Searching)
            }
        }
    }

    fn chosen(&self) -> Vec<usize> {
        self.stack.iter().filter_map(Level::current).collect()
    }

    fn rewind(&mut self) {
        self.phase = Phase::Descend;
    }
}

/// Backtracking assembler for any problem.
#[derive(Debug, Default)]
pub struct BacktrackAssembler {
    matrix: Option<PlacementMatrix>,
    search: Option<BacktrackSearch>,
}

impl BacktrackAssembler {
    fn ready(&mut self) -> Result<(&mut BacktrackSearch, &PlacementMatrix), Fault> {
        let matrix = self.matrix.as_ref().ok_or(fault!("placement matrix built"))?;
        let search = self.search.get_or_insert_with(|| BacktrackSearch::new(matrix));
        Ok((search, matrix))
    }
}

impl Assembler for BacktrackAssembler {
    fn name(&self) -> &'static str {
        "backtrack"
    }

    fn create_matrix(
        &mut self,
        view: PuzzleView<'_>,
        problem: &Problem,
        options: MatrixOptions,
    ) -> Result<(), Error> {
        self.matrix = Some(PlacementMatrix::new(view, problem, options)?);
        self.search = None;
        Ok(())
    }

    fn reduce(&mut self, cancel: &CancelToken, progress: &mut dyn FnMut(usize)) {
        if let Some(matrix) = &mut self.matrix {
            matrix.reduce(cancel, progress);
            self.search = None;
        }
    }

    fn assemble(
        &mut self,
        cancel: &CancelToken,
        found: &mut dyn FnMut(Assembly) -> ControlFlow<Stop>,
    ) -> Result<bool, Fault> {
        let (search, matrix) = self.ready()?;
        drive(search, matrix, cancel, found)
    }

    fn debug_step(&mut self, steps: usize) -> Result<bool, Fault> {
        let (search, matrix) = self.ready()?;
        drive_steps(search, matrix, steps)
    }

    fn partial_assembly(&self) -> Assembly {
        match (&self.matrix, &self.search) {
            (Some(matrix), Some(search)) => matrix.assembly(&search.chosen()),
            _ => Assembly::default(),
        }
    }

    fn finished(&self) -> f64 {
        self.search.as_ref().map_or(0.0, |search| {
            progress(
                search
                    .stack
                    .iter()
                    .map(|level| (level.next, level.candidates.len() as u32)),
            )
        })
    }

    fn iterations(&self) -> u64 {
        self.search.as_ref().map_or(0, |search| search.iterations)
    }

    fn save(&self) -> Checkpoint {
        let start = SearchPosition::start(self.matrix.as_ref());
        let position = match &self.search {
            Some(search) => SearchPosition {
                iterations: search.iterations,
                phase: match search.phase {
                    Phase::Descend => 0,
                    Phase::Extend => 1,
                    Phase::Advance => 2,
                },
                stack: search.stack.iter().map(|level| level.next).collect(),
                ..start
            },
            None => start,
        };
        position.save(VERSION)
    }

    fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), AssemblerError> {
        let matrix = self.matrix.as_mut().ok_or(AssemblerError::CanNotRestoreSyntax)?;
        let position = SearchPosition::load(checkpoint, VERSION, matrix)?;
        let matrix = &*matrix;
        let mut search = BacktrackSearch::new(matrix);
        let levels = position.stack.len();
        for (index, &tried) in position.stack.iter().enumerate() {
            if tried == 0 && index + 1 < levels {
                return Err(AssemblerError::CanNotRestoreSyntax);
            }
            if !search.push_level(matrix) {
                return Err(AssemblerError::CanNotRestoreSyntax);
            }
            for _ in 0..tried {
                if !search.advance(matrix) {
                    return Err(AssemblerError::CanNotRestoreSyntax);
                }
            }
        }
        search.phase = match position.phase {
            0 => Phase::Descend,
            1 => Phase::Extend,
            2 => Phase::Advance,
            _ => return Err(AssemblerError::CanNotRestoreSyntax),
        };
        search.iterations = position.iterations;
        self.search = Some(search);
        Ok(())
    }
}
