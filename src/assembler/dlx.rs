//! Exact cover search with dancing links.
//!
//! Required result cells are primary columns, variable cells are secondary
//! columns that may stay uncovered. Every part adds one primary column that
//! must be hit exactly as often as the part has instances. Only problems
//! with fixed instance counts and no hole limit fit this model.

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

const VERSION: &str = "dlx-1";
const ROOT: usize = 0;
const NO_ROW: usize = usize::MAX;

/// The toroidal link structure. Node 0 is the root, nodes `1..=headers`
/// are column headers, row nodes follow.
#[derive(Debug, Clone, Default)]
struct Links {
    left: Vec<usize>,
    right: Vec<usize>,
    up: Vec<usize>,
    down: Vec<usize>,
    column: Vec<usize>,
    row: Vec<usize>,
    size: Vec<u32>,
    /// Hits still needed for part columns, unused for cell columns.
    need: Vec<u32>,
    is_part: Vec<bool>,
}

impl Links {
    fn new(matrix: &PlacementMatrix) -> Self {
        let cells = matrix.columns();
        let headers = 1 + cells + matrix.parts.len();
        let mut links = Links::default();
        for node in 0..headers {
            links.push_node(node, NO_ROW);
        }
        for column in 0..matrix.required() {
            links.link_header(1 + column);
        }
        for (index, part) in matrix.parts.iter().enumerate() {
            let header = 1 + cells + index;
            links.is_part[header] = true;
            links.need[header] = part.max;
            if part.max > 0 {
                links.link_header(header);
            }
        }
        for row in matrix.alive_rows() {
            let placed = &matrix.rows[row];
            let first = links.left.len();
            for &column in &placed.columns {
                links.add_node(1 + column as usize, row);
            }
            links.add_node(1 + cells + placed.part, row);
            let last = links.left.len() - 1;
            for node in first..=last {
                links.left[node] = if node == first { last } else { node - 1 };
                links.right[node] = if node == last { first } else { node + 1 };
            }
        }
        links
    }

    fn push_node(&mut self, column: usize, row: usize) -> usize {
        let node = self.left.len();
        self.left.push(node);
        self.right.push(node);
        self.up.push(node);
        self.down.push(node);
        self.column.push(column);
        self.row.push(row);
        self.size.push(0);
        self.need.push(0);
        self.is_part.push(false);
        node
    }

    fn link_header(&mut self, header: usize) {
        let last = self.left[ROOT];
        self.left[header] = last;
        self.right[header] = ROOT;
        self.right[last] = header;
        self.left[ROOT] = header;
    }

    fn add_node(&mut self, header: usize, row: usize) {
        let node = self.push_node(header, row);
        let above = self.up[header];
        self.up[node] = above;
        self.down[node] = header;
        self.down[above] = node;
        self.up[header] = node;
        self.size[header] += 1;
    }

    fn unlink_vertical(&mut self, node: usize) {
        let (up, down) = (self.up[node], self.down[node]);
        self.down[up] = down;
        self.up[down] = up;
        self.size[self.column[node]] -= 1;
    }

    fn relink_vertical(&mut self, node: usize) {
        let (up, down) = (self.up[node], self.down[node]);
        self.down[up] = node;
        self.up[down] = node;
        self.size[self.column[node]] += 1;
    }

    fn cover(&mut self, column: usize) {
        let (left, right) = (self.left[column], self.right[column]);
        self.right[left] = right;
        self.left[right] = left;
        let mut row = self.down[column];
        while row != column {
            let mut node = self.right[row];
            while node != row {
                self.unlink_vertical(node);
                node = self.right[node];
            }
            row = self.down[row];
        }
    }

    fn uncover(&mut self, column: usize) {
        let mut row = self.up[column];
        while row != column {
            let mut node = self.left[row];
            while node != row {
                self.relink_vertical(node);
                node = self.left[node];
            }
            row = self.up[row];
        }
        let (left, right) = (self.left[column], self.right[column]);
        self.right[left] = column;
        self.left[right] = column;
    }

    fn hide_row(&mut self, row: usize) {
        let mut node = row;
        loop {
            self.unlink_vertical(node);
            node = self.right[node];
            if node == row {
                break;
            }
        }
    }

    fn unhide_row(&mut self, row: usize) {
        let mut node = self.left[row];
        loop {
            self.relink_vertical(node);
            if node == row {
                break;
            }
            node = self.left[node];
        }
    }

    fn apply(&mut self, node: usize) {
        let column = self.column[node];
        if self.is_part[column] {
            self.need[column] -= 1;
            if self.need[column] == 0 {
                self.cover(column);
            }
        } else {
            self.cover(column);
        }
    }

    fn revert(&mut self, node: usize) {
        let column = self.column[node];
        if self.is_part[column] {
            if self.need[column] == 0 {
                self.uncover(column);
            }
            self.need[column] += 1;
        } else {
            self.uncover(column);
        }
    }

    /// Takes row `row` into the solution. Rows chosen from a part column
    /// were hidden beforehand and apply their own node too.
    fn select(&mut self, row: usize, from_part: bool) {
        if from_part {
            self.apply(row);
        }
        let mut node = self.right[row];
        while node != row {
            self.apply(node);
            node = self.right[node];
        }
    }

    fn unselect(&mut self, row: usize, from_part: bool) {
        let mut node = self.left[row];
        while node != row {
            self.revert(node);
            node = self.left[node];
        }
        if from_part {
            self.revert(row);
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    column: usize,
    /// The selected row node, `column` before the first selection.
    cursor: usize,
    tried: u32,
    size: u32,
    /// Rows of a part column already tried on this level.
    hidden: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Descend,
    Advance,
}

enum Descent {
    Solution,
    DeadEnd,
    Pushed,
}

#[derive(Debug, Clone)]
struct DlxSearch {
    links: Links,
    stack: Vec<Frame>,
    phase: Phase,
    iterations: u64,
}

impl DlxSearch {
    fn new(matrix: &PlacementMatrix) -> Self {
        Self {
            links: Links::new(matrix),
            stack: Vec::new(),
            phase: Phase::Descend,
            iterations: 0,
        }
    }

    /// Picks the cell column with the fewest rows, or a part column once
    /// all required cells are covered.
    fn descend(&mut self) -> Descent {
        let links = &self.links;
        let mut best = None;
        let mut best_size = u32::MAX;
        let mut part = None;
        let mut header = links.right[ROOT];
        if header == ROOT {
            return Descent::Solution;
        }
        while header != ROOT {
            let size = links.size[header];
            if links.is_part[header] {
                if size < links.need[header] {
                    return Descent::DeadEnd;
                }
                part = part.or(Some(header));
            } else {
                if size == 0 {
                    return Descent::DeadEnd;
                }
                if size < best_size {
                    best = Some(header);
                    best_size = size;
                }
            }
            header = links.right[header];
        }
        let Some(column) = best.or(part) else {
            return Descent::DeadEnd;
        };
        if !self.links.is_part[column] {
            self.links.cover(column);
        }
        self.stack.push(Frame {
            column,
            cursor: column,
            tried: 0,
            size: self.links.size[column],
            hidden: Vec::new(),
        });
        Descent::Pushed
    }

    /// Moves the top level to its next row. Returns `false` when the level
    /// ran out of rows and was removed.
    fn advance(&mut self) -> bool {
        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        let column = frame.column;
        let from_part = self.links.is_part[column];
        if frame.cursor != column {
            self.links.unselect(frame.cursor, from_part);
        }
        let next = self.links.down[frame.cursor];
        if next == column {
            let hidden = std::mem::take(&mut frame.hidden);
            self.stack.pop();
            if from_part {
                for &row in hidden.iter().rev() {
                    self.links.unhide_row(row);
                }
            } else {
                self.links.uncover(column);
            }
            return false;
        }
        frame.cursor = next;
        frame.tried += 1;
        if from_part {
            frame.hidden.push(next);
            self.links.hide_row(next);
        }
        self.links.select(next, from_part);
        self.iterations += 1;
        true
    }

    fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.stack
            .iter()
            .filter(|frame| frame.cursor != frame.column)
            .map(|frame| self.links.row[frame.cursor])
    }
}

impl Search for DlxSearch {
    fn step(&mut self, _matrix: &PlacementMatrix) -> Result<Step, Fault> {
        match self.phase {
            Phase::Descend => {
                self.phase = Phase::Advance;
                match self.descend() {
                    Descent::Solution => Ok(Step::Found),
                    Descent::DeadEnd | Descent::Pushed => Ok(Step::Searching),
                }
            }
            Phase::Advance => {
                if self.stack.is_empty() {
                    return Ok(Step::Exhausted);
                }
                if self.advance() {
                    self.phase = Phase::Descend;
                }
                Ok(Step::Searching)
            }
        }
    }

    fn chosen(&self) -> Vec<usize> {
        self.selected().collect()
    }

    fn rewind(&mut self) {
        self.phase = Phase::Descend;
    }
}

/// Dancing links assembler for problems with fixed piece counts.
#[derive(Debug, Default)]
pub struct DlxAssembler {
    matrix: Option<PlacementMatrix>,
    search: Option<DlxSearch>,
}

impl DlxAssembler {
    fn ready(&mut self) -> Result<(&mut DlxSearch, &PlacementMatrix), Fault> {
        let matrix = self.matrix.as_ref().ok_or(fault!("placement matrix built"))?;
        let search = self.search.get_or_insert_with(|| DlxSearch::new(matrix));
        Ok((search, matrix))
    }
}

impl Assembler for DlxAssembler {
    fn name(&self) -> &'static str {
        "dlx"
    }

    fn create_matrix(
        &mut self,
        view: PuzzleView<'_>,
        problem: &Problem,
        options: MatrixOptions,
    ) -> Result<(), Error> {
        if problem.max_holes().is_some() || problem.parts().iter().any(|part| part.min != part.max) {
            return Err(AssemblerError::PuzzleUnhandable.into());
        }
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
            progress(search.stack.iter().map(|frame| (frame.tried, frame.size)))
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
                    Phase::Advance => 1,
                },
                stack: search.stack.iter().map(|frame| frame.tried).collect(),
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
        let mut search = DlxSearch::new(matrix);
        let levels = position.stack.len();
        for (level, &tried) in position.stack.iter().enumerate() {
            if tried == 0 && level + 1 < levels {
                return Err(AssemblerError::CanNotRestoreSyntax);
            }
            if !matches!(search.descend(), Descent::Pushed) {
                return Err(AssemblerError::CanNotRestoreSyntax);
            }
            for _ in 0..tried {
                if !search.advance() {
                    return Err(AssemblerError::CanNotRestoreSyntax);
                }
            }
        }
        search.phase = match position.phase {
            0 => Phase::Descend,
            1 => Phase::Advance,
            _ => return Err(AssemblerError::CanNotRestoreSyntax),
        };
        search.iterations = position.iterations;
        self.search = Some(search);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridType;
    use crate::problem::Puzzle;
    use crate::shape::Shape;

    fn strip(length: i32, dominoes: u32) -> Puzzle {
        let mut puzzle = Puzzle::new(GridType::Cubic);
        let result = puzzle.add_shape(Shape::cuboid("strip", (length, 2, 1)));
        let domino = puzzle.add_shape(Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]));
        let mut problem = Problem::new("strip");
        problem.set_result(result);
        problem.set_shape_count(domino, dominoes, dominoes);
        puzzle.add_problem(problem);
        puzzle
    }

    fn count(puzzle: &Puzzle) -> usize {
        let mut assembler = DlxAssembler::default();
        let options = MatrixOptions {
            keep_rotations: true,
            ..MatrixOptions::default()
        };
        assembler
            .create_matrix(puzzle.view(), &puzzle.problems()[0], options)
            .unwrap();
        let mut found = 0;
        assembler
            .assemble(&CancelToken::new(), &mut |_| {
                found += 1;
                ControlFlow::Continue(())
            })
            .unwrap();
        found
    }

    #[test]
    fn test_domino_strips_follow_fibonacci() {
        let counts: Vec<usize> = (1..=6).map(|n| count(&strip(n, n as u32))).collect();
        assert_eq!(counts, vec![1, 2, 3, 5, 8, 13]);
    }

    #[test]
    fn test_links_restore_after_full_search() {
        let puzzle = strip(3, 3);
        let mut assembler = DlxAssembler::default();
        assembler
            .create_matrix(puzzle.view(), &puzzle.problems()[0], MatrixOptions::default())
            .unwrap();
        let before = assembler.ready().unwrap().0.links.clone();
        assert!(assembler.debug_step(usize::MAX).unwrap());
        let after = &assembler.search.as_ref().unwrap().links;
        assert_eq!(after.size, before.size);
        assert_eq!(after.right, before.right);
        assert_eq!(after.down, before.down);
        assert_eq!(after.need, before.need);
    }

    #[test]
    fn test_count_ranges_are_rejected() {
        let mut puzzle = strip(2, 2);
        puzzle.problem_mut(0).unwrap().set_shape_count(1, 1, 2);
        let mut assembler = DlxAssembler::default();
        let err = assembler
            .create_matrix(puzzle.view(), &puzzle.problems()[0], MatrixOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Assembler(AssemblerError::PuzzleUnhandable)));
    }
}
