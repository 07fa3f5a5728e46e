//! Puzzles, problems and the solve-state machine.
//!
//! A [`Puzzle`] owns the grid type, the shapes and the colors. Each of its
//! [`Problem`]s picks a result shape and a multiset of piece shapes from that
//! list. Engines receive a [`PuzzleView`] of the shared data together with
//! the problem they work on.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assembler::{Assembler, Checkpoint};
use crate::assembly::Assembly;
use crate::error::{Error, Fault};
use crate::geometry::GridType;
use crate::invariant;
use crate::shape::{Coord, Shape};
use crate::solution::Solution;

/// Where a problem is in its solve life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveState {
    #[default]
    Unsolved,
    Solving,
    Solved,
    /// The problem was edited after solving started; the stored solutions
    /// may be incomplete.
    Unknown,
}

/// How [`Problem::sort_solutions`] orders the stored solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Discovery order.
    AssemblyNumber,
    /// Disassembly level, easiest first.
    Level,
    /// Total number of moves, fewest first.
    SumMoves,
    /// Number of placed pieces, most first.
    Pieces,
}

/// Number of instances of a piece that belong to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub group: u16,
    pub count: u32,
}

/// A piece shape with its instance count range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub shape: usize,
    pub min: u32,
    pub max: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub name: String,
    pub rgb: [u8; 3],
}

/// Read-only puzzle data handed to the engines.
#[derive(Debug, Clone, Copy)]
pub struct PuzzleView<'a> {
    pub grid: GridType,
    pub shapes: &'a [Shape],
    pub color_count: usize,
}

impl<'a> PuzzleView<'a> {
    pub fn shape(&self, id: usize) -> Result<&'a Shape, Error> {
        self.shapes.get(id).ok_or(Error::UnknownShape(id))
    }
}

/// One assembly problem and everything found for it so far.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Problem {
    pub name: String,
    #[serde(default)]
    parts: Vec<Part>,
    #[serde(default)]
    result: Option<usize>,
    /// Allowed (piece color, result color) pairs, both 1-based.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    color_constraints: BTreeSet<(u16, u16)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_holes: Option<u32>,
    #[serde(default)]
    state: SolveState,
    #[serde(skip)]
    assembler: Option<Box<dyn Assembler>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checkpoint: Option<Checkpoint>,
    #[serde(default)]
    num_assemblies: u64,
    #[serde(default)]
    num_solutions: u64,
    #[serde(default)]
    used_time_ms: u64,
    #[serde(default)]
    solutions: Vec<Solution>,
}

impl Problem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part_for_shape(&self, shape: usize) -> Option<&Part> {
        self.parts.iter().find(|part| part.shape == shape)
    }

    /// Number of piece instances, the sum of all maxima.
    pub fn piece_count(&self) -> usize {
        self.parts.iter().map(|part| part.max as usize).sum()
    }

    /// Instance number of the first instance of part `part`.
    pub fn part_start(&self, part: usize) -> usize {
        self.parts[..part.min(self.parts.len())]
            .iter()
            .map(|part| part.max as usize)
            .sum()
    }

    /// Index of the part an instance belongs to.
    pub fn piece_part(&self, piece: usize) -> Option<usize> {
        let mut start = 0;
        for (index, part) in self.parts.iter().enumerate() {
            start += part.max as usize;
            if piece < start {
                return Some(index);
            }
        }
        None
    }

    /// Shape id of an instance.
    pub fn piece_shape(&self, piece: usize) -> Option<usize> {
        self.piece_part(piece).map(|part| self.parts[part].shape)
    }

    pub fn result(&self) -> Option<usize> {
        self.result
    }

    pub fn uses_shape(&self, shape: usize) -> bool {
        self.result == Some(shape) || self.part_for_shape(shape).is_some()
    }

    pub fn max_holes(&self) -> Option<u32> {
        self.max_holes
    }

    pub fn solve_state(&self) -> SolveState {
        self.state
    }

    pub fn num_assemblies(&self) -> u64 {
        self.num_assemblies
    }

    pub fn num_solutions(&self) -> u64 {
        self.num_solutions
    }

    pub fn used_time(&self) -> Duration {
        Duration::from_millis(self.used_time_ms)
    }

    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoint.as_ref()
    }

    pub fn assembler(&self) -> Option<&dyn Assembler> {
        self.assembler.as_deref()
    }

    pub fn assembler_mut(&mut self) -> Option<&mut (dyn Assembler + 'static)> {
        self.assembler.as_deref_mut()
    }

    // editing

    /// Any change of the definition invalidates a running or finished search.
    fn edit_problem(&mut self) {
        if matches!(self.state, SolveState::Solving | SolveState::Solved) {
            self.make_unknown();
        }
    }

    /// Drops the attached assembler, the saved position and the counters.
    pub fn make_unknown(&mut self) {
        log::debug!("problem {:?} is now unknown", self.name);
        self.state = SolveState::Unknown;
        self.assembler = None;
        self.checkpoint = None;
        self.num_assemblies = 0;
        self.num_solutions = 0;
        self.used_time_ms = 0;
    }

    pub fn set_result(&mut self, shape: usize) {
        if self.result != Some(shape) {
            self.remove_all_solutions();
            self.result = Some(shape);
        }
    }

    /// Sets the minimum instance count of a shape, adding the part when the
    /// shape is not used yet. Stored solutions that place fewer instances are
    /// dropped.
    pub fn set_shape_min(&mut self, shape: usize, count: u32) {
        self.edit_problem();
        let mut start = 0;
        for index in 0..self.parts.len() {
            if self.parts[index].shape == shape {
                self.parts[index].min = count;
                if count > self.parts[index].max {
                    self.set_shape_max(shape, count);
                }
                if count > 0 {
                    let last = start + count as usize - 1;
                    self.solutions.retain(|s| s.assembly.is_placed(last));
                }
                return;
            }
            start += self.parts[index].max as usize;
        }
        if count > 0 {
            self.parts.push(Part {
                shape,
                min: count,
                max: count,
                groups: Vec::new(),
            });
            for solution in &mut self.solutions {
                solution.add_non_placed_pieces(start, count as usize);
            }
        }
    }

    /// Sets the maximum instance count of a shape. Stored solutions get
    /// unplaced instances added, or lose their unplaced surplus; solutions
    /// placing more than the new maximum are dropped. A maximum of 0 removes
    /// the part.
    pub fn set_shape_max(&mut self, shape: usize, count: u32) {
        let mut start = 0;
        for index in 0..self.parts.len() {
            if self.parts[index].shape != shape {
                start += self.parts[index].max as usize;
                continue;
            }
            let old = self.parts[index].max as usize;
            let new = count as usize;
            if new != old {
                self.edit_problem();
            }
            if new == 0 {
                self.solutions.retain_mut(|s| {
                    if s.assembly.is_placed(start) {
                        return false;
                    }
                    s.remove_pieces(start, old);
                    true
                });
                self.parts.remove(index);
                return;
            }
            if new > old {
                for solution in &mut self.solutions {
                    solution.add_non_placed_pieces(start + old, new - old);
                }
            } else if new < old {
                self.solutions.retain_mut(|s| {
                    if s.assembly.is_placed(start + new) {
                        return false;
                    }
                    s.remove_pieces(start + new, old - new);
                    true
                });
            }
            self.parts[index].max = count;
            if count < self.parts[index].min {
                self.set_shape_min(shape, count);
            }
            return;
        }
        if count > 0 {
            self.edit_problem();
            self.parts.push(Part {
                shape,
                min: 0,
                max: count,
                groups: Vec::new(),
            });
            for solution in &mut self.solutions {
                solution.add_non_placed_pieces(start, count as usize);
            }
        }
    }

    /// Uses `shape` with between `min` and `max` instances.
    pub fn set_shape_count(&mut self, shape: usize, min: u32, max: u32) {
        self.set_shape_max(shape, max.max(min));
        self.set_shape_min(shape, min);
    }

    /// Sets how many instances of a part belong to `group`; a count of 0
    /// removes the entry. Group 0 means "no group" and is never stored.
    pub fn set_part_group(&mut self, part: usize, group: u16, count: u32) {
        let Some(entry) = self.parts.get_mut(part) else {
            return;
        };
        let changed = match entry.groups.iter().position(|g| g.group == group) {
            Some(i) if count > 0 => {
                let changed = entry.groups[i].count != count;
                entry.groups[i].count = count;
                changed
            }
            Some(i) => {
                entry.groups.remove(i);
                true
            }
            None if group != 0 && count > 0 => {
                entry.groups.push(GroupCount { group, count });
                true
            }
            None => false,
        };
        if changed {
            self.edit_problem();
        }
    }

    /// Forgets a shape of the puzzle: drops its part, clears the result when
    /// it was the result, and renumbers higher shape ids.
    pub fn remove_shape(&mut self, shape: usize) {
        if self.result == Some(shape) {
            self.edit_problem();
            self.result = None;
        }
        self.set_shape_max(shape, 0);
        for part in &mut self.parts {
            if part.shape > shape {
                part.shape -= 1;
            }
        }
        if let Some(result) = &mut self.result {
            if *result > shape {
                *result -= 1;
            }
        }
    }

    pub fn set_max_holes(&mut self, max_holes: Option<u32>) {
        if self.max_holes != max_holes {
            self.edit_problem();
            self.max_holes = max_holes;
        }
    }

    /// Allows pieces of color `piece` on result cells of color `result`.
    pub fn allow_placement(&mut self, piece: u16, result: u16) {
        if piece == 0 || result == 0 {
            return;
        }
        if self.color_constraints.insert((piece, result)) {
            self.edit_problem();
        }
    }

    pub fn disallow_placement(&mut self, piece: u16, result: u16) {
        if self.color_constraints.remove(&(piece, result)) {
            self.edit_problem();
        }
    }

    /// Whether a piece cell of color `piece` may cover a result cell of color
    /// `result`. Color 0 goes everywhere; without colors nothing is restricted.
    pub fn placement_allowed(&self, piece: u16, result: u16, color_count: usize) -> bool {
        color_count == 0
            || piece == 0
            || result == 0
            || self.color_constraints.contains(&(piece, result))
    }

    // solving

    /// Attaches a freshly built assembler. A saved position is restored into
    /// it; without one a new search starts.
    pub fn set_assembler(&mut self, mut assembler: Box<dyn Assembler>) -> Result<(), Error> {
        match (self.state, self.checkpoint.take()) {
            (SolveState::Solving, Some(checkpoint)) => {
                if let Err(err) = assembler.restore(&checkpoint) {
                    log::warn!("problem {:?}: can not resume the search: {err}", self.name);
                    self.remove_all_solutions();
                    return Err(err.into());
                }
                log::info!("problem {:?}: resuming the search", self.name);
            }
            (SolveState::Unsolved, _) => {
                invariant!(self.num_assemblies == 0 && self.num_solutions == 0);
                self.state = SolveState::Solving;
            }
            (SolveState::Unknown, _) => {
                self.remove_all_solutions();
                self.state = SolveState::Solving;
            }
            (actual, checkpoint) => {
                self.checkpoint = checkpoint;
                return Err(Error::WrongState {
                    expected: SolveState::Unsolved,
                    actual,
                });
            }
        }
        self.assembler = Some(assembler);
        Ok(())
    }

    /// Detaches the assembler for a run.
    pub fn take_assembler(&mut self) -> Option<Box<dyn Assembler>> {
        self.assembler.take()
    }

    /// Re-attaches an assembler that stopped before finishing and records
    /// its position so the search can continue in another process.
    pub fn suspend(&mut self, assembler: Box<dyn Assembler>) {
        let checkpoint = assembler.save();
        log::info!(
            "problem {:?}: search suspended at {:.1}%",
            self.name,
            assembler.finished() * 100.0
        );
        self.checkpoint = Some(checkpoint);
        self.assembler = Some(assembler);
    }

    /// The assembler has explored everything.
    pub fn finish_solving(&mut self) -> Result<(), Fault> {
        invariant!(self.state == SolveState::Solving);
        self.state = SolveState::Solved;
        self.assembler = None;
        self.checkpoint = None;
        Ok(())
    }

    /// Counts a found assembly and returns its number.
    pub fn count_assembly(&mut self) -> u64 {
        self.num_assemblies += 1;
        self.num_assemblies - 1
    }

    /// Counts a disassemblable assembly and returns its number.
    pub fn count_solution(&mut self) -> u64 {
        self.num_solutions += 1;
        self.num_solutions - 1
    }

    pub fn add_time(&mut self, elapsed: Duration) {
        self.used_time_ms += elapsed.as_millis() as u64;
    }

    pub fn add_solution(&mut self, solution: Solution) -> Result<(), Fault> {
        invariant!(self.state == SolveState::Solving);
        invariant!(solution.assembly.piece_count() == self.piece_count());
        self.solutions.push(solution);
        Ok(())
    }

    pub fn remove_solution(&mut self, index: usize) -> Option<Solution> {
        (index < self.solutions.len()).then(|| self.solutions.remove(index))
    }

    fn reset_counters(&mut self) {
        self.num_assemblies = 0;
        self.num_solutions = 0;
        self.used_time_ms = 0;
    }

    /// Back to the initial state, with nothing found.
    pub fn remove_all_solutions(&mut self) {
        self.solutions.clear();
        self.assembler = None;
        self.checkpoint = None;
        self.state = SolveState::Unsolved;
        self.reset_counters();
    }

    /// Replaces every full disassembly by its move counts.
    pub fn drop_disassembly_states(&mut self) {
        for solution in &mut self.solutions {
            solution.drop_states();
        }
    }

    /// Stable sort of the stored solutions.
    pub fn sort_solutions(&mut self, by: SortBy) {
        self.solutions.sort_by(|a, b| match by {
            SortBy::AssemblyNumber => a.assembly_number.cmp(&b.assembly_number),
            SortBy::Pieces => b.assembly.compare_pieces(&a.assembly),
            SortBy::Level | SortBy::SumMoves => match (a.disassembly(), b.disassembly()) {
                (Some(x), Some(y)) if by == SortBy::Level => x.compare(y),
                (Some(x), Some(y)) => x.sum_moves().cmp(&y.sum_moves()),
                // solutions without disassembly go last
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        });
    }

    /// Cells of every instance of an assembly, empty for unplaced ones.
    pub fn assembly_cells(&self, view: PuzzleView<'_>, assembly: &Assembly) -> Result<Vec<Vec<Coord>>, Error> {
        (0..assembly.piece_count())
            .map(|piece| {
                let Some(shape) = self.piece_shape(piece) else {
                    return Ok(Vec::new());
                };
                let shape = view.shape(shape)?;
                Ok(assembly.piece_cells(view.grid, shape, piece).unwrap_or_default())
            })
            .collect()
    }

    /// Checks the references into the shape list.
    pub fn check(&self, view: PuzzleView<'_>) -> Result<(), Error> {
        let result = self.result.ok_or(Error::NoResult)?;
        view.shape(result)?;
        for part in &self.parts {
            view.shape(part.shape)?;
        }
        Ok(())
    }

    /// A problem loaded in the middle of a search without saved position can
    /// not continue.
    pub(crate) fn after_load(&mut self) {
        if self.state == SolveState::Solving && self.checkpoint.is_none() {
            self.make_unknown();
        }
    }
}

/// A set of shapes on one grid and the problems built from them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Puzzle {
    pub grid: GridType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default)]
    shapes: Vec<Shape>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    colors: Vec<Color>,
    #[serde(default)]
    problems: Vec<Problem>,
}

impl Puzzle {
    pub fn new(grid: GridType) -> Self {
        Self {
            grid,
            comment: String::new(),
            shapes: Vec::new(),
            colors: Vec::new(),
            problems: Vec::new(),
        }
    }

    pub fn view(&self) -> PuzzleView<'_> {
        PuzzleView {
            grid: self.grid,
            shapes: &self.shapes,
            color_count: self.colors.len(),
        }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, id: usize) -> Result<&Shape, Error> {
        self.shapes.get(id).ok_or(Error::UnknownShape(id))
    }

    pub fn add_shape(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    /// Changes a shape; problems using it lose their search state.
    pub fn edit_shape(&mut self, id: usize, edit: impl FnOnce(&mut Shape)) -> Result<(), Error> {
        let shape = self.shapes.get_mut(id).ok_or(Error::UnknownShape(id))?;
        edit(shape);
        for problem in &mut self.problems {
            if problem.uses_shape(id) {
                problem.edit_problem();
            }
        }
        Ok(())
    }

    pub fn remove_shape(&mut self, id: usize) -> Result<Shape, Error> {
        if id >= self.shapes.len() {
            return Err(Error::UnknownShape(id));
        }
        for problem in &mut self.problems {
            problem.remove_shape(id);
        }
        Ok(self.shapes.remove(id))
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Adds a color and returns its 1-based id.
    pub fn add_color(&mut self, color: Color) -> u16 {
        self.colors.push(color);
        self.colors.len() as u16
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn problem(&self, index: usize) -> Result<&Problem, Error> {
        self.problems.get(index).ok_or(Error::UnknownProblem(index))
    }

    pub fn problem_mut(&mut self, index: usize) -> Result<&mut Problem, Error> {
        self.problems
            .get_mut(index)
            .ok_or(Error::UnknownProblem(index))
    }

    pub fn add_problem(&mut self, problem: Problem) -> usize {
        self.problems.push(problem);
        self.problems.len() - 1
    }

    /// The shared data together with one problem open for writing.
    pub fn split_problem_mut(&mut self, index: usize) -> Result<(PuzzleView<'_>, &mut Problem), Error> {
        let problem = self
            .problems
            .get_mut(index)
            .ok_or(Error::UnknownProblem(index))?;
        let view = PuzzleView {
            grid: self.grid,
            shapes: &self.shapes,
            color_count: self.colors.len(),
        };
        Ok((view, problem))
    }

    /// Checks that every shape only uses cells of the grid.
    pub fn check(&self) -> Result<(), Error> {
        for (shape, data) in self.shapes.iter().enumerate() {
            if let Some(coord) = data.first_invalid_cell(self.grid) {
                return Err(Error::InvalidCell {
                    shape,
                    coord,
                    grid: self.grid,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn after_load(&mut self) {
        for problem in &mut self.problems {
            problem.after_load();
        }
    }
}
