//! Assembler strategies: search for all ways to place the pieces into the
//! result shape.
//!
//! Every strategy builds the same [`matrix::PlacementMatrix`] and differs in
//! how it walks it. Searches run in small steps, can stop after any found
//! assembly or on cancellation, and can be saved into a [`Checkpoint`] to be
//! continued later, possibly in another process.

mod backtrack;
mod dlx;
pub(crate) mod matrix;
mod pruning;

use std::fmt;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

pub use backtrack::BacktrackAssembler;
pub use dlx::DlxAssembler;

use crate::assembly::Assembly;
use crate::error::{AssemblerError, Error, Fault};
use crate::problem::{Problem, PuzzleView};
use crate::solve::CancelToken;
use matrix::PlacementMatrix;

/// Symmetry handling while building the placement matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatrixOptions {
    /// Report mirrored copies of assemblies separately.
    pub keep_mirror: bool,
    /// Report rotated copies of assemblies separately.
    pub keep_rotations: bool,
    /// Compare every found assembly with all of its symmetric images.
    pub complete_rotations: bool,
}

/// Saved position of a search. `version` names the strategy and the layout
/// of `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: String,
    pub position: String,
}

pub trait Assembler: fmt::Debug + Send {
    fn name(&self) -> &'static str;

    /// Builds the placement matrix. Must be called once before anything else.
    fn create_matrix(
        &mut self,
        view: PuzzleView<'_>,
        problem: &Problem,
        options: MatrixOptions,
    ) -> Result<(), Error>;

    /// Drops placements that can not be part of any assembly. Reports the
    /// index of the part being checked.
    fn reduce(&mut self, cancel: &CancelToken, progress: &mut dyn FnMut(usize));

    /// Runs the search, handing every assembly to `found`. Returns `true`
    /// when the search space is exhausted and `false` when it stopped early
    /// because `found` asked for it or the run was cancelled. Calling again
    /// continues where it stopped.
    fn assemble(
        &mut self,
        cancel: &CancelToken,
        found: &mut dyn FnMut(Assembly) -> ControlFlow<Stop>,
    ) -> Result<bool, Fault>;

    /// Advances the search by up to `steps` steps without reporting
    /// assemblies. Returns `true` when the search space is exhausted.
    fn debug_step(&mut self, steps: usize) -> Result<bool, Fault>;

    /// The pieces placed at the current search position.
    fn partial_assembly(&self) -> Assembly;

    /// Rough fraction of the search space already explored.
    fn finished(&self) -> f64;

    /// Number of placements tried so far.
    fn iterations(&self) -> u64;

    fn save(&self) -> Checkpoint;

    fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), AssemblerError>;
}

/// Builds the first strategy that can handle the problem, the fast exact
/// cover search first.
pub fn find_assembler(
    view: PuzzleView<'_>,
    problem: &Problem,
    options: MatrixOptions,
) -> Result<Box<dyn Assembler>, Error> {
    let candidates: [Box<dyn Assembler>; 2] = [
        Box::new(DlxAssembler::default()),
        Box::new(BacktrackAssembler::default()),
    ];
    for mut assembler in candidates {
        match assembler.create_matrix(view, problem, options) {
            Ok(()) => {
                log::info!("problem {:?}: using the {} assembler", problem.name, assembler.name());
                return Ok(assembler);
            }
            Err(Error::Assembler(AssemblerError::PuzzleUnhandable)) => {
                log::debug!("the {} assembler can not handle {:?}", assembler.name(), problem.name);
            }
            Err(err) => return Err(err),
        }
    }
    Err(Error::NoAssembler)
}

/// Why the receiver of an assembly stopped the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The assembly was handled.
    Done,
    /// The assembly was not handled and is reported again when the search
    /// continues.
    Again,
}

/// What a single search step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Searching,
    Found,
    Exhausted,
}

/// The step interface both strategies implement.
pub(crate) trait Search {
    fn step(&mut self, matrix: &PlacementMatrix) -> Result<Step, Fault>;

    /// Rows chosen at the current position.
    fn chosen(&self) -> Vec<usize>;

    /// Goes back to just before the last [`Step::Found`].
    fn rewind(&mut self);
}

pub(crate) fn drive(
    search: &mut impl Search,
    matrix: &PlacementMatrix,
    cancel: &CancelToken,
    found: &mut dyn FnMut(Assembly) -> ControlFlow<Stop>,
) -> Result<bool, Fault> {
    loop {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        match search.step(matrix)? {
            Step::Searching => {}
            Step::Exhausted => return Ok(true),
            Step::Found => {
                let chosen = search.chosen();
                if !matrix.is_canonical(&chosen) {
                    continue;
                }
                match found(matrix.assembly(&chosen)) {
                    ControlFlow::Continue(()) => {}
                    ControlFlow::Break(Stop::Done) => return Ok(false),
                    ControlFlow::Break(Stop::Again) => {
                        search.rewind();
                        return Ok(false);
                    }
                }
            }
        }
    }
}

pub(crate) fn drive_steps(
    search: &mut impl Search,
    matrix: &PlacementMatrix,
    steps: usize,
) -> Result<bool, Fault> {
    for _ in 0..steps {
        if search.step(matrix)? == Step::Exhausted {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Serialized form of a search position: how many rows were tried on every
/// level of the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SearchPosition {
    /// Number of matrix rows, to detect a differently built matrix.
    pub rows: usize,
    /// Rows dropped by reduction when the position was saved.
    #[serde(default)]
    pub dropped: Vec<u32>,
    pub iterations: u64,
    pub phase: u8,
    pub stack: Vec<u32>,
}

impl SearchPosition {
    /// An empty position over `matrix`, remembering its dropped rows.
    pub fn start(matrix: Option<&PlacementMatrix>) -> Self {
        Self {
            rows: matrix.map_or(0, |matrix| matrix.rows.len()),
            dropped: matrix.map(PlacementMatrix::dropped_rows).unwrap_or_default(),
            iterations: 0,
            phase: 0,
            stack: Vec::new(),
        }
    }

    pub fn save(&self, version: &str) -> Checkpoint {
        Checkpoint {
            version: version.to_owned(),
            // serializing plain integers can not fail
            position: serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Reads the position and brings the reduction of `matrix` to the saved
    /// one, whether or not `matrix` was reduced before.
    pub fn load(
        checkpoint: &Checkpoint,
        version: &str,
        matrix: &mut PlacementMatrix,
    ) -> Result<Self, AssemblerError> {
        if checkpoint.version != version {
            return Err(AssemblerError::CanNotRestoreVersion);
        }
        let position: SearchPosition = serde_json::from_str(&checkpoint.position)
            .map_err(|_| AssemblerError::CanNotRestoreSyntax)?;
        if position.rows != matrix.rows.len() {
            return Err(AssemblerError::CanNotRestoreSyntax);
        }
        if !matrix.set_dropped_rows(&position.dropped) {
            return Err(AssemblerError::CanNotRestoreSyntax);
        }
        Ok(position)
    }
}

/// Fraction of the search space left of the current position, given the
/// (tried, total) counts of every stack level.
pub(crate) fn progress(levels: impl Iterator<Item = (u32, u32)>) -> f64 {
    let mut done = 0.0;
    let mut scale = 1.0;
    for (tried, total) in levels {
        if total == 0 {
            break;
        }
        let total = f64::from(total);
        done += scale * f64::from(tried.saturating_sub(1)) / total;
        scale /= total;
    }
    done
}
