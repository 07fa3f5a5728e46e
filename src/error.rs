//! Error types shared by the whole crate.
//!
//! Three kinds of failures exist:
//! - [`AssemblerError`]: configuration and restore errors reported by an
//!   assembler strategy. They are terminal for that assembler instance only.
//! - [`Fault`]: a broken internal invariant. The search result can no longer
//!   be trusted, so a fault must travel up to the host which saves what it can
//!   and stops.
//! - Everything else ([`Error`]): bad input files, unknown ids, I/O.
//!
//! Negative search outcomes (no assembly, no disassembly, inconsistent
//! grouping) are not errors and are reported through `Option`/`bool`.

use crate::geometry::GridType;
use crate::problem::SolveState;
use crate::shape::Coord;

/// Error codes reported by [`crate::assembler::Assembler`] implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AssemblerError {
    /// The pieces need more cells than the result can offer, by this many.
    #[error("the pieces contain {0} more units than the result shape can hold")]
    TooManyUnits(u32),
    /// The pieces can not fill the required cells, this many are missing.
    #[error("the pieces are {0} units short of filling the result shape")]
    TooFewUnits(u32),
    /// The piece with the given index has no valid placement at all.
    #[error("piece {0} can not be placed anywhere inside the result shape")]
    CanNotPlace(usize),
    /// This strategy can not model the problem; try the next strategy.
    #[error("the assembler can not handle this puzzle")]
    PuzzleUnhandable,
    /// The checkpoint was written by a different assembler or version.
    #[error("the saved assembler position has an incompatible version")]
    CanNotRestoreVersion,
    /// The checkpoint is malformed or does not match the problem.
    #[error("the saved assembler position is corrupt")]
    CanNotRestoreSyntax,
}

/// A violated internal invariant, carrying where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal invariant `{expression}` violated in {function} ({file}:{line})")]
pub struct Fault {
    pub expression: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
}

impl Fault {
    pub const fn new(
        expression: &'static str,
        file: &'static str,
        line: u32,
        function: &'static str,
    ) -> Self {
        Self {
            expression,
            file,
            line,
            function,
        }
    }
}

/// Top level error type of the library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Assembler(#[from] AssemblerError),

    #[error(transparent)]
    Fault(#[from] Fault),

    #[error("shape {0} does not exist")]
    UnknownShape(usize),

    #[error("problem {0} does not exist")]
    UnknownProblem(usize),

    #[error("the problem has no result shape")]
    NoResult,

    #[error("cell {coord:?} of shape {shape} is not a valid cell of the {grid} grid")]
    InvalidCell {
        shape: usize,
        coord: Coord,
        grid: GridType,
    },

    #[error("the {0} grid does not support disassembly")]
    CannotDisassemble(GridType),

    #[error("no assembler is able to handle this problem")]
    NoAssembler,

    #[error("the problem is {actual:?}, but this operation needs {expected:?}")]
    WrongState {
        expected: SolveState,
        actual: SolveState,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed puzzle document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Expands to the path of the enclosing function.
#[doc(hidden)]
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        match name.strip_suffix("::f") {
            Some(stripped) => stripped,
            None => name,
        }
    }};
}

/// Returns a [`Fault`] from the enclosing function when the condition does
/// not hold. The enclosing function must return a `Result` whose error type
/// implements `From<Fault>`.
#[macro_export]
macro_rules! invariant {
    ($cond:expr) => {
        if !($cond) {
            return Err($crate::fault!(stringify!($cond)).into());
        }
    };
}

/// Builds a [`Fault`] for the current location, naming what was expected.
#[macro_export]
macro_rules! fault {
    ($what:expr) => {
        $crate::error::Fault::new($what, file!(), line!(), $crate::function_name!())
    };
}
