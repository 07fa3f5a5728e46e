//! Assembly and disassembly engine for 3D burr and packing puzzles.
//!
//! A [`problem::Puzzle`] holds shapes on one of five grid families and the
//! problems built from them. For a problem the [`assembler`] finds every way
//! to place the pieces into the result shape, the [`disassembler`] checks
//! whether an assembly can be taken apart by sliding pieces, and
//! [`solve::Solver`] ties both together into a resumable run.

pub mod assembler;
pub mod assembly;
pub mod disassembler;
pub mod disassembly;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod grouping;
pub mod library;
pub mod movement;
pub mod persistence;
pub mod problem;
pub mod replay;
pub mod shape;
pub mod solution;
pub mod solve;
pub mod symmetry;

pub use error::{AssemblerError, Error, Fault};
