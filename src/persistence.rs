//! Puzzle files and reports.
//!
//! Puzzles are stored as pretty-printed JSON. A problem that was suspended
//! in the middle of a search carries its assembler checkpoint and continues
//! when solved again after loading.

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::error::{Error, Fault};
use crate::grid::format_pieces;
use crate::problem::{Problem, Puzzle};

/// File written by [`emergency_save`].
pub const EMERGENCY_FILE: &str = "burrsolve-emergency.json";

pub fn from_json(text: &str) -> Result<Puzzle, Error> {
    let mut puzzle: Puzzle = serde_json::from_str(text)?;
    puzzle.check()?;
    puzzle.after_load();
    Ok(puzzle)
}

pub fn to_json(puzzle: &Puzzle) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(puzzle)?)
}

pub fn load(path: &Path) -> Result<Puzzle, Error> {
    let puzzle = from_json(&fs::read_to_string(path)?)?;
    log::info!(
        "loaded {} with {} shapes and {} problems",
        path.display(),
        puzzle.shapes().len(),
        puzzle.problems().len()
    );
    Ok(puzzle)
}

/// Writes the puzzle next to `path` first and renames it into place, so an
/// interrupted save never leaves a truncated file.
pub fn save(puzzle: &Puzzle, path: &Path) -> Result<(), Error> {
    let text = to_json(puzzle)?;
    let partial = path.with_extension("partial");
    fs::write(&partial, text)?;
    fs::rename(&partial, path)?;
    log::info!("saved {}", path.display());
    Ok(())
}

/// Saves what can be saved after a broken invariant, into `dir`.
pub fn emergency_save(puzzle: &Puzzle, fault: &Fault, dir: &Path) -> Result<PathBuf, Error> {
    log::error!("{fault}");
    let path = dir.join(EMERGENCY_FILE);
    fs::write(&path, to_json(puzzle)?)?;
    log::error!("puzzle saved to {}", path.display());
    Ok(path)
}

/// Human readable summary of a problem and its stored solutions.
pub fn problem_report(puzzle: &Puzzle, problem: &Problem) -> Result<String, Error> {
    let view = puzzle.view();
    let mut out = format!("{} ({:?})\n", problem.name, problem.solve_state());
    let pieces = problem
        .parts()
        .iter()
        .map(|part| {
            let name = puzzle.shape(part.shape).map_or("?", |shape| shape.name.as_str());
            if part.min == part.max {
                format!("{} x{}", name, part.max)
            } else {
                format!("{} x{}..{}", name, part.min, part.max)
            }
        })
        .join(", ");
    out.push_str(&format!("pieces: {pieces}\n"));
    out.push_str(&format!(
        "assemblies: {}, solutions: {}, time: {}s\n",
        problem.num_assemblies(),
        problem.num_solutions(),
        problem.used_time().as_secs()
    ));

    let result = puzzle.shape(problem.result().ok_or(Error::NoResult)?)?;
    let bounds = result.bounding_box().unwrap_or(((0, 0, 0), (0, 0, 0)));
    for solution in problem.solutions() {
        out.push_str(&format!("\nassembly {}", solution.assembly_number + 1));
        if let Some(disassembly) = solution.disassembly() {
            out.push_str(&format!(", moves {}", disassembly.moves_text()));
        }
        out.push('\n');
        let cells = problem.assembly_cells(view, &solution.assembly)?;
        out.push_str(&format_pieces(bounds, &cells));
    }
    Ok(out)
}
