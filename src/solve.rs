//! The solve loop: build or resume an assembler, run it, and turn every
//! assembly it finds into a stored solution.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::assembler::{find_assembler, MatrixOptions, Stop};
use crate::assembly::Assembly;
use crate::disassembler::Disassembler;
use crate::disassembly::SeparationInfo;
use crate::error::Error;
use crate::problem::{Problem, PuzzleView, SolveState, SortBy};
use crate::solution::{DisassemblyRecord, Solution};

/// Shared flag asking a running search to stop at the next step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a solve run does besides assembling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveParams {
    /// Drop impossible placements before searching.
    pub reduce: bool,
    pub keep_mirror: bool,
    pub keep_rotations: bool,
    pub complete_rotations: bool,
    /// Only keep assemblies that can be taken apart.
    pub disassemble: bool,
    /// Store move counts instead of full disassemblies.
    pub drop_disassemblies: bool,
    /// Count, but store nothing.
    pub just_count: bool,
    /// Store at most this many solutions; later ones are only counted.
    pub solution_limit: Option<usize>,
    pub sort_by: Option<SortBy>,
    /// States one disassembly search may explore.
    pub max_disassembly_states: Option<usize>,
}

impl SolveParams {
    fn matrix_options(&self) -> MatrixOptions {
        MatrixOptions {
            keep_mirror: self.keep_mirror,
            keep_rotations: self.keep_rotations,
            complete_rotations: self.complete_rotations,
        }
    }
}

/// How a solve run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything was searched.
    Finished,
    /// Cancelled; the position is saved in the problem.
    Suspended,
}

/// Runs one problem of a puzzle.
#[derive(Debug)]
pub struct Solver<'a> {
    view: PuzzleView<'a>,
    params: SolveParams,
    cancel: CancelToken,
}

impl<'a> Solver<'a> {
    pub fn new(view: PuzzleView<'a>, params: SolveParams) -> Self {
        Self {
            view,
            params,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Solves `problem`, or continues an earlier run of it.
    pub fn run(&self, problem: &mut Problem) -> Result<Outcome, Error> {
        problem.check(self.view)?;
        if problem.solve_state() == SolveState::Solved {
            log::info!("problem {:?} is already solved", problem.name);
            return Ok(Outcome::Finished);
        }

        let mut disassembler = if self.params.disassemble {
            Some(
                Disassembler::new(self.view, problem)?
                    .with_state_limit(self.params.max_disassembly_states)
                    .with_cancel(self.cancel.clone()),
            )
        } else {
            None
        };

        if problem.assembler().is_none() {
            let mut assembler = find_assembler(self.view, problem, self.params.matrix_options())?;
            // a saved position brings its own reduction along
            if self.params.reduce && problem.checkpoint().is_none() {
                assembler.reduce(&self.cancel, &mut |part| log::info!("reducing piece {part}"));
            }
            problem.set_assembler(assembler)?;
        }
        let Some(mut assembler) = problem.take_assembler() else {
            return Err(Error::NoAssembler);
        };

        let started = Instant::now();
        let mut fault = None;
        let exhausted = assembler.assemble(&self.cancel, &mut |assembly| {
            match self.handle(problem, disassembler.as_mut(), assembly) {
                Ok(flow) => flow,
                Err(err) => {
                    fault = Some(err);
                    ControlFlow::Break(Stop::Again)
                }
            }
        });
        problem.add_time(started.elapsed());

        let exhausted = match (exhausted, fault) {
            (Err(fault), _) => return Err(fault.into()),
            (Ok(_), Some(err)) => {
                problem.suspend(assembler);
                return Err(err);
            }
            (Ok(exhausted), None) => exhausted,
        };

        if exhausted {
            problem.finish_solving()?;
            log::info!(
                "problem {:?}: {} assemblies, {} solutions",
                problem.name,
                problem.num_assemblies(),
                problem.num_solutions()
            );
            if let Some(by) = self.params.sort_by {
                problem.sort_solutions(by);
            }
            Ok(Outcome::Finished)
        } else {
            problem.suspend(assembler);
            Ok(Outcome::Suspended)
        }
    }

    fn handle(
        &self,
        problem: &mut Problem,
        disassembler: Option<&mut Disassembler<'_>>,
        assembly: Assembly,
    ) -> Result<ControlFlow<Stop>, Error> {
        let record = match disassembler {
            Some(disassembler) => match disassembler.disassemble(&assembly)? {
                Some(separation) if self.params.drop_disassemblies => {
                    Some(DisassemblyRecord::Info(SeparationInfo::from(&separation)))
                }
                Some(separation) => Some(DisassemblyRecord::Full(separation)),
                // an interrupted disassembly is redone when the search resumes
                None if self.cancel.is_cancelled() => return Ok(ControlFlow::Break(Stop::Again)),
                None => {
                    problem.count_assembly();
                    return Ok(ControlFlow::Continue(()));
                }
            },
            None => None,
        };

        let assembly_number = problem.count_assembly();
        let solution_number = problem.count_solution();
        let stored = problem.solutions().len();
        if self.params.just_count || self.params.solution_limit.is_some_and(|limit| stored >= limit) {
            return Ok(ControlFlow::Continue(()));
        }
        let solution = Solution::new(assembly, assembly_number);
        let solution = match record {
            Some(record) => solution.with_disassembly(solution_number, record),
            None => solution,
        };
        problem.add_solution(solution)?;
        Ok(ControlFlow::Continue(()))
    }
}
