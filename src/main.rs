//! Command line front end: solve puzzle files or built-in puzzles, show the
//! stored solutions and replay their disassemblies.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use eyre::{bail, eyre, WrapErr};

use burrsolve::disassembly::Disassembly;
use burrsolve::error::Error;
use burrsolve::grid::format_pieces;
use burrsolve::problem::{Puzzle, SortBy};
use burrsolve::replay::Replay;
use burrsolve::shape::{add, Coord};
use burrsolve::solve::{Outcome, SolveParams, Solver};
use burrsolve::{library, persistence};

/// Assembles and disassembles 3D puzzles.
#[derive(Parser)]
#[command(name = "burrsolve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve a problem and write the puzzle with its solutions.
    Solve {
        #[command(flatten)]
        source: Source,
        /// Where to write the result, defaults to the input file.
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Print the stored solutions of a problem.
    Show {
        #[command(flatten)]
        source: Source,
        /// Replay the disassembly of this solution, counted from 1.
        #[arg(long)]
        replay: Option<usize>,
    },
    /// Print the assembly and solution counts of every problem.
    Count {
        #[command(flatten)]
        source: Source,
    },
    /// Write a built-in puzzle as a puzzle file.
    ExportBuiltin { name: String, path: PathBuf },
    /// List the built-in puzzles.
    ListBuiltin,
}

#[derive(Args)]
struct Source {
    /// Puzzle file, or the name of a built-in puzzle.
    puzzle: String,
    /// Index of the problem inside the puzzle.
    #[arg(short, long, default_value_t = 0)]
    problem: usize,
}

impl Source {
    fn load(&self) -> eyre::Result<(Puzzle, Option<PathBuf>)> {
        let path = Path::new(&self.puzzle);
        if path.exists() {
            let puzzle = persistence::load(path)
                .wrap_err_with(|| format!("failed to load {}", path.display()))?;
            return Ok((puzzle, Some(path.to_owned())));
        }
        match library::builtin(&self.puzzle) {
            Some(puzzle) => Ok((puzzle, None)),
            None => bail!("{} is neither a file nor a built-in puzzle", self.puzzle),
        }
    }
}

#[derive(Args)]
struct ParamArgs {
    /// Drop impossible placements before searching.
    #[arg(long)]
    reduce: bool,
    /// Report mirror images of assemblies separately.
    #[arg(long)]
    keep_mirror: bool,
    /// Report rotated copies of assemblies separately.
    #[arg(long)]
    keep_rotations: bool,
    /// Compare every assembly with all of its symmetric images.
    #[arg(long)]
    complete_rotations: bool,
    /// Only keep assemblies that can be taken apart.
    #[arg(short, long)]
    disassemble: bool,
    /// Keep move counts instead of full disassemblies.
    #[arg(long)]
    drop_disassemblies: bool,
    /// Count solutions without storing them.
    #[arg(long)]
    just_count: bool,
    /// Store at most this many solutions.
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long, value_enum)]
    sort_by: Option<SortBy>,
    /// States one disassembly search may explore.
    #[arg(long)]
    max_states: Option<usize>,
}

impl From<ParamArgs> for SolveParams {
    fn from(args: ParamArgs) -> Self {
        SolveParams {
            reduce: args.reduce,
            keep_mirror: args.keep_mirror,
            keep_rotations: args.keep_rotations,
            complete_rotations: args.complete_rotations,
            disassemble: args.disassemble,
            drop_disassemblies: args.drop_disassemblies,
            just_count: args.just_count,
            solution_limit: args.limit,
            sort_by: args.sort_by,
            max_disassembly_states: args.max_states,
        }
    }
}

fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Solve {
            source,
            out,
            params,
        } => run_solve(&source, out, params.into()),
        Command::Show { source, replay } => run_show(&source, replay),
        Command::Count { source } => run_count(&source),
        Command::ExportBuiltin { name, path } => {
            let puzzle = library::builtin(&name).ok_or_else(|| eyre!("no built-in puzzle {name}"))?;
            persistence::save(&puzzle, &path)?;
            Ok(())
        }
        Command::ListBuiltin => {
            for builtin in library::BUILTINS {
                println!("{:<12} {}", builtin.name, builtin.description);
            }
            Ok(())
        }
    }
}

fn run_solve(source: &Source, out: Option<PathBuf>, params: SolveParams) -> eyre::Result<()> {
    let (mut puzzle, input) = source.load()?;
    let result = {
        let (view, problem) = puzzle.split_problem_mut(source.problem)?;
        Solver::new(view, params).run(problem)
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(Error::Fault(fault)) => {
            let path = persistence::emergency_save(&puzzle, &fault, Path::new("."))?;
            bail!("internal error, puzzle saved to {}: {fault}", path.display());
        }
        Err(err) => return Err(err.into()),
    };

    let problem = puzzle.problem(source.problem)?;
    match outcome {
        Outcome::Finished => println!(
            "{}: {} assemblies, {} solutions",
            problem.name,
            problem.num_assemblies(),
            problem.num_solutions()
        ),
        Outcome::Suspended => println!("{}: search suspended", problem.name),
    }

    let target = out
        .or(input)
        .unwrap_or_else(|| PathBuf::from(format!("{}.json", source.puzzle)));
    persistence::save(&puzzle, &target)?;
    println!("Wrote {}", target.display());
    Ok(())
}

fn run_show(source: &Source, replay: Option<usize>) -> eyre::Result<()> {
    let (puzzle, _) = source.load()?;
    let problem = puzzle.problem(source.problem)?;
    let Some(number) = replay else {
        print!("{}", persistence::problem_report(&puzzle, problem)?);
        return Ok(());
    };

    let solution = number
        .checked_sub(1)
        .and_then(|index| problem.solutions().get(index))
        .ok_or_else(|| eyre!("there is no solution {number}"))?;
    let separation = solution
        .separation()
        .ok_or_else(|| eyre!("solution {number} has no stored disassembly"))?;
    let cells = problem.assembly_cells(puzzle.view(), &solution.assembly)?;
    let replay = Replay::new(separation, cells.len(), 4);
    println!("{} moves ({})", replay.moves(), separation.moves_text());
    for (step, frame) in replay.frames().iter().enumerate() {
        let moved: Vec<_> = cells
            .iter()
            .zip(frame)
            .map(|(piece, &offset)| piece.iter().map(|&c| add(c, offset)).collect::<Vec<_>>())
            .collect();
        let Some(bounds) = bounds(&moved) else {
            continue;
        };
        println!("\nstep {step}");
        print!("{}", format_pieces(bounds, &moved));
    }
    Ok(())
}

fn bounds(pieces: &[Vec<Coord>]) -> Option<(Coord, Coord)> {
    let mut cells = pieces.iter().flatten().copied();
    let first = cells.next()?;
    Some(cells.fold((first, first), |(lo, hi), c| {
        (
            (lo.0.min(c.0), lo.1.min(c.1), lo.2.min(c.2)),
            (hi.0.max(c.0), hi.1.max(c.1), hi.2.max(c.2)),
        )
    }))
}

fn run_count(source: &Source) -> eyre::Result<()> {
    let (puzzle, _) = source.load()?;
    for problem in puzzle.problems() {
        println!(
            "{}: {:?}, {} assemblies, {} solutions, {} stored",
            problem.name,
            problem.solve_state(),
            problem.num_assemblies(),
            problem.num_solutions(),
            problem.solutions().len()
        );
    }
    Ok(())
}
