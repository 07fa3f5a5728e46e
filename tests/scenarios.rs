//! End to end runs over the built-in puzzles and small hand made problems.

use std::ops::ControlFlow;

use rustc_hash::FxHashSet;

use burrsolve::assembler::{find_assembler, MatrixOptions, Stop};
use burrsolve::disassembly::{Disassembly, Separation, SeparationInfo};
use burrsolve::error::{AssemblerError, Error};
use burrsolve::geometry::GridType;
use burrsolve::library;
use burrsolve::persistence;
use burrsolve::problem::{Problem, Puzzle, SolveState};
use burrsolve::replay::Replay;
use burrsolve::shape::{add, Coord, Shape};
use burrsolve::solve::{CancelToken, Outcome, SolveParams, Solver};

fn solve(puzzle: &mut Puzzle, params: SolveParams) -> Result<Outcome, Error> {
    let (view, problem) = puzzle.split_problem_mut(0)?;
    Solver::new(view, params).run(problem)
}

fn with_disassembly() -> SolveParams {
    SolveParams {
        disassemble: true,
        ..SolveParams::default()
    }
}

fn dominoes() -> Puzzle {
    let mut puzzle = Puzzle::new(GridType::Cubic);
    let result = puzzle.add_shape(Shape::cuboid("strip", (4, 2, 1)));
    let domino = puzzle.add_shape(Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]));
    let mut problem = Problem::new("dominoes");
    problem.set_result(result);
    problem.set_shape_count(domino, 4, 4);
    puzzle.add_problem(problem);
    puzzle
}

#[test]
fn test_unit_cubes_come_apart() {
    let mut puzzle = library::builtin("unit-cubes").unwrap();
    assert_eq!(solve(&mut puzzle, with_disassembly()).unwrap(), Outcome::Finished);
    let problem = &puzzle.problems()[0];
    assert_eq!(problem.num_assemblies(), 1);
    assert_eq!(problem.num_solutions(), 1);
    let root = problem.solutions()[0].separation().unwrap();
    // a corner cube slides out right away
    assert_eq!(root.moves(), 1);
}

#[test]
fn test_sliding_box_needs_a_slide_first() {
    let mut puzzle = library::builtin("sliding-box").unwrap();
    solve(&mut puzzle, with_disassembly()).unwrap();
    let problem = &puzzle.problems()[0];
    assert_eq!(problem.num_solutions(), 1);
    let root = problem.solutions()[0].separation().unwrap();
    assert!(root.moves() >= 2);
}

#[test]
fn test_piece_without_placement() {
    let mut puzzle = Puzzle::new(GridType::Cubic);
    let result = puzzle.add_shape(Shape::from_cells(
        "square with a bump",
        &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 1, 0), (0, 0, 1)],
    ));
    let unit = puzzle.add_shape(Shape::from_cells("unit", &[(0, 0, 0)]));
    let bar = puzzle.add_shape(Shape::from_cells("bar", &[(0, 0, 0), (1, 0, 0), (2, 0, 0)]));
    let mut problem = Problem::new("no room for the bar");
    problem.set_result(result);
    problem.set_shape_count(unit, 2, 2);
    problem.set_shape_count(bar, 1, 1);
    puzzle.add_problem(problem);

    let err = solve(&mut puzzle, SolveParams::default()).unwrap_err();
    assert!(matches!(err, Error::Assembler(AssemblerError::CanNotPlace(2))), "{err}");
}

#[test]
fn test_too_many_units() {
    let mut puzzle = Puzzle::new(GridType::Cubic);
    let result = puzzle.add_shape(Shape::cuboid("square", (2, 2, 1)));
    let unit = puzzle.add_shape(Shape::from_cells("unit", &[(0, 0, 0)]));
    let mut problem = Problem::new("crowded");
    problem.set_result(result);
    problem.set_shape_count(unit, 6, 6);
    puzzle.add_problem(problem);

    let err = solve(&mut puzzle, SolveParams::default()).unwrap_err();
    assert!(matches!(err, Error::Assembler(AssemblerError::TooManyUnits(2))), "{err}");
}

#[test]
fn test_soma_counts() {
    let mut puzzle = library::builtin("soma").unwrap();
    solve(&mut puzzle, SolveParams::default()).unwrap();
    assert_eq!(puzzle.problems()[0].num_assemblies(), 240);

    let mut puzzle = library::builtin("soma").unwrap();
    let params = SolveParams {
        keep_mirror: true,
        ..SolveParams::default()
    };
    solve(&mut puzzle, params).unwrap();
    assert_eq!(puzzle.problems()[0].num_assemblies(), 480);
}

#[test]
fn test_pruning_keeps_one_per_orbit() {
    let mut puzzle = dominoes();
    solve(
        &mut puzzle,
        SolveParams {
            keep_rotations: true,
            keep_mirror: true,
            ..SolveParams::default()
        },
    )
    .unwrap();
    assert_eq!(puzzle.problems()[0].num_assemblies(), 5);

    // the two tilings with a single horizontal pair are turned copies
    let mut puzzle = dominoes();
    solve(&mut puzzle, SolveParams::default()).unwrap();
    assert_eq!(puzzle.problems()[0].num_assemblies(), 4);
}

#[test]
fn test_runs_are_deterministic() {
    let run = || {
        let mut puzzle = library::builtin("soma").unwrap();
        solve(&mut puzzle, SolveParams::default()).unwrap();
        puzzle.problems()[0].solutions().to_vec()
    };
    assert_eq!(run(), run());
}

fn check_separation(separation: &Separation, cells: &[Vec<Coord>]) {
    let states = separation.states();
    for state in states {
        let mut taken = FxHashSet::default();
        for (i, &piece) in separation.pieces().iter().enumerate() {
            for &cell in &cells[piece as usize] {
                assert!(taken.insert(add(cell, state.get(i))), "pieces overlap");
            }
        }
    }

    // the removal only moves the removed group
    let last = &states[states.len() - 1];
    let before = &states[states.len() - 2];
    for i in 0..separation.piece_count() {
        if !last.piece_removed(i) {
            assert_eq!(last.get(i), before.get(i));
        }
    }

    for child in [separation.removed(), separation.left()].into_iter().flatten() {
        check_separation(child, cells);
    }
}

#[test]
fn test_disassemblies_are_sound() {
    for name in ["unit-cubes", "sliding-box"] {
        let mut puzzle = library::builtin(name).unwrap();
        solve(&mut puzzle, with_disassembly()).unwrap();
        let problem = &puzzle.problems()[0];
        for solution in problem.solutions() {
            let cells = problem.assembly_cells(puzzle.view(), &solution.assembly).unwrap();
            let separation = solution.separation().unwrap();
            check_separation(separation, &cells);

            let replay = Replay::new(separation, cells.len(), 4);
            assert_eq!(replay.moves() as u32, separation.sum_moves());
        }
    }
}

#[test]
fn test_move_counts_survive_dropping_states() {
    let mut puzzle = library::builtin("sliding-box").unwrap();
    solve(&mut puzzle, with_disassembly()).unwrap();
    let separation = puzzle.problems()[0].solutions()[0].separation().unwrap();
    let info = SeparationInfo::from(separation);
    assert_eq!(info.sum_moves(), separation.sum_moves());
    assert_eq!(info.moves_text(), separation.moves_text());
    assert_eq!(info.num_sequences(), separation.num_sequences());
    for x in 0..separation.num_sequences() {
        assert_eq!(info.sequence_length(x), separation.sequence_length(x));
    }
}

#[test]
fn test_editing_a_solved_problem() {
    let mut puzzle = dominoes();
    assert_eq!(puzzle.problems()[0].solve_state(), SolveState::Unsolved);
    solve(&mut puzzle, SolveParams::default()).unwrap();
    assert_eq!(puzzle.problems()[0].solve_state(), SolveState::Solved);

    let problem = puzzle.problem_mut(0).unwrap();
    problem.set_max_holes(Some(0));
    assert_eq!(problem.solve_state(), SolveState::Unknown);
    assert_eq!(problem.num_assemblies(), 0);

    // solving again starts over
    solve(&mut puzzle, SolveParams::default()).unwrap();
    let problem = &puzzle.problems()[0];
    assert_eq!(problem.solve_state(), SolveState::Solved);
    assert_eq!(problem.num_assemblies(), 4);
    assert_eq!(problem.solutions().len(), 4);
}

fn keep_all() -> SolveParams {
    SolveParams {
        keep_rotations: true,
        keep_mirror: true,
        ..SolveParams::default()
    }
}

/// Runs the search of `puzzle` directly, stops after `found` assemblies and
/// leaves the position in the problem, as an interrupted solve does.
fn suspend_after(puzzle: &mut Puzzle, found: usize, reduce: bool) {
    let options = MatrixOptions {
        keep_rotations: true,
        keep_mirror: true,
        complete_rotations: false,
    };
    let (view, problem) = puzzle.split_problem_mut(0).unwrap();
    let mut assembler = find_assembler(view, problem, options).unwrap();
    if reduce {
        assembler.reduce(&CancelToken::new(), &mut |_| {});
    }
    problem.set_assembler(assembler).unwrap();
    let mut assembler = problem.take_assembler().unwrap();
    let mut seen = 0;
    let exhausted = assembler
        .assemble(&CancelToken::new(), &mut |_| {
            seen += 1;
            if seen == found {
                ControlFlow::Break(Stop::Done)
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    assert!(!exhausted);
    problem.suspend(assembler);
}

/// Three dominoes in a 2x2 square with a tail; the domino bridging square
/// and tail leaves the last tail cell uncovered, so reduction drops it.
fn hook() -> Puzzle {
    let mut puzzle = Puzzle::new(GridType::Cubic);
    let result = puzzle.add_shape(Shape::from_cells(
        "hook",
        &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (3, 0, 0), (0, 1, 0), (1, 1, 0)],
    ));
    let domino = puzzle.add_shape(Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]));
    let mut problem = Problem::new("hook");
    problem.set_result(result);
    problem.set_shape_count(domino, 3, 3);
    puzzle.add_problem(problem);
    puzzle
}

#[test]
fn test_search_resumes_from_a_saved_file() {
    let mut puzzle = dominoes();
    suspend_after(&mut puzzle, 2, false);

    let text = persistence::to_json(&puzzle).unwrap();
    let mut loaded = persistence::from_json(&text).unwrap();
    assert_eq!(loaded.problems()[0].solve_state(), SolveState::Solving);
    assert_eq!(solve(&mut loaded, keep_all()).unwrap(), Outcome::Finished);
    // the two assemblies seen before saving are not reported again
    assert_eq!(loaded.problems()[0].num_assemblies(), 3);
}

#[test]
fn test_resume_with_other_reduce_setting() {
    for (reduced_before, reduce_now) in [(false, true), (true, false)] {
        let mut puzzle = hook();
        suspend_after(&mut puzzle, 1, reduced_before);
        let params = SolveParams {
            reduce: reduce_now,
            ..keep_all()
        };
        assert_eq!(solve(&mut puzzle, params).unwrap(), Outcome::Finished);
        let problem = &puzzle.problems()[0];
        assert_eq!(problem.num_assemblies(), 1, "{reduced_before} {reduce_now}");
    }

    let mut puzzle = hook();
    solve(&mut puzzle, keep_all()).unwrap();
    assert_eq!(puzzle.problems()[0].num_assemblies(), 2);
}

#[test]
fn test_broken_checkpoint_starts_over() {
    let mut puzzle = dominoes();
    suspend_after(&mut puzzle, 2, false);

    let mut value: serde_json::Value =
        serde_json::from_str(&persistence::to_json(&puzzle).unwrap()).unwrap();
    value["problems"][0]["checkpoint"]["version"] = "dlx-0".into();
    let mut loaded = persistence::from_json(&value.to_string()).unwrap();

    let err = solve(&mut loaded, keep_all()).unwrap_err();
    assert!(matches!(err, Error::Assembler(AssemblerError::CanNotRestoreVersion)), "{err}");
    let problem = &loaded.problems()[0];
    assert_eq!(problem.solve_state(), SolveState::Unsolved);
    assert!(problem.solutions().is_empty());

    solve(&mut loaded, keep_all()).unwrap();
    let problem = &loaded.problems()[0];
    assert_eq!(problem.num_assemblies(), 5);
    assert_eq!(problem.solutions().len(), 5);
}
