//! Benchmarks for the assemblers and the shape helpers.

use std::ops::ControlFlow;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use burrsolve::assembler::{find_assembler, MatrixOptions, Stop};
use burrsolve::geometry::GridType;
use burrsolve::grid::format_pieces;
use burrsolve::library;
use burrsolve::shape::Shape;
use burrsolve::solve::{CancelToken, SolveParams, Solver};

/// Benchmark the complete Soma puzzle solving process.
fn bench_solve(c: &mut Criterion) {
    c.bench_function("solve_soma", |b| {
        b.iter(|| {
            let mut puzzle = library::builtin("soma").unwrap();
            let (view, problem) = puzzle.split_problem_mut(0).unwrap();
            Solver::new(view, black_box(SolveParams::default()))
                .run(problem)
                .unwrap();
            problem.num_assemblies()
        })
    });
}

/// Benchmark finding 5 Bedlam assemblies.
fn bench_assemble_bedlam_5(c: &mut Criterion) {
    let puzzle = library::builtin("bedlam").unwrap();
    let problem = &puzzle.problems()[0];
    let mut group = c.benchmark_group("bedlam");
    group.sample_size(10);
    group.bench_function("assemble_5", |b| {
        b.iter(|| {
            let mut assembler =
                find_assembler(puzzle.view(), problem, MatrixOptions::default()).unwrap();
            let mut found = 0;
            assembler
                .assemble(&CancelToken::new(), &mut |assembly| {
                    black_box(assembly);
                    found += 1;
                    if found == 5 {
                        ControlFlow::Break(Stop::Done)
                    } else {
                        ControlFlow::Continue(())
                    }
                })
                .unwrap();
            found
        })
    });
    group.finish();
}

/// Benchmark the symmetry of a single piece.
fn bench_shape_symmetry(c: &mut Criterion) {
    let (name, cells) = library::BEDLAM_PIECES[6];
    let shape = Shape::from_cells(name, cells);

    c.bench_function("shape_symmetry", |b| {
        b.iter(|| black_box(&shape).symmetry(GridType::Cubic, false).unwrap())
    });
}

/// Benchmark building every orientation of a piece.
fn bench_orientations(c: &mut Criterion) {
    let (name, cells) = library::SOMA_PIECES[0];
    let shape = Shape::from_cells(name, cells);
    let group = GridType::Cubic.symmetries();

    c.bench_function("all_orientations", |b| {
        b.iter(|| {
            group
                .rotations()
                .map(|t| black_box(&shape).transformed_cells(GridType::Cubic, t).len())
                .sum::<usize>()
        })
    });
}

/// Benchmark formatting a solution for display.
fn bench_format_solution(c: &mut Criterion) {
    let mut puzzle = library::builtin("soma").unwrap();
    let (view, problem) = puzzle.split_problem_mut(0).unwrap();
    let params = SolveParams {
        solution_limit: Some(1),
        ..SolveParams::default()
    };
    Solver::new(view, params).run(problem).unwrap();
    let cells = problem
        .assembly_cells(view, &problem.solutions()[0].assembly)
        .unwrap();

    c.bench_function("format_solution", |b| {
        b.iter(|| format_pieces(((0, 0, 0), (2, 2, 2)), black_box(&cells)))
    });
}

criterion_group!(
    benches,
    bench_solve,
    bench_assemble_bedlam_5,
    bench_shape_symmetry,
    bench_orientations,
    bench_format_solution
);
criterion_main!(benches);
