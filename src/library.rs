//! Built-in puzzles.
//!
//! Each entry builds a complete [`Puzzle`] with a single problem, ready to
//! be solved or written out as a puzzle file.

use crate::geometry::GridType;
use crate::problem::{Problem, Puzzle};
use crate::shape::{Cell, Coord, Shape};

/// A named puzzle of the library.
pub struct Builtin {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Puzzle,
}

impl Builtin {
    pub fn build(&self) -> Puzzle {
        (self.build)()
    }
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "unit-cubes",
        description: "eight unit cubes forming a 2x2x2 cube",
        build: unit_cubes,
    },
    Builtin {
        name: "soma",
        description: "the seven Soma pieces forming a 3x3x3 cube",
        build: soma,
    },
    Builtin {
        name: "bedlam",
        description: "the thirteen Bedlam pieces forming a 4x4x4 cube",
        build: bedlam,
    },
    Builtin {
        name: "sliding-box",
        description: "a cube locked in a box that has to slide before it comes out",
        build: sliding_box,
    },
];

pub fn builtin(name: &str) -> Option<Puzzle> {
    BUILTINS
        .iter()
        .find(|builtin| builtin.name == name)
        .map(Builtin::build)
}

/// The seven Soma cube pieces.
pub const SOMA_PIECES: &[(&str, &[Coord])] = &[
    ("L", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0)]),
    ("T", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (1, 1, 0)]),
    ("S", &[(0, 0, 0), (1, 0, 0), (1, 1, 0), (2, 1, 0)]),
    ("V", &[(0, 0, 0), (1, 0, 0), (0, 1, 0)]),
    // the two screws are mirror images of each other
    ("left screw", &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 0, 1)]),
    ("branch", &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 0, 1)]),
    ("right screw", &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 1, 1)]),
];

/// The thirteen Bedlam cube pieces.
pub const BEDLAM_PIECES: &[(&str, &[Coord])] = &[
    ("little corner", &[(0, 0, 0), (0, 1, 0), (1, 0, 0), (0, 0, 1)]),
    ("long stick", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (3, 0, 0), (3, 1, 0)]),
    ("hat", &[(0, 0, 0), (0, 1, 0), (1, 1, 0), (1, 2, 0), (2, 2, 0)]),
    ("bucket", &[(0, 0, 0), (0, 1, 0), (1, 1, 0), (1, 2, 0), (1, 1, 1)]),
    ("screw", &[(0, 0, 0), (1, 0, 0), (1, 0, 1), (1, 1, 1), (2, 1, 1)]),
    ("twist", &[(0, 0, 0), (1, 0, 0), (1, 1, 0), (1, 1, 1), (2, 1, 1)]),
    ("signpost", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (1, 1, 0), (1, 0, 1)]),
    ("ducktail", &[(0, 0, 0), (1, 0, 0), (1, 1, 0), (2, 1, 0), (1, 0, 1)]),
    ("plane", &[(0, 0, 0), (0, 1, 0), (1, 1, 0), (2, 1, 0), (1, 2, 0)]),
    ("bridge", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0), (2, 1, 0)]),
    ("staircase", &[(0, 0, 0), (1, 0, 0), (1, 1, 0), (2, 1, 0), (2, 2, 0)]),
    ("spikey zag", &[(0, 0, 1), (0, 1, 0), (0, 1, 1), (1, 1, 0), (1, 2, 0)]),
    ("middle zig", &[(0, 0, 0), (0, 1, 0), (0, 1, 1), (1, 1, 0), (1, 2, 0)]),
];

/// A cubic puzzle filling a cube of side `size` with one of every piece.
fn cube_puzzle(name: &str, size: i32, pieces: &[(&str, &[Coord])]) -> Puzzle {
    let mut puzzle = Puzzle::new(GridType::Cubic);
    let result = puzzle.add_shape(Shape::cuboid(format!("{size}x{size}x{size} cube"), (size, size, size)));
    let mut problem = Problem::new(name);
    problem.set_result(result);
    for &(piece, cells) in pieces {
        let shape = puzzle.add_shape(Shape::from_cells(piece, cells));
        problem.set_shape_count(shape, 1, 1);
    }
    puzzle.add_problem(problem);
    puzzle
}

fn unit_cubes() -> Puzzle {
    let mut puzzle = Puzzle::new(GridType::Cubic);
    let result = puzzle.add_shape(Shape::cuboid("2x2x2 cube", (2, 2, 2)));
    let unit = puzzle.add_shape(Shape::from_cells("unit cube", &[(0, 0, 0)]));
    let mut problem = Problem::new("unit cubes");
    problem.set_result(result);
    problem.set_shape_count(unit, 8, 8);
    puzzle.add_problem(problem);
    puzzle
}

fn soma() -> Puzzle {
    cube_puzzle("soma", 3, SOMA_PIECES)
}

fn bedlam() -> Puzzle {
    cube_puzzle("bedlam", 4, BEDLAM_PIECES)
}

/// A 4x3x3 box with a cube inside. The cube first slides sideways into a
/// channel, then leaves through the top.
fn sliding_box() -> Puzzle {
    const CHANNEL: [Coord; 2] = [(2, 1, 1), (2, 1, 2)];
    const CUBE: Coord = (1, 1, 1);

    let mut result = Shape::cuboid("box", (4, 3, 3));
    let mut frame = Shape::cuboid("frame", (4, 3, 3));
    for cell in CHANNEL {
        result.set(cell, Cell::EMPTY);
        frame.set(cell, Cell::EMPTY);
    }
    frame.set(CUBE, Cell::EMPTY);

    let mut puzzle = Puzzle::new(GridType::Cubic);
    let result = puzzle.add_shape(result);
    let frame = puzzle.add_shape(frame);
    let cube = puzzle.add_shape(Shape::from_cells("cube", &[(0, 0, 0)]));
    let mut problem = Problem::new("sliding box");
    problem.set_result(result);
    problem.set_shape_count(frame, 1, 1);
    problem.set_shape_count(cube, 1, 1);
    puzzle.add_problem(problem);
    puzzle
}
