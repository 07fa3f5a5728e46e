//! Grid families and their geometry.
//!
//! Every grid family addresses its cells with integer `(x, y, z)` triples,
//! but not every triple is a cell and not every vector is a translation that
//! maps cells onto cells of the same kind:
//!
//! | family | cells | legal translations |
//! |---|---|---|
//! | cubic | all | all |
//! | triangular prism | all, `(x + y)` even points up | `dx + dy` even |
//! | sphere packing | `x + y + z` even | `dx + dy + dz` even |
//! | rhombic | exactly one even coordinate | all components even |
//! | tetra-octa | all odd (tetrahedra), or all even with sum ≡ 2 mod 4 (octahedra) | all even, sum ≡ 0 mod 4 |
//!
//! The triangular prism grid is not affine in `(x, y)`: its transformations
//! go through triangle coordinates `(a, b, c)` with `a + b + c ∈ {1, 2}`.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::shape::Coord;

/// The five supported spatial discretizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridType {
    Cubic,
    TriangularPrism,
    SpherePacking,
    Rhombic,
    TetraOcta,
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GridType::Cubic => "cubic",
            GridType::TriangularPrism => "triangular prism",
            GridType::SpherePacking => "sphere packing",
            GridType::Rhombic => "rhombic",
            GridType::TetraOcta => "tetra-octa",
        };
        f.write_str(name)
    }
}

/// What the engines can do with a grid family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub assemble: bool,
    pub disassemble: bool,
}

/// A rigid transformation of a grid family, fixing a point of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Isometry {
    /// `out[i] = signs[i] * in[perm[i]]`.
    SignedPermutation { perm: [u8; 3], signs: [i8; 3] },
    /// Permutes the triangle coordinates `(a, b, c)`, optionally replacing
    /// each by `1 - value`, and optionally negates `z`.
    Prism {
        perm: [u8; 3],
        negate: bool,
        flip_z: bool,
    },
}

const fn sp(perm: [u8; 3], signs: [i8; 3]) -> Isometry {
    Isometry::SignedPermutation { perm, signs }
}

/// The 24 rotations of a cube.
///
/// Organized as 6 face-up choices x 4 rotations around vertical:
/// - Rotations 0-3: +Z face up
/// - Rotations 4-7: +Y face up
/// - Rotations 8-11: -Z face up
/// - Rotations 12-15: -Y face up
/// - Rotations 16-19: +X face up
/// - Rotations 20-23: -X face up
///
/// Transformation ids of the cubic family follow this order; ids 24-47 are
/// the same rotations applied after mirroring x.
const CUBE_ROTATIONS: [Isometry; 24] = [
    // +Z face up (identity orientation), rotate around Z axis
    sp([0, 1, 2], [1, 1, 1]),   // (x, y, z)
    sp([1, 0, 2], [-1, 1, 1]),  // (-y, x, z)
    sp([0, 1, 2], [-1, -1, 1]), // (-x, -y, z)
    sp([1, 0, 2], [1, -1, 1]),  // (y, -x, z)
    // +Y face up, rotate around Y axis
    sp([0, 2, 1], [1, -1, 1]),  // (x, -z, y)
    sp([2, 0, 1], [1, 1, 1]),   // (z, x, y)
    sp([0, 2, 1], [-1, 1, 1]),  // (-x, z, y)
    sp([2, 0, 1], [-1, -1, 1]), // (-z, -x, y)
    // -Z face up, rotate around Z axis
    sp([0, 1, 2], [1, -1, -1]),  // (x, -y, -z)
    sp([1, 0, 2], [1, 1, -1]),   // (y, x, -z)
    sp([0, 1, 2], [-1, 1, -1]),  // (-x, y, -z)
    sp([1, 0, 2], [-1, -1, -1]), // (-y, -x, -z)
    // -Y face up, rotate around Y axis
    sp([0, 2, 1], [1, 1, -1]),   // (x, z, -y)
    sp([2, 0, 1], [-1, 1, -1]),  // (-z, x, -y)
    sp([0, 2, 1], [-1, -1, -1]), // (-x, -z, -y)
    sp([2, 0, 1], [1, -1, -1]),  // (z, -x, -y)
    // +X face up, rotate around X axis
    sp([2, 1, 0], [1, 1, -1]),   // (z, y, -x)
    sp([1, 2, 0], [-1, 1, -1]),  // (-y, z, -x)
    sp([2, 1, 0], [-1, -1, -1]), // (-z, -y, -x)
    sp([1, 2, 0], [1, -1, -1]),  // (y, -z, -x)
    // -X face up, rotate around X axis
    sp([2, 1, 0], [-1, 1, 1]),  // (-z, y, x)
    sp([1, 2, 0], [-1, -1, 1]), // (-y, -z, x)
    sp([2, 1, 0], [1, -1, 1]),  // (z, -y, x)
    sp([1, 2, 0], [1, 1, 1]),   // (y, z, x)
];

const EVEN_PERMUTATIONS: [[u8; 3]; 3] = [[0, 1, 2], [1, 2, 0], [2, 0, 1]];
const ODD_PERMUTATIONS: [[u8; 3]; 3] = [[1, 0, 2], [0, 2, 1], [2, 1, 0]];

const CUBIC_DIRECTIONS: [Coord; 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// One lattice step along each triangle edge direction, then along z.
const PRISM_DIRECTIONS: [Coord; 8] = [
    (2, 0, 0),
    (-2, 0, 0),
    (1, 1, 0),
    (-1, -1, 0),
    (1, -1, 0),
    (-1, 1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

const FCC_OFFSETS: [Coord; 12] = [
    (1, 1, 0),
    (1, -1, 0),
    (-1, 1, 0),
    (-1, -1, 0),
    (1, 0, 1),
    (1, 0, -1),
    (-1, 0, 1),
    (-1, 0, -1),
    (0, 1, 1),
    (0, 1, -1),
    (0, -1, 1),
    (0, -1, -1),
];

const DIAGONAL_OFFSETS: [Coord; 8] = [
    (1, 1, 1),
    (1, 1, -1),
    (1, -1, 1),
    (1, -1, -1),
    (-1, 1, 1),
    (-1, 1, -1),
    (-1, -1, 1),
    (-1, -1, -1),
];

const TETRA_OCTA_DIRECTIONS: [Coord; 12] = [
    (2, 2, 0),
    (2, -2, 0),
    (-2, 2, 0),
    (-2, -2, 0),
    (2, 0, 2),
    (2, 0, -2),
    (-2, 0, 2),
    (-2, 0, -2),
    (0, 2, 2),
    (0, 2, -2),
    (0, -2, 2),
    (0, -2, -2),
];

const RHOMBIC_DIRECTIONS: [Coord; 6] = [
    (2, 0, 0),
    (-2, 0, 0),
    (0, 2, 0),
    (0, -2, 0),
    (0, 0, 2),
    (0, 0, -2),
];

/// Converts a prism cell to triangle coordinates.
#[inline]
fn to_triangle((x, y, _): Coord) -> [i32; 3] {
    // up triangles have coordinate sum 2, down triangles sum 1
    let sum = if (x + y).rem_euclid(2) == 0 { 2 } else { 1 };
    [(x + sum - y) / 2, (sum - y - x) / 2, y]
}

#[inline]
fn from_triangle([a, b, c]: [i32; 3], z: i32) -> Coord {
    (a - b, c, z)
}

fn permutation_is_even(perm: [u8; 3]) -> bool {
    EVEN_PERMUTATIONS.contains(&perm)
}

impl Isometry {
    /// Applies the transformation to a single cell.
    #[inline]
    pub fn apply(&self, coord: Coord) -> Coord {
        match *self {
            Isometry::SignedPermutation { perm, signs } => {
                let v = [coord.0, coord.1, coord.2];
                (
                    signs[0] as i32 * v[perm[0] as usize],
                    signs[1] as i32 * v[perm[1] as usize],
                    signs[2] as i32 * v[perm[2] as usize],
                )
            }
            Isometry::Prism {
                perm,
                negate,
                flip_z,
            } => {
                let v = to_triangle(coord);
                let mut w = [v[perm[0] as usize], v[perm[1] as usize], v[perm[2] as usize]];
                if negate {
                    for value in &mut w {
                        *value = 1 - *value;
                    }
                }
                from_triangle(w, if flip_z { -coord.2 } else { coord.2 })
            }
        }
    }

    /// Whether the transformation is a rotation (determinant +1) rather than
    /// a mirroring.
    pub fn is_proper(&self) -> bool {
        match *self {
            Isometry::SignedPermutation { perm, signs } => {
                let sign_product: i32 = signs.iter().map(|&s| s as i32).product();
                permutation_is_even(perm) == (sign_product > 0)
            }
            Isometry::Prism { perm, flip_z, .. } => permutation_is_even(perm) != flip_z,
        }
    }
}

fn cubic_isometries() -> Vec<Isometry> {
    let mut all = CUBE_ROTATIONS.to_vec();
    for rotation in CUBE_ROTATIONS {
        let Isometry::SignedPermutation { perm, mut signs } = rotation else {
            continue;
        };
        // rotate after mirroring x
        for (sign, &source) in signs.iter_mut().zip(&perm) {
            if source == 0 {
                *sign = -*sign;
            }
        }
        all.push(Isometry::SignedPermutation { perm, signs });
    }
    all
}

fn prism_isometries() -> Vec<Isometry> {
    let mut all = Vec::with_capacity(24);
    for proper in [true, false] {
        for flip_z in [false, true] {
            // proper iff the in-plane permutation parity differs from the z flip
            let perms = if proper != flip_z {
                EVEN_PERMUTATIONS
            } else {
                ODD_PERMUTATIONS
            };
            for perm in perms {
                for negate in [false, true] {
                    all.push(Isometry::Prism {
                        perm,
                        negate,
                        flip_z,
                    });
                }
            }
        }
    }
    all
}

impl GridType {
    pub const ALL: [GridType; 5] = [
        GridType::Cubic,
        GridType::TriangularPrism,
        GridType::SpherePacking,
        GridType::Rhombic,
        GridType::TetraOcta,
    ];

    pub fn capabilities(self) -> Capabilities {
        Capabilities {
            assemble: true,
            disassemble: matches!(self, GridType::Cubic | GridType::TriangularPrism),
        }
    }

    /// Whether `coord` addresses a cell of this grid.
    pub fn is_valid_cell(self, (x, y, z): Coord) -> bool {
        match self {
            GridType::Cubic | GridType::TriangularPrism => true,
            GridType::SpherePacking => (x + y + z).rem_euclid(2) == 0,
            GridType::Rhombic => {
                [x, y, z].iter().filter(|v| v.rem_euclid(2) == 0).count() == 1
            }
            GridType::TetraOcta => {
                let odd = [x, y, z].iter().filter(|v| v.rem_euclid(2) == 1).count();
                odd == 3 || (odd == 0 && (x + y + z).rem_euclid(4) == 2)
            }
        }
    }

    /// Whether translating by `delta` maps every cell to a cell of the same kind.
    pub fn is_legal_translation(self, (dx, dy, dz): Coord) -> bool {
        match self {
            GridType::Cubic => true,
            GridType::TriangularPrism => (dx + dy).rem_euclid(2) == 0,
            GridType::SpherePacking => (dx + dy + dz).rem_euclid(2) == 0,
            GridType::Rhombic => [dx, dy, dz].iter().all(|v| v.rem_euclid(2) == 0),
            GridType::TetraOcta => {
                [dx, dy, dz].iter().all(|v| v.rem_euclid(2) == 0)
                    && (dx + dy + dz).rem_euclid(4) == 0
            }
        }
    }

    /// Returns the legal translation closest to `min` from below. Shifting a
    /// cell set by the result of its bounding-box minimum gives a normal form
    /// that is identical for all legal translates of the set.
    pub fn align_translation(self, (x, y, z): Coord) -> Coord {
        let floor_even = |v: i32| v - v.rem_euclid(2);
        match self {
            GridType::Cubic => (x, y, z),
            GridType::TriangularPrism => {
                if (x + y).rem_euclid(2) == 0 {
                    (x, y, z)
                } else {
                    (x - 1, y, z)
                }
            }
            GridType::SpherePacking => {
                if (x + y + z).rem_euclid(2) == 0 {
                    (x, y, z)
                } else {
                    (x - 1, y, z)
                }
            }
            GridType::Rhombic => (floor_even(x), floor_even(y), floor_even(z)),
            GridType::TetraOcta => {
                let (ex, ey, ez) = (floor_even(x), floor_even(y), floor_even(z));
                if (ex + ey + ez).rem_euclid(4) == 0 {
                    (ex, ey, ez)
                } else {
                    (ex - 2, ey, ez)
                }
            }
        }
    }

    /// All transformations of this family. Index 0 is the identity, all
    /// rotations come before all mirrorings.
    pub fn isometries(self) -> &'static [Isometry] {
        static CUBIC: OnceLock<Vec<Isometry>> = OnceLock::new();
        static PRISM: OnceLock<Vec<Isometry>> = OnceLock::new();
        match self {
            GridType::TriangularPrism => PRISM.get_or_init(prism_isometries),
            _ => CUBIC.get_or_init(cubic_isometries),
        }
    }

    /// A cell whose images under the family's transformations are pairwise
    /// distinct. Used to identify compositions.
    pub(crate) fn marker_cell(self) -> Coord {
        match self {
            GridType::TriangularPrism => (6, -2, 1),
            _ => (1, 2, 3),
        }
    }

    /// Cells sharing a face with `coord`.
    pub fn neighbors(self, coord: Coord) -> Vec<Coord> {
        let (x, y, z) = coord;
        let offset = |offsets: &[Coord]| -> Vec<Coord> {
            offsets
                .iter()
                .map(|&(dx, dy, dz)| (x + dx, y + dy, z + dz))
                .filter(|&c| self.is_valid_cell(c))
                .collect()
        };
        match self {
            GridType::Cubic => offset(&CUBIC_DIRECTIONS),
            GridType::TriangularPrism => {
                let [a, b, c] = to_triangle(coord);
                let in_plane = if a + b + c == 2 {
                    [[a - 1, b, c], [a, b - 1, c], [a, b, c - 1]]
                } else {
                    [[a + 1, b, c], [a, b + 1, c], [a, b, c + 1]]
                };
                let mut cells: Vec<Coord> =
                    in_plane.into_iter().map(|t| from_triangle(t, z)).collect();
                cells.push((x, y, z + 1));
                cells.push((x, y, z - 1));
                cells
            }
            GridType::SpherePacking => offset(&FCC_OFFSETS),
            GridType::Rhombic => offset(&FCC_OFFSETS),
            GridType::TetraOcta => offset(&DIAGONAL_OFFSETS),
        }
    }

    /// Unit translations a group of pieces may make in one disassembly step.
    /// Opposite directions are adjacent, positive first.
    pub fn directions(self) -> &'static [Coord] {
        match self {
            GridType::Cubic => &CUBIC_DIRECTIONS,
            GridType::TriangularPrism => &PRISM_DIRECTIONS,
            GridType::SpherePacking => &FCC_OFFSETS,
            GridType::Rhombic => &RHOMBIC_DIRECTIONS,
            GridType::TetraOcta => &TETRA_OCTA_DIRECTIONS,
        }
    }

    /// The cell a unit move of `coord` along `direction` passes through on
    /// its way, if any. Triangles moving along an edge direction sweep over
    /// the neighbour between start and destination.
    pub fn sweep_cell(self, coord: Coord, direction: Coord) -> Option<Coord> {
        match self {
            GridType::TriangularPrism if direction.2 == 0 => {
                let target = (
                    coord.0 + direction.0,
                    coord.1 + direction.1,
                    coord.2 + direction.2,
                );
                let around_target = self.neighbors(target);
                self.neighbors(coord)
                    .into_iter()
                    .find(|c| around_target.contains(c))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_comes_first() {
        for grid in GridType::ALL {
            let identity = grid.isometries()[0];
            for cell in [(0, 0, 0), (1, 2, 3), (6, -2, 1), (-3, 4, -1)] {
                assert_eq!(identity.apply(cell), cell, "{grid}");
            }
        }
    }

    #[test]
    fn test_rotations_come_before_mirrors() {
        for grid in GridType::ALL {
            let all = grid.isometries();
            let half = all.len() / 2;
            assert!(all[..half].iter().all(Isometry::is_proper), "{grid}");
            assert!(all[half..].iter().all(|t| !t.is_proper()), "{grid}");
        }
    }

    #[test]
    fn test_family_sizes() {
        assert_eq!(GridType::Cubic.isometries().len(), 48);
        assert_eq!(GridType::TriangularPrism.isometries().len(), 24);
    }

    #[test]
    fn test_isometries_are_distinct_on_marker() {
        for grid in GridType::ALL {
            let marker = grid.marker_cell();
            let mut images: Vec<Coord> = grid.isometries().iter().map(|t| t.apply(marker)).collect();
            images.sort_unstable();
            images.dedup();
            assert_eq!(images.len(), grid.isometries().len(), "{grid}");
        }
    }

    #[test]
    fn test_transformations_keep_cells_valid() {
        for grid in GridType::ALL {
            for x in -3..4 {
                for y in -3..4 {
                    for z in -3..4 {
                        if !grid.is_valid_cell((x, y, z)) {
                            continue;
                        }
                        for t in grid.isometries() {
                            assert!(grid.is_valid_cell(t.apply((x, y, z))), "{grid} {t:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_triangle_coordinates_roundtrip() {
        for x in -4..5 {
            for y in -4..5 {
                let [a, b, c] = to_triangle((x, y, 0));
                let sum = a + b + c;
                assert!(sum == 1 || sum == 2);
                assert_eq!(from_triangle([a, b, c], 0), (x, y, 0));
            }
        }
    }

    #[test]
    fn test_neighbors_are_symmetric() {
        for grid in GridType::ALL {
            for x in -2..3 {
                for y in -2..3 {
                    for z in -2..3 {
                        let cell = (x, y, z);
                        if !grid.is_valid_cell(cell) {
                            continue;
                        }
                        for n in grid.neighbors(cell) {
                            assert!(grid.neighbors(n).contains(&cell), "{grid} {cell:?} {n:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_directions_are_legal_translations() {
        for grid in GridType::ALL {
            for &d in grid.directions() {
                assert!(grid.is_legal_translation(d), "{grid} {d:?}");
            }
        }
    }

    #[test]
    fn test_align_translation_is_legal_and_below() {
        for grid in GridType::ALL {
            for x in -3..4 {
                for y in -3..4 {
                    for z in -3..4 {
                        let aligned = grid.align_translation((x, y, z));
                        assert!(grid.is_legal_translation(aligned));
                        assert!(aligned.0 <= x && aligned.1 <= y && aligned.2 <= z);
                    }
                }
            }
        }
    }

    #[test]
    fn test_triangle_sweep_cell() {
        // an up triangle moving right passes the down triangle to its right
        let grid = GridType::TriangularPrism;
        assert_eq!(grid.sweep_cell((0, 0, 0), (2, 0, 0)), Some((1, 0, 0)));
        assert_eq!(grid.sweep_cell((1, 0, 0), (-2, 0, 0)), Some((0, 0, 0)));
        assert_eq!(grid.sweep_cell((0, 0, 0), (0, 0, 1)), None);
        assert_eq!(GridType::Cubic.sweep_cell((0, 0, 0), (1, 0, 0)), None);
    }
}
