//! Search for a way to take an assembled puzzle apart.
//!
//! Starting from the assembled state, a breadth first search moves groups of
//! pieces by unit steps until some group can slide away without ever touching
//! the rest again. The removed group and the remaining group are then taken
//! apart the same way. States are compared after shifting them so that the
//! first piece sits at its assembled position, since moving all pieces
//! together changes nothing.
//!
//! Only grids whose pieces stay on the grid after every unit step are
//! supported.

use rustc_hash::FxHashSet;

use crate::assembly::{Assembly, Placement};
use crate::disassembly::{Separation, State, REMOVAL_DISTANCE};
use crate::error::Error;
use crate::grouping::GroupingSolver;
use crate::invariant;
use crate::movement::{MovementCache, UNBOUNDED};
use crate::problem::{GroupCount, Problem, PuzzleView};
use crate::shape::{add, scale, sub, Coord};
use crate::solve::CancelToken;
use crate::symmetry::Transform;

/// How a group of pieces ends up.
enum Plan {
    Split(Separation),
    /// A single piece, or pieces that may stay together.
    Together,
    Stuck,
}

/// One explored state and the state it was reached from.
struct Node {
    offsets: Vec<Coord>,
    parent: Option<usize>,
}

#[derive(Debug)]
pub struct Disassembler<'a> {
    cache: MovementCache<'a>,
    /// Part of every piece instance.
    piece_parts: Vec<usize>,
    piece_shapes: Vec<usize>,
    part_groups: Vec<Vec<GroupCount>>,
    grouping: GroupingSolver,
    placements: Vec<Option<Placement>>,
    max_states: Option<usize>,
    cancel: CancelToken,
}

impl<'a> Disassembler<'a> {
    pub fn new(view: PuzzleView<'a>, problem: &Problem) -> Result<Self, Error> {
        if !view.grid.capabilities().disassemble {
            return Err(Error::CannotDisassemble(view.grid));
        }

        let mut piece_parts = Vec::with_capacity(problem.piece_count());
        let mut piece_shapes = Vec::with_capacity(problem.piece_count());
        let mut grouping = GroupingSolver::new();
        for (index, part) in problem.parts().iter().enumerate() {
            for _ in 0..part.max {
                piece_parts.push(index);
                piece_shapes.push(part.shape);
            }
            for group in &part.groups {
                grouping.add_pieces(index, group.group, group.count);
            }
        }

        Ok(Self {
            cache: MovementCache::new(view),
            piece_parts,
            piece_shapes,
            part_groups: problem.parts().iter().map(|part| part.groups.clone()).collect(),
            grouping,
            placements: Vec::new(),
            max_states: None,
            cancel: CancelToken::default(),
        })
    }

    /// Gives up on a group of pieces after exploring this many states.
    pub fn with_state_limit(mut self, limit: Option<usize>) -> Self {
        self.max_states = limit;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Finds a plan that takes all placed pieces of `assembly` apart. `None`
    /// when there is none, when the state limit was hit or the run was
    /// cancelled.
    pub fn disassemble(&mut self, assembly: &Assembly) -> Result<Option<Separation>, Error> {
        invariant!(assembly.piece_count() == self.piece_parts.len());
        let pieces: Vec<u16> = (0..assembly.piece_count())
            .filter(|&piece| assembly.is_placed(piece))
            .map(|piece| piece as u16)
            .collect();
        if pieces.len() < 2 {
            return Ok(None);
        }

        self.grouping.reset();
        self.placements = assembly.placements().to_vec();
        let start = vec![(0, 0, 0); pieces.len()];
        let separation = self.separate(&pieces, start)?;
        log::debug!(
            "disassembly {} with {} cached movements",
            if separation.is_some() { "found" } else { "not found" },
            self.cache.len()
        );
        Ok(separation)
    }

    fn plan(&mut self, pieces: &[u16], start: Vec<Coord>) -> Result<Plan, Error> {
        if pieces.len() == 1 || self.one_known_group(pieces) {
            return Ok(Plan::Together);
        }
        if let Some(separation) = self.separate(pieces, start)? {
            return Ok(Plan::Split(separation));
        }
        if self.cancel.is_cancelled() {
            return Ok(Plan::Stuck);
        }
        self.grouping.new_set();
        for &piece in pieces {
            if !self.grouping.add_piece_to_set(self.piece_parts[piece as usize]) {
                return Ok(Plan::Stuck);
            }
        }
        Ok(Plan::Together)
    }

    /// Whether every piece belongs to exactly one group, the same for all.
    fn one_known_group(&self, pieces: &[u16]) -> bool {
        let mut common = None;
        for &piece in pieces {
            match self.part_groups[self.piece_parts[piece as usize]].as_slice() {
                [only] if only.group != 0 && common.map_or(true, |g| g == only.group) => {
                    common = Some(only.group);
                }
                _ => return false,
            }
        }
        common.is_some()
    }

    /// Blocking distances between all pairs of `pieces` in all directions,
    /// `[(i * n + j) * directions + d]` for piece `i` moving away from `j`.
    fn slides(&mut self, pieces: &[u16], offsets: &[Coord]) -> Result<Vec<u32>, Error> {
        let n = pieces.len();
        let directions = self.cache.grid().directions().len();
        let mut slides = vec![UNBOUNDED; n * n * directions];
        let oriented: Vec<((usize, Transform), Coord)> = pieces
            .iter()
            .zip(offsets)
            .map(|(&piece, &offset)| {
                let piece = piece as usize;
                let placement = self.placements[piece].unwrap_or(Placement {
                    transform: 0,
                    position: (0, 0, 0),
                });
                (
                    (self.piece_shapes[piece], placement.transform),
                    add(placement.position, offset),
                )
            })
            .collect();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let (a, at_a) = oriented[i];
                let (b, at_b) = oriented[j];
                let pair = self.cache.slides(a, b, sub(at_b, at_a))?;
                let base = (i * n + j) * directions;
                slides[base..base + directions].copy_from_slice(pair);
            }
        }
        Ok(slides)
    }

    fn separate(&mut self, pieces: &[u16], start: Vec<Coord>) -> Result<Option<Separation>, Error> {
        let n = pieces.len();
        let directions = self.cache.grid().directions();
        let mut seen = FxHashSet::default();
        seen.insert(normalized(&start));
        let mut nodes = vec![Node {
            offsets: start,
            parent: None,
        }];

        let mut head = 0;
        while head < nodes.len() {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            if self.max_states.is_some_and(|limit| nodes.len() > limit) {
                log::warn!("giving up on {n} pieces after {} states", nodes.len());
                return Ok(None);
            }

            let offsets = nodes[head].offsets.clone();
            let slides = self.slides(pieces, &offsets)?;

            let removal = (0..directions.len())
                .flat_map(|d| (0..n).map(move |seed| (d, seed)))
                .map(|(d, seed)| (d, closure(&slides, n, directions.len(), seed, d, |s| s != UNBOUNDED)))
                .filter(|(_, group)| group.len() < n)
                .min_by_key(|(_, group)| group.len());
            if let Some((d, group)) = removal {
                let mut path = Vec::new();
                let mut at = Some(head);
                while let Some(index) = at {
                    path.push(nodes[index].offsets.clone());
                    at = nodes[index].parent;
                }
                path.reverse();
                return self.split(pieces, path, directions[d], &group);
            }

            for (d, &direction) in directions.iter().enumerate() {
                for seed in 0..n {
                    let group = closure(&slides, n, directions.len(), seed, d, |s| s == 0);
                    if group.len() == n {
                        continue;
                    }
                    let mut next = offsets.clone();
                    for &i in &group {
                        next[i] = add(next[i], direction);
                    }
                    if seen.insert(normalized(&next)) {
                        nodes.push(Node {
                            offsets: next,
                            parent: Some(head),
                        });
                    }
                }
            }
            head += 1;
        }
        Ok(None)
    }

    /// Builds the node for a found removal and plans both groups.
    fn split(
        &mut self,
        pieces: &[u16],
        path: Vec<Vec<Coord>>,
        direction: Coord,
        group: &[usize],
    ) -> Result<Option<Separation>, Error> {
        let Some(before) = path.last().cloned() else {
            return Ok(None);
        };
        let mut last = before.clone();
        for &i in group {
            last[i] = add(last[i], scale(direction, REMOVAL_DISTANCE));
        }

        let (mut gone, mut gone_start, mut stay, mut stay_start) = (vec![], vec![], vec![], vec![]);
        for (i, &piece) in pieces.iter().enumerate() {
            if group.contains(&i) {
                gone.push(piece);
                gone_start.push(before[i]);
            } else {
                stay.push(piece);
                stay_start.push(before[i]);
            }
        }

        let removed = match self.plan(&gone, gone_start)? {
            Plan::Split(separation) => Some(separation),
            Plan::Together => None,
            Plan::Stuck => return Ok(None),
        };
        let left = match self.plan(&stay, stay_start)? {
            Plan::Split(separation) => Some(separation),
            Plan::Together => None,
            Plan::Stuck => return Ok(None),
        };

        let states = path
            .into_iter()
            .chain(std::iter::once(last))
            .map(State::from_offsets)
            .collect();
        Ok(Some(Separation::new(pieces.to_vec(), states, removed, left)?))
    }
}

/// Offsets relative to the first piece.
fn normalized(offsets: &[Coord]) -> Vec<Coord> {
    let base = offsets.first().copied().unwrap_or((0, 0, 0));
    offsets.iter().map(|&o| sub(o, base)).collect()
}

/// Pieces that have to move along with `seed` in direction `d`: those some
/// member's movement is limited by, as decided by `limited`.
fn closure(
    slides: &[u32],
    n: usize,
    directions: usize,
    seed: usize,
    d: usize,
    limited: impl Fn(u32) -> bool,
) -> Vec<usize> {
    let mut member = vec![false; n];
    member[seed] = true;
    let mut group = vec![seed];
    let mut next = 0;
    while next < group.len() {
        let i = group[next];
        next += 1;
        for j in 0..n {
            if !member[j] && limited(slides[(i * n + j) * directions + d]) {
                member[j] = true;
                group.push(j);
            }
        }
    }
    group.sort_unstable();
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassembly::Disassembly;
    use crate::geometry::GridType;
    use crate::problem::Puzzle;
    use crate::shape::Shape;

    fn at(position: Coord) -> Option<Placement> {
        Some(Placement {
            transform: 0,
            position,
        })
    }

    /// A ring around a pin whose ends are bent, so the two can not be
    /// separated, plus a loose cube.
    fn chained(grouped: bool) -> (Puzzle, Assembly) {
        let mut puzzle = Puzzle::new(GridType::Cubic);
        let ring = puzzle.add_shape(Shape::from_cells(
            "ring",
            &[
                (0, 0, 0),
                (1, 0, 0),
                (2, 0, 0),
                (0, 1, 0),
                (2, 1, 0),
                (0, 2, 0),
                (1, 2, 0),
                (2, 2, 0),
            ],
        ));
        let pin = puzzle.add_shape(Shape::from_cells(
            "pin",
            &[(0, 0, 0), (0, 0, 1), (0, 0, 2), (1, 0, 0), (1, 0, 2)],
        ));
        let cube = puzzle.add_shape(Shape::from_cells("cube", &[(0, 0, 0)]));
        let mut problem = Problem::new("chained");
        problem.set_shape_count(ring, 1, 1);
        problem.set_shape_count(pin, 1, 1);
        problem.set_shape_count(cube, 1, 1);
        if grouped {
            problem.set_part_group(0, 1, 1);
            problem.set_part_group(1, 1, 1);
        }
        puzzle.add_problem(problem);
        let assembly = Assembly::new(vec![at((0, 0, 1)), at((1, 1, 0)), at((5, 0, 0))]);
        (puzzle, assembly)
    }

    #[test]
    fn test_two_cubes() {
        let mut puzzle = Puzzle::new(GridType::Cubic);
        let cube = puzzle.add_shape(Shape::from_cells("cube", &[(0, 0, 0)]));
        let mut problem = Problem::new("two");
        problem.set_shape_count(cube, 2, 2);
        puzzle.add_problem(problem);
        let assembly = Assembly::new(vec![at((0, 0, 0)), at((1, 0, 0))]);

        let mut disassembler = Disassembler::new(puzzle.view(), &puzzle.problems()[0]).unwrap();
        let separation = disassembler.disassemble(&assembly).unwrap().unwrap();
        assert_eq!(separation.moves(), 1);
        assert_eq!(separation.pieces(), &[0, 1]);
        assert!(separation.removed().is_none() && separation.left().is_none());

        let mut limited = Disassembler::new(puzzle.view(), &puzzle.problems()[0])
            .unwrap()
            .with_state_limit(Some(0));
        assert!(limited.disassemble(&assembly).unwrap().is_none());
    }

    #[test]
    fn test_pin_in_ring_is_stuck() {
        let (puzzle, assembly) = chained(false);
        let mut disassembler = Disassembler::new(puzzle.view(), &puzzle.problems()[0]).unwrap();
        assert!(disassembler.disassemble(&assembly).unwrap().is_none());
    }

    #[test]
    fn test_grouped_pieces_stay_together() {
        let (puzzle, assembly) = chained(true);
        let mut disassembler = Disassembler::new(puzzle.view(), &puzzle.problems()[0]).unwrap();
        let separation = disassembler.disassemble(&assembly).unwrap().unwrap();
        // the loose cube goes, ring and pin stay as one
        assert_eq!(separation.moves(), 1);
        assert!(separation.removed().is_none());
        assert!(separation.left().is_none());
        assert_eq!(separation.num_sequences(), 1);
    }

    #[test]
    fn test_cancelled() {
        let (puzzle, assembly) = chained(true);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut disassembler = Disassembler::new(puzzle.view(), &puzzle.problems()[0])
            .unwrap()
            .with_cancel(cancel);
        assert!(disassembler.disassemble(&assembly).unwrap().is_none());
    }

    #[test]
    fn test_unsupported_grid() {
        let mut puzzle = Puzzle::new(GridType::SpherePacking);
        let ball = puzzle.add_shape(Shape::from_cells("ball", &[(0, 0, 0)]));
        let mut problem = Problem::new("balls");
        problem.set_shape_count(ball, 2, 2);
        puzzle.add_problem(problem);
        assert!(matches!(
            Disassembler::new(puzzle.view(), &puzzle.problems()[0]),
            Err(Error::CannotDisassemble(GridType::SpherePacking))
        ));
    }

    #[test]
    fn test_closure() {
        // three pieces in a row along x, direction 0 is +x
        let n = 3;
        let mut slides = vec![UNBOUNDED; n * n];
        slides[1] = 0; // 0 is blocked by 1
        slides[n + 2] = 0; // 1 is blocked by 2
        assert_eq!(closure(&slides, n, 1, 0, 0, |s| s == 0), vec![0, 1, 2]);
        assert_eq!(closure(&slides, n, 1, 1, 0, |s| s == 0), vec![1, 2]);
        assert_eq!(closure(&slides, n, 1, 2, 0, |s| s == 0), vec![2]);
    }
}
