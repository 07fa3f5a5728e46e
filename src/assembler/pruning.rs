//! Suppression of assemblies that are rotated or mirrored copies of others.
//!
//! When the result shape is symmetric, every assembly comes with images
//! under the result's symmetry group. One piece that occurs exactly once
//! (the "breaker") only keeps the placements that are the smallest of their
//! orbit, which leaves roughly one assembly per orbit. When that is not
//! enough (the breaker placement has symmetries of its own, or mirror images
//! could not be applied to the breaker) found assemblies are compared with
//! all of their images.

use rustc_hash::FxHashMap;

use crate::error::Fault;
use crate::geometry::GridType;
use crate::invariant;
use crate::shape::{add, sub, Coord, Shape};
use crate::symmetry::Transform;

/// The effect of one result symmetry on the placement matrix.
#[derive(Debug, Clone)]
struct Image {
    transform: Transform,
    /// `columns[c]` is the column cell `c` moves to.
    columns: Vec<u32>,
    /// `parts[p]` is the part whose shape equals the image of part `p`.
    parts: Vec<usize>,
}

/// A part of the problem as seen by the pruning.
pub(crate) struct PrunedPart<'a> {
    pub shape: &'a Shape,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct SymmetryFilter {
    images: Vec<Image>,
    breaker: Option<usize>,
    /// Images usable to filter breaker rows, a prefix of `images`.
    breaker_images: usize,
    complete_check: bool,
}

impl SymmetryFilter {
    /// Returns `None` when no pruning is possible or wanted.
    pub fn new(
        grid: GridType,
        result: &Shape,
        column_of: &FxHashMap<Coord, u32>,
        parts: &[PrunedPart<'_>],
        keep_mirror: bool,
        complete_rotations: bool,
    ) -> Result<Option<Self>, Fault> {
        let group = grid.symmetries();
        let sym = result.symmetry(grid, true)?;
        if group.order(sym) == 1 {
            return Ok(None);
        }

        let partners = if !keep_mirror && group.contains_mirror(sym) {
            mirror_partners(grid, parts)
        } else {
            None
        };

        let result_cells: Vec<Coord> = result.iter().map(|(c, _)| c).collect();
        let base = grid.align_translation(min_corner(&result_cells));
        let identity_parts: Vec<usize> = (0..parts.len()).collect();

        let mut images = Vec::new();
        for t in group.elements(sym).skip(1) {
            let parts_map = if group.is_proper(t) {
                identity_parts.clone()
            } else if let Some(partners) = &partners {
                partners.clone()
            } else {
                continue;
            };
            let moved: Vec<Coord> = result_cells.iter().map(|&c| group.transform(c, t)).collect();
            let shift = sub(base, grid.align_translation(min_corner(&moved)));
            let mut columns = vec![0; result_cells.len()];
            for (cell, image) in result_cells.iter().zip(&moved) {
                let from = column_of.get(cell).copied();
                let to = column_of.get(&add(*image, shift)).copied();
                invariant!(from.is_some() && to.is_some());
                if let (Some(from), Some(to)) = (from, to) {
                    columns[from as usize] = to;
                }
            }
            images.push(Image {
                transform: t,
                columns,
                parts: parts_map,
            });
        }
        if images.is_empty() {
            return Ok(None);
        }

        let proper_images = images
            .iter()
            .take_while(|image| group.is_proper(image.transform))
            .count();

        // the least symmetric piece that occurs exactly once
        let mut breaker = None;
        let mut breaker_order = usize::MAX;
        for (index, part) in parts.iter().enumerate() {
            if part.min != 1 || part.max != 1 {
                continue;
            }
            let order = group.order(part.shape.symmetry(grid, true)?);
            if order < breaker_order {
                breaker = Some(index);
                breaker_order = order;
            }
        }
        let breaker_images = match (breaker, &partners) {
            (Some(b), Some(partners)) if partners[b] == b => images.len(),
            _ => proper_images,
        };

        log::debug!(
            "symmetry pruning with {} images, breaker piece {:?}",
            images.len(),
            breaker
        );
        Ok(Some(Self {
            complete_check: complete_rotations
                || breaker.is_none()
                || breaker_images < images.len(),
            images,
            breaker,
            breaker_images,
        }))
    }

    fn map_columns(image: &Image, columns: &[u32]) -> Vec<u32> {
        let mut mapped: Vec<u32> = columns.iter().map(|&c| image.columns[c as usize]).collect();
        mapped.sort_unstable();
        mapped
    }

    /// Whether a placement of `part` covering `columns` survives. Keeping a
    /// breaker row whose orbit is smaller than the group turns on the
    /// complete check.
    pub fn keep_row(&mut self, part: usize, columns: &[u32]) -> bool {
        if self.breaker != Some(part) {
            return true;
        }
        let mut fixed = false;
        for image in &self.images[..self.breaker_images] {
            let mapped = Self::map_columns(image, columns);
            match mapped.as_slice().cmp(columns) {
                std::cmp::Ordering::Less => return false,
                std::cmp::Ordering::Equal => fixed = true,
                std::cmp::Ordering::Greater => {}
            }
        }
        if fixed {
            self.complete_check = true;
        }
        true
    }

    pub fn needs_complete_check(&self) -> bool {
        self.complete_check
    }

    fn key(&self, mut entries: Vec<(usize, Vec<u32>)>) -> Vec<(usize, Vec<u32>)> {
        entries.sort_unstable();
        if let Some(breaker) = self.breaker {
            if let Some(pos) = entries.iter().position(|(part, _)| *part == breaker) {
                let entry = entries.remove(pos);
                entries.insert(0, entry);
            }
        }
        entries
    }

    /// Whether an assembly, given as (part, sorted columns) per placed piece,
    /// is the smallest of its images.
    pub fn is_canonical(&self, pieces: &[(usize, &[u32])]) -> bool {
        if !self.complete_check {
            return true;
        }
        let own = self.key(pieces.iter().map(|&(p, c)| (p, c.to_vec())).collect());
        self.images.iter().all(|image| {
            let mapped = self.key(
                pieces
                    .iter()
                    .map(|&(p, c)| (image.parts[p], Self::map_columns(image, c)))
                    .collect(),
            );
            mapped >= own
        })
    }
}

fn min_corner(cells: &[Coord]) -> Coord {
    cells
        .iter()
        .copied()
        .reduce(|lo, c| (lo.0.min(c.0), lo.1.min(c.1), lo.2.min(c.2)))
        .unwrap_or((0, 0, 0))
}

/// For every part the part whose shape is a rotated copy of its mirror
/// image, with the same count range. `None` when some part has no such
/// partner.
fn mirror_partners(grid: GridType, parts: &[PrunedPart<'_>]) -> Option<Vec<usize>> {
    let group = grid.symmetries();
    let Some(mirror) = (0..group.size() as Transform).find(|&t| !group.is_proper(t)) else {
        return None;
    };
    let rotated: Vec<Vec<Shape>> = parts
        .iter()
        .map(|part| group.rotations().map(|r| part.shape.transformed(grid, r)).collect())
        .collect();
    parts
        .iter()
        .map(|part| {
            let mirrored = part.shape.transformed(grid, mirror);
            parts.iter().zip(&rotated).position(|(other, turns)| {
                other.min == part.min
                    && other.max == part.max
                    && turns.iter().any(|turn| turn.identical(&mirrored, grid, true))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns_of(shape: &Shape) -> FxHashMap<Coord, u32> {
        shape
            .iter()
            .enumerate()
            .map(|(i, (c, _))| (c, i as u32))
            .collect()
    }

    #[test]
    fn test_asymmetric_result_has_no_filter() {
        // a bar with bumps in y at one end and in z in the middle
        let result = Shape::from_cells("crooked", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0), (1, 0, 1)]);
        let unit = Shape::from_cells("unit", &[(0, 0, 0)]);
        let parts = [PrunedPart { shape: &unit, min: 5, max: 5 }];
        let filter =
            SymmetryFilter::new(GridType::Cubic, &result, &columns_of(&result), &parts, false, false).unwrap();
        assert!(filter.is_none());
    }

    #[test]
    fn test_domino_keeps_one_of_two_end_placements() {
        // a 3x1x1 bar filled by a domino and a unit cube
        let result = Shape::cuboid("bar", (3, 1, 1));
        let domino = Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]);
        let unit = Shape::from_cells("unit", &[(0, 0, 0)]);
        let parts = [
            PrunedPart { shape: &domino, min: 1, max: 1 },
            PrunedPart { shape: &unit, min: 1, max: 1 },
        ];
        let mut filter =
            SymmetryFilter::new(GridType::Cubic, &result, &columns_of(&result), &parts, false, false)
                .unwrap()
                .unwrap();
        // the unit cube has the larger symmetry group, so the domino breaks
        assert_eq!(filter.breaker, Some(0));
        assert_eq!(filter.breaker_images, filter.images.len());
        assert!(filter.keep_row(0, &[0, 1]));
        assert!(!filter.keep_row(0, &[1, 2]));
        // turns about the bar axis leave every placement in place
        assert!(filter.needs_complete_check());
        assert!(filter.keep_row(1, &[2]));
        assert!(filter.keep_row(1, &[0]));
    }

    #[test]
    fn test_canonical_assemblies() {
        let result = Shape::cuboid("bar", (4, 1, 1));
        let domino = Shape::from_cells("domino", &[(0, 0, 0), (1, 0, 0)]);
        let parts = [PrunedPart { shape: &domino, min: 2, max: 2 }];
        let filter =
            SymmetryFilter::new(GridType::Cubic, &result, &columns_of(&result), &parts, false, false)
                .unwrap()
                .unwrap();
        // no breaker: every assembly is checked against its images
        assert!(filter.needs_complete_check());
        let left = [0u32, 1];
        let right = [2u32, 3];
        assert!(filter.is_canonical(&[(0, &left), (0, &right)]));
    }

    #[test]
    fn test_chiral_partners() {
        let left = Shape::from_cells("left", &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 0, 1)]);
        let right = Shape::from_cells("right", &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 1, 1)]);
        let flat = Shape::from_cells("flat", &[(0, 0, 0), (1, 0, 0), (0, 1, 0)]);
        let parts = [
            PrunedPart { shape: &left, min: 1, max: 1 },
            PrunedPart { shape: &flat, min: 1, max: 1 },
            PrunedPart { shape: &right, min: 1, max: 1 },
        ];
        assert_eq!(mirror_partners(GridType::Cubic, &parts), Some(vec![2, 1, 0]));
        let lonely = [PrunedPart { shape: &left, min: 1, max: 1 }];
        assert_eq!(mirror_partners(GridType::Cubic, &lonely), None);
    }

    #[test]
    fn test_flat_piece_is_its_own_mirror_image() {
        // mirroring the flat L gives a turned copy, not a shifted one
        let l = Shape::from_cells("L", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0)]);
        let parts = [PrunedPart { shape: &l, min: 1, max: 1 }];
        assert_eq!(mirror_partners(GridType::Cubic, &parts), Some(vec![0]));
    }

    #[test]
    fn test_mirror_images_are_pruned() {
        // the flat L twice in a 4x2x1 box: without keeping mirror images
        // the mirrors of the result apply to the L as well
        let result = Shape::cuboid("box", (4, 2, 1));
        let l = Shape::from_cells("L", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0)]);
        let parts = [PrunedPart { shape: &l, min: 2, max: 2 }];
        let columns = columns_of(&result);
        let pruned = SymmetryFilter::new(GridType::Cubic, &result, &columns, &parts, false, false)
            .unwrap()
            .unwrap();
        let kept = SymmetryFilter::new(GridType::Cubic, &result, &columns, &parts, true, false)
            .unwrap()
            .unwrap();
        assert!(pruned.images.len() > kept.images.len());
        assert!(pruned.images.iter().any(|image| !GridType::Cubic.symmetries().is_proper(image.transform)));
        assert!(kept.images.iter().all(|image| GridType::Cubic.symmetries().is_proper(image.transform)));
    }
}
