//! Finite transformation groups of the grid families.
//!
//! Each family has a fixed list of transformations (see
//! [`GridType::isometries`]). A [`SymmetryGroup`] adds the multiplication
//! table and a catalogue of every subgroup, so that the invariance group of a
//! shape can be stored as a small [`SymmetryId`].

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::error::Fault;
use crate::geometry::GridType;
use crate::invariant;
use crate::shape::Coord;

/// Index into [`GridType::isometries`].
pub type Transform = u8;

/// Index into the subgroup catalogue of one family. Id 0 is the trivial group.
pub type SymmetryId = u16;

/// Bit `t` set means transformation `t` is an element.
pub type TransformMask = u64;

pub const IDENTITY: Transform = 0;
pub const TRIVIAL: SymmetryId = 0;

/// Multiplication table and subgroup catalogue of one grid family.
#[derive(Debug)]
pub struct SymmetryGroup {
    grid: GridType,
    size: usize,
    /// `compose[a * size + b]` is "apply `a`, then `b`".
    compose: Vec<Transform>,
    inverse: Vec<Transform>,
    proper: TransformMask,
    subgroups: Vec<TransformMask>,
    ids: FxHashMap<TransformMask, SymmetryId>,
}

#[inline]
fn bits(mask: TransformMask) -> impl Iterator<Item = Transform> {
    (0..64u8).filter(move |&t| mask & (1 << t) != 0)
}

impl SymmetryGroup {
    fn build(grid: GridType) -> Self {
        let isometries = grid.isometries();
        let size = isometries.len();
        let marker = grid.marker_cell();

        let by_image: FxHashMap<Coord, Transform> = isometries
            .iter()
            .enumerate()
            .map(|(t, iso)| (iso.apply(marker), t as Transform))
            .collect();

        let mut compose = vec![IDENTITY; size * size];
        for (a, first) in isometries.iter().enumerate() {
            for (b, second) in isometries.iter().enumerate() {
                let image = second.apply(first.apply(marker));
                // a composition of family members is a family member
                compose[a * size + b] = by_image.get(&image).copied().unwrap_or(IDENTITY);
            }
        }

        let mut inverse = vec![IDENTITY; size];
        for a in 0..size {
            if let Some(b) = (0..size).find(|&b| compose[a * size + b] == IDENTITY) {
                inverse[a] = b as Transform;
            }
        }

        let proper = isometries
            .iter()
            .enumerate()
            .filter(|(_, iso)| iso.is_proper())
            .fold(0, |mask, (t, _)| mask | 1 << t);

        let mut group = Self {
            grid,
            size,
            compose,
            inverse,
            proper,
            subgroups: Vec::new(),
            ids: FxHashMap::default(),
        };
        group.enumerate_subgroups();
        log::debug!(
            "{grid} grid: {} transformations, {} subgroups",
            group.size,
            group.subgroups.len()
        );
        group
    }

    /// Every subgroup is reachable from the trivial group by repeatedly
    /// adding one element and closing.
    fn enumerate_subgroups(&mut self) {
        let mut seen: Vec<TransformMask> = vec![1];
        let mut queue = vec![1];
        while let Some(subgroup) = queue.pop() {
            for t in 0..self.size as Transform {
                if subgroup & (1 << t) != 0 {
                    continue;
                }
                let grown = self.closure(subgroup | 1 << t);
                if !seen.contains(&grown) {
                    seen.push(grown);
                    queue.push(grown);
                }
            }
        }
        seen.sort_by_key(|&mask| (mask.count_ones(), mask));
        self.ids = seen
            .iter()
            .enumerate()
            .map(|(id, &mask)| (mask, id as SymmetryId))
            .collect();
        self.subgroups = seen;
    }

    /// The smallest subgroup containing every element of `mask`.
    pub fn closure(&self, mask: TransformMask) -> TransformMask {
        let mut mask = mask | 1;
        loop {
            let mut grown = mask;
            for a in bits(mask) {
                for b in bits(mask) {
                    grown |= 1 << self.compose(a, b);
                }
            }
            if grown == mask {
                return mask;
            }
            mask = grown;
        }
    }

    pub fn grid(&self) -> GridType {
        self.grid
    }

    /// Number of transformations in the family.
    pub fn size(&self) -> usize {
        self.size
    }

    /// "Apply `first`, then `second`".
    #[inline]
    pub fn compose(&self, first: Transform, second: Transform) -> Transform {
        self.compose[first as usize * self.size + second as usize]
    }

    #[inline]
    pub fn inverse(&self, t: Transform) -> Transform {
        self.inverse[t as usize]
    }

    #[inline]
    pub fn transform(&self, coord: Coord, t: Transform) -> Coord {
        self.grid.isometries()[t as usize].apply(coord)
    }

    pub fn is_proper(&self, t: Transform) -> bool {
        self.proper & (1 << t) != 0
    }

    /// All rotations of the family, identity first.
    pub fn rotations(&self) -> impl Iterator<Item = Transform> {
        bits(self.proper)
    }

    /// Number of subgroups in the catalogue.
    pub fn subgroup_count(&self) -> usize {
        self.subgroups.len()
    }

    pub fn mask(&self, sym: SymmetryId) -> TransformMask {
        self.subgroups.get(sym as usize).copied().unwrap_or(1)
    }

    pub fn elements(&self, sym: SymmetryId) -> impl Iterator<Item = Transform> {
        bits(self.mask(sym))
    }

    pub fn order(&self, sym: SymmetryId) -> usize {
        self.mask(sym).count_ones() as usize
    }

    pub fn subgroup_id(&self, mask: TransformMask) -> Option<SymmetryId> {
        self.ids.get(&mask).copied()
    }

    pub fn contains(&self, sym: SymmetryId, t: Transform) -> bool {
        self.mask(sym) & (1 << t) != 0
    }

    pub fn contains_mirror(&self, sym: SymmetryId) -> bool {
        self.mask(sym) & !self.proper != 0
    }

    /// Number of transformations the two groups share.
    pub fn intersection_size(&self, a: SymmetryId, b: SymmetryId) -> usize {
        (self.mask(a) & self.mask(b)).count_ones() as usize
    }

    /// The smallest transformation that produces the same orientation of a
    /// shape with invariance group `sym` as `t` does.
    pub fn canonical_rep(&self, sym: SymmetryId, t: Transform) -> Transform {
        self.elements(sym)
            .map(|h| self.compose(h, t))
            .min()
            .unwrap_or(t)
    }

    /// Finds the group of transformations under which some object is
    /// invariant. `is_invariant` is asked about each candidate at most once;
    /// candidates implied by earlier answers are skipped.
    pub fn invariant_subgroup(
        &self,
        mut is_invariant: impl FnMut(Transform) -> bool,
    ) -> Result<SymmetryId, Fault> {
        let mut inside: TransformMask = 1;
        let mut outside: TransformMask = 0;
        for t in 1..self.size as Transform {
            if (inside | outside) & (1 << t) != 0 {
                continue;
            }
            if is_invariant(t) {
                inside = self.closure(inside | 1 << t);
            } else {
                // the cosets of a non-member hold no members
                for h in bits(inside) {
                    outside |= 1 << self.compose(h, t);
                    outside |= 1 << self.compose(t, h);
                }
            }
        }
        let id = self.subgroup_id(inside);
        invariant!(id.is_some());
        Ok(id.unwrap_or(TRIVIAL))
    }
}

impl GridType {
    /// The lazily built transformation group of this family.
    pub fn symmetries(self) -> &'static SymmetryGroup {
        static GROUPS: [OnceLock<SymmetryGroup>; 5] = [const { OnceLock::new() }; 5];
        let slot = match self {
            GridType::Cubic => 0,
            GridType::TriangularPrism => 1,
            GridType::SpherePacking => 2,
            GridType::Rhombic => 3,
            GridType::TetraOcta => 4,
        };
        GROUPS[slot].get_or_init(|| SymmetryGroup::build(self))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn cubic() -> &'static SymmetryGroup {
        GridType::Cubic.symmetries()
    }

    #[test]
    fn test_octahedral_subgroup_count() {
        assert_eq!(cubic().size(), 48);
        assert_eq!(cubic().subgroup_count(), 98);
    }

    #[test]
    fn test_trivial_and_full_groups() {
        let group = cubic();
        assert_eq!(group.mask(TRIVIAL), 1);
        let full = group.subgroup_id((1 << 48) - 1).unwrap();
        assert_eq!(full as usize, group.subgroup_count() - 1);
        assert!(group.contains_mirror(full));
        assert!(!group.contains_mirror(TRIVIAL));
    }

    #[test]
    fn test_rotation_group_has_no_mirror() {
        let group = cubic();
        let rotations = group.subgroup_id(group.proper).unwrap();
        assert_eq!(group.order(rotations), 24);
        assert!(!group.contains_mirror(rotations));
        assert_eq!(group.rotations().count(), 24);
    }

    #[test]
    fn test_prism_group() {
        let group = GridType::TriangularPrism.symmetries();
        assert_eq!(group.size(), 24);
        assert_eq!(group.rotations().count(), 12);
        for a in 0..24 {
            assert_eq!(group.compose(a, group.inverse(a)), IDENTITY);
        }
    }

    #[test]
    fn test_invariant_subgroup_of_everything() {
        let group = cubic();
        let sym = group.invariant_subgroup(|_| true).unwrap();
        assert_eq!(group.order(sym), 48);
        let sym = group.invariant_subgroup(|_| false).unwrap();
        assert_eq!(sym, TRIVIAL);
    }

    #[test]
    fn test_invariant_subgroup_asks_each_transform_once() {
        let group = cubic();
        let mut asked = Vec::new();
        group
            .invariant_subgroup(|t| {
                asked.push(t);
                group.is_proper(t)
            })
            .unwrap();
        let mut unique = asked.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), asked.len());
        assert!(asked.len() < 47);
    }

    #[test]
    fn test_canonical_rep_in_trivial_group_is_identity_map() {
        let group = cubic();
        for t in 0..48 {
            assert_eq!(group.canonical_rep(TRIVIAL, t), t);
        }
    }

    #[test]
    fn test_intersection_size() {
        let group = cubic();
        let rotations = group.subgroup_id(group.proper).unwrap();
        let full = group.subgroup_id((1 << 48) - 1).unwrap();
        assert_eq!(group.intersection_size(rotations, full), 24);
        assert_eq!(group.intersection_size(TRIVIAL, full), 1);
    }

    fn any_grid() -> impl Strategy<Value = GridType> {
        prop::sample::select(GridType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn proptest_compose_matches_application(
            grid in any_grid(), a in 0u8..24, b in 0u8..24,
            x in -5i32..5, y in -5i32..5, z in -5i32..5,
        ) {
            let group = grid.symmetries();
            let cell = (x, y, z);
            prop_assert_eq!(
                group.transform(group.transform(cell, a), b),
                group.transform(cell, group.compose(a, b))
            );
        }

        #[test]
        fn proptest_group_axioms(a in 0u8..48, b in 0u8..48, c in 0u8..48) {
            let group = cubic();
            prop_assert_eq!(group.compose(IDENTITY, a), a);
            prop_assert_eq!(group.compose(a, IDENTITY), a);
            prop_assert_eq!(group.compose(group.inverse(a), a), IDENTITY);
            prop_assert_eq!(
                group.compose(group.compose(a, b), c),
                group.compose(a, group.compose(b, c))
            );
        }

        #[test]
        fn proptest_canonical_rep_is_coset_minimum(sym in 0u16..98, t in 0u8..48) {
            let group = cubic();
            let rep = group.canonical_rep(sym, t);
            prop_assert!(rep <= t);
            prop_assert_eq!(group.canonical_rep(sym, rep), rep);
            // rep and t differ by an element of the group
            let difference = group.compose(rep, group.inverse(t));
            prop_assert!(group.contains(sym, difference));
        }

        #[test]
        fn proptest_catalogue_entries_are_closed(sym in 0u16..98) {
            let group = cubic();
            let mask = group.mask(sym);
            prop_assert_eq!(group.closure(mask), mask);
        }
    }
}
