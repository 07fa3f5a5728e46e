//! Decides whether sets of pieces that can not be taken apart may stay
//! together because they form one logical piece.
//!
//! Every part lists the groups its instances may belong to, with the number
//! of instances allowed in each. All pieces of a set have to end up in the
//! same group, and the sets collected during one disassembly share the group
//! capacities.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct GroupingSolver {
    /// (part, group) -> instances of the part allowed in the group
    capacity: FxHashMap<(usize, u16), u32>,
    sets: Vec<Vec<usize>>,
    failed: bool,
}

impl GroupingSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `count` instances of `part` in `group`. Group 0 is no group.
    pub fn add_pieces(&mut self, part: usize, group: u16, count: u32) {
        if group == 0 || count == 0 {
            return;
        }
        *self.capacity.entry((part, group)).or_default() += count;
    }

    /// Forgets all sets, keeps the capacities.
    pub fn reset(&mut self) {
        self.sets.clear();
        self.failed = false;
    }

    pub fn new_set(&mut self) {
        self.sets.push(Vec::new());
    }

    /// Adds one instance of `part` to the current set. Returns `false` when
    /// the sets can no longer be assigned to groups; the solver then keeps
    /// failing until [`reset`](Self::reset).
    pub fn add_piece_to_set(&mut self, part: usize) -> bool {
        if self.failed {
            return false;
        }
        match self.sets.last_mut() {
            Some(set) => set.push(part),
            None => self.sets.push(vec![part]),
        }
        if !self.assign(0, &mut FxHashMap::default()) {
            log::debug!("pieces can not be grouped: {:?}", self.sets);
            self.failed = true;
        }
        !self.failed
    }

    /// Groups every part of `set` may belong to.
    fn common_groups(&self, set: &[usize]) -> Vec<u16> {
        let Some(&first) = set.first() else {
            return Vec::new();
        };
        let mut groups: Vec<u16> = self
            .capacity
            .keys()
            .filter(|&&(part, _)| part == first)
            .map(|&(_, group)| group)
            .filter(|&group| set.iter().all(|&part| self.capacity.contains_key(&(part, group))))
            .collect();
        groups.sort_unstable();
        groups
    }

    /// Backtracking over group choices for the sets from `index` on.
    fn assign(&self, index: usize, used: &mut FxHashMap<(usize, u16), u32>) -> bool {
        let Some(set) = self.sets.get(index) else {
            return true;
        };
        if set.is_empty() {
            return self.assign(index + 1, used);
        }
        for group in self.common_groups(set) {
            let fits = set.iter().all(|&part| {
                let wanted = set.iter().filter(|&&p| p == part).count() as u32;
                let taken = used.get(&(part, group)).copied().unwrap_or(0);
                taken + wanted <= self.capacity.get(&(part, group)).copied().unwrap_or(0)
            });
            if !fits {
                continue;
            }
            for &part in set {
                *used.entry((part, group)).or_default() += 1;
            }
            let done = self.assign(index + 1, used);
            for &part in set {
                if let Some(count) = used.get_mut(&(part, group)) {
                    *count -= 1;
                }
            }
            if done {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pieces_without_group_fail() {
        let mut solver = GroupingSolver::new();
        solver.new_set();
        assert!(!solver.add_piece_to_set(0));
        // failing sticks until reset
        solver.add_pieces(0, 1, 1);
        assert!(!solver.add_piece_to_set(0));
        solver.reset();
        solver.new_set();
        assert!(solver.add_piece_to_set(0));
    }

    #[test]
    fn test_common_group_needed() {
        let mut solver = GroupingSolver::new();
        solver.add_pieces(0, 1, 1);
        solver.add_pieces(1, 2, 1);
        solver.add_pieces(1, 1, 1);
        solver.new_set();
        assert!(solver.add_piece_to_set(0));
        assert!(solver.add_piece_to_set(1));

        let mut solver = GroupingSolver::new();
        solver.add_pieces(0, 1, 1);
        solver.add_pieces(1, 2, 1);
        solver.new_set();
        assert!(solver.add_piece_to_set(0));
        assert!(!solver.add_piece_to_set(1));
    }

    #[test]
    fn test_sets_share_capacity() {
        // two instances of part 0, one may go into group 1, one into group 2
        let mut solver = GroupingSolver::new();
        solver.add_pieces(0, 1, 1);
        solver.add_pieces(0, 2, 1);
        solver.add_pieces(1, 1, 1);
        solver.add_pieces(1, 2, 1);
        solver.new_set();
        assert!(solver.add_piece_to_set(0));
        assert!(solver.add_piece_to_set(1));
        // the second set has to take the other group
        solver.new_set();
        assert!(solver.add_piece_to_set(0));
        assert!(solver.add_piece_to_set(1));
        // nothing left for a third
        solver.new_set();
        assert!(!solver.add_piece_to_set(0));
    }

    #[test]
    fn test_instances_in_one_set_count() {
        let mut solver = GroupingSolver::new();
        solver.add_pieces(0, 3, 2);
        solver.new_set();
        assert!(solver.add_piece_to_set(0));
        assert!(solver.add_piece_to_set(0));
        assert!(!solver.add_piece_to_set(0));
    }
}
