//! Disassembly plans.
//!
//! A [`Separation`] is a tree: each node lists the states that split its
//! pieces into a removed group and a group that stays, and owns the plans for
//! both groups. Single pieces have no node, and neither do groups of pieces
//! that may stay together because they form one logical piece.
//!
//! A [`SeparationInfo`] keeps only the number of moves of every node, in
//! prefix order (node, removed subtree, left subtree) with 0 for a missing
//! subtree:
//!
//! ```text
//! 3 2 1 0 0 0 0        3 -> 2 -> 1
//! 3 1 0 0 1 0 0        3 -> 1, 3 -> 1 (second branch is the left group)
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::Fault;
use crate::invariant;
use crate::shape::Coord;

/// Offsets beyond this distance mean the piece has left the puzzle.
pub const FAR_AWAY: i32 = 10000;

/// How far removed pieces are moved in the final state of a separation.
pub const REMOVAL_DISTANCE: i32 = 30000;

/// Offsets of a fixed list of pieces relative to the assembled puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    offsets: Vec<Coord>,
}

impl State {
    /// All pieces at their assembled position.
    pub fn new(piece_count: usize) -> Self {
        Self {
            offsets: vec![(0, 0, 0); piece_count],
        }
    }

    pub fn from_offsets(offsets: Vec<Coord>) -> Self {
        Self { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[Coord] {
        &self.offsets
    }

    pub fn get(&self, piece: usize) -> Coord {
        self.offsets.get(piece).copied().unwrap_or((0, 0, 0))
    }

    pub fn set(&mut self, piece: usize, offset: Coord) -> Result<(), Fault> {
        invariant!(piece < self.offsets.len());
        self.offsets[piece] = offset;
        Ok(())
    }

    pub fn piece_removed(&self, piece: usize) -> bool {
        let (x, y, z) = self.get(piece);
        x.abs() > FAR_AWAY || y.abs() > FAR_AWAY || z.abs() > FAR_AWAY
    }
}

/// Summary statistics shared by full and compact disassembly plans.
pub trait Disassembly {
    /// Moves of all nodes of the tree together.
    fn sum_moves(&self) -> u32;

    /// Number of moves per node, dot separated. Branches in which every node
    /// takes a single move are left out.
    fn moves_text(&self) -> String;

    /// Number of nodes in the tree.
    fn num_sequences(&self) -> usize;

    /// Moves of the `x`-th node in prefix order.
    fn sequence_length(&self, x: usize) -> u32;

    /// Compares the level: the first node in prefix order where the move
    /// counts differ decides, more moves being the higher level.
    fn compare(&self, other: &dyn Disassembly) -> Ordering {
        let shared = self.num_sequences().min(other.num_sequences());
        (0..shared)
            .map(|x| self.sequence_length(x).cmp(&other.sequence_length(x)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| self.num_sequences().cmp(&other.num_sequences()))
    }
}

/// One node of a disassembly plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Separation {
    /// Piece instance numbers handled by this node.
    pieces: Vec<u16>,
    /// First state is where the node starts, the last one has the removed
    /// group far away.
    states: Vec<State>,
    removed: Option<Box<Separation>>,
    left: Option<Box<Separation>>,
}

impl Separation {
    /// Builds a node and checks its structure: every state covers all pieces,
    /// there is at least one move, and the children hold exactly the pieces
    /// of the two groups split off by the last state.
    pub fn new(
        pieces: Vec<u16>,
        states: Vec<State>,
        removed: Option<Separation>,
        left: Option<Separation>,
    ) -> Result<Self, Fault> {
        invariant!(pieces.len() >= 2);
        invariant!(states.len() >= 2);
        invariant!(states.iter().all(|s| s.len() == pieces.len()));

        let last = &states[states.len() - 1];
        let mut gone = Vec::new();
        let mut stay = Vec::new();
        for (i, &piece) in pieces.iter().enumerate() {
            if last.piece_removed(i) {
                gone.push(piece);
            } else {
                stay.push(piece);
            }
        }
        gone.sort_unstable();
        stay.sort_unstable();
        invariant!(!gone.is_empty() && !stay.is_empty());
        invariant!(child_matches(removed.as_ref(), &gone));
        invariant!(child_matches(left.as_ref(), &stay));

        Ok(Self {
            pieces,
            states,
            removed: removed.map(Box::new),
            left: left.map(Box::new),
        })
    }

    /// Number of moves of this node.
    pub fn moves(&self) -> u32 {
        self.states.len().saturating_sub(1) as u32
    }

    pub fn pieces(&self) -> &[u16] {
        &self.pieces
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn removed(&self) -> Option<&Separation> {
        self.removed.as_deref()
    }

    pub fn left(&self) -> Option<&Separation> {
        self.left.as_deref()
    }

    fn children(&self) -> impl Iterator<Item = &Separation> {
        self.removed().into_iter().chain(self.left())
    }

    fn contains_multi_moves(&self) -> bool {
        self.moves() > 1 || self.children().any(Separation::contains_multi_moves)
    }

    fn collect_text(&self, parts: &mut Vec<String>) {
        parts.push(self.moves().to_string());
        for child in self.children() {
            if child.contains_multi_moves() {
                child.collect_text(parts);
            }
        }
    }

    fn collect_moves(&self, values: &mut Vec<u32>) {
        values.push(self.moves());
        for child in [self.removed(), self.left()] {
            match child {
                Some(child) => child.collect_moves(values),
                None => values.push(0),
            }
        }
    }

    /// Renumbers pieces after `count` unplaced instances at `from` were dropped.
    pub fn remove_pieces(&mut self, from: u16, count: u16) {
        for piece in &mut self.pieces {
            if *piece >= from + count {
                *piece -= count;
            }
        }
        if let Some(child) = &mut self.removed {
            child.remove_pieces(from, count);
        }
        if let Some(child) = &mut self.left {
            child.remove_pieces(from, count);
        }
    }

    /// Renumbers pieces after `count` unplaced instances were inserted at `from`.
    pub fn add_non_placed_pieces(&mut self, from: u16, count: u16) {
        for piece in &mut self.pieces {
            if *piece >= from {
                *piece += count;
            }
        }
        if let Some(child) = &mut self.removed {
            child.add_non_placed_pieces(from, count);
        }
        if let Some(child) = &mut self.left {
            child.add_non_placed_pieces(from, count);
        }
    }
}

/// A single piece or a group kept together has no node, otherwise the node
/// holds exactly the group's pieces.
fn child_matches(child: Option<&Separation>, group: &[u16]) -> bool {
    match child {
        None => !group.is_empty(),
        Some(child) => {
            let mut pieces = child.pieces.clone();
            pieces.sort_unstable();
            pieces == group
        }
    }
}

impl Disassembly for Separation {
    fn sum_moves(&self) -> u32 {
        self.moves() + self.children().map(Separation::sum_moves).sum::<u32>()
    }

    fn moves_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(".")
    }

    fn num_sequences(&self) -> usize {
        1 + self.children().map(Separation::num_sequences).sum::<usize>()
    }

    fn sequence_length(&self, x: usize) -> u32 {
        let mut values = Vec::new();
        self.collect_moves(&mut values);
        values
            .into_iter()
            .filter(|&v| v != 0)
            .nth(x)
            .unwrap_or(0)
    }
}

/// Move counts of a disassembly plan without the states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeparationInfo {
    values: Vec<u32>,
}

impl From<&Separation> for SeparationInfo {
    fn from(separation: &Separation) -> Self {
        let mut values = Vec::new();
        separation.collect_moves(&mut values);
        Self { values }
    }
}

impl SeparationInfo {
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    fn value(&self, idx: usize) -> u32 {
        self.values.get(idx).copied().unwrap_or(0)
    }

    /// Index just past the subtree starting at `idx`.
    fn subtree_end(&self, idx: usize) -> usize {
        if self.value(idx) == 0 {
            return idx + 1;
        }
        let removed_end = self.subtree_end(idx + 1);
        self.subtree_end(removed_end)
    }

    fn contains_multi_moves(&self, idx: usize) -> bool {
        let end = self.subtree_end(idx);
        self.values[idx.min(self.values.len())..end.min(self.values.len())]
            .iter()
            .any(|&v| v > 1)
    }

    fn collect_text(&self, idx: usize, parts: &mut Vec<String>) {
        parts.push(self.value(idx).to_string());
        let removed = idx + 1;
        let left = self.subtree_end(removed);
        for child in [removed, left] {
            if self.value(child) != 0 && self.contains_multi_moves(child) {
                self.collect_text(child, parts);
            }
        }
    }
}

impl Disassembly for SeparationInfo {
    fn sum_moves(&self) -> u32 {
        self.values.iter().sum()
    }

    fn moves_text(&self) -> String {
        if self.values.is_empty() {
            return String::new();
        }
        let mut parts = Vec::new();
        self.collect_text(0, &mut parts);
        parts.join(".")
    }

    fn num_sequences(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0).count()
    }

    fn sequence_length(&self, x: usize) -> u32 {
        self.values
            .iter()
            .copied()
            .filter(|&v| v != 0)
            .nth(x)
            .unwrap_or(0)
    }
}
