//! Turns a disassembly plan into one frame of piece offsets per move.
//!
//! Inside a [`Separation`] the removed group ends up far away. For showing
//! the moves, groups are instead shifted by a fixed spacing along the
//! removal direction, and keep that shift while their own subtree is played.

use crate::disassembly::{Separation, State};
use crate::shape::{add, scale, sub, Coord};

/// Offsets of all piece instances after every move, starting with the
/// assembled puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    frames: Vec<Vec<Coord>>,
}

impl Replay {
    /// Plays `separation` for an assembly of `piece_count` instances. Removed
    /// groups move `spacing` cells away along each axis of the removal.
    pub fn new(separation: &Separation, piece_count: usize, spacing: i32) -> Self {
        let mut replay = Self {
            frames: vec![vec![(0, 0, 0); piece_count]],
        };
        replay.play(separation, (0, 0, 0), spacing);
        replay
    }

    pub fn frames(&self) -> &[Vec<Coord>] {
        &self.frames
    }

    /// Number of moves played.
    pub fn moves(&self) -> usize {
        self.frames.len() - 1
    }

    fn push(&mut self, separation: &Separation, state: &State, shift: Coord) {
        let mut frame = self.frames[self.frames.len() - 1].clone();
        for (i, &piece) in separation.pieces().iter().enumerate() {
            if let Some(offset) = frame.get_mut(piece as usize) {
                *offset = add(state.get(i), shift);
            }
        }
        self.frames.push(frame);
    }

    fn play(&mut self, separation: &Separation, shift: Coord, spacing: i32) {
        let states = separation.states();
        let Some((last, moves)) = states.split_last() else {
            return;
        };
        let Some(before) = moves.last() else {
            return;
        };
        for state in moves.iter().skip(1) {
            self.push(separation, state, shift);
        }

        // the removal, shortened to the spacing
        let count = separation.piece_count();
        let direction = (0..count)
            .find(|&i| last.piece_removed(i))
            .map(|i| {
                let (dx, dy, dz) = sub(last.get(i), before.get(i));
                (dx.signum(), dy.signum(), dz.signum())
            })
            .unwrap_or((0, 0, 0));
        let away = scale(direction, spacing);
        let removal = State::from_offsets(
            (0..count)
                .map(|i| {
                    if last.piece_removed(i) {
                        add(before.get(i), away)
                    } else {
                        before.get(i)
                    }
                })
                .collect(),
        );
        self.push(separation, &removal, shift);

        if let Some(removed) = separation.removed() {
            self.play(removed, add(shift, away), spacing);
        }
        if let Some(left) = separation.left() {
            self.play(left, shift, spacing);
        }
    }
}
