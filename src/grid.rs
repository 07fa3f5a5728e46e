//! Dense box indexing and text rendering of placed pieces.
//!
//! Boxes are stored as flat arrays in x-major order:
//! `idx = x * SY * SZ + y * SZ + z`.

use rustc_hash::FxHashMap;

use crate::shape::Coord;

/// Converts box-local (x, y, z) coordinates to a linear cell index.
#[inline(always)]
pub const fn coord_to_idx(size: Coord, coord: Coord) -> usize {
    let (sy, sz) = (size.1 as usize, size.2 as usize);
    (coord.0 as usize) * sy * sz + (coord.1 as usize) * sz + (coord.2 as usize)
}

/// Converts a linear cell index to box-local (x, y, z) coordinates.
#[inline(always)]
pub const fn idx_to_coord(size: Coord, cell_index: usize) -> Coord {
    let (sy, sz) = (size.1 as usize, size.2 as usize);
    (
        (cell_index / (sy * sz)) as i32,
        ((cell_index / sz) % sy) as i32,
        (cell_index % sz) as i32,
    )
}

/// Display character of a 1-based piece number: digits, then letters.
pub fn piece_char(piece_number: usize) -> char {
    match piece_number {
        0 => '.',
        1..=9 => char::from(b'0' + piece_number as u8),
        10..=35 => char::from(b'A' + (piece_number - 10) as u8),
        _ => '*',
    }
}

/// Formats placed pieces as z-slices side by side.
///
/// `pieces[i]` holds the cells of piece number `i + 1`; cells inside
/// `bounds` that no piece covers show as '.'.
pub fn format_pieces(bounds: (Coord, Coord), pieces: &[Vec<Coord>]) -> String {
    let (lo, hi) = bounds;
    let mut labels: FxHashMap<Coord, usize> = FxHashMap::default();
    for (i, cells) in pieces.iter().enumerate() {
        for &cell in cells {
            labels.insert(cell, i + 1);
        }
    }
    let width = (hi.0 - lo.0 + 1).max(0) as usize;

    // header: z=lo, ..., z=hi
    let mut output = String::new();
    for z in lo.2..=hi.2 {
        if z > lo.2 {
            output.push_str("  ");
        }
        output.push_str(&format!("z={:<width$}", z, width = width));
    }
    output.push('\n');

    // rows from top (y=hi) to bottom (y=lo)
    for y in (lo.1..=hi.1).rev() {
        for z in lo.2..=hi.2 {
            if z > lo.2 {
                output.push_str("  ");
            }
            for x in lo.0..=hi.0 {
                output.push(piece_char(labels.get(&(x, y, z)).copied().unwrap_or(0)));
            }
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_conversion_roundtrip() {
        for size in [(3, 3, 3), (4, 2, 5), (1, 1, 7)] {
            let count = (size.0 * size.1 * size.2) as usize;
            for idx in 0..count {
                let (x, y, z) = idx_to_coord(size, idx);
                assert!(x < size.0 && y < size.1 && z < size.2, "{size:?} {idx}");
                assert_eq!(coord_to_idx(size, (x, y, z)), idx, "Roundtrip failed for index {idx}");
            }
        }
    }

    #[test]
    fn test_index_is_x_major() {
        assert_eq!(coord_to_idx((3, 3, 3), (1, 0, 0)), 9);
        assert_eq!(coord_to_idx((3, 3, 3), (0, 1, 0)), 3);
        assert_eq!(coord_to_idx((3, 3, 3), (0, 0, 1)), 1);
    }

    #[test]
    fn test_piece_chars() {
        assert_eq!(piece_char(0), '.');
        assert_eq!(piece_char(7), '7');
        assert_eq!(piece_char(10), 'A');
        assert_eq!(piece_char(13), 'D');
    }

    #[test]
    fn test_format_pieces() {
        let pieces = vec![
            vec![(0, 0, 0), (1, 0, 0), (0, 0, 1)],
            vec![(0, 1, 0), (1, 1, 0), (1, 1, 1)],
        ];
        let text = format_pieces(((0, 0, 0), (1, 1, 1)), &pieces);
        assert_eq!(text, "z=0   z=1 \n22  .2\n11  1.\n");
    }
}
