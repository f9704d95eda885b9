//! Byte-offset <-> (row, col) conversion for a word-wrapped view of the
//! buffer over a fixed-width console.
//!
//! Wrapping rule: a logical line (delimited by `\n`) is broken into
//! `width`-wide visual rows; an exact multiple of `width` characters
//! wraps onto a fresh row rather than leaving a full row followed by an
//! empty one, so the cursor landing at the boundary always means "start
//! of the next row", never "one past the end of this one".

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualPos {
    pub row: usize,
    pub col: usize,
}

/// Convert a byte offset into the buffer to its wrapped (row, col).
/// `index` past the end of `content` clamps to the position right after
/// the last character.
pub fn visual_of(content: &[u8], index: usize, width: usize) -> VisualPos {
    let index = index.min(content.len());
    let mut row = 0usize;
    let mut col = 0usize;

    for &byte in &content[..index] {
        if byte == b'\n' {
            row += 1;
            col = 0;
        } else {
            col += 1;
            if col == width {
                row += 1;
                col = 0;
            }
        }
    }

    VisualPos { row, col }
}

/// Convert a wrapped (row, col) back into a byte offset. Positions past
/// the end of a row clamp to the row's last valid column; positions past
/// the last row clamp to the end of the buffer.
pub fn index_of(content: &[u8], target_row: usize, target_col: usize, width: usize) -> usize {
    let mut row = 0usize;
    let mut col = 0usize;

    for (i, &byte) in content.iter().enumerate() {
        if row == target_row && col == target_col {
            return i;
        }
        if byte == b'\n' {
            if row == target_row {
                // Target column was past this row's end: land before the newline.
                return i;
            }
            row += 1;
            col = 0;
        } else {
            col += 1;
            if col == width {
                if row == target_row {
                    return i + 1;
                }
                row += 1;
                col = 0;
            }
        }
    }

    content.len()
}

/// Total number of wrapped visual rows `content` occupies (at least 1,
/// even for an empty buffer).
pub fn row_count(content: &[u8], width: usize) -> usize {
    visual_of(content, content.len(), width).row + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visual_of_tracks_newlines() {
        let content = b"abc\ndef";
        assert_eq!(visual_of(content, 0, 80), VisualPos { row: 0, col: 0 });
        assert_eq!(visual_of(content, 3, 80), VisualPos { row: 0, col: 3 });
        assert_eq!(visual_of(content, 4, 80), VisualPos { row: 1, col: 0 });
        assert_eq!(visual_of(content, 7, 80), VisualPos { row: 1, col: 3 });
    }

    #[test]
    fn visual_of_wraps_at_width() {
        let content = b"abcdef";
        assert_eq!(visual_of(content, 3, 3), VisualPos { row: 1, col: 0 });
        assert_eq!(visual_of(content, 6, 3), VisualPos { row: 2, col: 0 });
    }

    #[test]
    fn index_of_is_inverse_of_visual_of() {
        let content = b"hello\nworld wide web";
        for index in 0..=content.len() {
            let pos = visual_of(content, index, 6);
            let round_tripped = index_of(content, pos.row, pos.col, 6);
            assert_eq!(round_tripped, index, "index {index} -> {pos:?} -> {round_tripped}");
        }
    }

    #[test]
    fn index_of_clamps_past_row_end() {
        let content = b"ab\ncd";
        assert_eq!(index_of(content, 0, 99, 80), 2); // lands right before the newline
        assert_eq!(index_of(content, 99, 0, 80), content.len());
    }

    #[test]
    fn row_count_for_empty_buffer_is_one() {
        assert_eq!(row_count(b"", 80), 1);
    }
}
