//! Presence bitmap codec
//!
//! Each page carries one bit per data element, set iff the element is non-zero.
//! Byte `i` covers elements `[8i, 8i + 8)`, most significant bit first. The bits
//! past `PAGE_DATA_SIZE` in the last byte are padding and always zero.

use super::{BITMAP_SIZE, PAGE_DATA_SIZE};

#[inline]
fn bit_position(index: usize) -> (usize, u8) {
    (index / 8, 1 << (7 - index % 8))
}

/// Derive the bitmap for a page's data
pub fn encode(data: &[i32; PAGE_DATA_SIZE]) -> [u8; BITMAP_SIZE] {
    let mut bitmap = [0u8; BITMAP_SIZE];
    for (index, &value) in data.iter().enumerate() {
        if value != 0 {
            let (byte_idx, mask) = bit_position(index);
            bitmap[byte_idx] |= mask;
        }
    }
    bitmap
}

/// Check a stored bitmap against the data it claims to describe
pub fn validate(data: &[i32; PAGE_DATA_SIZE], bitmap: &[u8; BITMAP_SIZE]) -> bool {
    for (index, &value) in data.iter().enumerate() {
        let (byte_idx, mask) = bit_position(index);
        let expected = value != 0;
        let actual = bitmap[byte_idx] & mask != 0;
        if expected != actual {
            return false;
        }
    }

    (PAGE_DATA_SIZE..BITMAP_SIZE * 8).all(|index| {
        let (byte_idx, mask) = bit_position(index);
        bitmap[byte_idx] & mask == 0
    })
}
