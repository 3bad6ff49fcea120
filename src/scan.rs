//! Zig-zag scan composed with the DSP's IDCT permutation (C3).

use crate::constants::BLOCK_ELEMS;

/// Natural-order zig-zag scan, as used by every DNxHD profile.
#[rustfmt::skip]
pub const ZIGZAG: [u8; BLOCK_ELEMS] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Builds `scan[i] = idct_permutation[zigzag[i]]`.
///
/// `scan[0]` always addresses the DC coefficient because `idct_permutation`
/// is a permutation of natural order and `zigzag[0] == 0`.
pub fn build_scan(idct_permutation: &[u8; BLOCK_ELEMS]) -> [u8; BLOCK_ELEMS] {
    let mut scan = [0u8; BLOCK_ELEMS];
    for (i, &z) in ZIGZAG.iter().enumerate() {
        scan[i] = idct_permutation[z as usize];
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_always_maps_to_position_zero() {
        // No permutation: scan degenerates to the zig-zag order itself.
        let mut identity = [0u8; BLOCK_ELEMS];
        for i in 0..BLOCK_ELEMS {
            identity[i] = i as u8;
        }
        let scan = build_scan(&identity);
        assert_eq!(scan[0], 0);
        assert_eq!(scan, ZIGZAG);
    }

    #[test]
    fn zigzag_is_a_permutation() {
        let mut seen = [false; BLOCK_ELEMS];
        for &z in ZIGZAG.iter() {
            assert!(!seen[z as usize]);
            seen[z as usize] = true;
        }
    }
}
