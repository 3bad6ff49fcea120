//! Canonical VLC table construction and a flat-table decode trie (C2).
//!
//! `Profile` alphabets hand this module a per-symbol codeword length list;
//! this module assigns canonical codewords (shortest-first, in symbol
//! order) and builds a `max_len`-bit flat lookup table for decode. A flat
//! table is a finer-grained version of the "two-level lookup" `spec.md`
//! describes: since every alphabet here has `max_len <= 9`, the full
//! `1 << max_len` window comfortably holds one slot per possible prefix
//! with no secondary-table fallback needed.

/// Assigns canonical codewords for a list of bit lengths, in symbol order.
///
/// Standard canonical-Huffman assignment: process symbols from shortest to
/// longest length, handing out sequential integers and left-shifting by one
/// bit every time the length increases. Returns `(code, length)` pairs
/// indexed exactly like the input, with length-0 entries (unused symbols)
/// mapped to `(0, 0)`.
pub fn canonical_codes(lengths: &[u8]) -> Vec<(u16, u8)> {
    let mut order: Vec<usize> = (0..lengths.len()).filter(|&i| lengths[i] > 0).collect();
    order.sort_by_key(|&i| lengths[i]);

    let mut codes = vec![(0u16, 0u8); lengths.len()];
    let mut code: u32 = 0;
    let mut prev_len = 0u8;
    for i in order {
        let len = lengths[i];
        code <<= len - prev_len;
        codes[i] = (code as u16, len);
        code += 1;
        prev_len = len;
    }
    codes
}

/// A decode-side VLC table: a flat array indexed by the next `max_len` bits
/// of the stream, each slot holding `(symbol, actual_bit_length)`.
#[derive(Clone)]
pub struct VlcTable {
    max_len: u8,
    slots: Vec<Option<(u16, u8)>>,
}

impl VlcTable {
    /// Builds a decode table from `(code, bit_length)` pairs, indexed by
    /// symbol. Entries with `bit_length == 0` are skipped (unused symbols).
    pub fn build(entries: &[(u16, u8)], max_len: u8) -> Self {
        let mut slots = vec![None; 1usize << max_len];
        for (symbol, &(code, len)) in entries.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let shift = max_len - len;
            let lo = (code as usize) << shift;
            let hi = lo + (1usize << shift);
            for window in lo..hi {
                slots[window] = Some((symbol as u16, len));
            }
        }
        VlcTable { max_len, slots }
    }

    /// Longest codeword this table was built for.
    pub fn max_len(&self) -> u8 {
        self.max_len
    }

    /// Looks up the symbol whose codeword prefixes `window` (the next
    /// `max_len` bits of the stream, left-justified). Returns the symbol
    /// index and how many bits it actually consumed.
    pub fn lookup(&self, window: u32) -> Option<(u16, u8)> {
        self.slots[window as usize & ((1usize << self.max_len) - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_codes_are_prefix_free() {
        let lengths = [2u8, 2, 3, 3, 3, 3, 0, 4];
        let codes = canonical_codes(&lengths);
        let mut seen: Vec<(u16, u8)> = Vec::new();
        for &(code, len) in codes.iter() {
            if len == 0 {
                continue;
            }
            for &(other_code, other_len) in seen.iter() {
                let min_len = len.min(other_len);
                let a = code >> (len - min_len);
                let b = other_code >> (other_len - min_len);
                assert_ne!(a, b, "codeword collision");
            }
            seen.push((code, len));
        }
    }

    #[test]
    fn vlc_table_round_trips_every_symbol() {
        let lengths = [2u8, 2, 3, 3, 3, 3, 0, 4];
        let codes = canonical_codes(&lengths);
        let table = VlcTable::build(&codes, 4);
        for (symbol, &(code, len)) in codes.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let window = (code as u32) << (4 - len);
            let (found_symbol, found_len) = table.lookup(window).unwrap();
            assert_eq!(found_symbol as usize, symbol);
            assert_eq!(found_len, len);
        }
    }
}
