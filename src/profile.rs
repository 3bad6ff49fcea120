//! Profile Catalog (C1): immutable per-CID parameters, and the VLC/weight
//! table construction (C2) built lazily from them.
//!
//! `spec.md` treats the catalog's construction as out-of-scope, read-only
//! static data. The exact alphabets and weighting matrices a real DNxHD
//! profile carries are proprietary binary tables; this module builds its
//! own internally-consistent stand-ins with the shapes `spec.md` requires
//! (257-symbol AC alphabet, `bit_depth+4`-symbol DC alphabet, 62-symbol run
//! alphabet, 64-entry weighting matrices) using the canonical-code builder
//! in `vlc`. See DESIGN.md for the exact resolution.

use crate::constants::{AC_ALPHABET_LEN, AC_VLC_MAX_LEN, BLOCK_ELEMS, DC_VLC_MAX_LEN, RUN_ALPHABET_LEN};
use crate::error::{Error, Result};
use crate::vlc::{canonical_codes, VlcTable};

/// One symbol of the AC alphabet.
///
/// `level` is the base magnitude (1..=128); `flags` bit0 marks the
/// extended-level escape, bit1 marks "a run-VLC code follows".
#[derive(Clone, Copy, Debug)]
pub struct AcEntry {
    pub code: u16,
    pub bits: u8,
    pub level: u8,
    pub flags: u8,
}

/// Largest AC level directly representable without the extended-level
/// escape. The two highest symbol indices are reserved as escape entries
/// (one per run-flag value); everything below that is a direct `(level,
/// run_flag)` pair.
pub const AC_BASE_LEVEL_MAX: i32 = 127;

/// Base magnitude carried by an escape entry: actual level is
/// `ESCAPE_BASE_LEVEL + (extra << 7)`, matching spec.md §4.4's "add extra
/// << 7 to the base level".
pub const ESCAPE_BASE_LEVEL: u8 = 1;

/// Immutable, CID-keyed profile parameters plus lazily-built VLC tables.
pub struct Profile {
    pub cid: u32,
    pub bit_depth: u8,
    pub width: usize,
    pub height: usize,
    pub mb_width: usize,
    pub mb_height: usize,
    pub coding_unit_size: usize,
    pub frame_size: usize,
    pub interlaced: bool,
    pub luma_weight: [u8; BLOCK_ELEMS],
    pub chroma_weight: [u8; BLOCK_ELEMS],

    pub ac_entries: Vec<AcEntry>,
    pub ac_table: VlcTable,
    pub eob_index: usize,
    pub index_bits: u8,

    pub dc_codes: Vec<(u16, u8)>,
    pub dc_table: VlcTable,

    pub run_values: Vec<u8>,
    pub run_codes: Vec<(u16, u8)>,
    pub run_table: VlcTable,
}

fn rank_lengths(n: usize) -> Vec<u8> {
    // Breadth-first enumeration of a complete binary tree: rank `i`
    // (1-indexed) gets length `floor(log2(i)) + 1`. This is always a
    // valid, complete prefix code for any `n <= 2^max_len`, and it falls
    // straight out of `canonical_codes`'s own assignment order.
    (1..=n as u32)
        .map(|i| (32 - i.leading_zeros()) as u8)
        .collect()
}

fn build_ac_alphabet(index_bits: u8) -> (Vec<AcEntry>, VlcTable) {
    let lengths = rank_lengths(AC_ALPHABET_LEN);
    let codes = canonical_codes(&lengths);
    let mut entries = Vec::with_capacity(AC_ALPHABET_LEN);
    entries.push(AcEntry {
        code: codes[0].0,
        bits: codes[0].1,
        level: 0,
        flags: 0,
    });
    // Indices 1..AC_ALPHABET_LEN-2 are direct (level, run_flag) pairs; the
    // last two indices are the extended-level escapes (one per run_flag).
    let direct_len = AC_ALPHABET_LEN - 2;
    for idx in 1..direct_len {
        let zero_based = idx - 1;
        let level = (zero_based >> 1) + 1;
        let run_flag = (zero_based & 1) != 0;
        entries.push(AcEntry {
            code: codes[idx].0,
            bits: codes[idx].1,
            level: level as u8,
            flags: if run_flag { 0b10 } else { 0 },
        });
    }
    for (offset, run_flag) in [(0usize, false), (1usize, true)] {
        let idx = direct_len + offset;
        entries.push(AcEntry {
            code: codes[idx].0,
            bits: codes[idx].1,
            level: ESCAPE_BASE_LEVEL,
            flags: 0b01 | if run_flag { 0b10 } else { 0 },
        });
    }
    let table = VlcTable::build(&codes, AC_VLC_MAX_LEN);
    let _ = index_bits;
    (entries, table)
}

fn build_dc_alphabet(bit_depth: u8) -> (Vec<(u16, u8)>, VlcTable) {
    let count = bit_depth as usize + 4;
    let lengths = rank_lengths(count);
    let codes = canonical_codes(&lengths);
    let table = VlcTable::build(&codes, DC_VLC_MAX_LEN);
    (codes, table)
}

fn build_run_alphabet() -> (Vec<u8>, Vec<(u16, u8)>, VlcTable) {
    let lengths = rank_lengths(RUN_ALPHABET_LEN);
    let codes = canonical_codes(&lengths);
    let values: Vec<u8> = (1..=RUN_ALPHABET_LEN as u8).collect();
    let table = VlcTable::build(&codes, AC_VLC_MAX_LEN);
    (values, codes, table)
}

/// Synthesizes a representative weighting matrix: flat at the DC corner,
/// increasing with zig-zag-ish distance from it. `strength` widens the
/// spread between CIDs of different target bitrate.
fn synth_weight(strength: u32) -> [u8; BLOCK_ELEMS] {
    let mut w = [0u8; BLOCK_ELEMS];
    for y in 0..8 {
        for x in 0..8 {
            let d = (x + y) as u32;
            let v = 8 + (d * strength) / 4;
            w[y * 8 + x] = v.min(255) as u8;
        }
    }
    w[0] = 8;
    w
}

impl Profile {
    fn build(
        cid: u32,
        bit_depth: u8,
        width: usize,
        height: usize,
        coding_unit_size: usize,
        interlaced: bool,
        weight_strength: u32,
    ) -> Self {
        let mb_width = width / 16;
        // mb_height covers one coding unit: a full frame when progressive,
        // one field (half height) when interlaced. Ceiling division, since
        // 1080/16 and 540/16 are not integral.
        let coding_unit_height = if interlaced { height / 2 } else { height };
        let mb_height = (coding_unit_height + 15) / 16;
        let index_bits = if bit_depth == 8 { 4 } else { 6 };
        let (ac_entries, ac_table) = build_ac_alphabet(index_bits);
        let (dc_codes, dc_table) = build_dc_alphabet(bit_depth);
        let (run_values, run_codes, run_table) = build_run_alphabet();
        let frame_size = coding_unit_size * (if interlaced { 2 } else { 1 });

        Profile {
            cid,
            bit_depth,
            width,
            height,
            mb_width,
            mb_height,
            coding_unit_size,
            frame_size,
            interlaced,
            luma_weight: synth_weight(weight_strength),
            chroma_weight: synth_weight(weight_strength + 2),
            ac_entries,
            ac_table,
            eob_index: crate::constants::EOB_INDEX,
            index_bits,
            dc_codes,
            dc_table,
            run_values,
            run_codes,
            run_table,
        }
    }

    /// Looks up the immutable profile for a CID, building its VLC/weight
    /// tables on first use. Real deployments cache this per CID; callers
    /// of this crate are expected to hold onto the returned `Profile` for
    /// the lifetime of a CID selection rather than rebuild it per frame.
    pub fn for_cid(cid: u32) -> Result<Self> {
        let profile = match cid {
            1235 => Profile::build(cid, 8, 1920, 1080, 917_504, true, 6),
            1237 => Profile::build(cid, 8, 1920, 1080, 606_208, true, 10),
            1238 => Profile::build(cid, 8, 1920, 1080, 917_504, false, 6),
            1241 => Profile::build(cid, 10, 1920, 1080, 917_504, true, 5),
            1242 => Profile::build(cid, 10, 1920, 1080, 606_208, true, 9),
            1243 => Profile::build(cid, 10, 1920, 1080, 458_752, false, 8),
            1250 => Profile::build(cid, 8, 1280, 720, 458_752, false, 6),
            1251 => Profile::build(cid, 8, 1280, 720, 343_040, false, 10),
            1252 => Profile::build(cid, 8, 1280, 720, 229_376, false, 14),
            1253 => Profile::build(cid, 8, 1280, 720, 145_408, false, 18),
            _ => return Err(Error::UnsupportedCID(cid)),
        };
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shipped_cid_builds_a_complete_prefix_code() {
        for &cid in &[1235, 1237, 1238, 1241, 1242, 1243, 1250, 1251, 1252, 1253] {
            let profile = Profile::for_cid(cid).unwrap();
            assert!(profile.ac_table.max_len() <= AC_VLC_MAX_LEN);
            assert!(profile.dc_table.max_len() <= DC_VLC_MAX_LEN);
            assert_eq!(profile.ac_entries.len(), AC_ALPHABET_LEN);
            assert_eq!(profile.ac_entries[profile.eob_index].level, 0);
        }
    }

    #[test]
    fn unknown_cid_is_rejected() {
        assert!(Profile::for_cid(9999).is_err());
    }
}
