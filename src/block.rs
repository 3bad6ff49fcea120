//! DCT Block Codec (C6): DC differential plus AC run/level coding for a
//! single 8x8 block.

use log::warn;

use crate::bitio::{BitReader, BitWriter};
use crate::constants::BLOCK_ELEMS;
use crate::dsp::Block;
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::quant::{dequantize_ac, quantize_dc};

/// Component index within a macroblock: blocks 0,1,4,5 are luma, 2,3,6,7
/// are chroma (spec.md §4.4 "component selection").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Component {
    Luma,
    Chroma,
}

/// `last_dc[component]` as used by both the encoder and decoder, indexed
/// `0..3` in the original spec but collapsed here to the two distinct
/// predictors DNxHD actually uses (Y has its own, U and V share a slot
/// only in the sense that both are `Component::Chroma`; callers keep one
/// predictor per physical component, not per `Component` variant).
pub fn reset_value(bit_depth: u8) -> i32 {
    quantize_dc(1 << (bit_depth as i32 + 2), bit_depth)
}

/// Decodes one 8x8 block into `block` (natural order, via `scan`).
///
/// On success, returns the last fully-read AC position (or `None` if the
/// block was all-zero AC). On a damaged codeword or overflowed bit
/// position, returns `Err(Error::DamagedSlice)` with zero coefficients
/// left in every position past the damage (the caller is expected to have
/// pre-cleared `block`).
#[allow(clippy::too_many_arguments)]
pub fn decode_block(
    reader: &mut BitReader,
    profile: &Profile,
    component: Component,
    scan: &[u8; BLOCK_ELEMS],
    last_dc: &mut i32,
    qscale: u16,
    block: &mut Block,
    mb_x: usize,
    mb_y: usize,
    component_index: usize,
) -> Result<()> {
    let (dc_symbol, _) = reader
        .read_vlc(&profile.dc_table)
        .ok_or_else(|| damaged(mb_x, mb_y, component_index))?;
    let nbits = dc_symbol as u8;
    if nbits > 0 {
        let raw = reader.read_bits(nbits) as i32;
        let sign = ((raw >> (nbits - 1)) & 1) - 1;
        let diff = (raw ^ sign) - sign;
        *last_dc += diff;
    }
    if reader.overflowed() {
        return Err(damaged(mb_x, mb_y, component_index));
    }
    block[scan[0] as usize] = crate::quant::dequantize_dc(*last_dc, profile.bit_depth);

    let weight = match component {
        Component::Luma => &profile.luma_weight,
        Component::Chroma => &profile.chroma_weight,
    };
    let (_, level_shift) = crate::quant::level_bias_shift(profile.bit_depth);
    let _ = level_shift;

    let mut pos: usize = 0;
    loop {
        let (symbol, _) = reader
            .read_vlc(&profile.ac_table)
            .ok_or_else(|| damaged(mb_x, mb_y, component_index))?;
        if symbol as usize == profile.eob_index {
            break;
        }
        let entry = profile.ac_entries[symbol as usize];
        let sign_bit = reader.read_bits(1);
        let mut level = entry.level as i32;
        if entry.flags & 0b01 != 0 {
            let extra = reader.read_bits(profile.index_bits) as i32;
            level += extra << 7;
        }
        if entry.flags & 0b10 != 0 {
            let (run_idx, _) = reader
                .read_vlc(&profile.run_table)
                .ok_or_else(|| damaged(mb_x, mb_y, component_index))?;
            pos += profile.run_values[run_idx as usize] as usize;
        }
        pos += 1;
        if pos > 63 || reader.overflowed() {
            warn!(
                "ac tex damaged at mb ({}, {}) component {}",
                mb_x, mb_y, component_index
            );
            return Err(damaged(mb_x, mb_y, component_index));
        }
        let signed_level = if sign_bit != 0 { -level } else { level };
        let j = scan[pos] as usize;
        let natural_pos = zigzag_natural(pos);
        let dq = dequantize_ac(signed_level, weight[natural_pos], qscale, profile.bit_depth);
        block[j] = dq;
    }
    Ok(())
}

fn zigzag_natural(i: usize) -> usize {
    crate::scan::ZIGZAG[i] as usize
}

fn damaged(mb_x: usize, mb_y: usize, component: usize) -> Error {
    Error::DamagedSlice {
        mb_x,
        mb_y,
        component,
    }
}

/// Encodes one already-quantized 8x8 block (coefficients addressed in
/// scan order, i.e. `coeffs[i]` is the coefficient at `scan[i]`).
pub fn encode_block(
    writer: &mut BitWriter,
    profile: &Profile,
    last_dc: &mut i32,
    coeffs: &[i32; BLOCK_ELEMS],
) {
    let dc = coeffs[0];
    let diff = dc - *last_dc;
    *last_dc = dc;
    let nbits = log2_16bit(2 * diff.unsigned_abs() as i32);
    let (code, bits) = profile.dc_codes[nbits as usize];
    writer.put_vlc(code, bits);
    if nbits > 0 {
        let raw = if diff < 0 {
            (diff - 1) & ((1i32 << nbits) - 1)
        } else {
            diff & ((1i32 << nbits) - 1)
        };
        writer.put_bits(raw as u32, nbits);
    }

    let mut last_non_zero: i32 = 0;
    for i in 1..BLOCK_ELEMS {
        let level = coeffs[i];
        if level == 0 {
            continue;
        }
        let run_len = i as i32 - last_non_zero - 1;
        emit_ac(writer, profile, level, run_len);
        last_non_zero = i as i32;
    }
    let (eob_code, eob_bits) = (
        profile.ac_entries[profile.eob_index].code,
        profile.ac_entries[profile.eob_index].bits,
    );
    writer.put_vlc(eob_code, eob_bits);
}

/// Resolves the AC alphabet symbol and run-VLC rank an `(level, run_len)`
/// pair encodes to, shared by the real writer and the rate controller's
/// bit-cost estimate.
fn ac_symbol(profile: &Profile, level: i32, run_len: i32) -> (usize, Option<usize>) {
    let mag = level.unsigned_abs() as i32;
    let run_flag = run_len != 0;
    let symbol = if mag <= crate::profile::AC_BASE_LEVEL_MAX {
        let rank = ((mag - 1) << 1) | (run_flag as i32);
        (rank + 1) as usize
    } else {
        profile.ac_entries.len() - if run_flag { 1 } else { 2 }
    };
    let run_rank = if run_flag {
        Some((run_len - 1) as usize)
    } else {
        None
    };
    (symbol, run_rank)
}

fn emit_ac(writer: &mut BitWriter, profile: &Profile, level: i32, run_len: i32) {
    let mag = level.unsigned_abs() as i32;
    let (symbol, run_rank) = ac_symbol(profile, level, run_len);
    let entry = profile.ac_entries[symbol];
    writer.put_vlc(entry.code, entry.bits);
    writer.put_bits((level < 0) as u32, 1);
    if entry.flags & 0b01 != 0 {
        let extra_max = (1u32 << profile.index_bits) - 1;
        let extra = (((mag - entry.level as i32) >> 7) as u32).min(extra_max);
        writer.put_bits(extra, profile.index_bits);
    }
    if let Some(run_rank) = run_rank {
        if entry.flags & 0b10 != 0 {
            let (rcode, rbits) = profile.run_codes[run_rank.min(profile.run_codes.len() - 1)];
            writer.put_vlc(rcode, rbits);
        }
    }
}

/// Bit cost of coding one nonzero AC coefficient, without actually writing
/// it: used by the rate controller to estimate a slice's bit length at a
/// candidate qscale.
pub fn ac_cost_bits(profile: &Profile, level: i32, run_len: i32) -> u32 {
    let (symbol, run_rank) = ac_symbol(profile, level, run_len);
    let entry = profile.ac_entries[symbol];
    let mut bits = entry.bits as u32 + 1;
    if entry.flags & 0b01 != 0 {
        bits += profile.index_bits as u32;
    }
    if let Some(run_rank) = run_rank {
        if entry.flags & 0b10 != 0 {
            let (_, rbits) = profile.run_codes[run_rank.min(profile.run_codes.len() - 1)];
            bits += rbits as u32;
        }
    }
    bits
}

/// Bit cost of one DC differential, without writing it.
pub fn dc_cost_bits(profile: &Profile, diff: i32) -> u32 {
    let nbits = log2_16bit(2 * diff.unsigned_abs() as i32);
    profile.dc_codes[nbits as usize].1 as u32 + nbits as u32
}

/// Bit cost of the EOB symbol.
pub fn eob_cost_bits(profile: &Profile) -> u32 {
    profile.ac_entries[profile.eob_index].bits as u32
}

/// `log2_16bit(v)`: number of bits needed to represent `v` (0 maps to 0),
/// matching the original's bit-scan-reverse-plus-one semantics.
pub fn log2_16bit(v: i32) -> u8 {
    if v <= 0 {
        0
    } else {
        32 - (v as u32).leading_zeros() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::build_scan;

    #[test]
    fn log2_16bit_matches_bit_width() {
        assert_eq!(log2_16bit(0), 0);
        assert_eq!(log2_16bit(1), 1);
        assert_eq!(log2_16bit(2), 2);
        assert_eq!(log2_16bit(3), 2);
        assert_eq!(log2_16bit(4), 3);
    }

    #[test]
    fn all_zero_block_encodes_to_dc_plus_eob_only() {
        let profile = Profile::for_cid(1237).unwrap();
        let mut writer = BitWriter::new();
        let mut last_dc = reset_value(8);
        let coeffs = [0i32; BLOCK_ELEMS];
        encode_block(&mut writer, &profile, &mut last_dc, &coeffs);
        let buf = writer.flush();
        assert!(!buf.is_empty());
        assert_eq!(last_dc, 0);
    }

    #[test]
    fn decode_recovers_encoded_dc_diff() {
        let profile = Profile::for_cid(1237).unwrap();
        let identity_perm = {
            let mut p = [0u8; BLOCK_ELEMS];
            for i in 0..BLOCK_ELEMS {
                p[i] = i as u8;
            }
            p
        };
        let scan = build_scan(&identity_perm);

        let mut writer = BitWriter::new();
        let mut enc_last_dc = reset_value(8);
        let mut coeffs = [0i32; BLOCK_ELEMS];
        coeffs[0] = 40;
        encode_block(&mut writer, &profile, &mut enc_last_dc, &coeffs);
        let buf = writer.flush();

        let mut reader = BitReader::new(&buf);
        let mut dec_last_dc = reset_value(8);
        let mut block: Block = [0; BLOCK_ELEMS];
        decode_block(
            &mut reader,
            &profile,
            Component::Luma,
            &scan,
            &mut dec_last_dc,
            1,
            &mut block,
            0,
            0,
            0,
        )
        .unwrap();
        assert_eq!(dec_last_dc, 40);
    }
}
