//! Rate Controller (C9): per-macroblock qscale selection under a
//! frame-size budget, in two variants — a variance-based fast path and a
//! Lagrangian R-D search.

use log::{debug, warn};

use crate::block::{ac_cost_bits, dc_cost_bits, eob_cost_bits};
use crate::constants::{LAMBDA_FRAC_BITS, NITRIS_MIN_PADDING_BITS};
use crate::dsp::Block;
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::quant::{dequantize_ac, quantize_ac, quantize_dc, QMatrixSet};

/// One macroblock's 8 already-FDCT'd blocks, in natural order.
pub type MbBlocks = [Block; 8];

const LUMA_BLOCKS: [usize; 4] = [0, 1, 4, 5];
const CHROMA_BLOCKS: [usize; 4] = [2, 3, 6, 7];

/// Per-(qscale, macroblock) bit cost and sum-squared-distortion, built
/// once per frame and shared read-only across rate-control strategies.
pub struct McRc {
    pub qmax: u16,
    pub mb_count: usize,
    /// `bits[q][mb]`, `q` in `1..=qmax` (index 0 unused).
    bits: Vec<Vec<u32>>,
    /// `ssd[q][mb]`, same indexing.
    ssd: Vec<Vec<u64>>,
}

impl McRc {
    pub fn bits(&self, q: u16, mb: usize) -> u32 {
        self.bits[q as usize][mb]
    }

    pub fn ssd(&self, q: u16, mb: usize) -> u64 {
        self.ssd[q as usize][mb]
    }
}

fn block_cost(
    block: &Block,
    profile: &Profile,
    qrow: &[i64; 64],
    weight: &[u8; 64],
    bias: i64,
    scan: &[u8; 64],
    qscale: u16,
) -> (u32, u64) {
    let dc_q = quantize_dc(block[0], profile.bit_depth);
    let dc_shift = if profile.bit_depth == 8 { 3 } else { 2 };
    let recon_dc = dc_q << dc_shift;
    let mut bits = dc_cost_bits(profile, dc_q);
    let mut ssd = (recon_dc - block[0]) as i64;
    ssd *= ssd;
    let mut ssd = ssd as u64;

    let mut last_nz: i32 = 0;
    for i in 1..64usize {
        let j = scan[i] as usize;
        let level = quantize_ac(block[j], qrow[j], bias);
        if level == 0 {
            continue;
        }
        let run_len = i as i32 - last_nz - 1;
        bits += ac_cost_bits(profile, level, run_len);
        last_nz = i as i32;
        let recon = dequantize_ac(level, weight[j], qscale, profile.bit_depth);
        let d = (recon - block[j]) as i64;
        ssd += (d * d) as u64;
    }
    bits += eob_cost_bits(profile);
    (bits, ssd)
}

/// Builds per-(q, mb) cost tables for every macroblock in `mb_blocks`
/// (already-gathered, FDCT'd block octets, in macroblock raster order).
pub fn build_mc_rc(
    mb_blocks: &[MbBlocks],
    profile: &Profile,
    qmat: &QMatrixSet,
    scan: &[u8; 64],
    bias: i64,
) -> McRc {
    let qmax = qmat.qmax;
    let mb_count = mb_blocks.len();
    let mut bits = vec![vec![0u32; mb_count]; qmax as usize + 1];
    let mut ssd = vec![vec![0u64; mb_count]; qmax as usize + 1];

    for q in 1..=qmax {
        let luma_row = qmat.luma_row(q);
        let chroma_row = qmat.chroma_row(q);
        for (mb_idx, blocks) in mb_blocks.iter().enumerate() {
            let mut total_bits = 0u32;
            let mut total_ssd = 0u64;
            for &b in LUMA_BLOCKS.iter() {
                let (bb, ss) = block_cost(&blocks[b], profile, luma_row, &profile.luma_weight, bias, scan, q);
                total_bits += bb;
                total_ssd += ss;
            }
            for &b in CHROMA_BLOCKS.iter() {
                let (bb, ss) = block_cost(&blocks[b], profile, chroma_row, &profile.chroma_weight, bias, scan, q);
                total_bits += bb;
                total_ssd += ss;
            }
            bits[q as usize][mb_idx] = total_bits;
            ssd[q as usize][mb_idx] = total_ssd;
        }
    }

    McRc {
        qmax,
        mb_count,
        bits,
        ssd,
    }
}

fn pad32(bits: u64) -> u64 {
    (bits + 31) & !31
}

/// Budget available for slice payloads, per spec.md §4.7.
pub fn frame_bits(coding_unit_size: usize, nitris_compat: bool) -> u64 {
    let min_padding = if nitris_compat { NITRIS_MIN_PADDING_BITS } else { 0 };
    let header_and_trailer = 640 + 4;
    ((coding_unit_size as u64).saturating_sub(header_and_trailer) * 8).saturating_sub(min_padding)
}

fn row_bits_at_uniform_q(rc: &McRc, mb_width: usize, mb_height: usize, q: u16) -> u64 {
    let mut total = 0u64;
    for row in 0..mb_height {
        let mut row_bits = 0u64;
        for col in 0..mb_width {
            let mb = row * mb_width + col;
            row_bits += rc.bits(q, mb) as u64 + 12;
        }
        total += pad32(row_bits);
    }
    total
}

/// 4-pass, 8-bit LSD radix sort, descending by key. Returns the indices of
/// `keys` in descending-key order. Stable within equal keys (ties keep
/// their original relative order), matching spec.md's property 7.
pub fn radix_sort_desc(keys: &[u32]) -> Vec<usize> {
    let n = keys.len();
    let mut indices: Vec<usize> = (0..n).collect();
    let mut scratch = vec![0usize; n];

    for pass in 0..4 {
        let shift = pass * 8;
        let mut counts = [0usize; 257];
        for &idx in &indices {
            let bucket = ((keys[idx] >> shift) & 0xff) as usize;
            counts[bucket + 1] += 1;
        }
        for b in 0..256 {
            counts[b + 1] += counts[b];
        }
        for &idx in &indices {
            let bucket = ((keys[idx] >> shift) & 0xff) as usize;
            scratch[counts[bucket]] = idx;
            counts[bucket] += 1;
        }
        indices.copy_from_slice(&scratch);
    }
    // `indices` is now ascending by key (stable LSD radix sort); reverse
    // for descending order while keeping ties in original relative order.
    indices.reverse();
    stabilize_ties(&mut indices, keys);
    indices
}

/// After a plain reversal, equal-key runs come out in *reverse* original
/// order; re-sort each run back to ascending index to restore stability.
fn stabilize_ties(indices: &mut [usize], keys: &[u32]) {
    let mut i = 0;
    while i < indices.len() {
        let mut j = i + 1;
        while j < indices.len() && keys[indices[j]] == keys[indices[i]] {
            j += 1;
        }
        indices[i..j].sort_unstable();
        i = j;
    }
}

/// 16x16 luma-sample variance for the fast-path promotion order (8-bit
/// path; spec.md's 10-bit variant replaces the source samples but keeps
/// the same reduction).
pub fn mb_variance(luma_blocks: &[Block; 4]) -> i64 {
    let mut sum: i64 = 0;
    let mut sum_sq: i64 = 0;
    for block in luma_blocks {
        for &v in block.iter() {
            sum += v as i64;
            sum_sq += (v as i64) * (v as i64);
        }
    }
    let n = 256i64;
    sum_sq - (sum * sum) / n
}

/// Variance-based fast path. `mb_luma` supplies, per macroblock in raster
/// order, the 4 luma blocks (pixel domain, natural order) used for the
/// variance promotion order. Returns one qscale per macroblock.
pub fn fast_path(
    rc: &McRc,
    mb_width: usize,
    mb_height: usize,
    mb_luma: &[[Block; 4]],
    budget_bits: u64,
) -> Result<Vec<u16>> {
    let mb_count = mb_width * mb_height;
    debug_assert_eq!(rc.mb_count, mb_count);

    // Binary search the smallest uniform qscale meeting the row-padded
    // budget.
    let mut lo = 1u16;
    let mut hi = rc.qmax;
    if row_bits_at_uniform_q(rc, mb_width, mb_height, hi) > budget_bits {
        warn!(
            "rate control infeasible even at qmax={}: needed {} bits, budget {}",
            hi,
            row_bits_at_uniform_q(rc, mb_width, mb_height, hi),
            budget_bits
        );
        return Err(Error::RateControlInfeasible {
            qmax: hi,
            needed_bits: row_bits_at_uniform_q(rc, mb_width, mb_height, hi),
            budget_bits,
        });
    }
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if row_bits_at_uniform_q(rc, mb_width, mb_height, mid) <= budget_bits {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    let base_q = lo;
    let mut qscale = vec![base_q; mb_count];
    let mut current_bits = row_bits_at_uniform_q(rc, mb_width, mb_height, base_q);
    debug!("fast path base qscale {}, {} bits of {}", base_q, current_bits, budget_bits);

    if current_bits > budget_bits {
        // Greedily promote the highest-variance macroblocks to `q+1`
        // until the running total fits, mirroring spec.md's radix-sort
        // promotion order. Promotion only helps once; if already at
        // qmax nothing more can be done (checked above).
        let variances: Vec<u32> = mb_luma
            .iter()
            .map(|luma| mb_variance(luma).max(0) as u32)
            .collect();
        let order = radix_sort_desc(&variances);

        for &mb in &order {
            if current_bits <= budget_bits {
                break;
            }
            let q = qscale[mb];
            if q >= rc.qmax {
                continue;
            }
            let row = mb / mb_width;
            let old_row_bits = pad32(row_mb_bits(rc, mb_width, &qscale, row));
            qscale[mb] = q + 1;
            let new_row_bits = pad32(row_mb_bits(rc, mb_width, &qscale, row));
            // A promotion with `delta_bits == 0` is treated as "no
            // improvement", per spec.md §9 open question (b): the
            // original source uses `INT_MIN` as a sentinel so the
            // promotion loop keeps scanning rather than re-trying the
            // same saturated row.
            if new_row_bits == old_row_bits {
                qscale[mb] = q;
                continue;
            }
            current_bits = current_bits + new_row_bits - old_row_bits;
        }
    }

    if current_bits > budget_bits {
        return Err(Error::RateControlInfeasible {
            qmax: rc.qmax,
            needed_bits: current_bits,
            budget_bits,
        });
    }
    Ok(qscale)
}

fn row_mb_bits(rc: &McRc, mb_width: usize, qscale: &[u16], row: usize) -> u64 {
    let mut total = 0u64;
    for col in 0..mb_width {
        let mb = row * mb_width + col;
        total += rc.bits(qscale[mb], mb) as u64 + 12;
    }
    total
}

/// Lagrangian R-D path: searches the smallest lambda whose per-MB argmin
/// assignment fits the budget.
pub fn rd_path(rc: &McRc, mb_width: usize, mb_height: usize, budget_bits: u64) -> Result<Vec<u16>> {
    let mb_count = mb_width * mb_height;
    debug_assert_eq!(rc.mb_count, mb_count);

    let assign = |lambda: i64| -> Vec<u16> {
        (0..mb_count)
            .map(|mb| {
                let mut best_q = 1u16;
                let mut best_cost = i64::MAX;
                for q in 1..=rc.qmax {
                    let bits = rc.bits(q, mb) as i64;
                    let ssd = rc.ssd(q, mb) as i64;
                    let cost = bits * lambda + (ssd << LAMBDA_FRAC_BITS);
                    if cost < best_cost {
                        best_cost = cost;
                        best_q = q;
                    }
                }
                best_q
            })
            .collect()
    };

    let total_bits = |qscale: &[u16]| -> u64 {
        let mut total = 0u64;
        for row in 0..mb_height {
            total += pad32(row_mb_bits(rc, mb_width, qscale, row));
        }
        total
    };

    let mut lambda: i64 = 2 << LAMBDA_FRAC_BITS;
    let mut last_lower: Option<i64> = None;
    let mut last_higher: Option<i64> = None;
    let mut down_step: i64 = 1;
    let mut up_step: i64 = 1;

    let mut best: Option<Vec<u16>> = None;
    for _ in 0..64 {
        let qscale = assign(lambda);
        let bits = total_bits(&qscale);
        if bits <= budget_bits {
            best = Some(qscale);
            last_higher = Some(lambda);
        } else {
            last_lower = Some(lambda);
        }
        match (last_lower, last_higher) {
            (Some(l), Some(h)) => {
                if h - l <= 1 {
                    break;
                }
                lambda = l + (h - l) / 2;
            }
            (Some(l), None) => {
                down_step *= 5;
                lambda = l + down_step.max(1 << LAMBDA_FRAC_BITS);
            }
            (None, Some(h)) => {
                up_step *= 5;
                lambda = (h - up_step.max(1 << LAMBDA_FRAC_BITS)).max(1);
            }
            (None, None) => unreachable!("bits <= budget always sets last_higher or last_lower"),
        }
    }

    best.ok_or_else(|| {
        let final_bits = total_bits(&assign(lambda));
        warn!(
            "RD rate control infeasible: needed {} bits, budget {}",
            final_bits, budget_bits
        );
        Error::RateControlInfeasible {
            qmax: rc.qmax,
            needed_bits: final_bits,
            budget_bits,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_sort_matches_reference_descending_sort() {
        let keys: Vec<u32> = vec![5, 300, 70000, 1, 300, 0, 4_000_000_000];
        let got = radix_sort_desc(&keys);
        let mut expected: Vec<usize> = (0..keys.len()).collect();
        expected.sort_by(|&a, &b| keys[b].cmp(&keys[a]).then(a.cmp(&b)));
        assert_eq!(got, expected);
    }

    #[test]
    fn radix_sort_handles_empty_and_singleton() {
        assert_eq!(radix_sort_desc(&[]), Vec::<usize>::new());
        assert_eq!(radix_sort_desc(&[42]), vec![0]);
    }

    #[test]
    fn mb_variance_is_zero_for_flat_block() {
        let block: Block = [100; 64];
        let luma = [block; 4];
        assert_eq!(mb_variance(&luma), 0);
    }

    #[test]
    fn frame_bits_reserves_nitris_padding() {
        let plain = frame_bits(606_208, false);
        let nitris = frame_bits(606_208, true);
        assert_eq!(plain - nitris, NITRIS_MIN_PADDING_BITS);
    }
}
