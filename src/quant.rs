//! Quantizer / Dequantizer (C5): dead-zone scalar quantization with
//! profile weighting matrices, reversible for both decode and RD-mode
//! distortion estimation.

use crate::constants::{BLOCK_ELEMS, DEFAULT_QUANT_BIAS, QMAT_SHIFT, QUANT_BIAS_SHIFT};
use crate::profile::Profile;

/// Precomputed forward-quantization divisors for every qscale in
/// `1..=qmax`, for both the luma and chroma weighting matrices.
///
/// `qmatrix[q][i] = (num << QMAT_SHIFT) / (q * weight[i])`.
pub struct QMatrixSet {
    pub qmax: u16,
    luma: Vec<[i64; BLOCK_ELEMS]>,
    chroma: Vec<[i64; BLOCK_ELEMS]>,
}

fn num_for_bit_depth(bit_depth: u8) -> i64 {
    if bit_depth == 8 {
        4
    } else {
        2
    }
}

fn build_one(weight: &[u8; BLOCK_ELEMS], qmax: u16, num: i64) -> Vec<[i64; BLOCK_ELEMS]> {
    let mut tables = vec![[0i64; BLOCK_ELEMS]; qmax as usize + 1];
    for q in 1..=qmax as i64 {
        let mut row = [0i64; BLOCK_ELEMS];
        for i in 0..BLOCK_ELEMS {
            let w = weight[i] as i64;
            row[i] = (num << QMAT_SHIFT) / (q * w);
        }
        tables[q as usize] = row;
    }
    tables
}

impl QMatrixSet {
    pub fn build(profile: &Profile, qmax: u16) -> Self {
        let num = num_for_bit_depth(profile.bit_depth);
        QMatrixSet {
            qmax,
            luma: build_one(&profile.luma_weight, qmax, num),
            chroma: build_one(&profile.chroma_weight, qmax, num),
        }
    }

    pub fn luma_row(&self, q: u16) -> &[i64; BLOCK_ELEMS] {
        &self.luma[q as usize]
    }

    pub fn chroma_row(&self, q: u16) -> &[i64; BLOCK_ELEMS] {
        &self.chroma[q as usize]
    }
}

/// The dead-zone quantizer bias, in `QMAT_SHIFT` fixed-point units.
pub fn bias_fixed_point(quant_bias: i64) -> i64 {
    quant_bias << (QMAT_SHIFT - QUANT_BIAS_SHIFT)
}

/// Default `quant_bias`, in `QUANT_BIAS_SHIFT` units.
pub fn default_quant_bias() -> i64 {
    DEFAULT_QUANT_BIAS
}

/// Forward-quantizes one AC coefficient given its natural-order weighting
/// divisor `qmat_val`. Returns the signed quantized level, zero inside the
/// dead zone.
pub fn quantize_ac(natural_value: i32, qmat_val: i64, bias: i64) -> i32 {
    let level = natural_value as i64 * qmat_val;
    let threshold1 = (1i64 << QMAT_SHIFT) - bias - 1;
    let threshold2 = threshold1 << 1;
    // Dead-zone predicate: true outside the zero bucket.
    if (level + threshold1) as u64 > threshold2 as u64 {
        let biased = if level >= 0 { level + bias } else { level - bias };
        (biased >> QMAT_SHIFT) as i32
    } else {
        0
    }
}

/// Forward-quantizes the DC coefficient: `(dc + round) >> shift`.
pub fn quantize_dc(dc: i32, bit_depth: u8) -> i32 {
    let (round, shift) = if bit_depth == 8 { (4, 3) } else { (2, 2) };
    (dc + round) >> shift
}

/// Inverse of [`quantize_dc`]: rescales a decoded DC level back to this
/// crate's own (orthonormal) transform-domain magnitude. `original_source`
/// skips this step because its target IDCT already folds the `>> shift`
/// into its own fixed-point scale; this crate's from-scratch DCT doesn't,
/// so the decoder has to undo the encoder's shift explicitly.
pub fn dequantize_dc(dc: i32, bit_depth: u8) -> i32 {
    let shift = if bit_depth == 8 { 3 } else { 2 };
    dc << shift
}

/// `(level_bias, level_shift)` used by both the decoder's inverse
/// quantizer and the RD-mode encoder's distortion estimate.
pub fn level_bias_shift(bit_depth: u8) -> (i32, u32) {
    if bit_depth == 8 {
        (32, 6)
    } else {
        (8, 4)
    }
}

/// Dequantizes one AC coefficient. `level` is signed, `weight` is the
/// natural-order weighting matrix entry, `qscale` the macroblock's
/// quantizer.
pub fn dequantize_ac(level: i32, weight: u8, qscale: u16, bit_depth: u8) -> i32 {
    let (level_bias, level_shift) = level_bias_shift(bit_depth);
    let sign = level.signum();
    let m = level.unsigned_abs() as i64;
    let weight = weight as i64;
    let scale = weight * qscale as i64;
    let mut out = (2 * m + 1) * scale;
    if level_bias < 32 || weight != level_bias as i64 {
        out += level_bias as i64;
    }
    out >>= level_shift;
    sign * out as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;

    #[test]
    fn zero_coefficient_quantizes_to_zero() {
        let profile = Profile::for_cid(1237).unwrap();
        let qmat = QMatrixSet::build(&profile, 16);
        let bias = bias_fixed_point(default_quant_bias());
        let level = quantize_ac(0, qmat.luma_row(8)[5], bias);
        assert_eq!(level, 0);
    }

    #[test]
    fn dc_quantization_matches_rounding_rule() {
        assert_eq!(quantize_dc(12, 8), (12 + 4) >> 3);
        assert_eq!(quantize_dc(12, 10), (12 + 2) >> 2);
    }

    #[test]
    fn dc_dequantize_undoes_quantize_shift() {
        assert_eq!(dequantize_dc(quantize_dc(40, 8), 8), 40);
        assert_eq!(dequantize_dc(quantize_dc(40, 10), 10), 40);
    }

    #[test]
    fn dequantize_sign_matches_input() {
        let v = dequantize_ac(-3, 16, 4, 8);
        assert!(v < 0);
        let v = dequantize_ac(3, 16, 4, 8);
        assert!(v > 0);
    }
}
