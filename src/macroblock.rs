//! Macroblock Codec (C7): 8-block packing of one 16x16 4:2:2 macroblock.
//!
//! Block order is fixed: Y0 Y1 U0 V0 Y2 Y3 U1 V1 (top-left luma, top-right
//! luma, top-left U, top-left V, bottom-left luma, bottom-right luma,
//! bottom-left U, bottom-right V).

use crate::bitio::{BitReader, BitWriter};
use crate::block::{self, Component};
use crate::constants::BLOCK_ELEMS;
use crate::dsp::{self, Block};
use crate::error::Result;
use crate::profile::Profile;
use crate::quant::{bias_fixed_point, quantize_ac, quantize_dc, QMatrixSet};
use crate::scan::build_scan;

/// Per-component DC predictors, reset at each slice.
#[derive(Clone, Copy, Debug)]
pub struct DcPredictors {
    pub y: i32,
    pub u: i32,
    pub v: i32,
}

impl DcPredictors {
    pub fn reset(bit_depth: u8) -> Self {
        let v = block::reset_value(bit_depth);
        DcPredictors { y: v, u: v, v }
    }
}

/// The fixed per-block component assignment within a macroblock.
const BLOCK_COMPONENT: [Component; 8] = [
    Component::Luma,
    Component::Luma,
    Component::Chroma,
    Component::Chroma,
    Component::Luma,
    Component::Luma,
    Component::Chroma,
    Component::Chroma,
];

fn predictor_slot<'a>(predictors: &'a mut DcPredictors, block_idx: usize) -> &'a mut i32 {
    match block_idx {
        0 | 1 | 4 | 5 => &mut predictors.y,
        2 | 6 => &mut predictors.u,
        _ => &mut predictors.v,
    }
}

/// Destination for one decoded macroblock: byte or u16 plane slices plus
/// their strides, one per physical component (Y, U, V).
pub struct PlaneSink<'a> {
    pub y: &'a mut [u8],
    pub y_stride: usize,
    pub u: &'a mut [u8],
    pub u_stride: usize,
    pub v: &'a mut [u8],
    pub v_stride: usize,
    /// Set whenever the coding unit is field-interlaced, regardless of
    /// which field this sink writes: every output row then belongs to
    /// one field or the other, so block writes use `2 * stride` for
    /// *both* fields.
    pub interlaced: bool,
    /// Set for the bottom (second) field: selects the odd output lines
    /// instead of the even ones. Has no effect unless `interlaced` is
    /// also set.
    pub bottom_field: bool,
}

fn block_dst_offset(stride: usize, interlaced: bool, bottom_field: bool, row: usize, col: usize) -> (usize, usize) {
    let line_stride = if interlaced { stride * 2 } else { stride };
    let row_offset = if interlaced && bottom_field { 1 } else { 0 };
    ((row + row_offset) * line_stride + col, line_stride)
}

/// Decodes one macroblock's bitstream (qscale + 8 blocks) into the output
/// planes at macroblock coordinates `(mb_x, mb_y)`.
#[allow(clippy::too_many_arguments)]
pub fn decode_macroblock(
    reader: &mut BitReader,
    profile: &Profile,
    scan: &[u8; BLOCK_ELEMS],
    predictors: &mut DcPredictors,
    mb_x: usize,
    mb_y: usize,
    sink: &mut PlaneSink,
) -> Result<()> {
    let qscale_raw = reader.read_bits(11) as u16;
    reader.skip_bits(1);
    let qscale = qscale_raw.max(1);

    for block_idx in 0..8 {
        let component = BLOCK_COMPONENT[block_idx];
        let mut block: Block = [0; BLOCK_ELEMS];
        let last_dc = predictor_slot(predictors, block_idx);
        let decode_result = block::decode_block(
            reader,
            profile,
            component,
            scan,
            last_dc,
            qscale,
            &mut block,
            mb_x,
            mb_y,
            block_idx,
        );
        if decode_result.is_err() {
            // Damaged slice: block stays zeroed, IDCT of an all-zero block
            // is itself all-zero, so we still write a defined (flat) patch.
            dsp::clear_block(&mut block);
        }
        dsp::idct(&mut block);

        let (plane, stride): (&mut [u8], usize) = match block_idx {
            0 | 1 | 4 | 5 => (sink.y, sink.y_stride),
            2 | 6 => (sink.u, sink.u_stride),
            _ => (sink.v, sink.v_stride),
        };
        let (row, col) = luma_block_position(block_idx, mb_x, mb_y, component);
        let (offset, line_stride) = block_dst_offset(stride, sink.interlaced, sink.bottom_field, row, col);
        write_block_u8(plane, offset, line_stride, &block);

        if decode_result.is_err() {
            decode_result?;
        }
    }
    Ok(())
}

fn luma_block_position(block_idx: usize, mb_x: usize, mb_y: usize, component: Component) -> (usize, usize) {
    let base_y = mb_y * 16;
    let base_x = mb_x * 16;
    match component {
        Component::Luma => match block_idx {
            0 => (base_y, base_x),
            1 => (base_y, base_x + 8),
            4 => (base_y + 8, base_x),
            _ => (base_y + 8, base_x + 8),
        },
        Component::Chroma => {
            let chroma_base_y = mb_y * 16;
            let chroma_base_x = mb_x * 8;
            match block_idx {
                2 | 3 => (chroma_base_y, chroma_base_x),
                _ => (chroma_base_y + 8, chroma_base_x),
            }
        }
    }
}

fn write_block_u8(plane: &mut [u8], offset: usize, line_stride: usize, block: &Block) {
    for y in 0..8 {
        let row_off = offset + y * line_stride;
        for x in 0..8 {
            plane[row_off + x] = block[y * 8 + x].clamp(0, 255) as u8;
        }
    }
}

fn write_block_u16(plane: &mut [u16], offset: usize, line_stride: usize, block: &Block) {
    for y in 0..8 {
        let row_off = offset + y * line_stride;
        for x in 0..8 {
            plane[row_off + x] = block[y * 8 + x].clamp(0, 1023) as u16;
        }
    }
}

/// 10-bit variant of [`decode_macroblock`]'s plane sink.
pub struct PlaneSink16<'a> {
    pub y: &'a mut [u16],
    pub y_stride: usize,
    pub u: &'a mut [u16],
    pub u_stride: usize,
    pub v: &'a mut [u16],
    pub v_stride: usize,
    pub interlaced: bool,
    pub bottom_field: bool,
}

#[allow(clippy::too_many_arguments)]
pub fn decode_macroblock_10(
    reader: &mut BitReader,
    profile: &Profile,
    scan: &[u8; BLOCK_ELEMS],
    predictors: &mut DcPredictors,
    mb_x: usize,
    mb_y: usize,
    sink: &mut PlaneSink16,
) -> Result<()> {
    let qscale_raw = reader.read_bits(11) as u16;
    reader.skip_bits(1);
    let qscale = qscale_raw.max(1);

    for block_idx in 0..8 {
        let component = BLOCK_COMPONENT[block_idx];
        let mut block: Block = [0; BLOCK_ELEMS];
        let last_dc = predictor_slot(predictors, block_idx);
        let decode_result = block::decode_block(
            reader,
            profile,
            component,
            scan,
            last_dc,
            qscale,
            &mut block,
            mb_x,
            mb_y,
            block_idx,
        );
        if decode_result.is_err() {
            dsp::clear_block(&mut block);
        }
        dsp::idct(&mut block);

        let (plane, stride): (&mut [u16], usize) = match block_idx {
            0 | 1 | 4 | 5 => (sink.y, sink.y_stride),
            2 | 6 => (sink.u, sink.u_stride),
            _ => (sink.v, sink.v_stride),
        };
        let (row, col) = luma_block_position(block_idx, mb_x, mb_y, component);
        let (offset, line_stride) = block_dst_offset(stride, sink.interlaced, sink.bottom_field, row, col);
        write_block_u16(plane, offset, line_stride, &block);

        if decode_result.is_err() {
            decode_result?;
        }
    }
    Ok(())
}

/// Source for one macroblock's raw samples during encode.
pub struct PlaneSource8<'a> {
    pub y: &'a [u8],
    pub y_stride: usize,
    pub u: &'a [u8],
    pub u_stride: usize,
    pub v: &'a [u8],
    pub v_stride: usize,
    pub interlaced: bool,
    pub bottom_field: bool,
    /// Set for the final macroblock row of 1080-line content: the bottom
    /// 4 rows of each block don't exist in the source and must be
    /// mirrored from the top 4 (`dnxhd_get_pixels_8x4_sym`).
    pub symmetric_last_row: bool,
}

fn gather_block_8(src: &[u8], offset: usize, line_stride: usize, symmetric: bool) -> Block {
    let mut block: Block = [0; BLOCK_ELEMS];
    let rows = if symmetric { 4 } else { 8 };
    for y in 0..rows {
        let row_off = offset + y * line_stride;
        for x in 0..8 {
            block[y * 8 + x] = src[row_off + x] as i32;
        }
    }
    if symmetric {
        dsp::mirror_bottom_half(&mut block);
    }
    block
}

/// A macroblock's 8 gathered-and-FDCT'd blocks, in the fixed Y0 Y1 U0 V0
/// Y2 Y3 U1 V1 order. Shared by the rate controller's pre-pass and the
/// real bitstream emission so both operate on identical transform-domain
/// values.
pub type MbBlocks = [Block; 8];

/// Gathers one macroblock's 4 luma blocks (pixel domain, no transform),
/// used by the fast-path rate controller's variance promotion order.
pub fn gather_mb_luma_raw(src: &PlaneSource8, mb_x: usize, mb_y: usize) -> [Block; 4] {
    let mut out = [[0i32; BLOCK_ELEMS]; 4];
    for (i, &block_idx) in [0usize, 1, 4, 5].iter().enumerate() {
        let (row, col) = luma_block_position(block_idx, mb_x, mb_y, Component::Luma);
        let (offset, line_stride) = block_dst_offset(src.y_stride, src.interlaced, src.bottom_field, row, col);
        out[i] = gather_block_8(src.y, offset, line_stride, src.symmetric_last_row);
    }
    out
}

/// Gathers one macroblock's 8 blocks from `src` and FDCTs each in place.
pub fn gather_mb_blocks(src: &PlaneSource8, mb_x: usize, mb_y: usize) -> MbBlocks {
    let mut out: MbBlocks = [[0i32; BLOCK_ELEMS]; 8];
    for block_idx in 0..8 {
        let component = BLOCK_COMPONENT[block_idx];
        let (plane, stride): (&[u8], usize) = match block_idx {
            0 | 1 | 4 | 5 => (src.y, src.y_stride),
            2 | 6 => (src.u, src.u_stride),
            _ => (src.v, src.v_stride),
        };
        let (row, col) = luma_block_position(block_idx, mb_x, mb_y, component);
        let (offset, line_stride) = block_dst_offset(stride, src.interlaced, src.bottom_field, row, col);
        let mut block = gather_block_8(plane, offset, line_stride, src.symmetric_last_row);
        dsp::fdct(&mut block);
        out[block_idx] = block;
    }
    out
}

/// 10-bit variant of [`PlaneSource8`].
pub struct PlaneSource16<'a> {
    pub y: &'a [u16],
    pub y_stride: usize,
    pub u: &'a [u16],
    pub u_stride: usize,
    pub v: &'a [u16],
    pub v_stride: usize,
    pub interlaced: bool,
    pub bottom_field: bool,
    pub symmetric_last_row: bool,
}

fn gather_block_16(src: &[u16], offset: usize, line_stride: usize, symmetric: bool) -> Block {
    let mut block: Block = [0; BLOCK_ELEMS];
    let rows = if symmetric { 4 } else { 8 };
    for y in 0..rows {
        let row_off = offset + y * line_stride;
        for x in 0..8 {
            block[y * 8 + x] = src[row_off + x] as i32;
        }
    }
    if symmetric {
        dsp::mirror_bottom_half(&mut block);
    }
    block
}

/// 10-bit variant of [`gather_mb_luma_raw`].
pub fn gather_mb_luma_raw_10(src: &PlaneSource16, mb_x: usize, mb_y: usize) -> [Block; 4] {
    let mut out = [[0i32; BLOCK_ELEMS]; 4];
    for (i, &block_idx) in [0usize, 1, 4, 5].iter().enumerate() {
        let (row, col) = luma_block_position(block_idx, mb_x, mb_y, Component::Luma);
        let (offset, line_stride) = block_dst_offset(src.y_stride, src.interlaced, src.bottom_field, row, col);
        out[i] = gather_block_16(src.y, offset, line_stride, src.symmetric_last_row);
    }
    out
}

/// 10-bit variant of [`gather_mb_blocks`].
pub fn gather_mb_blocks_10(src: &PlaneSource16, mb_x: usize, mb_y: usize) -> MbBlocks {
    let mut out: MbBlocks = [[0i32; BLOCK_ELEMS]; 8];
    for block_idx in 0..8 {
        let component = BLOCK_COMPONENT[block_idx];
        let (plane, stride): (&[u16], usize) = match block_idx {
            0 | 1 | 4 | 5 => (src.y, src.y_stride),
            2 | 6 => (src.u, src.u_stride),
            _ => (src.v, src.v_stride),
        };
        let (row, col) = luma_block_position(block_idx, mb_x, mb_y, component);
        let (offset, line_stride) = block_dst_offset(stride, src.interlaced, src.bottom_field, row, col);
        let mut block = gather_block_16(plane, offset, line_stride, src.symmetric_last_row);
        dsp::fdct(&mut block);
        out[block_idx] = block;
    }
    out
}

/// Encodes one macroblock from its already-gathered-and-FDCT'd blocks:
/// quantizes at `qscale` and writes the bitstream (11-bit qscale, reserved
/// bit, 8 coded blocks). Returns the macroblock's bit-length contribution
/// (excluding anything already in `writer`).
pub fn encode_macroblock(
    writer: &mut BitWriter,
    profile: &Profile,
    qmat: &QMatrixSet,
    scan: &[u8; BLOCK_ELEMS],
    bias: i64,
    predictors: &mut DcPredictors,
    qscale: u16,
    blocks: &MbBlocks,
) -> usize {
    let start_bits = writer.bit_length();
    writer.put_bits(qscale as u32, 11);
    writer.put_bits(0, 1);

    for block_idx in 0..8 {
        let component = BLOCK_COMPONENT[block_idx];
        let coeffs = quantize_block(&blocks[block_idx], profile, qmat, scan, bias, component, qscale);
        let last_dc = predictor_slot(predictors, block_idx);
        block::encode_block(writer, profile, last_dc, &coeffs);
    }
    writer.bit_length() - start_bits
}

fn quantize_block(
    block: &Block,
    profile: &Profile,
    qmat: &QMatrixSet,
    scan: &[u8; BLOCK_ELEMS],
    bias: i64,
    component: Component,
    qscale: u16,
) -> [i32; BLOCK_ELEMS] {
    let qrow = match component {
        Component::Luma => qmat.luma_row(qscale),
        Component::Chroma => qmat.chroma_row(qscale),
    };
    let mut out = [0i32; BLOCK_ELEMS];
    out[0] = quantize_dc(block[0], profile.bit_depth);
    for i in 1..BLOCK_ELEMS {
        let j = scan[i] as usize;
        out[i] = quantize_ac(block[j], qrow[j], bias);
    }
    out
}

/// Builds the scan table and a default bias, a convenience wrapper used by
/// both the encoder and decoder frame orchestrators.
pub fn default_scan() -> [u8; BLOCK_ELEMS] {
    build_scan(&dsp::idct_permutation())
}

pub fn default_bias() -> i64 {
    bias_fixed_point(crate::quant::default_quant_bias())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_positions_cover_distinct_regions() {
        let mut seen = std::collections::HashSet::new();
        for block_idx in 0..8 {
            let component = BLOCK_COMPONENT[block_idx];
            let pos = luma_block_position(block_idx, 0, 0, component);
            seen.insert((block_idx, pos));
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn predictor_slots_group_luma_and_chroma_correctly() {
        let mut preds = DcPredictors::reset(8);
        *predictor_slot(&mut preds, 0) = 10;
        *predictor_slot(&mut preds, 5) = 20;
        assert_eq!(preds.y, 20);
        *predictor_slot(&mut preds, 2) = 30;
        assert_eq!(preds.u, 30);
        *predictor_slot(&mut preds, 7) = 40;
        assert_eq!(preds.v, 40);
    }
}
