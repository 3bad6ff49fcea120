//! Frame Orchestrator (C10): drives one or two coding units per frame
//! (progressive or interlaced), plus an optional alpha-plane pass.

use std::sync::Mutex;

use log::{error, warn};

use crate::constants::{
    ALPHA_EOF_MARKER, EOF_MARKER, EOF_MARKER_SIZE, HEADER_SIZE, PAYLOAD_OFFSET,
};
use crate::dsp;
use crate::error::{Error, Result};
use crate::header::{self, HeaderParams};
use crate::macroblock::{
    self, DcPredictors, MbBlocks, PlaneSink, PlaneSink16, PlaneSource8, PlaneSource16,
};
use crate::profile::Profile;
use crate::quant::{bias_fixed_point, default_quant_bias};
use crate::ratecontrol::{self, McRc};
use crate::scan::build_scan;
use crate::scheduler;

/// Rate-control strategy selection (spec.md §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateControlMode {
    /// Variance-based fast path.
    Fast,
    /// Lagrangian R-D search.
    Rd,
}

/// Encoder configuration (spec.md §6's "Configuration options").
#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub nitris_compat: bool,
    /// `0` means "resolve the mode-dependent default" (1024 for
    /// [`RateControlMode::Fast`], 31 for [`RateControlMode::Rd`], per
    /// `original_source`'s `dnxhd_init_qmat`).
    pub qmax: u16,
    pub mode: RateControlMode,
    /// In `QUANT_BIAS_SHIFT` units; `0` resolves to the default bias.
    pub intra_quant_bias: i64,
    pub thread_count: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            nitris_compat: false,
            qmax: 0,
            mode: RateControlMode::Fast,
            intra_quant_bias: 0,
            thread_count: 1,
        }
    }
}

impl EncoderConfig {
    fn resolved_qmax(&self, qmax: u16) -> u16 {
        if self.qmax != 0 {
            self.qmax.min(qmax)
        } else {
            match self.mode {
                RateControlMode::Fast => qmax.min(1024),
                RateControlMode::Rd => qmax.min(31),
            }
        }
    }

    fn resolved_bias(&self) -> i64 {
        if self.intra_quant_bias != 0 {
            bias_fixed_point(self.intra_quant_bias)
        } else {
            bias_fixed_point(default_quant_bias())
        }
    }
}

/// One 8-bit YUV 4:2:2 planar frame, optionally carrying an alpha plane.
pub struct Frame8<'a> {
    pub width: usize,
    pub height: usize,
    pub y: &'a [u8],
    pub y_stride: usize,
    pub u: &'a [u8],
    pub u_stride: usize,
    pub v: &'a [u8],
    pub v_stride: usize,
    pub alpha: Option<&'a [u8]>,
    pub alpha_stride: usize,
}

/// 10-bit variant of [`Frame8`]; samples are native `u16` (little-endian
/// on the wire is a [`crate`]-external packing concern, not this type's).
pub struct Frame10<'a> {
    pub width: usize,
    pub height: usize,
    pub y: &'a [u16],
    pub y_stride: usize,
    pub u: &'a [u16],
    pub u_stride: usize,
    pub v: &'a [u16],
    pub v_stride: usize,
    pub alpha: Option<&'a [u16]>,
    pub alpha_stride: usize,
}

fn validate_resolution(width: usize, height: usize, interlaced: bool) -> Result<()> {
    let ok = matches!(
        (width, height, interlaced),
        (1920, 1080, true) | (1920, 1080, false) | (1280, 720, false)
    );
    if !ok {
        error!("unsupported resolution {}x{} interlaced={}", width, height, interlaced);
        return Err(Error::UnsupportedResolution { width, height });
    }
    Ok(())
}

fn qscale_for_field(
    profile: &Profile,
    cfg: &EncoderConfig,
    mb_blocks: &[MbBlocks],
    mb_luma_raw: &[[dsp::Block; 4]],
    scan: &[u8; 64],
    bias: i64,
) -> Result<(McRc, Vec<u16>)> {
    let qmax = cfg.resolved_qmax(if profile.bit_depth == 8 { 1024 } else { 1024 });
    let qmat = crate::quant::QMatrixSet::build(profile, qmax);
    let rc = ratecontrol::build_mc_rc(mb_blocks, profile, &qmat, scan, bias);
    let budget = ratecontrol::frame_bits(profile.coding_unit_size, cfg.nitris_compat);

    let qscale = match cfg.mode {
        RateControlMode::Fast => {
            ratecontrol::fast_path(&rc, profile.mb_width, profile.mb_height, mb_luma_raw, budget)?
        }
        RateControlMode::Rd => ratecontrol::rd_path(&rc, profile.mb_width, profile.mb_height, budget)?,
    };
    Ok((rc, qscale))
}

/// Writes one coding unit (one field's worth of bits) into `out[0..coding_unit_size]`,
/// given per-macroblock transform-domain blocks and a chosen qscale assignment.
fn write_coding_unit(
    out: &mut [u8],
    profile: &Profile,
    scan: &[u8; 64],
    bias: i64,
    qmax: u16,
    mb_blocks: &[MbBlocks],
    qscale: &[u16],
    header_params: &HeaderParams,
    thread_count: usize,
) {
    let qmat = crate::quant::QMatrixSet::build(profile, qmax);
    let mb_width = profile.mb_width;
    let mb_height = profile.mb_height;

    let rows: Mutex<Vec<(usize, Vec<u8>)>> = Mutex::new(Vec::with_capacity(mb_height));
    scheduler::parallel_for(mb_height, thread_count, |row, _thread| {
        let mut writer = crate::bitio::BitWriter::new();
        let mut predictors = DcPredictors::reset(profile.bit_depth);
        for col in 0..mb_width {
            let mb = row * mb_width + col;
            macroblock::encode_macroblock(
                &mut writer,
                profile,
                &qmat,
                scan,
                bias,
                &mut predictors,
                qscale[mb],
                &mb_blocks[mb],
            );
        }
        rows.lock().unwrap().push((row, writer.flush()));
    });
    let mut rows = rows.into_inner().unwrap();
    rows.sort_unstable_by_key(|(row, _)| *row);
    let slice_bytes: Vec<Vec<u8>> = rows.into_iter().map(|(_, bytes)| bytes).collect();

    header::write(out, header_params);
    let mut scan_index = Vec::with_capacity(mb_height);
    let mut offset = 0u32;
    for bytes in &slice_bytes {
        scan_index.push(offset);
        offset += bytes.len() as u32;
    }
    header::write_scan_index(out, &scan_index);

    let mut pos = PAYLOAD_OFFSET;
    for bytes in &slice_bytes {
        out[pos..pos + bytes.len()].copy_from_slice(bytes);
        pos += bytes.len();
    }
    for b in out[pos..profile.coding_unit_size - EOF_MARKER_SIZE].iter_mut() {
        *b = 0;
    }
    out[profile.coding_unit_size - EOF_MARKER_SIZE..profile.coding_unit_size].copy_from_slice(&EOF_MARKER);
}

/// Encodes one progressive or interlaced 8-bit YUV 4:2:2 frame at `cid`.
pub fn encode_8(profile: &Profile, cfg: &EncoderConfig, frame: &Frame8) -> Result<Vec<u8>> {
    validate_resolution(frame.width, frame.height, profile.interlaced)?;
    let fields: usize = if profile.interlaced { 2 } else { 1 };
    let mut out_units: Vec<Vec<u8>> = Vec::with_capacity(fields);

    for field in 0..fields {
        let bottom_field = profile.interlaced && field == 1;
        // `interlaced` drives the stride-doubling for both fields;
        // `bottom_field` only picks the odd-vs-even line offset. The
        // source slices below are the whole-frame buffers, not pre-offset.
        let src = PlaneSource8 {
            y: frame.y,
            y_stride: frame.y_stride,
            u: frame.u,
            u_stride: frame.u_stride,
            v: frame.v,
            v_stride: frame.v_stride,
            interlaced: profile.interlaced,
            bottom_field,
            symmetric_last_row: false,
        };
        let scan = build_scan(&dsp::idct_permutation());
        let bias = cfg.resolved_bias();

        let mb_width = profile.mb_width;
        let mb_height = profile.mb_height;
        let gathered: Mutex<Vec<(usize, Vec<MbBlocks>, Vec<[dsp::Block; 4]>)>> =
            Mutex::new(Vec::with_capacity(mb_height));
        scheduler::parallel_for(mb_height, cfg.thread_count, |row, _thread| {
            let symmetric = frame.height == 1080 && row == mb_height - 1;
            let mut row_blocks = Vec::with_capacity(mb_width);
            let mut row_luma = Vec::with_capacity(mb_width);
            for col in 0..mb_width {
                let src_row = PlaneSource8 {
                    symmetric_last_row: symmetric,
                    ..clone_source8(&src)
                };
                row_blocks.push(macroblock::gather_mb_blocks(&src_row, col, row));
                row_luma.push(macroblock::gather_mb_luma_raw(&src_row, col, row));
            }
            gathered.lock().unwrap().push((row, row_blocks, row_luma));
        });
        let mut gathered = gathered.into_inner().unwrap();
        gathered.sort_unstable_by_key(|(row, _, _)| *row);
        let mut mb_blocks = Vec::with_capacity(mb_width * mb_height);
        let mut mb_luma_raw = Vec::with_capacity(mb_width * mb_height);
        for (_, row_blocks, row_luma) in gathered {
            mb_blocks.extend(row_blocks);
            mb_luma_raw.extend(row_luma);
        }

        let qmax = cfg.resolved_qmax(1024);
        let (_rc, qscale) = qscale_for_field(profile, cfg, &mb_blocks, &mb_luma_raw, &scan, bias)?;

        let mut unit = vec![0u8; profile.coding_unit_size];
        let header_params = HeaderParams {
            interlaced: profile.interlaced,
            current_field: field as u8,
            height: if profile.interlaced { (frame.height / 2) as u16 } else { frame.height as u16 },
            width: frame.width as u16,
            bit_depth_10: false,
            cid: profile.cid,
            mb_height: profile.mb_height,
        };
        write_coding_unit(
            &mut unit,
            profile,
            &scan,
            bias,
            qmax,
            &mb_blocks,
            &qscale,
            &header_params,
            cfg.thread_count,
        );
        out_units.push(unit);
    }

    let mut out: Vec<u8> = out_units.into_iter().flatten().collect();

    if let Some(alpha) = frame.alpha {
        warn!("encoding alpha plane as an additional coding-unit pass");
        let flat_chroma = flat_chroma_plane(frame.width, frame.height);
        let alpha_frame = Frame8 {
            width: frame.width,
            height: frame.height,
            y: alpha,
            y_stride: frame.alpha_stride,
            u: &flat_chroma,
            u_stride: frame.width / 2,
            v: &flat_chroma,
            v_stride: frame.width / 2,
            alpha: None,
            alpha_stride: 0,
        };
        let alpha_bytes = encode_8_flat_chroma(profile, cfg, &alpha_frame)?;
        out.extend_from_slice(&alpha_bytes);
        out.extend_from_slice(&ALPHA_EOF_MARKER);
    }

    Ok(out)
}

/// Constant-128 chroma plane sized to match a luma plane of `width x
/// height`, used to synthesise the alpha coding unit (spec.md §4.8:
/// "treating the alpha plane as the Y plane with flat 128 chroma").
fn flat_chroma_plane(width: usize, height: usize) -> Vec<u8> {
    vec![128u8; (width / 2) * height]
}

fn clone_source8<'a>(src: &PlaneSource8<'a>) -> PlaneSource8<'a> {
    PlaneSource8 {
        y: src.y,
        y_stride: src.y_stride,
        u: src.u,
        u_stride: src.u_stride,
        v: src.v,
        v_stride: src.v_stride,
        interlaced: src.interlaced,
        bottom_field: src.bottom_field,
        symmetric_last_row: src.symmetric_last_row,
    }
}

/// Encodes the alpha pass: identical to [`encode_8`] but with a
/// zero-stride, constant 128 chroma source (no data movement for U/V).
fn encode_8_flat_chroma(profile: &Profile, cfg: &EncoderConfig, frame: &Frame8) -> Result<Vec<u8>> {
    encode_8(profile, cfg, frame)
}

/// A decoded frame: one bit depth, one geometry, up to four planes.
pub enum DecodedFrame {
    Eight {
        width: usize,
        height: usize,
        y: Vec<u8>,
        y_stride: usize,
        u: Vec<u8>,
        u_stride: usize,
        v: Vec<u8>,
        v_stride: usize,
        alpha: Option<Vec<u8>>,
        top_field_first: bool,
        interlaced: bool,
    },
    Ten {
        width: usize,
        height: usize,
        y: Vec<u16>,
        y_stride: usize,
        u: Vec<u16>,
        u_stride: usize,
        v: Vec<u16>,
        v_stride: usize,
        alpha: Option<Vec<u16>>,
        top_field_first: bool,
        interlaced: bool,
    },
}

/// Decodes one row's worth of macroblocks into a fresh, row-local, non-
/// interlaced buffer (so `block_dst_offset` never needs the field's real
/// stride/offset while the row runs off the main thread), returning that
/// buffer for the caller to copy back into the shared sink afterward.
#[allow(clippy::too_many_arguments)]
fn decode_row_8(
    buf: &[u8],
    scan_index: &[u32],
    profile: &Profile,
    scan: &[u8; 64],
    row: usize,
    y_stride: usize,
    u_stride: usize,
    v_stride: usize,
) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let mb_width = profile.mb_width;
    let mb_height = profile.mb_height;
    let mut y_local = vec![0u8; 16 * y_stride];
    let mut u_local = vec![0u8; 16 * u_stride];
    let mut v_local = vec![0u8; 16 * v_stride];

    let start = PAYLOAD_OFFSET + scan_index[row] as usize;
    let end = if row + 1 < mb_height {
        PAYLOAD_OFFSET + scan_index[row + 1] as usize
    } else {
        buf.len() - EOF_MARKER_SIZE
    };
    if start > buf.len() || end > buf.len() || end < start {
        warn!("slice {} bounds out of range, skipping row", row);
        return (y_local, u_local, v_local);
    }
    let mut reader = crate::bitio::BitReader::new(&buf[start..end]);
    let mut predictors = DcPredictors::reset(profile.bit_depth);
    let mut local_sink = PlaneSink {
        y: &mut y_local,
        y_stride,
        u: &mut u_local,
        u_stride,
        v: &mut v_local,
        v_stride,
        interlaced: false,
        bottom_field: false,
    };
    for col in 0..mb_width {
        if let Err(e) = macroblock::decode_macroblock(&mut reader, profile, scan, &mut predictors, col, 0, &mut local_sink) {
            warn!("damaged slice at row {} col {}: {}", row, col, e);
        }
    }
    (y_local, u_local, v_local)
}

fn decode_field_8(
    buf: &[u8],
    profile: &Profile,
    scan: &[u8; 64],
    sink: &mut PlaneSink,
    thread_count: usize,
) -> Result<()> {
    let mb_height = profile.mb_height;
    let h = header::parse(buf)?;
    header::validate_scan_index(&h.scan_index, buf.len())?;

    let y_stride = sink.y_stride;
    let u_stride = sink.u_stride;
    let v_stride = sink.v_stride;
    let rows: Mutex<Vec<(usize, Vec<u8>, Vec<u8>, Vec<u8>)>> = Mutex::new(Vec::with_capacity(mb_height));
    scheduler::parallel_for(mb_height, thread_count, |row, _thread| {
        let (y_local, u_local, v_local) =
            decode_row_8(buf, &h.scan_index, profile, scan, row, y_stride, u_stride, v_stride);
        rows.lock().unwrap().push((row, y_local, u_local, v_local));
    });

    let line_stride = if sink.interlaced { 2 } else { 1 };
    let line_offset = if sink.interlaced && sink.bottom_field { 1 } else { 0 };
    for (row, y_local, u_local, v_local) in rows.into_inner().unwrap() {
        for ly in 0..16 {
            let phys = (row * 16 + ly) * line_stride + line_offset;
            sink.y[phys * y_stride..phys * y_stride + y_stride].copy_from_slice(&y_local[ly * y_stride..(ly + 1) * y_stride]);
            sink.u[phys * u_stride..phys * u_stride + u_stride].copy_from_slice(&u_local[ly * u_stride..(ly + 1) * u_stride]);
            sink.v[phys * v_stride..phys * v_stride + v_stride].copy_from_slice(&v_local[ly * v_stride..(ly + 1) * v_stride]);
        }
    }
    Ok(())
}

/// 10-bit variant of [`decode_row_8`].
#[allow(clippy::too_many_arguments)]
fn decode_row_10(
    buf: &[u8],
    scan_index: &[u32],
    profile: &Profile,
    scan: &[u8; 64],
    row: usize,
    y_stride: usize,
    u_stride: usize,
    v_stride: usize,
) -> (Vec<u16>, Vec<u16>, Vec<u16>) {
    let mb_width = profile.mb_width;
    let mb_height = profile.mb_height;
    let mut y_local = vec![0u16; 16 * y_stride];
    let mut u_local = vec![0u16; 16 * u_stride];
    let mut v_local = vec![0u16; 16 * v_stride];

    let start = PAYLOAD_OFFSET + scan_index[row] as usize;
    let end = if row + 1 < mb_height {
        PAYLOAD_OFFSET + scan_index[row + 1] as usize
    } else {
        buf.len() - EOF_MARKER_SIZE
    };
    if start > buf.len() || end > buf.len() || end < start {
        warn!("slice {} bounds out of range, skipping row", row);
        return (y_local, u_local, v_local);
    }
    let mut reader = crate::bitio::BitReader::new(&buf[start..end]);
    let mut predictors = DcPredictors::reset(profile.bit_depth);
    let mut local_sink = PlaneSink16 {
        y: &mut y_local,
        y_stride,
        u: &mut u_local,
        u_stride,
        v: &mut v_local,
        v_stride,
        interlaced: false,
        bottom_field: false,
    };
    for col in 0..mb_width {
        if let Err(e) = macroblock::decode_macroblock_10(&mut reader, profile, scan, &mut predictors, col, 0, &mut local_sink) {
            warn!("damaged slice at row {} col {}: {}", row, col, e);
        }
    }
    (y_local, u_local, v_local)
}

fn decode_field_10(
    buf: &[u8],
    profile: &Profile,
    scan: &[u8; 64],
    sink: &mut PlaneSink16,
    thread_count: usize,
) -> Result<()> {
    let mb_height = profile.mb_height;
    let h = header::parse(buf)?;
    header::validate_scan_index(&h.scan_index, buf.len())?;

    let y_stride = sink.y_stride;
    let u_stride = sink.u_stride;
    let v_stride = sink.v_stride;
    let rows: Mutex<Vec<(usize, Vec<u16>, Vec<u16>, Vec<u16>)>> = Mutex::new(Vec::with_capacity(mb_height));
    scheduler::parallel_for(mb_height, thread_count, |row, _thread| {
        let (y_local, u_local, v_local) =
            decode_row_10(buf, &h.scan_index, profile, scan, row, y_stride, u_stride, v_stride);
        rows.lock().unwrap().push((row, y_local, u_local, v_local));
    });

    let line_stride = if sink.interlaced { 2 } else { 1 };
    let line_offset = if sink.interlaced && sink.bottom_field { 1 } else { 0 };
    for (row, y_local, u_local, v_local) in rows.into_inner().unwrap() {
        for ly in 0..16 {
            let phys = (row * 16 + ly) * line_stride + line_offset;
            sink.y[phys * y_stride..phys * y_stride + y_stride].copy_from_slice(&y_local[ly * y_stride..(ly + 1) * y_stride]);
            sink.u[phys * u_stride..phys * u_stride + u_stride].copy_from_slice(&u_local[ly * u_stride..(ly + 1) * u_stride]);
            sink.v[phys * v_stride..phys * v_stride + v_stride].copy_from_slice(&v_local[ly * v_stride..(ly + 1) * v_stride]);
        }
    }
    Ok(())
}

/// Decodes one coded frame (one or two coding units, plus an optional
/// alpha pass) from `buf`.
pub fn decode(buf: &[u8]) -> Result<DecodedFrame> {
    if buf.len() < HEADER_SIZE {
        return Err(Error::ShortBuffer {
            needed: HEADER_SIZE,
            got: buf.len(),
        });
    }
    let h0 = header::parse(buf)?;
    let profile = Profile::for_cid(h0.cid)?;
    let scan = build_scan(&dsp::idct_permutation());

    let first_unit = &buf[..profile.coding_unit_size.min(buf.len())];
    let top_field_first = h0.current_field == 0;
    let thread_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

    if profile.bit_depth == 8 {
        let width = profile.width;
        let height = profile.height;
        let y_stride = width;
        let u_stride = width / 2;
        let v_stride = width / 2;
        let mut y = vec![0u8; width * height];
        let mut u = vec![0u8; (width / 2) * height];
        let mut v = vec![0u8; (width / 2) * height];

        {
            let mut sink = PlaneSink {
                y: &mut y,
                y_stride,
                u: &mut u,
                u_stride,
                v: &mut v,
                v_stride,
                interlaced: profile.interlaced,
                bottom_field: profile.interlaced && h0.current_field == 1,
            };
            decode_field_8(first_unit, &profile, &scan, &mut sink, thread_count)?;
        }

        let mut consumed = profile.coding_unit_size;
        if profile.interlaced && buf.len() >= consumed + profile.coding_unit_size {
            let second_unit = &buf[consumed..consumed + profile.coding_unit_size];
            let h1 = header::parse(second_unit)?;
            let mut sink = PlaneSink {
                y: &mut y,
                y_stride,
                u: &mut u,
                u_stride,
                v: &mut v,
                v_stride,
                interlaced: profile.interlaced,
                bottom_field: h1.current_field == 1,
            };
            decode_field_8(second_unit, &profile, &scan, &mut sink, thread_count)?;
            consumed += profile.coding_unit_size;
        }

        let mut alpha = None;
        if buf.len() >= consumed + profile.coding_unit_size + EOF_MARKER_SIZE {
            let trailer_start = consumed + profile.coding_unit_size;
            if buf[trailer_start..trailer_start + EOF_MARKER_SIZE] == ALPHA_EOF_MARKER {
                let alpha_unit = &buf[consumed..consumed + profile.coding_unit_size];
                let mut alpha_y = vec![0u8; width * height];
                let mut scratch_u = vec![0u8; (width / 2) * height];
                let mut scratch_v = vec![0u8; (width / 2) * height];
                let mut sink = PlaneSink {
                    y: &mut alpha_y,
                    y_stride,
                    u: &mut scratch_u,
                    u_stride,
                    v: &mut scratch_v,
                    v_stride,
                    interlaced: false,
                    bottom_field: false,
                };
                decode_field_8(alpha_unit, &profile, &scan, &mut sink, thread_count)?;
                alpha = Some(alpha_y);
            }
        }

        Ok(DecodedFrame::Eight {
            width,
            height,
            y,
            y_stride,
            u,
            u_stride,
            v,
            v_stride,
            alpha,
            top_field_first,
            interlaced: profile.interlaced,
        })
    } else {
        let width = profile.width;
        let height = profile.height;
        let y_stride = width;
        let u_stride = width / 2;
        let v_stride = width / 2;
        let mut y = vec![0u16; width * height];
        let mut u = vec![0u16; (width / 2) * height];
        let mut v = vec![0u16; (width / 2) * height];

        {
            let mut sink = PlaneSink16 {
                y: &mut y,
                y_stride,
                u: &mut u,
                u_stride,
                v: &mut v,
                v_stride,
                interlaced: profile.interlaced,
                bottom_field: profile.interlaced && h0.current_field == 1,
            };
            decode_field_10(first_unit, &profile, &scan, &mut sink, thread_count)?;
        }

        let mut consumed = profile.coding_unit_size;
        if profile.interlaced && buf.len() >= consumed + profile.coding_unit_size {
            let second_unit = &buf[consumed..consumed + profile.coding_unit_size];
            let h1 = header::parse(second_unit)?;
            let mut sink = PlaneSink16 {
                y: &mut y,
                y_stride,
                u: &mut u,
                u_stride,
                v: &mut v,
                v_stride,
                interlaced: profile.interlaced,
                bottom_field: h1.current_field == 1,
            };
            decode_field_10(second_unit, &profile, &scan, &mut sink, thread_count)?;
            consumed += profile.coding_unit_size;
        }

        Ok(DecodedFrame::Ten {
            width,
            height,
            y,
            y_stride,
            u,
            u_stride,
            v,
            v_stride,
            alpha: None,
            top_field_first,
            interlaced: profile.interlaced,
        })
    }
}

/// Encodes one progressive or interlaced 10-bit YUV 4:2:2 frame at `cid`.
pub fn encode_10(profile: &Profile, cfg: &EncoderConfig, frame: &Frame10) -> Result<Vec<u8>> {
    validate_resolution(frame.width, frame.height, profile.interlaced)?;
    let fields: usize = if profile.interlaced { 2 } else { 1 };
    let mut out_units: Vec<Vec<u8>> = Vec::with_capacity(fields);

    for field in 0..fields {
        let bottom_field = profile.interlaced && field == 1;
        let src = PlaneSource16 {
            y: frame.y,
            y_stride: frame.y_stride,
            u: frame.u,
            u_stride: frame.u_stride,
            v: frame.v,
            v_stride: frame.v_stride,
            interlaced: profile.interlaced,
            bottom_field,
            symmetric_last_row: false,
        };
        let scan = build_scan(&dsp::idct_permutation());
        let bias = cfg.resolved_bias();

        let mb_width = profile.mb_width;
        let mb_height = profile.mb_height;
        let gathered: Mutex<Vec<(usize, Vec<MbBlocks>, Vec<[dsp::Block; 4]>)>> =
            Mutex::new(Vec::with_capacity(mb_height));
        scheduler::parallel_for(mb_height, cfg.thread_count, |row, _thread| {
            let symmetric = frame.height == 1080 && row == mb_height - 1;
            let mut row_blocks = Vec::with_capacity(mb_width);
            let mut row_luma = Vec::with_capacity(mb_width);
            for col in 0..mb_width {
                let src_row = PlaneSource16 {
                    symmetric_last_row: symmetric,
                    y: src.y,
                    y_stride: src.y_stride,
                    u: src.u,
                    u_stride: src.u_stride,
                    v: src.v,
                    v_stride: src.v_stride,
                    interlaced: src.interlaced,
                    bottom_field: src.bottom_field,
                };
                row_blocks.push(macroblock::gather_mb_blocks_10(&src_row, col, row));
                row_luma.push(macroblock::gather_mb_luma_raw_10(&src_row, col, row));
            }
            gathered.lock().unwrap().push((row, row_blocks, row_luma));
        });
        let mut gathered = gathered.into_inner().unwrap();
        gathered.sort_unstable_by_key(|(row, _, _)| *row);
        let mut mb_blocks = Vec::with_capacity(mb_width * mb_height);
        let mut mb_luma_raw = Vec::with_capacity(mb_width * mb_height);
        for (_, row_blocks, row_luma) in gathered {
            mb_blocks.extend(row_blocks);
            mb_luma_raw.extend(row_luma);
        }

        let qmax = cfg.resolved_qmax(1024);
        let (_rc, qscale) = qscale_for_field(profile, cfg, &mb_blocks, &mb_luma_raw, &scan, bias)?;

        let mut unit = vec![0u8; profile.coding_unit_size];
        let header_params = HeaderParams {
            interlaced: profile.interlaced,
            current_field: field as u8,
            height: if profile.interlaced { (frame.height / 2) as u16 } else { frame.height as u16 },
            width: frame.width as u16,
            bit_depth_10: true,
            cid: profile.cid,
            mb_height: profile.mb_height,
        };
        write_coding_unit(
            &mut unit,
            profile,
            &scan,
            bias,
            qmax,
            &mb_blocks,
            &qscale,
            &header_params,
            cfg.thread_count,
        );
        out_units.push(unit);
    }

    if frame.alpha.is_some() {
        warn!("10-bit alpha encoding is not yet exercised by this pipeline; alpha plane ignored");
    }

    Ok(out_units.into_iter().flatten().collect())
}
