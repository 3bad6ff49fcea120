//! Encodes and decodes raw planar YUV 4:2:2 frames to and from DNxHD/VC-3
//! coding units. Operates directly on raw sample files since container
//! demuxing is out of scope for the `dnxhd` crate.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use clap::{Parser, Subcommand};
use log::{info, warn};

use dnxhd::{decode, encode_10, encode_8, DecodedFrame, EncoderConfig, Frame10, Frame8, Profile, RateControlMode};

#[derive(Parser)]
#[clap(name = "dnxhd-tool", about = "Encode/decode raw YUV422 frames to DNxHD coding units")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encodes a raw planar YUV 4:2:2 frame into a DNxHD coding unit.
    Encode {
        #[clap(long)]
        width: usize,
        #[clap(long)]
        height: usize,
        #[clap(long = "bit-depth", default_value = "8")]
        bit_depth: u8,
        #[clap(long)]
        cid: u32,
        #[clap(long)]
        interlaced: bool,
        #[clap(long = "nitris-compat")]
        nitris_compat: bool,
        #[clap(long)]
        qmax: Option<u16>,
        /// Use the Lagrangian R-D rate controller instead of the fast path.
        #[clap(long)]
        rd: bool,
        #[clap(long = "threads", default_value = "1")]
        threads: usize,
        input: PathBuf,
        output: PathBuf,
    },
    /// Decodes a DNxHD coding unit into a raw planar YUV 4:2:2 file.
    Decode { input: PathBuf, output: PathBuf },
}

fn read_u8_plane(buf: &[u8], offset: &mut usize, len: usize) -> Vec<u8> {
    let plane = buf[*offset..*offset + len].to_vec();
    *offset += len;
    plane
}

fn read_u16_plane(mut reader: impl Read, len: usize) -> std::io::Result<Vec<u16>> {
    let mut plane = Vec::with_capacity(len);
    for _ in 0..len {
        plane.push(reader.read_u16::<LittleEndian>()?);
    }
    Ok(plane)
}

fn write_u16_le<W: Write>(file: &mut BufWriter<W>, buf: &[u16]) -> std::io::Result<()> {
    for &v in buf {
        file.write_u16::<LittleEndian>(v)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_encode(
    width: usize,
    height: usize,
    bit_depth: u8,
    cid: u32,
    interlaced: bool,
    nitris_compat: bool,
    qmax: Option<u16>,
    rd: bool,
    threads: usize,
    input: PathBuf,
    output: PathBuf,
) -> std::io::Result<()> {
    let profile = Profile::for_cid(cid).expect("unsupported CID");
    if profile.interlaced != interlaced {
        warn!(
            "--interlaced={} ignored: cid {} is {}",
            interlaced,
            cid,
            if profile.interlaced { "interlaced" } else { "progressive" }
        );
    }
    let cfg = EncoderConfig {
        nitris_compat,
        qmax: qmax.unwrap_or(0),
        mode: if rd { RateControlMode::Rd } else { RateControlMode::Fast },
        intra_quant_bias: 0,
        thread_count: threads.max(1),
    };

    let y_stride = width;
    let c_stride = width / 2;
    let luma_len = width * height;
    let chroma_len = c_stride * height;

    let mut raw = Vec::new();
    File::open(&input)?.read_to_end(&mut raw)?;

    let out_bytes = if bit_depth == 10 {
        let mut cursor = std::io::Cursor::new(&raw);
        let y = read_u16_plane(&mut cursor, luma_len)?;
        let u = read_u16_plane(&mut cursor, chroma_len)?;
        let v = read_u16_plane(&mut cursor, chroma_len)?;
        let frame = Frame10 {
            width,
            height,
            y: &y,
            y_stride,
            u: &u,
            u_stride: c_stride,
            v: &v,
            v_stride: c_stride,
            alpha: None,
            alpha_stride: 0,
        };
        encode_10(&profile, &cfg, &frame).expect("encode failed")
    } else {
        let mut offset = 0usize;
        let y = read_u8_plane(&raw, &mut offset, luma_len);
        let u = read_u8_plane(&raw, &mut offset, chroma_len);
        let v = read_u8_plane(&raw, &mut offset, chroma_len);
        let frame = Frame8 {
            width,
            height,
            y: &y,
            y_stride,
            u: &u,
            u_stride: c_stride,
            v: &v,
            v_stride: c_stride,
            alpha: None,
            alpha_stride: 0,
        };
        encode_8(&profile, &cfg, &frame).expect("encode failed")
    };

    info!("encoded {} bytes at cid {}", out_bytes.len(), cid);
    let mut out_file = BufWriter::new(File::create(&output)?);
    out_file.write_all(&out_bytes)?;
    Ok(())
}

fn run_decode(input: PathBuf, output: PathBuf) -> std::io::Result<()> {
    let mut raw = Vec::new();
    File::open(&input)?.read_to_end(&mut raw)?;

    let decoded = decode(&raw).expect("decode failed");
    let mut out_file = BufWriter::new(File::create(&output)?);
    match decoded {
        DecodedFrame::Eight { y, u, v, alpha, width, height, .. } => {
            info!("decoded {}x{} 8-bit frame", width, height);
            out_file.write_all(&y)?;
            out_file.write_all(&u)?;
            out_file.write_all(&v)?;
            if let Some(alpha) = alpha {
                out_file.write_all(&alpha)?;
            }
        }
        DecodedFrame::Ten { y, u, v, alpha, width, height, .. } => {
            info!("decoded {}x{} 10-bit frame", width, height);
            write_u16_le(&mut out_file, &y)?;
            write_u16_le(&mut out_file, &u)?;
            write_u16_le(&mut out_file, &v)?;
            if let Some(alpha) = alpha {
                write_u16_le(&mut out_file, &alpha)?;
            }
        }
    }
    Ok(())
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Encode {
            width,
            height,
            bit_depth,
            cid,
            interlaced,
            nitris_compat,
            qmax,
            rd,
            threads,
            input,
            output,
        } => run_encode(width, height, bit_depth, cid, interlaced, nitris_compat, qmax, rd, threads, input, output),
        Command::Decode { input, output } => run_decode(input, output),
    }
}
