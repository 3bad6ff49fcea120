//! Encodes and decodes a synthetic in-memory 1280x720 frame in a loop and
//! reports throughput. No container dependency: the frame is generated
//! directly rather than read from a media file.

use std::time::Instant;

use dnxhd::{decode, encode_8, EncoderConfig, Frame8, Profile, RateControlMode};

const WIDTH: usize = 1280;
const HEIGHT: usize = 720;
const CID: u32 = 1250;
const ITERATIONS: usize = 50;

fn synthetic_plane(width: usize, height: usize, seed: u8) -> Vec<u8> {
    let mut plane = vec![0u8; width * height];
    for (i, px) in plane.iter_mut().enumerate() {
        *px = ((i as u32).wrapping_mul(2654435761).wrapping_add(seed as u32) >> 16) as u8;
    }
    plane
}

fn main() {
    let profile = Profile::for_cid(CID).expect("unsupported CID");
    let cfg = EncoderConfig {
        mode: RateControlMode::Fast,
        ..EncoderConfig::default()
    };

    let y = synthetic_plane(WIDTH, HEIGHT, 1);
    let u = synthetic_plane(WIDTH / 2, HEIGHT, 2);
    let v = synthetic_plane(WIDTH / 2, HEIGHT, 3);
    let frame = Frame8 {
        width: WIDTH,
        height: HEIGHT,
        y: &y,
        y_stride: WIDTH,
        u: &u,
        u_stride: WIDTH / 2,
        v: &v,
        v_stride: WIDTH / 2,
        alpha: None,
        alpha_stride: 0,
    };

    let start = Instant::now();
    let mut encoded = Vec::new();
    for _ in 0..ITERATIONS {
        encoded = encode_8(&profile, &cfg, &frame).expect("encode failed");
    }
    let encode_elapsed = start.elapsed();

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        decode(&encoded).expect("decode failed");
    }
    let decode_elapsed = start.elapsed();

    let frame_bytes = (WIDTH * HEIGHT * 2) as f64;
    let encode_fps = ITERATIONS as f64 / encode_elapsed.as_secs_f64();
    let decode_fps = ITERATIONS as f64 / decode_elapsed.as_secs_f64();
    println!(
        "encode: {:.2} fps ({:.2} MB/s), decode: {:.2} fps ({:.2} MB/s), coded size {} bytes",
        encode_fps,
        encode_fps * frame_bytes / 1_000_000.0,
        decode_fps,
        decode_fps * frame_bytes / 1_000_000.0,
        encoded.len(),
    );
}
