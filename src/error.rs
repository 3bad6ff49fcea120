use thiserror::Error;

/// General codec errors, covering both the encoder and the decoder.
#[derive(Debug, Error)]
pub enum Error {
    /// CID not present in the profile catalog.
    #[error("unsupported CID: {0}")]
    UnsupportedCID(u32),
    /// Buffer too small to hold a coding unit, header, or slice.
    #[error("short buffer: need at least {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },
    /// Header prefix or fixed fields did not match the expected layout.
    #[error("header mismatch: {0}")]
    HeaderMismatch(String),
    /// `mb_height` exceeded the 68-row limit.
    #[error("mb_height {0} out of range (max 68)")]
    MBHeightOutOfRange(usize),
    /// A slice scan index pointed outside the coding unit.
    #[error("scan index out of range: offset {offset} + 0x280 exceeds buffer of {len} bytes")]
    ScanIndexOutOfRange { offset: usize, len: usize },
    /// A slice could not be fully decoded; the affected macroblock is left
    /// zeroed and decoding continues with the next slice.
    #[error("damaged slice: mb ({mb_x}, {mb_y}) component {component}")]
    DamagedSlice {
        mb_x: usize,
        mb_y: usize,
        component: usize,
    },
    /// Input pixel format is not YUV 4:2:2 planar 8/10-bit.
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),
    /// Resolution is neither 1920x1080 nor 1280x720.
    #[error("unsupported resolution: {width}x{height}")]
    UnsupportedResolution { width: usize, height: usize },
    /// No qscale assignment fit the frame's bit budget even at `qmax`.
    #[error("rate control infeasible at qmax={qmax}: needed {needed_bits} bits, budget {budget_bits}")]
    RateControlInfeasible {
        qmax: u16,
        needed_bits: u64,
        budget_bits: u64,
    },
    /// Caller-provided output buffer was smaller than `coding_unit_size`.
    #[error("output buffer too small: need {needed} bytes, got {got}")]
    OutputBufferTooSmall { needed: usize, got: usize },
    /// Propagated I/O error, only reachable from the CLI/bench binaries.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialised `Result` type for codec operations.
pub type Result<T> = ::std::result::Result<T, Error>;
