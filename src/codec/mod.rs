/*!
The LZO1X-1 streaming codec.

A compressed stream is a sequence of command pairs, each a history copy
followed by a literal copy, terminated by the three-byte end-of-stream
marker `0x11 0x00 0x00`. The pure byte-level codec lives in [`cmd`]; the
two resumable state machines that speak it are [`compress::StreamCompressor`]
and [`decompress::StreamDecompressor`].
*/

use std::collections::TryReserveError;

pub mod cmd;
pub mod compress;
pub mod decompress;
pub mod table;

/// Maximum lookback distance any command form can express.
pub(crate) const MAX_LOOKBACK: u32 = 0xBFFF; // 49151

/// Bytes of history either codec must be able to address.
pub(crate) const WINDOW_SIZE: usize = MAX_LOOKBACK as usize;

/// A match is only worth taking once this many bytes agree; it is also the
/// width of the fingerprint read.
pub(crate) const MIN_MATCH: usize = 4;

/// Largest lookback reachable by the two-byte command forms.
pub(crate) const SHORT_MAX_LOOKBACK: u32 = 0x0800; // 2048

/// Largest lookback reachable by form E; form F covers the rest and its
/// zero-distance point doubles as the end-of-stream marker.
pub(crate) const MID_MAX_LOOKBACK: u32 = 0x4000; // 16384

/// First literals of 4..=238 bytes encode directly as `length + 17`.
pub(crate) const FIRST_LITERAL_DIRECT_MAX: u32 = 238;

/// Result of a `process` call that made progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The stream is still open; call again with more input or output room.
    Ok,
    /// The end-of-stream marker has been fully processed and all output
    /// handed to the caller.
    End,
}

/// Errors the compressor can report. All of them are fatal: the codec
/// poisons itself and repeats the error on any further call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressError {
    #[error("allocation failed")]
    OutOfMemory,
    /// Reserved: the incremental encoder always falls back to literal runs.
    #[error("input is not compressible")]
    NotCompressible,
    #[error("output buffer too small for the compressed stream")]
    OutputOverrun,
    #[error("encoder produced an invalid command: {reason}")]
    EncoderFault { reason: &'static str },
}

/// Errors the decompressor can report; each maps to one way a stream can be
/// malformed or mis-driven. All of them are fatal to the stream.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressError {
    #[error("allocation failed")]
    OutOfMemory,
    #[error("command at input byte {position} runs past the end of the stream")]
    InputOverrun { position: u64 },
    #[error("output buffer too small for the decompressed stream")]
    OutputOverrun,
    #[error("copy reaches {lookback} bytes back but only {available} bytes of history exist")]
    LookbehindOverrun { lookback: u32, available: u64 },
    #[error("input ended before the end-of-stream marker")]
    EndOfStreamNotFound,
    #[error("{remaining} input bytes remain after the end-of-stream marker")]
    InputNotConsumed { remaining: usize },
}

impl From<TryReserveError> for CompressError {
    fn from(_: TryReserveError) -> Self {
        CompressError::OutOfMemory
    }
}

impl From<TryReserveError> for DecompressError {
    fn from(_: TryReserveError) -> Self {
        DecompressError::OutOfMemory
    }
}
