/*! Pure Rust, streaming implementation of LZO1X-1 compression.

Both codecs work incrementally: they consume bounded input windows and
fill bounded output windows, carrying all state across calls, so streams
of any size can be handled in constant memory.

# Examples
```
use lzo_stream::{compress, decompress};
let input: &[u8] = b"Hello people, what's up?";
let compressed = compress(input).unwrap();
let uncompressed = decompress(&compressed).unwrap();
assert_eq!(input, uncompressed);
```

Chunk-by-chunk processing goes through [`StreamCompressor`] and
[`StreamDecompressor`] directly:
```
use lzo_stream::{Status, StreamCompressor};
let mut encoder = StreamCompressor::new().unwrap();
let mut out = [0u8; 64];
let (read, written, _) = encoder.process(b"some bytes", &mut out).unwrap();
assert_eq!(read, 10);
// An empty input window signals end of stream.
let (_, _, status) = encoder.process(&[], &mut out[written..]).unwrap();
assert_eq!(status, Status::End);
```
*/

pub mod codec;
pub mod ring;

pub use codec::cmd::Command;
pub use codec::compress::{StreamCompressor, DEFAULT_SKIP_TRIGGER, MAX_SKIP_TRIGGER};
pub use codec::decompress::StreamDecompressor;
pub use codec::{CompressError, DecompressError, Status};

/// Worst-case compressed size of `len` input bytes: an all-literal stream
/// plus the end-of-stream marker.
pub fn max_compressed_len(len: usize) -> usize {
    len + (len.saturating_sub(3) + 254) / 255 + 5
}

/// Compress all of `input` into a `Vec` with the default configuration.
pub fn compress(input: &[u8]) -> Result<Vec<u8>, CompressError> {
    compress_with(input, DEFAULT_SKIP_TRIGGER)
}

/// Compress all of `input` into a `Vec` with an explicit `skip_trigger`
/// (see [`StreamCompressor::with_skip_trigger`]).
pub fn compress_with(input: &[u8], skip_trigger: u32) -> Result<Vec<u8>, CompressError> {
    let bound = max_compressed_len(input.len());
    let mut out = Vec::new();
    out.try_reserve_exact(bound)?;
    out.resize(bound, 0);
    let mut encoder = StreamCompressor::with_skip_trigger(skip_trigger)?;
    let mut consumed = 0;
    let mut produced = 0;
    loop {
        let (read, written, status) = encoder.process(&input[consumed..], &mut out[produced..])?;
        consumed += read;
        produced += written;
        match status {
            Status::End => {
                out.truncate(produced);
                return Ok(out);
            }
            Status::Ok if read == 0 && written == 0 => {
                out.resize(out.len() + 1024, 0);
            }
            Status::Ok => {}
        }
    }
}

/// Compress all of `input` into `output`, returning the compressed size.
/// Fails with [`CompressError::OutputOverrun`] when `output` is too small;
/// sizing it with [`max_compressed_len`] always fits.
pub fn compress_into(input: &[u8], output: &mut [u8]) -> Result<usize, CompressError> {
    let mut encoder = StreamCompressor::new()?;
    let mut consumed = 0;
    let mut produced = 0;
    loop {
        let (read, written, status) = encoder.process(&input[consumed..], &mut output[produced..])?;
        consumed += read;
        produced += written;
        match status {
            Status::End => return Ok(produced),
            Status::Ok if read == 0 && written == 0 => return Err(CompressError::OutputOverrun),
            Status::Ok => {}
        }
    }
}

/// Decompress a whole stream into a `Vec`.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecompressError> {
    let mut decoder = StreamDecompressor::new()?;
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    let mut consumed = 0;
    loop {
        let (read, written, status) = decoder.process(&input[consumed..], &mut buf)?;
        consumed += read;
        out.extend_from_slice(&buf[..written]);
        if status == Status::End {
            return Ok(out);
        }
    }
}

/// Decompress a whole stream into `output`, returning the decompressed
/// size. Fails with [`DecompressError::OutputOverrun`] when `output` is
/// too small.
pub fn decompress_into(input: &[u8], output: &mut [u8]) -> Result<usize, DecompressError> {
    let mut decoder = StreamDecompressor::new()?;
    let mut consumed = 0;
    let mut produced = 0;
    loop {
        let (read, written, status) = decoder.process(&input[consumed..], &mut output[produced..])?;
        consumed += read;
        produced += written;
        match status {
            Status::End => return Ok(produced),
            Status::Ok if read == 0 && written == 0 => return Err(DecompressError::OutputOverrun),
            Status::Ok => {}
        }
    }
}
