//! The streaming decompressor.
//!
//! Command bytes are collected in a small hold-over buffer so a command
//! split across input chunks decodes transparently; literal payloads never
//! enter it, they stream straight into the history ring. Decompressed
//! bytes leave toward the caller exactly when the ring displaces them,
//! plus one final flush after the sentinel: the newest window of history
//! has to stay addressable for later copies.

use super::cmd;
use super::{DecompressError, Status, WINDOW_SIZE};
use crate::ring::RingBuffer;

/// Input bytes moved into the hold-over per decode retry.
const HOLDOVER_CHUNK: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingFirstLiteral,
    AwaitingCommand,
    CopyingHistory,
    ReadingLiteral,
    Flushing,
    Done,
}

/// Incremental LZO1X-1 decoder.
///
/// Drive it with [`process`](StreamDecompressor::process): feed compressed
/// windows, collect decompressed windows, and signal end of input with an
/// empty input. A well-formed stream ends in [`Status::End`] with nothing
/// left over; anything else is an error.
#[derive(Debug)]
pub struct StreamDecompressor {
    ring: RingBuffer,
    holdover: Vec<u8>,
    hold_pos: usize,
    /// Total decompressed bytes produced so far.
    written: u64,
    /// Total compressed bytes consumed over all calls, for error context.
    consumed_total: u64,
    phase: Phase,
    remaining_copy: u32,
    copy_lookback: u32,
    remaining_literal: u32,
    /// Literal count of the pair being executed; becomes the decode
    /// context once its literals are done.
    pair_literals: u32,
    last_literals: u32,
    poisoned: Option<DecompressError>,
}

impl StreamDecompressor {
    pub fn new() -> Result<Self, DecompressError> {
        Ok(StreamDecompressor {
            ring: RingBuffer::with_capacity(WINDOW_SIZE)?,
            holdover: Vec::new(),
            hold_pos: 0,
            written: 0,
            consumed_total: 0,
            phase: Phase::AwaitingFirstLiteral,
            remaining_copy: 0,
            copy_lookback: 0,
            remaining_literal: 0,
            pair_literals: 0,
            last_literals: 0,
            poisoned: None,
        })
    }

    /// Consumes compressed bytes from `input` and writes decompressed
    /// bytes to `output`.
    ///
    /// An empty `input` signals end of the compressed stream. Returns how
    /// many bytes were read, how many were written, and whether the
    /// sentinel has been reached and all output flushed.
    pub fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, Status), DecompressError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        let mut in_pos = 0;
        let mut out_pos = 0;
        let result = self.run(input, output, &mut in_pos, &mut out_pos);
        self.consumed_total += in_pos as u64;
        match result {
            Ok(status) => Ok((in_pos, out_pos, status)),
            Err(err) => {
                self.poisoned = Some(err.clone());
                Err(err)
            }
        }
    }

    fn run(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        in_pos: &mut usize,
        out_pos: &mut usize,
    ) -> Result<Status, DecompressError> {
        let eof = input.is_empty();
        loop {
            match self.phase {
                Phase::Done => {
                    if *in_pos < input.len() {
                        return Err(DecompressError::InputNotConsumed {
                            remaining: input.len() - *in_pos,
                        });
                    }
                    return Ok(Status::End);
                }
                Phase::Flushing => {
                    *out_pos += self.ring.drain_front(&mut output[*out_pos..]);
                    if !self.ring.is_empty() {
                        return Ok(Status::Ok); // output window exhausted
                    }
                    self.phase = Phase::Done;
                }
                Phase::AwaitingFirstLiteral | Phase::AwaitingCommand => {
                    let first = self.phase == Phase::AwaitingFirstLiteral;
                    let pair = loop {
                        let pending = &self.holdover[self.hold_pos..];
                        if let Some((used, pair)) = cmd::decode(pending, self.last_literals, first) {
                            self.hold_pos += used;
                            if self.hold_pos == self.holdover.len() {
                                self.holdover.clear();
                                self.hold_pos = 0;
                            }
                            break pair;
                        }
                        if *in_pos < input.len() {
                            let take = (input.len() - *in_pos).min(HOLDOVER_CHUNK);
                            self.holdover.extend_from_slice(&input[*in_pos..*in_pos + take]);
                            *in_pos += take;
                        } else if eof {
                            return Err(if self.holdover.len() == self.hold_pos {
                                DecompressError::EndOfStreamNotFound
                            } else {
                                DecompressError::InputOverrun {
                                    position: self.consumed_total + *in_pos as u64,
                                }
                            });
                        } else {
                            return Ok(Status::Ok); // command split across chunks
                        }
                    };

                    if pair.end_of_stream {
                        let leftover = self.holdover.len() - self.hold_pos + input.len() - *in_pos;
                        if leftover > 0 {
                            return Err(DecompressError::InputNotConsumed { remaining: leftover });
                        }
                        self.phase = Phase::Flushing;
                        continue;
                    }
                    self.pair_literals = pair.literal_length;
                    self.remaining_literal = pair.literal_length;
                    if pair.copy_length == 0 {
                        self.phase = Phase::ReadingLiteral;
                    } else {
                        if u64::from(pair.lookback) > self.written {
                            return Err(DecompressError::LookbehindOverrun {
                                lookback: pair.lookback,
                                available: self.written,
                            });
                        }
                        self.remaining_copy = pair.copy_length;
                        self.copy_lookback = pair.lookback;
                        self.phase = Phase::CopyingHistory;
                    }
                }
                Phase::CopyingHistory => {
                    // One byte at a time, on purpose: when the lookback is
                    // shorter than the copy the source must chase the write
                    // cursor so the window repeats itself.
                    while self.remaining_copy > 0 {
                        if self.ring.is_full() && *out_pos == output.len() {
                            return Ok(Status::Ok);
                        }
                        let byte = self.ring.get(self.ring.len() - self.copy_lookback as usize);
                        if let Some(evicted) = self.ring.push_back(byte) {
                            output[*out_pos] = evicted;
                            *out_pos += 1;
                        }
                        self.written += 1;
                        self.remaining_copy -= 1;
                    }
                    self.phase = Phase::ReadingLiteral;
                }
                Phase::ReadingLiteral => {
                    while self.remaining_literal > 0 {
                        let want = self.remaining_literal as usize;
                        let source = if self.hold_pos < self.holdover.len() {
                            &self.holdover[self.hold_pos..]
                        } else {
                            &input[*in_pos..]
                        };
                        if source.is_empty() {
                            return if eof {
                                Err(DecompressError::InputOverrun {
                                    position: self.consumed_total + *in_pos as u64,
                                })
                            } else {
                                Ok(Status::Ok)
                            };
                        }
                        let source = &source[..source.len().min(want)];
                        let from_holdover = self.hold_pos < self.holdover.len();
                        let (copied, evicted) = self.ring.shift_copy(source, &mut output[*out_pos..]);
                        *out_pos += evicted;
                        if copied == 0 {
                            return Ok(Status::Ok); // output window exhausted
                        }
                        if from_holdover {
                            self.hold_pos += copied;
                            if self.hold_pos == self.holdover.len() {
                                self.holdover.clear();
                                self.hold_pos = 0;
                            }
                        } else {
                            *in_pos += copied;
                        }
                        self.written += copied as u64;
                        self.remaining_literal -= copied as u32;
                    }
                    self.last_literals = self.pair_literals;
                    self.phase = Phase::AwaitingCommand;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds the whole stream then EOF, collecting everything.
    fn decompress_all(stream: &[u8]) -> Result<Vec<u8>, DecompressError> {
        let mut dec = StreamDecompressor::new()?;
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        let mut consumed = 0;
        loop {
            let (r, w, status) = dec.process(&stream[consumed..], &mut buf)?;
            consumed += r;
            out.extend_from_slice(&buf[..w]);
            if status == Status::End {
                return Ok(out);
            }
        }
    }

    #[test]
    fn empty_stream() {
        assert_eq!(decompress_all(&[0x11, 0x00, 0x00]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn short_head_both_encodings() {
        // Direct one-byte head...
        assert_eq!(
            decompress_all(&[0x12, 0x41, 0x11, 0x00, 0x00]).unwrap(),
            vec![0x41]
        );
        // ...and a head of four literals via the inline run field.
        assert_eq!(
            decompress_all(&[0x01, b'w', b'x', b'y', b'z', 0x11, 0x00, 0x00]).unwrap(),
            b"wxyz"
        );
    }

    #[test]
    fn overlapping_copy_repeats_the_window() {
        // Head "ab", then a copy of 6 at lookback 2: "ab" six more bytes.
        let stream = [0x13, b'a', b'b', 0x40 | (1 << 2) | 0, 0x00, 0x11, 0x00, 0x00];
        // Form C: len 3, d-1 = (0<<3)+1 = 1 -> lookback 2.
        let out = decompress_all(&stream).unwrap();
        assert_eq!(out, b"ababa");
    }

    #[test]
    fn lookback_equal_to_history_is_legal() {
        // Head "abcd", copy len 4 lookback 4 -> "abcdabcd".
        let stream = [0x15, b'a', b'b', b'c', b'd', 0x60 | (3 << 2), 0x00, 0x11, 0x00, 0x00];
        assert_eq!(decompress_all(&stream).unwrap(), b"abcdabcd");
    }

    #[test]
    fn lookback_past_history_is_an_error() {
        // Head "abcd", then a copy reaching 5 back.
        let stream = [0x15, b'a', b'b', b'c', b'd', 0x60 | (0 << 2), 0x00, 0x11, 0x00, 0x00];
        // d-1 = (0<<3)+0 = 0 -> lookback 1: legal. Make it reach too far:
        let stream_bad = [0x15, b'a', b'b', b'c', b'd', 0x60 | (4 << 2), 0x00, 0x11, 0x00, 0x00];
        assert!(decompress_all(&stream).is_ok());
        assert_eq!(
            decompress_all(&stream_bad),
            Err(DecompressError::LookbehindOverrun {
                lookback: 5,
                available: 4
            })
        );
    }

    #[test]
    fn fresh_copy_command_is_rejected() {
        // 0x10 as the very first byte: an unterminated length run at EOF.
        let err = decompress_all(&[0x10, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, DecompressError::InputOverrun { .. }));
    }

    #[test]
    fn missing_sentinel_is_detected() {
        let err = decompress_all(&[0x15, b'a', b'b', b'c', b'd']).unwrap_err();
        assert_eq!(err, DecompressError::EndOfStreamNotFound);
    }

    #[test]
    fn trailing_garbage_is_detected() {
        let err = decompress_all(&[0x11, 0x00, 0x00, 0xAA]).unwrap_err();
        assert_eq!(err, DecompressError::InputNotConsumed { remaining: 1 });
    }

    #[test]
    fn truncated_literal_run_is_an_overrun() {
        // Head claims four literals but only two arrive before EOF.
        let err = decompress_all(&[0x15, b'a', b'b']).unwrap_err();
        assert!(matches!(err, DecompressError::InputOverrun { .. }));
    }

    #[test]
    fn errors_poison_the_stream() {
        let mut dec = StreamDecompressor::new().unwrap();
        let mut buf = [0u8; 16];
        let err = dec.process(&[0x11, 0x00, 0x00, 0xAA], &mut buf).unwrap_err();
        assert_eq!(err, DecompressError::InputNotConsumed { remaining: 1 });
        assert_eq!(dec.process(&[], &mut buf), Err(err));
    }

    #[test]
    fn byte_at_a_time_input_matches_whole_input() {
        let stream = [
            0x15, 0x00, 0x00, 0x00, 0x00, 0x2E, 0x00, 0x00, 0x11, 0x00, 0x00,
        ];
        let whole = decompress_all(&stream).unwrap();
        assert_eq!(whole, vec![0u8; 20]);

        let mut dec = StreamDecompressor::new().unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        for &byte in &stream {
            let (r, w, _) = dec.process(&[byte], &mut buf).unwrap();
            assert_eq!(r, 1);
            out.extend_from_slice(&buf[..w]);
        }
        loop {
            let (_, w, status) = dec.process(&[], &mut buf).unwrap();
            out.extend_from_slice(&buf[..w]);
            if status == Status::End {
                break;
            }
        }
        assert_eq!(out, whole);
    }

    #[test]
    fn single_byte_output_windows_make_progress() {
        let stream = [
            0x15, 0x00, 0x00, 0x00, 0x00, 0x2E, 0x00, 0x00, 0x11, 0x00, 0x00,
        ];
        let mut dec = StreamDecompressor::new().unwrap();
        let mut out = Vec::new();
        let mut consumed = 0;
        loop {
            let mut window = [0u8; 1];
            let (r, w, status) = dec.process(&stream[consumed..], &mut window).unwrap();
            consumed += r;
            out.extend_from_slice(&window[..w]);
            if status == Status::End {
                break;
            }
        }
        assert_eq!(out, vec![0u8; 20]);
    }
}
