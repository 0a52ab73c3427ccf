//! The streaming compressor.
//!
//! Input bytes are pulled into a sliding window on demand and scanned for
//! four-byte matches against the fingerprint table. Bytes between matches
//! accumulate as the pending literal run. Because a history-copy command
//! carries the length of the literal run that *follows* it, a found match
//! is parked in `pending` and only encoded once the next run's length is
//! known.
//!
//! Every decision depends only on absolute stream positions, so the
//! emitted bytes are independent of how the caller chunks the input.

use super::cmd::{self, Command};
use super::table::{self, FingerprintTable};
use super::{CompressError, Status, MAX_LOOKBACK, MIN_MATCH, WINDOW_SIZE};
use crate::ring::RingBuffer;

/// Default shift of the miss-driven scan acceleration.
pub const DEFAULT_SKIP_TRIGGER: u32 = 5;

/// Largest accepted `skip_trigger`; higher values are clamped.
pub const MAX_SKIP_TRIGGER: u32 = 16;

/// A single copy command is cut at this length; the scan then continues and
/// the remainder becomes further matches at the same distance.
const MAX_COPY: u64 = 1 << 30;

/// Rebase the fingerprint table before position entries outgrow 32 bits.
const REBASE_LIMIT: u32 = u32::MAX - (1 << 16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Probing for the next match.
    Scanning,
    /// Inside a match that started at `start`; `scan` is the next byte to
    /// compare.
    Extending { start: u64, lookback: u32 },
    /// The sentinel has been staged.
    Finished,
}

/// Incremental LZO1X-1 encoder.
///
/// Drive it with [`process`](StreamCompressor::process): feed input
/// windows, collect output windows, and signal end of input with an empty
/// input. The encoder owns all state; neither buffer is retained across
/// calls.
#[derive(Debug)]
pub struct StreamCompressor {
    window: RingBuffer,
    table: FingerprintTable,
    /// Raw bytes from `anchor` up to `ingested`; the prefix up to the next
    /// match start is the pending literal payload.
    literals: Vec<u8>,
    /// Last found copy, waiting for the length of the literal run after it.
    pending: Option<(u32, u32)>,
    /// Encoded bytes not yet accepted by the caller's output window.
    staged: Vec<u8>,
    staged_pos: usize,
    /// Absolute count of input bytes pulled into the window.
    ingested: u64,
    /// Absolute position of the next byte to probe or compare.
    scan: u64,
    /// Absolute position just past the last emitted pair.
    anchor: u64,
    /// Absolute position corresponding to table entry 1.
    table_base: u64,
    /// Probes since the last accepted match.
    misses: u32,
    /// Literal length of the last fully encoded pair (form A/B context).
    last_literal_len: u32,
    skip_trigger: u32,
    first_emitted: bool,
    phase: Phase,
    poisoned: Option<CompressError>,
}

impl StreamCompressor {
    pub fn new() -> Result<Self, CompressError> {
        Self::with_skip_trigger(DEFAULT_SKIP_TRIGGER)
    }

    /// Creates a compressor with an explicit scan-acceleration shift.
    /// Values above [`MAX_SKIP_TRIGGER`] are clamped.
    pub fn with_skip_trigger(skip_trigger: u32) -> Result<Self, CompressError> {
        Ok(StreamCompressor {
            window: RingBuffer::with_capacity(WINDOW_SIZE + MIN_MATCH)?,
            table: FingerprintTable::new()?,
            literals: Vec::new(),
            pending: None,
            staged: Vec::new(),
            staged_pos: 0,
            ingested: 0,
            scan: 0,
            anchor: 0,
            table_base: 0,
            misses: 0,
            last_literal_len: 0,
            skip_trigger: skip_trigger.min(MAX_SKIP_TRIGGER),
            first_emitted: false,
            phase: Phase::Scanning,
            poisoned: None,
        })
    }

    /// Consumes bytes from `input` and writes compressed bytes to `output`.
    ///
    /// An empty `input` signals end of stream. Returns how many bytes were
    /// read, how many were written, and whether the stream is complete.
    /// The call makes as much progress as the two windows allow; repeat it
    /// with fresh windows until [`Status::End`].
    pub fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, Status), CompressError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        let eof = input.is_empty();
        let mut in_pos = 0;
        let mut out_pos = 0;
        self.drain_staged(output, &mut out_pos);

        loop {
            if self.staged_pos < self.staged.len() {
                break; // output window exhausted
            }
            match self.phase {
                Phase::Finished => break,
                Phase::Scanning => {
                    if !self.ingest_to(self.scan + MIN_MATCH as u64, input, &mut in_pos) {
                        if !eof {
                            break;
                        }
                        if let Err(err) = self.finish() {
                            self.poisoned = Some(err.clone());
                            return Err(err);
                        }
                        self.phase = Phase::Finished;
                        self.drain_staged(output, &mut out_pos);
                        continue;
                    }
                    self.probe();
                }
                Phase::Extending { start, lookback } => {
                    let complete = loop {
                        if self.scan - start >= MAX_COPY {
                            break true;
                        }
                        if !self.ingest_to(self.scan + 1, input, &mut in_pos) {
                            break eof;
                        }
                        if self.byte_at(self.scan) == self.byte_at(self.scan - u64::from(lookback)) {
                            self.scan += 1;
                        } else {
                            break true;
                        }
                    };
                    if !complete {
                        break; // parked mid-match until more input arrives
                    }
                    if let Err(err) = self.emit_pair(start, lookback) {
                        self.poisoned = Some(err.clone());
                        return Err(err);
                    }
                    self.phase = Phase::Scanning;
                    self.drain_staged(output, &mut out_pos);
                }
            }
        }

        let status = if self.phase == Phase::Finished && self.staged_pos >= self.staged.len() {
            Status::End
        } else {
            Status::Ok
        };
        Ok((in_pos, out_pos, status))
    }

    /// Pulls bytes from `input` until `target` absolute bytes have been
    /// ingested. Returns false when the input window runs dry first.
    fn ingest_to(&mut self, target: u64, input: &[u8], in_pos: &mut usize) -> bool {
        while self.ingested < target {
            if *in_pos >= input.len() {
                return false;
            }
            let byte = input[*in_pos];
            *in_pos += 1;
            self.window.push_back(byte);
            self.literals.push(byte);
            self.ingested += 1;
        }
        true
    }

    #[inline]
    fn byte_at(&self, abs: u64) -> u8 {
        let back = (self.ingested - abs) as usize;
        self.window.get(self.window.len() - back)
    }

    #[inline]
    fn u32_at(&self, abs: u64) -> u32 {
        u32::from_le_bytes([
            self.byte_at(abs),
            self.byte_at(abs + 1),
            self.byte_at(abs + 2),
            self.byte_at(abs + 3),
        ])
    }

    /// Table entry for an absolute position, rebasing the table when the
    /// 32-bit entry space is close to running out.
    fn position_entry(&mut self, abs: u64) -> u32 {
        let mut entry = abs - self.table_base + 1;
        if entry >= u64::from(REBASE_LIMIT) {
            let shift = (entry - WINDOW_SIZE as u64 - 1) as u32;
            self.table.rebase(shift);
            self.table_base += u64::from(shift);
            entry -= u64::from(shift);
        }
        entry as u32
    }

    /// One probe of the match search at `scan`.
    fn probe(&mut self) {
        let fingerprint = self.u32_at(self.scan);
        let entry = self.position_entry(self.scan);
        let prev = self.table.lookup_and_replace(fingerprint, entry);
        if prev != table::EMPTY {
            let dist = entry - prev;
            if dist <= MAX_LOOKBACK && self.u32_at(self.scan - u64::from(dist)) == fingerprint {
                // The stream must open with at least MIN_MATCH literals, so
                // earlier hits are passed over (their positions stay in the
                // table).
                let earliest = if self.first_emitted {
                    self.anchor
                } else {
                    self.anchor + MIN_MATCH as u64
                };
                if self.scan >= earliest {
                    self.phase = Phase::Extending {
                        start: self.scan,
                        lookback: dist,
                    };
                    self.scan += MIN_MATCH as u64;
                    self.misses = 0;
                    return;
                }
            }
        }
        let step = u64::from((self.misses >> self.skip_trigger).max(1));
        self.misses = self.misses.saturating_add(1);
        self.scan += step;
    }

    /// Stages the pair ending at the match `[start, scan)` and parks the
    /// new copy until its own following literal run is known.
    fn emit_pair(&mut self, start: u64, lookback: u32) -> Result<(), CompressError> {
        let copy_len = (self.scan - start) as u32;
        let lit_len = start - self.anchor;
        self.stage_boundary(lit_len, Some((lookback, copy_len)))?;
        self.literals.drain(..(self.scan - self.anchor) as usize);
        self.anchor = self.scan;
        Ok(())
    }

    /// Flushes the tail: pending copy, trailing literals, sentinel.
    fn finish(&mut self) -> Result<(), CompressError> {
        let lit_len = self.ingested - self.anchor;
        self.stage_boundary(lit_len, None)?;
        self.stage_cmd(&Command::END_OF_STREAM, self.last_literal_len)?;
        self.literals.clear();
        self.anchor = self.ingested;
        Ok(())
    }

    /// Encodes everything that becomes fixed once the literal run ending at
    /// the current boundary is known: the pending copy (whose SS bits are
    /// this run's length) and the run itself.
    fn stage_boundary(
        &mut self,
        lit_len: u64,
        next_copy: Option<(u32, u32)>,
    ) -> Result<(), CompressError> {
        let lit_len = u32::try_from(lit_len).map_err(|_| CompressError::EncoderFault {
            reason: "literal run exceeds the encodable range",
        })?;
        if !self.first_emitted {
            if lit_len > 0 {
                let head = Command::literal(lit_len, true);
                self.stage_cmd(&head, 0)?;
                self.stage_payload(lit_len as usize);
            } else if next_copy.is_some() {
                return Err(CompressError::EncoderFault {
                    reason: "stream cannot begin with a history copy",
                });
            }
            self.first_emitted = true;
        } else {
            let (lookback, copy_len) = self.pending.take().ok_or(CompressError::EncoderFault {
                reason: "no pending copy at a pair boundary",
            })?;
            let pair = Command::copy(lookback, copy_len, lit_len);
            self.stage_cmd(&pair, self.last_literal_len)?;
            self.stage_payload(lit_len as usize);
        }
        self.last_literal_len = lit_len;
        self.pending = next_copy;
        Ok(())
    }

    fn stage_cmd(&mut self, pair: &Command, last_literal_len: u32) -> Result<(), CompressError> {
        let needed = cmd::encoded_len(pair, last_literal_len);
        let at = self.staged.len();
        self.staged.resize(at + needed, 0);
        let written = cmd::encode(&mut self.staged[at..], pair, last_literal_len)?;
        debug_assert_eq!(written, needed);
        Ok(())
    }

    fn stage_payload(&mut self, lit_len: usize) {
        let run = &self.literals[..lit_len];
        self.staged.extend_from_slice(run);
    }

    fn drain_staged(&mut self, output: &mut [u8], out_pos: &mut usize) {
        let ready = &self.staged[self.staged_pos..];
        let n = ready.len().min(output.len() - *out_pos);
        output[*out_pos..*out_pos + n].copy_from_slice(&ready[..n]);
        *out_pos += n;
        self.staged_pos += n;
        if self.staged_pos == self.staged.len() {
            self.staged.clear();
            self.staged_pos = 0;
        }
    }
}
