//! Fixed-capacity byte ring with periodic indexing.
//!
//! Both codecs keep their sliding history in one of these: the capacity is
//! chosen once at construction and all indices are interpreted modulo the
//! capacity. Index 0 is always the oldest byte still stored.

use std::collections::TryReserveError;

#[derive(Debug)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    /// Physical index of logical index 0.
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Creates a ring holding up to `capacity` bytes.
    ///
    /// The backing storage is reserved fallibly so that callers can surface
    /// allocation failure as an error instead of aborting.
    pub fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)?;
        buf.resize(capacity, 0);
        Ok(RingBuffer {
            buf: buf.into_boxed_slice(),
            head: 0,
            len: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Maps a logical index to a physical one. The logical index must be
    /// within the current length.
    #[inline]
    fn phys(&self, index: usize) -> usize {
        debug_assert!(index < self.len);
        let p = self.head + index;
        if p >= self.buf.len() {
            p - self.buf.len()
        } else {
            p
        }
    }

    /// Reads the byte at `index` (0 = oldest).
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        assert!(index < self.len, "ring index {index} out of bounds ({})", self.len);
        self.buf[self.phys(index)]
    }

    /// Overwrites the byte at `index` (0 = oldest).
    #[inline]
    pub fn set(&mut self, index: usize, byte: u8) {
        assert!(index < self.len, "ring index {index} out of bounds ({})", self.len);
        let p = self.phys(index);
        self.buf[p] = byte;
    }

    /// Overwrites `src.len()` bytes starting at `index`.
    pub fn write_slice_at(&mut self, index: usize, src: &[u8]) {
        assert!(index + src.len() <= self.len);
        for (i, &b) in src.iter().enumerate() {
            let p = self.phys(index + i);
            self.buf[p] = b;
        }
    }

    /// Appends a byte at the back. When the ring is full the oldest byte is
    /// displaced and returned.
    #[inline]
    pub fn push_back(&mut self, byte: u8) -> Option<u8> {
        if self.is_full() {
            let evicted = self.buf[self.head];
            self.buf[self.head] = byte;
            self.head += 1;
            if self.head == self.buf.len() {
                self.head = 0;
            }
            Some(evicted)
        } else {
            let p = self.head + self.len;
            let p = if p >= self.buf.len() { p - self.buf.len() } else { p };
            self.buf[p] = byte;
            self.len += 1;
            None
        }
    }

    /// Prepends a byte at the front. When the ring is full the newest byte
    /// is displaced and returned.
    pub fn push_front(&mut self, byte: u8) -> Option<u8> {
        let evicted = if self.is_full() { self.pop_back() } else { None };
        self.head = if self.head == 0 { self.buf.len() - 1 } else { self.head - 1 };
        self.buf[self.head] = byte;
        self.len += 1;
        evicted
    }

    #[inline]
    pub fn pop_front(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buf[self.head];
        self.head += 1;
        if self.head == self.buf.len() {
            self.head = 0;
        }
        self.len -= 1;
        Some(byte)
    }

    pub fn pop_back(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let p = self.head + self.len;
        let p = if p >= self.buf.len() { p - self.buf.len() } else { p };
        Some(self.buf[p])
    }

    /// Appends all of `data`, silently overwriting the oldest bytes once the
    /// ring is full.
    pub fn append(&mut self, data: &[u8]) {
        for &b in data {
            self.push_back(b);
        }
    }

    /// Appends bytes from `src`, moving each displaced byte into `sink`.
    ///
    /// Stops as soon as the source is exhausted or an eviction would not fit
    /// in `sink`; no displaced byte is ever dropped. Returns how many bytes
    /// were copied in and how many were evicted out.
    pub fn shift_copy(&mut self, src: &[u8], sink: &mut [u8]) -> (usize, usize) {
        let mut copied = 0;
        let mut evicted = 0;
        for &b in src {
            if self.is_full() && evicted == sink.len() {
                break;
            }
            if let Some(old) = self.push_back(b) {
                sink[evicted] = old;
                evicted += 1;
            }
            copied += 1;
        }
        (copied, evicted)
    }

    /// Pops bytes from the front into `sink` until either runs out. Returns
    /// the number of bytes moved.
    pub fn drain_front(&mut self, sink: &mut [u8]) -> usize {
        let n = self.len.min(sink.len());
        for slot in sink[..n].iter_mut() {
            // n <= len, so the pop cannot fail
            *slot = self.pop_front().unwrap_or_default();
        }
        n
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
