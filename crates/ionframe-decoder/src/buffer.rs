use std::io::{self, Read};
use std::ops::Range;

use log::{debug, trace};

use crate::source;

/// Outcome of [`BoundedBuffer::receive`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Received {
    /// Bytes read from the source.
    pub bytes: usize,
    /// Distance every index moved left to make room. Callers holding
    /// indices into the buffer must subtract this from them.
    pub shift: usize,
}

/// A byte store with a read cursor, a boundary and a hard size ceiling.
///
/// ```text
///   0        read_index        boundary          write_index   capacity
///   │ consumed │    available    │ beyond boundary  │    free     │
///   └──────────┴─────────────────┴──────────────────┴─────────────┘
///                                                             ≤ maximum
/// ```
///
/// Bytes between the read index and the boundary have been framed and
/// may be consumed. Bytes beyond the boundary have been received from the
/// source but not yet committed by the engine.
///
/// The buffer grows lazily to exactly the size it needs and never past
/// its maximum. When it runs out of room at the end it first moves live
/// bytes to the front (consolidation), then grows. Any move is reported to
/// the caller as a left shift so it can rebase its own indices.
#[derive(Clone, Debug)]
pub struct BoundedBuffer {
    bytes: Vec<u8>,
    maximum: usize,
    read_index: usize,
    boundary: usize,
    write_index: usize,
    mark: Option<usize>,
}

impl BoundedBuffer {
    /// Create a buffer of `initial` bytes that may grow to `maximum`.
    #[must_use]
    pub fn new(initial: usize, maximum: usize) -> Self {
        Self {
            bytes: vec![0; initial.min(maximum)],
            maximum,
            read_index: 0,
            boundary: 0,
            write_index: 0,
            mark: None,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn maximum(&self) -> usize {
        self.maximum
    }

    /// Bytes held: everything from the read index to the write index.
    #[must_use]
    pub fn size(&self) -> usize {
        self.write_index - self.read_index
    }

    /// Room left before the buffer has to grow: capacity minus everything
    /// from the live start to the write index. Bytes held by a mark are
    /// live, so they count against the free space.
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity() - (self.write_index - self.live_start())
    }

    /// The lowest index that consolidation must preserve.
    fn live_start(&self) -> usize {
        self.mark
            .map_or(self.read_index, |mark| mark.min(self.read_index))
    }

    /// Bytes between the read index and the boundary.
    #[must_use]
    pub fn available(&self) -> usize {
        self.boundary - self.read_index
    }

    /// Bytes received but not yet committed by [`extend_boundary`](Self::extend_boundary).
    #[must_use]
    pub fn available_beyond_boundary(&self) -> usize {
        self.write_index - self.boundary
    }

    #[must_use]
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    #[must_use]
    pub fn boundary(&self) -> usize {
        self.boundary
    }

    #[must_use]
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Read up to `max_bytes` from `source` into the free space.
    ///
    /// If the free space at the end is too small, live bytes are moved to
    /// the front and then, if that is still not enough, the buffer grows
    /// toward its maximum. Fewer than `max_bytes` are read when the
    /// ceiling is reached or the source has less to give.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors other than `Interrupted`, `WouldBlock` and
    /// `UnexpectedEof`, which count as zero bytes read.
    pub fn receive<R: Read>(&mut self, source: &mut R, max_bytes: usize) -> io::Result<Received> {
        let shift = if self.write_index + max_bytes > self.capacity() {
            self.make_room(max_bytes)
        } else {
            0
        };
        let end = (self.write_index + max_bytes).min(self.capacity());
        let bytes = source::read_available(source, &mut self.bytes[self.write_index..end])?;
        self.write_index += bytes;
        trace!("received {bytes} of {max_bytes} requested bytes");
        Ok(Received { bytes, shift })
    }

    /// Move live bytes to the front, then grow if `wanted` bytes still do
    /// not fit after the write index.
    fn make_room(&mut self, wanted: usize) -> usize {
        let live_start = self.live_start();
        if live_start > 0 {
            self.bytes.copy_within(live_start..self.write_index, 0);
            self.read_index -= live_start;
            self.boundary -= live_start;
            self.write_index -= live_start;
            if let Some(mark) = self.mark.as_mut() {
                *mark -= live_start;
            }
            debug!("consolidated live bytes to start of buffer, shift {live_start}");
        }
        let needed = (self.write_index + wanted).min(self.maximum);
        if needed > self.capacity() {
            trace!("growing buffer from {} to {needed} bytes", self.capacity());
            self.bytes.resize(needed, 0);
        }
        live_start
    }

    /// The byte at `index`, which must be below the write index.
    #[must_use]
    pub fn peek(&self, index: usize) -> u8 {
        debug_assert!(index < self.write_index, "peek past write index");
        self.bytes[index]
    }

    /// Received bytes in `range`. The range must lie below the write index.
    #[must_use]
    pub fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.bytes[..self.write_index][range]
    }

    /// Commit the next `n` received bytes as available.
    pub fn extend_boundary(&mut self, n: usize) {
        debug_assert!(n <= self.available_beyond_boundary(), "boundary past write index");
        self.boundary += n;
    }

    /// Move the read index to `index`, consuming everything before it.
    ///
    /// `index` is clamped to the boundary.
    pub fn consume_to(&mut self, index: usize) {
        self.read_index = index.clamp(self.read_index, self.boundary);
    }

    /// Remove the bytes in `[to, from)` by moving `[from, write_index)`
    /// down to `to`.
    ///
    /// The boundary and write index move left by `from - to`. The read
    /// index and mark are expected to be at or below `to` and do not move.
    ///
    /// # Returns
    ///
    /// The shift amount, `from - to`.
    pub fn consolidate(&mut self, from: usize, to: usize) -> usize {
        debug_assert!(to <= from && from <= self.write_index);
        debug_assert!(self.read_index <= to, "consolidating consumed bytes");
        let shift = from - to;
        if shift == 0 {
            return 0;
        }
        self.bytes.copy_within(from..self.write_index, to);
        self.write_index -= shift;
        self.boundary = if self.boundary >= from {
            self.boundary - shift
        } else {
            self.boundary.min(to)
        };
        debug!("removed {shift} bytes at {to}");
        shift
    }

    /// Discard everything at and after `index`, leaving `available` bytes
    /// before it readable.
    pub fn truncate(&mut self, index: usize, available: usize) {
        debug_assert!(available <= index && index <= self.write_index);
        self.write_index = index;
        self.boundary = index;
        self.read_index = index - available;
        trace!("truncated to {index}, {available} bytes available");
    }

    /// Move the read index back to `index` with `available` bytes readable
    /// from there. Nothing is discarded.
    pub fn rewind(&mut self, index: usize, available: usize) {
        debug_assert!(index + available <= self.write_index);
        self.read_index = index;
        self.boundary = index + available;
    }

    /// Remember the read index. Bytes from the mark onward are preserved
    /// across consolidation until the mark is cleared.
    pub fn mark(&mut self) {
        self.mark = Some(self.read_index);
    }

    /// Return the read index to the mark and clear it.
    ///
    /// # Returns
    ///
    /// False if no mark was set.
    pub fn rewind_to_mark(&mut self) -> bool {
        match self.mark.take() {
            Some(mark) => {
                self.read_index = mark;
                true
            }
            None => false,
        }
    }

    pub fn clear_mark(&mut self) {
        self.mark = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PushSource;

    fn source(bytes: &[u8]) -> PushSource {
        let mut source = PushSource::new();
        source.push(bytes);
        source
    }

    #[test]
    fn receive_fills_existing_capacity_first() {
        let mut buffer = BoundedBuffer::new(4, 16);
        let mut src = source(b"abcdef");
        let received = buffer.receive(&mut src, 4).unwrap();
        assert_eq!(received, Received { bytes: 4, shift: 0 });
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.available(), 0);
        assert_eq!(buffer.available_beyond_boundary(), 4);
    }

    #[test]
    fn receive_grows_to_exact_size_and_stops_at_maximum() {
        let mut buffer = BoundedBuffer::new(4, 10);
        let mut src = source(&[0u8; 32]);
        buffer.receive(&mut src, 4).unwrap();
        buffer.receive(&mut src, 3).unwrap();
        assert_eq!(buffer.capacity(), 7);
        let received = buffer.receive(&mut src, 8).unwrap();
        assert_eq!(received.bytes, 3);
        assert_eq!(buffer.capacity(), 10);
    }

    #[test]
    fn receive_consolidates_consumed_bytes() {
        let mut buffer = BoundedBuffer::new(4, 4);
        let mut src = source(b"abcdef");
        buffer.receive(&mut src, 4).unwrap();
        buffer.extend_boundary(4);
        buffer.consume_to(3);
        let received = buffer.receive(&mut src, 2).unwrap();
        assert_eq!(received, Received { bytes: 2, shift: 3 });
        assert_eq!(buffer.read_index(), 0);
        assert_eq!(buffer.boundary(), 1);
        assert_eq!(buffer.bytes(0..3), b"def");
    }

    #[test]
    fn mark_survives_consolidation() {
        let mut buffer = BoundedBuffer::new(4, 4);
        let mut src = source(b"abcdef");
        buffer.receive(&mut src, 4).unwrap();
        buffer.extend_boundary(4);
        buffer.consume_to(1);
        buffer.mark();
        buffer.consume_to(4);
        let received = buffer.receive(&mut src, 1).unwrap();
        assert_eq!(received.shift, 1);
        assert!(buffer.rewind_to_mark());
        assert_eq!(buffer.read_index(), 0);
        assert_eq!(buffer.bytes(0..4), b"bcde");
        assert!(!buffer.rewind_to_mark());
    }

    #[test]
    fn marked_bytes_are_not_free() {
        let mut buffer = BoundedBuffer::new(4, 4);
        let mut src = source(b"abcdef");
        buffer.receive(&mut src, 4).unwrap();
        buffer.extend_boundary(4);
        buffer.mark();
        buffer.consume_to(3);
        assert_eq!(buffer.size(), 1);
        assert_eq!(buffer.free(), 0);
        assert_eq!(buffer.receive(&mut src, 1).unwrap().bytes, 0);

        buffer.clear_mark();
        assert_eq!(buffer.free(), 3);
        assert_eq!(buffer.receive(&mut src, 1).unwrap(), Received { bytes: 1, shift: 3 });
    }

    #[test]
    fn consolidate_removes_a_gap() {
        let mut buffer = BoundedBuffer::new(8, 8);
        let mut src = source(b"ab____cd");
        buffer.receive(&mut src, 8).unwrap();
        buffer.extend_boundary(7);
        let shift = buffer.consolidate(6, 2);
        assert_eq!(shift, 4);
        assert_eq!(buffer.bytes(0..4), b"abcd");
        assert_eq!(buffer.boundary(), 3);
        assert_eq!(buffer.write_index(), 4);
    }

    #[test]
    fn truncate_and_rewind() {
        let mut buffer = BoundedBuffer::new(8, 8);
        let mut src = source(b"abcdefgh");
        buffer.receive(&mut src, 8).unwrap();
        buffer.extend_boundary(6);
        buffer.consume_to(2);

        buffer.truncate(4, 2);
        assert_eq!(buffer.write_index(), 4);
        assert_eq!(buffer.boundary(), 4);
        assert_eq!(buffer.read_index(), 2);

        buffer.consume_to(4);
        buffer.rewind(3, 1);
        assert_eq!(buffer.read_index(), 3);
        assert_eq!(buffer.available(), 1);
    }

    #[test]
    fn consume_is_clamped_to_boundary() {
        let mut buffer = BoundedBuffer::new(4, 4);
        let mut src = source(b"abcd");
        buffer.receive(&mut src, 4).unwrap();
        buffer.extend_boundary(2);
        buffer.consume_to(10);
        assert_eq!(buffer.read_index(), 2);
    }

    /// Random receive/consume sequences: every surviving byte is found at
    /// its old index minus the reported shift.
    #[test]
    fn shifts_account_for_every_move() {
        fn prop(steps: Vec<(u8, u8)>) -> bool {
            let stream: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
            let mut src = source(&stream);
            let mut buffer = BoundedBuffer::new(8, 64);
            // Absolute stream offset of buffer index 0.
            let mut origin = 0usize;
            for (fill, consume) in steps {
                let received = buffer.receive(&mut src, usize::from(fill % 32) + 1).unwrap();
                origin += received.shift;
                buffer.extend_boundary(buffer.available_beyond_boundary());
                let target = buffer.read_index() + usize::from(consume) % (buffer.available() + 1);
                buffer.consume_to(target);
                for index in buffer.read_index()..buffer.write_index() {
                    if buffer.peek(index) != stream[origin + index] {
                        return false;
                    }
                }
                if buffer.capacity() > buffer.maximum() {
                    return false;
                }
            }
            true
        }
        quickcheck::quickcheck(prop as fn(Vec<(u8, u8)>) -> bool);
    }
}
