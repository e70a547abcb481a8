use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};

/// Size of the scratch array used to discard skipped bytes.
const SKIP_CHUNK: usize = 512;

/// An in-memory byte source that callers push fragments into.
///
/// Reads drain the oldest bytes first. An empty source reads `Ok(0)`,
/// which the engine treats as "nothing available yet" rather than end of
/// stream, so framing simply suspends until more bytes are pushed.
///
/// ```rust
/// use std::io::Read;
/// use ionframe_decoder::PushSource;
///
/// let mut source = PushSource::new();
/// source.push(&[0xE0, 0x01]);
/// source.push(&[0x00, 0xEA]);
///
/// let mut buf = [0u8; 8];
/// assert_eq!(source.read(&mut buf).unwrap(), 4);
/// assert_eq!(source.read(&mut buf).unwrap(), 0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PushSource {
    pending: VecDeque<u8>,
    total_pushed: u64,
}

impl PushSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
        self.total_pushed += bytes.len() as u64;
    }

    /// Bytes pushed but not yet read.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Bytes pushed over the source's lifetime.
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }
}

impl Read for PushSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.pending.read(buf)
    }
}

/// Read into `buf`, treating "try again later" conditions as zero bytes.
///
/// Some sources report `UnexpectedEof` or `WouldBlock` when asked for more
/// than they can currently supply; both mean the same thing as `Ok(0)` here.
pub(crate) fn read_available<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::WouldBlock) => {
                return Ok(0);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read one byte directly from the source, bypassing any buffer.
pub(crate) fn read_byte<R: Read>(source: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match read_available(source, &mut byte)? {
        0 => Ok(None),
        _ => Ok(Some(byte[0])),
    }
}

/// Discard up to `count` bytes from the source.
///
/// Stops early when the source has nothing more to give right now.
///
/// # Returns
///
/// The number of bytes actually discarded.
pub(crate) fn skip<R: Read>(source: &mut R, count: usize) -> io::Result<usize> {
    let mut scratch = [0u8; SKIP_CHUNK];
    let mut skipped = 0;
    while skipped < count {
        let want = (count - skipped).min(SKIP_CHUNK);
        let n = read_available(source, &mut scratch[..want])?;
        if n == 0 {
            break;
        }
        skipped += n;
    }
    Ok(skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails with the given kind on its first read, then reads from `inner`.
    struct FailOnce<R> {
        kind: Option<ErrorKind>,
        inner: R,
    }

    impl<R: Read> Read for FailOnce<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.kind.take() {
                Some(kind) => Err(io::Error::from(kind)),
                None => self.inner.read(buf),
            }
        }
    }

    #[test]
    fn push_source_reads_in_order() {
        let mut source = PushSource::new();
        source.push(b"ab");
        source.push(b"cd");
        let mut buf = [0u8; 3];
        assert_eq!(source.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
        assert_eq!(source.pending(), 1);
        assert_eq!(source.total_pushed(), 4);
    }

    #[test]
    fn skip_stops_when_source_runs_dry() {
        let mut source = PushSource::new();
        source.push(&[0u8; 1000]);
        assert_eq!(skip(&mut source, 600).unwrap(), 600);
        assert_eq!(skip(&mut source, 600).unwrap(), 400);
        assert_eq!(skip(&mut source, 600).unwrap(), 0);
    }

    #[test]
    fn eof_during_skip_counts_as_zero() {
        let mut source = FailOnce {
            kind: Some(ErrorKind::UnexpectedEof),
            inner: &[1u8, 2, 3][..],
        };
        assert_eq!(skip(&mut source, 3).unwrap(), 0);
        assert_eq!(skip(&mut source, 3).unwrap(), 3);
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut source = FailOnce {
            kind: Some(ErrorKind::Interrupted),
            inner: &[7u8][..],
        };
        assert_eq!(read_byte(&mut source).unwrap(), Some(7));
        assert_eq!(read_byte(&mut source).unwrap(), None);
    }

    #[test]
    fn other_errors_propagate() {
        let mut source = FailOnce {
            kind: Some(ErrorKind::PermissionDenied),
            inner: &[][..],
        };
        assert!(read_byte(&mut source).is_err());
    }
}
