use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::BufferConfig;
use crate::error::DecodeError;
use crate::reader::{TopLevelReader, TopLevelValue};
use crate::source::PushSource;

/// Bytes requested from the async reader per read.
const READ_CHUNK: usize = 4096;

/// Asynchronous push driver: feeds an `AsyncRead` into a
/// [`TopLevelReader`] and yields user values as they complete.
///
/// Each call to [`next`](Self::next) first tries to frame a value from
/// what is already buffered, and only reads another chunk when the engine
/// needs more input. Backpressure is natural: nothing is read until the
/// caller awaits the next value.
///
/// When the reader reports end of stream the framing engine is closed, so
/// a stream that stops part way through a value yields one final error.
///
/// # Example
///
/// ```rust,no_run
/// use ionframe_decoder::{BufferConfig, StreamingReader};
/// use tokio::io::AsyncRead;
///
/// async fn count_values(reader: impl AsyncRead + Unpin) -> usize {
///   let mut stream = StreamingReader::new(reader, BufferConfig::default());
///   let mut count = 0;
///   while let Some(_value) = stream.next().await.transpose().unwrap() {
///     count += 1;
///   }
///   count
/// }
/// ```
pub struct StreamingReader<R> {
  reader: R,
  frames: TopLevelReader<PushSource>,
  state: StreamState,
  chunk: Vec<u8>,
}

/// ```text
///   Reading → Done
/// ```
///
/// `Done` is entered at end of input, after any error, or when an
/// oversized symbol table stops the framing engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
  Reading,
  Done,
}

impl<R: AsyncRead + Unpin> StreamingReader<R> {
  #[must_use]
  pub fn new(reader: R, config: BufferConfig) -> Self {
    Self {
      reader,
      frames: TopLevelReader::new(config, PushSource::new()),
      state: StreamState::Reading,
      chunk: vec![0; READ_CHUNK],
    }
  }

  /// The next user value.
  ///
  /// Returns `Some(Ok(value))` for each value, `None` once the stream is
  /// exhausted, or `Some(Err(_))` once on a framing, I/O or truncation
  /// error, after which the stream is finished.
  pub async fn next(&mut self) -> Option<Result<TopLevelValue, DecodeError>> {
    loop {
      if self.state == StreamState::Done {
        return None;
      }

      match self.frames.next() {
        Ok(Some(value)) => return Some(Ok(value)),
        Ok(None) => {}
        Err(e) => return self.fail(e),
      }
      if self.frames.is_done() {
        self.state = StreamState::Done;
        return None;
      }

      let n = match self.reader.read(&mut self.chunk).await {
        Ok(n) => n,
        Err(e) => return self.fail(DecodeError::Io(e)),
      };
      if n == 0 {
        self.state = StreamState::Done;
        return self.frames.close().err().map(Err);
      }
      self.frames.source_mut().push(&self.chunk[..n]);
    }
  }

  /// The framing reader, for inspecting engine state.
  #[must_use]
  pub fn frames(&self) -> &TopLevelReader<PushSource> {
    &self.frames
  }

  fn fail(&mut self, error: DecodeError) -> Option<Result<TopLevelValue, DecodeError>> {
    self.state = StreamState::Done;
    Some(Err(error))
  }
}
