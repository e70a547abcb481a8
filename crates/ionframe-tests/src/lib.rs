//! Shared helpers for the integration tests, benchmarks and golden
//! fixture generator.
//!
//! The helpers panic instead of returning errors: they only ever run under
//! a test harness, where a panic with a message is the useful outcome.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ionframe_decoder::{
    BufferConfig, BufferEventHandler, DecodeError, HandlerError, PushSource, TopLevelReader,
    TopLevelValue,
};

/// Everything a [`Recorder`] has been told.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Events {
    pub oversized_values: usize,
    pub oversized_symbol_tables: usize,
    pub bytes: usize,
}

/// A handler that counts events. Clones share the same counters, so a
/// test keeps one clone and hands the other to the engine.
#[derive(Clone, Debug, Default)]
pub struct Recorder(Rc<RefCell<Events>>);

impl Recorder {
    #[must_use]
    pub fn events(&self) -> Events {
        *self.0.borrow()
    }
}

impl BufferEventHandler for Recorder {
    fn on_oversized_value(&mut self) -> Result<(), HandlerError> {
        self.0.borrow_mut().oversized_values += 1;
        Ok(())
    }

    fn on_oversized_symbol_table(&mut self) -> Result<(), HandlerError> {
        self.0.borrow_mut().oversized_symbol_tables += 1;
        Ok(())
    }

    fn on_data(&mut self, bytes: usize) -> Result<(), HandlerError> {
        self.0.borrow_mut().bytes += bytes;
        Ok(())
    }
}

/// A configuration with the given sizes whose events go to the returned
/// recorder.
///
/// # Panics
///
/// Panics if the sizes are rejected.
#[must_use]
pub fn recording_config(initial: usize, maximum: usize) -> (BufferConfig, Recorder) {
    let recorder = Recorder::default();
    let config = BufferConfig::builder()
        .initial_buffer_size(initial)
        .maximum_buffer_size(maximum)
        .handler(recorder.clone())
        .build()
        .unwrap_or_else(|e| panic!("invalid test configuration: {e}"));
    (config, recorder)
}

/// Push `bytes` in fragments of the given sizes, collecting every value
/// surfaced along the way, then close the reader.
///
/// Once `sizes` runs out the rest is pushed in one piece. Zero-sized
/// fragments are allowed and push nothing.
///
/// # Errors
///
/// The first error from the reader, including close-time errors.
pub fn read_in_fragments(
    bytes: &[u8],
    config: BufferConfig,
    sizes: impl IntoIterator<Item = usize>,
) -> Result<Vec<TopLevelValue>, DecodeError> {
    let mut reader = TopLevelReader::new(config, PushSource::new());
    let mut values = Vec::new();
    let mut sizes = sizes.into_iter();
    let mut rest = bytes;
    loop {
        let n = sizes.next().unwrap_or(rest.len()).min(rest.len());
        reader.source_mut().push(&rest[..n]);
        rest = &rest[n..];
        while let Some(value) = reader.next()? {
            values.push(value);
        }
        if rest.is_empty() {
            break;
        }
    }
    reader.close()?;
    Ok(values)
}

/// Read a stream pushed in one piece.
///
/// # Errors
///
/// See [`read_in_fragments`].
pub fn read_whole(bytes: &[u8], config: BufferConfig) -> Result<Vec<TopLevelValue>, DecodeError> {
    read_in_fragments(bytes, config, [])
}

/// Read a stream pushed one byte at a time.
///
/// # Errors
///
/// See [`read_in_fragments`].
pub fn read_bytewise(bytes: &[u8], config: BufferConfig) -> Result<Vec<TopLevelValue>, DecodeError> {
    read_in_fragments(bytes, config, std::iter::repeat(1))
}

/// One line per value: data-model type, annotations, the symbol tables
/// that preceded it and its complete encoding.
#[must_use]
pub fn render(values: &[TopLevelValue]) -> String {
    values
        .iter()
        .map(|value| {
            let ion_type = value
                .ion_type
                .map_or_else(|| "none".to_owned(), |t| format!("{t:?}"));
            let tables: Vec<String> = value.symbol_tables.iter().map(hex::encode).collect();
            format!(
                "{ion_type} annotations={:?} symbol_tables=[{}] bytes={}",
                value.annotations,
                tables.join(", "),
                hex::encode(&value.bytes)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Directory holding the hex-encoded golden streams.
#[must_use]
pub fn golden_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/golden")
}

/// Decode `tests/golden/<name>.hex`. Whitespace in the file is ignored.
///
/// # Panics
///
/// Panics if the fixture is missing or is not valid hex.
#[must_use]
pub fn golden(name: &str) -> Vec<u8> {
    let path = golden_dir().join(format!("{name}.hex"));
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read golden fixture {}: {e}", path.display()));
    let digits: String = text.split_whitespace().collect();
    hex::decode(&digits).unwrap_or_else(|e| panic!("{} is not hex: {e}", path.display()))
}
