use std::io::Read;

use ionframe_wire::header::ValueHeader;
use ionframe_wire::{HeaderKind, IonType, TypeId};
use log::trace;

use crate::config::BufferConfig;
use crate::error::DecodeError;
use crate::lookahead::LookaheadEngine;

/// A complete top-level user value, copied out of the engine's buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopLevelValue {
    /// The outermost type ID: the annotation wrapper for annotated values.
    pub type_id: TypeId,
    /// Data-model type of the value itself, looking through any wrapper.
    pub ion_type: Option<IonType>,
    /// Annotation symbol IDs, empty for unannotated values.
    pub annotations: Vec<u64>,
    /// Contents of the local symbol tables that preceded this value since
    /// the previous one, in stream order.
    pub symbol_tables: Vec<Vec<u8>>,
    /// The complete encoding, header included.
    pub bytes: Vec<u8>,
    /// Length of the type ID, length field and annotations.
    pub header_len: usize,
}

impl TopLevelValue {
    /// Everything after the header. For annotated values this starts with
    /// the wrapped value's own header.
    #[must_use]
    pub fn representation(&self) -> &[u8] {
        &self.bytes[self.header_len..]
    }

    #[must_use]
    pub fn is_annotated(&self) -> bool {
        !self.annotations.is_empty()
    }
}

/// Pulls user values out of a [`LookaheadEngine`] one at a time.
///
/// Each call to [`next`](Self::next) drives the engine, validates the
/// version marker and any wrapped value header, and hands back owned copies
/// of the value and of the symbol tables queued in front of it. The buffer
/// space is released as soon as the value is returned.
///
/// ```rust
/// use ionframe_decoder::{BufferConfig, TopLevelReader};
///
/// let bytes = [0xE0, 0x01, 0x00, 0xEA, 0x83, b'a', b'b', b'c', 0x11];
/// let mut reader = TopLevelReader::new(BufferConfig::default(), &bytes[..]);
///
/// let value = reader.next().unwrap().unwrap();
/// assert_eq!(value.representation(), b"abc");
/// assert_eq!(reader.next().unwrap().unwrap().bytes, vec![0x11]);
/// assert!(reader.next().unwrap().is_none());
/// reader.close().unwrap();
/// ```
pub struct TopLevelReader<R> {
    engine: LookaheadEngine<R>,
    replay: bool,
}

impl<R: Read> TopLevelReader<R> {
    #[must_use]
    pub fn new(config: BufferConfig, source: R) -> Self {
        Self {
            engine: LookaheadEngine::new(config, source),
            replay: false,
        }
    }

    /// The next complete user value.
    ///
    /// `None` means no complete value is buffered: either the source has
    /// nothing more right now, or the engine is done. After pushing more
    /// bytes into the source, call again.
    ///
    /// # Errors
    ///
    /// - Anything [`LookaheadEngine::fill_input`] raises, including
    ///   [`DecodeError::Wire`] for a version marker other than 1.0.
    /// - [`DecodeError::Wire`] for a malformed wrapped value header.
    /// - The annotation wrapper errors when the wrapped value is padding,
    ///   a version marker, another wrapper, or does not fill the wrapper.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<TopLevelValue>, DecodeError> {
        if self.replay {
            self.replay = false;
            return self.take_value(Vec::new()).map(Some);
        }

        self.engine.fill_input()?;
        if self.engine.more_data_required() {
            return Ok(None);
        }

        // The engine has already checked the version of every marker.
        self.engine.reset_ivm_index();
        let symbol_tables = self
            .engine
            .symbol_table_markers()
            .iter()
            .map(|marker| self.engine.buffered(marker.start..marker.end).to_vec())
            .collect();
        self.engine.reset_symbol_table_markers();

        self.take_value(symbol_tables).map(Some)
    }

    fn take_value(&mut self, symbol_tables: Vec<Vec<u8>>) -> Result<TopLevelValue, DecodeError> {
        let marker = self.engine.value_marker();
        let (Some(start), Some(end), Some(type_id)) = (marker.pre_header(), marker.end(), marker.type_id()) else {
            return Err(DecodeError::NoValueBuffered);
        };
        let header_len = marker.post_header() - start;
        let annotations = marker.annotation_sids().to_vec();
        let bytes = self.engine.buffered(start..end).to_vec();

        let ion_type = if type_id.is_annotation_wrapper() {
            wrapped_type(&bytes[header_len..])?
        } else {
            type_id.ion_type()
        };

        self.engine.consume_to(end);
        self.engine.reset_nop_pad_index();
        trace!("surfaced {} byte value", bytes.len());
        Ok(TopLevelValue {
            type_id,
            ion_type,
            annotations,
            symbol_tables,
            bytes,
            header_len,
        })
    }

    /// Present the value just returned by [`next`](Self::next) again.
    ///
    /// # Errors
    ///
    /// Same as [`LookaheadEngine::rewind_to_value_start`].
    pub fn rewind_to_value_start(&mut self) -> Result<(), DecodeError> {
        self.engine.rewind_to_value_start()?;
        self.replay = true;
        Ok(())
    }

    /// True once an oversized symbol table has stopped framing.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.engine.is_done()
    }

    /// Check that the stream did not end inside a value.
    ///
    /// # Errors
    ///
    /// Same as [`LookaheadEngine::close`].
    pub fn close(&mut self) -> Result<(), DecodeError> {
        self.engine.close()
    }

    #[must_use]
    pub fn engine(&self) -> &LookaheadEngine<R> {
        &self.engine
    }

    pub fn source_mut(&mut self) -> &mut R {
        self.engine.source_mut()
    }
}

/// Check the header of a value inside an annotation wrapper.
fn wrapped_type(wrapped: &[u8]) -> Result<Option<IonType>, DecodeError> {
    let header = ValueHeader::read_from(wrapped)?;
    match header.type_id.header_kind() {
        HeaderKind::VersionMarker => return Err(DecodeError::VersionMarkerInAnnotationWrapper),
        HeaderKind::AnnotationWrapper => return Err(DecodeError::NestedAnnotationWrapper),
        HeaderKind::NopPad => return Err(DecodeError::NopPadInAnnotationWrapper),
        HeaderKind::Invalid | HeaderKind::SingleByte | HeaderKind::Value => {}
    }
    if header.total_len() != wrapped.len() as u64 {
        return Err(DecodeError::AnnotationWrapperLengthMismatch {
            declared: wrapped.len() as u64,
            actual: header.total_len(),
        });
    }
    Ok(header.type_id.ion_type())
}
