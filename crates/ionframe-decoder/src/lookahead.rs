use std::io::Read;
use std::ops::Range;

use ionframe_wire::type_id::classify;
use ionframe_wire::varuint::{VarUIntDecoder, VarUIntLocation, VarUIntStep};
use ionframe_wire::version_marker::IVM_REMAINING_LENGTH;
use ionframe_wire::{HeaderKind, VersionMarker};
use log::{debug, trace, warn};

use crate::buffer::BoundedBuffer;
use crate::config::BufferConfig;
use crate::error::DecodeError;
use crate::handler::BufferEventHandler;
use crate::marker::{SymbolTableMarker, ValueMarker};
use crate::source;

/// Symbol ID of `$ion_symbol_table` in the system symbol table.
pub const ION_SYMBOL_TABLE_SID: u64 = 3;

/// Where the engine is inside the current top-level unit.
///
/// ```text
///   BeforeHeader ──► ReadingHeaderByte ──► ReadingHeaderFields
///        ▲                 │                 │            │
///        │                 │ (null, bool)    │  first annotation is
///        │◄────────────────┘                 │  $ion_symbol_table
///        │                                   │            ▼
///        │                                   │  ClassifyingPossibleSymbolTable
///        │                                   │      │ struct      │ other
///        │                                   │      ▼             │
///        │                                   │  ReadingSymbolTableLength
///        │                                   ▼      ▼             ▼
///        └─────────────────────────── SkippingOrBufferingValue
///
///   Done: an oversized symbol table was skipped; nothing more is framed.
/// ```
///
/// Every state but `BeforeHeader` and `Done` is a suspension point: the
/// engine returns there when the source runs dry and resumes from the
/// same place on the next [`LookaheadEngine::fill_input`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// At a unit boundary. A complete unit may be buffered.
    BeforeHeader,
    /// Waiting for the first byte of a unit.
    ReadingHeaderByte,
    /// Decoding a length, annotation length or annotation SID.
    ReadingHeaderFields,
    /// Reading the header of a value whose first annotation is
    /// `$ion_symbol_table` to see whether it is a struct.
    ClassifyingPossibleSymbolTable,
    /// Reading the length of a symbol table struct.
    ReadingSymbolTableLength,
    /// Buffering the representation, or discarding it if the unit is
    /// oversized or padding.
    SkippingOrBufferingValue,
    /// Terminal.
    Done,
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Frames top-level units of a binary Ion stream with a bounded buffer.
///
/// The engine reads just enough of each unit's header to know where it
/// ends, then buffers (or, when it cannot fit, discards) the rest. Version
/// markers, symbol tables and padding are consumed internally; the engine
/// only stops once a complete user value is buffered or the source has
/// nothing more to give right now.
///
/// ```text
///   source ──► BoundedBuffer ──► header classifier / VarUInt decoder
///                                          │
///                                          ▼
///            consumer ◄── ValueMarker, SymbolTableMarkers, IVM index
/// ```
///
/// When a unit needs more room than the maximum buffer size allows, the
/// engine first tries to reclaim padding that precedes it. Failing that it
/// skips the unit straight from the source and reports it to the
/// [`BufferEventHandler`] once.
///
/// # Example
///
/// ```rust
/// use ionframe_decoder::{BufferConfig, LookaheadEngine};
///
/// // Version marker followed by the int 5.
/// let bytes = [0xE0, 0x01, 0x00, 0xEA, 0x21, 0x05];
/// let mut engine = LookaheadEngine::new(BufferConfig::default(), &bytes[..]);
/// engine.fill_input().unwrap();
///
/// assert!(!engine.more_data_required());
/// let marker = engine.value_marker();
/// assert_eq!(marker.pre_header(), Some(4));
/// assert_eq!(marker.post_header(), 5);
/// assert_eq!(marker.end(), Some(6));
/// ```
pub struct LookaheadEngine<R> {
    source: R,
    buffer: BoundedBuffer,
    handler: Box<dyn BufferEventHandler>,
    page_size: usize,
    state: State,
    varuint: VarUIntDecoder,
    marker: ValueMarker,
    symbol_table_markers: Vec<SymbolTableMarker>,
    /// Bytes of the current unit still to be buffered or skipped.
    additional_bytes_needed: u64,
    annotation_sid_bytes_remaining: u64,
    peek_index: usize,
    /// Where the current unit starts, and how much was readable before
    /// it. Used to drop the unit from the buffer when it is skipped.
    value_start_write_index: usize,
    value_start_available: usize,
    /// Start of the run of padding right before the current unit.
    nop_pad_start: Option<usize>,
    /// Index of the byte after a version marker's `0xE0`.
    ivm_index: Option<usize>,
    skipping: bool,
    handler_needs_oversize_notification: bool,
    bytes_consumed: u64,
}

impl<R: Read> LookaheadEngine<R> {
    /// Create an engine reading from `source`.
    ///
    /// `source` returning `Ok(0)` means "nothing available right now".
    #[must_use]
    pub fn new(config: BufferConfig, source: R) -> Self {
        let page_size = config.page_size();
        let (initial, maximum, handler) = config.into_parts();
        Self {
            source,
            buffer: BoundedBuffer::new(initial, maximum),
            handler,
            page_size,
            state: State::BeforeHeader,
            varuint: VarUIntDecoder::new(VarUIntLocation::ValueLength),
            marker: ValueMarker::default(),
            symbol_table_markers: Vec::with_capacity(2),
            additional_bytes_needed: 0,
            annotation_sid_bytes_remaining: 0,
            peek_index: 0,
            value_start_write_index: 0,
            value_start_available: 0,
            nop_pad_start: None,
            ivm_index: None,
            skipping: false,
            handler_needs_oversize_notification: true,
            bytes_consumed: 0,
        }
    }

    /// Advance as far as possible without waiting for the source.
    ///
    /// Returns once a complete user value is buffered, the source has run
    /// dry, or the engine is [`Done`](State::Done). Check
    /// [`more_data_required`](Self::more_data_required) to tell which.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InvalidTypeId`] and the annotation wrapper errors
    ///   for malformed headers.
    /// - [`DecodeError::Wire`] for a VarUInt that does not fit 63 bits or
    ///   a version marker for anything but Ion 1.0.
    /// - [`DecodeError::Handler`] if the handler fails.
    /// - [`DecodeError::Io`] if the source fails.
    pub fn fill_input(&mut self) -> Result<(), DecodeError> {
        loop {
            let progressed = match self.state {
                State::Done => return Ok(()),
                State::BeforeHeader | State::ReadingHeaderByte => {
                    self.reset();
                    self.transition(State::ReadingHeaderByte);
                    self.read_type_id()?
                }
                State::ReadingHeaderFields => {
                    let complete = self.read_header_fields()?;
                    if complete {
                        self.marker.post_header = self.peek_index;
                    }
                    complete
                }
                State::ClassifyingPossibleSymbolTable => self.classify_wrapped_value()?,
                State::ReadingSymbolTableLength => self.read_symbol_table_length()?,
                State::SkippingOrBufferingValue => self.skip_or_buffer_value()?,
            };
            if !progressed {
                return Ok(());
            }
            if self.state == State::BeforeHeader && !self.finish_unit()? {
                return Ok(());
            }
        }
    }

    /// True unless a complete user value is buffered and unconsumed.
    #[must_use]
    pub fn more_data_required(&self) -> bool {
        self.buffer.available() == 0 || self.state != State::BeforeHeader
    }

    /// True once an oversized symbol table has stopped the engine.
    ///
    /// Distinct from end of input: a done engine ignores any further bytes.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// The most recent unit. Complete when
    /// [`more_data_required`](Self::more_data_required) is false.
    #[must_use]
    pub fn value_marker(&self) -> &ValueMarker {
        &self.marker
    }

    /// Symbol tables framed since the last reset, in stream order.
    #[must_use]
    pub fn symbol_table_markers(&self) -> &[SymbolTableMarker] {
        &self.symbol_table_markers
    }

    pub fn reset_symbol_table_markers(&mut self) {
        self.symbol_table_markers.clear();
    }

    /// Index of the second byte of the last version marker framed.
    #[must_use]
    pub fn ivm_index(&self) -> Option<usize> {
        self.ivm_index
    }

    pub fn reset_ivm_index(&mut self) {
        self.ivm_index = None;
    }

    /// Start of the padding run before the current unit, if it has not
    /// been reclaimed.
    #[must_use]
    pub fn nop_pad_start(&self) -> Option<usize> {
        self.nop_pad_start
    }

    pub fn reset_nop_pad_index(&mut self) {
        self.nop_pad_start = None;
    }

    /// Buffered bytes in `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` extends past the bytes received so far.
    #[must_use]
    pub fn buffered(&self, range: Range<usize>) -> &[u8] {
        self.buffer.bytes(range)
    }

    #[must_use]
    pub fn buffer(&self) -> &BoundedBuffer {
        &self.buffer
    }

    /// Framed bytes not yet consumed.
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.available()
    }

    #[must_use]
    pub fn read_index(&self) -> usize {
        self.buffer.read_index()
    }

    /// Consume framed bytes up to `index`.
    ///
    /// Padding before the consumed region can no longer be reclaimed.
    pub fn consume_to(&mut self, index: usize) {
        self.buffer.consume_to(index);
        if self
            .nop_pad_start
            .is_some_and(|start| start < self.buffer.read_index())
        {
            self.nop_pad_start = None;
        }
    }

    /// Bytes taken from the source so far, buffered or skipped.
    #[must_use]
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Make the current value readable again from its first byte.
    ///
    /// Only valid once everything before the value has been consumed;
    /// otherwise system values that precede it would be lost.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::NoValueBuffered`] if no unit has been framed.
    /// - [`DecodeError::RewindWouldDiscardSystemValues`] if bytes before the
    ///   value are still unconsumed.
    pub fn rewind_to_value_start(&mut self) -> Result<(), DecodeError> {
        let start = self.marker.pre_header.ok_or(DecodeError::NoValueBuffered)?;
        let available_at_start = self.buffer.boundary().saturating_sub(start);
        if available_at_start < self.buffer.available() {
            return Err(DecodeError::RewindWouldDiscardSystemValues);
        }
        self.buffer.rewind(start, available_at_start);
        Ok(())
    }

    /// Remember the read position. Everything from here on, including
    /// system values, stays buffered until [`rewind_to_mark`](Self::rewind_to_mark).
    pub fn mark(&mut self) {
        self.buffer.mark();
    }

    /// Return to the position saved by [`mark`](Self::mark).
    ///
    /// # Returns
    ///
    /// False if there was no mark.
    pub fn rewind_to_mark(&mut self) -> bool {
        self.buffer.rewind_to_mark()
    }

    /// Forget the mark so the bytes it held can be reclaimed.
    pub fn clear_mark(&mut self) {
        self.buffer.clear_mark();
    }

    /// Check that the stream did not end inside a unit.
    ///
    /// A stream that ends exactly at a unit boundary is fine, as is one
    /// that stopped in the terminal state.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::NopPadTooShort`] if it ended inside padding.
    /// - [`DecodeError::UnexpectedEof`] if it ended inside any other unit.
    pub fn close(&mut self) -> Result<(), DecodeError> {
        match self.state {
            State::Done | State::BeforeHeader | State::ReadingHeaderByte => Ok(()),
            _ => {
                let missing = self.additional_bytes_needed.max(1);
                if self.marker.type_id.is_some_and(|t| t.is_nop_pad) {
                    Err(DecodeError::NopPadTooShort { missing })
                } else {
                    Err(DecodeError::UnexpectedEof { missing })
                }
            }
        }
    }

    // ── Unit lifecycle ──────────────────────────────────────────────────

    fn transition(&mut self, next: State) {
        if self.state != next {
            trace!("{:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    fn reset(&mut self) {
        self.additional_bytes_needed = 0;
        self.annotation_sid_bytes_remaining = 0;
        self.marker.reset();
        self.skipping = false;
        self.value_start_write_index = self.peek_index;
        self.value_start_available = self.buffer.available();
    }

    /// Called when a unit has been fully buffered or skipped.
    ///
    /// # Returns
    ///
    /// True if framing should continue with the next unit.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Wire`] if the unit is a version marker for anything
    /// but Ion 1.0.
    fn finish_unit(&mut self) -> Result<bool, DecodeError> {
        self.marker.end = Some(self.peek_index);
        let is_nop_pad = self.marker.type_id.is_some_and(|t| t.is_nop_pad);
        let is_system = self.marker.is_system_value;
        if !(is_system || is_nop_pad || self.skipping) {
            trace!("user value complete at {}", self.peek_index);
            return Ok(false);
        }
        let is_ivm = self
            .marker
            .type_id
            .is_some_and(|t| t.header_kind() == HeaderKind::VersionMarker);
        if is_ivm
            && !self.skipping
            && let Some(index) = self.ivm_index
        {
            VersionMarker::read_tail(self.buffer.bytes(index..index + IVM_REMAINING_LENGTH))?;
        }
        if is_nop_pad && self.nop_pad_start.is_none() {
            self.nop_pad_start = self.marker.pre_header;
        }
        if is_system && self.skipping {
            warn!("symbol table exceeded the maximum buffer size; framing stopped");
            self.reset();
            self.transition(State::Done);
            return Ok(false);
        }
        // Keeps at most one run of padding in front of the next user value.
        if is_system && self.nop_pad_start.is_some() {
            self.reclaim_nop_padding();
        }
        Ok(true)
    }

    fn on_data(&mut self, bytes: usize) -> Result<(), DecodeError> {
        self.bytes_consumed += bytes as u64;
        self.handler.on_data(bytes).map_err(DecodeError::Handler)
    }

    // ── Headers ─────────────────────────────────────────────────────────

    /// Read the unit's type ID byte.
    ///
    /// # Returns
    ///
    /// False if no byte was available.
    fn read_type_id(&mut self) -> Result<bool, DecodeError> {
        let Some(byte) = self.read_header_byte()? else {
            return Ok(false);
        };
        let type_id = classify(byte);
        self.marker.type_id = Some(type_id);
        self.marker.pre_header = Some(self.value_start_write_index);
        self.marker.post_header = self.peek_index;

        match type_id.header_kind() {
            HeaderKind::VersionMarker => {
                self.additional_bytes_needed = IVM_REMAINING_LENGTH as u64;
                self.marker.is_system_value = true;
                // A version marker resets the symbol context.
                self.reset_symbol_table_markers();
                self.ivm_index = Some(self.peek_index);
                self.transition(State::SkippingOrBufferingValue);
            }
            HeaderKind::Invalid => {
                return Err(DecodeError::InvalidTypeId {
                    byte,
                    offset: self.bytes_consumed - 1,
                });
            }
            HeaderKind::SingleByte => self.transition(State::BeforeHeader),
            HeaderKind::AnnotationWrapper => {
                if type_id.is_variable_length {
                    self.start_varuint(VarUIntLocation::AnnotationWrapperLength);
                } else {
                    self.additional_bytes_needed = u64::from(type_id.length);
                    self.start_varuint(VarUIntLocation::AnnotationSidsLength);
                }
            }
            HeaderKind::NopPad | HeaderKind::Value => {
                if type_id.is_variable_length {
                    self.start_varuint(VarUIntLocation::ValueLength);
                } else {
                    self.additional_bytes_needed = u64::from(type_id.length);
                    self.transition(State::SkippingOrBufferingValue);
                }
            }
        }
        Ok(true)
    }

    fn start_varuint(&mut self, location: VarUIntLocation) {
        self.varuint.reset(location);
        self.transition(State::ReadingHeaderFields);
    }

    /// Decode the length and annotation fields that follow the type ID.
    ///
    /// # Returns
    ///
    /// False if the source ran dry part way through.
    fn read_header_fields(&mut self) -> Result<bool, DecodeError> {
        loop {
            let VarUIntStep::Complete(value) = self.read_varuint()? else {
                return Ok(false);
            };
            let width = self.varuint.bytes_read() as u64;
            match self.varuint.location() {
                VarUIntLocation::ValueLength => {
                    self.additional_bytes_needed = value;
                    self.transition(State::SkippingOrBufferingValue);
                    return Ok(true);
                }
                VarUIntLocation::AnnotationWrapperLength => {
                    self.additional_bytes_needed = value;
                    self.varuint.reset(VarUIntLocation::AnnotationSidsLength);
                }
                VarUIntLocation::AnnotationSidsLength => {
                    self.consume_wrapper_bytes(width)?;
                    if value == 0 {
                        return Err(DecodeError::EmptyAnnotations);
                    }
                    // The wrapped value needs at least one byte.
                    if value >= self.additional_bytes_needed {
                        return Err(DecodeError::AnnotationWrapperLengthMismatch {
                            declared: self.additional_bytes_needed,
                            actual: value + 1,
                        });
                    }
                    self.annotation_sid_bytes_remaining = value;
                    self.varuint.reset(VarUIntLocation::AnnotationSid);
                }
                VarUIntLocation::AnnotationSid => {
                    if self.marker.annotation_sids.is_empty() && value == ION_SYMBOL_TABLE_SID {
                        self.marker.is_symbol_table_annotation_first = true;
                    }
                    self.marker.annotation_sids.push(value);
                    self.annotation_sid_bytes_remaining = self
                        .annotation_sid_bytes_remaining
                        .checked_sub(width)
                        .ok_or(DecodeError::AnnotationWrapperLengthMismatch {
                            declared: self.annotation_sid_bytes_remaining,
                            actual: width,
                        })?;
                    self.consume_wrapper_bytes(width)?;
                    if self.annotation_sid_bytes_remaining > 0 {
                        self.varuint.reset(VarUIntLocation::AnnotationSid);
                        continue;
                    }
                    let next = if self.marker.is_symbol_table_annotation_first {
                        State::ClassifyingPossibleSymbolTable
                    } else {
                        State::SkippingOrBufferingValue
                    };
                    self.transition(next);
                    return Ok(true);
                }
            }
        }
    }

    /// Read the header byte of a value wrapped by `$ion_symbol_table`.
    fn classify_wrapped_value(&mut self) -> Result<bool, DecodeError> {
        let Some(byte) = self.read_header_byte()? else {
            return Ok(false);
        };
        let wrapped = classify(byte);
        match wrapped.header_kind() {
            HeaderKind::VersionMarker => return Err(DecodeError::VersionMarkerInAnnotationWrapper),
            HeaderKind::AnnotationWrapper => return Err(DecodeError::NestedAnnotationWrapper),
            HeaderKind::NopPad => return Err(DecodeError::NopPadInAnnotationWrapper),
            HeaderKind::Invalid => {
                return Err(DecodeError::InvalidTypeId {
                    byte,
                    offset: self.bytes_consumed - 1,
                });
            }
            HeaderKind::SingleByte | HeaderKind::Value => {}
        }
        self.consume_wrapper_bytes(1)?;

        if !wrapped.is_struct() {
            self.transition(State::SkippingOrBufferingValue);
            return Ok(true);
        }
        self.marker.is_system_value = true;
        if wrapped.is_variable_length {
            self.varuint.reset(VarUIntLocation::ValueLength);
            self.transition(State::ReadingSymbolTableLength);
        } else {
            // Covers null.struct too, whose length is zero.
            self.record_symbol_table(u64::from(wrapped.length))?;
        }
        Ok(true)
    }

    fn read_symbol_table_length(&mut self) -> Result<bool, DecodeError> {
        let VarUIntStep::Complete(length) = self.read_varuint()? else {
            return Ok(false);
        };
        self.consume_wrapper_bytes(self.varuint.bytes_read() as u64)?;
        self.record_symbol_table(length)?;
        Ok(true)
    }

    fn record_symbol_table(&mut self, length: u64) -> Result<(), DecodeError> {
        if length != self.additional_bytes_needed {
            return Err(DecodeError::AnnotationWrapperLengthMismatch {
                declared: self.additional_bytes_needed,
                actual: length,
            });
        }
        let marker = SymbolTableMarker::new(self.peek_index, to_usize(length));
        debug!("symbol table at {}..{}", marker.start, marker.end);
        self.symbol_table_markers.push(marker);
        self.transition(State::SkippingOrBufferingValue);
        Ok(())
    }

    /// Account for `n` header bytes read from inside an annotation wrapper.
    fn consume_wrapper_bytes(&mut self, n: u64) -> Result<(), DecodeError> {
        self.additional_bytes_needed = self.additional_bytes_needed.checked_sub(n).ok_or(
            DecodeError::AnnotationWrapperLengthMismatch {
                declared: self.additional_bytes_needed,
                actual: n,
            },
        )?;
        Ok(())
    }

    fn read_varuint(&mut self) -> Result<VarUIntStep, DecodeError> {
        let mut varuint = self.varuint;
        let step = varuint.step(|| self.read_header_byte());
        self.varuint = varuint;
        step
    }

    fn read_header_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        let byte = self.read_byte()?;
        if byte.is_some() {
            self.on_data(1)?;
        }
        Ok(byte)
    }

    /// Read one header byte, buffering it unless the unit is being skipped.
    fn read_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        if self.buffer.available_beyond_boundary() == 0 && self.fill_page(1)? == 0 {
            return Ok(None);
        }
        if self.skipping {
            return Ok(source::read_byte(&mut self.source)?);
        }
        let byte = self.buffer.peek(self.peek_index);
        self.buffer.extend_boundary(1);
        self.peek_index += 1;
        Ok(Some(byte))
    }

    // ── Representation ──────────────────────────────────────────────────

    fn skip_or_buffer_value(&mut self) -> Result<bool, DecodeError> {
        if self.marker.type_id.is_some_and(|t| t.is_nop_pad) {
            let beyond = self.buffer.available_beyond_boundary() as u64;
            if beyond <= self.additional_bytes_needed {
                // Nothing but padding is buffered past the boundary, so drop
                // it and skip the remainder straight from the source.
                self.additional_bytes_needed -= beyond;
                self.start_skipping();
                // Padding is never buffered, so it is never oversized.
                self.handler_needs_oversize_notification = false;
                if beyond > 0 {
                    self.on_data(to_usize(beyond))?;
                }
            }
        }

        while self.additional_bytes_needed > 0 {
            let beyond = self.buffer.available_beyond_boundary();
            let n = if beyond as u64 >= self.additional_bytes_needed {
                let n = to_usize(self.additional_bytes_needed);
                self.buffer.extend_boundary(n);
                self.peek_index += n;
                n
            } else {
                let n = self.fill_or_skip()?;
                if n == 0 {
                    return Ok(false);
                }
                n
            };
            self.on_data(n)?;
            self.additional_bytes_needed -= n as u64;
        }
        self.transition(State::BeforeHeader);
        Ok(true)
    }

    /// Buffer or skip more of the representation.
    ///
    /// # Returns
    ///
    /// Bytes of the unit accounted for, at most `additional_bytes_needed`.
    fn fill_or_skip(&mut self) -> Result<usize, DecodeError> {
        let beyond = self.buffer.available_beyond_boundary();
        let requested = to_usize(self.additional_bytes_needed) - beyond;
        let filled = if self.skipping {
            source::skip(&mut self.source, requested)?
        } else {
            self.fill_page(requested)?
        };

        if self.skipping {
            // Anything that was buffered past the boundary was dropped when
            // skipping began and counts as consumed.
            let consumed = filled + beyond;
            if consumed > 0 {
                self.notify_oversized()?;
            }
            return Ok(consumed);
        }

        let n = filled.min(to_usize(self.additional_bytes_needed));
        self.buffer.extend_boundary(n);
        self.peek_index += n;
        Ok(n)
    }

    // ── Overflow control ────────────────────────────────────────────────

    /// Make room for and receive up to a page of input.
    ///
    /// Decision order once the current capacity is full, counting bytes
    /// held by a mark:
    ///
    /// 1. grow by up to a page if the maximum allows `requested` more bytes;
    /// 2. reclaim the padding in front of the unit if that frees enough;
    /// 3. otherwise start skipping the unit.
    ///
    /// In skip mode nothing is buffered. While the representation is being
    /// skipped the bytes are discarded here; while header bytes are still
    /// needed, the returned count only tells `read_byte` to pull them from
    /// the source itself.
    fn fill_page(&mut self, requested: usize) -> Result<usize, DecodeError> {
        let mut amount = self.buffer.free();
        if amount == 0 {
            let space = self.buffer.maximum() - self.buffer.capacity();
            if requested > space {
                if self.reclaimable_padding() >= requested {
                    self.reclaim_nop_padding();
                } else {
                    self.start_skipping();
                }
                amount = requested;
            } else {
                amount = self.page_size.min(space);
            }
        }

        if self.skipping {
            if self.state == State::SkippingOrBufferingValue {
                return Ok(source::skip(&mut self.source, amount)?);
            }
            return Ok(amount);
        }

        let received = self.buffer.receive(&mut self.source, amount)?;
        if received.shift > 0 {
            self.shift_indices_left(None, received.shift);
        }
        Ok(received.bytes)
    }

    fn reclaimable_padding(&self) -> usize {
        match (self.nop_pad_start, self.marker.pre_header) {
            (Some(pad), Some(start)) => start.saturating_sub(pad),
            _ => 0,
        }
    }

    /// Remove the padding in front of the current unit from the buffer.
    fn reclaim_nop_padding(&mut self) {
        let (Some(pad), Some(start)) = (self.nop_pad_start, self.marker.pre_header) else {
            return;
        };
        let shift = self.buffer.consolidate(start, pad);
        self.shift_indices_left(Some(pad), shift);
        // The padding was readable, so it was counted as available.
        self.value_start_available = self.value_start_available.saturating_sub(shift);
        self.nop_pad_start = None;
        debug!("reclaimed {shift} bytes of padding at {pad}");
    }

    /// Rebase stored indices after buffer contents moved left by `shift`.
    ///
    /// With `after` set, only indices past it move; `None` moves everything.
    fn shift_indices_left(&mut self, after: Option<usize>, shift: usize) {
        let moves = |index: usize| after.is_none_or(|after| index > after);
        self.peek_index = self.peek_index.saturating_sub(shift);
        self.value_start_write_index = self.value_start_write_index.saturating_sub(shift);
        self.marker.shift_left(shift);
        for marker in &mut self.symbol_table_markers {
            if moves(marker.start) {
                marker.shift_left(shift);
            }
        }
        if let Some(index) = self.ivm_index.filter(|&index| moves(index)) {
            self.ivm_index = Some(index.saturating_sub(shift));
        }
        if after.is_none() {
            self.nop_pad_start = self.nop_pad_start.map(|index| index.saturating_sub(shift));
        }
        trace!("shifted indices left by {shift}");
    }

    fn start_skipping(&mut self) {
        if !self.skipping {
            debug!(
                "unit at {} does not fit in {} bytes; skipping",
                self.value_start_write_index,
                self.buffer.maximum()
            );
        }
        self.skipping = true;
        self.truncate_to_value_start();
    }

    /// Drop the current unit's bytes from the buffer.
    fn truncate_to_value_start(&mut self) {
        self.peek_index = self.value_start_write_index;
        self.buffer
            .truncate(self.value_start_write_index, self.value_start_available);
        self.handler_needs_oversize_notification = true;
    }

    fn notify_oversized(&mut self) -> Result<(), DecodeError> {
        if !self.handler_needs_oversize_notification {
            return Ok(());
        }
        self.handler_needs_oversize_notification = false;
        let result = if self.marker.is_system_value {
            warn!("oversized symbol table");
            self.handler.on_oversized_symbol_table()
        } else {
            debug!("oversized value");
            self.handler.on_oversized_value()
        };
        result.map_err(DecodeError::Handler)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use ionframe_wire::WireError;

    use crate::error::HandlerError;
    use crate::source::PushSource;

    const IVM: [u8; 4] = [0xE0, 0x01, 0x00, 0xEA];

    #[derive(Debug, Default)]
    struct Events {
        oversized_values: usize,
        oversized_symbol_tables: usize,
        bytes: usize,
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Events>>);

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

    fn stream(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    fn unbounded(bytes: &[u8]) -> LookaheadEngine<PushSource> {
        let mut source = PushSource::new();
        source.push(bytes);
        LookaheadEngine::new(BufferConfig::default(), source)
    }

    fn bounded(bytes: &[u8], initial: usize, maximum: usize) -> (LookaheadEngine<PushSource>, Recorder) {
        let recorder = Recorder::default();
        let config = BufferConfig::builder()
            .initial_buffer_size(initial)
            .maximum_buffer_size(maximum)
            .handler(recorder.clone())
            .build()
            .unwrap();
        let mut source = PushSource::new();
        source.push(bytes);
        (LookaheadEngine::new(config, source), recorder)
    }

    /// The bytes of the current value, consuming it.
    fn take(engine: &mut LookaheadEngine<PushSource>) -> Vec<u8> {
        let marker = engine.value_marker();
        let range = marker.pre_header().unwrap()..marker.end().unwrap();
        let bytes = engine.buffered(range.clone()).to_vec();
        engine.consume_to(range.end);
        engine.reset_symbol_table_markers();
        engine.reset_ivm_index();
        engine.reset_nop_pad_index();
        bytes
    }

    #[test]
    fn frames_a_value_after_the_version_marker() {
        let mut engine = unbounded(&stream(&[&IVM, &[0x21, 0x05]]));
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        assert_eq!(engine.ivm_index(), Some(1));
        assert_eq!(engine.value_marker().post_header(), 5);
        assert_eq!(take(&mut engine), vec![0x21, 0x05]);

        engine.fill_input().unwrap();
        assert!(engine.more_data_required());
        assert_eq!(engine.state(), State::ReadingHeaderByte);
        engine.close().unwrap();
    }

    #[test]
    fn single_byte_values_have_no_representation() {
        let mut engine = unbounded(&stream(&[&IVM, &[0x11, 0x0F, 0x8F]]));
        for expected in [0x11, 0x0F, 0x8F] {
            engine.fill_input().unwrap();
            let marker = engine.value_marker();
            assert_eq!(marker.post_header(), marker.end().unwrap());
            assert_eq!(take(&mut engine), vec![expected]);
        }
    }

    #[test]
    fn padding_is_consumed_silently() {
        // One-byte pad, two-byte pad, then int 0.
        let mut engine = unbounded(&stream(&[&IVM, &[0x00], &[0x01, 0xFF], &[0x20]]));
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        assert_eq!(engine.value_marker().pre_header(), Some(7));
        assert_eq!(engine.nop_pad_start(), Some(4));
        assert_eq!(take(&mut engine), vec![0x20]);
    }

    #[test]
    fn variable_length_value_suspends_and_resumes() {
        let bytes = stream(&[&IVM, &[0x8E, 0x8E], b"abcdefghijklmn"]);
        let mut engine = LookaheadEngine::new(BufferConfig::default(), PushSource::new());
        for (i, byte) in bytes.iter().enumerate() {
            engine.fill_input().unwrap();
            assert!(engine.more_data_required(), "complete after {i} bytes");
            engine.source_mut().push(&[*byte]);
        }
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        let marker = engine.value_marker();
        assert_eq!(marker.post_header() - marker.pre_header().unwrap(), 2);
        assert_eq!(engine.bytes_consumed(), bytes.len() as u64);
    }

    #[test]
    fn symbol_table_is_recorded_and_consumed() {
        let symbol_table = [0xEB, 0x81, 0x83, 0xD8, 0x87, 0xB6, 0x85, b'h', b'e', b'l', b'l', b'o'];
        let mut engine = unbounded(&stream(&[&IVM, &symbol_table, &[0x71, 0x0A]]));
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        let markers = engine.symbol_table_markers().to_vec();
        assert_eq!(markers, vec![SymbolTableMarker { start: 8, end: 16 }]);
        assert_eq!(engine.buffered(8..16), &symbol_table[4..]);
        assert!(engine.value_marker().annotation_sids().is_empty());
        assert_eq!(take(&mut engine), vec![0x71, 0x0A]);
    }

    #[test]
    fn version_marker_clears_queued_symbol_tables() {
        let symbol_table = [0xE4, 0x81, 0x83, 0xD1, 0x80];
        let mut engine = unbounded(&stream(&[&IVM, &symbol_table, &IVM, &IVM, &[0x20]]));
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        assert!(engine.symbol_table_markers().is_empty());
        assert_eq!(engine.ivm_index(), Some(14));
    }

    #[test]
    fn only_the_first_annotation_marks_a_symbol_table() {
        let mut engine = unbounded(&stream(&[&IVM, &[0xE4, 0x82, 0x84, 0x83, 0xD0]]));
        engine.fill_input().unwrap();
        let marker = engine.value_marker();
        assert!(!marker.is_system_value());
        assert!(!marker.is_symbol_table_annotation_first());
        assert_eq!(marker.annotation_sids(), &[4, 3]);
        assert!(engine.symbol_table_markers().is_empty());
    }

    #[test]
    fn null_struct_symbol_table_is_empty() {
        let mut engine = unbounded(&stream(&[&IVM, &[0xE3, 0x81, 0x83, 0xDF], &[0x20]]));
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        assert_eq!(engine.symbol_table_markers(), &[SymbolTableMarker { start: 8, end: 8 }]);
        assert_eq!(take(&mut engine), vec![0x20]);
    }

    #[test]
    fn symbol_table_annotation_on_a_non_struct_is_a_user_value() {
        let mut engine = unbounded(&stream(&[&IVM, &[0xE4, 0x81, 0x83, 0x21, 0x7B]]));
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        let marker = engine.value_marker();
        assert!(!marker.is_system_value());
        assert!(marker.is_symbol_table_annotation_first());
        assert_eq!(marker.post_header(), 7);
        assert_eq!(marker.end(), Some(9));
    }

    #[test]
    fn invalid_type_id_fails_immediately() {
        let mut engine = unbounded(&stream(&[&IVM, &[0xF0]]));
        assert!(matches!(
            engine.fill_input(),
            Err(DecodeError::InvalidTypeId { byte: 0xF0, offset: 4 })
        ));
    }

    #[test]
    fn over_long_length_fails() {
        let mut engine = unbounded(&stream(&[&IVM, &[0x8E], &[0x00; 9]]));
        assert!(matches!(
            engine.fill_input(),
            Err(DecodeError::Wire(ionframe_wire::WireError::VarUIntTooLarge))
        ));
    }

    #[test]
    fn malformed_annotation_wrappers() {
        let cases: [(&[u8], fn(&DecodeError) -> bool); 6] = [
            (&[0xE3, 0x80, 0x21, 0x01], |e| matches!(e, DecodeError::EmptyAnnotations)),
            (&[0xE3, 0x83, 0x84, 0x85, 0x86], |e| {
                matches!(e, DecodeError::AnnotationWrapperLengthMismatch { declared: 2, actual: 4 })
            }),
            (&[0xE4, 0x81, 0x83, 0xE3], |e| matches!(e, DecodeError::NestedAnnotationWrapper)),
            (&[0xE3, 0x81, 0x83, 0x00], |e| matches!(e, DecodeError::NopPadInAnnotationWrapper)),
            (&[0xE6, 0x81, 0x83, 0xE0, 0x01, 0x00, 0xEA], |e| {
                matches!(e, DecodeError::VersionMarkerInAnnotationWrapper)
            }),
            (&[0xE5, 0x81, 0x83, 0xD3, 0x81, 0x20], |e| {
                matches!(e, DecodeError::AnnotationWrapperLengthMismatch { declared: 2, actual: 3 })
            }),
        ];
        for (wrapper, check) in cases {
            let mut engine = unbounded(&stream(&[&IVM, wrapper]));
            let err = engine.fill_input().unwrap_err();
            assert!(check(&err), "{wrapper:02X?} gave {err:?}");
        }
    }

    #[test]
    fn oversized_value_is_skipped_and_reported_once() {
        let alphabet = b"abcdefghijklmnopqrstuvwxyz";
        let bytes = stream(&[&IVM, &[0x8E, 0x9A], alphabet, &[0x83], b"abc"]);
        let (mut engine, recorder) = bounded(&bytes, 8, 16);
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        assert_eq!(take(&mut engine), [&[0x83][..], b"abc"].concat());
        let events = recorder.0.borrow();
        assert_eq!(events.oversized_values, 1);
        assert_eq!(events.oversized_symbol_tables, 0);
        assert_eq!(events.bytes, bytes.len());
    }

    #[test]
    fn oversized_symbol_table_stops_framing() {
        let mut symbol_table = vec![0xEE, 0x97, 0x81, 0x83, 0xDE, 0x93];
        symbol_table.extend([0u8; 19]);
        let bytes = stream(&[&IVM, &symbol_table, &[0x21, 0x01]]);
        let (mut engine, recorder) = bounded(&bytes, 8, 8);
        engine.fill_input().unwrap();
        assert!(engine.is_done());
        assert!(engine.more_data_required());
        engine.fill_input().unwrap();
        assert!(engine.is_done());
        engine.close().unwrap();
        let events = recorder.0.borrow();
        assert_eq!(events.oversized_symbol_tables, 1);
        assert_eq!(events.oversized_values, 0);
    }

    #[test]
    fn padding_is_reclaimed_to_fit_a_value() {
        let bytes = stream(&[&IVM, &[0x03, 0x00, 0x00, 0x00], &[0x21, 0x01]]);
        let (mut engine, recorder) = bounded(&bytes, 9, 9);
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        assert_eq!(engine.nop_pad_start(), None);
        assert_eq!(engine.value_marker().pre_header(), Some(4));
        assert_eq!(engine.ivm_index(), Some(1));
        assert_eq!(take(&mut engine), vec![0x21, 0x01]);
        assert_eq!(recorder.0.borrow().oversized_values, 0);
    }

    #[test]
    fn padding_too_small_to_help_does_not_prevent_oversize() {
        let bytes = stream(&[&IVM, &[0x00], &[0x85], b"abcde"]);
        let (mut engine, recorder) = bounded(&bytes, 9, 9);
        engine.fill_input().unwrap();
        assert!(engine.more_data_required());
        assert_eq!(recorder.0.borrow().oversized_values, 1);
        assert_eq!(recorder.0.borrow().bytes, bytes.len());
    }

    #[test]
    fn padding_filling_the_buffer_is_never_oversized() {
        let bytes = stream(&[&IVM, &[0x0E, 0x8A], &[0u8; 10], &[0x20]]);
        let (mut engine, recorder) = bounded(&bytes, 8, 8);
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        assert_eq!(take(&mut engine), vec![0x20]);
        let events = recorder.0.borrow();
        assert_eq!(events.oversized_values, 0);
        assert_eq!(events.bytes, bytes.len());
    }

    #[test]
    fn consolidation_rebases_queued_markers() {
        let symbol_table = [0xE7, 0x81, 0x83, 0xD4, 0x87, 0xB2, 0x81, b'a'];
        let mut engine = LookaheadEngine::new(
            BufferConfig::builder().initial_buffer_size(16).build().unwrap(),
            PushSource::new(),
        );
        engine.source_mut().push(&stream(&[&IVM, &[0x21, 0x01], &symbol_table]));
        engine.fill_input().unwrap();
        assert_eq!(take(&mut engine), vec![0x21, 0x01]);

        // Frames the symbol table, then moves it left while making room.
        engine.fill_input().unwrap();
        assert!(engine.more_data_required());
        assert_eq!(engine.symbol_table_markers(), &[SymbolTableMarker { start: 4, end: 8 }]);

        engine.source_mut().push(&[0x71, 0x0A]);
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        let marker = engine.symbol_table_markers()[0];
        assert_eq!(engine.buffered(marker.start..marker.end), &symbol_table[4..]);
        assert_eq!(take(&mut engine), vec![0x71, 0x0A]);
    }

    #[test]
    fn rewind_to_value_start() {
        let mut engine = unbounded(&stream(&[&IVM, &[0x21, 0x05]]));
        assert!(matches!(
            engine.rewind_to_value_start(),
            Err(DecodeError::NoValueBuffered)
        ));
        engine.fill_input().unwrap();
        // The version marker has not been consumed yet.
        assert!(matches!(
            engine.rewind_to_value_start(),
            Err(DecodeError::RewindWouldDiscardSystemValues)
        ));
        take(&mut engine);
        engine.rewind_to_value_start().unwrap();
        assert_eq!(engine.read_index(), 4);
        assert_eq!(engine.available(), 2);
    }

    #[test]
    fn mark_and_rewind() {
        let mut engine = unbounded(&stream(&[&IVM, &[0x21, 0x05]]));
        engine.fill_input().unwrap();
        engine.mark();
        take(&mut engine);
        assert_eq!(engine.available(), 0);
        assert!(engine.rewind_to_mark());
        assert_eq!(engine.available(), 6);
        assert!(!engine.rewind_to_mark());

        engine.mark();
        engine.clear_mark();
        assert!(!engine.rewind_to_mark());
    }

    /// Bytes held by a mark leave no room, so a unit that needs more goes
    /// through the overflow policy instead of waiting for space forever.
    #[test]
    fn held_mark_counts_against_the_maximum() {
        let (mut engine, recorder) = bounded(&stream(&[&IVM, &[0x21, 0x05]]), 8, 8);
        engine.fill_input().unwrap();
        engine.mark();
        assert_eq!(take(&mut engine), [0x21, 0x05]);

        engine.source_mut().push(&[0x83, b'a', b'b', b'c', 0x20]);
        engine.fill_input().unwrap();
        assert!(!engine.more_data_required());
        assert_eq!(take(&mut engine), [0x20]);
        {
            let events = recorder.0.borrow();
            assert_eq!(events.oversized_values, 1);
            assert_eq!(events.bytes, 11);
        }

        assert!(engine.rewind_to_mark());
        assert_eq!(engine.buffered(0..6), stream(&[&IVM, &[0x21, 0x05]]));
    }

    #[test]
    fn every_version_marker_is_validated() {
        let mut engine = unbounded(&stream(&[&[0xE0, 0x02, 0x00, 0xEA], &IVM, &[0x20]]));
        assert!(matches!(
            engine.fill_input(),
            Err(DecodeError::Wire(WireError::UnsupportedVersion { major: 2, minor: 0 }))
        ));

        let mut engine = unbounded(&stream(&[&IVM, &[0x21, 0x05], &[0xE0, 0x01, 0x01, 0xEA]]));
        engine.fill_input().unwrap();
        assert_eq!(take(&mut engine), [0x21, 0x05]);
        assert!(matches!(
            engine.fill_input(),
            Err(DecodeError::Wire(WireError::UnsupportedVersion { major: 1, minor: 1 }))
        ));
    }

    #[test]
    fn close_reports_incomplete_units() {
        let mut engine = unbounded(&stream(&[&IVM, &[0x83, b'a']]));
        engine.fill_input().unwrap();
        assert!(matches!(
            engine.close(),
            Err(DecodeError::UnexpectedEof { missing: 2 })
        ));

        let mut engine = unbounded(&stream(&[&IVM, &[0x0E, 0x90], &[0u8; 15]]));
        engine.fill_input().unwrap();
        assert!(matches!(
            engine.close(),
            Err(DecodeError::NopPadTooShort { missing: 1 })
        ));
    }

    #[test]
    fn handler_errors_propagate() {
        struct Refuse;
        impl BufferEventHandler for Refuse {
            fn on_data(&mut self, _: usize) -> Result<(), HandlerError> {
                Err("no more".into())
            }
        }
        let config = BufferConfig::builder().handler(Refuse).build().unwrap();
        let mut engine = LookaheadEngine::new(config, &IVM[..]);
        assert!(matches!(engine.fill_input(), Err(DecodeError::Handler(_))));
    }

    fn frame_in_fragments(bytes: &[u8], cuts: &[u8]) -> Vec<Vec<u8>> {
        let mut engine = LookaheadEngine::new(
            BufferConfig::builder().initial_buffer_size(8).build().unwrap(),
            PushSource::new(),
        );
        let mut values = Vec::new();
        let mut rest = bytes;
        let mut cuts = cuts.iter().map(|&c| usize::from(c % 7) + 1);
        while !rest.is_empty() {
            let n = cuts.next().unwrap_or(rest.len()).min(rest.len());
            engine.source_mut().push(&rest[..n]);
            rest = &rest[n..];
            loop {
                engine.fill_input().unwrap();
                if engine.more_data_required() {
                    break;
                }
                values.push(take(&mut engine));
            }
        }
        engine.close().unwrap();
        values
    }

    fn mixed_stream() -> Vec<u8> {
        stream(&[
            &IVM,
            &[0x00, 0x01, 0xFF],
            &[0xEB, 0x81, 0x83, 0xD8, 0x87, 0xB6, 0x85, b'h', b'e', b'l', b'l', b'o'],
            &[0x71, 0x0A],
            &[0xE4, 0x82, 0x84, 0x83, 0xD0],
            &[0x8E, 0x8E],
            b"abcdefghijklmn",
            &IVM,
            &[0x11, 0x2F],
        ])
    }

    /// Feeding a stream in arbitrary fragments frames the same values as
    /// feeding it whole.
    #[test]
    fn fragmentation_does_not_change_framing() {
        fn prop(cuts: Vec<u8>) -> bool {
            let bytes = mixed_stream();
            frame_in_fragments(&bytes, &cuts) == frame_in_fragments(&bytes, &[])
        }
        assert_eq!(frame_in_fragments(&mixed_stream(), &[]).len(), 5);
        quickcheck::quickcheck(prop as fn(Vec<u8>) -> bool);
    }
}
