use ionframe_wire::TypeId;

/// Byte range of a symbol table struct's contents inside the buffer.
///
/// Zero or more of these queue up between two user values. A version
/// marker clears the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolTableMarker {
    /// First byte of the struct's fields.
    pub start: usize,
    /// First byte after the struct.
    pub end: usize,
}

impl SymbolTableMarker {
    #[must_use]
    pub fn new(start: usize, length: usize) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub(crate) fn shift_left(&mut self, shift: usize) {
        self.start = self.start.saturating_sub(shift);
        self.end = self.end.saturating_sub(shift);
    }
}

/// Where the current top-level unit sits in the buffer.
///
/// ```text
///   pre_header   post_header                     end
///   │ type ID,   │ representation                │ next unit
///   │ length,    │ (for annotated values: the    │
///   │ annotations│  wrapped value's header)      │
/// ```
///
/// Indices are only meaningful until the next `fill_input` call, which may
/// move the buffer's contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueMarker {
    pub(crate) pre_header: Option<usize>,
    pub(crate) post_header: usize,
    pub(crate) end: Option<usize>,
    pub(crate) type_id: Option<TypeId>,
    pub(crate) annotation_sids: Vec<u64>,
    pub(crate) is_system_value: bool,
    pub(crate) is_symbol_table_annotation_first: bool,
}

impl ValueMarker {
    pub(crate) fn reset(&mut self) {
        self.pre_header = None;
        self.post_header = 0;
        self.end = None;
        self.type_id = None;
        self.annotation_sids.clear();
        self.is_system_value = false;
        self.is_symbol_table_annotation_first = false;
    }

    pub(crate) fn shift_left(&mut self, shift: usize) {
        self.pre_header = self.pre_header.map(|i| i.saturating_sub(shift));
        self.post_header = self.post_header.saturating_sub(shift);
        self.end = self.end.map(|i| i.saturating_sub(shift));
    }

    /// Index of the type ID byte, or `None` before any header byte was read.
    #[must_use]
    pub fn pre_header(&self) -> Option<usize> {
        self.pre_header
    }

    /// Index of the first byte after the type ID, length and annotations.
    #[must_use]
    pub fn post_header(&self) -> usize {
        self.post_header
    }

    /// Index of the first byte after the unit, once it is complete.
    #[must_use]
    pub fn end(&self) -> Option<usize> {
        self.end
    }

    /// The unit's outermost type ID. For annotated values this is the
    /// annotation wrapper.
    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Annotation symbol IDs in wire order.
    #[must_use]
    pub fn annotation_sids(&self) -> &[u64] {
        &self.annotation_sids
    }

    /// True for version markers and symbol tables.
    #[must_use]
    pub fn is_system_value(&self) -> bool {
        self.is_system_value
    }

    /// True when the first annotation is `$ion_symbol_table`.
    #[must_use]
    pub fn is_symbol_table_annotation_first(&self) -> bool {
        self.is_symbol_table_annotation_first
    }
}
