//! Tag bytes identifying each encoded kind.
//!
//! Every encoded value starts with exactly one of these bytes. The values
//! are part of the wire format shared with the coordinator and must never
//! change. `0x03` is unassigned.

// ============================================================================
// Tag
// ============================================================================

/// Kind identifier written before every encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// `null`.
    Null = 0x00,
    /// `undefined`.
    Undefined = 0x01,
    /// Ordered list of values.
    Array = 0x02,
    /// Binary blob with a mime type.
    Blob = 0x04,
    /// Point in time, carried as ISO-8601 text.
    Date = 0x05,
    /// String-keyed map.
    Map = 0x06,
    /// Signed 8-bit typed array.
    Int8Array = 0x07,
    /// Unsigned 8-bit typed array.
    Uint8Array = 0x08,
    /// Clamped unsigned 8-bit typed array.
    Uint8ClampedArray = 0x09,
    /// Signed 16-bit typed array.
    Int16Array = 0x0a,
    /// Unsigned 16-bit typed array.
    Uint16Array = 0x0b,
    /// Signed 32-bit typed array.
    Int32Array = 0x0c,
    /// Unsigned 32-bit typed array.
    Uint32Array = 0x0d,
    /// 32-bit float typed array.
    Float32Array = 0x0e,
    /// 64-bit float typed array.
    Float64Array = 0x0f,
    /// UTF-8 string.
    String = 0x10,
    /// Number, carried as decimal text.
    Number = 0x11,
    /// Boolean.
    Boolean = 0x12,
}

impl Tag {
    /// Returns the wire byte.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a wire byte, returning `None` for unassigned values.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Null,
            0x01 => Self::Undefined,
            0x02 => Self::Array,
            0x04 => Self::Blob,
            0x05 => Self::Date,
            0x06 => Self::Map,
            0x07 => Self::Int8Array,
            0x08 => Self::Uint8Array,
            0x09 => Self::Uint8ClampedArray,
            0x0a => Self::Int16Array,
            0x0b => Self::Uint16Array,
            0x0c => Self::Int32Array,
            0x0d => Self::Uint32Array,
            0x0e => Self::Float32Array,
            0x0f => Self::Float64Array,
            0x10 => Self::String,
            0x11 => Self::Number,
            0x12 => Self::Boolean,
            _ => return None,
        })
    }

    /// Returns the typed array kind for typed array tags.
    #[must_use]
    pub const fn typed_array_kind(self) -> Option<TypedArrayKind> {
        Some(match self {
            Self::Int8Array => TypedArrayKind::Int8,
            Self::Uint8Array => TypedArrayKind::Uint8,
            Self::Uint8ClampedArray => TypedArrayKind::Uint8Clamped,
            Self::Int16Array => TypedArrayKind::Int16,
            Self::Uint16Array => TypedArrayKind::Uint16,
            Self::Int32Array => TypedArrayKind::Int32,
            Self::Uint32Array => TypedArrayKind::Uint32,
            Self::Float32Array => TypedArrayKind::Float32,
            Self::Float64Array => TypedArrayKind::Float64,
            _ => return None,
        })
    }
}

impl From<Tag> for u8 {
    #[inline]
    fn from(tag: Tag) -> Self {
        tag.as_u8()
    }
}

// ============================================================================
// TypedArrayKind
// ============================================================================

/// Element type of a typed array.
///
/// The kind travels in the tag byte; the body only carries raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedArrayKind {
    /// `i8` elements.
    Int8,
    /// `u8` elements.
    Uint8,
    /// `u8` elements, clamped on write by the producer.
    Uint8Clamped,
    /// `i16` elements.
    Int16,
    /// `u16` elements.
    Uint16,
    /// `i32` elements.
    Int32,
    /// `u32` elements.
    Uint32,
    /// `f32` elements.
    Float32,
    /// `f64` elements.
    Float64,
}

impl TypedArrayKind {
    /// All kinds, in tag order.
    pub const ALL: [Self; 9] = [
        Self::Int8,
        Self::Uint8,
        Self::Uint8Clamped,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Float32,
        Self::Float64,
    ];

    /// Returns the tag identifying this kind on the wire.
    #[must_use]
    pub const fn tag(self) -> Tag {
        match self {
            Self::Int8 => Tag::Int8Array,
            Self::Uint8 => Tag::Uint8Array,
            Self::Uint8Clamped => Tag::Uint8ClampedArray,
            Self::Int16 => Tag::Int16Array,
            Self::Uint16 => Tag::Uint16Array,
            Self::Int32 => Tag::Int32Array,
            Self::Uint32 => Tag::Uint32Array,
            Self::Float32 => Tag::Float32Array,
            Self::Float64 => Tag::Float64Array,
        }
    }

    /// Returns the size of one element in bytes.
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 | Self::Uint8Clamped => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Returns the conventional constructor name, e.g. `Float32Array`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "Int8Array",
            Self::Uint8 => "Uint8Array",
            Self::Uint8Clamped => "Uint8ClampedArray",
            Self::Int16 => "Int16Array",
            Self::Uint16 => "Uint16Array",
            Self::Int32 => "Int32Array",
            Self::Uint32 => "Uint32Array",
            Self::Float32 => "Float32Array",
            Self::Float64 => "Float64Array",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
