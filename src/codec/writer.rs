//! Sizing and encoding.
//!
//! [`size_of`] and the writer walk the same tree with the same per-kind
//! rules, so `encode(v).len() == size_of(v)` always holds. Encoding is a
//! single depth-first pass into one pre-sized buffer.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::{self, Display, Write as _};

use crate::error::CodecError;

use super::value::{DateText, NumberText, Value};

// ============================================================================
// Constants
// ============================================================================

/// Size of the tag byte preceding every value.
pub const TAG_SIZE: usize = 1;

/// Size of a big-endian length or count field.
pub const LENGTH_SIZE: usize = 4;

/// Deepest container nesting accepted by both encode and decode.
///
/// Both directions recurse once per level, so this also bounds stack use
/// on a 2 MiB tokio worker thread in debug builds.
pub const MAX_DEPTH: usize = 128;

// ============================================================================
// Sizing
// ============================================================================

/// Returns the exact number of bytes [`encode`] produces for `value`.
///
/// Does not allocate the encoded buffer.
#[must_use]
pub fn size_of(value: &Value) -> usize {
    TAG_SIZE
        + match value {
            Value::Null | Value::Undefined => 0,
            Value::Boolean(_) => 1,
            Value::Number(n) => text_size(NumberText(*n)),
            Value::Date(d) => text_size(DateText(d)),
            Value::String(s) => LENGTH_SIZE + s.len(),
            Value::Array(items) => LENGTH_SIZE + items.iter().map(size_of).sum::<usize>(),
            Value::Map(map) => {
                LENGTH_SIZE
                    + map
                        .iter()
                        .map(|(k, v)| LENGTH_SIZE + k.len() + size_of(v))
                        .sum::<usize>()
            }
            Value::Blob(blob) => {
                LENGTH_SIZE + blob.mime_type.len() + LENGTH_SIZE + blob.bytes.len()
            }
            Value::TypedArray(array) => LENGTH_SIZE + array.bytes.len(),
        }
}

/// Length-prefixed size of a `Display` value's text.
fn text_size(text: impl Display) -> usize {
    let mut counter = Counter(0);
    // Counter never fails
    let _ = write!(counter, "{text}");
    LENGTH_SIZE + counter.0
}

struct Counter(usize);

impl fmt::Write for Counter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes `value` into a new buffer of exactly [`size_of`] bytes.
///
/// # Errors
///
/// [`CodecError::Unsupported`] if a length exceeds 32 bits, a typed array
/// is not a whole number of elements, or containers nest deeper than
/// [`MAX_DEPTH`]. No buffer is returned on error.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![0u8; size_of(value)];
    let written = encode_into(value, &mut buf)?;
    debug_assert_eq!(written, buf.len(), "size_of diverged from encode");
    Ok(buf)
}

/// Encodes `value` with one leading `prefix` byte before the tag.
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_with_prefix(value: &Value, prefix: u8) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![0u8; 1 + size_of(value)];
    buf[0] = prefix;
    encode_into(value, &mut buf[1..])?;
    Ok(buf)
}

/// Encodes `value` at the start of `dest`, returning the bytes written.
///
/// `dest` should be pre-sized with [`size_of`]; extra room is left
/// untouched.
///
/// # Errors
///
/// - [`CodecError::Truncated`] if `dest` is too small
/// - [`CodecError::Unsupported`] as for [`encode`]
pub fn encode_into(value: &Value, dest: &mut [u8]) -> Result<usize, CodecError> {
    let mut writer = Writer { buf: dest, pos: 0 };
    writer.write_value(value, 0)?;
    Ok(writer.pos)
}

// ============================================================================
// Writer
// ============================================================================

/// Cursor over a pre-sized destination buffer.
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn write_value(&mut self, value: &Value, depth: usize) -> Result<(), CodecError> {
        if depth >= MAX_DEPTH && matches!(value, Value::Array(_) | Value::Map(_)) {
            return Err(CodecError::unsupported(format!(
                "containers nested deeper than {MAX_DEPTH}"
            )));
        }

        self.put(&[value.tag().as_u8()])?;

        match value {
            Value::Null | Value::Undefined => Ok(()),
            Value::Boolean(b) => self.put(&[u8::from(*b)]),
            Value::Number(n) => self.put_text(NumberText(*n)),
            Value::Date(d) => self.put_text(DateText(d)),
            Value::String(s) => self.put_str(s),
            Value::Array(items) => {
                self.put_len(items.len(), "array length")?;
                items
                    .iter()
                    .try_for_each(|item| self.write_value(item, depth + 1))
            }
            Value::Map(map) => {
                self.put_len(map.len(), "map entry count")?;
                map.iter().try_for_each(|(key, item)| {
                    self.put_str(key)?;
                    self.write_value(item, depth + 1)
                })
            }
            Value::Blob(blob) => {
                self.put_str(&blob.mime_type)?;
                self.put_len(blob.bytes.len(), "blob size")?;
                self.put(&blob.bytes)
            }
            Value::TypedArray(array) => {
                if !array.is_aligned() {
                    return Err(CodecError::unsupported(format!(
                        "{} of {} bytes is not a whole number of {}-byte elements",
                        array.kind.name(),
                        array.bytes.len(),
                        array.kind.element_size()
                    )));
                }
                self.put_len(array.bytes.len(), "typed array size")?;
                self.put(&array.bytes)
            }
        }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let remaining = self.buf.len() - self.pos;
        if bytes.len() > remaining {
            return Err(CodecError::truncated(self.pos, bytes.len(), remaining));
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    fn put_len(&mut self, len: usize, what: &str) -> Result<(), CodecError> {
        let len = u32::try_from(len)
            .map_err(|_| CodecError::unsupported(format!("{what} {len} exceeds 32 bits")))?;
        self.put(&len.to_be_bytes())
    }

    fn put_str(&mut self, s: &str) -> Result<(), CodecError> {
        self.put_len(s.len(), "string length")?;
        self.put(s.as_bytes())
    }

    fn put_text(&mut self, text: impl Display) -> Result<(), CodecError> {
        self.put_str(&text.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
