//! Decoding.
//!
//! Every read is bounds-checked; hostile input yields a [`CodecError`],
//! never a panic or an out-of-bounds access.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::error::CodecError;

use super::tag::Tag;
use super::value::{Blob, TypedArray, Value, parse_date, parse_number};
use super::writer::{LENGTH_SIZE, MAX_DEPTH};

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one value starting at offset 0.
///
/// Trailing bytes after the value are ignored.
///
/// # Errors
///
/// - [`CodecError::Truncated`] if a read runs past the end
/// - [`CodecError::UnknownTag`] for an unassigned tag byte
/// - [`CodecError::Malformed`] for invalid text, numbers, dates or nesting
pub fn decode(buf: &[u8]) -> Result<Value, CodecError> {
    decode_at(buf, 0).map(|(value, _)| value)
}

/// Decodes one value at `offset`, returning it with the offset just past it.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_at(buf: &[u8], offset: usize) -> Result<(Value, usize), CodecError> {
    let mut reader = Reader { buf, pos: offset };
    let value = reader.read_value(0)?;
    Ok((value, reader.pos))
}

// ============================================================================
// Reader
// ============================================================================

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(CodecError::truncated(self.pos, n, remaining));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_len(&mut self) -> Result<usize, CodecError> {
        let bytes = self.take(LENGTH_SIZE)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
    }

    fn read_string(&mut self, tag: Tag) -> Result<String, CodecError> {
        let len = self.read_len()?;
        let start = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CodecError::malformed(tag, start, format!("invalid UTF-8: {e}")))
    }

    fn read_value(&mut self, depth: usize) -> Result<Value, CodecError> {
        let tag_offset = self.pos;
        let byte = self.read_u8()?;
        let tag = Tag::from_u8(byte).ok_or(CodecError::UnknownTag {
            tag: byte,
            offset: tag_offset,
        })?;
        let body = self.pos;

        if depth >= MAX_DEPTH && matches!(tag, Tag::Array | Tag::Map) {
            return Err(CodecError::malformed(
                tag,
                body,
                format!("nesting deeper than {MAX_DEPTH}"),
            ));
        }

        let value = match tag {
            Tag::Null => Value::Null,
            Tag::Undefined => Value::Undefined,
            Tag::Boolean => Value::Boolean(self.read_u8()? == 1),
            Tag::String => Value::String(self.read_string(tag)?),
            Tag::Number => {
                let text = self.read_string(tag)?;
                let n = parse_number(&text).ok_or_else(|| {
                    CodecError::malformed(tag, body, format!("not a number: {text:?}"))
                })?;
                Value::Number(n)
            }
            Tag::Date => {
                let text = self.read_string(tag)?;
                let date = parse_date(&text).ok_or_else(|| {
                    CodecError::malformed(tag, body, format!("not an ISO-8601 date: {text:?}"))
                })?;
                Value::Date(date)
            }
            Tag::Array => {
                let count = self.read_len()?;
                // Each element takes at least one byte
                let mut items = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    items.push(self.read_value(depth + 1)?);
                }
                Value::Array(items)
            }
            Tag::Map => {
                let count = self.read_len()?;
                let mut map = BTreeMap::new();
                for _ in 0..count {
                    let key = self.read_string(tag)?;
                    let item = self.read_value(depth + 1)?;
                    map.insert(key, item);
                }
                Value::Map(map)
            }
            Tag::Blob => {
                let mime_type = self.read_string(tag)?;
                let len = self.read_len()?;
                let bytes = self.take(len)?.to_vec();
                Value::Blob(Blob { mime_type, bytes })
            }
            Tag::Int8Array
            | Tag::Uint8Array
            | Tag::Uint8ClampedArray
            | Tag::Int16Array
            | Tag::Uint16Array
            | Tag::Int32Array
            | Tag::Uint32Array
            | Tag::Float32Array
            | Tag::Float64Array => {
                let kind = tag
                    .typed_array_kind()
                    .ok_or_else(|| CodecError::malformed(tag, body, "not a typed array"))?;
                let len = self.read_len()?;
                let bytes = self.take(len)?.to_vec();
                let array = TypedArray { kind, bytes };
                if !array.is_aligned() {
                    return Err(CodecError::malformed(
                        tag,
                        body,
                        format!("{len} bytes is not a multiple of {}", kind.element_size()),
                    ));
                }
                Value::TypedArray(array)
            }
        };

        Ok(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
