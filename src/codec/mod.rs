//! Binary value codec.
//!
//! Serializes a [`Value`] into a compact, self-describing buffer and back.
//! The socket protocol carries every payload in this format.
//!
//! # Format
//!
//! Each value is one tag byte followed by a kind-specific body. Lengths and
//! counts are 4-byte big-endian.
//!
//! | Kind | Tag | Body |
//! |------|-----|------|
//! | Null / Undefined | `0x00` / `0x01` | empty |
//! | Boolean | `0x12` | 1 byte, `1` = true |
//! | Number | `0x11` | length + decimal text |
//! | Date | `0x05` | length + ISO-8601 text |
//! | String | `0x10` | length + UTF-8 bytes |
//! | Array | `0x02` | count + tagged elements |
//! | Map | `0x06` | count + (length + key, tagged value) pairs |
//! | Blob | `0x04` | length + mime type, length + bytes |
//! | Typed array | `0x07`..=`0x0f` | length + raw bytes |
//!
//! # Example
//!
//! ```
//! use remote_workers::codec::{self, Value};
//!
//! let value = Value::Array(vec![Value::from("hello"), Value::from(42)]);
//! let bytes = codec::encode(&value)?;
//! assert_eq!(bytes.len(), codec::size_of(&value));
//! assert_eq!(codec::decode(&bytes)?, value);
//! # Ok::<(), remote_workers::CodecError>(())
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// serde bridge.
mod json;

/// Decoding.
mod reader;

/// Tag bytes.
pub mod tag;

/// Value model.
pub mod value;

/// Sizing and encoding.
mod writer;

// ============================================================================
// Re-exports
// ============================================================================

pub use reader::{decode, decode_at};
pub use tag::{Tag, TypedArrayKind};
pub use value::{Blob, TypedArray, Value};
pub use writer::{LENGTH_SIZE, MAX_DEPTH, TAG_SIZE, encode, encode_into, encode_with_prefix, size_of};

// ============================================================================
// Tests
// ============================================================================
