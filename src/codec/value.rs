//! The closed set of values the codec can carry.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};

use super::tag::{Tag, TypedArrayKind};

// ============================================================================
// Value
// ============================================================================

/// A structured value exchanged with a worker.
///
/// Values are owned trees, so cyclic structures cannot be built. Map keys
/// are kept sorted, which makes encoding deterministic; key order carries
/// no meaning.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Explicit absence of a value.
    #[default]
    Null,
    /// A value that was never set.
    Undefined,
    /// `true` or `false`.
    Boolean(bool),
    /// IEEE-754 double.
    Number(f64),
    /// UTF-8 text.
    String(String),
    /// Point in time (millisecond precision on the wire).
    Date(DateTime<Utc>),
    /// Ordered list.
    Array(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
    /// Binary blob with a mime type.
    Blob(Blob),
    /// Raw typed array bytes.
    TypedArray(TypedArray),
}

impl Value {
    /// Returns the tag this value is encoded with.
    #[must_use]
    pub fn tag(&self) -> Tag {
        match self {
            Self::Null => Tag::Null,
            Self::Undefined => Tag::Undefined,
            Self::Boolean(_) => Tag::Boolean,
            Self::Number(_) => Tag::Number,
            Self::String(_) => Tag::String,
            Self::Date(_) => Tag::Date,
            Self::Array(_) => Tag::Array,
            Self::Map(_) => Tag::Map,
            Self::Blob(_) => Tag::Blob,
            Self::TypedArray(array) => array.kind.tag(),
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for [`Value::Undefined`].
    #[inline]
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns the boolean, if this is one.
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements, if this is an array.
    #[inline]
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries, if this is a map.
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key when this is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    /// Magnitudes above 2^53 lose precision.
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Self::Date(date)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl From<Blob> for Value {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}

impl From<TypedArray> for Value {
    fn from(array: TypedArray) -> Self {
        Self::TypedArray(array)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ============================================================================
// Blob
// ============================================================================

/// Opaque bytes tagged with a mime type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob {
    /// Mime type, possibly empty.
    pub mime_type: String,
    /// Blob content.
    pub bytes: Vec<u8>,
}

impl Blob {
    /// Creates a blob.
    #[inline]
    #[must_use]
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

// ============================================================================
// TypedArray
// ============================================================================

/// Typed array content as raw little-endian element bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedArray {
    /// Element type.
    pub kind: TypedArrayKind,
    /// Raw element bytes; length must be a multiple of the element size.
    pub bytes: Vec<u8>,
}

impl TypedArray {
    /// Creates a typed array from raw bytes.
    #[inline]
    #[must_use]
    pub fn new(kind: TypedArrayKind, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
        }
    }

    /// Creates a `Uint8Array`.
    #[must_use]
    pub fn uint8(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(TypedArrayKind::Uint8, bytes)
    }

    /// Creates an `Int32Array`.
    #[must_use]
    pub fn int32(elements: &[i32]) -> Self {
        Self::new(
            TypedArrayKind::Int32,
            elements
                .iter()
                .flat_map(|e| e.to_le_bytes())
                .collect::<Vec<_>>(),
        )
    }

    /// Creates a `Float64Array`.
    #[must_use]
    pub fn float64(elements: &[f64]) -> Self {
        Self::new(
            TypedArrayKind::Float64,
            elements
                .iter()
                .flat_map(|e| e.to_le_bytes())
                .collect::<Vec<_>>(),
        )
    }

    /// Returns `true` when the byte length fits the element size.
    #[inline]
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.bytes.len() % self.kind.element_size() == 0
    }

    /// Returns the number of whole elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / self.kind.element_size()
    }

    /// Returns `true` if there are no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads every whole element widened to `f64`.
    #[must_use]
    pub fn elements(&self) -> Vec<f64> {
        let size = self.kind.element_size();
        self.bytes
            .chunks_exact(size)
            .map(|c| match self.kind {
                TypedArrayKind::Int8 => f64::from(c[0] as i8),
                TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => f64::from(c[0]),
                TypedArrayKind::Int16 => f64::from(i16::from_le_bytes([c[0], c[1]])),
                TypedArrayKind::Uint16 => f64::from(u16::from_le_bytes([c[0], c[1]])),
                TypedArrayKind::Int32 => f64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                TypedArrayKind::Uint32 => f64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                TypedArrayKind::Float32 => f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                TypedArrayKind::Float64 => {
                    f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                }
            })
            .collect()
    }
}

// ============================================================================
// Text Forms
// ============================================================================

/// Decimal text form of a number, as the coordinator's `String(n)` prints it.
///
/// Finite values use the shortest digits that parse back to the same bits,
/// in plain notation inside `[1e-7, 1e21)` and exponent notation (`1e+300`,
/// `5e-324`) outside it. Non-finite values use the `NaN` / `Infinity`
/// spellings.
pub(crate) struct NumberText(pub f64);

impl fmt::Display for NumberText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        if n.is_nan() {
            f.write_str("NaN")
        } else if n == f64::INFINITY {
            f.write_str("Infinity")
        } else if n == f64::NEG_INFINITY {
            f.write_str("-Infinity")
        } else if n == 0.0 || (1e-7..1e21).contains(&n.abs()) {
            write!(f, "{n}")
        } else {
            let text = format!("{n:e}");
            match text.split_once('e') {
                Some((digits, exponent)) if !exponent.starts_with('-') => {
                    write!(f, "{digits}e+{exponent}")
                }
                _ => f.write_str(&text),
            }
        }
    }
}

/// Parses the text produced by [`NumberText`] or by the coordinator.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => text.parse().ok(),
    }
}

/// ISO-8601 form of a date with millisecond precision.
///
/// Years 0 to 9999 print as four digits (`2024-01-02T03:04:05.678Z`); other
/// years use the signed six-digit form (`+010000-01-01T00:00:00.000Z`).
pub(crate) struct DateText<'a>(pub &'a DateTime<Utc>);

impl fmt::Display for DateText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        let year = d.year();
        if (0..=9999).contains(&year) {
            write!(f, "{year:04}")?;
        } else {
            write!(f, "{year:+07}")?;
        }
        write!(
            f,
            "-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            d.month(),
            d.day(),
            d.hour(),
            d.minute(),
            d.second(),
            d.timestamp_subsec_millis().min(999)
        )
    }
}

/// Parses RFC 3339 text or the signed six-digit year form.
pub(crate) fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_extended_year(text))
}

fn parse_extended_year(text: &str) -> Option<DateTime<Utc>> {
    let sign = match text.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = text.get(1..7)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = sign * digits.parse::<i32>().ok()?;

    // 2000 is a leap year, so Feb 29 parses here and `with_year` rejects it
    // for years that are not
    let rest = format!("2000{}", text.get(7..)?);
    NaiveDateTime::parse_from_str(&rest, "%Y-%m-%dT%H:%M:%S%.fZ")
        .ok()?
        .with_year(year)
        .map(|d| d.and_utc())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_text() {
        assert_eq!(NumberText(0.0).to_string(), "0");
        assert_eq!(NumberText(-3.0).to_string(), "-3");
        assert_eq!(NumberText(1.5).to_string(), "1.5");
        assert_eq!(NumberText(0.1).to_string(), "0.1");
        assert_eq!(NumberText(f64::NAN).to_string(), "NaN");
        assert_eq!(NumberText(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(NumberText(f64::NEG_INFINITY).to_string(), "-Infinity");
    }

    #[test]
    fn test_parse_number_accepts_exponent_form() {
        assert_eq!(parse_number("1e+21"), Some(1e21));
        assert_eq!(parse_number("-2.5e-7"), Some(-2.5e-7));
        assert_eq!(parse_number("Infinity"), Some(f64::INFINITY));
        assert!(parse_number("NaN").is_some_and(f64::is_nan));
        assert_eq!(parse_number("twelve"), None);
    }

    #[test]
    fn test_number_text_round_trips_exactly() {
        for n in [1.0 / 3.0, 9007199254740993.0, 1e300, -5e-324, 123456.789] {
            assert_eq!(parse_number(&NumberText(n).to_string()), Some(n));
        }
    }

    #[test]
    fn test_number_text_uses_exponent_outside_plain_window() {
        assert_eq!(NumberText(1e21).to_string(), "1e+21");
        assert_eq!(NumberText(1e300).to_string(), "1e+300");
        assert_eq!(NumberText(-1.5e300).to_string(), "-1.5e+300");
        assert_eq!(NumberText(5e-324).to_string(), "5e-324");
        assert_eq!(NumberText(1e-7).to_string(), "0.0000001");
        assert_eq!(NumberText(123e18).to_string(), "123000000000000000000");
        assert_eq!(parse_number(&NumberText(f64::MAX).to_string()), Some(f64::MAX));
    }

    #[test]
    fn test_extended_year_dates() {
        let far = DateTime::from_timestamp_millis(253_402_300_800_000).unwrap();
        assert_eq!(DateText(&far).to_string(), "+010000-01-01T00:00:00.000Z");
        assert_eq!(parse_date("+010000-01-01T00:00:00.000Z"), Some(far));

        let before_zero = DateTime::from_timestamp_millis(-62_167_219_200_001).unwrap();
        assert_eq!(DateText(&before_zero).to_string(), "-000001-12-31T23:59:59.999Z");
        assert_eq!(parse_date("-000001-12-31T23:59:59.999Z"), Some(before_zero));

        let year_zero = DateTime::from_timestamp_millis(-62_167_219_200_000).unwrap();
        assert_eq!(DateText(&year_zero).to_string(), "0000-01-01T00:00:00.000Z");
        assert_eq!(parse_date("0000-01-01T00:00:00.000Z"), Some(year_zero));
    }

    #[test]
    fn test_extended_year_rejects_bad_text() {
        assert_eq!(parse_date("+10000-01-01T00:00:00.000Z"), None);
        assert_eq!(parse_date("+010001-02-29T00:00:00.000Z"), None);
        assert!(parse_date("+010004-02-29T00:00:00.000Z").is_some());
        assert_eq!(parse_date("+01000a-01-01T00:00:00.000Z"), None);
    }

    #[test]
    fn test_date_text() {
        let date = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(DateText(&date).to_string(), "2023-11-14T22:13:20.123Z");
        assert_eq!(parse_date("2023-11-14T22:13:20.123Z"), Some(date));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_typed_array_elements() {
        let array = TypedArray::int32(&[-1, 2, 70000]);
        assert_eq!(array.len(), 3);
        assert!(array.is_aligned());
        assert_eq!(array.elements(), vec![-1.0, 2.0, 70000.0]);

        let array = TypedArray::new(TypedArrayKind::Int8, vec![0xff, 0x01]);
        assert_eq!(array.elements(), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_misaligned_typed_array() {
        let array = TypedArray::new(TypedArrayKind::Float64, vec![0; 7]);
        assert!(!array.is_aligned());
    }

    #[test]
    fn test_value_accessors() {
        let value: Value = [("name", Value::from("a.txt")), ("size", Value::from(3))]
            .into_iter()
            .collect();

        assert_eq!(value.tag(), Tag::Map);
        assert_eq!(value.get("name").and_then(Value::as_str), Some("a.txt"));
        assert_eq!(value.get("size").and_then(Value::as_f64), Some(3.0));
        assert_eq!(value.get("missing"), None);
        assert!(Value::from(None::<bool>).is_null());
    }
}
