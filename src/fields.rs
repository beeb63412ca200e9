//! # Field Types and Slot Decoders
//!
//! Every table column occupies a fixed-width slot inside the record. The
//! slot width is a function of the column type and its declared length:
//!
//! | Type | Slot width | Payload |
//! |------|------------|---------|
//! | `Binary` | `length` | raw bytes |
//! | `Boolean` | 1 | `0` = false, anything else = true |
//! | `Digit` | `(length + 2) / 2` rounded up | packed decimal, kept raw |
//! | `StrFix` | `length * 2` | exactly `length` UTF-16LE units |
//! | `StrVar` | `length * 2 + 2` | u16 actual length, then that many units |
//! | `Version` | 16 | four u32 words |
//! | `StrBlob` | 8 | u32 blob block index + u32 byte size |
//! | `BinBlob` | 8 | u32 blob block index + u32 byte size |
//! | `DateTime` | 7 | u16 year + five u8 fields |
//!
//! A nullable column prepends one presence byte to its slot: `0` means NULL
//! and the payload is not consumed. All integers are little-endian.
//!
//! Typed access goes through marker types implementing [`FieldKind`]; the
//! cursor checks the marker against the column's declared type before
//! decoding, so a `StrVar` slot can never be read as, say, a `DateTime`.
//!
//! Packed-decimal (`Digit`) payloads are kept as raw bytes; decoding the
//! digit nibbles is out of scope for this driver.

use eyre::{ensure, eyre, Result};

/// The closed set of column types a table descriptor can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Binary,
    Boolean,
    Digit,
    StrFix,
    StrVar,
    Version,
    StrBlob,
    BinBlob,
    DateTime,
}

impl FieldType {
    /// Payload slot width in bytes for a column of this type with declared
    /// `length`. The null presence byte, when any, comes on top.
    pub fn slot_size(self, length: usize) -> usize {
        match self {
            FieldType::Binary => length,
            FieldType::Boolean => 1,
            FieldType::Digit => (length + 2) / 2,
            FieldType::StrFix => length * 2,
            FieldType::StrVar => length * 2 + 2,
            FieldType::Version => 16,
            FieldType::StrBlob => 8,
            FieldType::BinBlob => 8,
            FieldType::DateTime => 7,
        }
    }
}

/// Column description as parsed from a table descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldParams {
    pub name: String,
    pub field_type: FieldType,
    /// Whether the slot carries a leading presence byte.
    pub null_exists: bool,
    pub length: usize,
    pub precision: usize,
    pub case_sensitive: bool,
}

/// A typed view over one field slot. Implementations are zero-sized markers;
/// [`Records::get`](crate::Records::get) picks the decoder by marker and
/// returns `Option<Value>` (`None` for NULL).
pub trait FieldKind {
    type Value;

    const TYPE: FieldType;

    /// Decodes the payload bytes of one slot. `buf` is exactly
    /// `TYPE.slot_size(params.length)` bytes, the presence byte (if any)
    /// already stripped by the cursor.
    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value>;
}

/// Four version words of unknown purpose, kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionValue {
    pub v1: u32,
    pub v2: u32,
    pub v3: u32,
    pub v4: u32,
}

/// Location of an out-of-row value: the first block of its chain in the
/// table's BLOB object, and its byte size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlobRef {
    pub index: u32,
    pub size: u32,
}

/// Calendar timestamp exactly as stored; the driver does not validate the
/// component ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTimeValue {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

pub enum Binary {}
pub enum Boolean {}
pub enum Digit {}
pub enum StrFix {}
pub enum StrVar {}
pub enum Version {}
pub enum StrBlob {}
pub enum BinBlob {}
pub enum DateTime {}

impl FieldKind for Binary {
    type Value = Vec<u8>;

    const TYPE: FieldType = FieldType::Binary;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        Ok(buf.to_vec())
    }
}

impl FieldKind for Boolean {
    type Value = bool;

    const TYPE: FieldType = FieldType::Boolean;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        Ok(buf[0] != 0)
    }
}

impl FieldKind for Digit {
    type Value = Vec<u8>;

    const TYPE: FieldType = FieldType::Digit;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        Ok(buf.to_vec())
    }
}

impl FieldKind for StrFix {
    type Value = String;

    const TYPE: FieldType = FieldType::StrFix;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        decode_utf16le(&buf[..params.length * 2])
    }
}

impl FieldKind for StrVar {
    type Value = String;

    const TYPE: FieldType = FieldType::StrVar;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        let actual = usize::from(u16::from_le_bytes([buf[0], buf[1]]));
        ensure!(
            actual <= params.length,
            "stored string length {} exceeds the declared {}",
            actual,
            params.length
        );

        decode_utf16le(&buf[2..2 + actual * 2])
    }
}

impl FieldKind for Version {
    type Value = VersionValue;

    const TYPE: FieldType = FieldType::Version;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        Ok(VersionValue {
            v1: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            v2: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            v3: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            v4: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }
}

impl FieldKind for StrBlob {
    type Value = BlobRef;

    const TYPE: FieldType = FieldType::StrBlob;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        Ok(decode_blob_ref(buf))
    }
}

impl FieldKind for BinBlob {
    type Value = BlobRef;

    const TYPE: FieldType = FieldType::BinBlob;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        Ok(decode_blob_ref(buf))
    }
}

impl FieldKind for DateTime {
    type Value = DateTimeValue;

    const TYPE: FieldType = FieldType::DateTime;

    fn decode(params: &FieldParams, buf: &[u8]) -> Result<Self::Value> {
        debug_assert_eq!(buf.len(), Self::TYPE.slot_size(params.length));

        Ok(DateTimeValue {
            year: u16::from_le_bytes([buf[0], buf[1]]),
            month: buf[2],
            day: buf[3],
            hour: buf[4],
            minute: buf[5],
            second: buf[6],
        })
    }
}

fn decode_blob_ref(buf: &[u8]) -> BlobRef {
    BlobRef {
        index: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
    }
}

fn decode_utf16le(buf: &[u8]) -> Result<String> {
    let units: Vec<u16> = buf
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|e| eyre!("invalid UTF-16 in string field: {e}"))
}
