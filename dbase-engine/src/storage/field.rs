//! Field descriptors and the field descriptor table
//!
//! The descriptor table follows the 32-byte header: one 32-byte descriptor per
//! field, a 0x0D terminator, then a dialect-defined block of reserved bytes.
//!
//! Descriptor layout:
//! - Offset 0x00: name (11 bytes, NUL padded)
//! - Offset 0x0B: type tag (ASCII)
//! - Offset 0x0C: displacement of the field in the record (u32)
//! - Offset 0x10: length
//! - Offset 0x11: decimal count
//! - Offset 0x12: field flags
//! - Offset 0x13: 13 reserved bytes

use std::fmt;
use std::io::{Read, Write};

use crate::error::{DbfError, DbfResult};
use crate::text::TextCodec;

use super::codec;
use super::header::DialectLayout;

/// Byte terminating the field descriptor table
pub const FIELD_TERMINATOR: u8 = 0x0D;

/// Field data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Space-padded text
    Character,
    /// ASCII number with fixed decimals
    Numeric,
    /// ASCII floating point number
    Float,
    /// YYYYMMDD
    Date,
    /// Y/N/T/F/?
    Logical,
    /// Offset into the memo file
    Memo,
    /// Little-endian i32
    Integer,
    /// Little-endian i64, four implied decimals
    Currency,
    /// Julian day + milliseconds
    DateTime,
    /// Little-endian f64
    Double,
    /// Any other tag; carried as raw bytes
    Other(u8),
}

impl FieldType {
    pub fn from_raw(tag: u8) -> Self {
        match tag.to_ascii_uppercase() {
            b'C' => FieldType::Character,
            b'N' => FieldType::Numeric,
            b'F' => FieldType::Float,
            b'D' => FieldType::Date,
            b'L' => FieldType::Logical,
            b'M' => FieldType::Memo,
            b'I' => FieldType::Integer,
            b'Y' => FieldType::Currency,
            b'T' => FieldType::DateTime,
            b'B' => FieldType::Double,
            _ => FieldType::Other(tag),
        }
    }

    pub fn as_raw(&self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Date => b'D',
            FieldType::Logical => b'L',
            FieldType::Memo => b'M',
            FieldType::Integer => b'I',
            FieldType::Currency => b'Y',
            FieldType::DateTime => b'T',
            FieldType::Double => b'B',
            FieldType::Other(tag) => *tag,
        }
    }

    /// Length mandated by the type, if any
    pub fn fixed_length(&self) -> Option<u8> {
        match self {
            FieldType::Date | FieldType::Currency | FieldType::DateTime | FieldType::Double => Some(8),
            FieldType::Logical => Some(1),
            FieldType::Integer => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw() as char)
    }
}

/// A field definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name (at most 10 bytes on disk)
    pub name: String,
    pub field_type: FieldType,
    /// Width in bytes inside the record
    pub length: u8,
    /// Decimal places (numeric types)
    pub decimals: u8,
    /// Visual FoxPro field flags, preserved as read
    pub flags: u8,
}

impl Field {
    /// Size of one descriptor in bytes
    pub const DESCRIPTOR_SIZE: usize = 32;

    /// Longest usable field name
    pub const MAX_NAME_LEN: usize = 10;

    /// Create a validated field definition
    pub fn new(name: &str, field_type: FieldType, length: u8, decimals: u8) -> DbfResult<Self> {
        let name = name.trim();
        if name.is_empty() || name.len() > Self::MAX_NAME_LEN {
            return Err(DbfError::invalid(format!(
                "field name '{}' must be 1 to {} bytes",
                name,
                Self::MAX_NAME_LEN
            )));
        }
        if name.bytes().any(|b| b == 0 || b == FIELD_TERMINATOR) {
            return Err(DbfError::invalid(format!("field name '{}' contains control bytes", name)));
        }
        if length == 0 {
            return Err(DbfError::invalid(format!("field '{}' has zero length", name)));
        }
        if let Some(expected) = field_type.fixed_length() {
            if length != expected {
                return Err(DbfError::invalid(format!(
                    "field '{}' of type {} must be {} bytes, not {}",
                    name, field_type, expected, length
                )));
            }
        }
        if field_type == FieldType::Memo && length < 4 {
            return Err(DbfError::invalid(format!("memo field '{}' needs at least 4 bytes", name)));
        }
        if decimals >= length && decimals > 0 {
            return Err(DbfError::invalid(format!(
                "field '{}' has {} decimals in a {} byte field",
                name, decimals, length
            )));
        }

        Ok(Field {
            name: name.to_string(),
            field_type,
            length,
            decimals,
            flags: 0,
        })
    }

    pub fn character(name: &str, length: u8) -> DbfResult<Self> {
        Self::new(name, FieldType::Character, length, 0)
    }

    pub fn numeric(name: &str, length: u8, decimals: u8) -> DbfResult<Self> {
        Self::new(name, FieldType::Numeric, length, decimals)
    }

    pub fn date(name: &str) -> DbfResult<Self> {
        Self::new(name, FieldType::Date, 8, 0)
    }

    pub fn logical(name: &str) -> DbfResult<Self> {
        Self::new(name, FieldType::Logical, 1, 0)
    }

    /// Memo field with the 4-byte binary offset used by FoxPro
    pub fn memo(name: &str) -> DbfResult<Self> {
        Self::new(name, FieldType::Memo, 4, 0)
    }

    pub fn integer(name: &str) -> DbfResult<Self> {
        Self::new(name, FieldType::Integer, 4, 0)
    }

    pub fn currency(name: &str) -> DbfResult<Self> {
        Self::new(name, FieldType::Currency, 8, 4)
    }

    pub fn datetime(name: &str) -> DbfResult<Self> {
        Self::new(name, FieldType::DateTime, 8, 0)
    }

    pub fn double(name: &str, decimals: u8) -> DbfResult<Self> {
        Self::new(name, FieldType::Double, 8, decimals)
    }

    pub fn is_memo(&self) -> bool {
        self.field_type == FieldType::Memo
    }

    /// Parse a descriptor (32 bytes)
    pub fn from_bytes(data: &[u8], text: &dyn TextCodec) -> DbfResult<Self> {
        if data.len() < Self::DESCRIPTOR_SIZE {
            return Err(DbfError::UnexpectedEndOfData("field descriptor"));
        }

        let name_end = data[..11].iter().position(|&b| b == 0).unwrap_or(11);
        let name = text.decode(&data[..name_end]).trim().to_string();

        Ok(Field {
            name,
            field_type: FieldType::from_raw(data[11]),
            length: data[16],
            decimals: data[17],
            flags: data[18],
        })
    }

    /// Serialize a descriptor; `displacement` is the field's offset in the record
    pub fn to_bytes(&self, displacement: u32, text: &dyn TextCodec) -> [u8; Self::DESCRIPTOR_SIZE] {
        let mut buf = [0u8; Self::DESCRIPTOR_SIZE];
        let name = codec::fixed_width(&text.encode(&self.name), Self::MAX_NAME_LEN, 0);
        buf[..Self::MAX_NAME_LEN].copy_from_slice(&name);
        buf[11] = self.field_type.as_raw();
        codec::put_le_u32(&mut buf[12..16], displacement);
        buf[16] = self.length;
        buf[17] = self.decimals;
        buf[18] = self.flags;
        buf
    }
}

/// Read descriptors up to and including the 0x0D terminator
pub fn read_fields<R: Read + ?Sized>(reader: &mut R, text: &dyn TextCodec) -> DbfResult<Vec<Field>> {
    let mut fields = Vec::new();
    let mut buf = [0u8; Field::DESCRIPTOR_SIZE];

    loop {
        let first = codec::read_byte(reader)?
            .ok_or(DbfError::UnexpectedEndOfData("field descriptor table"))?;
        if first == FIELD_TERMINATOR {
            break;
        }

        buf[0] = first;
        reader
            .read_exact(&mut buf[1..])
            .map_err(DbfError::eof_as("field descriptor"))?;
        fields.push(Field::from_bytes(&buf, text)?);
    }

    Ok(fields)
}

/// Write descriptors, the terminator and the dialect's reserved trailer
pub fn write_fields<W: Write + ?Sized>(
    writer: &mut W,
    fields: &[Field],
    layout: &DialectLayout,
    text: &dyn TextCodec,
) -> DbfResult<()> {
    // Displacement counts the deletion marker.
    let mut displacement = 1u32;
    for field in fields {
        writer.write_all(&field.to_bytes(displacement, text))?;
        displacement += field.length as u32;
    }

    writer.write_all(&[FIELD_TERMINATOR])?;
    writer.write_all(&vec![0u8; layout.trailer_size])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::header::DbfVersion;
    use crate::text::Latin1;

    #[test]
    fn test_field_table_roundtrip() {
        let fields = vec![
            Field::character("NAME", 10).unwrap(),
            Field::numeric("PRICE", 8, 2).unwrap(),
            Field::memo("NOTES").unwrap(),
        ];

        let mut out = Vec::new();
        write_fields(&mut out, &fields, DbfVersion::VisualFoxPro.layout(), &Latin1).unwrap();
        assert_eq!(out.len(), 3 * 32 + 1 + 263);
        assert_eq!(out[3 * 32], FIELD_TERMINATOR);

        let mut reader = &out[..];
        let parsed = read_fields(&mut reader, &Latin1).unwrap();
        assert_eq!(parsed, fields);
        // Reading stops right after the terminator.
        assert_eq!(reader.len(), 263);
    }

    #[test]
    fn test_displacements() {
        let fields = vec![
            Field::character("A", 5).unwrap(),
            Field::logical("B").unwrap(),
        ];
        let mut out = Vec::new();
        write_fields(&mut out, &fields, DbfVersion::FoxBaseDBase3NoMemo.layout(), &Latin1).unwrap();
        assert_eq!(codec::le_u32(&out[12..16]), 1);
        assert_eq!(codec::le_u32(&out[32 + 12..32 + 16]), 6);
    }

    #[test]
    fn test_missing_terminator() {
        let field = Field::character("NAME", 10).unwrap();
        let bytes = field.to_bytes(1, &Latin1);
        let err = read_fields(&mut &bytes[..], &Latin1).unwrap_err();
        assert!(matches!(err, DbfError::UnexpectedEndOfData(_)));

        // A descriptor cut in half is also a hard failure.
        let err = read_fields(&mut &bytes[..20], &Latin1).unwrap_err();
        assert!(matches!(err, DbfError::UnexpectedEndOfData(_)));
    }

    #[test]
    fn test_field_validation() {
        assert!(Field::character("", 10).is_err());
        assert!(Field::character("ELEVENCHARS", 10).is_err());
        assert!(Field::character("NAME", 0).is_err());
        assert!(Field::new("D", FieldType::Date, 6, 0).is_err());
        assert!(Field::new("M", FieldType::Memo, 2, 0).is_err());
        assert!(Field::numeric("N", 4, 4).is_err());
        assert!(Field::new("M", FieldType::Memo, 10, 0).is_ok());
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        assert_eq!(FieldType::from_raw(b'G'), FieldType::Other(b'G'));
        assert_eq!(FieldType::Other(b'G').as_raw(), b'G');
        assert_eq!(FieldType::from_raw(b'c'), FieldType::Character);
    }
}
