//! Table header and the dialect dispatcher
//!
//! Every .dbf file starts with a 32-byte header whose first byte selects the
//! dialect. Dialects share the header layout but differ in what follows the
//! field descriptor terminator:
//! - Offset 0x00: version byte
//! - Offset 0x01: last update, YY MM DD (year since 1900)
//! - Offset 0x04: record count (u32)
//! - Offset 0x08: header length (u16)
//! - Offset 0x0A: record length (u16)
//! - Offset 0x0C: 16 reserved bytes
//! - Offset 0x1C: table flags
//! - Offset 0x1D: code page
//! - Offset 0x1E: 2 reserved bytes

use chrono::NaiveDate;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::error::{DbfError, DbfResult};

use super::codec;
use super::field::Field;

bitflags::bitflags! {
    /// Table flags stored at offset 0x1C
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TableFlags: u8 {
        /// A structural .cdx index accompanies the table
        const STRUCTURAL_CDX = 0x01;
        /// The table has memo fields
        const WITH_MEMO = 0x02;
        /// The table is a database container
        const DATABASE = 0x04;
    }
}

/// Known table versions (the leading byte of the file)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DbfVersion {
    FoxBase = 0x02,
    FoxBaseDBase3NoMemo = 0x03,
    VisualFoxPro = 0x30,
    VisualFoxProAutoIncrement = 0x31,
    VisualFoxProVarchar = 0x32,
    DBase4SqlTableNoMemo = 0x43,
    DBase4SqlSystemNoMemo = 0x63,
    FoxBaseDBase3WithMemo = 0x83,
    DBase4WithMemo = 0x8B,
    DBase4SqlTableWithMemo = 0xCB,
    FoxPro2WithMemo = 0xF5,
    FoxBaseAlt = 0xFB,
}

impl DbfVersion {
    pub fn from_raw(value: u8) -> Option<Self> {
        DIALECTS
            .iter()
            .find(|d| d.version as u8 == value)
            .map(|d| d.version)
    }

    pub fn as_raw(&self) -> u8 {
        *self as u8
    }

    /// Dialect layout for this version
    pub fn layout(&self) -> &'static DialectLayout {
        // Every variant has exactly one table entry.
        DIALECTS
            .iter()
            .find(|d| d.version == *self)
            .unwrap_or(&DIALECTS[0])
    }

    pub fn description(&self) -> &'static str {
        self.layout().description
    }

    /// The with-memo variant of a no-memo dialect, when one exists
    pub fn memo_twin(&self) -> Option<DbfVersion> {
        match self {
            DbfVersion::FoxBaseDBase3NoMemo => Some(DbfVersion::FoxBaseDBase3WithMemo),
            DbfVersion::DBase4SqlTableNoMemo => Some(DbfVersion::DBase4SqlTableWithMemo),
            _ => None,
        }
    }
}

impl fmt::Display for DbfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.as_raw(), self.description())
    }
}

impl FromStr for DbfVersion {
    type Err = DbfError;

    /// Accepts a short dialect name (`vfp`, `dbase3`, `foxpro2`, ...) or a
    /// version byte written as `0x30` / `48`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let by_name = match lower.as_str() {
            "foxbase" => Some(DbfVersion::FoxBase),
            "dbase3" | "dbaseiii" | "foxbase+" => Some(DbfVersion::FoxBaseDBase3NoMemo),
            "dbase3-memo" | "dbaseiii-memo" => Some(DbfVersion::FoxBaseDBase3WithMemo),
            "dbase4" | "dbaseiv" => Some(DbfVersion::DBase4WithMemo),
            "foxpro2" | "foxpro" => Some(DbfVersion::FoxPro2WithMemo),
            "vfp" | "visualfoxpro" => Some(DbfVersion::VisualFoxPro),
            "vfp-autoinc" => Some(DbfVersion::VisualFoxProAutoIncrement),
            "vfp-varchar" => Some(DbfVersion::VisualFoxProVarchar),
            _ => None,
        };
        if let Some(version) = by_name {
            return Ok(version);
        }

        let raw = match lower.strip_prefix("0x") {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => lower.parse::<u8>(),
        }
        .map_err(|_| DbfError::invalid(format!("unknown table version '{}'", s)))?;

        DbfVersion::from_raw(raw).ok_or(DbfError::UnsupportedVersion(raw))
    }
}

/// Byte layout constants of one dialect
#[derive(Debug)]
pub struct DialectLayout {
    pub version: DbfVersion,
    pub description: &'static str,
    /// Reserved bytes after the field terminator (the VFP backlink area)
    pub trailer_size: usize,
    /// Whether the dialect normally carries a memo file
    pub memo: bool,
}

impl DialectLayout {
    /// Header length for a schema of `field_count` fields
    pub fn header_length(&self, field_count: usize) -> usize {
        Header::BASE_SIZE
            + Field::DESCRIPTOR_SIZE * field_count
            + 1
            + self.trailer_size
    }
}

/// Version byte -> dialect lookup table
static DIALECTS: [DialectLayout; 12] = [
    DialectLayout { version: DbfVersion::FoxBaseDBase3NoMemo, description: "FoxBase+/dBASE III, no memo", trailer_size: 0, memo: false },
    DialectLayout { version: DbfVersion::FoxBase, description: "FoxBase", trailer_size: 0, memo: false },
    DialectLayout { version: DbfVersion::VisualFoxPro, description: "Visual FoxPro", trailer_size: 263, memo: true },
    DialectLayout { version: DbfVersion::VisualFoxProAutoIncrement, description: "Visual FoxPro, autoincrement", trailer_size: 263, memo: true },
    DialectLayout { version: DbfVersion::VisualFoxProVarchar, description: "Visual FoxPro, varchar/varbinary", trailer_size: 263, memo: true },
    DialectLayout { version: DbfVersion::DBase4SqlTableNoMemo, description: "dBASE IV SQL table, no memo", trailer_size: 0, memo: false },
    DialectLayout { version: DbfVersion::DBase4SqlSystemNoMemo, description: "dBASE IV SQL system, no memo", trailer_size: 0, memo: false },
    DialectLayout { version: DbfVersion::FoxBaseDBase3WithMemo, description: "FoxBase+/dBASE III, with memo", trailer_size: 0, memo: true },
    DialectLayout { version: DbfVersion::DBase4WithMemo, description: "dBASE IV, with memo", trailer_size: 0, memo: true },
    DialectLayout { version: DbfVersion::DBase4SqlTableWithMemo, description: "dBASE IV SQL table, with memo", trailer_size: 0, memo: true },
    DialectLayout { version: DbfVersion::FoxPro2WithMemo, description: "FoxPro 2, with memo", trailer_size: 0, memo: true },
    DialectLayout { version: DbfVersion::FoxBaseAlt, description: "FoxBASE", trailer_size: 0, memo: false },
];

/// Table-level metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: DbfVersion,
    pub last_update: NaiveDate,
    pub num_records: u32,
    pub header_length: u16,
    pub record_length: u16,
    pub flags: TableFlags,
    pub codepage: u8,
}

impl Header {
    /// Size of the fixed header part in bytes
    pub const BASE_SIZE: usize = 32;

    /// Empty header for a fresh table of the given dialect
    pub fn new(version: DbfVersion) -> Self {
        let layout = version.layout();
        Header {
            version,
            last_update: chrono::Local::now().date_naive(),
            num_records: 0,
            header_length: layout.header_length(0) as u16,
            record_length: 1,
            flags: TableFlags::empty(),
            codepage: 0,
        }
    }

    pub fn layout(&self) -> &'static DialectLayout {
        self.version.layout()
    }

    /// Recompute the derived lengths and record count from the schema
    pub fn recompute(&mut self, fields: &[Field], record_count: usize) -> DbfResult<()> {
        let header_length = self.layout().header_length(fields.len());
        let record_length = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();

        self.header_length = u16::try_from(header_length)
            .map_err(|_| DbfError::invalid(format!("{} fields exceed the header size limit", fields.len())))?;
        self.record_length = u16::try_from(record_length)
            .map_err(|_| DbfError::invalid(format!("record length {} exceeds 65535 bytes", record_length)))?;
        self.num_records = u32::try_from(record_count)
            .map_err(|_| DbfError::invalid("too many records"))?;
        Ok(())
    }

    /// Serialize the fixed 32-byte header
    pub fn to_bytes(&self) -> [u8; Self::BASE_SIZE] {
        let mut buf = [0u8; Self::BASE_SIZE];
        buf[0] = self.version.as_raw();
        buf[1..4].copy_from_slice(&codec::encode_header_date(self.last_update));

        codec::put_le_u32(&mut buf[4..8], self.num_records);
        codec::put_le_u16(&mut buf[8..10], self.header_length);
        codec::put_le_u16(&mut buf[10..12], self.record_length);

        buf[0x1C] = self.flags.bits();
        buf[0x1D] = self.codepage;
        buf
    }

    /// Parse the fixed header, given the dialect it was selected for
    pub fn from_bytes(version: DbfVersion, data: &[u8; Self::BASE_SIZE]) -> Self {
        Header {
            version,
            last_update: codec::decode_header_date([data[1], data[2], data[3]]),
            num_records: codec::le_u32(&data[4..8]),
            header_length: codec::le_u16(&data[8..10]),
            record_length: codec::le_u16(&data[10..12]),
            flags: TableFlags::from_bits_retain(data[0x1C]),
            codepage: data[0x1D],
        }
    }
}

/// Reads and writes the header of one dialect
#[derive(Debug, Clone, Copy)]
pub struct HeaderHandler {
    layout: &'static DialectLayout,
}

/// Select the header handler for a version byte
pub fn select_header(version_byte: u8) -> DbfResult<HeaderHandler> {
    DIALECTS
        .iter()
        .find(|d| d.version.as_raw() == version_byte)
        .map(|layout| HeaderHandler { layout })
        .ok_or(DbfError::UnsupportedVersion(version_byte))
}

impl HeaderHandler {
    pub fn version(&self) -> DbfVersion {
        self.layout.version
    }

    pub fn layout(&self) -> &'static DialectLayout {
        self.layout
    }

    /// Read the 32-byte header from the start of `reader`
    pub fn read<R: Read + ?Sized>(&self, reader: &mut R) -> DbfResult<Header> {
        let mut buf = [0u8; Header::BASE_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(DbfError::eof_as("table header"))?;

        if buf[0] != self.layout.version.as_raw() {
            return Err(DbfError::UnsupportedVersion(buf[0]));
        }
        Ok(Header::from_bytes(self.layout.version, &buf))
    }

    /// Write `header` after recomputing its derived lengths from `fields`
    pub fn write<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        header: &mut Header,
        fields: &[Field],
        record_count: usize,
    ) -> DbfResult<()> {
        header.version = self.layout.version;
        header.recompute(fields, record_count)?;
        writer.write_all(&header.to_bytes())?;
        Ok(())
    }
}

/// Peek the version byte and read the header with the matching dialect
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> DbfResult<Header> {
    let mut buf = [0u8; Header::BASE_SIZE];
    reader
        .read_exact(&mut buf)
        .map_err(DbfError::eof_as("table header"))?;
    let handler = select_header(buf[0])?;
    handler.read(&mut &buf[..])
}
