//! Storage layer for the dBASE file family
//!
//! This module handles the low-level binary format of .dbf tables and their
//! memo files:
//! - Byte primitives and date helpers
//! - Dialect headers
//! - Field descriptor table
//! - Per-type field encoders
//! - Record codec
//! - Memo block store

pub mod codec;
pub mod header;
pub mod field;
pub mod value;
pub mod encoders;
pub mod record;
pub mod memo;

pub use header::{read_header, select_header, DbfVersion, DialectLayout, Header, HeaderHandler, TableFlags};
pub use field::{read_fields, write_fields, Field, FieldType, FIELD_TERMINATOR};
pub use value::Value;
pub use record::{decode_record, encode_record, read_records, Record, RecordMarker, RecordScan};
pub use memo::{MemoAllocator, MemoFormat, MemoHeader, MemoState, MemoStore, MemoWriter};
