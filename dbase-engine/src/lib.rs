//! dBASE Engine - codec for dBASE / FoxPro tables
//!
//! This crate reads and writes .dbf tables across the FoxBase, dBASE III/IV,
//! FoxPro 2 and Visual FoxPro dialects, together with their .fpt memo files
//! (and legacy .dbt memo files, read-only).

pub mod error;
pub mod text;
pub mod storage;
pub mod table;

pub use error::{DbfError, DbfResult, ErrorKind};
pub use storage::{DbfVersion, Field, FieldType, Header, MemoFormat, MemoStore, Record, TableFlags, Value};
pub use table::{Row, RowMut, SaveOptions, Table};
pub use text::{codec_by_name, FoxProCodepage, Latin1, TextCodec, Utf8};
