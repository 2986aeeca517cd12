//! Record codec
//!
//! A record is one marker byte (0x20 valid, 0x2A deleted) followed by every
//! field buffer in schema order. Memo fields keep two parallel slots: the
//! resolved text in `values` and the raw block offset in `memo_offsets`.

use std::io::{Read, Write};

use crate::error::{DbfError, DbfResult};
use crate::text::TextCodec;

use super::codec;
use super::encoders;
use super::field::Field;
use super::header::Header;
use super::memo::MemoStore;
use super::value::Value;

/// Byte that ends record data in most files
pub const END_OF_FILE: u8 = 0x1A;

/// Record status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordMarker {
    #[default]
    Valid,
    Deleted,
}

impl RecordMarker {
    pub const VALID: u8 = 0x20;
    pub const DELETED: u8 = 0x2A;

    /// Anything but the deletion mark counts as a live record
    pub fn from_raw(value: u8) -> Self {
        match value {
            Self::DELETED => RecordMarker::Deleted,
            _ => RecordMarker::Valid,
        }
    }

    pub fn as_raw(&self) -> u8 {
        match self {
            RecordMarker::Valid => Self::VALID,
            RecordMarker::Deleted => Self::DELETED,
        }
    }
}

/// One row of a table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub marker: RecordMarker,
    values: Vec<Option<Value>>,
    memo_offsets: Vec<u32>,
}

impl Record {
    /// Empty record with `field_count` absent slots
    pub fn new(field_count: usize) -> Self {
        Record {
            marker: RecordMarker::Valid,
            values: vec![None; field_count],
            memo_offsets: vec![0; field_count],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.marker == RecordMarker::Deleted
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn set_value(&mut self, index: usize, value: Option<Value>) -> DbfResult<()> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| DbfError::invalid(format!("field index {} out of range", index)))?;
        *slot = value;
        Ok(())
    }

    /// Raw memo block offset; 0 for non-memo fields and empty memos
    pub fn memo_offset(&self, index: usize) -> u32 {
        self.memo_offsets.get(index).copied().unwrap_or(0)
    }

    pub fn set_memo_offset(&mut self, index: usize, offset: u32) -> DbfResult<()> {
        let slot = self
            .memo_offsets
            .get_mut(index)
            .ok_or_else(|| DbfError::invalid(format!("field index {} out of range", index)))?;
        *slot = offset;
        Ok(())
    }

    /// Append an absent slot for a newly added field
    pub(crate) fn push_slot(&mut self) {
        self.values.push(None);
        self.memo_offsets.push(0);
    }

    /// Drop the slot of a removed field
    pub(crate) fn remove_slot(&mut self, index: usize) {
        if index < self.values.len() {
            self.values.remove(index);
            self.memo_offsets.remove(index);
        }
    }
}

/// Decode the next record from `reader`.
///
/// Returns `Ok(None)` at the end of record data: either the 0x1A marker or the
/// physical end of the stream. A record cut short fails with
/// [`DbfError::TruncatedRecord`], which callers treat as the end of usable data.
pub fn decode_record<R: Read + ?Sized>(
    reader: &mut R,
    header: &Header,
    fields: &[Field],
    memo: Option<&MemoStore>,
    text: &dyn TextCodec,
) -> DbfResult<Option<Record>> {
    let marker = match codec::read_byte(reader)? {
        None | Some(END_OF_FILE) => return Ok(None),
        Some(b) => b,
    };

    let row_len = (header.record_length as usize).saturating_sub(1);
    let mut row = vec![0u8; row_len];
    let got = codec::read_fully(reader, &mut row)?;
    if got < row_len {
        return Err(DbfError::TruncatedRecord {
            expected: header.record_length as usize,
            actual: got + 1,
        });
    }

    Ok(Some(decode_row(marker, &row, fields, memo, text)))
}

/// Slice a record body into field buffers and decode each one
pub fn decode_row(
    marker: u8,
    row: &[u8],
    fields: &[Field],
    memo: Option<&MemoStore>,
    text: &dyn TextCodec,
) -> Record {
    let mut record = Record::new(fields.len());
    record.marker = RecordMarker::from_raw(marker);

    let mut offset = 0usize;
    for (i, field) in fields.iter().enumerate() {
        let end = offset + field.length as usize;
        let Some(buffer) = row.get(offset..end) else {
            // Schema wider than the declared record length; the rest stays absent.
            break;
        };
        offset = end;

        if field.is_memo() {
            record.memo_offsets[i] = encoders::decode_memo_offset(buffer);
        }
        record.values[i] = encoders::decode_field(field, buffer, memo, text);
    }

    record
}

/// Encode one record; memo fields write their current `memo_offsets` slot
pub fn encode_record<W: Write + ?Sized>(
    writer: &mut W,
    record: &Record,
    fields: &[Field],
    text: &dyn TextCodec,
) -> DbfResult<()> {
    let mut row = Vec::with_capacity(1 + fields.iter().map(|f| f.length as usize).sum::<usize>());
    row.push(record.marker.as_raw());

    for (i, field) in fields.iter().enumerate() {
        let buffer = if field.is_memo() {
            encoders::encode_memo_offset(field, record.memo_offset(i))
        } else {
            encoders::encode_field(field, record.value(i), text)?
        };
        row.extend_from_slice(&buffer);
    }

    writer.write_all(&row)?;
    Ok(())
}

/// Records read from a table, plus the reason enumeration stopped early
#[derive(Debug, Default)]
pub struct RecordScan {
    pub records: Vec<Record>,
    /// Set when the last record was cut short and dropped
    pub truncated: Option<DbfError>,
}

/// Decode records until the end marker, end of stream, or a truncated record
pub fn read_records<R: Read + ?Sized>(
    reader: &mut R,
    header: &Header,
    fields: &[Field],
    memo: Option<&MemoStore>,
    text: &dyn TextCodec,
) -> DbfResult<RecordScan> {
    let mut scan = RecordScan {
        records: Vec::with_capacity(header.num_records.min(1 << 20) as usize),
        truncated: None,
    };

    loop {
        match decode_record(reader, header, fields, memo, text) {
            Ok(Some(record)) => scan.records.push(record),
            Ok(None) => break,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    "stopping after {} records: {}",
                    scan.records.len(),
                    e
                );
                scan.truncated = Some(e);
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::header::DbfVersion;
    use crate::text::Latin1;

    fn schema() -> (Header, Vec<Field>) {
        let fields = vec![
            Field::character("NAME", 5).unwrap(),
            Field::logical("OK").unwrap(),
        ];
        let mut header = Header::new(DbfVersion::FoxBaseDBase3NoMemo);
        header.recompute(&fields, 0).unwrap();
        (header, fields)
    }

    #[test]
    fn test_encode_decode_record() {
        let (header, fields) = schema();
        let mut record = Record::new(2);
        record.set_value(0, Some(Value::from("BOB"))).unwrap();
        record.set_value(1, Some(Value::Logical(true))).unwrap();

        let mut out = Vec::new();
        encode_record(&mut out, &record, &fields, &Latin1).unwrap();
        assert_eq!(&out, b" BOB  Y");

        let decoded = decode_record(&mut &out[..], &header, &fields, None, &Latin1)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_deleted_marker() {
        let (header, fields) = schema();
        let row = b"*AMY  N";
        let record = decode_record(&mut &row[..], &header, &fields, None, &Latin1)
            .unwrap()
            .unwrap();
        assert!(record.is_deleted());
        assert_eq!(record.value(0), Some(&Value::from("AMY")));
        assert_eq!(record.value(1), Some(&Value::Logical(false)));
    }

    #[test]
    fn test_end_markers() {
        let (header, fields) = schema();
        assert!(decode_record(&mut &[END_OF_FILE][..], &header, &fields, None, &Latin1)
            .unwrap()
            .is_none());
        assert!(decode_record(&mut &[][..], &header, &fields, None, &Latin1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_truncated_record() {
        let (header, fields) = schema();
        let err = decode_record(&mut &b" BO"[..], &header, &fields, None, &Latin1).unwrap_err();
        assert!(matches!(err, DbfError::TruncatedRecord { expected: 7, actual: 3 }));
    }

    #[test]
    fn test_scan_keeps_records_before_truncation() {
        let (header, fields) = schema();
        let data = b" AAA  Y BBB  N CC";
        let scan = read_records(&mut &data[..], &header, &fields, None, &Latin1).unwrap();
        assert_eq!(scan.records.len(), 2);
        assert!(scan.truncated.is_some());

        let data = b" AAA  Y BBB  N\x1a";
        let scan = read_records(&mut &data[..], &header, &fields, None, &Latin1).unwrap();
        assert_eq!(scan.records.len(), 2);
        assert!(scan.truncated.is_none());
    }

    #[test]
    fn test_encoding_overflow_fails_record() {
        let fields = vec![Field::numeric("N", 2, 0).unwrap()];
        let mut record = Record::new(1);
        record.set_value(0, Some(Value::Numeric(100.0))).unwrap();
        let err = encode_record(&mut Vec::new(), &record, &fields, &Latin1).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EncodingOverflow);
    }

    #[test]
    fn test_slot_bounds() {
        let mut record = Record::new(1);
        assert!(record.set_value(3, None).is_err());
        assert!(record.set_memo_offset(3, 1).is_err());
        assert_eq!(record.memo_offset(3), 0);
    }
}
