//! Field-type encoders
//!
//! One `{encode, decode}` pair per field type, looked up through a registry
//! keyed by [`FieldType`]. Encoders produce exactly `field.length` bytes or
//! fail; decoders never fail and map unreadable content to `None`.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use lazy_static::lazy_static;

use crate::error::{DbfError, DbfResult};
use crate::text::TextCodec;

use super::codec;
use super::field::{Field, FieldType};
use super::memo::MemoStore;
use super::value::Value;

pub type EncodeFn = fn(&Field, Option<&Value>, &dyn TextCodec) -> DbfResult<Vec<u8>>;
pub type DecodeFn = fn(&[u8], Option<&MemoStore>, &dyn TextCodec) -> Option<Value>;

/// Encoder/decoder pair for one field type
#[derive(Clone, Copy)]
pub struct FieldCodec {
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

lazy_static! {
    static ref REGISTRY: HashMap<FieldType, FieldCodec> = {
        let mut m = HashMap::new();
        m.insert(FieldType::Character, FieldCodec { encode: encode_character, decode: decode_character });
        m.insert(FieldType::Numeric, FieldCodec { encode: encode_numeric, decode: decode_numeric });
        m.insert(FieldType::Float, FieldCodec { encode: encode_numeric, decode: decode_numeric });
        m.insert(FieldType::Date, FieldCodec { encode: encode_date, decode: decode_date });
        m.insert(FieldType::Logical, FieldCodec { encode: encode_logical, decode: decode_logical });
        m.insert(FieldType::Memo, FieldCodec { encode: encode_memo, decode: decode_memo });
        m.insert(FieldType::Integer, FieldCodec { encode: encode_integer, decode: decode_integer });
        m.insert(FieldType::Currency, FieldCodec { encode: encode_currency, decode: decode_currency });
        m.insert(FieldType::DateTime, FieldCodec { encode: encode_datetime, decode: decode_datetime });
        m.insert(FieldType::Double, FieldCodec { encode: encode_double, decode: decode_double });
        m
    };
}

const RAW_CODEC: FieldCodec = FieldCodec { encode: encode_raw, decode: decode_raw };

/// Codec for a field type; unknown tags get a byte-preserving codec
pub fn codec_for(field_type: FieldType) -> FieldCodec {
    REGISTRY.get(&field_type).copied().unwrap_or(RAW_CODEC)
}

/// Encode `value` for `field`, checking the result against the field width
pub fn encode_field(field: &Field, value: Option<&Value>, text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    let buf = (codec_for(field.field_type).encode)(field, value, text)?;
    if buf.len() > field.length as usize {
        return Err(DbfError::EncodingOverflow {
            field: field.name.clone(),
            length: field.length as usize,
            actual: buf.len(),
        });
    }
    Ok(codec::fixed_width(&buf, field.length as usize, b' '))
}

/// Decode one field buffer
pub fn decode_field(
    field: &Field,
    buffer: &[u8],
    memo: Option<&MemoStore>,
    text: &dyn TextCodec,
) -> Option<Value> {
    (codec_for(field.field_type).decode)(buffer, memo, text)
}

fn mismatch(field: &Field, value: &Value) -> DbfError {
    DbfError::invalid(format!(
        "cannot store a {} value in {} field '{}'",
        value.type_name(),
        field.field_type,
        field.name
    ))
}

fn blank(field: &Field) -> Vec<u8> {
    vec![b' '; field.length as usize]
}

// Character

fn encode_character(field: &Field, value: Option<&Value>, text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    let s = match value {
        None => return Ok(blank(field)),
        Some(Value::Bytes(b)) => return Ok(codec::fixed_width(b, field.length as usize, b' ')),
        Some(v) => v.to_string(),
    };
    Ok(codec::encode_truncated(&s, field.length as usize, text))
}

fn decode_character(buffer: &[u8], _memo: Option<&MemoStore>, text: &dyn TextCodec) -> Option<Value> {
    let trimmed = codec::trim_end_padding(buffer);
    if trimmed.is_empty() {
        return None;
    }
    Some(Value::Character(text.decode(trimmed)))
}

// Numeric / Float

fn encode_numeric(field: &Field, value: Option<&Value>, _text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    let n = match value {
        None => return Ok(blank(field)),
        Some(v) => v.as_f64().ok_or_else(|| mismatch(field, v))?,
    };
    if !n.is_finite() {
        return Err(DbfError::invalid(format!("field '{}' cannot hold {}", field.name, n)));
    }

    let digits = format!("{:.*}", field.decimals as usize, n);
    codec::right_aligned(digits.as_bytes(), field.length as usize).ok_or_else(|| {
        DbfError::EncodingOverflow {
            field: field.name.clone(),
            length: field.length as usize,
            actual: digits.len(),
        }
    })
}

fn decode_numeric(buffer: &[u8], _memo: Option<&MemoStore>, _text: &dyn TextCodec) -> Option<Value> {
    let trimmed = codec::trim_padding(buffer);
    if trimmed.is_empty() {
        return None;
    }
    std::str::from_utf8(trimmed)
        .ok()?
        .parse::<f64>()
        .ok()
        .map(Value::Numeric)
}

// Date

fn encode_date(field: &Field, value: Option<&Value>, _text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    match value {
        None => Ok(blank(field)),
        Some(v) => {
            let date = v.as_date().ok_or_else(|| mismatch(field, v))?;
            Ok(date.format("%Y%m%d").to_string().into_bytes())
        }
    }
}

fn decode_date(buffer: &[u8], _memo: Option<&MemoStore>, _text: &dyn TextCodec) -> Option<Value> {
    let trimmed = codec::trim_padding(buffer);
    if trimmed.len() != 8 {
        return None;
    }
    let s = std::str::from_utf8(trimmed).ok()?;
    NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(Value::Date)
}

// Logical

fn encode_logical(field: &Field, value: Option<&Value>, _text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    let tag = match value {
        None => b'?',
        Some(Value::Logical(true)) => b'Y',
        Some(Value::Logical(false)) => b'N',
        Some(v) => return Err(mismatch(field, v)),
    };
    Ok(codec::right_aligned(&[tag], field.length as usize).unwrap_or_else(|| vec![tag]))
}

fn decode_logical(buffer: &[u8], _memo: Option<&MemoStore>, _text: &dyn TextCodec) -> Option<Value> {
    match codec::trim_padding(buffer) {
        [] | [b'?'] => None,
        [b] => Some(Value::Logical(matches!(b.to_ascii_uppercase(), b'Y' | b'T'))),
        _ => Some(Value::Logical(false)),
    }
}

// Memo: the record holds only the block offset.

/// Encode a memo block offset in the representation the field width calls for:
/// 4-byte little-endian binary, or right-aligned ASCII digits for the legacy
/// 10-byte fields.
pub fn encode_memo_offset(field: &Field, offset: u32) -> Vec<u8> {
    let len = field.length as usize;
    if len >= 10 {
        if offset == 0 {
            return vec![b' '; len];
        }
        // u32 never needs more than 10 digits.
        return codec::right_aligned(offset.to_string().as_bytes(), len).unwrap_or_default();
    }
    let mut raw = [0u8; 4];
    codec::put_le_u32(&mut raw, offset);
    codec::fixed_width(&raw, len, 0)
}

/// Read the block offset stored in a memo field buffer
pub fn decode_memo_offset(buffer: &[u8]) -> u32 {
    if buffer.len() < 4 {
        return 0;
    }
    if buffer.len() >= 10 {
        let trimmed = codec::trim_padding(buffer);
        if trimmed.is_empty() {
            return 0;
        }
        if trimmed.iter().all(u8::is_ascii_digit) {
            return std::str::from_utf8(trimmed)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
        }
    }
    codec::le_u32(&buffer[..4])
}

/// Bytes to store in the memo file for a memo field value; empty for `None`.
/// Only memo and character text are accepted.
pub fn memo_content(field: &Field, value: Option<&Value>, text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::Memo(s)) | Some(Value::Character(s)) => Ok(text.encode(s)),
        Some(v) => Err(mismatch(field, v)),
    }
}

/// The memo value itself is written to the memo file; here the slot is always
/// emitted empty, and the record codec overwrites it with the allocated offset.
fn encode_memo(field: &Field, value: Option<&Value>, text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    memo_content(field, value, text)?;
    Ok(encode_memo_offset(field, 0))
}

fn decode_memo(buffer: &[u8], memo: Option<&MemoStore>, text: &dyn TextCodec) -> Option<Value> {
    let offset = decode_memo_offset(buffer);
    memo?.resolve(offset, text).map(Value::Memo)
}

// Integer

fn encode_integer(field: &Field, value: Option<&Value>, _text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    let i = match value {
        None => 0,
        Some(Value::Integer(i)) => *i,
        Some(Value::Numeric(n)) if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 => *n as i32,
        Some(v) => return Err(mismatch(field, v)),
    };
    let mut buf = vec![0u8; 4];
    codec::put_le_i32(&mut buf, i);
    Ok(buf)
}

fn decode_integer(buffer: &[u8], _memo: Option<&MemoStore>, _text: &dyn TextCodec) -> Option<Value> {
    if buffer.len() < 4 {
        return None;
    }
    Some(Value::Integer(codec::le_i32(buffer)))
}

// Currency

const CURRENCY_SCALE: f64 = 10_000.0;

fn encode_currency(field: &Field, value: Option<&Value>, _text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    let scaled = match value {
        None => 0,
        Some(v) => {
            let n = v.as_f64().ok_or_else(|| mismatch(field, v))?;
            (n * CURRENCY_SCALE).round() as i64
        }
    };
    let mut buf = vec![0u8; 8];
    codec::put_le_i64(&mut buf, scaled);
    Ok(buf)
}

fn decode_currency(buffer: &[u8], _memo: Option<&MemoStore>, _text: &dyn TextCodec) -> Option<Value> {
    if buffer.len() < 8 {
        return None;
    }
    Some(Value::Currency(codec::le_i64(buffer) as f64 / CURRENCY_SCALE))
}

// DateTime

fn encode_datetime(field: &Field, value: Option<&Value>, _text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    let dt = match value {
        None => return Ok(vec![0u8; 8]),
        Some(Value::DateTime(dt)) => *dt,
        Some(v @ Value::Date(d)) => d.and_hms_opt(0, 0, 0).ok_or_else(|| mismatch(field, v))?,
        Some(v) => return Err(mismatch(field, v)),
    };

    let day = codec::julian_from_date(dt.date());
    let time = dt.time();
    let millis = time.num_seconds_from_midnight() as i32 * 1000 + (time.nanosecond() / 1_000_000).min(999) as i32;

    let mut buf = vec![0u8; 8];
    codec::put_le_i32(&mut buf[0..4], day);
    codec::put_le_i32(&mut buf[4..8], millis);
    Ok(buf)
}

fn decode_datetime(buffer: &[u8], _memo: Option<&MemoStore>, _text: &dyn TextCodec) -> Option<Value> {
    if buffer.len() < 8 {
        return None;
    }
    let day = codec::le_i32(&buffer[0..4]);
    let millis = codec::le_i32(&buffer[4..8]);
    if day == 0 {
        return None;
    }

    let date = codec::date_from_julian(day)?;
    let millis = u32::try_from(millis).ok()?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(millis / 1000, (millis % 1000) * 1_000_000)?;
    Some(Value::DateTime(NaiveDateTime::new(date, time)))
}

// Double

fn encode_double(field: &Field, value: Option<&Value>, _text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    let n = match value {
        None => 0.0,
        Some(v) => v.as_f64().ok_or_else(|| mismatch(field, v))?,
    };
    let mut buf = vec![0u8; 8];
    codec::put_le_f64(&mut buf, n);
    Ok(buf)
}

fn decode_double(buffer: &[u8], _memo: Option<&MemoStore>, _text: &dyn TextCodec) -> Option<Value> {
    if buffer.len() < 8 {
        return None;
    }
    Some(Value::Double(codec::le_f64(buffer)))
}

// Unknown types

fn encode_raw(field: &Field, value: Option<&Value>, _text: &dyn TextCodec) -> DbfResult<Vec<u8>> {
    match value {
        None => Ok(blank(field)),
        Some(Value::Bytes(b)) => Ok(b.clone()),
        Some(v) => Err(mismatch(field, v)),
    }
}

fn decode_raw(buffer: &[u8], _memo: Option<&MemoStore>, _text: &dyn TextCodec) -> Option<Value> {
    Some(Value::Bytes(buffer.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::Latin1;

    fn roundtrip(field: &Field, value: Option<Value>) -> Option<Value> {
        let buf = encode_field(field, value.as_ref(), &Latin1).unwrap();
        assert_eq!(buf.len(), field.length as usize);
        decode_field(field, &buf, None, &Latin1)
    }

    #[test]
    fn test_character_pads_and_trims() {
        let field = Field::character("NAME", 8).unwrap();
        let buf = encode_field(&field, Some(&Value::from("ALICE")), &Latin1).unwrap();
        assert_eq!(&buf, b"ALICE   ");
        assert_eq!(roundtrip(&field, Some("ALICE".into())), Some(Value::from("ALICE")));

        // Longer text is cut to the field width.
        let buf = encode_field(&field, Some(&Value::from("ABCDEFGHIJ")), &Latin1).unwrap();
        assert_eq!(&buf, b"ABCDEFGH");

        assert_eq!(roundtrip(&field, None), None);
    }

    #[test]
    fn test_character_cut_on_char_boundary() {
        use crate::text::Utf8;

        let field = Field::character("NAME", 4).unwrap();
        let buf = encode_field(&field, Some(&Value::from("aé€")), &Utf8).unwrap();
        assert_eq!(buf, b"a\xc3\xa9 ".to_vec());
        assert_eq!(decode_field(&field, &buf, None, &Utf8), Some(Value::from("aé")));
    }

    #[test]
    fn test_numeric_fixed_decimals() {
        let field = Field::numeric("PRICE", 8, 2).unwrap();
        let buf = encode_field(&field, Some(&Value::Numeric(12.5)), &Latin1).unwrap();
        assert_eq!(&buf, b"   12.50");
        assert_eq!(roundtrip(&field, Some(Value::Numeric(-3.25))), Some(Value::Numeric(-3.25)));
        assert_eq!(roundtrip(&field, None), None);
    }

    #[test]
    fn test_numeric_overflow() {
        let field = Field::numeric("QTY", 3, 0).unwrap();
        let err = encode_field(&field, Some(&Value::Numeric(12345.0)), &Latin1).unwrap_err();
        assert!(matches!(err, DbfError::EncodingOverflow { length: 3, actual: 5, .. }));
    }

    #[test]
    fn test_numeric_garbage_decodes_to_none() {
        let field = Field::numeric("QTY", 3, 0).unwrap();
        assert_eq!(decode_field(&field, b"***", None, &Latin1), None);
    }

    #[test]
    fn test_date() {
        let field = Field::date("BORN").unwrap();
        let date = NaiveDate::from_ymd_opt(1987, 6, 21).unwrap();
        let buf = encode_field(&field, Some(&Value::Date(date)), &Latin1).unwrap();
        assert_eq!(&buf, b"19870621");
        assert_eq!(roundtrip(&field, Some(Value::Date(date))), Some(Value::Date(date)));
        assert_eq!(decode_field(&field, b"        ", None, &Latin1), None);
        assert_eq!(decode_field(&field, b"19871340", None, &Latin1), None);
    }

    #[test]
    fn test_logical_tri_state() {
        let field = Field::logical("OK").unwrap();
        assert_eq!(roundtrip(&field, None), None);
        assert_eq!(roundtrip(&field, Some(Value::Logical(true))), Some(Value::Logical(true)));
        assert_eq!(roundtrip(&field, Some(Value::Logical(false))), Some(Value::Logical(false)));

        assert_eq!(encode_field(&field, None, &Latin1).unwrap(), b"?".to_vec());
        assert_eq!(decode_field(&field, b"t", None, &Latin1), Some(Value::Logical(true)));
        assert_eq!(decode_field(&field, b"y", None, &Latin1), Some(Value::Logical(true)));
        assert_eq!(decode_field(&field, b"F", None, &Latin1), Some(Value::Logical(false)));
        assert_eq!(decode_field(&field, b" ", None, &Latin1), None);
    }

    #[test]
    fn test_memo_offset_representations() {
        let binary = Field::memo("NOTES").unwrap();
        assert_eq!(encode_memo_offset(&binary, 9), vec![9, 0, 0, 0]);
        assert_eq!(decode_memo_offset(&[9, 0, 0, 0]), 9);
        assert_eq!(encode_field(&binary, Some(&Value::Memo("x".into())), &Latin1).unwrap(), vec![0; 4]);

        let ascii = Field::new("NOTES", FieldType::Memo, 10, 0).unwrap();
        assert_eq!(encode_memo_offset(&ascii, 42), b"        42".to_vec());
        assert_eq!(encode_memo_offset(&ascii, 0), b"          ".to_vec());
        assert_eq!(decode_memo_offset(b"        42"), 42);
        assert_eq!(decode_memo_offset(b"          "), 0);
    }

    #[test]
    fn test_memo_content_accepts_text_only() {
        let field = Field::memo("NOTES").unwrap();
        assert_eq!(memo_content(&field, Some(&Value::Memo("hi".into())), &Latin1).unwrap(), b"hi".to_vec());
        assert_eq!(memo_content(&field, Some(&Value::from("yo")), &Latin1).unwrap(), b"yo".to_vec());
        assert!(memo_content(&field, None, &Latin1).unwrap().is_empty());

        let err = memo_content(&field, Some(&Value::Integer(42)), &Latin1).unwrap_err();
        assert!(matches!(err, DbfError::InvalidArgument(_)));
        let err = encode_field(&field, Some(&Value::Integer(42)), &Latin1).unwrap_err();
        assert!(matches!(err, DbfError::InvalidArgument(_)));
    }

    #[test]
    fn test_memo_without_store_is_absent() {
        let field = Field::memo("NOTES").unwrap();
        assert_eq!(decode_field(&field, &[8, 0, 0, 0], None, &Latin1), None);
    }

    #[test]
    fn test_binary_types() {
        let int = Field::integer("ID").unwrap();
        assert_eq!(roundtrip(&int, Some(Value::Integer(-42))), Some(Value::Integer(-42)));

        let cur = Field::currency("COST").unwrap();
        assert_eq!(roundtrip(&cur, Some(Value::Currency(19.99))), Some(Value::Currency(19.99)));

        let dbl = Field::double("RATIO", 4).unwrap();
        assert_eq!(roundtrip(&dbl, Some(Value::Double(0.125))), Some(Value::Double(0.125)));

        let ts = Field::datetime("SEEN").unwrap();
        let dt = NaiveDate::from_ymd_opt(2021, 3, 4)
            .unwrap()
            .and_hms_milli_opt(13, 45, 10, 250)
            .unwrap();
        assert_eq!(roundtrip(&ts, Some(Value::DateTime(dt))), Some(Value::DateTime(dt)));
        assert_eq!(roundtrip(&ts, None), None);
    }

    #[test]
    fn test_type_mismatch() {
        let field = Field::numeric("QTY", 5, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let err = encode_field(&field, Some(&Value::Date(date)), &Latin1).unwrap_err();
        assert!(matches!(err, DbfError::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_type_keeps_bytes() {
        let field = Field {
            name: "PIC".into(),
            field_type: FieldType::Other(b'G'),
            length: 4,
            decimals: 0,
            flags: 0,
        };
        let decoded = decode_field(&field, &[1, 2, 3, 4], None, &Latin1);
        assert_eq!(decoded, Some(Value::Bytes(vec![1, 2, 3, 4])));
        let buf = encode_field(&field, decoded.as_ref(), &Latin1).unwrap();
        assert_eq!(buf, vec![1, 2, 3, 4]);
    }
}
