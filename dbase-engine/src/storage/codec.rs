//! Byte codec primitives shared by the table and memo formats
//!
//! The table file stores every integer little-endian; the `.fpt` memo file
//! stores its counters big-endian. Callers pick the helper for their region.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{Datelike, NaiveDate};
use std::io::{self, Read};

use crate::text::TextCodec;

/// Julian day number of 0001-01-01 (proleptic Gregorian) minus one
const JULIAN_CE_OFFSET: i32 = 1_721_425;

pub fn le_u16(buf: &[u8]) -> u16 {
    LittleEndian::read_u16(buf)
}

pub fn le_u32(buf: &[u8]) -> u32 {
    LittleEndian::read_u32(buf)
}

pub fn le_i32(buf: &[u8]) -> i32 {
    LittleEndian::read_i32(buf)
}

pub fn le_i64(buf: &[u8]) -> i64 {
    LittleEndian::read_i64(buf)
}

pub fn le_f64(buf: &[u8]) -> f64 {
    LittleEndian::read_f64(buf)
}

pub fn be_u32(buf: &[u8]) -> u32 {
    BigEndian::read_u32(buf)
}

pub fn put_be_u32(buf: &mut [u8], value: u32) {
    BigEndian::write_u32(buf, value)
}

pub fn put_le_u16(buf: &mut [u8], value: u16) {
    LittleEndian::write_u16(buf, value)
}

pub fn put_le_u32(buf: &mut [u8], value: u32) {
    LittleEndian::write_u32(buf, value)
}

pub fn put_le_i32(buf: &mut [u8], value: i32) {
    LittleEndian::write_i32(buf, value)
}

pub fn put_le_i64(buf: &mut [u8], value: i64) {
    LittleEndian::write_i64(buf, value)
}

pub fn put_le_f64(buf: &mut [u8], value: f64) {
    LittleEndian::write_f64(buf, value)
}

/// Decode the 3-byte YY MM DD stamp of a table header.
///
/// Month and day of 0 are normalized to 1; a combination that is still not a
/// calendar date falls back to the first of the month, then to January 1st.
pub fn decode_header_date(raw: [u8; 3]) -> NaiveDate {
    let year = 1900 + raw[0] as i32;
    let month = (raw[1] as u32).max(1);
    let day = (raw[2] as u32).max(1);

    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
        .or_else(|| NaiveDate::from_ymd_opt(year, 1, 1))
        .unwrap_or(NaiveDate::MIN)
}

/// Encode a date as the 3-byte header stamp; years outside 1900..=2155 are clamped
pub fn encode_header_date(date: NaiveDate) -> [u8; 3] {
    let year = (date.year() - 1900).clamp(0, 255) as u8;
    [year, date.month() as u8, date.day() as u8]
}

/// Julian day number to calendar date
pub fn date_from_julian(day: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(day.checked_sub(JULIAN_CE_OFFSET)?)
}

/// Calendar date to Julian day number
pub fn julian_from_date(date: NaiveDate) -> i32 {
    date.num_days_from_ce() + JULIAN_CE_OFFSET
}

/// Copy `bytes` into a buffer of exactly `len` bytes, truncating or filling with `pad`
pub fn fixed_width(bytes: &[u8], len: usize, pad: u8) -> Vec<u8> {
    let mut buf = vec![pad; len];
    let n = bytes.len().min(len);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

/// Encode `text` into at most `len` bytes, dropping whole characters from the
/// end so a multi-byte character is never split
pub fn encode_truncated(text: &str, len: usize, codec: &dyn TextCodec) -> Vec<u8> {
    let encoded = codec.encode(text);
    if encoded.len() <= len {
        return encoded;
    }

    let mut out = Vec::with_capacity(len);
    let mut scratch = [0u8; 4];
    for ch in text.chars() {
        let bytes = codec.encode(ch.encode_utf8(&mut scratch));
        if out.len() + bytes.len() > len {
            break;
        }
        out.extend_from_slice(&bytes);
    }
    out
}

/// Right-align `bytes` in a buffer of `len` bytes, left-filled with spaces.
/// Returns `None` when the content is wider than the buffer.
pub fn right_aligned(bytes: &[u8], len: usize) -> Option<Vec<u8>> {
    if bytes.len() > len {
        return None;
    }
    let mut buf = vec![b' '; len];
    buf[len - bytes.len()..].copy_from_slice(bytes);
    Some(buf)
}

/// Strip trailing spaces and NULs
pub fn trim_end_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Strip leading and trailing spaces and NULs
pub fn trim_padding(bytes: &[u8]) -> &[u8] {
    let trimmed = trim_end_padding(bytes);
    let start = trimmed
        .iter()
        .position(|&b| b != b' ' && b != 0)
        .unwrap_or(trimmed.len());
    &trimmed[start..]
}

/// Fill `buf` from `reader` until it is full or the stream ends.
///
/// Returns the number of bytes read. Unlike `read_exact` a short stream is not
/// an error here; the caller decides what a partial read means.
pub fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read a single byte, `None` at end of stream
pub fn read_byte<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    Ok(match read_fully(reader, &mut byte)? {
        0 => None,
        _ => Some(byte[0]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_date_normalizes_zero_month_and_day() {
        let date = decode_header_date([124, 0, 0]);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_header_date_invalid_day_falls_back() {
        let date = decode_header_date([101, 2, 30]);
        assert_eq!(date, NaiveDate::from_ymd_opt(2001, 2, 1).unwrap());
    }

    #[test]
    fn test_header_date_encoding() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        assert_eq!(encode_header_date(date), [124, 7, 15]);
        assert_eq!(decode_header_date(encode_header_date(date)), date);

        let old = NaiveDate::from_ymd_opt(1850, 3, 4).unwrap();
        assert_eq!(encode_header_date(old), [0, 3, 4]);
    }

    #[test]
    fn test_julian_days() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(julian_from_date(epoch), 2_440_588);
        assert_eq!(date_from_julian(2_440_588), Some(epoch));
        assert_eq!(date_from_julian(0), None);
    }

    #[test]
    fn test_padding_helpers() {
        assert_eq!(fixed_width(b"AB", 4, b' '), b"AB  ".to_vec());
        assert_eq!(fixed_width(b"ABCDEF", 4, 0), b"ABCD".to_vec());
        assert_eq!(right_aligned(b"42", 5), Some(b"   42".to_vec()));
        assert_eq!(right_aligned(b"123456", 5), None);
        assert_eq!(trim_end_padding(b"AB \0 "), b"AB");
        assert_eq!(trim_padding(b"  12.5 "), b"12.5");
        assert_eq!(trim_padding(b"    "), b"");
    }

    #[test]
    fn test_endianness_helpers() {
        let mut buf = [0u8; 4];
        put_be_u32(&mut buf, 0x0102_0304);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(be_u32(&buf), 0x0102_0304);
        assert_eq!(le_u32(&buf), 0x0403_0201);
        assert_eq!(le_u16(&buf), 0x0201);
    }

    #[test]
    fn test_little_endian_writers() {
        let mut buf = [0u8; 8];
        put_le_u16(&mut buf, 0x0201);
        assert_eq!(&buf[..2], &[1, 2]);
        put_le_u32(&mut buf, 97);
        assert_eq!(le_u32(&buf), 97);
        put_le_i32(&mut buf, -42);
        assert_eq!(le_i32(&buf), -42);
        put_le_i64(&mut buf, -123_456);
        assert_eq!(le_i64(&buf), -123_456);
        put_le_f64(&mut buf, 0.125);
        assert_eq!(le_f64(&buf), 0.125);
    }

    #[test]
    fn test_truncation_keeps_whole_characters() {
        use crate::text::{Latin1, Utf8};

        // "é" is two bytes and "€" three in UTF-8.
        assert_eq!(encode_truncated("aé€", 4, &Utf8), "aé".as_bytes().to_vec());
        assert_eq!(encode_truncated("aé€", 6, &Utf8), "aé€".as_bytes().to_vec());
        assert_eq!(encode_truncated("€€", 2, &Utf8), Vec::<u8>::new());
        assert_eq!(encode_truncated("ABCDEF", 4, &Latin1), b"ABCD".to_vec());
    }

    #[test]
    fn test_read_fully_short_stream() {
        let data = [1u8, 2, 3];
        let mut reader = &data[..];
        let mut buf = [0u8; 5];
        assert_eq!(read_fully(&mut reader, &mut buf).unwrap(), 3);
        assert_eq!(read_byte(&mut reader).unwrap(), None);
    }
}
