//! Order-preserving field and row codecs.
//!
//! Key encodings must be comparator-consistent: for any two field values,
//! byte order of the encodings equals value order. That property is what
//! lets the scan engine express every bound and prefix as one contiguous
//! byte range of a tree.
//!
//! Key-field layout:
//! - NULL: `0x05` (sorts before every value)
//! - Int: `0x10` then the 64-bit value, sign bit flipped, big-endian
//! - Text: `0x20` then zero-escaped bytes, then terminator `0x00 0x01`
//! - Bytes: `0x30` then the same escaped form
//!
//! Escaping replaces a content `0x00` with `0x00 0xFF`, so the terminator
//! `0x00 0x01` both ends the field unambiguously and sorts below every
//! continuation, preserving prefix order across different lengths. Prefix
//! bounds are encoded by omitting the terminator.
//!
//! Row payload layout: table id (u32), field count (u16), then one tagged
//! field each (`0x00` NULL, `0x01` int, `0x02` text, `0x03` bytes with a
//! u32 length).

use arbor_common::error::{ArborError, ArborResult};
use arbor_common::types::TableId;

use super::rowdata::{Field, RowData};

const KEY_TAG_NULL: u8 = 0x05;
const KEY_TAG_INT: u8 = 0x10;
const KEY_TAG_TEXT: u8 = 0x20;
const KEY_TAG_BYTES: u8 = 0x30;

const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

const ROW_TAG_NULL: u8 = 0x00;
const ROW_TAG_INT: u8 = 0x01;
const ROW_TAG_TEXT: u8 = 0x02;
const ROW_TAG_BYTES: u8 = 0x03;

fn put_escaped(data: &[u8], terminated: bool, out: &mut Vec<u8>) {
    for &byte in data {
        if byte == ESCAPE {
            out.push(ESCAPE);
            out.push(ESCAPED_ZERO);
        } else {
            out.push(byte);
        }
    }
    if terminated {
        out.push(ESCAPE);
        out.push(TERMINATOR);
    }
}

/// Appends one key-encoded field.
///
/// With `prefix_mode` set, variable-length values omit their terminator so
/// the encoding matches every value sharing the byte prefix.
pub fn encode_key_field(field: Option<&Field>, prefix_mode: bool, out: &mut Vec<u8>) {
    match field {
        None => out.push(KEY_TAG_NULL),
        Some(Field::Int(v)) => {
            out.push(KEY_TAG_INT);
            out.extend_from_slice(&((*v as u64) ^ 0x8000_0000_0000_0000).to_be_bytes());
        }
        Some(Field::Text(s)) => {
            out.push(KEY_TAG_TEXT);
            put_escaped(s.as_bytes(), !prefix_mode, out);
        }
        Some(Field::Bytes(b)) => {
            out.push(KEY_TAG_BYTES);
            put_escaped(b, !prefix_mode, out);
        }
    }
}

fn read_escaped(bytes: &[u8], pos: &mut usize) -> ArborResult<Vec<u8>> {
    let mut data = Vec::new();
    loop {
        let Some(&byte) = bytes.get(*pos) else {
            return Err(ArborError::corrupt("unterminated variable-length field"));
        };
        *pos += 1;
        if byte != ESCAPE {
            data.push(byte);
            continue;
        }
        let Some(&marker) = bytes.get(*pos) else {
            return Err(ArborError::corrupt("dangling escape byte"));
        };
        *pos += 1;
        match marker {
            ESCAPED_ZERO => data.push(0x00),
            TERMINATOR => return Ok(data),
            other => {
                return Err(ArborError::corrupt(format!(
                    "invalid escape marker {other:#04x}"
                )))
            }
        }
    }
}

/// Decodes one key-encoded field starting at `*pos`, advancing it.
pub fn decode_key_field(bytes: &[u8], pos: &mut usize) -> ArborResult<Option<Field>> {
    let Some(&tag) = bytes.get(*pos) else {
        return Err(ArborError::corrupt("truncated key field"));
    };
    *pos += 1;
    match tag {
        KEY_TAG_NULL => Ok(None),
        KEY_TAG_INT => {
            let end = *pos + 8;
            let Some(raw) = bytes.get(*pos..end) else {
                return Err(ArborError::corrupt("truncated int key field"));
            };
            let mut buf = [0u8; 8];
            buf.copy_from_slice(raw);
            *pos = end;
            Ok(Some(Field::Int(
                (u64::from_be_bytes(buf) ^ 0x8000_0000_0000_0000) as i64,
            )))
        }
        KEY_TAG_TEXT => {
            let data = read_escaped(bytes, pos)?;
            let text = String::from_utf8(data)
                .map_err(|_| ArborError::corrupt("invalid UTF-8 in text key field"))?;
            Ok(Some(Field::Text(text)))
        }
        KEY_TAG_BYTES => Ok(Some(Field::Bytes(read_escaped(bytes, pos)?))),
        other => Err(ArborError::corrupt(format!("unknown key tag {other:#04x}"))),
    }
}

/// Advances `*pos` past one key-encoded field without materializing it.
pub fn skip_key_field(bytes: &[u8], pos: &mut usize) -> ArborResult<()> {
    decode_key_field(bytes, pos).map(|_| ())
}

/// Encodes a row payload.
pub fn encode_row(row: &RowData, out: &mut Vec<u8>) {
    out.extend_from_slice(&row.table().as_u32().to_be_bytes());
    out.extend_from_slice(&(row.num_fields() as u16).to_be_bytes());
    for field in row.fields() {
        match field {
            None => out.push(ROW_TAG_NULL),
            Some(Field::Int(v)) => {
                out.push(ROW_TAG_INT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Some(Field::Text(s)) => {
                out.push(ROW_TAG_TEXT);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Some(Field::Bytes(b)) => {
                out.push(ROW_TAG_BYTES);
                out.extend_from_slice(&(b.len() as u32).to_be_bytes());
                out.extend_from_slice(b);
            }
        }
    }
}

fn read_exact<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> ArborResult<&'a [u8]> {
    let end = *pos + len;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| ArborError::corrupt("truncated row payload"))?;
    *pos = end;
    Ok(slice)
}

/// Decodes a row payload.
pub fn decode_row(bytes: &[u8]) -> ArborResult<RowData> {
    let mut pos = 0;
    let table_raw = read_exact(bytes, &mut pos, 4)?;
    let table = TableId::new(u32::from_be_bytes([
        table_raw[0],
        table_raw[1],
        table_raw[2],
        table_raw[3],
    ]));
    let count_raw = read_exact(bytes, &mut pos, 2)?;
    let count = u16::from_be_bytes([count_raw[0], count_raw[1]]) as usize;

    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = read_exact(bytes, &mut pos, 1)?[0];
        let field = match tag {
            ROW_TAG_NULL => None,
            ROW_TAG_INT => {
                let raw = read_exact(bytes, &mut pos, 8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(raw);
                Some(Field::Int(i64::from_be_bytes(buf)))
            }
            ROW_TAG_TEXT => {
                let len_raw = read_exact(bytes, &mut pos, 4)?;
                let len =
                    u32::from_be_bytes([len_raw[0], len_raw[1], len_raw[2], len_raw[3]]) as usize;
                let data = read_exact(bytes, &mut pos, len)?;
                Some(Field::Text(String::from_utf8(data.to_vec()).map_err(
                    |_| ArborError::corrupt("invalid UTF-8 in row payload"),
                )?))
            }
            ROW_TAG_BYTES => {
                let len_raw = read_exact(bytes, &mut pos, 4)?;
                let len =
                    u32::from_be_bytes([len_raw[0], len_raw[1], len_raw[2], len_raw[3]]) as usize;
                Some(Field::Bytes(read_exact(bytes, &mut pos, len)?.to_vec()))
            }
            other => {
                return Err(ArborError::corrupt(format!(
                    "unknown row field tag {other:#04x}"
                )))
            }
        };
        fields.push(field);
    }
    if pos != bytes.len() {
        return Err(ArborError::corrupt("trailing bytes after row payload"));
    }
    Ok(RowData::from_fields(table, fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_one(field: Option<&Field>) -> Vec<u8> {
        let mut out = Vec::new();
        encode_key_field(field, false, &mut out);
        out
    }

    #[test]
    fn test_int_key_order_matches_value_order() {
        let values = [i64::MIN, -100, -1, 0, 1, 7, 100, i64::MAX];
        let mut encoded: Vec<Vec<u8>> = values
            .iter()
            .map(|&v| encode_one(Some(&Field::Int(v))))
            .collect();
        let sorted = encoded.clone();
        encoded.sort();
        assert_eq!(encoded, sorted);
    }

    #[test]
    fn test_text_key_order_across_lengths() {
        let values = ["", "a", "ab", "ab\x00", "ab\x01", "abc", "b"];
        let mut encoded: Vec<Vec<u8>> = values
            .iter()
            .map(|v| encode_one(Some(&Field::Text(v.to_string()))))
            .collect();
        let sorted = encoded.clone();
        encoded.sort();
        assert_eq!(encoded, sorted);
    }

    #[test]
    fn test_null_sorts_first() {
        let null = encode_one(None);
        let int = encode_one(Some(&Field::Int(i64::MIN)));
        let text = encode_one(Some(&Field::Text(String::new())));
        assert!(null < int);
        assert!(null < text);
    }

    #[test]
    fn test_prefix_mode_is_byte_prefix() {
        let mut prefix = Vec::new();
        encode_key_field(Some(&Field::Text("ab".to_string())), true, &mut prefix);
        let full = encode_one(Some(&Field::Text("abc".to_string())));
        assert!(full.starts_with(&prefix));
        let other = encode_one(Some(&Field::Text("b".to_string())));
        assert!(!other.starts_with(&prefix));
    }

    #[test]
    fn test_key_field_roundtrip() {
        let fields = [
            None,
            Some(Field::Int(-42)),
            Some(Field::Text("hi\x00there".to_string())),
            Some(Field::Bytes(vec![0, 1, 2, 0])),
        ];
        let mut out = Vec::new();
        for field in &fields {
            encode_key_field(field.as_ref(), false, &mut out);
        }
        let mut pos = 0;
        for field in &fields {
            assert_eq!(&decode_key_field(&out, &mut pos).unwrap(), field);
        }
        assert_eq!(pos, out.len());
    }

    #[test]
    fn test_row_roundtrip() {
        let row = RowData::from_fields(
            TableId::new(3),
            vec![
                Some(Field::Int(7)),
                None,
                Some(Field::Text("x".to_string())),
                Some(Field::Bytes(vec![9, 9])),
            ],
        );
        let mut out = Vec::new();
        encode_row(&row, &mut out);
        assert_eq!(decode_row(&out).unwrap(), row);
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let row = RowData::from_fields(TableId::new(1), vec![Some(Field::Int(1))]);
        let mut out = Vec::new();
        encode_row(&row, &mut out);
        out.truncate(out.len() - 1);
        assert!(decode_row(&out).is_err());
    }
}
