use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes a bencode value from a byte slice.
///
/// The input must contain exactly one complete bencode value with no
/// trailing data. Dictionary keys must be byte strings in strictly
/// ascending order; out-of-order or duplicate keys are rejected, so
/// any accepted input re-encodes to identical bytes.
///
/// # Errors
///
/// Returns an error if:
/// - The input is empty or truncated ([`BencodeError::UnexpectedEof`])
/// - The input contains invalid bencode syntax
/// - Dictionary keys are unsorted or repeated
/// - The nesting depth exceeds 64 levels ([`BencodeError::NestingTooDeep`])
/// - There is data after the value ([`BencodeError::TrailingData`])
///
/// # Examples
///
/// ```
/// use remora::bencode::decode;
///
/// let int = decode(b"i42e").unwrap();
/// assert_eq!(int.as_integer(), Some(42));
///
/// let string = decode(b"5:hello").unwrap();
/// assert_eq!(string.as_str(), Some("hello"));
///
/// let list = decode(b"li1ei2ei3ee").unwrap();
/// assert_eq!(list.as_list().unwrap().len(), 3);
///
/// let dict = decode(b"d3:agei30e4:name5:Alicee").unwrap();
/// assert_eq!(dict.get(b"name").and_then(|v| v.as_str()), Some("Alice"));
/// ```
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut pos = 0;
    let value = decode_value(data, &mut pos, 0)?;

    if pos != data.len() {
        return Err(BencodeError::TrailingData(pos));
    }

    Ok(value)
}

fn decode_value(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    if depth > MAX_DEPTH {
        return Err(BencodeError::NestingTooDeep);
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof(*pos));
    }

    match data[*pos] {
        b'i' => decode_integer(data, pos),
        b'l' => decode_list(data, pos, depth),
        b'd' => decode_dict(data, pos, depth),
        b'0'..=b'9' => decode_bytes(data, pos).map(Value::Bytes),
        byte => Err(BencodeError::InvalidPrefix { pos: *pos, byte }),
    }
}

fn decode_integer(data: &[u8], pos: &mut usize) -> Result<Value, BencodeError> {
    let field_pos = *pos;
    *pos += 1;

    let start = *pos;
    while *pos < data.len() && data[*pos] != b'e' {
        *pos += 1;
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof(*pos));
    }

    let int_str = std::str::from_utf8(&data[start..*pos]).map_err(|_| {
        BencodeError::InvalidInteger {
            pos: field_pos,
            reason: "not ascii digits",
        }
    })?;

    if int_str.is_empty() {
        return Err(BencodeError::InvalidInteger {
            pos: field_pos,
            reason: "empty",
        });
    }

    if int_str.starts_with("-0") {
        return Err(BencodeError::InvalidInteger {
            pos: field_pos,
            reason: "negative zero",
        });
    }

    if int_str.starts_with('0') && int_str.len() > 1 {
        return Err(BencodeError::InvalidInteger {
            pos: field_pos,
            reason: "leading zeros",
        });
    }

    let value: i64 = int_str.parse().map_err(|_| BencodeError::InvalidInteger {
        pos: field_pos,
        reason: "not a 64-bit integer",
    })?;

    *pos += 1;
    Ok(Value::Integer(value))
}

fn decode_bytes(data: &[u8], pos: &mut usize) -> Result<Bytes, BencodeError> {
    let field_pos = *pos;

    let start = *pos;
    while *pos < data.len() && data[*pos] != b':' {
        *pos += 1;
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof(*pos));
    }

    let len_str = std::str::from_utf8(&data[start..*pos])
        .map_err(|_| BencodeError::InvalidStringLength(field_pos))?;

    if len_str.starts_with('0') && len_str.len() > 1 {
        return Err(BencodeError::InvalidStringLength(field_pos));
    }

    let len: usize = len_str
        .parse()
        .map_err(|_| BencodeError::InvalidStringLength(field_pos))?;

    *pos += 1;

    if *pos + len > data.len() {
        return Err(BencodeError::UnexpectedEof(data.len()));
    }

    let bytes = Bytes::copy_from_slice(&data[*pos..*pos + len]);
    *pos += len;

    Ok(bytes)
}

fn decode_list(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    *pos += 1;
    let mut list = Vec::new();

    while *pos < data.len() && data[*pos] != b'e' {
        list.push(decode_value(data, pos, depth + 1)?);
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof(*pos));
    }

    *pos += 1;
    Ok(Value::List(list))
}

fn decode_dict(data: &[u8], pos: &mut usize, depth: usize) -> Result<Value, BencodeError> {
    *pos += 1;
    let mut dict = BTreeMap::new();
    let mut last_key: Option<Bytes> = None;

    while *pos < data.len() && data[*pos] != b'e' {
        let key_pos = *pos;
        let key = match data[*pos] {
            b'0'..=b'9' => decode_bytes(data, pos)?,
            _ => return Err(BencodeError::InvalidKey(key_pos)),
        };

        // Strictly ascending raw-byte order makes the sorted map a
        // faithful representation of the input bytes.
        if let Some(ref prev) = last_key {
            if key == *prev {
                return Err(BencodeError::DuplicateKey(key_pos));
            }
            if key < *prev {
                return Err(BencodeError::UnsortedKeys(key_pos));
            }
        }

        let value = decode_value(data, pos, depth + 1)?;
        last_key = Some(key.clone());
        dict.insert(key, value);
    }

    if *pos >= data.len() {
        return Err(BencodeError::UnexpectedEof(*pos));
    }

    *pos += 1;
    Ok(Value::Dict(dict))
}
