use super::value::Value;

/// Encodes a value into canonical bencode bytes.
///
/// Integers are emitted in shortest decimal form, byte strings as
/// `<len>:<raw>`, and dictionary keys in sorted order (the order the
/// map already maintains). Encoding cannot fail.
///
/// # Examples
///
/// ```
/// use remora::bencode::{encode, Value};
///
/// assert_eq!(encode(&Value::Integer(-42)), b"i-42e");
/// assert_eq!(encode(&Value::string("spam")), b"4:spam");
/// ```
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value(value, &mut buf);
    buf
}

fn encode_value(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Integer(i) => {
            buf.extend_from_slice(format!("i{}e", i).as_bytes());
        }
        Value::Bytes(b) => {
            buf.extend_from_slice(format!("{}:", b.len()).as_bytes());
            buf.extend_from_slice(b);
        }
        Value::List(l) => {
            buf.push(b'l');
            for item in l {
                encode_value(item, buf);
            }
            buf.push(b'e');
        }
        Value::Dict(d) => {
            buf.push(b'd');
            for (key, val) in d {
                buf.extend_from_slice(format!("{}:", key.len()).as_bytes());
                buf.extend_from_slice(key);
                encode_value(val, buf);
            }
            buf.push(b'e');
        }
    }
}
