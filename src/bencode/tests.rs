use std::collections::BTreeMap;

use bytes::Bytes;

use super::*;

#[test]
fn test_decode_integer() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    assert_eq!(decode(b"i-42e").unwrap(), Value::Integer(-42));
    assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
    assert_eq!(
        decode(b"i9223372036854775807e").unwrap(),
        Value::Integer(i64::MAX)
    );
}

#[test]
fn test_decode_integer_invalid() {
    assert!(matches!(
        decode(b"i-0e"),
        Err(BencodeError::InvalidInteger { .. })
    ));
    assert!(matches!(
        decode(b"i03e"),
        Err(BencodeError::InvalidInteger { .. })
    ));
    assert!(matches!(
        decode(b"ie"),
        Err(BencodeError::InvalidInteger { .. })
    ));
    assert!(matches!(
        decode(b"i1x2e"),
        Err(BencodeError::InvalidInteger { .. })
    ));
    assert!(matches!(decode(b"i42"), Err(BencodeError::UnexpectedEof(_))));
}

#[test]
fn test_decode_bytes() {
    assert_eq!(
        decode(b"4:spam").unwrap(),
        Value::Bytes(Bytes::from_static(b"spam"))
    );
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(Bytes::from_static(b"")));
}

#[test]
fn test_decode_bytes_invalid() {
    // Declared length past the end of the input
    assert!(matches!(
        decode(b"10:short"),
        Err(BencodeError::UnexpectedEof(_))
    ));
    // Length prefix with leading zero
    assert!(matches!(
        decode(b"04:spam"),
        Err(BencodeError::InvalidStringLength(_))
    ));
}

#[test]
fn test_decode_invalid_prefix() {
    assert!(matches!(
        decode(b"x42e"),
        Err(BencodeError::InvalidPrefix { pos: 0, byte: b'x' })
    ));
}

#[test]
fn test_decode_list() {
    let result = decode(b"l4:spami42ee").unwrap();
    match result {
        Value::List(l) => {
            assert_eq!(l.len(), 2);
            assert_eq!(l[0], Value::Bytes(Bytes::from_static(b"spam")));
            assert_eq!(l[1], Value::Integer(42));
        }
        _ => panic!("expected list"),
    }
}

#[test]
fn test_decode_empty_containers() {
    assert_eq!(decode(b"le").unwrap(), Value::List(vec![]));
    assert_eq!(decode(b"de").unwrap(), Value::Dict(BTreeMap::new()));
}

#[test]
fn test_decode_dict() {
    let result = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
    match result {
        Value::Dict(d) => {
            assert_eq!(d.len(), 2);
            assert_eq!(
                d.get(&Bytes::from_static(b"cow")),
                Some(&Value::Bytes(Bytes::from_static(b"moo")))
            );
        }
        _ => panic!("expected dict"),
    }
}

#[test]
fn test_decode_dict_unsorted_keys() {
    assert!(matches!(
        decode(b"d4:spam4:eggs3:cow3:mooe"),
        Err(BencodeError::UnsortedKeys(_))
    ));
}

#[test]
fn test_decode_dict_duplicate_keys() {
    assert!(matches!(
        decode(b"d3:cow3:moo3:cow3:bahe"),
        Err(BencodeError::DuplicateKey(_))
    ));
}

#[test]
fn test_decode_dict_non_string_key() {
    assert!(matches!(
        decode(b"di1e3:mooe"),
        Err(BencodeError::InvalidKey(_))
    ));
}

#[test]
fn test_decode_unterminated_container() {
    assert!(matches!(
        decode(b"l4:spam"),
        Err(BencodeError::UnexpectedEof(_))
    ));
    assert!(matches!(
        decode(b"d3:cow3:moo"),
        Err(BencodeError::UnexpectedEof(_))
    ));
}

#[test]
fn test_decode_nesting_too_deep() {
    let mut data = vec![b'l'; 80];
    data.extend(vec![b'e'; 80]);
    assert!(matches!(decode(&data), Err(BencodeError::NestingTooDeep)));
}

#[test]
fn test_encode_integer() {
    assert_eq!(encode(&Value::Integer(42)), b"i42e");
    assert_eq!(encode(&Value::Integer(-42)), b"i-42e");
    assert_eq!(encode(&Value::Integer(0)), b"i0e");
}

#[test]
fn test_encode_bytes() {
    assert_eq!(encode(&Value::Bytes(Bytes::from_static(b"spam"))), b"4:spam");
    assert_eq!(encode(&Value::Bytes(Bytes::from_static(b""))), b"0:");
}

#[test]
fn test_encode_list() {
    let list = Value::List(vec![
        Value::Bytes(Bytes::from_static(b"spam")),
        Value::Integer(42),
    ]);
    assert_eq!(encode(&list), b"l4:spami42ee");
}

#[test]
fn test_encode_dict_sorts_keys() {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"spam"), Value::string("eggs"));
    dict.insert(Bytes::from_static(b"cow"), Value::string("moo"));
    let value = Value::Dict(dict);
    assert_eq!(encode(&value), b"d3:cow3:moo4:spam4:eggse");
}

#[test]
fn test_roundtrip() {
    let original: &[u8] =
        b"d8:announce15:http://test.com4:infod4:name4:test12:piece lengthi16384eee";
    let decoded = decode(original).unwrap();
    let encoded = encode(&decoded);
    assert_eq!(encoded, original);
}

#[test]
fn test_roundtrip_nested() {
    let data: &[u8] = b"d4:listl4:spami42eee";
    let decoded = decode(data).unwrap();
    let encoded = encode(&decoded);
    assert_eq!(encoded, data);
}

#[test]
fn test_roundtrip_binary_strings() {
    // Piece hashes are raw bytes, not UTF-8
    let mut data = Vec::from(&b"d6:pieces20:"[..]);
    data.extend([0u8, 1, 2, 255, 254, 253, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20]);
    data.push(b'e');

    let decoded = decode(&data).unwrap();
    let encoded = encode(&decoded);
    assert_eq!(encoded, data);
}

#[test]
fn test_trailing_data_error() {
    assert!(matches!(
        decode(b"i42eextra"),
        Err(BencodeError::TrailingData(4))
    ));
}

#[test]
fn test_value_accessors() {
    let value = Value::Integer(42);
    assert_eq!(value.as_integer(), Some(42));
    assert!(value.as_bytes().is_none());

    let value = Value::Bytes(Bytes::from_static(b"test"));
    assert_eq!(value.as_str(), Some("test"));
    assert!(value.as_integer().is_none());

    let value = Value::List(vec![]);
    assert!(value.as_list().is_some());
    assert!(value.as_dict().is_none());
}
