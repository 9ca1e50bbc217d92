//! Raw field-bag access.
//!
//! Scalars arrive as decimal strings (u64) or JSON numbers (u8), addresses as
//! `0x` strings, byte vectors as arrays of 0..=255 integers, and UIDs either as
//! a bare id string or as `{ "id": "0x.." }`.

use serde_json::{Map, Value};

use crate::domain::{Address, BoardError};
use crate::domain::ids::is_ledger_address;

/// A Move object's field bag.
pub type FieldBag = Map<String, Value>;

type Result<T> = std::result::Result<T, BoardError>;

/// Last path segment of a type name, without generics.
///
/// `0x2::dynamic_field::Field<u64, 0xpkg::board::Task>` -> `Field`
pub fn struct_name_of(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base).trim()
}

/// A required field: missing and `null` both count as malformed.
pub fn required<'a>(fields: &'a FieldBag, name: &str) -> Result<&'a Value> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(BoardError::decode(name, "missing")),
        Some(value) => Ok(value),
    }
}

/// Inner field bag of a struct value: `{ "type", "fields": {..} }` or the bag itself.
pub fn struct_fields(value: &Value) -> Option<&FieldBag> {
    let obj = value.as_object()?;
    match obj.get("fields") {
        Some(Value::Object(inner)) => Some(inner),
        _ => Some(obj),
    }
}

pub fn str_of<'a>(field: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| BoardError::decode(field, format!("expected string, got {value}")))
}

pub fn u64_of(field: &str, value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| BoardError::decode(field, format!("not an unsigned integer: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| BoardError::decode(field, format!("`{s}`: {e}"))),
        other => Err(BoardError::decode(
            field,
            format!("expected decimal integer, got {other}"),
        )),
    }
}

pub fn u8_of(field: &str, value: &Value) -> Result<u8> {
    let n = u64_of(field, value)?;
    u8::try_from(n).map_err(|_| BoardError::decode(field, format!("{n} does not fit in u8")))
}

pub fn address_of(field: &str, value: &Value) -> Result<Address> {
    let s = str_of(field, value)?;
    Address::parse(s).ok_or_else(|| BoardError::decode(field, format!("`{s}` is not an address")))
}

pub fn bytes_of(field: &str, value: &Value) -> Result<Vec<u8>> {
    let items = value
        .as_array()
        .ok_or_else(|| BoardError::decode(field, format!("expected byte array, got {value}")))?;
    items.iter().map(|item| u8_of(field, item)).collect()
}

/// Text field that may arrive as a string or as a UTF-8 byte vector.
///
/// An empty byte vector decodes to an empty string. Invalid UTF-8 (e.g. an
/// encrypted payload) is decoded lossily rather than rejected.
pub fn text_of(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) => {
            let bytes = bytes_of(field, value)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        other => Err(BoardError::decode(
            field,
            format!("expected text or bytes, got {other}"),
        )),
    }
}

/// UID / ID value: `"0x.."`, `{ "id": "0x.." }` or `{ "id": { "id": "0x.." } }`.
pub fn uid_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if is_ledger_address(s) => Some(s),
        Value::Object(obj) => obj.get("id").and_then(uid_of),
        _ => None,
    }
}

/// Array of ids / addresses as strings, preserving order.
pub fn id_list_of(field: &str, value: &Value) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| BoardError::decode(field, format!("expected array, got {value}")))?;
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => Ok(n.to_string()),
            other => uid_of(other)
                .map(str::to_string)
                .or_else(|| other.as_str().map(str::to_string))
                .ok_or_else(|| BoardError::decode(field, format!("not an id: {other}"))),
        })
        .collect()
}

/// serde helper: u64 that serializes as a decimal string and accepts either form.
pub mod serde_u64 {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        struct DecimalVisitor;

        impl Visitor<'_> for DecimalVisitor {
            type Value = u64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a u64 as number or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
                u64::try_from(v).map_err(|_| E::custom(format!("negative version {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
                v.trim().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}
