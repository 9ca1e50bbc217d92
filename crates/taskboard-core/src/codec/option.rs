//! OptionCodec - on-chain optional values.
//!
//! The same logical `Option<T>` shows up in several wire shapes depending on the
//! RPC version and on how the object was rendered. Shapes are tried in a fixed
//! priority order; the first one that yields a non-null value wins.
//!
//! Absence is structural: `Some("")` is present.

use serde_json::{Map, Value};

use crate::domain::BoardError;

/// Wire shapes of an optional, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionShape {
    /// `{ "fields": { "value": X } }`
    NestedValue,
    /// `{ "fields": { "some": X } }`
    NestedSome,
    /// `{ "fields": { "vec": [X] } }` (struct-rendered `0x1::option::Option`)
    NestedVector,
    /// `{ "value": X }`
    FlatValue,
    /// `{ "Some": X }` / `{ "None": .. }`
    Tagged,
    /// `{ "vec": [] }` / `{ "vec": [X] }`
    Vector,
    /// A bare non-object value (RPC renders `Some(x)` as `x` and `None` as `null`).
    Bare,
}

const PRIORITY: [OptionShape; 6] = [
    OptionShape::NestedValue,
    OptionShape::NestedSome,
    OptionShape::NestedVector,
    OptionShape::FlatValue,
    OptionShape::Tagged,
    OptionShape::Vector,
];

impl OptionShape {
    fn probe(self, obj: &Map<String, Value>) -> Option<&Value> {
        let nested = || obj.get("fields").and_then(Value::as_object);
        match self {
            Self::NestedValue => nested()?.get("value"),
            Self::NestedSome => nested()?.get("some"),
            Self::NestedVector => single(nested()?.get("vec")?),
            Self::FlatValue => obj.get("value"),
            Self::Tagged => obj.get("Some"),
            Self::Vector => single(obj.get("vec")?),
            Self::Bare => None,
        }
    }
}

/// `vec` encoding: length 0 is absent, length 1 is the value, anything else is not an optional.
fn single(vec: &Value) -> Option<&Value> {
    match vec.as_array()?.as_slice() {
        [value] => Some(value),
        _ => None,
    }
}

/// Decodes on-chain optionals. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionCodec;

impl OptionCodec {
    /// Wrapped value, or `None` when no shape yields a non-null value.
    pub fn decode(raw: &Value) -> Option<&Value> {
        Self::decode_shape(raw).map(|(_, value)| value)
    }

    /// Like [`OptionCodec::decode`], also reporting which shape matched.
    pub fn decode_shape(raw: &Value) -> Option<(OptionShape, &Value)> {
        let obj = match raw {
            Value::Null => return None,
            Value::Object(obj) => obj,
            other => return Some((OptionShape::Bare, other)),
        };
        PRIORITY.iter().find_map(|shape| {
            shape
                .probe(obj)
                .filter(|value| !value.is_null())
                .map(|value| (*shape, value))
        })
    }

    /// Optional field of a bag, converted with `convert` when present.
    ///
    /// A missing field is absent. A present value that fails conversion is a
    /// decode error (the optional is structurally fine, its payload is not).
    pub fn field<T>(
        fields: &Map<String, Value>,
        name: &str,
        convert: impl FnOnce(&str, &Value) -> Result<T, BoardError>,
    ) -> Result<Option<T>, BoardError> {
        match fields.get(name).and_then(Self::decode) {
            Some(value) => convert(name, value).map(Some),
            None => Ok(None),
        }
    }
}
