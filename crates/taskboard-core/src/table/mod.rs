//! Table - enumerable keyed collections.
//!
//! A board's members and tasks are stored either inline (a vector, or a
//! `VecMap` with `contents`) or in a table whose entries are dynamic fields
//! that need extra round trips. `KeyedCollection` hides the difference: callers
//! ask for entries and get the same shape back either way.

pub mod walker;

pub use self::walker::{TableEntry, TableWalker};

use serde_json::Value;

use crate::codec::raw::{struct_fields, u64_of, uid_of};
use crate::domain::{BoardError, CollectionSource, TableId};

/// One entry of a keyed collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    pub key: Value,
    /// `Null` for plain vectors, which carry keys only.
    pub value: Value,
    /// Object holding the entry, for table-backed collections.
    pub object_id: Option<String>,
}

/// A collection field as found on the parent object.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyedCollection {
    /// `vector<K>`
    Inline(Vec<Value>),
    /// `VecMap<K, V>` rendered as `{ "fields": { "contents": [{ "fields": { "key", "value" } }] } }`
    InlineMap(Vec<(Value, Value)>),
    /// `Table<K, V>` handle: `{ "fields": { "id": { "id": "0x.." }, "size": "3" } }`
    Table { id: TableId, size: Option<u64> },
}

impl KeyedCollection {
    /// Recognizes the collection shape of `field`. A missing field is an empty collection.
    pub fn from_field(field: &str, value: Option<&Value>) -> Result<Self, BoardError> {
        let value = match value {
            None | Some(Value::Null) => return Ok(Self::Inline(Vec::new())),
            Some(value) => value,
        };
        if let Value::Array(items) = value {
            return Ok(Self::Inline(items.clone()));
        }

        let inner = struct_fields(value)
            .ok_or_else(|| BoardError::decode(field, format!("not a collection: {value}")))?;

        if let Some(contents) = inner.get("contents").and_then(Value::as_array) {
            let pairs = contents
                .iter()
                .map(|entry| {
                    let entry = struct_fields(entry)
                        .ok_or_else(|| BoardError::decode(field, "map entry is not a struct"))?;
                    let key = entry
                        .get("key")
                        .cloned()
                        .ok_or_else(|| BoardError::decode(field, "map entry without key"))?;
                    Ok((key, entry.get("value").cloned().unwrap_or(Value::Null)))
                })
                .collect::<Result<Vec<_>, BoardError>>()?;
            return Ok(Self::InlineMap(pairs));
        }

        if let Some(id) = inner.get("id").and_then(uid_of) {
            let size = inner.get("size").map(|s| u64_of(field, s)).transpose()?;
            return Ok(Self::Table {
                id: TableId::new(id),
                size,
            });
        }

        Err(BoardError::decode(
            field,
            format!("unrecognized collection shape: {value}"),
        ))
    }

    pub fn source(&self) -> CollectionSource {
        match self {
            Self::Inline(_) | Self::InlineMap(_) => CollectionSource::Inline,
            Self::Table { id, .. } => CollectionSource::Table(id.clone()),
        }
    }

    /// Keys only. Table-backed collections page through the table but do not
    /// fetch child objects.
    pub async fn keys(&self, walker: &TableWalker) -> Result<Vec<Value>, BoardError> {
        match self {
            Self::Inline(items) => Ok(items.clone()),
            Self::InlineMap(pairs) => Ok(pairs.iter().map(|(k, _)| k.clone()).collect()),
            Self::Table { id, .. } => Ok(walker
                .keys(id)
                .await?
                .into_iter()
                .map(|info| info.name.value)
                .collect()),
        }
    }

    /// Keys with values. Table-backed collections resolve every child object.
    pub async fn entries(&self, walker: &TableWalker) -> Result<Vec<CollectionEntry>, BoardError> {
        match self {
            Self::Inline(items) => Ok(items
                .iter()
                .map(|key| CollectionEntry {
                    key: key.clone(),
                    value: Value::Null,
                    object_id: None,
                })
                .collect()),
            Self::InlineMap(pairs) => Ok(pairs
                .iter()
                .map(|(key, value)| CollectionEntry {
                    key: key.clone(),
                    value: value.clone(),
                    object_id: None,
                })
                .collect()),
            Self::Table { id, .. } => Ok(walker
                .walk(id)
                .await?
                .into_iter()
                .map(|entry| CollectionEntry {
                    key: entry.key().clone(),
                    value: entry.value().cloned().unwrap_or(Value::Null),
                    object_id: Some(entry.object.object_id),
                })
                .collect()),
        }
    }
}
