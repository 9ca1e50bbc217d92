//! VariantCodec - tagged variants (task status, member role).
//!
//! Known wire shapes:
//! - `{ "variant": "InProgress", "fields": {} }`
//! - `{ "InProgress": {} }` (keyed by tag)
//! - `"InProgress"`
//! - a numeric discriminant (`1` or `"1"`), as stored by `u8` status fields
//!
//! Unrecognized input decodes to index 0. The contract guarantees well-formed
//! variants, so defaulting is accepted here rather than failing the read.

use serde_json::Value;
use tracing::debug;

/// Which shape produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantShape {
    Enum,
    Keyed,
    Tag,
    Discriminant,
}

/// Decodes a variant against one schema's ordered tag list.
#[derive(Debug, Clone, Copy)]
pub struct VariantCodec {
    tags: &'static [&'static str],
}

impl VariantCodec {
    pub fn new(tags: &'static [&'static str]) -> Self {
        Self { tags }
    }

    pub fn tags(&self) -> &'static [&'static str] {
        self.tags
    }

    /// Zero-based index of the matching tag, 0 when nothing matches.
    pub fn decode(&self, raw: &Value) -> u8 {
        match self.match_shape(raw) {
            Some((_, index)) => index,
            None => {
                debug!(raw = %raw, tags = ?self.tags, "unrecognized variant; defaulting to index 0");
                0
            }
        }
    }

    pub fn match_shape(&self, raw: &Value) -> Option<(VariantShape, u8)> {
        match raw {
            Value::Object(obj) => {
                if let Some(tag) = obj.get("variant").and_then(Value::as_str) {
                    return self.position(tag).map(|i| (VariantShape::Enum, i));
                }
                self.tags
                    .iter()
                    .position(|tag| obj.contains_key(*tag))
                    .map(|i| (VariantShape::Keyed, i as u8))
            }
            Value::String(s) => self
                .position(s)
                .map(|i| (VariantShape::Tag, i))
                .or_else(|| self.discriminant(s.trim().parse().ok()?)),
            Value::Number(n) => self.discriminant(n.as_u64()?),
            _ => None,
        }
    }

    fn position(&self, tag: &str) -> Option<u8> {
        self.tags.iter().position(|t| *t == tag).map(|i| i as u8)
    }

    fn discriminant(&self, n: u64) -> Option<(VariantShape, u8)> {
        let index = usize::try_from(n).ok().filter(|i| *i < self.tags.len())?;
        let index = u8::try_from(index).ok()?;
        Some((VariantShape::Discriminant, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const LEGACY: &[&str] = &["Backlog", "InProgress", "InReview", "Done"];

    fn codec() -> VariantCodec {
        VariantCodec::new(LEGACY)
    }

    #[rstest]
    #[case(json!({ "Backlog": {} }), 0)]
    #[case(json!({ "InProgress": {} }), 1)]
    #[case(json!({ "InReview": true }), 2)]
    #[case(json!({ "Done": null }), 3)]
    fn keyed_tags_map_to_their_index(#[case] raw: Value, #[case] expected: u8) {
        assert_eq!(codec().decode(&raw), expected);
    }

    #[rstest]
    #[case(json!({ "variant": "InReview", "fields": {} }), VariantShape::Enum, 2)]
    #[case(json!("Done"), VariantShape::Tag, 3)]
    #[case(json!(1), VariantShape::Discriminant, 1)]
    #[case(json!("2"), VariantShape::Discriminant, 2)]
    fn other_shapes(#[case] raw: Value, #[case] shape: VariantShape, #[case] index: u8) {
        assert_eq!(codec().match_shape(&raw), Some((shape, index)));
    }

    #[test]
    fn index_zero_only_for_the_first_tag() {
        for (i, tag) in LEGACY.iter().enumerate() {
            let mut keyed = serde_json::Map::new();
            keyed.insert(tag.to_string(), json!({}));
            let decoded = codec().decode(&Value::Object(keyed));
            assert_eq!(decoded == 0, i == 0);
            assert_eq!(decoded as usize, i);
        }
    }

    #[rstest]
    #[case(json!({ "Archived": {} }))]
    #[case(json!({ "variant": "Archived" }))]
    #[case(json!("Archived"))]
    #[case(json!(9))]
    #[case(json!(u64::MAX))]
    #[case(json!((1u64 << 32) + 1))]
    #[case(json!("4294967297"))]
    #[case(json!(null))]
    #[case(json!([1]))]
    fn unknown_input_defaults_to_zero(#[case] raw: Value) {
        assert_eq!(codec().match_shape(&raw), None);
        assert_eq!(codec().decode(&raw), 0);
    }
}
