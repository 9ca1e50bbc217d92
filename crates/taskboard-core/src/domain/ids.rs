//! Domain identifiers (strongly-typed object ids).
//!
//! レジャー上のオブジェクト ID はすべて `0x` 付きの hex 文字列ですが、
//! Board / Task / Cap / Table の ID を取り違えないように Phantom type で型を分けます。
//!
//! ## Phantom Type パターン
//! `Id<T>` が共通実装を持ち、`T` は実行時には使わないマーカー型です。
//! - BoardId と TaskObjectId は混同できない
//! - シリアライズは文字列そのもの（`#[serde(transparent)]`）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// エラーメッセージやログに出す種別名（例: "board"）
    fn kind() -> &'static str;
}

/// ジェネリック ID 型
///
/// 値の検証は `0x` プレフィックスのみ。hex として正しいかはレジャー側の責務です。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// 文字列から Id を作成（小文字に正規化）
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into().to_ascii_lowercase(),
            _marker: PhantomData,
        }
    }

    /// `0x` プレフィックスを要求して Id を作成
    pub fn parse(value: &str) -> Option<Self> {
        is_ledger_address(value).then(|| Self::new(value))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> &'static str {
        T::kind()
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoardKind {}

impl IdMarker for BoardKind {
    fn kind() -> &'static str {
        "board"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {}

impl IdMarker for TaskKind {
    fn kind() -> &'static str {
        "task"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapKind {}

impl IdMarker for CapKind {
    fn kind() -> &'static str {
        "cap"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {}

impl IdMarker for TableKind {
    fn kind() -> &'static str {
        "table"
    }
}

/// Identifier of a Board object.
pub type BoardId = Id<BoardKind>;

/// Identifier of a Task object (or of the dynamic field holding it).
pub type TaskObjectId = Id<TaskKind>;

/// Identifier of a BoardAdminCap / BoardMemberCap object.
pub type CapId = Id<CapKind>;

/// Identifier of a table's inner UID (parent of its dynamic fields).
pub type TableId = Id<TableKind>;

/// An account address (owner, member, assignee, verifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().to_ascii_lowercase())
    }

    pub fn parse(value: &str) -> Option<Self> {
        is_ledger_address(value).then(|| Self::new(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

pub(crate) fn is_ledger_address(value: &str) -> bool {
    value.len() > 2 && (value.starts_with("0x") || value.starts_with("0X"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let board = BoardId::new("0xB0");
        let task = TaskObjectId::new("0xb0");

        assert_eq!(board.as_str(), task.as_str());
        assert_eq!(board.kind(), "board");
        assert_eq!(task.kind(), "task");
        // let _: BoardId = task; // <- does not compile
    }

    #[test]
    fn parse_requires_hex_prefix() {
        assert!(BoardId::parse("0xboard1").is_some());
        assert!(BoardId::parse("board1").is_none());
        assert!(BoardId::parse("0x").is_none());
        assert!(Address::parse("0xABC").is_some_and(|a| a.as_str() == "0xabc"));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = CapId::new("0xcap");
        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, "\"0xcap\"");
        let back: CapId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }
}
