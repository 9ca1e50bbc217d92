//! LedgerReader port - レジャーの読み取り RPC
//!
//! RawObject / Page などの型は JSON-RPC のレスポンス形状（camelCase）に合わせています。
//! transport（HTTP, リトライ, タイムアウト）は実装側の責務です。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::raw::{serde_u64, struct_name_of};
use crate::domain::{Address, TableId};

/// 読み取り・送信 RPC のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// getObject のオプション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectOptions {
    pub show_content: bool,
    pub show_owner: bool,
}

impl ObjectOptions {
    pub fn content() -> Self {
        Self {
            show_content: true,
            show_owner: false,
        }
    }

    pub fn content_and_owner() -> Self {
        Self {
            show_content: true,
            show_owner: true,
        }
    }
}

/// レジャー上のオブジェクト（生の表現）
///
/// `fields` が `None` のときは Move オブジェクトではない（package など）か、
/// content を要求していない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObject {
    pub object_id: String,
    #[serde(with = "serde_u64", default)]
    pub version: u64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
}

impl RawObject {
    /// 型名の最後のセグメント（ジェネリクスを除く）。例: `0x2::board::Board` -> `Board`
    pub fn struct_name(&self) -> Option<&str> {
        self.object_type.as_deref().map(struct_name_of)
    }
}

/// Dynamic field の key（`{type, value}`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicFieldName {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: Value,
}

impl DynamicFieldName {
    pub fn u64(value: u64) -> Self {
        Self {
            type_name: "u64".to_string(),
            value: Value::String(value.to_string()),
        }
    }

    pub fn address(value: &Address) -> Self {
        Self {
            type_name: "address".to_string(),
            value: Value::String(value.to_string()),
        }
    }
}

/// getDynamicFields の 1 エントリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFieldInfo {
    pub name: DynamicFieldName,
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
}

/// ページング結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// LedgerReader はレジャーの読み取り RPC
///
/// # 設計原則
/// - レジャーが source of truth。クライアントはキャッシュしない
/// - 存在しないオブジェクトは `Ok(None)`、通信失敗は `Err`
/// - `Send + Sync` を要求（StateClient から `Arc<dyn LedgerReader>` で共有）
#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn get_object(
        &self,
        id: &str,
        options: ObjectOptions,
    ) -> Result<Option<RawObject>, LedgerError>;

    /// `type_filter` は struct type の完全一致（`<pkg>::board::BoardAdminCap`）
    async fn get_owned_objects(
        &self,
        owner: &Address,
        type_filter: &str,
    ) -> Result<Vec<RawObject>, LedgerError>;

    async fn get_dynamic_fields(
        &self,
        parent: &TableId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<DynamicFieldInfo>, LedgerError>;

    async fn get_dynamic_field_object(
        &self,
        parent: &TableId,
        name: &DynamicFieldName,
    ) -> Result<Option<RawObject>, LedgerError>;
}
