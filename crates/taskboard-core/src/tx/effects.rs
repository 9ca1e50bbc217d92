//! EffectsExtractor - 送信結果から成否と作成 ID を取り出す
//!
//! # 優先順位
//! 1. effects.status が success でなければ `TransactionFailed`（以降は見ない）
//! 2. "created" 系イベント（構造体名が一致）の ID フィールド
//! 3. objectChanges の `created` エントリで、型が期待する構造体名を含むもの
//! 4. どちらからも取れなければ、レジャーが成功と言っても `ObjectNotFound`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::builder::CreationHint;
use crate::codec::raw::struct_name_of;
use crate::domain::{BoardError, ErrorKind};

/// signAndExecute のレスポンス
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub digest: String,
    #[serde(default)]
    pub effects: Option<TransactionEffects>,
    #[serde(default)]
    pub object_changes: Vec<ObjectChange>,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStatus {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: "failure".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Created,
    Mutated,
    Deleted,
    Wrapped,
    Transferred,
    Published,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub object_type: Option<String>,
}

impl ObjectChange {
    pub fn new(kind: ChangeKind, object_id: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            kind,
            object_id: Some(object_id.into()),
            object_type: Some(object_type.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub parsed_json: Value,
}

/// 抽出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub digest: String,
    pub success: bool,
    pub created_id: Option<String>,
    pub error: Option<ErrorKind>,
    /// 失敗時のレジャー側メッセージ
    pub reason: Option<String>,
}

impl Extraction {
    /// 呼び出し側向けに `Result` へ変換
    pub fn into_result(self) -> Result<Option<String>, BoardError> {
        match self.error {
            None => Ok(self.created_id),
            Some(ErrorKind::ObjectNotFound) => Err(BoardError::ObjectNotFound {
                digest: self.digest,
                expected: self.reason.unwrap_or_default(),
            }),
            Some(_) => Err(BoardError::TransactionFailed {
                digest: self.digest,
                reason: self.reason.unwrap_or_else(|| "unknown failure".to_string()),
            }),
        }
    }
}

/// EffectsExtractor はレスポンスを決定的に解釈する（状態を持たない）
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectsExtractor;

impl EffectsExtractor {
    /// `hint` が `None` なら作成物は探さず、成否だけを判定する
    pub fn extract(response: &TransactionResponse, hint: Option<&CreationHint>) -> Extraction {
        let digest = response.digest.clone();

        let status = response.effects.as_ref().map(|e| &e.status);
        if !status.is_some_and(ExecutionStatus::is_success) {
            let reason = match status {
                Some(status) => status
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("status {}", status.status)),
                None => "no effects reported".to_string(),
            };
            return Extraction {
                digest,
                success: false,
                created_id: None,
                error: Some(ErrorKind::TransactionFailed),
                reason: Some(reason),
            };
        }

        let Some(hint) = hint else {
            return Extraction {
                digest,
                success: true,
                created_id: None,
                error: None,
                reason: None,
            };
        };

        let from_event = Self::from_events(response, hint);
        let from_change = Self::from_object_changes(response, hint);

        if let (Some(event_id), Some(change_id)) = (&from_event, &from_change) {
            // タスクのイベントは連番、objectChanges は Field オブジェクト ID を返すので
            // 両方がアドレスのときだけ比較する
            if event_id.starts_with("0x") && event_id != change_id {
                warn!(
                    digest = %digest,
                    event_id = %event_id,
                    change_id = %change_id,
                    "created event and object change disagree; using the event"
                );
            }
        }

        match from_event.or(from_change) {
            Some(id) => Extraction {
                digest,
                success: true,
                created_id: Some(id),
                error: None,
                reason: None,
            },
            None => Extraction {
                digest,
                success: false,
                created_id: None,
                error: Some(ErrorKind::ObjectNotFound),
                reason: Some(hint.object_type.to_string()),
            },
        }
    }

    fn from_events(response: &TransactionResponse, hint: &CreationHint) -> Option<String> {
        response
            .events
            .iter()
            .filter(|event| struct_name_of(&event.event_type) == hint.event)
            .find_map(|event| match event.parsed_json.get(hint.id_field)? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    fn from_object_changes(response: &TransactionResponse, hint: &CreationHint) -> Option<String> {
        response
            .object_changes
            .iter()
            .filter(|change| change.kind == ChangeKind::Created)
            .filter(|change| {
                change
                    .object_type
                    .as_deref()
                    .is_some_and(|t| type_mentions(t, hint.object_type))
            })
            .find_map(|change| change.object_id.clone())
    }
}

/// 型文字列（ジェネリクス込み）のどこかに構造体 `name` が現れるか
///
/// `0x2::dynamic_field::Field<u64, 0xpkg::board::Task>` は `Task` を含む。
/// `0xpkg::board::BoardAdminCap` は `Board` を含まない。
fn type_mentions(type_name: &str, name: &str) -> bool {
    type_name
        .split(['<', '>', ','])
        .map(str::trim)
        .any(|segment| !segment.is_empty() && struct_name_of(segment) == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::OperationKind;
    use serde_json::json;

    fn task_hint() -> CreationHint {
        OperationKind::CreateTask.creation_hint().unwrap()
    }

    fn board_hint() -> CreationHint {
        OperationKind::CreateBoard.creation_hint().unwrap()
    }

    fn response(json: Value) -> TransactionResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_created_event_wins() {
        let resp = response(json!({
            "digest": "0xd1",
            "effects": { "status": { "status": "success" } },
            "events": [
                { "type": "0xpkg::board::TaskCreated", "parsedJson": { "board_id": "0xb", "task_id": "42" } }
            ],
            "objectChanges": [
                { "type": "created", "objectId": "0xfield", "objectType": "0x2::dynamic_field::Field<u64, 0xpkg::board::Task>" }
            ]
        }));

        let extraction = EffectsExtractor::extract(&resp, Some(&task_hint()));
        assert!(extraction.success);
        assert_eq!(extraction.created_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_object_change_is_the_fallback() {
        let resp = response(json!({
            "digest": "0xd2",
            "effects": { "status": { "status": "success" } },
            "objectChanges": [
                { "type": "mutated", "objectId": "0xother", "objectType": "0xpkg::board::Board" },
                { "type": "created", "objectId": "0xcap", "objectType": "0xpkg::board::BoardAdminCap" },
                { "type": "created", "objectId": "0xboard1", "objectType": "0xpkg::board::Board" }
            ]
        }));

        let extraction = EffectsExtractor::extract(&resp, Some(&board_hint()));
        assert_eq!(extraction.created_id.as_deref(), Some("0xboard1"));
        assert_eq!(extraction.clone().into_result().unwrap(), Some("0xboard1".to_string()));
    }

    #[test]
    fn test_success_without_created_object_is_object_not_found() {
        let resp = response(json!({
            "digest": "0xd3",
            "effects": { "status": { "status": "success" } },
            "objectChanges": [ { "type": "published", "packageId": "0x9" } ]
        }));

        let extraction = EffectsExtractor::extract(&resp, Some(&task_hint()));
        assert!(!extraction.success);
        assert_eq!(extraction.error, Some(ErrorKind::ObjectNotFound));
        assert_eq!(extraction.into_result().unwrap_err().kind(), ErrorKind::ObjectNotFound);
    }

    #[test]
    fn test_failed_status_short_circuits() {
        let resp = response(json!({
            "digest": "0xd4",
            "effects": { "status": { "status": "failure", "error": "MoveAbort(3)" } },
            "events": [ { "type": "0xpkg::board::TaskCreated", "parsedJson": { "task_id": "1" } } ]
        }));

        let extraction = EffectsExtractor::extract(&resp, Some(&task_hint()));
        assert_eq!(extraction.error, Some(ErrorKind::TransactionFailed));
        assert_eq!(extraction.created_id, None);
        let err = extraction.into_result().unwrap_err();
        assert!(err.to_string().contains("MoveAbort(3)"));
    }

    #[test]
    fn test_missing_effects_count_as_failure() {
        let resp = response(json!({ "digest": "0xd5" }));
        let extraction = EffectsExtractor::extract(&resp, None);
        assert_eq!(extraction.error, Some(ErrorKind::TransactionFailed));
    }

    #[test]
    fn test_non_creating_operations_only_check_status() {
        let resp = response(json!({
            "digest": "0xd6",
            "effects": { "status": { "status": "success" } }
        }));
        let extraction = EffectsExtractor::extract(&resp, None);
        assert!(extraction.success);
        assert_eq!(extraction.into_result().unwrap(), None);
    }

    #[test]
    fn test_numeric_event_ids_are_stringified() {
        let resp = response(json!({
            "digest": "0xd7",
            "effects": { "status": { "status": "success" } },
            "events": [ { "type": "0xpkg::board::TaskCreated", "parsedJson": { "task_id": 9 } } ]
        }));
        let extraction = EffectsExtractor::extract(&resp, Some(&task_hint()));
        assert_eq!(extraction.created_id.as_deref(), Some("9"));
    }
}
