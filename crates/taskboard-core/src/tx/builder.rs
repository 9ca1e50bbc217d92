//! TransactionBuilder - 署名前のトランザクションリクエストを組み立てる
//!
//! # 設計原則
//! - 純粋なコンストラクタ（送信も署名もしない、ネットワーク不要）
//! - コントラクトのアドレスは構築時に固定
//! - テキストで受け取ったバイト列引数（description / proof / commit）は UTF-8 でエンコード
//! - 時刻に依存する呼び出し（タスク作成、ステータス更新、アサイン、検証依頼）には Clock を付ける
//!
//! コントラクトのビジネスルール（権限、ステータス遷移）はチェーン側で検証されます。
//! ここで拒否するのは構造的に組み立てられないリクエストだけです。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Address, BoardError, BoardId, CapId};

/// コントラクトのモジュール名
pub const BOARD_MODULE: &str = "board";

/// Clock シングルトンのオブジェクト ID
pub const DEFAULT_CLOCK_OBJECT_ID: &str = "0x6";

/// ユーザーの意図（型付き）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateBoard {
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        verifier: Option<Address>,
    },
    CreateTask {
        board: BoardId,
        title: String,
        description: String,
        category: u8,
        weight_pct: u8,
        #[serde(default)]
        due_ts_ms: Option<u64>,
    },
    AddMember {
        board: BoardId,
        /// `None` の場合、StateClient が送信者の BoardAdminCap を探して補う
        #[serde(default)]
        admin_cap: Option<CapId>,
        member: Address,
        #[serde(default)]
        role: Option<u8>,
    },
    AdvanceStatus {
        board: BoardId,
        /// ボード内のタスク連番
        task: u64,
        status: u8,
    },
    RequestVerification {
        board: BoardId,
        task: u64,
        proof_hash: String,
        commit_hash: String,
    },
    AssignTask {
        board: BoardId,
        task: u64,
        assignee: Address,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateBoard,
    CreateTask,
    AddMember,
    AdvanceStatus,
    RequestVerification,
    AssignTask,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateBoard => "create_board",
            Self::CreateTask => "create_task",
            Self::AddMember => "add_member",
            Self::AdvanceStatus => "advance_status",
            Self::RequestVerification => "request_verification",
            Self::AssignTask => "assign_task",
        }
    }

    /// 新しいオブジェクトを作る操作なら、その見つけ方
    pub fn creation_hint(self) -> Option<CreationHint> {
        match self {
            Self::CreateBoard => Some(CreationHint {
                event: "BoardCreated",
                id_field: "board_id",
                object_type: "Board",
            }),
            Self::CreateTask => Some(CreationHint {
                event: "TaskCreated",
                id_field: "task_id",
                object_type: "Task",
            }),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateBoard { .. } => OperationKind::CreateBoard,
            Self::CreateTask { .. } => OperationKind::CreateTask,
            Self::AddMember { .. } => OperationKind::AddMember,
            Self::AdvanceStatus { .. } => OperationKind::AdvanceStatus,
            Self::RequestVerification { .. } => OperationKind::RequestVerification,
            Self::AssignTask { .. } => OperationKind::AssignTask,
        }
    }

    /// 操作対象のボード（作成前のボードは `None`）
    pub fn board(&self) -> Option<&BoardId> {
        match self {
            Self::CreateBoard { .. } => None,
            Self::CreateTask { board, .. }
            | Self::AddMember { board, .. }
            | Self::AdvanceStatus { board, .. }
            | Self::RequestVerification { board, .. }
            | Self::AssignTask { board, .. } => Some(board),
        }
    }

    /// 操作対象のタスク連番
    pub fn task(&self) -> Option<u64> {
        match self {
            Self::AdvanceStatus { task, .. }
            | Self::RequestVerification { task, .. }
            | Self::AssignTask { task, .. } => Some(*task),
            _ => None,
        }
    }
}

/// 作成されたオブジェクトを効果から探すための手がかり
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreationHint {
    /// "created" 系イベントの構造体名（例: `TaskCreated`）
    pub event: &'static str,
    /// イベントの parsedJson 内で ID を持つフィールド
    pub id_field: &'static str,
    /// objectChanges の型に含まれるはずの構造体名
    pub object_type: &'static str,
}

/// Pure 引数（レジャーが期待するプリミティブ型）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PureArg {
    String(String),
    Address(Address),
    U8(u8),
    U64(u64),
    Bytes(Vec<u8>),
    Option(Option<Box<PureArg>>),
}

impl PureArg {
    pub fn bytes_of_text(text: &str) -> Self {
        Self::Bytes(text.as_bytes().to_vec())
    }

    pub fn some(inner: PureArg) -> Self {
        Self::Option(Some(Box::new(inner)))
    }

    pub fn none() -> Self {
        Self::Option(None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallArg {
    /// 共有 / 所有オブジェクトへの参照
    Object(String),
    Pure(PureArg),
}

/// `package::module::function(arguments)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    pub package: String,
    pub module: String,
    pub function: String,
    pub arguments: Vec<CallArg>,
}

impl MoveCall {
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }
}

/// 署名前のリクエスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub operation: OperationKind,
    pub call: MoveCall,
    /// 作成系の操作なら、作成された ID を探す手がかり
    pub creates: Option<CreationHint>,
    /// 成功後に読み直す対象
    pub board: Option<BoardId>,
    pub task: Option<u64>,
}

/// TransactionBuilder は Operation を MoveCall に変換する
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBuilder {
    package_id: String,
    clock_object_id: String,
}

impl TransactionBuilder {
    pub fn new(package_id: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            clock_object_id: DEFAULT_CLOCK_OBJECT_ID.to_string(),
        }
    }

    pub fn with_clock(mut self, clock_object_id: impl Into<String>) -> Self {
        self.clock_object_id = clock_object_id.into();
        self
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Operation から TransactionRequest を組み立てる
    ///
    /// # エラー
    /// - 空のボード名 / タスクタイトル
    /// - `AddMember` で admin cap が未解決
    pub fn build(&self, operation: &Operation) -> Result<TransactionRequest, BoardError> {
        let (function, arguments) = match operation {
            Operation::CreateBoard {
                name,
                description,
                verifier,
            } => {
                non_empty("name", name)?;
                if description.is_none() && verifier.is_none() {
                    ("mint_board", vec![pure(PureArg::String(name.clone()))])
                } else {
                    (
                        "mint_board_with_metadata",
                        vec![
                            pure(PureArg::String(name.clone())),
                            pure(optional(description.clone().map(PureArg::String))),
                            pure(optional(verifier.clone().map(PureArg::Address))),
                        ],
                    )
                }
            }
            Operation::CreateTask {
                board,
                title,
                description,
                category,
                weight_pct,
                due_ts_ms,
            } => {
                non_empty("title", title)?;
                (
                    "create_task",
                    vec![
                        object(board.as_str()),
                        pure(PureArg::String(title.clone())),
                        pure(PureArg::bytes_of_text(description)),
                        pure(PureArg::U8(*category)),
                        pure(PureArg::U8(*weight_pct)),
                        // 0 は「期限なし」
                        pure(PureArg::U64(due_ts_ms.unwrap_or(0))),
                        self.clock(),
                    ],
                )
            }
            Operation::AddMember {
                board,
                admin_cap,
                member,
                role,
            } => {
                let cap = admin_cap.as_ref().ok_or_else(|| {
                    BoardError::InvalidArgument(format!(
                        "add_member on {board} needs a BoardAdminCap"
                    ))
                })?;
                let mut arguments = vec![
                    object(cap.as_str()),
                    object(board.as_str()),
                    pure(PureArg::Address(member.clone())),
                ];
                if let Some(role) = role {
                    arguments.push(pure(PureArg::U8(*role)));
                }
                ("add_member", arguments)
            }
            Operation::AdvanceStatus {
                board,
                task,
                status,
            } => (
                "update_task_status",
                vec![
                    object(board.as_str()),
                    pure(PureArg::U64(*task)),
                    pure(PureArg::U8(*status)),
                    self.clock(),
                ],
            ),
            Operation::RequestVerification {
                board,
                task,
                proof_hash,
                commit_hash,
            } => (
                "request_check",
                vec![
                    object(board.as_str()),
                    pure(PureArg::U64(*task)),
                    pure(PureArg::bytes_of_text(proof_hash)),
                    pure(PureArg::bytes_of_text(commit_hash)),
                    self.clock(),
                ],
            ),
            Operation::AssignTask {
                board,
                task,
                assignee,
            } => (
                "assign_task",
                vec![
                    object(board.as_str()),
                    pure(PureArg::U64(*task)),
                    pure(PureArg::Address(assignee.clone())),
                    self.clock(),
                ],
            ),
        };

        let kind = operation.kind();
        Ok(TransactionRequest {
            operation: kind,
            call: MoveCall {
                package: self.package_id.clone(),
                module: BOARD_MODULE.to_string(),
                function: function.to_string(),
                arguments,
            },
            creates: kind.creation_hint(),
            board: operation.board().cloned(),
            task: operation.task(),
        })
    }

    fn clock(&self) -> CallArg {
        object(&self.clock_object_id)
    }
}

fn object(id: &str) -> CallArg {
    CallArg::Object(id.to_string())
}

fn pure(arg: PureArg) -> CallArg {
    CallArg::Pure(arg)
}

fn optional(value: Option<PureArg>) -> PureArg {
    value.map_or_else(PureArg::none, PureArg::some)
}

fn non_empty(field: &str, value: &str) -> Result<(), BoardError> {
    if value.trim().is_empty() {
        return Err(BoardError::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(())
}
