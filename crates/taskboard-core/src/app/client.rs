//! StateClient - 読み取りと書き込みのオーケストレーション
//!
//! # 読み取り
//! レジャーから生オブジェクトを取得 → EntityCodec → 型付きエンティティ。
//! 毎回デコードし直し、キャッシュは持ちません。
//!
//! # 書き込み
//! TransactionBuilder → 署名・送信 → EffectsExtractor →（任意で）読み直し。
//! リトライしない、楽観的なローカル更新もしない。
//!
//! # 並行性
//! 独立した読み取り（ボードのタスク N 件など）はまとめて並行に発行し、
//! 1 件でも失敗すれば全体を失敗にします。

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::stats::BoardStats;
use crate::codec::EntityCodec;
use crate::codec::raw::uid_of;
use crate::domain::{
    Address, Board, BoardError, BoardId, CapId, CollectionSource, Member, SchemaVersion, Task,
    TaskObjectId,
};
use crate::ports::{
    Clock, DynamicFieldName, LedgerReader, ObjectOptions, RawObject, TransactionSubmitter,
};
use crate::table::TableEntry;
use crate::tx::{
    BOARD_MODULE, EffectsExtractor, Operation, OperationKind, TransactionBuilder,
};

type Result<T> = std::result::Result<T, BoardError>;

/// 書き込みの結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub operation: OperationKind,
    pub digest: String,
    /// 作成系の操作で作られたオブジェクト（タスクはボード内の連番）
    pub created_id: Option<String>,
}

/// 書き込み後に読み直したエンティティ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum Refreshed {
    Board(Board),
    Task(Task),
}

/// StateClient はレジャーを正本として扱うクライアント
///
/// 依存（読み取り、署名、時計）は全て StateClientBuilder から明示的に渡されます。
pub struct StateClient {
    reader: Arc<dyn LedgerReader>,
    submitter: Option<Arc<dyn TransactionSubmitter>>,
    codec: EntityCodec,
    builder: TransactionBuilder,
    clock: Arc<dyn Clock>,
}

impl StateClient {
    pub(crate) fn new(
        reader: Arc<dyn LedgerReader>,
        submitter: Option<Arc<dyn TransactionSubmitter>>,
        codec: EntityCodec,
        builder: TransactionBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reader,
            submitter,
            codec,
            builder,
            clock,
        }
    }

    pub fn schema(&self) -> SchemaVersion {
        self.codec.schema()
    }

    pub fn package_id(&self) -> &str {
        self.builder.package_id()
    }

    /// 署名者のアドレス（署名者がいなければ `None`）
    pub fn sender(&self) -> Option<Address> {
        self.submitter.as_ref().and_then(|s| s.sender())
    }

    // ====== 読み取り ======

    #[instrument(skip(self), fields(board = %id))]
    pub async fn read_board(&self, id: &BoardId) -> Result<Board> {
        let raw = self.fetch(id.as_str()).await?;
        self.codec.decode_board(&raw).await
    }

    /// ボードのタスクを作成順で返す
    #[instrument(skip(self), fields(board = %id))]
    pub async fn read_tasks_of_board(&self, id: &BoardId) -> Result<Vec<Task>> {
        let board = self.read_board(id).await?;
        self.tasks_of(&board).await
    }

    /// オーナーを含むメンバー一覧（オーナーは先頭、admin）
    #[instrument(skip(self), fields(board = %id))]
    pub async fn read_members_of_board(&self, id: &BoardId) -> Result<Vec<Member>> {
        Ok(self.read_board(id).await?.members_with_owner())
    }

    /// ボード内の連番でタスクを 1 件読む
    #[instrument(skip(self), fields(board = %board_id))]
    pub async fn read_task(&self, board_id: &BoardId, index: u64) -> Result<Task> {
        let board = self.read_board(board_id).await?;
        match &board.task_source {
            CollectionSource::Table(table) => {
                let name = DynamicFieldName::u64(index);
                let object = self
                    .reader
                    .get_dynamic_field_object(table, &name)
                    .await?
                    .ok_or_else(|| {
                        BoardError::invalid_object(
                            format!("{board_id}#{index}"),
                            "no such task on the board",
                        )
                    })?;
                self.codec
                    .decode_task_entry(Some(&board.id), &TableEntry { name, object })
            }
            CollectionSource::Inline => {
                let id = usize::try_from(index)
                    .ok()
                    .and_then(|i| board.task_ids.get(i))
                    .ok_or_else(|| {
                        BoardError::invalid_object(
                            format!("{board_id}#{index}"),
                            "no such task on the board",
                        )
                    })?;
                self.read_listed_task(&board, id).await
            }
        }
    }

    /// 独立オブジェクトとして保存されたタスク（legacy スキーマ）
    #[instrument(skip(self), fields(task = %id))]
    pub async fn read_task_object(&self, id: &TaskObjectId) -> Result<Task> {
        let raw = self.fetch(id.as_str()).await?;
        self.codec.decode_task_object(&raw)
    }

    /// `owner` が管理者（BoardAdminCap 保有）のボード
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn boards_of(&self, owner: &Address) -> Result<Vec<Board>> {
        let caps = self
            .reader
            .get_owned_objects(owner, &self.type_name("BoardAdminCap"))
            .await?;
        let mut ids: Vec<BoardId> = Vec::new();
        for cap in &caps {
            if let Some(id) = cap_board(cap)
                && !ids.contains(&id)
            {
                ids.push(id);
            }
        }
        debug!(caps = caps.len(), boards = ids.len(), "resolved boards from admin caps");
        try_join_all(ids.iter().map(|id| self.read_board(id))).await
    }

    pub async fn admin_cap_for(&self, owner: &Address, board: &BoardId) -> Result<Option<CapId>> {
        self.find_cap(owner, "BoardAdminCap", board).await
    }

    pub async fn member_cap_for(&self, owner: &Address, board: &BoardId) -> Result<Option<CapId>> {
        self.find_cap(owner, "BoardMemberCap", board).await
    }

    #[instrument(skip(self), fields(board = %id))]
    pub async fn board_stats(&self, id: &BoardId) -> Result<BoardStats> {
        let tasks = self.read_tasks_of_board(id).await?;
        Ok(BoardStats::compute(
            &tasks,
            self.schema(),
            self.clock.now_ms(),
        ))
    }

    // ====== 書き込み ======

    /// 構築 → 署名・送信 → 効果の解釈
    ///
    /// # エラー
    /// - 署名者がいない: `SigningUnavailable`
    /// - effects が success でない: `TransactionFailed`
    /// - 作成系で作成 ID が取れない: `ObjectNotFound`
    #[instrument(skip(self, operation), fields(op = %operation.kind()))]
    pub async fn mutate(&self, operation: Operation) -> Result<MutationOutcome> {
        let submitter = self
            .submitter
            .as_ref()
            .ok_or_else(|| BoardError::SigningUnavailable("no signer configured".to_string()))?;

        let operation = self.resolve_admin_cap(submitter.as_ref(), operation).await?;
        let request = self.builder.build(&operation)?;
        info!(target = %request.call.target(), "submitting transaction");

        let response = submitter.sign_and_execute(&request).await?;
        let extraction = EffectsExtractor::extract(&response, request.creates.as_ref());
        let digest = extraction.digest.clone();
        let created_id = extraction
            .into_result()
            .inspect_err(|err| warn!(digest = %digest, error = %err, "transaction not applied"))?;

        info!(digest = %digest, created = ?created_id, "transaction applied");
        Ok(MutationOutcome {
            operation: request.operation,
            digest,
            created_id,
        })
    }

    /// `mutate` の後、影響を受けたボードまたはタスクを読み直す
    pub async fn mutate_and_refresh(
        &self,
        operation: Operation,
    ) -> Result<(MutationOutcome, Refreshed)> {
        let board = operation.board().cloned();
        let task = operation.task();
        let outcome = self.mutate(operation).await?;

        let refreshed = match (outcome.operation, board, task) {
            (OperationKind::CreateBoard, _, _) => {
                let id = outcome.created_id.as_deref().unwrap_or_default();
                Refreshed::Board(self.read_board(&BoardId::new(id)).await?)
            }
            (OperationKind::CreateTask, Some(board), _) => {
                let created = outcome.created_id.as_deref().unwrap_or_default();
                match created.parse::<u64>() {
                    Ok(index) => Refreshed::Task(self.read_task(&board, index).await?),
                    Err(_) => Refreshed::Task(
                        self.read_task_object(&TaskObjectId::new(created)).await?,
                    ),
                }
            }
            (_, Some(board), Some(index)) => Refreshed::Task(self.read_task(&board, index).await?),
            (_, Some(board), None) => Refreshed::Board(self.read_board(&board).await?),
            (kind, None, _) => {
                return Err(BoardError::InvalidArgument(format!(
                    "{kind} has nothing to refresh"
                )));
            }
        };
        Ok((outcome, refreshed))
    }

    // ====== 内部 ======

    async fn fetch(&self, id: &str) -> Result<RawObject> {
        self.reader
            .get_object(id, ObjectOptions::content_and_owner())
            .await?
            .ok_or_else(|| BoardError::invalid_object(id, "object not found"))
    }

    async fn tasks_of(&self, board: &Board) -> Result<Vec<Task>> {
        match &board.task_source {
            CollectionSource::Inline => {
                try_join_all(board.task_ids.iter().map(|id| self.read_listed_task(board, id)))
                    .await
            }
            CollectionSource::Table(table) => {
                let entries = self.codec.walker().walk(table).await?;
                let mut tasks = entries
                    .iter()
                    .map(|entry| self.codec.decode_task_entry(Some(&board.id), entry))
                    .collect::<Result<Vec<_>>>()?;
                tasks.sort_by_key(|task| task.index.unwrap_or(u64::MAX));
                Ok(tasks)
            }
        }
    }

    /// ボードの task_ids にあるタスクを読み、逆参照が一致するか確かめる
    async fn read_listed_task(&self, board: &Board, id: &str) -> Result<Task> {
        let task = self.read_task_object(&TaskObjectId::new(id)).await?;
        if task.board_id != board.id {
            return Err(BoardError::invalid_object(
                id,
                format!("listed on {} but belongs to {}", board.id, task.board_id),
            ));
        }
        Ok(task)
    }

    async fn find_cap(
        &self,
        owner: &Address,
        struct_name: &str,
        board: &BoardId,
    ) -> Result<Option<CapId>> {
        let caps = self
            .reader
            .get_owned_objects(owner, &self.type_name(struct_name))
            .await?;
        Ok(caps
            .iter()
            .find(|cap| cap_board(cap).as_ref() == Some(board))
            .map(|cap| CapId::new(cap.object_id.as_str())))
    }

    /// admin cap が省略された AddMember に、送信者の cap を補う
    async fn resolve_admin_cap(
        &self,
        submitter: &dyn TransactionSubmitter,
        mut operation: Operation,
    ) -> Result<Operation> {
        if let Operation::AddMember {
            board, admin_cap, ..
        } = &mut operation
            && admin_cap.is_none()
        {
            let sender = submitter.sender().ok_or_else(|| {
                BoardError::SigningUnavailable("signer has no address".to_string())
            })?;
            let cap = self.admin_cap_for(&sender, board).await?.ok_or_else(|| {
                BoardError::InvalidArgument(format!("{sender} holds no BoardAdminCap for {board}"))
            })?;
            debug!(cap = %cap, "resolved admin cap");
            *admin_cap = Some(cap);
        }
        Ok(operation)
    }

    fn type_name(&self, struct_name: &str) -> String {
        format!("{}::{}::{}", self.package_id(), BOARD_MODULE, struct_name)
    }
}

fn cap_board(cap: &RawObject) -> Option<BoardId> {
    cap.fields
        .as_ref()?
        .get("board_id")
        .and_then(uid_of)
        .map(BoardId::new)
}
