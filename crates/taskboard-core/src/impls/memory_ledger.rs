//! InMemoryLedger - 開発用・テスト用のレジャー
//!
//! # 学習ポイント
//! - 1 つの構造体で読み取り port と送信 port の両方を実装
//! - オブジェクトは RPC が返すのと同じワイヤ形状（verified スキーマ）で保存
//! - 動的フィールドのページング、イベント、objectChanges、バージョン更新を再現
//!
//! # 実装詳細
//! - 状態は `Arc<tokio::sync::Mutex<_>>` で共有（`as_sender` のクローンも同じ台帳を見る）
//! - 引数の型が合わない呼び出しは実行前に `LedgerError::Rejected`
//! - コントラクトのルール違反は abort として failure の effects を返し、状態は変えない
//! - テーブルのキーは文字列順（u64 キーでも "10" < "2"）で返す

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{Address, SchemaVersion, TableId, TaskStatus};
use crate::ports::{
    Clock, DynamicFieldInfo, DynamicFieldName, LedgerError, LedgerReader, ObjectOptions, Page,
    RawObject, SystemClock, TransactionSubmitter,
};
use crate::tx::{
    BOARD_MODULE, CallArg, ChangeKind, ExecutionStatus, LedgerEvent, ObjectChange, PureArg,
    TransactionEffects, TransactionRequest, TransactionResponse,
};

/// 1 ページあたりの既定件数
pub const DEFAULT_PAGE_SIZE: usize = 50;

const ROLE_COUNT: u8 = 3;
const DEFAULT_ROLE: u8 = 1;
const AWAITING_CHECK: u8 = 2;

/// 子オブジェクトを持つテーブル
#[derive(Debug, Default)]
struct Table {
    key_type: String,
    /// key -> 子オブジェクト ID
    entries: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct LedgerState {
    objects: HashMap<String, RawObject>,
    tables: HashMap<String, Table>,
    next_object: u64,
    next_digest: u64,
    offline: bool,
}

impl LedgerState {
    fn new_id(&mut self) -> String {
        self.next_object += 1;
        format!("0x{:064x}", self.next_object)
    }

    fn new_digest(&mut self) -> String {
        self.next_digest += 1;
        format!("0x{:016x}", self.next_digest)
    }

    fn fields(&self, id: &str) -> Option<&Map<String, Value>> {
        self.objects.get(id)?.fields.as_ref()
    }

    fn fields_mut(&mut self, id: &str) -> Option<&mut Map<String, Value>> {
        self.objects.get_mut(id)?.fields.as_mut()
    }

    fn bump(&mut self, id: &str) {
        if let Some(object) = self.objects.get_mut(id) {
            object.version += 1;
        }
    }
}

/// InMemoryLedger は board コントラクトの観測可能な振る舞いを再現する
///
/// # 使用例
/// ```ignore
/// let ledger = InMemoryLedger::new("0xpkg");
/// let alice = ledger.as_sender(Address::new("0xa11ce"));
/// alice.sign_and_execute(&request).await?;
/// ```
#[derive(Clone)]
pub struct InMemoryLedger {
    package_id: String,
    state: Arc<Mutex<LedgerState>>,
    clock: Arc<dyn Clock>,
    sender: Option<Address>,
    page_size: usize,
}

impl InMemoryLedger {
    pub fn new(package_id: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            state: Arc::new(Mutex::new(LedgerState::default())),
            clock: Arc::new(SystemClock),
            sender: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// 同じ台帳を `sender` として操作するハンドル
    pub fn as_sender(&self, sender: Address) -> Self {
        Self {
            sender: Some(sender),
            ..self.clone()
        }
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// true の間、全ての読み取りと送信が `Transport` エラーになる
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// オブジェクトを消す（テーブルのキーは残るので、走査は子取得で失敗する）
    pub async fn forget_object(&self, id: &str) -> bool {
        self.state.lock().await.objects.remove(id).is_some()
    }

    /// 任意のオブジェクトを置く（legacy スキーマのフィクスチャなど）
    pub async fn insert_object(&self, object: RawObject) {
        self.state
            .lock()
            .await
            .objects
            .insert(object.object_id.clone(), object);
    }

    fn type_name(&self, name: &str) -> String {
        format!("{}::{}::{}", self.package_id, BOARD_MODULE, name)
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    async fn get_object(
        &self,
        id: &str,
        options: ObjectOptions,
    ) -> Result<Option<RawObject>, LedgerError> {
        let state = self.state.lock().await;
        ensure_online(&state)?;
        Ok(state.objects.get(id).cloned().map(|mut object| {
            if !options.show_content {
                object.fields = None;
            }
            if !options.show_owner {
                object.owner = None;
            }
            object
        }))
    }

    async fn get_owned_objects(
        &self,
        owner: &Address,
        type_filter: &str,
    ) -> Result<Vec<RawObject>, LedgerError> {
        let state = self.state.lock().await;
        ensure_online(&state)?;
        let mut owned: Vec<RawObject> = state
            .objects
            .values()
            .filter(|object| object.object_type.as_deref() == Some(type_filter))
            .filter(|object| owner_address(object) == Some(owner.as_str()))
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        Ok(owned)
    }

    async fn get_dynamic_fields(
        &self,
        parent: &TableId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<DynamicFieldInfo>, LedgerError> {
        let state = self.state.lock().await;
        ensure_online(&state)?;
        let Some(table) = state.tables.get(parent.as_str()) else {
            return Ok(Page {
                data: Vec::new(),
                next_cursor: None,
                has_next_page: false,
            });
        };

        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| LedgerError::Rejected(format!("invalid cursor `{c}`")))?,
            None => 0,
        };
        let size = limit.unwrap_or(self.page_size).clamp(1, self.page_size);
        let end = start.saturating_add(size).min(table.entries.len());

        let data = table
            .entries
            .iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .map(|(key, child)| DynamicFieldInfo {
                name: DynamicFieldName {
                    type_name: table.key_type.clone(),
                    value: Value::String(key.clone()),
                },
                object_id: child.clone(),
                object_type: state.objects.get(child).and_then(|o| o.object_type.clone()),
            })
            .collect();
        let has_next_page = end < table.entries.len();

        Ok(Page {
            data,
            next_cursor: has_next_page.then(|| end.to_string()),
            has_next_page,
        })
    }

    async fn get_dynamic_field_object(
        &self,
        parent: &TableId,
        name: &DynamicFieldName,
    ) -> Result<Option<RawObject>, LedgerError> {
        let state = self.state.lock().await;
        ensure_online(&state)?;
        let key = match &name.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(state
            .tables
            .get(parent.as_str())
            .and_then(|table| table.entries.get(&key))
            .and_then(|child| state.objects.get(child))
            .cloned())
    }
}

#[async_trait]
impl TransactionSubmitter for InMemoryLedger {
    fn sender(&self) -> Option<Address> {
        self.sender.clone()
    }

    async fn sign_and_execute(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionResponse, LedgerError> {
        let sender = self
            .sender
            .clone()
            .ok_or_else(|| LedgerError::Signing("no account selected".to_string()))?;
        let call = &request.call;
        if call.package != self.package_id || call.module != BOARD_MODULE {
            return Err(LedgerError::Rejected(format!(
                "unknown call target {}",
                call.target()
            )));
        }

        let mut state = self.state.lock().await;
        ensure_online(&state)?;

        let mut exec = Execution {
            ledger: self,
            state: &mut state,
            sender,
            now_ms: self.clock.now_ms(),
            changes: Vec::new(),
            events: Vec::new(),
        };
        let args = Args(&call.arguments);
        let outcome = match call.function.as_str() {
            "mint_board" => {
                args.expect_len(1)?;
                exec.mint_board(args.string(0)?, None, None)
            }
            "mint_board_with_metadata" => {
                args.expect_len(3)?;
                exec.mint_board(args.string(0)?, args.opt_string(1)?, args.opt_address(2)?)
            }
            "create_task" => {
                args.expect_len(7)?;
                exec.create_task(
                    args.object(0)?,
                    args.string(1)?,
                    args.bytes(2)?,
                    args.u8(3)?,
                    args.u8(4)?,
                    args.u64(5)?,
                )
            }
            "add_member" => {
                let role = match args.0.len() {
                    3 => None,
                    4 => Some(args.u8(3)?),
                    n => return Err(arity(4, n)),
                };
                exec.add_member(args.object(0)?, args.object(1)?, args.address(2)?, role)
            }
            "update_task_status" => {
                args.expect_len(4)?;
                exec.update_task_status(args.object(0)?, args.u64(1)?, args.u8(2)?)
            }
            "request_check" => {
                args.expect_len(5)?;
                exec.request_check(args.object(0)?, args.u64(1)?, args.bytes(2)?, args.bytes(3)?)
            }
            "assign_task" => {
                args.expect_len(4)?;
                exec.assign_task(args.object(0)?, args.u64(1)?, args.address(2)?)
            }
            other => {
                return Err(LedgerError::Rejected(format!(
                    "function {other} not found in module {BOARD_MODULE}"
                )));
            }
        };

        let changes = std::mem::take(&mut exec.changes);
        let events = std::mem::take(&mut exec.events);
        let digest = state.new_digest();
        let response = match outcome {
            Ok(()) => {
                info!(digest = %digest, function = %call.function, "executed");
                TransactionResponse {
                    digest,
                    effects: Some(TransactionEffects {
                        status: ExecutionStatus::success(),
                    }),
                    object_changes: changes,
                    events,
                }
            }
            Err(abort) => {
                debug!(digest = %digest, function = %call.function, abort = %abort, "aborted");
                TransactionResponse {
                    digest,
                    effects: Some(TransactionEffects {
                        status: ExecutionStatus::failure(format!(
                            "MoveAbort in {}::{}: {abort}",
                            BOARD_MODULE, call.function
                        )),
                    }),
                    object_changes: Vec::new(),
                    events: Vec::new(),
                }
            }
        };
        Ok(response)
    }
}

fn ensure_online(state: &LedgerState) -> Result<(), LedgerError> {
    if state.offline {
        return Err(LedgerError::Transport("ledger unreachable".to_string()));
    }
    Ok(())
}

fn owner_address(object: &RawObject) -> Option<&str> {
    object.owner.as_ref()?.get("AddressOwner")?.as_str()
}

fn arity(expected: usize, got: usize) -> LedgerError {
    LedgerError::Rejected(format!("expected {expected} arguments, got {got}"))
}

fn bag(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn u64_field(fields: &Map<String, Value>, name: &str) -> u64 {
    match fields.get(name) {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn table_id(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)?
        .get("fields")?
        .get("id")?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

/// 呼び出し引数の型チェック付きアクセス
struct Args<'a>(&'a [CallArg]);

impl Args<'_> {
    fn expect_len(&self, n: usize) -> Result<(), LedgerError> {
        if self.0.len() != n {
            return Err(arity(n, self.0.len()));
        }
        Ok(())
    }

    fn pure(&self, i: usize) -> Result<&PureArg, LedgerError> {
        match self.0.get(i) {
            Some(CallArg::Pure(arg)) => Ok(arg),
            other => Err(mismatch(i, "pure value", other)),
        }
    }

    fn object(&self, i: usize) -> Result<String, LedgerError> {
        match self.0.get(i) {
            Some(CallArg::Object(id)) => Ok(id.clone()),
            other => Err(mismatch(i, "object", other)),
        }
    }

    fn string(&self, i: usize) -> Result<String, LedgerError> {
        match self.pure(i)? {
            PureArg::String(s) => Ok(s.clone()),
            other => Err(mismatch(i, "string", other)),
        }
    }

    fn u8(&self, i: usize) -> Result<u8, LedgerError> {
        match self.pure(i)? {
            PureArg::U8(n) => Ok(*n),
            other => Err(mismatch(i, "u8", other)),
        }
    }

    fn u64(&self, i: usize) -> Result<u64, LedgerError> {
        match self.pure(i)? {
            PureArg::U64(n) => Ok(*n),
            other => Err(mismatch(i, "u64", other)),
        }
    }

    fn address(&self, i: usize) -> Result<Address, LedgerError> {
        match self.pure(i)? {
            PureArg::Address(a) => Ok(a.clone()),
            other => Err(mismatch(i, "address", other)),
        }
    }

    fn bytes(&self, i: usize) -> Result<Vec<u8>, LedgerError> {
        match self.pure(i)? {
            PureArg::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch(i, "vector<u8>", other)),
        }
    }

    fn opt_string(&self, i: usize) -> Result<Option<String>, LedgerError> {
        match self.pure(i)? {
            PureArg::Option(None) => Ok(None),
            PureArg::Option(Some(inner)) => match inner.as_ref() {
                PureArg::String(s) => Ok(Some(s.clone())),
                other => Err(mismatch(i, "option<string>", other)),
            },
            other => Err(mismatch(i, "option<string>", other)),
        }
    }

    fn opt_address(&self, i: usize) -> Result<Option<Address>, LedgerError> {
        match self.pure(i)? {
            PureArg::Option(None) => Ok(None),
            PureArg::Option(Some(inner)) => match inner.as_ref() {
                PureArg::Address(a) => Ok(Some(a.clone())),
                other => Err(mismatch(i, "option<address>", other)),
            },
            other => Err(mismatch(i, "option<address>", other)),
        }
    }
}

fn mismatch(i: usize, expected: &str, got: impl std::fmt::Debug) -> LedgerError {
    LedgerError::Rejected(format!("argument {i}: expected {expected}, got {got:?}"))
}

type Abort = String;

/// 1 トランザクション分の実行コンテキスト
///
/// 各関数は検証を全て終えてから状態を書き換える（abort 時は何も変わらない）。
struct Execution<'a> {
    ledger: &'a InMemoryLedger,
    state: &'a mut LedgerState,
    sender: Address,
    now_ms: u64,
    changes: Vec<ObjectChange>,
    events: Vec<LedgerEvent>,
}

impl Execution<'_> {
    fn emit(&mut self, name: &str, parsed_json: Value) {
        self.events.push(LedgerEvent {
            event_type: self.ledger.type_name(name),
            parsed_json,
        });
    }

    fn changed(&mut self, kind: ChangeKind, id: &str) {
        let object_type = self
            .state
            .objects
            .get(id)
            .and_then(|o| o.object_type.clone())
            .unwrap_or_default();
        self.changes.push(ObjectChange::new(kind, id, object_type));
    }

    fn board_fields(&self, board: &str) -> Result<&Map<String, Value>, Abort> {
        let object = self
            .state
            .objects
            .get(board)
            .ok_or_else(|| format!("EBoardNotFound: {board}"))?;
        if object.object_type.as_deref() != Some(self.ledger.type_name("Board").as_str()) {
            return Err(format!("EBoardNotFound: {board} is not a Board"));
        }
        object
            .fields
            .as_ref()
            .ok_or_else(|| format!("EBoardNotFound: {board}"))
    }

    fn role_of(&self, board: &str, who: &Address) -> Result<Option<u8>, Abort> {
        let fields = self.board_fields(board)?;
        if fields.get("owner").and_then(Value::as_str) == Some(who.as_str()) {
            return Ok(Some(ROLE_COUNT - 1));
        }
        let members = table_id(fields, "members").unwrap_or_default();
        let role = self
            .state
            .tables
            .get(&members)
            .and_then(|t| t.entries.get(who.as_str()))
            .and_then(|child| self.state.fields(child))
            .and_then(|f| f.get("value"))
            .and_then(Value::as_u64);
        let role = match role {
            Some(r) => Some(u8::try_from(r).map_err(|_| format!("EInvalidRole: {r}"))?),
            None => None,
        };
        Ok(role.filter(|r| *r > 0))
    }

    fn require_member(&self, board: &str) -> Result<(), Abort> {
        match self.role_of(board, &self.sender)? {
            Some(_) => Ok(()),
            None => Err(format!("ENotMember: {}", self.sender)),
        }
    }

    /// (タスクテーブル ID, タスクの Field オブジェクト ID)
    fn task_slot(&self, board: &str, task: u64) -> Result<(String, String), Abort> {
        let fields = self.board_fields(board)?;
        let tasks = table_id(fields, "tasks").ok_or_else(|| "EBoardNotFound: no task table".to_string())?;
        let child = self
            .state
            .tables
            .get(&tasks)
            .and_then(|t| t.entries.get(&task.to_string()))
            .cloned()
            .ok_or_else(|| format!("ETaskNotFound: {task}"))?;
        Ok((tasks, child))
    }

    fn task_fields(&self, child: &str) -> Result<&Map<String, Value>, Abort> {
        self.state
            .fields(child)
            .and_then(|f| f.get("value")?.get("fields")?.as_object())
            .ok_or_else(|| format!("ETaskNotFound: {child}"))
    }

    fn update_task(&mut self, child: &str, update: impl FnOnce(&mut Map<String, Value>)) {
        let now = self.now_ms;
        if let Some(task) = self
            .state
            .fields_mut(child)
            .and_then(|f| f.get_mut("value")?.get_mut("fields")?.as_object_mut())
        {
            update(task);
            task.insert("updated_at_ms".to_string(), json!(now.to_string()));
        }
        self.state.bump(child);
        self.changed(ChangeKind::Mutated, child);
    }

    fn insert_child(
        &mut self,
        table: &str,
        key: String,
        object_type: String,
        value: Value,
    ) -> String {
        let id = self.state.new_id();
        self.state.objects.insert(
            id.clone(),
            RawObject {
                object_id: id.clone(),
                version: 1,
                object_type: Some(object_type),
                owner: Some(json!({ "ObjectOwner": table })),
                fields: bag(json!({ "id": { "id": id }, "name": key, "value": value })),
            },
        );
        if let Some(t) = self.state.tables.get_mut(table) {
            t.entries.insert(key, id.clone());
        }
        self.changed(ChangeKind::Created, &id);
        id
    }

    fn grow_table(&mut self, board: &str, field: &str) {
        if let Some(handle) = self
            .state
            .fields_mut(board)
            .and_then(|f| f.get_mut(field)?.get_mut("fields")?.as_object_mut())
        {
            let size = u64_field(handle, "size") + 1;
            handle.insert("size".to_string(), json!(size.to_string()));
        }
    }

    fn touch_board(&mut self, board: &str) {
        self.state.bump(board);
        self.changed(ChangeKind::Mutated, board);
    }

    fn mint_board(
        &mut self,
        name: String,
        description: Option<String>,
        verifier: Option<Address>,
    ) -> Result<(), Abort> {
        if name.trim().is_empty() {
            return Err("EEmptyName".to_string());
        }
        let board = self.state.new_id();
        let members = self.state.new_id();
        let tasks = self.state.new_id();
        let cap = self.state.new_id();
        let pkg = self.ledger.package_id.clone();

        self.state.tables.insert(
            members.clone(),
            Table {
                key_type: "address".to_string(),
                entries: BTreeMap::new(),
            },
        );
        self.state.tables.insert(
            tasks.clone(),
            Table {
                key_type: "u64".to_string(),
                entries: BTreeMap::new(),
            },
        );

        self.state.objects.insert(
            cap.clone(),
            RawObject {
                object_id: cap.clone(),
                version: 1,
                object_type: Some(self.ledger.type_name("BoardAdminCap")),
                owner: Some(json!({ "AddressOwner": self.sender })),
                fields: bag(json!({ "id": { "id": cap }, "board_id": board })),
            },
        );
        self.changed(ChangeKind::Created, &cap);

        self.state.objects.insert(
            board.clone(),
            RawObject {
                object_id: board.clone(),
                version: 1,
                object_type: Some(self.ledger.type_name("Board")),
                owner: Some(json!({ "Shared": { "initial_shared_version": 1 } })),
                fields: bag(json!({
                    "id": { "id": board },
                    "name": name,
                    "description": description,
                    "owner": self.sender,
                    "verifier": { "vec": verifier.iter().collect::<Vec<_>>() },
                    "members": {
                        "type": "0x2::table::Table<address, u8>",
                        "fields": { "id": { "id": members }, "size": "0" }
                    },
                    "tasks": {
                        "type": format!("0x2::table::Table<u64, {pkg}::{BOARD_MODULE}::Task>"),
                        "fields": { "id": { "id": tasks }, "size": "0" }
                    },
                    "next_task_id": "0"
                })),
            },
        );
        self.changed(ChangeKind::Created, &board);

        self.emit(
            "BoardCreated",
            json!({ "board_id": board, "owner": self.sender, "name": name }),
        );
        Ok(())
    }

    fn create_task(
        &mut self,
        board: String,
        title: String,
        description: Vec<u8>,
        category: u8,
        weight_pct: u8,
        due_ts_ms: u64,
    ) -> Result<(), Abort> {
        self.require_member(&board)?;
        if title.trim().is_empty() {
            return Err("EEmptyTitle".to_string());
        }
        if weight_pct > 100 {
            return Err(format!("EInvalidWeight: {weight_pct}"));
        }
        let fields = self.board_fields(&board)?;
        let seq = u64_field(fields, "next_task_id");
        let tasks = table_id(fields, "tasks").ok_or_else(|| "EBoardNotFound: no task table".to_string())?;
        let pkg = self.ledger.package_id.clone();
        let now = self.now_ms.to_string();

        let value = json!({
            "type": self.ledger.type_name("Task"),
            "fields": {
                "board_id": board,
                "title": title,
                "description_cipher": description,
                "category": category,
                "weight_pct": weight_pct,
                "due_ts_ms": due_ts_ms.to_string(),
                "status": 0,
                "assignees": [],
                "parent_id": { "vec": [] },
                "proof_hash": [],
                "commit_hash": [],
                "creator": self.sender,
                "created_at_ms": now,
                "updated_at_ms": now
            }
        });
        self.insert_child(
            &tasks,
            seq.to_string(),
            format!("0x2::dynamic_field::Field<u64, {pkg}::{BOARD_MODULE}::Task>"),
            value,
        );

        if let Some(f) = self.state.fields_mut(&board) {
            f.insert("next_task_id".to_string(), json!((seq + 1).to_string()));
        }
        self.grow_table(&board, "tasks");
        self.touch_board(&board);
        self.emit(
            "TaskCreated",
            json!({ "board_id": board, "task_id": seq.to_string() }),
        );
        Ok(())
    }

    fn add_member(
        &mut self,
        cap: String,
        board: String,
        member: Address,
        role: Option<u8>,
    ) -> Result<(), Abort> {
        let cap_object = self
            .state
            .objects
            .get(&cap)
            .ok_or_else(|| format!("ENotAdmin: cap {cap} not found"))?;
        let cap_ok = cap_object.object_type.as_deref()
            == Some(self.ledger.type_name("BoardAdminCap").as_str())
            && owner_address(cap_object) == Some(self.sender.as_str())
            && cap_object
                .fields
                .as_ref()
                .and_then(|f| f.get("board_id"))
                .and_then(Value::as_str)
                == Some(board.as_str());
        if !cap_ok {
            return Err(format!("ENotAdmin: {cap} does not administer {board}"));
        }
        let role = role.unwrap_or(DEFAULT_ROLE);
        if role >= ROLE_COUNT {
            return Err(format!("EInvalidRole: {role}"));
        }

        let fields = self.board_fields(&board)?;
        let members = table_id(fields, "members").ok_or_else(|| "EBoardNotFound: no member table".to_string())?;
        let existing = self
            .state
            .tables
            .get(&members)
            .and_then(|t| t.entries.get(member.as_str()))
            .cloned();

        match existing {
            Some(child) => {
                if let Some(f) = self.state.fields_mut(&child) {
                    f.insert("value".to_string(), json!(role));
                }
                self.state.bump(&child);
                self.changed(ChangeKind::Mutated, &child);
            }
            None => {
                self.insert_child(
                    &members,
                    member.to_string(),
                    "0x2::dynamic_field::Field<address, u8>".to_string(),
                    json!(role),
                );
                self.grow_table(&board, "members");

                let member_cap = self.state.new_id();
                self.state.objects.insert(
                    member_cap.clone(),
                    RawObject {
                        object_id: member_cap.clone(),
                        version: 1,
                        object_type: Some(self.ledger.type_name("BoardMemberCap")),
                        owner: Some(json!({ "AddressOwner": member })),
                        fields: bag(json!({ "id": { "id": member_cap }, "board_id": board })),
                    },
                );
                self.changed(ChangeKind::Created, &member_cap);
            }
        }

        self.touch_board(&board);
        self.emit(
            "MemberAdded",
            json!({ "board_id": board, "member": member, "role": role }),
        );
        Ok(())
    }

    fn update_task_status(&mut self, board: String, task: u64, status: u8) -> Result<(), Abort> {
        self.require_member(&board)?;
        let (_, child) = self.task_slot(&board, task)?;
        let current = self
            .task_fields(&child)?
            .get("status")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u8;

        let schema = SchemaVersion::Verified;
        if !TaskStatus::new(current, schema).can_advance_to(status) {
            return Err(format!("EInvalidTransition: {current} -> {status}"));
        }
        if status == schema.completed_status() {
            let verifier = self
                .board_fields(&board)?
                .get("verifier")
                .and_then(|v| v.get("vec"))
                .and_then(|v| v.get(0))
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(verifier) = verifier
                && verifier != self.sender.as_str()
            {
                return Err(format!("ENotVerifier: {}", self.sender));
            }
        }

        self.update_task(&child, |t| {
            t.insert("status".to_string(), json!(status));
        });
        self.emit(
            "TaskStatusUpdated",
            json!({ "board_id": board, "task_id": task.to_string(), "status": status }),
        );
        Ok(())
    }

    fn request_check(
        &mut self,
        board: String,
        task: u64,
        proof_hash: Vec<u8>,
        commit_hash: Vec<u8>,
    ) -> Result<(), Abort> {
        self.require_member(&board)?;
        let (_, child) = self.task_slot(&board, task)?;
        let current = self
            .task_fields(&child)?
            .get("status")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u8;
        if current >= AWAITING_CHECK {
            return Err(format!("EInvalidTransition: {current} -> {AWAITING_CHECK}"));
        }

        self.update_task(&child, |t| {
            t.insert("proof_hash".to_string(), json!(proof_hash));
            t.insert("commit_hash".to_string(), json!(commit_hash));
            t.insert("status".to_string(), json!(AWAITING_CHECK));
        });
        self.emit(
            "CheckRequested",
            json!({ "board_id": board, "task_id": task.to_string() }),
        );
        Ok(())
    }

    fn assign_task(&mut self, board: String, task: u64, assignee: Address) -> Result<(), Abort> {
        self.require_member(&board)?;
        if self.role_of(&board, &assignee)?.is_none() {
            return Err(format!("EAssigneeNotMember: {assignee}"));
        }
        let (_, child) = self.task_slot(&board, task)?;
        let already = self
            .task_fields(&child)?
            .get("assignees")
            .and_then(Value::as_array)
            .is_some_and(|list| list.iter().any(|a| a.as_str() == Some(assignee.as_str())));

        if !already {
            self.update_task(&child, |t| {
                if let Some(list) = t.get_mut("assignees").and_then(Value::as_array_mut) {
                    list.push(json!(assignee));
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoardId, CapId};
    use crate::ports::FixedClock;
    use crate::tx::{EffectsExtractor, Operation, TransactionBuilder};

    const PKG: &str = "0xpkg";

    fn owner() -> Address {
        Address::new("0xowner")
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(PKG)
            .with_clock(Arc::new(FixedClock::from_millis(1_000)))
            .with_page_size(2)
    }

    async fn submit(ledger: &InMemoryLedger, op: Operation) -> TransactionResponse {
        let request = TransactionBuilder::new(PKG).build(&op).unwrap();
        ledger.sign_and_execute(&request).await.unwrap()
    }

    async fn mint(ledger: &InMemoryLedger, name: &str) -> BoardId {
        let resp = submit(
            ledger,
            Operation::CreateBoard {
                name: name.to_string(),
                description: None,
                verifier: None,
            },
        )
        .await;
        let hint = crate::tx::OperationKind::CreateBoard.creation_hint();
        BoardId::new(
            EffectsExtractor::extract(&resp, hint.as_ref())
                .created_id
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn mint_board_creates_board_and_admin_cap() {
        let ledger = ledger().as_sender(owner());
        let board = mint(&ledger, "Sprint 1").await;

        let raw = ledger
            .get_object(board.as_str(), ObjectOptions::content_and_owner())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.version, 1);
        assert_eq!(raw.fields.unwrap()["name"], json!("Sprint 1"));

        let caps = ledger
            .get_owned_objects(&owner(), "0xpkg::board::BoardAdminCap")
            .await
            .unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].fields.as_ref().unwrap()["board_id"], json!(board.as_str()));
    }

    #[tokio::test]
    async fn tasks_page_through_the_table() {
        let ledger = ledger().as_sender(owner());
        let board = mint(&ledger, "b").await;
        for i in 0..5 {
            submit(
                &ledger,
                Operation::CreateTask {
                    board: board.clone(),
                    title: format!("task {i}"),
                    description: String::new(),
                    category: 0,
                    weight_pct: 10,
                    due_ts_ms: None,
                },
            )
            .await;
        }

        let raw = ledger
            .get_object(board.as_str(), ObjectOptions::content())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.version, 6);
        let fields = raw.fields.unwrap();
        let tasks = TableId::new(table_id(&fields, "tasks").unwrap());

        let first = ledger.get_dynamic_fields(&tasks, None, None).await.unwrap();
        assert_eq!(first.data.len(), 2);
        assert!(first.has_next_page);
        let last = ledger
            .get_dynamic_fields(&tasks, Some("4"), None)
            .await
            .unwrap();
        assert_eq!(last.data.len(), 1);
        assert!(!last.has_next_page);
        let beyond = ledger
            .get_dynamic_fields(&tasks, Some(&usize::MAX.to_string()), None)
            .await
            .unwrap();
        assert!(beyond.data.is_empty());
        assert!(!beyond.has_next_page);

        let child = ledger
            .get_dynamic_field_object(&tasks, &DynamicFieldName::u64(3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(child.fields.unwrap()["value"]["fields"]["title"], json!("task 3"));
    }

    #[tokio::test]
    async fn abort_leaves_state_untouched() {
        let ledger = ledger();
        let alice = ledger.as_sender(owner());
        let board = mint(&alice, "b").await;

        let mallory = ledger.as_sender(Address::new("0xmallory"));
        let resp = submit(
            &mallory,
            Operation::AddMember {
                board: board.clone(),
                admin_cap: Some(CapId::new("0xnot-a-cap")),
                member: Address::new("0xmallory"),
                role: Some(2),
            },
        )
        .await;

        let status = resp.effects.unwrap().status;
        assert!(!status.is_success());
        assert!(status.error.unwrap().contains("ENotAdmin"));
        assert!(resp.object_changes.is_empty());

        let raw = ledger
            .get_object(board.as_str(), ObjectOptions::content())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.version, 1);
    }

    #[tokio::test]
    async fn stored_role_beyond_u8_aborts_instead_of_wrapping() {
        let ledger = ledger();
        let alice = ledger.as_sender(owner());
        let board = mint(&alice, "b").await;
        let cap = alice
            .get_owned_objects(&owner(), "0xpkg::board::BoardAdminCap")
            .await
            .unwrap()
            .remove(0);
        let carol = Address::new("0xcarol");
        submit(
            &alice,
            Operation::AddMember {
                board: board.clone(),
                admin_cap: Some(CapId::new(cap.object_id)),
                member: carol.clone(),
                role: Some(1),
            },
        )
        .await;

        let raw = ledger
            .get_object(board.as_str(), ObjectOptions::content())
            .await
            .unwrap()
            .unwrap();
        let members = TableId::new(table_id(&raw.fields.unwrap(), "members").unwrap());
        let mut child = ledger
            .get_dynamic_field_object(&members, &DynamicFieldName::address(&carol))
            .await
            .unwrap()
            .unwrap();
        // 257 would wrap to role 1 under a plain `as u8` cast.
        child
            .fields
            .as_mut()
            .unwrap()
            .insert("value".to_string(), json!(257));
        ledger.insert_object(child).await;

        let resp = submit(
            &ledger.as_sender(carol),
            Operation::CreateTask {
                board,
                title: "t".to_string(),
                description: String::new(),
                category: 0,
                weight_pct: 10,
                due_ts_ms: None,
            },
        )
        .await;
        let status = resp.effects.unwrap().status;
        assert!(!status.is_success());
        assert!(status.error.unwrap().contains("EInvalidRole"));
    }

    #[tokio::test]
    async fn unsigned_and_malformed_calls_are_rejected_before_execution() {
        let anonymous = ledger();
        let request = TransactionBuilder::new(PKG)
            .build(&Operation::CreateBoard {
                name: "b".to_string(),
                description: None,
                verifier: None,
            })
            .unwrap();
        assert!(matches!(
            anonymous.sign_and_execute(&request).await,
            Err(LedgerError::Signing(_))
        ));

        let mut bad = request.clone();
        bad.call.arguments = vec![CallArg::Pure(PureArg::U64(1))];
        assert!(matches!(
            anonymous.as_sender(owner()).sign_and_execute(&bad).await,
            Err(LedgerError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn offline_ledger_fails_reads() {
        let ledger = ledger();
        ledger.set_offline(true).await;
        let err = ledger
            .get_object("0x1", ObjectOptions::content())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }
}
