//! EntityCodec - raw objects into typed Board / Task / Member.
//!
//! One codec decodes one schema version. Decoding never mutates its input and
//! only touches the network through the TableWalker, for table-backed
//! collections. A failure anywhere fails the whole entity.

use serde_json::Value;
use tracing::{debug, warn};

use super::option::OptionCodec;
use super::raw::{
    FieldBag, address_of, bytes_of, id_list_of, required, str_of, struct_fields, struct_name_of,
    text_of, u8_of, u64_of, uid_of,
};
use super::variant::VariantCodec;
use crate::domain::{
    Address, Board, BoardError, BoardId, CollectionSource, Entity, EntityKind, Member, Role,
    SchemaVersion, Task, TaskObjectId, TaskStatus,
};
use crate::ports::RawObject;
use crate::table::{KeyedCollection, TableEntry, TableWalker};

type Result<T> = std::result::Result<T, BoardError>;

/// Identity of a task being decoded; the fields themselves do not carry it.
struct TaskMeta<'a> {
    id: &'a str,
    index: Option<u64>,
    version: u64,
    board: Option<&'a BoardId>,
}

#[derive(Clone)]
pub struct EntityCodec {
    schema: SchemaVersion,
    walker: TableWalker,
}

impl EntityCodec {
    pub fn new(schema: SchemaVersion, walker: TableWalker) -> Self {
        Self { schema, walker }
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    pub fn walker(&self) -> &TableWalker {
        &self.walker
    }

    fn status_codec(&self) -> VariantCodec {
        VariantCodec::new(self.schema.status_tags())
    }

    fn role_codec(&self) -> VariantCodec {
        VariantCodec::new(self.schema.role_tags())
    }

    /// Decodes `raw` as `kind`.
    ///
    /// Tasks may be standalone objects or `Field<u64, Task>` table children;
    /// members are always table children (`Field<address, role>`).
    pub async fn decode(&self, kind: EntityKind, raw: &RawObject) -> Result<Entity> {
        match kind {
            EntityKind::Board => self.decode_board(raw).await.map(Entity::Board),
            EntityKind::Task if raw.struct_name() == Some("Field") => {
                let fields = move_fields(raw)?;
                let entry = TableEntry {
                    name: crate::ports::DynamicFieldName {
                        type_name: "u64".to_string(),
                        value: required(fields, "name")?.clone(),
                    },
                    object: raw.clone(),
                };
                self.decode_task_entry(None, &entry).map(Entity::Task)
            }
            EntityKind::Task => self.decode_task_object(raw).map(Entity::Task),
            EntityKind::Member => {
                let fields = move_fields(raw)?;
                let value = fields.get("value").unwrap_or(&Value::Null);
                self.decode_member(required(fields, "name")?, value)
                    .map(Entity::Member)
            }
        }
    }

    pub async fn decode_board(&self, raw: &RawObject) -> Result<Board> {
        expect_struct(raw, EntityKind::Board)?;
        let fields = move_fields(raw)?;
        let names = self.schema.fields();

        let id = object_id(raw, fields);
        let name = str_of("name", required(fields, "name")?)?.to_string();
        let owner = address_of("owner", required(fields, "owner")?)?;
        let description = OptionCodec::field(fields, "description", text_of)?;
        let verifier = OptionCodec::field(fields, "verifier", address_of)?;

        let Some(member_field) = names
            .members
            .iter()
            .find(|name| fields.contains_key(**name))
            .copied()
        else {
            return Err(BoardError::invalid_object(
                id.as_str(),
                format!("no membership field (expected one of {:?})", names.members),
            ));
        };
        let members = KeyedCollection::from_field(member_field, fields.get(member_field))?;
        let member_source = members.source();
        let entries = members.entries(&self.walker).await?;
        // `VecMap<address, bool>` keeps departed members with `false`.
        let members = entries
            .iter()
            .filter(|entry| entry.value != Value::Bool(false))
            .map(|entry| self.decode_member(&entry.key, &entry.value))
            .collect::<Result<Vec<_>>>()?;
        if members.len() != entries.len() {
            debug!(board = %id, skipped = entries.len() - members.len(), "skipped inactive members");
        }

        let tasks = KeyedCollection::from_field(names.tasks, fields.get(names.tasks))?;
        let task_source = tasks.source();
        let task_keys = Value::Array(tasks.keys(&self.walker).await?);
        let mut task_ids = id_list_of(names.tasks, &task_keys)?;
        if matches!(task_source, CollectionSource::Table(_)) {
            // Table keys are sequence numbers; the walk order is the ledger's, not creation order.
            task_ids.sort_by_key(|key| key.parse::<u64>().unwrap_or(u64::MAX));
        }
        let before = task_ids.len();
        dedup_in_order(&mut task_ids);
        if task_ids.len() != before {
            warn!(board = %id, "board lists duplicate task references; keeping first occurrence");
        }

        debug!(
            board = %id,
            members = members.len(),
            tasks = task_ids.len(),
            "decoded board"
        );

        Ok(Board {
            id: BoardId::new(id),
            version: object_version(raw, fields)?,
            name,
            description,
            owner,
            verifier,
            members,
            member_source,
            task_ids,
            task_source,
            schema: self.schema,
        })
    }

    /// A standalone task object (inline task lists).
    pub fn decode_task_object(&self, raw: &RawObject) -> Result<Task> {
        expect_struct(raw, EntityKind::Task)?;
        let fields = move_fields(raw)?;
        let index = OptionCodec::field(fields, "task_index", u64_of)?;
        let meta = TaskMeta {
            id: &object_id(raw, fields),
            index,
            version: object_version(raw, fields)?,
            board: None,
        };
        self.decode_task_fields(fields, meta)
    }

    /// A task stored as `Field<u64, Task>` in the board's task table.
    ///
    /// `board` is the board whose table was walked; a task claiming another
    /// board is rejected.
    pub fn decode_task_entry(&self, board: Option<&BoardId>, entry: &TableEntry) -> Result<Task> {
        let value = entry.value().ok_or_else(|| {
            BoardError::invalid_object(&entry.object.object_id, "table entry without value")
        })?;
        if let Some(type_name) = value.get("type").and_then(Value::as_str)
            && struct_name_of(type_name) != EntityKind::Task.struct_name()
        {
            return Err(BoardError::invalid_object(
                &entry.object.object_id,
                format!("expected Task, found {type_name}"),
            ));
        }
        let fields = struct_fields(value)
            .ok_or_else(|| BoardError::decode("value", "task entry is not a struct"))?;
        let meta = TaskMeta {
            id: &entry.object.object_id,
            index: Some(u64_of("name", entry.key())?),
            version: entry.object.version,
            board,
        };
        self.decode_task_fields(fields, meta)
    }

    fn decode_task_fields(&self, fields: &FieldBag, meta: TaskMeta<'_>) -> Result<Task> {
        let names = self.schema.fields();

        let claimed = fields.get("board_id").and_then(uid_of).map(BoardId::new);
        let board_id = match (claimed, meta.board) {
            (Some(claimed), Some(expected)) if &claimed != expected => {
                return Err(BoardError::invalid_object(
                    meta.id,
                    format!("task belongs to board {claimed}, not {expected}"),
                ));
            }
            (Some(claimed), _) => claimed,
            (None, Some(expected)) => expected.clone(),
            (None, None) => return Err(BoardError::decode("board_id", "missing")),
        };

        let title = str_of("title", required(fields, "title")?)?.to_string();
        let parent = OptionCodec::field(fields, names.task_parent, reference_of)?;
        let description = OptionCodec::field(fields, names.task_description, text_of)?;
        let due_date = OptionCodec::field(fields, names.task_due, u64_of)?.filter(|due| *due > 0);
        let effort = OptionCodec::field(fields, names.task_effort, u64_of)?;
        let category = OptionCodec::field(fields, "category", u8_of)?;
        let assignees = address_set("assignees", fields.get("assignees"))?;
        let status = TaskStatus::new(
            self.status_codec()
                .decode(fields.get("status").unwrap_or(&Value::Null)),
            self.schema,
        );
        let subtasks = match fields.get("subtasks").and_then(OptionCodec::decode) {
            Some(list) => id_list_of("subtasks", list)?,
            None => Vec::new(),
        };

        Ok(Task {
            id: TaskObjectId::new(meta.id),
            index: meta.index,
            version: meta.version,
            board_id,
            parent,
            title,
            description,
            due_date,
            effort,
            category,
            assignees,
            status,
            subtasks,
            proof_hash: OptionCodec::field(fields, "proof_hash", bytes_of)?.unwrap_or_default(),
            commit_hash: OptionCodec::field(fields, "commit_hash", bytes_of)?.unwrap_or_default(),
            created_at_ms: OptionCodec::field(fields, "created_at_ms", u64_of)?,
            updated_at_ms: OptionCodec::field(fields, "updated_at_ms", u64_of)?,
        })
    }

    /// A membership entry: address from the key, role from the value.
    ///
    /// Plain address vectors carry no value and get the schema's default role;
    /// `bool` values mark active (default role) or inactive (index 0) members.
    pub fn decode_member(&self, key: &Value, value: &Value) -> Result<Member> {
        let address = address_of("members.key", key)?;
        let index = match value {
            Value::Null => self.schema.default_member_role(),
            Value::Bool(true) => self.schema.default_member_role(),
            Value::Bool(false) => 0,
            other => self.role_codec().decode(other),
        };
        Ok(Member::new(address, Role::new(index, self.schema)))
    }
}

fn move_fields(raw: &RawObject) -> Result<&FieldBag> {
    raw.fields
        .as_ref()
        .ok_or_else(|| BoardError::invalid_object(&raw.object_id, "not a Move object"))
}

fn expect_struct(raw: &RawObject, kind: EntityKind) -> Result<()> {
    match raw.struct_name() {
        Some(name) if name != kind.struct_name() => Err(BoardError::invalid_object(
            &raw.object_id,
            format!("expected {}, found {}", kind.struct_name(), name),
        )),
        _ => Ok(()),
    }
}

fn object_id(raw: &RawObject, fields: &FieldBag) -> String {
    if !raw.object_id.is_empty() {
        return raw.object_id.clone();
    }
    fields
        .get("id")
        .and_then(uid_of)
        .unwrap_or_default()
        .to_string()
}

/// Ledger object version, falling back to an explicit `version` field.
fn object_version(raw: &RawObject, fields: &FieldBag) -> Result<u64> {
    if raw.version > 0 {
        return Ok(raw.version);
    }
    match fields.get("version") {
        Some(v) if !v.is_null() => u64_of("version", v),
        _ => Ok(0),
    }
}

/// Reference to another object or sequence number, as a string.
fn reference_of(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => uid_of(other)
            .map(str::to_string)
            .ok_or_else(|| BoardError::decode(field, format!("not a reference: {other}"))),
    }
}

/// Address set: a vector, an optional-wrapped vector, a raw `vec` list or a
/// `VecSet` (`{ "fields": { "contents": [..] } }`). Order kept, duplicates dropped.
fn address_set(field: &str, raw: Option<&Value>) -> Result<Vec<Address>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let list = match OptionCodec::decode(raw) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
    .or_else(|| raw.get("vec").and_then(Value::as_array))
    .or_else(|| struct_fields(raw)?.get("contents")?.as_array());

    let mut out: Vec<Address> = Vec::new();
    for item in list.into_iter().flatten() {
        let address = address_of(field, item)?;
        if !out.contains(&address) {
            out.push(address);
        }
    }
    Ok(out)
}

fn dedup_in_order(ids: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::table::walker::tests::PagedLedger;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::Arc;

    fn codec(schema: SchemaVersion) -> EntityCodec {
        let ledger = PagedLedger::with_pages(&[&["0xalice", "0xbob"]]);
        EntityCodec::new(schema, TableWalker::new(Arc::new(ledger), None))
    }

    fn object(id: &str, type_name: &str, fields: Value) -> RawObject {
        RawObject {
            object_id: id.to_string(),
            version: 5,
            object_type: Some(type_name.to_string()),
            owner: None,
            fields: fields.as_object().cloned(),
        }
    }

    #[tokio::test]
    async fn legacy_board_with_inline_members() {
        let raw = object(
            "0xboard",
            "0xpkg::board::Board",
            json!({
                "id": { "id": "0xboard" },
                "name": "Roadmap",
                "description": { "fields": { "some": "Q3 goals" } },
                "owner": "0xowner",
                "members": ["0xalice", "0xbob"],
                "tasks": ["0xt1", "0xt2", "0xt1"]
            }),
        );

        let board = codec(SchemaVersion::Legacy).decode_board(&raw).await.unwrap();

        assert_eq!(board.id.as_str(), "0xboard");
        assert_eq!(board.version, 5);
        assert_eq!(board.description.as_deref(), Some("Q3 goals"));
        assert_eq!(board.members.len(), 2);
        assert_eq!(board.members[0].role.tag(), "Contributor");
        assert_eq!(board.member_source, CollectionSource::Inline);
        assert_eq!(board.task_ids, vec!["0xt1", "0xt2"]);
    }

    fn vec_map(entries: &[(&str, bool)]) -> Value {
        let contents: Vec<Value> = entries
            .iter()
            .map(|(key, value)| json!({ "fields": { "key": key, "value": value } }))
            .collect();
        json!({ "type": "0x2::vec_map::VecMap<address, bool>", "fields": { "contents": contents } })
    }

    #[rstest]
    #[case::address_vector("members", json!(["0xalice", "0xbob"]), &["0xalice", "0xbob"])]
    #[case::active_map("active_members", vec_map(&[("0xalice", true), ("0xbob", true)]), &["0xalice", "0xbob"])]
    #[case::inactive_dropped("active_members", vec_map(&[("0xalice", false), ("0xbob", true)]), &["0xbob"])]
    #[tokio::test]
    async fn legacy_board_membership_shapes(
        #[case] field: &str,
        #[case] members: Value,
        #[case] expected: &[&str],
    ) {
        let mut fields = json!({ "name": "Roadmap", "owner": "0xowner", "tasks": [] });
        fields[field] = members;
        let raw = object("0xboard", "0xpkg::board::Board", fields);

        let board = codec(SchemaVersion::Legacy).decode_board(&raw).await.unwrap();

        assert_eq!(
            board.members.iter().map(|m| m.address.as_str()).collect::<Vec<_>>(),
            expected
        );
        assert!(board.members.iter().all(|m| m.role.tag() == "Contributor"));
        assert_eq!(board.members_with_owner().len(), expected.len() + 1);
    }

    #[tokio::test]
    async fn board_without_membership_field_is_invalid() {
        let raw = object(
            "0xboard",
            "0xpkg::board::Board",
            json!({ "name": "Roadmap", "owner": "0xowner", "tasks": [] }),
        );
        for schema in [SchemaVersion::Legacy, SchemaVersion::Verified] {
            let err = codec(schema).decode_board(&raw).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidObject);
            assert!(err.to_string().contains("membership"));
        }
    }

    #[tokio::test]
    async fn verified_board_walks_member_table() {
        let raw = object(
            "0xboard",
            "0xpkg::board::Board",
            json!({
                "name": "Sprint 1",
                "description": null,
                "owner": "0xowner",
                "verifier": { "vec": ["0xverifier"] },
                "members": { "type": "0x2::table::Table<address, u8>", "fields": { "id": { "id": "0xmembers" }, "size": "2" } },
                "tasks": []
            }),
        );

        let board = codec(SchemaVersion::Verified).decode_board(&raw).await.unwrap();

        assert_eq!(board.description, None);
        assert_eq!(board.verifier, Some(Address::new("0xverifier")));
        assert_eq!(
            board.members.iter().map(|m| m.address.as_str()).collect::<Vec<_>>(),
            vec!["0xalice", "0xbob"]
        );
        // PagedLedger stores role 1 for every entry.
        assert!(board.members.iter().all(|m| m.role.tag() == "Contributor"));
        assert_eq!(board.member_source, CollectionSource::Table(crate::domain::TableId::new("0xmembers")));
    }

    #[tokio::test]
    async fn board_of_wrong_type_is_invalid() {
        let raw = object("0xcap", "0xpkg::board::BoardAdminCap", json!({ "board_id": "0xb" }));
        let err = codec(SchemaVersion::Verified).decode_board(&raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidObject);
    }

    #[tokio::test]
    async fn board_missing_required_field_is_a_decode_error() {
        let raw = object("0xb", "0xpkg::board::Board", json!({ "name": "x" }));
        let err = codec(SchemaVersion::Verified).decode_board(&raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn legacy_task_uses_option_and_variant_codecs() {
        let raw = object(
            "0xt1",
            "0xpkg::task::Task",
            json!({
                "board_id": "0xboard",
                "parent": { "vec": [] },
                "title": "Write docs",
                "description": { "Some": "" },
                "due_date": { "fields": { "value": "1700000000000" } },
                "effort_estimation": { "value": "3" },
                "assignees": { "vec": ["0xalice", "0xbob", "0xalice"] },
                "status": { "InReview": {} },
                "subtasks": ["0xt2"]
            }),
        );

        let task = codec(SchemaVersion::Legacy).decode_task_object(&raw).unwrap();

        assert_eq!(task.parent, None);
        assert_eq!(task.description.as_deref(), Some(""));
        assert_eq!(task.due_date, Some(1_700_000_000_000));
        assert_eq!(task.effort, Some(3));
        assert_eq!(task.assignees, vec![Address::new("0xalice"), Address::new("0xbob")]);
        assert_eq!(task.status.tag(), "InReview");
        assert_eq!(task.subtasks, vec!["0xt2"]);
    }

    fn task_entry(key: u64, task_fields: Value) -> TableEntry {
        TableEntry {
            name: crate::ports::DynamicFieldName::u64(key),
            object: object(
                "0xfield7",
                "0x2::dynamic_field::Field<u64, 0xpkg::board::Task>",
                json!({
                    "name": key.to_string(),
                    "value": { "type": "0xpkg::board::Task", "fields": task_fields }
                }),
            ),
        }
    }

    #[test]
    fn verified_task_decodes_cipher_and_numeric_status() {
        let entry = task_entry(
            7,
            json!({
                "board_id": "0xboard",
                "title": "Audit",
                "description_cipher": [104, 105],
                "category": 2,
                "status": 1,
                "weight_pct": 25,
                "assignees": [],
                "due_ts_ms": "0",
                "parent_id": { "vec": ["3"] },
                "proof_hash": [],
                "commit_hash": [],
                "created_at_ms": "100",
                "updated_at_ms": "200"
            }),
        );

        let board = BoardId::new("0xboard");
        let task = codec(SchemaVersion::Verified)
            .decode_task_entry(Some(&board), &entry)
            .unwrap();

        assert_eq!(task.id.as_str(), "0xfield7");
        assert_eq!(task.index, Some(7));
        assert_eq!(task.description.as_deref(), Some("hi"));
        assert_eq!(task.due_date, None);
        assert_eq!(task.effort, Some(25));
        assert_eq!(task.category, Some(2));
        assert_eq!(task.parent.as_deref(), Some("3"));
        assert_eq!(task.status.tag(), "InProgress");
        assert_eq!(task.created_at_ms, Some(100));
    }

    #[test]
    fn empty_cipher_is_an_empty_description() {
        let entry = task_entry(1, json!({ "title": "t", "description_cipher": [] }));
        let board = BoardId::new("0xboard");
        let task = codec(SchemaVersion::Verified)
            .decode_task_entry(Some(&board), &entry)
            .unwrap();
        assert_eq!(task.description.as_deref(), Some(""));
        assert_eq!(task.board_id, board);
        assert_eq!(task.status.index(), 0);
    }

    #[test]
    fn task_claiming_another_board_is_rejected() {
        let entry = task_entry(1, json!({ "title": "t", "board_id": "0xother" }));
        let board = BoardId::new("0xboard");
        let err = codec(SchemaVersion::Verified)
            .decode_task_entry(Some(&board), &entry)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidObject);
    }

    #[test]
    fn malformed_bytes_fail_the_task() {
        let entry = task_entry(1, json!({ "title": "t", "description_cipher": [300] }));
        let board = BoardId::new("0xboard");
        let err = codec(SchemaVersion::Verified)
            .decode_task_entry(Some(&board), &entry)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn member_roles_from_values() {
        let c = codec(SchemaVersion::Verified);
        let admin = c.decode_member(&json!("0xa"), &json!(2)).unwrap();
        assert!(admin.role.is_admin());
        let tagged = c.decode_member(&json!("0xa"), &json!({ "Contributor": {} })).unwrap();
        assert_eq!(tagged.role.index(), 1);
        let inactive = c.decode_member(&json!("0xa"), &json!(false)).unwrap();
        assert_eq!(inactive.role.tag(), "None");
        assert!(c.decode_member(&json!("not-an-address"), &json!(1)).is_err());
    }

    #[tokio::test]
    async fn generic_decode_dispatches_on_kind() {
        let c = codec(SchemaVersion::Verified);
        let member = object(
            "0xf",
            "0x2::dynamic_field::Field<address, u8>",
            json!({ "name": "0xcarol", "value": 2 }),
        );
        match c.decode(EntityKind::Member, &member).await.unwrap() {
            Entity::Member(m) => assert_eq!(m.address.as_str(), "0xcarol"),
            other => panic!("unexpected entity {other:?}"),
        }

        let entry = task_entry(4, json!({ "title": "t", "board_id": "0xboard" }));
        match c.decode(EntityKind::Task, &entry.object).await.unwrap() {
            Entity::Task(t) => assert_eq!(t.index, Some(4)),
            other => panic!("unexpected entity {other:?}"),
        }
    }
}
