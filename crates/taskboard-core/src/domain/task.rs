//! Task entity and its status variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{Address, BoardId, TaskObjectId};
use super::schema::SchemaVersion;

/// A task status: the zero-based index into the schema's ordered tag set.
///
/// Status moves forward through the declared order. The schema's failure
/// variant (if any) is reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskStatus {
    index: u8,
    schema: SchemaVersion,
}

impl TaskStatus {
    pub fn new(index: u8, schema: SchemaVersion) -> Self {
        Self { index, schema }
    }

    pub fn index(self) -> u8 {
        self.index
    }

    pub fn schema(self) -> SchemaVersion {
        self.schema
    }

    pub fn tag(self) -> &'static str {
        self.schema
            .status_tags()
            .get(self.index as usize)
            .copied()
            .unwrap_or("Unknown")
    }

    pub fn label(self) -> &'static str {
        self.schema
            .status_labels()
            .get(self.index as usize)
            .copied()
            .unwrap_or("Unknown")
    }

    pub fn is_completed(self) -> bool {
        self.index == self.schema.completed_status()
    }

    pub fn is_failed(self) -> bool {
        self.schema.failure_status() == Some(self.index)
    }

    pub fn is_terminal(self) -> bool {
        self.is_completed() || self.is_failed()
    }

    /// Whether moving to `next` follows the forward-only rule.
    ///
    /// Callers use this to grey out actions; the chain still has the final say.
    pub fn can_advance_to(self, next: u8) -> bool {
        if self.is_terminal() || (next as usize) >= self.schema.status_tags().len() {
            return false;
        }
        if self.schema.failure_status() == Some(next) {
            return true;
        }
        next > self.index
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A task as decoded from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskObjectId,
    /// Sequence number of the task inside its board's task table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    pub version: u64,
    pub board_id: BoardId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Due timestamp in milliseconds. `None` when unset or zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<u64>,
    /// Effort estimate (legacy) or weight percentage (verified).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<u8>,
    pub assignees: Vec<Address>,
    pub status: TaskStatus,
    pub subtasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proof_hash: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commit_hash: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_ms: Option<u64>,
}

impl Task {
    pub fn is_assigned_to(&self, address: &Address) -> bool {
        self.assignees.contains(address)
    }

    /// Overdue: has a due date in the past and is neither completed nor failed.
    pub fn is_overdue(&self, now_ms: u64) -> bool {
        matches!(self.due_date, Some(due) if due < now_ms) && !self.status.is_terminal()
    }
}
