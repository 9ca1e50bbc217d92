//! Stats - ボードの集計ビュー
//!
//! タスク一覧から導出するだけの純粋な計算です。描画は呼び出し側の仕事。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Address, SchemaVersion, Task, TaskStatus};

/// 担当者ランキングの件数
pub const TOP_ASSIGNEES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeLoad {
    pub address: Address,
    pub tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStats {
    pub total: usize,
    /// スキーマの全ステータス（0 件のものも含む）を宣言順に
    pub by_status: Vec<StatusCount>,
    pub completed: usize,
    /// 完了率（0..=100, 四捨五入）。タスクがなければ 0
    pub completion_pct: u8,
    pub overdue: usize,
    /// 担当タスク数の多い順、同数はアドレス順
    pub top_assignees: Vec<AssigneeLoad>,
}

impl BoardStats {
    pub fn compute(tasks: &[Task], schema: SchemaVersion, now_ms: u64) -> Self {
        let mut by_status: Vec<StatusCount> = schema
            .status_labels()
            .iter()
            .enumerate()
            .map(|(i, label)| StatusCount {
                status: TaskStatus::new(i as u8, schema),
                label: label.to_string(),
                count: 0,
            })
            .collect();

        let mut load: HashMap<&Address, usize> = HashMap::new();
        let mut completed = 0;
        let mut overdue = 0;

        for task in tasks {
            if let Some(slot) = by_status.get_mut(task.status.index() as usize) {
                slot.count += 1;
            }
            if task.status.is_completed() {
                completed += 1;
            }
            if task.is_overdue(now_ms) {
                overdue += 1;
            }
            for assignee in &task.assignees {
                *load.entry(assignee).or_default() += 1;
            }
        }

        let mut top_assignees: Vec<AssigneeLoad> = load
            .into_iter()
            .map(|(address, tasks)| AssigneeLoad {
                address: address.clone(),
                tasks,
            })
            .collect();
        top_assignees.sort_by(|a, b| b.tasks.cmp(&a.tasks).then_with(|| a.address.cmp(&b.address)));
        top_assignees.truncate(TOP_ASSIGNEES);

        let total = tasks.len();
        let completion_pct = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };

        Self {
            total,
            by_status,
            completed,
            completion_pct,
            overdue,
            top_assignees,
        }
    }

    pub fn count_of(&self, status: u8) -> usize {
        self.by_status
            .get(status as usize)
            .map_or(0, |slot| slot.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoardId, TaskObjectId};

    fn task(status: u8, due: Option<u64>, assignees: &[&str]) -> Task {
        Task {
            id: TaskObjectId::new("0xt"),
            index: None,
            version: 1,
            board_id: BoardId::new("0xb"),
            parent: None,
            title: "t".to_string(),
            description: None,
            due_date: due,
            effort: None,
            category: None,
            assignees: assignees.iter().map(|a| Address::new(*a)).collect(),
            status: TaskStatus::new(status, SchemaVersion::Verified),
            subtasks: Vec::new(),
            proof_hash: Vec::new(),
            commit_hash: Vec::new(),
            created_at_ms: None,
            updated_at_ms: None,
        }
    }

    #[test]
    fn test_counts_and_completion() {
        let tasks = vec![
            task(0, None, &["0xa"]),
            task(1, Some(50), &["0xa", "0xb"]),
            task(3, Some(50), &["0xb"]),
            task(4, Some(50), &[]),
        ];

        let stats = BoardStats::compute(&tasks, SchemaVersion::Verified, 100);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status.len(), 5);
        assert_eq!(stats.count_of(0), 1);
        assert_eq!(stats.count_of(2), 0);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completion_pct, 25);
        // Verified and Failed tasks are never overdue.
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.by_status[2].label, "Awaiting Check");
    }

    #[test]
    fn test_top_assignees_are_ranked_and_capped() {
        let tasks: Vec<Task> = ["0x1", "0x2", "0x3", "0x4", "0x5", "0x6"]
            .iter()
            .enumerate()
            .flat_map(|(i, who)| (0..=i).map(move |_| task(0, None, &[*who])))
            .collect();

        let stats = BoardStats::compute(&tasks, SchemaVersion::Verified, 0);

        assert_eq!(stats.top_assignees.len(), TOP_ASSIGNEES);
        assert_eq!(stats.top_assignees[0].address, Address::new("0x6"));
        assert_eq!(stats.top_assignees[0].tasks, 6);
        assert!(!stats.top_assignees.iter().any(|l| l.address == Address::new("0x1")));
    }

    #[test]
    fn test_empty_board() {
        let stats = BoardStats::compute(&[], SchemaVersion::Legacy, 0);
        assert_eq!(stats.completion_pct, 0);
        assert_eq!(stats.by_status.len(), 4);
        assert!(stats.top_assignees.is_empty());
    }
}
