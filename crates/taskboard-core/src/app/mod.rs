//! App - アプリケーション層
//!
//! ports と codec / tx を組み合わせて、UI から呼ばれる読み書きを実装します。
//!
//! # 主要コンポーネント
//! - **StateClientBuilder**: 依存のワイヤリングと起動時検証
//! - **StateClient**: 読み取り（fetch → decode）と書き込み（build → submit → extract → refresh）
//! - **BoardStats**: タスク一覧からの集計

pub mod builder;
pub mod client;
pub mod stats;

pub use self::builder::{BuildError, StateClientBuilder};
pub use self::client::{MutationOutcome, Refreshed, StateClient};
pub use self::stats::{AssigneeLoad, BoardStats, StatusCount};
