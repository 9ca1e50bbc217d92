//! taskboard-core
//!
//! Client core for collaborative task boards stored as ledger objects.
//! The ledger is the source of truth: reads re-derive typed entities from raw
//! objects every time, writes are signed transactions that only count once
//! their effects are observed.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, schema, board, task, member, errors）
//! - **codec**: 生オブジェクト → 型付きエンティティ（Option / Variant / Entity）
//! - **table**: インライン / テーブルのコレクションを同じ形で列挙（TableWalker）
//! - **tx**: トランザクションの構築と効果の解釈
//! - **ports**: 抽象化レイヤー（LedgerReader, TransactionSubmitter, Clock）
//! - **impls**: 実装（InMemoryLedger）
//! - **app**: StateClient と集計
//! - **config**: ClientConfig

pub mod app;
pub mod codec;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod table;
pub mod tx;

pub use app::{BoardStats, MutationOutcome, Refreshed, StateClient, StateClientBuilder};
pub use config::{ClientConfig, ConfigError, Network};
pub use domain::{
    Address, Board, BoardError, BoardId, ErrorKind, Member, Role, SchemaVersion, Task,
    TaskObjectId, TaskStatus,
};
pub use tx::Operation;
