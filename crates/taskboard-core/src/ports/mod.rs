//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（レジャー RPC、署名、時計）へのインターフェースです。
//! StateClient はこれらを明示的な依存として受け取り、グローバルな状態を持ちません。
//!
//! # 設計原則
//! - レジャーが source of truth（正本）
//! - 送信は署名 collaborator に委譲し、コアは署名しない
//! - テストでは InMemoryLedger やスクリプト化した fake に差し替える

pub mod clock;
pub mod ledger;
pub mod submitter;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::ledger::{
    DynamicFieldInfo, DynamicFieldName, LedgerError, LedgerReader, ObjectOptions, Page, RawObject,
};
pub use self::submitter::TransactionSubmitter;
