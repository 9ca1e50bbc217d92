//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryLedger**: LedgerReader と TransactionSubmitter を兼ねるインメモリ台帳
//!
//! # 本番用実装
//! RPC トランスポートと署名は別クレートで ports を実装します。

pub mod memory_ledger;

pub use self::memory_ledger::{DEFAULT_PAGE_SIZE, InMemoryLedger};
