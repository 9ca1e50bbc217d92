//! TransactionSubmitter port - 署名と送信
//!
//! 鍵の管理や署名アルゴリズムはこの trait の外側にあります。
//! コアは「リクエストを渡すとレスポンスが返る」ことだけを前提にします。

use async_trait::async_trait;

use super::ledger::LedgerError;
use crate::domain::Address;
use crate::tx::{TransactionRequest, TransactionResponse};

/// TransactionSubmitter はトランザクションに署名してレジャーに送信する
///
/// # 設計原則
/// - 送信したトランザクションはキャンセルしない（結果が出るまで待つ）
/// - リトライしない（ブロックチェーンのトランザクションは冪等ではない）
/// - 署名できない場合は `LedgerError::Signing` を返す
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// 署名者のアドレス。資格情報がなければ `None`
    fn sender(&self) -> Option<Address>;

    async fn sign_and_execute(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionResponse, LedgerError>;
}
