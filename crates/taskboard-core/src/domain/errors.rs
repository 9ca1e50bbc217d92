//! Errors - エラー型と分類
//!
//! 読み取り・書き込みの失敗を `ErrorKind` で分類します。
//! UI 層は `kind()` で分岐し、メッセージはそのまま表示する想定です。

use thiserror::Error;

use crate::ports::LedgerError;

/// ErrorKind は失敗の分類
///
/// # 分類
/// - InvalidObject: 取得したオブジェクトが存在しない / 種類が違う
/// - Decode: 必須フィールドが構造的に壊れている（Option の欠落とは別）
/// - TableFetchFailed: テーブル走査のページ取得・子取得のどれかが失敗
/// - TransactionFailed: effects の status が success ではない
/// - ObjectNotFound: 成功したが作成オブジェクトの ID が取り出せない
/// - SigningUnavailable: 署名できる資格情報がない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidObject,
    Decode,
    TableFetchFailed,
    TransactionFailed,
    ObjectNotFound,
    SigningUnavailable,
    Ledger,
    InvalidArgument,
}

/// BoardError はクライアント全体のエラー
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("invalid object {id}: {reason}")]
    InvalidObject { id: String, reason: String },

    #[error("malformed field `{field}`: {reason}")]
    Decode { field: String, reason: String },

    #[error("table {table} could not be walked: {source}")]
    TableFetchFailed {
        table: String,
        #[source]
        source: LedgerError,
    },

    #[error("transaction {digest} failed: {reason}")]
    TransactionFailed { digest: String, reason: String },

    #[error("transaction {digest} succeeded but no created {expected} could be found")]
    ObjectNotFound { digest: String, expected: String },

    #[error("signing unavailable: {0}")]
    SigningUnavailable(String),

    #[error("ledger request failed: {0}")]
    Ledger(#[source] LedgerError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidObject { .. } => ErrorKind::InvalidObject,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::TableFetchFailed { .. } => ErrorKind::TableFetchFailed,
            Self::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            Self::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            Self::SigningUnavailable(_) => ErrorKind::SigningUnavailable,
            Self::Ledger(_) => ErrorKind::Ledger,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn decode(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_object(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidObject {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<LedgerError> for BoardError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Signing(msg) => Self::SigningUnavailable(msg),
            other => Self::Ledger(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_failures_map_to_signing_unavailable() {
        let err: BoardError = LedgerError::Signing("no keypair".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::SigningUnavailable);
        assert!(err.to_string().contains("no keypair"));
    }

    #[test]
    fn transport_failures_stay_verbatim() {
        let err: BoardError = LedgerError::Transport("connection reset".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Ledger);
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn table_failures_keep_their_source() {
        let err = BoardError::TableFetchFailed {
            table: "0xtable".to_string(),
            source: LedgerError::Transport("timeout".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::TableFetchFailed);
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("transport error: timeout"));
    }
}
