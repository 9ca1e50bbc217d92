//! StateClientBuilder - StateClient の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 依存を明示的に渡す（署名者や RPC をグローバルに持たない）

use std::sync::Arc;

use super::client::StateClient;
use crate::codec::EntityCodec;
use crate::config::{ClientConfig, ConfigError};
use crate::domain::SchemaVersion;
use crate::ports::{Clock, LedgerReader, SystemClock, TransactionSubmitter};
use crate::table::TableWalker;
use crate::tx::{DEFAULT_CLOCK_OBJECT_ID, TransactionBuilder};

/// StateClientBuilder は StateClient を構築
///
/// # 使用例
/// ```ignore
/// let client = StateClientBuilder::from_config(&config)
///     .reader(ledger.clone())
///     .submitter(ledger)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - reader と package_id は必須
/// - build() 時に設定値を ClientConfig と同じ規則で検証
/// - submitter は任意（なければ読み取り専用クライアント）
pub struct StateClientBuilder {
    package_id: Option<String>,
    schema: SchemaVersion,
    page_limit: Option<usize>,
    clock_object_id: String,
    reader: Option<Arc<dyn LedgerReader>>,
    submitter: Option<Arc<dyn TransactionSubmitter>>,
    clock: Arc<dyn Clock>,
}

/// BuildError は StateClient 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing package id; call package_id() or from_config() before build()")]
    MissingPackageId,

    #[error("missing ledger reader; call reader() before build()")]
    MissingReader,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StateClientBuilder {
    pub fn new() -> Self {
        Self {
            package_id: None,
            schema: SchemaVersion::default(),
            page_limit: None,
            clock_object_id: DEFAULT_CLOCK_OBJECT_ID.to_string(),
            reader: None,
            submitter: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            package_id: Some(config.package_id.clone()),
            schema: config.schema,
            page_limit: config.page_limit,
            clock_object_id: config.clock_object_id.clone(),
            ..Self::new()
        }
    }

    pub fn package_id(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = Some(package_id.into());
        self
    }

    pub fn schema(mut self, schema: SchemaVersion) -> Self {
        self.schema = schema;
        self
    }

    pub fn page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = Some(page_limit);
        self
    }

    pub fn clock_object_id(mut self, id: impl Into<String>) -> Self {
        self.clock_object_id = id.into();
        self
    }

    pub fn reader(mut self, reader: Arc<dyn LedgerReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn submitter(mut self, submitter: Arc<dyn TransactionSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// 集計（期限切れ判定）に使う時計
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 検証して StateClient を生成
    ///
    /// # 検証
    /// - package_id / reader が設定されているか
    /// - package_id と clock_object_id が 0x 形式か、page_limit が 0 でないか
    pub fn build(self) -> Result<StateClient, BuildError> {
        let package_id = self.package_id.ok_or(BuildError::MissingPackageId)?;
        let reader = self.reader.ok_or(BuildError::MissingReader)?;

        let config = ClientConfig {
            package_id,
            schema: self.schema,
            page_limit: self.page_limit,
            clock_object_id: self.clock_object_id,
            ..ClientConfig::new(String::new())
        };
        config.validate()?;

        let walker = TableWalker::new(reader.clone(), config.page_limit);
        let builder = TransactionBuilder::new(config.package_id).with_clock(config.clock_object_id);
        Ok(StateClient::new(
            reader,
            self.submitter,
            EntityCodec::new(config.schema, walker),
            builder,
            self.clock,
        ))
    }
}

impl Default for StateClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
