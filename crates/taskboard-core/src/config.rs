//! Config - クライアント設定
//!
//! TOML ファイルまたは環境変数から読み込みます。
//! StateClientBuilder はここで決まった値だけを受け取り、グローバルな設定は持ちません。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::SchemaVersion;
use crate::domain::ids::is_ledger_address;
use crate::tx::DEFAULT_CLOCK_OBJECT_ID;

pub const ENV_PACKAGE_ID: &str = "TASKBOARD_PACKAGE_ID";
pub const ENV_NETWORK: &str = "TASKBOARD_NETWORK";
pub const ENV_RPC_URL: &str = "TASKBOARD_RPC_URL";
pub const ENV_SCHEMA: &str = "TASKBOARD_SCHEMA";
pub const ENV_PAGE_LIMIT: &str = "TASKBOARD_PAGE_LIMIT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
    Localnet,
}

impl Network {
    pub fn fullnode_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Self::Testnet => "https://fullnode.testnet.sui.io:443",
            Self::Devnet => "https://fullnode.devnet.sui.io:443",
            Self::Localnet => "http://127.0.0.1:9000",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        })
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            "localnet" | "local" => Ok(Self::Localnet),
            other => Err(format!("unknown network `{other}`")),
        }
    }
}

fn default_clock_object_id() -> String {
    DEFAULT_CLOCK_OBJECT_ID.to_string()
}

/// ClientConfig は StateClient の構築に必要な値
///
/// # 例
/// ```toml
/// package_id = "0x1234"
/// network = "testnet"
/// schema = "verified"
/// page_limit = 50
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// board コントラクトのパッケージ ID
    pub package_id: String,
    #[serde(default)]
    pub network: Network,
    /// 明示しなければ network の fullnode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub schema: SchemaVersion,
    /// getDynamicFields の 1 ページの件数（未指定ならレジャーの既定値）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<usize>,
    #[serde(default = "default_clock_object_id")]
    pub clock_object_id: String,
}

impl ClientConfig {
    pub fn new(package_id: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            network: Network::default(),
            rpc_url: None,
            schema: SchemaVersion::default(),
            page_limit: None,
            clock_object_id: default_clock_object_id(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `TASKBOARD_*` 環境変数から読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 環境変数の代わりに任意の lookup から読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(value(ENV_PACKAGE_ID).ok_or(ConfigError::Missing(ENV_PACKAGE_ID))?);
        if let Some(network) = value(ENV_NETWORK) {
            config.network = network.parse().map_err(|reason| ConfigError::Invalid {
                field: ENV_NETWORK,
                reason,
            })?;
        }
        config.rpc_url = value(ENV_RPC_URL);
        if let Some(schema) = value(ENV_SCHEMA) {
            config.schema = schema.parse().map_err(|reason| ConfigError::Invalid {
                field: ENV_SCHEMA,
                reason,
            })?;
        }
        if let Some(limit) = value(ENV_PAGE_LIMIT) {
            let limit = limit.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                field: ENV_PAGE_LIMIT,
                reason: e.to_string(),
            })?;
            config.page_limit = Some(limit);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_ledger_address(&self.package_id) {
            return Err(ConfigError::Invalid {
                field: "package_id",
                reason: format!("`{}` is not a 0x-prefixed object id", self.package_id),
            });
        }
        if !is_ledger_address(&self.clock_object_id) {
            return Err(ConfigError::Invalid {
                field: "clock_object_id",
                reason: format!("`{}` is not a 0x-prefixed object id", self.clock_object_id),
            });
        }
        if self.page_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "page_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn rpc_endpoint(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.network.fullnode_url())
    }
}
