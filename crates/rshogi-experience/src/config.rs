//! experience の設定
//!
//! TOML ファイル、または USI の `setoption` 相当の名前/値の組から設定する。
//!
//! ```toml
//! enabled = true
//! file = "rshogi.exp"
//! readonly = false
//! min_depth = 4
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::Depth;

/// 保存対象とする最小の探索深さ（既定値）
pub const DEFAULT_MIN_DEPTH: Depth = 4;

/// 既定の experience ファイル名
pub const DEFAULT_FILE: &str = "rshogi.exp";

/// USI オプション名
pub const OPTION_ENABLED: &str = "Experience Enabled";
pub const OPTION_FILE: &str = "Experience File";
pub const OPTION_READONLY: &str = "Experience Readonly";
pub const OPTION_MIN_DEPTH: &str = "Experience MinDepth";

/// 設定エラー
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for option '{name}': {value}")]
    InvalidValue { name: String, value: String },
}

/// experience の設定値
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperienceConfig {
    /// experience を使うか
    pub enabled: bool,
    /// experience ファイル
    pub file: PathBuf,
    /// 読み取り専用（新しいレコードを保存しない）
    pub readonly: bool,
    /// この深さ未満のレコードは保存しない
    pub min_depth: Depth,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: PathBuf::from(DEFAULT_FILE),
            readonly: false,
            min_depth: DEFAULT_MIN_DEPTH,
        }
    }
}

impl ExperienceConfig {
    /// TOML 文字列から読み込む
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// TOML ファイルから読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// USI オプションを反映する
    ///
    /// experience のオプションであれば true、無関係な名前なら false を返す。
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<bool, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };

        match name {
            OPTION_ENABLED => self.enabled = parse_bool(value).ok_or_else(invalid)?,
            OPTION_FILE => self.file = PathBuf::from(value.trim()),
            OPTION_READONLY => self.readonly = parse_bool(value).ok_or_else(invalid)?,
            OPTION_MIN_DEPTH => self.min_depth = value.trim().parse().map_err(|_| invalid())?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// `usi` コマンドへの応答に含めるオプション定義行
    pub fn usi_option_lines(&self) -> Vec<String> {
        vec![
            format!("option name {OPTION_ENABLED} type check default {}", self.enabled),
            format!("option name {OPTION_FILE} type filename default {}", self.file.display()),
            format!("option name {OPTION_READONLY} type check default {}", self.readonly),
            format!(
                "option name {OPTION_MIN_DEPTH} type spin default {} min 0 max 255",
                self.min_depth
            ),
        ]
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Some(true),
        "false" | "off" | "0" => Some(false),
        _ => None,
    }
}
