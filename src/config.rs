//! 同期コアの設定
//!
//! デバウンス間隔、初期コンテンツの検証ポリシー、同期トレースの出力先を管理

use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// デバウンス間隔の環境変数
pub const ENV_DEBOUNCE_MS: &str = "RICHTEXT_SYNC_DEBOUNCE_MS";
/// 検証ポリシーの環境変数（`lenient` / `strict`）
pub const ENV_VALIDATION: &str = "RICHTEXT_SYNC_VALIDATION";
/// 同期トレース出力先の環境変数（`1` で既定パス）
pub const ENV_TRACE: &str = "RICHTEXT_SYNC_TRACE";

/// 既定のデバウンス間隔
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// 構造検証に失敗した初期コンテンツの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// 空文書へフォールバックしてログに残す
    #[default]
    Lenient,
    /// 呼び出し元へエラーを返す
    Strict,
}

impl std::str::FromStr for ValidationPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ValidationPolicy::Lenient),
            "strict" => Ok(ValidationPolicy::Strict),
            _ => Err(invalid(ENV_VALIDATION, value)),
        }
    }
}

/// 同期コアの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// ローカル編集から外部通知までの静止時間
    pub debounce: Duration,
    /// 初期コンテンツの検証ポリシー
    pub validation: ValidationPolicy,
    /// 同期トレースの出力先（未指定ならトレースしない）
    pub trace_log_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            validation: ValidationPolicy::default(),
            trace_log_path: None,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_trace_log<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.trace_log_path = Some(path.into());
        self
    }

    /// プロセス環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から設定を読み込む（未設定の項目は既定値）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self::default().merged_with(&SyncOverrides::from_lookup(lookup)?))
    }

    /// `overrides` 側で指定された項目を優先して統合
    pub fn merged_with(&self, overrides: &SyncOverrides) -> SyncConfig {
        SyncConfig {
            debounce: overrides.debounce.unwrap_or(self.debounce),
            validation: overrides.validation.unwrap_or(self.validation),
            trace_log_path: overrides
                .trace_log_path
                .clone()
                .or_else(|| self.trace_log_path.clone()),
        }
    }
}

/// 設定の上書き（`None` は基の値を引き継ぐ）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOverrides {
    pub debounce: Option<Duration>,
    pub validation: Option<ValidationPolicy>,
    pub trace_log_path: Option<PathBuf>,
}

impl SyncOverrides {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    pub fn with_validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_trace_log<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.trace_log_path = Some(path.into());
        self
    }

    /// 参照関数で見つかった項目だけを上書きとして読み込む
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut overrides = Self::default();

        if let Some(raw) = lookup(ENV_DEBOUNCE_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or_else(|| invalid(ENV_DEBOUNCE_MS, &raw))?;
            overrides.debounce = Some(Duration::from_millis(millis));
        }

        if let Some(raw) = lookup(ENV_VALIDATION) {
            overrides.validation = Some(raw.parse()?);
        }

        if let Some(raw) = lookup(ENV_TRACE) {
            overrides.trace_log_path = resolve_trace_setting(&raw)?;
        }

        Ok(overrides)
    }
}

fn resolve_trace_setting(raw: &str) -> Result<Option<PathBuf>, ConfigError> {
    let value = raw.trim();
    match value.to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "off" => Ok(None),
        "1" | "true" | "on" => default_trace_path()
            .map(Some)
            .ok_or_else(|| invalid(ENV_TRACE, raw)),
        _ => {
            let expanded = shellexpand::full(value).map_err(|_| invalid(ENV_TRACE, raw))?;
            Ok(Some(PathBuf::from(expanded.as_ref())))
        }
    }
}

/// 既定のトレース出力先（`~/.richtext-sync/trace.log`）
pub fn default_trace_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".richtext-sync").join("trace.log"))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
