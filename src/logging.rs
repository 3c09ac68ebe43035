//! 同期トレースログ
//!
//! 同期イベントを1行1レコードのJSONとしてファイルへ書き出す。
//! 書き込み失敗は `log::warn!` へ回し、編集処理には影響させない

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// トレース対象の同期イベント種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Initialize,
    LocalEdit,
    Emit,
    ReconcileUnchanged,
    ReconcileReplaced,
    ContentFallback,
    Teardown,
}

/// 1件のトレースレコード
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub timestamp: String,
    pub event: TraceKind,
    pub revision: u64,
    pub detail: String,
}

impl TraceEvent {
    pub fn new(event: TraceKind, revision: u64, detail: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            event,
            revision,
            detail: detail.into(),
        }
    }
}

pub struct SyncTraceLogger {
    file: Mutex<File>,
    log_path: PathBuf,
}

impl SyncTraceLogger {
    /// トレースファイルを開く（既存の内容は切り詰める）
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            log_path: path.to_path_buf(),
        })
    }

    /// 設定のパスが指定されていれば開く。失敗時は警告してトレースなしで続行
    pub fn open_optional(path: Option<&Path>) -> Option<Self> {
        let path = path?;
        match Self::new(path) {
            Ok(logger) => Some(logger),
            Err(err) => {
                log::warn!("Failed to open sync trace {}: {}", path.display(), err);
                None
            }
        }
    }

    pub fn log_event(&self, event: TraceEvent) {
        if let Err(err) = self.write_record(&event) {
            log::warn!("Failed to write sync trace event {:?}: {}", event.event, err);
        }
    }

    pub fn record(&self, kind: TraceKind, revision: u64, detail: impl Into<String>) {
        self.log_event(TraceEvent::new(kind, revision, detail));
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn write_record(&self, record: &TraceEvent) -> std::io::Result<()> {
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let json = serde_json::to_string(record)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}

pub fn current_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => format!("{}.{:09}", duration.as_secs(), duration.subsec_nanos()),
        Err(_) => "0.0".to_string(),
    }
}

/// ログ用に文字列を短縮（文字境界を保つ）
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else if max_chars <= 1 {
        "...".to_string()
    } else {
        let mut truncated: String = text.chars().take(max_chars - 1).collect();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    fn read_records(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn writes_one_json_line_per_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("trace.log");
        let logger = SyncTraceLogger::new(&path).unwrap();

        logger.record(TraceKind::Initialize, 0, "editable");
        logger.record(TraceKind::ReconcileReplaced, 3, "selection_restored=false");

        let records = read_records(logger.log_path());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["event"], "initialize");
        assert_eq!(records[1]["event"], "reconcile_replaced");
        assert_eq!(records[1]["revision"], 3);
        assert_eq!(records[1]["detail"], "selection_restored=false");
    }

    #[test]
    fn reopening_truncates_previous_trace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.log");
        SyncTraceLogger::new(&path).unwrap().record(TraceKind::Emit, 1, "");
        let logger = SyncTraceLogger::new(&path).unwrap();
        logger.record(TraceKind::Teardown, 2, "");

        let records = read_records(&path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["event"], "teardown");
    }

    #[test]
    fn optional_open_without_path_is_none() {
        assert!(SyncTraceLogger::open_optional(None).is_none());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("日本語のテキスト", 4), "日本語…");
    }
}
