//! エラーハンドリングシステム
//!
//! コンテンツ同期コア全体で使用される統一されたエラー型を定義
//! 正規化・選択範囲の失敗はローカルで回復し、外部コールバックの失敗のみ呼び出し元へ伝播する

use thiserror::Error;

/// 同期コア全体のエラー型
#[derive(Error, Debug)]
pub enum SyncError {
    /// コンテンツ構造エラー
    #[error("Content validation failed")]
    Content(#[from] ContentError),

    /// 編集操作エラー
    #[error("Edit operation failed")]
    Edit(#[from] EditError),

    /// ライフサイクル違反
    #[error("Lifecycle violation")]
    Lifecycle(#[from] LifecycleError),

    /// 設定エラー
    #[error("Configuration error")]
    Config(#[from] ConfigError),

    /// 外部変更コールバックの失敗（再試行しない）
    #[error("Content change callback failed: {0}")]
    Callback(#[source] anyhow::Error),
}

/// スナップショットの構造検証エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("Root node must be `doc`, found `{found}`")]
    RootNotDoc { found: String },

    #[error("Unknown node type: {kind}")]
    UnknownNode { kind: String },

    #[error("Unknown mark type: {kind}")]
    UnknownMark { kind: String },

    #[error("Text node without `text`")]
    MissingText,

    #[error("Empty text node")]
    EmptyText,

    #[error("Invalid attribute `{attr}` on `{node}`: {reason}")]
    InvalidAttr {
        node: String,
        attr: String,
        reason: String,
    },

    #[error("Node `{child}` is not allowed inside `{parent}`")]
    UnexpectedChild { parent: String, child: String },

    #[error("Container `{node}` has no content")]
    EmptyContainer { node: String },

    #[error("Duplicate mark `{mark}` on text node")]
    DuplicateMark { mark: String },

    #[error("Mark `{mark}` is not allowed inside `{node}`")]
    MarkNotAllowed { node: String, mark: String },

    #[error("Malformed snapshot JSON: {message}")]
    Json { message: String },
}

/// 編集操作固有のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Editor is read-only")]
    ReadOnly,

    #[error("Position {pos} is not inside a text block")]
    NotInTextBlock { pos: usize },

    #[error("Range {from}..{to} spans blocks that cannot be joined")]
    CrossBlockRange { from: usize, to: usize },

    #[error("Selection {from}..{to} is outside document of size {size}")]
    InvalidSelection { from: usize, to: usize, size: usize },

    /// 適用すると文書が構造検証を通らなくなる
    #[error("Edit would produce invalid content: {0}")]
    InvalidContent(#[from] ContentError),
}

/// ライフサイクル固有のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Editor surface is already initialized")]
    AlreadyInitialized,

    #[error("Editor surface is not active")]
    NotActive,

    #[error("Editor surface has been destroyed")]
    Destroyed,
}

/// 設定固有のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// エラーの扱い区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    /// 安全なフォールバックがあり、ローカルで吸収できる
    Recoverable,
    /// 呼び出し元の契約違反。ホストのエラー経路へ伝播する
    Caller,
}

impl SyncError {
    pub fn level(&self) -> ErrorLevel {
        match self {
            SyncError::Content(_) => ErrorLevel::Recoverable,
            _ => ErrorLevel::Caller,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.level() == ErrorLevel::Recoverable
    }
}

/// 同期コア全体で使用するResult型
pub type Result<T> = std::result::Result<T, SyncError>;
