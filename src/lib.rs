//! richtext-sync - リッチテキスト記事エディタのコンテンツ同期コア
//!
//! 初期コンテンツの正規化、デバウンス付きの変更通知、外部コンテンツの調停を提供

// コアモジュール
pub mod config;
pub mod error;
pub mod logging;

// データ層
pub mod document;

// 同期層
pub mod sync;

// 編集面
pub mod editor;

// 公開API
pub use config::{SyncConfig, SyncOverrides, ValidationPolicy};
pub use document::{
    normalize_initial_content, normalize_with_policy, try_normalize_initial_content,
    ContentSnapshot, DocumentTree, EditableDocument, InitialContent, Mark, NormalizedContent,
    SelectionRange, SnapshotMark, SnapshotNode, TextBlockKind,
};
pub use editor::{ArticleEditor, EditorProps};
pub use error::{
    ConfigError, ContentError, EditError, ErrorLevel, LifecycleError, Result, SyncError,
};
pub use logging::SyncTraceLogger;
pub use sync::{
    ChangeSyncController, ContentChangeListener, ExternalContentReconciler, LifecycleState,
    ReconcileOutcome,
};
