//! 文書モデル
//!
//! 外部表現（スナップショット / 平文）と編集面の内部表現の間の変換を提供

pub mod adapter;
pub mod editable;
pub mod schema;
pub mod selection;
pub mod snapshot;

// 公開API
pub use adapter::{
    normalize_initial_content, normalize_with_policy, try_normalize_initial_content,
    InitialContent, NormalizedContent,
};
pub use editable::EditableDocument;
pub use schema::{Block, DocumentTree, Inline, Mark, TextBlock, TextBlockKind};
pub use selection::{SelectionRange, TextPoint};
pub use snapshot::{ContentSnapshot, SnapshotMark, SnapshotNode};
