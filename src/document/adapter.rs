//! 文書モデルアダプタ
//!
//! 外部から渡される初期コンテンツ（平文 / スナップショット / 未指定）を
//! 編集面が初期化時に必要とする形へ正規化する純粋関数群

use crate::config::ValidationPolicy;
use crate::document::schema::DocumentTree;
use crate::document::snapshot::ContentSnapshot;
use crate::error::ContentError;
use serde_json::Value;

/// 外部から渡される初期コンテンツ
#[derive(Debug, Clone, PartialEq)]
pub enum InitialContent {
    /// 書式なしの平文
    PlainText(String),
    /// 構造化された文書スナップショット
    Structured(ContentSnapshot),
}

impl InitialContent {
    /// 型の緩いJSON値から変換（`null` は未指定）
    pub fn from_value(value: Value) -> Result<Option<Self>, ContentError> {
        match value {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(InitialContent::PlainText(text))),
            object @ Value::Object(_) => ContentSnapshot::from_value(object)
                .map(|snapshot| Some(InitialContent::Structured(snapshot))),
            other => Err(ContentError::Json {
                message: format!(
                    "expected string or document object, found {}",
                    json_kind(&other)
                ),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<&str> for InitialContent {
    fn from(text: &str) -> Self {
        InitialContent::PlainText(text.to_string())
    }
}

impl From<String> for InitialContent {
    fn from(text: String) -> Self {
        InitialContent::PlainText(text)
    }
}

impl From<ContentSnapshot> for InitialContent {
    fn from(snapshot: ContentSnapshot) -> Self {
        InitialContent::Structured(snapshot)
    }
}

/// 正規化済みの初期コンテンツ
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedContent {
    /// 空文書
    Empty,
    /// 平文（編集面が単一段落として扱う）
    PlainText(String),
    /// 検証済みの構造化文書
    Structured(DocumentTree),
}

impl NormalizedContent {
    /// 編集面が保持するツリーへ変換
    pub fn into_tree(self) -> DocumentTree {
        match self {
            NormalizedContent::Empty => DocumentTree::empty(),
            NormalizedContent::PlainText(text) => DocumentTree::from_plain_text(&text),
            NormalizedContent::Structured(tree) => tree,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, NormalizedContent::Empty)
    }
}

/// 厳格な正規化（検証失敗をそのまま返す）
pub fn try_normalize_initial_content(
    input: Option<&InitialContent>,
) -> Result<NormalizedContent, ContentError> {
    match input {
        None => Ok(NormalizedContent::Empty),
        Some(InitialContent::PlainText(text)) if text.is_empty() => Ok(NormalizedContent::Empty),
        Some(InitialContent::PlainText(text)) => Ok(NormalizedContent::PlainText(text.clone())),
        Some(InitialContent::Structured(snapshot)) => {
            DocumentTree::from_snapshot(snapshot).map(NormalizedContent::Structured)
        }
    }
}

/// 初期コンテンツを正規化する
///
/// 検証に失敗したスナップショットは空文書へフォールバックし、警告をログに残す
pub fn normalize_initial_content(input: Option<&InitialContent>) -> NormalizedContent {
    fall_back_to_empty(try_normalize_initial_content(input), |_| {})
}

/// 検証ポリシーに従って正規化
///
/// `Lenient` では失敗を空文書に置き換え、置き換えのたびに `on_fallback` を呼ぶ。
/// `Strict` では検証エラーをそのまま返す
pub fn normalize_with_policy<F>(
    input: Option<&InitialContent>,
    policy: ValidationPolicy,
    on_fallback: F,
) -> Result<NormalizedContent, ContentError>
where
    F: FnOnce(&ContentError),
{
    let normalized = try_normalize_initial_content(input);
    match policy {
        ValidationPolicy::Lenient => Ok(fall_back_to_empty(normalized, on_fallback)),
        ValidationPolicy::Strict => normalized,
    }
}

fn fall_back_to_empty<F>(
    normalized: Result<NormalizedContent, ContentError>,
    on_fallback: F,
) -> NormalizedContent
where
    F: FnOnce(&ContentError),
{
    normalized.unwrap_or_else(|err| {
        log::warn!("Content failed validation, using empty document: {}", err);
        on_fallback(&err);
        NormalizedContent::Empty
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::snapshot::SnapshotNode;
    use serde_json::json;

    #[test]
    fn absent_and_empty_inputs_yield_empty_document() {
        assert_eq!(normalize_initial_content(None), NormalizedContent::Empty);
        assert_eq!(
            normalize_initial_content(Some(&InitialContent::from(""))),
            NormalizedContent::Empty
        );
    }

    #[test]
    fn strings_are_wrapped_as_is() {
        let content = normalize_initial_content(Some(&"Hello".into()));
        assert_eq!(content, NormalizedContent::PlainText("Hello".to_string()));
        assert_eq!(content.into_tree().text_content(), "Hello");
    }

    #[test]
    fn snapshots_pass_through() {
        let snapshot = ContentSnapshot::doc(vec![SnapshotNode::paragraph("Hi")]);
        let content = normalize_initial_content(Some(&snapshot.clone().into()));
        match content {
            NormalizedContent::Structured(tree) => assert_eq!(tree.to_snapshot(), snapshot),
            other => panic!("unexpected normalization: {:?}", other),
        }
    }

    #[test]
    fn malformed_snapshot_falls_back_to_empty() {
        let broken = ContentSnapshot::from_root(SnapshotNode::new("paragraph"));
        let input = InitialContent::Structured(broken);
        assert_eq!(normalize_initial_content(Some(&input)), NormalizedContent::Empty);
        assert!(try_normalize_initial_content(Some(&input)).is_err());
        assert!(normalize_with_policy(Some(&input), ValidationPolicy::Strict, |_| {}).is_err());

        let mut reported = None;
        let lenient = normalize_with_policy(Some(&input), ValidationPolicy::Lenient, |err| {
            reported = Some(err.clone());
        });
        assert_eq!(lenient.unwrap(), NormalizedContent::Empty);
        assert!(matches!(reported, Some(ContentError::RootNotDoc { .. })));
    }

    #[test]
    fn valid_content_never_reports_fallback() {
        let mut called = false;
        let content =
            normalize_with_policy(Some(&"fine".into()), ValidationPolicy::Lenient, |_| {
                called = true;
            })
            .unwrap();
        assert_eq!(content, NormalizedContent::PlainText("fine".to_string()));
        assert!(!called);
    }

    #[test]
    fn normalization_is_referentially_transparent() {
        let input = InitialContent::from("same");
        assert_eq!(
            normalize_initial_content(Some(&input)),
            normalize_initial_content(Some(&input))
        );
    }

    #[test]
    fn loose_json_values_become_tagged_content() {
        assert_eq!(InitialContent::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            InitialContent::from_value(json!("text")).unwrap(),
            Some(InitialContent::PlainText("text".to_string()))
        );
        let structured = InitialContent::from_value(json!({"type": "doc", "content": []})).unwrap();
        assert!(matches!(structured, Some(InitialContent::Structured(_))));
        assert!(InitialContent::from_value(json!(42)).is_err());
    }
}
