//! コンテンツスナップショット
//!
//! 外部とやり取りする不変・シリアライズ可能な文書ツリー（`{"type":"doc", ...}` 形式）

use crate::error::ContentError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// スナップショットの単一ノード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<SnapshotNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<SnapshotMark>>,
}

/// インライン書式（bold / italic / link など）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMark {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

impl SnapshotNode {
    /// 属性・子を持たないノードを作成
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: None,
            content: None,
            text: None,
            marks: None,
        }
    }

    pub fn with_content(mut self, content: Vec<SnapshotNode>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attrs
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn with_marks(mut self, marks: Vec<SnapshotMark>) -> Self {
        self.marks = Some(marks);
        self
    }

    /// テキストノード
    pub fn text(text: impl Into<String>) -> Self {
        let mut node = Self::new("text");
        node.text = Some(text.into());
        node
    }

    /// 書式なしテキスト1つだけの段落
    pub fn paragraph(text: impl Into<String>) -> Self {
        let text = text.into();
        let node = Self::new("paragraph");
        if text.is_empty() {
            node
        } else {
            node.with_content(vec![Self::text(text)])
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::new("heading")
            .with_attr("level", Value::from(level))
            .with_content(vec![Self::text(text)])
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.as_ref().and_then(|attrs| attrs.get(key))
    }

    pub fn children(&self) -> &[SnapshotNode] {
        self.content.as_deref().unwrap_or(&[])
    }
}

impl SnapshotMark {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: None,
        }
    }

    pub fn link(href: impl Into<String>) -> Self {
        let mut attrs = Map::new();
        attrs.insert("href".to_string(), Value::String(href.into()));
        attrs.insert("target".to_string(), Value::Null);
        Self {
            kind: "link".to_string(),
            attrs: Some(attrs),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.as_ref().and_then(|attrs| attrs.get(key))
    }
}

/// 文書全体のスナップショット（ルートは `doc` ノード）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentSnapshot {
    root: SnapshotNode,
}

impl ContentSnapshot {
    /// ルートノードから作成（構造検証はアダプタ側で行う）
    pub fn from_root(root: SnapshotNode) -> Self {
        Self { root }
    }

    /// `doc` ノードで子を包む
    pub fn doc(children: Vec<SnapshotNode>) -> Self {
        Self::from_root(SnapshotNode::new("doc").with_content(children))
    }

    pub fn root(&self) -> &SnapshotNode {
        &self.root
    }

    pub fn into_root(self) -> SnapshotNode {
        self.root
    }

    pub fn from_json_str(json: &str) -> Result<Self, ContentError> {
        serde_json::from_str(json).map_err(|err| ContentError::Json {
            message: err.to_string(),
        })
    }

    pub fn from_value(value: Value) -> Result<Self, ContentError> {
        serde_json::from_value(value).map_err(|err| ContentError::Json {
            message: err.to_string(),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
