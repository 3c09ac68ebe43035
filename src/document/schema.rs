//! 文書スキーマ
//!
//! スナップショットを型付きの文書ツリーへ変換し、構造検証と位置計算を提供

use crate::document::selection::TextPoint;
use crate::document::snapshot::{ContentSnapshot, SnapshotMark, SnapshotNode};
use crate::error::ContentError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// インライン書式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Link { href: String, target: Option<String> },
    Bold,
    Italic,
    Strike,
    Underline,
    Code,
}

impl Mark {
    /// 正規順序（スナップショット上の並び順）
    pub fn rank(&self) -> u8 {
        match self {
            Mark::Link { .. } => 0,
            Mark::Bold => 1,
            Mark::Italic => 2,
            Mark::Strike => 3,
            Mark::Underline => 4,
            Mark::Code => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mark::Link { .. } => "link",
            Mark::Bold => "bold",
            Mark::Italic => "italic",
            Mark::Strike => "strike",
            Mark::Underline => "underline",
            Mark::Code => "code",
        }
    }

    pub fn link(href: impl Into<String>) -> Self {
        Mark::Link {
            href: href.into(),
            target: None,
        }
    }

    pub fn same_type(&self, other: &Mark) -> bool {
        self.rank() == other.rank()
    }

    /// 文書へ適用できる書式か（リンクは許可されたスキームのみ）
    pub fn validate(&self) -> Result<(), ContentError> {
        match self {
            Mark::Link { href, .. } if !is_allowed_href(href) => {
                Err(invalid_attr("link", "href", "unsupported URL scheme"))
            }
            _ => Ok(()),
        }
    }

    fn from_snapshot(mark: &SnapshotMark) -> Result<Self, ContentError> {
        match mark.kind.as_str() {
            "bold" => Ok(Mark::Bold),
            "italic" => Ok(Mark::Italic),
            "strike" => Ok(Mark::Strike),
            "underline" => Ok(Mark::Underline),
            "code" => Ok(Mark::Code),
            "link" => {
                let href = match mark.attr("href") {
                    Some(Value::String(href)) => href.clone(),
                    _ => return Err(invalid_attr("link", "href", "must be a string")),
                };
                let target = optional_string(mark.attr("target"), "link", "target")?;
                let link = Mark::Link { href, target };
                link.validate()?;
                Ok(link)
            }
            other => Err(ContentError::UnknownMark {
                kind: other.to_string(),
            }),
        }
    }

    fn to_snapshot(&self) -> SnapshotMark {
        match self {
            Mark::Link { href, target } => {
                let mut mark = SnapshotMark::link(href.clone());
                if let (Some(attrs), Some(target)) = (mark.attrs.as_mut(), target) {
                    attrs.insert("target".to_string(), Value::String(target.clone()));
                }
                mark
            }
            other => SnapshotMark::new(other.name()),
        }
    }
}

/// 相対参照、または許可されたスキームのみ受け付ける
fn is_allowed_href(href: &str) -> bool {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    let scheme = SCHEME.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("scheme pattern is valid")
    });

    let href = href.trim();
    if href.is_empty() {
        return false;
    }
    match scheme.captures(href) {
        Some(caps) => matches!(
            caps[1].to_ascii_lowercase().as_str(),
            "http" | "https" | "mailto" | "tel"
        ),
        None => true,
    }
}

/// インラインノード
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text { text: String, marks: Vec<Mark> },
    HardBreak,
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    /// 位置空間上の幅（文字数、改行は1）
    pub fn size(&self) -> usize {
        match self {
            Inline::Text { text, .. } => text.chars().count(),
            Inline::HardBreak => 1,
        }
    }
}

pub const MAX_HEADING_LEVEL: u8 = 6;

/// テキストブロックの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextBlockKind {
    Paragraph,
    Heading { level: u8 },
    CodeBlock { language: Option<String> },
}

impl TextBlockKind {
    /// 見出しレベルは 1..=6
    pub fn heading(level: u8) -> Result<Self, ContentError> {
        if (1..=MAX_HEADING_LEVEL).contains(&level) {
            Ok(TextBlockKind::Heading { level })
        } else {
            Err(invalid_heading_level())
        }
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        match self {
            TextBlockKind::Heading { level } => Self::heading(*level).map(|_| ()),
            _ => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextBlockKind::Paragraph => "paragraph",
            TextBlockKind::Heading { .. } => "heading",
            TextBlockKind::CodeBlock { .. } => "codeBlock",
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, TextBlockKind::CodeBlock { .. })
    }
}

/// インラインを直接保持するブロック
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub kind: TextBlockKind,
    pub inlines: Vec<Inline>,
}

impl TextBlock {
    pub fn new(kind: TextBlockKind, inlines: Vec<Inline>) -> Self {
        Self { kind, inlines }
    }

    pub fn paragraph(inlines: Vec<Inline>) -> Self {
        Self::new(TextBlockKind::Paragraph, inlines)
    }

    pub fn content_size(&self) -> usize {
        self.inlines.iter().map(Inline::size).sum()
    }

    pub fn text(&self) -> String {
        self.inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text { text, .. } => text.as_str(),
                Inline::HardBreak => "\n",
            })
            .collect()
    }
}

/// ブロックノード
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(TextBlock),
    Blockquote(Vec<Block>),
    BulletList(Vec<Block>),
    OrderedList { start: u32, items: Vec<Block> },
    ListItem(Vec<Block>),
    Image {
        src: String,
        alt: Option<String>,
        title: Option<String>,
    },
    HorizontalRule,
}

impl Block {
    /// 位置空間上の幅（開始・終了トークンを含む）
    pub fn size(&self) -> usize {
        match self {
            Block::Text(block) => block.content_size() + 2,
            Block::Image { .. } | Block::HorizontalRule => 1,
            other => other.children().map_or(0, |children| {
                children.iter().map(Block::size).sum::<usize>() + 2
            }),
        }
    }

    pub fn children(&self) -> Option<&[Block]> {
        match self {
            Block::Blockquote(children)
            | Block::BulletList(children)
            | Block::ListItem(children)
            | Block::OrderedList {
                items: children, ..
            } => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match self {
            Block::Blockquote(children)
            | Block::BulletList(children)
            | Block::ListItem(children)
            | Block::OrderedList {
                items: children, ..
            } => Some(children),
            _ => None,
        }
    }

    pub fn as_text_block(&self) -> Option<&TextBlock> {
        match self {
            Block::Text(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_text_block_mut(&mut self) -> Option<&mut TextBlock> {
        match self {
            Block::Text(block) => Some(block),
            _ => None,
        }
    }
}

/// 検証済みの型付き文書ツリー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    blocks: Vec<Block>,
}

impl DocumentTree {
    /// 空の段落1つだけの文書
    pub fn empty() -> Self {
        Self {
            blocks: vec![Block::Text(TextBlock::paragraph(Vec::new()))],
        }
    }

    /// 平文を書式なしの単一段落として扱う（改行はハードブレーク）
    pub fn from_plain_text(text: &str) -> Self {
        Self {
            blocks: vec![Block::Text(TextBlock::paragraph(inlines_from_text(text, &[])))],
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            Self::empty()
        } else {
            Self { blocks }
        }
    }

    /// スナップショットを構造検証しつつ型付きツリーへ変換
    pub fn from_snapshot(snapshot: &ContentSnapshot) -> Result<Self, ContentError> {
        let root = snapshot.root();
        if root.kind != "doc" {
            return Err(ContentError::RootNotDoc {
                found: root.kind.clone(),
            });
        }
        let blocks = parse_blocks("doc", root.children())?;
        Ok(Self::from_blocks(blocks))
    }

    pub fn to_snapshot(&self) -> ContentSnapshot {
        ContentSnapshot::doc(self.blocks.iter().map(block_to_snapshot).collect())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn content_size(&self) -> usize {
        self.blocks.iter().map(Block::size).sum()
    }

    /// 空の段落1つだけかどうか（プレースホルダー表示判定）
    pub fn is_empty(&self) -> bool {
        match self.blocks.as_slice() {
            [Block::Text(TextBlock {
                kind: TextBlockKind::Paragraph,
                inlines,
            })] => inlines.is_empty(),
            _ => false,
        }
    }

    /// テキストブロックごとに改行で連結した平文
    pub fn text_content(&self) -> String {
        let mut lines = Vec::new();
        collect_text(&self.blocks, &mut lines);
        lines.join("\n")
    }

    /// 絶対位置をテキストブロック内の位置へ解決
    pub fn resolve(&self, pos: usize) -> Option<TextPoint> {
        let mut path = Vec::new();
        resolve_in(&self.blocks, pos, 0, &mut path).map(|offset| TextPoint::new(path, offset))
    }

    /// テキストブロック内の位置を絶対位置へ変換
    pub fn position_of(&self, point: &TextPoint) -> Option<usize> {
        let (last, parents) = point.path.split_last()?;
        let mut blocks = self.blocks.as_slice();
        let mut pos = 0;
        for &index in parents {
            pos += blocks.get(..index)?.iter().map(Block::size).sum::<usize>() + 1;
            blocks = blocks.get(index)?.children()?;
        }
        pos += blocks.get(..*last)?.iter().map(Block::size).sum::<usize>() + 1;
        let block = blocks.get(*last)?.as_text_block()?;
        (point.offset <= block.content_size()).then_some(pos + point.offset)
    }

    /// 文書先頭のカーソル位置（既定の配置）
    pub fn first_text_position(&self) -> Option<usize> {
        let mut path = Vec::new();
        if first_text_path(&self.blocks, &mut path) {
            self.position_of(&TextPoint::new(path, 0))
        } else {
            None
        }
    }

    pub fn text_block(&self, path: &[usize]) -> Option<&TextBlock> {
        self.block_at(path)?.as_text_block()
    }

    fn block_at(&self, path: &[usize]) -> Option<&Block> {
        let (first, rest) = path.split_first()?;
        let mut block = self.blocks.get(*first)?;
        for &index in rest {
            block = block.children()?.get(index)?;
        }
        Some(block)
    }

    /// リスト項目の先頭ブロックは段落でなければならない
    pub(crate) fn requires_paragraph(&self, path: &[usize]) -> bool {
        match path.split_last() {
            Some((0, parent)) if !parent.is_empty() => {
                matches!(self.block_at(parent), Some(Block::ListItem(_)))
            }
            _ => false,
        }
    }

    pub(crate) fn text_block_mut(&mut self, path: &[usize]) -> Option<&mut TextBlock> {
        block_at_mut(&mut self.blocks, path)?.as_text_block_mut()
    }

    /// 親パスが指す兄弟リスト（空パスはルート）
    pub(crate) fn siblings_mut(&mut self, parent: &[usize]) -> Option<&mut Vec<Block>> {
        if parent.is_empty() {
            Some(&mut self.blocks)
        } else {
            block_at_mut(&mut self.blocks, parent)?.children_mut()
        }
    }
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<&ContentSnapshot> for DocumentTree {
    type Error = ContentError;

    fn try_from(snapshot: &ContentSnapshot) -> Result<Self, Self::Error> {
        Self::from_snapshot(snapshot)
    }
}

fn block_at_mut<'a>(blocks: &'a mut Vec<Block>, path: &[usize]) -> Option<&'a mut Block> {
    let (first, rest) = path.split_first()?;
    let block = blocks.get_mut(*first)?;
    if rest.is_empty() {
        Some(block)
    } else {
        block_at_mut(block.children_mut()?, rest)
    }
}

fn resolve_in(blocks: &[Block], pos: usize, start: usize, path: &mut Vec<usize>) -> Option<usize> {
    let mut cursor = start;
    for (index, block) in blocks.iter().enumerate() {
        let size = block.size();
        if pos > cursor && pos < cursor + size {
            path.push(index);
            return match block {
                Block::Text(_) => Some(pos - cursor - 1),
                other => {
                    let children = other.children()?;
                    let offset = resolve_in(children, pos, cursor + 1, path);
                    if offset.is_none() {
                        path.pop();
                    }
                    offset
                }
            };
        }
        cursor += size;
    }
    None
}

fn first_text_path(blocks: &[Block], path: &mut Vec<usize>) -> bool {
    for (index, block) in blocks.iter().enumerate() {
        path.push(index);
        match block {
            Block::Text(_) => return true,
            other => {
                if let Some(children) = other.children() {
                    if first_text_path(children, path) {
                        return true;
                    }
                }
            }
        }
        path.pop();
    }
    false
}

fn collect_text(blocks: &[Block], lines: &mut Vec<String>) {
    for block in blocks {
        match block {
            Block::Text(text_block) => lines.push(text_block.text()),
            other => {
                if let Some(children) = other.children() {
                    collect_text(children, lines);
                }
            }
        }
    }
}

/// 改行をハードブレークに変換したインライン列
pub(crate) fn inlines_from_text(text: &str, marks: &[Mark]) -> Vec<Inline> {
    let mut inlines = Vec::new();
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            inlines.push(Inline::HardBreak);
        }
        inlines.push(Inline::Text {
            text: line.to_string(),
            marks: marks.to_vec(),
        });
    }
    normalize_inlines(&mut inlines);
    inlines
}

/// 空テキストを除去し、同じ書式の隣接テキストを結合
pub(crate) fn normalize_inlines(inlines: &mut Vec<Inline>) {
    let mut merged: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines.drain(..) {
        if let Inline::Text { text, .. } = &inline {
            if text.is_empty() {
                continue;
            }
        }
        if let (
            Some(Inline::Text {
                text: prev,
                marks: prev_marks,
            }),
            Inline::Text { text, marks },
        ) = (merged.last_mut(), &inline)
        {
            if prev_marks == marks {
                prev.push_str(text);
                continue;
            }
        }
        merged.push(inline);
    }
    *inlines = merged;
}

fn invalid_attr(node: &str, attr: &str, reason: &str) -> ContentError {
    ContentError::InvalidAttr {
        node: node.to_string(),
        attr: attr.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_heading_level() -> ContentError {
    invalid_attr("heading", "level", "must be an integer in 1..=6")
}

fn optional_string(
    value: Option<&Value>,
    node: &str,
    attr: &str,
) -> Result<Option<String>, ContentError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(invalid_attr(node, attr, "must be a string or null")),
    }
}

fn unexpected(parent: &str, child: &str) -> ContentError {
    ContentError::UnexpectedChild {
        parent: parent.to_string(),
        child: child.to_string(),
    }
}

fn parse_blocks(parent: &str, nodes: &[SnapshotNode]) -> Result<Vec<Block>, ContentError> {
    nodes.iter().map(|node| parse_block(parent, node)).collect()
}

fn parse_block(parent: &str, node: &SnapshotNode) -> Result<Block, ContentError> {
    match node.kind.as_str() {
        "paragraph" => Ok(Block::Text(TextBlock::paragraph(parse_inlines(node, false)?))),
        "heading" => {
            let kind = match node.attr("level") {
                None | Some(Value::Null) => TextBlockKind::Heading { level: 1 },
                Some(value) => value
                    .as_u64()
                    .and_then(|level| u8::try_from(level).ok())
                    .ok_or_else(invalid_heading_level)
                    .and_then(TextBlockKind::heading)?,
            };
            Ok(Block::Text(TextBlock::new(kind, parse_inlines(node, false)?)))
        }
        "codeBlock" => {
            let language = optional_string(node.attr("language"), "codeBlock", "language")?;
            Ok(Block::Text(TextBlock::new(
                TextBlockKind::CodeBlock { language },
                parse_inlines(node, true)?,
            )))
        }
        "blockquote" => Ok(Block::Blockquote(parse_container(node)?)),
        "bulletList" => Ok(Block::BulletList(parse_list_items(node)?)),
        "orderedList" => {
            let start = match node.attr("start") {
                None | Some(Value::Null) => 1,
                Some(value) => value
                    .as_u64()
                    .and_then(|start| u32::try_from(start).ok())
                    .ok_or_else(|| {
                        invalid_attr("orderedList", "start", "must be a non-negative integer")
                    })?,
            };
            Ok(Block::OrderedList {
                start,
                items: parse_list_items(node)?,
            })
        }
        "image" => {
            let src = match node.attr("src") {
                Some(Value::String(src)) if !src.trim().is_empty() => src.clone(),
                _ => return Err(invalid_attr("image", "src", "must be a non-empty string")),
            };
            Ok(Block::Image {
                src,
                alt: optional_string(node.attr("alt"), "image", "alt")?,
                title: optional_string(node.attr("title"), "image", "title")?,
            })
        }
        "horizontalRule" => Ok(Block::HorizontalRule),
        "text" | "hardBreak" | "listItem" | "doc" => Err(unexpected(parent, &node.kind)),
        other => Err(ContentError::UnknownNode {
            kind: other.to_string(),
        }),
    }
}

fn parse_container(node: &SnapshotNode) -> Result<Vec<Block>, ContentError> {
    if node.children().is_empty() {
        return Err(ContentError::EmptyContainer {
            node: node.kind.clone(),
        });
    }
    parse_blocks(&node.kind, node.children())
}

fn parse_list_items(list: &SnapshotNode) -> Result<Vec<Block>, ContentError> {
    if list.children().is_empty() {
        return Err(ContentError::EmptyContainer {
            node: list.kind.clone(),
        });
    }
    list.children()
        .iter()
        .map(|item| {
            if item.kind != "listItem" {
                return Err(unexpected(&list.kind, &item.kind));
            }
            match item.children().first() {
                Some(first) if first.kind == "paragraph" => {}
                Some(first) => return Err(unexpected("listItem", &first.kind)),
                None => {
                    return Err(ContentError::EmptyContainer {
                        node: "listItem".to_string(),
                    })
                }
            }
            Ok(Block::ListItem(parse_blocks("listItem", item.children())?))
        })
        .collect()
}

fn parse_inlines(node: &SnapshotNode, code: bool) -> Result<Vec<Inline>, ContentError> {
    let mut inlines = Vec::with_capacity(node.children().len());
    for child in node.children() {
        match child.kind.as_str() {
            "text" => {
                let text = child.text.as_ref().ok_or(ContentError::MissingText)?;
                if text.is_empty() {
                    return Err(ContentError::EmptyText);
                }
                let marks = parse_marks(child, &node.kind, code)?;
                inlines.push(Inline::Text {
                    text: text.clone(),
                    marks,
                });
            }
            "hardBreak" if !code => inlines.push(Inline::HardBreak),
            "hardBreak" | "paragraph" | "heading" | "codeBlock" | "blockquote" | "bulletList"
            | "orderedList" | "listItem" | "image" | "horizontalRule" | "doc" => {
                return Err(unexpected(&node.kind, &child.kind))
            }
            other => {
                return Err(ContentError::UnknownNode {
                    kind: other.to_string(),
                })
            }
        }
    }
    normalize_inlines(&mut inlines);
    Ok(inlines)
}

fn parse_marks(text: &SnapshotNode, parent: &str, code: bool) -> Result<Vec<Mark>, ContentError> {
    let mut marks: Vec<Mark> = Vec::new();
    for raw in text.marks.as_deref().unwrap_or(&[]) {
        let mark = Mark::from_snapshot(raw)?;
        if code {
            return Err(ContentError::MarkNotAllowed {
                node: parent.to_string(),
                mark: mark.name().to_string(),
            });
        }
        if marks.iter().any(|existing| existing.same_type(&mark)) {
            return Err(ContentError::DuplicateMark {
                mark: mark.name().to_string(),
            });
        }
        marks.push(mark);
    }
    marks.sort_by_key(Mark::rank);
    Ok(marks)
}

fn inline_to_snapshot(inline: &Inline) -> SnapshotNode {
    match inline {
        Inline::Text { text, marks } => {
            let node = SnapshotNode::text(text.clone());
            if marks.is_empty() {
                node
            } else {
                node.with_marks(marks.iter().map(Mark::to_snapshot).collect())
            }
        }
        Inline::HardBreak => SnapshotNode::new("hardBreak"),
    }
}

fn optional_value(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::String)
}

fn block_to_snapshot(block: &Block) -> SnapshotNode {
    let with_children = |kind: &str, children: &[Block]| {
        SnapshotNode::new(kind).with_content(children.iter().map(block_to_snapshot).collect())
    };

    match block {
        Block::Text(text_block) => {
            let mut node = SnapshotNode::new(text_block.kind.name());
            match &text_block.kind {
                TextBlockKind::Paragraph => {}
                TextBlockKind::Heading { level } => {
                    node = node.with_attr("level", Value::from(*level));
                }
                TextBlockKind::CodeBlock { language } => {
                    node = node.with_attr("language", optional_value(language));
                }
            }
            if !text_block.inlines.is_empty() {
                let inlines = text_block.inlines.iter().map(inline_to_snapshot).collect();
                node = node.with_content(inlines);
            }
            node
        }
        Block::Blockquote(children) => with_children("blockquote", children),
        Block::BulletList(items) => with_children("bulletList", items),
        Block::ListItem(children) => with_children("listItem", children),
        Block::OrderedList { start, items } => {
            with_children("orderedList", items).with_attr("start", Value::from(*start))
        }
        Block::Image { src, alt, title } => SnapshotNode::new("image")
            .with_attr("src", Value::String(src.clone()))
            .with_attr("alt", optional_value(alt))
            .with_attr("title", optional_value(title)),
        Block::HorizontalRule => SnapshotNode::new("horizontalRule"),
    }
}
