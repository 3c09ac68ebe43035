//! 編集可能文書
//!
//! 編集面が保持する可変の文書モデル。選択範囲・保留中の書式・リビジョンを管理し、
//! ローカル編集操作（文字入力、改行、削除、書式切り替え）を提供する

use crate::document::adapter::NormalizedContent;
use crate::document::schema::{
    inlines_from_text, normalize_inlines, Block, DocumentTree, Inline, Mark, TextBlock,
    TextBlockKind,
};
use crate::document::selection::{SelectionRange, TextPoint};
use crate::document::snapshot::ContentSnapshot;
use crate::error::EditError;

/// 編集面が保持する文書
#[derive(Debug, Clone)]
pub struct EditableDocument {
    /// 文書ツリー
    tree: DocumentTree,
    /// 現在の選択範囲
    selection: SelectionRange,
    /// 次の入力に適用する書式（カーソル位置での書式切り替え）
    stored_marks: Option<Vec<Mark>>,
    /// 内容変更ごとに増加するリビジョン
    revision: u64,
}

impl EditableDocument {
    /// 正規化済みコンテンツから作成
    pub fn new(content: NormalizedContent) -> Self {
        Self::from_tree(content.into_tree())
    }

    pub fn from_tree(tree: DocumentTree) -> Self {
        let mut document = Self {
            tree,
            selection: SelectionRange::default(),
            stored_marks: None,
            revision: 0,
        };
        document.selection = document.default_selection();
        document
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    /// 文書全体のスナップショット
    pub fn to_snapshot(&self) -> ContentSnapshot {
        self.tree.to_snapshot()
    }

    pub fn selection(&self) -> SelectionRange {
        self.selection
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn content_size(&self) -> usize {
        self.tree.content_size()
    }

    pub fn text_content(&self) -> String {
        self.tree.text_content()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// 既定のカーソル配置（文書先頭のテキスト位置）
    pub fn default_selection(&self) -> SelectionRange {
        SelectionRange::cursor(self.tree.first_text_position().unwrap_or(0))
    }

    /// 選択範囲を設定（両端がテキストブロック内である必要がある）
    pub fn set_selection(&mut self, range: SelectionRange) -> Result<(), EditError> {
        if self.tree.resolve(range.from).is_none() || self.tree.resolve(range.to).is_none() {
            return Err(EditError::InvalidSelection {
                from: range.from,
                to: range.to,
                size: self.content_size(),
            });
        }
        self.selection = range;
        self.stored_marks = None;
        Ok(())
    }

    /// 選択範囲の復元を試みる。解決できなければ現在の配置のまま `false`
    pub fn try_restore_selection(&mut self, range: SelectionRange) -> bool {
        self.set_selection(range).is_ok()
    }

    /// 内容をその場で置き換える（インスタンスは作り直さない）
    pub(crate) fn replace_tree(&mut self, tree: DocumentTree) {
        self.tree = tree;
        self.selection = self.default_selection();
        self.stored_marks = None;
        self.touch();
    }

    /// カーソル位置で有効な書式
    pub fn active_marks(&self) -> Vec<Mark> {
        if let Some(marks) = &self.stored_marks {
            return marks.clone();
        }
        self.tree
            .resolve(self.selection.from)
            .and_then(|point| {
                self.tree
                    .text_block(&point.path)
                    .map(|block| marks_before(&block.inlines, point.offset))
            })
            .unwrap_or_default()
    }

    /// 選択範囲を置き換えてテキストを挿入
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditError> {
        if text.is_empty() {
            return Ok(());
        }
        if !self.selection.is_collapsed() {
            self.delete_selection()?;
        }

        let pos = self.selection.from;
        let point = self.resolve_point(pos)?;
        let block = self
            .tree
            .text_block_mut(&point.path)
            .ok_or(EditError::NotInTextBlock { pos })?;

        let inserted = if block.kind.is_code() {
            vec![Inline::text(text)]
        } else {
            let marks = match self.stored_marks.take() {
                Some(marks) => marks,
                None => marks_before(&block.inlines, point.offset),
            };
            inlines_from_text(text, &marks)
        };
        let size: usize = inserted.iter().map(Inline::size).sum();

        let index = split_inlines_at(&mut block.inlines, point.offset);
        block.inlines.splice(index..index, inserted);
        normalize_inlines(&mut block.inlines);

        self.selection = SelectionRange::cursor(pos + size);
        self.touch();
        Ok(())
    }

    /// ハードブレーク（コードブロック内では改行文字）を挿入
    pub fn insert_hard_break(&mut self) -> Result<(), EditError> {
        self.insert_text("\n")
    }

    /// カーソル位置でテキストブロックを分割
    pub fn split_block(&mut self) -> Result<(), EditError> {
        if !self.selection.is_collapsed() {
            self.delete_selection()?;
        }

        let pos = self.selection.from;
        let point = self.resolve_point(pos)?;
        if self
            .tree
            .text_block(&point.path)
            .is_some_and(|block| block.kind.is_code())
        {
            return self.insert_text("\n");
        }

        let parent = point.parent().to_vec();
        let index = point.index();
        let siblings = self
            .tree
            .siblings_mut(&parent)
            .ok_or(EditError::NotInTextBlock { pos })?;
        let block = siblings
            .get_mut(index)
            .and_then(Block::as_text_block_mut)
            .ok_or(EditError::NotInTextBlock { pos })?;

        let at_end = point.offset == block.content_size();
        let split = split_inlines_at(&mut block.inlines, point.offset);
        let tail = block.inlines.split_off(split);
        // 見出し末尾での分割は段落を続ける
        let kind = match &block.kind {
            TextBlockKind::Heading { .. } if at_end => TextBlockKind::Paragraph,
            other => other.clone(),
        };
        siblings.insert(index + 1, Block::Text(TextBlock::new(kind, tail)));

        let mut path = parent;
        path.push(index + 1);
        self.place_cursor(TextPoint::new(path, 0));
        self.stored_marks = None;
        self.touch();
        Ok(())
    }

    /// Backspace 相当の削除。何も変わらなければ `false`
    pub fn delete_backward(&mut self) -> Result<bool, EditError> {
        if !self.selection.is_collapsed() {
            return self.delete_selection();
        }

        let pos = self.selection.from;
        let point = self.resolve_point(pos)?;
        if point.offset > 0 {
            self.delete_range(pos - 1, pos)?;
            return Ok(true);
        }
        Ok(self.join_backward(&point))
    }

    /// 選択範囲を削除
    pub fn delete_selection(&mut self) -> Result<bool, EditError> {
        let SelectionRange { from, to } = self.selection;
        if from == to {
            return Ok(false);
        }
        self.delete_range(from, to)?;
        Ok(true)
    }

    /// 選択範囲の書式を切り替える。カーソルのみなら次の入力の書式を切り替える
    pub fn toggle_mark(&mut self, mark: Mark) -> Result<bool, EditError> {
        mark.validate()?;
        let SelectionRange { from, to } = self.selection;
        let start = self.resolve_point(from)?;
        let in_code = match self.tree.text_block(&start.path) {
            Some(block) => block.kind.is_code(),
            None => true,
        };
        if in_code {
            return Ok(false);
        }

        if from == to {
            let mut marks = self.active_marks();
            if let Some(existing) = marks.iter().position(|active| active == &mark) {
                marks.remove(existing);
            } else {
                marks.retain(|active| !active.same_type(&mark));
                marks.push(mark);
                marks.sort_by_key(Mark::rank);
            }
            self.stored_marks = Some(marks);
            return Ok(true);
        }

        let end = self.resolve_point(to)?;
        if !start.same_block(&end) {
            return Err(EditError::CrossBlockRange { from, to });
        }
        let block = self
            .tree
            .text_block_mut(&start.path)
            .ok_or(EditError::NotInTextBlock { pos: from })?;

        let first = split_inlines_at(&mut block.inlines, start.offset);
        let last = split_inlines_at(&mut block.inlines, end.offset);
        let all_marked = block.inlines[first..last].iter().all(|inline| match inline {
            Inline::Text { marks, .. } => marks.contains(&mark),
            Inline::HardBreak => true,
        });
        for inline in &mut block.inlines[first..last] {
            if let Inline::Text { marks, .. } = inline {
                marks.retain(|existing| !existing.same_type(&mark));
                if !all_marked {
                    marks.push(mark.clone());
                    marks.sort_by_key(Mark::rank);
                }
            }
        }
        normalize_inlines(&mut block.inlines);
        self.touch();
        Ok(true)
    }

    /// カーソルのあるテキストブロックの種類を変更
    ///
    /// リスト項目の先頭段落は段落のまま残し `false` を返す
    pub fn set_block_kind(&mut self, kind: TextBlockKind) -> Result<bool, EditError> {
        kind.validate()?;
        let pos = self.selection.from;
        let point = self.resolve_point(pos)?;
        if kind != TextBlockKind::Paragraph && self.tree.requires_paragraph(&point.path) {
            return Ok(false);
        }
        let block = self
            .tree
            .text_block_mut(&point.path)
            .ok_or(EditError::NotInTextBlock { pos })?;
        if block.kind == kind {
            return Ok(false);
        }

        let inlines = std::mem::take(&mut block.inlines);
        block.inlines = coerce_inlines(&kind, inlines);
        block.kind = kind;
        self.stored_marks = None;
        self.touch();
        Ok(true)
    }

    fn resolve_point(&self, pos: usize) -> Result<TextPoint, EditError> {
        self.tree
            .resolve(pos)
            .ok_or(EditError::NotInTextBlock { pos })
    }

    fn place_cursor(&mut self, point: TextPoint) {
        self.selection = match self.tree.position_of(&point) {
            Some(pos) => SelectionRange::cursor(pos),
            None => self.default_selection(),
        };
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// 同一ブロック内、または同じ親を持つテキストブロック間の範囲を削除
    fn delete_range(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        let start = self.resolve_point(from)?;
        let end = self.resolve_point(to)?;

        if start.same_block(&end) {
            let block = self
                .tree
                .text_block_mut(&start.path)
                .ok_or(EditError::NotInTextBlock { pos: from })?;
            let first = split_inlines_at(&mut block.inlines, start.offset);
            let last = split_inlines_at(&mut block.inlines, end.offset);
            block.inlines.drain(first..last);
            normalize_inlines(&mut block.inlines);
        } else if start.parent() == end.parent() {
            let (first, last) = (start.index(), end.index());
            let siblings = self
                .tree
                .siblings_mut(start.parent())
                .ok_or(EditError::CrossBlockRange { from, to })?;

            let tail = match siblings.get_mut(last).and_then(Block::as_text_block_mut) {
                Some(block) => {
                    let split = split_inlines_at(&mut block.inlines, end.offset);
                    block.inlines.split_off(split)
                }
                None => return Err(EditError::CrossBlockRange { from, to }),
            };
            siblings.drain(first + 1..=last);

            let head = siblings
                .get_mut(first)
                .and_then(Block::as_text_block_mut)
                .ok_or(EditError::CrossBlockRange { from, to })?;
            let split = split_inlines_at(&mut head.inlines, start.offset);
            head.inlines.truncate(split);
            let tail = coerce_inlines(&head.kind, tail);
            head.inlines.extend(tail);
            normalize_inlines(&mut head.inlines);
        } else {
            return Err(EditError::CrossBlockRange { from, to });
        }

        self.selection = SelectionRange::cursor(from);
        self.stored_marks = None;
        self.touch();
        Ok(())
    }

    /// ブロック先頭での Backspace：直前のテキストブロックと結合、直前のアトムは削除
    fn join_backward(&mut self, point: &TextPoint) -> bool {
        let index = point.index();
        if index == 0 {
            return false;
        }
        let parent = point.parent().to_vec();
        let Some(siblings) = self.tree.siblings_mut(&parent) else {
            return false;
        };

        let previous_size = match siblings.get(index - 1) {
            Some(Block::Text(block)) => Some(block.content_size()),
            Some(Block::Image { .. } | Block::HorizontalRule) => None,
            _ => return false,
        };
        let Some(target) = previous_size else {
            siblings.remove(index - 1);
            let mut path = parent;
            path.push(index - 1);
            self.place_cursor(TextPoint::new(path, 0));
            self.touch();
            return true;
        };

        let tail = match siblings.get_mut(index).and_then(Block::as_text_block_mut) {
            Some(block) => std::mem::take(&mut block.inlines),
            None => return false,
        };
        siblings.remove(index);
        if let Some(previous) = siblings.get_mut(index - 1).and_then(Block::as_text_block_mut) {
            let tail = coerce_inlines(&previous.kind, tail);
            previous.inlines.extend(tail);
            normalize_inlines(&mut previous.inlines);
        }

        let mut path = parent;
        path.push(index - 1);
        self.place_cursor(TextPoint::new(path, target));
        self.stored_marks = None;
        self.touch();
        true
    }
}

impl Default for EditableDocument {
    fn default() -> Self {
        Self::new(NormalizedContent::Empty)
    }
}

/// ブロック種別に合わせてインラインを変換（幅は保たれる）
fn coerce_inlines(kind: &TextBlockKind, inlines: Vec<Inline>) -> Vec<Inline> {
    if kind.is_code() {
        let text: String = TextBlock::paragraph(inlines).text();
        if text.is_empty() {
            Vec::new()
        } else {
            vec![Inline::text(text)]
        }
    } else {
        let mut coerced = Vec::with_capacity(inlines.len());
        for inline in inlines {
            match inline {
                Inline::Text { text, marks } if text.contains('\n') => {
                    coerced.extend(inlines_from_text(&text, &marks));
                }
                other => coerced.push(other),
            }
        }
        normalize_inlines(&mut coerced);
        coerced
    }
}

/// 指定オフセットでインライン列を分割し、オフセット直後のインデックスを返す
fn split_inlines_at(inlines: &mut Vec<Inline>, offset: usize) -> usize {
    let mut pos = 0;
    for index in 0..inlines.len() {
        if pos == offset {
            return index;
        }
        let size = inlines[index].size();
        if offset < pos + size {
            if let Inline::Text { text, marks } = &mut inlines[index] {
                let byte = char_to_byte(text, offset - pos);
                let tail = text.split_off(byte);
                let marks = marks.clone();
                inlines.insert(index + 1, Inline::Text { text: tail, marks });
            }
            return index + 1;
        }
        pos += size;
    }
    inlines.len()
}

/// カーソル直前の文字が持つ書式（リンク末尾ではリンクを引き継がない）
fn marks_before(inlines: &[Inline], offset: usize) -> Vec<Mark> {
    if offset == 0 {
        return match inlines.first() {
            Some(Inline::Text { marks, .. }) => marks
                .iter()
                .filter(|mark| !matches!(mark, Mark::Link { .. }))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
    }

    let mut pos = 0;
    for (index, inline) in inlines.iter().enumerate() {
        let size = inline.size();
        if offset <= pos + size {
            let Inline::Text { marks, .. } = inline else {
                return Vec::new();
            };
            let at_run_end = offset == pos + size;
            let next_has_same_link = |mark: &Mark| {
                matches!(
                    inlines.get(index + 1),
                    Some(Inline::Text { marks: next, .. }) if next.contains(mark)
                )
            };
            return marks
                .iter()
                .filter(|mark| {
                    !(at_run_end && matches!(mark, Mark::Link { .. }) && !next_has_same_link(*mark))
                })
                .cloned()
                .collect();
        }
        pos += size;
    }
    Vec::new()
}

fn char_to_byte(text: &str, char_pos: usize) -> usize {
    text.char_indices()
        .nth(char_pos)
        .map_or(text.len(), |(index, _)| index)
}
