//! 選択範囲管理
//!
//! 平坦化した文書位置での選択範囲と、テキストブロック内の位置表現

/// 文書内の選択範囲（`from == to` ならカーソル）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionRange {
    pub from: usize,
    pub to: usize,
}

impl SelectionRange {
    /// 範囲を作成（端点は昇順に並べ替える）
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from: from.min(to),
            to: from.max(to),
        }
    }

    pub fn cursor(pos: usize) -> Self {
        Self { from: pos, to: pos }
    }

    pub fn is_collapsed(&self) -> bool {
        self.from == self.to
    }

    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }
}

impl Default for SelectionRange {
    fn default() -> Self {
        Self::cursor(0)
    }
}

/// テキストブロック内の位置
///
/// `path` はルートからテキストブロックまでの子インデックス列、
/// `offset` はブロック内のインライン位置（文字・改行単位）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPoint {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl TextPoint {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Self { path, offset }
    }

    /// 同じテキストブロックを指しているか
    pub fn same_block(&self, other: &TextPoint) -> bool {
        self.path == other.path
    }

    /// 親コンテナのパス
    pub fn parent(&self) -> &[usize] {
        match self.path.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }

    /// 兄弟リスト内でのインデックス
    pub fn index(&self) -> usize {
        self.path.last().copied().unwrap_or(0)
    }
}
