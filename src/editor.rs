//! 記事エディタ
//!
//! 同期コントローラと外部コンテンツ調停をまとめた、ホスト向けの編集面

use crate::config::SyncConfig;
use crate::document::{ContentSnapshot, EditableDocument, InitialContent, SelectionRange};
use crate::error::{EditError, Result};
use crate::sync::{
    ChangeSyncController, ContentChangeListener, ExternalContentReconciler, ReconcileOutcome,
};
use std::time::Instant;

/// 編集面へ渡すプロパティ
#[derive(Debug, Clone, PartialEq)]
pub struct EditorProps {
    pub initial_content: Option<InitialContent>,
    pub editable: bool,
    pub placeholder: Option<String>,
}

impl Default for EditorProps {
    fn default() -> Self {
        Self {
            initial_content: None,
            editable: true,
            placeholder: None,
        }
    }
}

impl EditorProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, content: impl Into<InitialContent>) -> Self {
        self.initial_content = Some(content.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }
}

pub struct ArticleEditor {
    controller: ChangeSyncController,
    reconciler: ExternalContentReconciler,
    placeholder: Option<String>,
}

impl ArticleEditor {
    /// 編集面を作成して初期化
    pub fn mount<L>(props: EditorProps, config: SyncConfig, listener: L) -> Result<Self>
    where
        L: ContentChangeListener + 'static,
    {
        let policy = config.validation;
        let mut controller = ChangeSyncController::new(config, listener);
        let content = controller.normalize_input(props.initial_content.as_ref(), policy)?;
        controller.initialize(content, props.editable)?;

        let mut reconciler = ExternalContentReconciler::new(policy);
        reconciler.remember(props.initial_content.as_ref());

        Ok(Self {
            controller,
            reconciler,
            placeholder: props.placeholder,
        })
    }

    /// `initial_content` プロパティの更新。前回と異なる場合のみ調停する
    pub fn set_initial_content(
        &mut self,
        content: Option<InitialContent>,
    ) -> Result<Option<ReconcileOutcome>> {
        self.reconciler.observe(&mut self.controller, content.as_ref())
    }

    pub fn edit<T, F>(&mut self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut EditableDocument) -> std::result::Result<T, EditError>,
    {
        self.edit_at(Instant::now(), edit)
    }

    /// 時刻を指定して編集操作を適用
    pub fn edit_at<T, F>(&mut self, now: Instant, edit: F) -> Result<T>
    where
        F: FnOnce(&mut EditableDocument) -> std::result::Result<T, EditError>,
    {
        self.controller.apply_local_edit(now, edit)
    }

    pub fn tick(&mut self) -> Result<bool> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Result<bool> {
        self.controller.poll(now)
    }

    pub fn snapshot(&self) -> Option<ContentSnapshot> {
        self.controller.document().map(EditableDocument::to_snapshot)
    }

    pub fn selection(&self) -> Option<SelectionRange> {
        self.controller.selection()
    }

    pub fn document(&self) -> Option<&EditableDocument> {
        self.controller.document()
    }

    pub fn is_editable(&self) -> bool {
        self.controller.is_editable()
    }

    pub fn is_mounted(&self) -> bool {
        self.controller.is_active()
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    /// 文書が空でプレースホルダーが設定されているとき表示する
    pub fn placeholder_visible(&self) -> bool {
        self.placeholder.is_some()
            && self
                .controller
                .document()
                .is_some_and(EditableDocument::is_empty)
    }

    pub fn controller(&self) -> &ChangeSyncController {
        &self.controller
    }

    /// 編集面を破棄（二度目以降は何もしない）
    pub fn unmount(&mut self) -> bool {
        self.controller.teardown()
    }
}

impl Drop for ArticleEditor {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationPolicy;
    use crate::document::SnapshotNode;
    use crate::error::{ContentError, SyncError};

    fn silent() -> impl FnMut(&ContentSnapshot) -> anyhow::Result<()> {
        |_: &ContentSnapshot| Ok(())
    }

    #[test]
    fn props_default_to_editable() {
        let props = EditorProps::default();
        assert!(props.editable);
        assert!(props.initial_content.is_none());
        assert!(!props.clone().read_only().editable);
    }

    #[test]
    fn placeholder_shows_only_for_empty_document() {
        let props = EditorProps::new().with_placeholder("Write your article…");
        let mut editor = ArticleEditor::mount(props, SyncConfig::default(), silent()).unwrap();
        assert!(editor.placeholder_visible());

        editor.edit(|doc| doc.insert_text("T")).unwrap();
        assert!(!editor.placeholder_visible());
        assert_eq!(editor.placeholder(), Some("Write your article…"));
    }

    #[test]
    fn strict_mount_rejects_invalid_content() {
        let broken = ContentSnapshot::from_root(SnapshotNode::new("text"));
        let props = EditorProps::new().with_content(broken);
        let config = SyncConfig::default().with_validation(ValidationPolicy::Strict);
        let result = ArticleEditor::mount(props, config, silent());
        assert!(matches!(
            result,
            Err(SyncError::Content(ContentError::RootNotDoc { .. }))
        ));
    }

    #[test]
    fn lenient_mount_starts_empty() {
        let broken = ContentSnapshot::from_root(SnapshotNode::new("text"));
        let props = EditorProps::new().with_content(broken);
        let editor = ArticleEditor::mount(props, SyncConfig::default(), silent()).unwrap();
        assert!(editor.document().unwrap().is_empty());
    }

    #[test]
    fn unmount_is_idempotent() {
        let mut editor =
            ArticleEditor::mount(EditorProps::default(), SyncConfig::default(), silent()).unwrap();
        assert!(editor.unmount());
        assert!(!editor.unmount());
        assert!(!editor.is_mounted());
        assert!(editor.snapshot().is_none());
        assert_eq!(
            editor.set_initial_content(Some("late".into())).unwrap(),
            Some(ReconcileOutcome::Inactive)
        );
    }
}
