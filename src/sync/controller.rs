//! 変更同期コントローラ
//!
//! 編集面のライフサイクル（未初期化 → 稼働 → 破棄）を管理し、
//! ローカル編集をデバウンスしてから外部リスナーへスナップショットを通知する

use crate::config::{SyncConfig, ValidationPolicy};
use crate::document::{
    normalize_with_policy, ContentSnapshot, DocumentTree, EditableDocument, InitialContent,
    NormalizedContent, SelectionRange,
};
use crate::error::{EditError, LifecycleError, Result, SyncError};
use crate::logging::{truncate_for_log, SyncTraceLogger, TraceKind};
use crate::sync::debounce::Debouncer;
use std::rc::Rc;
use std::time::Instant;

/// 外部への内容変更通知を受け取るリスナー
pub trait ContentChangeListener {
    fn on_content_change(&mut self, snapshot: &ContentSnapshot) -> anyhow::Result<()>;
}

impl<F> ContentChangeListener for F
where
    F: FnMut(&ContentSnapshot) -> anyhow::Result<()>,
{
    fn on_content_change(&mut self, snapshot: &ContentSnapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}

/// 編集面のライフサイクル状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Active,
    Destroyed,
}

pub struct ChangeSyncController {
    config: SyncConfig,
    listener: Box<dyn ContentChangeListener>,
    state: LifecycleState,
    document: Option<EditableDocument>,
    /// 編集可能な場合のみ初期化時に一度だけ作成
    debouncer: Option<Debouncer>,
    editable: bool,
    trace: Option<Rc<SyncTraceLogger>>,
    emission_count: usize,
}

impl ChangeSyncController {
    pub fn new<L>(config: SyncConfig, listener: L) -> Self
    where
        L: ContentChangeListener + 'static,
    {
        let trace = SyncTraceLogger::open_optional(config.trace_log_path.as_deref()).map(Rc::new);
        Self {
            config,
            listener: Box::new(listener),
            state: LifecycleState::Uninitialized,
            document: None,
            debouncer: None,
            editable: false,
            trace,
            emission_count: 0,
        }
    }

    /// トレース出力先を差し替える
    pub fn with_trace(mut self, trace: Rc<SyncTraceLogger>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// 編集面を初期化（一度だけ）
    pub fn initialize(&mut self, content: NormalizedContent, editable: bool) -> Result<()> {
        match self.state {
            LifecycleState::Active => return Err(LifecycleError::AlreadyInitialized.into()),
            LifecycleState::Destroyed => return Err(LifecycleError::Destroyed.into()),
            LifecycleState::Uninitialized => {}
        }

        self.document = Some(EditableDocument::new(content));
        self.editable = editable;
        self.debouncer = editable.then(|| Debouncer::new(self.config.debounce));
        self.state = LifecycleState::Active;

        log::debug!(
            "Editor surface initialized (editable={}, debounce={:?})",
            editable,
            self.config.debounce
        );
        self.trace(
            TraceKind::Initialize,
            if editable { "editable" } else { "read_only" },
        );
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn document(&self) -> Option<&EditableDocument> {
        self.document.as_ref()
    }

    pub fn selection(&self) -> Option<SelectionRange> {
        self.document.as_ref().map(EditableDocument::selection)
    }

    pub fn has_pending_emission(&self) -> bool {
        self.debouncer.as_ref().is_some_and(Debouncer::is_pending)
    }

    /// リスナーを呼び出した回数
    pub fn emission_count(&self) -> usize {
        self.emission_count
    }

    /// 文書へ編集操作を適用し、内容が変わればデバウンスを再設定
    pub fn apply_local_edit<T, F>(&mut self, now: Instant, edit: F) -> Result<T>
    where
        F: FnOnce(&mut EditableDocument) -> std::result::Result<T, EditError>,
    {
        if !self.editable && self.is_active() {
            return Err(EditError::ReadOnly.into());
        }
        let document = self.active_document_mut()?;
        let before = document.revision();
        let output = edit(document)?;
        let changed = document.revision() != before;
        if changed {
            self.on_local_edit(now)?;
        }
        Ok(output)
    }

    /// ローカル編集の通知。保留中の通知期限を `now + debounce` に延長
    pub fn on_local_edit(&mut self, now: Instant) -> Result<()> {
        self.active_document_mut()?;
        if let Some(debouncer) = self.debouncer.as_mut() {
            debouncer.schedule(now);
            self.trace(TraceKind::LocalEdit, "");
        }
        Ok(())
    }

    /// イベントループの更新。期限を過ぎていれば通知して `true`
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        if !self.is_active() {
            return Ok(false);
        }
        let due = self
            .debouncer
            .as_mut()
            .is_some_and(|debouncer| debouncer.poll(now));
        if !due {
            return Ok(false);
        }
        self.emit_snapshot()?;
        Ok(true)
    }

    fn emit_snapshot(&mut self) -> Result<()> {
        let Some(document) = self.document.as_ref() else {
            return Ok(());
        };
        let snapshot = document.to_snapshot();
        self.emission_count += 1;
        self.trace(TraceKind::Emit, "");
        self.listener
            .on_content_change(&snapshot)
            .map_err(SyncError::Callback)
    }

    /// 入力を検証ポリシーに従って正規化し、フォールバックをトレースに残す
    pub fn normalize_input(
        &self,
        input: Option<&InitialContent>,
        policy: ValidationPolicy,
    ) -> Result<NormalizedContent> {
        let normalized = normalize_with_policy(input, policy, |err| {
            self.trace(
                TraceKind::ContentFallback,
                &truncate_for_log(&err.to_string(), 160),
            );
        })?;
        Ok(normalized)
    }

    /// 外部コンテンツで文書を置き換える（通知は発生させない）
    pub fn replace_content(&mut self, content: NormalizedContent) -> Result<()> {
        self.replace_tree(content.into_tree())
    }

    pub(crate) fn replace_tree(&mut self, tree: DocumentTree) -> Result<()> {
        self.active_document_mut()?.replace_tree(tree);
        if let Some(debouncer) = self.debouncer.as_mut() {
            debouncer.cancel();
        }
        Ok(())
    }

    /// 選択範囲の復元を試みる（失敗しても文書は既定配置のまま）
    pub fn restore_selection(&mut self, range: SelectionRange) -> bool {
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        let restored = document.try_restore_selection(range);
        if !restored {
            log::debug!(
                "Selection {}..{} could not be restored in document of size {}",
                range.from,
                range.to,
                document.content_size()
            );
        }
        restored
    }

    /// 編集面を破棄。効果は一度だけで、以後の通知は発生しない
    pub fn teardown(&mut self) -> bool {
        if self.state == LifecycleState::Destroyed {
            return false;
        }
        self.trace(TraceKind::Teardown, "");
        if let Some(debouncer) = self.debouncer.as_mut() {
            debouncer.cancel();
        }
        self.debouncer = None;
        self.document = None;
        self.state = LifecycleState::Destroyed;
        log::debug!("Editor surface destroyed");
        true
    }

    pub(crate) fn trace(&self, kind: TraceKind, detail: &str) {
        if let Some(trace) = &self.trace {
            let revision = self.document.as_ref().map_or(0, EditableDocument::revision);
            trace.record(kind, revision, detail);
        }
    }

    fn active_document_mut(&mut self) -> Result<&mut EditableDocument> {
        match self.state {
            LifecycleState::Uninitialized => Err(LifecycleError::NotActive.into()),
            LifecycleState::Destroyed => Err(LifecycleError::Destroyed.into()),
            LifecycleState::Active => self
                .document
                .as_mut()
                .ok_or_else(|| LifecycleError::NotActive.into()),
        }
    }
}

impl Drop for ChangeSyncController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    type Emitted = Rc<RefCell<Vec<ContentSnapshot>>>;

    fn recording_controller() -> (ChangeSyncController, Emitted) {
        let emitted: Emitted = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&emitted);
        let controller = ChangeSyncController::new(
            SyncConfig::default(),
            move |snapshot: &ContentSnapshot| -> anyhow::Result<()> {
                sink.borrow_mut().push(snapshot.clone());
                Ok(())
            },
        );
        (controller, emitted)
    }

    #[test]
    fn lifecycle_transitions() {
        let (mut controller, _) = recording_controller();
        assert_eq!(controller.state(), LifecycleState::Uninitialized);

        controller.initialize(NormalizedContent::Empty, true).unwrap();
        assert_eq!(controller.state(), LifecycleState::Active);
        assert!(matches!(
            controller.initialize(NormalizedContent::Empty, true),
            Err(SyncError::Lifecycle(LifecycleError::AlreadyInitialized))
        ));

        assert!(controller.teardown());
        assert!(!controller.teardown());
        assert_eq!(controller.state(), LifecycleState::Destroyed);
        assert!(controller.document().is_none());
        assert!(matches!(
            controller.initialize(NormalizedContent::Empty, true),
            Err(SyncError::Lifecycle(LifecycleError::Destroyed))
        ));
    }

    #[test]
    fn burst_of_edits_emits_once_after_quiet_period() {
        let (mut controller, emitted) = recording_controller();
        controller.initialize(NormalizedContent::Empty, true).unwrap();

        let start = Instant::now();
        for (i, ch) in ["a", "b", "c"].into_iter().enumerate() {
            let at = start + Duration::from_millis(100 * i as u64);
            controller.apply_local_edit(at, |doc| doc.insert_text(ch)).unwrap();
        }

        assert!(!controller.poll(start + Duration::from_millis(600)).unwrap());
        assert!(controller.poll(start + Duration::from_millis(700)).unwrap());
        assert!(!controller.poll(start + Duration::from_secs(2)).unwrap());

        let emitted = emitted.borrow();
        assert_eq!(emitted.len(), 1);
        let tree = DocumentTree::from_snapshot(&emitted[0]).unwrap();
        assert_eq!(tree.text_content(), "abc");
    }

    #[test]
    fn read_only_surface_rejects_edits_and_never_emits() {
        let (mut controller, emitted) = recording_controller();
        controller
            .initialize(NormalizedContent::PlainText("fixed".to_string()), false)
            .unwrap();

        let now = Instant::now();
        assert!(matches!(
            controller.apply_local_edit(now, |doc| doc.insert_text("x")),
            Err(SyncError::Edit(EditError::ReadOnly))
        ));
        controller.on_local_edit(now).unwrap();
        assert!(!controller.poll(now + Duration::from_secs(10)).unwrap());
        assert!(emitted.borrow().is_empty());
        assert_eq!(controller.document().unwrap().text_content(), "fixed");
    }

    #[test]
    fn edits_without_content_change_do_not_arm_debouncer() {
        let (mut controller, _) = recording_controller();
        controller.initialize(NormalizedContent::Empty, true).unwrap();

        let changed = controller
            .apply_local_edit(Instant::now(), |doc| doc.delete_backward())
            .unwrap();
        assert!(!changed);
        assert!(!controller.has_pending_emission());
    }

    #[test]
    fn teardown_cancels_pending_emission() {
        let (mut controller, emitted) = recording_controller();
        controller.initialize(NormalizedContent::Empty, true).unwrap();

        let start = Instant::now();
        controller.apply_local_edit(start, |doc| doc.insert_text("x")).unwrap();
        assert!(controller.has_pending_emission());

        controller.teardown();
        assert!(!controller.poll(start + Duration::from_secs(1)).unwrap());
        assert!(emitted.borrow().is_empty());
        assert!(matches!(
            controller.on_local_edit(start),
            Err(SyncError::Lifecycle(LifecycleError::Destroyed))
        ));
    }

    #[test]
    fn replace_content_cancels_pending_emission() {
        let (mut controller, emitted) = recording_controller();
        controller.initialize(NormalizedContent::Empty, true).unwrap();

        let start = Instant::now();
        controller.apply_local_edit(start, |doc| doc.insert_text("local")).unwrap();
        controller
            .replace_content(NormalizedContent::PlainText("external".to_string()))
            .unwrap();

        assert!(!controller.poll(start + Duration::from_secs(1)).unwrap());
        assert!(emitted.borrow().is_empty());
        assert_eq!(controller.document().unwrap().text_content(), "external");
    }

    #[test]
    fn listener_failure_propagates() {
        let mut controller = ChangeSyncController::new(
            SyncConfig::default().with_debounce(Duration::from_millis(10)),
            |_: &ContentSnapshot| -> anyhow::Result<()> {
                Err(anyhow::anyhow!("store unavailable"))
            },
        );
        controller.initialize(NormalizedContent::Empty, true).unwrap();

        let start = Instant::now();
        controller.apply_local_edit(start, |doc| doc.insert_text("x")).unwrap();
        let err = controller.poll(start + Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, SyncError::Callback(_)));
        assert!(!err.is_recoverable());
        assert_eq!(controller.emission_count(), 1);
    }

    #[test]
    fn operations_before_initialize_are_rejected() {
        let (mut controller, _) = recording_controller();
        assert!(matches!(
            controller.on_local_edit(Instant::now()),
            Err(SyncError::Lifecycle(LifecycleError::NotActive))
        ));
        assert!(!controller.poll(Instant::now()).unwrap());
        assert!(!controller.restore_selection(SelectionRange::cursor(1)));
    }
}
