//! 外部コンテンツ調停
//!
//! 編集中に外部から渡された新しい初期コンテンツを現在の文書と比較し、
//! 差分があれば全体を置き換えて選択範囲の復元を試みる

use crate::config::ValidationPolicy;
use crate::document::InitialContent;
use crate::error::Result;
use crate::logging::TraceKind;
use crate::sync::controller::ChangeSyncController;

/// 調停の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 稼働中の編集面がない
    Inactive,
    /// 内容が同一のため何もしていない
    Unchanged,
    /// 内容を置き換えた
    Replaced { selection_restored: bool },
}

#[derive(Debug, Clone)]
pub struct ExternalContentReconciler {
    policy: ValidationPolicy,
    /// 直近に観測した入力（外側の `None` は未観測）
    last_input: Option<Option<InitialContent>>,
}

impl ExternalContentReconciler {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self {
            policy,
            last_input: None,
        }
    }

    /// 観測済みの入力として記録する（マウント時の初期値）
    pub fn remember(&mut self, input: Option<&InitialContent>) {
        self.last_input = Some(input.cloned());
    }

    /// 入力が前回から変わったときだけ調停する
    pub fn observe(
        &mut self,
        controller: &mut ChangeSyncController,
        input: Option<&InitialContent>,
    ) -> Result<Option<ReconcileOutcome>> {
        if let Some(previous) = &self.last_input {
            if previous.as_ref() == input {
                return Ok(None);
            }
        }
        let outcome = self.reconcile(controller, input)?;
        self.remember(input);
        Ok(Some(outcome))
    }

    /// 新しいコンテンツを現在の文書へ反映する
    pub fn reconcile(
        &self,
        controller: &mut ChangeSyncController,
        input: Option<&InitialContent>,
    ) -> Result<ReconcileOutcome> {
        let Some(current) = controller.document().map(|document| document.tree().clone()) else {
            return Ok(ReconcileOutcome::Inactive);
        };
        if !controller.is_active() {
            return Ok(ReconcileOutcome::Inactive);
        }

        let candidate = controller.normalize_input(input, self.policy)?.into_tree();
        if candidate == current {
            controller.trace(TraceKind::ReconcileUnchanged, "");
            return Ok(ReconcileOutcome::Unchanged);
        }

        let previous_selection = controller.selection().unwrap_or_default();
        controller.replace_tree(candidate)?;
        let selection_restored = controller.restore_selection(previous_selection);
        controller.trace(
            TraceKind::ReconcileReplaced,
            &format!("selection_restored={}", selection_restored),
        );
        Ok(ReconcileOutcome::Replaced { selection_restored })
    }
}

impl Default for ExternalContentReconciler {
    fn default() -> Self {
        Self::new(ValidationPolicy::default())
    }
}
