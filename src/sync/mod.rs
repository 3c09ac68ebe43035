//! 変更同期
//!
//! ローカル編集のデバウンス通知と外部コンテンツの調停

pub mod controller;
pub mod debounce;
pub mod reconciler;

pub use controller::{ChangeSyncController, ContentChangeListener, LifecycleState};
pub use debounce::Debouncer;
pub use reconciler::{ExternalContentReconciler, ReconcileOutcome};
