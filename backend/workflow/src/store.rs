use std::sync::Arc;

use lecturebuddy_core::{ImageSource, InputData, InputKind, OptimizedData, WorkflowStep};
use logging::{EventLogger, WorkflowEvent};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::WorkflowAction;
use crate::prefs::{
    MemoryPreferenceStore, PreferenceStore, DONT_SHOW_TOOLS_WARNING_KEY, INFO_DIALOG_SEEN_KEY,
};
use crate::reducer::reduce;
use crate::state::WorkflowState;

/// The single owner of `WorkflowState`.
///
/// Every mutation goes through [`WorkflowStore::dispatch`], which runs the
/// reducer to completion before publishing, so readers only ever observe whole
/// states. Create one per session and pass it around as `Arc<WorkflowStore>`.
pub struct WorkflowStore {
    state: watch::Sender<WorkflowState>,
    prefs: Arc<dyn PreferenceStore>,
    session_id: String,
}

impl WorkflowStore {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        let dont_show = prefs.get_bool(DONT_SHOW_TOOLS_WARNING_KEY);
        let (state, _) = watch::channel(WorkflowState::initial_with_preference(dont_show));
        Self {
            state,
            prefs,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// A store backed by throwaway preferences.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPreferenceStore::new()))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn dispatch(&self, action: WorkflowAction) {
        debug!(action = action.name(), "dispatch");
        let from = self.state.borrow().current_step;
        let event = match &action {
            WorkflowAction::NavigateToStep(to) if *to != from => Some(WorkflowEvent::Navigated {
                from: from.to_string(),
                to: to.to_string(),
            }),
            WorkflowAction::LockStep(step) => Some(WorkflowEvent::StepLocked {
                step: step.to_string(),
            }),
            WorkflowAction::UnlockStep(step) => Some(WorkflowEvent::StepUnlocked {
                step: step.to_string(),
            }),
            WorkflowAction::Reset => Some(WorkflowEvent::Reset),
            _ => None,
        };
        let persist = match &action {
            WorkflowAction::SetDontShowToolsWarning(flag) => Some(*flag),
            _ => None,
        };

        self.state.send_modify(|state| *state = reduce(state, action));

        if let Some(event) = event {
            EventLogger::log_event(&self.session_id, event);
        }
        if let Some(flag) = persist {
            if let Err(e) = self.prefs.set(DONT_SHOW_TOOLS_WARNING_KEY, &flag.to_string()) {
                warn!(error = %e, "Failed to persist tools warning preference");
            }
        }
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    /// Read without cloning the whole state.
    pub fn with_state<R>(&self, f: impl FnOnce(&WorkflowState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn preferences(&self) -> &Arc<dyn PreferenceStore> {
        &self.prefs
    }

    pub fn set_input(&self, input: InputData) {
        self.dispatch(WorkflowAction::SetInput(input));
    }

    pub fn set_optimized_data(&self, data: Option<OptimizedData>) {
        self.dispatch(WorkflowAction::SetOptimizedData(data));
    }

    pub fn navigate_to_step(&self, step: WorkflowStep) {
        self.dispatch(WorkflowAction::NavigateToStep(step));
    }

    pub fn lock_step(&self, step: WorkflowStep) {
        self.dispatch(WorkflowAction::LockStep(step));
    }

    pub fn unlock_step(&self, step: WorkflowStep) {
        self.dispatch(WorkflowAction::UnlockStep(step));
    }

    pub fn set_processing(&self, processing: bool) {
        self.dispatch(WorkflowAction::SetProcessing(processing));
    }

    pub fn set_selected_input_type(&self, kind: Option<InputKind>) {
        self.dispatch(WorkflowAction::SetSelectedInputType(kind));
    }

    pub fn set_image_input_source(&self, source: Option<ImageSource>) {
        self.dispatch(WorkflowAction::SetImageInputSource(source));
    }

    pub fn set_tools_changes(&self, changed: bool) {
        self.dispatch(WorkflowAction::SetToolsChanges(changed));
    }

    pub fn set_dont_show_tools_warning(&self, flag: bool) {
        self.dispatch(WorkflowAction::SetDontShowToolsWarning(flag));
    }

    pub fn clear_input(&self) {
        self.dispatch(WorkflowAction::ClearInput);
    }

    pub fn reset(&self) {
        self.dispatch(WorkflowAction::Reset);
    }

    pub fn info_dialog_seen(&self) -> bool {
        self.prefs.get_bool(INFO_DIALOG_SEEN_KEY)
    }

    pub fn mark_info_dialog_seen(&self) {
        if let Err(e) = self.prefs.set(INFO_DIALOG_SEEN_KEY, "true") {
            warn!(error = %e, "Failed to persist info dialog flag");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_warning_preference_at_construction() {
        let prefs = Arc::new(MemoryPreferenceStore::new().with_value(DONT_SHOW_TOOLS_WARNING_KEY, "true"));
        let store = WorkflowStore::new(prefs);
        assert!(store.snapshot().dont_show_tools_warning_again);
    }

    #[test]
    fn warning_preference_is_written_through() {
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let store = WorkflowStore::new(prefs.clone());
        store.set_dont_show_tools_warning(true);
        assert_eq!(prefs.get(DONT_SHOW_TOOLS_WARNING_KEY).as_deref(), Some("true"));
        store.set_dont_show_tools_warning(false);
        assert_eq!(prefs.get(DONT_SHOW_TOOLS_WARNING_KEY).as_deref(), Some("false"));
    }

    #[test]
    fn other_actions_do_not_touch_preferences() {
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let store = WorkflowStore::new(prefs.clone());
        store.set_input(InputData::text("notes"));
        store.reset();
        assert_eq!(prefs.get(DONT_SHOW_TOOLS_WARNING_KEY), None);
    }

    #[test]
    fn reset_preserves_preference_across_dispatches() {
        let store = WorkflowStore::in_memory();
        store.set_dont_show_tools_warning(true);
        store.set_input(InputData::text("notes"));
        store.navigate_to_step(WorkflowStep::Optimizer);
        store.reset();
        store.reset();
        assert_eq!(store.snapshot(), WorkflowState::initial_with_preference(true));
    }

    #[tokio::test]
    async fn subscribers_see_whole_states() {
        let store = WorkflowStore::in_memory();
        let mut rx = store.subscribe();
        store.set_input(InputData::text("notes"));
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert!(seen.input_data.is_some());
        assert_eq!(seen.current_step, WorkflowStep::Input);
    }

    #[test]
    fn info_dialog_flag_roundtrips() {
        let store = WorkflowStore::in_memory();
        assert!(!store.info_dialog_seen());
        store.mark_info_dialog_seen();
        assert!(store.info_dialog_seen());
    }

    #[test]
    fn stores_are_isolated() {
        let a = WorkflowStore::in_memory();
        let b = WorkflowStore::in_memory();
        a.set_processing(true);
        assert!(!b.snapshot().is_processing);
        assert_ne!(a.session_id(), b.session_id());
    }
}
