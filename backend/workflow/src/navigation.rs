//! Guarded navigation.
//!
//! The step indicator, the Back/Next bar and the headless CLI all move through
//! [`guarded_transition`], so the "leaving Tools with unsaved work" prompt is
//! decided in exactly one place.

use std::sync::{Arc, Mutex};

use lecturebuddy_core::{DenyReason, WorkflowStep};
use logging::{EventLogger, WorkflowEvent};
use tracing::debug;

use crate::state::WorkflowState;
use crate::store::WorkflowStore;
use crate::validation::can_navigate_to_step;

/// A transition waiting on the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTransition {
    /// Leave Tools, discarding chat/summary/translation state.
    LeaveTools { target: WorkflowStep },
    /// Start over, discarding captured and optimized data.
    Reset,
}

/// The user's answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Confirmation {
    pub dont_show_again: bool,
}

/// What a confirmation callback decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Confirmed(Confirmation),
    Cancelled,
    /// The answer arrives later (e.g. from a dialog); nothing happens now.
    Deferred,
}

/// Pure verdict on a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Target is the current step.
    Stay,
    Denied(DenyReason),
    Proceed { clear_tools_changes: bool },
    Confirm(PendingTransition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Moved(WorkflowStep),
    Denied(DenyReason),
    AwaitingConfirmation(PendingTransition),
    Cancelled,
    /// Nothing to do (same step, disabled button, nothing pending).
    Ignored,
    Reset,
}

pub fn decide(state: &WorkflowState, target: WorkflowStep) -> Decision {
    if target == state.current_step {
        return Decision::Stay;
    }
    let check = can_navigate_to_step(target, state);
    if let (false, Some(reason)) = (check.allowed, check.reason) {
        return Decision::Denied(reason);
    }
    if state.should_warn_on_leaving_tools() {
        return Decision::Confirm(PendingTransition::LeaveTools { target });
    }
    Decision::Proceed {
        clear_tools_changes: state.current_step == WorkflowStep::Tools,
    }
}

/// Move to `target`, asking `confirm` first when unsaved tool work would be lost.
pub fn guarded_transition<F>(store: &WorkflowStore, target: WorkflowStep, confirm: F) -> NavOutcome
where
    F: FnOnce(&PendingTransition) -> Prompt,
{
    match decide(&store.snapshot(), target) {
        Decision::Stay => NavOutcome::Ignored,
        Decision::Denied(reason) => {
            EventLogger::log_event(
                store.session_id(),
                WorkflowEvent::NavigationDenied {
                    target: target.to_string(),
                    reason: reason.to_string(),
                },
            );
            NavOutcome::Denied(reason)
        }
        Decision::Proceed {
            clear_tools_changes,
        } => {
            store.navigate_to_step(target);
            if clear_tools_changes {
                store.set_tools_changes(false);
            }
            NavOutcome::Moved(target)
        }
        Decision::Confirm(pending) => match confirm(&pending) {
            Prompt::Confirmed(answer) => {
                if answer.dont_show_again {
                    store.set_dont_show_tools_warning(true);
                }
                store.navigate_to_step(target);
                store.set_tools_changes(false);
                NavOutcome::Moved(target)
            }
            Prompt::Cancelled => NavOutcome::Cancelled,
            Prompt::Deferred => NavOutcome::AwaitingConfirmation(pending),
        },
    }
}

/// Interactive front-end over [`guarded_transition`] for UIs whose
/// confirmation arrives as a later event.
pub struct Navigator {
    store: Arc<WorkflowStore>,
    pending: Mutex<Option<PendingTransition>>,
}

impl Navigator {
    pub fn new(store: Arc<WorkflowStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<WorkflowStore> {
        &self.store
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_pending(&self, pending: Option<PendingTransition>) {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = pending;
    }

    /// Step indicator click.
    pub fn go_to(&self, target: WorkflowStep) -> NavOutcome {
        let outcome = guarded_transition(&self.store, target, |_| Prompt::Deferred);
        if let NavOutcome::AwaitingConfirmation(pending) = outcome {
            self.set_pending(Some(pending));
        }
        outcome
    }

    pub fn back(&self) -> NavOutcome {
        let state = self.store.snapshot();
        match state.current_step.previous() {
            Some(prev) if state.back_enabled() => self.go_to(prev),
            _ => NavOutcome::Ignored,
        }
    }

    pub fn next(&self) -> NavOutcome {
        let state = self.store.snapshot();
        match state.current_step.next() {
            Some(next) if state.next_enabled() => self.go_to(next),
            _ => NavOutcome::Ignored,
        }
    }

    /// Logo click / "start over". Prompts only when there is data to lose.
    pub fn request_reset(&self) -> NavOutcome {
        if self.store.snapshot().has_unsaved_data() {
            self.set_pending(Some(PendingTransition::Reset));
            NavOutcome::AwaitingConfirmation(PendingTransition::Reset)
        } else {
            self.store.reset();
            NavOutcome::Reset
        }
    }

    /// Accept the pending prompt. Leaving Tools is re-validated against the
    /// state at confirmation time.
    pub fn confirm(&self, dont_show_again: bool) -> NavOutcome {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner()).take();
        let answer = Confirmation { dont_show_again };
        match pending {
            None => NavOutcome::Ignored,
            Some(PendingTransition::LeaveTools { target }) => {
                debug!(%target, dont_show_again, "Confirmed leaving tools");
                guarded_transition(&self.store, target, |_| Prompt::Confirmed(answer))
            }
            Some(PendingTransition::Reset) => {
                self.store.set_dont_show_tools_warning(dont_show_again);
                self.store.reset();
                NavOutcome::Reset
            }
        }
    }

    pub fn cancel(&self) -> NavOutcome {
        match self.pending.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(_) => NavOutcome::Cancelled,
            None => NavOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{MemoryPreferenceStore, PreferenceStore, DONT_SHOW_TOOLS_WARNING_KEY};
    use lecturebuddy_core::{InputData, OptimizedData};

    fn store_in_tools(changes: bool) -> Arc<WorkflowStore> {
        let store = Arc::new(WorkflowStore::in_memory());
        let input = InputData::text("lecture");
        store.set_optimized_data(Some(OptimizedData::passthrough(&input)));
        store.set_input(input);
        store.navigate_to_step(WorkflowStep::Optimizer);
        store.navigate_to_step(WorkflowStep::Tools);
        store.set_tools_changes(changes);
        store
    }

    #[test]
    fn back_from_dirty_tools_raises_prompt() {
        let store = store_in_tools(true);
        let nav = Navigator::new(store.clone());

        let outcome = nav.back();
        let pending = PendingTransition::LeaveTools {
            target: WorkflowStep::Optimizer,
        };
        assert_eq!(outcome, NavOutcome::AwaitingConfirmation(pending));
        assert_eq!(nav.pending(), Some(pending));
        assert_eq!(store.snapshot().current_step, WorkflowStep::Tools);
        assert!(store.snapshot().has_tools_changes);
    }

    #[test]
    fn confirming_moves_and_clears_changes() {
        let store = store_in_tools(true);
        let nav = Navigator::new(store.clone());
        nav.go_to(WorkflowStep::Input);

        assert_eq!(nav.confirm(false), NavOutcome::Moved(WorkflowStep::Input));
        let state = store.snapshot();
        assert_eq!(state.current_step, WorkflowStep::Input);
        assert!(!state.has_tools_changes);
        assert!(!state.dont_show_tools_warning_again);
        assert_eq!(nav.pending(), None);
    }

    #[test]
    fn confirming_with_opt_out_persists_before_moving() {
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let store = Arc::new(WorkflowStore::new(prefs.clone()));
        let input = InputData::text("lecture");
        store.set_optimized_data(Some(OptimizedData::passthrough(&input)));
        store.set_input(input);
        store.navigate_to_step(WorkflowStep::Tools);
        store.set_tools_changes(true);

        let nav = Navigator::new(store.clone());
        nav.back();
        nav.confirm(true);
        assert_eq!(prefs.get(DONT_SHOW_TOOLS_WARNING_KEY).as_deref(), Some("true"));

        // No more prompts once opted out.
        store.navigate_to_step(WorkflowStep::Tools);
        store.set_tools_changes(true);
        assert_eq!(nav.back(), NavOutcome::Moved(WorkflowStep::Optimizer));
    }

    #[test]
    fn cancelling_leaves_state_untouched() {
        let store = store_in_tools(true);
        let before = store.snapshot();
        let nav = Navigator::new(store.clone());
        nav.go_to(WorkflowStep::Optimizer);
        assert_eq!(nav.cancel(), NavOutcome::Cancelled);
        assert_eq!(store.snapshot(), before);
        assert_eq!(nav.cancel(), NavOutcome::Ignored);
    }

    #[test]
    fn clean_tools_leaves_without_prompt() {
        let store = store_in_tools(false);
        let nav = Navigator::new(store.clone());
        assert_eq!(nav.back(), NavOutcome::Moved(WorkflowStep::Optimizer));
    }

    #[test]
    fn opted_out_leave_clears_changes() {
        let store = store_in_tools(true);
        store.set_dont_show_tools_warning(true);
        let outcome = guarded_transition(&store, WorkflowStep::Input, |_| {
            panic!("prompt must not be raised")
        });
        assert_eq!(outcome, NavOutcome::Moved(WorkflowStep::Input));
        assert!(!store.snapshot().has_tools_changes);
    }

    #[test]
    fn clicking_current_step_is_a_no_op() {
        let store = store_in_tools(true);
        let outcome = guarded_transition(&store, WorkflowStep::Tools, |_| Prompt::Cancelled);
        assert_eq!(outcome, NavOutcome::Ignored);
    }

    #[test]
    fn denial_is_reported_without_prompt() {
        let store = WorkflowStore::in_memory();
        let outcome = guarded_transition(&store, WorkflowStep::Tools, |_| {
            panic!("prompt must not be raised")
        });
        assert_eq!(outcome, NavOutcome::Denied(DenyReason::NotOptimized));
        assert_eq!(store.snapshot().current_step, WorkflowStep::Input);
    }

    #[test]
    fn locked_target_is_denied_even_from_tools() {
        let store = store_in_tools(true);
        store.lock_step(WorkflowStep::Optimizer);
        let nav = Navigator::new(store.clone());
        assert_eq!(
            nav.go_to(WorkflowStep::Optimizer),
            NavOutcome::Denied(DenyReason::StepLocked)
        );
    }

    #[test]
    fn back_and_next_respect_processing() {
        let store = Arc::new(WorkflowStore::in_memory());
        store.set_input(InputData::text("lecture"));
        let nav = Navigator::new(store.clone());
        store.set_processing(true);
        assert_eq!(nav.next(), NavOutcome::Ignored);
        store.set_processing(false);
        assert_eq!(nav.next(), NavOutcome::Moved(WorkflowStep::Optimizer));
        store.set_processing(true);
        assert_eq!(nav.back(), NavOutcome::Ignored);
    }

    #[test]
    fn reset_prompts_only_with_data() {
        let store = Arc::new(WorkflowStore::in_memory());
        let nav = Navigator::new(store.clone());
        assert_eq!(nav.request_reset(), NavOutcome::Reset);

        store.set_input(InputData::text("lecture"));
        assert_eq!(
            nav.request_reset(),
            NavOutcome::AwaitingConfirmation(PendingTransition::Reset)
        );
        assert!(store.snapshot().input_data.is_some());
        assert_eq!(nav.confirm(true), NavOutcome::Reset);
        let state = store.snapshot();
        assert!(state.input_data.is_none());
        assert!(state.dont_show_tools_warning_again);
    }

    #[test]
    fn reset_confirmation_stores_unticked_box() {
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let store = Arc::new(WorkflowStore::new(prefs.clone()));
        store.set_dont_show_tools_warning(true);
        store.set_input(InputData::text("lecture"));

        let nav = Navigator::new(store.clone());
        nav.request_reset();
        assert_eq!(nav.confirm(false), NavOutcome::Reset);
        assert!(!store.snapshot().dont_show_tools_warning_again);
        assert_eq!(prefs.get(DONT_SHOW_TOOLS_WARNING_KEY).as_deref(), Some("false"));
    }

    #[test]
    fn decide_is_pure() {
        let state = WorkflowState {
            current_step: WorkflowStep::Tools,
            has_tools_changes: true,
            ..Default::default()
        };
        assert_eq!(
            decide(&state, WorkflowStep::Input),
            Decision::Confirm(PendingTransition::LeaveTools {
                target: WorkflowStep::Input
            })
        );
        assert_eq!(decide(&state, WorkflowStep::Tools), Decision::Stay);
    }
}
