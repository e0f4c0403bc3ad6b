use crate::action::WorkflowAction;
use crate::state::WorkflowState;

/// Apply one action. Never fails: legality is checked by callers.
pub fn reduce(state: &WorkflowState, action: WorkflowAction) -> WorkflowState {
    let mut next = state.clone();
    match action {
        WorkflowAction::SetInput(input) => {
            // Optimized text derived from a different input is stale.
            if next
                .optimized_data
                .as_ref()
                .is_some_and(|o| !o.matches_input(&input))
            {
                next.optimized_data = None;
            }
            next.input_data = Some(input);
        }
        WorkflowAction::SetOptimizedData(data) => next.optimized_data = data,
        WorkflowAction::NavigateToStep(step) => next.current_step = step,
        WorkflowAction::LockStep(step) => {
            next.locked_steps.insert(step);
        }
        WorkflowAction::UnlockStep(step) => {
            next.locked_steps.remove(&step);
        }
        WorkflowAction::SetProcessing(processing) => next.is_processing = processing,
        WorkflowAction::SetSelectedInputType(kind) => next.selected_input_type = kind,
        WorkflowAction::SetImageInputSource(source) => next.image_input_source = source,
        WorkflowAction::SetToolsChanges(changed) => next.has_tools_changes = changed,
        WorkflowAction::SetDontShowToolsWarning(flag) => next.dont_show_tools_warning_again = flag,
        WorkflowAction::ClearInput => {
            next.input_data = None;
            next.image_input_source = None;
            next.optimized_data = None;
        }
        WorkflowAction::Reset => {
            next = WorkflowState::initial_with_preference(state.dont_show_tools_warning_again);
        }
    }
    next
}
