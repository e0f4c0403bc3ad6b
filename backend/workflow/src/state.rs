use std::collections::BTreeSet;

use lecturebuddy_core::{ImageSource, InputData, InputKind, OptimizedData, WorkflowStep};
use serde::Serialize;

/// The whole wizard state. Replaced atomically on every dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowState {
    pub current_step: WorkflowStep,
    pub input_data: Option<InputData>,
    pub optimized_data: Option<OptimizedData>,
    pub locked_steps: BTreeSet<WorkflowStep>,
    pub is_processing: bool,
    pub selected_input_type: Option<InputKind>,
    pub image_input_source: Option<ImageSource>,
    pub has_tools_changes: bool,
    pub dont_show_tools_warning_again: bool,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            current_step: WorkflowStep::Input,
            input_data: None,
            optimized_data: None,
            locked_steps: BTreeSet::new(),
            is_processing: false,
            selected_input_type: None,
            image_input_source: None,
            has_tools_changes: false,
            dont_show_tools_warning_again: false,
        }
    }
}

/// How one step appears in the step indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepView {
    pub step: WorkflowStep,
    pub active: bool,
    pub completed: bool,
    pub locked: bool,
}

impl WorkflowState {
    /// Fresh state that keeps only the warning opt-out.
    pub fn initial_with_preference(dont_show_tools_warning_again: bool) -> Self {
        Self {
            dont_show_tools_warning_again,
            ..Self::default()
        }
    }

    pub fn is_locked(&self, step: WorkflowStep) -> bool {
        self.locked_steps.contains(&step)
    }

    pub fn step_views(&self) -> [StepView; 3] {
        WorkflowStep::ALL.map(|step| StepView {
            step,
            active: step == self.current_step,
            completed: step < self.current_step,
            locked: self.is_locked(step),
        })
    }

    /// Whether the current step has produced what the next one needs.
    pub fn can_proceed(&self) -> bool {
        match self.current_step {
            WorkflowStep::Input => self.input_data.is_some(),
            WorkflowStep::Optimizer => self.optimized_data.is_some(),
            WorkflowStep::Tools => false,
        }
    }

    pub fn back_enabled(&self) -> bool {
        self.current_step.previous().is_some() && !self.is_processing
    }

    pub fn next_enabled(&self) -> bool {
        self.current_step.next().is_some() && self.can_proceed() && !self.is_processing
    }

    /// Anything a reset would throw away.
    pub fn has_unsaved_data(&self) -> bool {
        self.input_data.is_some() || self.optimized_data.is_some()
    }

    pub fn should_warn_on_leaving_tools(&self) -> bool {
        self.current_step == WorkflowStep::Tools
            && self.has_tools_changes
            && !self.dont_show_tools_warning_again
    }

    /// Text the tools operate on.
    pub fn processed_text(&self) -> Option<&str> {
        self.optimized_data
            .as_ref()
            .map(|o| o.processed_text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_empty() {
        let state = WorkflowState::default();
        assert_eq!(state.current_step, WorkflowStep::Input);
        assert!(state.locked_steps.is_empty());
        assert!(!state.can_proceed());
        assert!(!state.back_enabled());
        assert!(!state.next_enabled());
        assert!(!state.has_unsaved_data());
    }

    #[test]
    fn next_requires_input_and_idle() {
        let mut state = WorkflowState {
            input_data: Some(InputData::text("notes")),
            ..Default::default()
        };
        assert!(state.next_enabled());
        state.is_processing = true;
        assert!(!state.next_enabled());
    }

    #[test]
    fn tools_never_proceeds() {
        let input = InputData::text("notes");
        let state = WorkflowState {
            current_step: WorkflowStep::Tools,
            optimized_data: Some(OptimizedData::passthrough(&input)),
            input_data: Some(input),
            ..Default::default()
        };
        assert!(!state.can_proceed());
        assert!(!state.next_enabled());
        assert!(state.back_enabled());
    }

    #[test]
    fn step_views_mark_progress() {
        let mut state = WorkflowState {
            current_step: WorkflowStep::Optimizer,
            ..Default::default()
        };
        state.locked_steps.insert(WorkflowStep::Optimizer);
        let views = state.step_views();
        assert!(views[0].completed && !views[0].active);
        assert!(views[1].active && views[1].locked);
        assert!(!views[2].completed && !views[2].locked);
    }

    #[test]
    fn warning_needs_all_three_conditions() {
        let mut state = WorkflowState {
            current_step: WorkflowStep::Tools,
            has_tools_changes: true,
            ..Default::default()
        };
        assert!(state.should_warn_on_leaving_tools());
        state.dont_show_tools_warning_again = true;
        assert!(!state.should_warn_on_leaving_tools());
        state.dont_show_tools_warning_again = false;
        state.current_step = WorkflowStep::Optimizer;
        assert!(!state.should_warn_on_leaving_tools());
    }
}
