use lecturebuddy_core::{ImageSource, InputData, InputKind, OptimizedData, WorkflowStep};

/// The closed set of mutations the store accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    SetInput(InputData),
    SetOptimizedData(Option<OptimizedData>),
    NavigateToStep(WorkflowStep),
    LockStep(WorkflowStep),
    UnlockStep(WorkflowStep),
    SetProcessing(bool),
    SetSelectedInputType(Option<InputKind>),
    SetImageInputSource(Option<ImageSource>),
    SetToolsChanges(bool),
    /// Also written through to the preference store.
    SetDontShowToolsWarning(bool),
    ClearInput,
    Reset,
}

impl WorkflowAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetInput(_) => "set_input",
            Self::SetOptimizedData(_) => "set_optimized_data",
            Self::NavigateToStep(_) => "navigate_to_step",
            Self::LockStep(_) => "lock_step",
            Self::UnlockStep(_) => "unlock_step",
            Self::SetProcessing(_) => "set_processing",
            Self::SetSelectedInputType(_) => "set_selected_input_type",
            Self::SetImageInputSource(_) => "set_image_input_source",
            Self::SetToolsChanges(_) => "set_tools_changes",
            Self::SetDontShowToolsWarning(_) => "set_dont_show_tools_warning",
            Self::ClearInput => "clear_input",
            Self::Reset => "reset",
        }
    }
}
