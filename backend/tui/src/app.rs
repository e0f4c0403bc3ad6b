//! TUI App State
//!
//! Everything the wizard screen shows. The runtime copies fresh snapshots in
//! from the store and the tools; key handling edits the local buffers.

use std::collections::VecDeque;

use lecturebuddy_core::{
    Availability, Capability, ChatMessage, ContextMode, Notice, NoticeLevel, SummaryOptions,
    WorkflowStep,
};
use lecturebuddy_tools::TranslatorState;
use lecturebuddy_workflow::{NavOutcome, PendingTransition, WorkflowState};

const MAX_NOTICES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolTab {
    #[default]
    Chat,
    Summarize,
    Translate,
}

impl ToolTab {
    pub const ALL: [ToolTab; 3] = [Self::Chat, Self::Summarize, Self::Translate];

    pub fn label(self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Summarize => "Summarize",
            Self::Translate => "Translate",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Chat => Self::Summarize,
            Self::Summarize => Self::Translate,
            Self::Translate => Self::Chat,
        }
    }
}

/// Modal prompts drawn over the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialog {
    LeaveTools { target: WorkflowStep },
    Reset,
    Quit,
    Info,
}

impl Dialog {
    /// Whether the prompt offers a "don't show again" checkbox.
    pub fn has_opt_out(self) -> bool {
        matches!(self, Self::LeaveTools { .. } | Self::Reset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogState {
    pub dialog: Dialog,
    pub dont_show_again: bool,
}

/// Which text buffer receives keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Editor {
    #[default]
    None,
    /// Image file path on the input step.
    Path,
    /// Lecture text on the input step.
    Text,
    /// Extracted text on the optimizer step.
    Extracted,
    Chat,
    Country,
}

/// One row of the capability panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityRow {
    pub capability: Capability,
    pub availability: Availability,
    pub download_progress: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub workflow: WorkflowState,
    pub tab: ToolTab,
    pub editor: Editor,
    pub path_input: String,
    pub text_input: String,
    pub extracted: String,
    pub chat_input: String,
    pub country_input: String,

    pub messages: Vec<ChatMessage>,
    pub chat_busy: bool,
    pub context_mode: ContextMode,
    pub summary: String,
    pub summary_options: SummaryOptions,
    pub summarizing: bool,
    pub translator: TranslatorState,

    pub ocr_engine: String,
    pub ocr_progress: u8,
    pub camera_available: bool,
    pub camera_active: bool,
    pub capabilities: Vec<CapabilityRow>,

    pub notices: VecDeque<Notice>,
    pub dialog: Option<DialogState>,
    pub should_quit: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a new workflow snapshot. Buffers the user is not editing follow
    /// the store.
    pub fn sync_workflow(&mut self, state: WorkflowState) {
        if self.editor != Editor::Extracted {
            self.extracted = state.processed_text().unwrap_or_default().to_string();
        }
        if self.editor != Editor::Text {
            if let Some(lecturebuddy_core::InputData::Text { content, .. }) = &state.input_data {
                self.text_input = content.clone();
            }
        }
        if state.current_step != self.workflow.current_step {
            self.editor = Editor::None;
        }
        self.workflow = state;
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push_back(notice);
        while self.notices.len() > MAX_NOTICES {
            self.notices.pop_front();
        }
    }

    pub fn open_dialog(&mut self, dialog: Dialog) {
        self.dialog = Some(DialogState {
            dialog,
            dont_show_again: false,
        });
    }

    pub fn close_dialog(&mut self) {
        self.dialog = None;
    }

    /// Reflect a navigation result: prompts open a dialog, denials become a
    /// warning, anything else closes whatever was open.
    pub fn apply_outcome(&mut self, outcome: NavOutcome) {
        match outcome {
            NavOutcome::AwaitingConfirmation(PendingTransition::LeaveTools { target }) => {
                self.open_dialog(Dialog::LeaveTools { target })
            }
            NavOutcome::AwaitingConfirmation(PendingTransition::Reset) => {
                self.open_dialog(Dialog::Reset)
            }
            NavOutcome::Denied(reason) => {
                self.push_notice(Notice::new(NoticeLevel::Warning, reason.to_string()))
            }
            NavOutcome::Ignored => {}
            NavOutcome::Moved(_) | NavOutcome::Cancelled | NavOutcome::Reset => self.close_dialog(),
        }
    }

    pub fn ocr_running(&self) -> bool {
        self.workflow.is_processing && self.workflow.current_step == WorkflowStep::Optimizer
    }

    pub fn availability_of(&self, capability: Capability) -> Availability {
        self.capabilities
            .iter()
            .find(|row| row.capability == capability)
            .map(|row| row.availability)
            .unwrap_or_default()
    }

    pub fn download_progress_of(&self, capability: Capability) -> Option<u8> {
        self.capabilities
            .iter()
            .find(|row| row.capability == capability)
            .and_then(|row| row.download_progress)
    }

    /// The capability a tool's primary action runs on. Chat needs the image
    /// model when the image is sent along.
    pub fn tool_capability(&self, tab: ToolTab) -> Capability {
        match tab {
            ToolTab::Chat => {
                let image_input = matches!(
                    self.workflow.input_data,
                    Some(lecturebuddy_core::InputData::Image { .. })
                );
                if image_input && self.context_mode.uses_image() {
                    Capability::LanguageModelImage
                } else {
                    Capability::LanguageModel
                }
            }
            ToolTab::Summarize => Capability::Summarizer,
            ToolTab::Translate => Capability::Translator,
        }
    }

    /// Whether a tool's primary action may run. The translator fetches
    /// language packs itself, so it only needs to be supported.
    pub fn tool_ready(&self, tab: ToolTab) -> bool {
        let availability = self.availability_of(self.tool_capability(tab));
        match tab {
            ToolTab::Translate => availability.is_supported(),
            ToolTab::Chat | ToolTab::Summarize => availability.is_ready(),
        }
    }

    /// Refuse a tool's primary action with a warning when it cannot run.
    pub fn refuse_unready(&mut self, tab: ToolTab) -> bool {
        if self.tool_ready(tab) {
            return false;
        }
        let capability = self.tool_capability(tab);
        self.push_notice(Notice::new(
            NoticeLevel::Warning,
            format!("{capability} is not ready yet"),
        ));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecturebuddy_core::{DenyReason, InputData, OptimizedData};

    #[test]
    fn notices_keep_most_recent() {
        let mut app = AppState::new();
        for i in 0..6 {
            app.push_notice(Notice::new(NoticeLevel::Info, format!("n{i}")));
        }
        assert_eq!(app.notices.len(), MAX_NOTICES);
        assert_eq!(app.notices.front().unwrap().title, "n2");
    }

    #[test]
    fn outcomes_drive_dialogs() {
        let mut app = AppState::new();
        app.apply_outcome(NavOutcome::AwaitingConfirmation(PendingTransition::LeaveTools {
            target: WorkflowStep::Optimizer,
        }));
        assert_eq!(
            app.dialog.map(|d| d.dialog),
            Some(Dialog::LeaveTools {
                target: WorkflowStep::Optimizer
            })
        );
        app.apply_outcome(NavOutcome::Moved(WorkflowStep::Optimizer));
        assert!(app.dialog.is_none());

        app.apply_outcome(NavOutcome::Denied(DenyReason::StepLocked));
        assert_eq!(app.notices.back().unwrap().level, NoticeLevel::Warning);
    }

    #[test]
    fn extracted_buffer_follows_store_unless_edited() {
        let mut app = AppState::new();
        let input = InputData::text("from the store");
        let mut state = WorkflowState::default();
        state.optimized_data = Some(OptimizedData::passthrough(&input));
        state.input_data = Some(input);

        app.sync_workflow(state.clone());
        assert_eq!(app.extracted, "from the store");
        assert_eq!(app.text_input, "from the store");

        app.editor = Editor::Extracted;
        app.extracted = "typing...".into();
        app.sync_workflow(state);
        assert_eq!(app.extracted, "typing...");
    }

    #[test]
    fn tool_readiness_follows_capabilities() {
        let mut app = AppState::new();
        assert!(!app.tool_ready(ToolTab::Summarize));

        app.capabilities = vec![
            CapabilityRow {
                capability: Capability::Summarizer,
                availability: Availability::Downloading,
                download_progress: Some(30),
            },
            CapabilityRow {
                capability: Capability::Translator,
                availability: Availability::Downloadable,
                download_progress: None,
            },
        ];
        assert!(!app.tool_ready(ToolTab::Summarize));
        assert!(app.tool_ready(ToolTab::Translate));
        assert_eq!(app.download_progress_of(Capability::Summarizer), Some(30));

        assert!(app.refuse_unready(ToolTab::Summarize));
        assert_eq!(app.notices.back().unwrap().title, "Summarizer is not ready yet");
        assert!(!app.refuse_unready(ToolTab::Translate));
    }

    #[test]
    fn chat_with_image_needs_image_model() {
        let mut app = AppState::new();
        assert_eq!(app.tool_capability(ToolTab::Chat), Capability::LanguageModel);
        app.workflow.input_data = Some(InputData::image(
            "data:image/png;base64,AAAA",
            lecturebuddy_core::ImageSource::Upload,
        ));
        app.context_mode = ContextMode::Both;
        assert_eq!(app.tool_capability(ToolTab::Chat), Capability::LanguageModelImage);
        app.context_mode = ContextMode::Text;
        assert_eq!(app.tool_capability(ToolTab::Chat), Capability::LanguageModel);
    }

    #[test]
    fn step_change_leaves_editor() {
        let mut app = AppState::new();
        app.editor = Editor::Path;
        let state = WorkflowState {
            current_step: WorkflowStep::Optimizer,
            ..WorkflowState::default()
        };
        app.sync_workflow(state);
        assert_eq!(app.editor, Editor::None);
    }
}
