//! Keyboard Input Handler
//!
//! Turns crossterm key events into buffer edits on `AppState` and, where the
//! key means more than typing, a `UiCommand` for the runtime to execute.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lecturebuddy_core::{
    ContextMode, InputKind, SummaryFormat, SummaryLength, SummaryOptions, SummaryType, WorkflowStep,
};

use crate::app::{AppState, Dialog, Editor, ToolTab};

/// Work the runtime performs against the store and controllers.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Quit,
    Back,
    Next,
    GoTo(WorkflowStep),
    RequestReset,
    Confirm { dont_show_again: bool },
    CancelDialog,
    DismissInfo,

    SelectInputType(InputKind),
    ClearSelection,
    UploadFile(PathBuf),
    StartCamera,
    CapturePhoto,
    StopCamera,
    RemoveImage,
    EditText(String),
    SubmitText(String),

    EditExtracted(String),
    RerunOcr,

    SendChat(String),
    SetContextMode(ContextMode),
    ClearChat,
    SetSummaryOptions(SummaryOptions),
    Summarize,
    ExportSummary,
    DetectLanguage,
    SetSource(String),
    SetTarget(String),
    SearchCountry(String),
    Locate,
    Translate,
}

/// Handles a single key press.
pub fn handle_key_event(key: KeyEvent, state: &mut AppState) -> Option<UiCommand> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UiCommand::Quit);
    }
    if state.dialog.is_some() {
        return handle_dialog_key(key, state);
    }
    if state.editor != Editor::None {
        return handle_editor_key(key, state);
    }

    match key.code {
        KeyCode::Char('q') => {
            if state.workflow.has_unsaved_data() {
                state.open_dialog(Dialog::Quit);
                return None;
            }
            return Some(UiCommand::Quit);
        }
        KeyCode::Left | KeyCode::Char('b') => return Some(UiCommand::Back),
        KeyCode::Right | KeyCode::Char('n') => return Some(UiCommand::Next),
        KeyCode::Char(c @ '1'..='3') => {
            let index = c as usize - '1' as usize;
            return WorkflowStep::from_index(index).map(UiCommand::GoTo);
        }
        KeyCode::Char('r') => return Some(UiCommand::RequestReset),
        KeyCode::Char('?') => {
            state.open_dialog(Dialog::Info);
            return None;
        }
        _ => {}
    }

    match state.workflow.current_step {
        WorkflowStep::Input => input_step_key(key, state),
        WorkflowStep::Optimizer => optimizer_step_key(key, state),
        WorkflowStep::Tools => tools_step_key(key, state),
    }
}

fn handle_dialog_key(key: KeyEvent, state: &mut AppState) -> Option<UiCommand> {
    let dialog = state.dialog?;
    if dialog.dialog == Dialog::Info {
        return match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('y') => {
                state.close_dialog();
                Some(UiCommand::DismissInfo)
            }
            _ => None,
        };
    }
    match key.code {
        KeyCode::Enter | KeyCode::Char('y') => {
            if dialog.dialog == Dialog::Quit {
                state.close_dialog();
                return Some(UiCommand::Quit);
            }
            Some(UiCommand::Confirm {
                dont_show_again: dialog.dont_show_again,
            })
        }
        KeyCode::Esc | KeyCode::Char('n') => {
            state.close_dialog();
            if dialog.dialog == Dialog::Quit {
                return None;
            }
            Some(UiCommand::CancelDialog)
        }
        KeyCode::Char(' ') | KeyCode::Char('d') if dialog.dialog.has_opt_out() => {
            if let Some(open) = state.dialog.as_mut() {
                open.dont_show_again = !open.dont_show_again;
            }
            None
        }
        _ => None,
    }
}

fn buffer_mut(state: &mut AppState) -> Option<&mut String> {
    match state.editor {
        Editor::None => None,
        Editor::Path => Some(&mut state.path_input),
        Editor::Text => Some(&mut state.text_input),
        Editor::Extracted => Some(&mut state.extracted),
        Editor::Chat => Some(&mut state.chat_input),
        Editor::Country => Some(&mut state.country_input),
    }
}

/// Multi-line editors take Enter as a newline and finish on Esc; single-line
/// editors submit on Enter.
fn handle_editor_key(key: KeyEvent, state: &mut AppState) -> Option<UiCommand> {
    let editor = state.editor;
    let multiline = matches!(editor, Editor::Text | Editor::Extracted);

    match key.code {
        KeyCode::Esc => {
            state.editor = Editor::None;
            match editor {
                Editor::Text => Some(UiCommand::SubmitText(state.text_input.clone())),
                _ => None,
            }
        }
        KeyCode::Enter if !multiline => {
            state.editor = Editor::None;
            match editor {
                Editor::Path => {
                    let path = state.path_input.trim().to_string();
                    (!path.is_empty()).then(|| UiCommand::UploadFile(PathBuf::from(path)))
                }
                Editor::Chat => {
                    if state.chat_input.trim().is_empty() {
                        return None;
                    }
                    if state.refuse_unready(ToolTab::Chat) {
                        state.editor = Editor::Chat;
                        return None;
                    }
                    Some(UiCommand::SendChat(std::mem::take(&mut state.chat_input)))
                }
                Editor::Country => Some(UiCommand::SearchCountry(state.country_input.clone())),
                _ => None,
            }
        }
        KeyCode::Enter => {
            buffer_mut(state)?.push('\n');
            edited(editor, state)
        }
        KeyCode::Backspace => {
            buffer_mut(state)?.pop();
            edited(editor, state)
        }
        KeyCode::Char(c) => {
            buffer_mut(state)?.push(c);
            edited(editor, state)
        }
        _ => None,
    }
}

/// Buffers with a debounced save report every change.
fn edited(editor: Editor, state: &AppState) -> Option<UiCommand> {
    match editor {
        Editor::Text => Some(UiCommand::EditText(state.text_input.clone())),
        Editor::Extracted => Some(UiCommand::EditExtracted(state.extracted.clone())),
        _ => None,
    }
}

fn input_step_key(key: KeyEvent, state: &mut AppState) -> Option<UiCommand> {
    match key.code {
        KeyCode::Char('i') => Some(UiCommand::SelectInputType(InputKind::Image)),
        KeyCode::Char('t') => Some(UiCommand::SelectInputType(InputKind::Text)),
        KeyCode::Char('x') => Some(UiCommand::ClearSelection),
        _ => match state.workflow.selected_input_type {
            Some(InputKind::Image) => match key.code {
                KeyCode::Char('u') => {
                    state.editor = Editor::Path;
                    None
                }
                KeyCode::Char('c') if state.camera_active => Some(UiCommand::CapturePhoto),
                KeyCode::Char('c') if state.camera_available => Some(UiCommand::StartCamera),
                KeyCode::Char('s') if state.camera_active => Some(UiCommand::StopCamera),
                KeyCode::Char('d') => Some(UiCommand::RemoveImage),
                _ => None,
            },
            Some(InputKind::Text) => match key.code {
                KeyCode::Char('e') | KeyCode::Enter => {
                    state.editor = Editor::Text;
                    None
                }
                _ => None,
            },
            None => None,
        },
    }
}

fn optimizer_step_key(key: KeyEvent, state: &mut AppState) -> Option<UiCommand> {
    match key.code {
        KeyCode::Char('e') if !state.workflow.is_processing && state.workflow.optimized_data.is_some() => {
            state.editor = Editor::Extracted;
            None
        }
        KeyCode::Char('o') => Some(UiCommand::RerunOcr),
        _ => None,
    }
}

fn next_context_mode(mode: ContextMode) -> ContextMode {
    match mode {
        ContextMode::Text => ContextMode::Image,
        ContextMode::Image => ContextMode::Both,
        ContextMode::Both => ContextMode::Text,
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T) -> T {
    let pos = all.iter().position(|v| *v == current).unwrap_or(0);
    all[(pos + 1) % all.len()]
}

/// Next entry after `current` in `codes`, wrapping; the first when nothing matches.
fn cycle_code(codes: &[String], current: Option<&str>) -> Option<String> {
    if codes.is_empty() {
        return None;
    }
    let next = match current.and_then(|c| codes.iter().position(|code| code == c)) {
        Some(pos) => (pos + 1) % codes.len(),
        None => 0,
    };
    Some(codes[next].clone())
}

fn tools_step_key(key: KeyEvent, state: &mut AppState) -> Option<UiCommand> {
    if key.code == KeyCode::Tab {
        state.tab = state.tab.next();
        return None;
    }
    match state.tab {
        ToolTab::Chat => match key.code {
            KeyCode::Char('e') | KeyCode::Enter => {
                state.editor = Editor::Chat;
                None
            }
            KeyCode::Char('m') => Some(UiCommand::SetContextMode(next_context_mode(state.context_mode))),
            KeyCode::Char('c') => Some(UiCommand::ClearChat),
            _ => None,
        },
        ToolTab::Summarize => {
            let mut options = state.summary_options;
            match key.code {
                KeyCode::Char('g') | KeyCode::Enter => {
                    if state.refuse_unready(ToolTab::Summarize) {
                        return None;
                    }
                    return Some(UiCommand::Summarize);
                }
                KeyCode::Char('w') => return Some(UiCommand::ExportSummary),
                KeyCode::Char('y') => options.kind = cycle(&SummaryType::ALL, options.kind),
                KeyCode::Char('f') => {
                    options.format = cycle(&[SummaryFormat::Markdown, SummaryFormat::PlainText], options.format)
                }
                KeyCode::Char('l') => {
                    options.length = cycle(
                        &[SummaryLength::Short, SummaryLength::Medium, SummaryLength::Long],
                        options.length,
                    )
                }
                _ => return None,
            }
            Some(UiCommand::SetSummaryOptions(options))
        }
        ToolTab::Translate => match key.code {
            KeyCode::Char('g') | KeyCode::Enter => {
                (!state.refuse_unready(ToolTab::Translate)).then_some(UiCommand::Translate)
            }
            KeyCode::Char('d') => Some(UiCommand::DetectLanguage),
            KeyCode::Char('l') => Some(UiCommand::Locate),
            KeyCode::Char('f') => {
                state.editor = Editor::Country;
                None
            }
            KeyCode::Char('s') => {
                let codes: Vec<String> = state.translator.detections.iter().map(|d| d.language.clone()).collect();
                cycle_code(&codes, state.translator.source.as_deref()).map(UiCommand::SetSource)
            }
            KeyCode::Char('t') => {
                let codes: Vec<String> = state
                    .translator
                    .target_candidates()
                    .into_iter()
                    .map(|c| c.code)
                    .collect();
                cycle_code(&codes, state.translator.target.as_deref()).map(UiCommand::SetTarget)
            }
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{CapabilityRow, DialogState};
    use lecturebuddy_core::{Availability, Capability, DetectedLanguage, InputData};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn tools_with(availability: Availability) -> AppState {
        let mut state = AppState::new();
        state.workflow.current_step = WorkflowStep::Tools;
        state.capabilities = Capability::ALL
            .iter()
            .map(|capability| CapabilityRow {
                capability: *capability,
                availability,
                download_progress: None,
            })
            .collect();
        state
    }

    fn type_str(state: &mut AppState, text: &str) -> Vec<UiCommand> {
        text.chars()
            .filter_map(|c| handle_key_event(press(KeyCode::Char(c)), state))
            .collect()
    }

    #[test]
    fn ctrl_c_always_quits() {
        let mut state = AppState::new();
        state.open_dialog(Dialog::Reset);
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key_event(key, &mut state), Some(UiCommand::Quit));
    }

    #[test]
    fn quit_with_unsaved_data_asks_first() {
        let mut state = AppState::new();
        state.workflow.input_data = Some(InputData::text("notes"));
        assert_eq!(handle_key_event(press(KeyCode::Char('q')), &mut state), None);
        assert_eq!(state.dialog.map(|d| d.dialog), Some(Dialog::Quit));
        assert_eq!(handle_key_event(press(KeyCode::Char('y')), &mut state), Some(UiCommand::Quit));
    }

    #[test]
    fn dialog_opt_out_toggles_and_confirms() {
        let mut state = AppState::new();
        state.dialog = Some(DialogState {
            dialog: Dialog::LeaveTools {
                target: WorkflowStep::Optimizer,
            },
            dont_show_again: false,
        });
        assert_eq!(handle_key_event(press(KeyCode::Char(' ')), &mut state), None);
        assert_eq!(
            handle_key_event(press(KeyCode::Enter), &mut state),
            Some(UiCommand::Confirm { dont_show_again: true })
        );
    }

    #[test]
    fn number_keys_jump_to_steps() {
        let mut state = AppState::new();
        assert_eq!(
            handle_key_event(press(KeyCode::Char('3')), &mut state),
            Some(UiCommand::GoTo(WorkflowStep::Tools))
        );
    }

    #[test]
    fn text_editor_reports_edits_and_submits_on_esc() {
        let mut state = AppState::new();
        state.workflow.selected_input_type = Some(InputKind::Text);
        assert_eq!(handle_key_event(press(KeyCode::Char('e')), &mut state), None);
        assert_eq!(state.editor, Editor::Text);

        let edits = type_str(&mut state, "hi");
        assert_eq!(edits.last(), Some(&UiCommand::EditText("hi".into())));
        assert_eq!(
            handle_key_event(press(KeyCode::Esc), &mut state),
            Some(UiCommand::SubmitText("hi".into()))
        );
        assert_eq!(state.editor, Editor::None);
    }

    #[test]
    fn path_editor_uploads_on_enter() {
        let mut state = AppState::new();
        state.workflow.selected_input_type = Some(InputKind::Image);
        handle_key_event(press(KeyCode::Char('u')), &mut state);
        type_str(&mut state, "board.png");
        assert_eq!(
            handle_key_event(press(KeyCode::Enter), &mut state),
            Some(UiCommand::UploadFile(PathBuf::from("board.png")))
        );
    }

    #[test]
    fn chat_editor_sends_and_clears_buffer() {
        let mut state = tools_with(Availability::Available);
        handle_key_event(press(KeyCode::Enter), &mut state);
        type_str(&mut state, "why?");
        assert_eq!(
            handle_key_event(press(KeyCode::Enter), &mut state),
            Some(UiCommand::SendChat("why?".into()))
        );
        assert!(state.chat_input.is_empty());
    }

    #[test]
    fn unready_chat_keeps_message_and_warns() {
        let mut state = tools_with(Availability::Downloading);
        handle_key_event(press(KeyCode::Enter), &mut state);
        type_str(&mut state, "why?");
        assert_eq!(handle_key_event(press(KeyCode::Enter), &mut state), None);
        assert_eq!(state.chat_input, "why?");
        assert_eq!(state.editor, Editor::Chat);
        assert_eq!(state.notices.back().unwrap().title, "AI Chat is not ready yet");
    }

    #[test]
    fn unavailable_tools_refuse_their_action() {
        let mut state = tools_with(Availability::Unavailable);
        state.tab = ToolTab::Summarize;
        assert_eq!(handle_key_event(press(KeyCode::Char('g')), &mut state), None);
        state.tab = ToolTab::Translate;
        assert_eq!(handle_key_event(press(KeyCode::Char('g')), &mut state), None);
        assert_eq!(state.notices.len(), 2);

        let mut state = tools_with(Availability::Downloadable);
        state.tab = ToolTab::Translate;
        assert_eq!(
            handle_key_event(press(KeyCode::Char('g')), &mut state),
            Some(UiCommand::Translate)
        );
    }

    #[test]
    fn summary_options_cycle() {
        let mut state = AppState::new();
        state.workflow.current_step = WorkflowStep::Tools;
        state.tab = ToolTab::Summarize;
        let Some(UiCommand::SetSummaryOptions(opts)) = handle_key_event(press(KeyCode::Char('y')), &mut state)
        else {
            panic!("expected options");
        };
        assert_eq!(opts.kind, SummaryType::Tldr);
    }

    #[test]
    fn source_cycles_through_detections() {
        let mut state = AppState::new();
        state.workflow.current_step = WorkflowStep::Tools;
        state.tab = ToolTab::Translate;
        state.translator.detections = vec![
            DetectedLanguage {
                language: "de".into(),
                confidence: 0.9,
            },
            DetectedLanguage {
                language: "nl".into(),
                confidence: 0.1,
            },
        ];
        state.translator.source = Some("de".into());
        assert_eq!(
            handle_key_event(press(KeyCode::Char('s')), &mut state),
            Some(UiCommand::SetSource("nl".into()))
        );
    }
}
