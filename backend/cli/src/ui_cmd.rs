//! CLI UI Command
//!
//! Runs the interactive wizard: draws the frame, turns keys into commands,
//! runs them against the session and keeps the tools in step with the
//! workflow.

use std::time::Duration;

use anyhow::Result;
use lecturebuddy_core::{Capability, WorkflowStep};
use lecturebuddy_tools::{CapabilityPoller, PollerHandle};
use lecturebuddy_workflow::NavOutcome;
use tracing::{debug, info};
use tui::{handle_key_event, next_key, AppState, CapabilityRow, Dialog, TerminalGuard, UiCommand};

use crate::session::Session;

const KEY_POLL: Duration = Duration::from_millis(50);

pub async fn run(mut session: Session) -> Result<()> {
    let pollers: Vec<PollerHandle> = session
        .probes
        .iter()
        .map(|probe| CapabilityPoller::spawn(probe.clone(), session.poll_interval))
        .collect();
    let ocr_progress = session.optimizer.progress();

    let mut app = AppState::new();
    app.ocr_engine = session.optimizer.engine_name().to_string();
    app.camera_available = session.input.has_camera();
    if !session.store.info_dialog_seen() {
        app.open_dialog(Dialog::Info);
    }

    let mut terminal = TerminalGuard::enter()?;
    let mut step = session.store.snapshot().current_step;
    info!(session = %session.store.session_id(), "Wizard started");

    loop {
        for notice in session.drain_notices() {
            app.push_notice(notice);
        }
        refresh(&mut app, &session, &pollers, *ocr_progress.borrow()).await;
        terminal.draw(&app)?;
        if app.should_quit {
            break;
        }

        let key = tokio::task::block_in_place(|| next_key(KEY_POLL))?;
        let Some(key) = key else {
            continue;
        };
        if let Some(command) = handle_key_event(key, &mut app) {
            execute(command, &mut app, &session).await;
        }

        let current = session.store.snapshot().current_step;
        if current != step {
            on_step_change(step, current, &mut app, &session).await;
            step = current;
        }
    }

    session.input.stop_camera().await;
    session.optimizer.leave();
    info!("Wizard closed");
    Ok(())
}

/// Copy the latest store and tool state into the screen state.
async fn refresh(app: &mut AppState, session: &Session, pollers: &[PollerHandle], ocr_progress: u8) {
    app.sync_workflow(session.store.snapshot());
    app.ocr_progress = ocr_progress;
    app.camera_active = session.input.camera_active().await;

    app.messages = session.chat.messages();
    app.chat_busy = session.chat.is_busy();
    app.context_mode = session.chat.context_mode();
    app.summary = session.summarizer.summary();
    app.summary_options = session.summarizer.options();
    app.summarizing = session.summarizer.is_busy();
    app.translator = session.translator.state();

    app.capabilities = Capability::ALL
        .iter()
        .filter_map(|cap| pollers.iter().find(|p| p.capability() == *cap))
        .map(|p| CapabilityRow {
            capability: p.capability(),
            availability: p.availability(),
            download_progress: p.download_progress(),
        })
        .collect();
}

fn navigate(app: &mut AppState, outcome: NavOutcome) {
    debug!(?outcome, "Navigation");
    if matches!(outcome, NavOutcome::Reset) {
        app.text_input.clear();
        app.path_input.clear();
    }
    app.apply_outcome(outcome);
}

async fn execute(command: UiCommand, app: &mut AppState, session: &Session) {
    match command {
        UiCommand::Quit => app.should_quit = true,
        UiCommand::Back => navigate(app, session.navigator.back()),
        UiCommand::Next => navigate(app, session.navigator.next()),
        UiCommand::GoTo(target) => navigate(app, session.navigator.go_to(target)),
        UiCommand::RequestReset => navigate(app, session.navigator.request_reset()),
        UiCommand::Confirm { dont_show_again } => {
            navigate(app, session.navigator.confirm(dont_show_again))
        }
        UiCommand::CancelDialog => {
            session.navigator.cancel();
            app.close_dialog();
        }
        UiCommand::DismissInfo => {
            session.store.mark_info_dialog_seen();
            app.close_dialog();
        }

        UiCommand::SelectInputType(kind) => session.input.select_type(kind),
        UiCommand::ClearSelection => {
            session.input.clear_selection().await;
            app.text_input.clear();
            app.path_input.clear();
        }
        UiCommand::UploadFile(path) => {
            if session.input.upload_file(&path).await.is_ok() {
                app.path_input.clear();
            }
        }
        UiCommand::StartCamera => {
            let _ = session.input.start_camera().await;
        }
        UiCommand::CapturePhoto => {
            let _ = session.input.capture_photo().await;
        }
        UiCommand::StopCamera => session.input.stop_camera().await,
        UiCommand::RemoveImage => session.input.remove_image(),
        UiCommand::EditText(text) => session.input.edit_text(&text),
        UiCommand::SubmitText(text) => {
            let _ = session.input.submit_text(&text);
        }

        UiCommand::EditExtracted(text) => session.optimizer.edit_text(&text),
        UiCommand::RerunOcr => {
            if !session.optimizer.rerun() {
                debug!("OCR re-run refused");
            }
        }

        UiCommand::SendChat(text) => {
            let chat = session.chat.clone();
            tokio::spawn(async move {
                let _ = chat.send(&text).await;
            });
        }
        UiCommand::SetContextMode(mode) => session.chat.set_context_mode(mode),
        UiCommand::ClearChat => session.chat.clear(),
        UiCommand::SetSummaryOptions(options) => session.summarizer.set_options(options),
        UiCommand::Summarize => {
            let summarizer = session.summarizer.clone();
            tokio::spawn(async move {
                let _ = summarizer.summarize().await;
            });
        }
        UiCommand::ExportSummary => {
            let summarizer = session.summarizer.clone();
            let dir = session.storage_dir.clone();
            tokio::spawn(async move {
                if let Ok(path) = summarizer.export(&dir).await {
                    info!(path = %path.display(), "Summary written");
                }
            });
        }

        UiCommand::DetectLanguage => {
            let translator = session.translator.clone();
            tokio::spawn(async move { translator.detect_source().await });
        }
        UiCommand::SetSource(code) => {
            let translator = session.translator.clone();
            tokio::spawn(async move { translator.set_source(&code).await });
        }
        UiCommand::SetTarget(code) => {
            let translator = session.translator.clone();
            tokio::spawn(async move { translator.set_target(&code).await });
        }
        UiCommand::SearchCountry(query) => {
            if let Some(found) = session.translator.search_country(&query) {
                app.country_input.clear();
                let translator = session.translator.clone();
                tokio::spawn(async move { translator.set_target(&found.language_code).await });
            }
        }
        UiCommand::Locate => {
            let translator = session.translator.clone();
            tokio::spawn(async move { translator.locate().await });
        }
        UiCommand::Translate => {
            let translator = session.translator.clone();
            tokio::spawn(async move {
                let _ = translator.translate().await;
            });
        }
    }
}

/// Mount and unmount work for the steps on either side of a transition.
async fn on_step_change(from: WorkflowStep, to: WorkflowStep, app: &mut AppState, session: &Session) {
    debug!(%from, %to, "Step changed");
    match from {
        WorkflowStep::Input => session.input.stop_camera().await,
        WorkflowStep::Optimizer => session.optimizer.leave(),
        WorkflowStep::Tools => {
            session.chat.clear();
            session.summarizer.clear();
            session.translator.reset();
            session.store.set_tools_changes(false);
            app.chat_input.clear();
            app.country_input.clear();
        }
    }
    match to {
        WorkflowStep::Input => {}
        WorkflowStep::Optimizer => {
            let outcome = session.optimizer.enter();
            debug!(?outcome, "Optimizer entered");
        }
        WorkflowStep::Tools => {
            let translator = session.translator.clone();
            let locate = translator.state().location.is_none();
            tokio::spawn(async move {
                translator.detect_source().await;
                if locate {
                    translator.locate().await;
                }
            });
        }
    }
}
