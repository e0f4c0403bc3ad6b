//! CLI Process Command
//!
//! Runs input, optimization and the requested tools without the wizard,
//! through the same store, navigator and controllers.

use std::path::PathBuf;

use anyhow::{bail, Result};
use lecturebuddy_core::{InputKind, Notice, NoticeLevel, SummaryFormat, WorkflowStep};
use lecturebuddy_workflow::NavOutcome;
use logging::{EventLogger, WorkflowEvent};
use markdown::{IrParser, Renderer};
use tracing::info;

use crate::session::Session;
use crate::terminal_output::{note, supports_color, BOLD, RESET};

/// Where the lecture material comes from.
#[derive(Debug, Clone)]
pub enum Source {
    Image(PathBuf),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub struct Tasks {
    pub summarize: bool,
    pub translate_to: Option<String>,
}

pub async fn run(mut session: Session, source: Source, tasks: Tasks) -> Result<()> {
    let outcome = capture(&session, &source).await;
    flush_notices(&mut session);
    outcome?;

    advance(&session, WorkflowStep::Optimizer)?;
    session.optimizer.enter();
    session.optimizer.join().await;
    flush_notices(&mut session);

    let Some(text) = session
        .store
        .snapshot()
        .processed_text()
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
    else {
        bail!("No text could be extracted from the input");
    };
    section("Extracted text");
    println!("{text}\n");

    if !tasks.summarize && tasks.translate_to.is_none() {
        return Ok(());
    }
    advance(&session, WorkflowStep::Tools)?;

    let mut failed = false;
    if tasks.summarize {
        let result = session.summarizer.summarize().await;
        flush_notices(&mut session);
        record(&session, "summarizer", &result);
        match result {
            Ok(summary) => {
                section("Summary");
                println!("{}\n", render_summary(&summary, session.summarizer.options().format));
            }
            Err(_) => failed = true,
        }
    }

    if let Some(target) = &tasks.translate_to {
        let result = translate(&session, target).await;
        flush_notices(&mut session);
        record(&session, "translator", &result);
        match result {
            Ok(translated) => {
                section(&format!("Translation ({target})"));
                println!("{translated}\n");
            }
            Err(e) => {
                note(NoticeLevel::Error, &e.to_string());
                failed = true;
            }
        }
    }

    if failed {
        bail!("One or more tools failed");
    }
    Ok(())
}

async fn capture(session: &Session, source: &Source) -> Result<()> {
    match source {
        Source::Image(path) => {
            session.input.select_type(InputKind::Image);
            session.input.upload_file(path).await?;
        }
        Source::Text(text) => {
            session.input.select_type(InputKind::Text);
            session.input.submit_text(text)?;
        }
    }
    Ok(())
}

fn advance(session: &Session, expected: WorkflowStep) -> Result<()> {
    match session.navigator.next() {
        NavOutcome::Moved(step) if step == expected => {
            info!(%step, "Advanced");
            Ok(())
        }
        NavOutcome::Denied(reason) => bail!("Cannot continue to {expected}: {reason}"),
        other => bail!("Cannot continue to {expected}: {other:?}"),
    }
}

async fn translate(session: &Session, target: &str) -> Result<String> {
    let translator = &session.translator;
    translator.detect_source().await;
    if translator.state().source.is_none() {
        bail!("Could not detect the language of the text");
    }
    translator.set_target(target).await;
    Ok(translator.translate().await?)
}

fn render_summary(summary: &str, format: SummaryFormat) -> String {
    match format {
        SummaryFormat::PlainText => summary.to_string(),
        SummaryFormat::Markdown => {
            let nodes = IrParser::parse(summary);
            if supports_color() {
                Renderer::to_ansi(&nodes)
            } else {
                Renderer::to_plain_text(&nodes)
            }
        }
    }
}

fn section(title: &str) {
    if supports_color() {
        println!("{BOLD}{title}{RESET}");
    } else {
        println!("{title}");
    }
}

fn record<T, E: std::fmt::Display>(session: &Session, tool: &str, result: &Result<T, E>) {
    let (outcome, detail) = match result {
        Ok(_) => ("ok", None),
        Err(e) => ("failed", Some(e.to_string())),
    };
    EventLogger::log_event(
        session.store.session_id(),
        WorkflowEvent::ToolRun {
            tool: tool.to_string(),
            outcome: outcome.to_string(),
            detail,
        },
    );
}

fn flush_notices(session: &mut Session) {
    for notice in session.drain_notices() {
        print_notice(&notice);
    }
}

fn print_notice(notice: &Notice) {
    let text = match &notice.detail {
        Some(detail) if !detail.is_empty() => format!("{}: {detail}", notice.title),
        _ => notice.title.clone(),
    };
    note(notice.level, &text);
}
