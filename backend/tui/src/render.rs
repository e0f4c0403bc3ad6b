//! TUI Rendering
//!
//! Translates `AppState` into ratatui widgets: step indicator, the active
//! step's pane, notices, the Back/Next bar and any open dialog.

use lecturebuddy_core::{
    Availability, ChatRole, ImageSource, InputData, InputKind, NoticeLevel, SummaryFormat, WorkflowStep,
    language::language_name,
};
use lecturebuddy_workflow::MAX_TEXT_CHARS;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Tabs, Wrap},
};

use crate::app::{AppState, Dialog, Editor, ToolTab};
use crate::markdown_view::markdown_lines;

const CURSOR: &str = "▏";

/// Main draw function.
pub fn draw_ui(f: &mut Frame, state: &AppState) {
    let notice_height = if state.notices.is_empty() {
        0
    } else {
        state.notices.len() as u16 + 2
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Step indicator
            Constraint::Min(6),                // Step pane
            Constraint::Length(notice_height), // Notices
            Constraint::Length(3),             // Back / Next
        ])
        .split(f.size());

    render_steps(f, chunks[0], state);
    match state.workflow.current_step {
        WorkflowStep::Input => render_input(f, chunks[1], state),
        WorkflowStep::Optimizer => render_optimizer(f, chunks[1], state),
        WorkflowStep::Tools => render_tools(f, chunks[1], state),
    }
    if notice_height > 0 {
        render_notices(f, chunks[2], state);
    }
    render_nav_bar(f, chunks[3], state);

    if let Some(open) = state.dialog {
        render_dialog(f, open.dialog, open.dont_show_again);
    }
}

fn render_steps(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![Span::styled(
        "Lecture Buddy  ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    for (i, view) in state.workflow.step_views().iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        let marker = if view.completed { "✓" } else { "" };
        let mut text = format!("{} {}{}", i + 1, view.step.label(), marker);
        if view.locked {
            text.push_str(" (processing)");
        }
        let style = if view.active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if view.completed {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(text, style));
    }
    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn hint_span(text: &str) -> Span<'static> {
    Span::styled(text.to_string(), Style::default().fg(Color::DarkGray))
}

fn hint(text: &str) -> Line<'static> {
    Line::from(hint_span(text))
}

/// A tool's primary action; disabled actions stay visible.
fn action(label: &str, enabled: bool) -> Span<'static> {
    if enabled {
        Span::styled(label.to_string(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
    } else {
        Span::styled(
            format!("{label} (disabled)"),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT),
        )
    }
}

/// Persistent warning for a tool whose capability cannot run right now.
fn capability_warning(state: &AppState, tab: ToolTab) -> Option<Line<'static>> {
    let capability = state.tool_capability(tab);
    match state.availability_of(capability) {
        Availability::Available => None,
        Availability::Unavailable => Some(Line::from(Span::styled(
            format!("⚠ {capability} is not available. Check that the model server is running."),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))),
        _ if tab == ToolTab::Translate => None,
        Availability::Downloadable | Availability::Downloading => {
            let progress = state
                .download_progress_of(capability)
                .map(|p| format!(" {p}%"))
                .unwrap_or_default();
            Some(Line::from(Span::styled(
                format!("⚠ {capability} model is downloading{progress}. It can be used once ready."),
                Style::default().fg(Color::Yellow),
            )))
        }
    }
}

fn edit_line(label: &str, buffer: &str, editing: bool) -> Line<'static> {
    let mut spans = vec![
        Span::styled(format!("{label}: "), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(buffer.to_string()),
    ];
    if editing {
        spans.push(Span::styled(CURSOR, Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

/// Approximate decoded size of a base64 data URI.
fn data_uri_kib(uri: &str) -> usize {
    let payload = uri.split_once(',').map(|(_, p)| p).unwrap_or(uri);
    payload.len() * 3 / 4 / 1024
}

fn render_input(f: &mut Frame, area: Rect, state: &AppState) {
    let wf = &state.workflow;
    let selected = match wf.selected_input_type {
        Some(InputKind::Image) => "Image",
        Some(InputKind::Text) => "Text",
        None => "none",
    };
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Input type: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(selected),
        ]),
        hint("[i] image  [t] text  [x] clear selection"),
        Line::default(),
    ];

    match wf.selected_input_type {
        Some(InputKind::Image) => {
            match &wf.input_data {
                Some(InputData::Image { data, source, .. }) => {
                    let origin = match source {
                        ImageSource::Upload => "uploaded",
                        ImageSource::Camera => "captured from camera",
                    };
                    lines.push(Line::from(Span::styled(
                        format!("Image {origin}, {} KiB", data_uri_kib(data)),
                        Style::default().fg(Color::Green),
                    )));
                    lines.push(hint("[d] remove image"));
                }
                _ => lines.push(Line::from("No image yet.")),
            }
            if state.editor == Editor::Path {
                lines.push(edit_line("Path", &state.path_input, true));
                lines.push(hint("Enter to upload, Esc to cancel"));
            } else {
                lines.push(hint("[u] upload an image file (max 10MB)"));
            }
            if state.camera_active {
                lines.push(Line::from(Span::styled("Camera is on", Style::default().fg(Color::Yellow))));
                lines.push(hint("[c] capture photo  [s] stop camera"));
            } else if state.camera_available {
                lines.push(hint("[c] start camera"));
            }
        }
        Some(InputKind::Text) => {
            let editing = state.editor == Editor::Text;
            let count = state.text_input.trim().chars().count();
            let counter_style = if count > MAX_TEXT_CHARS {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            lines.push(Line::from(Span::styled(format!("{count}/{MAX_TEXT_CHARS} characters"), counter_style)));
            lines.push(if editing {
                hint("Typing... Esc to save")
            } else {
                hint("[e] edit text")
            });
            lines.push(Line::default());
            for line in state.text_input.split('\n') {
                lines.push(Line::from(line.to_string()));
            }
            if editing {
                if let Some(last) = lines.last_mut() {
                    last.spans.push(Span::styled(CURSOR, Style::default().fg(Color::Yellow)));
                }
            }
        }
        None => lines.push(Line::from("Choose how to provide your lecture material.")),
    }

    let pane = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().title("1. Input").borders(Borders::ALL));
    f.render_widget(pane, area);
}

fn render_optimizer(f: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("2. Data Optimization").borders(Borders::ALL);
    let wf = &state.workflow;

    if state.ocr_running() {
        let inner = block.inner(area);
        f.render_widget(block, area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(3), Constraint::Min(0)])
            .split(inner);
        f.render_widget(
            Paragraph::new(format!("Extracting text with {}...", state.ocr_engine)),
            rows[0],
        );
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Cyan))
            .percent(u16::from(state.ocr_progress.min(100)));
        f.render_widget(gauge, rows[1]);
        return;
    }

    let mut lines = Vec::new();
    match &wf.optimized_data {
        Some(data) => {
            let meta = &data.metadata;
            let mut facts = Vec::new();
            if let Some(confidence) = meta.ocr_confidence {
                facts.push(format!("OCR confidence {confidence:.0}%"));
            }
            if let Some(ms) = meta.processing_time_ms {
                facts.push(format!("{ms} ms"));
            }
            if meta.edited_manually == Some(true) {
                facts.push("edited".to_string());
            }
            if !facts.is_empty() {
                lines.push(hint(&facts.join(" · ")));
            }
            let editing = state.editor == Editor::Extracted;
            let is_image = matches!(wf.input_data, Some(InputData::Image { .. }));
            lines.push(match (editing, is_image) {
                (true, _) => hint("Editing... changes save automatically, Esc to finish"),
                (false, true) => hint("[e] edit text  [o] re-run OCR"),
                (false, false) => hint("[e] edit text"),
            });
            lines.push(Line::default());
            for line in state.extracted.split('\n') {
                lines.push(Line::from(line.to_string()));
            }
            if editing {
                if let Some(last) = lines.last_mut() {
                    last.spans.push(Span::styled(CURSOR, Style::default().fg(Color::Yellow)));
                }
            }
        }
        None if wf.input_data.is_none() => lines.push(Line::from("Nothing to optimize yet. Go back and add input.")),
        None => {
            lines.push(Line::from("No text extracted."));
            lines.push(hint("[o] run OCR again"));
        }
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

fn render_tools(f: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
        .split(area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(columns[0]);

    let selected = ToolTab::ALL.iter().position(|t| *t == state.tab).unwrap_or(0);
    let tabs = Tabs::new(ToolTab::ALL.iter().map(|t| t.label()).collect::<Vec<_>>())
        .select(selected)
        .block(Block::default().title("3. Tools  [Tab] switch").borders(Borders::ALL))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, rows[0]);

    match state.tab {
        ToolTab::Chat => render_chat(f, rows[1], state),
        ToolTab::Summarize => render_summary(f, rows[1], state),
        ToolTab::Translate => render_translator(f, rows[1], state),
    }
    render_capabilities(f, columns[1], state);
}

/// Scroll offset that keeps the tail of `lines` in view.
fn tail_scroll(lines: &[Line<'_>], area: Rect) -> u16 {
    let visible = area.height.saturating_sub(2) as usize;
    lines.len().saturating_sub(visible).min(u16::MAX as usize) as u16
}

fn render_chat(f: &mut Frame, area: Rect, state: &AppState) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let mut lines: Vec<Line> = capability_warning(state, ToolTab::Chat).into_iter().collect();
    if state.messages.is_empty() {
        lines.push(hint("Ask anything about your lecture. [e] write  [m] context  [c] clear"));
    }
    for message in &state.messages {
        let (who, color) = match message.role {
            ChatRole::User => ("You", Color::Cyan),
            ChatRole::Assistant => ("Assistant", Color::Green),
            ChatRole::System => ("System", Color::DarkGray),
        };
        lines.push(Line::from(Span::styled(who, Style::default().fg(color).add_modifier(Modifier::BOLD))));
        match message.role {
            ChatRole::Assistant if message.content.is_empty() => lines.push(hint("...")),
            ChatRole::Assistant => lines.extend(markdown_lines(&message.content)),
            _ => lines.extend(message.content.split('\n').map(|l| Line::from(l.to_string()))),
        }
        lines.push(Line::default());
    }

    let title = format!("Chat  context: {:?}", state.context_mode).to_lowercase();
    let scroll = tail_scroll(&lines, parts[0]);
    let transcript = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(transcript, parts[0]);

    let editing = state.editor == Editor::Chat;
    let prompt = if state.chat_busy {
        Line::from(Span::styled("Thinking...", Style::default().fg(Color::Yellow)))
    } else {
        let mut line = edit_line("Message", &state.chat_input, editing);
        line.spans.push(Span::raw("  "));
        line.spans.push(action("[Enter] send", state.tool_ready(ToolTab::Chat)));
        line
    };
    f.render_widget(Paragraph::new(prompt).block(Block::default().borders(Borders::ALL)), parts[1]);
}

fn render_summary(f: &mut Frame, area: Rect, state: &AppState) {
    let opts = state.summary_options;
    let format = match opts.format {
        SummaryFormat::Markdown => "Markdown",
        SummaryFormat::PlainText => "Plain text",
    };
    let mut lines = vec![
        Line::from(format!(
            "Type: {}  Format: {}  Length: {:?}",
            opts.kind.label(),
            format,
            opts.length
        )),
        Line::from(vec![
            hint_span("[y] type  [f] format  [l] length  "),
            action("[g] generate", state.tool_ready(ToolTab::Summarize)),
            hint_span("  [w] export"),
        ]),
    ];
    lines.extend(capability_warning(state, ToolTab::Summarize));
    lines.push(Line::default());
    if state.summarizing && state.summary.is_empty() {
        lines.push(Line::from(Span::styled("Summarizing...", Style::default().fg(Color::Yellow))));
    }
    match opts.format {
        SummaryFormat::Markdown => lines.extend(markdown_lines(&state.summary)),
        SummaryFormat::PlainText => lines.extend(state.summary.split('\n').map(|l| Line::from(l.to_string()))),
    }
    let pane = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().title("Summarize").borders(Borders::ALL));
    f.render_widget(pane, area);
}

fn language_label(code: Option<&str>) -> String {
    match code {
        Some(code) => format!("{} ({code})", language_name(code)),
        None => "not selected".to_string(),
    }
}

fn render_translator(f: &mut Frame, area: Rect, state: &AppState) {
    let t = &state.translator;
    let mut lines: Vec<Line> = capability_warning(state, ToolTab::Translate).into_iter().collect();

    if t.detecting {
        lines.push(Line::from(Span::styled("Detecting language...", Style::default().fg(Color::Yellow))));
    } else if !t.detections.is_empty() {
        let found: Vec<String> = t
            .detections
            .iter()
            .map(|d| format!("{} {:.0}%", d.language, d.confidence * 100.0))
            .collect();
        lines.push(Line::from(format!("Detected: {}", found.join(", "))));
    }
    lines.push(Line::from(format!(
        "From: {}   To: {}",
        language_label(t.source.as_deref()),
        language_label(t.target.as_deref())
    )));
    if let Some(pair) = t.pair {
        let color = match pair {
            Availability::Available => Color::Green,
            Availability::Unavailable => Color::Red,
            _ => Color::Yellow,
        };
        lines.push(Line::from(Span::styled(format!("Language pair: {pair}"), Style::default().fg(color))));
    }
    if let Some(progress) = t.progress {
        lines.push(Line::from(format!("Downloading model... {progress}%")));
    }

    let suggestions: Vec<String> = t.target_candidates().into_iter().map(|c| c.label).collect();
    if !suggestions.is_empty() {
        lines.push(hint(&format!("Suggestions: {}", suggestions.join(", "))));
    }
    if state.editor == Editor::Country {
        lines.push(edit_line("Country", &state.country_input, true));
    }
    if let Some(err) = &t.country_error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    }
    lines.push(Line::from(vec![
        hint_span("[d] detect  [s] source  [t] target  [f] country  [l] locate  "),
        action("[g] translate", state.tool_ready(ToolTab::Translate)),
    ]));
    lines.push(Line::default());

    if t.translating {
        lines.push(Line::from(Span::styled("Translating...", Style::default().fg(Color::Yellow))));
    }
    if let Some(err) = &t.error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    }
    lines.extend(t.translated.split('\n').filter(|_| !t.translated.is_empty()).map(|l| Line::from(l.to_string())));

    let pane = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().title("Translate").borders(Borders::ALL));
    f.render_widget(pane, area);
}

fn render_capabilities(f: &mut Frame, area: Rect, state: &AppState) {
    let lines: Vec<Line> = state
        .capabilities
        .iter()
        .flat_map(|row| {
            let color = match row.availability {
                Availability::Available => Color::Green,
                Availability::Unavailable => Color::Red,
                _ => Color::Yellow,
            };
            let mut status = row.availability.to_string();
            if let Some(p) = row.download_progress {
                status = format!("{status} {p}%");
            }
            [
                Line::from(Span::styled(row.capability.label(), Style::default().add_modifier(Modifier::BOLD))),
                Line::from(Span::styled(format!("  {status}"), Style::default().fg(color))),
            ]
        })
        .collect();
    let panel = Paragraph::new(lines).block(Block::default().title("Models").borders(Borders::ALL));
    f.render_widget(panel, area);
}

fn render_notices(f: &mut Frame, area: Rect, state: &AppState) {
    let lines: Vec<Line> = state
        .notices
        .iter()
        .map(|notice| {
            let (icon, color) = match notice.level {
                NoticeLevel::Success => ("✓", Color::Green),
                NoticeLevel::Info => ("i", Color::Cyan),
                NoticeLevel::Warning => ("!", Color::Yellow),
                NoticeLevel::Error => ("✗", Color::Red),
            };
            let mut spans = vec![
                Span::styled(format!("{icon} "), Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(notice.title.clone()),
            ];
            if let Some(detail) = &notice.detail {
                spans.push(Span::styled(format!(": {detail}"), Style::default().fg(Color::DarkGray)));
            }
            Line::from(spans)
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL)), area);
}

fn render_nav_bar(f: &mut Frame, area: Rect, state: &AppState) {
    let wf = &state.workflow;
    let button = |label: &str, enabled: bool| {
        let style = if enabled {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Span::styled(label.to_string(), style)
    };
    let mut spans = vec![button("[←] Back", wf.back_enabled()), Span::raw("   ")];
    if wf.current_step.next().is_some() {
        spans.push(button("[→] Next", wf.next_enabled()));
        spans.push(Span::raw("   "));
    }
    if wf.is_processing {
        spans.push(Span::styled("Processing...   ", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(
        "[1-3] jump  [r] start over  [?] help  [q] quit",
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn render_dialog(f: &mut Frame, dialog: Dialog, dont_show_again: bool) {
    let (title, body, actions): (&str, Vec<&str>, &str) = match dialog {
        Dialog::LeaveTools { .. } => (
            "Leave Tools?",
            vec!["All chat history and changes in the Tools will be deleted and cannot be recovered."],
            "[y] Leave  [n] Cancel",
        ),
        Dialog::Reset => (
            "Start over?",
            vec!["Your input and extracted text will be cleared and cannot be recovered."],
            "[y] Start over  [n] Cancel",
        ),
        Dialog::Quit => (
            "Quit Lecture Buddy?",
            vec!["Your input and extracted text will be lost."],
            "[y] Quit  [n] Cancel",
        ),
        Dialog::Info => (
            "Welcome to Lecture Buddy",
            vec![
                "Lecture Buddy runs entirely on your machine with local models.",
                "1. Input: upload or capture a photo of the board, or paste text.",
                "2. Data Optimization: text is extracted from images and can be edited.",
                "3. Tools: chat about the lecture, summarize it, or translate it.",
                "Your location may be used to suggest a translation language.",
            ],
            "[Enter] Got it",
        ),
    };

    let mut lines: Vec<Line> = body.into_iter().map(|l| Line::from(l.to_string())).collect();
    lines.push(Line::default());
    if dialog.has_opt_out() {
        let check = if dont_show_again { "[x]" } else { "[ ]" };
        lines.push(Line::from(format!("{check} Don't show again  (space to toggle)")));
        lines.push(Line::default());
    }
    lines.push(Line::from(Span::styled(actions, Style::default().add_modifier(Modifier::BOLD))));

    let area = centered_rect(60, 40, f.size());
    f.render_widget(Clear, area);
    let popup = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Left)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
    f.render_widget(popup, area);
}

/// A rectangle centered in `r`, sized in percent.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
