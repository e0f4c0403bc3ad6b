//! Terminal output for the headless commands: ANSI styling, notes and
//! tables.

use lecturebuddy_core::NoticeLevel;

// ---------------------------------------------------------------------------
// ANSI Color/Style helpers
// ---------------------------------------------------------------------------

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// Print a notice line. Errors go to stderr; without color support the
/// level is spelled out.
pub fn note(level: NoticeLevel, msg: &str) {
    let (icon, color, label) = match level {
        NoticeLevel::Success => ("✓", GREEN, "OK"),
        NoticeLevel::Info => ("ℹ", CYAN, "INFO"),
        NoticeLevel::Warning => ("⚠", YELLOW, "WARN"),
        NoticeLevel::Error => ("✗", RED, "ERROR"),
    };
    let line = if supports_color() {
        format!("{color}{BOLD}{icon}{RESET} {msg}")
    } else {
        format!("{label}: {msg}")
    };
    match level {
        NoticeLevel::Error => eprintln!("{line}"),
        _ => println!("{line}"),
    }
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

pub struct Column {
    pub header: String,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self { header: header.into() }
    }
}

fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/// Render a table; cell widths ignore ANSI codes.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| visible_width(&c.header)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(visible_width(cell));
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| pad_cell(&col.header, *w))
        .collect();
    out.push_str(&format!("{BOLD}  {}  {RESET}\n", header.join("  ")));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}  \n", sep.join("  ")));

    for row in rows {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| pad_cell(row.get(i).map(String::as_str).unwrap_or(""), *w))
            .collect();
        out.push_str(&format!("  {}  \n", cells.join("  ")));
    }
    out
}

fn pad_cell(s: &str, width: usize) -> String {
    let pad = " ".repeat(width.saturating_sub(visible_width(s)));
    format!("{s}{pad}")
}
