//! CLI Status Command
//!
//! One-shot availability report for the OCR engine and every model-backed
//! capability.

use anyhow::Result;
use lecturebuddy_core::{Availability, NoticeLevel};
use lecturebuddy_tools::check_all;

use crate::session::Session;
use crate::terminal_output::{note, render_table, supports_color, Column, GREEN, RED, RESET, YELLOW};

pub async fn run(session: &Session) -> Result<()> {
    let mut rows = vec![(
        format!("OCR ({})", session.ocr.name()),
        session.ocr.availability().await,
    )];
    rows.extend(
        check_all(&session.probes)
            .await
            .into_iter()
            .map(|(capability, availability)| (capability.label().to_string(), availability)),
    );

    let color = supports_color();
    let table_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|(name, availability)| vec![name.clone(), paint(*availability, color)])
        .collect();

    println!("\nLecture Buddy status\n");
    print!(
        "{}",
        render_table(&[Column::left("Capability"), Column::left("Status")], &table_rows)
    );
    println!();

    let unavailable = rows.iter().filter(|(_, a)| !a.is_supported()).count();
    let downloadable = rows.iter().filter(|(_, a)| a.needs_acquisition()).count();
    if unavailable > 0 {
        note(NoticeLevel::Warning, &format!("{unavailable} capability(ies) unavailable"));
    }
    if downloadable > 0 {
        note(
            NoticeLevel::Info,
            &format!("{downloadable} model(s) will be downloaded when the wizard starts"),
        );
    }
    Ok(())
}

fn paint(availability: Availability, color: bool) -> String {
    if !color {
        return availability.to_string();
    }
    let code = match availability {
        Availability::Available => GREEN,
        Availability::Unavailable => RED,
        Availability::Downloadable | Availability::Downloading => YELLOW,
    };
    format!("{code}{availability}{RESET}")
}
