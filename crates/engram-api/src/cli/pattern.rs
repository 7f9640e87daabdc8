//! The `engram patterns` command.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use engram_core::repository::pattern::PatternRepository;

use crate::state::AppState;

/// List recurring behavioral patterns ordered by frequency.
///
/// # Examples
///
/// ```bash
/// engram patterns
/// engram patterns --limit 10 --json
/// ```
pub async fn list_patterns(state: &AppState, limit: Option<i64>, json: bool) -> Result<()> {
    let patterns = state.memory_service.patterns().list(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
        return Ok(());
    }

    if patterns.is_empty() {
        println!();
        println!(
            "  {} No patterns observed yet.",
            style("i").blue().bold(),
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Type").fg(Color::White),
        Cell::new("Fingerprint").fg(Color::White),
        Cell::new("Seen").fg(Color::White),
        Cell::new("Success").fg(Color::White),
        Cell::new("Last seen").fg(Color::White),
    ]);

    for pattern in &patterns {
        table.add_row(vec![
            Cell::new(&pattern.pattern_type).fg(Color::Cyan),
            Cell::new(&pattern.data_fingerprint[..12.min(pattern.data_fingerprint.len())])
                .fg(Color::DarkGrey),
            Cell::new(pattern.frequency).fg(Color::Yellow),
            Cell::new(format!("{:.0}%", pattern.success_rate * 100.0)).fg(Color::Green),
            Cell::new(pattern.last_seen_at.format("%Y-%m-%d").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}
