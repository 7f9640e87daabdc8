//! The `engram audit` command: browse the merge-audit trail.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use engram_core::repository::audit::MergeAuditRepository;

use crate::state::AppState;

/// List merge-audit entries, most recent first.
///
/// # Examples
///
/// ```bash
/// engram audit
/// engram audit --item 42
/// ```
pub async fn list_audit(
    state: &AppState,
    limit: Option<i64>,
    item: Option<i64>,
    json: bool,
) -> Result<()> {
    let entries = match item {
        Some(item_id) => state.audit_repo.for_item(item_id).await?,
        None => state.audit_repo.list(limit).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!();
        println!("  {} No merges recorded.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("When").fg(Color::White),
        Cell::new("Primary").fg(Color::White),
        Cell::new("Merged").fg(Color::White),
        Cell::new("Strategy").fg(Color::White),
        Cell::new("Run").fg(Color::White),
    ]);

    for entry in &entries {
        let merged = entry
            .merged_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(entry.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
            Cell::new(entry.primary_id).fg(Color::Cyan),
            Cell::new(merged).fg(Color::Yellow),
            Cell::new(entry.strategy.to_string()).fg(Color::Magenta),
            Cell::new(&entry.run_id.to_string()[..8]).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} merge{}",
        style(entries.len()).bold(),
        if entries.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
