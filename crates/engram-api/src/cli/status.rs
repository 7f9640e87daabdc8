//! The `engram status` command: record counts per kind.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use engram_core::repository::conversation::ConversationRepository;
use engram_core::repository::knowledge::KnowledgeRepository;
use engram_core::repository::lock::ConsolidationLock;
use engram_core::repository::pattern::PatternRepository;
use engram_core::repository::relationship::RelationshipRepository;

use crate::state::AppState;

/// Memory store overview.
///
/// # Examples
///
/// ```bash
/// engram status
/// engram status --json
/// ```
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let service = &state.memory_service;
    let active_conversations = service.conversations().count_active().await?;
    let archived_conversations = service.conversations().count_archived().await?;
    let active_knowledge = service.knowledge().count_active().await?;
    let superseded_knowledge = service.knowledge().count_superseded().await?;
    let patterns = service.patterns().count().await?;
    let relationships = service.relationships().count().await?;
    let lock_holder = state.consolidation_lock().holder().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "conversations": { "active": active_conversations, "archived": archived_conversations },
                "knowledge_items": { "active": active_knowledge, "superseded": superseded_knowledge },
                "patterns": patterns,
                "relationships": relationships,
                "consolidation_running": lock_holder.is_some(),
            }))?
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Record kind").fg(Color::White),
        Cell::new("Active").fg(Color::White),
        Cell::new("Retired").fg(Color::White),
    ]);
    table.add_row(vec![
        Cell::new("conversations"),
        Cell::new(active_conversations).fg(Color::Cyan),
        Cell::new(format!("{archived_conversations} archived")).fg(Color::DarkGrey),
    ]);
    table.add_row(vec![
        Cell::new("knowledge items"),
        Cell::new(active_knowledge).fg(Color::Cyan),
        Cell::new(format!("{superseded_knowledge} superseded")).fg(Color::DarkGrey),
    ]);
    table.add_row(vec![
        Cell::new("patterns"),
        Cell::new(patterns).fg(Color::Cyan),
        Cell::new("-").fg(Color::DarkGrey),
    ]);
    table.add_row(vec![
        Cell::new("relationships"),
        Cell::new(relationships).fg(Color::Cyan),
        Cell::new("-").fg(Color::DarkGrey),
    ]);

    println!();
    println!("  Memory store at {}", style(state.data_dir.display()).cyan());
    println!();
    println!("{table}");
    if let Some((run_id, acquired_at)) = lock_holder {
        println!();
        println!(
            "  {} consolidation run {} in progress since {}",
            style("*").yellow().bold(),
            style(run_id).dim(),
            acquired_at
        );
    }
    println!();

    Ok(())
}
