//! The `engram conversations` command.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use engram_core::repository::conversation::ConversationRepository;

use crate::state::AppState;

/// List active conversations with scores and cluster assignments.
///
/// # Examples
///
/// ```bash
/// engram conversations
/// engram conversations --limit 20 --json
/// ```
pub async fn list_conversations(state: &AppState, limit: Option<i64>, json: bool) -> Result<()> {
    let mut conversations = state.memory_service.conversations().list_active().await?;
    if let Some(limit) = limit {
        conversations.truncate(limit.max(0) as usize);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No active conversations. The ingestion layer records them as they happen.",
            style("i").blue().bold(),
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Summary").fg(Color::White),
        Cell::new("Imp").fg(Color::White),
        Cell::new("Priority").fg(Color::White),
        Cell::new("Retention").fg(Color::White),
        Cell::new("Cluster").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for conversation in &conversations {
        let summary = if conversation.summary.len() > 48 {
            format!("{}...", &conversation.summary[..45])
        } else {
            conversation.summary.clone()
        };
        let created = conversation
            .created_at
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "?".to_string());
        let cluster = conversation
            .cluster_id
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(conversation.id).fg(Color::DarkGrey),
            Cell::new(summary).fg(Color::White),
            Cell::new(conversation.importance).fg(Color::Yellow),
            Cell::new(format!("{:.2}", conversation.priority_score)).fg(Color::Cyan),
            Cell::new(format!("{:.2}", conversation.retention_score)).fg(Color::Magenta),
            Cell::new(cluster).fg(Color::Blue),
            Cell::new(created).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} active conversation{}",
        style(conversations.len()).bold(),
        if conversations.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
