//! Knowledge item CLI commands: list, remember, link, related.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use engram_core::repository::knowledge::KnowledgeRepository;
use engram_types::record::{NewKnowledgeItem, RelationType};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum KnowledgeCommand {
    /// List active knowledge items.
    List {
        /// Restrict to one category.
        #[arg(long)]
        category: Option<String>,
    },

    /// Manually inject a knowledge item.
    Remember {
        /// Category (groups comparable items, e.g. "preference").
        category: String,

        /// Key within the category.
        key: String,

        /// The fact itself.
        value: String,

        /// Importance 1-10.
        #[arg(long, default_value = "5")]
        importance: u8,

        /// Confidence 0-1.
        #[arg(long, default_value = "0.8")]
        confidence: f64,
    },

    /// Link two knowledge items.
    Link {
        /// Source item id.
        from: i64,

        /// Target item id.
        to: i64,

        /// Relation type: supports, contradicts, part_of, related_to.
        #[arg(long, default_value = "related_to")]
        relation: String,

        /// Edge strength 0-1.
        #[arg(long, default_value = "0.5")]
        strength: f64,

        /// Make the edge traversable from both ends.
        #[arg(long)]
        bidirectional: bool,
    },

    /// Show items related to one item (stale endpoints filtered).
    Related {
        /// Knowledge item id.
        id: i64,
    },
}

/// Dispatch a knowledge subcommand.
pub async fn run(state: &AppState, command: KnowledgeCommand, json: bool) -> Result<()> {
    match command {
        KnowledgeCommand::List { category } => list_knowledge(state, category.as_deref(), json).await,
        KnowledgeCommand::Remember {
            category,
            key,
            value,
            importance,
            confidence,
        } => remember(state, &category, &key, &value, importance, confidence, json).await,
        KnowledgeCommand::Link {
            from,
            to,
            relation,
            strength,
            bidirectional,
        } => link(state, from, to, &relation, strength, bidirectional, json).await,
        KnowledgeCommand::Related { id } => related(state, id, json).await,
    }
}

async fn list_knowledge(state: &AppState, category: Option<&str>, json: bool) -> Result<()> {
    let items = match category {
        Some(category) => {
            state
                .memory_service
                .knowledge()
                .list_by_category(category)
                .await?
        }
        None => state.memory_service.knowledge().list_active().await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!();
        println!(
            "  {} No knowledge items{}.",
            style("i").blue().bold(),
            category
                .map(|c| format!(" in category '{c}'"))
                .unwrap_or_default(),
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Category").fg(Color::White),
        Cell::new("Key").fg(Color::White),
        Cell::new("Value").fg(Color::White),
        Cell::new("Conf").fg(Color::White),
        Cell::new("Imp").fg(Color::White),
        Cell::new("Priority").fg(Color::White),
    ]);

    for item in &items {
        let value = if item.value.len() > 40 {
            format!("{}...", &item.value[..37])
        } else {
            item.value.clone()
        };
        table.add_row(vec![
            Cell::new(item.id).fg(Color::DarkGrey),
            Cell::new(&item.category).fg(Color::Magenta),
            Cell::new(&item.key).fg(Color::Cyan),
            Cell::new(value).fg(Color::White),
            Cell::new(format!("{:.2}", item.confidence)).fg(Color::Yellow),
            Cell::new(item.importance).fg(Color::Yellow),
            Cell::new(format!("{:.2}", item.priority_score)).fg(Color::Cyan),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} knowledge item{}",
        style(items.len()).bold(),
        if items.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

async fn remember(
    state: &AppState,
    category: &str,
    key: &str,
    value: &str,
    importance: u8,
    confidence: f64,
    json: bool,
) -> Result<()> {
    let created = state
        .memory_service
        .record_knowledge(NewKnowledgeItem {
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            confidence,
            importance,
            created_at: Utc::now(),
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        println!(
            "  {} Remembered as {} ({}/{})",
            style("*").green().bold(),
            style(created.id).bold(),
            style(category).magenta(),
            style(key).cyan(),
        );
        println!("  {}", style(value).dim());
    }

    Ok(())
}

async fn link(
    state: &AppState,
    from: i64,
    to: i64,
    relation: &str,
    strength: f64,
    bidirectional: bool,
    json: bool,
) -> Result<()> {
    let relation_type: RelationType = relation
        .parse()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("invalid relation '{relation}'"))?;

    let created = state
        .memory_service
        .link_items(from, to, relation_type, strength, bidirectional)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        let arrow = if bidirectional { "<->" } else { "->" };
        println!(
            "  {} Linked {} {arrow} {} ({})",
            style("*").green().bold(),
            style(from).bold(),
            style(to).bold(),
            style(created.relation_type).cyan(),
        );
    }

    Ok(())
}

async fn related(state: &AppState, id: i64, json: bool) -> Result<()> {
    let related = state.memory_service.related_items(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&related)?);
        return Ok(());
    }

    if related.is_empty() {
        println!();
        println!(
            "  {} No related items for {}.",
            style("i").blue().bold(),
            style(id).bold()
        );
        println!();
        return Ok(());
    }

    println!();
    for (edge, item) in &related {
        let verified = if edge.verified {
            style("verified").green().to_string()
        } else {
            style("unverified").dim().to_string()
        };
        println!(
            "  {} {} {} [{} {:.2} {}]",
            style(item.id).bold(),
            style(&item.key).cyan(),
            style(&item.value).dim(),
            edge.relation_type,
            edge.strength,
            verified,
        );
    }
    println!();

    Ok(())
}
