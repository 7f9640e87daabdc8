//! The `engram consolidate` command.
//!
//! Builds a run configuration from CLI flags, confirms (a non-dry run
//! archives conversations and merges knowledge), executes the pass, and
//! renders the report.

use anyhow::{bail, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use engram_core::repository::lock::ConsolidationLock;
use engram_types::config::ConsolidationConfig;
use engram_types::error::ConsolidateError;
use engram_types::record::MergeStrategy;
use engram_types::report::ConsolidationReport;

use crate::state::AppState;

/// Flag overrides for one consolidation run.
pub struct ConsolidateArgs {
    pub dry_run: bool,
    pub aggressive: bool,
    pub retention_threshold: Option<f64>,
    pub age_floor_days: Option<i64>,
    pub gap_days: Option<i64>,
    pub similarity_threshold: Option<f64>,
    pub strategy: Option<String>,
    pub yes: bool,
}

/// Resolve CLI flags into a validated-later `ConsolidationConfig`.
pub fn build_config(args: &ConsolidateArgs) -> Result<ConsolidationConfig> {
    let mut config = if args.aggressive {
        ConsolidationConfig::aggressive()
    } else {
        ConsolidationConfig::default()
    };

    if let Some(threshold) = args.retention_threshold {
        config.retention_threshold = threshold;
    }
    if let Some(days) = args.age_floor_days {
        config.archival_age_floor_days = days;
    }
    if let Some(days) = args.gap_days {
        config.cluster_gap_days = days;
    }
    if let Some(threshold) = args.similarity_threshold {
        config.similarity_threshold = threshold;
    }
    if let Some(strategy) = &args.strategy {
        config.merge_strategy = strategy
            .parse::<MergeStrategy>()
            .map_err(anyhow::Error::msg)?;
    }

    Ok(config)
}

/// Run one consolidation pass and render the report.
///
/// # Examples
///
/// ```bash
/// engram consolidate --dry-run
/// engram consolidate --aggressive --yes
/// engram consolidate --similarity-threshold 0.9 --strategy combine_values -y
/// ```
pub async fn consolidate(state: &AppState, args: ConsolidateArgs, json: bool) -> Result<()> {
    let config = build_config(&args)?;

    if !args.dry_run && !args.yes && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Consolidate now? Conversations below retention {} may be archived and near-duplicates merged.",
                style(config.retention_threshold).bold()
            ))
            .default(true)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let engine = state.engine(config);
    match engine.consolidate(args.dry_run).await {
        Ok(report) => {
            print_report(&report, json)?;
            Ok(())
        }
        Err(ConsolidateError::AlreadyRunning) => {
            let lock = state.consolidation_lock();
            let detail = match lock.holder().await {
                Ok(Some((run_id, acquired_at))) => {
                    format!("run {run_id} holds the lock since {acquired_at}")
                }
                _ => "another run holds the lock".to_string(),
            };
            bail!("consolidation already in progress ({detail}); use 'engram lock release' if a run crashed");
        }
        Err(ConsolidateError::Aborted { step, source, report }) => {
            print_report(&report, json)?;
            bail!("consolidation aborted at step {step}: {source}");
        }
        Err(e) => Err(e.into()),
    }
}

/// Render a consolidation report as a styled table or JSON.
pub fn print_report(report: &ConsolidationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Step").fg(Color::White),
        Cell::new("Count").fg(Color::White),
    ]);
    table.add_row(vec![
        Cell::new("priority scores updated"),
        Cell::new(report.priority_updated).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("clusters found"),
        Cell::new(report.clusters_found).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("retention scores updated"),
        Cell::new(report.retention_updated).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("conversations archived"),
        Cell::new(report.conversations_archived).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("items strengthened"),
        Cell::new(report.items_strengthened).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("duplicate groups"),
        Cell::new(report.duplicate_groups).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("items merged"),
        Cell::new(report.items_merged).fg(Color::Yellow),
    ]);

    println!();
    let mode = if report.dry_run {
        style("dry run").yellow().to_string()
    } else {
        style("applied").green().to_string()
    };
    println!(
        "  Consolidation {} ({mode}) run {}",
        if report.completed() {
            style("complete").green().bold()
        } else {
            style("ABORTED").red().bold()
        },
        style(report.run_id).dim(),
    );
    println!();
    println!("{table}");
    if let Some(step) = report.aborted_at {
        println!();
        println!(
            "  {} aborted at step {}; later steps did not run",
            style("!").red().bold(),
            style(step).red()
        );
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> ConsolidateArgs {
        ConsolidateArgs {
            dry_run: true,
            aggressive: false,
            retention_threshold: None,
            age_floor_days: None,
            gap_days: None,
            similarity_threshold: None,
            strategy: None,
            yes: true,
        }
    }

    #[test]
    fn test_build_config_defaults() {
        let config = build_config(&base_args()).unwrap();
        assert_eq!(config.retention_threshold, 0.3);
        assert_eq!(config.cluster_gap_days, 7);
    }

    #[test]
    fn test_build_config_aggressive() {
        let mut args = base_args();
        args.aggressive = true;
        let config = build_config(&args).unwrap();
        assert_eq!(config.retention_threshold, 0.2);
    }

    #[test]
    fn test_build_config_overrides() {
        let mut args = base_args();
        args.retention_threshold = Some(0.5);
        args.gap_days = Some(3);
        args.strategy = Some("combine_values".to_string());
        let config = build_config(&args).unwrap();
        assert_eq!(config.retention_threshold, 0.5);
        assert_eq!(config.cluster_gap_days, 3);
        assert_eq!(config.merge_strategy, MergeStrategy::CombineValues);
    }

    #[test]
    fn test_build_config_bad_strategy() {
        let mut args = base_args();
        args.strategy = Some("keep_oldest".to_string());
        assert!(build_config(&args).is_err());
    }
}
