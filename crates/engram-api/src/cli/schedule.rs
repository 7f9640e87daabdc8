//! The `engram schedule` command: run consolidation on a cron schedule.
//!
//! Wraps `tokio-cron-scheduler`. Accepts standard cron (5 or 6 fields) plus
//! a few human-readable forms. Runs until Ctrl+C / SIGTERM.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use console::style;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use engram_types::config::ConsolidationConfig;
use engram_types::error::ConsolidateError;

use crate::state::AppState;

/// Normalize a human-readable schedule string to a 6-field cron expression.
///
/// Supported patterns (case-insensitive):
/// - 5-field cron         -> "0" prepended for seconds
/// - 6-field cron         -> returned as-is
/// - "every N minutes"    -> "0 */N * * * *"
/// - "every N hours"      -> "0 0 */N * * *"
/// - "every hour"/"hourly" -> "0 0 * * * *"
/// - "every day"/"daily"  -> "0 0 0 * * *"
/// - "every day at HH:MM" -> "0 MM HH * * *"
pub fn normalize_schedule(input: &str) -> Result<String> {
    let trimmed = input.trim();

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() == 5 {
        return Ok(format!("0 {trimmed}"));
    }
    if parts.len() == 6 {
        return Ok(trimmed.to_string());
    }

    let lower = trimmed.to_lowercase();
    if lower == "every hour" || lower == "hourly" {
        return Ok("0 0 * * * *".to_string());
    }
    if lower == "every day" || lower == "daily" {
        return Ok("0 0 0 * * *".to_string());
    }

    if let Some(rest) = lower.strip_prefix("every ") {
        if let Some(at_part) = rest.strip_prefix("day at ") {
            let time_parts: Vec<&str> = at_part.split(':').collect();
            if time_parts.len() == 2 {
                let hour: u32 = time_parts[0]
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("unrecognized schedule: '{input}'"))?;
                let minute: u32 = time_parts[1]
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("unrecognized schedule: '{input}'"))?;
                if hour < 24 && minute < 60 {
                    return Ok(format!("0 {minute} {hour} * * *"));
                }
            }
            return Err(anyhow!("unrecognized schedule: '{input}'"));
        }

        let words: Vec<&str> = rest.split_whitespace().collect();
        if words.len() == 2 {
            let n: u32 = words[0]
                .parse()
                .map_err(|_| anyhow!("unrecognized schedule: '{input}'"))?;
            if n == 0 {
                return Err(anyhow!("interval must be > 0"));
            }
            let unit = words[1].trim_end_matches('s');
            return match unit {
                "minute" => Ok(format!("0 */{n} * * * *")),
                "hour" => Ok(format!("0 0 */{n} * * *")),
                _ => Err(anyhow!("unrecognized schedule: '{input}'")),
            };
        }
    }

    Err(anyhow!("unrecognized schedule format: '{trimmed}'"))
}

/// Run consolidation on the given schedule until interrupted.
///
/// # Examples
///
/// ```bash
/// engram schedule
/// engram schedule --cron "every 6 hours"
/// engram schedule --cron "0 30 3 * * *" --aggressive
/// ```
pub async fn schedule(state: &AppState, cron: &str, aggressive: bool, json: bool) -> Result<()> {
    let expression = normalize_schedule(cron)?;
    let state = Arc::new(state.clone());

    let scheduler = JobScheduler::new().await?;
    let job_state = state.clone();
    let job = Job::new_async(expression.as_str(), move |_uuid, _scheduler| {
        let state = job_state.clone();
        Box::pin(async move {
            let config = if aggressive {
                ConsolidationConfig::aggressive()
            } else {
                ConsolidationConfig::default()
            };
            match state.engine(config).consolidate(false).await {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    archived = report.conversations_archived,
                    merged = report.items_merged,
                    "Scheduled consolidation complete"
                ),
                Err(ConsolidateError::AlreadyRunning) => {
                    warn!("Skipping scheduled consolidation: a run is already in progress");
                }
                Err(e) => error!(error = %e, "Scheduled consolidation failed"),
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;

    if !json {
        println!();
        println!(
            "  {} Consolidation scheduled: {}",
            style("*").green().bold(),
            style(&expression).cyan()
        );
        println!("  {}", style("Press Ctrl+C to stop").dim());
    }

    shutdown_signal().await;
    if !json {
        println!("\n  Scheduler stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_field_cron_gets_seconds() {
        assert_eq!(normalize_schedule("30 3 * * *").unwrap(), "0 30 3 * * *");
    }

    #[test]
    fn test_six_field_cron_passes_through() {
        assert_eq!(normalize_schedule("0 30 3 * * *").unwrap(), "0 30 3 * * *");
    }

    #[test]
    fn test_human_readable_forms() {
        assert_eq!(normalize_schedule("every 6 hours").unwrap(), "0 0 */6 * * *");
        assert_eq!(normalize_schedule("every 15 minutes").unwrap(), "0 */15 * * * *");
        assert_eq!(normalize_schedule("daily").unwrap(), "0 0 0 * * *");
        assert_eq!(normalize_schedule("every day at 03:30").unwrap(), "0 30 3 * * *");
    }

    #[test]
    fn test_rejects_nonsense() {
        assert!(normalize_schedule("whenever").is_err());
        assert!(normalize_schedule("every 0 hours").is_err());
        assert!(normalize_schedule("every day at 25:00").is_err());
    }
}
