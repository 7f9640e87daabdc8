//! The `engram lock` commands: inspect or clear the consolidation lock.

use anyhow::Result;
use clap::Subcommand;
use console::style;
use dialoguer::Confirm;

use engram_core::repository::lock::ConsolidationLock;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum LockCommand {
    /// Show the current lock holder, if any.
    Show,

    /// Clear the lock left behind by a crashed run.
    Release {
        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}

/// Dispatch a lock subcommand.
pub async fn run(state: &AppState, command: LockCommand, json: bool) -> Result<()> {
    let lock = state.consolidation_lock();
    match command {
        LockCommand::Show => {
            let holder = lock.holder().await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "held": holder.is_some(),
                        "run_id": holder.map(|(id, _)| id.to_string()),
                        "acquired_at": holder.map(|(_, at)| at.to_rfc3339()),
                    }))?
                );
                return Ok(());
            }
            match holder {
                Some((run_id, acquired_at)) => println!(
                    "  {} held by run {} since {}",
                    style("*").yellow().bold(),
                    style(run_id).bold(),
                    acquired_at
                ),
                None => println!("  {} not held", style("*").green().bold()),
            }
            Ok(())
        }
        LockCommand::Release { force } => {
            let Some((run_id, acquired_at)) = lock.holder().await? else {
                if json {
                    println!("{}", serde_json::json!({"released": false}));
                } else {
                    println!("  {} Lock is not held.", style("i").blue().bold());
                }
                return Ok(());
            };

            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Clear the lock held by run {} since {}? Only do this if that run crashed.",
                        style(run_id).bold(),
                        acquired_at
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("  Cancelled.");
                    return Ok(());
                }
            }

            lock.force_release().await?;
            if json {
                println!("{}", serde_json::json!({"released": true}));
            } else {
                println!("  {} Lock cleared.", style("x").red().bold());
            }
            Ok(())
        }
    }
}
