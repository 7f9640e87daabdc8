//! Engram CLI entry point.
//!
//! Binary name: `engram`
//!
//! Parses CLI arguments, initializes the database and services, then
//! dispatches to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,engram=debug",
        _ => "trace",
    };
    engram_observe::tracing_setup::init_tracing(cli.otel, filter)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "engram", &mut std::io::stdout());
        return Ok(());
    }

    // Initialize application state (DB, services)
    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Consolidate {
            dry_run,
            aggressive,
            retention_threshold,
            age_floor_days,
            gap_days,
            similarity_threshold,
            strategy,
            yes,
        } => {
            cli::consolidate::consolidate(
                &state,
                cli::consolidate::ConsolidateArgs {
                    dry_run,
                    aggressive,
                    retention_threshold,
                    age_floor_days,
                    gap_days,
                    similarity_threshold,
                    strategy,
                    yes,
                },
                cli.json,
            )
            .await
        }

        Commands::Status => cli::status::status(&state, cli.json).await,

        Commands::Conversations { limit } => {
            cli::conversation::list_conversations(&state, limit, cli.json).await
        }

        Commands::Knowledge { action } => cli::knowledge::run(&state, action, cli.json).await,

        Commands::Patterns { limit } => cli::pattern::list_patterns(&state, limit, cli.json).await,

        Commands::Audit { limit, item } => {
            cli::audit::list_audit(&state, limit, item, cli.json).await
        }

        Commands::Lock { action } => cli::lock::run(&state, action, cli.json).await,

        Commands::Schedule { cron, aggressive } => {
            cli::schedule::schedule(&state, &cron, aggressive, cli.json).await
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    engram_observe::tracing_setup::shutdown_tracing();
    result
}
