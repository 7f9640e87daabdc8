//! CLI command definitions and dispatch for the `engram` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a verb-noun
//! pattern (e.g., `engram consolidate`, `engram knowledge list`).

pub mod audit;
pub mod consolidate;
pub mod conversation;
pub mod knowledge;
pub mod lock;
pub mod pattern;
pub mod schedule;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Long-term memory engine for a personal assistant.
#[derive(Parser)]
#[command(name = "engram", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans via OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a consolidation pass over the memory store.
    Consolidate {
        /// Compute and report everything without writing any mutation.
        #[arg(long)]
        dry_run: bool,

        /// Archive more eagerly (retention threshold 0.2 instead of 0.3).
        #[arg(long, conflicts_with = "retention_threshold")]
        aggressive: bool,

        /// Retention score below which old conversations are archived.
        #[arg(long)]
        retention_threshold: Option<f64>,

        /// Minimum age in days before a conversation can be archived.
        #[arg(long)]
        age_floor_days: Option<i64>,

        /// Maximum day gap within a temporal cluster.
        #[arg(long)]
        gap_days: Option<i64>,

        /// Minimum composite similarity for duplicate knowledge items.
        #[arg(long)]
        similarity_threshold: Option<f64>,

        /// Merge strategy: keep_highest_confidence, keep_newest, combine_values.
        #[arg(long)]
        strategy: Option<String>,

        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Memory store overview: record counts per kind.
    Status,

    /// Browse active conversations.
    Conversations {
        /// Maximum number of rows.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Knowledge item commands.
    Knowledge {
        #[command(subcommand)]
        action: knowledge::KnowledgeCommand,
    },

    /// Browse recurring behavioral patterns.
    Patterns {
        /// Maximum number of rows.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Browse the merge-audit trail.
    Audit {
        /// Maximum number of rows.
        #[arg(long)]
        limit: Option<i64>,

        /// Show only merges involving this knowledge item id.
        #[arg(long)]
        item: Option<i64>,
    },

    /// Inspect or clear the consolidation lock.
    Lock {
        #[command(subcommand)]
        action: lock::LockCommand,
    },

    /// Run consolidation on a cron schedule until interrupted.
    Schedule {
        /// Cron expression (5 or 6 fields) or e.g. "every 6 hours".
        #[arg(long, default_value = "every day at 03:30")]
        cron: String,

        /// Archive more eagerly on every scheduled run.
        #[arg(long)]
        aggressive: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
