//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the CLI. Services
//! and the engine are generic over repository traits, but AppState pins them
//! to the concrete SQLite implementations.

use std::path::PathBuf;
use std::sync::Arc;

use engram_core::consolidate::ConsolidationEngine;
use engram_core::service::memory::MemoryService;
use engram_infra::fingerprint::Sha256FingerprintHasher;
use engram_infra::sqlite::conversation::SqliteConversationRepository;
use engram_infra::sqlite::knowledge::SqliteKnowledgeRepository;
use engram_infra::sqlite::lock::SqliteConsolidationLock;
use engram_infra::sqlite::merge_audit::SqliteMergeAuditRepository;
use engram_infra::sqlite::pattern::SqlitePatternRepository;
use engram_infra::sqlite::pool::{resolve_data_dir, DatabasePool};
use engram_infra::sqlite::relationship::SqliteRelationshipRepository;
use engram_types::config::ConsolidationConfig;

/// Concrete type aliases for the generics pinned to infra implementations.
pub type ConcreteMemoryService = MemoryService<
    SqliteConversationRepository,
    SqliteKnowledgeRepository,
    SqlitePatternRepository,
    SqliteRelationshipRepository,
    Sha256FingerprintHasher,
>;

pub type ConcreteEngine = ConsolidationEngine<
    SqliteConversationRepository,
    SqliteKnowledgeRepository,
    SqliteConsolidationLock,
>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub memory_service: Arc<ConcreteMemoryService>,
    pub audit_repo: Arc<SqliteMergeAuditRepository>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        // Initialize database
        let db_url = format!("sqlite://{}?mode=rwc", data_dir.join("engram.db").display());
        let db_pool = DatabasePool::new(&db_url).await?;

        let memory_service = MemoryService::new(
            SqliteConversationRepository::new(db_pool.clone()),
            SqliteKnowledgeRepository::new(db_pool.clone()),
            SqlitePatternRepository::new(db_pool.clone()),
            SqliteRelationshipRepository::new(db_pool.clone()),
            Sha256FingerprintHasher::new(),
        );

        let audit_repo = SqliteMergeAuditRepository::new(db_pool.clone());

        Ok(Self {
            memory_service: Arc::new(memory_service),
            audit_repo: Arc::new(audit_repo),
            data_dir,
            db_pool,
        })
    }

    /// Build a consolidation engine for one run with the given thresholds.
    ///
    /// The engine gets its own repository handles; the shared pool serializes
    /// writes underneath.
    pub fn engine(&self, config: ConsolidationConfig) -> ConcreteEngine {
        ConsolidationEngine::new(
            SqliteConversationRepository::new(self.db_pool.clone()),
            SqliteKnowledgeRepository::new(self.db_pool.clone()),
            SqliteConsolidationLock::new(self.db_pool.clone()),
            config,
        )
    }

    /// Handle to the consolidation lock, for `engram lock` inspection.
    pub fn consolidation_lock(&self) -> SqliteConsolidationLock {
        SqliteConsolidationLock::new(self.db_pool.clone())
    }
}
