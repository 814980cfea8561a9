//! Application state - shared across all handlers.

use std::sync::Arc;

use quill_core::PostService;
use quill_core::ports::{PostCodec, PostRepository};
use quill_infra::{DatabaseConfig, InMemoryPostRepository, SpreadsheetCodec};

#[cfg(feature = "postgres")]
use quill_infra::{DatabaseConnections, PostgresPostRepository};

/// Which repository backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Postgres,
    Memory,
}

impl Storage {
    pub fn as_str(self) -> &'static str {
        match self {
            Storage::Postgres => "postgres",
            Storage::Memory => "memory",
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostService>,
    pub storage: Storage,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(db_config: Option<&DatabaseConfig>, max_upload_bytes: usize) -> Self {
        let (repo, storage) = Self::repository(db_config).await;
        tracing::info!(storage = storage.as_str(), "Application state initialized");
        Self::with_repository(repo, storage, max_upload_bytes)
    }

    /// State over a fresh in-memory repository.
    pub fn in_memory(max_upload_bytes: usize) -> Self {
        Self::with_repository(
            Arc::new(InMemoryPostRepository::new()),
            Storage::Memory,
            max_upload_bytes,
        )
    }

    fn with_repository(
        repo: Arc<dyn PostRepository>,
        storage: Storage,
        max_upload_bytes: usize,
    ) -> Self {
        let codec: Arc<dyn PostCodec> = Arc::new(SpreadsheetCodec::new());
        Self {
            posts: Arc::new(PostService::new(repo, codec)),
            storage,
            max_upload_bytes,
        }
    }

    #[cfg(feature = "postgres")]
    async fn repository(db_config: Option<&DatabaseConfig>) -> (Arc<dyn PostRepository>, Storage) {
        let Some(config) = db_config else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return (Arc::new(InMemoryPostRepository::new()), Storage::Memory);
        };

        match DatabaseConnections::init(config).await {
            Ok(connections) => (
                Arc::new(PostgresPostRepository::new(connections.main)),
                Storage::Postgres,
            ),
            Err(e) => {
                tracing::error!(
                    "Failed to connect to database: {}. Using in-memory fallback.",
                    e
                );
                (Arc::new(InMemoryPostRepository::new()), Storage::Memory)
            }
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn repository(db_config: Option<&DatabaseConfig>) -> (Arc<dyn PostRepository>, Storage) {
        if db_config.is_some() {
            tracing::warn!("DATABASE_URL ignored: built without the postgres feature");
        }
        tracing::info!("Running without postgres feature - using in-memory repository");
        (Arc::new(InMemoryPostRepository::new()), Storage::Memory)
    }
}
