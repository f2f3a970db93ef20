//! Session persistence and synchronization core for Shariaa.

mod api;
mod chunks;
mod error;
mod interactions;
mod kv;
mod orchestrator;
mod repository;

pub use api::{AnalysisClient, ApiResult};
pub use chunks::ChunkedStore;
pub use error::{ApiError, SessionError, StoreError};
pub use interactions::{InteractionLog, INTERACTIONS_KEY};
pub use kv::{MemoryStore, PrimitiveStore, SqliteStore, StorageConfig, DEFAULT_VALUE_CAPACITY};
pub use orchestrator::{
    OrchestratorConfig, SessionEvent, SessionOrchestrator, DETAILS_KEY, SESSION_ID_KEY, TERMS_KEY,
};
pub use repository::{RepositoryConfig, SessionRepository, SESSIONS_KEY};

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
