pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod resolver;
pub mod session;

// Re-exports
pub use config::{DatabaseConfig, RepositoryConfig};
pub use error::{Error, Result};
pub use memory::{MemorySession, MemorySessionFactory};
pub use models::{
    ModelSchemaRecord, PackageDependencyRecord, RegisteredModelRecord, RunArtifactRecord,
    RunRecord,
};
pub use postgres::{PgSession, PgSessionFactory};
pub use repository::RunRepository;
pub use resolver::{EntityResolver, RegisteredModelResolver, RunResolver};
pub use session::{Session, SessionFactory};
