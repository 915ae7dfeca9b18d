pub mod artifact;
pub mod clock;
pub mod error;
pub mod registered_model;
pub mod run;

// Re-exports
pub use artifact::RunArtifact;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use registered_model::RegisteredModel;
pub use run::{normalize_commit_hash, ModelSchema, PackageDependency, Run};
