//! Uplift Core - migration history, reconciliation, and apply orchestration.
//!
//! This crate tracks a project's local migration history, reconciles it
//! against the history the target database reports, computes the subset of
//! migrations that still needs to be applied, and drives the apply loop to
//! completion while rendering live progress. The schema-diff and SQL work
//! itself is delegated to an external engine behind [`MigrationEngine`].

pub mod apply;
pub mod engine;
pub mod error;
pub mod lockfile;
pub mod project;
pub mod reconcile;
pub mod render;
pub mod store;
pub mod util;

pub use apply::{apply_pending, POLL_INTERVAL};
pub use engine::{
    ApplyOutcome, DatabaseStep, DatamodelStep, EngineError, InferredSteps, MigrationEngine,
    MigrationProgress, ProgressStatus, RemoteMigration,
};
pub use error::Error;
pub use lockfile::{LockFile, LOCK_FILE_NAME};
pub use project::{CreateOutput, Project, UpOptions, MIGRATIONS_DIR};
pub use reconcile::{reconcile, Reconciliation};
pub use render::ProgressRenderer;
pub use store::{Migration, MigrationStore, DATAMODEL_FILE, STEPS_FILE};
