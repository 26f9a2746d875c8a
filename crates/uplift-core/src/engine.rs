//! The boundary to the external migration-inference engine.
//!
//! The core never diffs schemas or generates SQL itself; it talks to a
//! conforming engine through [`MigrationEngine`]. Production implementations
//! may run in-process, as a subprocess, or over the network - nothing here
//! assumes which.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An atomic structured edit to the datamodel. Opaque to this crate; the
/// engine produces and consumes them.
pub type DatamodelStep = serde_json::Value;

/// A database-level action derived from datamodel steps. Also opaque; only
/// the count matters here, as the progress denominator.
pub type DatabaseStep = serde_json::Value;

/// A migration the target database has recorded as applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMigration {
    /// Migration ID, identical to the local directory name.
    pub id: String,
}

/// Steps the engine inferred from a datamodel diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredSteps {
    /// Datamodel-level steps: empty means the datamodel is unchanged.
    pub datamodel_steps: Vec<DatamodelStep>,
    /// Database-level steps the apply would execute.
    pub database_steps: Vec<DatabaseStep>,
}

/// Response to starting an apply: the concrete database steps it will run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    /// Total set of database steps; its length is the progress denominator.
    pub database_steps: Vec<DatabaseStep>,
}

/// Status of an apply attempt as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    /// Apply accepted but not started.
    Pending,
    /// Apply in progress; the payload's `applied` count is advancing.
    InProgress,
    /// Apply completed.
    Success,
    /// Apply failed and was rolled back cleanly.
    RollbackSuccess,
    /// Apply failed and the rollback failed too.
    RollbackFailure,
}

impl ProgressStatus {
    /// Whether this status ends the poll loop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStatus::Success | ProgressStatus::RollbackSuccess | ProgressStatus::RollbackFailure
        )
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressStatus::Pending => write!(f, "pending"),
            ProgressStatus::InProgress => write!(f, "in progress"),
            ProgressStatus::Success => write!(f, "success"),
            ProgressStatus::RollbackSuccess => write!(f, "rolled back"),
            ProgressStatus::RollbackFailure => write!(f, "rollback failed"),
        }
    }
}

/// Progress payload for one apply attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationProgress {
    /// Current status.
    pub status: ProgressStatus,
    /// Database steps executed so far.
    pub applied: usize,
    /// Step total as the engine sees it, if it reports one. The orchestrator
    /// uses the apply response's step count as the denominator instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

/// Errors crossing the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("failed to start engine: {0}")]
    Spawn(String),

    /// The transport to the engine broke down.
    #[error("engine transport error: {0}")]
    Transport(String),

    /// The engine sent something this client could not understand.
    #[error("engine protocol error: {0}")]
    Protocol(String),

    /// The engine itself reported an error for a request.
    #[error("engine error: {0}")]
    Engine(String),
}

/// The four operations this core needs from a migration engine.
#[async_trait]
pub trait MigrationEngine: Send + Sync {
    /// Infer the steps needed to take the database from `assume_applied` to
    /// the given datamodel. Empty `datamodel_steps` in the result means
    /// there is nothing to create.
    async fn infer_steps(
        &self,
        datamodel: &str,
        migration_id: &str,
        assume_applied: &[DatamodelStep],
    ) -> Result<InferredSteps, EngineError>;

    /// List the migrations the target database believes are applied, in
    /// application order.
    async fn list_migrations(&self) -> Result<Vec<RemoteMigration>, EngineError>;

    /// Begin applying a migration asynchronously. `force` bypasses the
    /// engine's destructive-change guards.
    async fn apply_migration(
        &self,
        migration_id: &str,
        steps: &[DatamodelStep],
        force: bool,
    ) -> Result<ApplyOutcome, EngineError>;

    /// Poll the progress of an apply. `None` means no apply is in flight
    /// for that migration.
    async fn migration_progress(
        &self,
        migration_id: &str,
    ) -> Result<Option<MigrationProgress>, EngineError>;
}
