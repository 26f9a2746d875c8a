//! Error types for migration reconciliation and orchestration.

use crate::engine::{EngineError, ProgressStatus};
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the reconciliation and apply core.
///
/// All of these abort the current command; none are retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    /// The lock file carries an unresolved merge conflict.
    #[error(
        "unresolved merge conflict in the lock file (remote branch {branch}); \
         resolve the conflict before creating new migrations"
    )]
    Conflict {
        /// The branch named by the closing conflict marker.
        branch: String,
    },

    /// A migration directory is missing required files or holds unreadable content.
    #[error("migration {migration_id} is corrupt: {reason}")]
    CorruptMigration {
        /// The migration whose directory is incomplete.
        migration_id: String,
        /// What was missing or unreadable.
        reason: String,
    },

    /// The database reports more applied migrations than exist locally.
    #[error(
        "the database reports {remote} applied migrations but only {local} exist locally; \
         local migration history is missing entries"
    )]
    SurplusMigrations {
        /// Number of migrations on disk.
        local: usize,
        /// Number of migrations the database reports as applied.
        remote: usize,
    },

    /// Local and remote histories diverge at some position.
    #[error(
        "local and remote migrations are not in lockstep: migration {local_id} exists locally \
         and {remote_id} remotely at position {index} in the history"
    )]
    LockstepViolation {
        /// The position at which the histories diverge.
        index: usize,
        /// The local migration ID at that position.
        local_id: String,
        /// The remote migration ID at that position.
        remote_id: String,
    },

    /// An apply attempt ended in a rollback, successful or not.
    #[error("apply of migration {migration_id} aborted ({status}): {payload}")]
    Rollback {
        /// The migration whose apply was aborted.
        migration_id: String,
        /// The terminal status the engine reported.
        status: ProgressStatus,
        /// The engine's full progress payload, serialized for diagnosis.
        payload: String,
    },

    /// A failure reaching the engine boundary, propagated unchanged.
    #[error("engine communication error: {0}")]
    Engine(#[from] EngineError),

    /// The lock file exists but could not be parsed.
    #[error("malformed lock file: {message}")]
    LockFileParse {
        /// What made the content unparseable.
        message: String,
    },

    /// The project has no datamodel file to diff against.
    #[error("could not find a datamodel at {path}")]
    MissingDatamodel {
        /// The path that was checked.
        path: PathBuf,
    },

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockstep_violation_names_both_ids_and_index() {
        let err = Error::LockstepViolation {
            index: 1,
            local_id: "20200101120000-b".to_string(),
            remote_id: "20200101120000-x".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("20200101120000-b"));
        assert!(msg.contains("20200101120000-x"));
        assert!(msg.contains("position 1"));
    }

    #[test]
    fn test_surplus_display() {
        let err = Error::SurplusMigrations { local: 1, remote: 3 };
        assert!(err.to_string().contains("3 applied migrations"));
        assert!(err.to_string().contains("only 1 exist locally"));
    }
}
