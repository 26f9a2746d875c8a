//! The migration store: reads previously created migrations from disk.
//!
//! Layout: one subdirectory per migration under `migrations/`, named by
//! migration ID, holding a steps document (`steps.json`) and a datamodel
//! snapshot (`datamodel.dml`). Discovery is by directory listing, not an
//! index file, so an absent migrations directory just means no history.

use crate::engine::DatamodelStep;
use crate::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Steps document inside a migration directory.
pub const STEPS_FILE: &str = "steps.json";

/// Datamodel snapshot inside a migration directory (and at the project root).
pub const DATAMODEL_FILE: &str = "datamodel.dml";

/// A previously created migration. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    /// Lexicographically sortable ID: timestamp plus optional name.
    pub id: String,
    /// The datamodel steps recorded at creation time.
    pub steps: Vec<DatamodelStep>,
    /// Full datamodel snapshot as of this migration.
    pub datamodel: String,
}

/// Read access to the migration directory tree.
#[derive(Debug, Clone)]
pub struct MigrationStore {
    dir: PathBuf,
}

impl MigrationStore {
    /// Create a store rooted at the given migrations directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The migrations directory this store reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List all local migrations, sorted ascending by ID. Returns an empty
    /// list when the migrations directory does not exist; fails with
    /// [`Error::CorruptMigration`] when a migration directory is missing
    /// either of its required files.
    pub async fn list_local(&self) -> Result<Vec<Migration>, Error> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "no migrations directory, no history");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();

        let mut migrations = Vec::with_capacity(ids.len());
        for id in ids {
            migrations.push(self.read_migration(id).await?);
        }
        Ok(migrations)
    }

    /// The newest datamodel snapshot by ID ordering, or `None` when there is
    /// no history yet. Used as the last-known baseline for diffing.
    pub async fn latest_datamodel(&self) -> Result<Option<String>, Error> {
        let migrations = self.list_local().await?;
        Ok(migrations.into_iter().next_back().map(|m| m.datamodel))
    }

    async fn read_migration(&self, id: String) -> Result<Migration, Error> {
        let dir = self.dir.join(&id);
        let steps_raw = read_required(&dir.join(STEPS_FILE), &id, STEPS_FILE).await?;
        let datamodel = read_required(&dir.join(DATAMODEL_FILE), &id, DATAMODEL_FILE).await?;

        let steps: Vec<DatamodelStep> =
            serde_json::from_str(&steps_raw).map_err(|e| Error::CorruptMigration {
                migration_id: id.clone(),
                reason: format!("unreadable {STEPS_FILE}: {e}"),
            })?;

        Ok(Migration {
            id,
            steps,
            datamodel,
        })
    }
}

async fn read_required(path: &Path, migration_id: &str, file: &str) -> Result<String, Error> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::CorruptMigration {
            migration_id: migration_id.to_string(),
            reason: format!("missing {file}"),
        }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_migration(root: &Path, id: &str, steps: &str, datamodel: &str) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join(STEPS_FILE), steps).await.unwrap();
        fs::write(dir.join(DATAMODEL_FILE), datamodel).await.unwrap();
    }

    #[tokio::test]
    async fn test_absent_directory_means_no_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationStore::new(dir.path().join("migrations"));

        assert!(store.list_local().await.unwrap().is_empty());
        assert!(store.latest_datamodel().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_local_sorted_by_id() {
        let dir = tempfile::tempdir().unwrap();
        // Created out of order on purpose.
        write_migration(dir.path(), "20200102090000-second", "[]", "model B {}").await;
        write_migration(dir.path(), "20200101120000-first", "[]", "model A {}").await;

        let store = MigrationStore::new(dir.path());
        let migrations = store.list_local().await.unwrap();

        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].id, "20200101120000-first");
        assert_eq!(migrations[1].id, "20200102090000-second");
    }

    #[tokio::test]
    async fn test_steps_are_parsed() {
        let dir = tempfile::tempdir().unwrap();
        write_migration(
            dir.path(),
            "20200101120000-init",
            r#"[{"stepType":"CreateModel","name":"User"}]"#,
            "model User {}",
        )
        .await;

        let store = MigrationStore::new(dir.path());
        let migrations = store.list_local().await.unwrap();

        assert_eq!(migrations[0].steps.len(), 1);
        assert_eq!(migrations[0].steps[0]["stepType"], "CreateModel");
        assert_eq!(migrations[0].datamodel, "model User {}");
    }

    #[tokio::test]
    async fn test_latest_datamodel_is_newest_by_id() {
        let dir = tempfile::tempdir().unwrap();
        write_migration(dir.path(), "20200101120000-first", "[]", "model A {}").await;
        write_migration(dir.path(), "20200102090000-second", "[]", "model B {}").await;

        let store = MigrationStore::new(dir.path());
        assert_eq!(
            store.latest_datamodel().await.unwrap().as_deref(),
            Some("model B {}")
        );
    }

    #[tokio::test]
    async fn test_missing_steps_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let migration_dir = dir.path().join("20200101120000-broken");
        fs::create_dir_all(&migration_dir).await.unwrap();
        fs::write(migration_dir.join(DATAMODEL_FILE), "model A {}")
            .await
            .unwrap();

        let store = MigrationStore::new(dir.path());
        let err = store.list_local().await.unwrap_err();
        assert!(
            matches!(err, Error::CorruptMigration { ref migration_id, ref reason }
                if migration_id == "20200101120000-broken" && reason.contains(STEPS_FILE))
        );
    }

    #[tokio::test]
    async fn test_missing_datamodel_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let migration_dir = dir.path().join("20200101120000-broken");
        fs::create_dir_all(&migration_dir).await.unwrap();
        fs::write(migration_dir.join(STEPS_FILE), "[]").await.unwrap();

        let store = MigrationStore::new(dir.path());
        let err = store.list_local().await.unwrap_err();
        assert!(matches!(err, Error::CorruptMigration { ref reason, .. }
            if reason.contains(DATAMODEL_FILE)));
    }

    #[tokio::test]
    async fn test_unparseable_steps_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        write_migration(dir.path(), "20200101120000-bad", "not json", "model A {}").await;

        let store = MigrationStore::new(dir.path());
        let err = store.list_local().await.unwrap_err();
        assert!(matches!(err, Error::CorruptMigration { ref reason, .. }
            if reason.contains("unreadable")));
    }

    #[tokio::test]
    async fn test_stray_files_in_migrations_dir_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_migration(dir.path(), "20200101120000-init", "[]", "model A {}").await;
        fs::write(dir.path().join(crate::lockfile::LOCK_FILE_NAME), "")
            .await
            .unwrap();

        let store = MigrationStore::new(dir.path());
        assert_eq!(store.list_local().await.unwrap().len(), 1);
    }
}
