//! Project-level operations: `create` a migration from datamodel changes,
//! `up` to apply pending migrations.
//!
//! Both operations only read the project tree. `create` hands back the files
//! to write and the new lock-file serialization; persistence is the caller's
//! responsibility. `up` drives the apply orchestrator and returns a summary.

use crate::apply::apply_pending;
use crate::engine::{DatabaseStep, DatamodelStep, MigrationEngine};
use crate::error::Error;
use crate::lockfile::{LockFile, LOCK_FILE_NAME};
use crate::reconcile::reconcile;
use crate::render::ProgressRenderer;
use crate::store::{MigrationStore, DATAMODEL_FILE, STEPS_FILE};
use crate::util::{format_ms, timestamp_id};
use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, info};

/// Directory under the project root that holds migration history.
pub const MIGRATIONS_DIR: &str = "migrations";

/// Human-readable summary inside a migration directory.
pub const README_FILE: &str = "README.md";

/// Everything a successful `create` produced, left for the caller to persist.
#[derive(Debug)]
pub struct CreateOutput {
    /// The generated migration ID.
    pub migration_id: String,
    /// File name to content, to be written under `migrations/<id>/`.
    pub files: BTreeMap<String, String>,
    /// The updated lock-file serialization.
    pub new_lock_file: String,
}

/// Options for [`Project::up`].
#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    /// Apply at most this many pending migrations, earliest first.
    pub n: Option<usize>,
    /// Only report what would be applied; never contact the apply endpoint.
    pub preview: bool,
    /// Keep the completion summary to a single line.
    pub short: bool,
}

impl UpOptions {
    /// Limit the run to the first `n` pending migrations.
    pub fn with_limit(mut self, n: usize) -> Self {
        self.n = Some(n);
        self
    }

    /// Enable preview mode.
    pub fn preview(mut self) -> Self {
        self.preview = true;
        self
    }

    /// Enable the terse summary.
    pub fn short(mut self) -> Self {
        self.short = true;
        self
    }
}

/// A project directory plus the engine that serves it.
pub struct Project {
    dir: PathBuf,
    store: MigrationStore,
    engine: Arc<dyn MigrationEngine>,
}

impl Project {
    /// Open a project rooted at `dir`, with its migrations under
    /// `dir/migrations`.
    pub fn new(dir: impl Into<PathBuf>, engine: Arc<dyn MigrationEngine>) -> Self {
        let dir = dir.into();
        let store = MigrationStore::new(dir.join(MIGRATIONS_DIR));
        Self { dir, store, engine }
    }

    /// The store this project reads history from.
    pub fn store(&self) -> &MigrationStore {
        &self.store
    }

    /// Path of the lock file.
    pub fn lock_file_path(&self) -> PathBuf {
        self.dir.join(MIGRATIONS_DIR).join(LOCK_FILE_NAME)
    }

    /// Read the project's current datamodel.
    pub async fn datamodel(&self) -> Result<String, Error> {
        let path = self.dir.join(DATAMODEL_FILE);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::MissingDatamodel { path }),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a new migration from the current datamodel.
    ///
    /// Returns `None` when the engine infers no datamodel steps, i.e. the
    /// datamodel is unchanged. Otherwise returns the migration ID, the files
    /// to write into its directory, and the updated lock-file serialization.
    /// Refused with [`Error::Conflict`] while the lock file carries an
    /// unresolved merge conflict.
    pub async fn create(&self, name: Option<&str>) -> Result<Option<CreateOutput>, Error> {
        let migration_id = timestamp_id(name);
        let mut lock_file = LockFile::load(&self.lock_file_path()).await?;
        if let Some(branch) = &lock_file.remote_branch {
            return Err(Error::Conflict {
                branch: branch.clone(),
            });
        }

        let datamodel = self.datamodel().await?;
        let local = self.store.list_local().await?;
        let assume_applied: Vec<DatamodelStep> =
            local.iter().flat_map(|m| m.steps.iter().cloned()).collect();

        let inferred = self
            .engine
            .infer_steps(&datamodel, &migration_id, &assume_applied)
            .await?;
        if inferred.datamodel_steps.is_empty() {
            info!("datamodel is unchanged, nothing to create");
            return Ok(None);
        }
        debug!(
            migration_id = %migration_id,
            datamodel_steps = inferred.datamodel_steps.len(),
            database_steps = inferred.database_steps.len(),
            "inferred migration"
        );

        let previous_id = local.last().map(|m| m.id.as_str());
        let mut files = BTreeMap::new();
        files.insert(
            STEPS_FILE.to_string(),
            serde_json::to_string_pretty(&inferred.datamodel_steps)?,
        );
        files.insert(DATAMODEL_FILE.to_string(), datamodel.clone());
        files.insert(
            README_FILE.to_string(),
            migration_readme(&migration_id, previous_id, &datamodel, &inferred.database_steps)?,
        );

        lock_file.append_migration(&migration_id)?;

        Ok(Some(CreateOutput {
            migration_id,
            files,
            new_lock_file: lock_file.serialize(),
        }))
    }

    /// Apply pending migrations, rendering progress to stdout.
    pub async fn up(&self, options: UpOptions) -> Result<String, Error> {
        self.up_with_writer(options, io::stdout()).await
    }

    /// Apply pending migrations, rendering progress to the given writer.
    ///
    /// Reconciles local history against the database, then either reports
    /// the pending set (preview) or applies it in order and returns a
    /// completion summary with the count applied and the elapsed time.
    pub async fn up_with_writer<W: Write + Send>(
        &self,
        options: UpOptions,
        out: W,
    ) -> Result<String, Error> {
        let started = Instant::now();
        let local = self.store.list_local().await?;
        let remote = self.engine.list_migrations().await?;
        let reconciliation = reconcile(&local, &remote, options.n)?;

        if reconciliation.pending.is_empty() {
            return Ok("All migrations are already applied".to_string());
        }
        debug!(
            pending = reconciliation.pending.len(),
            last_applied = ?reconciliation.last_applied,
            "reconciled migration history"
        );

        let mut renderer = ProgressRenderer::new(reconciliation.pending, out)?;
        renderer.render()?;

        if options.preview {
            renderer.done()?;
            let count = reconciliation.pending.len();
            return Ok(format!(
                "\nThis was a preview. Run `uplift up` to apply {count} pending migration{}.\n",
                plural(count)
            ));
        }

        apply_pending(self.engine.as_ref(), &mut renderer, reconciliation.pending).await?;
        renderer.done()?;

        let count = reconciliation.pending.len();
        let mut summary = String::from("\n");
        if !options.short {
            for migration in reconciliation.pending {
                summary.push_str("Applied ");
                summary.push_str(&migration.id);
                summary.push('\n');
            }
        }
        summary.push_str(&format!(
            "Done with {count} migration{} in {}.\n",
            plural(count),
            format_ms(started.elapsed())
        ));
        Ok(summary)
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn migration_readme(
    migration_id: &str,
    previous_id: Option<&str>,
    datamodel: &str,
    database_steps: &[DatabaseStep],
) -> Result<String, Error> {
    let mut readme = format!("# Migration `{migration_id}`\n\n");
    match previous_id {
        Some(previous) => readme.push_str(&format!("Follows `{previous}`.\n\n")),
        None => readme.push_str("This migration initializes the database.\n\n"),
    }

    readme.push_str("## Database changes\n\n");
    if database_steps.is_empty() {
        readme.push_str("No database actions.\n");
    } else {
        readme.push_str("```json\n");
        readme.push_str(&serde_json::to_string_pretty(database_steps)?);
        readme.push_str("\n```\n");
    }

    readme.push_str("\n## Datamodel\n\n```\n");
    readme.push_str(datamodel);
    if !datamodel.ends_with('\n') {
        readme.push('\n');
    }
    readme.push_str("```\n");
    Ok(readme)
}
