//! The apply orchestrator: drives pending migrations to completion.
//!
//! Migrations are applied strictly sequentially - each migration's datamodel
//! snapshot is defined relative to the one before it, so concurrent applies
//! are never attempted. For each migration the orchestrator starts the apply,
//! then polls the engine's progress channel on a fixed interval until a
//! terminal status. Any non-success terminal status aborts the whole run.

use crate::engine::{MigrationEngine, ProgressStatus};
use crate::error::Error;
use crate::render::ProgressRenderer;
use crate::store::Migration;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed interval between progress polls while an apply is in flight.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Apply every migration in `pending`, in order, updating the renderer as
/// the engine reports progress.
///
/// A `RollbackSuccess` or `RollbackFailure` status aborts the run with
/// [`Error::Rollback`] carrying the engine's full progress payload; later
/// pending migrations are left untouched. Engine failures during the apply
/// itself propagate unchanged. In every case the caller's renderer restores
/// the cursor when it is dropped or finished.
pub async fn apply_pending<W: Write>(
    engine: &dyn MigrationEngine,
    renderer: &mut ProgressRenderer<W>,
    pending: &[Migration],
) -> Result<(), Error> {
    for (index, migration) in pending.iter().enumerate() {
        debug!(migration_id = %migration.id, "starting apply");
        let outcome = engine
            .apply_migration(&migration.id, &migration.steps, false)
            .await?;
        let total_steps = outcome.database_steps.len();

        // Poll until the engine stops reporting an apply in flight or a
        // terminal status is observed.
        while let Some(progress) = engine.migration_progress(&migration.id).await? {
            match progress.status {
                ProgressStatus::Pending => {}
                ProgressStatus::InProgress => {
                    let fraction = if total_steps == 0 {
                        1.0
                    } else {
                        progress.applied as f64 / total_steps as f64
                    };
                    renderer.set_progress(index, fraction);
                    renderer.render()?;
                }
                ProgressStatus::Success => {
                    renderer.set_progress(index, 1.0);
                    renderer.render()?;
                    debug!(migration_id = %migration.id, steps = total_steps, "apply succeeded");
                    break;
                }
                ProgressStatus::RollbackSuccess | ProgressStatus::RollbackFailure => {
                    warn!(migration_id = %migration.id, status = %progress.status, "apply aborted");
                    return Err(Error::Rollback {
                        migration_id: migration.id.clone(),
                        status: progress.status,
                        payload: serde_json::to_string(&progress)?,
                    });
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
    Ok(())
}
