//! Subprocess client for the migration-inference engine.
//!
//! Spawns the engine binary and speaks line-delimited JSON-RPC 2.0 over its
//! stdin/stdout. This is one conforming implementation of the
//! [`MigrationEngine`] boundary; the core never assumes the engine runs this
//! way.

mod config;
mod rpc;

pub use config::EngineConfig;

use async_trait::async_trait;
use rpc::{RpcRequest, RpcResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uplift_core::{
    ApplyOutcome, DatamodelStep, EngineError, InferredSteps, MigrationEngine, MigrationProgress,
    RemoteMigration,
};

/// A migration engine running as a child process.
///
/// Requests are serialized: the engine handles one at a time, which matches
/// the strictly sequential orchestration on the other side of the boundary.
pub struct SubprocessEngine {
    io: Mutex<EngineIo>,
    // Kept so the child is killed when the client is dropped.
    _child: Child,
    next_request_id: AtomicU64,
}

struct EngineIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl SubprocessEngine {
    /// Spawn the engine binary described by `config`.
    pub fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        let mut child = Command::new(&config.binary)
            .args(&config.args)
            .current_dir(&config.project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", config.binary.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdin was not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdout was not piped".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        debug!(binary = %config.binary.display(), "spawned migration engine");
        Ok(Self {
            io: Mutex::new(EngineIo {
                stdin,
                stdout: BufReader::new(stdout),
            }),
            _child: child,
            next_request_id: AtomicU64::new(1),
        })
    }

    async fn request<P, T>(&self, method: &str, params: P) -> Result<T, EngineError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request)
            .map_err(|e| EngineError::Protocol(format!("unserializable request: {e}")))?;

        let mut io = self.io.lock().await;
        io.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(transport)?;
        io.stdin.write_all(b"\n").await.map_err(transport)?;
        io.stdin.flush().await.map_err(transport)?;

        let mut buf = String::new();
        loop {
            buf.clear();
            let read = io.stdout.read_line(&mut buf).await.map_err(transport)?;
            if read == 0 {
                return Err(EngineError::Transport(
                    "engine closed its stdout".to_string(),
                ));
            }
            let line = buf.trim();
            if line.is_empty() {
                continue;
            }

            let value: serde_json::Value = serde_json::from_str(line)
                .map_err(|e| EngineError::Protocol(format!("invalid JSON from engine: {e}")))?;
            if value.get("id").and_then(serde_json::Value::as_u64) != Some(id) {
                // Notification or a response to nothing we asked; skip it.
                debug!(method, "skipping unrelated engine output line");
                continue;
            }

            let response: RpcResponse = serde_json::from_value(value)
                .map_err(|e| EngineError::Protocol(format!("malformed response: {e}")))?;
            return response.into_result();
        }
    }
}

#[async_trait]
impl MigrationEngine for SubprocessEngine {
    async fn infer_steps(
        &self,
        datamodel: &str,
        migration_id: &str,
        assume_applied: &[DatamodelStep],
    ) -> Result<InferredSteps, EngineError> {
        self.request(
            "inferMigrationSteps",
            json!({
                "dataModel": datamodel,
                "migrationId": migration_id,
                "assumeToBeApplied": assume_applied,
            }),
        )
        .await
    }

    async fn list_migrations(&self) -> Result<Vec<RemoteMigration>, EngineError> {
        self.request("listMigrations", json!({})).await
    }

    async fn apply_migration(
        &self,
        migration_id: &str,
        steps: &[DatamodelStep],
        force: bool,
    ) -> Result<ApplyOutcome, EngineError> {
        self.request(
            "applyMigration",
            json!({
                "migrationId": migration_id,
                "steps": steps,
                "force": force,
            }),
        )
        .await
    }

    async fn migration_progress(
        &self,
        migration_id: &str,
    ) -> Result<Option<MigrationProgress>, EngineError> {
        self.request("migrationProgress", json!({ "migrationId": migration_id }))
            .await
    }
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(target: "uplift_engine::stderr", "{line}");
    }
}

fn transport(e: std::io::Error) -> EngineError {
    EngineError::Transport(e.to_string())
}
