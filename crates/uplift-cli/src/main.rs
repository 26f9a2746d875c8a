//! uplift - evolve a declarative datamodel and apply the changes.
//!
//! `create` turns local datamodel edits into a new migration directory;
//! `up` applies pending migrations to the target database.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uplift_core::{CreateOutput, Project, UpOptions, LOCK_FILE_NAME, MIGRATIONS_DIR};
use uplift_engine::{EngineConfig, SubprocessEngine};

/// Declarative datamodel migrations.
#[derive(Parser, Debug)]
#[command(name = "uplift")]
#[command(version, about = "Declarative datamodel migrations")]
pub struct Args {
    /// Project directory holding datamodel.dml and migrations/
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Path of the migration-inference engine binary
    #[arg(long, default_value = "migration-engine")]
    pub engine_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new migration from datamodel changes
    Create {
        /// Human-readable name appended to the migration ID
        #[arg(long)]
        name: Option<String>,

        /// Show what would be created without writing anything
        #[arg(long)]
        preview: bool,
    },
    /// Apply pending migrations
    Up {
        /// Apply at most this many pending migrations
        #[arg(short = 'n', long = "max")]
        n: Option<usize>,

        /// Only report what would be applied
        #[arg(long)]
        preview: bool,

        /// Terse one-line summary
        #[arg(long)]
        short: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("uplift=warn".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::new(&args.engine_path).with_project_dir(&args.project_dir);
    let engine = Arc::new(SubprocessEngine::spawn(config)?);
    let project = Project::new(&args.project_dir, engine);

    match args.command {
        Command::Create { name, preview } => {
            run_create(&project, &args.project_dir, name.as_deref(), preview).await
        }
        Command::Up { n, preview, short } => {
            let summary = project.up(UpOptions { n, preview, short }).await?;
            println!("{summary}");
            Ok(())
        }
    }
}

async fn run_create(
    project: &Project,
    project_dir: &Path,
    name: Option<&str>,
    preview: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(output) = project.create(name).await? else {
        println!("No datamodel changes detected, nothing to create.");
        return Ok(());
    };

    if preview {
        println!("Would create migration {}:", output.migration_id);
        for file_name in output.files.keys() {
            println!("  migrations/{}/{file_name}", output.migration_id);
        }
        return Ok(());
    }

    persist_create(project_dir, &output).await?;
    println!("Created migration {}", output.migration_id);
    println!("Run `uplift up` to apply it.");
    Ok(())
}

/// Write the migration directory and the updated lock file.
async fn persist_create(project_dir: &Path, output: &CreateOutput) -> std::io::Result<()> {
    let migrations_dir = project_dir.join(MIGRATIONS_DIR);
    let migration_dir = migrations_dir.join(&output.migration_id);
    fs::create_dir_all(&migration_dir).await?;
    for (file_name, content) in &output.files {
        fs::write(migration_dir.join(file_name), content).await?;
    }
    fs::write(migrations_dir.join(LOCK_FILE_NAME), &output.new_lock_file).await
}
