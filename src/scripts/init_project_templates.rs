use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use publishing_service::config::AppConfig;
use publishing_service::seed::{
    collect_models_registry, resolve_seed_files, seed_files, SeedFileRequest,
};
use publishing_service::store::{MemoryStore, PostgresStore};

const COMMAND_NAME: &str = "init_project_templates";

/// Init project templates from JSON seed files
#[derive(Debug, Parser)]
#[command(name = "init-project-templates", version)]
struct Args {
    /// Directory holding the seed files
    #[arg(long)]
    resources_dir: Option<PathBuf>,

    /// Seed manifest; defaults to seed_manifest.json in the resources directory
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Load exactly these files (relative to the resources directory), in order
    #[arg(long, num_args = 1..)]
    files: Option<Vec<String>>,

    /// Load every file in the resources directory matching the glob
    #[arg(long)]
    all: bool,

    /// Glob used with --all or when the manifest names no files
    #[arg(long)]
    file_glob: Option<String>,

    /// File names to skip with --all
    #[arg(long, num_args = 1..)]
    exclude: Option<Vec<String>>,

    /// Database connection string
    #[arg(long, env = "POSTGRES_DSN")]
    db_dsn: Option<String>,

    /// Seed into memory and report, without touching the database
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = AppConfig::load()?;
    publishing_service::logging::init(&config.log.level);

    if let Err(e) = run(args, config).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args, config: AppConfig) -> Result<()> {
    let resources_dir = args
        .resources_dir
        .unwrap_or_else(|| PathBuf::from(&config.seed.resources_dir));
    let manifest_path = args
        .manifest
        .unwrap_or_else(|| PathBuf::from(config.manifest_path()));

    let paths = resolve_seed_files(&SeedFileRequest {
        command_name: COMMAND_NAME.to_string(),
        resources_dir,
        manifest_path,
        files: args.files,
        use_all: args.all,
        glob: args.file_glob,
        exclude: args.exclude,
    })?;

    log::info!(
        "Seed files for '{}': {}",
        COMMAND_NAME,
        paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let registry = collect_models_registry()?;

    if args.dry_run {
        let mut store = MemoryStore::new();
        let summary = seed_files(&mut store, &paths, registry).await?;
        log::info!("Dry run completed: {}", summary);
        return Ok(());
    }

    let database_url = match args.db_dsn {
        Some(dsn) => dsn,
        None => config.database_url()?,
    };
    let store = PostgresStore::new(&database_url, config.max_connections()).await?;

    let mut tx = store.begin().await?;
    let summary = seed_files(&mut *tx, &paths, registry).await?;
    tx.commit().await.context("Failed to commit seed transaction")?;

    log::info!("Init completed: {}", summary);
    Ok(())
}
