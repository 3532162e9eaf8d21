//! # Advisor Prep CLI (`prep`)
//!
//! The `prep` binary drives the pipeline from the command line:
//!
//! ```bash
//! prep --config ./config/prep.toml init
//! prep --config ./config/prep.toml sync acme     # or: sync --all
//! prep --config ./config/prep.toml brief acme
//! prep --config ./config/prep.toml serve
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use advisor_prep::{clients, config, db, embedding, genai, ingest, migrate, pipeline, server,
    store::ChunkStore};

/// Advisor Prep — ingest client documents and generate structured meeting
/// prep briefs.
#[derive(Parser)]
#[command(
    name = "prep",
    about = "Advisor Prep — client document ingestion and meeting brief generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/prep.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the SQLite database schema. Idempotent.
    Init,

    /// Ingest a client's documents (or every client's with --all).
    ///
    /// Sweeps the client's directory under the data dir, skipping documents
    /// already in the store. Per-file failures are logged and skipped.
    Sync {
        /// Client id (subdirectory of the data dir).
        client: Option<String>,

        /// Sweep every client directory.
        #[arg(long)]
        all: bool,
    },

    /// Generate a prep brief for one client and print it as JSON.
    Brief {
        /// Client id.
        client: String,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Sync { client, all } => {
            let store = open_store(&cfg).await?;
            let genai = genai::GeminiClient::from_config(&cfg.generation);

            let targets = if all {
                clients::list_clients(&cfg.data.dir)?
            } else {
                match client {
                    Some(c) => vec![c],
                    None => anyhow::bail!("specify a client id or --all"),
                }
            };

            for client_id in targets {
                let dir = clients::client_dir(&cfg.data.dir, &client_id);
                let report = ingest::ingest_dir(&store, &genai, &client_id, &dir).await;
                println!("sync {}", client_id);
                println!("  files seen: {}", report.files_seen);
                println!("  documents ingested: {}", report.documents_ingested);
                println!("  chunks added: {}", report.chunks_added);
                println!("  already ingested: {}", report.already_ingested);
                println!("  skipped: {}", report.skipped);
            }
        }
        Commands::Brief { client } => {
            let store = open_store(&cfg).await?;
            let genai = genai::GeminiClient::from_config(&cfg.generation);
            let dir = clients::client_dir(&cfg.data.dir, &client);
            let brief = pipeline::generate_prep(
                &store,
                &genai,
                &genai,
                &client,
                &dir,
                cfg.retrieval.top_k,
                genai.temperature(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&brief)?);
        }
        Commands::Serve => {
            let store = Arc::new(open_store(&cfg).await?);
            let genai = Arc::new(genai::GeminiClient::from_config(&cfg.generation));
            server::run_server(&cfg, store, genai).await?;
        }
    }

    Ok(())
}

async fn open_store(cfg: &config::Config) -> Result<ChunkStore> {
    let pool = db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let embedder = embedding::create_provider(&cfg.embedding)?;
    Ok(ChunkStore::new(pool, embedder))
}
