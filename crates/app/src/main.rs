mod loader;

use chrono::Utc;
use clap::{Parser, Subcommand};
use docqa_core::{
    answer_question, snapshot, CharacterNgramEmbedder, ChatCompletionsComposer,
    ChatCompletionsConfig, ChunkingConfig, IngestPolicy, RetrievalOptions, RetrievalService,
    SnapshotStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the corpus snapshot
    #[arg(long, env = "DOCQA_SNAPSHOT_DIR", default_value = ".docqa")]
    snapshot_dir: PathBuf,

    /// Maximum passage length in characters
    #[arg(long, default_value = "600")]
    chunk_size: usize,

    /// Characters shared by consecutive passages
    #[arg(long, default_value = "100")]
    chunk_overlap: usize,

    /// Embedding dimensions of the built-in trigram model
    #[arg(long, default_value = "128")]
    dimensions: usize,

    /// Texts per embedding call
    #[arg(long, default_value = "32")]
    batch_size: usize,

    /// Skip unreadable files and blank passages instead of failing the batch
    #[arg(long, default_value_t = false)]
    best_effort: bool,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// API key sent as a bearer token
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Chat model used to compose answers
    #[arg(long, env = "DOCQA_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    /// Sampling temperature for the chat model
    #[arg(long, default_value = "0.2")]
    temperature: f32,

    /// Request timeout for the chat model, in seconds
    #[arg(long, default_value = "60")]
    llm_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store text documents, then save the snapshot.
    Ingest {
        /// Files or folders (searched recursively for .txt and .md).
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the passages nearest to a query.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of passages to return.
        #[arg(long, default_value = "3")]
        top_k: usize,
    },
    /// Answer a question from the retrieved passages.
    Ask {
        /// Question to answer
        #[arg(long)]
        question: String,
        /// Number of passages passed as context.
        #[arg(long, default_value = "3")]
        top_k: usize,
        /// Print the passages used as context.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
    /// Show what the snapshot holds.
    Stats,
    /// Delete the snapshot and every stored passage.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let options = RetrievalOptions {
        chunking: ChunkingConfig::new(cli.chunk_size, cli.chunk_overlap)?,
        default_top_k: 3,
        embed_batch_size: cli.batch_size,
        snapshot_dir: cli.snapshot_dir.clone(),
        ingest_policy: if cli.best_effort {
            IngestPolicy::BestEffort
        } else {
            IngestPolicy::Strict
        },
    };
    let model = Arc::new(CharacterNgramEmbedder::new(cli.dimensions));
    let service = RetrievalService::with_model(model, options.clone());

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        snapshot_dir = %cli.snapshot_dir.display(),
        model = service.embedder().model_id(),
        "docqa boot"
    );

    match cli.command {
        Command::Ingest { ref paths } => {
            if let SnapshotStatus::Loaded { passages } = service.load()? {
                info!(passages, "continuing from existing snapshot");
            }

            let loaded = loader::load_documents(paths, options.ingest_policy)?;
            for skipped in &loaded.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }

            let report = service.ingest_documents(&loaded.documents)?;
            for item in &report.skipped {
                match item.chunk_id {
                    Some(chunk_id) => println!(
                        "skipped {} passage {}: {}",
                        item.source, chunk_id, item.reason
                    ),
                    None => println!("skipped {}: {}", item.source, item.reason),
                }
            }

            let saved = service.save()?;
            println!(
                "{} passages added from {} documents; corpus holds {} passages (saved {})",
                report.added_passages,
                report.ingested_sources.len(),
                saved.passages,
                saved.saved_at.to_rfc3339()
            );
        }
        Command::Search { ref query, top_k } => {
            require_corpus(&service)?;
            let hits = service.search(query, top_k)?;

            println!("query: {query}");
            for hit in hits {
                println!(
                    "[{}] distance={:.4} source={} chunk={}",
                    hit.passage.ordinal, hit.distance, hit.passage.source, hit.passage.chunk_id
                );
                println!("{}", hit.passage.text);
            }
        }
        Command::Ask {
            ref question,
            top_k,
            show_context,
        } => {
            require_corpus(&service)?;
            let composer = ChatCompletionsComposer::new(ChatCompletionsConfig {
                base_url: cli.llm_base_url.clone(),
                api_key: cli.llm_api_key.clone(),
                model: cli.llm_model.clone(),
                temperature: Some(cli.temperature),
                timeout: Duration::from_secs(cli.llm_timeout_secs),
            })?;

            let answer = answer_question(&service, &composer, question, top_k).await?;
            if show_context {
                for hit in &answer.passages {
                    println!(
                        "context: source={} chunk={} distance={:.4}",
                        hit.passage.source, hit.passage.chunk_id, hit.distance
                    );
                }
            }
            println!("{}", answer.text);
        }
        Command::Stats => {
            match service.load()? {
                SnapshotStatus::Loaded { passages } => {
                    println!("passages: {passages}");
                    if let Some(dimension) = service.dimension() {
                        println!("dimension: {dimension}");
                    }
                    for source in service.sources() {
                        println!("source: {source}");
                    }
                }
                SnapshotStatus::Missing => println!("no snapshot in {}", cli.snapshot_dir.display()),
            }
        }
        Command::Clear => {
            service.clear();
            snapshot::remove(&cli.snapshot_dir)?;
            println!("cleared {}", cli.snapshot_dir.display());
        }
    }

    Ok(())
}

fn require_corpus(service: &RetrievalService) -> anyhow::Result<()> {
    if service.load()? == SnapshotStatus::Missing {
        anyhow::bail!("no documents ingested yet; run `docqa ingest <paths>` first");
    }
    Ok(())
}
