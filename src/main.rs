//! # Paper RAG CLI (`prag`)
//!
//! The `prag` binary ingests papers, queries them and starts the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! prag --config ./config/prag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prag ingest <file>` | Ingest a PDF or text file |
//! | `prag ingest --url <url>` | Ingest an arXiv link, PDF URL or web page |
//! | `prag list` | List ingested papers |
//! | `prag get <id>` | Show a paper and its chunks |
//! | `prag search <id> "<question>"` | Show the chunks nearest to a question |
//! | `prag ask <id> "<question>"` | Answer a question from a paper |
//! | `prag serve` | Start the HTTP API server |
//!
//! Logs go to stderr and are filtered with `RUST_LOG`
//! (default `paper_rag=info,paper_rag_core=info`).

use clap::{Parser, Subcommand};
use paper_rag::{config, extract, get, ingest, search, server};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "paper_rag=info,paper_rag_core=info";

/// Paper RAG CLI: question answering over research papers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "prag",
    about = "Paper RAG: question answering over research papers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/prag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a paper from a file or URL.
    ///
    /// `.pdf` files are extracted with pdf-extract; any other file is read
    /// as UTF-8 text. Prints the new paper's id.
    Ingest {
        /// PDF or text file to ingest.
        #[arg(required_unless_present = "url", conflicts_with = "url")]
        file: Option<PathBuf>,

        /// arXiv link, PDF URL or web page to fetch instead of a file.
        #[arg(long)]
        url: Option<String>,
    },

    /// List ingested papers, oldest first.
    List,

    /// Show a paper's metadata and chunks.
    Get {
        /// Paper id.
        id: String,
    },

    /// Print the chunks of a paper nearest to a question.
    Search {
        /// Paper id.
        id: String,

        /// The question.
        query: String,

        /// Number of chunks to return (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question from a paper using the configured generator.
    Ask {
        /// Paper id.
        id: String,

        /// The question.
        question: String,

        /// Number of chunks to answer from (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { file, url } => {
            let pipeline = ingest::open_pipeline(&cfg)?;
            let report = match (file, url) {
                (_, Some(url)) => {
                    let client = extract::http_client()?;
                    ingest::ingest_url(pipeline, &client, &url).await?
                }
                (Some(path), None) => ingest::ingest_file(pipeline, &path).await?,
                (None, None) => anyhow::bail!("either a file or --url is required"),
            };
            println!("Ingested \"{}\" ({} chunks)", report.title, report.chunks);
            println!("{}", report.paper_id);
        }
        Commands::List => {
            get::run_list(&cfg)?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id)?;
        }
        Commands::Search { id, query, k } => {
            search::run_search(&cfg, &id, &query, k).await?;
        }
        Commands::Ask { id, question, k } => {
            search::run_ask(&cfg, &id, &question, k).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
