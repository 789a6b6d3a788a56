use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use notes_rag::config::{Config, Secrets};
use notes_rag::context::AppContext;
use notes_rag::server;

#[derive(Parser)]
#[command(
    name = "notes-rag",
    version,
    about = "RAG over a folder of markdown notes"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = notes_rag::config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Use an in-memory index with mock embeddings and completions
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Ingest the knowledge base before serving (always done when offline)
        #[arg(long)]
        ingest: bool,
    },
    /// Load, chunk, embed and upsert the knowledge base
    Ingest,
    /// Run a single query from the command line
    Query {
        text: String,

        /// Print a synthesized answer instead of the retrieved chunks
        #[arg(long)]
        synthesize: bool,

        /// Number of chunks to retrieve (defaults to search_top_k)
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Load config
    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    // 2. Build shared clients (secrets are required unless offline)
    let ctx = if cli.offline {
        info!("Running offline: in-memory index, mock embedder and model");
        AppContext::offline(config)
    } else {
        let secrets = Secrets::from_env()?;
        AppContext::connect(config, &secrets)?
    };

    // 3. Dispatch
    match cli.command {
        Command::Ingest => ingest(&ctx).await,
        Command::Serve { ingest: run_ingest } => {
            if run_ingest || cli.offline {
                ingest(&ctx).await?;
            }
            let server_cfg = &ctx.config.server;
            server::serve(ctx.app_state(), &server_cfg.bind, server_cfg.port).await
        }
        Command::Query {
            text,
            synthesize,
            top_k,
        } => {
            if cli.offline {
                ingest(&ctx).await?;
            }
            query(&ctx, &text, synthesize, top_k).await
        }
    }
}

async fn ingest(ctx: &AppContext) -> Result<()> {
    let report = ctx
        .indexer()
        .with_progress(std::io::stderr().is_terminal())
        .ingest(&ctx.loader(), &ctx.config.index_spec())
        .await?;
    println!(
        "Ingested {} files ({} skipped): {} documents, {} nodes upserted into {}",
        report.files_loaded,
        report.files_skipped,
        report.documents,
        report.upserted,
        ctx.config.index.name
    );
    Ok(())
}

async fn query(ctx: &AppContext, text: &str, synthesize: bool, top_k: Option<usize>) -> Result<()> {
    let retriever = ctx.retriever();

    if synthesize {
        let answer = ctx.synthesizer(retriever).synthesize(text).await?;
        println!("{answer}");
        return Ok(());
    }

    let matches = retriever
        .retrieve(text, top_k.unwrap_or(ctx.config.search_top_k))
        .await?;
    for m in matches {
        println!("id: {}", m.node.id);
        println!("metadata: {:?}", m.node.metadata);
        println!("score: {}", m.score.map_or("n/a".to_string(), |s| s.to_string()));
        println!("{}", m.node.text);
        println!("---------------------");
    }
    Ok(())
}
