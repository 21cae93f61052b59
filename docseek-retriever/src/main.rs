use clap::{Parser, Subcommand};
use docseek_embed::ProviderKind;
use docseek_retriever::{
    DocumentEngine, EngineHandle, RetrieverConfig, SearchResponse,
    config::DEFAULT_CONFIG_FILE, retrieval::directory_watcher::DirectoryWatcher,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

/// A CLI tool to build and query a docseek document index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (missing file means defaults)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory containing the documents to index
    #[arg(long)]
    pdf_dir: Option<PathBuf>,

    /// Path of the binary index artifact (metadata is stored next to it)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Embedding backend: fastembed or hashing
    #[arg(long)]
    embedder: Option<ProviderKind>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load or build the index and ingest any new documents
    Index {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Search the index for chunks similar to a query
    Search {
        /// Free-text query
        query: String,
        /// Maximum number of results (defaults to the configured default_k)
        #[arg(short)]
        k: Option<usize>,
        /// Only search documents whose file name contains this text
        #[arg(short, long)]
        subject: Option<String>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show index statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List the documents already in the index
    Sources,
    /// Index, then keep indexing new documents until interrupted
    Watch {
        /// Seconds of quiet before a burst of file events is processed
        #[arg(long, default_value_t = 2)]
        debounce_secs: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn load_config(args: &Args) -> anyhow::Result<RetrieverConfig> {
    let mut config = RetrieverConfig::load(&args.config).await?;
    if let Some(pdf_dir) = &args.pdf_dir {
        config.engine.pdf_dir = pdf_dir.clone();
    }
    if let Some(store) = &args.store {
        config.engine.store_path = store.clone();
    }
    if let Some(embedder) = args.embedder {
        config.embedding.provider = embedder;
    }
    config.validate()?;
    Ok(config)
}

async fn open_engine(config: RetrieverConfig) -> anyhow::Result<Arc<DocumentEngine>> {
    Ok(EngineHandle::from_config(config).wait_ready().await?)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args).await?;

    match args.command {
        Commands::Index { format } => {
            let engine = open_engine(config).await?;
            // Opening already ingested everything new; this pass reports the outcome.
            let report = engine.ingest_new_documents().await?;
            let stats = engine.stats().await;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!(
                        "Indexed {} documents ({} chunks) from {}",
                        stats.documents,
                        stats.chunks,
                        stats.pdf_dir.display()
                    );
                    println!(
                        "  This session: {} added, {} skipped, {} failed",
                        stats.documents_ingested, stats.documents_skipped, stats.documents_failed
                    );
                    if !report.is_empty() {
                        println!("  Latest pass added: {}", report.documents_added.join(", "));
                    }
                    println!("  Store: {}", engine.store().index_path().display());
                }
            }
            Ok(())
        }
        Commands::Search {
            query,
            k,
            subject,
            format,
        } => {
            if query.trim().is_empty() {
                return Err(anyhow::anyhow!("Query cannot be empty"));
            }

            let engine = open_engine(config).await?;
            let k = k.unwrap_or(engine.config().default_k);
            let response = engine.search(&query, k, subject.as_deref()).await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                OutputFormat::Summary => match &response {
                    SearchResponse::NoSubjectMatch { subject } => {
                        println!("No documents match subject '{subject}'");
                    }
                    SearchResponse::Hits(hits) => {
                        println!("Found {} results:", hits.len());
                        for (rank, hit) in hits.iter().enumerate() {
                            let preview: String = hit.text.chars().take(80).collect();
                            println!(
                                "  {}. Distance: {:.4} | Source: {} | {}",
                                rank + 1,
                                hit.distance,
                                hit.source,
                                preview.replace('\n', " ")
                            );
                        }
                    }
                },
                OutputFormat::Full => match &response {
                    SearchResponse::NoSubjectMatch { subject } => {
                        println!("No documents match subject '{subject}'");
                    }
                    SearchResponse::Hits(hits) => {
                        for hit in hits {
                            println!("Distance: {:.4}", hit.distance);
                            println!("Source: {}", hit.source);
                            println!("Chunk: {}", hit.position);
                            println!("Content:\n{}", hit.text);
                            println!("---");
                        }
                    }
                },
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let engine = open_engine(config).await?;
            let stats = engine.stats().await;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Index Statistics:");
                    println!("  State: {}", stats.state);
                    println!("  Documents: {}", stats.documents);
                    println!("  Chunks: {}", stats.chunks);
                    match stats.dimension {
                        Some(dimension) => println!("  Dimension: {dimension}"),
                        None => println!("  Dimension: (empty index)"),
                    }
                    println!("  Embedder: {}", stats.embedder);
                    println!("  Extractor: {}", stats.extractor);
                    println!("  Document directory: {}", stats.pdf_dir.display());
                    println!("  Store: {}", stats.store_path.display());
                    if let Some(checksum) = engine.store().index_checksum() {
                        println!("  Store checksum: {checksum}");
                    }
                    if let Some(last) = stats.last_ingest {
                        println!("  Last ingest: {}", last.to_rfc3339());
                    }

                    if format == OutputFormat::Full && !stats.processed_documents.is_empty() {
                        println!("  Documents:");
                        for document in &stats.processed_documents {
                            println!("    {document}");
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Sources => {
            let engine = open_engine(config).await?;
            for document in engine.processed_documents().await {
                println!("{document}");
            }
            Ok(())
        }
        Commands::Watch { debounce_secs } => {
            let pdf_dir = config.engine.pdf_dir.clone();
            tokio::fs::create_dir_all(&pdf_dir).await?;

            let engine = open_engine(config).await?;
            println!(
                "Indexed {} documents; watching {} (Ctrl-C to stop)",
                engine.stats().await.documents,
                pdf_dir.display()
            );

            let watcher = DirectoryWatcher::open(
                &pdf_dir,
                &engine.config().extension,
                Duration::from_secs(debounce_secs),
                Arc::clone(&engine),
            )?;

            tokio::signal::ctrl_c().await?;
            watcher.shutdown().await?;
            Ok(())
        }
    }
}
