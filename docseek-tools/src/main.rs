use anyhow::Result;
use clap::{Arg, Command};
use docseek_embed::ProviderKind;
use docseek_retriever::{EngineHandle, RetrieverConfig, config::DEFAULT_CONFIG_FILE};
use docseek_tools::{Capability, DocumentSearchTool, run_interactive};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so answers on stdout stay clean
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let matches = Command::new("docseek")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ask questions about a folder of PDF notes")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .default_value(DEFAULT_CONFIG_FILE)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("pdf-dir")
                .long("pdf-dir")
                .value_name("DIR")
                .help("Directory containing the PDFs to index")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .value_name("FILE")
                .help("Path of the binary index artifact")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("embedder")
                .long("embedder")
                .value_name("KIND")
                .help("Embedding backend: fastembed or hashing")
                .value_parser(clap::value_parser!(ProviderKind)),
        )
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("TEXT")
                .help("Answer a single query and exit"),
        )
        .arg(
            Arg::new("k")
                .short('k')
                .value_name("N")
                .help("Number of passages per answer")
                .value_parser(clap::value_parser!(usize)),
        )
        .get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = RetrieverConfig::load(&config_path).await?;

    if let Some(pdf_dir) = matches.get_one::<PathBuf>("pdf-dir") {
        config.engine.pdf_dir = pdf_dir.clone();
    }
    if let Some(store) = matches.get_one::<PathBuf>("store") {
        config.engine.store_path = store.clone();
    }
    if let Some(embedder) = matches.get_one::<ProviderKind>("embedder") {
        config.embedding.provider = *embedder;
    }
    config.validate()?;

    let handle = EngineHandle::from_config(config);
    let mut tool = DocumentSearchTool::new(handle.clone());
    if let Some(k) = matches.get_one::<usize>("k") {
        tool = tool.with_k(*k);
    }

    if let Some(query) = matches.get_one::<String>("query") {
        handle.wait_ready().await?;
        println!("{}", tool.invoke(query.clone()).await);
        return Ok(());
    }

    info!("Building the document index in the background");
    handle.start();
    run_interactive(&tool, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
