use clap::Parser;
use docseek_context::text::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, WindowChunker};
use std::fs;
use std::io::{self, Read};

/// A CLI tool to split extracted document text into overlapping JSON chunks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Source label recorded on every chunk.
    /// Defaults to the input file name, or "stdin".
    #[arg(short, long)]
    source: Option<String>,

    /// Maximum length of each chunk in characters.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Number of characters shared by consecutive chunks.
    #[arg(short, long, default_value_t = DEFAULT_OVERLAP)]
    overlap: usize,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let chunker = WindowChunker::new(args.chunk_size, args.overlap)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let (file_content, default_source) = if let Some(input_path) = &args.input {
        let name = std::path::Path::new(input_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input_path.clone());
        (fs::read_to_string(input_path)?, name)
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        (buffer, "stdin".to_string())
    };

    let source = args.source.unwrap_or(default_source);
    let chunks = chunker.get_chunks(&source, &file_content);

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{json_output}");

    Ok(())
}
