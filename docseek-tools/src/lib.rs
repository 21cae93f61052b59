//! # docseek-tools
//!
//! Exposes the docseek document engine as a named capability that an outer
//! agent or dispatcher can call with free text, plus a small interactive
//! prompt for using it from a terminal.
//!
//! ## Capabilities
//!
//! ### `document_engine`
//! Look up passages in the indexed PDFs:
//! - Free-text query, optionally followed by `subject:NAME` to restrict the
//!   search to documents whose file name contains `NAME`
//! - Answers are `[source] text` blocks separated by blank lines
//! - While the index is still being built the capability answers with an
//!   "initializing" message instead of waiting
//!
//! ## Quick Start
//!
//! ```bash
//! # One-shot query against ./data/College_PDFs
//! docseek --query "integration by parts subject:calculus"
//!
//! # Interactive prompt
//! docseek --pdf-dir ~/notes
//! ```
//!
//! ## Use as a library
//! ```no_run
//! use docseek_retriever::{EngineHandle, RetrieverConfig};
//! use docseek_tools::{Capability, DocumentSearchTool};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let handle = EngineHandle::from_config(RetrieverConfig::default());
//! handle.wait_ready().await?;
//!
//! let tool = DocumentSearchTool::new(handle);
//! println!("{}", tool.invoke("mitosis subject:bio".to_string()).await);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod tools;

pub use capability::{Capability, CapabilityInfo};
pub use tools::document_search::{DocumentAnswer, DocumentSearchTool, ParsedQuery, parse_query};

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

pub const PROMPT: &str = "Enter a query (q to quit): ";

/// Read queries line by line from `input` and write each answer to `output`.
///
/// Stops on `q` or end of input. Blank lines are ignored.
pub async fn run_interactive<R, W>(tool: &DocumentSearchTool, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut answered = 0usize;

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        debug!("Interactive query: {:?}", line);
        let answer = tool.query_text(line).await;
        output.write_all(answer.as_bytes()).await?;
        output.write_all(b"\n\n").await?;
        answered += 1;
    }

    output.flush().await?;
    info!("Interactive session ended after {} queries", answered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseek_embed::HashingProvider;
    use docseek_retriever::retrieval::extractor::PlainTextExtractor;
    use docseek_retriever::{EngineConfig, EngineHandle};
    use std::io::Cursor;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_interactive_answers_while_initializing() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config = EngineConfig::new(
            temp_dir.path().join("docs"),
            temp_dir.path().join("index_data.idx"),
        )
        .with_extension("txt");
        let handle = EngineHandle::from_parts(
            config,
            Arc::new(HashingProvider::new(32)?),
            Arc::new(PlainTextExtractor::new()),
        );
        let tool = DocumentSearchTool::new(handle);

        let mut output = Vec::new();
        run_interactive(&tool, Cursor::new(b"limits\nQ\n".to_vec()), &mut output).await?;

        let transcript = String::from_utf8(output)?;
        assert!(transcript.contains("Document search is initializing."));
        assert!(logs_contain("Interactive session ended after 1 queries"));
        Ok(())
    }
}
