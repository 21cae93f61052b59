use async_trait::async_trait;
use docseek_retriever::{EngineError, EngineHandle, EngineState, SearchResponse};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::capability::Capability;

pub const TOOL_NAME: &str = "document_engine";

pub const TOOL_DESCRIPTION: &str = "Look up information in my notes/syllabus PDFs and return useful text with the PDF name. You can also specify a subject with `subject:SUBJECT_NAME`.";

const SUBJECT_MARKER: &str = "subject:";

/// A raw request split into the search text and an optional subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub query: String,
    pub subject: Option<String>,
}

/// Split `raw` at the first `subject:` marker (ASCII case-insensitive).
///
/// ```
/// use docseek_tools::tools::document_search::parse_query;
///
/// let parsed = parse_query("integration by parts Subject: Calculus");
/// assert_eq!(parsed.query, "integration by parts");
/// assert_eq!(parsed.subject.as_deref(), Some("Calculus"));
///
/// assert_eq!(parse_query("mitosis").subject, None);
/// ```
pub fn parse_query(raw: &str) -> ParsedQuery {
    // ASCII lowercasing keeps byte offsets aligned with `raw`.
    match raw.to_ascii_lowercase().find(SUBJECT_MARKER) {
        Some(at) => {
            let subject = raw[at + SUBJECT_MARKER.len()..].trim();
            ParsedQuery {
                query: raw[..at].trim().to_string(),
                subject: (!subject.is_empty()).then(|| subject.to_string()),
            }
        }
        None => ParsedQuery {
            query: raw.trim().to_string(),
            subject: None,
        },
    }
}

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub source: String,
    pub text: String,
}

/// What the document tool returns. Renders to the text shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DocumentAnswer {
    Results(Vec<Passage>),
    NoResults,
    NoSubjectMatch(String),
    NotReady,
    Error(String),
}

impl fmt::Display for DocumentAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Results(passages) => {
                for (i, passage) in passages.iter().enumerate() {
                    if i > 0 {
                        write!(f, "\n\n")?;
                    }
                    write!(f, "[{}] {}", passage.source, passage.text)?;
                }
                Ok(())
            }
            Self::NoResults => write!(f, "No relevant documents found for your query."),
            Self::NoSubjectMatch(subject) => {
                write!(f, "[{subject}] No results found for subject '{subject}'")
            }
            Self::NotReady => write!(
                f,
                "Document search is initializing. Please try again in a moment."
            ),
            Self::Error(message) => write!(f, "Document search failed: {message}"),
        }
    }
}

/// The `document_engine` capability: free-text search over the indexed documents.
#[derive(Debug, Clone)]
pub struct DocumentSearchTool {
    handle: EngineHandle,
    k: Option<usize>,
}

impl DocumentSearchTool {
    pub fn new(handle: EngineHandle) -> Self {
        Self { handle, k: None }
    }

    /// Return `k` passages instead of the engine's configured default.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// Text in, text out.
    pub async fn query_text(&self, raw: &str) -> String {
        self.invoke(raw.to_string()).await.to_string()
    }
}

#[async_trait]
impl Capability for DocumentSearchTool {
    type Input = String;
    type Output = DocumentAnswer;

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        TOOL_DESCRIPTION
    }

    async fn invoke(&self, input: String) -> DocumentAnswer {
        let parsed = parse_query(&input);
        if parsed.query.is_empty() {
            return DocumentAnswer::Error("the query is empty".to_string());
        }

        let engine = match self.handle.engine() {
            Ok(engine) => engine,
            Err(EngineError::NotReady {
                state: EngineState::Failed(reason),
            }) => {
                return DocumentAnswer::Error(format!("the document index could not be built: {reason}"));
            }
            Err(e) if e.is_transient() => return DocumentAnswer::NotReady,
            Err(e) => return DocumentAnswer::Error(e.to_string()),
        };

        let k = self.k.unwrap_or(engine.config().default_k);
        info!(
            "Document search: query={:?} subject={:?} k={}",
            parsed.query, parsed.subject, k
        );

        match engine
            .search(&parsed.query, k, parsed.subject.as_deref())
            .await
        {
            Ok(SearchResponse::NoSubjectMatch { subject }) => DocumentAnswer::NoSubjectMatch(subject),
            Ok(SearchResponse::Hits(hits)) if hits.is_empty() => DocumentAnswer::NoResults,
            Ok(SearchResponse::Hits(hits)) => DocumentAnswer::Results(
                hits.into_iter()
                    .map(|hit| Passage {
                        source: hit.source,
                        text: hit.text,
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!("Document search failed: {}", e);
                DocumentAnswer::Error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_variants() {
        assert_eq!(
            parse_query("  what is a derivative  "),
            ParsedQuery {
                query: "what is a derivative".to_string(),
                subject: None
            }
        );

        let parsed = parse_query("cell division SUBJECT:bio");
        assert_eq!(parsed.query, "cell division");
        assert_eq!(parsed.subject.as_deref(), Some("bio"));

        // Only the first marker splits.
        let parsed = parse_query("a subject: b subject: c");
        assert_eq!(parsed.query, "a");
        assert_eq!(parsed.subject.as_deref(), Some("b subject: c"));

        let parsed = parse_query("limits subject:   ");
        assert_eq!(parsed.query, "limits");
        assert_eq!(parsed.subject, None);
    }

    #[test]
    fn test_parse_query_keeps_unicode_intact() {
        let parsed = parse_query("Ünïcode résumé subject: Français");
        assert_eq!(parsed.query, "Ünïcode résumé");
        assert_eq!(parsed.subject.as_deref(), Some("Français"));
    }

    #[test]
    fn test_answer_rendering() {
        let answer = DocumentAnswer::Results(vec![
            Passage {
                source: "calc.pdf".to_string(),
                text: "Derivatives".to_string(),
            },
            Passage {
                source: "bio.pdf".to_string(),
                text: "Mitosis".to_string(),
            },
        ]);
        assert_eq!(answer.to_string(), "[calc.pdf] Derivatives\n\n[bio.pdf] Mitosis");

        assert_eq!(
            DocumentAnswer::NoResults.to_string(),
            "No relevant documents found for your query."
        );
        assert_eq!(
            DocumentAnswer::NoSubjectMatch("Chem".to_string()).to_string(),
            "[Chem] No results found for subject 'Chem'"
        );
        assert_eq!(
            DocumentAnswer::NotReady.to_string(),
            "Document search is initializing. Please try again in a moment."
        );
        assert_eq!(
            DocumentAnswer::Error("disk".to_string()).to_string(),
            "Document search failed: disk"
        );
    }

    #[test]
    fn test_answer_serializes_with_kind_tag() {
        let json = serde_json::to_value(DocumentAnswer::NoSubjectMatch("bio".to_string())).unwrap();
        assert_eq!(json["kind"], "no_subject_match");
        assert_eq!(json["detail"], "bio");
    }
}
