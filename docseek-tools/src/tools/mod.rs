//! Capabilities backed by the docseek retriever.

pub mod document_search;
