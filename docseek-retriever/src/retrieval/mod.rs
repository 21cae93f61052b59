pub mod chunking_strategy;
pub mod directory_watcher;
pub mod engine;
pub mod extractor;
pub mod flat_index;
