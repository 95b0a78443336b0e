//! Hybrid retrieval-and-ranking pipeline.
//!
//! A search request fans out to the lexical index, the vector index, and the
//! live web-search channel; database candidates are fused, deduplicated,
//! reranked and annotated with highlight explanations before the orchestrator
//! assembles the two labeled result lists.

pub mod chunking;
pub mod highlight;
pub mod ingest;
pub mod pipeline;
pub mod rerank;
pub mod retriever;
pub mod summarize;

pub use pipeline::SearchPipeline;
