pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod events;
pub mod extractor;
pub mod llm;
pub mod mapper;
pub mod models;
pub mod pipeline;
pub mod similarity;
pub mod store;

pub use chunking::{normalize_whitespace, split_text, ChunkerConfig};
pub use embeddings::{Embedder, HashEmbedder, LazyEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{GenerationError, PipelineError};
pub use events::ChangeSignal;
pub use extractor::{source_kind, DocumentExtractor, FileExtractor, PageText};
pub use llm::{
    general_prompt, grounded_prompt, summary_prompt, ChatTurn, LlmClient, LlmConfig, ModelKind,
    TextGenerator, TurnRole,
};
pub use mapper::ConceptMapper;
pub use models::{
    generate_document_id, ConceptEdge, ConceptGraph, ConceptNode, DocumentMetadata, EdgeKind,
    NodeKind, PipelineOptions, ProcessedDocument, ResearchNote,
};
pub use pipeline::{
    discover_documents, BatchReport, DocumentPipeline, FailedFile, IngestedFile,
};
pub use similarity::{adjacent_similarities, average_embedding, cosine, document_similarity};
pub use store::StoredDocument;
