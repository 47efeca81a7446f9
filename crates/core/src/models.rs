use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `chunks`, `embeddings`, `metadata.chunk_sizes`, and
/// `metadata.semantic_similarity` are positionally aligned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub id: String,
    pub chunks: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadata: DocumentMetadata,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub name: String,
    /// MIME-style source type.
    pub kind: String,
    pub page_numbers: Vec<u32>,
    pub chunk_sizes: Vec<usize>,
    pub semantic_similarity: Vec<f32>,
    pub processing_errors: Option<Vec<String>>,
}

/// A free-form note attached to a document; `document_id` may dangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchNote {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Not populated by clustering.
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Document,
    Topic,
    Concept,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Similarity,
    Topic,
    Reference,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptEdge {
    pub source: String,
    pub target: String,
    pub weight: f32,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptGraph {
    pub nodes: Vec<ConceptNode>,
    pub edges: Vec<ConceptEdge>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunk_size_words: usize,
    pub chunk_overlap_words: usize,
    pub separators: Vec<&'static str>,
    pub max_documents: usize,
    /// Advisory; never blocks ingestion.
    pub byte_budget: u64,
    pub summarize: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size_words: 500,
            chunk_overlap_words: 100,
            separators: vec!["\n\n", "\n", ". ", " ", ""],
            max_documents: 5,
            byte_budget: 50 * 1024 * 1024,
            summarize: false,
        }
    }
}

/// Millisecond timestamp plus a random suffix.
pub fn generate_document_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_from_same_instant_differ() {
        let now = Utc::now();
        let first = generate_document_id(now);
        let second = generate_document_id(now);
        assert_ne!(first, second);
        assert!(first.starts_with(&now.timestamp_millis().to_string()));
    }

    #[test]
    fn node_kind_serializes_lowercase() {
        let node = ConceptNode {
            id: "doc-1".to_string(),
            label: "paper.pdf".to_string(),
            kind: NodeKind::Document,
            size: Some(3),
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "document");
    }

    #[test]
    fn default_options_match_admission_contract() {
        let options = PipelineOptions::default();
        assert_eq!(options.max_documents, 5);
        assert_eq!(options.byte_budget, 50 * 1024 * 1024);
        assert_eq!(options.separators.last(), Some(&""));
    }
}
