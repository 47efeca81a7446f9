use crate::models::{
    ConceptEdge, ConceptGraph, ConceptNode, EdgeKind, NodeKind, ProcessedDocument, ResearchNote,
};
use crate::similarity::{cosine, document_similarity};
use std::collections::BTreeMap;

const DOCUMENT_EDGE_THRESHOLD: f32 = 0.5;
const TOPIC_CLUSTER_THRESHOLD: f32 = 0.8;

const NOTE_LABEL_CHARS: usize = 30;
const TOPIC_LABEL_CHARS: usize = 50;

/// Append-only session corpus of documents and notes; derives the
/// concept graph and topic clusters from it.
#[derive(Default)]
pub struct ConceptMapper {
    documents: Vec<ProcessedDocument>,
    notes: Vec<ResearchNote>,
}

impl ConceptMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, document: ProcessedDocument) {
        self.documents.push(document);
    }

    /// `document_id` is not validated; a dangling reference still
    /// produces a node and an edge.
    pub fn add_note(&mut self, note: ResearchNote) {
        self.notes.push(note);
    }

    pub fn documents(&self) -> &[ProcessedDocument] {
        &self.documents
    }

    pub fn notes(&self) -> &[ResearchNote] {
        &self.notes
    }

    /// Rebuilds the graph from current state in a fixed emission order.
    pub fn generate_concept_graph(&self) -> ConceptGraph {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        for document in &self.documents {
            if document.metadata.name.is_empty() {
                continue;
            }
            nodes.push(ConceptNode {
                id: document.id.clone(),
                label: document.metadata.name.clone(),
                kind: NodeKind::Document,
                size: Some(document.chunks.len()),
            });
        }

        for (left_index, left) in self.documents.iter().enumerate() {
            if left.embeddings.is_empty() {
                continue;
            }
            for right in self.documents.iter().skip(left_index + 1) {
                if right.embeddings.is_empty() {
                    continue;
                }
                let similarity = document_similarity(&left.embeddings, &right.embeddings);
                if similarity > DOCUMENT_EDGE_THRESHOLD {
                    edges.push(ConceptEdge {
                        source: left.id.clone(),
                        target: right.id.clone(),
                        weight: similarity,
                        kind: EdgeKind::Similarity,
                    });
                }
            }
        }

        for note in &self.notes {
            if note.content.is_empty() {
                continue;
            }
            nodes.push(ConceptNode {
                id: note.id.clone(),
                label: note_label(&note.content),
                kind: NodeKind::Concept,
                size: None,
            });
            edges.push(ConceptEdge {
                source: note.id.clone(),
                target: note.document_id.clone(),
                weight: 1.0,
                kind: EdgeKind::Reference,
            });
        }

        ConceptGraph { nodes, edges }
    }

    /// Greedy single-pass topic clustering per document: each unassigned
    /// chunk seeds a cluster and absorbs every later unassigned chunk
    /// whose similarity to the seed exceeds the threshold.
    pub fn identify_topics(&self) -> BTreeMap<String, Vec<String>> {
        let mut topics = BTreeMap::new();
        for document in &self.documents {
            topics.insert(
                document.id.clone(),
                cluster_chunks(&document.chunks, &document.embeddings),
            );
        }
        topics
    }
}

fn cluster_chunks(chunks: &[String], embeddings: &[Vec<f32>]) -> Vec<String> {
    let count = chunks.len().min(embeddings.len());
    let mut assigned = vec![false; count];
    let mut labels = Vec::new();

    for seed in 0..count {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;

        for candidate in seed + 1..count {
            if assigned[candidate] {
                continue;
            }
            if cosine(&embeddings[seed], &embeddings[candidate]) > TOPIC_CLUSTER_THRESHOLD {
                assigned[candidate] = true;
            }
        }

        labels.push(topic_label(&chunks[seed]));
    }

    labels
}

fn note_label(content: &str) -> String {
    let prefix: String = content.chars().take(NOTE_LABEL_CHARS).collect();
    format!("{prefix}...")
}

fn topic_label(chunk: &str) -> String {
    let first_sentence = chunk.split('.').next().unwrap_or(chunk);
    if first_sentence.chars().count() > TOPIC_LABEL_CHARS {
        let prefix: String = first_sentence.chars().take(TOPIC_LABEL_CHARS - 3).collect();
        format!("{prefix}...")
    } else {
        first_sentence.to_string()
    }
}
