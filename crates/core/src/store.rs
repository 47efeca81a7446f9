use crate::models::ProcessedDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Boundary record handed to the external store; `content` is the
/// document's chunks joined by newlines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    pub content: String,
    /// RFC 3339.
    pub timestamp: String,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl StoredDocument {
    pub fn from_processed(document: &ProcessedDocument, size: u64, at: DateTime<Utc>) -> Self {
        Self {
            id: document.id.clone(),
            name: document.metadata.name.clone(),
            kind: document.metadata.kind.clone(),
            size,
            content: document.chunks.join("\n"),
            timestamp: at.to_rfc3339(),
            processed: true,
            summary: document.summary.clone(),
        }
    }
}
