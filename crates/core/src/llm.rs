use crate::error::GenerationError;
use crate::store::StoredDocument;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

pub const GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEEPSEEK_MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent";
const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Gemini,
    Deepseek,
}

/// Backend configuration; model selection lives on the value handed to
/// the client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: ModelKind,
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub gemini_endpoint: String,
    pub openrouter_endpoint: String,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Gemini,
            gemini_api_key: None,
            openrouter_api_key: None,
            gemini_endpoint: GEMINI_ENDPOINT.to_string(),
            openrouter_endpoint: OPENROUTER_ENDPOINT.to_string(),
            site_url: None,
            site_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    fn as_str(self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// `complete(prompt) -> text` capability consumed by the pipeline and
/// the CLI.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.config.model = model;
        self
    }

    pub fn model(&self) -> ModelKind {
        self.config.model
    }

    async fn complete_gemini(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key =
            self.config
                .gemini_api_key
                .as_deref()
                .ok_or_else(|| GenerationError::MissingApiKey {
                    backend: "gemini".to_string(),
                })?;

        let mut endpoint = Url::parse(&self.config.gemini_endpoint)?;
        endpoint.query_pairs_mut().append_pair("key", api_key);

        let response = self
            .client
            .post(endpoint)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::Backend {
                backend: "gemini".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        parse_gemini_response(&payload)
    }

    async fn complete_deepseek(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self.config.openrouter_api_key.as_deref().ok_or_else(|| {
            GenerationError::MissingApiKey {
                backend: "openrouter".to_string(),
            }
        })?;

        let endpoint = Url::parse(&self.config.openrouter_endpoint)?;
        let mut request = self
            .client
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&json!({
                "model": DEEPSEEK_MODEL,
                "messages": [{ "role": "user", "content": prompt }],
            }));

        if let Some(site_url) = &self.config.site_url {
            request = request.header("HTTP-Referer", site_url.as_str());
        }
        if let Some(site_name) = &self.config.site_name {
            request = request.header("X-Title", site_name.as_str());
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(GenerationError::Backend {
                backend: "openrouter".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        parse_openrouter_response(&payload)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        match self.config.model {
            ModelKind::Gemini => self.complete_gemini(prompt).await,
            ModelKind::Deepseek => self.complete_deepseek(prompt).await,
        }
    }
}

fn parse_gemini_response(payload: &Value) -> Result<String, GenerationError> {
    let text = payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::Empty {
            backend: "gemini".to_string(),
        });
    }
    Ok(text.to_string())
}

fn parse_openrouter_response(payload: &Value) -> Result<String, GenerationError> {
    let text = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::Empty {
            backend: "openrouter".to_string(),
        });
    }
    Ok(text.to_string())
}

fn render_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for document-grounded answering.
pub fn grounded_prompt(
    documents: &[StoredDocument],
    history: &[ChatTurn],
    question: &str,
) -> String {
    let document_context = documents
        .iter()
        .map(|doc| format!("Document: {}\nContent: {}", doc.name, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful AI assistant. Use the following documents as your primary \
knowledge source, but you can also provide additional relevant information when necessary.\n\n\
Document Context:\n{document_context}\n\n\
Previous Conversation:\n{}\n\n\
User Question: {question}\n\n\
Please provide a response that:\n\
1. Primarily uses information from the provided documents\n\
2. Clearly indicates when you're referencing document content\n\
3. Can supplement with general knowledge when relevant, but prioritize document information\n\
4. If the documents don't contain relevant information, say so and provide a general response",
        render_history(history)
    )
}

/// Prompt for answering with no document grounding.
pub fn general_prompt(history: &[ChatTurn], question: &str) -> String {
    format!(
        "You are a helpful AI assistant. Please provide a general response based on your knowledge.\n\n\
Previous Conversation:\n{}\n\n\
User Question: {question}\n\n\
Please provide a response that:\n\
1. Uses your general knowledge to answer the question\n\
2. Stays focused on the user's query\n\
3. Does not reference any uploaded documents\n\
4. Provides accurate and helpful information",
        render_history(history)
    )
}

/// Prompt for the summarization stage.
pub fn summary_prompt(name: &str, text: &str) -> String {
    format!(
        "Summarize the following document in a short paragraph, keeping the key \
topics and findings.\n\nDocument: {name}\n\n{text}"
    )
}
