use crate::error::PipelineError;
use async_trait::async_trait;
use tokio::sync::OnceCell;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Converts a chunk of text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}

/// Deterministic FNV-hashed character-trigram embedder, L2-normalized.
/// Empty input yields the zero vector.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl HashEmbedder {
    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        Ok(self.embed_sync(text))
    }
}

/// Embedder constructed on first use; racing first calls perform exactly
/// one construction.
pub struct LazyEmbedder<E, F>
where
    E: Embedder,
    F: Fn() -> Result<E, PipelineError> + Send + Sync,
{
    dimensions: usize,
    factory: F,
    cell: OnceCell<E>,
}

impl<E, F> LazyEmbedder<E, F>
where
    E: Embedder,
    F: Fn() -> Result<E, PipelineError> + Send + Sync,
{
    pub fn new(dimensions: usize, factory: F) -> Self {
        Self {
            dimensions,
            factory,
            cell: OnceCell::new(),
        }
    }

    async fn instance(&self) -> Result<&E, PipelineError> {
        self.cell.get_or_try_init(|| async { (self.factory)() }).await
    }
}

#[async_trait]
impl<E, F> Embedder for LazyEmbedder<E, F>
where
    E: Embedder,
    F: Fn() -> Result<E, PipelineError> + Send + Sync,
{
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        self.instance().await?.embed(text).await
    }
}
