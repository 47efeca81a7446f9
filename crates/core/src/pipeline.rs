use crate::chunking::{self, ChunkerConfig};
use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::events::ChangeSignal;
use crate::extractor::{source_kind, DocumentExtractor};
use crate::llm::{summary_prompt, TextGenerator};
use crate::models::{generate_document_id, DocumentMetadata, PipelineOptions, ProcessedDocument};
use crate::similarity::adjacent_similarities;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub path: PathBuf,
    pub size: u64,
    pub document: ProcessedDocument,
}

#[derive(Debug)]
pub struct FailedFile {
    pub path: PathBuf,
    pub stage: String,
    pub reason: String,
}

/// Per-file outcomes of a batch; one file's failure never aborts the others.
#[derive(Debug)]
pub struct BatchReport {
    pub documents: Vec<IngestedFile>,
    pub failures: Vec<FailedFile>,
}

/// Runs extraction, chunking, embedding, the adjacent-similarity pass,
/// and optional summarization. The document ceiling is checked before any
/// work starts; the byte budget is tracked but never blocks ingestion.
pub struct DocumentPipeline<X, E>
where
    X: DocumentExtractor + 'static,
    E: Embedder + 'static,
{
    extractor: Arc<X>,
    embedder: Arc<E>,
    summarizer: Option<Arc<dyn TextGenerator>>,
    options: PipelineOptions,
    held_documents: usize,
    held_bytes: u64,
    signal: ChangeSignal,
}

impl<X, E> DocumentPipeline<X, E>
where
    X: DocumentExtractor + 'static,
    E: Embedder + 'static,
{
    pub fn new(extractor: X, embedder: E, options: PipelineOptions) -> Result<Self, PipelineError> {
        if options.chunk_size_words == 0 {
            return Err(PipelineError::InvalidOptions(
                "chunk_size_words must be positive".to_string(),
            ));
        }
        if options.chunk_overlap_words >= options.chunk_size_words {
            return Err(PipelineError::InvalidOptions(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                options.chunk_overlap_words, options.chunk_size_words
            )));
        }
        if options.max_documents == 0 {
            return Err(PipelineError::InvalidOptions(
                "max_documents must be positive".to_string(),
            ));
        }

        Ok(Self {
            extractor: Arc::new(extractor),
            embedder: Arc::new(embedder),
            summarizer: None,
            options,
            held_documents: 0,
            held_bytes: 0,
            signal: ChangeSignal::new(),
        })
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn TextGenerator>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn held_documents(&self) -> usize {
        self.held_documents
    }

    pub fn held_bytes(&self) -> u64 {
        self.held_bytes
    }

    pub fn byte_budget_exceeded(&self) -> bool {
        self.held_bytes > self.options.byte_budget
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<u64> {
        self.signal.subscribe()
    }

    fn admit(&self, incoming: usize) -> Result<(), PipelineError> {
        if self.held_documents + incoming > self.options.max_documents {
            return Err(PipelineError::Admission {
                held: self.held_documents,
                limit: self.options.max_documents,
            });
        }
        Ok(())
    }

    pub async fn process(&mut self, path: &Path) -> Result<ProcessedDocument, PipelineError> {
        self.admit(1)?;

        let ingested = process_file(
            Arc::clone(&self.extractor),
            Arc::clone(&self.embedder),
            self.summarizer.clone(),
            self.options.clone(),
            path.to_path_buf(),
        )
        .await?;

        self.held_documents += 1;
        self.held_bytes += ingested.size;
        self.signal.notify();
        Ok(ingested.document)
    }

    /// Process a batch of files on independent tasks. Admission covers
    /// the whole batch up front; afterwards each file resolves on its own.
    pub async fn process_batch(&mut self, paths: &[PathBuf]) -> Result<BatchReport, PipelineError> {
        self.admit(paths.len())?;

        let mut join_set = JoinSet::new();
        let mut task_slots = HashMap::new();
        for (index, path) in paths.iter().cloned().enumerate() {
            let extractor = Arc::clone(&self.extractor);
            let embedder = Arc::clone(&self.embedder);
            let summarizer = self.summarizer.clone();
            let options = self.options.clone();
            let handle = join_set.spawn(async move {
                (
                    index,
                    process_file(extractor, embedder, summarizer, options, path).await,
                )
            });
            task_slots.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<Result<IngestedFile, PipelineError>>> =
            (0..paths.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(join_error) => {
                    if let Some(&index) = task_slots.get(&join_error.id()) {
                        slots[index] = Some(Err(PipelineError::Extraction(format!(
                            "processing task failed: {join_error}"
                        ))));
                    }
                }
            }
        }

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for (path, slot) in paths.iter().zip(slots) {
            match slot {
                Some(Ok(ingested)) => {
                    self.held_documents += 1;
                    self.held_bytes += ingested.size;
                    documents.push(ingested);
                }
                Some(Err(error)) => failures.push(FailedFile {
                    path: path.clone(),
                    stage: stage_of(&error).to_string(),
                    reason: error.to_string(),
                }),
                None => {}
            }
        }

        if !documents.is_empty() {
            self.signal.notify();
        }
        Ok(BatchReport {
            documents,
            failures,
        })
    }
}

async fn process_file<X, E>(
    extractor: Arc<X>,
    embedder: Arc<E>,
    summarizer: Option<Arc<dyn TextGenerator>>,
    options: PipelineOptions,
    path: PathBuf,
) -> Result<IngestedFile, PipelineError>
where
    X: DocumentExtractor + 'static,
    E: Embedder + 'static,
{
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PipelineError::MissingFileName(path.clone()))?
        .to_string();

    let pages = extractor.extract_pages(&path)?;
    let page_numbers: Vec<u32> = pages.iter().map(|page| page.number).collect();

    let full_text = pages
        .iter()
        .map(|page| chunking::normalize_whitespace(&page.text))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let chunks = chunking::split_text(&full_text, &ChunkerConfig::from(&options));
    if chunks.is_empty() {
        return Err(PipelineError::Chunking(format!(
            "no chunks produced for {name}"
        )));
    }

    let embeddings = embed_chunks(&embedder, &chunks).await?;
    let semantic_similarity = adjacent_similarities(&embeddings);
    let chunk_sizes: Vec<usize> = chunks.iter().map(|chunk| chunk.chars().count()).collect();

    let mut processing_errors = Vec::new();
    let summary = match (&summarizer, options.summarize) {
        (Some(summarizer), true) => {
            match summarizer.complete(&summary_prompt(&name, &full_text)).await {
                Ok(text) => Some(text),
                Err(error) => {
                    processing_errors.push(format!("summary: {error}"));
                    None
                }
            }
        }
        _ => None,
    };

    let document = ProcessedDocument {
        id: generate_document_id(Utc::now()),
        chunks,
        embeddings,
        metadata: DocumentMetadata {
            name,
            kind: source_kind(&path),
            page_numbers,
            chunk_sizes,
            semantic_similarity,
            processing_errors: if processing_errors.is_empty() {
                None
            } else {
                Some(processing_errors)
            },
        },
        summary,
    };

    let size = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
    Ok(IngestedFile {
        path,
        size,
        document,
    })
}

/// Embed chunks concurrently; results are reassembled by chunk index.
async fn embed_chunks<E>(embedder: &Arc<E>, chunks: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>
where
    E: Embedder + 'static,
{
    let mut join_set = JoinSet::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let embedder = Arc::clone(embedder);
        let chunk = chunk.clone();
        join_set.spawn(async move { (index, embedder.embed(&chunk).await) });
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];
    while let Some(joined) = join_set.join_next().await {
        let (index, embedded) =
            joined.map_err(|error| PipelineError::Embedding(error.to_string()))?;
        slots[index] = Some(embedded?);
    }

    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| PipelineError::Embedding("missing embedding slot".to_string()))
}

fn stage_of(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::Io(_) | PipelineError::Extraction(_) | PipelineError::MissingFileName(_) => {
            "extraction"
        }
        PipelineError::Chunking(_) => "chunking",
        PipelineError::Embedding(_) => "embedding",
        PipelineError::Similarity(_) => "similarity",
        PipelineError::Admission { .. } => "admission",
        PipelineError::InvalidOptions(_) => "options",
    }
}

/// Recursively discover `.pdf`/`.txt`/`.md` files, sorted.
pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                ext.eq_ignore_ascii_case("pdf")
                    || ext.eq_ignore_ascii_case("txt")
                    || ext.eq_ignore_ascii_case("md")
            });

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::error::GenerationError;
    use crate::extractor::{FileExtractor, PageText};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FakeExtractor {
        calls: Arc<AtomicUsize>,
    }

    impl DocumentExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if name.contains("bad") {
                return Err(PipelineError::Extraction(format!("unreadable: {name}")));
            }
            if name.contains("panic") {
                panic!("extractor crashed on {name}");
            }
            Ok(vec![
                PageText {
                    number: 1,
                    text: format!("First page about {name}. It has a few sentences of text."),
                },
                PageText {
                    number: 2,
                    text: "Second page with more material to chunk.".to_string(),
                },
            ])
        }
    }

    struct FakeSummarizer {
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for FakeSummarizer {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            if self.fail {
                Err(GenerationError::Empty {
                    backend: "fake".to_string(),
                })
            } else {
                Ok("a concise summary".to_string())
            }
        }
    }

    fn pipeline_with(
        calls: &Arc<AtomicUsize>,
        options: PipelineOptions,
    ) -> DocumentPipeline<FakeExtractor, HashEmbedder> {
        DocumentPipeline::new(
            FakeExtractor {
                calls: Arc::clone(calls),
            },
            HashEmbedder { dimensions: 16 },
            options,
        )
        .unwrap()
    }

    fn small_chunk_options() -> PipelineOptions {
        PipelineOptions {
            chunk_size_words: 6,
            chunk_overlap_words: 2,
            ..PipelineOptions::default()
        }
    }

    #[tokio::test]
    async fn processed_document_arrays_stay_aligned() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline_with(&calls, small_chunk_options());

        let document = pipeline.process(Path::new("alpha.txt")).await.unwrap();
        assert!(!document.chunks.is_empty());
        assert_eq!(document.chunks.len(), document.embeddings.len());
        assert_eq!(document.chunks.len(), document.metadata.chunk_sizes.len());
        assert_eq!(
            document.chunks.len(),
            document.metadata.semantic_similarity.len()
        );
        assert_eq!(document.metadata.semantic_similarity[0], 1.0);
        assert_eq!(document.metadata.page_numbers, vec![1, 2]);
        assert_eq!(document.metadata.name, "alpha.txt");
    }

    #[tokio::test]
    async fn sixth_document_is_rejected_before_extraction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline_with(&calls, small_chunk_options());

        for index in 0..4 {
            pipeline
                .process(Path::new(&format!("doc{index}.txt")))
                .await
                .unwrap();
        }
        // Fifth succeeds at the ceiling.
        pipeline.process(Path::new("doc4.txt")).await.unwrap();
        assert_eq!(pipeline.held_documents(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let error = pipeline.process(Path::new("doc5.txt")).await.unwrap_err();
        assert!(matches!(
            error,
            PipelineError::Admission { held: 5, limit: 5 }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 5, "no work before admission");
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_whole() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline_with(&calls, small_chunk_options());

        let paths: Vec<PathBuf> = (0..6).map(|i| PathBuf::from(format!("doc{i}.txt"))).collect();
        let error = pipeline.process_batch(&paths).await.unwrap_err();
        assert!(matches!(error, PipelineError::Admission { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_failing_file_does_not_abort_the_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline_with(&calls, small_chunk_options());

        let paths = vec![
            PathBuf::from("good-one.txt"),
            PathBuf::from("bad-one.txt"),
            PathBuf::from("good-two.txt"),
        ];
        let report = pipeline.process_batch(&paths).await.unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("bad-one.txt"));
        assert_eq!(report.failures[0].stage, "extraction");
        assert!(report.failures[0].reason.contains("bad-one.txt"));
        assert_eq!(pipeline.held_documents(), 2);
    }

    #[tokio::test]
    async fn panicking_file_task_is_reported_not_fatal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline_with(&calls, small_chunk_options());
        let receiver = pipeline.subscribe();

        let paths = vec![
            PathBuf::from("good-one.txt"),
            PathBuf::from("panic-one.txt"),
            PathBuf::from("good-two.txt"),
        ];
        let report = pipeline.process_batch(&paths).await.unwrap();

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("panic-one.txt"));
        assert_eq!(report.failures[0].stage, "extraction");
        assert!(report.failures[0].reason.contains("task failed"));
        assert_eq!(pipeline.held_documents(), 2);
        assert_eq!(*receiver.borrow(), 1, "survivors still fire the signal");
    }

    #[tokio::test]
    async fn summary_failure_is_recorded_not_fatal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let options = PipelineOptions {
            summarize: true,
            ..small_chunk_options()
        };
        let mut pipeline =
            pipeline_with(&calls, options).with_summarizer(Arc::new(FakeSummarizer { fail: true }));

        let document = pipeline.process(Path::new("alpha.txt")).await.unwrap();
        assert!(document.summary.is_none());
        let errors = document.metadata.processing_errors.unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("summary:"));
    }

    #[tokio::test]
    async fn summary_success_enriches_the_document() {
        let calls = Arc::new(AtomicUsize::new(0));
        let options = PipelineOptions {
            summarize: true,
            ..small_chunk_options()
        };
        let mut pipeline = pipeline_with(&calls, options)
            .with_summarizer(Arc::new(FakeSummarizer { fail: false }));

        let document = pipeline.process(Path::new("alpha.txt")).await.unwrap();
        assert_eq!(document.summary.as_deref(), Some("a concise summary"));
        assert!(document.metadata.processing_errors.is_none());
    }

    #[tokio::test]
    async fn change_signal_fires_per_successful_ingestion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline_with(&calls, small_chunk_options());
        let receiver = pipeline.subscribe();

        pipeline.process(Path::new("alpha.txt")).await.unwrap();
        assert_eq!(*receiver.borrow(), 1);

        let _ = pipeline
            .process_batch(&[PathBuf::from("bad-one.txt")])
            .await
            .unwrap();
        assert_eq!(*receiver.borrow(), 1, "failed-only batch stays silent");
    }

    #[tokio::test]
    async fn byte_budget_is_advisory_only() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        fs::write(&first, "Some real text content for the first document.")?;
        fs::write(&second, "And some more text content for the second one.")?;

        let options = PipelineOptions {
            byte_budget: 1,
            ..small_chunk_options()
        };
        let mut pipeline =
            DocumentPipeline::new(FileExtractor, HashEmbedder { dimensions: 16 }, options)?;

        let report = pipeline.process_batch(&[first, second]).await?;
        assert_eq!(report.documents.len(), 2, "budget never blocks ingestion");
        assert!(pipeline.held_bytes() > 1);
        assert!(pipeline.byte_budget_exceeded());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_options_are_rejected() {
        let options = PipelineOptions {
            chunk_size_words: 10,
            chunk_overlap_words: 10,
            ..PipelineOptions::default()
        };
        let result = DocumentPipeline::new(
            FakeExtractor {
                calls: Arc::new(AtomicUsize::new(0)),
            },
            HashEmbedder::default(),
            options,
        );
        assert!(matches!(result, Err(PipelineError::InvalidOptions(_))));
    }

    #[test]
    fn discovery_is_recursive_filtered_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("b.txt"), "text")?;
        fs::write(dir.path().join("a.pdf"), "%PDF-1.4")?;
        fs::write(nested.join("c.md"), "# notes")?;
        fs::write(nested.join("ignored.png"), "binary")?;

        let files = discover_documents(dir.path());
        assert_eq!(files.len(), 3);
        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.txt", "c.md"]);
        Ok(())
    }
}
