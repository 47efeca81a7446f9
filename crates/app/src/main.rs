use chrono::Utc;
use clap::{Parser, Subcommand};
use docmap_core::{
    discover_documents, grounded_prompt, BatchReport, ConceptMapper, DocumentPipeline,
    FileExtractor, HashEmbedder, LazyEmbedder, LlmClient, LlmConfig, ModelKind, PipelineOptions,
    StoredDocument, TextGenerator, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docmap", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Chunk budget in words.
    #[arg(long, default_value = "500")]
    chunk_size: usize,

    /// Words shared between adjacent chunks.
    #[arg(long, default_value = "100")]
    chunk_overlap: usize,

    /// Ceiling on concurrently held documents.
    #[arg(long, default_value = "5")]
    max_documents: usize,

    /// Completion backend for ask/summarize.
    #[arg(long, value_enum, default_value = "gemini")]
    model: ModelArg,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY")]
    gemini_api_key: Option<String>,

    /// OpenRouter API key (Deepseek backend).
    #[arg(long, env = "OPENROUTER_API_KEY")]
    openrouter_api_key: Option<String>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ModelArg {
    Gemini,
    Deepseek,
}

impl From<ModelArg> for ModelKind {
    fn from(value: ModelArg) -> Self {
        match value {
            ModelArg::Gemini => ModelKind::Gemini,
            ModelArg::Deepseek => ModelKind::Deepseek,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a folder of documents and print the stored records.
    Ingest {
        /// Folder searched recursively for .pdf/.txt/.md files.
        #[arg(long)]
        folder: String,
        /// Also generate an LLM summary per document.
        #[arg(long, default_value_t = false)]
        summarize: bool,
    },
    /// Ingest a folder and print the concept graph as JSON.
    Graph {
        #[arg(long)]
        folder: String,
    },
    /// Ingest a folder and print greedy topic labels per document.
    Topics {
        #[arg(long)]
        folder: String,
    },
    /// Ingest a folder and answer a question grounded in it.
    Ask {
        #[arg(long)]
        folder: String,
        #[arg(long)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "docmap boot"
    );

    let options = PipelineOptions {
        chunk_size_words: cli.chunk_size,
        chunk_overlap_words: cli.chunk_overlap,
        max_documents: cli.max_documents,
        ..PipelineOptions::default()
    };

    let llm_client = || {
        LlmClient::new(LlmConfig {
            model: cli.model.into(),
            gemini_api_key: cli.gemini_api_key.clone(),
            openrouter_api_key: cli.openrouter_api_key.clone(),
            ..LlmConfig::default()
        })
    };

    match &cli.command {
        Command::Ingest { folder, summarize } => {
            let mut options = options;
            options.summarize = *summarize;
            let summarizer: Option<Arc<dyn TextGenerator>> = if *summarize {
                Some(Arc::new(llm_client()))
            } else {
                None
            };

            let (report, held_bytes, over_budget) =
                ingest_folder(folder, options, summarizer).await?;

            let records: Vec<StoredDocument> = report
                .documents
                .iter()
                .map(|file| StoredDocument::from_processed(&file.document, file.size, Utc::now()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
            info!(
                documents = report.documents.len(),
                held_bytes, "ingestion finished"
            );
            if over_budget {
                warn!(held_bytes, "cumulative size exceeds the byte budget");
            }
        }
        Command::Graph { folder } => {
            let (report, _, _) = ingest_folder(folder, options, None).await?;
            let mapper = build_mapper(report);
            let graph = mapper.generate_concept_graph();
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Command::Topics { folder } => {
            let (report, _, _) = ingest_folder(folder, options, None).await?;
            let mapper = build_mapper(report);
            for (document_id, labels) in mapper.identify_topics() {
                println!("{document_id}:");
                for label in labels {
                    println!("  - {label}");
                }
            }
        }
        Command::Ask { folder, question } => {
            let (report, _, _) = ingest_folder(folder, options, None).await?;
            let records: Vec<StoredDocument> = report
                .documents
                .iter()
                .map(|file| StoredDocument::from_processed(&file.document, file.size, Utc::now()))
                .collect();

            let prompt = grounded_prompt(&records, &[], question);
            let client = llm_client();
            let answer = client.complete(&prompt).await?;
            println!("{answer}");
        }
    }

    Ok(())
}

async fn ingest_folder(
    folder: &str,
    options: PipelineOptions,
    summarizer: Option<Arc<dyn TextGenerator>>,
) -> anyhow::Result<(BatchReport, u64, bool)> {
    let files = discover_documents(Path::new(folder));
    if files.is_empty() {
        anyhow::bail!("no ingestible files found in {folder}");
    }

    let embedder = LazyEmbedder::new(DEFAULT_EMBEDDING_DIMENSIONS, || Ok(HashEmbedder::default()));
    let mut pipeline = DocumentPipeline::new(FileExtractor, embedder, options)?;
    if let Some(summarizer) = summarizer {
        pipeline = pipeline.with_summarizer(summarizer);
    }

    info!(folder, files = files.len(), "ingesting documents");
    let report = pipeline.process_batch(&files).await?;

    for failed in &report.failures {
        warn!(path = %failed.path.display(), stage = %failed.stage, reason = %failed.reason, "skipped file");
    }

    Ok((report, pipeline.held_bytes(), pipeline.byte_budget_exceeded()))
}

fn build_mapper(report: BatchReport) -> ConceptMapper {
    let mut mapper = ConceptMapper::new();
    for file in report.documents {
        mapper.add_document(file.document);
    }
    mapper
}
