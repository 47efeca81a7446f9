use crate::error::PipelineError;
use lopdf::Document;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Turns a source file into ordered page texts.
pub trait DocumentExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, PipelineError>;
}

/// `lopdf` page extraction for PDFs, whole-file read as a single page
/// for plain-text sources.
#[derive(Default)]
pub struct FileExtractor;

impl FileExtractor {
    fn extract_pdf(&self, path: &Path) -> Result<Vec<PageText>, PipelineError> {
        let document = Document::load(path)
            .map_err(|error| PipelineError::Extraction(format!("pdf parse: {error}")))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| PipelineError::Extraction(format!("pdf parse: {error}")))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(PipelineError::Extraction(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }

    fn extract_plain(&self, path: &Path) -> Result<Vec<PageText>, PipelineError> {
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Err(PipelineError::Extraction(format!(
                "file is empty: {}",
                path.display()
            )));
        }
        Ok(vec![PageText { number: 1, text }])
    }
}

impl DocumentExtractor for FileExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, PipelineError> {
        match extension_of(path).as_deref() {
            Some("pdf") => self.extract_pdf(path),
            Some("txt") | Some("md") => self.extract_plain(path),
            other => Err(PipelineError::Extraction(format!(
                "unsupported file type {:?}: {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// MIME-style type string recorded in document metadata.
pub fn source_kind(path: &Path) -> String {
    match extension_of(path).as_deref() {
        Some("pdf") => "application/pdf".to_string(),
        Some("md") => "text/markdown".to_string(),
        _ => "text/plain".to_string(),
    }
}
