//! Document loading from plain-text and PDF files.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, error, info};

use crate::document::{Document, PAGE_KEY, SOURCE_KEY};
use crate::error::{RagError, Result};

/// The kind of file being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A UTF-8 text file, loaded as a single document.
    Text,
    /// A PDF, loaded as one document per page.
    Pdf,
}

impl DocumentKind {
    /// Interpret the interactive selector: `"1"` is text, anything else is PDF.
    pub fn from_selector(selector: &str) -> Self {
        if selector.trim() == "1" { Self::Text } else { Self::Pdf }
    }

    /// Infer the kind from the file extension. Unknown extensions load as text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => Self::Pdf,
            _ => Self::Text,
        }
    }
}

/// Reads source files into [`Document`]s.
///
/// Every document carries a `source` metadata entry holding the path it was
/// read from; PDF pages also carry a 0-based `page` entry. Document IDs start
/// with that same path (`{path}` for text, `{path}#page{n}` for PDF pages), so
/// files that share a name in different directories never share chunk IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load `path` as the given kind of document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoaderError`] if the file is missing, unreadable,
    /// not valid UTF-8 (text) or not a parseable PDF.
    pub fn load(path: impl AsRef<Path>, kind: DocumentKind) -> Result<Vec<Document>> {
        let path = path.as_ref();
        let documents = match kind {
            DocumentKind::Text => vec![Self::load_text(path)?],
            DocumentKind::Pdf => Self::load_pdf(path)?,
        };
        info!(path = %path.display(), ?kind, document_count = documents.len(), "loaded documents");
        Ok(documents)
    }

    fn load_text(path: &Path) -> Result<Document> {
        let bytes = std::fs::read(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to read file");
            loader_error(path, format!("failed to read file: {e}"))
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|e| loader_error(path, format!("file is not valid UTF-8: {e}")))?;

        let source = path.display().to_string();
        Ok(Document {
            id: source.clone(),
            text,
            metadata: HashMap::from([(SOURCE_KEY.to_string(), source)]),
            source_uri: None,
        })
    }

    fn load_pdf(path: &Path) -> Result<Vec<Document>> {
        let pdf = lopdf::Document::load(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to load PDF");
            loader_error(path, format!("failed to load PDF: {e}"))
        })?;

        let source = path.display().to_string();
        let mut documents = Vec::new();

        // get_pages is keyed by 1-based page number in page order.
        for (index, page_number) in pdf.get_pages().into_keys().enumerate() {
            let text = pdf.extract_text(&[page_number]).map_err(|e| {
                loader_error(path, format!("failed to extract text from page {page_number}: {e}"))
            })?;
            debug!(path = %source, page = index, text_len = text.len(), "extracted page");

            documents.push(Document {
                id: format!("{source}#page{index}"),
                text,
                metadata: HashMap::from([
                    (SOURCE_KEY.to_string(), source.clone()),
                    (PAGE_KEY.to_string(), index.to_string()),
                ]),
                source_uri: None,
            });
        }

        Ok(documents)
    }
}

/// Derive a collection name from a file path.
///
/// The file stem is lowercased; ASCII letters, digits and `_` are kept,
/// spaces and `-` become `-`, anything else is dropped.
/// `"Fake Data.txt"` becomes `"fake-data"`.
pub fn collection_name_for(path: impl AsRef<Path>) -> String {
    let stem = path.as_ref().file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let mut out = String::new();
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else if c == ' ' || c == '-' {
            out.push('-');
        }
    }
    if out.is_empty() { "documents".to_string() } else { out }
}

fn loader_error(path: &Path, message: String) -> RagError {
    RagError::LoaderError { path: path.display().to_string(), message }
}
