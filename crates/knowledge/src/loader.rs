//! Document sources for ingestion.
//!
//! `.txt` and `.md` files become one document each; `.json` files hold an
//! array of records with at least a `content` field.

use crate::types::Document;
use medintel_core::{AppError, AppResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Anything that can hand a batch of documents to ingestion.
pub trait DocumentSource {
    fn load(&self) -> AppResult<Vec<Document>>;
}

/// Supported corpus file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Text,
    Json,
}

impl FileKind {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" | "markdown" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// One record of a JSON corpus file.
#[derive(Debug, Deserialize)]
struct JsonRecord {
    content: String,
    title: Option<String>,
    source: Option<String>,
    year: Option<i32>,
    url: Option<String>,
    metadata: Option<serde_json::Value>,
    doc_id: Option<String>,
}

/// Loads documents from files and directory trees.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    paths: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self::new(vec![path.into()])
    }

    fn load_file(path: &Path, documents: &mut Vec<Document>) {
        let Some(kind) = FileKind::from_path(path) else {
            tracing::debug!("Skipping unsupported file: {:?}", path);
            return;
        };

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
                return;
            }
        };

        let before = documents.len();
        match kind {
            FileKind::Text => {
                if let Some(doc) = text_document(path, raw) {
                    documents.push(doc);
                }
            }
            FileKind::Json => match json_documents(path, &raw) {
                Ok(docs) => documents.extend(docs),
                Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
            },
        }

        tracing::debug!(
            "Loaded {} documents from {:?}",
            documents.len() - before,
            path
        );
    }
}

impl DocumentSource for DirectorySource {
    fn load(&self) -> AppResult<Vec<Document>> {
        let mut documents = Vec::new();

        for path in &self.paths {
            if path.is_file() {
                Self::load_file(path, &mut documents);
            } else if path.is_dir() {
                for entry in WalkDir::new(path)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    if entry.file_type().is_file() {
                        Self::load_file(entry.path(), &mut documents);
                    }
                }
            } else {
                return Err(AppError::Knowledge(format!(
                    "Document path does not exist: {}",
                    path.display()
                )));
            }
        }

        tracing::info!("Loaded {} documents", documents.len());
        Ok(documents)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn text_document(path: &Path, text: String) -> Option<Document> {
    if text.trim().is_empty() {
        tracing::warn!("Skipping empty document: {:?}", path);
        return None;
    }

    Some(
        Document::new(file_stem(path), file_name(path), text).with_metadata(serde_json::json!({
            "file_path": path.display().to_string(),
        })),
    )
}

fn json_documents(path: &Path, raw: &str) -> AppResult<Vec<Document>> {
    let items: Vec<serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| AppError::Serialization(format!("Expected a JSON array of records: {}", e)))?;

    let mut documents = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let record: JsonRecord = match serde_json::from_value(item) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping record {} in {:?}: {}", i, path, e);
                continue;
            }
        };

        if record.content.trim().is_empty() {
            tracing::warn!("Skipping empty record {} in {:?}", i, path);
            continue;
        }

        let title = record.title.unwrap_or_else(|| file_stem(path));
        let source = record.source.unwrap_or_else(|| file_name(path));
        let mut doc = Document::new(title, source, record.content)
            .with_metadata(record.metadata.unwrap_or(serde_json::Value::Null));
        if let Some(id) = record.doc_id {
            doc = doc.with_id(id);
        }
        if let Some(year) = record.year {
            doc = doc.with_year(year);
        }
        if let Some(url) = record.url {
            doc = doc.with_url(url);
        }
        documents.push(doc);
    }

    Ok(documents)
}
