//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of characters of text hashed into a document id.
const ID_PREFIX_CHARS: usize = 500;

/// Length of the hex document id.
const ID_HEX_LEN: usize = 12;

/// A raw document handed to ingestion.
///
/// Documents are transient: they are consumed by the chunker and never
/// stored by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Content-derived id (or caller-supplied, e.g. `PMID_123`)
    pub id: String,

    /// Full text content
    pub text: String,

    /// Human-readable title
    pub title: String,

    /// Origin (journal, guideline body, file name)
    pub source: String,

    /// Publication year
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// Link to the original
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Free-form metadata carried onto every fragment
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Document {
    /// Create a document whose id is derived from its title and text.
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let text = text.into();
        Self {
            id: Self::derive_id(&title, &text),
            text,
            title,
            source: source.into(),
            year: None,
            url: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Stable id for `(title, text prefix)`: first 12 hex chars of
    /// SHA-256 over `"{title}:{first 500 chars}"`.
    pub fn derive_id(title: &str, text: &str) -> String {
        let prefix: String = text.chars().take(ID_PREFIX_CHARS).collect();
        let digest = Sha256::digest(format!("{}:{}", title, prefix).as_bytes());
        let mut hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        hex.truncate(ID_HEX_LEN);
        hex
    }

    /// Override the derived id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Metadata inherited by every fragment of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    pub title: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// A bounded slice of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Id of the document this fragment came from
    pub parent_id: String,

    /// `{parent_id}_chunk_{position}`, unique within an index
    pub fragment_id: String,

    /// Fragment text, whitespace preserved
    pub text: String,

    /// 0-based position within the parent document
    pub position: u32,

    /// Number of fragments the parent document produced
    pub fragment_count: u32,

    /// Byte offsets `[start, end)` into the parent text
    pub byte_range: (usize, usize),

    /// Inherited document metadata
    pub metadata: FragmentMetadata,
}

impl Fragment {
    /// Default fragment id for a position.
    pub fn id_for(parent_id: &str, position: u32) -> String {
        format!("{}_chunk_{}", parent_id, position)
    }
}

/// A fragment returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub fragment: Fragment,

    /// Cosine similarity to the query, in `[-1, 1]`
    pub score: f32,
}

/// Summary of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub fragment_count: usize,
    pub unique_document_count: usize,
    pub dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    /// When the index was last saved (absent for never-persisted indexes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
}

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Documents that produced at least one fragment
    pub documents: usize,

    /// Fragments added to the index
    pub fragments: usize,

    /// Bytes of document text processed
    pub bytes: u64,

    /// Wall-clock duration
    pub duration_secs: f64,
}
