//! Document chunking with configurable size and overlap.
//!
//! Splitting is delegated to `text-splitter`, which descends through
//! paragraph, line, sentence, word and grapheme boundaries until each piece
//! fits, then merges adjacent pieces forward up to capacity. Sizes are
//! measured in characters. Trimming is disabled so fragments cover the
//! parent text exactly. Pieces holding nothing but whitespace are folded into
//! the neighbouring fragment, so a long whitespace run may push that fragment
//! past `chunk_size`.

use crate::types::{Document, Fragment, FragmentMetadata};
use medintel_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Splits documents into overlapping fragments.
pub struct Chunker {
    splitter: TextSplitter<text_splitter::Characters>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish()
    }
}

impl Chunker {
    /// Create a chunker.
    ///
    /// # Errors
    /// `AppError::Config` when `chunk_size` is zero or `chunk_overlap` is not
    /// smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        validate_chunk_params(chunk_size, chunk_overlap)?;

        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk overlap: {}", e)))?
            .with_trim(false);

        Ok(Self {
            splitter: TextSplitter::new(config),
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a document into fragments carrying its metadata.
    ///
    /// Empty or whitespace-only text yields no fragments.
    pub fn split(&self, document: &Document) -> Vec<Fragment> {
        let spans = self.spans(&document.text);
        let fragment_count = spans.len() as u32;

        let metadata = FragmentMetadata {
            title: document.title.clone(),
            source: document.source.clone(),
            year: document.year,
            url: document.url.clone(),
            extra: document.metadata.clone(),
        };

        let fragments: Vec<Fragment> = spans
            .into_iter()
            .enumerate()
            .map(|(position, (start, end))| {
                let position = position as u32;
                Fragment {
                    parent_id: document.id.clone(),
                    fragment_id: Fragment::id_for(&document.id, position),
                    text: document.text[start..end].to_string(),
                    position,
                    fragment_count,
                    byte_range: (start, end),
                    metadata: metadata.clone(),
                }
            })
            .collect();

        tracing::debug!(
            "Chunked document {} into {} fragments (size: {}, overlap: {})",
            document.id,
            fragments.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        fragments
    }
}

impl Chunker {
    /// Byte ranges of the fragments of `text`.
    ///
    /// A whitespace-only piece extends the previous range, or the next one
    /// when nothing precedes it.
    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut leading: Option<usize> = None;

        for (offset, piece) in self.splitter.chunk_indices(text) {
            let end = offset + piece.len();
            if piece.trim().is_empty() {
                match spans.last_mut() {
                    Some(last) => last.1 = last.1.max(end),
                    None => {
                        leading.get_or_insert(offset);
                    }
                }
                continue;
            }

            let start = leading.take().map_or(offset, |l| l.min(offset));
            spans.push((start, end));
        }

        spans
    }
}

/// Shared validation for chunk parameters.
pub(crate) fn validate_chunk_params(chunk_size: usize, chunk_overlap: usize) -> AppResult<()> {
    if chunk_size == 0 {
        return Err(AppError::Config("Chunk size must be positive".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(AppError::Config(format!(
            "Chunk overlap ({}) must be smaller than chunk size ({})",
            chunk_overlap, chunk_size
        )));
    }
    Ok(())
}

/// Rebuild the parent text from its fragments, dropping overlapped bytes.
///
/// Fragments must belong to one document and be in position order.
pub fn reassemble(parent_text: &str, fragments: &[Fragment]) -> String {
    let mut out = String::with_capacity(parent_text.len());
    let mut covered = 0usize;

    for fragment in fragments {
        let (start, end) = fragment.byte_range;
        if end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(start);
        out.push_str(&fragment.text[skip..]);
        covered = end;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("Test", "unit", text)
    }

    #[test]
    fn test_rejects_zero_size() {
        assert!(matches!(Chunker::new(0, 0), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        assert!(matches!(Chunker::new(100, 100), Err(AppError::Config(_))));
        assert!(matches!(Chunker::new(100, 150), Err(AppError::Config(_))));
        assert!(Chunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let chunker = Chunker::new(100, 10).unwrap();
        assert!(chunker.split(&doc("")).is_empty());
    }

    #[test]
    fn test_short_text_single_fragment() {
        let chunker = Chunker::new(500, 50).unwrap();
        let document = doc("Aspirin inhibits platelet aggregation.");
        let fragments = chunker.split(&document);

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, document.text);
        assert_eq!(fragments[0].fragment_id, format!("{}_chunk_0", document.id));
        assert_eq!(fragments[0].byte_range, (0, document.text.len()));
        assert_eq!(fragments[0].fragment_count, 1);
    }

    #[test]
    fn test_unbroken_text_three_fragments_with_overlap() {
        let chunker = Chunker::new(500, 50).unwrap();
        let text: String = (0..300).map(|i| format!("{:04}", i)).collect();
        assert_eq!(text.len(), 1200);
        let fragments = chunker.split(&doc(&text));

        assert_eq!(fragments.len(), 3);
        for fragment in &fragments {
            assert!(fragment.text.chars().count() <= 500);
        }

        // Fragment 2 starts with the tail of fragment 1
        let overlap = fragments[0].byte_range.1 - fragments[1].byte_range.0;
        assert!(overlap > 0 && overlap <= 50);
        let tail = &fragments[0].text[fragments[0].text.len() - overlap..];
        assert!(fragments[1].text.starts_with(tail));
        assert_eq!(reassemble(&text, &fragments), text);
    }

    #[test]
    fn test_whitespace_runs_fold_into_neighbours() {
        let chunker = Chunker::new(500, 50).unwrap();
        let body = "Hypertension is persistently elevated arterial blood pressure.";
        let trailing = format!("{}{}", body, " ".repeat(700));
        let leading = format!("{}{}", "\n".repeat(700), body);
        let both = format!("{}{}{}{}", "\n\n".repeat(300), body, "\t".repeat(900), body);

        for text in [&trailing, &leading, &both] {
            let fragments = chunker.split(&doc(text));
            assert!(!fragments.is_empty());
            for (i, fragment) in fragments.iter().enumerate() {
                assert!(!fragment.text.trim().is_empty());
                assert_eq!(fragment.position, i as u32);
                assert_eq!(&text[fragment.byte_range.0..fragment.byte_range.1], fragment.text);
            }
            assert_eq!(&reassemble(text, &fragments), text);
        }
    }

    #[test]
    fn test_whitespace_only_text_yields_nothing() {
        let chunker = Chunker::new(100, 10).unwrap();
        assert!(chunker.split(&doc(&" \n\t".repeat(80))).is_empty());
    }

    #[test]
    fn test_positions_contiguous_and_count_shared() {
        let chunker = Chunker::new(120, 20).unwrap();
        let text = "Hypertension is persistently elevated blood pressure. ".repeat(20);
        let fragments = chunker.split(&doc(&text));

        assert!(fragments.len() > 1);
        let count = fragments.len() as u32;
        for (i, fragment) in fragments.iter().enumerate() {
            assert_eq!(fragment.position, i as u32);
            assert_eq!(fragment.fragment_count, count);
            assert_eq!(&text[fragment.byte_range.0..fragment.byte_range.1], fragment.text);
        }
    }

    #[test]
    fn test_reassemble_reproduces_text() {
        let chunker = Chunker::new(80, 15).unwrap();
        let text = "First paragraph about insulin.\n\nSecond paragraph, which is longer and talks about \
                    glucose metabolism in some detail.\nA new line here.  Double  spaces kept.\n\n\
                    Última sección con acentos y emoji 💊 para UTF-8.";
        let fragments = chunker.split(&doc(text));

        assert!(fragments.len() > 1);
        assert_eq!(reassemble(text, &fragments), text);
    }

    #[test]
    fn test_metadata_inherited() {
        let chunker = Chunker::new(50, 5).unwrap();
        let document = Document::new("Diabetes", "ADA", "word ".repeat(40))
            .with_year(2023)
            .with_url("https://example.org/ada")
            .with_metadata(serde_json::json!({"pmid": "123"}));

        for fragment in chunker.split(&document) {
            assert_eq!(fragment.parent_id, document.id);
            assert_eq!(fragment.metadata.title, "Diabetes");
            assert_eq!(fragment.metadata.source, "ADA");
            assert_eq!(fragment.metadata.year, Some(2023));
            assert_eq!(fragment.metadata.extra["pmid"], "123");
        }
    }
}
