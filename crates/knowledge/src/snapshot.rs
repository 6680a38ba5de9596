//! SQLite snapshot persistence for [`EmbeddingIndex`].
//!
//! Layout (schema version 1, stored in `PRAGMA user_version`):
//! - `meta(key, value)`: dimension, chunk parameters, counts, build time
//! - `fragments`: one row per fragment in insertion order, vector as a
//!   little-endian f32 blob
//!
//! Saves go to a sibling temp file that is renamed over the target, so a
//! crash never leaves a half-written index behind.

use crate::index::{EmbeddingIndex, IndexConfig};
use crate::types::{Fragment, FragmentMetadata};
use chrono::{DateTime, Utc};
use medintel_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE fragments (
    seq INTEGER PRIMARY KEY,
    fragment_id TEXT NOT NULL UNIQUE,
    parent_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    fragment_count INTEGER NOT NULL,
    byte_start INTEGER NOT NULL,
    byte_end INTEGER NOT NULL,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL
);
"#;

fn sql_err(context: &str, e: rusqlite::Error) -> AppError {
    AppError::Knowledge(format!("{}: {}", context, e))
}

fn corrupt(path: &Path, detail: impl std::fmt::Display) -> AppError {
    AppError::IndexNotFound(format!("{}: {}", path.display(), detail))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "index".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `index` to `path`.
pub fn save(index: &EmbeddingIndex, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;
    }

    let tmp = temp_path(path);
    if tmp.exists() {
        std::fs::remove_file(&tmp)?;
    }

    write_snapshot(index, &tmp).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })?;

    std::fs::rename(&tmp, path)
        .map_err(|e| AppError::Knowledge(format!("Failed to move index into place: {}", e)))?;

    tracing::info!(
        "Saved index with {} fragments to {:?}",
        index.fragments.len(),
        path
    );
    Ok(())
}

fn write_snapshot(index: &EmbeddingIndex, path: &Path) -> AppResult<()> {
    let mut conn = Connection::open(path).map_err(|e| sql_err("Failed to create index file", e))?;

    conn.execute_batch(SCHEMA)
        .map_err(|e| sql_err("Failed to create tables", e))?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| sql_err("Failed to set schema version", e))?;

    let tx = conn
        .transaction()
        .map_err(|e| sql_err("Failed to begin transaction", e))?;

    {
        let mut meta = tx
            .prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")
            .map_err(|e| sql_err("Failed to prepare meta insert", e))?;
        let entries = [
            ("dimension", index.config.dimension.to_string()),
            ("chunk_size", index.config.chunk_size.to_string()),
            ("chunk_overlap", index.config.chunk_overlap.to_string()),
            ("fragment_count", index.fragments.len().to_string()),
            ("unique_document_count", index.documents.len().to_string()),
            ("built_at", Utc::now().to_rfc3339()),
        ];
        for (key, value) in entries {
            meta.execute(params![key, value])
                .map_err(|e| sql_err("Failed to write meta", e))?;
        }

        let mut insert = tx
            .prepare(
                "INSERT INTO fragments (seq, fragment_id, parent_id, position, fragment_count, \
                 byte_start, byte_end, text, metadata, embedding) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .map_err(|e| sql_err("Failed to prepare fragment insert", e))?;

        let dim = index.config.dimension;
        for (seq, (fragment, vector)) in index
            .fragments
            .iter()
            .zip(index.vectors.chunks_exact(dim))
            .enumerate()
        {
            let metadata = serde_json::to_string(&fragment.metadata)?;
            insert
                .execute(params![
                    seq as i64,
                    fragment.fragment_id,
                    fragment.parent_id,
                    fragment.position as i64,
                    fragment.fragment_count as i64,
                    fragment.byte_range.0 as i64,
                    fragment.byte_range.1 as i64,
                    fragment.text,
                    metadata,
                    embedding_to_bytes(vector),
                ])
                .map_err(|e| sql_err("Failed to write fragment", e))?;
        }
    }

    tx.commit()
        .map_err(|e| sql_err("Failed to commit index", e))?;
    conn.close()
        .map_err(|(_, e)| sql_err("Failed to close index file", e))?;
    Ok(())
}

/// Read an index from `path`.
///
/// # Errors
/// `AppError::IndexNotFound` when the file is missing, unreadable, written
/// by another schema version, or internally inconsistent.
pub fn load(path: &Path) -> AppResult<EmbeddingIndex> {
    if !path.exists() {
        return Err(corrupt(path, "no index file"));
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| corrupt(path, e))?;

    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| corrupt(path, e))?;
    if version != SCHEMA_VERSION {
        return Err(corrupt(
            path,
            format!("unsupported schema version {} (expected {})", version, SCHEMA_VERSION),
        ));
    }

    let meta = read_meta(&conn).map_err(|e| corrupt(path, e))?;
    let meta_usize = |key: &str| -> AppResult<usize> {
        meta.get(key)
            .ok_or_else(|| corrupt(path, format!("missing meta key '{}'", key)))?
            .parse::<usize>()
            .map_err(|e| corrupt(path, format!("invalid meta '{}': {}", key, e)))
    };

    let config = IndexConfig {
        dimension: meta_usize("dimension")?,
        chunk_size: meta_usize("chunk_size")?,
        chunk_overlap: meta_usize("chunk_overlap")?,
    };
    config.validate().map_err(|e| corrupt(path, e))?;

    let expected_fragments = meta_usize("fragment_count")?;
    let expected_documents = meta_usize("unique_document_count")?;
    let built_at = meta
        .get("built_at")
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let rows = read_fragments(&conn).map_err(|e| corrupt(path, e))?;

    let dim = config.dimension;
    let mut fragments = Vec::with_capacity(rows.len());
    let mut vectors = Vec::with_capacity(rows.len() * dim);
    let mut ids = HashSet::with_capacity(rows.len());
    let mut documents: HashMap<String, usize> = HashMap::new();

    for (fragment, blob) in rows {
        if blob.len() != dim * 4 {
            return Err(corrupt(
                path,
                format!(
                    "fragment {} has {} vector bytes, expected {}",
                    fragment.fragment_id,
                    blob.len(),
                    dim * 4
                ),
            ));
        }
        vectors.extend(bytes_to_embedding(&blob));
        ids.insert(fragment.fragment_id.clone());
        *documents.entry(fragment.parent_id.clone()).or_insert(0) += 1;
        fragments.push(fragment);
    }

    if fragments.len() != expected_fragments || documents.len() != expected_documents {
        return Err(corrupt(
            path,
            format!(
                "stats disagree with contents ({} fragments / {} documents recorded, {} / {} found)",
                expected_fragments,
                expected_documents,
                fragments.len(),
                documents.len()
            ),
        ));
    }

    tracing::info!("Loaded index with {} fragments from {:?}", fragments.len(), path);

    Ok(EmbeddingIndex {
        config,
        fragments,
        vectors,
        ids,
        documents,
        built_at,
    })
}

/// Load `path` if it exists, otherwise create an empty index.
///
/// An existing index must have been built with the same `config`: a
/// different dimension is a `DimensionMismatch`, different chunk parameters
/// are a `Config` error.
pub fn open_or_create(path: &Path, config: IndexConfig) -> AppResult<EmbeddingIndex> {
    if !path.exists() {
        tracing::info!("No index at {:?}, starting empty", path);
        return EmbeddingIndex::new(config);
    }

    let index = load(path)?;
    if index.config.dimension != config.dimension {
        return Err(AppError::DimensionMismatch {
            expected: index.config.dimension,
            actual: config.dimension,
        });
    }
    if index.config != config {
        return Err(AppError::Config(format!(
            "Index at {:?} was built with chunk size {} and overlap {}, not {} and {}",
            path,
            index.config.chunk_size,
            index.config.chunk_overlap,
            config.chunk_size,
            config.chunk_overlap
        )));
    }
    Ok(index)
}

fn read_meta(conn: &Connection) -> rusqlite::Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT key, value FROM meta")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

fn read_fragments(conn: &Connection) -> AppResult<Vec<(Fragment, Vec<u8>)>> {
    let mut stmt = conn
        .prepare(
            "SELECT fragment_id, parent_id, position, fragment_count, byte_start, byte_end, \
             text, metadata, embedding FROM fragments ORDER BY seq",
        )
        .map_err(|e| sql_err("Failed to prepare fragment query", e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, Vec<u8>>(8)?,
            ))
        })
        .map_err(|e| sql_err("Failed to query fragments", e))?;

    let mut out = Vec::new();
    for row in rows {
        let (fragment_id, parent_id, position, fragment_count, start, end, text, metadata, blob) =
            row.map_err(|e| sql_err("Failed to read fragment", e))?;
        let metadata: FragmentMetadata = serde_json::from_str(&metadata)?;
        out.push((
            Fragment {
                parent_id,
                fragment_id,
                text,
                position: position as u32,
                fragment_count: fragment_count as u32,
                byte_range: (start as usize, end as usize),
                metadata,
            },
            blob,
        ));
    }
    Ok(out)
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector. Length must be a multiple of 4.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
