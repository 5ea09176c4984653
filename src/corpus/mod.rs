//! Corpus snapshots: parsed chunks, their embeddings and lexical postings
//!
//! A [`CorpusSnapshot`] is immutable once built. Rebuilding the index
//! produces a new snapshot that replaces the active one through
//! [`SnapshotStore::install`]; queries pin an `Arc` to whichever snapshot
//! was active when they started.

mod builder;
mod chunker;
mod extract;
mod loader;
mod persist;
mod postings;
mod store;

pub use builder::{BuildOutput, CorpusBuilder};
pub use chunker::SentenceChunker;
pub use extract::{extract_text, ExtractError, FileKind};
pub use loader::{Document, DocumentLoader, ImportReport, LoadReport, SkippedFile};
pub use persist::{load_snapshot, save_snapshot, SNAPSHOT_FILE};
pub use postings::{tokenize, Posting, Postings};
pub use store::SnapshotStore;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// On-disk layout version of a persisted snapshot
pub const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Snapshot has no chunks")]
    Empty,

    #[error("Duplicate chunk id in snapshot: {0}")]
    DuplicateChunkId(String),

    #[error("Chunk {chunk_id} has embedding dimension {actual}, expected {expected}")]
    DimensionMismatch {
        chunk_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported snapshot format {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },
}

/// A unit of source text with its embedding; the atomic retrieval item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_uri: String,
    pub embedding: Vec<f32>,
    /// Position of this chunk within its source document
    pub position: usize,
}

impl Chunk {
    /// Build a chunk whose id is derived from its source, position and text
    pub fn new(
        source_uri: impl Into<String>,
        position: usize,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let source_uri = source_uri.into();
        let text = text.into();
        let id = chunk_id(&source_uri, position, &text);
        Self {
            id,
            text,
            source_uri,
            embedding,
            position,
        }
    }

    /// Short single-line preview of the chunk text
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }
}

fn chunk_id(source_uri: &str, position: usize, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"archivist.chunk.v1\n");
    hasher.update(source_uri.as_bytes());
    hasher.update(b"\n");
    hasher.update(position.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(text.as_bytes());
    let hex = hasher.finalize().to_hex();
    format!("chunk-{}", &hex.as_str()[..24])
}

/// Immutable, versioned set of chunks plus the indexes built over them
#[derive(Debug, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    format: u32,
    version: String,
    created_at: DateTime<Utc>,
    dimension: usize,
    chunks: Vec<Chunk>,
    postings: Postings,
    #[serde(skip)]
    by_id: AHashMap<String, usize>,
}

impl CorpusSnapshot {
    /// Build a snapshot, enforcing chunk id uniqueness and a single embedding dimension
    pub fn build(chunks: Vec<Chunk>) -> Result<Self, CorpusError> {
        let dimension = chunks.first().map(|c| c.embedding.len()).ok_or(CorpusError::Empty)?;
        let postings = Postings::build(chunks.iter().map(|c| c.text.as_str()));

        let mut snapshot = Self {
            format: SNAPSHOT_FORMAT,
            version: String::new(),
            created_at: Utc::now(),
            dimension,
            chunks,
            postings,
            by_id: AHashMap::new(),
        };
        snapshot.reindex()?;
        snapshot.version = snapshot.compute_version();
        Ok(snapshot)
    }

    /// Rebuild the id lookup and re-check invariants (used after deserializing)
    fn reindex(&mut self) -> Result<(), CorpusError> {
        if self.chunks.is_empty() {
            return Err(CorpusError::Empty);
        }

        let mut by_id = AHashMap::with_capacity(self.chunks.len());
        for (idx, chunk) in self.chunks.iter().enumerate() {
            if chunk.embedding.len() != self.dimension {
                return Err(CorpusError::DimensionMismatch {
                    chunk_id: chunk.id.clone(),
                    expected: self.dimension,
                    actual: chunk.embedding.len(),
                });
            }
            if by_id.insert(chunk.id.clone(), idx).is_some() {
                return Err(CorpusError::DuplicateChunkId(chunk.id.clone()));
            }
        }

        if self.postings.doc_count() != self.chunks.len() {
            return Err(CorpusError::Corrupt(format!(
                "postings cover {} documents but snapshot has {} chunks",
                self.postings.doc_count(),
                self.chunks.len()
            )));
        }

        self.by_id = by_id;
        Ok(())
    }

    fn compute_version(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for chunk in &self.chunks {
            hasher.update(chunk.id.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().as_str()[..16].to_string()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn postings(&self) -> &Postings {
        &self.postings
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.by_id.get(chunk_id).map(|&idx| &self.chunks[idx])
    }

    /// Chunk at a postings document index
    pub fn chunk_at(&self, idx: usize) -> Option<&Chunk> {
        self.chunks.get(idx)
    }
}
