//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A contiguous, bounded-length slice of a document used as the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Stable identifier, unique across documents
    pub id: String,

    /// Ordinal position within the source document
    pub index: u32,

    pub text: String,

    /// Length of `text` in characters
    pub length: usize,

    pub created_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(id: String, index: u32, text: String, created_at: DateTime<Utc>) -> Self {
        let length = text.chars().count();
        Self {
            id,
            index,
            text,
            length,
            created_at,
        }
    }
}

/// A chunk paired with its embedding, ready for the vector store.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Payload stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPayload {
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
}

/// A nearest-neighbour match returned by the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,

    /// Cosine similarity, higher is more relevant
    pub score: f32,

    pub payload: ChunkPayload,
}

/// A retrieved chunk with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    pub chunk_id: String,
    pub score: f32,
    pub text: String,
    pub document_id: String,
    pub chunk_index: u32,
}

impl From<VectorHit> for ScoredResult {
    fn from(hit: VectorHit) -> Self {
        Self {
            chunk_id: hit.id,
            score: hit.score,
            text: hit.payload.text,
            document_id: hit.payload.document_id,
            chunk_index: hit.payload.chunk_index,
        }
    }
}

/// A single web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub score: f32,
}

/// Processing stage of an ingested document.
///
/// Documents advance strictly in order:
/// `Uploaded -> Extracted -> Chunked -> Embedded -> Stored`.
/// `Failed` is reachable from any in-progress stage and `Deleted` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Extracted,
    Chunked,
    Embedded,
    Stored,
    Failed,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Extracted => "extracted",
            Self::Chunked => "chunked",
            Self::Embedded => "embedded",
            Self::Stored => "stored",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    /// The stage that follows this one on the happy path.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Uploaded => Some(Self::Extracted),
            Self::Extracted => Some(Self::Chunked),
            Self::Chunked => Some(Self::Embedded),
            Self::Embedded => Some(Self::Stored),
            Self::Stored | Self::Failed | Self::Deleted => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stored | Self::Failed | Self::Deleted)
    }

    pub fn can_transition_to(&self, target: Self) -> bool {
        match target {
            Self::Deleted => *self != Self::Deleted,
            Self::Failed => !self.is_terminal(),
            _ => self.next() == Some(target),
        }
    }
}

/// Registry entry describing an ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub path: PathBuf,
    pub kind: String,
    pub size_bytes: u64,

    /// Hex-encoded SHA-256 of the file contents
    pub file_hash: String,

    pub status: DocumentStatus,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
