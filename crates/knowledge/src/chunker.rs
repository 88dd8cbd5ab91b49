//! Sentence-aware text chunking with word-boundary overlap.
//!
//! Text is normalized, split into sentences and greedily packed into
//! chunks of roughly `target_size` characters. Each new chunk starts
//! with a short word-aligned suffix of the previous one so that context
//! spanning a boundary is retrievable from either side.
//!
//! All lengths are measured in characters, not bytes.

use crate::types::Chunk;
use chrono::Utc;
use ragbot_core::{AppError, AppResult};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use uuid::Uuid;

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[^\w\s.,!?;:()\-'"]"#).expect("valid allow-list pattern"))
}

fn space_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}").expect("valid space pattern"))
}

fn sentence_breaks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("valid sentence pattern"))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Collapse whitespace, replace characters outside the allow-list
/// (word characters, whitespace and `. , ! ? ; : ( ) - ' "`) with spaces,
/// then collapse spaces and trim.
pub fn normalize_text(text: &str) -> String {
    let collapsed = whitespace_runs().replace_all(text, " ");
    let allowed = disallowed_chars().replace_all(&collapsed, " ");
    space_runs().replace_all(&allowed, " ").trim().to_string()
}

/// Split on runs of `.`, `!` and `?`, dropping empty fragments.
///
/// The terminating punctuation is not kept.
pub fn split_sentences(text: &str) -> Vec<&str> {
    sentence_breaks()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// The last `overlap` characters of `text`, cut forward to a word boundary.
///
/// If the tail contains a space, everything up to the first space is
/// dropped; a tail without spaces is used as is. Text no longer than
/// `overlap` is returned whole.
pub fn overlap_suffix(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }

    let len = char_len(text);
    if len <= overlap {
        return text.to_string();
    }

    let tail: String = text.chars().skip(len - overlap).collect();
    match tail.find(' ') {
        Some(pos) => tail[pos..].trim().to_string(),
        None => tail,
    }
}

/// Chunk raw text into a sequence of chunk strings.
///
/// `overlap` values that are not smaller than `target_size` are clamped
/// to `target_size - 1`. Text that normalizes to nothing yields no chunks.
///
/// # Errors
/// Returns `AppError::Validation` when `target_size` is zero.
pub fn chunk_text(text: &str, target_size: usize, overlap: usize) -> AppResult<Vec<String>> {
    if target_size == 0 {
        return Err(AppError::validation("chunk size must be greater than zero"));
    }

    let overlap = overlap.min(target_size - 1);
    let normalized = normalize_text(text);

    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    if char_len(&normalized) <= target_size {
        return Ok(vec![normalized]);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(&normalized) {
        if !current.is_empty() && char_len(&current) + char_len(sentence) > target_size {
            let suffix = overlap_suffix(&current, overlap);
            chunks.push(current.trim().to_string());

            current = if suffix.is_empty() {
                sentence.to_string()
            } else {
                format!("{} {}", suffix, sentence)
            };
        } else if current.is_empty() {
            current.push_str(sentence);
        } else {
            current.push(' ');
            current.push_str(sentence);
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }

    tracing::debug!(
        "Chunked {} chars into {} chunks (size: {}, overlap: {})",
        char_len(&normalized),
        chunks.len(),
        target_size,
        overlap
    );

    Ok(chunks)
}

/// Deterministic chunk identifier derived from its document, position and text.
pub fn chunk_id(document_id: &str, index: u32, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(index.to_le_bytes());
    hasher.update([0x1f]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Chunk a document's text into [`Chunk`] values indexed from zero.
///
/// Re-chunking the same document with the same parameters yields the
/// same ids, so storing the result again overwrites rather than duplicates.
pub fn chunk_document(
    document_id: &str,
    text: &str,
    target_size: usize,
    overlap: usize,
) -> AppResult<Vec<Chunk>> {
    let created_at = Utc::now();

    let chunks = chunk_text(text, target_size, overlap)?
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let index = i as u32;
            Chunk::new(chunk_id(document_id, index, &text), index, text, created_at)
        })
        .collect();

    Ok(chunks)
}
