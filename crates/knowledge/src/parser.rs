//! Document type detection and local text extraction.
//!
//! Plain text and Markdown are read directly. PDF and DOCX need an
//! external extraction step and are rejected here.

use ragbot_core::{AppError, AppResult};
use std::path::Path;

/// Upload size limit for a single document.
pub const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Document type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Markdown,
    Pdf,
    Docx,
    Unsupported,
}

impl DocumentKind {
    /// Detect document type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("txt") | Some("text") => Self::PlainText,
            Some("md") | Some("markdown") => Self::Markdown,
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            _ => Self::Unsupported,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::Markdown => "md",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether text can be extracted without an external tool.
    pub fn is_extractable(&self) -> bool {
        matches!(self, Self::PlainText | Self::Markdown)
    }
}

/// Extract clean text from raw file contents.
///
/// # Errors
/// `AppError::Validation` for kinds that cannot be extracted locally and
/// for content that is not valid UTF-8 text.
pub fn extract_text(kind: DocumentKind, raw: &[u8]) -> AppResult<String> {
    if !kind.is_extractable() {
        return Err(AppError::validation(format!(
            "text extraction for '{}' documents is not supported; convert the file to .txt or .md first",
            kind.as_str()
        )));
    }

    let text = std::str::from_utf8(raw)
        .map_err(|e| AppError::validation(format!("document is not valid UTF-8 text: {}", e)))?;

    if !is_likely_text(text) {
        return Err(AppError::validation("binary content is not supported"));
    }

    Ok(match kind {
        DocumentKind::Markdown => clean_markdown(text),
        _ => text.trim().to_string(),
    })
}

/// Strip Markdown structure, keeping the prose.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }

        // Horizontal rules
        if trimmed.starts_with("---") || trimmed.starts_with("***") {
            continue;
        }

        let content = if in_fence {
            trimmed
        } else {
            trimmed
                .trim_start_matches('#')
                .trim_start_matches('>')
                .trim_start_matches(|c| c == '-' || c == '*' || c == '+')
                .trim()
        };

        if !content.is_empty() {
            result.push_str(&strip_inline_markup(content));
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Replace `[label](url)` with `label` and drop emphasis markers.
fn strip_inline_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match (after.find("]("), after.find(')')) {
            (Some(close), Some(end)) if close < end => {
                out.push_str(&rest[..open]);
                out.push_str(&after[..close]);
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out.replace("**", "").replace("__", "").replace('`', "")
}

/// Check if text is likely text rather than binary.
fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}
