//! Deciding whether local retrieval is good enough.

use crate::types::ScoredResult;
use std::fmt;

/// Default minimum best score for local results to count as sufficient.
pub const DEFAULT_FALLBACK_THRESHOLD: f32 = 0.3;

/// Query terms that signal the answer may need fresher data than the
/// local knowledge base holds. Matched as substrings of the lower-cased query.
pub const TIME_SENSITIVE_KEYWORDS: [&str; 7] =
    ["latest", "recent", "current", "today", "2024", "2025", "now"];

/// Why the decider chose the way it did.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Local retrieval found nothing
    NoResults,
    /// The best local score is below the threshold
    LowScore { best: f32 },
    /// The query asks about something recent, whatever the scores
    TimeSensitive { keyword: &'static str },
    /// Local results are good enough
    Sufficient,
}

impl FallbackReason {
    pub fn needs_fallback(&self) -> bool {
        !matches!(self, Self::Sufficient)
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResults => write!(f, "no local results"),
            Self::LowScore { best } => write!(f, "best local score {:.3} below threshold", best),
            Self::TimeSensitive { keyword } => write!(f, "time-sensitive query ('{}')", keyword),
            Self::Sufficient => write!(f, "local results sufficient"),
        }
    }
}

/// Decide whether to supplement local results with a web search.
///
/// Rules apply in order: no results, best score below `threshold`,
/// time-sensitive keyword. A time-sensitive query triggers the fallback
/// even when local scores are high.
pub fn decide(results: &[ScoredResult], query: &str, threshold: f32) -> FallbackReason {
    let best = match results.iter().map(|r| r.score).reduce(f32::max) {
        Some(best) => best,
        None => return FallbackReason::NoResults,
    };

    if best < threshold {
        return FallbackReason::LowScore { best };
    }

    let lowered = query.to_lowercase();
    if let Some(keyword) = TIME_SENSITIVE_KEYWORDS
        .iter()
        .copied()
        .find(|k| lowered.contains(k))
    {
        return FallbackReason::TimeSensitive { keyword };
    }

    FallbackReason::Sufficient
}

/// Boolean form of [`decide`].
pub fn should_use_fallback(results: &[ScoredResult], query: &str, threshold: f32) -> bool {
    decide(results, query, threshold).needs_fallback()
}

/// [`decide`] bound to a configured threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackDecider {
    pub threshold: f32,
}

impl Default for FallbackDecider {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FALLBACK_THRESHOLD,
        }
    }
}

impl FallbackDecider {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn decide(&self, results: &[ScoredResult], query: &str) -> FallbackReason {
        decide(results, query, self.threshold)
    }

    pub fn should_use_fallback(&self, results: &[ScoredResult], query: &str) -> bool {
        should_use_fallback(results, query, self.threshold)
    }
}
