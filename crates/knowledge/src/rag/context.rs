//! Bounded-length context assembly.
//!
//! Entries are appended in the order received until the next one would
//! push the output past the budget. Budgets count characters of the
//! final string, separators included, and an entry is never cut.

use crate::types::{ScoredResult, WebResult};

const LOCAL_SEPARATOR: &str = "\n\n";
const WEB_SEPARATOR: &str = "\n";

/// Format one local result.
pub fn format_local_entry(result: &ScoredResult) -> String {
    format!("[Score: {:.3}] {}", result.score, result.text)
}

/// Format one web result; `position` is 1-based.
pub fn format_web_entry(position: usize, result: &WebResult) -> String {
    format!("[Web Source {}] {}\n{}\n", position, result.title, result.content)
}

/// Join entries with `separator`, stopping before the first one that
/// would exceed `budget` characters.
fn pack<I>(entries: I, separator: &str, budget: usize) -> String
where
    I: IntoIterator<Item = String>,
{
    let separator_len = separator.chars().count();
    let mut out = String::new();
    let mut used = 0;

    for entry in entries {
        let extra = if out.is_empty() { 0 } else { separator_len };
        let entry_len = entry.chars().count();

        if used + extra + entry_len > budget {
            break;
        }

        if extra > 0 {
            out.push_str(separator);
        }
        out.push_str(&entry);
        used += extra + entry_len;
    }

    out
}

/// Assemble local retrieval results into at most `budget` characters.
pub fn assemble(results: &[ScoredResult], budget: usize) -> String {
    let context = pack(results.iter().map(format_local_entry), LOCAL_SEPARATOR, budget);

    if context.is_empty() && !results.is_empty() {
        tracing::debug!("First local result alone exceeds the {} char budget", budget);
    }

    context
}

/// Assemble web results into at most `budget` characters.
pub fn assemble_web(results: &[WebResult], budget: usize) -> String {
    pack(
        results
            .iter()
            .enumerate()
            .map(|(i, r)| format_web_entry(i + 1, r)),
        WEB_SEPARATOR,
        budget,
    )
}

/// Split a budget between local and web context.
///
/// Local gets the smaller half when the budget is odd.
pub fn split_budget(budget: usize) -> (usize, usize) {
    let local = budget / 2;
    (local, budget - local)
}

/// Assemble both contexts for the fallback path, half the budget each.
pub fn assemble_hybrid(
    local: &[ScoredResult],
    web: &[WebResult],
    budget: usize,
) -> (String, String) {
    let (local_budget, web_budget) = split_budget(budget);
    (assemble(local, local_budget), assemble_web(web, web_budget))
}
