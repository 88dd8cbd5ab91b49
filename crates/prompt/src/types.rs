//! Prompt types for ragbot.

use serde::Serialize;

/// The prompt templates known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Local context only
    Basic,
    /// Local knowledge base plus web search results
    Hybrid,
}

impl PromptKind {
    pub const ALL: [PromptKind; 2] = [PromptKind::Basic, PromptKind::Hybrid];

    /// Template name in the registry, also the override file stem.
    pub fn id(&self) -> &'static str {
        match self {
            PromptKind::Basic => "basic",
            PromptKind::Hybrid => "hybrid",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

/// Variables rendered into the basic template.
#[derive(Debug, Clone, Serialize)]
pub struct BasicPromptVars<'a> {
    pub query: &'a str,
    pub context: &'a str,
}

/// Variables rendered into the hybrid template.
///
/// The `has_*` flags drive the conditional sections.
#[derive(Debug, Clone, Serialize)]
pub struct HybridPromptVars<'a> {
    pub query: &'a str,
    pub local_context: &'a str,
    pub web_context: &'a str,
    pub has_local: bool,
    pub has_web: bool,
    pub has_context: bool,
}

impl<'a> HybridPromptVars<'a> {
    pub fn new(query: &'a str, local_context: &'a str, web_context: &'a str) -> Self {
        let has_local = !local_context.trim().is_empty();
        let has_web = !web_context.trim().is_empty();
        Self {
            query,
            local_context,
            web_context,
            has_local,
            has_web,
            has_context: has_local || has_web,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ids_round_trip() {
        for kind in PromptKind::ALL {
            assert_eq!(PromptKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(PromptKind::from_id("agent"), None);
    }

    #[test]
    fn test_hybrid_flags() {
        let vars = HybridPromptVars::new("q", "  ", "[Web Source 1] t\nc\n");
        assert!(!vars.has_local);
        assert!(vars.has_web);
        assert!(vars.has_context);

        let empty = HybridPromptVars::new("q", "", "");
        assert!(!empty.has_context);
    }
}
