//! Prompt builder rendering the basic and hybrid answer templates.

use crate::loader::load_overrides;
use crate::types::{BasicPromptVars, HybridPromptVars, PromptKind};
use handlebars::Handlebars;
use ragbot_core::{AppError, AppResult};
use serde::Serialize;
use std::path::Path;

/// Context, then the question, then the insufficiency instruction.
pub const BASIC_TEMPLATE: &str = "Context information:
{{context}}

Question: {{query}}

Please answer the question based on the provided context. If the context doesn't contain enough information to answer the question, say so clearly.

Answer:";

/// Local and web sections are rendered only when they have content.
pub const HYBRID_TEMPLATE: &str = "{{#if has_local}}Local Knowledge Base:
{{local_context}}

{{/if}}{{#if has_web}}Web Search Results:
{{web_context}}

{{/if}}{{#unless has_context}}No relevant information was found in the local knowledge base or on the web. Answer the question from your general knowledge.

{{/unless}}Question: {{query}}

Please answer the question using the information above. If any part of your answer comes from the web search results, say so explicitly. If the available information is not sufficient to answer the question, say so clearly.

Answer:";

/// Renders answer prompts.
///
/// The registry is built once and shared read-only, so a single builder
/// serves concurrent pipeline invocations.
pub struct PromptBuilder {
    registry: Handlebars<'static>,
}

impl PromptBuilder {
    /// Builder with the built-in templates.
    pub fn new() -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Disable HTML escaping for plain text
        registry.register_escape_fn(handlebars::no_escape);

        let mut builder = Self { registry };
        builder.register(PromptKind::Basic, BASIC_TEMPLATE)?;
        builder.register(PromptKind::Hybrid, HYBRID_TEMPLATE)?;
        Ok(builder)
    }

    /// Builder with built-in templates replaced by any workspace overrides.
    pub fn from_workspace(workspace_path: &Path) -> AppResult<Self> {
        let mut builder = Self::new()?;
        for (kind, template) in load_overrides(workspace_path)? {
            tracing::info!("Using workspace override for {} prompt", kind.id());
            builder.register(kind, &template)?;
        }
        Ok(builder)
    }

    /// Replace the template used for `kind`.
    pub fn with_template(mut self, kind: PromptKind, template: &str) -> AppResult<Self> {
        self.register(kind, template)?;
        Ok(self)
    }

    fn register(&mut self, kind: PromptKind, template: &str) -> AppResult<()> {
        self.registry
            .register_template_string(kind.id(), template)
            .map_err(|e| {
                AppError::Prompt(format!(
                    "Failed to register {} template: {}",
                    kind.id(),
                    e
                ))
            })
    }

    /// Prompt for the local-only answer path.
    pub fn build_basic(&self, query: &str, context: &str) -> AppResult<String> {
        self.render(PromptKind::Basic, &BasicPromptVars { query, context })
    }

    /// Prompt combining local and web context.
    ///
    /// With both contexts empty the model is told to answer from general
    /// knowledge; the web disclosure instruction is always present.
    pub fn build_hybrid(
        &self,
        query: &str,
        local_context: &str,
        web_context: &str,
    ) -> AppResult<String> {
        let vars = HybridPromptVars::new(query, local_context, web_context);
        tracing::debug!(
            "Building hybrid prompt (local: {}, web: {})",
            vars.has_local,
            vars.has_web
        );
        self.render(PromptKind::Hybrid, &vars)
    }

    fn render<T: Serialize>(&self, kind: PromptKind, vars: &T) -> AppResult<String> {
        self.registry.render(kind.id(), vars).map_err(|e| {
            AppError::Prompt(format!("Failed to render {} template: {}", kind.id(), e))
        })
    }
}
