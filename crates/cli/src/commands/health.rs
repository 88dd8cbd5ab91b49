//! Health command handler.
//!
//! Probes every collaborator once and reports which are usable.

use super::print_json;
use crate::services::Services;
use clap::Args;
use ragbot_core::{config::AppConfig, AppError, AppResult};
use serde::Serialize;

/// Check the availability of every collaborator
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComponentHealth {
    name: &'static str,
    provider: String,
    available: bool,
    /// Web search is optional; answers degrade without it
    required: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    healthy: bool,
    components: Vec<ComponentHealth>,
    prompt_overrides: Vec<String>,
}

impl HealthCommand {
    pub async fn execute(&self, config: &AppConfig, services: &Services) -> AppResult<()> {
        tracing::info!("Executing health command");

        let mut components = Vec::with_capacity(4);

        let llm_up = services.pipeline.llm_available().await;
        components.push(ComponentHealth {
            name: "llm",
            provider: services.llm.provider_name().to_string(),
            available: llm_up,
            required: true,
            detail: format!("{} at {}", config.llm.model, config.llm.endpoint),
        });

        let embedding = services.embedder.verify().await;
        components.push(ComponentHealth {
            name: "embedding",
            provider: services.embedder.provider_name().to_string(),
            available: embedding.is_ok(),
            required: true,
            detail: match embedding {
                Ok(()) => format!(
                    "{} ({} dimensions)",
                    services.embedder.model_name(),
                    services.embedder.dimensions()
                ),
                Err(e) => e.to_string(),
            },
        });

        let count = services.store.count().await;
        components.push(ComponentHealth {
            name: "vector-store",
            provider: services.store.backend_name().to_string(),
            available: count.is_ok(),
            required: true,
            detail: match count {
                Ok(n) => format!("{} chunks at {}", n, config.vector_store_path().display()),
                Err(e) => e.to_string(),
            },
        });

        let web_up = services.web.is_available();
        components.push(ComponentHealth {
            name: "web-search",
            provider: services.web.provider_name().to_string(),
            available: web_up,
            required: false,
            detail: if web_up {
                "API key configured".to_string()
            } else {
                format!("set {} to enable", config.web_search.api_key_env)
            },
        });

        let report = HealthReport {
            healthy: components.iter().all(|c| c.available || !c.required),
            components,
            prompt_overrides: ragbot_prompt::list_prompts(&config.workspace)?,
        };

        if self.json {
            print_json(&report)?;
        } else {
            for c in &report.components {
                let state = match (c.available, c.required) {
                    (true, _) => "ok",
                    (false, true) => "DOWN",
                    (false, false) => "off",
                };
                println!("{:<13} {:<5} {:<8} {}", c.name, state, c.provider, c.detail);
            }
            if !report.prompt_overrides.is_empty() {
                println!("prompt overrides: {}", report.prompt_overrides.join(", "));
            }
        }

        if !report.healthy {
            let down: Vec<&str> = report
                .components
                .iter()
                .filter(|c| c.required && !c.available)
                .map(|c| c.name)
                .collect();
            return Err(AppError::Other(format!("unavailable: {}", down.join(", "))));
        }

        Ok(())
    }
}
