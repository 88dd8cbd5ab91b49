//! Loader for workspace prompt template overrides.
//!
//! A workspace may replace the built-in templates by placing
//! `basic.hbs` and/or `hybrid.hbs` in `.ragbot/prompts/`.

use crate::types::PromptKind;
use ragbot_core::config::RAGBOT_DIR;
use ragbot_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

const TEMPLATE_EXTENSION: &str = "hbs";

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(RAGBOT_DIR).join("prompts")
}

/// Load every template override present in the workspace.
///
/// Missing files are not an error; unreadable or empty ones are.
///
/// # Example
/// ```no_run
/// use ragbot_prompt::load_overrides;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// for (kind, _template) in load_overrides(Path::new("."))? {
///     println!("override: {}", kind.id());
/// }
/// # Ok(())
/// # }
/// ```
pub fn load_overrides(workspace_path: &Path) -> AppResult<Vec<(PromptKind, String)>> {
    let dir = prompts_dir(workspace_path);
    let mut overrides = Vec::new();

    for kind in PromptKind::ALL {
        let file = dir.join(format!("{}.{}", kind.id(), TEMPLATE_EXTENSION));
        if !file.exists() {
            continue;
        }

        tracing::debug!("Loading prompt override from: {:?}", file);

        let contents = std::fs::read_to_string(&file).map_err(|e| {
            AppError::Prompt(format!("Failed to read prompt file {:?}: {}", file, e))
        })?;

        validate_template(kind, &contents)?;
        overrides.push((kind, contents));
    }

    Ok(overrides)
}

/// List template files in the workspace prompts directory.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(TEMPLATE_EXTENSION)
        {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// An override must be non-empty and must place the query.
fn validate_template(kind: PromptKind, template: &str) -> AppResult<()> {
    if template.trim().is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt template '{}' cannot be empty",
            kind.id()
        )));
    }

    if !template.contains("query") {
        return Err(AppError::Prompt(format!(
            "Prompt template '{}' must reference {{{{query}}}}",
            kind.id()
        )));
    }

    Ok(())
}
