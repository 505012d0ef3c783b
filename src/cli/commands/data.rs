use anyhow::{bail, Context};
use clap::Subcommand;
use serde_json::{json, Value};
use std::path::Path;

use crate::cli::utils::{open_state, output_success};
use crate::cli::OutputFormat;
use crate::database::{document, Repository};

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "Import tours from a JSON array file")]
    Import {
        #[arg(help = "Input file path", default_value = "dev-data/tours-simple.json")]
        input: String,
    },

    #[command(about = "Delete every tour")]
    Delete,
}

pub async fn handle(cmd: DataCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = open_state().await?;

    match cmd {
        DataCommands::Import { input } => {
            let imported = import_tours(&state.tours, Path::new(&input)).await?;
            output_success(
                &output_format,
                &format!("Imported {} tours from {}", imported, input),
                Some(json!({ "imported": imported })),
            )
        }
        DataCommands::Delete => {
            let deleted = state.tours.delete_all().await?;
            output_success(
                &output_format,
                &format!("Deleted {} tours", deleted),
                Some(json!({ "deleted": deleted })),
            )
        }
    }
}

/// Create each tour in the file through the repository, so hooks run.
/// Stops at the first tour that fails.
pub async fn import_tours(tours: &Repository, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))?;

    let Value::Array(items) = parsed else {
        bail!("{} must contain a JSON array of tours", path.display());
    };

    let total = items.len();
    for (index, item) in items.into_iter().enumerate() {
        let Some(tour) = document::as_document(item) else {
            bail!("Tour #{} is not a JSON object", index + 1);
        };
        tours
            .create(tour)
            .await
            .with_context(|| format!("Failed to import tour #{}", index + 1))?;
    }

    tracing::info!("Imported {} tours from {}", total, path.display());
    Ok(total)
}
