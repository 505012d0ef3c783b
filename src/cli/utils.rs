use serde_json::{json, Value};

use crate::app::{build_store, AppState};
use crate::cli::OutputFormat;
use crate::config::config;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "status": "success",
                "message": message
            });

            if let Some(Value::Object(extra)) = data {
                if let Value::Object(body) = &mut response {
                    body.extend(extra);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Repositories over the configured store, for one-shot commands
pub async fn open_state() -> anyhow::Result<AppState> {
    let config = config();
    let store = build_store(config).await?;
    if store.kind() == "memory" {
        tracing::warn!("Using the in-memory store; changes are discarded when the command exits");
    }
    Ok(AppState::from_config(store, config))
}
