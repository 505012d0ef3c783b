use std::collections::BTreeMap;
use thiserror::Error;

/// Hook pipeline errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HookError {
    #[error("Invalid input data. {}", join_messages(.field_errors))]
    Validation { field_errors: BTreeMap<String, String> },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("System error: {0}")]
    System(String),
}

fn join_messages(field_errors: &BTreeMap<String, String>) -> String {
    field_errors.values().cloned().collect::<Vec<_>>().join(". ")
}

impl HookError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut field_errors = BTreeMap::new();
        field_errors.insert(field.into(), message.into());
        HookError::Validation { field_errors }
    }

    /// Fold the errors of one pipeline run into a single error. Validation
    /// failures merge; any other error takes precedence.
    pub fn combine(errors: Vec<HookError>) -> Option<HookError> {
        let mut merged = BTreeMap::new();
        for error in errors {
            match error {
                HookError::Validation { field_errors } => merged.extend(field_errors),
                other => return Some(other),
            }
        }
        (!merged.is_empty()).then_some(HookError::Validation { field_errors: merged })
    }
}
