use serde_json::Value;

use crate::database::document::{self, Document, ID_FIELD};
use crate::database::{DatabaseError, Repository};
use crate::hooks::{DocumentChange, WriteOptions};
use crate::models::user;
use crate::query::{Filter, FilterOp};

/// Issue a reset token for the active user with this email. The hashed
/// token and its expiry are saved without validation; the plaintext token
/// is returned once.
pub async fn issue_password_reset(
    users: &Repository,
    email: &str,
    ttl_minutes: i64,
) -> Result<String, DatabaseError> {
    let email = email.trim().to_lowercase();
    let account = users
        .query()
        .filter(Filter::eq("email", email))
        .first_stored()
        .await?
        .ok_or_else(|| DatabaseError::NotFound("There is no user with that email address.".to_string()))?;

    let mut change = DocumentChange::for_update(account, Document::new());
    let token = user::create_password_reset_token(&mut change, ttl_minutes);
    let saved = users.save(change, WriteOptions { run_validators: false }).await?;

    let id = saved.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
    tracing::info!("Issued password reset token for user {}", id);
    Ok(token)
}

/// Set a new password for the user holding this unexpired reset token
pub async fn reset_password(
    users: &Repository,
    token: &str,
    password: &str,
    password_confirm: &str,
) -> Result<Document, DatabaseError> {
    let filter = Filter::eq("passwordResetToken", user::hash_reset_token(token)).with(
        "passwordResetExpires",
        FilterOp::Gt,
        document::now_string(),
    );
    let account = users
        .query()
        .filter(filter)
        .first_stored()
        .await?
        .ok_or_else(|| DatabaseError::InvalidInput("Token is invalid or has expired".to_string()))?;

    let mut patch = Document::new();
    patch.insert("password".to_string(), Value::String(password.to_string()));
    patch.insert("passwordConfirm".to_string(), Value::String(password_confirm.to_string()));

    let mut change = DocumentChange::for_update(account, patch);
    change.remove("passwordResetToken");
    change.remove("passwordResetExpires");

    users.save(change, WriteOptions::default()).await
}
