use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::database::document::{self, Document};
use crate::database::schema::{CollectionSchema, FieldKind};
use crate::hooks::DocumentChange;

pub static USER_SCHEMA: CollectionSchema = CollectionSchema {
    name: "users",
    label: "user",
    fields: &[
        ("name", FieldKind::String),
        ("email", FieldKind::String),
        ("photo", FieldKind::String),
        ("role", FieldKind::String),
        ("password", FieldKind::String),
        ("passwordChangedAt", FieldKind::Date),
        ("passwordResetToken", FieldKind::String),
        ("passwordResetExpires", FieldKind::Date),
        ("active", FieldKind::Boolean),
    ],
    unique: &["email"],
    transient: &["passwordConfirm"],
    hidden: &["password", "passwordResetToken", "passwordResetExpires", "active"],
    hidden_when: Some(("active", false)),
};

pub const ROLES: [&str; 4] = ["user", "guide", "lead-guide", "admin"];

pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Reset tokens are 32 random bytes, hex encoded
const RESET_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Password hashing failed")]
    HashingFailed,

    #[error("Stored password hash is malformed")]
    MalformedHash,
}

/// Field errors for a user document. Password rules apply only when the
/// password is being set.
pub fn validate(doc: &Document, password_changed: bool) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    let mut fail = |field: &str, message: &str| {
        errors.entry(field.to_string()).or_insert_with(|| message.to_string());
    };

    match doc.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => {}
        _ => fail("name", "Please tell us your name"),
    }

    match doc.get("email") {
        None | Some(Value::Null) => fail("email", "Please tell us your email!"),
        Some(Value::String(email)) if is_valid_email(email) => {}
        Some(_) => fail("email", "Please provide a valid email"),
    }

    match doc.get("role") {
        None | Some(Value::Null) => {}
        Some(Value::String(role)) if ROLES.contains(&role.as_str()) => {}
        Some(_) => fail("role", "Role is either: user, guide, lead-guide, admin"),
    }

    if let Some(active) = doc.get("active").filter(|v| !v.is_null() && !v.is_boolean()) {
        fail("active", &format!("Invalid active: {}", active));
    }

    if password_changed {
        match doc.get("password").and_then(Value::as_str) {
            None => fail("password", "Please provide a password"),
            Some(password) if password.chars().count() < PASSWORD_MIN_LENGTH => {
                fail("password", "A password must have greater or equal to 8 characters")
            }
            Some(password) => match doc.get("passwordConfirm").and_then(Value::as_str) {
                None => fail("passwordConfirm", "Please confirm your password"),
                Some(confirm) if confirm != password => {
                    fail("passwordConfirm", "Passwords do not match! Please try again")
                }
                Some(_) => {}
            },
        }
    }

    errors
}

/// Shape check for `local@domain.tld`
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|l| !l.is_empty() && !l.starts_with('-') && !l.ends_with('-'))
        && labels
            .iter()
            .all(|l| l.chars().all(|c| c.is_alphanumeric() || c == '-'))
        && labels.last().map(|tld| tld.chars().count() >= 2).unwrap_or(false)
}

/// Lowercase the email; fill defaults on new users
pub fn apply_defaults(change: &mut DocumentChange) {
    if let Some(email) = change.get_str("email") {
        let normalized = email.trim().to_lowercase();
        if normalized != email {
            change.set("email", Value::String(normalized));
        }
    }

    if change.is_new() {
        change.set_default("role", Value::String("user".to_string()));
        change.set_default("active", Value::Bool(true));
    }
}

/// Argon2id hash with a random salt. CPU heavy; call from a blocking thread.
pub fn hash_password(password: &str) -> Result<String, ModelError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| ModelError::HashingFailed)
}

pub fn correct_password(candidate: &str, hash: &str) -> Result<bool, ModelError> {
    let parsed = PasswordHash::new(hash).map_err(|_| ModelError::MalformedHash)?;
    Ok(Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok())
}

/// Whether the password changed after `timestamp_secs` (unix seconds)
pub fn changed_password_after(doc: &Document, timestamp_secs: i64) -> bool {
    doc.get("passwordChangedAt")
        .and_then(Value::as_str)
        .and_then(document::parse_date)
        .map(|changed| timestamp_secs < changed.timestamp())
        .unwrap_or(false)
}

pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Store a hashed reset token with its expiry on the document and return
/// the plaintext token
pub fn create_password_reset_token(change: &mut DocumentChange, ttl_minutes: i64) -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    change.set("passwordResetToken", Value::String(hash_reset_token(&token)));
    change.set(
        "passwordResetExpires",
        Value::String(document::format_date(Utc::now() + Duration::minutes(ttl_minutes))),
    );

    token
}
