use serde_json::{Number, Value};
use std::collections::BTreeMap;

use crate::database::document::{self, Document};
use crate::database::schema::{cast_date, CollectionSchema, FieldKind};
use crate::hooks::DocumentChange;

pub static TOUR_SCHEMA: CollectionSchema = CollectionSchema {
    name: "tours",
    label: "tour",
    fields: &[
        ("name", FieldKind::String),
        ("slug", FieldKind::String),
        ("duration", FieldKind::Number),
        ("maxGroupSize", FieldKind::Number),
        ("difficulty", FieldKind::String),
        ("ratingsAverage", FieldKind::Number),
        ("ratingsQuantity", FieldKind::Number),
        ("price", FieldKind::Number),
        ("priceDiscount", FieldKind::Number),
        ("summary", FieldKind::String),
        ("description", FieldKind::String),
        ("imageCover", FieldKind::String),
        ("images", FieldKind::StringArray),
        ("createdAt", FieldKind::Date),
        ("startDates", FieldKind::DateArray),
        ("secretTour", FieldKind::Boolean),
    ],
    unique: &["name"],
    transient: &[],
    hidden: &[],
    hidden_when: Some(("secretTour", true)),
};

pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];

pub const NAME_MIN_LENGTH: usize = 10;
pub const NAME_MAX_LENGTH: usize = 40;

const TRIMMED_FIELDS: [&str; 3] = ["name", "summary", "description"];

/// Lowercase, with every run of non-alphanumeric characters collapsed to
/// one `-` and no leading or trailing `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Field errors for a complete tour document; empty when valid
pub fn validate(doc: &Document) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    let mut fail = |field: &str, message: String| {
        errors.entry(field.to_string()).or_insert(message);
    };

    match doc.get("name") {
        None | Some(Value::Null) => fail("name", "A tour must have a name".into()),
        Some(Value::String(name)) => {
            let length = name.trim().chars().count();
            if length == 0 {
                fail("name", "A tour must have a name".into());
            } else if length > NAME_MAX_LENGTH {
                fail("name", format!("A tour name must have less or equal then {} characters", NAME_MAX_LENGTH));
            } else if length < NAME_MIN_LENGTH {
                fail("name", format!("A tour name must have more or equal then {} characters", NAME_MIN_LENGTH));
            }
        }
        Some(other) => fail("name", invalid("name", other)),
    }

    for (field, message) in [
        ("duration", "A tour must have a duration"),
        ("maxGroupSize", "A tour must have a group size"),
        ("price", "A tour must have a price"),
    ] {
        match doc.get(field) {
            None | Some(Value::Null) => fail(field, message.into()),
            Some(Value::Number(_)) => {}
            Some(other) => fail(field, invalid(field, other)),
        }
    }

    match doc.get("difficulty") {
        None | Some(Value::Null) => fail("difficulty", "A tour must have a difficulty".into()),
        Some(Value::String(d)) if DIFFICULTIES.contains(&d.as_str()) => {}
        Some(_) => fail("difficulty", "Difficulty is either: easy, medium, difficult".into()),
    }

    match doc.get("ratingsAverage") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) => {
            let rating = n.as_f64().unwrap_or(0.0);
            if rating < 1.0 {
                fail("ratingsAverage", "Rating must be above 1.0".into());
            } else if rating > 5.0 {
                fail("ratingsAverage", "Rating must be below 5.0".into());
            }
        }
        Some(other) => fail("ratingsAverage", invalid("ratingsAverage", other)),
    }

    if let Some(value) = doc.get("ratingsQuantity").filter(|v| !v.is_null() && !v.is_number()) {
        fail("ratingsQuantity", invalid("ratingsQuantity", value));
    }

    match doc.get("priceDiscount") {
        None | Some(Value::Null) => {}
        Some(Value::Number(discount)) => {
            let price = doc.get("price").and_then(Value::as_f64);
            if let (Some(discount), Some(price)) = (discount.as_f64(), price) {
                if discount >= price {
                    fail(
                        "priceDiscount",
                        format!("Discount price ({}) should be below regular price", discount),
                    );
                }
            }
        }
        Some(other) => fail("priceDiscount", invalid("priceDiscount", other)),
    }

    for (field, message) in [
        ("summary", Some("A tour must have a description")),
        ("imageCover", Some("A tour must have a cover image")),
        ("description", None),
        ("slug", None),
    ] {
        match (doc.get(field), message) {
            (None | Some(Value::Null), Some(message)) => fail(field, message.into()),
            (Some(Value::String(s)), Some(message)) if s.trim().is_empty() => fail(field, message.into()),
            (None | Some(Value::Null) | Some(Value::String(_)), _) => {}
            (Some(other), _) => fail(field, invalid(field, other)),
        }
    }

    if let Some(images) = doc.get("images").filter(|v| !v.is_null()) {
        let valid = images.as_array().map(|items| items.iter().all(Value::is_string)).unwrap_or(false);
        if !valid {
            fail("images", invalid("images", images));
        }
    }

    if let Some(created) = doc.get("createdAt").filter(|v| !v.is_null()) {
        if created.as_str().and_then(cast_date).is_none() {
            fail("createdAt", invalid("createdAt", created));
        }
    }

    if let Some(dates) = doc.get("startDates").filter(|v| !v.is_null()) {
        let valid = dates
            .as_array()
            .map(|items| items.iter().all(|d| d.as_str().and_then(cast_date).is_some()))
            .unwrap_or(false);
        if !valid {
            fail("startDates", invalid("startDates", dates));
        }
    }

    if let Some(secret) = doc.get("secretTour").filter(|v| !v.is_null() && !v.is_boolean()) {
        fail("secretTour", invalid("secretTour", secret));
    }

    errors
}

fn invalid(field: &str, value: &Value) -> String {
    let shown = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("Invalid {}: {}", field, shown)
}

/// Trim text fields and canonicalise dates; fill defaults on new tours
pub fn apply_defaults(change: &mut DocumentChange) {
    for field in TRIMMED_FIELDS {
        if let Some(text) = change.get_str(field) {
            let trimmed = text.trim();
            if trimmed.len() != text.len() {
                let trimmed = trimmed.to_string();
                change.set(field, Value::String(trimmed));
            }
        }
    }

    if let Some(created) = change.get_str("createdAt").and_then(cast_date) {
        if change.get("createdAt") != Some(&created) {
            change.set("createdAt", created);
        }
    }
    if let Some(Value::Array(dates)) = change.get("startDates") {
        let canonical: Vec<Value> = dates.iter().filter_map(|d| d.as_str().and_then(cast_date)).collect();
        if &canonical != dates {
            change.set("startDates", Value::Array(canonical));
        }
    }

    if change.is_new() {
        change.set_default("ratingsAverage", Value::from(4.5));
        change.set_default("ratingsQuantity", Value::from(0));
        change.set_default("createdAt", Value::String(document::now_string()));
        change.set_default("secretTour", Value::Bool(false));
        change.set_default("images", Value::Array(vec![]));
        change.set_default("startDates", Value::Array(vec![]));
    }
}

/// Virtual field: duration in weeks
pub fn duration_weeks(doc: &Document) -> Option<Value> {
    let duration = doc.get("duration")?.as_f64()?;
    Number::from_f64(duration / 7.0).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        document::as_document(value).unwrap()
    }

    fn valid_tour() -> Document {
        doc(json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
        }))
    }

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  The  Sea -- Explorer!! "), "the-sea-explorer");
        assert_eq!(slugify("Ünïcode Tour 2"), "ünïcode-tour-2");
    }

    #[test]
    fn valid_tour_has_no_errors() {
        assert!(validate(&valid_tour()).is_empty());
    }

    #[test]
    fn reports_missing_required_fields() {
        let errors = validate(&Document::new());
        for field in ["name", "duration", "maxGroupSize", "difficulty", "price", "summary", "imageCover"] {
            assert!(errors.contains_key(field), "missing error for {}", field);
        }
        assert_eq!(errors["name"], "A tour must have a name");
    }

    #[test]
    fn enforces_lengths_ranges_and_enums() {
        let mut tour = valid_tour();
        tour.insert("name".into(), json!("Short"));
        tour.insert("difficulty".into(), json!("extreme"));
        tour.insert("ratingsAverage".into(), json!(6));
        let errors = validate(&tour);
        assert_eq!(errors["name"], "A tour name must have more or equal then 10 characters");
        assert_eq!(errors["difficulty"], "Difficulty is either: easy, medium, difficult");
        assert_eq!(errors["ratingsAverage"], "Rating must be below 5.0");

        tour.insert("name".into(), json!("A".repeat(41)));
        assert_eq!(
            validate(&tour)["name"],
            "A tour name must have less or equal then 40 characters"
        );
    }

    #[test]
    fn discount_must_be_below_price() {
        let mut tour = valid_tour();
        tour.insert("priceDiscount".into(), json!(397));
        assert_eq!(validate(&tour)["priceDiscount"], "Discount price (397) should be below regular price");

        tour.insert("priceDiscount".into(), json!(100));
        assert!(validate(&tour).is_empty());
    }

    #[test]
    fn rejects_mistyped_values() {
        let mut tour = valid_tour();
        tour.insert("price".into(), json!("cheap"));
        tour.insert("startDates".into(), json!(["someday"]));
        let errors = validate(&tour);
        assert_eq!(errors["price"], "Invalid price: cheap");
        assert!(errors.contains_key("startDates"));
    }

    #[test]
    fn defaults_fill_new_tours_only() {
        let mut input = valid_tour();
        input.insert("summary".into(), json!("  padded  "));
        input.insert("startDates".into(), json!(["2021-06-19,10:00"]));
        let mut change = DocumentChange::new(input);
        apply_defaults(&mut change);

        assert_eq!(change.get("ratingsAverage"), Some(&json!(4.5)));
        assert_eq!(change.get("ratingsQuantity"), Some(&json!(0)));
        assert_eq!(change.get("secretTour"), Some(&json!(false)));
        assert_eq!(change.get_str("summary"), Some("padded"));
        assert!(change.get_str("createdAt").is_some());
        assert_eq!(change.get("startDates"), Some(&json!(["2021-06-19T10:00:00.000Z"])));

        let mut update = DocumentChange::for_update(valid_tour(), Document::new());
        apply_defaults(&mut update);
        assert_eq!(update.get("ratingsAverage"), None);
    }

    #[test]
    fn duration_weeks_is_derived() {
        assert_eq!(duration_weeks(&valid_tour()), Some(json!(5.0 / 7.0)));
        assert_eq!(duration_weeks(&Document::new()), None);
    }
}
