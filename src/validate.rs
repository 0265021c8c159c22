//! Whole-payload validators.
//!
//! These run after per-parameter validation succeeds and see every gathered
//! parameter at once. A validator returns `None` when the payload is
//! acceptable, otherwise a map of field name to error message that is merged
//! into the response's `errors`.

use std::sync::Arc;

use serde_json::{Map, Value};

pub type ValidateFn = Arc<dyn Fn(&Map<String, Value>) -> Option<Map<String, Value>> + Send + Sync>;

/// Wrap a closure as a validator.
pub fn from_fn<F>(check: F) -> ValidateFn
where
    F: Fn(&Map<String, Value>) -> Option<Map<String, Value>> + Send + Sync + 'static,
{
    Arc::new(check)
}

/// Succeeds only if every validator passes; reports the first failure.
#[must_use]
pub fn all(validators: Vec<ValidateFn>) -> ValidateFn {
    Arc::new(move |fields| {
        validators
            .iter()
            .find_map(|validator| validator(fields).filter(|errors| !errors.is_empty()))
    })
}

/// Succeeds if any validator passes; otherwise reports every failure.
#[must_use]
pub fn any(validators: Vec<ValidateFn>) -> ValidateFn {
    Arc::new(move |fields| {
        let mut errors = Map::new();
        for validator in &validators {
            match validator(fields) {
                Some(failed) if !failed.is_empty() => errors.extend(failed),
                _ => return None,
            }
        }
        Some(errors)
    })
}

/// At least one of `fields` must be present.
#[must_use]
pub fn contains_one_of(fields: &[&str]) -> ValidateFn {
    let fields: Vec<String> = fields.iter().map(|field| (*field).to_string()).collect();
    Arc::new(move |supplied| {
        if fields.iter().any(|field| supplied.contains_key(field)) {
            return None;
        }
        Some(
            fields
                .iter()
                .map(|field| (field.clone(), Value::from("one of these must have a value")))
                .collect(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_contains_one_of() {
        let check = contains_one_of(&["email", "phone"]);
        assert!(check(&fields(json!({"phone": "555"}))).is_none());
        let errors = check(&fields(json!({}))).unwrap();
        assert_eq!(
            Value::Object(errors),
            json!({
                "email": "one of these must have a value",
                "phone": "one of these must have a value",
            })
        );
    }

    #[test]
    fn test_all_and_any() {
        let email = contains_one_of(&["email"]);
        let phone = contains_one_of(&["phone"]);
        let payload = fields(json!({"email": "a@b.c"}));

        assert!(all(vec![Arc::clone(&email), Arc::clone(&phone)])(&payload).is_some());
        assert!(any(vec![Arc::clone(&email), Arc::clone(&phone)])(&payload).is_none());

        let errors = any(vec![email, phone])(&Map::new()).unwrap();
        assert_eq!(errors.len(), 2);
    }
}
