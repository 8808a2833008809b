//! Payload validation and sanitization
//!
//! Runs before any network call. A valid payload comes back trimmed and
//! normalized; an invalid one yields one error per violated field.

use super::registry::{descriptor, FieldKind, FieldRule, ResourceKind};
use crate::api::error::{ApiResult, CanonicalError};
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Number, Value};
use std::fmt;

/// One violated field rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of [`validate`]: either the sanitized payload or the field errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid(Value),
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Valid(v) => Some(v),
            Self::Invalid(_) => None,
        }
    }

    pub fn errors(&self) -> &[FieldError] {
        match self {
            Self::Valid(_) => &[],
            Self::Invalid(errors) => errors,
        }
    }

    /// Collapse into a canonical result, joining field messages with `", "`
    pub fn into_result(self) -> ApiResult<Value> {
        match self {
            Self::Valid(v) => Ok(v),
            Self::Invalid(errors) => Err(CanonicalError::validation(join_errors(&errors))),
        }
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// True when `s` holds only ASCII letters, digits, `-` and `_`
pub fn is_safe_name(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lower-case `name` and drop every character outside `[a-z0-9-_]`.
///
/// One-way: distinct display names such as `"A.B"` and `"AB"` collapse to
/// the same key.
pub fn canonicalize_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_')
        .collect()
}

/// Validate and sanitize `payload` against the field rules of `kind`
pub fn validate(kind: ResourceKind, payload: &Value) -> ValidationResult {
    let Some(object) = payload.as_object() else {
        return ValidationResult::Invalid(vec![FieldError::new("payload", "payload must be a JSON object")]);
    };

    let desc = descriptor(kind);
    let mut sanitized: Map<String, Value> = object.clone();
    let mut errors = Vec::new();

    for rule in &desc.fields {
        let raw = object.get(&rule.name).filter(|v| !v.is_null());
        match sanitize_field(rule, raw) {
            Ok(Some(value)) => {
                sanitized.insert(rule.name.clone(), value);
            },
            Ok(None) => {
                sanitized.remove(&rule.name);
            },
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        ValidationResult::Valid(Value::Object(sanitized))
    } else {
        tracing::debug!("{} payload rejected: {}", kind, join_errors(&errors));
        ValidationResult::Invalid(errors)
    }
}

/// Validate a bare natural-key lookup value (name or id) and return it trimmed
pub fn validate_key(field: &str, key: &str) -> ApiResult<String> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(CanonicalError::validation(format!("{} is required", field)));
    }
    if !is_safe_name(trimmed) {
        return Err(CanonicalError::validation(format!(
            "{} must contain only letters, digits, '-' or '_'",
            field
        )));
    }
    Ok(trimmed.to_string())
}

/// `Ok(None)` means the field is absent (or blank) and optional
fn sanitize_field(rule: &FieldRule, raw: Option<&Value>) -> Result<Option<Value>, FieldError> {
    let name = rule.name.as_str();
    let Some(raw) = raw else {
        return missing(rule);
    };

    if let Value::String(s) = raw {
        if s.trim().is_empty() {
            return missing(rule);
        }
    }

    match rule.kind {
        FieldKind::Name => {
            let s = raw
                .as_str()
                .ok_or_else(|| FieldError::new(name, format!("{} must be a string", name)))?
                .trim();
            if !is_safe_name(s) {
                return Err(FieldError::new(
                    name,
                    format!("{} must contain only letters, digits, '-' or '_'", name),
                ));
            }
            Ok(Some(Value::String(s.to_string())))
        },
        FieldKind::Text => {
            let s = raw
                .as_str()
                .ok_or_else(|| FieldError::new(name, format!("{} must be a string", name)))?
                .trim();
            Ok(Some(Value::String(s.to_string())))
        },
        FieldKind::Amount => {
            let invalid = || FieldError::new(name, format!("{} must be a finite number", name));
            match raw {
                Value::Number(n) if n.as_f64().is_some_and(f64::is_finite) => Ok(Some(raw.clone())),
                Value::String(s) => {
                    let parsed: f64 = s.trim().parse().map_err(|_| invalid())?;
                    if !parsed.is_finite() {
                        return Err(invalid());
                    }
                    Number::from_f64(parsed)
                        .map(|n| Some(Value::Number(n)))
                        .ok_or_else(invalid)
                },
                _ => Err(invalid()),
            }
        },
        FieldKind::Bool => match raw {
            Value::Bool(_) => Ok(Some(raw.clone())),
            _ => Err(FieldError::new(name, format!("{} must be a boolean", name))),
        },
        FieldKind::Date => {
            let invalid = || FieldError::new(name, format!("{} must be a date (YYYY-MM-DD)", name));
            let s = raw.as_str().ok_or_else(invalid)?.trim();
            let is_date = NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
                || DateTime::parse_from_rfc3339(s).is_ok();
            if !is_date {
                return Err(invalid());
            }
            Ok(Some(Value::String(s.to_string())))
        },
        FieldKind::Integer => {
            let invalid = || FieldError::new(name, format!("{} must be an integer", name));
            match raw {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Some(raw.clone())),
                Value::String(s) => {
                    let parsed: i64 = s.trim().parse().map_err(|_| invalid())?;
                    Ok(Some(Value::from(parsed)))
                },
                _ => Err(invalid()),
            }
        },
        FieldKind::Enum => {
            let invalid = || {
                FieldError::new(name, format!("{} must be one of: {}", name, rule.values.join(", ")))
            };
            let s = raw.as_str().ok_or_else(invalid)?.trim().to_lowercase();
            if !rule.values.iter().any(|v| v.eq_ignore_ascii_case(&s)) {
                return Err(invalid());
            }
            Ok(Some(Value::String(s)))
        },
    }
}

fn missing(rule: &FieldRule) -> Result<Option<Value>, FieldError> {
    if rule.required {
        Err(FieldError::new(&rule.name, format!("{} is required", rule.name)))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_trims_and_returns_sanitized_copy() {
        let payload = json!({"categoryName": "  groceries ", "activeStatus": true});
        let result = validate(ResourceKind::Category, &payload);
        assert!(result.is_valid());
        assert_eq!(result.data().unwrap()["categoryName"], "groceries");
        assert_eq!(payload["categoryName"], "  groceries ");
    }

    #[test]
    fn test_empty_required_name_is_rejected() {
        for kind in [
            ResourceKind::Account,
            ResourceKind::Category,
            ResourceKind::Description,
            ResourceKind::Parameter,
        ] {
            let key = &descriptor(kind).natural_key;
            let mut payload = json!({"accountType": "debit", "parameterValue": "x"});
            payload[key.as_str()] = json!("   ");
            let result = validate(kind, &payload);
            assert!(!result.is_valid(), "{} accepted an empty name", kind);
            assert!(result.errors().iter().any(|e| e.field == *key && e.message == format!("{} is required", key)));
        }
    }

    #[test]
    fn test_unsafe_name_characters_are_rejected() {
        let result = validate(ResourceKind::Description, &json!({"descriptionName": "amazon.com"}));
        assert_eq!(
            result.errors()[0].message,
            "descriptionName must contain only letters, digits, '-' or '_'"
        );
    }

    #[test]
    fn test_amounts_must_be_finite_numbers() {
        let base = json!({
            "accountNameOwner": "chase_brian",
            "accountType": "credit",
            "transactionDate": "2024-03-01",
            "description": "amazon",
        });

        let mut ok = base.clone();
        ok["amount"] = json!(" 12.50 ");
        let result = validate(ResourceKind::Transaction, &ok);
        assert_eq!(result.data().unwrap()["amount"], json!(12.5));

        for bad in [json!("abc"), json!("inf"), json!("NaN"), json!(true)] {
            let mut payload = base.clone();
            payload["amount"] = bad;
            let result = validate(ResourceKind::Transaction, &payload);
            assert_eq!(result.errors()[0].message, "amount must be a finite number");
        }
    }

    #[test]
    fn test_one_error_per_violated_field() {
        let result = validate(
            ResourceKind::Transaction,
            &json!({"accountType": "savings", "transactionDate": "03/01/2024"}),
        );
        let fields: Vec<&str> = result.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["accountNameOwner", "accountType", "transactionDate", "description", "amount"]
        );
    }

    #[test]
    fn test_enum_values_are_lowercased() {
        let result = validate(
            ResourceKind::Account,
            &json!({"accountNameOwner": "chase_brian", "accountType": "Credit"}),
        );
        assert_eq!(result.data().unwrap()["accountType"], "credit");
    }

    #[test]
    fn test_blank_optional_fields_are_dropped() {
        let result = validate(
            ResourceKind::Account,
            &json!({"accountNameOwner": "chase_brian", "accountType": "debit", "moniker": "  "}),
        );
        assert!(result.data().unwrap().get("moniker").is_none());
    }

    #[test]
    fn test_non_object_payload() {
        let result = validate(ResourceKind::Parameter, &json!(["not", "an", "object"]));
        assert_eq!(result.errors()[0].field, "payload");
    }

    #[test]
    fn test_into_result_joins_messages() {
        let err = validate(ResourceKind::Parameter, &json!({})).into_result().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.message, "parameterName is required, parameterValue is required");
        assert_eq!(err.status, 0);
    }

    #[test]
    fn test_canonicalize_key_strips_and_lowercases() {
        assert_eq!(canonicalize_key("Chase_Brian"), "chase_brian");
        assert_eq!(canonicalize_key("A.B"), canonicalize_key("AB"));
        assert_eq!(canonicalize_key("Amex Blue-2"), "amexblue-2");
        assert_eq!(canonicalize_key("..."), "");
    }

    #[test]
    fn test_validate_key() {
        assert_eq!(validate_key("categoryName", " food ").unwrap(), "food");
        assert!(validate_key("categoryName", "").is_err());
        assert!(validate_key("categoryName", "a b").is_err());
    }
}
