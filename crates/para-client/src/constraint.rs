//! # Validation Constraint Descriptors
//!
//! A [`Constraint`] names a server-side field-validation rule and carries
//! its parameters. Constraints are registered per type and field through
//! the `_constraints` endpoints and enforced by the server on writes.
//!
//! Each named constructor produces the exact wire payload the server
//! expects, including the i18n message key (`messages.{rule}`).

use serde_json::{json, Map, Value};

/// A named server-side field-validation rule with its parameter payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    name: String,
    payload: Map<String, Value>,
}

impl Constraint {
    fn build(name: &str, mut payload: Map<String, Value>) -> Self {
        payload.insert("message".into(), json!(format!("messages.{name}")));
        Self {
            name: name.to_string(),
            payload,
        }
    }

    /// The rule kind, e.g. `"required"` or `"pattern"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule parameters sent to the server.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// The field must have a non-null, non-empty value.
    pub fn required() -> Self {
        Self::build("required", Map::new())
    }

    /// The field value must be at least `min`.
    pub fn min(min: i64) -> Self {
        let mut p = Map::new();
        p.insert("value".into(), json!(min));
        Self::build("min", p)
    }

    /// The field value must be at most `max`.
    pub fn max(max: i64) -> Self {
        let mut p = Map::new();
        p.insert("value".into(), json!(max));
        Self::build("max", p)
    }

    /// The field length must be between `min` and `max`.
    pub fn size(min: i64, max: i64) -> Self {
        let mut p = Map::new();
        p.insert("min".into(), json!(min));
        p.insert("max".into(), json!(max));
        Self::build("size", p)
    }

    /// The field must be a number with at most `integer` integral digits
    /// and `fraction` fractional digits.
    pub fn digits(integer: i64, fraction: i64) -> Self {
        let mut p = Map::new();
        p.insert("integer".into(), json!(integer));
        p.insert("fraction".into(), json!(fraction));
        Self::build("digits", p)
    }

    /// The field must match the given regular expression.
    pub fn pattern(regex: impl Into<String>) -> Self {
        let mut p = Map::new();
        p.insert("value".into(), json!(regex.into()));
        Self::build("pattern", p)
    }

    /// The field must be a valid email address.
    pub fn email() -> Self {
        Self::build("email", Map::new())
    }

    /// The field must be `false`.
    pub fn falsy() -> Self {
        Self::build("false", Map::new())
    }

    /// The field must be `true`.
    pub fn truthy() -> Self {
        Self::build("true", Map::new())
    }

    /// The field must be a date in the future.
    pub fn future() -> Self {
        Self::build("future", Map::new())
    }

    /// The field must be a date in the past.
    pub fn past() -> Self {
        Self::build("past", Map::new())
    }

    /// The field must be a valid URL.
    pub fn url() -> Self {
        Self::build("url", Map::new())
    }
}
