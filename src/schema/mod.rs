//! Schema validation seam.
//!
//! Route chains validate request parts and controller results through the
//! [`Schema`] trait. The crate ships [`TypedSchema`], which uses a serde type
//! for shape and normalization plus `validator` rules for constraints, and
//! [`schema_fn`] for ad-hoc closures.

mod typed;

pub use typed::TypedSchema;

use serde::Serialize;
use serde_json::Value;
use serde_path_to_error::{Path, Segment};
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Options passed to every validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Keys the schema does not know about are accepted
    pub allow_unknown: bool,
    /// Unknown keys are removed from the normalized output
    pub strip_unknown: bool,
    /// Scalar strings may be converted to numbers or booleans
    pub convert: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            allow_unknown: true,
            strip_unknown: false,
            convert: true,
        }
    }
}

impl ValidateOptions {
    /// Options used by route chains: unknown keys allowed and kept.
    pub fn lenient(convert: bool) -> Self {
        Self {
            convert,
            ..Self::default()
        }
    }
}

/// A schema validates a JSON value and returns its normalized form.
pub trait Schema: Send + Sync + 'static {
    fn validate(&self, value: Value, options: &ValidateOptions) -> Result<Value, SchemaError>;
}

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Dotted path of the offending field, empty for the value itself
    pub path: String,
    pub message: String,
    /// Constraint code, e.g. `length` or `email`
    pub kind: String,
}

impl FieldError {
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: kind.into(),
        }
    }
}

/// Validation failure with one entry per failed constraint.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct SchemaError {
    message: String,
    details: Vec<FieldError>,
}

impl SchemaError {
    pub fn new(details: Vec<FieldError>) -> Self {
        let message = if details.is_empty() {
            "Validation failed".to_string()
        } else {
            details
                .iter()
                .map(|detail| detail.message.as_str())
                .collect::<Vec<_>>()
                .join(". ")
        };
        Self { message, details }
    }

    /// Error raised when the value cannot be shaped into the schema's type.
    pub fn shape(error: &serde_json::Error) -> Self {
        Self::shape_at("", error)
    }

    /// [`shape`](Self::shape) for the field at `path`.
    pub fn shape_at(path: impl Into<String>, error: &serde_json::Error) -> Self {
        Self::new(vec![FieldError::new(path, error.to_string(), "type")])
    }

    /// Flattens `validator` errors, nested structs and lists included.
    pub fn from_validation_errors(errors: &ValidationErrors) -> Self {
        let mut details = Vec::new();
        collect_field_errors(errors, "", &mut details);
        details.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.kind.cmp(&b.kind)));
        Self::new(details)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[FieldError] {
        &self.details
    }

    pub fn details_value(&self) -> Value {
        serde_json::to_value(&self.details).unwrap_or(Value::Null)
    }
}

impl From<ValidationErrors> for SchemaError {
    fn from(errors: ValidationErrors) -> Self {
        Self::from_validation_errors(&errors)
    }
}

fn collect_field_errors(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("\"{path}\" failed {} check", error.code));
                    out.push(FieldError::new(path.clone(), message, error.code.to_string()));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

/// Closure-backed schema, see [`schema_fn`].
pub struct FnSchema<F>(F);

/// Wraps a closure as a [`Schema`].
pub fn schema_fn<F>(f: F) -> FnSchema<F>
where
    F: Fn(Value, &ValidateOptions) -> Result<Value, SchemaError> + Send + Sync + 'static,
{
    FnSchema(f)
}

impl<F> Schema for FnSchema<F>
where
    F: Fn(Value, &ValidateOptions) -> Result<Value, SchemaError> + Send + Sync + 'static,
{
    fn validate(&self, value: Value, options: &ValidateOptions) -> Result<Value, SchemaError> {
        (self.0)(value, options)
    }
}

/// Overlays `normalized` onto `original`, keeping keys only `original` has.
pub(crate) fn merge_unknown(original: Value, normalized: Value) -> Value {
    match (original, normalized) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_unknown(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, normalized) => normalized,
    }
}

/// Keys present in `original` but absent from `normalized`, as dotted paths.
pub(crate) fn unknown_keys(original: &Value, normalized: &Value, prefix: &str) -> Vec<String> {
    let (Value::Object(original), Value::Object(normalized)) = (original, normalized) else {
        return Vec::new();
    };
    let mut unknown = Vec::new();
    for (key, value) in original {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match normalized.get(key) {
            Some(known) => unknown.extend(unknown_keys(value, known, &path)),
            None => unknown.push(path),
        }
    }
    unknown
}

/// Renders a deserialization path the way field errors name their paths.
pub(crate) fn path_to_string(path: &Path) -> String {
    let mut out = String::new();
    for segment in path.iter() {
        match segment {
            Segment::Seq { index } => out.push_str(&format!("[{index}]")),
            Segment::Map { key } => push_key(&mut out, key),
            Segment::Enum { variant } => push_key(&mut out, variant),
            _ => push_key(&mut out, "?"),
        }
    }
    out
}

fn push_key(out: &mut String, key: &str) {
    if !out.is_empty() {
        out.push('.');
    }
    out.push_str(key);
}

/// Converts the string found at `path` into a number or boolean.
///
/// Returns false when `path` does not lead to a string, or the string is
/// not a numeric or boolean literal.
pub(crate) fn coerce_at(value: &mut Value, path: &Path) -> bool {
    let mut current = value;
    for segment in path.iter() {
        let next = match (segment, current) {
            (Segment::Map { key }, Value::Object(map)) => map.get_mut(key),
            (Segment::Enum { variant }, Value::Object(map)) => map.get_mut(variant),
            (Segment::Seq { index }, Value::Array(items)) => items.get_mut(*index),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return false,
        }
    }

    let Value::String(text) = current else {
        return false;
    };
    let coerced = coerce_string(text.clone());
    if coerced.is_string() {
        return false;
    }
    *current = coerced;
    true
}

/// Drops `null`s that serialization added for keys absent from `original`.
pub(crate) fn drop_absent_nulls(original: &Value, normalized: Value) -> Value {
    let Value::Object(map) = normalized else {
        return normalized;
    };
    let source = original.as_object();
    Value::Object(
        map.into_iter()
            .filter_map(|(key, value)| match source.and_then(|source| source.get(&key)) {
                None if value.is_null() => None,
                None => Some((key, value)),
                Some(known) => Some((key, drop_absent_nulls(known, value))),
            })
            .collect(),
    )
}

fn coerce_string(text: String) -> Value {
    match text.as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    match text.parse::<f64>() {
        Ok(float) if float.is_finite() => Value::from(float),
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_unknown_fields() {
        let original = json!({"name": " bob ", "extra": 1, "nested": {"a": 1, "b": 2}});
        let normalized = json!({"name": "bob", "nested": {"a": 10}});
        assert_eq!(
            merge_unknown(original, normalized),
            json!({"name": "bob", "extra": 1, "nested": {"a": 10, "b": 2}})
        );
    }

    #[test]
    fn test_merge_replaces_non_objects() {
        assert_eq!(merge_unknown(json!("1"), json!(1)), json!(1));
        assert_eq!(merge_unknown(json!([1, 2]), json!([3])), json!([3]));
    }

    #[test]
    fn test_unknown_keys_reports_nested_paths() {
        let original = json!({"a": 1, "b": {"c": 1, "d": 2}, "e": 3});
        let normalized = json!({"a": 1, "b": {"c": 1}});
        assert_eq!(unknown_keys(&original, &normalized, ""), vec!["b.d", "e"]);
    }

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Filter {
        q: String,
        pages: Vec<u32>,
        exact: bool,
    }

    #[test]
    fn test_coerce_at_only_touches_the_failing_path() {
        let mut value = json!({"q": "2024", "pages": [1, "2"], "exact": "true"});

        let mut converted = Vec::new();
        while let Err(error) = serde_path_to_error::deserialize::<_, Filter>(value.clone()) {
            converted.push(path_to_string(error.path()));
            assert!(coerce_at(&mut value, error.path()));
        }
        converted.sort();

        assert_eq!(converted, vec!["exact", "pages[1]"]);
        assert_eq!(value, json!({"q": "2024", "pages": [1, 2], "exact": true}));
    }

    #[test]
    fn test_coerce_at_rejects_non_literals() {
        let mut value = json!({"q": "abc", "pages": [], "exact": "yes"});
        let error = serde_path_to_error::deserialize::<_, Filter>(value.clone()).unwrap_err();
        assert_eq!(path_to_string(error.path()), "exact");
        assert!(!coerce_at(&mut value, error.path()));
        assert_eq!(value["exact"], json!("yes"));
    }

    #[test]
    fn test_drop_absent_nulls() {
        let original = json!({"a": 1, "b": null, "nested": {"x": 1}});
        let normalized = json!({"a": 1, "b": null, "c": null, "nested": {"x": 1, "y": null}});
        assert_eq!(
            drop_absent_nulls(&original, normalized),
            json!({"a": 1, "b": null, "nested": {"x": 1}})
        );
    }

    #[test]
    fn test_schema_error_message_joins_details() {
        let error = SchemaError::new(vec![
            FieldError::new("name", "\"name\" is required", "required"),
            FieldError::new("age", "\"age\" must be positive", "range"),
        ]);
        assert_eq!(error.message(), "\"name\" is required. \"age\" must be positive");
        assert_eq!(error.details_value()[1]["path"], json!("age"));
    }

    #[test]
    fn test_schema_fn_delegates() {
        let schema = schema_fn(|value, _| {
            if value.get("id").is_some() {
                Ok(value)
            } else {
                Err(SchemaError::new(vec![FieldError::new(
                    "id",
                    "\"id\" is required",
                    "required",
                )]))
            }
        });
        let options = ValidateOptions::default();
        assert!(schema.validate(json!({"id": 1}), &options).is_ok());
        assert!(schema.validate(json!({}), &options).is_err());
    }
}
