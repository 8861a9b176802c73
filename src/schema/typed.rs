use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use validator::Validate;

use super::{
    FieldError, Schema, SchemaError, ValidateOptions, coerce_at, drop_absent_nulls, merge_unknown,
    path_to_string, unknown_keys,
};

/// Schema backed by a serde type with `validator` constraints.
///
/// The value is deserialized into `T` (serde defaults, renames and
/// `deserialize_with` all apply), checked with [`Validate`], then serialized
/// back as the normalized value. Keys that were absent from the input and
/// serialize to `null` (an `Option` left at `None`) stay absent.
///
/// With [`ValidateOptions::convert`], only strings at the paths serde rejects
/// are converted, so a numeric string in a `String` field is kept as is.
///
/// # Example
/// ```ignore
/// #[derive(Deserialize, Serialize, Validate)]
/// struct CreateUser {
///     #[validate(length(min = 3, max = 20))]
///     username: String,
/// }
///
/// RouteOptions::new().validate_body(TypedSchema::<CreateUser>::new())
/// ```
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypedSchema<T>
where
    T: DeserializeOwned,
{
    /// Deserializes `value`, converting one rejected string per attempt.
    ///
    /// Each conversion turns a string into a scalar, so the loop ends once no
    /// rejected path holds a convertible string. A failure at a converted path
    /// reports the error seen before conversion.
    fn shape(value: &Value, options: &ValidateOptions) -> Result<T, SchemaError> {
        let mut candidate = value.clone();
        let mut converted: Vec<(String, SchemaError)> = Vec::new();
        loop {
            let error = match serde_path_to_error::deserialize::<_, T>(candidate.clone()) {
                Ok(parsed) => return Ok(parsed),
                Err(error) => error,
            };
            let at = path_to_string(error.path());
            let shape_error = SchemaError::shape_at(at.as_str(), error.inner());

            if options.convert && coerce_at(&mut candidate, error.path()) {
                converted.push((at, shape_error));
                continue;
            }

            let first = converted
                .into_iter()
                .find(|(path, _)| *path == at)
                .map(|(_, original)| original);
            return Err(first.unwrap_or(shape_error));
        }
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + Validate + 'static,
{
    fn validate(&self, value: Value, options: &ValidateOptions) -> Result<Value, SchemaError> {
        let parsed = Self::shape(&value, options)?;
        parsed.validate()?;
        let normalized = serde_json::to_value(&parsed).map_err(|error| SchemaError::shape(&error))?;
        let normalized = drop_absent_nulls(&value, normalized);

        if !options.allow_unknown {
            let unknown = unknown_keys(&value, &normalized, "");
            if !unknown.is_empty() {
                return Err(SchemaError::new(
                    unknown
                        .into_iter()
                        .map(|path| {
                            let message = format!("\"{path}\" is not allowed");
                            FieldError::new(path, message, "unknown")
                        })
                        .collect(),
                ));
            }
        }

        if options.strip_unknown {
            Ok(normalized)
        } else {
            Ok(merge_unknown(value, normalized))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, Serialize, Validate)]
    struct Signup {
        #[validate(length(
            min = 3,
            max = 20,
            message = "Username must be between 3 and 20 characters"
        ))]
        username: String,
        #[validate(email(message = "Invalid email format"))]
        email: String,
        #[serde(default)]
        newsletter: bool,
    }

    #[derive(Debug, Deserialize, Serialize, Validate)]
    struct Paging {
        #[validate(range(min = 1, max = 100))]
        limit: u32,
    }

    #[derive(Debug, Deserialize, Serialize, Validate)]
    struct Search {
        q: String,
        page: u32,
        tags: Option<Vec<u32>>,
        #[serde(default)]
        sort: Option<String>,
    }

    #[test]
    fn test_valid_value_is_normalized_and_keeps_unknown() {
        let schema = TypedSchema::<Signup>::new();
        let value = json!({"username": "testuser", "email": "test@example.com", "referrer": "ad"});
        let normalized = schema.validate(value, &ValidateOptions::default()).unwrap();
        assert_eq!(
            normalized,
            json!({
                "username": "testuser",
                "email": "test@example.com",
                "newsletter": false,
                "referrer": "ad"
            })
        );
    }

    #[test]
    fn test_constraint_failures_are_reported_per_field() {
        let schema = TypedSchema::<Signup>::new();
        let value = json!({"username": "ab", "email": "invalid-email"});
        let error = schema.validate(value, &ValidateOptions::default()).unwrap_err();
        let paths: Vec<&str> = error.details().iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["email", "username"]);
        assert!(error.message().contains("Invalid email format"));
        assert!(error.message().contains("between 3 and 20 characters"));
    }

    #[test]
    fn test_missing_field_is_a_shape_error() {
        let schema = TypedSchema::<Signup>::new();
        let error = schema
            .validate(json!({"username": "testuser"}), &ValidateOptions::default())
            .unwrap_err();
        assert_eq!(error.details()[0].kind, "type");
        assert!(error.message().contains("email"));
    }

    #[test]
    fn test_convert_coerces_query_strings() {
        let schema = TypedSchema::<Paging>::new();
        let normalized = schema
            .validate(json!({"limit": "25"}), &ValidateOptions::default())
            .unwrap();
        assert_eq!(normalized, json!({"limit": 25}));
    }

    #[test]
    fn test_convert_disabled_rejects_strings() {
        let schema = TypedSchema::<Paging>::new();
        let options = ValidateOptions::lenient(false);
        assert!(schema.validate(json!({"limit": "25"}), &options).is_err());
    }

    #[test]
    fn test_strict_options_reject_and_strip_unknown() {
        let schema = TypedSchema::<Paging>::new();
        let strict = ValidateOptions {
            allow_unknown: false,
            strip_unknown: false,
            convert: true,
        };
        let error = schema.validate(json!({"limit": 5, "debug": true}), &strict).unwrap_err();
        assert_eq!(error.message(), "\"debug\" is not allowed");

        let strip = ValidateOptions {
            strip_unknown: true,
            ..ValidateOptions::default()
        };
        let normalized = schema.validate(json!({"limit": 5, "debug": true}), &strip).unwrap();
        assert_eq!(normalized, json!({"limit": 5}));
    }

    #[test]
    fn test_convert_leaves_numeric_strings_in_string_fields() {
        let schema = TypedSchema::<Search>::new();
        let normalized = schema
            .validate(json!({"q": "2024", "page": "2"}), &ValidateOptions::default())
            .unwrap();
        assert_eq!(normalized, json!({"q": "2024", "page": 2}));
    }

    #[test]
    fn test_convert_reaches_array_items() {
        let schema = TypedSchema::<Search>::new();
        let normalized = schema
            .validate(
                json!({"q": "x", "page": 1, "tags": ["1", 2, "3"]}),
                &ValidateOptions::default(),
            )
            .unwrap();
        assert_eq!(normalized["tags"], json!([1, 2, 3]));
    }

    #[test]
    fn test_unconvertible_string_reports_its_path() {
        let schema = TypedSchema::<Search>::new();
        let error = schema
            .validate(json!({"q": "x", "page": "two"}), &ValidateOptions::default())
            .unwrap_err();
        assert_eq!(error.details()[0].path, "page");
        assert_eq!(error.details()[0].kind, "type");
    }

    #[test]
    fn test_absent_options_stay_absent() {
        let schema = TypedSchema::<Search>::new();
        let normalized = schema
            .validate(json!({"q": "x", "page": 1}), &ValidateOptions::default())
            .unwrap();
        assert_eq!(normalized, json!({"q": "x", "page": 1}));

        let normalized = schema
            .validate(json!({"q": "x", "page": 1, "sort": null}), &ValidateOptions::default())
            .unwrap();
        assert_eq!(normalized, json!({"q": "x", "page": 1, "sort": null}));
    }
}
