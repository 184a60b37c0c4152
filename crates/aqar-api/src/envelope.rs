//! Typed decoding of the backend's `{ success, data, message, errors }`
//! envelope.
//!
//! The decoder splits a JSON body into its metadata and its payload. The
//! payload is the `data` member when the key is present (even when `null`),
//! otherwise the whole body. Bodies that are not objects are payload-only.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ApiError, FieldErrors, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// `Some(false)` marks a failure even on a 2xx status.
    pub success: Option<bool>,
    pub message: Option<String>,
    pub details: Option<FieldErrors>,
    pub payload: Value,
}

impl Envelope {
    pub fn from_value(body: Value) -> Self {
        let Value::Object(mut map) = body else {
            return Self {
                success: None,
                message: None,
                details: None,
                payload: body,
            };
        };

        let success = map.get("success").and_then(Value::as_bool);
        let message = text_field(&map, "message").or_else(|| text_field(&map, "error"));
        let details = map
            .get("errors")
            .and_then(parse_field_errors)
            .or_else(|| map.get("details").and_then(parse_field_errors));

        let payload = match map.remove("data") {
            Some(data) => data,
            None => Value::Object(map),
        };

        Self {
            success,
            message,
            details,
            payload,
        }
    }

    /// Apply the status/`success` rules and decode the payload into `T`.
    pub fn into_result<T: DeserializeOwned>(self, status: u16) -> Result<T> {
        let payload = self.into_payload(status)?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Apply the status/`success` rules and return the raw payload.
    pub fn into_payload(self, status: u16) -> Result<Value> {
        let ok = (200..300).contains(&status);
        if !ok || self.success == Some(false) {
            return Err(ApiError::Api {
                status,
                message: self
                    .message
                    .unwrap_or_else(|| format!("Request failed with status {status}")),
                details: self.details,
            });
        }
        Ok(self.payload)
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Null | Value::String(_) | Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

/// Accepts `{ field: ["msg", …] }` and the lax `{ field: "msg" }`.
fn parse_field_errors(value: &Value) -> Option<FieldErrors> {
    let map = value.as_object()?;
    let mut out = FieldErrors::new();
    for (field, messages) in map {
        let list = match messages {
            Value::Array(items) => items
                .iter()
                .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                .collect(),
            Value::String(s) => vec![s.clone()],
            other => vec![other.to_string()],
        };
        out.insert(field.clone(), list);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Blog {
        id: u32,
    }

    #[test]
    fn unwraps_data_member() {
        let env = Envelope::from_value(json!({ "success": true, "data": { "id": 4 } }));
        assert_eq!(env.into_result::<Blog>(200).unwrap(), Blog { id: 4 });
    }

    #[test]
    fn whole_body_without_data_member() {
        let env = Envelope::from_value(json!({ "id": 9, "success": true }));
        assert_eq!(env.into_result::<Blog>(200).unwrap(), Blog { id: 9 });
    }

    #[test]
    fn null_data_is_still_the_payload() {
        let env = Envelope::from_value(json!({ "success": true, "data": null }));
        assert_eq!(env.into_result::<Option<Blog>>(200).unwrap(), None);
    }

    #[test]
    fn array_body_is_payload() {
        let env = Envelope::from_value(json!([{ "id": 1 }, { "id": 2 }]));
        assert_eq!(env.into_result::<Vec<Blog>>(200).unwrap().len(), 2);
    }

    #[test]
    fn success_false_on_2xx_is_an_error() {
        let env = Envelope::from_value(json!({ "success": false, "message": "Already exists" }));
        match env.into_result::<Value>(200) {
            Err(ApiError::Api { status, message, details }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "Already exists");
                assert!(details.is_none());
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn message_falls_back_to_error_then_generic() {
        let env = Envelope::from_value(json!({ "error": "boom" }));
        assert_eq!(env.into_result::<Value>(500).unwrap_err().to_string(), "boom");

        let env = Envelope::from_value(json!({ "message": "" }));
        assert_eq!(
            env.into_result::<Value>(503).unwrap_err().to_string(),
            "Request failed with status 503"
        );
    }

    #[test]
    fn validation_details_from_errors_or_details() {
        let env = Envelope::from_value(json!({
            "message": "The given data was invalid.",
            "errors": { "email": ["taken", "invalid"], "name": "required" }
        }));
        let err = env.into_result::<Value>(422).unwrap_err();
        assert!(err.is_validation());
        let fields = err.field_errors().unwrap();
        assert_eq!(fields["email"], vec!["taken", "invalid"]);
        assert_eq!(fields["name"], vec!["required"]);

        let env = Envelope::from_value(json!({ "details": { "phone": ["bad"] } }));
        let err = env.into_result::<Value>(400).unwrap_err();
        assert_eq!(err.field_errors().unwrap()["phone"], vec!["bad"]);
    }

    #[test]
    fn shape_mismatch_fails_loudly() {
        let env = Envelope::from_value(json!({ "data": { "id": "not-a-number" } }));
        assert!(matches!(env.into_result::<Blog>(200), Err(ApiError::Decode(_))));
    }
}
