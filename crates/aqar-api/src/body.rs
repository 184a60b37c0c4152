//! Request bodies: JSON text or multipart form data.
//!
//! [`FormData`] mirrors the browser's form object: an ordered list of text
//! and file fields that is only turned into a transport-level multipart
//! form when the request is sent.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(FormData),
}

impl RequestBody {
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(RequestBody::Json(serde_json::to_value(value)?))
    }

    /// `{}`, for endpoints that want a JSON body with nothing in it.
    pub fn empty_object() -> Self {
        RequestBody::Json(Value::Object(Map::new()))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<FormData> for RequestBody {
    fn from(form: FormData) -> Self {
        RequestBody::Multipart(form)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((name.into(), FormValue::Text(value.to_string())));
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: FilePart) -> Self {
        self.fields.push((name.into(), FormValue::File(file)));
        self
    }

    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|(n, v)| match v {
            FormValue::Text(t) if n == name => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Coerce a JSON object into form fields. Nulls are skipped, arrays
    /// become indexed `key[i]` fields, nested objects become a JSON string,
    /// scalars their string form.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let mut form = Self::new();
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        form = form.text(format!("{key}[{index}]"), scalar_text(item));
                    }
                }
                Value::Object(_) => form = form.text(key.clone(), value.to_string()),
                _ => form = form.text(key.clone(), scalar_text(value)),
            }
        }
        form
    }

    /// Serialize any struct into form fields via [`FormData::from_json`].
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self::from_json(&map)),
            other => Err(ApiError::InvalidRequest(format!(
                "form data must come from an object, got {other}"
            ))),
        }
    }

    /// Build the transport form. The multipart boundary and content type
    /// are chosen by the transport.
    pub fn into_multipart(self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = match value {
                FormValue::Text(text) => form.text(name, text),
                FormValue::File(file) => {
                    let mut part = Part::bytes(file.bytes.to_vec()).file_name(file.file_name);
                    if let Some(mime) = file.mime {
                        part = part.mime_str(&mime).map_err(|e| {
                            ApiError::InvalidRequest(format!("invalid mime type {mime}: {e}"))
                        })?;
                    }
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_coercion_rules() {
        let value = json!({
            "title": "Villa",
            "rooms": 4,
            "features": ["pool", "garden"],
            "location": { "lat": 24.7, "lng": 46.6 },
            "notes": null
        });
        let form = FormData::from_json(value.as_object().unwrap());

        assert_eq!(form.get_text("title"), Some("Villa"));
        assert_eq!(form.get_text("rooms"), Some("4"));
        assert_eq!(form.get_text("features[0]"), Some("pool"));
        assert_eq!(form.get_text("features[1]"), Some("garden"));
        assert_eq!(form.get_text("location"), Some(r#"{"lat":24.7,"lng":46.6}"#));
        assert_eq!(form.get_text("notes"), None);
        assert_eq!(form.len(), 5);
    }

    #[test]
    fn files_and_text_in_order() {
        let form = FormData::new()
            .text("message", "hi")
            .file("image", FilePart::new("a.jpg", vec![1u8, 2, 3]).with_mime("image/jpeg"));
        assert!(matches!(&form.fields()[1].1, FormValue::File(f) if f.file_name == "a.jpg"));
        assert!(form.into_multipart().is_ok());
    }

    #[test]
    fn invalid_mime_is_rejected() {
        let form = FormData::new().file("image", FilePart::new("a", vec![0u8]).with_mime("not a mime"));
        assert!(matches!(form.into_multipart(), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn non_object_cannot_become_form() {
        assert!(FormData::from_serializable(&vec![1, 2]).is_err());
    }

    #[test]
    fn body_kinds() {
        assert!(RequestBody::from(FormData::new()).is_multipart());
        assert!(!RequestBody::from(json!({"a": 1})).is_multipart());
        assert!(matches!(RequestBody::empty_object(), RequestBody::Json(Value::Object(m)) if m.is_empty()));
    }
}
