//! Query-string parameters with the backend's omission rule: empty strings
//! and nulls are dropped, everything else is stringified and URL-encoded.

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, Value)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. `Option::None` becomes null and is omitted.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert, logging and omitting values that fail to serialize.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        let key = key.into();
        if let Err(e) = self.try_insert(key.clone(), value) {
            tracing::warn!(key = %key, error = %e, "Query parameter not serializable, omitted");
        }
    }

    pub fn try_insert(&mut self, key: impl Into<String>, value: impl Serialize) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.pairs.push((key.into(), value));
        Ok(())
    }

    /// Take the fields of any serializable struct or map, in order.
    pub fn from_serializable<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        let mut params = Self::new();
        if let Value::Object(map) = serde_json::to_value(value)? {
            for (key, value) in map {
                params.pairs.push((key, value));
            }
        }
        Ok(params)
    }

    /// The pairs that survive the omission rule, stringified.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.pairs
            .iter()
            .filter_map(|(key, value)| stringify(value).map(|v| (key.clone(), v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Append the surviving pairs to `url`'s query string. A URL with no
    /// surviving pairs is left without a `?`.
    pub fn apply_to(&self, url: &mut Url) {
        let pairs = self.to_pairs();
        if pairs.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| stringify(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_empty_and_null() {
        let params = QueryParams::new()
            .with("page", 2)
            .with("q", "")
            .with("city", Option::<String>::None)
            .with("furnished", false)
            .with("type", "villa");

        assert_eq!(
            params.to_pairs(),
            vec![
                ("page".to_string(), "2".to_string()),
                ("furnished".to_string(), "false".to_string()),
                ("type".to_string(), "villa".to_string()),
            ]
        );
    }

    #[test]
    fn encodes_into_url() {
        let mut url = Url::parse("https://api.example.com/properties").unwrap();
        QueryParams::new()
            .with("q", "شقة & فيلا")
            .with("ids", vec![1, 2])
            .with("empty", "")
            .apply_to(&mut url);

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "شقة & فيلا".to_string()),
                ("ids".to_string(), "1,2".to_string()),
            ]
        );
        assert!(!url.as_str().contains("empty"));
    }

    #[test]
    fn all_omitted_leaves_no_question_mark() {
        let mut url = Url::parse("https://api.example.com/blogs").unwrap();
        let params = QueryParams::new().with("q", "").with("tag", Option::<u8>::None);
        assert!(params.is_empty());
        params.apply_to(&mut url);
        assert_eq!(url.as_str(), "https://api.example.com/blogs");
    }

    #[test]
    fn unserializable_values_are_reported() {
        use std::collections::BTreeMap;

        let mut bad = BTreeMap::new();
        bad.insert((1, 2), "tuple keys are not JSON");

        let mut params = QueryParams::new().with("page", 1);
        assert!(params.try_insert("bounds", &bad).is_err());

        params.insert("bounds", &bad);
        assert_eq!(params.to_pairs(), vec![("page".to_string(), "1".to_string())]);
    }

    #[test]
    fn from_struct_fields() {
        #[derive(Serialize)]
        struct Filter {
            per_page: u32,
            page: u32,
            sort: Option<String>,
        }
        let params = QueryParams::from_serializable(&Filter {
            per_page: 20,
            page: 1,
            sort: None,
        })
        .unwrap();
        let keys: Vec<String> = params.to_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"per_page".to_string()));
        assert!(keys.contains(&"page".to_string()));
    }
}
