//! Query string builder
//!
//! Optional scope values are left out of the query entirely when unset, the
//! API treats an empty `orgIdentifier=` differently from a missing one.

/// Ordered list of query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter unconditionally
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.pairs.push((key.to_string(), value.into()));
        self
    }

    /// Add a parameter only when it carries a non-empty value
    pub fn with_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.with(key, v),
            _ => self,
        }
    }

    /// Add a boolean parameter only when set
    pub fn with_bool(self, key: &str, value: Option<bool>) -> Self {
        match value {
            Some(v) => self.with(key, v.to_string()),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Append the parameters to a URL, respecting an existing query string
    pub fn append_to(&self, url: &str) -> String {
        if self.pairs.is_empty() {
            return url.to_string();
        }

        let query = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        if url.contains('?') {
            format!("{}&{}", url, query)
        } else {
            format!("{}?{}", url, query)
        }
    }
}
