//! Tag conversion between `key:value` strings and the API's tag map

use std::collections::BTreeMap;

/// `["env:prod", "team"]` becomes `{env: prod, team: ""}`. Only the first
/// colon separates key and value.
pub fn expand_tags<S: AsRef<str>>(tags: &[S]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|t| match t.as_ref().split_once(':') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (t.as_ref().to_string(), String::new()),
        })
        .collect()
}

/// Inverse of [`expand_tags`], sorted by key
pub fn flatten_tags(tags: &BTreeMap<String, String>) -> Vec<String> {
    tags.iter().map(|(k, v)| format!("{}:{}", k, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        let tags = expand_tags(&["env:prod", "team", "url:http://x"]);
        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["team"], "");
        assert_eq!(tags["url"], "http://x");
    }

    #[test]
    fn test_flatten_sorted() {
        let mut tags = BTreeMap::new();
        tags.insert("b".to_string(), "2".to_string());
        tags.insert("a".to_string(), "".to_string());
        assert_eq!(flatten_tags(&tags), vec!["a:", "b:2"]);
    }
}
