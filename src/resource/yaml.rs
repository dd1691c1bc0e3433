//! YAML diff suppression

/// Two YAML documents are equal when they parse to the same value. Documents
/// that fail to parse fall back to a whitespace-trimmed string comparison.
pub fn yaml_equivalent(old: &str, new: &str) -> bool {
    if old.trim() == new.trim() {
        return true;
    }
    match (
        serde_yaml::from_str::<serde_yaml::Value>(old),
        serde_yaml::from_str::<serde_yaml::Value>(new),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
