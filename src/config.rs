//! Configuration Management
//!
//! Resolves the provider configuration from CLI flags, environment variables
//! and the persistent config file, in that order.

use crate::harness::auth::{self, ENV_ACCOUNT_ID, ENV_ENDPOINT};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default Harness SaaS gateway
pub const DEFAULT_ENDPOINT: &str = "https://app.harness.io/gateway";

/// Persisted configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub platform_api_key: Option<String>,
}

impl FileConfig {
    /// Get the config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("harness-provider").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults when absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Values given explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub account_id: Option<String>,
}

/// Fully resolved provider configuration
#[derive(Clone, Default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub account_id: Option<String>,
    pub api_key: Option<String>,
    pub platform_api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("account_id", &self.account_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("platform_api_key", &self.platform_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve the effective configuration (CLI > environment > file > default)
    pub fn resolve(overrides: &Overrides, file: &FileConfig) -> Result<Self> {
        Self::resolve_with(overrides, file, |name| std::env::var(name).ok())
    }

    /// Same as [`ProviderConfig::resolve`] with an injectable environment lookup
    pub fn resolve_with(
        overrides: &Overrides,
        file: &FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let pick = |cli: &Option<String>, var: &str, from_file: &Option<String>| {
            cli.clone()
                .or_else(|| env(var))
                .or_else(|| from_file.clone())
                .filter(|v| !v.trim().is_empty())
        };

        let endpoint = pick(&overrides.endpoint, ENV_ENDPOINT, &file.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = validate_endpoint(&endpoint)?;

        let account_id = pick(&overrides.account_id, ENV_ACCOUNT_ID, &file.account_id);
        if let Some(ref id) = account_id {
            if !auth::validate_account_id(id) {
                bail!("Invalid Harness account id: {}", id);
            }
        }

        Ok(Self {
            endpoint,
            account_id,
            api_key: pick(&None, auth::ENV_API_KEY, &file.api_key),
            platform_api_key: pick(&None, auth::ENV_PLATFORM_API_KEY, &file.platform_api_key),
        })
    }
}

/// The endpoint must be an absolute http(s) URL; trailing slashes are dropped
fn validate_endpoint(endpoint: &str) -> Result<String> {
    let parsed = url::Url::parse(endpoint)
        .with_context(|| format!("Invalid Harness endpoint: {}", endpoint))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        bail!("Harness endpoint must use http or https: {}", endpoint);
    }
    Ok(endpoint.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = ProviderConfig::resolve_with(&Overrides::default(), &FileConfig::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert!(cfg.account_id.is_none());
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let file = FileConfig {
            account_id: Some("fromfile".into()),
            endpoint: Some("https://file.example/gateway".into()),
            ..Default::default()
        };
        let env = env_of(&[(ENV_ACCOUNT_ID, "fromenv")]);
        let overrides = Overrides {
            endpoint: Some("https://cli.example/gateway/".into()),
            account_id: None,
        };

        let cfg = ProviderConfig::resolve_with(&overrides, &file, env).unwrap();
        assert_eq!(cfg.endpoint, "https://cli.example/gateway");
        assert_eq!(cfg.account_id.as_deref(), Some("fromenv"));
    }

    #[test]
    fn test_keys_from_env() {
        let env = env_of(&[
            (auth::ENV_API_KEY, "classic"),
            (auth::ENV_PLATFORM_API_KEY, "pat.x"),
        ]);
        let cfg = ProviderConfig::resolve_with(&Overrides::default(), &FileConfig::default(), env).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("classic"));
        assert_eq!(cfg.platform_api_key.as_deref(), Some("pat.x"));
        assert!(!format!("{cfg:?}").contains("pat.x"));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let overrides = Overrides {
            endpoint: Some("ftp://example".into()),
            account_id: None,
        };
        assert!(ProviderConfig::resolve_with(&overrides, &FileConfig::default(), env_of(&[])).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let file = FileConfig {
            account_id: Some("acc".into()),
            ..Default::default()
        };
        file.save(&path).unwrap();

        let loaded = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.account_id.as_deref(), Some("acc"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = FileConfig::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert!(loaded.endpoint.is_none());
    }
}
