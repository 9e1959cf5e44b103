//! Runtime configuration file.
//!
//! ```toml
//! [resolver]
//! search_roots = ["lib", "/opt/warden/modules"]
//! allow_current_dir = false
//! probe_timeout_ms = 250
//!
//! [policy]
//! grants = ["execute:calculations"]
//! ```
//!
//! Relative search roots in a file loaded with [`WardenConfig::from_file`]
//! are resolved against the file's directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use warden_capability::CapabilitySet;
use warden_resolver::ResolverConfig;

use crate::WardenError;

/// The `[resolver]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSection {
    /// Search roots, in priority order.
    pub search_roots: Vec<PathBuf>,
    /// Whether the current directory is probed after the search roots.
    pub allow_current_dir: bool,
    /// Probing budget per import, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout_ms: Option<u64>,
}

/// The `[policy]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicySection {
    /// Capabilities granted to contexts created from the policy.
    pub grants: Vec<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    /// Import resolution defaults.
    pub resolver: ResolverSection,
    /// Capability policy.
    pub policy: PolicySection,
}

impl WardenConfig {
    /// Parse a configuration from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, WardenError> {
        toml::from_str(s).map_err(|e| WardenError::Config(e.to_string()))
    }

    /// Read a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, WardenError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WardenError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&contents)?;

        if let Some(base) = path.parent() {
            for root in &mut config.resolver.search_roots {
                if root.is_relative() {
                    *root = base.join(&*root);
                }
            }
        }
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, WardenError> {
        toml::to_string_pretty(self).map_err(|e| WardenError::Config(e.to_string()))
    }

    /// Resolver defaults described by the `[resolver]` section.
    pub fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::new().with_current_dir(self.resolver.allow_current_dir);
        for root in &self.resolver.search_roots {
            config = config.with_search_root(root.clone());
        }
        if let Some(ms) = self.resolver.probe_timeout_ms {
            config = config.with_probe_timeout(Duration::from_millis(ms));
        }
        config
    }

    /// The policy grants, validated.
    pub fn grants(&self) -> Result<CapabilitySet, WardenError> {
        Ok(CapabilitySet::from_tokens(&self.policy.grants)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[resolver]
search_roots = ["lib", "/opt/modules"]
allow_current_dir = true
probe_timeout_ms = 250

[policy]
grants = ["execute:calculations"]
"#;

    #[test]
    fn test_parse() {
        let config = WardenConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(config.resolver.search_roots.len(), 2);
        assert!(config.resolver.allow_current_dir);

        let resolver = config.resolver_config();
        assert_eq!(resolver.probe_timeout, Some(Duration::from_millis(250)));
        assert!(resolver.allow_current_dir);
        assert_eq!(config.grants().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(WardenConfig::from_toml_str("").unwrap(), WardenConfig::default());
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_grants() {
        assert!(matches!(
            WardenConfig::from_toml_str("[resolver]\nroots = []\n"),
            Err(WardenError::Config(_))
        ));

        let config = WardenConfig::from_toml_str("[policy]\ngrants = [\"execute:*\"]\n").unwrap();
        assert!(matches!(config.grants(), Err(WardenError::Capability(_))));
    }

    #[test]
    fn test_relative_roots_follow_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("warden.toml");
        std::fs::write(&file, CONFIG).unwrap();

        let config = WardenConfig::from_file(&file).unwrap();
        assert_eq!(config.resolver.search_roots[0], dir.path().join("lib"));
        assert_eq!(config.resolver.search_roots[1], PathBuf::from("/opt/modules"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = WardenConfig::from_toml_str(CONFIG).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(WardenConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
