//! Service configuration
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `CAPSTORE_*` environment variables
//! 4. command line flags
//!
//! ```toml
//! prefix = "/objects/"
//! http_addr = "0.0.0.0:20080"
//! data_dir = "/var/lib/capstore"
//! location = "https://capstore.example"
//! action_scheme = "operation"
//! max_object_size = 16777216
//! ```

use capstore_authorization::ActionScheme;
use capstore_core::{CapstoreError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "CAPSTORE_";

/// Default listen address
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:20080";

/// Default upper bound on a stored object, in bytes
pub const DEFAULT_MAX_OBJECT_SIZE: usize = 16 * 1024 * 1024;

/// Runtime settings of one capstore process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Path prefix the routes are mounted under
    pub prefix: String,
    /// Address the HTTP listener binds to
    pub http_addr: String,
    /// Directory for persistent storage; in-memory storage when unset
    pub data_dir: Option<PathBuf>,
    /// Location label stamped on minted tokens
    pub location: String,
    /// Which caveat kind restricts the allowed action
    pub action_scheme: ActionScheme,
    /// Largest accepted request body, in bytes
    pub max_object_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            data_dir: None,
            location: String::new(),
            action_scheme: ActionScheme::default(),
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Load settings from a TOML file; keys it omits keep their defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CapstoreError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| CapstoreError::config(format!("invalid {}: {e}", path.display())))
    }

    /// Apply `CAPSTORE_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `CAPSTORE_*` overrides from `vars`; other names are ignored
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            if let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) {
                self.set_from_string(name, value.into())?;
            }
        }
        Ok(())
    }

    /// Set one setting by its environment name without the prefix
    fn set_from_string(&mut self, name: &str, value: String) -> Result<()> {
        match name {
            "PREFIX" => self.prefix = value,
            "HTTP_ADDR" => self.http_addr = value,
            "DATA_DIR" => {
                self.data_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "LOCATION" => self.location = value,
            "ACTION_SCHEME" => {
                self.action_scheme = value.parse().map_err(CapstoreError::config)?;
            }
            "MAX_OBJECT_SIZE" => {
                self.max_object_size = value.trim().parse().map_err(|e| {
                    CapstoreError::config(format!("{ENV_PREFIX}MAX_OBJECT_SIZE {value:?}: {e}"))
                })?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Reject settings the service cannot start with
    pub fn validate(&self) -> Result<()> {
        if !self.prefix.starts_with('/') {
            return Err(CapstoreError::config(format!(
                "prefix {:?} must start with '/'",
                self.prefix
            )));
        }
        if self.prefix.contains(':') || self.prefix.contains('*') {
            return Err(CapstoreError::config(format!(
                "prefix {:?} must not contain route parameters",
                self.prefix
            )));
        }
        self.socket_addr()?;
        if self.max_object_size == 0 {
            return Err(CapstoreError::config("max_object_size must be positive"));
        }
        Ok(())
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.http_addr.parse().map_err(|e| {
            CapstoreError::config(format!("invalid http_addr {:?}: {e}", self.http_addr))
        })
    }

    /// Route prefix ending in exactly one `/`
    pub fn normalized_prefix(&self) -> String {
        format!("{}/", self.prefix.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServiceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.normalized_prefix(), "/");
        assert_eq!(config.socket_addr().unwrap().port(), 20080);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capstore.toml");
        std::fs::write(
            &path,
            "prefix = \"/objects\"\naction_scheme = \"method\"\ndata_dir = \"/srv/capstore\"\n",
        )
        .unwrap();

        let config = ServiceConfig::load_from_file(&path).unwrap();
        assert_eq!(config.prefix, "/objects");
        assert_eq!(config.action_scheme, ActionScheme::Method);
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/capstore")));
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert_eq!(config.max_object_size, DEFAULT_MAX_OBJECT_SIZE);
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capstore.toml");
        std::fs::write(&path, "prefx = \"/typo\"\n").unwrap();

        assert!(matches!(
            ServiceConfig::load_from_file(&path),
            Err(CapstoreError::Config { .. })
        ));
    }

    #[test]
    fn environment_overrides_apply() {
        let mut config = ServiceConfig::default();
        config
            .merge_with_vars([
                ("CAPSTORE_PREFIX", "/v1/"),
                ("CAPSTORE_HTTP_ADDR", "0.0.0.0:8080"),
                ("CAPSTORE_DATA_DIR", "/tmp/capstore"),
                ("CAPSTORE_LOCATION", "https://capstore.example"),
                ("CAPSTORE_ACTION_SCHEME", "METHOD"),
                ("CAPSTORE_MAX_OBJECT_SIZE", "1024"),
                ("HOME", "/root"),
            ])
            .unwrap();

        assert_eq!(config.prefix, "/v1/");
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/capstore")));
        assert_eq!(config.location, "https://capstore.example");
        assert_eq!(config.action_scheme, ActionScheme::Method);
        assert_eq!(config.max_object_size, 1024);
    }

    #[test]
    fn empty_data_dir_selects_memory() {
        let mut config = ServiceConfig {
            data_dir: Some(PathBuf::from("/srv")),
            ..ServiceConfig::default()
        };
        config.merge_with_vars([("CAPSTORE_DATA_DIR", "")]).unwrap();
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn bad_environment_values_are_errors() {
        let mut config = ServiceConfig::default();
        assert!(config
            .merge_with_vars([("CAPSTORE_ACTION_SCHEME", "verb")])
            .is_err());
        assert!(config
            .merge_with_vars([("CAPSTORE_MAX_OBJECT_SIZE", "lots")])
            .is_err());
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let bad = [
            ServiceConfig {
                prefix: "objects/".to_string(),
                ..ServiceConfig::default()
            },
            ServiceConfig {
                prefix: "/:object/".to_string(),
                ..ServiceConfig::default()
            },
            ServiceConfig {
                http_addr: "localhost".to_string(),
                ..ServiceConfig::default()
            },
            ServiceConfig {
                max_object_size: 0,
                ..ServiceConfig::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn prefix_normalization() {
        for (prefix, expected) in [
            ("/", "/"),
            ("/objects", "/objects/"),
            ("/objects//", "/objects/"),
        ] {
            let config = ServiceConfig {
                prefix: prefix.to_string(),
                ..ServiceConfig::default()
            };
            assert_eq!(config.normalized_prefix(), expected);
        }
    }
}
