//! Realm configuration and the store it is read from.

use crate::error::{Error, ParseConfigSnafu, ReadConfigSnafu};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::path::{Path, PathBuf};

/// Locations of the three credential files and whether the realm is active.
///
/// A TOML rendition looks like:
///
/// ```toml
/// enabled = true
/// htpasswd-file = "/etc/scm/.htpasswd"
/// htgroup-file = "/etc/scm/.htgroup"
/// htmeta-file = "/etc/scm/.htmeta"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HtpasswdConfig {
    /// Whether the realm takes part in authentication at all.
    pub enabled: bool,
    /// `username:hash` lines.
    pub htpasswd_file: PathBuf,
    /// `group: user1 user2 ...` lines.
    pub htgroup_file: PathBuf,
    /// `username:email:display name` lines.
    pub htmeta_file: PathBuf,
}

impl Default for HtpasswdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            htpasswd_file: PathBuf::from("/etc/scm/.htpasswd"),
            htgroup_file: PathBuf::from("/etc/scm/.htgroup"),
            htmeta_file: PathBuf::from("/etc/scm/.htmeta"),
        }
    }
}

impl HtpasswdConfig {
    /// Enabled configuration pointing at the given files.
    pub fn new(
        htpasswd_file: impl Into<PathBuf>,
        htgroup_file: impl Into<PathBuf>,
        htmeta_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            enabled: true,
            htpasswd_file: htpasswd_file.into(),
            htgroup_file: htgroup_file.into(),
            htmeta_file: htmeta_file.into(),
        }
    }

    /// Loads a configuration from a TOML file; missing keys take defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).context(ReadConfigSnafu { path })?;
        toml::from_str(&raw).context(ParseConfigSnafu { path })
    }

    /// All three file paths are set.
    pub fn is_valid(&self) -> bool {
        self.missing_file().is_none()
    }

    /// Name of the first unset file path, if any.
    pub(crate) fn missing_file(&self) -> Option<&'static str> {
        [
            ("htpasswd-file", &self.htpasswd_file),
            ("htgroup-file", &self.htgroup_file),
            ("htmeta-file", &self.htmeta_file),
        ]
        .into_iter()
        .find(|(_, path)| path.as_os_str().is_empty())
        .map(|(name, _)| name)
    }
}

/// Persistent home of the realm configuration, provided by the host.
pub trait ConfigStore: Send + Sync {
    /// Current configuration, the default one if nothing was stored.
    fn get(&self) -> HtpasswdConfig;

    /// Replace the stored configuration.
    fn set(&self, config: HtpasswdConfig);
}

/// [`ConfigStore`] kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    config: RwLock<Option<HtpasswdConfig>>,
}

impl InMemoryConfigStore {
    /// Store pre-filled with `config`.
    pub fn with_config(config: HtpasswdConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
        }
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self) -> HtpasswdConfig {
        self.config.read().clone().unwrap_or_default()
    }

    fn set(&self, config: HtpasswdConfig) {
        *self.config.write() = Some(config);
    }
}
