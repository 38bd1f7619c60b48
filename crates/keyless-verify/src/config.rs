//! Verifier configuration.
//!
//! Configuration is a TOML file. Resolution order:
//! 1. An explicit path, when one is given
//! 2. The XDG config dir (`~/.config/keyless/config.toml`)
//! 3. The system-wide file (`/etc/keyless/config.toml`)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policy::Policy;

/// Default config file locations, resolved lazily.
static DEFAULT_CONFIG_PATHS: LazyLock<Vec<PathBuf>> = LazyLock::new(|| {
    let mut paths = Vec::new();

    if let Some(dirs) = directories::ProjectDirs::from("dev", "keyless", "keyless") {
        paths.push(dirs.config_dir().join("config.toml"));
    }
    paths.push(PathBuf::from("/etc/keyless/config.toml"));

    paths
});

/// Built-in policy selectable by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Internal consistency only.
    Internal,
    /// PKI-signed calendar authentication record.
    KeyBased,
    /// Publications file, extending to a newer publication if needed.
    PublicationsFile,
    /// User-supplied publication, extending to it if needed.
    UserPublication,
    /// Agreement with the calendar database.
    CalendarBased,
    /// Key-based, falling back to publications file.
    #[default]
    Default,
}

impl PolicyKind {
    /// Every kind, in documentation order.
    pub const ALL: [Self; 6] = [
        Self::Internal,
        Self::KeyBased,
        Self::PublicationsFile,
        Self::UserPublication,
        Self::CalendarBased,
        Self::Default,
    ];

    /// The name used in config files and on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::KeyBased => "key-based",
            Self::PublicationsFile => "publications-file",
            Self::UserPublication => "user-publication",
            Self::CalendarBased => "calendar-based",
            Self::Default => "default",
        }
    }

    /// Build the policy, fallbacks included.
    pub fn policy(self) -> Policy {
        match self {
            Self::Internal => Policy::internal(),
            Self::KeyBased => Policy::key_based(),
            Self::PublicationsFile => Policy::publications_file(),
            Self::UserPublication => Policy::user_publication(),
            Self::CalendarBased => Policy::calendar_based(),
            Self::Default => Policy::default_policy(),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::UnknownPolicy(s.to_owned()))
    }
}

/// Verifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Whether verification may contact the extender.
    pub extending_allowed: bool,
    /// Seconds allowed for each extension request.
    pub extension_timeout_secs: u64,
    /// Policy to verify with.
    pub policy: PolicyKind,
    /// JSON publications file with trusted publications and certificates.
    pub publications_file: Option<PathBuf>,
    /// JSON calendar archive serving extension requests.
    pub calendar_archive: Option<PathBuf>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            extending_allowed: false,
            extension_timeout_secs: 10,
            policy: PolicyKind::Default,
            publications_file: None,
            calendar_archive: None,
        }
    }
}

impl VerifierConfig {
    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, the first existing file
    /// among the default locations is used, or the defaults when none
    /// exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match DEFAULT_CONFIG_PATHS.iter().find(|p| p.is_file()) {
            Some(found) => Self::from_file(found),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Extension timeout as a [`Duration`].
    pub const fn extension_timeout(&self) -> Duration {
        Duration::from_secs(self.extension_timeout_secs)
    }
}
