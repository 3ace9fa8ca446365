use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// Name of the project config file at the repository root.
pub const CONFIG_FILE: &str = ".srcref.toml";

/// Environment variable that overrides `remote.base_url`.
pub const API_URL_ENV: &str = "SRCREF_API_URL";

/// Project configuration loaded from `.srcref.toml`.
/// Every section is optional; missing keys take the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// External configure/make commands and the build lock.
    pub build: BuildConfig,
    /// Remote definition and example service.
    pub remote: RemoteConfig,
    /// Repository identity overrides.
    pub repository: RepositoryConfig,
    /// Artifact store location.
    pub store: StoreConfig,
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Program and arguments of the configure step.
    pub configure: Vec<String>,
    /// Seconds to wait for another process building the same commit.
    pub lock_timeout_secs: u64,
    /// Program and arguments of the make step.
    pub make: Vec<String>,
}

/// `[remote]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Base URL of the API, with a trailing slash.
    pub base_url: String,
    /// Page size for usage examples.
    pub examples_per_page: u32,
    /// Never fetch usage examples, as if `--no-examples` were always passed.
    pub no_examples: bool,
    /// Per-request deadline in seconds.
    pub timeout_secs: u64,
}

/// `[repository]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Pin the commit id instead of deriving it from the working tree.
    pub commit: Option<String>,
    /// Repository identifier, e.g. `github.com/owner/name`.
    pub uri: Option<String>,
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Store directory, relative to the repository root.
    pub dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        return Self {
            configure: vec!["srclib".to_string(), "config".to_string()],
            lock_timeout_secs: 600,
            make: vec!["srclib".to_string(), "make".to_string()],
        };
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        return Self {
            base_url: "https://sourcegraph.com/api/".to_string(),
            examples_per_page: 4,
            no_examples: false,
            timeout_secs: 30,
        };
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        return Self { dir: ".srclib-cache".to_string() };
    }
}

impl Config {
    /// Load config from `.srcref.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; never silently
    /// falls back to defaults when the user wrote a config file.
    /// A non-empty `SRCREF_API_URL` replaces `remote.base_url` in both cases.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        return Self::load_with_api_url(root, std::env::var(API_URL_ENV).ok());
    }

    /// `load`, with the API URL override passed in instead of read from the environment.
    ///
    /// # Errors
    ///
    /// Same as `load`.
    fn load_with_api_url(root: &Path, api_url: Option<String>) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let mut config: Self = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(Error::Io(e)),
            Ok(content) => toml::from_str(&content)?,
        };

        if let Some(url) = api_url.filter(|url| return !url.is_empty()) {
            config.remote.base_url = url;
        }
        return Ok(config);
    }
}

impl BuildConfig {
    /// How long to wait for a concurrent build of the same commit.
    pub const fn lock_timeout(&self) -> Duration {
        return Duration::from_secs(self.lock_timeout_secs);
    }
}

impl RemoteConfig {
    /// Per-request deadline for the remote service.
    pub const fn timeout(&self) -> Duration {
        return Duration::from_secs(self.timeout_secs);
    }
}
