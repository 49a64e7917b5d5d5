//! Configuration for the remote origin and the local cache directory
//!
//! Defaults reproduce the fixed locations:
//! - origin: `https://github.com/scunning1975/mixtape/raw/master/`
//! - cache: `~/.cache/mixtape-causalpy/`
//!
//! Values are injected at construction; nothing is read from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MixtapeError, Result};

/// Base URL of the Mixtape repository's raw files
pub const MIXTAPE_BASE_URL: &str = "https://github.com/scunning1975/mixtape/raw/master/";

/// Extension of the serialized cache form written after a fetch
pub const SNAPSHOT_EXTENSION: &str = "bin";

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Prefix that filenames are appended to (plain concatenation)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory holding cached datasets
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_base_url() -> String {
    MIXTAPE_BASE_URL.to_string()
}

fn default_cache_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".cache").join("mixtape-causalpy")
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl LoaderConfig {
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Parse a TOML document; missing keys fall back to the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MixtapeError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load_file(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| MixtapeError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Remote URL for a filename
    pub fn url_for(&self, filename: &str) -> String {
        format!("{}{}", self.base_url, filename)
    }

    /// Path checked before fetching (the original filename)
    pub fn cache_path(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    /// Path the serialized copy is written to after a fetch
    pub fn snapshot_path(&self, filename: &str) -> PathBuf {
        self.cache_path(filename).with_extension(SNAPSHOT_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_mixtape() {
        let config = LoaderConfig::default();
        assert_eq!(config.base_url, MIXTAPE_BASE_URL);
        assert!(config.cache_dir.ends_with(".cache/mixtape-causalpy"));
    }

    #[test]
    fn test_url_is_plain_concatenation() {
        let config = LoaderConfig::new("http://127.0.0.1:9000/raw/", "/tmp/c");
        assert_eq!(
            config.url_for("lmb-data.dta"),
            "http://127.0.0.1:9000/raw/lmb-data.dta"
        );
    }

    #[test]
    fn test_cache_and_snapshot_paths_differ() {
        let config = LoaderConfig::new(MIXTAPE_BASE_URL, "/tmp/c");
        assert_eq!(
            config.cache_path("lmb-data.dta"),
            PathBuf::from("/tmp/c/lmb-data.dta")
        );
        assert_eq!(
            config.snapshot_path("lmb-data.dta"),
            PathBuf::from("/tmp/c/lmb-data.bin")
        );
    }

    #[test]
    fn test_from_toml_partial() {
        let config = LoaderConfig::from_toml_str("cache_dir = \"/srv/mixtape\"\n").unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/srv/mixtape"));
        assert_eq!(config.base_url, MIXTAPE_BASE_URL);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let err = LoaderConfig::from_toml_str("base_url = [").unwrap_err();
        assert!(matches!(err, MixtapeError::Config(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixtape.toml");
        std::fs::write(
            &path,
            "base_url = \"http://localhost:8080/\"\ncache_dir = \"/tmp/mx\"\n",
        )
        .unwrap();

        let config = LoaderConfig::load_file(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/mx"));
    }
}
