//! Citation-annotated answers from AI-mode search result pages
//!
//! Drives a real Chrome session via chromiumoxide, waits for the generated
//! answer and renders it as Markdown with numbered source footnotes.

pub mod ai_mode;
pub mod browser;
pub mod browser_setup;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use ai_mode::{ErrorKind, ScrapeConfig, ScrapeResult, Scraper, Source, run};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,
}

/// Browser launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode. A challenge page is fatal when headless.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,

    /// Persistent user data directory; defaults to the user cache dir
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,

    /// Browser UI and content locale
    #[serde(default = "default_locale")]
    pub locale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_headless() -> bool {
    true
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            window: WindowConfig::default(),
            profile_dir: None,
            locale: default_locale(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl BrowserConfig {
    /// Profile directory in effect
    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(default_profile_dir)
    }
}

/// `<cache dir>/ai-mode-search/chrome_profile`
pub fn default_profile_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("ai-mode-search")
        .join("chrome_profile")
}

/// Load config from config.yaml in package root
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");
    load_yaml_config_from(&config_path)
}

/// Load config from `path`; a missing file yields the defaults
pub fn load_yaml_config_from(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.scrape.validate()?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_yaml_config_from(&dir.path().join("config.yaml")).unwrap();
        assert!(config.browser.headless);
        assert_eq!(config.browser.locale, "en-US");
        assert!(config.browser.profile_dir().ends_with("ai-mode-search/chrome_profile"));
    }

    #[test]
    fn yaml_overrides_nested_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "browser:\n  headless: false\n  profile_dir: /tmp/profile\nscrape:\n  skip_domains: ['example.org']\n",
        )
        .unwrap();

        let config = load_yaml_config_from(&path).unwrap();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.profile_dir(), PathBuf::from("/tmp/profile"));
        assert_eq!(config.browser.window.width, 1920);
        assert_eq!(config.scrape.skip_domains, vec!["example.org".to_string()]);
    }

    #[test]
    fn invalid_timings_are_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "scrape:\n  timing:\n    completion_deadline_ms: 0\n").unwrap();

        let err = load_yaml_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("completion_deadline_ms"));
    }
}
