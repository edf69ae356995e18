use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::BrowserConfig;
use crate::browser::{BrowserError, BrowserResult};
use crate::utils::constants::CHROME_USER_AGENT;

/// Find Chrome/Chromium executable on the system with platform-specific search paths.
///
/// Branded Chrome is preferred over Chromium: the results page is less
/// likely to challenge a stock Chrome build.
pub async fn find_browser_executable() -> Result<PathBuf> {
    // First check environment variable which overrides all other methods
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(
                "Using browser from CHROMIUM_PATH environment variable: {}",
                path.display()
            );
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH environment variable points to non-existent file: {}",
            path.display()
        );
    }

    let candidates: Vec<PathBuf> = if cfg!(target_os = "windows") {
        let mut roots = Vec::new();
        for var in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(root) = std::env::var(var) {
                roots.push(PathBuf::from(root));
            }
        }
        roots
            .iter()
            .flat_map(|root| {
                [
                    root.join(r"Google\Chrome\Application\chrome.exe"),
                    root.join(r"Chromium\Application\chrome.exe"),
                ]
            })
            .collect()
    } else if cfg!(target_os = "macos") {
        let mut paths = vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            PathBuf::from("/opt/homebrew/bin/chromium"),
        ];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));
        }
        paths
    } else {
        // Linux
        [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/opt/google/chrome/chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    };

    if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    // Use 'which' command to find Chrome on Unix systems
    if !cfg!(target_os = "windows") {
        for cmd in &["google-chrome", "chrome", "chromium", "chromium-browser"] {
            let output = Command::new("which").arg(cmd).output();

            if let Ok(output) = output
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    info!("Found browser using 'which' command: {}", path.display());
                    return Ok(path);
                }
            }
        }
    }

    warn!("No Chrome/Chromium executable found. Will download and use fetcher.");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Downloads and manages Chromium browser if not found locally.
/// Returns a path to the downloaded executable.
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("ai-mode-search/chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );

    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );

    Ok(revision_info.executable_path)
}

/// Merge `patch` into the JSON object stored at `path`, keeping every other key
///
/// A missing or corrupt file starts from an empty object: the profile is a
/// cache, and Chrome rewrites what it needs on start.
fn merge_json_file(path: &Path, patch: Value) -> BrowserResult<()> {
    let mut current = std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str::<Value>(&contents).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_else(Map::new);

    if let Value::Object(patch) = patch {
        for (key, value) in patch {
            current.insert(key, value);
        }
    }

    let serialized = serde_json::to_string_pretty(&Value::Object(current))
        .map_err(|e| BrowserError::ProfileSetup(e.to_string()))?;
    std::fs::write(path, serialized)?;
    Ok(())
}

/// Force the profile's UI and content language before Chrome reads it
///
/// Writes the `intl` section of `Local State` (profile-wide) and the
/// `intl`/`translate` sections of `Default/Preferences` (per profile).
/// Cookies and session data live in other files and are untouched.
pub fn prepare_profile(profile_dir: &Path, locale: &str) -> BrowserResult<()> {
    let language = locale.split(['-', '_']).next().unwrap_or(locale);
    let accept_languages = if language == locale {
        locale.to_string()
    } else {
        format!("{locale},{language}")
    };

    std::fs::create_dir_all(profile_dir.join("Default"))?;

    merge_json_file(
        &profile_dir.join("Local State"),
        json!({
            "intl": {
                "app_locale": language,
                "accept_languages": accept_languages,
            }
        }),
    )?;

    merge_json_file(
        &profile_dir.join("Default").join("Preferences"),
        json!({
            "intl": {
                "accept_languages": accept_languages,
                "selected_languages": accept_languages,
                "app_locale": language,
            },
            "translate": { "enabled": false },
            "webkit": { "webprefs": { "default_charset": "utf-8" } },
        }),
    )?;

    debug!("Profile locale forced to {} at {}", locale, profile_dir.display());
    Ok(())
}

/// Delete the persistent profile (cookies, history, preferences)
///
/// Returns false if there was nothing to delete.
pub fn reset_profile(profile_dir: &Path) -> BrowserResult<bool> {
    if !profile_dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(profile_dir)?;
    info!("Removed browser profile: {}", profile_dir.display());
    Ok(true)
}

/// Browser launcher that finds or downloads Chrome/Chromium and
/// configures it with stealth and locale settings.
///
/// # Arguments
/// * `config` - Headless mode, window size and locale
/// * `profile_dir` - Persistent user data directory, reused across runs
///   so cookies survive (fewer challenges)
/// * `request_timeout` - Per-command CDP timeout; pending commands older
///   than this are dropped by the handler
pub async fn launch_browser(
    config: &BrowserConfig,
    profile_dir: PathBuf,
    request_timeout: Duration,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let language = config.locale.split(['-', '_']).next().unwrap_or("en");

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(request_timeout)
        .window_size(config.window.width, config.window.height)
        .user_data_dir(profile_dir)
        .chrome_executable(chrome_path);

    if config.headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    // UI language must be the bare language code ("en", not "en-US")
    config_builder = config_builder
        .arg(format!("--user-agent={}", CHROME_USER_AGENT))
        .arg(format!("--lang={}", language))
        .arg("--disable-translate")
        .arg("--disable-features=TranslateUI")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio");

    if should_disable_sandbox() {
        info!("Detected containerized environment, disabling sandbox");
        config_builder = config_builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

    let handler_task = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();

                // Chrome sends CDP events chromiumoxide does not know about
                let is_benign_serialization_error =
                    error_msg.contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if !is_benign_serialization_error {
                    error!("Browser handler error: {:?}", e);
                } else {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                }
            }
        }
        info!("Browser handler task completed");
    });

    Ok((browser, handler_task))
}

/// Detect if running in containerized environment (Docker, etc.)
/// In containers, sandbox must be disabled as setuid doesn't work
fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_profile_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let prefs_path = dir.path().join("Default").join("Preferences");
        std::fs::create_dir_all(prefs_path.parent().unwrap()).unwrap();
        std::fs::write(&prefs_path, r#"{"profile":{"name":"Person 1"},"intl":{"app_locale":"de"}}"#)
            .unwrap();

        prepare_profile(dir.path(), "en-US").unwrap();

        let prefs: Value =
            serde_json::from_str(&std::fs::read_to_string(&prefs_path).unwrap()).unwrap();
        assert_eq!(prefs["profile"]["name"], "Person 1");
        assert_eq!(prefs["intl"]["app_locale"], "en");
        assert_eq!(prefs["intl"]["accept_languages"], "en-US,en");
        assert_eq!(prefs["translate"]["enabled"], false);

        let local_state: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("Local State")).unwrap(),
        )
        .unwrap();
        assert_eq!(local_state["intl"]["app_locale"], "en");
    }

    #[test]
    fn prepare_profile_recovers_from_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Local State"), "not json").unwrap();

        prepare_profile(dir.path(), "en").unwrap();

        let local_state: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("Local State")).unwrap(),
        )
        .unwrap();
        assert_eq!(local_state["intl"]["accept_languages"], "en");
    }

    #[test]
    fn reset_profile_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("chrome_profile");
        assert!(!reset_profile(&profile).unwrap());

        std::fs::create_dir_all(profile.join("Default")).unwrap();
        assert!(reset_profile(&profile).unwrap());
        assert!(!profile.exists());
    }
}
