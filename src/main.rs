// ai-mode-search: command line front end
//
// Builds a query, runs one scrape and writes the Markdown (and optionally the
// raw JSON) to disk. The exit code tells callers what went wrong.

use std::path::PathBuf;

use ai_mode_search::{ScrapeResult, browser_setup, load_yaml_config};
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ai-mode-search", version, about = "Search AI mode and save the cited answer as Markdown")]
struct Args {
    /// Full search query
    #[arg(long, conflicts_with = "city")]
    query: Option<String>,

    /// City name for a constructed query (e.g. 'Münster')
    #[arg(long)]
    city: Option<String>,

    /// Postal code appended to a constructed query
    #[arg(long, requires = "city")]
    plz: Option<String>,

    /// Topic for a constructed query
    #[arg(long, default_value = "Mietspiegel 2026")]
    topic: String,

    /// Custom output file for the Markdown
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run the browser visibly (solve challenges by hand)
    #[arg(long)]
    show_browser: bool,

    /// Also save the raw result as JSON next to the Markdown
    #[arg(long)]
    json: bool,

    /// Save into the results/ folder with a timestamped name
    #[arg(long)]
    save: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Delete the persistent browser profile before searching
    #[arg(long)]
    reset_profile: bool,
}

impl Args {
    fn build_query(&self) -> Option<String> {
        if let Some(query) = &self.query {
            return Some(query.clone());
        }
        let city = self.city.as_ref()?;
        Some(match &self.plz {
            Some(plz) => format!("{} {} {}", self.topic, city, plz),
            None => format!("{} {}", self.topic, city),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(query) = args.build_query() else {
        eprintln!("Error: provide either --query or --city");
        std::process::exit(1);
    };

    let mut config = load_yaml_config().context("Failed to load config.yaml")?;
    if args.show_browser {
        config.browser.headless = false;
    }

    if args.reset_profile {
        let profile = config.browser.profile_dir();
        if !browser_setup::reset_profile(&profile)? {
            info!("No profile to reset at {}", profile.display());
        }
    }

    info!(
        "Query: '{}' ({})",
        query,
        if config.browser.headless { "headless" } else { "visible" }
    );
    debug!("Arguments: {:?}", args);

    let result = ai_mode_search::run(&config, &query).await;

    match &result {
        ScrapeResult::Success(success) => {
            let out_path = output_path(&args, &query);
            if let Some(parent) = out_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            std::fs::write(&out_path, &success.markdown)
                .with_context(|| format!("Failed to write {}", out_path.display()))?;
            info!("Saved Markdown: {}", out_path.display());

            if args.json {
                let json_path = out_path.with_extension("json");
                let json = serde_json::to_string_pretty(&result.to_json())?;
                std::fs::write(&json_path, json)
                    .with_context(|| format!("Failed to write {}", json_path.display()))?;
                info!("Saved JSON: {}", json_path.display());
            }

            println!("{}", preview(&success.markdown, 500));
        }
        ScrapeResult::Failure(failure) => {
            eprintln!("Search failed");
            eprintln!("Error: {}", failure.error);
            eprintln!("Message: {}", failure.message);
            if let Some(suggestion) = &failure.suggestion {
                eprintln!("Suggestion: {}", suggestion);
            }
        }
    }

    std::process::exit(result.exit_code());
}

fn output_path(args: &Args, query: &str) -> PathBuf {
    if let Some(path) = &args.output {
        return path.clone();
    }
    let name = safe_name(query);
    if args.save {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        results_dir().join(format!("{timestamp}_{name}.md"))
    } else {
        PathBuf::from(format!("result_{name}.md"))
    }
}

/// `<data dir>/ai-mode-search/results`, or `./results` without a data dir
fn results_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(data) => data.join("ai-mode-search").join("results"),
        None => PathBuf::from("results"),
    }
}

/// First 40 characters, non-alphanumerics replaced by `_`
fn safe_name(query: &str) -> String {
    let replaced: String = query
        .chars()
        .take(40)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    replaced.trim_matches('_').to_string()
}

fn preview(markdown: &str, max_chars: usize) -> String {
    match markdown.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n...", &markdown[..idx]),
        None => markdown.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_built_from_city_and_plz() {
        let args = Args::parse_from(["ai-mode-search", "--city", "Münster", "--plz", "48143"]);
        assert_eq!(args.build_query().unwrap(), "Mietspiegel 2026 Münster 48143");

        let args = Args::parse_from(["ai-mode-search", "--query", "rust tokio"]);
        assert_eq!(args.build_query().unwrap(), "rust tokio");

        let args = Args::parse_from(["ai-mode-search"]);
        assert!(args.build_query().is_none());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(safe_name("Mietspiegel 2026 Münster"), "Mietspiegel_2026_M_nster");
        assert_eq!(safe_name("  what is rust?  "), "what_is_rust");
        assert_eq!(safe_name(&"a".repeat(60)).len(), 40);
    }

    #[test]
    fn saved_results_live_outside_the_source_tree() {
        let dir = results_dir();
        assert!(dir.ends_with("results"));
        assert!(!dir.starts_with(env!("CARGO_MANIFEST_DIR")));

        let args = Args::parse_from(["ai-mode-search", "--query", "rust", "--save"]);
        let path = output_path(&args, "rust");
        assert!(path.starts_with(&dir));
        assert!(path.to_string_lossy().ends_with("_rust.md"));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("äöü", 2), "äö\n...");
        assert_eq!(preview("short", 500), "short");
    }
}
