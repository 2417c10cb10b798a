use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pricescout_core::config::{has_secret, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let source = field_source(
            key_path,
            &env_key(key_path),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("llm.provider", config.llm.provider.as_str().to_string()),
        ("llm.model", config.llm.model.clone()),
        ("llm.base_url", config.llm.effective_base_url().to_string()),
        ("llm.api_key", secret_marker(has_secret(config.llm.api_key.as_ref()))),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string()),
        ("llm.max_retries", config.llm.max_retries.to_string()),
        ("search.base_url", config.search.base_url.clone()),
        ("search.api_key", secret_marker(has_secret(config.search.api_key.as_ref()))),
        ("search.results_per_query", config.search.results_per_query.to_string()),
        ("search.timeout_secs", config.search.timeout_secs.to_string()),
        ("sources.scrape_files", path_list(&config.sources.scrape_files)),
        (
            "normalizer.title_similarity_threshold",
            config.normalizer.title_similarity_threshold.to_string(),
        ),
        ("normalizer.enforce_price_bands", config.normalizer.enforce_price_bands.to_string()),
        ("normalizer.require_query_match", config.normalizer.require_query_match.to_string()),
        ("reports.directory", config.reports.directory.display().to_string()),
        ("history.write_timeout_ms", config.history.write_timeout_ms.to_string()),
        ("history.recent_limit", config.history.recent_limit.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format).to_lowercase()),
    ]
}

/// `llm.api_key` -> `PRICESCOUT_LLM_API_KEY`
fn env_key(key_path: &str) -> String {
    format!("PRICESCOUT_{}", key_path.replace('.', "_").to_uppercase())
}

fn path_list(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<none>".to_string();
    }
    paths.iter().map(|path| path.display().to_string()).collect::<Vec<_>>().join(",")
}

fn secret_marker(is_set: bool) -> String {
    if is_set { "<redacted>" } else { "<unset>" }.to_string()
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("pricescout.toml"), PathBuf::from("config/pricescout.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
