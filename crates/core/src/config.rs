use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::NormalizerSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub sources: SourcesConfig,
    pub normalizer: NormalizerConfig,
    pub reports: ReportsConfig,
    pub history: HistoryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub results_per_query: u32,
    pub timeout_secs: u64,
}

/// Scraper output files read on every comparison, alongside the search API.
#[derive(Clone, Debug, Default)]
pub struct SourcesConfig {
    pub scrape_files: Vec<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct NormalizerConfig {
    pub title_similarity_threshold: f64,
    pub enforce_price_bands: bool,
    pub require_query_match: bool,
}

#[derive(Clone, Debug)]
pub struct ReportsConfig {
    pub directory: PathBuf,
}

#[derive(Clone, Debug)]
pub struct HistoryConfig {
    pub write_timeout_ms: u64,
    pub recent_limit: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    /// OpenAI-compatible API root used when `llm.base_url` is not set.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub reports_directory: Option<PathBuf>,
    pub scrape_files: Option<Vec<PathBuf>>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://pricescout.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Groq,
                api_key: None,
                base_url: None,
                model: "llama-3.1-8b-instant".to_string(),
                timeout_secs: 60,
                max_retries: 3,
            },
            search: SearchConfig {
                api_key: None,
                base_url: "https://google.serper.dev/search".to_string(),
                results_per_query: 10,
                timeout_secs: 30,
            },
            sources: SourcesConfig::default(),
            normalizer: NormalizerConfig {
                title_similarity_threshold: 1.0,
                enforce_price_bands: true,
                require_query_match: true,
            },
            reports: ReportsConfig { directory: PathBuf::from("data/reports") },
            history: HistoryConfig { write_timeout_ms: 2_000, recent_limit: 10 },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected groq|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl NormalizerConfig {
    pub fn settings(&self) -> NormalizerSettings {
        NormalizerSettings {
            title_similarity_threshold: self.title_similarity_threshold,
            enforce_price_bands: self.enforce_price_bands,
            require_query_match: self.require_query_match,
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pricescout.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(search) = patch.search {
            if let Some(search_api_key_value) = search.api_key {
                self.search.api_key = Some(secret_value(search_api_key_value));
            }
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
            if let Some(results_per_query) = search.results_per_query {
                self.search.results_per_query = results_per_query;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
        }

        if let Some(sources) = patch.sources {
            if let Some(scrape_files) = sources.scrape_files {
                self.sources.scrape_files = scrape_files;
            }
        }

        if let Some(normalizer) = patch.normalizer {
            if let Some(threshold) = normalizer.title_similarity_threshold {
                self.normalizer.title_similarity_threshold = threshold;
            }
            if let Some(enforce_price_bands) = normalizer.enforce_price_bands {
                self.normalizer.enforce_price_bands = enforce_price_bands;
            }
            if let Some(require_query_match) = normalizer.require_query_match {
                self.normalizer.require_query_match = require_query_match;
            }
        }

        if let Some(reports) = patch.reports {
            if let Some(directory) = reports.directory {
                self.reports.directory = directory;
            }
        }

        if let Some(history) = patch.history {
            if let Some(write_timeout_ms) = history.write_timeout_ms {
                self.history.write_timeout_ms = write_timeout_ms;
            }
            if let Some(recent_limit) = history.recent_limit {
                self.history.recent_limit = recent_limit;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PRICESCOUT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PRICESCOUT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("PRICESCOUT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PRICESCOUT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PRICESCOUT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PRICESCOUT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("PRICESCOUT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PRICESCOUT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("PRICESCOUT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PRICESCOUT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PRICESCOUT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PRICESCOUT_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("PRICESCOUT_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PRICESCOUT_SEARCH_API_KEY") {
            self.search.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PRICESCOUT_SEARCH_BASE_URL") {
            self.search.base_url = value;
        }
        if let Some(value) = read_env("PRICESCOUT_SEARCH_RESULTS_PER_QUERY") {
            self.search.results_per_query =
                parse_u32("PRICESCOUT_SEARCH_RESULTS_PER_QUERY", &value)?;
        }
        if let Some(value) = read_env("PRICESCOUT_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_u64("PRICESCOUT_SEARCH_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PRICESCOUT_SOURCES_SCRAPE_FILES") {
            self.sources.scrape_files = parse_path_list(&value);
        }

        if let Some(value) = read_env("PRICESCOUT_NORMALIZER_TITLE_SIMILARITY_THRESHOLD") {
            self.normalizer.title_similarity_threshold =
                parse_f64("PRICESCOUT_NORMALIZER_TITLE_SIMILARITY_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PRICESCOUT_NORMALIZER_ENFORCE_PRICE_BANDS") {
            self.normalizer.enforce_price_bands =
                parse_bool("PRICESCOUT_NORMALIZER_ENFORCE_PRICE_BANDS", &value)?;
        }
        if let Some(value) = read_env("PRICESCOUT_NORMALIZER_REQUIRE_QUERY_MATCH") {
            self.normalizer.require_query_match =
                parse_bool("PRICESCOUT_NORMALIZER_REQUIRE_QUERY_MATCH", &value)?;
        }

        if let Some(value) = read_env("PRICESCOUT_REPORTS_DIRECTORY") {
            self.reports.directory = PathBuf::from(value);
        }

        if let Some(value) = read_env("PRICESCOUT_HISTORY_WRITE_TIMEOUT_MS") {
            self.history.write_timeout_ms =
                parse_u64("PRICESCOUT_HISTORY_WRITE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("PRICESCOUT_HISTORY_RECENT_LIMIT") {
            self.history.recent_limit = parse_u32("PRICESCOUT_HISTORY_RECENT_LIMIT", &value)?;
        }

        if let Some(value) = read_env("PRICESCOUT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PRICESCOUT_SERVER_PORT") {
            self.server.port = parse_u16("PRICESCOUT_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("PRICESCOUT_LOGGING_LEVEL").or_else(|| read_env("PRICESCOUT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PRICESCOUT_LOGGING_FORMAT").or_else(|| read_env("PRICESCOUT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(search_api_key) = overrides.search_api_key {
            self.search.api_key = Some(secret_value(search_api_key));
        }
        if let Some(reports_directory) = overrides.reports_directory {
            self.reports.directory = reports_directory;
        }
        if let Some(scrape_files) = overrides.scrape_files {
            self.sources.scrape_files = scrape_files;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_search(&self.search)?;
        validate_sources(&self.sources)?;
        validate_normalizer(&self.normalizer)?;
        validate_reports(&self.reports)?;
        validate_history(&self.history)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    /// Effective configuration with secrets reduced to set/unset markers.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "database": {
                "url": self.database.url,
                "max_connections": self.database.max_connections,
                "timeout_secs": self.database.timeout_secs,
            },
            "llm": {
                "provider": self.llm.provider.as_str(),
                "api_key": secret_marker(self.llm.api_key.as_ref()),
                "base_url": self.llm.effective_base_url(),
                "model": self.llm.model,
                "timeout_secs": self.llm.timeout_secs,
                "max_retries": self.llm.max_retries,
            },
            "search": {
                "api_key": secret_marker(self.search.api_key.as_ref()),
                "base_url": self.search.base_url,
                "results_per_query": self.search.results_per_query,
                "timeout_secs": self.search.timeout_secs,
            },
            "sources": {
                "scrape_files": self
                    .sources
                    .scrape_files
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>(),
            },
            "normalizer": {
                "title_similarity_threshold": self.normalizer.title_similarity_threshold,
                "enforce_price_bands": self.normalizer.enforce_price_bands,
                "require_query_match": self.normalizer.require_query_match,
            },
            "reports": { "directory": self.reports.directory.display().to_string() },
            "history": {
                "write_timeout_ms": self.history.write_timeout_ms,
                "recent_limit": self.history.recent_limit,
            },
            "server": { "bind_address": self.server.bind_address, "port": self.server.port },
            "logging": {
                "level": self.logging.level,
                "format": self.logging.format,
            },
        })
    }
}

fn secret_marker(secret: Option<&SecretString>) -> &'static str {
    match secret {
        Some(value) if !value.expose_secret().trim().is_empty() => "<set>",
        _ => "<unset>",
    }
}

pub fn has_secret(secret: Option<&SecretString>) -> bool {
    secret.map(|value| !value.expose_secret().trim().is_empty()).unwrap_or(false)
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pricescout.toml"), PathBuf::from("config/pricescout.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

// Credentials are optional; without them the runtime skips the narrative.
fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > 10 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 10".to_string()));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.trim().is_empty() && !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if !is_http_url(&search.base_url) {
        return Err(ConfigError::Validation(
            "search.base_url must start with http:// or https://".to_string(),
        ));
    }

    if search.results_per_query == 0 || search.results_per_query > 100 {
        return Err(ConfigError::Validation(
            "search.results_per_query must be in range 1..=100".to_string(),
        ));
    }

    if search.timeout_secs == 0 || search.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_sources(sources: &SourcesConfig) -> Result<(), ConfigError> {
    if sources.scrape_files.iter().any(|path| path.as_os_str().is_empty()) {
        return Err(ConfigError::Validation(
            "sources.scrape_files must not contain empty paths".to_string(),
        ));
    }
    Ok(())
}

fn validate_normalizer(normalizer: &NormalizerConfig) -> Result<(), ConfigError> {
    let threshold = normalizer.title_similarity_threshold;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::Validation(
            "normalizer.title_similarity_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }
    Ok(())
}

fn validate_reports(reports: &ReportsConfig) -> Result<(), ConfigError> {
    if reports.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation("reports.directory must not be empty".to_string()));
    }
    Ok(())
}

fn validate_history(history: &HistoryConfig) -> Result<(), ConfigError> {
    if history.write_timeout_ms == 0 || history.write_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "history.write_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    if history.recent_limit == 0 || history.recent_limit > 500 {
        return Err(ConfigError::Validation(
            "history.recent_limit must be in range 1..=500".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Comma-separated list, blank entries ignored.
fn parse_path_list(value: &str) -> Vec<PathBuf> {
    value.split(',').map(str::trim).filter(|entry| !entry.is_empty()).map(PathBuf::from).collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    search: Option<SearchPatch>,
    sources: Option<SourcesPatch>,
    normalizer: Option<NormalizerPatch>,
    reports: Option<ReportsPatch>,
    history: Option<HistoryPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    results_per_query: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SourcesPatch {
    scrape_files: Option<Vec<PathBuf>>,
}

#[derive(Debug, Default, Deserialize)]
struct NormalizerPatch {
    title_similarity_threshold: Option<f64>,
    enforce_price_bands: Option<bool>,
    require_query_match: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportsPatch {
    directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryPatch {
    write_timeout_ms: Option<u64>,
    recent_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_any_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.llm.api_key.is_none(), "llm api key should default to unset")?;
        ensure(config.search.api_key.is_none(), "search api key should default to unset")?;
        ensure(
            config.reports.directory == PathBuf::from("data/reports"),
            "reports should default to data/reports",
        )?;
        ensure(config.history.recent_limit == 10, "recent limit should default to 10")?;
        ensure(config.sources.scrape_files.is_empty(), "no scrape files by default")?;
        ensure(
            (config.normalizer.title_similarity_threshold - 1.0).abs() < f64::EPSILON,
            "title threshold should default to exact matching",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GROQ_KEY", "gsk-from-env");
        env::set_var("TEST_SERPER_KEY", "serper-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pricescout.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "groq"
api_key = "${TEST_GROQ_KEY}"

[search]
api_key = "${TEST_SERPER_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.provider == LlmProvider::Groq, "provider should come from file")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gsk-from-env")
                    == Some(true),
                "llm key should be interpolated from environment",
            )?;
            ensure(
                config.search.api_key.as_ref().map(|key| key.expose_secret() == "serper-from-env")
                    == Some(true),
                "search key should be interpolated from environment",
            )?;
            ensure(
                config.llm.effective_base_url() == "https://api.groq.com/openai/v1",
                "groq provider should default to the groq endpoint",
            )
        })();

        clear_vars(&["TEST_GROQ_KEY", "TEST_SERPER_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("pricescout.toml");
        fs::write(&path, "[search]\napi_key = \"${PRICESCOUT_TEST_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let outcome =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                outcome,
                Err(ConfigError::MissingEnvInterpolation { ref var })
                    if var == "PRICESCOUT_TEST_UNSET_VAR"
            ),
            "unset interpolation variable should be named in the error",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICESCOUT_LOG_LEVEL", "warn");
        env::set_var("PRICESCOUT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["PRICESCOUT_LOG_LEVEL", "PRICESCOUT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICESCOUT_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("PRICESCOUT_NORMALIZER_TITLE_SIMILARITY_THRESHOLD", "0.85");
        env::set_var("PRICESCOUT_HISTORY_RECENT_LIMIT", "25");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pricescout.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[normalizer]
title_similarity_threshold = 0.9
enforce_price_bands = false

[reports]
directory = "from-file/reports"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                (config.normalizer.title_similarity_threshold - 0.85).abs() < f64::EPSILON,
                "env threshold should win over file",
            )?;
            ensure(!config.normalizer.enforce_price_bands, "file should disable price bands")?;
            ensure(config.history.recent_limit == 25, "env recent limit should apply")?;
            ensure(
                config.reports.directory == PathBuf::from("from-file/reports"),
                "file reports directory should apply",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "PRICESCOUT_DATABASE_URL",
            "PRICESCOUT_NORMALIZER_TITLE_SIMILARITY_THRESHOLD",
            "PRICESCOUT_HISTORY_RECENT_LIMIT",
        ]);
        result
    }

    #[test]
    fn scrape_files_come_from_file_then_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("pricescout.toml");
        fs::write(&path, "[sources]\nscrape_files = [\"scrapes/daraz.json\"]\n")
            .map_err(|err| err.to_string())?;

        let from_file = AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        ensure(
            from_file.sources.scrape_files == vec![PathBuf::from("scrapes/daraz.json")],
            "file should list the daraz scrape",
        )?;

        env::set_var("PRICESCOUT_SOURCES_SCRAPE_FILES", "a.json, ,b.json");
        let from_env =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        clear_vars(&["PRICESCOUT_SOURCES_SCRAPE_FILES"]);

        let from_env = from_env.map_err(|err| format!("config load failed: {err}"))?;
        ensure(
            from_env.sources.scrape_files == vec![PathBuf::from("a.json"), PathBuf::from("b.json")],
            "env list should replace the file list and skip blanks",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICESCOUT_NORMALIZER_TITLE_SIMILARITY_THRESHOLD", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("normalizer.title_similarity_threshold")
            );
            ensure(has_message, "validation failure should name the threshold setting")
        })();

        clear_vars(&["PRICESCOUT_NORMALIZER_TITLE_SIMILARITY_THRESHOLD"]);
        result
    }

    #[test]
    fn invalid_env_number_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICESCOUT_SERVER_PORT", "eighty");

        let outcome = AppConfig::load(LoadOptions::default());
        clear_vars(&["PRICESCOUT_SERVER_PORT"]);

        ensure(
            matches!(
                outcome,
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "PRICESCOUT_SERVER_PORT"
            ),
            "bad port should be reported as an invalid override",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug_or_redaction() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICESCOUT_LLM_API_KEY", "gsk-secret-value");
        env::set_var("PRICESCOUT_SEARCH_API_KEY", "serper-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");
            let redacted = config.redacted().to_string();

            ensure(!debug.contains("gsk-secret-value"), "debug output should not contain llm key")?;
            ensure(
                !debug.contains("serper-secret-value"),
                "debug output should not contain search key",
            )?;
            ensure(
                !redacted.contains("gsk-secret-value") && !redacted.contains("serper-secret-value"),
                "redacted config should not contain secrets",
            )?;
            ensure(redacted.contains("<set>"), "redacted config should mark keys as set")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PRICESCOUT_LLM_API_KEY", "PRICESCOUT_SEARCH_API_KEY"]);
        result
    }
}
