//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `DOCGRAPH_WORK_DIR` and `DOCGRAPH_LOG_LEVEL` env overrides.
//! The model API key is only ever read from `LLM_API_KEY`.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

/// Which partition store backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local, discarded on exit.
    Memory,
    /// SQLite file at [`StoreConfig::path`].
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database path, already resolved against `work_dir`.
    pub path: PathBuf,
}

/// Temporal analytics tuning.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// A cached snapshot younger than this is reused.
    pub ttl_hours: i64,
    /// Trailing window for the daily sentiment moving average.
    pub moving_average_window: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            moving_average_window: default_moving_average_window(),
        }
    }
}

/// Knowledge-graph persistence tuning.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Attempts for the version-checked aggregate write before giving up.
    pub upsert_retries: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { upsert_retries: default_upsert_retries() }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Characters of document text sent to the model.
    pub max_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { max_chars: default_max_chars() }
    }
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"` or `"openai"`).
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Level for every target outside this crate.
    pub dependency_log_level: String,
    pub store: StoreConfig,
    pub analytics: AnalyticsConfig,
    pub graph: GraphConfig,
    pub extraction: ExtractionConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY`; `None` for keyless local models.
    pub llm_api_key: Option<String>,
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    service: RawService,
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    analytics: RawAnalytics,
    #[serde(default)]
    graph: RawGraph,
    #[serde(default)]
    extraction: RawExtraction,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawService {
    name: String,
    work_dir: String,
    log_level: String,
    #[serde(default = "default_dependency_log_level")]
    dependency_log_level: String,
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_backend")]
    backend: String,
    #[serde(default = "default_store_path")]
    path: String,
}

impl Default for RawStore {
    fn default() -> Self {
        Self { backend: default_backend(), path: default_store_path() }
    }
}

#[derive(Deserialize)]
struct RawAnalytics {
    #[serde(default = "default_ttl_hours")]
    ttl_hours: i64,
    #[serde(default = "default_moving_average_window")]
    moving_average_window: usize,
}

impl Default for RawAnalytics {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            moving_average_window: default_moving_average_window(),
        }
    }
}

#[derive(Deserialize)]
struct RawGraph {
    #[serde(default = "default_upsert_retries")]
    upsert_retries: usize,
}

impl Default for RawGraph {
    fn default() -> Self {
        Self { upsert_retries: default_upsert_retries() }
    }
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default = "default_max_chars")]
    max_chars: usize,
}

impl Default for RawExtraction {
    fn default() -> Self {
        Self { max_chars: default_max_chars() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

fn default_dependency_log_level() -> String { "warn".to_string() }
fn default_backend() -> String { "sqlite".to_string() }
fn default_store_path() -> String { "docgraph.db".to_string() }
fn default_ttl_hours() -> i64 { 6 }
fn default_moving_average_window() -> usize { 7 }
fn default_upsert_retries() -> usize { 3 }
fn default_max_chars() -> usize { 6000 }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.1 }
fn default_openai_timeout_seconds() -> u64 { 60 }

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Load config from `config_path` (or [`DEFAULT_CONFIG_PATH`]), then apply
/// env-var overrides.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("DOCGRAPH_WORK_DIR").ok();
    let log_level_override = env::var("DOCGRAPH_LOG_LEVEL").ok();
    load_from(
        Path::new(config_path.unwrap_or(DEFAULT_CONFIG_PATH)),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.service;
    let work_dir = expand_home(work_dir_override.unwrap_or(&s.work_dir));
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();
    for level in [&log_level, &s.dependency_log_level] {
        logger::parse_level(level).map_err(|e| AppError::Config(e.to_string()))?;
    }

    let backend = match parsed.store.backend.as_str() {
        "memory" => StoreBackend::Memory,
        "sqlite" => StoreBackend::Sqlite,
        other => {
            return Err(AppError::Config(format!("unknown store backend '{other}'")));
        }
    };
    let store_path = PathBuf::from(&parsed.store.path);
    let store_path = if store_path.is_absolute() { store_path } else { work_dir.join(store_path) };

    if parsed.analytics.moving_average_window == 0 {
        return Err(AppError::Config("analytics.moving_average_window must be > 0".into()));
    }

    Ok(Config {
        service_name: s.name,
        work_dir,
        log_level,
        dependency_log_level: s.dependency_log_level,
        store: StoreConfig { backend, path: store_path },
        analytics: AnalyticsConfig {
            ttl_hours: parsed.analytics.ttl_hours,
            moving_average_window: parsed.analytics.moving_average_window,
        },
        graph: GraphConfig { upsert_retries: parsed.graph.upsert_retries.max(1) },
        extraction: ExtractionConfig { max_chars: parsed.extraction.max_chars },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// In-memory store, dummy model, default tuning. No files, no network.
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            service_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            dependency_log_level: "warn".into(),
            store: StoreConfig { backend: StoreBackend::Memory, path: work_dir.join("test.db") },
            analytics: AnalyticsConfig::default(),
            graph: GraphConfig::default(),
            extraction: ExtractionConfig::default(),
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[service]
name = "test-graph"
work_dir = "~/.docgraph"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_fills_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.service_name, "test-graph");
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert!(cfg.store.path.ends_with("docgraph.db"));
        assert_eq!(cfg.analytics.ttl_hours, 6);
        assert_eq!(cfg.analytics.moving_average_window, 7);
        assert_eq!(cfg.graph.upsert_retries, 3);
        assert_eq!(cfg.extraction.max_chars, 6000);
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.dependency_log_level, "warn");
    }

    #[test]
    fn invalid_log_levels_rejected() {
        let f = write_toml(MINIMAL_TOML);
        let err = load_from(f.path(), None, Some("loud")).unwrap_err();
        assert!(err.to_string().contains("unrecognised log level"));

        let f = write_toml(&MINIMAL_TOML.replace("log_level = \"info\"", "log_level = \"info\"\ndependency_log_level = \"chatty\""));
        assert!(load_from(f.path(), None, None).is_err());
    }

    #[test]
    fn parse_full_sections() {
        let f = write_toml(
            r#"
[service]
name = "g"
work_dir = "/srv/docgraph"
log_level = "debug"

[store]
backend = "memory"
path = "/var/lib/graph.db"

[analytics]
ttl_hours = 1
moving_average_window = 3

[graph]
upsert_retries = 5

[llm]
default = "openai"

[llm.openai]
model = "gpt-4o"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.store.path, PathBuf::from("/var/lib/graph.db"));
        assert_eq!(cfg.analytics.ttl_hours, 1);
        assert_eq!(cfg.analytics.moving_average_window, 3);
        assert_eq!(cfg.graph.upsert_retries, 5);
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.model, "gpt-4o");
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let f = write_toml(&format!("{MINIMAL_TOML}\n[store]\nbackend = \"dynamo\"\n"));
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("unknown store backend"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.docgraph");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".docgraph"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/test-override"), Some("debug")).unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/test-override"));
        assert_eq!(cfg.store.path, PathBuf::from("/tmp/test-override/docgraph.db"));
        assert_eq!(cfg.log_level, "debug");
    }
}
