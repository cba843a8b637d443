//! Loader for sentiment-pulse configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults (every field has one, so an empty config is valid)
//! 2. YAML files / inline YAML snippets, in the order they were attached
//! 3. `PULSE__<SECTION>__<KEY>` environment variables
//!
//! String values may reference other environment variables as `${VAR}` (or `$VAR`);
//! these are expanded recursively, up to a fixed depth, after the sources are merged.
//!
//! ```yaml
//! reddit:
//!   client_id: "${REDDIT_CLIENT_ID}"
//!   client_secret: "${REDDIT_CLIENT_SECRET}"
//!   user_agent: "SentimentPulse/0.1"
//! pipeline:
//!   chunk_size: 4
//!   workers: 3
//!   interval_count: 12
//!   interval_minutes: 10
//! server:
//!   port: 5000
//! ```
use config::{Config, ConfigError, Environment, File};
use pulse_common::observability::LogFormat;
use pulse_common::PulseError;
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

const EXPANSION_PASSES: usize = 8;

/// Name of the configuration file the binary looks for by default.
pub const DEFAULT_CONFIG_FILE: &str = "sentiment-pulse.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub version: Option<String>,
    pub reddit: RedditConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
    pub subreddit: String,
    pub sort: String,
    pub fetch_limit: usize,
    pub timeout_secs: u64,
    pub retries: usize,
    /// Host serving the OAuth token endpoint.
    pub auth_url: String,
    /// Host serving authenticated API calls.
    pub api_url: String,
    /// Host serving the anonymous `.json` endpoints, used without credentials.
    pub public_url: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: "SentimentPulse/0.1".into(),
            subreddit: "all".into(),
            sort: "new".into(),
            fetch_limit: 50,
            timeout_secs: 15,
            retries: 2,
            auth_url: "https://www.reddit.com".into(),
            api_url: "https://oauth.reddit.com".into(),
            public_url: "https://www.reddit.com".into(),
        }
    }
}

impl RedditConfig {
    /// Client id and secret for app-only OAuth, if both are set and fully expanded.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        fn usable(v: &Option<String>) -> Option<&str> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.contains("${"))
        }
        Some((usable(&self.client_id)?, usable(&self.client_secret)?))
    }
}

/// What the aggregator does with posts that carry no timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTimestampPolicy {
    #[default]
    Drop,
    Spread,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub workers: usize,
    pub comments_per_post: usize,
    pub sentiment_cache_capacity: usize,
    pub fetch_cache_capacity: usize,
    pub fetch_cache_ttl_secs: u64,
    pub interval_count: usize,
    pub interval_minutes: i64,
    pub missing_timestamps: MissingTimestampPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4,
            workers: 3,
            comments_per_post: 2,
            sentiment_cache_capacity: 512,
            fetch_cache_capacity: 64,
            fetch_cache_ttl_secs: 1800,
            interval_count: 12,
            interval_minutes: 10,
            missing_timestamps: MissingTimestampPolicy::Drop,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub emit_stderr: bool,
    pub dir: Option<PathBuf>,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            emit_stderr: true,
            dir: None,
            filter: "info".into(),
        }
    }
}

impl PulseConfig {
    /// Reject values the pipeline cannot run with.
    ///
    /// ```
    /// use pulse_config::PulseConfig;
    ///
    /// let mut cfg = PulseConfig::default();
    /// assert!(cfg.validate().is_ok());
    /// cfg.pipeline.workers = 0;
    /// assert!(cfg.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), PulseError> {
        let p = &self.pipeline;
        let checks = [
            (p.chunk_size == 0, "pipeline.chunk_size must be at least 1"),
            (p.workers == 0, "pipeline.workers must be at least 1"),
            (p.interval_count == 0, "pipeline.interval_count must be at least 1"),
            (p.interval_minutes <= 0, "pipeline.interval_minutes must be positive"),
            (
                p.sentiment_cache_capacity == 0,
                "pipeline.sentiment_cache_capacity must be at least 1",
            ),
            (
                p.fetch_cache_capacity == 0,
                "pipeline.fetch_cache_capacity must be at least 1",
            ),
            (self.reddit.fetch_limit == 0, "reddit.fetch_limit must be at least 1"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(PulseError::Config((*msg).to_string())),
            None => Ok(()),
        }
    }
}

/// Expand `${VAR}` references until the string stops changing. Unknown
/// variables are left as written while known ones in the same string expand.
fn expand_placeholders(raw: String) -> String {
    let lookup = |name: &str| std::env::var(name).ok();
    let mut current = raw;
    for _ in 0..EXPANSION_PASSES {
        let next = match shellexpand::env_with_context_no_errors(&current, lookup) {
            Cow::Owned(expanded) if expanded != current => expanded,
            _ => break,
        };
        current = next;
    }
    current
}

fn expand_tree(node: &mut Value) {
    match node {
        Value::String(text) if text.contains('$') => {
            *text = expand_placeholders(std::mem::take(text));
        }
        Value::Array(items) => items.iter_mut().for_each(expand_tree),
        Value::Object(fields) => fields.values_mut().for_each(expand_tree),
        _ => {}
    }
}

/// Layers YAML sources and `<PREFIX>__SECTION__KEY` variables into a [`PulseConfig`].
pub struct PulseConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for PulseConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseConfigLoader {
    /// Start with defaults plus `PULSE__` environment overrides.
    ///
    /// ```
    /// use pulse_config::PulseConfigLoader;
    ///
    /// let config = PulseConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nserver:\n  port: 8080")
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.server.port, 8080);
    /// assert_eq!(config.pipeline.workers, 3);
    /// ```
    pub fn new() -> Self {
        Self::with_env_prefix("PULSE")
    }

    /// Same as [`PulseConfigLoader::new`] with a custom environment prefix.
    pub fn with_env_prefix(prefix: &str) -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: prefix.to_string(),
        }
    }

    fn layer(mut self, source: impl config::Source + Send + Sync + 'static) -> Self {
        self.builder = self.builder.add_source(source);
        self
    }

    /// Required file; YAML, TOML or JSON by extension.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.layer(File::from(path.as_ref()).required(true))
    }

    /// File that is skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.layer(File::from(path.as_ref()).required(false))
    }

    /// Inline YAML, merged in attachment order.
    pub fn with_yaml_str(self, yaml: &str) -> Self {
        self.layer(File::from_str(yaml, config::FileFormat::Yaml))
    }

    /// Consume the builder, expand `${VAR}` placeholders and validate the result.
    ///
    /// ```
    /// use pulse_config::PulseConfigLoader;
    ///
    /// std::env::set_var("DOC_REDDIT_SECRET", "injected-from-env");
    ///
    /// let config = PulseConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// reddit:
    ///   client_id: "abc"
    ///   client_secret: "${DOC_REDDIT_SECRET}"
    /// "#)
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.reddit.credentials(), Some(("abc", "injected-from-env")));
    ///
    /// std::env::remove_var("DOC_REDDIT_SECRET");
    /// ```
    pub fn load(self) -> Result<PulseConfig, ConfigError> {
        let merged = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut tree: Value = merged.try_deserialize()?;
        expand_tree(&mut tree);

        let typed: PulseConfig =
            serde_json::from_value(tree).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
