use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Directory holding a prebuilt SPA bundle, served as a fallback route.
    pub static_dir: Option<String>,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub connect_retries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub anthropic_model: String,
    pub ollama_base_url: Option<String>,
    pub ollama_model: String,
    pub ollama_vision_model: String,
    /// Timeout in seconds for hosted providers.
    pub request_timeout: u64,
    /// Timeout in seconds for the local provider.
    pub local_timeout: u64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Minimum number of seconds between two outbound marketplace requests.
    pub rate_limit_seconds: u64,
    pub request_timeout: u64,
    pub olx_base_url: String,
    pub vinted_base_url: String,
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub refresh_interval_minutes: u64,
    pub competitor_prices_cron: String,
    pub cleanup_cron: String,
    pub max_listings: u32,
    pub competitor_retention_days: i64,
    pub price_history_retention_days: i64,
    pub removed_listing_retention_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub max_dimension: u32,
    pub max_upload_images: usize,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
            static_dir: None,
            request_timeout: 120,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/listings.db?mode=rwc".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: 30,
            connect_retries: 3,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o".to_string(),
            anthropic_api_key: None,
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            anthropic_model: "claude-3-5-sonnet-20241022".to_string(),
            ollama_base_url: Some("http://localhost:11434".to_string()),
            ollama_model: "llama3.2".to_string(),
            ollama_vision_model: "llama3.2-vision".to_string(),
            request_timeout: 30,
            local_timeout: 60,
            max_tokens: 500,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            rate_limit_seconds: 5,
            request_timeout: 30,
            olx_base_url: "https://www.olx.pl".to_string(),
            vinted_base_url: "https://www.vinted.pl".to_string(),
            max_results: 20,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_minutes: 30,
            competitor_prices_cron: "0 0 3 * * *".to_string(),
            cleanup_cron: "0 0 4 * * Sun".to_string(),
            max_listings: 100,
            competitor_retention_days: 30,
            price_history_retention_days: 90,
            removed_listing_retention_days: 90,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            max_dimension: 1920,
            max_upload_images: 10,
            jpeg_quality: 85,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "listing_buddy=info,tower_http=info".to_string(),
            directory: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "/metrics".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Built-in defaults
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // BUDDY__SCRAPER__RATE_LIMIT_SECONDS=2 etc.
            .add_source(
                Environment::with_prefix("BUDDY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            // Well-known variables shared with the deployment tooling
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("ai.openai_api_key", env::var("OPENAI_API_KEY").ok())?
            .set_override_option("ai.anthropic_api_key", env::var("ANTHROPIC_API_KEY").ok())?
            .set_override_option("ai.ollama_base_url", env::var("OLLAMA_BASE_URL").ok())?
            .set_override_option("scraper.rate_limit_seconds", parse_env::<i64>("SCRAPE_RATE_LIMIT"))?
            .set_override_option("scheduler.max_listings", parse_env::<i64>("SCHEDULER_MAX_LISTINGS"))?
            .set_override_option("server.host", env::var("HOST").ok())?
            .set_override_option("server.port", parse_env::<i64>("PORT"))?
            .set_override_option("storage.upload_dir", env::var("UPLOAD_DIR").ok())?
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.ai.normalize();

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.server.request_timeout == 0 {
            return Err(ConfigError::Message("Server request_timeout must be greater than 0".into()));
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message("Database url must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message("Database min_connections cannot exceed max_connections".into()));
        }

        for (name, base_url) in [
            ("ai.openai_base_url", Some(&self.ai.openai_base_url)),
            ("ai.anthropic_base_url", Some(&self.ai.anthropic_base_url)),
            ("ai.ollama_base_url", self.ai.ollama_base_url.as_ref()),
            ("scraper.olx_base_url", Some(&self.scraper.olx_base_url)),
            ("scraper.vinted_base_url", Some(&self.scraper.vinted_base_url)),
        ] {
            if let Some(base_url) = base_url {
                if !is_http_url(base_url) {
                    return Err(ConfigError::Message(format!("Invalid base URL format in {}", name)));
                }
            }
        }

        if self.ai.request_timeout == 0 || self.ai.local_timeout == 0 {
            return Err(ConfigError::Message("AI timeouts must be greater than 0".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.max_results == 0 {
            return Err(ConfigError::Message("Scraper max_results must be greater than 0".into()));
        }

        if self.scheduler.refresh_interval_minutes == 0 {
            return Err(ConfigError::Message("Scheduler refresh_interval_minutes must be greater than 0".into()));
        }

        if !Self::is_valid_cron(&self.scheduler.competitor_prices_cron) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.competitor_prices_cron".into()));
        }

        if !Self::is_valid_cron(&self.scheduler.cleanup_cron) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.cleanup_cron".into()));
        }

        if self.scheduler.max_listings == 0 {
            return Err(ConfigError::Message("Scheduler max_listings must be greater than 0".into()));
        }

        if self.storage.max_dimension == 0 {
            return Err(ConfigError::Message("Storage max_dimension must be greater than 0".into()));
        }

        if self.storage.jpeg_quality == 0 || self.storage.jpeg_quality > 100 {
            return Err(ConfigError::Message("Storage jpeg_quality must be between 1 and 100".into()));
        }

        if !self.metrics.endpoint.starts_with('/') {
            return Err(ConfigError::Message("Metrics endpoint must start with '/'".into()));
        }

        Ok(())
    }

    /// Scheduler cron expressions carry a seconds field: `sec min hour day month weekday [year]`.
    pub fn is_valid_cron(cron_expr: &str) -> bool {
        let parts: Vec<&str> = cron_expr.split_whitespace().collect();
        if parts.len() != 6 && parts.len() != 7 {
            return false;
        }

        parts.iter().all(|part| {
            part.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '*' | '-' | ',' | '/' | '?'))
        })
    }
}

impl AiConfig {
    /// Blank keys in env files mean "not configured".
    fn normalize(&mut self) {
        for value in [
            &mut self.openai_api_key,
            &mut self.anthropic_api_key,
            &mut self.ollama_base_url,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
