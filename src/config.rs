use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docwise pipeline.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the chat-completions endpoint (Azure-style deployment host).
    pub azure_endpoint: String,
    /// Static API key sent with every request.
    pub api_key: String,
    /// API version appended as a query parameter.
    pub api_version: String,
    /// Model/deployment name addressed by the endpoint.
    pub model: String,
    /// Per-request timeout for model calls, in seconds.
    pub llm_timeout_secs: u64,
    /// Number of pages grouped into one sequential batch.
    pub page_batch_size: usize,
    /// Text-coverage ratio below which a page is sent for image interpretation.
    pub text_coverage_threshold: f64,
    /// Optional bound on how many batches run concurrently.
    pub max_concurrent_batches: Option<usize>,
    /// Longest edge, in pixels, for images sent to the model.
    pub image_max_edge: u32,
    /// JPEG quality used when recompressing page imagery.
    pub image_jpeg_quality: u8,
}

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BATCH_SIZE: usize = 5;
const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.3;
const DEFAULT_IMAGE_MAX_EDGE: u32 = 1024;
const DEFAULT_JPEG_QUALITY: u8 = 55;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let text_coverage_threshold =
            parse_optional("TEXT_COVERAGE_THRESHOLD")?.unwrap_or(DEFAULT_COVERAGE_THRESHOLD);
        if !(0.0..=1.0).contains(&text_coverage_threshold) {
            return Err(ConfigError::InvalidValue(
                "TEXT_COVERAGE_THRESHOLD".to_string(),
            ));
        }

        let page_batch_size = parse_optional("PAGE_BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        if page_batch_size == 0 {
            return Err(ConfigError::InvalidValue("PAGE_BATCH_SIZE".to_string()));
        }

        Ok(Self {
            azure_endpoint: load_env("AZURE_ENDPOINT")?,
            api_key: load_env("API_KEY")?,
            api_version: load_env("API_VERSION")?,
            model: load_env("MODEL")?,
            llm_timeout_secs: parse_optional("LLM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
            page_batch_size,
            text_coverage_threshold,
            max_concurrent_batches: parse_optional("MAX_CONCURRENT_BATCHES")?,
            image_max_edge: parse_optional("IMAGE_MAX_EDGE")?.unwrap_or(DEFAULT_IMAGE_MAX_EDGE),
            image_jpeg_quality: parse_optional("IMAGE_JPEG_QUALITY")?
                .unwrap_or(DEFAULT_JPEG_QUALITY),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        endpoint = %config.azure_endpoint,
        model = %config.model,
        batch_size = config.page_batch_size,
        coverage_threshold = config.text_coverage_threshold,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
