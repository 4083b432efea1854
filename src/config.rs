//! Configuration management for YourNews.
//!
//! Configuration is read once at startup from environment variables (a `.env`
//! file is loaded first by the binary, if present):
//! - `SERPER_API_KEY` - Optional. Search credential; live mode needs it.
//! - `OPENAI_API_KEY` - Optional. LLM credential; live mode needs it.
//! - `APP_NAME` - Optional. Application name. Defaults to `YourNews App`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8501`.
//! - `SUBJECT_MAX_CHARS` - Optional. Subject input limit. Defaults to `20`.
//! - `OPENAI_MODEL` - Optional. Chat model. Defaults to `gpt-4o-mini`.
//! - `OPENAI_BASE_URL` - Optional. OpenAI-compatible API root.
//! - `SERPER_URL` - Optional. Search endpoint.
//! - `CREW_VARIANT` - Optional. `configured` (default) or `inline`.
//! - `CREW_CONFIG_DIR` - Optional. Directory with `agents.yaml` and `tasks.yaml`.
//! - `CREW_OUTPUT_DIR` - Optional. Each run writes stage outputs into its own
//!   scratch directory here, removed when the run ends.
//! - `MAX_ITERATIONS` - Optional. Per-stage LLM loop cap. Defaults to `8`.
//!
//! The resulting [`Config`] is passed explicitly to everything that needs it;
//! nothing reads the environment at search time.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const SERPER_API_KEY: &str = "SERPER_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

const DEFAULT_APP_NAME: &str = "YourNews App";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SERPER_URL: &str = "https://google.serper.dev/search";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// The two secrets that gate live searches.
///
/// Empty strings are normalised to `None` on load. Any other value, even
/// whitespace, counts as present, the same rule the credential gate applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub serper_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Credentials {
    pub fn new(serper_api_key: Option<String>, openai_api_key: Option<String>) -> Self {
        Self {
            serper_api_key: serper_api_key.filter(|v| !v.is_empty()),
            openai_api_key: openai_api_key.filter(|v| !v.is_empty()),
        }
    }
}

/// Which pipeline definition the live path runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrewVariant {
    /// Role and task definitions loaded from YAML.
    #[default]
    Configured,
    /// Researcher / writer / editor defined in code.
    Inline,
}

impl FromStr for CrewVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "configured" | "yaml" => Ok(CrewVariant::Configured),
            "inline" | "manual" => Ok(CrewVariant::Inline),
            other => Err(ConfigError::InvalidValue(
                "CREW_VARIANT".to_string(),
                format!("unknown variant '{}'", other),
            )),
        }
    }
}

/// Settings for the live pipeline.
#[derive(Debug, Clone)]
pub struct CrewConfig {
    pub variant: CrewVariant,

    /// Chat model identifier
    pub model: String,

    /// OpenAI-compatible API root, without the trailing `/chat/completions`
    pub openai_base_url: String,

    /// Serper search endpoint
    pub serper_url: String,

    /// Overrides for the built-in YAML definitions
    pub config_dir: Option<PathBuf>,

    /// Where stage outputs are written, if anywhere
    pub output_dir: Option<PathBuf>,

    /// Maximum LLM round-trips per stage
    pub max_iterations: usize,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            variant: CrewVariant::Configured,
            model: "gpt-4o-mini".to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            serper_url: DEFAULT_SERPER_URL.to_string(),
            config_dir: None,
            output_dir: None,
            max_iterations: 8,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,

    pub credentials: Credentials,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum subject length, in characters
    pub subject_max_chars: usize,

    pub crew: CrewConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse
    /// or `CREW_VARIANT` names an unknown variant.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = Credentials::new(
            std::env::var(SERPER_API_KEY).ok(),
            std::env::var(OPENAI_API_KEY).ok(),
        );

        let app_name = non_empty(std::env::var("APP_NAME").ok())
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_env("PORT", 8501)?;
        let subject_max_chars = parse_env("SUBJECT_MAX_CHARS", 20)?;

        let defaults = CrewConfig::default();
        let variant = match non_empty(std::env::var("CREW_VARIANT").ok()) {
            Some(v) => v.parse()?,
            None => CrewVariant::default(),
        };

        let crew = CrewConfig {
            variant,
            model: non_empty(std::env::var("OPENAI_MODEL").ok()).unwrap_or(defaults.model),
            openai_base_url: non_empty(std::env::var("OPENAI_BASE_URL").ok())
                .unwrap_or(defaults.openai_base_url),
            serper_url: non_empty(std::env::var("SERPER_URL").ok()).unwrap_or(defaults.serper_url),
            config_dir: non_empty(std::env::var("CREW_CONFIG_DIR").ok()).map(PathBuf::from),
            output_dir: non_empty(std::env::var("CREW_OUTPUT_DIR").ok()).map(PathBuf::from),
            max_iterations: parse_env("MAX_ITERATIONS", defaults.max_iterations)?,
        };

        Ok(Self {
            app_name,
            credentials,
            host,
            port,
            subject_max_chars,
            crew,
        })
    }

    /// Create a config with custom credentials (useful for testing).
    pub fn new(credentials: Credentials) -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            credentials,
            host: "127.0.0.1".to_string(),
            port: 8501,
            subject_max_chars: 20,
            crew: CrewConfig::default(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        _ => Ok(default),
    }
}
