//! Configuration management for the research pipeline.
//!
//! Configuration is read from environment variables (a `.env` file in the
//! working directory is loaded first by the binary):
//! - `OPENAI_API_KEY` - Required. Credential for the language model provider.
//! - `OPENAI_BASE_URL` - Optional. OpenAI-compatible API base. Defaults to `https://api.openai.com/v1`.
//! - `DEFAULT_MODEL` - Optional. Model used by every agent. Defaults to `gpt-4o-mini`.
//! - `HOW_MANY_SEARCHES` - Optional. Number of searches the planner designs. Defaults to `5`.
//! - `SEARCH_CONTEXT_SIZE` - Optional. `low` keeps 5 results per search, anything else 10.
//! - `SENDGRID_API_KEY` - Optional. Missing key makes each send fail softly.
//! - `SENDER_EMAIL` - Optional. Verified sender identity for outgoing reports.
//! - `DEFAULT_RECIPIENT_EMAIL` - Optional. Recipient when a run does not name one.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `5000`.

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_HOW_MANY_SEARCHES: usize = 5;
pub const DEFAULT_SENDER: &str = "reports@newsletter-research.local";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// How much search context each search agent pulls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchContextSize {
    Low,
    High,
}

impl SearchContextSize {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("low") {
            Self::Low
        } else {
            Self::High
        }
    }

    /// Number of search results kept in the digest.
    pub fn max_results(&self) -> usize {
        match self {
            Self::Low => 5,
            Self::High => 10,
        }
    }
}

/// Email delivery configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SendGrid API key (absence is reported per send, not at startup)
    pub sendgrid_api_key: Option<String>,

    /// Sender identity provisioned with the provider
    pub sender: String,

    /// Recipient used when a run does not override it
    pub default_recipient: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Language model API key
    pub api_key: String,

    /// OpenAI-compatible API base URL
    pub api_base_url: String,

    /// Model identifier used by all agents
    pub default_model: String,

    /// Number of searches the planner is asked for
    pub how_many_searches: usize,

    /// Search result depth
    pub search_context: SearchContextSize,

    /// Email delivery settings
    pub email: EmailConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("OPENAI_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let api_base_url = non_empty("OPENAI_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let default_model = non_empty("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let how_many_searches = match non_empty("HOW_MANY_SEARCHES") {
            Some(raw) => {
                let n: usize = raw.trim().parse().map_err(|e| {
                    ConfigError::InvalidValue("HOW_MANY_SEARCHES".to_string(), format!("{}", e))
                })?;
                if n == 0 {
                    return Err(ConfigError::InvalidValue(
                        "HOW_MANY_SEARCHES".to_string(),
                        "must be at least 1".to_string(),
                    ));
                }
                n
            }
            None => DEFAULT_HOW_MANY_SEARCHES,
        };

        let search_context = non_empty("SEARCH_CONTEXT_SIZE")
            .map(|v| SearchContextSize::parse(&v))
            .unwrap_or(SearchContextSize::Low);

        let sender = non_empty("SENDER_EMAIL").unwrap_or_else(|| DEFAULT_SENDER.to_string());
        let email = EmailConfig {
            sendgrid_api_key: non_empty("SENDGRID_API_KEY"),
            default_recipient: non_empty("DEFAULT_RECIPIENT_EMAIL")
                .unwrap_or_else(|| sender.clone()),
            sender,
        };

        let host = non_empty("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = non_empty("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        Ok(Self {
            api_key,
            api_base_url,
            default_model,
            how_many_searches,
            search_context,
            email,
            host,
            port,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            default_model,
            how_many_searches: DEFAULT_HOW_MANY_SEARCHES,
            search_context: SearchContextSize::Low,
            email: EmailConfig {
                sendgrid_api_key: None,
                sender: DEFAULT_SENDER.to_string(),
                default_recipient: DEFAULT_SENDER.to_string(),
            },
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}
