//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{bail, Context, Result};
use axum::http::HeaderValue;
use std::net::SocketAddr;

/// Default port, shared with other span collectors so existing clients work unchanged.
const DEFAULT_PORT: u16 = 9411;

/// Default request body limit (10 MiB).
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `SPANLINE_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `SPANLINE_PORT`: The port to listen on (default: 9411)
/// - `SPANLINE_SAMPLE_RATE`: Fraction of traces to keep, 0.0 to 1.0 (default: 1.0)
/// - `SPANLINE_ALLOWED_ORIGINS`: Comma-separated CORS origins, or `*` (default: `*`)
/// - `SPANLINE_MAX_BODY_BYTES`: Largest accepted request body (default: 10 MiB)
/// - `SPANLINE_LOG_FORMAT`: `text` or `json` (default: `text`)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Fraction of traces the collector keeps.
    pub sample_rate: f32,
    /// Origins allowed by CORS; `["*"]` allows any.
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an unparseable value, the
    /// sample rate is outside `[0, 1]`, or an origin is not a valid header value.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = std::env::var("SPANLINE_HOST").unwrap_or(defaults.host);

        let port = parse_var("SPANLINE_PORT")?.unwrap_or(defaults.port);

        let sample_rate: f32 = parse_var("SPANLINE_SAMPLE_RATE")?.unwrap_or(defaults.sample_rate);
        if !(0.0..=1.0).contains(&sample_rate) {
            bail!("SPANLINE_SAMPLE_RATE must be between 0.0 and 1.0, got {sample_rate}");
        }

        let allowed_origins = std::env::var("SPANLINE_ALLOWED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or(Ok(defaults.allowed_origins))?;

        let max_body_bytes =
            parse_var("SPANLINE_MAX_BODY_BYTES")?.unwrap_or(defaults.max_body_bytes);

        let log_format = match std::env::var("SPANLINE_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => bail!("SPANLINE_LOG_FORMAT must be `text` or `json`, got `{other}`"),
        };

        Ok(Self {
            host,
            port,
            sample_rate,
            allowed_origins,
            max_body_bytes,
            log_format,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Panics
    ///
    /// Panics if the host and port combination cannot be parsed as a valid socket address.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address from config")
    }

    /// Returns true if CORS should allow any origin.
    #[must_use]
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            sample_rate: 1.0,
            allowed_origins: vec!["*".to_string()],
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_format: LogFormat::Text,
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(name)
        .ok()
        .map(|v| v.parse::<T>())
        .transpose()
        .with_context(|| format!("Invalid value for {name}"))
}

fn parse_origins(value: &str) -> Result<Vec<String>> {
    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    for origin in &origins {
        HeaderValue::from_str(origin)
            .with_context(|| format!("Invalid origin in SPANLINE_ALLOWED_ORIGINS: {origin}"))?;
    }
    if origins.is_empty() {
        bail!("SPANLINE_ALLOWED_ORIGINS is set but lists no origins");
    }
    Ok(origins)
}
