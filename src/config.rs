//! Configuration management for the PDF viewer server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Raised when an environment variable is set but cannot be parsed
#[derive(Debug, Error)]
#[error("invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub resolver: ResolverConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body (inline documents arrive base64-encoded)
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed lifetime of a loaded document, counted from Load
    pub ttl: Duration,
    /// How often expired entries are purged
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Trusted directory that `isFileName` documents are resolved against
    pub document_root: PathBuf,
    pub fetch_timeout: Duration,
    pub fetch_connect_timeout: Duration,
    pub max_fetch_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Parsed documents kept open by the engine (LRU bounded)
    pub max_open_documents: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_body_bytes: 50 * 1024 * 1024,
            },
            session: SessionConfig {
                ttl: Duration::from_secs(600),
                sweep_interval: Duration::from_secs(60),
            },
            resolver: ResolverConfig {
                document_root: PathBuf::from("./Data"),
                fetch_timeout: Duration::from_secs(30),
                fetch_connect_timeout: Duration::from_secs(10),
                max_fetch_bytes: 50 * 1024 * 1024,
            },
            engine: EngineConfig {
                max_open_documents: 32,
            },
        }
    }
}

impl Config {
    /// Build configuration from the environment, falling back to defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("LISTEN_PORT", defaults.server.port)?,
                max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.server.max_body_bytes)?,
            },
            session: SessionConfig {
                ttl: secs_var("SESSION_TTL_SECS", defaults.session.ttl)?,
                sweep_interval: secs_var("SESSION_SWEEP_SECS", defaults.session.sweep_interval)?,
            },
            resolver: ResolverConfig {
                document_root: env::var("DOCUMENT_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.resolver.document_root),
                fetch_timeout: secs_var("FETCH_TIMEOUT_SECS", defaults.resolver.fetch_timeout)?,
                fetch_connect_timeout: secs_var(
                    "FETCH_CONNECT_TIMEOUT_SECS",
                    defaults.resolver.fetch_connect_timeout,
                )?,
                max_fetch_bytes: parse_var("FETCH_MAX_BYTES", defaults.resolver.max_fetch_bytes)?,
            },
            engine: EngineConfig {
                max_open_documents: parse_var(
                    "ENGINE_MAX_OPEN_DOCUMENTS",
                    defaults.engine.max_open_documents,
                )?,
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError { name, value }),
        Err(_) => Ok(default),
    }
}

fn secs_var(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let secs = parse_var(name, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError {
            name,
            value: "0".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
