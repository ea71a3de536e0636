//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use std::env;
use std::path::PathBuf;

use domain::code::DEFAULT_PREFIX_BYTES;
use thiserror::Error;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
    /// DynamoDB table named by `TABLE_NAME`
    Dynamo,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("sqlite") {
            Self::Sqlite
        } else if s.eq_ignore_ascii_case("dynamo") || s.eq_ignore_ascii_case("dynamodb") {
            Self::Dynamo
        } else {
            Self::Memory
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
#[error("Configuration error for {field}: {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// Storage provider (default: memory)
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    pub db_path: Option<PathBuf>,
    /// DynamoDB table (required when using dynamo storage)
    pub table_name: Option<String>,
    /// Digest bytes encoded into each short code. Every instance sharing a
    /// store must use the same value.
    pub code_prefix_bytes: usize,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Port
        let port = match lookup("PORT") {
            Some(s) => s.parse().map_err(|e| ConfigError {
                field: "PORT",
                message: format!("Invalid port '{}': {}", s, e),
            })?,
            None => 3001,
        };

        // Storage provider
        let storage_provider =
            StorageProvider::from_str(&lookup("STORAGE_PROVIDER").unwrap_or_else(|| "memory".into()));

        // DB path (for sqlite)
        let db_path = lookup("DB_PATH").map(PathBuf::from);

        // Table name (for dynamo)
        let table_name = lookup("TABLE_NAME").filter(|s| !s.is_empty());
        if storage_provider == StorageProvider::Dynamo && table_name.is_none() {
            return Err(ConfigError {
                field: "TABLE_NAME",
                message: "Required when STORAGE_PROVIDER=dynamo".into(),
            });
        }

        // Code prefix length
        let code_prefix_bytes = match lookup("CODE_PREFIX_BYTES") {
            Some(s) => match s.parse::<usize>() {
                Ok(n) if (1..=32).contains(&n) => n,
                _ => {
                    return Err(ConfigError {
                        field: "CODE_PREFIX_BYTES",
                        message: format!("Expected an integer in 1..=32, got '{}'", s),
                    })
                }
            },
            None => DEFAULT_PREFIX_BYTES,
        };

        // Log format
        let log_format =
            LogFormat::from_str(&lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        Ok(Self {
            port,
            storage_provider,
            db_path,
            table_name,
            code_prefix_bytes,
            log_format,
        })
    }

    /// Log warnings about configuration that will surprise in production.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: mappings and click counts are lost on restart."
            );
        }
        if self.code_prefix_bytes != DEFAULT_PREFIX_BYTES {
            tracing::warn!(
                code_prefix_bytes = self.code_prefix_bytes,
                "CODE_PREFIX_BYTES differs from the default; codes will not match other deployments."
            );
        }
    }
}
