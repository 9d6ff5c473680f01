//! Pipeline configuration from environment variables
//!
//! All knobs are process-scoped values passed into the pipeline entry point,
//! not module-level singletons. Loaded once at startup with sensible defaults.

use std::env;

/// Configuration for the ingestion runtime
///
/// Environment variables:
/// - `WHEELFLOW_DB_PATH` (default: ./wheellog.db)
/// - `UPLOAD_DIR` (default: ./uploads)
/// - `N8N_WEBHOOK_URL` (optional - webhook fan-out disabled when unset)
/// - `AI_ANALYZER_URL` (optional - analyzer dispatch disabled when unset)
/// - `DB_BUSY_TIMEOUT_MS` (default: 5000)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to the SQLite database file
    pub db_path: String,

    /// Directory scanned for .csv files when no paths are given on the CLI
    pub upload_dir: String,

    /// Trip-completion webhook endpoint (n8n or similar)
    pub webhook_url: Option<String>,

    /// Trip analyzer endpoint
    pub analyzer_url: Option<String>,

    /// SQLite busy timeout so a hung write cannot stall the process
    pub busy_timeout_ms: u64,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("WHEELFLOW_DB_PATH").unwrap_or_else(|_| "./wheellog.db".to_string()),

            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),

            webhook_url: env::var("N8N_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),

            analyzer_url: env::var("AI_ANALYZER_URL").ok().filter(|s| !s.is_empty()),

            busy_timeout_ms: env::var("DB_BUSY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5_000),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("N8N_WEBHOOK_URL", &self.webhook_url),
            ("AI_ANALYZER_URL", &self.analyzer_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::InvalidValue(format!(
                        "{} must start with http:// or https://, got '{}'",
                        name, url
                    )));
                }
            }
        }

        if self.db_path.is_empty() {
            return Err(ConfigError::InvalidValue(
                "WHEELFLOW_DB_PATH cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_webhook_url() {
        let config = PipelineConfig {
            db_path: "./test.db".to_string(),
            upload_dir: "./uploads".to_string(),
            webhook_url: Some("not-a-url".to_string()),
            analyzer_url: None,
            busy_timeout_ms: 5_000,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_db_path_rejected() {
        let config = PipelineConfig {
            db_path: String::new(),
            upload_dir: "./uploads".to_string(),
            webhook_url: None,
            analyzer_url: None,
            busy_timeout_ms: 5_000,
        };

        assert!(config.validate().is_err());
    }
}
