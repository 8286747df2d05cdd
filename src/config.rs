use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Result};

pub const DEFAULT_DB_PATH: &str = "web_data.db";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_CONTENT: usize = 1000;
pub const DEFAULT_PREFIX_LEN: usize = 100;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Everything a [`crate::Pipeline`] needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// SQLite database file.
    pub storage_location: PathBuf,
    pub http_timeout: Duration,
    /// Upper bound, in characters, on extracted page text.
    pub max_content_length: usize,
    /// Leading characters of cleaned content that feed the fingerprint.
    pub fingerprint_prefix_length: usize,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage_location: PathBuf::from(DEFAULT_DB_PATH),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_content_length: DEFAULT_MAX_CONTENT,
            fingerprint_prefix_length: DEFAULT_PREFIX_LEN,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn with_storage(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_location: path.into(),
            ..Self::default()
        }
    }

    /// Reject settings that would make every run fail or hash nothing.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.storage_location.as_os_str().is_empty(),
            "storage location must not be empty"
        );
        ensure!(!self.http_timeout.is_zero(), "http timeout must be non-zero");
        ensure!(self.max_content_length > 0, "max content length must be > 0");
        ensure!(
            self.fingerprint_prefix_length > 0,
            "fingerprint prefix length must be > 0"
        );
        ensure!(
            !self.user_agent.trim().is_empty(),
            "user agent must not be empty"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_content_length, 1000);
        assert_eq!(cfg.fingerprint_prefix_length, 100);
    }

    #[test]
    fn rejects_zero_limits() {
        let mut cfg = PipelineConfig::with_storage("x.db");
        cfg.max_content_length = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::with_storage("x.db");
        cfg.http_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::with_storage("x.db");
        cfg.fingerprint_prefix_length = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_blank_user_agent_and_path() {
        let mut cfg = PipelineConfig::with_storage("");
        assert!(cfg.validate().is_err());
        cfg.storage_location = "ok.db".into();
        cfg.user_agent = "  ".into();
        assert!(cfg.validate().is_err());
    }
}
