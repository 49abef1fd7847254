//! Runtime configuration loaded from the environment

use crate::error::{GateError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Process configuration
///
/// Only the queue and bucket are configurable; timings, channel numbers
/// and capture arguments are constants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GateConfig {
    /// Command queue URL (`QUEUE_URL`)
    pub queue_url: String,

    /// Evidence bucket (`S3_BUCKET`)
    pub s3_bucket: String,
}

impl GateConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)
            .map_err(|e| GateError::Config(format!("Failed to read environment: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_url.trim().is_empty() {
            return Err(GateError::Config("QUEUE_URL is empty".to_string()));
        }
        if self.s3_bucket.trim().is_empty() {
            return Err(GateError::Config("S3_BUCKET is empty".to_string()));
        }
        Ok(())
    }
}

/// Load `.env` from the working directory or a parent into the process
/// environment
///
/// Variables already set are kept. A missing file is not an error.
pub fn load_dotenv() -> Option<PathBuf> {
    report_dotenv(dotenvy::dotenv())
}

/// Load a specific env file into the process environment
pub fn load_dotenv_from(path: impl AsRef<Path>) -> Option<PathBuf> {
    let path = path.as_ref();
    report_dotenv(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn report_dotenv(result: std::result::Result<PathBuf, dotenvy::Error>) -> Option<PathBuf> {
    match result {
        Ok(path) => {
            tracing::info!(path = %path.display(), "Loaded environment file");
            Some(path)
        }
        Err(e) if e.not_found() => {
            tracing::debug!("No environment file found");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load environment file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_config_from_vars() {
        let config = GateConfig::from_vars(vars(&[
            ("QUEUE_URL", "https://sqs.eu-west-1.amazonaws.com/123456789012/gate"),
            ("S3_BUCKET", "gate-evidence"),
            ("HOME", "/root"),
        ]))
        .unwrap();

        assert_eq!(
            config.queue_url,
            "https://sqs.eu-west-1.amazonaws.com/123456789012/gate"
        );
        assert_eq!(config.s3_bucket, "gate-evidence");
    }

    #[test]
    fn test_config_missing_bucket() {
        let err = GateConfig::from_vars(vars(&[("QUEUE_URL", "https://example/q")])).unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_config_empty_queue_url() {
        let err = GateConfig::from_vars(vars(&[("QUEUE_URL", " "), ("S3_BUCKET", "b")]))
            .unwrap_err();
        assert!(err.to_string().contains("QUEUE_URL"));
    }

    #[test]
    fn test_env_file_supplies_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# gate\nQUEUE_URL=https://sqs.eu-west-1.amazonaws.com/123456789012/from-file\nS3_BUCKET=file-bucket\n",
        )
        .unwrap();

        assert_eq!(load_dotenv_from(&path), Some(path.clone()));

        let config = GateConfig::from_env().unwrap();
        assert_eq!(
            config.queue_url,
            "https://sqs.eu-west-1.amazonaws.com/123456789012/from-file"
        );
        assert_eq!(config.s3_bucket, "file-bucket");
    }

    #[test]
    fn test_missing_env_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_dotenv_from(dir.path().join("absent.env")), None);
    }
}
