use std::fmt;

use thiserror::Error;

/// One step of the pipeline, each with its own failure domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    /// Network error, timeout, or non-success status.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// Response body is not markup we can read.
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("normalization failed: {0}")]
    Normalization(String),
    #[error("storage failed: {0}")]
    Storage(#[from] rusqlite::Error),
    /// Upstream stage produced nothing.
    #[error("no input from previous stage")]
    MissingInput,
    #[error("stage panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for StageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StageError::Fetch(format!("timed out: {e}"))
        } else {
            StageError::Fetch(e.to_string())
        }
    }
}

/// Why a pipeline run ended without a stored row.
#[derive(Debug, Error)]
#[error("{stage} stage failed for {url}: {source}")]
pub struct PipelineFailure {
    pub url: String,
    pub stage: Stage,
    #[source]
    pub source: StageError,
}
