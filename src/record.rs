use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fields pulled straight out of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

/// Normalized record, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRecord {
    pub title: String,
    pub content: String,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    /// Hex MD5 over the URL and the leading content.
    pub fingerprint: String,
}

/// A row of `web_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub url: String,
    /// RFC 3339 text, as persisted.
    pub timestamp: String,
    #[serde(rename = "data_hash")]
    pub fingerprint: String,
}
