use std::path::PathBuf;
use std::sync::Arc;

use crate::db;
use crate::error::{Stage, StageError};
use crate::events::{EventSink, PipelineEvent};
use crate::record::{CleanRecord, StoredRecord};

/// Writes clean records into `web_data`, one short-lived connection per call.
pub struct Loader {
    path: PathBuf,
    sink: Arc<dyn EventSink>,
}

impl Loader {
    pub fn new(path: impl Into<PathBuf>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            path: path.into(),
            sink,
        }
    }

    pub fn load(&self, record: Option<&CleanRecord>) -> Result<StoredRecord, StageError> {
        let url = record.map(|r| r.url.clone()).unwrap_or_default();
        let Some(record) = record else {
            self.sink.emit(&PipelineEvent::StageFailed {
                stage: Stage::Load,
                url,
                reason: StageError::MissingInput.to_string(),
            });
            return Err(StageError::MissingInput);
        };

        self.sink.emit(&PipelineEvent::StageStarted {
            stage: Stage::Load,
            url: url.clone(),
        });

        let result = self.store(record);
        match &result {
            Ok(_) => self.sink.emit(&PipelineEvent::StageSucceeded {
                stage: Stage::Load,
                url,
            }),
            Err(e) => self.sink.emit(&PipelineEvent::StageFailed {
                stage: Stage::Load,
                url,
                reason: e.to_string(),
            }),
        }
        result
    }

    /// Same as [`Loader::load`], reduced to success or not.
    pub fn load_ok(&self, record: Option<&CleanRecord>) -> bool {
        self.load(record).is_ok()
    }

    fn store(&self, record: &CleanRecord) -> Result<StoredRecord, StageError> {
        // dropped on every return path, which closes the connection
        let mut conn = db::connect(&self.path)?;
        Ok(db::upsert_record(&mut conn, record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use chrono::Utc;

    fn record(url: &str, content: &str, hash: &str) -> CleanRecord {
        CleanRecord {
            title: "T".into(),
            content: content.into(),
            url: url.into(),
            fetched_at: Utc::now(),
            fingerprint: hash.into(),
        }
    }

    fn loader(sink: &RecordingSink) -> (tempfile::TempDir, Loader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.db");
        db::setup(&path).unwrap();
        (dir, Loader::new(path, Arc::new(sink.clone())))
    }

    #[test]
    fn absent_record_is_false_without_touching_storage() {
        let sink = RecordingSink::new();
        let loader = Loader::new("/nonexistent/dir/web.db", Arc::new(sink.clone()));
        assert!(!loader.load_ok(None));
        assert_eq!(sink.started(Stage::Load), 0);
    }

    #[test]
    fn stores_and_replaces_on_same_url() {
        let sink = RecordingSink::new();
        let (dir, loader) = loader(&sink);

        assert!(loader.load_ok(Some(&record("https://a.test", "first", "h1"))));
        assert!(loader.load_ok(Some(&record("https://a.test", "second", "h2"))));

        let conn = db::connect(&dir.path().join("web.db")).unwrap();
        assert_eq!(db::count_rows(&conn).unwrap(), 1);
        let row = db::fetch_by_url(&conn, "https://a.test").unwrap().unwrap();
        assert_eq!(row.content, "second");
        assert_eq!(row.fingerprint, "h2");
    }

    #[test]
    fn storage_error_becomes_false() {
        let sink = RecordingSink::new();
        let loader = Loader::new("/nonexistent/dir/web.db", Arc::new(sink.clone()));
        assert!(!loader.load_ok(Some(&record("https://a.test", "x", "h"))));
        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, Stage::Load);
    }

    #[test]
    fn missing_table_is_storage_failure() {
        let sink = RecordingSink::new();
        let dir = tempfile::tempdir().unwrap();
        let loader = Loader::new(dir.path().join("empty.db"), Arc::new(sink.clone()));
        let err = loader.load(Some(&record("https://a.test", "x", "h"))).unwrap_err();
        assert!(matches!(err, StageError::Storage(_)));
    }
}
