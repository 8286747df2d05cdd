use std::sync::Arc;

use md5::{Digest, Md5};

use crate::error::{Stage, StageError};
use crate::events::{EventSink, PipelineEvent};
use crate::record::{CleanRecord, RawRecord};

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex MD5 of the URL followed by the first `prefix_len` chars of `content`.
///
/// Two pages at the same URL that agree on their leading text hash equal,
/// whatever follows.
pub fn fingerprint(url: &str, content: &str, prefix_len: usize) -> String {
    let prefix: String = content.chars().take(prefix_len).collect();
    let mut hasher = Md5::new();
    hasher.update(url.as_bytes());
    hasher.update(prefix.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pure normalization step. `None` in means nothing upstream to work on.
pub fn clean(raw: Option<RawRecord>, prefix_len: usize) -> Result<CleanRecord, StageError> {
    let raw = raw.ok_or(StageError::MissingInput)?;
    if raw.url.trim().is_empty() {
        return Err(StageError::Normalization("record has no url".into()));
    }

    let content = collapse_whitespace(&raw.content);
    let fingerprint = fingerprint(&raw.url, &content, prefix_len);

    Ok(CleanRecord {
        title: raw.title.trim().to_string(),
        content,
        url: raw.url,
        fetched_at: raw.fetched_at,
        fingerprint,
    })
}

pub struct Transformer {
    prefix_len: usize,
    sink: Arc<dyn EventSink>,
}

impl Transformer {
    pub fn new(prefix_len: usize, sink: Arc<dyn EventSink>) -> Self {
        Self { prefix_len, sink }
    }

    pub fn transform(&self, raw: Option<RawRecord>) -> Result<CleanRecord, StageError> {
        let url = raw.as_ref().map(|r| r.url.clone()).unwrap_or_default();
        self.sink.emit(&PipelineEvent::StageStarted {
            stage: Stage::Transform,
            url: url.clone(),
        });

        let result = clean(raw, self.prefix_len);
        match &result {
            Ok(_) => self.sink.emit(&PipelineEvent::StageSucceeded {
                stage: Stage::Transform,
                url,
            }),
            Err(e) => self.sink.emit(&PipelineEvent::StageFailed {
                stage: Stage::Transform,
                url,
                reason: e.to_string(),
            }),
        }
        result
    }
}
