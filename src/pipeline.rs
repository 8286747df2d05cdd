use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::FutureExt;

use crate::config::PipelineConfig;
use crate::db;
use crate::error::{PipelineFailure, Stage, StageError};
use crate::events::{EventSink, PipelineEvent, TracingSink};
use crate::extract::Extractor;
use crate::load::Loader;
use crate::record::StoredRecord;
use crate::transform::Transformer;

/// Extract → Transform → Load for one URL at a time.
pub struct Pipeline {
    extractor: Extractor,
    transformer: Transformer,
    loader: Loader,
    sink: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Validates `config` and creates the table if needed.
    pub fn new(config: PipelineConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;
        db::setup(&config.storage_location)?;
        sink.emit(&PipelineEvent::StorageReady {
            location: config.storage_location.display().to_string(),
        });

        let extractor = Extractor::new(&config, Arc::clone(&sink))?;
        let transformer = Transformer::new(config.fingerprint_prefix_length, Arc::clone(&sink));
        let loader = Loader::new(config.storage_location.clone(), Arc::clone(&sink));

        Ok(Self {
            extractor,
            transformer,
            loader,
            sink,
        })
    }

    pub fn with_tracing(config: PipelineConfig) -> Result<Self> {
        Self::new(config, Arc::new(TracingSink))
    }

    /// `true` when the page ended up stored. Never panics or errors.
    pub async fn run(&self, url: &str) -> bool {
        self.execute(url).await.is_ok()
    }

    /// Process `urls` in order, one fully finished before the next starts.
    pub async fn run_all<I, S>(&self, urls: I) -> Vec<(String, bool)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut results = Vec::new();
        for url in urls {
            let url = url.as_ref();
            let ok = self.run(url).await;
            results.push((url.to_string(), ok));
        }
        results
    }

    /// Like [`Pipeline::run`] but says which stage failed and why.
    pub async fn execute(&self, url: &str) -> Result<StoredRecord, PipelineFailure> {
        let current = Mutex::new(Stage::Extract);
        let result = match AssertUnwindSafe(self.stages(url, &current)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                Err(PipelineFailure {
                    url: url.to_string(),
                    stage: current.lock().map(|s| *s).unwrap_or(Stage::Extract),
                    source: StageError::Panicked(reason),
                })
            }
        };

        let finished = PipelineEvent::RunFinished {
            url: url.to_string(),
            success: result.is_ok(),
        };
        // a panicking sink must not turn a finished run into a panic
        let _ = panic::catch_unwind(AssertUnwindSafe(|| self.sink.emit(&finished)));
        result
    }

    async fn stages(
        &self,
        url: &str,
        current: &Mutex<Stage>,
    ) -> Result<StoredRecord, PipelineFailure> {
        let fail = |stage: Stage| {
            move |source: StageError| PipelineFailure {
                url: url.to_string(),
                stage,
                source,
            }
        };

        let raw = self.extractor.extract(url).await.map_err(fail(Stage::Extract))?;
        enter(current, Stage::Transform);
        let clean = self
            .transformer
            .transform(Some(raw))
            .map_err(fail(Stage::Transform))?;
        enter(current, Stage::Load);
        self.loader.load(Some(&clean)).map_err(fail(Stage::Load))
    }
}

fn enter(current: &Mutex<Stage>, stage: Stage) {
    if let Ok(mut s) = current.lock() {
        *s = stage;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
