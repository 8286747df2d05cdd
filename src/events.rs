//! Structured log events emitted by the pipeline stages.
//!
//! Stages never log directly; they hand a [`PipelineEvent`] to whatever
//! [`EventSink`] the pipeline was built with. The binary uses [`TracingSink`].

use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::error::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StorageReady { location: String },
    StageStarted { stage: Stage, url: String },
    StageSucceeded { stage: Stage, url: String },
    StageFailed { stage: Stage, url: String, reason: String },
    RunFinished { url: String, success: bool },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StorageReady { location } => {
                info!(%location, "Database setup completed");
            }
            PipelineEvent::StageStarted { stage, url } => {
                info!(%stage, %url, "stage started");
            }
            PipelineEvent::StageSucceeded { stage, url } => {
                info!(%stage, %url, "stage succeeded");
            }
            PipelineEvent::StageFailed { stage, url, reason } => {
                error!(%stage, %url, %reason, "stage failed");
            }
            PipelineEvent::RunFinished { url, success } => {
                info!(%url, success, "pipeline finished");
            }
        }
    }
}

/// Keeps every event in memory. Handy for test harnesses and dry runs.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// How many times `stage` was entered.
    pub fn started(&self, stage: Stage) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::StageStarted { stage: s, .. } if *s == stage))
            .count()
    }

    pub fn failures(&self) -> Vec<(Stage, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::StageFailed { stage, reason, .. } => Some((stage, reason)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
