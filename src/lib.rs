//! Fetch a page, reduce it to title and visible text, fingerprint it and
//! upsert it into a SQLite `web_data` table.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod record;
pub mod transform;

pub use config::PipelineConfig;
pub use error::{PipelineFailure, Stage, StageError};
pub use events::{EventSink, PipelineEvent, RecordingSink, TracingSink};
pub use pipeline::Pipeline;
pub use record::{CleanRecord, RawRecord, StoredRecord};
