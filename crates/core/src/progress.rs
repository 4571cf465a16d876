//! Progress event streaming for pipeline runs
//!
//! Structured begin/end events for pipelines, their steps, and repository
//! syncs. Events carry a monotonically increasing id and a unix-millisecond
//! timestamp; emitters decide presentation (JSON file, spinner, nothing).

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Global event ID counter for deterministic ordering
pub static EVENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Progress event types for pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// A pipeline invocation entered its Running state
    #[serde(rename = "pipeline.begin")]
    PipelineBegin {
        id: u64,
        timestamp: u64,
        pipeline: String,
        steps: usize,
    },
    /// A pipeline invocation finished (Succeeded or Failed)
    #[serde(rename = "pipeline.end")]
    PipelineEnd {
        id: u64,
        timestamp: u64,
        pipeline: String,
        duration_ms: u64,
        success: bool,
    },

    /// A single step began
    #[serde(rename = "step.begin")]
    StepBegin {
        id: u64,
        timestamp: u64,
        pipeline: String,
        step: usize,
        description: String,
    },
    /// A single step finished
    #[serde(rename = "step.end")]
    StepEnd {
        id: u64,
        timestamp: u64,
        pipeline: String,
        step: usize,
        duration_ms: u64,
        success: bool,
    },

    /// Repository sync (pull-or-clone) events
    #[serde(rename = "repo.sync.begin")]
    RepoSyncBegin {
        id: u64,
        timestamp: u64,
        url: String,
        dest: String,
    },
    #[serde(rename = "repo.sync.end")]
    RepoSyncEnd {
        id: u64,
        timestamp: u64,
        url: String,
        dest: String,
        duration_ms: u64,
        success: bool,
    },
}

impl ProgressEvent {
    /// Returns the unique identifier for this event
    pub fn id(&self) -> u64 {
        match self {
            ProgressEvent::PipelineBegin { id, .. }
            | ProgressEvent::PipelineEnd { id, .. }
            | ProgressEvent::StepBegin { id, .. }
            | ProgressEvent::StepEnd { id, .. }
            | ProgressEvent::RepoSyncBegin { id, .. }
            | ProgressEvent::RepoSyncEnd { id, .. } => *id,
        }
    }
}

/// Allocate the next event id
pub fn next_event_id() -> u64 {
    EVENT_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Current unix timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Sink for progress events
pub trait ProgressEmitter: Send {
    /// Emit a single event
    fn emit(&mut self, event: &ProgressEvent) -> Result<()>;
}

/// Emitter that discards all events
#[derive(Debug, Default)]
pub struct NullEmitter;

impl ProgressEmitter for NullEmitter {
    fn emit(&mut self, _event: &ProgressEvent) -> Result<()> {
        Ok(())
    }
}

/// Emitter writing newline-delimited JSON to a file
#[derive(Debug)]
pub struct JsonFileEmitter {
    writer: BufWriter<std::fs::File>,
}

impl JsonFileEmitter {
    /// Append events to the given file, creating it if needed
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl ProgressEmitter for JsonFileEmitter {
    fn emit(&mut self, event: &ProgressEvent) -> Result<()> {
        let line = serde_json::to_string(event).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Facade bundling an emitter with id/timestamp allocation
pub struct ProgressTracker {
    emitter: Box<dyn ProgressEmitter>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker").finish_non_exhaustive()
    }
}

impl ProgressTracker {
    /// Wrap the given emitter
    pub fn new(emitter: Box<dyn ProgressEmitter>) -> Self {
        Self { emitter }
    }

    /// Tracker that discards everything
    pub fn null() -> Self {
        Self::new(Box::new(NullEmitter))
    }

    /// Emit an event, logging (not propagating) emitter failures so progress
    /// reporting can never fail a pipeline
    pub fn emit(&mut self, event: ProgressEvent) {
        if let Err(e) = self.emitter.emit(&event) {
            debug!("Progress emission failed: {}", e);
        }
    }
}
