//! # Storage Sinks
//!
//! During the storage migration every accepted transition is written to
//! each registered sink in order. The first sink is primary. Dropping the
//! legacy representation later means removing its sink from the list.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::record::SubmissionRecord;

/// Error raised by a sink write.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct SinkError(pub String);

impl SinkError {
    /// Wrap any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// A storage representation that receives every accepted transition.
pub trait Sink: Send + Sync {
    /// Stable name used in logs and partial-write reports.
    fn name(&self) -> &str;

    /// Persist the record in this sink's representation.
    fn write(&self, record: &SubmissionRecord) -> Result<(), SinkError>;
}

/// A sink that failed after the primary accepted the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkFailure {
    /// Name of the failing sink.
    pub sink: String,
    /// Rendered cause.
    pub cause: String,
}

/// In-memory sink, keyed by report id, that stores a rendered document.
///
/// `render` picks the representation, e.g.
/// [`crate::shape::to_legacy_document`].
pub struct MemorySink {
    name: String,
    render: fn(&SubmissionRecord) -> serde_json::Value,
    documents: Mutex<BTreeMap<String, serde_json::Value>>,
    fail_writes: bool,
}

impl MemorySink {
    /// Create a sink that renders records with `render`.
    pub fn new(name: impl Into<String>, render: fn(&SubmissionRecord) -> serde_json::Value) -> Self {
        Self {
            name: name.into(),
            render,
            documents: Mutex::new(BTreeMap::new()),
            fail_writes: false,
        }
    }

    /// A sink that rejects every write. Used to exercise partial writes.
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(name, |_| serde_json::Value::Null)
        }
    }

    /// The stored document for a report, if any.
    pub fn document(&self, report_id: &str) -> Option<serde_json::Value> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(report_id).cloned())
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        if self.fail_writes {
            return Err(SinkError::new(format!("{} rejects writes", self.name)));
        }
        let doc = (self.render)(record);
        self.documents
            .lock()
            .map_err(|_| SinkError::new("sink mutex poisoned"))?
            .insert(record.report_id().to_string(), doc);
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        (**self).write(record)
    }
}
