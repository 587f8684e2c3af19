//! # fac-state — Submission Lifecycle
//!
//! The stateful half of the audit-submission core.
//!
//! - **Status** (`status.rs`): the nine submission statuses and the
//!   transition table.
//! - **Record** (`record.rs`): one audit engagement with its intake
//!   sections, certifications and append-only history.
//! - **Lifecycle** (`lifecycle.rs`): validates transitions and writes each
//!   accepted one to every registered sink.
//! - **Sinks** (`sink.rs`, `shape.rs`): the storage representations kept in
//!   step during the migration from the flat legacy row to the nested
//!   audit document.
//! - **Resubmission** (`resubmission.rs`): the version chain linking a
//!   report to the reports that supersede it.
//!
//! ## Design
//!
//! The current status is never stored on its own. It is the last entry of
//! the history, so the two cannot disagree.

pub mod lifecycle;
pub mod record;
pub mod resubmission;
pub mod shape;
pub mod sink;
pub mod status;

pub use lifecycle::{
    EventListener, Lifecycle, LifecycleError, LifecycleEvent, TracingListener, TransitionOutcome,
};
pub use record::{IntakeSections, SubmissionRecord, TransitionEntry, SECTION_NAMES};
pub use resubmission::{
    derive_status, link_resubmission, resubmit, validate_chain, walk_chain, Chain, ChainError,
    Resubmission, ResubmissionMeta, ResubmissionStatus,
};
pub use shape::{to_audit_document, to_legacy_document, unwrap_section};
pub use sink::{MemorySink, Sink, SinkError, SinkFailure};
pub use status::{SubmissionStatus, UnknownStatus, ALL_STATUSES};
