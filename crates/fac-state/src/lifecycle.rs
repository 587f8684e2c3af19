//! # Submission Lifecycle State Machine
//!
//! Applies status transitions to a [`SubmissionRecord`], writes the result
//! to every registered [`Sink`], and notifies [`EventListener`]s.
//!
//! ## Design Decision
//!
//! The status set is an enum with a data-driven transition table
//! ([`SubmissionStatus::sources`]) rather than a typestate per status.
//! Records are loaded from storage in arbitrary states and several targets
//! accept many sources, so checks happen at runtime and return `Result`.
//!
//! ## Write Semantics
//!
//! A transition is one logical unit across sinks:
//!
//! - The next record state is built on a copy. Nothing is mutated until the
//!   primary sink accepts it.
//! - Primary failure → `LifecycleError::Sink`; record untouched, no event.
//! - Primary success, later failure → the record is updated (the primary is
//!   authoritative), the event is emitted, and the call returns
//!   [`TransitionOutcome::PartialWrite`] naming every failed sink.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use fac_core::Timestamp;

use crate::record::{SubmissionRecord, TransitionEntry};
use crate::sink::{Sink, SinkError, SinkFailure};
use crate::status::SubmissionStatus;

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The current status is not in the target's source set.
    #[error("invalid transition for {report_id}: {from} -> {to}")]
    InvalidTransition {
        /// Report the transition was attempted on.
        report_id: String,
        /// Current status.
        from: SubmissionStatus,
        /// Attempted target.
        to: SubmissionStatus,
    },

    /// The primary sink rejected the write. Nothing was applied.
    #[error("primary sink {sink} rejected {report_id}: {source}")]
    Sink {
        /// Report being written.
        report_id: String,
        /// Name of the primary sink.
        sink: String,
        /// Underlying cause.
        #[source]
        source: SinkError,
    },

    /// Intake edits attempted outside IN_PROGRESS.
    #[error("{report_id} is {status}; intake is locked")]
    Locked {
        /// Report that was edited.
        report_id: String,
        /// Its current status.
        status: SubmissionStatus,
    },

    /// Edit addressed a section that does not exist.
    #[error("unknown intake section {0:?}")]
    UnknownSection(String),
}

// ─── Outcomes and events ─────────────────────────────────────────────

/// Result of an accepted transition.
#[must_use = "a partial write must be surfaced to the operator"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Every sink accepted the write.
    Applied,
    /// The primary accepted the write; the listed sinks did not.
    PartialWrite {
        /// Sinks that failed, in registration order.
        failed: Vec<SinkFailure>,
    },
}

impl TransitionOutcome {
    /// Whether every sink accepted the write.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Audit-log event emitted after every accepted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    /// Unique event id.
    pub event_id: Uuid,
    /// Report the transition applied to.
    pub report_id: String,
    /// Status entered.
    pub target_status: SubmissionStatus,
    /// Acting user, when known.
    pub user: Option<String>,
    /// Event tag, e.g. `locked-for-certification`.
    pub event_tag: &'static str,
    /// When the transition was recorded.
    pub timestamp: Timestamp,
}

/// Receiver of lifecycle events. Fire and forget: listeners cannot fail
/// a transition.
pub trait EventListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &LifecycleEvent);
}

/// Default listener: one structured `tracing` line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl EventListener for TracingListener {
    fn on_event(&self, event: &LifecycleEvent) {
        tracing::info!(
            event_id = %event.event_id,
            report_id = %event.report_id,
            status = %event.target_status,
            user = event.user.as_deref().unwrap_or("-"),
            tag = event.event_tag,
            "submission event"
        );
    }
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// The lifecycle state machine, bound to its sinks and listeners.
pub struct Lifecycle {
    sinks: Vec<Box<dyn Sink>>,
    listeners: Vec<Box<dyn EventListener>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// A machine with no sinks and the tracing listener.
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            listeners: vec![Box::new(TracingListener)],
        }
    }

    /// Register a sink. The first registered sink is primary.
    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Register an event listener.
    pub fn with_listener(mut self, listener: impl EventListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Names of the registered sinks, primary first.
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Move `record` to `target`.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the current status is not a legal source
    /// (no side effects); `Sink` if the primary sink fails (no side effects).
    pub fn transition(
        &self,
        record: &mut SubmissionRecord,
        target: SubmissionStatus,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(record, target, user, |_| {})
    }

    /// IN_PROGRESS → READY_FOR_CERTIFICATION.
    pub fn lock_for_certification(
        &self,
        record: &mut SubmissionRecord,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.transition(record, SubmissionStatus::ReadyForCertification, user)
    }

    /// READY_FOR_CERTIFICATION → AUDITOR_CERTIFIED, storing the payload.
    pub fn auditor_certify(
        &self,
        record: &mut SubmissionRecord,
        certification: Value,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(record, SubmissionStatus::AuditorCertified, user, move |r| {
            r.set_auditor_certification(Some(certification))
        })
    }

    /// AUDITOR_CERTIFIED or SUBMITTED → AUDITEE_CERTIFIED, storing the payload.
    pub fn auditee_certify(
        &self,
        record: &mut SubmissionRecord,
        certification: Value,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(record, SubmissionStatus::AuditeeCertified, user, move |r| {
            r.set_auditee_certification(Some(certification))
        })
    }

    /// AUDITEE_CERTIFIED → SUBMITTED.
    pub fn submit(
        &self,
        record: &mut SubmissionRecord,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.transition(record, SubmissionStatus::Submitted, user)
    }

    /// SUBMITTED → DISSEMINATED.
    pub fn disseminate(
        &self,
        record: &mut SubmissionRecord,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.transition(record, SubmissionStatus::Disseminated, user)
    }

    /// Any pre-submission status → FLAGGED_FOR_REMOVAL.
    pub fn flag_for_removal(
        &self,
        record: &mut SubmissionRecord,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.transition(record, SubmissionStatus::FlaggedForRemoval, user)
    }

    /// Reopen for editing. Clears both certification payloads.
    pub fn unlock_after_certification(
        &self,
        record: &mut SubmissionRecord,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.transition(record, SubmissionStatus::InProgress, user)
    }

    /// DISSEMINATED → RESUBMITTED marker. Called by the resubmission flow.
    pub fn mark_resubmitted(
        &self,
        record: &mut SubmissionRecord,
        user: Option<&str>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.transition(record, SubmissionStatus::Resubmitted, user)
    }

    /// Write a record to every sink without a status change.
    ///
    /// Used when record content changes outside a transition, such as new
    /// resubmission links.
    pub fn sync(&self, record: &SubmissionRecord) -> Result<TransitionOutcome, LifecycleError> {
        self.write_all(record)
    }

    fn apply(
        &self,
        record: &mut SubmissionRecord,
        target: SubmissionStatus,
        user: Option<&str>,
        extra: impl FnOnce(&mut SubmissionRecord),
    ) -> Result<TransitionOutcome, LifecycleError> {
        let from = record.status();
        if !target.accepts_from(from) {
            tracing::debug!(
                report_id = %record.report_id(),
                from = %from,
                to = %target,
                "rejected transition"
            );
            return Err(LifecycleError::InvalidTransition {
                report_id: record.report_id().to_string(),
                from,
                to: target,
            });
        }

        let timestamp = Timestamp::now();
        let mut next = record.clone();
        if target == SubmissionStatus::InProgress {
            next.set_auditor_certification(None);
            next.set_auditee_certification(None);
        }
        extra(&mut next);
        next.push_history(TransitionEntry {
            status: target,
            timestamp,
            user: user.map(str::to_string),
        });

        let outcome = self.write_all(&next)?;
        *record = next;

        let event = LifecycleEvent {
            event_id: Uuid::new_v4(),
            report_id: record.report_id().to_string(),
            target_status: target,
            user: user.map(str::to_string),
            event_tag: target.event_tag(),
            timestamp,
        };
        for listener in &self.listeners {
            listener.on_event(&event);
        }
        Ok(outcome)
    }

    fn write_all(&self, record: &SubmissionRecord) -> Result<TransitionOutcome, LifecycleError> {
        let mut sinks = self.sinks.iter();
        if let Some(primary) = sinks.next() {
            primary.write(record).map_err(|source| LifecycleError::Sink {
                report_id: record.report_id().to_string(),
                sink: primary.name().to_string(),
                source,
            })?;
        }

        let failed: Vec<SinkFailure> = sinks
            .filter_map(|sink| match sink.write(record) {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!(
                        report_id = %record.report_id(),
                        sink = sink.name(),
                        error = %e,
                        "secondary sink write failed; primary holds the new state"
                    );
                    Some(SinkFailure {
                        sink: sink.name().to_string(),
                        cause: e.to_string(),
                    })
                }
            })
            .collect();

        if failed.is_empty() {
            Ok(TransitionOutcome::Applied)
        } else {
            Ok(TransitionOutcome::PartialWrite { failed })
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
