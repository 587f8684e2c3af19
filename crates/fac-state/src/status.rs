//! # Submission Status
//!
//! The status vocabulary and the transition table. The table is the single
//! authority on which moves are legal; [`crate::lifecycle::Lifecycle`]
//! consults it and nothing else.
//!
//! ```text
//! IN_PROGRESS ──▶ READY_FOR_CERTIFICATION ──▶ AUDITOR_CERTIFIED ──▶ AUDITEE_CERTIFIED
//!      ▲                   │                        │                    │    ▲
//!      └──── reopen ───────┴────────────────────────┴────────────────────┘    │
//!                                                                        ▼    │
//!                                                                    SUBMITTED
//!                                                                        │
//!                                                                        ▼
//!                                                  DISSEMINATED ──▶ RESUBMITTED (marker)
//!
//! any pre-submission state ──▶ FLAGGED_FOR_REMOVAL ──reopen──▶ IN_PROGRESS
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Intake is being edited.
    InProgress,
    /// Content locked; awaiting auditor certification.
    ReadyForCertification,
    /// Auditor has certified.
    AuditorCertified,
    /// Auditee has certified.
    AuditeeCertified,
    /// Legacy combined-certification status. Readable in old records, never
    /// entered by this machine.
    Certified,
    /// Submitted for dissemination; content is frozen.
    Submitted,
    /// Public records have been produced.
    Disseminated,
    /// Marked for removal by its owners or an administrator.
    FlaggedForRemoval,
    /// History-only marker: superseded by a resubmission. Terminal.
    Resubmitted,
}

/// Every status, in declaration order.
pub const ALL_STATUSES: [SubmissionStatus; 9] = [
    SubmissionStatus::InProgress,
    SubmissionStatus::ReadyForCertification,
    SubmissionStatus::AuditorCertified,
    SubmissionStatus::AuditeeCertified,
    SubmissionStatus::Certified,
    SubmissionStatus::Submitted,
    SubmissionStatus::Disseminated,
    SubmissionStatus::FlaggedForRemoval,
    SubmissionStatus::Resubmitted,
];

impl SubmissionStatus {
    /// The statuses from which a move to `self` is legal.
    ///
    /// An empty slice means `self` is never a transition target.
    pub fn sources(&self) -> &'static [SubmissionStatus] {
        use SubmissionStatus::*;
        match self {
            InProgress => &[
                ReadyForCertification,
                AuditorCertified,
                AuditeeCertified,
                FlaggedForRemoval,
            ],
            ReadyForCertification => &[InProgress],
            AuditorCertified => &[ReadyForCertification],
            AuditeeCertified => &[AuditorCertified, Submitted],
            Certified => &[],
            Submitted => &[AuditeeCertified],
            Disseminated => &[Submitted],
            FlaggedForRemoval => &[
                InProgress,
                ReadyForCertification,
                AuditorCertified,
                AuditeeCertified,
                Certified,
            ],
            Resubmitted => &[Disseminated],
        }
    }

    /// Whether a move from `from` to `self` is in the table.
    pub fn accepts_from(&self, from: SubmissionStatus) -> bool {
        self.sources().contains(&from)
    }

    /// Tag of the audit-log event emitted on entering this status.
    pub fn event_tag(&self) -> &'static str {
        match self {
            Self::InProgress => "unlocked-after-certification",
            Self::ReadyForCertification => "locked-for-certification",
            Self::AuditorCertified => "auditor-certification-completed",
            Self::AuditeeCertified => "auditee-certification-completed",
            Self::Certified => "certification-completed",
            Self::Submitted => "submitted",
            Self::Disseminated => "disseminated",
            Self::FlaggedForRemoval => "flagged-submission-for-removal",
            Self::Resubmitted => "resubmitted",
        }
    }

    /// Whether intake sections may be edited in this status.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Whether no transition leaves this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resubmitted)
    }

    /// The snake_case storage name (`in_progress`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::ReadyForCertification => "ready_for_certification",
            Self::AuditorCertified => "auditor_certified",
            Self::AuditeeCertified => "auditee_certified",
            Self::Certified => "certified",
            Self::Submitted => "submitted",
            Self::Disseminated => "disseminated",
            Self::FlaggedForRemoval => "flagged_for_removal",
            Self::Resubmitted => "resubmitted",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// Error parsing a status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown submission status {0:?}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for SubmissionStatus {
    type Err = UnknownStatus;

    /// Accepts storage names and their upper-case or kebab-case spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ALL_STATUSES
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
