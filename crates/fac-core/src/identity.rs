//! # Report Identifier
//!
//! Every audit engagement is addressed by a report identifier of the form
//! `YYYY-MM-SOURCE-NNNNNNNNNN`, e.g. `2023-06-GSAFAC-0000000001`. The
//! identifier is assigned once at intake start and never changes; the
//! dissemination tables use it as their weak reference back to the
//! `General` row.

use serde::{Deserialize, Serialize};

use crate::error::FacError;

/// Validated, immutable report identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportId(String);

impl ReportId {
    /// Parse and validate a report identifier.
    ///
    /// # Errors
    ///
    /// Returns `FacError::InvalidReportId` naming the violated segment.
    pub fn new(value: impl Into<String>) -> Result<Self, FacError> {
        let value = value.into();
        validate(&value)?;
        Ok(Self(value))
    }

    /// Access the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The source tag segment (`GSAFAC`, `CENSUS`, ...).
    pub fn source(&self) -> &str {
        self.0.split('-').nth(2).unwrap_or_default()
    }
}

fn validate(value: &str) -> Result<(), FacError> {
    let reject = |reason: &str| FacError::InvalidReportId {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = value.split('-').collect();
    let [year, month, source, sequence] = parts.as_slice() else {
        return Err(reject("expected four '-'-separated segments"));
    };

    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(reject("year must be four digits"));
    }
    match month.parse::<u8>() {
        Ok(1..=12) if month.len() == 2 => {}
        _ => return Err(reject("month must be 01-12")),
    }
    if !(3..=8).contains(&source.len())
        || !source
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(reject("source must be 3-8 uppercase alphanumerics"));
    }
    if sequence.len() != 10 || !sequence.chars().all(|c| c.is_ascii_digit()) {
        return Err(reject("sequence must be ten digits"));
    }
    Ok(())
}

impl TryFrom<String> for ReportId {
    type Error = FacError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReportId> for String {
    fn from(id: ReportId) -> Self {
        id.0
    }
}

impl std::str::FromStr for ReportId {
    type Err = FacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
