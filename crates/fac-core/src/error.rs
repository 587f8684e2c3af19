//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types shared across the FAC stack. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Identifier and timestamp errors carry the offending input verbatim.
//! - Hash errors name the entity type so operators can tell which
//!   dissemination table was affected.

use thiserror::Error;

/// Top-level error type for the core primitives.
#[derive(Error, Debug)]
pub enum FacError {
    /// A report identifier did not match `YYYY-MM-SOURCE-NNNNNNNNNN`.
    #[error("invalid report id {value:?}: {reason}")]
    InvalidReportId {
        /// The rejected input.
        value: String,
        /// Which part of the format was violated.
        reason: String,
    },

    /// A timestamp could not be parsed or constructed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Canonical hash computation failed.
    #[error("hash error: {0}")]
    Hash(#[from] HashError),
}

/// Error during canonical hash computation.
#[derive(Error, Debug)]
pub enum HashError {
    /// No allow-list is registered for this entity type.
    #[error("no hash allow-list registered for entity type {0:?}")]
    UnknownEntityType(String),

    /// The entity did not serialize to a JSON object.
    #[error("entity of type {0:?} did not serialize to a flat object")]
    NotAnObject(String),

    /// The embedded allow-list table is unreadable.
    #[error("hash contract is malformed: {0}")]
    MalformedContract(String),

    /// JSON serialization of the entity failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
