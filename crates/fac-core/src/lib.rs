//! # fac-core — Foundational Types for the FAC Stack
//!
//! This crate is the leaf of the workspace DAG. It defines the primitives
//! every other crate leans on: the report identifier, UTC timestamps, the
//! shared error taxonomy, and the canonical dissemination hash.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype report identifiers.** `ReportId` is validated at
//!    construction. No bare strings cross crate boundaries as identifiers.
//!
//! 2. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision.
//!    Rendering in the public display zone is an explicit, separate step.
//!
//! 3. **The hash contract is data.** The per-entity allow-list of hashed
//!    fields lives in `data/hash_fields.json` and is embedded at compile
//!    time. External verification tools diff that file byte-for-byte.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `fac-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod hash;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use error::{FacError, HashError};
pub use hash::{canonical_string, entity_hash, HashContract, HASH_CONTRACT_JSON};
pub use identity::ReportId;
pub use temporal::{Timestamp, DISPLAY_ZONE_OFFSET_SECS};
