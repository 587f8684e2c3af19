//! # fac-consistency — Cross-Shape Consistency Checker
//!
//! While a submission is stored both as a flat legacy row and as a nested
//! audit document, this crate checks that the two still say the same thing.
//!
//! - [`flatten`] turns any JSON document into a `path → leaf` map.
//! - [`check`] compares two documents leaf by leaf and classifies each
//!   difference, tolerating renamed keys and format changes.
//!
//! Both are pure functions over borrowed documents. Neither can fail.

pub mod check;
pub mod flatten;

pub use check::{check, CheckMode, CheckReport, Discrepancy, DiscrepancyKind};
pub use flatten::{field_name, flatten, lookup, normalize_path, FlatMap};
