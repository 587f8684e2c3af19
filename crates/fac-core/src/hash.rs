//! # Canonical Dissemination Hash
//!
//! Every disseminated row carries a `hash` column computed here. The hash is
//! a drift detector: recomputing it from the public tables and comparing it
//! with the stored value shows whether a row still matches what the
//! pipeline produced. It is not a tamper seal.
//!
//! ## Contract
//!
//! The contract is what external verification tools re-implement, so every
//! step below is part of it:
//!
//! 1. Look up the allow-list of field names for the entity type in
//!    `data/hash_fields.json`. Fields not on the list never participate.
//! 2. Flatten the entity to `name -> value`, keep allow-listed names,
//!    sort by name (byte order).
//! 3. Coerce each value to a string:
//!    - null or absent → `""`
//!    - date-shaped string (`YYYY-MM-DD`, RFC 3339, or a naive
//!      `YYYY-MM-DD[T ]HH:MM:SS[.f]`) → `YYYY-MM-DD` as written
//!    - boolean → `True` / `False`
//!    - number → its decimal form
//!    - any other string → verbatim
//!    - array or object → compact JSON
//! 4. Concatenate the values with no separator, UTF-8 encode, SHA-1,
//!    lowercase hex.
//!
//! Changing the allow-list invalidates every stored hash; bump `version` in
//! the data file and redisseminate.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};

use crate::error::HashError;

/// The allow-list table, embedded verbatim.
pub const HASH_CONTRACT_JSON: &str = include_str!("../data/hash_fields.json");

/// Parsed allow-list table keyed by entity type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashContract {
    version: u32,
    entities: BTreeMap<String, Vec<String>>,
}

static EMBEDDED: OnceLock<Result<HashContract, String>> = OnceLock::new();

impl HashContract {
    /// The contract shipped with this crate, parsed once.
    ///
    /// # Errors
    ///
    /// Returns `HashError::MalformedContract` if the embedded file does not
    /// parse. That is a build defect, never a data condition.
    pub fn embedded() -> Result<&'static HashContract, HashError> {
        EMBEDDED
            .get_or_init(|| Self::parse(HASH_CONTRACT_JSON).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| HashError::MalformedContract(e.clone()))
    }

    /// Parse a contract table from JSON.
    pub fn parse(json: &str) -> Result<Self, HashError> {
        let contract: HashContract =
            serde_json::from_str(json).map_err(|e| HashError::MalformedContract(e.to_string()))?;
        if contract.entities.is_empty() {
            return Err(HashError::MalformedContract(
                "no entity types listed".to_string(),
            ));
        }
        Ok(contract)
    }

    /// Contract version. Bumped whenever any allow-list changes.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The allow-listed field names for an entity type.
    pub fn fields(&self, entity_type: &str) -> Result<&[String], HashError> {
        self.entities
            .get(entity_type)
            .map(Vec::as_slice)
            .ok_or_else(|| HashError::UnknownEntityType(entity_type.to_string()))
    }

    /// All entity types covered by the contract, sorted.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Build the pre-hash string for an entity under this contract.
    pub fn canonical_string(
        &self,
        entity_type: &str,
        entity: &impl Serialize,
    ) -> Result<String, HashError> {
        let fields = self.fields(entity_type)?;
        let Value::Object(map) = serde_json::to_value(entity)? else {
            return Err(HashError::NotAnObject(entity_type.to_string()));
        };

        let mut names: Vec<&str> = fields.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();

        Ok(names
            .into_iter()
            .map(|name| map.get(name).map(canonical_value).unwrap_or_default())
            .collect())
    }

    /// Compute the hex digest for an entity under this contract.
    pub fn entity_hash(
        &self,
        entity_type: &str,
        entity: &impl Serialize,
    ) -> Result<String, HashError> {
        let canonical = self.canonical_string(entity_type, entity)?;
        Ok(sha1_hex(canonical.as_bytes()))
    }
}

/// Pre-hash string for an entity under the embedded contract.
pub fn canonical_string(entity_type: &str, entity: &impl Serialize) -> Result<String, HashError> {
    HashContract::embedded()?.canonical_string(entity_type, entity)
}

/// Hex SHA-1 digest of an entity under the embedded contract.
pub fn entity_hash(entity_type: &str, entity: &impl Serialize) -> Result<String, HashError> {
    HashContract::embedded()?.entity_hash(entity_type, entity)
}

/// Coerce one field value to its canonical string form.
pub fn canonical_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => date_prefix(s).unwrap_or_else(|| s.clone()),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// If `s` is date-shaped, return its `YYYY-MM-DD` part.
fn date_prefix(s: &str) -> Option<String> {
    if s.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date().format("%Y-%m-%d").to_string())
}

fn sha1_hex(bytes: &[u8]) -> String {
    Sha1::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
