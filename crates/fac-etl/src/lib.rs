//! # fac-etl — Intake-to-Dissemination Transform
//!
//! Turns one submission's nested intake into the flat public entities and
//! writes them out.
//!
//! - **Entities** (`entities.rs`): the ten dissemination row types.
//! - **Transform** (`transform.rs`, `loaders.rs`, `coerce.rs`): ordered
//!   per-section loaders, General first.
//! - **Persist** (`persist.rs`): hash stamping and per-type bulk insert.
//! - **Pipeline** (`pipeline.rs`): the SUBMITTED → DISSEMINATED run, the
//!   public-row refresh after resubmission, and the pre-certification preview.
//!
//! ## Failure Policy
//!
//! Lifecycle violations are errors returned to the caller. Section and
//! per-type insert problems are warnings returned alongside the rows that
//! were produced.

pub mod coerce;
pub mod entities;
mod loaders;
pub mod persist;
pub mod pipeline;
pub mod transform;

pub use entities::{Disseminated, EntityKind, LOAD_ORDER};
pub use persist::{persist, DisseminationStore, MemoryDisseminationStore, ReportRows, StoreError};
pub use pipeline::{
    disseminate, preview, refresh_public_rows, DisseminationReport, PipelineError,
};
pub use transform::{
    transform, DisseminationBatch, TransformMode, TransformResult, TransformWarning,
};
