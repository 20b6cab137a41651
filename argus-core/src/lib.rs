//! # Argus Core
//!
//! Detection engine for the Argus contest proctoring service:
//!
//! - **Fingerprinting**: winnowed k-gram hashing and Jaccard similarity for
//!   cross-repository plagiarism detection
//! - **Commit analysis**: structural and temporal suspicion over fetched
//!   source-control history
//! - **Event scoring**: per-event and aggregate participant suspicion with
//!   alert threshold evaluation
//! - **Store gateway**: trait-abstracted persistence with PostgreSQL and
//!   in-memory backends
//! - **Sync pipeline**: the periodic repository monitor and cross-repo
//!   comparison worker

pub mod commits;
pub mod error;
pub mod fingerprint;
pub mod forge;
pub mod scoring;
pub mod store;
pub mod sync;

pub use commits::{CommitAnalysis, analyze_commits, source_suspicion_score};
pub use error::{EngineError, FieldError, Result};
pub use fingerprint::{CandidateRepo, CrossMatch, Fingerprint, Fingerprinter, RepoFile};
pub use scoring::{EventScore, RecentContext, ScoringConfig, TypingStats};
pub use store::{MemoryStore, PostgresStore, StoreGateway};
pub use sync::{NullSyncEvents, SyncCycleReport, SyncEvents, SyncScheduler};

/// Round to three decimal places, the precision every persisted suspicion
/// score is reported at.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Clamp to [0, 1] then round to three decimals.
pub(crate) fn clamp_score(value: f64) -> f64 {
    round3(value.clamp(0.0, 1.0))
}
