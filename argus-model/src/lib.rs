//! Core data model definitions shared across Argus crates.
#![allow(missing_docs)]

pub mod alert;
pub mod error;
pub mod event;
pub mod ids;
pub mod participant;
pub mod source;
pub mod typing;

// Intentionally curated re-exports for downstream consumers.
pub use alert::{AlertEvaluation, AlertLevel};
pub use error::{ModelError, Result as ModelResult};
pub use event::{EventKind, EventRecord};
pub use ids::{AnalysisId, EventId, ParticipantId};
pub use participant::{Participant, ParticipantStats};
pub use source::{
    BurstCommit, CommitAggregates, CommitInfo, IdleBurst, SimilarityMatch,
    SourceAnalysis, SuspiciousCommit, TimingAnalysis,
};
pub use typing::TypingPattern;
