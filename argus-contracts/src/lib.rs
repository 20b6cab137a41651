//! Wire contracts between the Argus engine, the editor agents that feed it,
//! and the dashboard observers that subscribe to it.

pub mod api;
pub mod dashboard;
pub mod frames;
pub mod ingest;
pub mod source;

/// Frequently used contract types for server and client crates.
pub mod prelude {
    pub use super::api::ApiResponse;
    pub use super::dashboard::{
        OverviewStats, ParticipantDetailResponse, ParticipantListResponse,
        ParticipantSummary, SuspicionBucket,
    };
    pub use super::frames::{Frame, Intent};
    pub use super::ingest::{
        IngestRequest, IngestResponse, ParticipantIdentity, RawEvent,
        TypingSample,
    };
    pub use super::source::{
        CompareRequest, RegisterRepoRequest, SourceAnalysisSummary,
    };
}
