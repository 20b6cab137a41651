//! Persistence abstraction.
//!
//! The engine talks to storage only through [`StoreGateway`], so the
//! pipeline and scheduler are testable against the in-memory double and
//! deployable against PostgreSQL.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use argus_contracts::dashboard::{OverviewStats, SuspicionBucket};
use argus_model::{
    EventKind, EventRecord, Participant, ParticipantId, SourceAnalysis, TypingPattern,
};
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Sort keys accepted by the participant listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticipantSort {
    #[default]
    SuspicionScore,
    LastActive,
    TotalEvents,
    StartedAt,
}

impl ParticipantSort {
    /// Parse a query-string sort key; unknown keys fall back to the
    /// default.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("lastActive") | Some("last_active") => ParticipantSort::LastActive,
            Some("totalEvents") | Some("total_events") => ParticipantSort::TotalEvents,
            Some("startedAt") | Some("started_at") => ParticipantSort::StartedAt,
            _ => ParticipantSort::SuspicionScore,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

/// One page of a participant listing.
#[derive(Debug, Clone)]
pub struct ParticipantPage {
    pub participants: Vec<Participant>,
    pub total: u64,
}

/// Filters for a participant's event timeline.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub flagged_only: bool,
    pub limit: i64,
    pub offset: i64,
}

/// One page of a participant's event timeline.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<EventRecord>,
    pub total: u64,
}

/// A suspicious participant joined with its flagged-event count.
#[derive(Debug, Clone)]
pub struct SuspiciousEntry {
    pub participant: Participant,
    pub flagged_event_count: u64,
}

/// Narrow persistence contract used by the ingest pipeline, the dashboard
/// read surface, and the sync scheduler.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Create schema objects if missing. Called once at startup.
    async fn initialize_schema(&self) -> Result<()>;

    /// Fetch-or-create by machine id; refreshes `last_active` and the
    /// session/workspace labels either way.
    async fn upsert_participant(
        &self,
        machine_id: &str,
        session_id: Option<&str>,
        workspace: Option<&str>,
    ) -> Result<Participant>;

    /// Persist a participant's mutable attributes (counters, score,
    /// activity timestamps).
    async fn save_participant(&self, participant: &Participant) -> Result<()>;

    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>>;

    async fn list_participants(
        &self,
        sort: ParticipantSort,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<ParticipantPage>;

    /// Bulk-append events with unordered semantics: individual row
    /// failures are logged and skipped, not rolled back. Returns the
    /// number of rows actually written.
    async fn append_events(&self, events: &[EventRecord]) -> Result<usize>;

    async fn events_for_participant(
        &self,
        id: ParticipantId,
        filter: &EventFilter,
    ) -> Result<EventPage>;

    /// Events grouped by `(kind, flagged)` with count, average, and max
    /// score.
    async fn suspicion_breakdown(&self, id: ParticipantId) -> Result<Vec<SuspicionBucket>>;

    /// Append interval samples to the participant's typing pattern,
    /// enforce the retention bound, and recompute statistics atomically.
    async fn update_typing_pattern(
        &self,
        id: ParticipantId,
        intervals: &[f64],
    ) -> Result<TypingPattern>;

    async fn get_typing_pattern(&self, id: ParticipantId) -> Result<Option<TypingPattern>>;

    /// Count of clipboard events recorded at or after `since_ms`.
    async fn recent_clipboard_count(&self, id: ParticipantId, since_ms: i64) -> Result<u64>;

    /// Whether any typing or file-change event has ever been recorded.
    async fn has_any_typing_event(&self, id: ParticipantId) -> Result<bool>;

    /// Participants with a positive suspicion score, most suspicious
    /// first, each with its flagged-event count.
    async fn suspicious_participants(&self, limit: i64) -> Result<Vec<SuspiciousEntry>>;

    async fn overview_stats(&self) -> Result<OverviewStats>;

    /// Fetch-or-create the analysis record for a participant repository.
    /// `(owner, repo)` is unique across participants.
    async fn get_or_create_source_analysis(
        &self,
        participant_id: ParticipantId,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<SourceAnalysis>;

    /// Write an analysis record; bounded lists are truncated on write.
    async fn persist_source_analysis(&self, analysis: &SourceAnalysis) -> Result<()>;

    async fn get_source_analysis(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Option<SourceAnalysis>>;

    /// Every registered analysis record, used by the sync scheduler.
    async fn list_source_analyses(&self) -> Result<Vec<SourceAnalysis>>;

    /// Top records by source suspicion score, descending.
    async fn top_source_analyses(&self, limit: i64) -> Result<Vec<SourceAnalysis>>;
}
