//! Read-surface DTOs for dashboard queries.

use argus_model::{EventRecord, Participant, ParticipantStats, TypingPattern};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query parameters for the participant listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantListQuery {
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Query parameters for the single-participant detail view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDetailQuery {
    #[serde(default)]
    pub events_limit: Option<i64>,
    #[serde(default)]
    pub events_offset: Option<i64>,
    #[serde(default)]
    pub event_kind: Option<String>,
    #[serde(default)]
    pub flagged_only: Option<bool>,
}

/// Participant attributes carried in listings and live frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub machine_id: String,
    pub display_name: String,
    pub session_id: Option<String>,
    pub suspicion_score: f64,
    pub last_active: DateTime<Utc>,
    pub total_events: u64,
    pub stats: ParticipantStats,
}

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id.to_uuid(),
            machine_id: p.machine_id.clone(),
            display_name: p.display_name().to_string(),
            session_id: p.session_id.clone(),
            suspicion_score: p.suspicion_score,
            last_active: p.last_active,
            total_events: p.total_events,
            stats: p.stats.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantListResponse {
    pub participants: Vec<ParticipantSummary>,
    pub total: u64,
    pub limit: i64,
    pub offset: i64,
}

/// Events grouped by `(kind, flagged)` with count and score statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspicionBucket {
    pub kind: String,
    pub flagged: bool,
    pub count: u64,
    pub avg_score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDetailResponse {
    pub participant: Participant,
    pub events: Vec<EventRecord>,
    pub event_count: u64,
    pub typing_pattern: Option<TypingPattern>,
    pub suspicion_breakdown: Vec<SuspicionBucket>,
}

/// A suspicious participant enriched with its flagged-event count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousParticipant {
    #[serde(flatten)]
    pub summary: ParticipantSummary,
    pub flagged_event_count: u64,
}

/// Contest-wide aggregate view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_participants: u64,
    /// Participants whose `lastActive` is within the past five minutes.
    pub active_participants: u64,
    pub total_events: u64,
    pub flagged_events: u64,
    pub avg_suspicion_score: f64,
}
