//! Contest-wide analytics for the dashboard.

use crate::AppState;
use crate::errors::AppResult;
use argus_contracts::dashboard::{OverviewStats, ParticipantSummary, SuspiciousParticipant};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

const MAX_SUSPICIOUS_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SuspiciousQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// `GET /api/analytics/suspicious`
pub async fn suspicious_participants(
    State(state): State<AppState>,
    Query(query): Query<SuspiciousQuery>,
) -> AppResult<Json<Vec<SuspiciousParticipant>>> {
    let limit = query
        .limit
        .unwrap_or(MAX_SUSPICIOUS_LIMIT)
        .clamp(1, MAX_SUSPICIOUS_LIMIT);
    let entries = state.store.suspicious_participants(limit).await?;
    Ok(Json(
        entries
            .into_iter()
            .map(|entry| SuspiciousParticipant {
                summary: ParticipantSummary::from(&entry.participant),
                flagged_event_count: entry.flagged_event_count,
            })
            .collect(),
    ))
}

/// `GET /api/analytics/overview`
pub async fn overview(State(state): State<AppState>) -> AppResult<Json<OverviewStats>> {
    Ok(Json(state.store.overview_stats().await?))
}
